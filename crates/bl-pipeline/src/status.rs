//! Persistent per-run status journal.
//!
//! The journal is simultaneously a soft lock (the `lock_until` lease), a
//! provenance log (completed jobs with parameter digests), and the input to
//! the next invocation's plan. It is always replaced whole-file so readers
//! never observe a partial write.

use std::fs;
use std::path::Path;

use bl_core::{BlError, CompletedJob, ErrorInfo, PlanStep, TokenUsage};
use chrono::{DateTime, Duration, Local, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Lease duration granted at each stage boundary.
pub const LOCK_LEASE_SECS: i64 = 300;

/// File name of the journal inside the output directory.
pub const STATUS_FILE: &str = "status.json";

/// Lifecycle states of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Journal created, no run started yet.
    #[default]
    Initialized,
    /// A run holds the lease.
    Running,
    /// The last run finished every planned stage.
    Completed,
    /// The last run aborted; `error` holds the message.
    Error,
}

/// The persisted journal document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Status {
    /// Current lifecycle state.
    pub status: RunState,
    /// Plan of the current or most recent run.
    #[serde(default)]
    pub plan: Vec<PlanStep>,
    /// RFC-3339 start of the current or most recent run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// RFC-3339 end of the most recent run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Lease expiry; a running journal with a future lease blocks new runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<String>,
    /// Stage currently executing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job: Option<String>,
    /// RFC-3339 start of the current stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job_started: Option<String>,
    /// Jobs completed by the current run.
    #[serde(default)]
    pub completed_jobs: Vec<CompletedJob>,
    /// Jobs carried over from earlier runs, minus steps redone since.
    #[serde(default)]
    pub previously_completed_jobs: Vec<CompletedJob>,
    /// Token total across the whole journal lifetime.
    #[serde(default)]
    pub total_token_usage: u64,
    /// Prompt-token share of the total.
    #[serde(default)]
    pub token_usage_input: u64,
    /// Completion-token share of the total.
    #[serde(default)]
    pub token_usage_output: u64,
    /// Failure message of an errored run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Rendered error chain of an errored run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack_trace: Option<String>,
}

/// Current local time as RFC-3339 with offset.
pub fn now_rfc3339() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

impl Status {
    /// Loads the journal from the output directory, or returns a fresh
    /// initialized journal when none exists.
    pub fn load_or_init(output_dir: &Path) -> Result<Self, BlError> {
        let path = output_dir.join(STATUS_FILE);
        if !path.exists() {
            return Ok(Status::default());
        }
        let contents = fs::read_to_string(&path).map_err(|err| {
            BlError::Serde(
                ErrorInfo::new("status-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            BlError::Serde(
                ErrorInfo::new("status-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Atomically replaces the journal on disk.
    pub fn save(&self, output_dir: &Path) -> Result<(), BlError> {
        fs::create_dir_all(output_dir).map_err(|err| {
            BlError::Serde(
                ErrorInfo::new("status-mkdir", err.to_string())
                    .with_context("path", output_dir.display().to_string()),
            )
        })?;
        let path = output_dir.join(STATUS_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            BlError::Serde(ErrorInfo::new("status-serialize", err.to_string()))
        })?;
        let tmp = output_dir.join(format!("{STATUS_FILE}.tmp"));
        fs::write(&tmp, json).map_err(|err| {
            BlError::Serde(
                ErrorInfo::new("status-write", err.to_string())
                    .with_context("path", tmp.display().to_string()),
            )
        })?;
        fs::rename(&tmp, &path).map_err(|err| {
            BlError::Serde(
                ErrorInfo::new("status-replace", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// True when another run's lease is still in force.
    pub fn is_locked(&self) -> bool {
        if self.status != RunState::Running {
            return false;
        }
        match &self.lock_until {
            Some(lease) => match DateTime::parse_from_rfc3339(lease) {
                Ok(until) => until > Local::now(),
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Transitions the journal into a fresh running state: prior completed
    /// jobs are folded into the carried-over list, the plan is recorded, and
    /// the first lease is taken.
    pub fn begin_run(&mut self, plan: Vec<PlanStep>) {
        let finished = std::mem::take(&mut self.completed_jobs);
        for job in finished {
            self.previously_completed_jobs
                .retain(|prior| prior.step != job.step);
            self.previously_completed_jobs.push(job);
        }
        self.plan = plan;
        self.status = RunState::Running;
        self.start_time = Some(now_rfc3339());
        self.end_time = None;
        self.error = None;
        self.error_stack_trace = None;
        self.current_job = None;
        self.current_job_started = None;
        self.renew_lease();
    }

    /// Extends the lease from the current instant.
    pub fn renew_lease(&mut self) {
        let until = Local::now() + Duration::seconds(LOCK_LEASE_SECS);
        self.lock_until = Some(until.to_rfc3339_opts(SecondsFormat::Secs, false));
    }

    /// Marks a stage as in flight.
    pub fn begin_job(&mut self, step: &str) {
        self.current_job = Some(step.to_string());
        self.current_job_started = Some(now_rfc3339());
        self.renew_lease();
    }

    /// Records a completed stage and folds its token usage into the totals.
    pub fn record_job(&mut self, job: CompletedJob, usage: TokenUsage) {
        self.total_token_usage += usage.total;
        self.token_usage_input += usage.input;
        self.token_usage_output += usage.output;
        self.completed_jobs.push(job);
        self.current_job = None;
        self.current_job_started = None;
        self.renew_lease();
    }

    /// Latest provenance record for a step, current run first.
    pub fn find_job(&self, step: &str) -> Option<&CompletedJob> {
        self.completed_jobs
            .iter()
            .rev()
            .find(|job| job.step == step)
            .or_else(|| {
                self.previously_completed_jobs
                    .iter()
                    .rev()
                    .find(|job| job.step == step)
            })
    }

    /// Marks the run completed and retires steps redone this run from the
    /// carried-over list.
    pub fn finish_ok(&mut self) {
        let redone: Vec<String> = self
            .completed_jobs
            .iter()
            .map(|job| job.step.clone())
            .collect();
        self.previously_completed_jobs
            .retain(|job| !redone.contains(&job.step));
        self.status = RunState::Completed;
        self.end_time = Some(now_rfc3339());
        self.lock_until = None;
        self.current_job = None;
        self.current_job_started = None;
    }

    /// Marks the run errored with the given message and rendered trace.
    pub fn finish_error(&mut self, message: impl Into<String>, trace: impl Into<String>) {
        self.status = RunState::Error;
        self.error = Some(message.into());
        self.error_stack_trace = Some(trace.into());
        self.end_time = Some(now_rfc3339());
        self.lock_until = None;
    }
}
