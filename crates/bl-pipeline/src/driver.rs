//! Top-level orchestrator: lock, plan, execute or skip, persist, finalize.

use std::path::{Path, PathBuf};
use std::time::Instant;

use bl_core::{BlError, CompletedJob, ErrorInfo, PlanStep};
use bl_llm::LlmGateway;
use tracing::info;

use crate::config::Config;
use crate::context::Context;
use crate::planner::{self, PlanOptions};
use crate::progress::Progress;
use crate::spec::PipelineSpec;
use crate::stages;
use crate::status::{now_rfc3339, Status};

/// One configured pipeline bound to an output directory.
pub struct Pipeline {
    config: Config,
    spec: PipelineSpec,
    output_dir: PathBuf,
}

impl Pipeline {
    /// Creates a pipeline, loading the stage table (env override honored).
    pub fn new(config: Config, output_dir: impl Into<PathBuf>) -> Result<Self, BlError> {
        Ok(Self {
            config,
            spec: PipelineSpec::load()?,
            output_dir: output_dir.into(),
        })
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Computes the plan the next [`Pipeline::run`] call would execute,
    /// without taking the lease. Fails on a held lock or an invalid resume
    /// directory, exactly as the run itself would.
    pub fn plan(&self, opts: &PlanOptions, input_dir: Option<&Path>) -> Result<Vec<PlanStep>, BlError> {
        let status = Status::load_or_init(&self.output_dir)?;
        if status.is_locked() {
            return Err(locked_error(&self.output_dir));
        }
        self.validate_resume(opts, input_dir)?;
        planner::build_plan(&self.spec, &self.config, &status, &self.output_dir, opts)
    }

    /// Executes the plan: RUN stages mutate the context and persist their
    /// artifacts; SKIP stages only notify. The status journal is replaced at
    /// every boundary and finalized as completed or errored.
    pub fn run(
        &self,
        opts: &PlanOptions,
        input_dir: Option<&Path>,
        initial: Context,
        gateway: &dyn LlmGateway,
        progress: &dyn Progress,
    ) -> Result<Status, BlError> {
        let mut status = Status::load_or_init(&self.output_dir)?;
        if status.is_locked() {
            return Err(locked_error(&self.output_dir));
        }
        self.validate_resume(opts, input_dir)?;
        let plan =
            planner::build_plan(&self.spec, &self.config, &status, &self.output_dir, opts)?;

        let mut ctx = match input_dir {
            Some(dir) => Context::load_from_dir(dir)?,
            None => initial,
        };

        status.begin_run(plan.clone());
        status.save(&self.output_dir)?;

        let total = plan.len();
        for (index, step) in plan.iter().enumerate() {
            if !step.run {
                info!(step = %step.step, reason = %step.reason, "skipping stage");
                progress.notify_skip(&step.step, &step.reason);
                continue;
            }

            info!(step = %step.step, reason = %step.reason, "running stage");
            progress.notify_step(index, total, &step.step);
            status.begin_job(&step.step);
            status.save(&self.output_dir)?;

            let started = Instant::now();
            let outcome = stages::run_stage(
                &step.step,
                &mut ctx,
                &self.config,
                gateway,
                progress,
                &self.output_dir,
            )
            .and_then(|()| ctx.save_step(&step.step, &self.output_dir));

            match outcome {
                Ok(()) => {
                    let usage = ctx.take_usage();
                    let job = CompletedJob {
                        step: step.step.clone(),
                        completed_at: now_rfc3339(),
                        duration_secs: started.elapsed().as_secs_f64(),
                        params: planner::serialize_params(&planner::current_params(
                            &self.config,
                            &step.step,
                        )),
                        token_usage: usage.total,
                    };
                    status.record_job(job, usage);
                    status.save(&self.output_dir)?;
                }
                Err(err) => {
                    let message = if err.is_interrupt() {
                        "Interrupted".to_string()
                    } else {
                        err.to_string()
                    };
                    status.finish_error(message, render_trace(&err));
                    status.save(&self.output_dir)?;
                    return Err(err);
                }
            }
        }

        status.finish_ok();
        status.save(&self.output_dir)?;
        Ok(status)
    }

    fn validate_resume(&self, opts: &PlanOptions, input_dir: Option<&Path>) -> Result<(), BlError> {
        match (&opts.from, input_dir) {
            (Some(from), Some(dir)) => planner::validate_resume(&self.spec, from, dir),
            (Some(_), None) => Err(BlError::Config(ErrorInfo::new(
                "resume-input-dir",
                "--from requires --input-dir",
            ))),
            (None, Some(_)) => Err(BlError::Config(ErrorInfo::new(
                "resume-input-dir",
                "--input-dir is only valid together with --from",
            ))),
            (None, None) => Ok(()),
        }
    }
}

fn locked_error(output_dir: &Path) -> BlError {
    BlError::Locked(
        ErrorInfo::new("pipeline-locked", "another run holds the output directory lease")
            .with_context("output_dir", output_dir.display().to_string()),
    )
}

/// Renders the error chain in place of a stack trace.
fn render_trace(err: &BlError) -> String {
    let info = err.info();
    let mut trace = format!("{err}");
    for (key, value) in &info.context {
        trace.push_str(&format!("\n  {key}: {value}"));
    }
    if let Some(hint) = &info.hint {
        trace.push_str(&format!("\n  hint: {hint}"));
    }
    trace
}
