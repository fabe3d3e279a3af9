use std::collections::BTreeMap;
use std::fs;

use bl_core::CompletedJob;
use bl_pipeline::planner::{
    build_plan, current_params, digest_string, serialize_params, PlanOptions,
    LONG_STRING_THRESHOLD,
};
use bl_pipeline::{PipelineSpec, Status};
use serde_json::{json, Value};
use tempfile::TempDir;

mod common;
use common::test_config;

/// A status journal that looks like a fully completed prior run: one job per
/// stage with the current parameter digests, plus every output file on disk.
fn completed_status(config: &bl_pipeline::Config, out: &TempDir) -> Status {
    let spec = PipelineSpec::builtin();
    let mut status = Status::default();
    for stage in &spec.stages {
        for file in &stage.output_files {
            fs::write(out.path().join(file), "x").expect("touch output");
        }
        status.previously_completed_jobs.push(CompletedJob {
            step: stage.step.clone(),
            completed_at: "2026-07-01T00:00:00+09:00".to_string(),
            duration_secs: 1.0,
            params: serialize_params(&current_params(config, &stage.step)),
            token_usage: 0,
        });
    }
    status
}

#[test]
fn fresh_journal_runs_everything_for_lack_of_traces() {
    let out = TempDir::new().expect("tempdir");
    let config = test_config(vec![5, 15]);
    let plan = build_plan(
        &PipelineSpec::builtin(),
        &config,
        &Status::default(),
        out.path(),
        &PlanOptions::default(),
    )
    .expect("plan");
    assert_eq!(plan.len(), 7);
    for step in &plan {
        assert!(step.run);
        assert_eq!(step.reason, "no trace of previous run");
    }
}

#[test]
fn unchanged_rerun_skips_everything() {
    let out = TempDir::new().expect("tempdir");
    let config = test_config(vec![5, 15]);
    let status = completed_status(&config, &out);
    let plan = build_plan(
        &PipelineSpec::builtin(),
        &config,
        &status,
        out.path(),
        &PlanOptions::default(),
    )
    .expect("plan");
    for step in &plan {
        assert!(!step.run, "{} should skip", step.step);
        assert_eq!(step.reason, "nothing changed");
    }
}

#[test]
fn force_overrides_every_other_rule() {
    let out = TempDir::new().expect("tempdir");
    let config = test_config(vec![5, 15]);
    let status = completed_status(&config, &out);
    let plan = build_plan(
        &PipelineSpec::builtin(),
        &config,
        &status,
        out.path(),
        &PlanOptions {
            force: true,
            ..Default::default()
        },
    )
    .expect("plan");
    for step in &plan {
        assert!(step.run);
        assert_eq!(step.reason, "forced with -f");
    }
}

#[test]
fn only_selects_a_single_stage() {
    let out = TempDir::new().expect("tempdir");
    let config = test_config(vec![5, 15]);
    let status = completed_status(&config, &out);
    let plan = build_plan(
        &PipelineSpec::builtin(),
        &config,
        &status,
        out.path(),
        &PlanOptions {
            only: Some("clustering".to_string()),
            ..Default::default()
        },
    )
    .expect("plan");
    for step in &plan {
        if step.step == "clustering" {
            assert!(step.run);
            assert_eq!(step.reason, "forced this step with -o");
        } else {
            assert!(!step.run);
            assert_eq!(step.reason, "forced another step with -o");
        }
    }
}

#[test]
fn missing_output_file_forces_a_rerun() {
    let out = TempDir::new().expect("tempdir");
    let config = test_config(vec![5, 15]);
    let status = completed_status(&config, &out);
    fs::remove_file(out.path().join("embeddings.json")).expect("drop output");

    let plan = build_plan(
        &PipelineSpec::builtin(),
        &config,
        &status,
        out.path(),
        &PlanOptions::default(),
    )
    .expect("plan");
    let by_step: BTreeMap<&str, &bl_core::PlanStep> =
        plan.iter().map(|step| (step.step.as_str(), step)).collect();

    assert!(!by_step["extraction"].run);
    assert_eq!(by_step["embedding"].reason, "previous output not found");
    assert!(by_step["clustering"].run);
    assert_eq!(
        by_step["clustering"].reason,
        "dependent steps will re-run: embedding"
    );
    assert!(by_step["aggregation"].run);
}

#[test]
fn parameter_change_cascades_to_dependents_only() {
    let out = TempDir::new().expect("tempdir");
    let config = test_config(vec![5, 15]);
    let status = completed_status(&config, &out);

    let changed = test_config(vec![3, 10]);
    let plan = build_plan(
        &PipelineSpec::builtin(),
        &changed,
        &status,
        out.path(),
        &PlanOptions::default(),
    )
    .expect("plan");
    let by_step: BTreeMap<&str, &bl_core::PlanStep> =
        plan.iter().map(|step| (step.step.as_str(), step)).collect();

    assert!(!by_step["extraction"].run, "upstream stays skipped");
    assert_eq!(by_step["extraction"].reason, "nothing changed");
    assert!(!by_step["embedding"].run);

    assert!(by_step["clustering"].run);
    assert_eq!(
        by_step["clustering"].reason,
        "parameters changed: cluster_nums"
    );
    assert_eq!(
        by_step["initial_labelling"].reason,
        "dependent steps will re-run: clustering"
    );
    assert_eq!(
        by_step["merge_labelling"].reason,
        "dependent steps will re-run: clustering, initial_labelling"
    );
    assert_eq!(
        by_step["overview"].reason,
        "dependent steps will re-run: merge_labelling"
    );
    assert!(by_step["aggregation"].run);
    assert!(by_step["aggregation"]
        .reason
        .starts_with("dependent steps will re-run: clustering"));
}

#[test]
fn prompt_change_reruns_the_llm_stage() {
    let out = TempDir::new().expect("tempdir");
    let config = test_config(vec![5, 15]);
    let status = completed_status(&config, &out);

    let mut changed = test_config(vec![5, 15]);
    changed.prompts.overview = "別の要約プロンプト".to_string();
    let plan = build_plan(
        &PipelineSpec::builtin(),
        &changed,
        &status,
        out.path(),
        &PlanOptions::default(),
    )
    .expect("plan");
    let by_step: BTreeMap<&str, &bl_core::PlanStep> =
        plan.iter().map(|step| (step.step.as_str(), step)).collect();

    assert!(!by_step["merge_labelling"].run);
    assert_eq!(by_step["overview"].reason, "parameters changed: prompt");
    assert!(by_step["aggregation"].run);
}

#[test]
fn long_strings_are_compared_by_digest() {
    let long = "あ".repeat(LONG_STRING_THRESHOLD + 1);
    let short = "短い".to_string();
    let mut params = BTreeMap::new();
    params.insert("prompt".to_string(), json!(long.clone()));
    params.insert("model".to_string(), json!(short.clone()));

    let serialized = serialize_params(&params);
    assert_eq!(serialized["prompt"], Value::String(digest_string(&long)));
    assert_eq!(serialized["model"], Value::String(short));

    let hex = serialized["prompt"].as_str().expect("digest string");
    assert_eq!(hex.len(), 64);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn boundary_string_of_exactly_one_hundred_chars_stays_verbatim() {
    let exact = "x".repeat(LONG_STRING_THRESHOLD);
    let mut params = BTreeMap::new();
    params.insert("prompt".to_string(), json!(exact.clone()));
    let serialized = serialize_params(&params);
    assert_eq!(serialized["prompt"], Value::String(exact));
}

#[test]
fn unknown_steps_in_flags_are_config_errors() {
    let out = TempDir::new().expect("tempdir");
    let config = test_config(vec![5, 15]);
    let err = build_plan(
        &PipelineSpec::builtin(),
        &config,
        &Status::default(),
        out.path(),
        &PlanOptions {
            only: Some("no_such_step".to_string()),
            ..Default::default()
        },
    )
    .expect_err("unknown step");
    assert!(matches!(err, bl_core::BlError::Config(_)));
}
