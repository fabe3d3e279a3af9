use std::fs;

use bl_core::BlError;
use bl_pipeline::status::Status;
use bl_pipeline::{stages, Context, NoopProgress, Pipeline, PlanOptions, RunState};
use chrono::{Duration, Local, SecondsFormat};
use serde_json::Value;
use tempfile::TempDir;

mod common;
use common::{make_comments, test_config, StubGateway};

/// Prepares a directory holding only the extraction and embedding artifacts.
fn embedding_boundary(dir: &TempDir) {
    let config = test_config(vec![2, 4]);
    let gateway = StubGateway::new(vec![0.0, 1.0, 10.0, 11.0]);
    let mut ctx = Context::with_comments(make_comments(4));
    for step in ["extraction", "embedding"] {
        stages::run_stage(step, &mut ctx, &config, &gateway, &NoopProgress, dir.path())
            .expect("stage");
        ctx.save_step(step, dir.path()).expect("save");
    }
}

#[test]
fn resume_from_clustering_completes_the_tail_of_the_pipeline() {
    let input = TempDir::new().expect("input dir");
    let out = TempDir::new().expect("output dir");
    embedding_boundary(&input);

    let config = test_config(vec![2, 4]);
    let gateway = StubGateway::new(vec![0.0, 1.0, 10.0, 11.0]);
    let pipeline = Pipeline::new(config, out.path()).expect("pipeline");
    let opts = PlanOptions {
        from: Some("clustering".to_string()),
        ..Default::default()
    };

    let status = pipeline
        .run(
            &opts,
            Some(input.path()),
            Context::default(),
            &gateway,
            &NoopProgress,
        )
        .expect("resume run");

    assert_eq!(status.status, RunState::Completed);
    let steps: Vec<&str> = status
        .completed_jobs
        .iter()
        .map(|job| job.step.as_str())
        .collect();
    assert_eq!(
        steps,
        vec![
            "clustering",
            "initial_labelling",
            "merge_labelling",
            "overview",
            "aggregation"
        ]
    );

    let raw = fs::read_to_string(out.path().join("hierarchical_result.json")).expect("result");
    let result: Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(
        result["comment_num"], 4,
        "comment count recovered from the distinct relation ids"
    );
    assert_eq!(result["arguments"].as_array().expect("arguments").len(), 4);
    assert_eq!(
        result["comments"].as_object().expect("comments").len(),
        0,
        "comment bodies are not part of the resume boundary"
    );
}

#[test]
fn resume_with_missing_upstream_files_is_a_config_error() {
    let input = TempDir::new().expect("input dir");
    let out = TempDir::new().expect("output dir");
    // Only the extraction artifacts exist; embeddings.json is missing.
    fs::write(input.path().join("args.csv"), "arg-id,argument\n").expect("args");
    fs::write(input.path().join("relations.csv"), "arg-id,comment-id\n").expect("relations");

    let pipeline = Pipeline::new(test_config(vec![2, 4]), out.path()).expect("pipeline");
    let opts = PlanOptions {
        from: Some("clustering".to_string()),
        ..Default::default()
    };
    let err = pipeline
        .plan(&opts, Some(input.path()))
        .expect_err("missing upstream files");
    match err {
        BlError::Config(info) => {
            assert_eq!(info.code, "resume-missing-file");
            assert_eq!(info.context.get("file").map(String::as_str), Some("embeddings.json"));
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn from_requires_input_dir_and_vice_versa() {
    let out = TempDir::new().expect("output dir");
    let pipeline = Pipeline::new(test_config(vec![2, 4]), out.path()).expect("pipeline");

    let err = pipeline
        .plan(
            &PlanOptions {
                from: Some("clustering".to_string()),
                ..Default::default()
            },
            None,
        )
        .expect_err("--from alone");
    assert!(matches!(err, BlError::Config(_)));

    let input = TempDir::new().expect("input dir");
    let err = pipeline
        .plan(&PlanOptions::default(), Some(input.path()))
        .expect_err("--input-dir alone");
    assert!(matches!(err, BlError::Config(_)));
}

#[test]
fn a_held_lease_blocks_the_run() {
    let out = TempDir::new().expect("output dir");
    let mut status = Status::default();
    status.status = RunState::Running;
    let future = Local::now() + Duration::seconds(120);
    status.lock_until = Some(future.to_rfc3339_opts(SecondsFormat::Secs, false));
    status.save(out.path()).expect("seed journal");

    let gateway = StubGateway::new(Vec::new());
    let pipeline = Pipeline::new(test_config(vec![2, 4]), out.path()).expect("pipeline");
    let err = pipeline
        .run(
            &PlanOptions::default(),
            None,
            Context::with_comments(make_comments(2)),
            &gateway,
            &NoopProgress,
        )
        .expect_err("locked");
    assert!(matches!(err, BlError::Locked(_)));

    let untouched = Status::load_or_init(out.path()).expect("reload");
    assert_eq!(untouched.status, RunState::Running, "no state change on lock refusal");
}

#[test]
fn a_stage_failure_lands_in_the_journal_and_propagates() {
    let out = TempDir::new().expect("output dir");
    // Clustering fails: no arguments survive extraction because every
    // comment body triggers the stub failure path.
    let mut comments = make_comments(2);
    for comment in &mut comments {
        comment.body = format!("FAIL {}", comment.id);
    }
    let gateway = StubGateway::new(Vec::new());
    let pipeline = Pipeline::new(test_config(vec![2, 4]), out.path()).expect("pipeline");
    let err = pipeline
        .run(
            &PlanOptions::default(),
            None,
            Context::with_comments(comments),
            &gateway,
            &NoopProgress,
        )
        .expect_err("clustering has nothing to work on");
    assert!(matches!(err, BlError::Clustering(_)));

    let journal = Status::load_or_init(out.path()).expect("reload");
    assert_eq!(journal.status, RunState::Error);
    assert!(journal.error.is_some());
    assert!(journal.error_stack_trace.is_some());
    assert!(journal.end_time.is_some());
}
