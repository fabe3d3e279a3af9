use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use bl_core::{BlError, PlanStep};
use bl_llm::HttpGateway;
use bl_pipeline::{Config, Context, Pipeline, PlanOptions, Progress};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod input;

#[derive(Parser, Debug)]
#[command(name = "broadlistening", version, about = "Hierarchical opinion mapping over public comments")]
struct Cli {
    /// JSON configuration file for the run.
    config: PathBuf,
    /// Run every stage regardless of history.
    #[arg(short = 'f', long)]
    force: bool,
    /// Run only the named step.
    #[arg(short = 'o', long, value_name = "STEP")]
    only: Option<String>,
    /// Execute without printing the plan and waiting for confirmation.
    #[arg(long)]
    skip_interaction: bool,
    /// Start at the named step, loading upstream artifacts from --input-dir.
    #[arg(long, value_name = "STEP")]
    from: Option<String>,
    /// Directory holding the upstream artifacts for --from.
    #[arg(long, value_name = "DIR", requires = "from")]
    input_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if err.is_interrupt() {
                ExitCode::from(130)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), BlError> {
    let config = Config::load(&cli.config)?;
    let output_dir = output_dir_for(&config, &cli.config);
    let opts = PlanOptions {
        force: cli.force,
        only: cli.only.clone(),
        from: cli.from.clone(),
    };

    let pipeline = Pipeline::new(config, &output_dir)?;
    let plan = pipeline.plan(&opts, cli.input_dir.as_deref())?;
    print_plan(&plan);
    if !cli.skip_interaction {
        wait_for_newline()?;
    }

    let comments = if cli.from.is_none() {
        input::load_comments(pipeline.config())?
    } else {
        Vec::new()
    };
    let gateway = HttpGateway::new(pipeline.config().gateway_config()?)?;
    let progress = StdoutProgress;

    let status = pipeline.run(
        &opts,
        cli.input_dir.as_deref(),
        Context::with_comments(comments),
        &gateway,
        &progress,
    )?;
    println!(
        "completed: {} stages run, {} tokens used, results in {}",
        status.completed_jobs.len(),
        status.total_token_usage,
        output_dir.display(),
    );
    Ok(())
}

/// Output directory: `outputs/<name>`, falling back to the config file stem.
fn output_dir_for(config: &Config, config_path: &std::path::Path) -> PathBuf {
    let slug = if config.name.trim().is_empty() {
        config_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "run".to_string())
    } else {
        config.name.trim().to_string()
    };
    PathBuf::from("outputs").join(slug)
}

fn print_plan(plan: &[PlanStep]) {
    println!("plan:");
    for step in plan {
        let marker = if step.run { "RUN " } else { "SKIP" };
        println!("  {marker} {:<18} {}", step.step, step.reason);
    }
}

fn wait_for_newline() -> Result<(), BlError> {
    print!("press enter to execute the plan (ctrl-c to abort) ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).map_err(|err| {
        BlError::Interrupted(bl_core::ErrorInfo::new("stdin-closed", err.to_string()))
    })?;
    Ok(())
}

/// Renders step and progress events to stdout.
struct StdoutProgress;

impl Progress for StdoutProgress {
    fn notify_step(&self, step_index: usize, total: usize, step: &str) {
        println!("[{}/{}] {step}", step_index + 1, total);
    }

    fn notify_progress(&self, step: &str, current: usize, total: usize) {
        if total > 0 && (current == total || current % 10 == 0) {
            println!("  {step}: {current}/{total}");
        }
    }

    fn notify_skip(&self, step: &str, reason: &str) {
        println!("[skip] {step} ({reason})");
    }
}
