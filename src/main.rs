use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::warn;

use gradeflow::cli::{Cli, Command, CriteriaArgs, watch_interrupts};
use gradeflow::config::GraderConfig;
use gradeflow::roster::load_roster;
use gradeflow::ui::{JobProgress, status_style, status_table};
use gradeflow::{
    EvaluatorClient, FileStore, GradingJob, GradingOrchestrator, ResilientInvoker, logging,
};

type Orchestrator = GradingOrchestrator<EvaluatorClient, FileStore>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = GraderConfig::load()?;
    if let Some(url) = cli.evaluator_url {
        config.evaluator_url = url;
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    if let Some(dir) = cli.store_dir {
        config.store_dir = dir;
    }

    let client = EvaluatorClient::with_timeout(
        config.evaluator_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )
    .with_api_key(config.api_key.clone());
    let store = Arc::new(FileStore::new(config.store_dir.clone()));
    let orch = GradingOrchestrator::new(ResilientInvoker::new(client, config.retry.clone()), store);

    match cli.command {
        Command::Grade {
            assignment,
            roster,
            criteria,
        } => grade(orch, &assignment, &roster, &criteria).await,
        Command::Retry {
            assignment,
            roster,
            index,
            criteria,
        } => {
            let roster = load_roster(&roster)?;
            let Some(submission) = roster.get(index) else {
                bail!("roster has no submission at index {index}");
            };
            let criteria = read_criteria(&criteria)?;
            let state = orch
                .retry_submission(&assignment, &criteria, submission)
                .await?;
            println!(
                "#{index} {}: {}",
                status_style(state.status).apply_to(state.status),
                state.grade.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        Command::Revise {
            assignment,
            index,
            note,
        } => {
            let state = orch.revise(&assignment, index, &note).await?;
            println!(
                "#{index} revised, grade: {}",
                state.grade.as_deref().unwrap_or("(no grade found)")
            );
            Ok(())
        }
        Command::Status { assignment, json } => {
            let states = orch.states(&assignment)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&states)?);
            } else if states.is_empty() {
                println!("No results stored for {assignment}.");
            } else {
                print!("{}", status_table(&states));
            }
            Ok(())
        }
        Command::Show { assignment, index } => {
            let view = orch.review_view(&assignment, index)?;
            println!(
                "#{index} {}  grade: {}",
                status_style(view.status).apply_to(view.status),
                view.grade.as_deref().unwrap_or("-")
            );
            if let Some(feedback) = view.feedback {
                println!();
                println!("{feedback}");
            }
            Ok(())
        }
        Command::Clear { assignment } => {
            orch.clear(&assignment).await?;
            println!("Cleared results for {assignment}.");
            Ok(())
        }
    }
}

async fn grade(
    orch: Orchestrator,
    assignment: &str,
    roster_path: &Path,
    criteria: &CriteriaArgs,
) -> Result<()> {
    let roster = load_roster(roster_path)?;
    let criteria = read_criteria(criteria)?;
    let job = GradingJob::new(assignment, criteria, roster);

    let cancel = job.cancel_handle();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel).await {
            std::process::exit(130);
        }
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let renderer = tokio::spawn(async move {
        let progress = JobProgress::new();
        while let Some(event) = rx.recv().await {
            progress.handle(&event);
        }
        progress.finish();
    });

    let orch = orch.with_progress(tx);
    let result = orch.run(&job).await;
    drop(orch);
    let _ = renderer.await;

    let report = result?;
    if report.errored > 0 {
        warn!(
            errored = report.errored,
            "some submissions failed; use `gradeflow retry` to grade them again"
        );
    }
    Ok(())
}

fn read_criteria(args: &CriteriaArgs) -> Result<String> {
    match (&args.criteria, &args.criteria_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read criteria from {}", path.display())),
        (None, None) => bail!("either --criteria or --criteria-file is required"),
    }
}
