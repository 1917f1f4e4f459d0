//! Grade a source file in the sandbox.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gradebox::config::Config;
use gradebox::grader::{ExecutionRequest, Grader};
use gradebox::language::Registry;
use gradebox::ledger::{JsonlLedger, SubmissionLedger, SubmissionRecord};
use gradebox::sandbox::DockerSandbox;
use gradebox::{GraderError, GradingResult};

/// Run the grading pipeline against a local source file.
pub async fn run(
    language: String,
    file: PathBuf,
    test_cases: Vec<String>,
    timeout_secs: Option<u64>,
    ledger_path: Option<PathBuf>,
) -> Result<()> {
    let project_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&project_dir)?;

    let source = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read source file: {}", file.display()))?;

    let registry = Registry::from_config(&config.languages)?;
    let sandbox = Arc::new(DockerSandbox::new(&config.sandbox)?);
    let timeout = timeout_secs.map_or_else(|| config.sandbox.timeout(), Duration::from_secs);
    let grader = Grader::new(registry, sandbox, timeout);

    let request =
        ExecutionRequest::new(language.clone(), source.clone()).with_test_cases(test_cases);

    let result = match grader.submit(request).await {
        Ok(result) => result,
        Err(err @ GraderError::BackendUnavailable { .. }) => {
            anyhow::bail!(
                "{err}\nThis is an infrastructure problem, not a grading outcome. \
                 Check that Docker is running and try again."
            );
        }
        Err(err) => return Err(err.into()),
    };

    print_result(&result);

    if let Some(path) = ledger_path {
        let ledger = JsonlLedger::new(path);
        ledger
            .record(SubmissionRecord::new(language, source, &result))
            .await?;
    }

    Ok(())
}

fn print_result(result: &GradingResult) {
    let score = format!("{}/100", result.score);
    let score = match result.score {
        80..=100 => score.green(),
        50..=79 => score.yellow(),
        _ => score.red(),
    };
    println!("Score: {score}");
    println!("{}", result.feedback);
    if !result.details.is_empty() {
        println!();
        for detail in &result.details {
            println!("  - {detail}");
        }
    }
}
