use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde_json::Value;
use tallyline_core::domain::order::OrderDraft;
use tallyline_core::intake::{IntakePipeline, ParseOutcome, SkippedLine};
use tallyline_core::review::{CommitReport, ReviewSession};
use tallyline_db::{DbPool, SqlOrderRepository};
use tracing::info;

use crate::commands::parse::{no_orders_result, NoOrders};
use crate::commands::{build_runtime, intake_catalog, load_config, open_database, read_report};
use crate::commands::{CommandResult, Failure};

enum CommitRun {
    NoOrders { lines_scanned: usize, skipped: Vec<SkippedLine> },
    Finished(CommitReport),
}

pub fn run(input: &Path, date: NaiveDate) -> CommandResult {
    let config = match load_config("commit") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let text = match read_report(input) {
        Ok(text) => text,
        Err(error) => return CommandResult::failure("commit", "input", format!("{error:#}"), 7),
    };

    let runtime = match build_runtime("commit") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let catalog = match intake_catalog(&pool).await {
            Ok(catalog) => catalog,
            Err(failure) => {
                pool.close().await;
                return Err(failure);
            }
        };

        let pipeline = IntakePipeline::from_config(&config, Arc::new(catalog));
        let outcome = pipeline.parse(&text, date);
        if let ParseOutcome::NoOrdersFound { lines_scanned, skipped } = outcome {
            pool.close().await;
            return Ok(CommitRun::NoOrders { lines_scanned, skipped });
        }

        let mut session = pipeline.open_session();
        let committed = match session.load(outcome) {
            Ok(_) => commit_session(&pool, &mut session).await,
            Err(error) => Err(("review_state", error.to_string(), 3u8)),
        };
        pool.close().await;

        Ok::<CommitRun, Failure>(CommitRun::Finished(committed?))
    });

    match result {
        Ok(CommitRun::Finished(report)) => commit_result(&report),
        Ok(CommitRun::NoOrders { lines_scanned, skipped }) => {
            no_orders_result("commit", NoOrders { lines_scanned, skipped: &skipped })
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("commit", error_class, message, exit_code)
        }
    }
}

/// Commits drafts an operator reviewed and edited after `tallyline parse`.
pub fn run_reviewed(drafts_path: &Path) -> CommandResult {
    let config = match load_config("commit") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let drafts = match read_drafts(drafts_path) {
        Ok(drafts) => drafts,
        Err(error) => return CommandResult::failure("commit", "input", format!("{error:#}"), 7),
    };

    let runtime = match build_runtime("commit") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let catalog = match intake_catalog(&pool).await {
            Ok(catalog) => catalog,
            Err(failure) => {
                pool.close().await;
                return Err(failure);
            }
        };

        let committed = match ReviewSession::from_reviewed(
            Arc::new(catalog),
            config.intake.balance_tolerance,
            drafts,
        ) {
            Ok(mut session) => commit_session(&pool, &mut session).await,
            Err(error) => Err(("input", format!("reviewed drafts rejected: {error}"), 7u8)),
        };
        pool.close().await;

        committed
    });

    match result {
        Ok(report) => commit_result(&report),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("commit", error_class, message, exit_code)
        }
    }
}

/// Accepts a bare JSON array of drafts or a whole `parse` payload.
pub(crate) fn read_drafts(path: &Path) -> anyhow::Result<Vec<OrderDraft>> {
    let raw = read_report(path)?;
    let mut document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("`{}` is not valid JSON", path.display()))?;

    let drafts = if document.is_array() {
        document
    } else if let Some(drafts) = document.pointer_mut("/data/drafts") {
        drafts.take()
    } else if let Some(drafts) = document.get_mut("drafts") {
        drafts.take()
    } else {
        bail!("`{}` holds no order drafts", path.display());
    };

    let drafts: Vec<OrderDraft> = serde_json::from_value(drafts)
        .with_context(|| format!("`{}` holds malformed order drafts", path.display()))?;
    if drafts.is_empty() {
        bail!("`{}` holds no order drafts", path.display());
    }
    Ok(drafts)
}

async fn commit_session(
    pool: &DbPool,
    session: &mut ReviewSession,
) -> Result<CommitReport, Failure> {
    session
        .commit(&SqlOrderRepository::new(pool.clone()))
        .await
        .map_err(|error| ("review_state", error.to_string(), 3u8))
}

fn commit_result(report: &CommitReport) -> CommandResult {
    if report.is_complete() {
        info!(
            event_name = "cli.commit.completed",
            committed = report.committed_count(),
            "all order drafts committed"
        );
        return CommandResult::success_with_data(
            "commit",
            format!("committed {} orders", report.committed_count()),
            report,
        );
    }

    let failed_indexes = report
        .failures
        .iter()
        .map(|failure| failure.order_idx.to_string())
        .collect::<Vec<_>>();
    CommandResult::failure_with_data(
        "commit",
        "commit_partial",
        format!(
            "committed {} orders, {} failed (order indexes: {})",
            report.committed_count(),
            report.failures.len(),
            failed_indexes.join(", ")
        ),
        9,
        report,
    )
}
