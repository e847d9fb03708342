use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tallyline_core::intake::{IntakePipeline, ParseOutcome, ParseReport, SkippedLine};

use crate::commands::{build_runtime, intake_catalog, load_config, open_database, read_report};
use crate::commands::{CommandResult, Failure};

pub fn run(input: &Path, date: NaiveDate) -> CommandResult {
    let config = match load_config("parse") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let text = match read_report(input) {
        Ok(text) => text,
        Err(error) => return CommandResult::failure("parse", "input", format!("{error:#}"), 7),
    };

    let runtime = match build_runtime("parse") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let catalog = intake_catalog(&pool).await;
        pool.close().await;

        let pipeline = IntakePipeline::from_config(&config, Arc::new(catalog?));
        Ok::<ParseOutcome, Failure>(pipeline.parse(&text, date))
    });

    match result {
        Ok(ParseOutcome::Orders(report)) => {
            CommandResult::success_with_data("parse", summarize(&report), &report)
        }
        Ok(ParseOutcome::NoOrdersFound { lines_scanned, skipped }) => no_orders_result(
            "parse",
            NoOrders { lines_scanned, skipped: &skipped },
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("parse", error_class, message, exit_code)
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NoOrders<'a> {
    pub lines_scanned: usize,
    pub skipped: &'a [SkippedLine],
}

pub(crate) fn no_orders_result(command: &str, data: NoOrders<'_>) -> CommandResult {
    CommandResult::failure_with_data(
        command,
        "no_orders",
        format!("no order lines recognized ({} lines scanned)", data.lines_scanned),
        8,
        &data,
    )
}

pub(crate) fn summarize(report: &ParseReport) -> String {
    format!(
        "parsed {} orders from {} lines ({} unbalanced, {} items need review, {} lines skipped)",
        report.drafts.len(),
        report.lines_scanned,
        report.unbalanced_count(),
        report.low_confidence_count(),
        report.skipped.len(),
    )
}
