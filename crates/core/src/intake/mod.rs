//! Daily-report intake: raw chat text in, reconciled order drafts out.
//!
//! The pipeline runs extraction, phrase parsing, product resolution and
//! reconciliation in sequence. Every stage is synchronous and never fails on bad
//! input; unusable lines surface as [`SkippedLine`]s and doubtful items as
//! low-confidence stubs for a reviewer to fix.

pub mod extract;
pub mod phrase;
pub mod reconcile;
pub mod resolve;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::aliases::AliasTable;
use crate::catalog::Catalog;
use crate::config::{AppConfig, IntakeConfig};
use crate::domain::order::{OrderDraft, OrderStatus};
use crate::review::ReviewSession;

pub use extract::{CandidateLine, LineExtractor, SkipReason, SkippedLine};
pub use phrase::{parse_item_phrases, ItemPhrase};
pub use reconcile::{
    ProportionalReconciliation, Reconciliation, ReconciliationEngine, ReconciliationStrategy,
};
pub use resolve::ProductResolver;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParseReport {
    pub drafts: Vec<OrderDraft>,
    pub skipped: Vec<SkippedLine>,
    pub lines_scanned: usize,
}

impl ParseReport {
    pub fn unbalanced_count(&self) -> usize {
        self.drafts.iter().filter(|draft| !draft.is_balanced()).count()
    }

    pub fn low_confidence_count(&self) -> usize {
        self.drafts.iter().map(|draft| draft.low_confidence_items().count()).sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    Orders(ParseReport),
    NoOrdersFound { lines_scanned: usize, skipped: Vec<SkippedLine> },
}

impl ParseOutcome {
    pub fn lines_scanned(&self) -> usize {
        match self {
            Self::Orders(report) => report.lines_scanned,
            Self::NoOrdersFound { lines_scanned, .. } => *lines_scanned,
        }
    }

    pub fn skipped(&self) -> &[SkippedLine] {
        match self {
            Self::Orders(report) => &report.skipped,
            Self::NoOrdersFound { skipped, .. } => skipped,
        }
    }
}

pub struct IntakePipeline {
    aliases: AliasTable,
    catalog: Arc<Catalog>,
    config: IntakeConfig,
    engine: Box<dyn ReconciliationEngine>,
}

impl IntakePipeline {
    pub fn new(aliases: AliasTable, catalog: Arc<Catalog>, config: IntakeConfig) -> Self {
        let engine = Box::new(ProportionalReconciliation::new(config.clone()));
        Self { aliases, catalog, config, engine }
    }

    pub fn from_config(config: &AppConfig, catalog: Arc<Catalog>) -> Self {
        Self::new(config.alias_table(), catalog, config.intake.clone())
    }

    pub fn with_engine(mut self, engine: Box<dyn ReconciliationEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn parse(&self, text: &str, date: NaiveDate) -> ParseOutcome {
        let extraction = LineExtractor::new(self.config.default_payment_method).extract(text);
        let resolver = ProductResolver::new(&self.aliases, self.catalog.as_ref(), &self.config);

        let drafts: Vec<OrderDraft> = extraction
            .candidates
            .into_iter()
            .map(|candidate| self.build_draft(&resolver, candidate, date))
            .collect();

        if drafts.is_empty() {
            warn!(
                event_name = "intake.parse.no_orders",
                lines_scanned = extraction.lines_scanned,
                skipped = extraction.skipped.len(),
                "no order lines recognized in report"
            );
            return ParseOutcome::NoOrdersFound {
                lines_scanned: extraction.lines_scanned,
                skipped: extraction.skipped,
            };
        }

        let report = ParseReport {
            drafts,
            skipped: extraction.skipped,
            lines_scanned: extraction.lines_scanned,
        };
        info!(
            event_name = "intake.parse.completed",
            orders = report.drafts.len(),
            skipped = report.skipped.len(),
            unbalanced = report.unbalanced_count(),
            low_confidence_items = report.low_confidence_count(),
            "report parsed into order drafts"
        );
        ParseOutcome::Orders(report)
    }

    pub fn open_session(&self) -> ReviewSession {
        ReviewSession::new(Arc::clone(&self.catalog), self.config.balance_tolerance)
    }

    fn build_draft(
        &self,
        resolver: &ProductResolver<'_>,
        candidate: CandidateLine,
        date: NaiveDate,
    ) -> OrderDraft {
        let phrases =
            candidate.items_fragment.as_deref().map(parse_item_phrases).unwrap_or_default();
        let stubs = resolver.resolve_all(&phrases);
        let reconciliation = self.engine.reconcile(candidate.reported_total, stubs);

        if !reconciliation.balance.balanced {
            warn!(
                event_name = "intake.reconcile.unbalanced",
                line_number = candidate.line_number,
                diff = %reconciliation.balance.diff,
                "order lines do not add up to the reported total"
            );
        }

        OrderDraft {
            date,
            customer_name: candidate.customer_name,
            customer_phone: candidate.customer_phone,
            order_type: candidate.order_type,
            payment_method: candidate.payment_method,
            status: OrderStatus::default(),
            reported_total: candidate.reported_total,
            note: candidate.note,
            source_line: candidate.source_line,
            items: reconciliation.items,
            balance: reconciliation.balance,
        }
    }
}
