//! Recognizes order-candidate lines in a pasted daily report.
//!
//! Two line shapes are accepted:
//!
//! - slash form: `[✅] Ada / 0803 123 4567 / #5,000 / (2 pancakes) / instagram`
//! - checkmark form: `✅ Janet Johnson---#9,680(2 iced coffee)`
//!
//! Anything else is recorded as a [`SkippedLine`] so the operator can see what was
//! ignored.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::order::{
    money_in_range, round_money, OrderType, PaymentMethod, WALK_IN_CUSTOMER,
};

const MARKER: &str = r"(?:✅|✔️|✔|☑️|☑|✓)";

static SLASH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?:{MARKER}\s*)?(?P<customer>[^/#]*?)\s*/\s*(?:(?P<phone>\+?\d[\d\s().-]{{5,13}}\d)\s*/\s*)?#\s*(?P<amount>\d[\d,.]*)\s*(?:/?\s*\((?P<items>[^)]*)\)\s*)?(?:/\s*(?P<channel>[^/]*?)\s*)?$"
    ))
    .expect("slash line pattern compiles")
});

static CHECKMARK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*{MARKER}\s*(?P<customer>.*?)[\s#\-–—]*#\s*(?P<amount>\d[\d,.]*)\s*(?:\((?P<items>[^)]*)\))?(?P<rest>.*)$"
    ))
    .expect("checkmark line pattern compiles")
});

static SUMMARY_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(total|transfer|balance|summary|(?:gtb|gtbank|zenith|uba|first\s*bank|access\s*bank|moniepoint|kuda|palmpay|wema|fcmb)\b)",
    )
    .expect("summary keyword pattern compiles")
});

static MOBILE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d+])((?:\+?234|0)[789][01](?:[\s-]?\d){8})(?:\D|$)")
        .expect("mobile number pattern compiles")
});

const TAKE_OUT_HINTS: [&str; 4] = ["take out", "takeout", "take-out", "to go"];
const CUSTOMER_TRIM: &[char] = &['-', '–', '—', '#', '/', '|', ':', ',', '.'];

/// Why a non-blank line did not become an order candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    SummaryKeyword(String),
    UnrecognizedFormat,
    InvalidAmount(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    /// 1-based line number within the pasted text.
    pub line_number: usize,
    pub text: String,
    pub reason: SkipReason,
}

/// Header fields pulled from one order-candidate line, before item resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateLine {
    pub line_number: usize,
    pub source_line: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub reported_total: Decimal,
    pub items_fragment: Option<String>,
    pub payment_method: PaymentMethod,
    pub order_type: OrderType,
    pub note: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineScan {
    Blank,
    Candidate(CandidateLine),
    Skipped(SkippedLine),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub candidates: Vec<CandidateLine>,
    pub skipped: Vec<SkippedLine>,
    pub lines_scanned: usize,
}

#[derive(Clone, Debug)]
pub struct LineExtractor {
    default_payment_method: PaymentMethod,
}

impl LineExtractor {
    pub fn new(default_payment_method: PaymentMethod) -> Self {
        Self { default_payment_method }
    }

    pub fn extract(&self, text: &str) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        for (index, line) in text.lines().enumerate() {
            report.lines_scanned += 1;
            match self.scan_line(index + 1, line) {
                LineScan::Blank => {}
                LineScan::Candidate(candidate) => report.candidates.push(candidate),
                LineScan::Skipped(skipped) => {
                    debug!(
                        event_name = "intake.line.skipped",
                        line_number = skipped.line_number,
                        reason = ?skipped.reason,
                        "report line skipped"
                    );
                    report.skipped.push(skipped);
                }
            }
        }

        report
    }

    pub fn scan_line(&self, line_number: usize, line: &str) -> LineScan {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineScan::Blank;
        }

        let skip = |reason| {
            LineScan::Skipped(SkippedLine { line_number, text: trimmed.to_string(), reason })
        };

        if let Some(found) = SUMMARY_KEYWORD.captures(trimmed).and_then(|caps| caps.get(1)) {
            return skip(SkipReason::SummaryKeyword(found.as_str().to_lowercase()));
        }

        let parsed = if let Some(caps) = SLASH_LINE.captures(trimmed) {
            let phone = caps.name("phone").and_then(|m| normalize_phone(m.as_str()));
            let note = caps.name("channel").map(|m| m.as_str().trim().to_string());
            RawFields {
                customer: caps.name("customer").map_or("", |m| m.as_str()).to_string(),
                phone,
                amount: caps.name("amount").map_or("", |m| m.as_str()).to_string(),
                items: caps.name("items").map(|m| m.as_str().to_string()),
                note: note.unwrap_or_default(),
            }
        } else if let Some(caps) = CHECKMARK_LINE.captures(trimmed) {
            let mut customer = caps.name("customer").map_or("", |m| m.as_str()).to_string();
            let phone = MOBILE_NUMBER.captures(trimmed).and_then(|phone_caps| phone_caps.get(1));
            if let Some(token) = phone {
                customer = customer.replace(token.as_str(), " ");
            }
            let note = caps.name("rest").map_or("", |m| trim_separators(m.as_str())).to_string();
            RawFields {
                customer,
                phone: phone.and_then(|token| normalize_phone(token.as_str())),
                amount: caps.name("amount").map_or("", |m| m.as_str()).to_string(),
                items: caps.name("items").map(|m| m.as_str().to_string()),
                note,
            }
        } else {
            return skip(SkipReason::UnrecognizedFormat);
        };

        let Some(reported_total) = parse_amount(&parsed.amount) else {
            return skip(SkipReason::InvalidAmount(parsed.amount));
        };

        LineScan::Candidate(CandidateLine {
            line_number,
            source_line: trimmed.to_string(),
            customer_name: normalize_customer(&parsed.customer),
            customer_phone: parsed.phone,
            reported_total,
            items_fragment: parsed.items.filter(|items| !items.trim().is_empty()),
            payment_method: payment_hint(trimmed, self.default_payment_method),
            order_type: order_type_hint(trimmed),
            note: parsed.note,
        })
    }
}

struct RawFields {
    customer: String,
    phone: Option<String>,
    amount: String,
    items: Option<String>,
    note: String,
}

/// Parses `9,680` style amounts into whole currency units.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim().trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<Decimal>().ok().map(round_money).filter(|amount| money_in_range(*amount))
}

fn trim_separators(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || CUSTOMER_TRIM.contains(&c))
}

pub fn normalize_customer(raw: &str) -> String {
    let trimmed = trim_separators(raw);
    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");

    match collapsed.to_lowercase().as_str() {
        "" | "walk-in" | "walk in" => WALK_IN_CUSTOMER.to_string(),
        _ => collapsed,
    }
}

/// Rewrites local mobile numbers into `+234` form. Returns `None` when no digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let has_plus = raw.trim_start().starts_with('+');
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    let normalized = if digits.len() == 11 && digits.starts_with('0') {
        format!("+234{}", &digits[1..])
    } else if digits.len() == 13 && digits.starts_with("234") {
        format!("+{digits}")
    } else if has_plus {
        format!("+{digits}")
    } else {
        digits
    };

    Some(normalized)
}

pub fn payment_hint(line: &str, default: PaymentMethod) -> PaymentMethod {
    let lowered = line.to_lowercase();
    if lowered.contains("cash") {
        PaymentMethod::Cash
    } else if lowered.contains("pos") {
        PaymentMethod::Pos
    } else if lowered.contains("opay") {
        PaymentMethod::Opay
    } else {
        default
    }
}

pub fn order_type_hint(line: &str) -> OrderType {
    let lowered = line.to_lowercase();
    if TAKE_OUT_HINTS.iter().any(|hint| lowered.contains(hint)) {
        OrderType::TakeOut
    } else {
        OrderType::DineIn
    }
}
