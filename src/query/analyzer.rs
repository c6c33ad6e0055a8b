//! Query analyzer (C8): classifies a question's intent and derives the
//! temporal window an answer should be filtered against.
//!
//! Mirrors the teacher's `LlmOrcClient`/`MockClient` split
//! (`src/llm_orc.rs`): a `RuleBasedAnalyzer` is the oracle and is always
//! present; an optional `LlmBackedAnalyzer` wraps any async client and
//! falls back to the rule engine on error or timeout.

use crate::keywords::extract_keywords;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::time::Duration as StdDuration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("llm analyzer error: {0}")]
    Client(String),
    #[error("llm analyzer timed out")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Temporal,
    Structural,
    Mixed,
}

#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// The analyzer's contract output: intent classification plus everything
/// the selector and query-tree builder need to apply temporal filtering.
#[derive(Debug, Clone)]
pub struct Plan {
    pub intent: Intent,
    pub confidence: f32,
    pub reference_timestamp: Option<NaiveDateTime>,
    pub window: Option<Window>,
    pub temporal_factor: f32,
    pub moment_of_query: NaiveDateTime,
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap())
}

/// A window-derivation category, matched against the question text in
/// priority order (ADR-008 §2's window derivation list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Yesterday,
    Today,
    Tomorrow,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
}

const BUCKET_PHRASES: &[(&str, Bucket)] = &[
    ("ayer", Bucket::Yesterday),
    ("hoy", Bucket::Today),
    ("mañana", Bucket::Tomorrow),
    ("manana", Bucket::Tomorrow),
    ("esta semana", Bucket::ThisWeek),
    ("semana pasada", Bucket::LastWeek),
    ("semana anterior", Bucket::LastWeek),
    ("este mes", Bucket::ThisMonth),
    ("mes pasado", Bucket::LastMonth),
];

fn find_bucket(lower: &str) -> Option<Bucket> {
    BUCKET_PHRASES.iter().find(|(phrase, _)| lower.contains(phrase)).map(|(_, b)| *b)
}

/// A day-aligned window is closed (`[start, end]`): `end` is the last
/// second of the included range, not midnight of the following day.
fn last_second_before(boundary: NaiveDateTime) -> NaiveDateTime {
    boundary - Duration::seconds(1)
}

fn bucket_window(bucket: Bucket, now: NaiveDateTime) -> (Window, NaiveDateTime, f32) {
    let today = midnight(now.date());
    match bucket {
        Bucket::Yesterday => {
            let start = today - Duration::days(1);
            (Window { start, end: last_second_before(today) }, start, 1.5)
        }
        Bucket::Today => {
            (Window { start: today, end: last_second_before(today + Duration::days(1)) }, today, 2.0)
        }
        Bucket::Tomorrow => {
            let start = today + Duration::days(1);
            (Window { start, end: last_second_before(start + Duration::days(1)) }, start, 1.5)
        }
        Bucket::ThisWeek => {
            let monday = today - Duration::days(now.date().weekday().num_days_from_monday() as i64);
            (Window { start: monday, end: last_second_before(monday + Duration::days(7)) }, monday, 1.2)
        }
        Bucket::LastWeek => {
            let monday = today - Duration::days(now.date().weekday().num_days_from_monday() as i64);
            let start = monday - Duration::days(7);
            (Window { start, end: last_second_before(monday) }, start, 1.2)
        }
        Bucket::ThisMonth => {
            let start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap();
            let end = next_month_start(start);
            (Window { start: midnight(start), end: last_second_before(midnight(end)) }, midnight(start), 1.2)
        }
        Bucket::LastMonth => {
            let this_month_start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap();
            let start = previous_month_start(this_month_start);
            (Window { start: midnight(start), end: last_second_before(midnight(this_month_start)) }, midnight(start), 1.2)
        }
    }
}

fn next_month_start(date: NaiveDate) -> NaiveDate {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1).unwrap()
    }
}

fn previous_month_start(date: NaiveDate) -> NaiveDate {
    if date.month() == 1 {
        NaiveDate::from_ymd_opt(date.year() - 1, 12, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() - 1, 1).unwrap()
    }
}

/// Decide intent, window, and `temporal_factor` from the question's plain
/// text. Numeric/relative references with no explicit bucket phrase (e.g.
/// "en 3 dias", "hace 2 semanas", "los ultimos 5 dias") fall through to a
/// generic reference-point window: `Expression`-kind matches are treated as
/// a "strong" single-point reference (`ref ± 1 day`), `Range`-kind matches
/// (an explicit multi-day span) as "medium" (`ref ± 3 days`).
fn classify(question: &str, now: NaiveDateTime, alpha: f32) -> (Intent, f32, Option<NaiveDateTime>, Option<Window>, f32) {
    let lower = question.to_lowercase();

    if let Some(bucket) = find_bucket(&lower) {
        let (window, reference, factor_multiplier) = bucket_window(bucket, now);
        let confidence = dominance_confidence(question, true);
        let intent = if confidence >= 0.8 { Intent::Temporal } else { Intent::Mixed };
        return (intent, confidence, Some(reference), Some(window), alpha * factor_multiplier);
    }

    let refs = crate::temporal::extract_references(question, now);
    if let Some(r) = refs.iter().find(|r| {
        matches!(r.kind, crate::temporal::ReferenceKind::ExactDate | crate::temporal::ReferenceKind::DayOfWeek)
    }) {
        let day_start = midnight(r.resolved.date());
        let window = Window { start: day_start, end: last_second_before(day_start + Duration::days(1)) };
        let confidence = dominance_confidence(question, true);
        let intent = if confidence >= 0.8 { Intent::Temporal } else { Intent::Mixed };
        return (intent, confidence, Some(r.resolved), Some(window), alpha);
    }

    if let Some(r) = refs.iter().find(|r| r.kind == crate::temporal::ReferenceKind::Expression) {
        let window = Window { start: r.resolved - Duration::days(1), end: r.resolved + Duration::days(1) };
        let confidence = dominance_confidence(question, false);
        let intent = if confidence >= 0.8 { Intent::Temporal } else { Intent::Mixed };
        return (intent, confidence, Some(r.resolved), Some(window), alpha);
    }
    if let Some(r) = refs.iter().find(|r| r.kind == crate::temporal::ReferenceKind::Range) {
        let window = Window { start: r.resolved - Duration::days(3), end: r.resolved + Duration::days(3) };
        let confidence = dominance_confidence(question, false);
        let intent = if confidence >= 0.8 { Intent::Temporal } else { Intent::Mixed };
        return (intent, confidence, Some(r.resolved), Some(window), alpha);
    }
    if let Some(r) = refs.first() {
        let window = Window { start: r.resolved - Duration::days(1), end: r.resolved + Duration::days(1) };
        let confidence = dominance_confidence(question, true);
        let intent = if confidence >= 0.8 { Intent::Temporal } else { Intent::Mixed };
        return (intent, confidence, Some(r.resolved), Some(window), alpha);
    }

    (Intent::Structural, 1.0, None, None, alpha)
}

/// Heuristic for how much the time expression "dominates" a question: a
/// strong (explicit) marker in a short, keyword-light question scores high;
/// a weak marker or a question packed with unrelated conceptual keywords
/// scores low enough to flip to MIXED (ADR-008 §3: "a date appears inside
/// an otherwise conceptual question" should not be classified TEMPORAL).
fn dominance_confidence(question: &str, strong_marker: bool) -> f32 {
    let keyword_count = extract_keywords(question).len();
    let base = if strong_marker { 0.95 } else { 0.7 };
    if keyword_count > 4 {
        (base - 0.2).max(0.5)
    } else {
        base
    }
}

#[async_trait]
pub trait QueryAnalyzer: Send + Sync {
    async fn analyze(&self, question: &str, now: NaiveDateTime, alpha: f32) -> Plan;
}

#[derive(Default)]
pub struct RuleBasedAnalyzer;

#[async_trait]
impl QueryAnalyzer for RuleBasedAnalyzer {
    async fn analyze(&self, question: &str, now: NaiveDateTime, alpha: f32) -> Plan {
        let (intent, confidence, reference_timestamp, window, temporal_factor) = classify(question, now, alpha);
        Plan { intent, confidence, reference_timestamp, window, temporal_factor, moment_of_query: now }
    }
}

/// A backend capable of emulating the rule table above via an LLM prompt.
/// The rules in `classify` are the oracle such a backend must be prompted
/// to reproduce.
#[async_trait]
pub trait TemporalIntentClient: Send + Sync {
    async fn infer(&self, question: &str, now: NaiveDateTime, alpha: f32) -> Result<Plan, AnalyzerError>;
}

/// Wraps a `TemporalIntentClient`, falling back to `RuleBasedAnalyzer` on
/// error or timeout so the analyzer never blocks a query on a flaky or slow
/// backend.
pub struct LlmBackedAnalyzer<C: TemporalIntentClient> {
    client: C,
    fallback: RuleBasedAnalyzer,
    timeout: StdDuration,
}

impl<C: TemporalIntentClient> LlmBackedAnalyzer<C> {
    pub fn new(client: C, timeout: StdDuration) -> Self {
        Self { client, fallback: RuleBasedAnalyzer, timeout }
    }
}

#[async_trait]
impl<C: TemporalIntentClient> QueryAnalyzer for LlmBackedAnalyzer<C> {
    async fn analyze(&self, question: &str, now: NaiveDateTime, alpha: f32) -> Plan {
        match tokio::time::timeout(self.timeout, self.client.infer(question, now, alpha)).await {
            Ok(Ok(plan)) => plan,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "llm temporal intent client errored, falling back to rule-based analyzer");
                self.fallback.analyze(question, now, alpha).await
            }
            Err(_) => {
                tracing::warn!("llm temporal intent client timed out, falling back to rule-based analyzer");
                self.fallback.analyze(question, now, alpha).await
            }
        }
    }
}
