//! Rule-based text to datetime resolution.
//!
//! Strategies run in a fixed order and the first hit wins: explicit calendar
//! dates, relative day phrases, the phrase grammar over the whole input, and
//! finally a scored scan for date-like spans.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;

use nudge_core::{Confidence, DueAt};

use crate::grammar::{self, Candidate, PhraseValue};
use crate::normalize::normalize_typos;
use crate::time_of_day::{
    apply_time_policy, contains_relative_token, estimate_confidence, has_explicit_time,
    has_numeric_date,
};

/// Which layer produced a [`ParseResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    Empty,
    Explicit,
    Relative,
    Direct,
    Search,
    LlmFallback,
    None,
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseStrategy::Empty => write!(f, "empty"),
            ParseStrategy::Explicit => write!(f, "explicit"),
            ParseStrategy::Relative => write!(f, "relative"),
            ParseStrategy::Direct => write!(f, "direct"),
            ParseStrategy::Search => write!(f, "search"),
            ParseStrategy::LlmFallback => write!(f, "llm_fallback"),
            ParseStrategy::None => write!(f, "none"),
        }
    }
}

/// Outcome of resolving a piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub value: Option<DateTime<Tz>>,
    pub confidence: Confidence,
    /// The part of the (typo-normalized) input the value came from. Callers
    /// remove it from free text to isolate a title.
    pub matched_span: String,
    pub strategy: ParseStrategy,
}

impl ParseResult {
    pub fn unresolved(strategy: ParseStrategy) -> Self {
        Self {
            value: None,
            confidence: Confidence::Low,
            matched_span: String::new(),
            strategy,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    pub fn due_at(&self) -> DueAt {
        self.value
            .as_ref()
            .map(DueAt::from_zoned)
            .unwrap_or(DueAt::NONE)
    }
}

static SIMPLE_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(later today|today|tomorrow|tmrw|tonight)\b").expect("valid regex")
});

static DIGITS_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("valid regex"));

/// Resolve `text` in `tz` relative to `now`. Never fails: an unparseable
/// input yields a low-confidence result with no value.
pub fn resolve(text: &str, tz: Tz, now: DateTime<Utc>) -> ParseResult {
    let text = normalize_typos(text);
    if text.is_empty() {
        return ParseResult::unresolved(ParseStrategy::Empty);
    }
    let now_local = now.with_timezone(&tz).naive_local();

    if let Some(found) = explicit_date(&text, now_local) {
        let at = apply_time_policy(found.value.at, &text, found.value.has_time);
        return finish(tz, at, Confidence::High, &text[found.span], ParseStrategy::Explicit);
    }

    if let Some(found) = relative_day_phrase(&text, now_local) {
        let at = apply_time_policy(found.value.at, &text, has_explicit_time(&text));
        let confidence = if has_explicit_time(&text) {
            Confidence::High
        } else {
            Confidence::Medium
        };
        return finish(tz, at, confidence, &text[found.span], ParseStrategy::Relative);
    }

    if let Some(value) = grammar::parse_phrase(&text, now_local) {
        let at = apply_time_policy(value.at, &text, value.has_time || has_explicit_time(&text));
        return finish(tz, at, estimate_confidence(&text), &text, ParseStrategy::Direct);
    }

    if let Some(found) = best_search_span(&text, now_local) {
        let phrase = &text[found.span];
        let phrase_has_time = found.value.has_time || has_explicit_time(phrase);
        let at = apply_time_policy(found.value.at, &text, phrase_has_time);
        return finish(tz, at, estimate_confidence(phrase), phrase, ParseStrategy::Search);
    }

    ParseResult::unresolved(ParseStrategy::None)
}

fn finish(
    tz: Tz,
    at: NaiveDateTime,
    confidence: Confidence,
    span: &str,
    strategy: ParseStrategy,
) -> ParseResult {
    match localize(tz, at) {
        Some(value) => ParseResult {
            value: Some(value),
            confidence,
            matched_span: span.trim().to_string(),
            strategy,
        },
        None => ParseResult::unresolved(ParseStrategy::None),
    }
}

/// Attach `tz` to a wall-clock value. A time skipped by a DST jump moves
/// forward an hour; an ambiguous one takes the earlier instant. Values
/// outside the storable year range do not resolve.
pub fn localize(tz: Tz, at: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&at)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(at + Duration::hours(1))).earliest())
        .filter(|value| DueAt::is_storable_instant(&value.with_timezone(&Utc)))
}

/// The earliest explicit date that is not more than a day in the past.
fn explicit_date(text: &str, now: NaiveDateTime) -> Option<Candidate> {
    let floor = now - Duration::days(1);
    grammar::explicit_candidates(text, now)
        .into_iter()
        .filter(|c| c.value.at >= floor)
        .min_by_key(|c| (c.value.at, c.span.start))
}

/// "today" / "tomorrow" / "tonight" leading the text, or a weekday phrase
/// anywhere in it.
fn relative_day_phrase(text: &str, now: NaiveDateTime) -> Option<Candidate> {
    if let Some(m) = SIMPLE_DAY_RE.find(text) {
        let today = now.date();
        let value = match m.as_str().to_lowercase().as_str() {
            "tomorrow" | "tmrw" => PhraseValue {
                at: (today + Duration::days(1)).and_hms_opt(9, 0, 0)?,
                has_time: false,
            },
            "tonight" => PhraseValue {
                at: today.and_hms_opt(20, 0, 0)?,
                has_time: false,
            },
            _ => PhraseValue {
                at: today.and_hms_opt(18, 0, 0)?,
                has_time: false,
            },
        };
        return Some(Candidate {
            span: grammar::extend_with_time(text, m.range()),
            value,
        });
    }
    grammar::weekday_candidate(text, now)
}

/// Score each date-like span: +3 explicit time, +3 relative keyword, +2
/// numeric date. Purely numeric spans are ignored; ties keep the earlier span.
fn best_search_span(text: &str, now: NaiveDateTime) -> Option<Candidate> {
    let mut best: Option<(u32, Candidate)> = None;
    for candidate in grammar::search_candidates(text, now) {
        let phrase = text[candidate.span.clone()].trim().to_lowercase();
        if phrase.is_empty() || DIGITS_ONLY_RE.is_match(&phrase) {
            continue;
        }
        let mut score = 0;
        if has_explicit_time(&phrase) {
            score += 3;
        }
        if contains_relative_token(&phrase) {
            score += 3;
        }
        if has_numeric_date(&phrase) {
            score += 2;
        }
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, c)| c)
}
