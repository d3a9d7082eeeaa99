//! Time-of-day detection and the policy that stamps it onto resolved dates.

use chrono::{NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

use nudge_core::Confidence;

/// A single time expression, usable inside larger patterns.
pub(crate) const TIME_PATTERN: &str = r"(?:\d{1,2}(?::[0-5]\d)?\s*(?:am|pm)|(?:[01]?\d|2[0-3]):[0-5]\d|noon|midnight|morning|afternoon|evening|tonight)";

/// Month names accepted by the date grammars.
pub(crate) const MONTH_PATTERN: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

const NAMED_PERIODS: &[&str] = &["noon", "midnight", "morning", "afternoon", "evening", "tonight"];

const RELATIVE_TOKENS: &[&str] = &[
    "today", "tomorrow", "next", "this", "mon", "tue", "wed", "thu", "fri", "sat", "sun",
];

static H24_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("valid regex"));

static AMPM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?::([0-5]\d))?\s*(am|pm)\b").expect("valid regex"));

static PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(noon|midnight|morning|afternoon|evening|tonight)\b").expect("valid regex")
});

static NUMERIC_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?\b").expect("valid regex"));

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{1,2}-\d{1,2}\b").expect("valid regex"));

static MONTH_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b(?:{})\b", MONTH_PATTERN)).expect("valid regex"));

/// Whether `text` carries an explicit time: `HH:MM`, `9am`, `9:30 pm` or a
/// named period.
pub fn has_explicit_time(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    H24_RE.is_match(&lowered)
        || AMPM_RE.is_match(&lowered)
        || NAMED_PERIODS.iter().any(|p| lowered.contains(p))
}

/// The time of day stated in `text`.
///
/// 12-hour forms win over 24-hour forms, which win over named periods.
pub fn extract_time_of_day(text: &str) -> Option<NaiveTime> {
    let lowered = text.to_lowercase();

    if let Some(caps) = AMPM_RE.captures(&lowered) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        if hour <= 12 {
            let mut hour = hour % 12;
            if &caps[3] == "pm" {
                hour += 12;
            }
            return NaiveTime::from_hms_opt(hour, minute, 0);
        }
    }

    if let Some(caps) = H24_RE.captures(&lowered) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }

    PERIOD_RE
        .captures(&lowered)
        .and_then(|caps| named_period_time(&caps[1]))
}

/// Fixed clock time for a named period.
pub fn named_period_time(period: &str) -> Option<NaiveTime> {
    let hour = match period {
        "morning" => 9,
        "noon" => 12,
        "afternoon" => 15,
        "evening" => 18,
        "tonight" => 20,
        "midnight" => 0,
        _ => return None,
    };
    NaiveTime::from_hms_opt(hour, 0, 0)
}

/// Stamp the time found in `source` onto `value`.
///
/// Without a time in `source`, the value keeps its own time only when the
/// matched phrase itself carried one; otherwise it drops to midnight, which
/// callers read as an all-day date.
pub fn apply_time_policy(value: NaiveDateTime, source: &str, phrase_has_time: bool) -> NaiveDateTime {
    if let Some(time) = extract_time_of_day(source) {
        return value.date().and_time(time);
    }
    if phrase_has_time {
        return value;
    }
    value.date().and_time(NaiveTime::MIN)
}

pub(crate) fn contains_relative_token(lowered: &str) -> bool {
    RELATIVE_TOKENS.iter().any(|t| lowered.contains(t))
}

pub(crate) fn has_numeric_date(lowered: &str) -> bool {
    NUMERIC_DATE_RE.is_match(lowered)
}

/// Heuristic confidence for a phrase resolved by the general parser.
///
/// An explicit date, or a relative keyword together with an explicit time,
/// is high. A relative keyword alone is medium. Anything else is low.
pub fn estimate_confidence(text: &str) -> Confidence {
    let lowered = text.trim().to_lowercase();
    let explicit_date = has_numeric_date(&lowered)
        || ISO_DATE_RE.is_match(&lowered)
        || MONTH_NAME_RE.is_match(&lowered);
    let relative = contains_relative_token(&lowered);

    if explicit_date || (relative && has_explicit_time(&lowered)) {
        Confidence::High
    } else if relative {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}
