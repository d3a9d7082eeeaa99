//! Phrase grammar for natural-language dates.
//!
//! Each grammar is a regex plus a builder that turns its captures into a
//! local wall-clock value relative to "now". Grammars are matched either
//! against a whole phrase (anchored) or scanned for inside longer text.
//! All regexes are case-insensitive and run on the caller's text so that
//! match offsets map back onto it.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use regex::{Captures, Regex};

use crate::time_of_day::{extract_time_of_day, MONTH_PATTERN, TIME_PATTERN};

/// A resolved local wall-clock value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseValue {
    pub at: NaiveDateTime,
    /// The phrase itself pinned a time of day.
    pub has_time: bool,
}

impl PhraseValue {
    fn on(date: NaiveDate) -> Self {
        Self::at_hour(date, 0)
    }

    fn at_hour(date: NaiveDate, hour: u32) -> Self {
        Self {
            at: date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)),
            has_time: false,
        }
    }

    fn timed(at: NaiveDateTime) -> Self {
        Self { at, has_time: true }
    }
}

/// A grammar match inside a longer text.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub span: Range<usize>,
    pub value: PhraseValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrammarKind {
    IsoDate,
    MonthDay,
    DayMonth,
    NumericDate,
    DayWord,
    Weekday,
    InAmount,
    AmountFromNow,
    NextPeriod,
    TimeOnly,
}

impl GrammarKind {
    const ALL: [GrammarKind; 10] = [
        GrammarKind::IsoDate,
        GrammarKind::MonthDay,
        GrammarKind::DayMonth,
        GrammarKind::NumericDate,
        GrammarKind::DayWord,
        GrammarKind::Weekday,
        GrammarKind::InAmount,
        GrammarKind::AmountFromNow,
        GrammarKind::NextPeriod,
        GrammarKind::TimeOnly,
    ];

    /// Grammars that name a calendar date outright.
    fn is_explicit(self) -> bool {
        matches!(
            self,
            GrammarKind::IsoDate
                | GrammarKind::MonthDay
                | GrammarKind::DayMonth
                | GrammarKind::NumericDate
        )
    }

    fn pattern(self) -> String {
        const NUMBER: &str =
            r"\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve";
        const UNIT: &str = r"minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?";
        match self {
            GrammarKind::IsoDate => r"(?P<y>\d{4})-(?P<m>\d{1,2})-(?P<d>\d{1,2})".to_string(),
            GrammarKind::MonthDay => format!(
                r"(?P<mon>{MONTH_PATTERN})\.?\s+(?P<d>\d{{1,2}})(?:st|nd|rd|th)?(?:,?\s+(?P<y>\d{{4}}))?"
            ),
            GrammarKind::DayMonth => format!(
                r"(?P<d>\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?(?P<mon>{MONTH_PATTERN})\.?(?:,?\s+(?P<y>\d{{4}}))?"
            ),
            GrammarKind::NumericDate => {
                r"(?P<d>\d{1,2})[/-](?P<m>\d{1,2})(?:[/-](?P<y>\d{2,4}))?".to_string()
            }
            GrammarKind::DayWord => {
                r"(?P<word>day after tomorrow|later today|today|tonight|tomorrow|tmrw|yesterday)"
                    .to_string()
            }
            GrammarKind::Weekday => WEEKDAY_PATTERN.to_string(),
            GrammarKind::InAmount => format!(r"in\s+(?P<n>{NUMBER})\s+(?P<unit>{UNIT})"),
            GrammarKind::AmountFromNow => {
                format!(r"(?P<n>{NUMBER})\s+(?P<unit>{UNIT})\s+(?:from\s+now|later)")
            }
            GrammarKind::NextPeriod => r"(?P<q>next|this)\s+(?P<unit>week|month|year)".to_string(),
            GrammarKind::TimeOnly => TIME_PATTERN.to_string(),
        }
    }
}

pub(crate) const WEEKDAY_PATTERN: &str = r"(?:(?P<q>next|this|coming|upcoming)\s+)?(?P<wd>mon(?:day)?|tue(?:s|sday)?|wed(?:nesday)?|thu(?:r|rs|rsday)?|fri(?:day)?|sat(?:urday)?|sun(?:day)?)";

struct Grammar {
    kind: GrammarKind,
    anchored: Regex,
    search: Regex,
}

static GRAMMARS: LazyLock<Vec<Grammar>> = LazyLock::new(|| {
    GrammarKind::ALL
        .iter()
        .map(|&kind| {
            let pattern = kind.pattern();
            Grammar {
                kind,
                anchored: Regex::new(&format!(r"(?i)^(?:{pattern})$"))
                    .expect("Invalid date grammar"),
                search: Regex::new(&format!(r"(?i)\b(?:{pattern})\b"))
                    .expect("Invalid date grammar"),
            }
        })
        .collect()
});

static TRAILING_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^\s*(?:at\s+|@\s*)?(?:{TIME_PATTERN})\b")).expect("valid regex")
});

static LEADING_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{TIME_PATTERN})\s+(?:on\s+)?$")).expect("valid regex")
});

static STRIP_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:\bat\s+|@\s*)?\b(?:{TIME_PATTERN})\b")).expect("valid regex")
});

static CONNECTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:on|by|due|before|until|at)\s+").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

// =============================================================================
// Entry points
// =============================================================================

/// Parse `text` as one complete date phrase.
///
/// Time tokens and leading connectors ("on", "by", ...) are set aside before
/// the date part is matched; the caller applies the time-of-day policy. A
/// phrase that is only a time resolves to today, or tomorrow when that time
/// has already passed.
pub fn parse_phrase(text: &str, now: NaiveDateTime) -> Option<PhraseValue> {
    let without_time = STRIP_TIME_RE.replace_all(text, " ");
    let collapsed = WHITESPACE_RE.replace_all(without_time.trim(), " ");
    let residue = CONNECTOR_RE
        .replace(&collapsed, "")
        .trim_matches(|c: char| c.is_whitespace() || ",.;!?".contains(c))
        .to_string();

    if residue.is_empty() {
        return extract_time_of_day(text).map(|time| time_today_or_tomorrow(time, now));
    }

    GRAMMARS
        .iter()
        .filter(|g| g.kind != GrammarKind::TimeOnly)
        .find_map(|g| {
            let caps = g.anchored.captures(&residue)?;
            build(g.kind, &caps, now)
        })
}

/// Every explicit calendar date (month-name or numeric form) found in `text`.
pub(crate) fn explicit_candidates(text: &str, now: NaiveDateTime) -> Vec<Candidate> {
    collect(text, now, |kind| kind.is_explicit())
}

/// Every date-like span found anywhere in `text`, ordered by position.
pub(crate) fn search_candidates(text: &str, now: NaiveDateTime) -> Vec<Candidate> {
    let mut found = collect(text, now, |_| true);
    found.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(b.span.len().cmp(&a.span.len()))
    });
    found
}

/// The first weekday phrase in `text`, with its optional qualifier.
pub(crate) fn weekday_candidate(text: &str, now: NaiveDateTime) -> Option<Candidate> {
    let grammar = GRAMMARS.iter().find(|g| g.kind == GrammarKind::Weekday)?;
    let caps = grammar.search.captures(text)?;
    let whole = caps.get(0)?;
    let value = build(GrammarKind::Weekday, &caps, now)?;
    Some(Candidate {
        span: extend_with_time(text, whole.range()),
        value,
    })
}

/// Widen `span` to swallow a time expression directly before or after it.
pub(crate) fn extend_with_time(text: &str, span: Range<usize>) -> Range<usize> {
    let mut span = span;
    if let Some(m) = TRAILING_TIME_RE.find(&text[span.end..]) {
        span.end += m.end();
    }
    if let Some(m) = LEADING_TIME_RE.find(&text[..span.start]) {
        span.start = m.start();
    }
    span
}

fn collect(
    text: &str,
    now: NaiveDateTime,
    include: impl Fn(GrammarKind) -> bool,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    for grammar in GRAMMARS.iter().filter(|g| include(g.kind)) {
        for caps in grammar.search.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(value) = build(grammar.kind, &caps, now) else {
                continue;
            };
            let span = if grammar.kind == GrammarKind::TimeOnly {
                whole.range()
            } else {
                extend_with_time(text, whole.range())
            };
            out.push(Candidate { span, value });
        }
    }
    out
}

// =============================================================================
// Builders
// =============================================================================

fn build(kind: GrammarKind, caps: &Captures, now: NaiveDateTime) -> Option<PhraseValue> {
    let today = now.date();
    match kind {
        GrammarKind::IsoDate => {
            let date = NaiveDate::from_ymd_opt(
                number(caps, "y")? as i32,
                number(caps, "m")?,
                number(caps, "d")?,
            )?;
            Some(PhraseValue::on(date))
        }
        GrammarKind::MonthDay | GrammarKind::DayMonth => {
            let month = month_number(caps.name("mon")?.as_str())?;
            let day = number(caps, "d")?;
            dated(month, day, number(caps, "y"), today)
        }
        GrammarKind::NumericDate => {
            let day = number(caps, "d")?;
            let month = number(caps, "m")?;
            let year = number(caps, "y").map(|y| if y < 100 { y + 2000 } else { y });
            // Day-first; a second number above 12 only reads month-first.
            dated(month, day, year, today).or_else(|| {
                if day <= 12 && month > 12 {
                    dated(day, month, year, today)
                } else {
                    None
                }
            })
        }
        GrammarKind::DayWord => day_word(&caps["word"].to_lowercase(), today),
        GrammarKind::Weekday => {
            let target = weekday_from_name(&caps["wd"])?;
            let qualifier = caps.name("q").map(|q| q.as_str().to_lowercase());
            let days = weekday_offset(today.weekday(), target, qualifier.as_deref());
            Some(PhraseValue::at_hour(today + Duration::days(days), 9))
        }
        GrammarKind::InAmount | GrammarKind::AmountFromNow => {
            let amount = parse_english_number(&caps["n"])?;
            shift(now, amount, &caps["unit"].to_lowercase())
        }
        GrammarKind::NextPeriod => {
            let qualifier = caps["q"].to_lowercase();
            if qualifier == "this" {
                return Some(PhraseValue::on(today));
            }
            let date = match caps["unit"].to_lowercase().as_str() {
                "week" => today + Duration::days(7),
                "month" => today.checked_add_months(Months::new(1))?,
                _ => today.checked_add_months(Months::new(12))?,
            };
            Some(PhraseValue::on(date))
        }
        GrammarKind::TimeOnly => {
            extract_time_of_day(caps.get(0)?.as_str()).map(|t| time_today_or_tomorrow(t, now))
        }
    }
}

fn number(caps: &Captures, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

/// A calendar date; without a year the next occurrence from `today` is used.
fn dated(month: u32, day: u32, year: Option<u32>, today: NaiveDate) -> Option<PhraseValue> {
    if let Some(year) = year {
        return NaiveDate::from_ymd_opt(year as i32, month, day).map(PhraseValue::on);
    }
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
    match this_year {
        Some(date) if date >= today => Some(PhraseValue::on(date)),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day).map(PhraseValue::on),
    }
}

fn day_word(word: &str, today: NaiveDate) -> Option<PhraseValue> {
    let value = match word {
        "today" | "later today" => PhraseValue::at_hour(today, 18),
        "tonight" => PhraseValue {
            has_time: true,
            ..PhraseValue::at_hour(today, 20)
        },
        "tomorrow" | "tmrw" => PhraseValue::at_hour(today + Duration::days(1), 9),
        "day after tomorrow" => PhraseValue::at_hour(today + Duration::days(2), 9),
        "yesterday" => PhraseValue::at_hour(today - Duration::days(1), 9),
        _ => return None,
    };
    Some(value)
}

fn shift(now: NaiveDateTime, amount: u32, unit: &str) -> Option<PhraseValue> {
    let now = now.with_second(0)?.with_nanosecond(0)?;
    let amount_i = i64::from(amount);
    let value = if unit.starts_with("min") {
        PhraseValue::timed(now.checked_add_signed(Duration::try_minutes(amount_i)?)?)
    } else if unit.starts_with('h') {
        PhraseValue::timed(now.checked_add_signed(Duration::try_hours(amount_i)?)?)
    } else if unit.starts_with('d') {
        PhraseValue::on(now.checked_add_signed(Duration::try_days(amount_i)?)?.date())
    } else if unit.starts_with('w') {
        PhraseValue::on(now.checked_add_signed(Duration::try_weeks(amount_i)?)?.date())
    } else if unit.starts_with("mo") {
        PhraseValue::on(now.date().checked_add_months(Months::new(amount))?)
    } else {
        PhraseValue::on(now.date().checked_add_months(Months::new(amount.checked_mul(12)?))?)
    };
    Some(value)
}

fn time_today_or_tomorrow(time: NaiveTime, now: NaiveDateTime) -> PhraseValue {
    let today = now.date().and_time(time);
    if today > now {
        PhraseValue::timed(today)
    } else {
        PhraseValue::timed(today + Duration::days(1))
    }
}

/// Days from `today` to the `target` weekday.
///
/// The naive distance treats the same weekday as a week away. "next" means
/// the occurrence in the following Monday-start week, so it adds a full week
/// whenever the target still lies ahead in the current week.
pub fn weekday_offset(today: Weekday, target: Weekday, qualifier: Option<&str>) -> i64 {
    let today_idx = today.num_days_from_monday() as i64;
    let target_idx = target.num_days_from_monday() as i64;
    let mut days = (target_idx - today_idx).rem_euclid(7);
    if days == 0 {
        days = 7;
    }
    if qualifier == Some("next") && target_idx > today_idx {
        days += 7;
    }
    days
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    let lower = name.to_lowercase();
    match lower.get(..3)? {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn parse_english_number(s: &str) -> Option<u32> {
    match s.to_lowercase().as_str() {
        "a" | "an" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        "eleven" => Some(11),
        "twelve" => Some(12),
        other => other.parse::<u32>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Saturday 2026-02-21 10:00.
    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 21)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekday_offset_rules() {
        // Unqualified same weekday rolls a full week.
        assert_eq!(weekday_offset(Weekday::Sat, Weekday::Sat, None), 7);
        assert_eq!(weekday_offset(Weekday::Sat, Weekday::Fri, None), 6);
        // "next" on a weekday still ahead this week skips to the following week.
        assert_eq!(weekday_offset(Weekday::Mon, Weekday::Fri, None), 4);
        assert_eq!(weekday_offset(Weekday::Mon, Weekday::Fri, Some("next")), 11);
        // "next" on a weekday already passed lands in next week without extra days.
        assert_eq!(weekday_offset(Weekday::Sat, Weekday::Fri, Some("next")), 6);
        assert_eq!(weekday_offset(Weekday::Mon, Weekday::Mon, Some("next")), 7);
        assert_eq!(weekday_offset(Weekday::Mon, Weekday::Fri, Some("this")), 4);
    }

    #[test]
    fn test_parse_phrase_iso_and_named_dates() {
        assert_eq!(parse_phrase("2026-03-17", now()).unwrap().at.date(), date(2026, 3, 17));
        assert_eq!(parse_phrase("March 5th", now()).unwrap().at.date(), date(2026, 3, 5));
        assert_eq!(parse_phrase("on 5 mar 2027", now()).unwrap().at.date(), date(2027, 3, 5));
        // Already passed this year: next year.
        assert_eq!(parse_phrase("jan 3", now()).unwrap().at.date(), date(2027, 1, 3));
    }

    #[test]
    fn test_parse_phrase_numeric_is_day_first() {
        assert_eq!(parse_phrase("03/04", now()).unwrap().at.date(), date(2026, 4, 3));
        assert_eq!(parse_phrase("3-4-27", now()).unwrap().at.date(), date(2027, 4, 3));
        assert!(parse_phrase("31/02", now()).is_none());
        assert_eq!(parse_phrase("3/15", now()).unwrap().at.date(), date(2026, 3, 15));
        assert_eq!(parse_phrase("12/25/26", now()).unwrap().at.date(), date(2026, 12, 25));
        assert!(parse_phrase("13/13", now()).is_none());
    }

    #[test]
    fn test_parse_phrase_relative_amounts() {
        assert_eq!(parse_phrase("in 3 days", now()).unwrap().at.date(), date(2026, 2, 24));
        assert_eq!(parse_phrase("in two weeks", now()).unwrap().at.date(), date(2026, 3, 7));
        assert_eq!(parse_phrase("next month", now()).unwrap().at.date(), date(2026, 3, 21));
        assert_eq!(parse_phrase("next week", now()).unwrap().at.date(), date(2026, 2, 28));
        assert_eq!(parse_phrase("5 days from now", now()).unwrap().at.date(), date(2026, 2, 26));

        let hour = parse_phrase("in an hour", now()).unwrap();
        assert!(hour.has_time);
        assert_eq!(hour.at, now() + Duration::hours(1));
    }

    #[test]
    fn test_parse_phrase_time_only_rolls_forward() {
        let later = parse_phrase("5pm", now()).unwrap();
        assert_eq!(later.at, date(2026, 2, 21).and_hms_opt(17, 0, 0).unwrap());
        let earlier = parse_phrase("at 8am", now()).unwrap();
        assert_eq!(earlier.at, date(2026, 2, 22).and_hms_opt(8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_phrase_with_time_and_connector() {
        let value = parse_phrase("by day after tomorrow at 14:00", now()).unwrap();
        assert_eq!(value.at.date(), date(2026, 2, 23));
    }

    #[test]
    fn test_parse_phrase_rejects_prose() {
        assert!(parse_phrase("buy milk", now()).is_none());
        assert!(parse_phrase("", now()).is_none());
    }

    #[test]
    fn test_search_candidates_spans() {
        let text = "Call mom tomorrow 9am about the trip";
        let found = search_candidates(text, now());
        let spans: Vec<&str> = found.iter().map(|c| &text[c.span.clone()]).collect();
        assert!(spans.contains(&"tomorrow 9am"));
        assert!(spans.contains(&"9am"));
    }

    #[test]
    fn test_explicit_candidates_with_trailing_time() {
        let text = "Dentist 21 Mar at 3pm, or 4/04";
        let found = explicit_candidates(text, now());
        let spans: Vec<&str> = found.iter().map(|c| &text[c.span.clone()]).collect();
        assert!(spans.contains(&"21 Mar at 3pm"));
        assert!(spans.contains(&"4/04"));
    }

    #[test]
    fn test_weekday_candidate() {
        let text = "team sync next friday 3pm";
        let found = weekday_candidate(text, now()).unwrap();
        assert_eq!(&text[found.span.clone()], "next friday 3pm");
        assert_eq!(found.value.at.date(), date(2026, 2, 27));
        assert!(weekday_candidate("monthly report", now()).is_none());
    }
}
