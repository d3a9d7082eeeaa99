use regex::Regex;
use std::sync::LazyLock;

/// Common misspellings rewritten before any date matching.
static TYPOS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\btomrrow\b", "tomorrow"),
        (r"(?i)\btmrrow\b", "tomorrow"),
        (r"(?i)\btommorow\b", "tomorrow"),
        (r"(?i)\btommorrow\b", "tomorrow"),
        (r"(?i)\bthur\b", "thu"),
        (r"(?i)\bthurday\b", "thursday"),
        (r"(?i)\btmr\b", "tomorrow"),
    ]
    .into_iter()
    .map(|(pat, rep)| (Regex::new(pat).expect("Invalid typo regex"), rep))
    .collect()
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Trim, collapse whitespace and fix known typos.
pub fn normalize_typos(text: &str) -> String {
    let mut out = WHITESPACE.replace_all(text.trim(), " ").into_owned();
    for (re, replacement) in TYPOS.iter() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    out
}
