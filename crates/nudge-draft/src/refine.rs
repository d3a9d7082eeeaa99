//! Post-processing that makes model drafts usable: link recovery, generic
//! title rewriting and topic grounding.

use std::sync::LazyLock;

use regex::Regex;

use nudge_core::Confidence;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

static VALID_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://\S+$").expect("valid regex"));

static GENERIC_TITLE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(write|send)\s+email\b",
        r"^follow\s*-?up\b",
        r"^(check|review|do|complete|finish|handle)\b",
        r"^(task|reminder)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid generic title regex"))
    .collect()
});

static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:on|about|for|regarding)\s+([^.;\n]+)").expect("valid regex")
});

static SUBJECT_STOP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+\b(?:by|before|due|at|on)\b").expect("valid regex"));

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(the|a|an)\s+").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static TOKEN_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// First http(s) URL in `text`, without trailing punctuation.
pub fn extract_first_url(text: &str) -> Option<String> {
    URL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches([')', '.', ',', ']']).to_string())
        .filter(|url| !url.is_empty())
}

pub fn is_valid_link(value: &str) -> bool {
    VALID_LINK_RE.is_match(value.trim())
}

/// Rewrite a generic high-confidence title ("Follow up", "Send email") with
/// the subject found after on/about/for/regarding in the notes or source.
/// Anything else is returned unchanged.
pub fn refine_generic_title(title: &str, notes: &str, source: &str, confidence: Confidence) -> String {
    let normalized = title.trim();
    if confidence != Confidence::High {
        return normalized.to_string();
    }

    let lowered = normalized.to_lowercase();
    if !GENERIC_TITLE_RES.iter().any(|re| re.is_match(&lowered)) {
        return normalized.to_string();
    }

    let combined = format!("{}\n{}", notes, source);
    let Some(subject) = find_subject(&combined) else {
        return normalized.to_string();
    };

    let improved = if lowered.contains("email") {
        format!("Email for {}", subject)
    } else if lowered.contains("follow") {
        format!("Follow up on {}", subject)
    } else if lowered.contains("review") {
        format!("Review {}", subject)
    } else if lowered.contains("check") {
        format!("Check {}", subject)
    } else {
        format!("Action: {}", subject)
    };
    nudge_llm::prompts::truncate_chars(&improved, crate::schema::MAX_TITLE_CHARS).to_string()
}

fn find_subject(text: &str) -> Option<String> {
    let caps = SUBJECT_RE.captures(text)?;
    let mut subject = caps.get(1)?.as_str();
    if let Some(stop) = SUBJECT_STOP_RE.find(subject) {
        subject = &subject[..stop.start()];
    }

    let subject = WHITESPACE_RE.replace_all(subject, " ");
    let subject = subject.trim_matches(|c: char| " -:;,.\n\t".contains(c));
    let subject = ARTICLE_RE.replace(subject, "").to_string();

    let words = subject.split_whitespace().count();
    if subject.is_empty() || words < 2 || subject.chars().count() > 90 {
        return None;
    }
    Some(subject)
}

/// Keep topics with at least one name token that appears in `context`.
pub fn filter_topics_by_relevance(topics: &[String], context: &str) -> Vec<String> {
    let context = context.to_lowercase();
    let mut seen = Vec::<String>::new();
    let mut relevant = Vec::new();

    for topic in topics {
        let name = topic.trim();
        let key = name.to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        let grounded = TOKEN_SPLIT_RE
            .split(&key)
            .filter(|token| !token.is_empty())
            .any(|token| context.contains(token));
        if grounded {
            seen.push(key);
            relevant.push(name.to_string());
        }
    }
    relevant
}
