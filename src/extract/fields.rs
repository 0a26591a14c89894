//! Labeled-field extraction from markdown-ish narrative text.
//!
//! Each field has a list of label aliases tried in order; the first alias with
//! a non-empty value wins. A label matches at the start of a line (after
//! bullets, emoji or bold markers) or after a `|`, `•` or `;` separator, and is
//! followed by `:` or a dash plus whitespace. Missing labels yield `None`.

use super::record::Confidence;
use regex::Regex;
use std::sync::LazyLock;

pub const PICK_LABELS: &[&str] = &["Bobby's Pick", "Pick", "Recommendation", "BET"];
pub const CONFIDENCE_LABELS: &[&str] = &["Confidence", "Confidence Level", "Confidence Score"];
pub const ODDS_LABELS: &[&str] = &["Odds", "Current Odds", "Moneyline", "Line", "Spread"];
pub const BET_TYPE_LABELS: &[&str] = &["Bet Type", "TYPE"];
pub const WIN_PROBABILITY_LABELS: &[&str] = &["Win Probability", "Win Prob", "Probability"];
pub const UNITS_LABELS: &[&str] = &["Units", "Unit Size", "Stake"];

static PICK_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| label_regexes(PICK_LABELS));
static CONFIDENCE_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| label_regexes(CONFIDENCE_LABELS));
static ODDS_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| label_regexes(ODDS_LABELS));
static BET_TYPE_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| label_regexes(BET_TYPE_LABELS));
static WIN_PROB_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| label_regexes(WIN_PROBABILITY_LABELS));
static UNITS_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| label_regexes(UNITS_LABELS));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+-]?\d+(?:\.\d+)?").expect("number regex"));
static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("percent regex"));
static OUT_OF_TEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*10\b").expect("out-of-ten regex"));
static CONFIDENCE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(high|strong|medium|moderate|low|weak)\b").expect("confidence word regex")
});
static KEY_FACTORS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[^\w\n]*key\s+factors?\b[ \t]*\**[ \t]*:?[ \t]*\**(?P<rest>[^\n]*)$")
        .expect("key factors regex")
});
static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*\u{2022}]|\d+[.)])\s+(?P<item>.+)$").expect("bullet regex")
});
static MATCHUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[^\w\n]*(?P<a>[A-Z0-9][\w.'&]*(?:[ \t][A-Z0-9][\w.'&]*)*)[ \t]+(?:vs\.?|VS\.?|v\.|@|at)[ \t]+(?P<b>[A-Z0-9][\w.'&]*(?:[ \t][A-Z0-9][\w.'&]*)*)",
    )
    .expect("matchup regex")
});

/// Heading words that trail a matchup title and are not part of a team name.
const MATCHUP_TRAILERS: &[&str] = &[
    "Analysis", "Preview", "Pick", "Picks", "Prediction", "Predictions", "Breakdown", "Game",
    "Matchup",
];

fn label_regexes(labels: &[&str]) -> Vec<Regex> {
    labels
        .iter()
        .map(|label| {
            let escaped = regex::escape(label).replace('\'', "['\u{2019}]");
            Regex::new(&format!(
                r"(?im)(?:^|[|\u{{2022}};])[^\w\n]*?\b{escaped}\b[ \t]*\**[ \t]*(?::|[-\u{{2013}}\u{{2014}}][ \t])(?P<value>[^\n]*)"
            ))
            .expect("label regex")
        })
        .collect()
}

/// Fields read from labels in the narrative text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledFields {
    pub recommendation: Option<String>,
    pub confidence: Option<String>,
    pub odds: Option<String>,
    pub bet_type: Option<String>,
    pub win_probability: Option<String>,
    pub units: Option<String>,
    pub key_factors: Vec<String>,
}

pub fn extract_fields(text: &str) -> LabeledFields {
    LabeledFields {
        recommendation: first_labeled(text, &PICK_RE),
        confidence: first_labeled(text, &CONFIDENCE_RE),
        odds: first_labeled(text, &ODDS_RE),
        bet_type: first_labeled(text, &BET_TYPE_RE),
        win_probability: first_labeled(text, &WIN_PROB_RE),
        units: first_labeled(text, &UNITS_RE),
        key_factors: key_factors(text),
    }
}

/// Value of the first matching alias, with bold markers stripped.
fn first_labeled(text: &str, patterns: &[Regex]) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures_iter(text)
            .map(|caps| clean_value(&caps["value"]))
            .find(|v| !v.is_empty())
    })
}

fn clean_value(raw: &str) -> String {
    let cut = raw.split('|').next().unwrap_or(raw);
    cut.replace("**", "").replace('*', "").trim().to_string()
}

/// First number in the string: "85%" -> 85, "2u" -> 2, "-110" -> -110.
pub fn leading_number(s: &str) -> Option<f64> {
    NUMBER.find(s)?.as_str().parse::<f64>().ok()
}

/// Read a confidence value: a whole-word keyword first, then a percentage for
/// both the bucket and the win probability. "7/10" reads as 70%, "0.8" as 80%.
pub fn parse_confidence(raw: &str) -> (Option<Confidence>, Option<f64>) {
    let keyword = CONFIDENCE_WORD.captures(raw).map(|caps| {
        match caps[1].to_ascii_lowercase().as_str() {
            "high" | "strong" => Confidence::High,
            "medium" | "moderate" => Confidence::Medium,
            _ => Confidence::Low,
        }
    });

    let pct = parse_percentage(raw);
    let bucket = keyword.or_else(|| pct.map(Confidence::from_percentage));
    (bucket, pct)
}

/// A 0-100 percentage from "85%", "8.5/10", "0.85" or "85".
pub fn parse_percentage(raw: &str) -> Option<f64> {
    if let Some(caps) = PERCENT.captures(raw) {
        return caps[1].parse::<f64>().ok().filter(|p| (0.0..=100.0).contains(p));
    }
    if let Some(caps) = OUT_OF_TEN.captures(raw) {
        return caps[1]
            .parse::<f64>()
            .ok()
            .map(|v| v * 10.0)
            .filter(|p| (0.0..=100.0).contains(p));
    }
    let n = leading_number(raw)?;
    if (0.0..=1.0).contains(&n) && raw.contains('.') {
        Some(n * 100.0)
    } else if (0.0..=100.0).contains(&n) {
        Some(n)
    } else {
        None
    }
}

/// Bullet lines under a "Key Factors" label, or a comma list on the label line.
pub fn key_factors(text: &str) -> Vec<String> {
    let mut lines = text.lines();
    let mut inline = None;
    for line in lines.by_ref() {
        if let Some(caps) = KEY_FACTORS_LABEL.captures(line) {
            inline = Some(clean_value(&caps["rest"]));
            break;
        }
    }
    let Some(inline) = inline else {
        return Vec::new();
    };

    if !inline.is_empty() {
        return inline
            .split([',', ';'])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    let mut factors = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            if factors.is_empty() {
                continue;
            }
            break;
        }
        match BULLET.captures(line) {
            Some(caps) => {
                let item = clean_value(&caps["item"]);
                if !item.is_empty() {
                    factors.push(item);
                }
            }
            None => break,
        }
    }
    factors
}

/// "Chiefs vs Bills" style matchup from a heading or first lines.
pub fn detect_matchup(text: &str) -> Option<String> {
    let caps = MATCHUP.captures(text)?;
    let a = strip_trailers(&caps["a"]);
    let b = strip_trailers(&caps["b"]);
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some(format!("{} vs {}", a, b))
}

fn strip_trailers(name: &str) -> String {
    let mut words: Vec<&str> = name.split_whitespace().collect();
    while words.len() > 1 && words.last().is_some_and(|w| MATCHUP_TRAILERS.contains(w)) {
        words.pop();
    }
    words.join(" ")
}
