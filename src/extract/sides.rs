//! Favorite/underdog detection from "Favorite: Team (odds)" label lines.
//!
//! American odds decide which side is favored: the smaller value (more
//! negative, or smaller positive) is the favorite. When the labels in the text
//! disagree with the odds, the two sides are swapped and a correction is
//! reported. Nothing here invents an odds value.

use super::record::{SideCorrection, TeamOdds};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// A `Favorite:` / `Underdog:` label line with optional bold markers.
/// Groups: `label` (marker through colon), `role`, `team`, `odds`.
static SIDE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<label>\*{0,2}[ \t]*\b(?P<role>favou?rite|underdog)[ \t]*\*{0,2}[ \t]*:[ \t]*\*{0,2})[ \t]*(?P<team>[^(\n]+?)[ \t]*\((?P<odds>[^)\n]+)\)",
    )
    .expect("side line regex")
});

static SIGNED_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+-]?\d+").expect("signed int regex"));

static THOUSANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d),(\d{3})").expect("thousands regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Favorite,
    Underdog,
}

impl Role {
    fn from_label(label: &str) -> Self {
        if label.to_ascii_lowercase().starts_with("fav") {
            Role::Favorite
        } else {
            Role::Underdog
        }
    }

    pub fn word(&self) -> &'static str {
        match self {
            Role::Favorite => "favorite",
            Role::Underdog => "underdog",
        }
    }
}

/// Result of scanning a narrative for side labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideResolution {
    pub favorite: Option<TeamOdds>,
    pub underdog: Option<TeamOdds>,
    pub correction: Option<SideCorrection>,
}

impl SideResolution {
    pub fn correction_applied(&self) -> bool {
        self.correction.is_some()
    }
}

/// Parse an American odds string to an integer.
/// Handles "+150", "-180", "(+1,200)", "−150" (Unicode minus) and "EVEN" (= +100).
/// Reads the first signed-integer run, so "-3.5" yields -3.
pub fn parse_american_odds(s: &str) -> Option<i32> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    if upper == "EVEN" || upper == "EV" || upper.starts_with("EVEN ") {
        return Some(100);
    }
    let s = s.replace(['\u{2212}', '\u{2013}', '\u{2014}'], "-");
    let s = THOUSANDS.replace_all(&s, "$1$2");
    SIGNED_INT.find(&s)?.as_str().parse::<i32>().ok()
}

pub fn format_american_odds(odds: i32) -> String {
    if odds > 0 {
        format!("+{}", odds)
    } else {
        odds.to_string()
    }
}

/// Convert American odds to implied probability.
/// Positive odds (e.g., +150): prob = 100 / (odds + 100)
/// Negative odds (e.g., -150): prob = |odds| / (|odds| + 100)
pub fn american_to_probability(odds: i32) -> f64 {
    let odds = odds as f64;
    if odds > 0.0 {
        100.0 / (odds + 100.0)
    } else if odds == 0.0 {
        0.5
    } else {
        let abs = odds.abs();
        abs / (abs + 100.0)
    }
}

fn clean_team(raw: &str) -> String {
    raw.replace('*', "").trim().trim_end_matches([':', '-']).trim().to_string()
}

/// A label line the scanner took a side from, with its byte range in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SideLabel {
    pub role: Role,
    /// Marker through the colon, e.g. `**Favorite:**`.
    pub label: String,
    pub side: TeamOdds,
    pub span: Range<usize>,
}

/// The first usable favorite label and first usable underdog label, in text
/// order. A label whose odds don't parse is dropped.
pub(crate) fn side_labels(text: &str) -> Vec<SideLabel> {
    let mut found: Vec<SideLabel> = Vec::with_capacity(2);

    for caps in SIDE_LINE.captures_iter(text) {
        let role = Role::from_label(&caps["role"]);
        if found.iter().any(|l| l.role == role) {
            continue;
        }
        let team = clean_team(&caps["team"]);
        if team.is_empty() {
            continue;
        }
        let Some(whole) = caps.get(0) else { continue };
        match parse_american_odds(&caps["odds"]) {
            Some(odds) => found.push(SideLabel {
                role,
                label: caps["label"].trim_end().to_string(),
                side: TeamOdds::new(team, odds),
                span: whole.range(),
            }),
            None => {
                tracing::debug!(role = role.word(), odds = &caps["odds"], "unparseable side odds");
            }
        }
        if found.len() == 2 {
            break;
        }
    }

    found
}

/// Find the first favorite and first underdog label in the text.
pub fn scan_side_labels(text: &str) -> (Option<TeamOdds>, Option<TeamOdds>) {
    let mut favorite = None;
    let mut underdog = None;
    for label in side_labels(text) {
        match label.role {
            Role::Favorite => favorite = Some(label.side),
            Role::Underdog => underdog = Some(label.side),
        }
    }
    (favorite, underdog)
}

/// Check a labeled pair against American-odds order, swapping on inversion.
/// With only one side present the input passes through unchanged.
pub fn resolve_pair(favorite: Option<TeamOdds>, underdog: Option<TeamOdds>) -> SideResolution {
    match (favorite, underdog) {
        (Some(fav), Some(dog)) if fav.american_odds > dog.american_odds => {
            let note = format!(
                "Odds check: {} ({}) is the favorite over {} ({}); the source analysis had the labels reversed.",
                dog.team,
                dog.odds_display(),
                fav.team,
                fav.odds_display(),
            );
            tracing::info!(favorite = %dog.team, underdog = %fav.team, "favorite/underdog labels swapped");
            SideResolution {
                favorite: Some(dog.clone()),
                underdog: Some(fav.clone()),
                correction: Some(SideCorrection {
                    favorite: dog,
                    underdog: fav,
                    note,
                }),
            }
        }
        (favorite, underdog) => SideResolution {
            favorite,
            underdog,
            correction: None,
        },
    }
}

/// Scan the text for side labels and resolve them.
pub fn resolve_sides(text: &str) -> SideResolution {
    let (favorite, underdog) = scan_side_labels(text);
    resolve_pair(favorite, underdog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_odds_positive() {
        assert_eq!(parse_american_odds("+150"), Some(150));
    }

    #[test]
    fn test_parse_odds_negative() {
        assert_eq!(parse_american_odds("-180"), Some(-180));
        assert_eq!(parse_american_odds("\u{2212}180"), Some(-180));
    }

    #[test]
    fn test_parse_odds_even() {
        assert_eq!(parse_american_odds("EVEN"), Some(100));
        assert_eq!(parse_american_odds("even"), Some(100));
    }

    #[test]
    fn test_parse_odds_thousands_and_noise() {
        assert_eq!(parse_american_odds("+1,200"), Some(1200));
        assert_eq!(parse_american_odds("ML -110 at DK"), Some(-110));
        assert_eq!(parse_american_odds("-3.5"), Some(-3));
    }

    #[test]
    fn test_parse_odds_invalid() {
        assert!(parse_american_odds("").is_none());
        assert!(parse_american_odds("abc").is_none());
        assert!(parse_american_odds("+99999999999").is_none());
    }

    #[test]
    fn test_american_to_probability() {
        assert!((american_to_probability(-150) - 0.6).abs() < 1e-9);
        assert!((american_to_probability(150) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_consistent_labels_pass_through() {
        let res = resolve_sides("Favorite: Eagles (-150)\nUnderdog: Cowboys (+130)");
        assert_eq!(res.favorite, Some(TeamOdds::new("Eagles", -150)));
        assert_eq!(res.underdog, Some(TeamOdds::new("Cowboys", 130)));
        assert!(!res.correction_applied());
    }

    #[test]
    fn test_swapped_labels_are_corrected() {
        let res = resolve_sides("Favorite: Cowboys (+130)\nUnderdog: Eagles (-150)");
        assert_eq!(res.favorite, Some(TeamOdds::new("Eagles", -150)));
        assert_eq!(res.underdog, Some(TeamOdds::new("Cowboys", 130)));
        let correction = res.correction.unwrap();
        assert!(correction.note.contains("Eagles (-150) is the favorite"));
    }

    #[test]
    fn test_bold_labels() {
        let res = resolve_sides("**Favorite:** Boston Celtics (-240)\n**Underdog**: Miami Heat (+198)");
        assert_eq!(res.favorite, Some(TeamOdds::new("Boston Celtics", -240)));
        assert_eq!(res.underdog, Some(TeamOdds::new("Miami Heat", 198)));
        assert!(!res.correction_applied());
    }

    #[test]
    fn test_single_side_no_correction() {
        let res = resolve_sides("Underdog: Eagles (-150)");
        assert_eq!(res.favorite, None);
        assert_eq!(res.underdog, Some(TeamOdds::new("Eagles", -150)));
        assert!(!res.correction_applied());
    }

    #[test]
    fn test_unparseable_side_skips_correction() {
        let res = resolve_sides("Favorite: Cowboys (TBD)\nUnderdog: Eagles (-150)");
        assert_eq!(res.favorite, None);
        assert!(!res.correction_applied());
    }

    #[test]
    fn test_equal_odds_no_correction() {
        let res = resolve_sides("Favorite: Jets (-110)\nUnderdog: Bills (-110)");
        assert!(!res.correction_applied());
        assert_eq!(res.favorite.unwrap().team, "Jets");
    }

    #[test]
    fn test_side_labels_stop_at_first_pair() {
        let text = "Favorite: Cowboys (+130)\nUnderdog: Eagles (-150)\n\nFavorite: Chiefs (-200)\nUnderdog: Bills (+170)";
        let labels = side_labels(text);
        assert_eq!(labels.len(), 2);
        assert_eq!(&text[labels[0].span.clone()], "Favorite: Cowboys (+130)");
        assert_eq!(&text[labels[1].span.clone()], "Underdog: Eagles (-150)");
    }

    #[test]
    fn test_same_line_labels() {
        let res = resolve_sides("**Favorite:** Cowboys (+130) | **Underdog:** Eagles (-150)");
        assert_eq!(res.favorite.unwrap().team, "Eagles");
        assert_eq!(res.underdog.unwrap().team, "Cowboys");
    }
}
