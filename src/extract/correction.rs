//! Narrative rewriting after a favorite/underdog swap.
//!
//! The correction is a pipeline of pure text transforms run in order. Each
//! transform only touches text near a team mention on the same line, so prose
//! about other games is left alone.

use super::record::{SideCorrection, TeamOdds};
use super::sides::{side_labels, Role};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static ROLE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<word>favou?rite|underdog)(?P<plural>s?)\b").expect("role word regex")
});
static UPSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<article>an[ \t]+)?upset(?P<plural>s?)\b").expect("upset regex")
});
static LABEL_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\**[ \t]*:").expect("label tail regex"));

/// Nicknames shorter than this are too ambiguous to match on their own.
const MIN_NICKNAME_CHARS: usize = 4;

/// Characters searched around a team mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleWindow {
    pub after: usize,
    pub before: usize,
}

impl Default for RoleWindow {
    fn default() -> Self {
        Self {
            after: 160,
            before: 40,
        }
    }
}

/// One rewrite step over the narrative. Must be total.
pub trait NarrativeTransform: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, text: &str) -> String;
}

#[derive(Default)]
pub struct CorrectionPipeline {
    transforms: Vec<Box<dyn NarrativeTransform>>,
}

impl CorrectionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, transform: impl NarrativeTransform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Relabel, reword roles, then fix upset framing.
    pub fn for_correction(correction: &SideCorrection, window: RoleWindow) -> Self {
        let favorite = TeamMatcher::new(&correction.favorite.team, &correction.underdog.team);
        let underdog = TeamMatcher::new(&correction.underdog.team, &correction.favorite.team);

        Self::new()
            .with(RelabelSideLines {
                favorite: correction.favorite.clone(),
                underdog: correction.underdog.clone(),
            })
            .with(RewordTeamRole {
                favorite: favorite.clone(),
                underdog: underdog.clone(),
                window,
            })
            .with(RewriteUpsetFraming {
                favorite,
                underdog,
                window: RoleWindow {
                    after: window.after,
                    before: 0,
                },
            })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn run(&self, text: &str) -> String {
        let mut current = text.to_string();
        for transform in &self.transforms {
            let next = transform.apply(&current);
            if next != current {
                tracing::debug!(transform = transform.name(), "narrative rewritten");
            }
            current = next;
        }
        current
    }
}

/// Rewrites the `Favorite:` / `Underdog:` label pair the sides were read from,
/// keeping the label markup. Label lines for other games are left alone.
pub struct RelabelSideLines {
    pub favorite: TeamOdds,
    pub underdog: TeamOdds,
}

impl NarrativeTransform for RelabelSideLines {
    fn name(&self) -> &'static str {
        "relabel_side_lines"
    }

    fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for label in side_labels(text) {
            let side = match label.role {
                Role::Favorite => &self.favorite,
                Role::Underdog => &self.underdog,
            };
            out.push_str(&text[cursor..label.span.start]);
            out.push_str(&format!("{} {} ({})", label.label, side.team, side.odds_display()));
            cursor = label.span.end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

/// Swaps "underdog" wording near the true favorite (and vice versa).
pub struct RewordTeamRole {
    pub favorite: TeamMatcher,
    pub underdog: TeamMatcher,
    pub window: RoleWindow,
}

impl NarrativeTransform for RewordTeamRole {
    fn name(&self) -> &'static str {
        "reword_team_role"
    }

    fn apply(&self, text: &str) -> String {
        let text = reword_near(text, &self.favorite, &self.underdog, self.window, Role::Underdog, Role::Favorite);
        reword_near(&text, &self.underdog, &self.favorite, self.window, Role::Favorite, Role::Underdog)
    }
}

fn reword_near(
    text: &str,
    anchor: &TeamMatcher,
    other: &TeamMatcher,
    window: RoleWindow,
    wrong: Role,
    right: Role,
) -> String {
    rewrite_in_windows(text, anchor, other, window, &ROLE_WORD, |caps, tail| {
        let word = caps.name("word")?.as_str();
        let is_wrong = match wrong {
            Role::Favorite => word.to_ascii_lowercase().starts_with("fav"),
            Role::Underdog => word.eq_ignore_ascii_case("underdog"),
        };
        if !is_wrong || LABEL_TAIL.is_match(tail) {
            return None;
        }
        let plural = caps.name("plural").map_or("", |m| m.as_str());
        Some(match_case(word, right.word()) + plural)
    })
}

/// "an upset" -> "a win", "upset(s)" -> "win(s)" after the true favorite.
pub struct RewriteUpsetFraming {
    pub favorite: TeamMatcher,
    pub underdog: TeamMatcher,
    pub window: RoleWindow,
}

impl NarrativeTransform for RewriteUpsetFraming {
    fn name(&self) -> &'static str {
        "rewrite_upset_framing"
    }

    fn apply(&self, text: &str) -> String {
        rewrite_in_windows(text, &self.favorite, &self.underdog, self.window, &UPSET, |caps, _| {
            let whole = caps.get(0)?.as_str();
            let replacement = if caps.name("article").is_some() {
                "a win".to_string()
            } else {
                format!("win{}", caps.name("plural").map_or("", |m| m.as_str()))
            };
            Some(match_case(whole, &replacement))
        })
    }
}

/// Word-bounded, case-insensitive matcher for a team and its nickname.
#[derive(Debug, Clone)]
pub struct TeamMatcher {
    pattern: Option<Regex>,
}

impl TeamMatcher {
    pub fn new(team: &str, other_team: &str) -> Self {
        let aliases = team_aliases(team, other_team);
        if aliases.is_empty() {
            return Self { pattern: None };
        }
        let alternation = aliases
            .iter()
            .map(|a| regex::escape(a))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).ok();
        Self { pattern }
    }

    pub fn mentions<'a, 't: 'a>(&'a self, text: &'t str) -> impl Iterator<Item = regex::Match<'t>> + 'a {
        self.pattern.iter().flat_map(move |re| re.find_iter(text))
    }

    pub fn is_mentioned(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(text))
    }
}

/// Full name first, then the last word when it is long enough and not shared
/// with the other side.
pub fn team_aliases(team: &str, other_team: &str) -> Vec<String> {
    let full = team.trim();
    if full.is_empty() {
        return Vec::new();
    }
    let mut aliases = vec![full.to_string()];

    let words: Vec<&str> = full.split_whitespace().collect();
    if let [_, .., last] = words.as_slice() {
        let other = other_team.to_lowercase();
        if last.chars().count() >= MIN_NICKNAME_CHARS && !other.contains(&last.to_lowercase()) {
            aliases.push(last.to_string());
        }
    }
    aliases
}

/// Apply `replace` to matches of `target` that sit inside a window around a
/// mention of `anchor` on the same line. Windows that also mention `other`
/// are skipped. `replace` gets the match and the rest of the line after it.
fn rewrite_in_windows<F>(
    text: &str,
    anchor: &TeamMatcher,
    other: &TeamMatcher,
    window: RoleWindow,
    target: &Regex,
    replace: F,
) -> String
where
    F: Fn(&Captures, &str) -> Option<String>,
{
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let spans: Vec<(usize, usize)> = anchor
            .mentions(line)
            .map(|m| {
                (
                    retreat_chars(line, m.start(), window.before),
                    advance_chars(line, m.end(), window.after),
                )
            })
            .filter(|&(start, end)| !other.is_mentioned(&line[start..end]))
            .collect();

        if !spans.is_empty() {
            for caps in target.captures_iter(line) {
                let Some(m) = caps.get(0) else { continue };
                let inside = spans
                    .iter()
                    .any(|&(start, end)| m.start() >= start && m.end() <= end);
                if !inside {
                    continue;
                }
                if let Some(new) = replace(&caps, &line[m.end()..]) {
                    edits.push((offset + m.start(), offset + m.end(), new));
                }
            }
        }
        offset += line.len();
    }

    if edits.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end, new) in edits {
        out.push_str(&text[cursor..start]);
        out.push_str(&new);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn advance_chars(line: &str, from: usize, n: usize) -> usize {
    line[from..]
        .char_indices()
        .nth(n)
        .map_or(line.len(), |(i, _)| from + i)
}

fn retreat_chars(line: &str, to: usize, n: usize) -> usize {
    if n == 0 {
        return to;
    }
    line[..to].char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i)
}

/// Give `replacement` the casing of `source`: ALL CAPS, Capitalized or lower.
fn match_case(source: &str, replacement: &str) -> String {
    let letters: Vec<char> = source.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        return replacement.to_uppercase();
    }
    match source.chars().next() {
        Some(first) if first.is_uppercase() => {
            let mut chars = replacement.chars();
            chars
                .next()
                .map(|c| c.to_uppercase().collect::<String>() + chars.as_str())
                .unwrap_or_default()
        }
        _ => replacement.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eagles_correction() -> SideCorrection {
        SideCorrection {
            favorite: TeamOdds::new("Philadelphia Eagles", -150),
            underdog: TeamOdds::new("Dallas Cowboys", 130),
            note: String::new(),
        }
    }

    fn pipeline() -> CorrectionPipeline {
        CorrectionPipeline::for_correction(&eagles_correction(), RoleWindow::default())
    }

    #[test]
    fn test_pipeline_order() {
        assert_eq!(
            pipeline().names(),
            vec!["relabel_side_lines", "reword_team_role", "rewrite_upset_framing"]
        );
    }

    #[test]
    fn test_relabel_keeps_markup() {
        let text = "**Favorite:** Dallas Cowboys (+130)\n**Underdog:** Philadelphia Eagles (-150)";
        assert_eq!(
            pipeline().run(text),
            "**Favorite:** Philadelphia Eagles (-150)\n**Underdog:** Dallas Cowboys (+130)"
        );
    }

    #[test]
    fn test_relabel_leaves_other_games() {
        let correction = SideCorrection {
            favorite: TeamOdds::new("Eagles", -150),
            underdog: TeamOdds::new("Cowboys", 130),
            note: String::new(),
        };
        let p = CorrectionPipeline::for_correction(&correction, RoleWindow::default());
        let text = "Favorite: Cowboys (+130)\nUnderdog: Eagles (-150)\n\nFavorite: Chiefs (-200)\nUnderdog: Bills (+170)";
        assert_eq!(
            p.run(text),
            "Favorite: Eagles (-150)\nUnderdog: Cowboys (+130)\n\nFavorite: Chiefs (-200)\nUnderdog: Bills (+170)"
        );
    }

    #[test]
    fn test_relabel_same_line_pair() {
        let text = "**Favorite:** Dallas Cowboys (+130) | **Underdog:** Philadelphia Eagles (-150)";
        assert_eq!(
            pipeline().run(text),
            "**Favorite:** Philadelphia Eagles (-150) | **Underdog:** Dallas Cowboys (+130)"
        );
    }

    #[test]
    fn test_reword_near_nickname() {
        let text = "Take the Eagles as a live underdog tonight.";
        assert_eq!(pipeline().run(text), "Take the Eagles as a live favorite tonight.");
    }

    #[test]
    fn test_reword_preserves_case_and_plural() {
        let text = "Underdogs like the Eagles cover late.";
        assert_eq!(pipeline().run(text), "Favorites like the Eagles cover late.");
        let text = "Cowboys are the FAVORITE here.";
        assert_eq!(pipeline().run(text), "Cowboys are the UNDERDOG here.");
    }

    #[test]
    fn test_reword_skips_window_with_both_teams() {
        let text = "Eagles vs Cowboys, underdog pick.";
        assert_eq!(pipeline().run(text), text);
    }

    #[test]
    fn test_reword_stays_on_same_line() {
        let text = "Eagles tonight.\nThe underdog story continues.";
        assert_eq!(pipeline().run(text), text);
    }

    #[test]
    fn test_reword_skips_labels() {
        let text = "Eagles notes. Underdog: see below";
        assert_eq!(pipeline().run(text), text);
    }

    #[test]
    fn test_reword_outside_window_untouched() {
        let filler = "x".repeat(200);
        let text = format!("Eagles {} underdog", filler);
        assert_eq!(pipeline().run(&text), text);
    }

    #[test]
    fn test_upset_framing() {
        assert_eq!(pipeline().run("Eagles pull off an upset."), "Eagles pull off a win.");
        assert_eq!(pipeline().run("Eagles chasing upsets."), "Eagles chasing wins.");
        // before the favorite's name is out of window
        assert_eq!(pipeline().run("An upset for the Eagles."), "An upset for the Eagles.");
    }

    #[test]
    fn test_team_aliases() {
        assert_eq!(team_aliases("Philadelphia Eagles", "Dallas Cowboys"), vec!["Philadelphia Eagles", "Eagles"]);
        assert_eq!(team_aliases("NY Jets", "Buffalo Bills"), vec!["NY Jets", "Jets"]);
        assert_eq!(team_aliases("LA Sky", "Chicago Sky"), vec!["LA Sky"]);
        assert_eq!(team_aliases("New York Giants", "San Francisco Giants"), vec!["New York Giants"]);
        assert!(team_aliases("  ", "x").is_empty());
    }

    #[test]
    fn test_team_with_regex_metachars() {
        let correction = SideCorrection {
            favorite: TeamOdds::new("Texas A&M (Aggies)", -200),
            underdog: TeamOdds::new("Auburn", 170),
            note: String::new(),
        };
        let p = CorrectionPipeline::for_correction(&correction, RoleWindow::default());
        let text = "Auburn is the favorite today.";
        assert_eq!(p.run(text), "Auburn is the underdog today.");
    }

    #[test]
    fn test_mentions_outlive_matcher() {
        let text = String::from("Eagles at home, Philadelphia Eagles by 7");
        let found: Vec<&str> = {
            let matcher = TeamMatcher::new("Philadelphia Eagles", "Dallas Cowboys");
            matcher.mentions(&text).map(|m| m.as_str()).collect()
        };
        assert_eq!(found, vec!["Eagles", "Philadelphia Eagles"]);
    }

    #[test]
    fn test_match_case() {
        assert_eq!(match_case("underdog", "favorite"), "favorite");
        assert_eq!(match_case("Underdog", "favorite"), "Favorite");
        assert_eq!(match_case("AN UPSET", "a win"), "A WIN");
    }

    #[test]
    fn test_multibyte_text_near_window_edges() {
        let text = "\u{1F985}\u{1F985} Eagles \u{2014} underdog \u{1F525}";
        assert_eq!(pipeline().run(text), "\u{1F985}\u{1F985} Eagles \u{2014} favorite \u{1F525}");
    }
}
