pub mod correction;
pub mod fields;
pub mod normalize;
pub mod record;
pub mod sides;

pub use correction::{CorrectionPipeline, NarrativeTransform, RoleWindow};
pub use normalize::{clean_html, normalize_response, NormalizedResponse};
pub use record::{Analysis, AnalysisRecord, Confidence, NarrativeSource, SideCorrection, TeamOdds};
pub use sides::{american_to_probability, parse_american_odds, resolve_pair, resolve_sides, SideResolution};

use crate::config::ExtractorConfig;
use fields::{detect_matchup, extract_fields, leading_number, parse_confidence, parse_percentage};
use serde_json::Value;

/// Turns raw webhook bodies into [`Analysis`] values.
///
/// Structured JSON fields win over labels found in the narrative text; the
/// favorite/underdog pair is checked against the odds either way. Never fails.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    window: RoleWindow,
}

impl Extractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            window: RoleWindow {
                after: config.role_window_after,
                before: config.role_window_before,
            },
        }
    }

    pub fn extract(&self, body: &str) -> Analysis {
        let normalized = normalize_response(body);
        let text = normalized.narrative.as_str();
        let labeled = extract_fields(text);

        // Sides: JSON first, then label lines, then the odds check.
        let (text_fav, text_dog) = sides::scan_side_labels(text);
        let favorite = json_side(&normalized, "favorite_team", "favorite_odds").or(text_fav);
        let underdog = json_side(&normalized, "underdog_team", "underdog_odds").or(text_dog);
        let resolution = resolve_pair(favorite, underdog);

        let reasoning_text = match &resolution.correction {
            Some(correction) => CorrectionPipeline::for_correction(correction, self.window).run(text),
            None => text.to_string(),
        };

        // Confidence and win probability.
        let (json_bucket, json_pct) = normalized
            .field_str("confidence")
            .map(|c| parse_confidence(&c))
            .unwrap_or((None, None));
        let (text_bucket, text_pct) = labeled
            .confidence
            .as_deref()
            .map(parse_confidence)
            .unwrap_or((None, None));
        let win_probability = normalized
            .field_f64("confidence_percentage")
            .or_else(|| normalized.field_f64("win_probability"))
            .or(json_pct)
            .or_else(|| labeled.win_probability.as_deref().and_then(parse_percentage))
            .or(text_pct);
        let confidence = json_bucket
            .or(text_bucket)
            .or_else(|| normalized.field_f64("confidence_percentage").map(Confidence::from_percentage))
            .unwrap_or_default();

        let narrative_from_recommendation =
            normalized.source == NarrativeSource::Field("recommendation".to_string());
        let recommendation = normalized
            .field_str("recommendation_team")
            .or_else(|| {
                (!narrative_from_recommendation)
                    .then(|| normalized.field_str("recommendation"))
                    .flatten()
            })
            .or(labeled.recommendation);

        let odds = normalized
            .field_str("odds")
            .or(labeled.odds)
            .or_else(|| side_odds_summary(&resolution));

        let key_factors = json_string_list(normalized.field("key_factors"))
            .filter(|f| !f.is_empty())
            .unwrap_or(labeled.key_factors);

        let teams = json_string_list(normalized.field("teams"))
            .map(|t| t.join(" vs "))
            .filter(|t| !t.is_empty())
            .or_else(|| detect_matchup(text))
            .or_else(|| {
                let (fav, dog) = (resolution.favorite.as_ref()?, resolution.underdog.as_ref()?);
                Some(format!("{} vs {}", fav.team, dog.team))
            })
            .unwrap_or_default();

        let analysis = Analysis {
            teams,
            sport: normalized.field_str("sport").unwrap_or_default(),
            persona: normalized.field_str("persona"),
            confidence,
            recommendation,
            bet_type: normalized.field_str("bet_type").or(labeled.bet_type),
            win_probability,
            units: normalized
                .field_f64("units")
                .or_else(|| labeled.units.as_deref().and_then(leading_number)),
            odds,
            favorite: resolution.favorite,
            underdog: resolution.underdog,
            correction: resolution.correction,
            reasoning_text,
            key_factors,
            narrative_source: normalized.source,
        };

        tracing::debug!(
            source = ?analysis.narrative_source,
            teams = %analysis.teams,
            corrected = analysis.correction_applied(),
            "analysis extracted"
        );
        analysis
    }
}

/// Extract with the default correction window.
pub fn extract_analysis(body: &str) -> Analysis {
    Extractor::default().extract(body)
}

fn json_side(normalized: &NormalizedResponse, team_key: &str, odds_key: &str) -> Option<TeamOdds> {
    let team = normalized.field_str(team_key)?;
    let odds = match normalized.field(odds_key)? {
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => parse_american_odds(s),
        _ => None,
    };
    match odds {
        Some(odds) => Some(TeamOdds::new(team, odds)),
        None => {
            tracing::debug!(field = odds_key, "structured side odds missing or unparseable");
            None
        }
    }
}

/// A string array, or a single string split on commas / " vs ".
fn json_string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items: Vec<String> = match value? {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(" vs ")
            .flat_map(|part| part.split(','))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => return None,
    };
    Some(items)
}

fn side_odds_summary(resolution: &SideResolution) -> Option<String> {
    let parts: Vec<String> = [&resolution.favorite, &resolution.underdog]
        .into_iter()
        .flatten()
        .map(|side| format!("{} {}", side.team, side.odds_display()))
        .collect();
    (!parts.is_empty()).then(|| parts.join(" | "))
}
