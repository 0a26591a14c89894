use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How confident the upstream workflow claims to be in its pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        }
    }

    /// Bucket a 0-100 percentage.
    pub fn from_percentage(pct: f64) -> Self {
        if pct >= 70.0 {
            Confidence::High
        } else if pct >= 55.0 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a matchup with its American odds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamOdds {
    pub team: String,
    pub american_odds: i32,
}

impl TeamOdds {
    pub fn new(team: impl Into<String>, american_odds: i32) -> Self {
        Self {
            team: team.into(),
            american_odds,
        }
    }

    /// Odds with an explicit sign, e.g. "+130" / "-150".
    pub fn odds_display(&self) -> String {
        super::sides::format_american_odds(self.american_odds)
    }

    pub fn implied_probability(&self) -> f64 {
        super::sides::american_to_probability(self.american_odds)
    }
}

/// Set when the favorite/underdog labels contradicted the odds and were swapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCorrection {
    /// The side the odds say is favored (labeled underdog upstream).
    pub favorite: TeamOdds,
    pub underdog: TeamOdds,
    pub note: String,
}

/// Where the narrative text came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "key")]
pub enum NarrativeSource {
    #[default]
    RawText,
    Field(String),
    PrettyPrinted,
}

/// Normalized output of one webhook response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub teams: String,
    #[serde(default)]
    pub sport: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub bet_type: Option<String>,
    #[serde(default)]
    pub win_probability: Option<f64>,
    #[serde(default)]
    pub units: Option<f64>,
    #[serde(default)]
    pub odds: Option<String>,
    #[serde(default)]
    pub favorite: Option<TeamOdds>,
    #[serde(default)]
    pub underdog: Option<TeamOdds>,
    #[serde(default)]
    pub correction: Option<SideCorrection>,
    #[serde(default)]
    pub reasoning_text: String,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub narrative_source: NarrativeSource,
}

impl Analysis {
    pub fn correction_applied(&self) -> bool {
        self.correction.is_some()
    }
}

/// An [`Analysis`] stamped with an id and receive time, as kept in the feed and cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub analysis: Analysis,
}

impl AnalysisRecord {
    pub fn new(analysis: Analysis) -> Self {
        let received_at = Utc::now();
        Self {
            id: new_record_id(&received_at),
            received_at,
            analysis,
        }
    }
}

/// `analysis_<millis>_<9 lowercase alphanumerics>`
fn new_record_id(at: &DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("analysis_{}_{}", at.timestamp_millis(), suffix)
}
