use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Used when a request names no sport at all.
pub const DEFAULT_SPORT: &str = "NBA";

/// JSON body posted to an analysis workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub sport: String,
    pub sports: Vec<String>,
    pub teams: String,
    pub text: String,
    pub persona: String,
    pub target_date: NaiveDate,
    pub test: bool,
}

impl AnalysisRequest {
    /// First sport is the primary one; teams are normalized with [`format_teams`].
    pub fn new(sports: Vec<String>, teams: &str, persona: &str) -> Self {
        let sports: Vec<String> = sports
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let sport = sports
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_SPORT.to_string());
        let teams = format_teams(teams);
        Self {
            sport,
            sports,
            text: teams.clone(),
            teams,
            persona: persona.to_string(),
            target_date: Utc::now().date_naive(),
            test: false,
        }
    }

    pub fn with_target_date(mut self, date: NaiveDate) -> Self {
        self.target_date = date;
        self
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    /// The matchup, or `None` for a general-recommendations request.
    pub fn matchup(&self) -> Option<&str> {
        (self.teams != GENERAL_RECOMMENDATIONS).then_some(self.teams.as_str())
    }
}

pub const GENERAL_RECOMMENDATIONS: &str = "general recommendations";

/// "" -> "general recommendations", "A vs B" -> trimmed, "A, B" -> "A vs B".
pub fn format_teams(teams: &str) -> String {
    let trimmed = teams.trim();
    if trimmed.is_empty() {
        return GENERAL_RECOMMENDATIONS.to_string();
    }
    if trimmed.to_lowercase().contains(" vs ") {
        return trimmed.to_string();
    }
    if trimmed.contains(',') {
        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        return match parts.as_slice() {
            [a, b, ..] => format!("{} vs {}", a, b),
            [a] => a.to_string(),
            [] => GENERAL_RECOMMENDATIONS.to_string(),
        };
    }
    trimmed.to_string()
}
