use crate::extract::AnalysisRecord;
use serde::{Deserialize, Serialize};

/// Initial field values for saving a record as a pick. Persisting it is the
/// caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePickData {
    pub teams: String,
    pub sport: Option<String>,
    pub pick: Option<String>,
    pub confidence: String,
    pub analysis: String,
    pub odds: Option<String>,
    pub bet_type: Option<String>,
}

impl SavePickData {
    pub fn from_record(record: &AnalysisRecord) -> Self {
        let a = &record.analysis;
        Self {
            teams: a.teams.clone(),
            sport: Some(a.sport.trim()).filter(|s| !s.is_empty()).map(str::to_string),
            pick: a.recommendation.clone(),
            confidence: a.confidence.as_str().to_string(),
            analysis: a.reasoning_text.clone(),
            odds: a.odds.clone(),
            bet_type: a.bet_type.clone(),
        }
    }
}
