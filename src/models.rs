//! Core data types flowing through the recognition, translation, chat,
//! and itinerary pipelines.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Visual domain a recognition request targets. Each domain has its own
/// frozen encoder and feature store so the feature spaces stay decoupled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Place,
    Person,
}

impl Domain {
    /// Sentinel label returned when the domain's feature store is empty.
    pub fn sentinel(&self) -> &'static str {
        match self {
            Domain::Place => "Unknown Place",
            Domain::Person => "Unknown Person",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "place" => Ok(Domain::Place),
            "person" => Ok(Domain::Person),
            other => Err(CoreError::InvalidRequest(format!(
                "unknown domain: '{}'. Use place or person.",
                other
            ))),
        }
    }
}

/// Result of a nearest-neighbor match against a feature store.
///
/// `source_id` is `None` only for the empty-store sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub label: String,
    pub score: f32,
    pub source_id: Option<String>,
}

/// A historical place row from the pre-built index, read-only to the core.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub city: String,
    pub region: String,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of the bounded chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

// ============ Typed requests ============

/// Recognition request: one image, one visual domain.
#[derive(Debug)]
pub struct RecognizeRequest {
    pub domain: Domain,
    pub image: Vec<u8>,
}

impl RecognizeRequest {
    pub fn validate(&self) -> CoreResult<()> {
        if self.image.is_empty() {
            return Err(CoreError::InvalidRequest("image must not be empty".into()));
        }
        Ok(())
    }
}

/// Maximum number of symbol images accepted per translation request.
pub const MAX_TRANSLATE_IMAGES: usize = 10;

/// Translation request: 1..=10 cropped symbol images, in reading order.
#[derive(Debug)]
pub struct TranslateRequest {
    pub images: Vec<Vec<u8>>,
}

impl TranslateRequest {
    pub fn validate(&self) -> CoreResult<()> {
        if self.images.is_empty() || self.images.len() > MAX_TRANSLATE_IMAGES {
            return Err(CoreError::InvalidRequest(format!(
                "between 1 and {} images required, got {}",
                MAX_TRANSLATE_IMAGES,
                self.images.len()
            )));
        }
        if self.images.iter().any(|i| i.is_empty()) {
            return Err(CoreError::InvalidRequest("empty image in request".into()));
        }
        Ok(())
    }
}

/// Chat request. `context` is optional caller-supplied grounding text
/// folded into the user turn.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub context: Option<String>,
}

impl ChatRequest {
    pub fn validate(&self) -> CoreResult<()> {
        if self.question.trim().is_empty() {
            return Err(CoreError::InvalidRequest("question is required".into()));
        }
        Ok(())
    }
}

/// Itinerary request: free-text interests, a start date, a trip length,
/// and a budget descriptor.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanRequest {
    pub query: String,
    pub start: NaiveDate,
    pub days: u32,
    pub budget: String,
}

impl PlanRequest {
    pub fn validate(&self) -> CoreResult<()> {
        if self.query.trim().is_empty() {
            return Err(CoreError::InvalidRequest("query is required".into()));
        }
        if self.days == 0 {
            return Err(CoreError::InvalidRequest("days must be >= 1".into()));
        }
        if self.budget.trim().is_empty() {
            return Err(CoreError::InvalidRequest("budget is required".into()));
        }
        Ok(())
    }
}

// ============ Responses ============

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub label: String,
    pub score: f32,
    pub source_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub translation: String,
    pub classes: Vec<String>,
}

// ============ Itinerary ============

/// One timed stop within a day plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryEntry {
    pub time: String,
    pub place_name: String,
    pub activity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One day of the generated plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    pub date: String,
    pub entries: Vec<ItineraryEntry>,
}

/// Schema-constrained itinerary returned by the planning pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Itinerary {
    pub city: String,
    pub days: u32,
    pub plan: Vec<DayPlan>,
}

impl Itinerary {
    /// Validate the generated payload against the declared shape:
    /// `plan` covers exactly `expected_days` days, every entry's `time`
    /// parses as a time of day, and `place_name`/`activity` are
    /// non-empty. Malformed output is surfaced, never coerced.
    pub fn validate(&self, expected_days: u32) -> CoreResult<()> {
        if self.days != expected_days {
            return Err(CoreError::SchemaViolation(format!(
                "days is {} but {} were requested",
                self.days, expected_days
            )));
        }
        if self.plan.len() != expected_days as usize {
            return Err(CoreError::SchemaViolation(format!(
                "plan has {} days but {} were requested",
                self.plan.len(),
                expected_days
            )));
        }
        for (d, day) in self.plan.iter().enumerate() {
            if day.date.trim().is_empty() {
                return Err(CoreError::SchemaViolation(format!(
                    "plan[{}].date is empty",
                    d
                )));
            }
            for (e, entry) in day.entries.iter().enumerate() {
                if parse_time_of_day(&entry.time).is_none() {
                    return Err(CoreError::SchemaViolation(format!(
                        "plan[{}].entries[{}].time '{}' is not a time of day",
                        d, e, entry.time
                    )));
                }
                if entry.place_name.trim().is_empty() {
                    return Err(CoreError::SchemaViolation(format!(
                        "plan[{}].entries[{}].place_name is empty",
                        d, e
                    )));
                }
                if entry.activity.trim().is_empty() {
                    return Err(CoreError::SchemaViolation(format!(
                        "plan[{}].entries[{}].activity is empty",
                        d, e
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Parse a time-of-day string. Accepts `HH:MM`, `HH:MM:SS`, and 12-hour
/// forms like `9:30 AM`.
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    let trimmed = s.trim();
    for fmt in ["%H:%M", "%H:%M:%S"] {
        if let Ok(t) = NaiveTime::parse_from_str(trimmed, fmt) {
            return Some(t);
        }
    }
    // 12-hour clock; chrono's %p wants uppercase AM/PM
    let upper = trimmed.to_uppercase();
    NaiveTime::parse_from_str(&upper, "%I:%M %p").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(time: &str) -> ItineraryEntry {
        ItineraryEntry {
            time: time.to_string(),
            place_name: "Karnak Temple".to_string(),
            activity: "Guided walk".to_string(),
            notes: None,
        }
    }

    fn one_day_itinerary() -> Itinerary {
        Itinerary {
            city: "Luxor".to_string(),
            days: 1,
            plan: vec![DayPlan {
                day: 1,
                date: "2025-03-01".to_string(),
                entries: vec![entry("09:00"), entry("14:30")],
            }],
        }
    }

    #[test]
    fn test_time_of_day_forms() {
        assert!(parse_time_of_day("09:00").is_some());
        assert!(parse_time_of_day("23:59:59").is_some());
        assert!(parse_time_of_day("9:30 am").is_some());
        assert!(parse_time_of_day("12:15 PM").is_some());
        assert!(parse_time_of_day("noonish").is_none());
        assert!(parse_time_of_day("25:00").is_none());
        assert!(parse_time_of_day("").is_none());
    }

    #[test]
    fn test_itinerary_valid() {
        assert!(one_day_itinerary().validate(1).is_ok());
    }

    #[test]
    fn test_itinerary_day_count_mismatch() {
        let it = one_day_itinerary();
        let err = it.validate(3).unwrap_err();
        assert!(matches!(err, CoreError::SchemaViolation(_)));
    }

    #[test]
    fn test_itinerary_plan_shorter_than_days() {
        let mut it = one_day_itinerary();
        it.days = 2;
        let err = it.validate(2).unwrap_err();
        assert!(matches!(err, CoreError::SchemaViolation(_)));
    }

    #[test]
    fn test_itinerary_bad_time() {
        let mut it = one_day_itinerary();
        it.plan[0].entries[0].time = "morning".to_string();
        let err = it.validate(1).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("time"), "unexpected message: {}", msg);
    }

    #[test]
    fn test_itinerary_empty_activity() {
        let mut it = one_day_itinerary();
        it.plan[0].entries[1].activity = "  ".to_string();
        assert!(it.validate(1).is_err());
    }

    #[test]
    fn test_translate_request_bounds() {
        let empty = TranslateRequest { images: vec![] };
        assert!(empty.validate().is_err());

        let too_many = TranslateRequest {
            images: vec![vec![1u8]; MAX_TRANSLATE_IMAGES + 1],
        };
        assert!(too_many.validate().is_err());

        let ok = TranslateRequest {
            images: vec![vec![1u8]; 3],
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!(Domain::parse("place").unwrap(), Domain::Place);
        assert_eq!(Domain::parse("person").unwrap(), Domain::Person);
        assert!(Domain::parse("animal").is_err());
        assert_eq!(Domain::Place.sentinel(), "Unknown Place");
        assert_eq!(Domain::Person.sentinel(), "Unknown Person");
    }
}
