use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length the backend accepts for any event text field
pub const MAX_FIELD_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "event_date")]
    pub date: NaiveDateTime,
    #[serde(default)]
    pub location: Option<String>,
    // Older revisions of the backend called this owner_id
    #[serde(alias = "owner_id", default)]
    pub organizer_id: Option<Uuid>,
}

impl Event {
    /// Build a client-side event for an optimistic insert.
    /// The identifier is freshly generated and never collides with another local insert.
    pub fn local(create: &EventCreate, organizer_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: create.title.clone(),
            description: create.description.clone(),
            date: create.date,
            location: Some(create.location.clone()),
            organizer_id,
        }
    }

    pub fn is_organized_by(&self, user_id: Option<Uuid>) -> bool {
        match (self.organizer_id, user_id) {
            (Some(owner), Some(user)) => owner == user,
            _ => false,
        }
    }

    pub fn formatted_date(&self) -> String {
        self.date.format("%b %d, %Y").to_string()
    }

    /// Standard date/time format: "MM/DD/YYYY HH:mm"
    pub fn formatted_datetime_standard(&self) -> String {
        self.date.format("%m/%d/%Y %H:%M").to_string()
    }

    /// Value suitable for pre-filling a datetime-local style input
    pub fn date_input_value(&self) -> String {
        self.date.format(event_date::INPUT_FORMAT).to_string()
    }

    pub fn description_display(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => "N/A",
        }
    }

    pub fn location_display(&self) -> &str {
        self.location.as_deref().filter(|l| !l.is_empty()).unwrap_or("-")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCreate {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "event_date")]
    pub date: NaiveDateTime,
    pub location: String,
}

/// Partial update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "event_date::option", default)]
    pub date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl EventUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.location.is_none()
    }
}

/// One page of the events collection as returned by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub data: Vec<Event>,
    #[serde(default)]
    pub count: Option<u64>,
    /// Set when the server sent something that was not an event collection
    #[serde(skip)]
    pub invalid: bool,
}

impl EventsResponse {
    pub fn new(data: Vec<Event>, count: Option<u64>) -> Self {
        Self {
            data,
            count,
            invalid: false,
        }
    }

    pub fn invalid() -> Self {
        Self {
            data: Vec::new(),
            count: None,
            invalid: true,
        }
    }

    /// Parse a list payload leniently. Accepts the `{data, count}` envelope or a bare
    /// array; anything else yields an empty page flagged invalid.
    pub fn from_payload(text: &str) -> Self {
        if let Ok(page) = serde_json::from_str::<EventsResponse>(text) {
            // An object without "data" also parses; treat it as not-a-collection
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(text) {
                if map.get("data").map(|d| d.is_array()).unwrap_or(false) {
                    return page;
                }
            }
        }

        if let Ok(events) = serde_json::from_str::<Vec<Event>>(text) {
            return Self::new(events, None);
        }

        Self::invalid()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRegistration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub registration_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

/// Date (de)serialization for event timestamps.
///
/// The backend emits naive ISO timestamps (`2026-05-01T18:30:00`), sometimes with
/// fractional seconds or a UTC offset. Offsets are normalized to UTC.
pub mod event_date {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";
    const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc).naive_utc());
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", INPUT_FORMAT, "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    }

    pub fn serialize<S: Serializer>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(WIRE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid event date: {}", raw)))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw {
                Some(raw) => parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid event date: {}", raw))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_JSON: &str = r#"{
        "id": "0e65066c-ab20-4da0-b3bf-79dfd0668049",
        "title": "Spring Cleanup",
        "description": null,
        "date": "2026-04-18T09:00:00",
        "location": "Riverside Park",
        "organizer_id": "22b210e3-d325-41be-b761-31e18bfe2c73"
    }"#;

    #[test]
    fn test_parse_event() {
        let event: Event = serde_json::from_str(EVENT_JSON).expect("event should parse");
        assert_eq!(event.title, "Spring Cleanup");
        assert_eq!(event.description_display(), "N/A");
        assert_eq!(event.location_display(), "Riverside Park");
        assert_eq!(event.formatted_date(), "Apr 18, 2026");
        assert_eq!(event.date_input_value(), "2026-04-18T09:00");
    }

    #[test]
    fn test_parse_event_with_owner_alias() {
        let json = r#"{"id": "0e65066c-ab20-4da0-b3bf-79dfd0668049", "title": "Hike",
            "date": "2026-04-18T09:00:00.123456", "owner_id": "22b210e3-d325-41be-b761-31e18bfe2c73"}"#;
        let event: Event = serde_json::from_str(json).expect("event should parse");
        let owner: Uuid = "22b210e3-d325-41be-b761-31e18bfe2c73".parse().unwrap();
        assert!(event.is_organized_by(Some(owner)));
        assert!(!event.is_organized_by(None));
        assert_eq!(event.location_display(), "-");
    }

    #[test]
    fn test_event_date_parse_variants() {
        assert!(event_date::parse("2026-04-18T09:00").is_some());
        assert!(event_date::parse("2026-04-18 09:00").is_some());
        assert!(event_date::parse("2026-04-18T09:00:00Z").is_some());
        assert_eq!(
            event_date::parse("2026-04-18T09:00:00+02:00").map(|d| d.format("%H:%M").to_string()),
            Some("07:00".to_string())
        );
        assert!(event_date::parse("next tuesday").is_none());
        assert!(event_date::parse("").is_none());
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = EventUpdate {
            title: Some("New title".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"title": "New title"}));
        assert!(!update.is_empty());
        assert!(EventUpdate::default().is_empty());
    }

    #[test]
    fn test_events_response_envelope() {
        let json = format!(r#"{{"data": [{}], "count": 12}}"#, EVENT_JSON);
        let page = EventsResponse::from_payload(&json);
        assert!(!page.invalid);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.count, Some(12));
    }

    #[test]
    fn test_events_response_bare_array() {
        let json = format!("[{}]", EVENT_JSON);
        let page = EventsResponse::from_payload(&json);
        assert!(!page.invalid);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.count, None);
    }

    #[test]
    fn test_events_response_invalid_payloads() {
        assert!(EventsResponse::from_payload(r#"{"detail": "nope"}"#).invalid);
        assert!(EventsResponse::from_payload(r#"{"data": "nope"}"#).invalid);
        assert!(EventsResponse::from_payload("null").invalid);
        assert!(EventsResponse::from_payload("<html>").invalid);
    }

    #[test]
    fn test_local_events_get_unique_ids() {
        let create = EventCreate {
            title: "Potluck".to_string(),
            description: None,
            date: event_date::parse("2026-06-01T18:00").unwrap(),
            location: "Hall".to_string(),
        };
        let a = Event::local(&create, None);
        let b = Event::local(&create, None);
        assert_ne!(a.id, b.id);
        assert_eq!(a.location.as_deref(), Some("Hall"));
    }
}
