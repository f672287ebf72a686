//! Decoded Push Port JSON envelope DTOs.
//!
//! Fields lean on `Option` heavily because the feed omits keys rather than
//! sending nulls.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use std::fmt;

/// One inbound envelope. Every record array defaults to empty so that a
/// message carrying only, say, train status records still decodes.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PushPortMessage {
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub schedule_messages: Vec<ScheduleMessage>,
    #[serde(default)]
    pub association_messages: Vec<AssociationMessage>,
    #[serde(default)]
    pub deactivated_messages: Vec<DeactivatedMessage>,
    #[serde(default)]
    pub train_status_messages: Vec<TrainStatusMessage>,
}

impl PushPortMessage {
    /// Bulk-resync envelopes must not overwrite records we already hold.
    pub fn is_snapshot(&self) -> bool {
        self.message_type.as_deref() == Some("snapshot")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScheduleMessage {
    pub rid: String,
    pub uid: String,
    pub headcode: String,
    pub start_date: String,
    pub toc_code: Option<String>,
    pub passenger_service: Option<bool>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub active: Option<bool>,
    pub deleted: Option<bool>,
    pub charter: Option<bool>,
    pub cancellation_reason: Option<ReasonMessage>,
    #[serde(default)]
    pub locations: Vec<ScheduleLocationMessage>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReasonMessage {
    pub code: Option<i32>,
    pub tiploc: Option<String>,
    pub near: Option<bool>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScheduleLocationMessage {
    pub location_type: String,
    pub tiploc: String,
    pub activity_codes: Option<String>,
    pub planned_activity_codes: Option<String>,
    pub cancelled: Option<bool>,
    pub false_tiploc: Option<String>,
    pub route_delay: Option<i32>,
    pub working_arrival_time: Option<String>,
    pub public_arrival_time: Option<String>,
    pub working_pass_time: Option<String>,
    pub public_departure_time: Option<String>,
    pub working_departure_time: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrainStatusMessage {
    pub rid: String,
    pub reverse_formation: Option<bool>,
    pub late_reason: Option<ReasonMessage>,
    #[serde(default)]
    pub locations: Vec<StatusLocationMessage>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatusLocationMessage {
    pub tiploc: String,
    pub working_arrival_time: Option<String>,
    pub public_arrival_time: Option<String>,
    pub working_pass_time: Option<String>,
    pub public_departure_time: Option<String>,
    pub working_departure_time: Option<String>,
    pub arrival: Option<ForecastMessage>,
    pub pass: Option<ForecastMessage>,
    pub departure: Option<ForecastMessage>,
    pub platform: Option<PlatformMessage>,
    pub suppressed: Option<bool>,
    pub length: Option<String>,
    pub detach_front: Option<bool>,
}

/// Live estimate/actual block for one event kind at one calling point.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ForecastMessage {
    pub estimated_time: Option<String>,
    pub working_estimated_time: Option<String>,
    pub actual_time: Option<String>,
    pub actual_time_removed: Option<bool>,
    pub manual_estimate_lower_limit_minutes: Option<i32>,
    pub manual_estimate_unknown_delay: Option<bool>,
    pub unknown_delay: Option<bool>,
    pub source: Option<String>,
    pub source_cis: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlatformMessage {
    pub suppressed: Option<bool>,
    pub suppressed_by_cis: Option<bool>,
    pub source: Option<String>,
    pub confirmed: Option<bool>,
    pub number: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AssociationMessage {
    pub tiploc: String,
    pub category: String,
    pub deleted: Option<bool>,
    pub cancelled: Option<bool>,
    pub main_service: AssociationEndMessage,
    pub associated_service: AssociationEndMessage,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AssociationEndMessage {
    pub rid: String,
    pub working_arrival_time: Option<String>,
    pub public_arrival_time: Option<String>,
    pub working_pass_time: Option<String>,
    pub public_departure_time: Option<String>,
    pub working_departure_time: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DeactivatedMessage {
    pub rid: String,
}

/// A record field that failed to parse. Always record-scoped: the record is
/// skipped and the rest of the envelope continues.
#[derive(Debug)]
pub enum FieldError {
    Time { field: &'static str, value: String },
    Date { value: String },
    PointType { value: String },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldError::Time { field, value } => {
                write!(f, "unparseable time-of-day in {}: {:?}", field, value)
            }
            FieldError::Date { value } => write!(f, "unparseable start date {:?}", value),
            FieldError::PointType { value } => write!(f, "unknown location type {:?}", value),
        }
    }
}

/// The feed writes times as either "HH:MM:SS" or "HH:MM".
pub fn parse_raw_time(field: &'static str, value: &str) -> Result<NaiveTime, FieldError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| FieldError::Time {
            field,
            value: value.to_string(),
        })
}

pub fn parse_opt_time(
    field: &'static str,
    value: &Option<String>,
) -> Result<Option<NaiveTime>, FieldError> {
    match value {
        Some(v) => Ok(Some(parse_raw_time(field, v)?)),
        None => Ok(None),
    }
}

pub fn parse_start_date(value: &str) -> Result<NaiveDate, FieldError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| FieldError::Date {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_time_formats() {
        assert_eq!(
            parse_raw_time("working_arrival_time", "23:50:30").unwrap(),
            NaiveTime::from_hms_opt(23, 50, 30).unwrap()
        );
        assert_eq!(
            parse_raw_time("working_arrival_time", "23:50").unwrap(),
            NaiveTime::from_hms_opt(23, 50, 0).unwrap()
        );
        assert!(parse_raw_time("working_arrival_time", "25:00").is_err());
    }

    #[test]
    fn envelope_defaults_to_empty_record_arrays() {
        let message: PushPortMessage = serde_json::from_str(r#"{}"#).unwrap();
        assert!(message.schedule_messages.is_empty());
        assert!(message.train_status_messages.is_empty());
        assert!(!message.is_snapshot());

        let message: PushPortMessage =
            serde_json::from_str(r#"{"message_type": "snapshot"}"#).unwrap();
        assert!(message.is_snapshot());
    }

    #[test]
    fn decodes_schedule_record() {
        let message: PushPortMessage = serde_json::from_str(
            r#"{
                "schedule_messages": [{
                    "rid": "202401107126731",
                    "uid": "C70871",
                    "headcode": "1A99",
                    "start_date": "2024-01-10",
                    "toc_code": "VT",
                    "passenger_service": true,
                    "active": true,
                    "locations": [{
                        "location_type": "OR",
                        "tiploc": "EUSTON",
                        "working_departure_time": "23:50"
                    }]
                }]
            }"#,
        )
        .unwrap();
        let schedule = &message.schedule_messages[0];
        assert_eq!(schedule.rid, "202401107126731");
        assert_eq!(schedule.locations.len(), 1);
        assert_eq!(
            schedule.locations[0].working_departure_time.as_deref(),
            Some("23:50")
        );
        assert!(schedule.locations[0].working_arrival_time.is_none());
    }
}
