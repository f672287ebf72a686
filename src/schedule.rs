use crate::message::{parse_opt_time, FieldError, ScheduleLocationMessage};

use chrono::{DateTime, NaiveTime, Utc};

/// Calling point role within a journey.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointType {
    Origin,
    OperationalOrigin,
    Intermediate,
    OperationalIntermediate,
    Pass,
    Destination,
    OperationalDestination,
}

impl PointType {
    pub fn from_code(code: &str) -> Option<PointType> {
        match code {
            "OR" => Some(PointType::Origin),
            "OPOR" => Some(PointType::OperationalOrigin),
            "IP" => Some(PointType::Intermediate),
            "OPIP" => Some(PointType::OperationalIntermediate),
            "PP" => Some(PointType::Pass),
            "DT" => Some(PointType::Destination),
            "OPDT" => Some(PointType::OperationalDestination),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PointType::Origin => "OR",
            PointType::OperationalOrigin => "OPOR",
            PointType::Intermediate => "IP",
            PointType::OperationalIntermediate => "OPIP",
            PointType::Pass => "PP",
            PointType::Destination => "DT",
            PointType::OperationalDestination => "OPDT",
        }
    }
}

/// The five time-of-day slots a calling point can carry, bare of any date.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawTimes {
    pub working_arrival: Option<NaiveTime>,
    pub public_arrival: Option<NaiveTime>,
    pub working_pass: Option<NaiveTime>,
    pub public_departure: Option<NaiveTime>,
    pub working_departure: Option<NaiveTime>,
}

impl RawTimes {
    pub fn parse(
        working_arrival: &Option<String>,
        public_arrival: &Option<String>,
        working_pass: &Option<String>,
        public_departure: &Option<String>,
        working_departure: &Option<String>,
    ) -> Result<RawTimes, FieldError> {
        Ok(RawTimes {
            working_arrival: parse_opt_time("working_arrival_time", working_arrival)?,
            public_arrival: parse_opt_time("public_arrival_time", public_arrival)?,
            working_pass: parse_opt_time("working_pass_time", working_pass)?,
            public_departure: parse_opt_time("public_departure_time", public_departure)?,
            working_departure: parse_opt_time("working_departure_time", working_departure)?,
        })
    }

    /// Latest slot present, scanning departure-first.
    pub fn latest(&self) -> Option<NaiveTime> {
        self.working_departure
            .or(self.public_departure)
            .or(self.working_pass)
            .or(self.public_arrival)
            .or(self.working_arrival)
    }

    /// Earliest slot present, scanning arrival-first.
    pub fn first(&self) -> Option<NaiveTime> {
        self.working_arrival
            .or(self.public_arrival)
            .or(self.working_pass)
            .or(self.public_departure)
            .or(self.working_departure)
    }
}

/// The same five slots once each has been anchored to a calendar day and
/// converted to UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResolvedTimes {
    pub working_arrival: Option<DateTime<Utc>>,
    pub public_arrival: Option<DateTime<Utc>>,
    pub working_pass: Option<DateTime<Utc>>,
    pub public_departure: Option<DateTime<Utc>>,
    pub working_departure: Option<DateTime<Utc>>,
}

impl ResolvedTimes {
    /// Latest slot resolved so far, scanning departure-first.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.working_departure
            .or(self.public_departure)
            .or(self.working_pass)
            .or(self.public_arrival)
            .or(self.working_arrival)
    }
}

/// One stop or pass-through on a journey, as carried by a schedule message.
#[derive(Clone, Debug)]
pub struct CallingPoint {
    pub point_type: PointType,
    pub tiploc: String,
    pub activity_codes: Option<String>,
    pub planned_activity_codes: Option<String>,
    pub cancelled: Option<bool>,
    pub false_tiploc: Option<String>,
    pub route_delay: Option<i32>,
    pub raw: RawTimes,
    pub resolved: ResolvedTimes,
}

impl CallingPoint {
    pub fn from_message(message: &ScheduleLocationMessage) -> Result<CallingPoint, FieldError> {
        let point_type =
            PointType::from_code(&message.location_type).ok_or_else(|| FieldError::PointType {
                value: message.location_type.clone(),
            })?;
        Ok(CallingPoint {
            point_type,
            tiploc: message.tiploc.clone(),
            activity_codes: message.activity_codes.clone(),
            planned_activity_codes: message.planned_activity_codes.clone(),
            cancelled: message.cancelled,
            false_tiploc: message.false_tiploc.clone(),
            route_delay: message.route_delay,
            raw: RawTimes::parse(
                &message.working_arrival_time,
                &message.public_arrival_time,
                &message.working_pass_time,
                &message.public_departure_time,
                &message.working_departure_time,
            )?,
            resolved: ResolvedTimes::default(),
        })
    }
}

/// Image of a persisted `schedule_location` row, as much of it as the
/// reconciler and the status matcher need.
#[derive(Clone, Debug)]
pub struct StoredPoint {
    pub id: i64,
    pub tiploc: String,
    pub resolved: ResolvedTimes,
    pub raw: RawTimes,
}

impl StoredPoint {
    pub fn working_arrival_reference(&self) -> Option<(DateTime<Utc>, NaiveTime)> {
        self.resolved.working_arrival.zip(self.raw.working_arrival)
    }

    pub fn public_arrival_reference(&self) -> Option<(DateTime<Utc>, NaiveTime)> {
        self.resolved.public_arrival.zip(self.raw.public_arrival)
    }

    pub fn working_pass_reference(&self) -> Option<(DateTime<Utc>, NaiveTime)> {
        self.resolved.working_pass.zip(self.raw.working_pass)
    }

    pub fn working_departure_reference(&self) -> Option<(DateTime<Utc>, NaiveTime)> {
        self.resolved
            .working_departure
            .zip(self.raw.working_departure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_type_codes_round_trip() {
        for code in ["OR", "OPOR", "IP", "OPIP", "PP", "DT", "OPDT"] {
            assert_eq!(PointType::from_code(code).unwrap().code(), code);
        }
        assert!(PointType::from_code("XX").is_none());
    }

    #[test]
    fn raw_times_scan_order() {
        let times = RawTimes {
            working_arrival: NaiveTime::from_hms_opt(10, 0, 0),
            public_arrival: None,
            working_pass: None,
            public_departure: None,
            working_departure: NaiveTime::from_hms_opt(10, 2, 0),
        };
        assert_eq!(times.first(), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(times.latest(), NaiveTime::from_hms_opt(10, 2, 0));

        let pass_only = RawTimes {
            working_pass: NaiveTime::from_hms_opt(11, 30, 0),
            ..Default::default()
        };
        assert_eq!(pass_only.first(), NaiveTime::from_hms_opt(11, 30, 0));
        assert_eq!(pass_only.latest(), NaiveTime::from_hms_opt(11, 30, 0));
    }

    #[test]
    fn calling_point_from_message_rejects_unknown_type() {
        let message = ScheduleLocationMessage {
            location_type: "ZZ".to_string(),
            tiploc: "EUSTON".to_string(),
            activity_codes: None,
            planned_activity_codes: None,
            cancelled: None,
            false_tiploc: None,
            route_delay: None,
            working_arrival_time: None,
            public_arrival_time: None,
            working_pass_time: None,
            public_departure_time: None,
            working_departure_time: None,
        };
        assert!(CallingPoint::from_message(&message).is_err());
    }
}
