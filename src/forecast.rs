//! Matching live-running updates onto stored calling points.
//!
//! A status record carries a tiploc and raw working times but no position
//! and no date, so rows are matched by a tiered key and every forecast time
//! is anchored against the stored row's own resolved instants.

use crate::message::{parse_opt_time, FieldError, ForecastMessage};
use crate::schedule::{RawTimes, StoredPoint};
use crate::times;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// How an update matched a stored row, which also bounds the merge scope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MatchTier {
    Full,
    ArrivalOnly,
    DepartureOnly,
}

/// Find the stored row a status location belongs to.
///
/// Rows are scanned in stored order; for each row the full key is tried
/// first, then the arrival-only key, then the departure-only key, and the
/// first hit anywhere wins. The tier order is load-bearing and deliberately
/// unchanged from how the feed has always been applied.
pub fn match_point<'a>(
    stored: &'a [StoredPoint],
    tiploc: &str,
    raw: &RawTimes,
) -> Option<(&'a StoredPoint, MatchTier)> {
    for row in stored {
        if row.tiploc != tiploc {
            continue;
        }
        if row.raw.working_arrival == raw.working_arrival
            && row.raw.working_pass == raw.working_pass
            && row.raw.working_departure == raw.working_departure
        {
            return Some((row, MatchTier::Full));
        }
        if raw.working_arrival.is_some() && row.raw.working_arrival == raw.working_arrival {
            return Some((row, MatchTier::ArrivalOnly));
        }
        if raw.working_departure.is_some() && row.raw.working_departure == raw.working_departure {
            return Some((row, MatchTier::DepartureOnly));
        }
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    Arrival,
    Pass,
    Departure,
}

/// A forecast block with its times anchored to calendar days, ready to
/// persist.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventForecast {
    pub estimated: Option<DateTime<Utc>>,
    pub working_estimated: Option<DateTime<Utc>>,
    pub actual: Option<DateTime<Utc>>,
    pub actual_removed: Option<bool>,
    pub manual_estimate_lower_limit_minutes: Option<i32>,
    pub manual_estimate_unknown_delay: Option<bool>,
    pub unknown_delay: Option<bool>,
    pub source: Option<String>,
    pub source_cis: Option<String>,
}

/// Anchor one event kind's forecast payload against the stored row.
///
/// Each time is dated from the stored instant of the same event kind:
/// estimated times prefer the public slot's reference before the working
/// one, and departure forecasts fall back to the working-departure
/// reference so they can still be dated at origins, which have no arrival.
/// A time whose reference is absent stays unset.
pub fn build_event_forecast(
    kind: EventKind,
    row: &StoredPoint,
    payload: Option<&ForecastMessage>,
    tz: Tz,
) -> Result<EventForecast, FieldError> {
    let payload = match payload {
        Some(p) => p,
        None => return Ok(EventForecast::default()),
    };

    let working_reference = match kind {
        EventKind::Arrival => row.working_arrival_reference(),
        EventKind::Pass => row.working_pass_reference(),
        EventKind::Departure => row
            .working_arrival_reference()
            .or_else(|| row.working_departure_reference()),
    };
    let estimate_reference = match kind {
        EventKind::Arrival => row
            .public_arrival_reference()
            .or_else(|| row.working_arrival_reference()),
        EventKind::Pass => row.working_pass_reference(),
        EventKind::Departure => row
            .public_arrival_reference()
            .or_else(|| row.working_arrival_reference())
            .or_else(|| row.working_departure_reference()),
    };

    Ok(EventForecast {
        estimated: anchor(
            tz,
            estimate_reference,
            parse_opt_time("estimated_time", &payload.estimated_time)?,
        ),
        working_estimated: anchor(
            tz,
            working_reference,
            parse_opt_time("working_estimated_time", &payload.working_estimated_time)?,
        ),
        actual: anchor(
            tz,
            working_reference,
            parse_opt_time("actual_time", &payload.actual_time)?,
        ),
        actual_removed: payload.actual_time_removed,
        manual_estimate_lower_limit_minutes: payload.manual_estimate_lower_limit_minutes,
        manual_estimate_unknown_delay: payload.manual_estimate_unknown_delay,
        unknown_delay: payload.unknown_delay,
        source: payload.source.clone(),
        source_cis: payload.source_cis.clone(),
    })
}

fn anchor(
    tz: Tz,
    reference: Option<(DateTime<Utc>, NaiveTime)>,
    raw: Option<NaiveTime>,
) -> Option<DateTime<Utc>> {
    let (reference, reference_raw) = reference?;
    let raw = raw?;
    Some(times::apply_date_to_time(tz, reference, reference_raw, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ResolvedTimes;
    use chrono::TimeZone;
    use chrono_tz::Etc::GMT;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn instant(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap()
    }

    fn row(id: i64, raw: RawTimes, resolved: ResolvedTimes) -> StoredPoint {
        StoredPoint {
            id,
            tiploc: "CREWE".to_string(),
            resolved,
            raw,
        }
    }

    fn arrival_and_departure_row(id: i64) -> StoredPoint {
        row(
            id,
            RawTimes {
                working_arrival: Some(time(10, 0)),
                working_departure: Some(time(10, 5)),
                ..Default::default()
            },
            ResolvedTimes {
                working_arrival: Some(instant(10, 10, 0)),
                working_departure: Some(instant(10, 10, 5)),
                ..Default::default()
            },
        )
    }

    #[test]
    fn full_tier_requires_all_three_working_times() {
        let stored = vec![arrival_and_departure_row(1)];
        let raw = RawTimes {
            working_arrival: Some(time(10, 0)),
            working_departure: Some(time(10, 5)),
            ..Default::default()
        };
        let (hit, tier) = match_point(&stored, "CREWE", &raw).unwrap();
        assert_eq!(hit.id, 1);
        assert_eq!(tier, MatchTier::Full);
    }

    #[test]
    fn arrival_only_update_hits_the_second_tier() {
        // stored row has a departure too, so the full key cannot match an
        // update that carries only the arrival
        let stored = vec![arrival_and_departure_row(1)];
        let raw = RawTimes {
            working_arrival: Some(time(10, 0)),
            ..Default::default()
        };
        let (hit, tier) = match_point(&stored, "CREWE", &raw).unwrap();
        assert_eq!(hit.id, 1);
        assert_eq!(tier, MatchTier::ArrivalOnly);
    }

    #[test]
    fn departure_only_update_hits_the_third_tier() {
        let stored = vec![arrival_and_departure_row(1)];
        let raw = RawTimes {
            working_departure: Some(time(10, 5)),
            ..Default::default()
        };
        let (hit, tier) = match_point(&stored, "CREWE", &raw).unwrap();
        assert_eq!(hit.id, 1);
        assert_eq!(tier, MatchTier::DepartureOnly);
    }

    #[test]
    fn rows_are_scanned_in_stored_order() {
        // the first row only partially matches while the second would match
        // fully; the scan is row-major so the partial hit wins
        let first = arrival_and_departure_row(1);
        let second = row(
            2,
            RawTimes {
                working_arrival: Some(time(10, 0)),
                ..Default::default()
            },
            ResolvedTimes::default(),
        );
        let stored = vec![first, second];
        let raw = RawTimes {
            working_arrival: Some(time(10, 0)),
            ..Default::default()
        };
        let (hit, tier) = match_point(&stored, "CREWE", &raw).unwrap();
        assert_eq!(hit.id, 1);
        assert_eq!(tier, MatchTier::ArrivalOnly);
    }

    #[test]
    fn no_tier_matches_unknown_times() {
        let stored = vec![arrival_and_departure_row(1)];
        let raw = RawTimes {
            working_arrival: Some(time(11, 0)),
            ..Default::default()
        };
        assert!(match_point(&stored, "CREWE", &raw).is_none());
        assert!(match_point(&stored, "EUSTON", &RawTimes::default()).is_none());
    }

    #[test]
    fn forecast_times_roll_past_midnight() {
        let row = row(
            1,
            RawTimes {
                working_arrival: Some(time(23, 50)),
                ..Default::default()
            },
            ResolvedTimes {
                working_arrival: Some(instant(10, 23, 50)),
                ..Default::default()
            },
        );
        let payload = ForecastMessage {
            estimated_time: Some("00:10".to_string()),
            ..Default::default()
        };
        let forecast = build_event_forecast(EventKind::Arrival, &row, Some(&payload), GMT).unwrap();
        assert_eq!(forecast.estimated, Some(instant(11, 0, 10)));
        assert_eq!(forecast.actual, None);
    }

    #[test]
    fn departure_forecast_is_dated_at_an_origin() {
        // origins have no arrival to reference; the working departure
        // carries the dating instead
        let row = row(
            1,
            RawTimes {
                working_departure: Some(time(23, 55)),
                ..Default::default()
            },
            ResolvedTimes {
                working_departure: Some(instant(10, 23, 55)),
                ..Default::default()
            },
        );
        let payload = ForecastMessage {
            estimated_time: Some("00:05".to_string()),
            actual_time: Some("00:06".to_string()),
            ..Default::default()
        };
        let forecast =
            build_event_forecast(EventKind::Departure, &row, Some(&payload), GMT).unwrap();
        assert_eq!(forecast.estimated, Some(instant(11, 0, 5)));
        assert_eq!(forecast.actual, Some(instant(11, 0, 6)));
    }

    #[test]
    fn missing_reference_leaves_the_time_unset() {
        let row = row(1, RawTimes::default(), ResolvedTimes::default());
        let payload = ForecastMessage {
            estimated_time: Some("12:00".to_string()),
            unknown_delay: Some(true),
            ..Default::default()
        };
        let forecast = build_event_forecast(EventKind::Pass, &row, Some(&payload), GMT).unwrap();
        assert_eq!(forecast.estimated, None);
        // the flags still merge even when no time could be dated
        assert_eq!(forecast.unknown_delay, Some(true));
    }

    #[test]
    fn absent_payload_merges_nothing() {
        let row = arrival_and_departure_row(1);
        let forecast = build_event_forecast(EventKind::Arrival, &row, None, GMT).unwrap();
        assert_eq!(forecast, EventForecast::default());
    }
}
