//! Date reconstruction for bare time-of-day values.
//!
//! The feed carries only times of day. A journey's zone is pinned once from
//! its first known time, and every later value is anchored to a calendar day
//! by comparing it with the previous resolved instant on a 24-hour wheel.

use crate::schedule::CallingPoint;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Etc::{GMTMinus1, GMT};
use chrono_tz::Europe::London;
use chrono_tz::Tz;

use std::fmt;

/// New time looks more than 6 h earlier than the reference: a new day began.
const WRAP_FORWARD_SECONDS: i64 = -21600;
/// New time looks 18 h or more later: the reference is really a day ahead.
const WRAP_BACKWARD_SECONDS: i64 = 64800;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeError {
    /// No usable seed time on the first calling point.
    MissingReferenceTime,
    /// No previous or seed instant to anchor an event against.
    AmbiguousReferenceTime,
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimeError::MissingReferenceTime => {
                write!(f, "first calling point carries no time to seed from")
            }
            TimeError::AmbiguousReferenceTime => {
                write!(f, "no previous instant to anchor a raw time against")
            }
        }
    }
}

/// Representative seed time for a journey: the first calling point's
/// earliest slot.
pub fn seed_time(points: &[CallingPoint]) -> Result<NaiveTime, TimeError> {
    points
        .first()
        .and_then(|p| p.raw.first())
        .ok_or(TimeError::MissingReferenceTime)
}

/// Pin the journey's zone from its start date and seed time.
///
/// The published timetable keeps one offset for a whole journey even when it
/// crosses a daylight-saving transition, so the civil zone is consulted once
/// and the journey gets a fixed-offset zone: Etc/GMT-1 (UTC+1) when London
/// is on summer time at the seed instant, Etc/GMT otherwise. Think the minus
/// sign is the wrong way round? See the POSIX-style Etc zone naming.
pub fn resolve_timezone(start_date: NaiveDate, seed: NaiveTime) -> Tz {
    let as_utc = Utc.from_utc_datetime(&start_date.and_time(seed));
    if as_utc.with_timezone(&London).offset().fix().local_minus_utc() == 3600 {
        GMTMinus1
    } else {
        GMT
    }
}

/// Anchor `raw` to a calendar day near `reference` and convert to UTC.
///
/// `reference_raw` is the reference instant's own time-of-day in the pinned
/// zone. The signed difference decides the day: a large negative delta means
/// the clock wrapped past midnight, a delta of 18 h or more means the
/// reference already sits a day ahead of the new value.
pub fn apply_date_to_time(
    tz: Tz,
    reference: DateTime<Utc>,
    reference_raw: NaiveTime,
    raw: NaiveTime,
) -> DateTime<Utc> {
    let delta =
        raw.num_seconds_from_midnight() as i64 - reference_raw.num_seconds_from_midnight() as i64;
    let local_date = reference.with_timezone(&tz).date_naive();
    let date = if delta < WRAP_FORWARD_SECONDS {
        local_date + Duration::days(1)
    } else if delta >= WRAP_BACKWARD_SECONDS {
        local_date - Duration::days(1)
    } else {
        local_date
    };
    // the pinned zones are fixed-offset, so localization is always single
    tz.from_local_datetime(&date.and_time(raw))
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

/// Walk the calling points in order, anchoring every present raw slot.
pub fn build_times(
    tz: Tz,
    start_date: NaiveDate,
    points: &mut [CallingPoint],
) -> Result<(), TimeError> {
    for i in 0..points.len() {
        let (before, rest) = points.split_at_mut(i);
        build_point_times(tz, start_date, before.last(), &mut rest[0])?;
    }
    Ok(())
}

fn build_point_times(
    tz: Tz,
    start_date: NaiveDate,
    previous: Option<&CallingPoint>,
    point: &mut CallingPoint,
) -> Result<(), TimeError> {
    if let Some(raw) = point.raw.working_arrival {
        let reference = reference_instant(tz, start_date, previous, point)?;
        point.resolved.working_arrival = Some(apply_date_to_time(
            tz,
            reference,
            reference.with_timezone(&tz).time(),
            raw,
        ));
    }
    if let Some(raw) = point.raw.public_arrival {
        let reference = reference_instant(tz, start_date, previous, point)?;
        point.resolved.public_arrival = Some(apply_date_to_time(
            tz,
            reference,
            reference.with_timezone(&tz).time(),
            raw,
        ));
    }
    if let Some(raw) = point.raw.working_pass {
        let reference = reference_instant(tz, start_date, previous, point)?;
        point.resolved.working_pass = Some(apply_date_to_time(
            tz,
            reference,
            reference.with_timezone(&tz).time(),
            raw,
        ));
    }
    if let Some(raw) = point.raw.public_departure {
        let reference = reference_instant(tz, start_date, previous, point)?;
        point.resolved.public_departure = Some(apply_date_to_time(
            tz,
            reference,
            reference.with_timezone(&tz).time(),
            raw,
        ));
    }
    if let Some(raw) = point.raw.working_departure {
        let reference = reference_instant(tz, start_date, previous, point)?;
        point.resolved.working_departure = Some(apply_date_to_time(
            tz,
            reference,
            reference.with_timezone(&tz).time(),
            raw,
        ));
    }
    Ok(())
}

/// Latest instant to anchor the next raw slot against: this point's own
/// resolved slots first, else the previous point's, else — first event of
/// the journey only — a seed built from the start date and this point's
/// latest raw slot, shifted by any published route delay.
fn reference_instant(
    tz: Tz,
    start_date: NaiveDate,
    previous: Option<&CallingPoint>,
    point: &CallingPoint,
) -> Result<DateTime<Utc>, TimeError> {
    if let Some(instant) = point.resolved.latest() {
        return Ok(instant);
    }
    match previous {
        Some(p) => p.resolved.latest().ok_or(TimeError::AmbiguousReferenceTime),
        None => {
            let raw = point.raw.latest().ok_or(TimeError::AmbiguousReferenceTime)?;
            let raw = match point.route_delay {
                // NaiveTime addition wraps around midnight
                Some(minutes) => raw + Duration::minutes(minutes as i64),
                None => raw,
            };
            Ok(tz
                .from_local_datetime(&start_date.and_time(raw))
                .single()
                .unwrap()
                .with_timezone(&Utc))
        }
    }
}
