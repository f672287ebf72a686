//! Convergence of a stored calling-point set onto an incoming sequence.
//!
//! The feed carries no stable per-point identifiers, so rows are matched on
//! location plus the three working instants. Planning is pure; the store
//! executes the returned operations inside the envelope's transaction.

use crate::schedule::{CallingPoint, StoredPoint};

/// What to do with an existing keyed record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpsertAction {
    Insert,
    Update,
    /// Snapshot envelopes must not overwrite records we already hold.
    Skip,
}

pub fn upsert_action(already_stored: bool, snapshot: bool) -> UpsertAction {
    match (already_stored, snapshot) {
        (false, _) => UpsertAction::Insert,
        (true, false) => UpsertAction::Update,
        (true, true) => UpsertAction::Skip,
    }
}

#[derive(Debug)]
pub enum PointOp<'a> {
    Update {
        id: i64,
        position: i16,
        point: &'a CallingPoint,
    },
    Insert {
        position: i16,
        point: &'a CallingPoint,
    },
    Delete {
        id: i64,
        tiploc: String,
    },
}

/// Greedy one-pass diff of the incoming sequence against the stored set.
///
/// Each incoming point takes the first stored row that still matches its
/// (tiploc, working instants) tuple, with unset matching unset; matched rows
/// leave the pool so they cannot match twice. Unmatched incoming points
/// become inserts at their ordinal position, and stored rows left over at
/// the end are deleted. Duplicate points with identical location and times
/// cannot be told apart here; the first remaining row wins.
pub fn reconcile<'a>(incoming: &'a [CallingPoint], stored: Vec<StoredPoint>) -> Vec<PointOp<'a>> {
    let mut remaining = stored;
    let mut ops = Vec::new();

    for (position, point) in incoming.iter().enumerate() {
        let position = position as i16;
        match remaining.iter().position(|row| matches_point(row, point)) {
            Some(index) => {
                let row = remaining.remove(index);
                ops.push(PointOp::Update {
                    id: row.id,
                    position,
                    point,
                });
            }
            None => ops.push(PointOp::Insert { position, point }),
        }
    }

    for row in remaining {
        ops.push(PointOp::Delete {
            id: row.id,
            tiploc: row.tiploc,
        });
    }

    ops
}

fn matches_point(row: &StoredPoint, point: &CallingPoint) -> bool {
    row.tiploc == point.tiploc
        && row.resolved.working_arrival == point.resolved.working_arrival
        && row.resolved.working_pass == point.resolved.working_pass
        && row.resolved.working_departure == point.resolved.working_departure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{PointType, RawTimes, ResolvedTimes};
    use chrono::{DateTime, TimeZone, Utc};

    fn instant(h: u32, m: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 1, 10, h, m, 0).unwrap())
    }

    fn incoming(tiploc: &str, arrival_minute: u32) -> CallingPoint {
        CallingPoint {
            point_type: PointType::Intermediate,
            tiploc: tiploc.to_string(),
            activity_codes: None,
            planned_activity_codes: None,
            cancelled: None,
            false_tiploc: None,
            route_delay: None,
            raw: RawTimes::default(),
            resolved: ResolvedTimes {
                working_arrival: instant(10, arrival_minute),
                ..Default::default()
            },
        }
    }

    fn stored(id: i64, tiploc: &str, arrival_minute: u32) -> StoredPoint {
        StoredPoint {
            id,
            tiploc: tiploc.to_string(),
            resolved: ResolvedTimes {
                working_arrival: instant(10, arrival_minute),
                ..Default::default()
            },
            raw: RawTimes::default(),
        }
    }

    #[test]
    fn inserts_everything_for_an_unknown_schedule() {
        let points = vec![incoming("AAA", 0), incoming("BBB", 10)];
        let ops = reconcile(&points, Vec::new());
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], PointOp::Insert { position: 0, .. }));
        assert!(matches!(ops[1], PointOp::Insert { position: 1, .. }));
    }

    #[test]
    fn converges_abc_to_acd() {
        let points = vec![incoming("AAA", 0), incoming("CCC", 20), incoming("DDD", 30)];
        let rows = vec![stored(1, "AAA", 0), stored(2, "BBB", 10), stored(3, "CCC", 20)];

        let ops = reconcile(&points, rows);
        assert_eq!(ops.len(), 4);
        assert!(matches!(ops[0], PointOp::Update { id: 1, position: 0, .. }));
        assert!(matches!(ops[1], PointOp::Update { id: 3, position: 1, .. }));
        assert!(matches!(ops[2], PointOp::Insert { position: 2, .. }));
        assert!(matches!(ops[3], PointOp::Delete { id: 2, .. }));
    }

    #[test]
    fn second_application_is_all_updates() {
        let points = vec![incoming("AAA", 0), incoming("BBB", 10)];
        let rows = vec![stored(7, "AAA", 0), stored(8, "BBB", 10)];

        let ops = reconcile(&points, rows);
        assert_eq!(ops.len(), 2);
        for op in &ops {
            assert!(matches!(op, PointOp::Update { .. }));
        }
    }

    #[test]
    fn unset_times_match_unset_times() {
        let point = incoming("AAA", 0);
        let mut row = stored(1, "AAA", 0);
        // both sides have no pass or departure instants
        assert!(matches_point(&row, &point));

        row.resolved.working_departure = instant(10, 5);
        assert!(!matches_point(&row, &point));
    }

    #[test]
    fn a_row_cannot_match_twice() {
        // two identical incoming points against one stored row: the second
        // becomes an insert
        let points = vec![incoming("AAA", 0), incoming("AAA", 0)];
        let rows = vec![stored(1, "AAA", 0)];

        let ops = reconcile(&points, rows);
        assert!(matches!(ops[0], PointOp::Update { id: 1, .. }));
        assert!(matches!(ops[1], PointOp::Insert { position: 1, .. }));
    }

    #[test]
    fn snapshot_never_overwrites() {
        assert_eq!(upsert_action(false, false), UpsertAction::Insert);
        assert_eq!(upsert_action(false, true), UpsertAction::Insert);
        assert_eq!(upsert_action(true, false), UpsertAction::Update);
        assert_eq!(upsert_action(true, true), UpsertAction::Skip);
    }
}
