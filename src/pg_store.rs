//! Postgres store.
//!
//! Tables and statements are generated from ordered field descriptors, the
//! statements are prepared once at start-up, and every envelope is applied
//! inside a single transaction committed before the delivery is acked.

use crate::error::Error;
use crate::forecast::{self, EventForecast, EventKind, MatchTier};
use crate::message::{
    self, AssociationMessage, DeactivatedMessage, PushPortMessage, ReasonMessage, ScheduleMessage,
    StatusLocationMessage, TrainStatusMessage,
};
use crate::reconcile::{self, PointOp, UpsertAction};
use crate::schedule::{CallingPoint, RawTimes, ResolvedTimes, StoredPoint};
use crate::store::{ApplyError, RecordError, Store};
use crate::times;

use async_trait::async_trait;

use chrono_tz::Tz;

use serde::Deserialize;

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, Statement, Transaction};

use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug)]
struct Field {
    name: &'static str,
    sql_type: &'static str,
}

const fn field(name: &'static str, sql_type: &'static str) -> Field {
    Field { name, sql_type }
}

const SCHEDULE_FIELDS: [Field; 19] = [
    field("rid", "varchar PRIMARY KEY NOT NULL"),
    field("uid", "varchar NOT NULL"),
    field("headcode", "varchar NOT NULL"),
    field("start_date", "date NOT NULL"),
    field("toc_code", "varchar"),
    field("passenger_service", "boolean"),
    field("status", "varchar"),
    field("category", "varchar"),
    field("active", "boolean"),
    field("deleted", "boolean"),
    field("charter", "boolean"),
    field("cancellation_reason_code", "integer"),
    field("cancellation_reason_tiploc", "varchar"),
    field("cancellation_reason_near", "boolean"),
    field("timezone", "varchar"),
    field("reverse_formation", "boolean"),
    field("late_reason_code", "integer"),
    field("late_reason_tiploc", "varchar"),
    field("late_reason_near", "boolean"),
];

const SCHEDULE_LOCATION_FIELDS: [Field; 28] = [
    field("id", "bigserial PRIMARY KEY NOT NULL"),
    field("rid", "varchar REFERENCES schedule (rid)"),
    field("type", "varchar NOT NULL"),
    field("position", "smallint NOT NULL"),
    field("tiploc", "varchar NOT NULL"),
    field("activity_codes", "varchar"),
    field("planned_activity_codes", "varchar"),
    field("cancelled", "boolean"),
    field("false_tiploc", "varchar"),
    field("route_delay", "integer"),
    field("working_arrival_time", "timestamp with time zone"),
    field("public_arrival_time", "timestamp with time zone"),
    field("working_pass_time", "timestamp with time zone"),
    field("public_departure_time", "timestamp with time zone"),
    field("working_departure_time", "timestamp with time zone"),
    field("raw_working_arrival_time", "time"),
    field("raw_public_arrival_time", "time"),
    field("raw_working_pass_time", "time"),
    field("raw_public_departure_time", "time"),
    field("raw_working_departure_time", "time"),
    field("suppressed", "boolean"),
    field("length", "varchar"),
    field("detach_front", "boolean"),
    field("platform_suppressed", "boolean"),
    field("platform_suppressed_by_cis", "boolean"),
    field("platform_source", "varchar"),
    field("platform_confirmed", "boolean"),
    field("platform_number", "varchar"),
];

const ASSOCIATION_FIELDS: [Field; 17] = [
    field("id", "bigserial PRIMARY KEY NOT NULL"),
    field("tiploc", "varchar NOT NULL"),
    field("category", "varchar NOT NULL"),
    field("deleted", "boolean"),
    field("cancelled", "boolean"),
    field("main_rid", "varchar NOT NULL"),
    field("main_raw_working_arrival_time", "time"),
    field("main_raw_public_arrival_time", "time"),
    field("main_raw_working_pass_time", "time"),
    field("main_raw_public_departure_time", "time"),
    field("main_raw_working_departure_time", "time"),
    field("assoc_rid", "varchar NOT NULL"),
    field("assoc_raw_working_arrival_time", "time"),
    field("assoc_raw_public_arrival_time", "time"),
    field("assoc_raw_working_pass_time", "time"),
    field("assoc_raw_public_departure_time", "time"),
    field("assoc_raw_working_departure_time", "time"),
];

/// One forecast block per event kind, appended to the location table for
/// arrival, pass and departure.
const FORECAST_FIELDS: [(&str, &str); 9] = [
    ("estimated_time", "timestamp with time zone"),
    ("working_estimated_time", "timestamp with time zone"),
    ("actual_time", "timestamp with time zone"),
    ("actual_time_removed", "boolean"),
    ("manual_estimate_lower_limit_minutes", "integer"),
    ("manual_estimate_unknown_delay", "boolean"),
    ("unknown_delay", "boolean"),
    ("source", "varchar"),
    ("source_cis", "varchar"),
];

const FORECAST_KINDS: [&str; 3] = ["arrival", "pass", "departure"];

/// Columns rewritten by every live-update tier alongside the forecast
/// blocks themselves.
const LIVE_COMMON_COLUMNS: [&str; 8] = [
    "suppressed",
    "length",
    "detach_front",
    "platform_suppressed",
    "platform_suppressed_by_cis",
    "platform_source",
    "platform_confirmed",
    "platform_number",
];

/// Columns the reconciler rewrites when an incoming point matches a stored
/// row.
const POINT_UPDATE_COLUMNS: [&str; 16] = [
    "type",
    "position",
    "activity_codes",
    "planned_activity_codes",
    "cancelled",
    "false_tiploc",
    "working_arrival_time",
    "public_arrival_time",
    "working_pass_time",
    "public_departure_time",
    "working_departure_time",
    "raw_working_arrival_time",
    "raw_public_arrival_time",
    "raw_working_pass_time",
    "raw_public_departure_time",
    "raw_working_departure_time",
];

fn create_table_sql(table: &str, fields: &[Field]) -> String {
    let columns = fields
        .iter()
        .map(|f| format!("{} {}", f.name, f.sql_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", table, columns)
}

fn schedule_location_create_sql() -> String {
    let mut columns = SCHEDULE_LOCATION_FIELDS
        .iter()
        .map(|f| format!("{} {}", f.name, f.sql_type))
        .collect::<Vec<_>>();
    for kind in FORECAST_KINDS {
        for (suffix, sql_type) in FORECAST_FIELDS {
            columns.push(format!("forecast_{}_{} {}", kind, suffix, sql_type));
        }
    }
    format!(
        "CREATE TABLE IF NOT EXISTS schedule_location ({})",
        columns.join(", ")
    )
}

fn insert_sql(table: &str, fields: &[Field]) -> String {
    let names = fields.iter().map(|f| f.name).collect::<Vec<_>>().join(", ");
    let values = (1..=fields.len())
        .map(|n| format!("${}", n))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) VALUES ({})", table, names, values)
}

fn update_sql(table: &str, fields: &[Field], key: &str) -> String {
    let assignments = fields
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{}=${}", f.name, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE {}=${}",
        table,
        assignments,
        key,
        fields.len() + 1
    )
}

fn update_by_id_sql(table: &str, columns: &[String]) -> String {
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}=${}", c, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE id=${}",
        table,
        assignments,
        columns.len() + 1
    )
}

/// Column list for a live update covering the given forecast kinds.
fn live_update_columns(kinds: &[&str]) -> Vec<String> {
    let mut columns: Vec<String> = LIVE_COMMON_COLUMNS.iter().map(|c| c.to_string()).collect();
    for kind in kinds {
        for (suffix, _) in FORECAST_FIELDS {
            columns.push(format!("forecast_{}_{}", kind, suffix));
        }
    }
    columns
}

fn select_points_sql() -> &'static str {
    "SELECT id, tiploc, working_arrival_time, public_arrival_time, working_pass_time, \
     public_departure_time, working_departure_time, raw_working_arrival_time, \
     raw_public_arrival_time, raw_working_pass_time, raw_public_departure_time, \
     raw_working_departure_time FROM schedule_location WHERE rid=$1 ORDER BY position, id"
}

struct Statements {
    select_schedule: Statement,
    insert_schedule: Statement,
    update_schedule: Statement,
    update_schedule_live: Statement,
    deactivate_schedule: Statement,
    select_points: Statement,
    insert_point: Statement,
    update_point: Statement,
    delete_point: Statement,
    update_point_full: Statement,
    update_point_arrival: Statement,
    update_point_departure: Statement,
    check_association: Statement,
    insert_association: Statement,
    update_association: Statement,
}

impl Statements {
    async fn prepare(client: &Client) -> Result<Statements, tokio_postgres::Error> {
        let point_update_columns: Vec<String> =
            POINT_UPDATE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let association_columns: Vec<String> = ASSOCIATION_FIELDS[1..]
            .iter()
            .map(|f| f.name.to_string())
            .collect();
        Ok(Statements {
            select_schedule: client.prepare("SELECT rid FROM schedule WHERE rid=$1").await?,
            insert_schedule: client
                .prepare(&insert_sql("schedule", &SCHEDULE_FIELDS[..15]))
                .await?,
            update_schedule: client
                .prepare(&update_sql("schedule", &SCHEDULE_FIELDS[1..15], "rid"))
                .await?,
            update_schedule_live: client
                .prepare(&format!(
                    "{} RETURNING timezone",
                    update_sql("schedule", &SCHEDULE_FIELDS[15..19], "rid")
                ))
                .await?,
            deactivate_schedule: client
                .prepare("UPDATE schedule SET active=false WHERE rid=$1")
                .await?,
            select_points: client.prepare(select_points_sql()).await?,
            insert_point: client
                .prepare(&insert_sql(
                    "schedule_location",
                    &SCHEDULE_LOCATION_FIELDS[1..20],
                ))
                .await?,
            update_point: client
                .prepare(&update_by_id_sql("schedule_location", &point_update_columns))
                .await?,
            delete_point: client
                .prepare("DELETE FROM schedule_location WHERE id=$1")
                .await?,
            update_point_full: client
                .prepare(&update_by_id_sql(
                    "schedule_location",
                    &live_update_columns(&FORECAST_KINDS),
                ))
                .await?,
            update_point_arrival: client
                .prepare(&update_by_id_sql(
                    "schedule_location",
                    &live_update_columns(&["arrival"]),
                ))
                .await?,
            update_point_departure: client
                .prepare(&update_by_id_sql(
                    "schedule_location",
                    &live_update_columns(&["departure"]),
                ))
                .await?,
            check_association: client
                .prepare("SELECT id FROM association WHERE main_rid=$1 AND assoc_rid=$2")
                .await?,
            insert_association: client
                .prepare(&insert_sql("association", &ASSOCIATION_FIELDS[1..]))
                .await?,
            update_association: client
                .prepare(&update_by_id_sql("association", &association_columns))
                .await?,
        })
    }
}

#[derive(Clone, Deserialize)]
pub struct PgConfig {
    host: String,
    dbname: String,
    user: String,
    password: String,
}

impl PgConfig {
    fn connection_string(&self) -> String {
        format!(
            "host={} dbname={} user={} password={}",
            self.host, self.dbname, self.user, self.password
        )
    }
}

pub struct PgStore {
    client: Client,
    statements: Statements,
}

impl PgStore {
    pub async fn connect(config: PgConfig) -> Result<PgStore, Error> {
        let (client, connection) =
            tokio_postgres::connect(&config.connection_string(), NoTls).await?;

        // the connection object drives the socket; run it on its own task
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("postgres connection error: {}", e);
            }
        });

        create_tables(&client).await?;
        let statements = Statements::prepare(&client).await?;

        Ok(PgStore { client, statements })
    }
}

async fn create_tables(client: &Client) -> Result<(), tokio_postgres::Error> {
    client
        .execute(create_table_sql("schedule", &SCHEDULE_FIELDS).as_str(), &[])
        .await?;
    client
        .execute(schedule_location_create_sql().as_str(), &[])
        .await?;
    client
        .execute(
            create_table_sql("association", &ASSOCIATION_FIELDS).as_str(),
            &[],
        )
        .await?;
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn apply_message(&mut self, message: &PushPortMessage) -> Result<(), Error> {
        let snapshot = message.is_snapshot();
        let statements = &self.statements;
        let transaction = self.client.transaction().await?;

        for record in &message.schedule_messages {
            if let Err(e) = save_schedule(&transaction, statements, record, snapshot).await {
                note_record_error("schedule", &record.rid, e)?;
            }
        }
        for record in &message.deactivated_messages {
            if let Err(e) = save_deactivated(&transaction, statements, record).await {
                note_record_error("deactivation", &record.rid, e)?;
            }
        }
        for record in &message.association_messages {
            if let Err(e) = save_association(&transaction, statements, record, snapshot).await {
                note_record_error("association", &record.main_service.rid, e)?;
            }
        }
        for record in &message.train_status_messages {
            if let Err(e) = save_train_status(&transaction, statements, record).await {
                note_record_error("train status", &record.rid, e)?;
            }
        }

        transaction.commit().await?;
        Ok(())
    }
}

/// Record-scoped failures degrade to a diagnostic; database failures poison
/// the transaction and must abort the envelope.
fn note_record_error(kind: &str, key: &str, error: ApplyError) -> Result<(), Error> {
    match error {
        ApplyError::Record(e) => {
            warn!("skipping {} record for {}: {}", kind, key, e);
            Ok(())
        }
        ApplyError::Database(e) => Err(e.into()),
    }
}

fn unpack_reason(reason: &Option<ReasonMessage>) -> (Option<i32>, Option<String>, Option<bool>) {
    match reason {
        Some(r) => (r.code, r.tiploc.clone(), r.near),
        None => (None, None, None),
    }
}

fn stored_point(row: &Row) -> StoredPoint {
    StoredPoint {
        id: row.get(0),
        tiploc: row.get(1),
        resolved: ResolvedTimes {
            working_arrival: row.get(2),
            public_arrival: row.get(3),
            working_pass: row.get(4),
            public_departure: row.get(5),
            working_departure: row.get(6),
        },
        raw: RawTimes {
            working_arrival: row.get(7),
            public_arrival: row.get(8),
            working_pass: row.get(9),
            public_departure: row.get(10),
            working_departure: row.get(11),
        },
    }
}

async fn select_points(
    transaction: &Transaction<'_>,
    statements: &Statements,
    rid: &str,
) -> Result<Vec<StoredPoint>, tokio_postgres::Error> {
    let rows = transaction.query(&statements.select_points, &[&rid]).await?;
    Ok(rows.iter().map(stored_point).collect())
}

async fn save_schedule(
    transaction: &Transaction<'_>,
    statements: &Statements,
    message: &ScheduleMessage,
    snapshot: bool,
) -> Result<(), ApplyError> {
    let start_date = message::parse_start_date(&message.start_date)?;

    let mut points = Vec::with_capacity(message.locations.len());
    for location in &message.locations {
        points.push(CallingPoint::from_message(location)?);
    }

    let seed = times::seed_time(&points)?;
    let tz = times::resolve_timezone(start_date, seed);
    times::build_times(tz, start_date, &mut points)?;
    let tz_name = tz.name();

    let existing = transaction
        .query(&statements.select_schedule, &[&message.rid])
        .await?;
    let (reason_code, reason_tiploc, reason_near) = unpack_reason(&message.cancellation_reason);

    match reconcile::upsert_action(!existing.is_empty(), snapshot) {
        UpsertAction::Insert => {
            transaction
                .execute(
                    &statements.insert_schedule,
                    &[
                        &message.rid,
                        &message.uid,
                        &message.headcode,
                        &start_date,
                        &message.toc_code,
                        &message.passenger_service,
                        &message.status,
                        &message.category,
                        &message.active,
                        &message.deleted,
                        &message.charter,
                        &reason_code,
                        &reason_tiploc,
                        &reason_near,
                        &tz_name,
                    ],
                )
                .await?;
            for (position, point) in points.iter().enumerate() {
                insert_point(transaction, statements, &message.rid, position as i16, point).await?;
            }
        }
        UpsertAction::Update => {
            transaction
                .execute(
                    &statements.update_schedule,
                    &[
                        &message.uid,
                        &message.headcode,
                        &start_date,
                        &message.toc_code,
                        &message.passenger_service,
                        &message.status,
                        &message.category,
                        &message.active,
                        &message.deleted,
                        &message.charter,
                        &reason_code,
                        &reason_tiploc,
                        &reason_near,
                        &tz_name,
                        &message.rid,
                    ],
                )
                .await?;

            let stored = select_points(transaction, statements, &message.rid).await?;
            for op in reconcile::reconcile(&points, stored) {
                match op {
                    PointOp::Update {
                        id,
                        position,
                        point,
                    } => {
                        let code = point.point_type.code();
                        transaction
                            .execute(
                                &statements.update_point,
                                &[
                                    &code,
                                    &position,
                                    &point.activity_codes,
                                    &point.planned_activity_codes,
                                    &point.cancelled,
                                    &point.false_tiploc,
                                    &point.resolved.working_arrival,
                                    &point.resolved.public_arrival,
                                    &point.resolved.working_pass,
                                    &point.resolved.public_departure,
                                    &point.resolved.working_departure,
                                    &point.raw.working_arrival,
                                    &point.raw.public_arrival,
                                    &point.raw.working_pass,
                                    &point.raw.public_departure,
                                    &point.raw.working_departure,
                                    &id,
                                ],
                            )
                            .await?;
                    }
                    PointOp::Insert { position, point } => {
                        insert_point(transaction, statements, &message.rid, position, point)
                            .await?;
                    }
                    PointOp::Delete { id, tiploc } => {
                        // expected when the plan shrinks, but worth a trace:
                        // duplicate points with identical times end up here too
                        info!(
                            "deleting leftover calling point {} ({}) of {}",
                            id, tiploc, message.rid
                        );
                        transaction
                            .execute(&statements.delete_point, &[&id])
                            .await?;
                    }
                }
            }
        }
        UpsertAction::Skip => {
            info!(
                "already holding schedule {}, ignoring the snapshot copy",
                message.rid
            );
        }
    }

    Ok(())
}

async fn insert_point(
    transaction: &Transaction<'_>,
    statements: &Statements,
    rid: &str,
    position: i16,
    point: &CallingPoint,
) -> Result<(), tokio_postgres::Error> {
    let code = point.point_type.code();
    transaction
        .execute(
            &statements.insert_point,
            &[
                &rid,
                &code,
                &position,
                &point.tiploc,
                &point.activity_codes,
                &point.planned_activity_codes,
                &point.cancelled,
                &point.false_tiploc,
                &point.route_delay,
                &point.resolved.working_arrival,
                &point.resolved.public_arrival,
                &point.resolved.working_pass,
                &point.resolved.public_departure,
                &point.resolved.working_departure,
                &point.raw.working_arrival,
                &point.raw.public_arrival,
                &point.raw.working_pass,
                &point.raw.public_departure,
                &point.raw.working_departure,
            ],
        )
        .await?;
    Ok(())
}

async fn save_deactivated(
    transaction: &Transaction<'_>,
    statements: &Statements,
    message: &DeactivatedMessage,
) -> Result<(), ApplyError> {
    let count = transaction
        .execute(&statements.deactivate_schedule, &[&message.rid])
        .await?;
    if count != 1 {
        info!("no schedule to deactivate for rid {}", message.rid);
    }
    Ok(())
}

async fn save_association(
    transaction: &Transaction<'_>,
    statements: &Statements,
    message: &AssociationMessage,
    snapshot: bool,
) -> Result<(), ApplyError> {
    let main = &message.main_service;
    let assoc = &message.associated_service;
    let main_raw = RawTimes::parse(
        &main.working_arrival_time,
        &main.public_arrival_time,
        &main.working_pass_time,
        &main.public_departure_time,
        &main.working_departure_time,
    )?;
    let assoc_raw = RawTimes::parse(
        &assoc.working_arrival_time,
        &assoc.public_arrival_time,
        &assoc.working_pass_time,
        &assoc.public_departure_time,
        &assoc.working_departure_time,
    )?;

    let existing = transaction
        .query(&statements.check_association, &[&main.rid, &assoc.rid])
        .await?;

    let mut params: Vec<&(dyn ToSql + Sync)> = vec![
        &message.tiploc,
        &message.category,
        &message.deleted,
        &message.cancelled,
        &main.rid,
        &main_raw.working_arrival,
        &main_raw.public_arrival,
        &main_raw.working_pass,
        &main_raw.public_departure,
        &main_raw.working_departure,
        &assoc.rid,
        &assoc_raw.working_arrival,
        &assoc_raw.public_arrival,
        &assoc_raw.working_pass,
        &assoc_raw.public_departure,
        &assoc_raw.working_departure,
    ];

    match existing.len() {
        0 => {
            transaction
                .execute(&statements.insert_association, &params)
                .await?;
        }
        1 => match reconcile::upsert_action(true, snapshot) {
            UpsertAction::Update => {
                let id: i64 = existing[0].get(0);
                params.push(&id);
                transaction
                    .execute(&statements.update_association, &params)
                    .await?;
            }
            _ => {
                info!(
                    "already holding association between {} and {}, ignoring the snapshot copy",
                    main.rid, assoc.rid
                );
            }
        },
        count => {
            return Err(RecordError::AmbiguousMatch {
                main_rid: main.rid.clone(),
                assoc_rid: assoc.rid.clone(),
                count,
            }
            .into())
        }
    }

    Ok(())
}

async fn save_train_status(
    transaction: &Transaction<'_>,
    statements: &Statements,
    message: &TrainStatusMessage,
) -> Result<(), ApplyError> {
    let stored = select_points(transaction, statements, &message.rid).await?;
    if stored.is_empty() {
        return Err(RecordError::UnknownSchedule(message.rid.clone()).into());
    }

    let (late_code, late_tiploc, late_near) = unpack_reason(&message.late_reason);
    let rows = transaction
        .query(
            &statements.update_schedule_live,
            &[
                &message.reverse_formation,
                &late_code,
                &late_tiploc,
                &late_near,
                &message.rid,
            ],
        )
        .await?;
    let tz_name: String = match rows.first() {
        Some(row) => row.get(0),
        None => return Err(RecordError::UnknownSchedule(message.rid.clone()).into()),
    };
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| RecordError::UnknownTimezone(tz_name.clone()))?;

    for location in &message.locations {
        if let Err(e) =
            save_status_location(transaction, statements, &message.rid, &stored, tz, location)
                .await
        {
            match e {
                ApplyError::Record(e) => {
                    warn!("skipping status for {} at {}: {}", message.rid, location.tiploc, e);
                }
                ApplyError::Database(_) => return Err(e),
            }
        }
    }

    Ok(())
}

async fn save_status_location(
    transaction: &Transaction<'_>,
    statements: &Statements,
    rid: &str,
    stored: &[StoredPoint],
    tz: Tz,
    location: &StatusLocationMessage,
) -> Result<(), ApplyError> {
    let raw = RawTimes::parse(
        &location.working_arrival_time,
        &location.public_arrival_time,
        &location.working_pass_time,
        &location.public_departure_time,
        &location.working_departure_time,
    )?;

    let (row, tier) = forecast::match_point(stored, &location.tiploc, &raw).ok_or_else(|| {
        RecordError::NoMatchingCallingPoint {
            rid: rid.to_string(),
            tiploc: location.tiploc.clone(),
        }
    })?;

    let platform = location.platform.clone().unwrap_or_default();
    let mut params: Vec<&(dyn ToSql + Sync)> = vec![
        &location.suppressed,
        &location.length,
        &location.detach_front,
        &platform.suppressed,
        &platform.suppressed_by_cis,
        &platform.source,
        &platform.confirmed,
        &platform.number,
    ];

    match tier {
        MatchTier::Full => {
            let arrival =
                forecast::build_event_forecast(EventKind::Arrival, row, location.arrival.as_ref(), tz)?;
            let pass =
                forecast::build_event_forecast(EventKind::Pass, row, location.pass.as_ref(), tz)?;
            let departure = forecast::build_event_forecast(
                EventKind::Departure,
                row,
                location.departure.as_ref(),
                tz,
            )?;
            push_forecast_params(&mut params, &arrival);
            push_forecast_params(&mut params, &pass);
            push_forecast_params(&mut params, &departure);
            params.push(&row.id);
            transaction
                .execute(&statements.update_point_full, &params)
                .await?;
        }
        MatchTier::ArrivalOnly => {
            let arrival =
                forecast::build_event_forecast(EventKind::Arrival, row, location.arrival.as_ref(), tz)?;
            push_forecast_params(&mut params, &arrival);
            params.push(&row.id);
            transaction
                .execute(&statements.update_point_arrival, &params)
                .await?;
        }
        MatchTier::DepartureOnly => {
            let departure = forecast::build_event_forecast(
                EventKind::Departure,
                row,
                location.departure.as_ref(),
                tz,
            )?;
            push_forecast_params(&mut params, &departure);
            params.push(&row.id);
            transaction
                .execute(&statements.update_point_departure, &params)
                .await?;
        }
    }

    Ok(())
}

fn push_forecast_params<'a>(params: &mut Vec<&'a (dyn ToSql + Sync)>, forecast: &'a EventForecast) {
    params.push(&forecast.estimated);
    params.push(&forecast.working_estimated);
    params.push(&forecast.actual);
    params.push(&forecast.actual_removed);
    params.push(&forecast.manual_estimate_lower_limit_minutes);
    params.push(&forecast.manual_estimate_unknown_delay);
    params.push(&forecast.unknown_delay);
    params.push(&forecast.source);
    params.push(&forecast.source_cis);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_placeholders_are_numbered() {
        let sql = insert_sql("schedule", &SCHEDULE_FIELDS[..15]);
        assert!(sql.starts_with("INSERT INTO schedule (rid, uid, headcode, start_date,"));
        assert!(sql.contains("($1, $2,"));
        assert!(sql.ends_with("$15)"));
    }

    #[test]
    fn update_key_follows_the_assignments() {
        let sql = update_sql("schedule", &SCHEDULE_FIELDS[1..15], "rid");
        assert!(sql.starts_with("UPDATE schedule SET uid=$1, headcode=$2,"));
        assert!(sql.ends_with("WHERE rid=$15"));
    }

    #[test]
    fn arrival_only_update_stays_off_other_forecasts() {
        let sql = update_by_id_sql("schedule_location", &live_update_columns(&["arrival"]));
        assert!(sql.contains("forecast_arrival_estimated_time=$9"));
        assert!(!sql.contains("forecast_pass_"));
        assert!(!sql.contains("forecast_departure_"));
        assert!(sql.ends_with("WHERE id=$18"));
    }

    #[test]
    fn full_update_covers_all_three_blocks() {
        let sql = update_by_id_sql("schedule_location", &live_update_columns(&FORECAST_KINDS));
        assert!(sql.contains("forecast_arrival_estimated_time="));
        assert!(sql.contains("forecast_pass_estimated_time="));
        assert!(sql.contains("forecast_departure_source_cis=$35"));
        assert!(sql.ends_with("WHERE id=$36"));
    }

    #[test]
    fn location_table_carries_the_forecast_blocks() {
        let sql = schedule_location_create_sql();
        assert!(sql.contains("raw_working_departure_time time"));
        assert!(sql.contains("forecast_pass_unknown_delay boolean"));
        assert!(sql.contains("forecast_departure_actual_time timestamp with time zone"));
    }
}
