use crate::error::Error;
use crate::message::{FieldError, PushPortMessage};
use crate::times::TimeError;

use async_trait::async_trait;

use std::fmt;

/// Persistent view of schedules, calling points and associations.
///
/// One call per envelope; the implementation owns the transaction scope and
/// must commit before the caller acknowledges the delivery.
#[async_trait]
pub trait Store: Send {
    async fn apply_message(&mut self, message: &PushPortMessage) -> Result<(), Error>;
}

/// Why a single record inside an envelope could not be applied. These are
/// all expected conditions: the record is skipped with a diagnostic and the
/// rest of the envelope continues.
#[derive(Debug)]
pub enum RecordError {
    Time(TimeError),
    Field(FieldError),
    UnknownSchedule(String),
    NoMatchingCallingPoint { rid: String, tiploc: String },
    AmbiguousMatch { main_rid: String, assoc_rid: String, count: usize },
    UnknownTimezone(String),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordError::Time(e) => write!(f, "{}", e),
            RecordError::Field(e) => write!(f, "{}", e),
            RecordError::UnknownSchedule(rid) => {
                write!(f, "no stored schedule for rid {}", rid)
            }
            RecordError::NoMatchingCallingPoint { rid, tiploc } => {
                write!(f, "no stored calling point of {} matches {}", rid, tiploc)
            }
            RecordError::AmbiguousMatch {
                main_rid,
                assoc_rid,
                count,
            } => write!(
                f,
                "{} stored associations between {} and {}, refusing to pick one",
                count, main_rid, assoc_rid
            ),
            RecordError::UnknownTimezone(name) => {
                write!(f, "stored timezone {:?} is not a known zone", name)
            }
        }
    }
}

impl From<TimeError> for RecordError {
    fn from(error: TimeError) -> Self {
        RecordError::Time(error)
    }
}

impl From<FieldError> for RecordError {
    fn from(error: FieldError) -> Self {
        RecordError::Field(error)
    }
}

/// Failure applying one record: either record-scoped (skip and continue) or
/// a database error, which poisons the envelope's transaction and must
/// propagate so the delivery is redelivered.
#[derive(Debug)]
pub enum ApplyError {
    Record(RecordError),
    Database(tokio_postgres::Error),
}

impl From<RecordError> for ApplyError {
    fn from(error: RecordError) -> Self {
        ApplyError::Record(error)
    }
}

impl From<TimeError> for ApplyError {
    fn from(error: TimeError) -> Self {
        ApplyError::Record(RecordError::Time(error))
    }
}

impl From<FieldError> for ApplyError {
    fn from(error: FieldError) -> Self {
        ApplyError::Record(RecordError::Field(error))
    }
}

impl From<tokio_postgres::Error> for ApplyError {
    fn from(error: tokio_postgres::Error) -> Self {
        ApplyError::Database(error)
    }
}
