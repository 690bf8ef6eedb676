//! Small shared aliases.

use chrono::{DateTime, Utc};

/// Height of a block on any of the tracked ledgers.
pub type BlockHeight = u64;

/// Wall-clock instant at which an entity changed phase.
pub type Timestamp = DateTime<Utc>;

/// Sets a write-once slot.
///
/// Writing the value that is already present is accepted so that replays of the same phase stay
/// idempotent; writing a different value is rejected.
pub(crate) fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    field: &'static str,
) -> Result<(), crate::errors::RecordError>
where
    T: PartialEq + std::fmt::Debug,
{
    match slot {
        Some(existing) if *existing == value => Ok(()),
        Some(existing) => Err(crate::errors::RecordError::AlreadySet {
            field,
            existing: format!("{existing:?}"),
        }),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}
