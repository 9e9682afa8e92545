//! [`Database`]-related implementations.

#[cfg(feature = "postgres")]
pub mod postgres;

use derive_more::{Display, Error as StdError, From};

#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Database operation.
pub use common::Handler as Database;

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    #[cfg(feature = "postgres")]
    /// [`Postgres`] error.
    Postgres(postgres::Error),

    /// Stored data violates a domain invariant.
    #[display("stored data violates a domain invariant: {_0}")]
    #[from(ignore)]
    Corrupted(#[error(not(source))] &'static str),
}

impl Error {
    /// Checks if the error is a violation of the constraint excluding
    /// overlapping booking slots.
    #[must_use]
    pub fn is_slot_conflict(&self) -> bool {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => {
                e.is_exclusion_violation(Some("bookings_no_overlap"))
            }
            Self::Corrupted(..) => false,
        }
    }
}
