//! Read models of a [`Booking`].
//!
//! [`Booking`]: crate::domain::Booking

use common::DateTime;

use crate::domain::space;

/// Filter selecting bookings of a space whose slots intersect a half-open
/// time range.
#[derive(Clone, Copy, Debug)]
pub struct SlotFilter {
    /// ID of the space the bookings belong to.
    pub space: space::Id,

    /// Start of the time range (inclusive).
    pub from: DateTime,

    /// End of the time range (exclusive).
    pub until: DateTime,
}
