//! [`Query`] collection related to multiple [`Booking`]s.
//!
//! [`Booking`]: crate::domain::Booking

use common::operations::By;

use crate::{
    domain::Booking,
    read::{Occupying, SlotFilter},
};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries the [`Occupying`] [`Booking`]s of a space intersecting a time
/// range.
///
/// Availability of a slot is the absence of any such [`Booking`]
/// overlapping it.
pub type OccupyingInRange =
    DatabaseQuery<By<Vec<Occupying<Booking>>, SlotFilter>>;
