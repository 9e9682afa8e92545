//! Read models of domain definitions.

pub mod booking;

use derive_more::{AsMut, AsRef};

pub use self::booking::SlotFilter;

/// Wrapper indicating that the wrapped booking occupies its slot (is
/// pending or confirmed).
#[derive(AsMut, AsRef, Clone, Copy, Debug)]
#[as_mut(forward)]
#[as_ref(forward)]
pub struct Occupying<T: ?Sized>(pub T);
