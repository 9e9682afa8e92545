//! Booking policies applied to spaces.

pub mod cancellation;
pub mod deposit;
