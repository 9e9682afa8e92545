//! [`Command`] definition.

pub mod cancel_booking;
pub mod complete_booking;
pub mod confirm_booking;
pub mod create_booking;
pub mod mark_no_show;

#[cfg(test)]
mod tests;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    cancel_booking::CancelBooking, complete_booking::CompleteBooking,
    confirm_booking::ConfirmBooking, create_booking::CreateBooking,
    mark_no_show::MarkNoShow,
};
