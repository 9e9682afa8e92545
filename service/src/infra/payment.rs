//! External payment collaborator definitions.
//!
//! The engine never talks to a card network itself: it places holds and
//! later captures or refunds them through whatever implements these
//! operations.

use common::Money;
use derive_more::{Display, Error as StdError};

use crate::domain::booking;

/// Payment operation.
pub use common::Handler as Payments;

/// Operation of placing a hold on a client's payment method.
///
/// No money moves until the hold is captured.
#[derive(Clone, Debug)]
pub struct CreateHold {
    /// Amount to hold.
    pub amount: Money,

    /// ID of the [`Booking`] the hold backs.
    ///
    /// [`Booking`]: crate::domain::Booking
    pub booking: booking::Id,
}

/// Operation of capturing a previously placed hold (fully or partially).
#[derive(Clone, Debug)]
pub struct Capture {
    /// Hold to capture.
    pub hold: booking::HoldRef,

    /// Amount to capture out of the hold.
    pub amount: Money,
}

/// Operation of refunding a previously placed hold (fully or partially).
#[derive(Clone, Debug)]
pub struct Refund {
    /// Hold to refund.
    pub hold: booking::HoldRef,

    /// Amount to refund out of the hold.
    pub amount: Money,
}

/// Operation of voiding a previously placed hold without moving any money.
#[derive(Clone, Debug)]
pub struct CancelHold {
    /// Hold to void.
    pub hold: booking::HoldRef,
}

/// [`Payments`] error.
#[derive(Debug, Display, StdError)]
pub enum Error {
    /// Payment collaborator declined the operation.
    #[display("payment operation declined: {_0}")]
    Declined(#[error(not(source))] String),

    /// Payment collaborator could not be reached.
    #[display("payment collaborator unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
}
