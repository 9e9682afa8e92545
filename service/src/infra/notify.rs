//! External notifier definitions.
//!
//! Delivery (email, push, whatever the deployment wires in) is entirely the
//! notifier's concern. Failed notifications are logged and never fail the
//! booking transition that triggered them.

use common::define_kind;
use derive_more::{Display, Error as StdError};

use crate::domain::{booking, client};

/// Notification operation.
pub use common::Handler as Notifier;

/// Operation of notifying a client about a booking transition.
#[derive(Clone, Debug)]
pub struct Notify {
    /// [`Template`] of the notification.
    pub template: Template,

    /// ID of the client account to notify.
    pub client: client::Id,

    /// ID of the [`Booking`] the notification concerns.
    ///
    /// [`Booking`]: crate::domain::Booking
    pub booking: booking::Id,
}

define_kind! {
    #[doc = "Template of a [`Notify`] operation."]
    enum Template {
        #[doc = "Booking was created and is pending confirmation."]
        BookingCreated = 1,

        #[doc = "Booking was confirmed."]
        BookingConfirmed = 2,

        #[doc = "Booking was cancelled by its owning client."]
        CancelledByClient = 3,

        #[doc = "Booking was cancelled by an administrator."]
        CancelledByAdmin = 4,

        #[doc = "Administrator-created booking was cancelled."]
        AdminBookingCancelled = 5,

        #[doc = "Booking was marked as a no-show."]
        NoShowRecorded = 6,
    }
}

impl Template {
    /// Returns the [`Template`] to notify a client with about a
    /// cancellation.
    ///
    /// Bookings created by an administrator always use the
    /// [`Template::AdminBookingCancelled`] wording, regardless of who
    /// cancelled them.
    #[must_use]
    pub fn for_cancellation(
        initiated_by_admin: bool,
        created_by_admin: bool,
    ) -> Self {
        if created_by_admin {
            Self::AdminBookingCancelled
        } else if initiated_by_admin {
            Self::CancelledByAdmin
        } else {
            Self::CancelledByClient
        }
    }
}

/// [`Notifier`] error.
#[derive(Debug, Display, StdError)]
#[display("failed to deliver notification: {_0}")]
pub struct Error(#[error(not(source))] pub String);

#[cfg(test)]
mod spec {
    use super::Template;

    #[test]
    fn picks_cancellation_template() {
        assert_eq!(
            Template::for_cancellation(false, false),
            Template::CancelledByClient,
        );
        assert_eq!(
            Template::for_cancellation(true, false),
            Template::CancelledByAdmin,
        );
        assert_eq!(
            Template::for_cancellation(true, true),
            Template::AdminBookingCancelled,
        );
        assert_eq!(
            Template::for_cancellation(false, true),
            Template::AdminBookingCancelled,
        );
    }
}
