//! [`Booking`] definitions.

pub mod slot;

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{client, space};
#[cfg(doc)]
use crate::domain::SpaceConfiguration;

pub use self::slot::{Slot, Term, TermKind};

/// Reservation of a space for a [`Slot`].
///
/// Never deleted: cancelled and completed [`Booking`]s are retained for
/// audit and accounting reconciliation.
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// ID of the booked [`SpaceConfiguration`].
    pub space_id: space::Id,

    /// ID of the client account owning this [`Booking`].
    pub client_id: client::Id,

    /// Indicator whether this [`Booking`] was created by an administrator
    /// on behalf of the client.
    pub created_by_admin: bool,

    /// Reserved [`Slot`].
    pub slot: Slot,

    /// Size of the party the [`Slot`] is reserved for.
    pub party_size: space::Capacity,

    /// Computed price of this [`Booking`].
    pub price: space::price::Breakdown,

    /// Required deposit, if the deposit policy demanded one.
    pub deposit: Option<Money>,

    /// Amount held by the external payment collaborator (the deposit, or
    /// the full price when no deposit applies).
    pub amount_held: Money,

    /// Opaque reference to the payment hold backing this [`Booking`].
    pub hold: HoldRef,

    /// Money movements already confirmed against the hold.
    pub settlement: Settlement,

    /// Current [`Status`] of this [`Booking`].
    pub status: Status,

    /// Details of the cancellation, if this [`Booking`] was cancelled.
    pub cancellation: Option<Cancellation>,

    /// [`DateTime`] when this [`Booking`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Booking`] was last updated.
    ///
    /// [`DateTime`]: common::DateTime
    pub updated_at: UpdateDateTime,
}

impl Booking {
    /// Indicates whether this [`Booking`] occupies its [`Slot`].
    #[must_use]
    pub fn occupies_slot(&self) -> bool {
        self.status.occupies()
    }
}

/// ID of a [`Booking`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Opaque reference to a payment hold, issued by the external payment
/// collaborator.
///
/// The engine never inspects it beyond passing it back on capture/refund.
#[derive(AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct HoldRef(String);

impl HoldRef {
    /// Creates a new [`HoldRef`] from the collaborator-issued reference.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }
}

/// Reason of a [`Booking`] cancellation.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Reason(String);

impl Reason {
    /// Creates a new [`Reason`] if the given one is valid.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Option<Self> {
        let reason = reason.into();
        Self::check(&reason).then_some(Self(reason))
    }

    /// Checks whether the given `reason` is a valid [`Reason`].
    fn check(reason: impl AsRef<str>) -> bool {
        let reason = reason.as_ref();
        reason.trim() == reason && !reason.is_empty() && reason.len() <= 512
    }
}

impl std::str::FromStr for Reason {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Reason`")
    }
}

define_kind! {
    #[doc = "Status of a [`Booking`]."]
    enum Status {
        #[doc = "Created and held, awaiting payment confirmation."]
        Pending = 1,

        #[doc = "Payment confirmed."]
        Confirmed = 2,

        #[doc = "Cancelled by the client or an administrator."]
        Cancelled = 3,

        #[doc = "Client failed to appear for a confirmed [`Booking`]."]
        NoShow = 4,

        #[doc = "Successfully finished."]
        Completed = 5,
    }
}

impl Status {
    /// Indicates whether a [`Booking`] in this [`Status`] occupies its
    /// [`Slot`] for availability purposes.
    #[must_use]
    pub fn occupies(self) -> bool {
        match self {
            Self::Pending | Self::Confirmed => true,
            Self::Cancelled | Self::NoShow | Self::Completed => false,
        }
    }

    /// Indicates whether a [`Booking`] may transition from this [`Status`]
    /// into the `next` one.
    ///
    /// No transition ever returns to [`Status::Pending`], and
    /// [`Status::Cancelled`], [`Status::NoShow`] and [`Status::Completed`]
    /// are terminal.
    #[must_use]
    pub fn can_become(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Confirmed | Self::Cancelled)
            | (
                Self::Confirmed,
                Self::Cancelled | Self::NoShow | Self::Completed,
            ) => true,
            (
                Self::Pending
                | Self::Confirmed
                | Self::Cancelled
                | Self::NoShow
                | Self::Completed,
                _,
            ) => false,
        }
    }
}

/// Money movements confirmed against a [`Booking`]'s hold.
///
/// Recorded before the [`Status`] advances, so a retried cancellation or
/// no-show never re-issues an already confirmed refund or capture.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Settlement {
    /// Amount already refunded to the client.
    pub refunded: Option<Money>,

    /// Amount already captured from the hold.
    pub captured: Option<Money>,
}

/// Details of a [`Booking`] cancellation.
#[derive(Clone, Debug)]
pub struct Cancellation {
    /// [`Reason`] the [`Booking`] was cancelled for.
    pub reason: Reason,

    /// Indicator whether an administrator initiated the cancellation.
    pub by_admin: bool,

    /// [`DateTime`] when the [`Booking`] was cancelled.
    ///
    /// [`DateTime`]: common::DateTime
    pub at: CancellationDateTime,
}

/// [`DateTime`] when a [`Booking`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;

/// [`DateTime`] when a [`Booking`] was last updated.
///
/// [`DateTime`]: common::DateTime
pub type UpdateDateTime = DateTimeOf<(Booking, unit::Update)>;

/// [`DateTime`] when a [`Booking`] was cancelled.
///
/// [`DateTime`]: common::DateTime
pub type CancellationDateTime = DateTimeOf<(Booking, unit::Cancellation)>;

/// Marker type indicating a [`Booking`] completion.
#[derive(Clone, Copy, Debug)]
pub struct Completion;

/// [`DateTime`] a [`Booking`] must have ended before to be swept into
/// [`Status::Completed`].
///
/// [`DateTime`]: common::DateTime
pub type CompletionDeadline = DateTimeOf<(Booking, Completion)>;

#[cfg(test)]
mod spec {
    use super::Status;

    #[test]
    fn statuses_occupying_a_slot() {
        assert!(Status::Pending.occupies());
        assert!(Status::Confirmed.occupies());
        assert!(!Status::Cancelled.occupies());
        assert!(!Status::NoShow.occupies());
        assert!(!Status::Completed.occupies());
    }

    #[test]
    fn transitions() {
        use Status as S;

        assert!(S::Pending.can_become(S::Confirmed));
        assert!(S::Pending.can_become(S::Cancelled));
        assert!(S::Confirmed.can_become(S::Cancelled));
        assert!(S::Confirmed.can_become(S::NoShow));
        assert!(S::Confirmed.can_become(S::Completed));

        // No way back to `Pending`, and no shortcuts.
        assert!(!S::Confirmed.can_become(S::Pending));
        assert!(!S::Pending.can_become(S::NoShow));
        assert!(!S::Pending.can_become(S::Completed));

        // Terminal statuses stay terminal.
        for terminal in [S::Cancelled, S::NoShow, S::Completed] {
            for next in
                [S::Pending, S::Confirmed, S::Cancelled, S::NoShow, S::Completed]
            {
                assert!(!terminal.can_become(next));
            }
        }
    }
}
