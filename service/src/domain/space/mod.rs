//! [`SpaceConfiguration`] definitions.

pub mod price;

use common::define_kind;
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::policy;

pub use self::price::Rule;

/// Configuration of a bookable space type.
///
/// A single fetched [`SpaceConfiguration`] is the pricing snapshot for the
/// whole request handling it: administrative edits are external writes and
/// are never observed mid-calculation.
#[derive(Clone, Debug)]
pub struct SpaceConfiguration {
    /// ID of this [`SpaceConfiguration`].
    pub id: Id,

    /// Displayed [`Name`] of the space.
    pub name: Name,

    /// [`Kind`] of the space.
    pub kind: Kind,

    /// Minimum bookable party size.
    pub min_capacity: Capacity,

    /// Maximum bookable party size.
    pub max_capacity: Capacity,

    /// Pricing [`Rule`] of the space.
    pub rule: Rule,

    /// ID of the [`policy::Cancellation`] applying to the space.
    ///
    /// [`policy::Cancellation`]: policy::cancellation::Policy
    pub cancellation_policy: policy::cancellation::Id,

    /// ID of the [`policy::Deposit`] applying to the space.
    ///
    /// [`policy::Deposit`]: policy::deposit::Policy
    pub deposit_policy: policy::deposit::Id,

    /// Indicator whether the space is open for booking.
    pub is_active: bool,
}

impl SpaceConfiguration {
    /// Indicates whether this space can only be booked via a manual quote.
    #[must_use]
    pub fn requires_quote(&self) -> bool {
        matches!(self.rule, Rule::Quote)
    }

    /// Computes the price of booking this space for the provided
    /// [`booking::Term`] and party size.
    ///
    /// # Errors
    ///
    /// - [`price::Error::QuotationRequired`] for quote-only spaces;
    /// - [`price::Error::CapacityOutOfRange`] if the party size is outside
    ///   `min_capacity..=max_capacity`;
    /// - [`price::Error::Misconfigured`] if the pricing [`Rule`] violates
    ///   its own invariants.
    ///
    /// [`booking::Term`]: crate::domain::booking::Term
    pub fn price(
        &self,
        term: &crate::domain::booking::Term,
        party_size: Capacity,
    ) -> Result<price::Breakdown, price::Error> {
        if party_size < self.min_capacity || party_size > self.max_capacity {
            return Err(price::Error::CapacityOutOfRange(party_size));
        }
        self.rule.price(term, party_size, self.max_capacity)
    }
}

/// ID of a [`SpaceConfiguration`].
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

/// Name of a [`SpaceConfiguration`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `name` is not empty.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= 512
    }
}

impl std::str::FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

define_kind! {
    #[doc = "Kind of a bookable space."]
    enum Kind {
        #[doc = "Open floor (hot desks)."]
        OpenFloor = 1,

        #[doc = "Meeting room."]
        MeetingRoom = 2,

        #[doc = "Event hall."]
        EventHall = 3,
    }
}

/// Size of a booking party (number of people).
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Capacity(u16);

impl Capacity {
    /// Creates a new [`Capacity`] if the given value is at least `1`.
    #[must_use]
    pub fn new(people: u16) -> Option<Self> {
        (people >= 1).then_some(Self(people))
    }

    /// Returns the number of people of this [`Capacity`].
    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

#[cfg(test)]
mod spec {
    use super::Capacity;

    #[test]
    fn capacity_rejects_zero() {
        assert!(Capacity::new(0).is_none());
        assert_eq!(Capacity::new(1).unwrap().get(), 1);
    }
}
