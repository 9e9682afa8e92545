//! Cancellation [`Policy`] definitions.

use common::Percent;
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cancellation policy of a space: an ordered schedule of [`Tier`]s mapping
/// the notice given before a booking's date to the charged share of its
/// price.
#[derive(Clone, Debug)]
pub struct Policy {
    /// ID of this [`Policy`].
    pub id: Id,

    /// [`Tier`]s of this [`Policy`], ordered by decreasing
    /// [`Tier::days_before`].
    tiers: Vec<Tier>,
}

impl Policy {
    /// Creates a new [`Policy`] out of the given [`Tier`]s, if they form a
    /// valid schedule.
    ///
    /// # Errors
    ///
    /// [`InvalidTiersError`] if the [`Tier`]s are empty, lack a `0` days
    /// tier, are not strictly decreasing by [`Tier::days_before`], or
    /// charge less for shorter notice.
    pub fn new(
        id: Id,
        mut tiers: Vec<Tier>,
    ) -> Result<Self, InvalidTiersError> {
        tiers.sort_by(|a, b| b.days_before.cmp(&a.days_before));

        if tiers.is_empty() {
            return Err(InvalidTiersError::Empty);
        }
        if tiers.last().map(|t| t.days_before) != Some(0) {
            return Err(InvalidTiersError::NoZeroDaysTier);
        }
        for pair in tiers.windows(2) {
            if pair[0].days_before == pair[1].days_before {
                return Err(InvalidTiersError::DuplicateDays(
                    pair[0].days_before,
                ));
            }
            if pair[0].charge > pair[1].charge {
                return Err(InvalidTiersError::ChargeNotMonotonic);
            }
        }

        Ok(Self { id, tiers })
    }

    /// Returns the [`Percent`] of a booking's price charged when cancelling
    /// the given number of whole days before its date.
    ///
    /// Picks the [`Tier`] with the greatest [`Tier::days_before`] not
    /// exceeding `days_before`. A schedule whose every tier demands more
    /// notice than given charges the full price.
    #[must_use]
    pub fn charge(&self, days_before: u16) -> Percent {
        self.tiers
            .iter()
            .find(|t| t.days_before <= days_before)
            .map_or(Percent::FULL, |t| t.charge)
    }

    /// Returns the [`Tier`]s of this [`Policy`], ordered by decreasing
    /// [`Tier::days_before`].
    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }
}

/// Single tier of a cancellation [`Policy`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Tier {
    /// Minimum number of whole calendar days before the booking's date this
    /// [`Tier`] applies from.
    pub days_before: u16,

    /// Share of the booking's price charged on cancellation.
    pub charge: Percent,
}

/// ID of a cancellation [`Policy`].
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

/// Error of creating a [`Policy`] out of invalid [`Tier`]s.
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum InvalidTiersError {
    /// [`Policy`] must have at least one [`Tier`].
    #[display("cancellation policy has no tiers")]
    Empty,

    /// [`Policy`] must define the charge for same-day cancellations.
    #[display("cancellation policy lacks a 0 days tier")]
    NoZeroDaysTier,

    /// Two [`Tier`]s claim the same notice period.
    #[display("duplicate {_0} days tier")]
    DuplicateDays(#[error(not(source))] u16),

    /// Shorter notice must never be charged less than longer notice.
    #[display("charge decreases as notice shortens")]
    ChargeNotMonotonic,
}

#[cfg(test)]
mod spec {
    use common::Percent;
    use rust_decimal::Decimal;

    use super::{Id, Policy, Tier};

    fn tier(days_before: u16, charge: u32) -> Tier {
        Tier {
            days_before,
            charge: Percent::new(Decimal::from(charge)).unwrap(),
        }
    }

    fn policy(tiers: Vec<Tier>) -> Result<Policy, super::InvalidTiersError> {
        Policy::new(Id::new(), tiers)
    }

    #[test]
    fn charges_by_greatest_matching_tier() {
        let p =
            policy(vec![tier(7, 0), tier(3, 50), tier(0, 100)]).unwrap();

        assert_eq!(p.charge(10), tier(7, 0).charge);
        assert_eq!(p.charge(7), tier(7, 0).charge);
        assert_eq!(p.charge(5), tier(3, 50).charge);
        assert_eq!(p.charge(3), tier(3, 50).charge);
        assert_eq!(p.charge(2), tier(0, 100).charge);
        assert_eq!(p.charge(0), tier(0, 100).charge);
    }

    #[test]
    fn charges_full_price_when_no_tier_matches() {
        // Bypass `Policy::new()` to model a schedule without a 0 days tier.
        let p = Policy {
            id: Id::new(),
            tiers: vec![tier(7, 10)],
        };

        assert_eq!(p.charge(3), Percent::FULL);
    }

    #[test]
    fn validates_schedule() {
        assert!(policy(vec![]).is_err());
        assert!(policy(vec![tier(7, 0), tier(3, 50)]).is_err());
        assert!(policy(vec![tier(3, 50), tier(3, 60), tier(0, 100)])
            .is_err());
        assert!(policy(vec![tier(7, 50), tier(0, 20)]).is_err());

        // Order of the input does not matter.
        assert!(policy(vec![tier(0, 100), tier(7, 0), tier(3, 50)]).is_ok());
    }
}
