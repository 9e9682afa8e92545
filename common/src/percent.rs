//! [`Percent`]-related definitions.

use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;

use crate::Money;

/// Floating-point percentage.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Percent(Decimal);

impl Percent {
    /// [`Percent`] of zero (0%).
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Full [`Percent`] (100%).
    pub const FULL: Self = Self(Decimal::ONE_HUNDRED);

    /// Creates a new [`Percent`] by checking the provided values is
    /// greater than `0` and less than `100`.
    #[must_use]
    pub fn new(val: Decimal) -> Option<Self> {
        if val < Decimal::ZERO || val > Decimal::ONE_HUNDRED {
            None
        } else {
            #[expect(
                clippy::allow_attributes,
                reason = "TODO: Remove once clippy is fixed"
            )]
            #[allow(unsafe_code, reason = "invariants checked already")]
            Some(unsafe { Self::new_unchecked(val) })
        }
    }

    /// Creates a new [`Percent`] without performing any validation.
    ///
    /// # Safety
    ///
    /// The provided value must be greater than `0` and less than `100`.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(val: Decimal) -> Self {
        Self(val)
    }

    /// Returns the complement of this [`Percent`] (`100% - self`).
    #[must_use]
    pub fn complement(self) -> Self {
        Self(Decimal::ONE_HUNDRED - self.0)
    }

    /// Takes this [`Percent`] of the provided [`Money`] amount, rounded to
    /// the minor unit of its currency (round half up).
    #[must_use]
    pub fn of(self, money: Money) -> Money {
        (money * (self.0 / Decimal::ONE_HUNDRED)).round_to_minor()
    }
}

impl FromStr for Percent {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s)
            .ok()
            .and_then(Self::new)
            .ok_or("invalid percent value")
    }
}

impl PartialOrd for Percent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Percent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use super::{Money, Percent};

    fn percent(s: &str) -> Percent {
        Percent::from_str(s).unwrap()
    }

    #[test]
    fn validates_range() {
        assert!(Percent::from_str("0").is_ok());
        assert!(Percent::from_str("50.5").is_ok());
        assert!(Percent::from_str("100").is_ok());
        assert!(Percent::from_str("-1").is_err());
        assert!(Percent::from_str("100.1").is_err());
    }

    #[test]
    fn complements() {
        assert_eq!(percent("30").complement(), percent("70"));
        assert_eq!(Percent::ZERO.complement(), Percent::FULL);
    }

    #[test]
    fn takes_rounded_part_of_money() {
        let money = Money::from_str("200USD").unwrap();
        assert_eq!(percent("50").of(money), Money::from_str("100USD").unwrap());

        let odd = Money::from_str("0.33USD").unwrap();
        // 50% of 0.33 is 0.165, rounding half up to 0.17.
        assert_eq!(percent("50").of(odd), Money::from_str("0.17USD").unwrap());

        assert_eq!(Percent::ZERO.of(money), Money::from_str("0USD").unwrap());
        assert_eq!(Percent::FULL.of(money), money);
    }
}
