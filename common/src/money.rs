//! [`Money`]-related definitions.

use std::{fmt, ops, str::FromStr};

use rust_decimal::{
    prelude::ToPrimitive as _, Decimal, RoundingStrategy,
};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Creates a new zero [`Money`] amount in the provided [`Currency`].
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Indicates whether this [`Money`] amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Rounds this [`Money`] amount to the minor unit of its [`Currency`],
    /// with midpoints rounded away from zero (round half up).
    #[must_use]
    pub fn round_to_minor(self) -> Self {
        Self {
            amount: self.amount.round_dp_with_strategy(
                self.currency.minor_units(),
                RoundingStrategy::MidpointAwayFromZero,
            ),
            currency: self.currency,
        }
    }
}

impl ops::Add for Money {
    type Output = Self;

    /// # Panics
    ///
    /// If the [`Currency`]ies of the operands differ.
    fn add(self, rhs: Self) -> Self::Output {
        assert_eq!(self.currency, rhs.currency, "`Currency` mismatch");
        Self {
            amount: self.amount + rhs.amount,
            currency: self.currency,
        }
    }
}

impl ops::Sub for Money {
    type Output = Self;

    /// # Panics
    ///
    /// If the [`Currency`]ies of the operands differ.
    fn sub(self, rhs: Self) -> Self::Output {
        assert_eq!(self.currency, rhs.currency, "`Currency` mismatch");
        Self {
            amount: self.amount - rhs.amount,
            currency: self.currency,
        }
    }
}

impl ops::Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self {
            amount: self.amount * rhs,
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if amount.is_integer() {
            write!(f, "{}{currency}", amount.to_i128().expect("integer"))
        } else {
            write!(f, "{amount}{currency}")
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "US Dollar."]
        Usd = 1,

        #[doc = "Euro."]
        Eur = 2,

        #[doc = "Russian Ruble."]
        Rub = 3,
    }
}

impl Currency {
    /// Returns the number of minor units (decimal places) of this
    /// [`Currency`].
    #[must_use]
    pub const fn minor_units(self) -> u32 {
        match self {
            Self::Usd | Self::Eur | Self::Rub => 2,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn usd(s: &str) -> Money {
        Money {
            amount: decimal(s),
            currency: Currency::Usd,
        }
    }

    #[test]
    fn from_str() {
        assert_eq!(Money::from_str("123.45USD").unwrap(), usd("123.45"));

        assert_eq!(
            Money::from_str("123.45EUR").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Eur,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Us").is_err());
        assert!(Money::from_str("123.45Usdollar").is_err());

        assert!(Money::from_str("123.00USD").is_ok());
        assert!(Money::from_str("123.0USD").is_ok());
        assert!(Money::from_str("123USD").is_ok());
    }

    #[test]
    fn to_string() {
        assert_eq!(usd("123.45").to_string(), "123.45USD");
        assert_eq!(usd("123.00").to_string(), "123USD");
        assert_eq!(usd("123.0").to_string(), "123USD");
        assert_eq!(usd("123").to_string(), "123USD");
    }

    #[test]
    fn rounds_half_up_to_minor_unit() {
        assert_eq!(usd("10.005").round_to_minor(), usd("10.01"));
        assert_eq!(usd("10.004").round_to_minor(), usd("10.00"));
        assert_eq!(usd("10.015").round_to_minor(), usd("10.02"));
        assert_eq!(usd("10").round_to_minor(), usd("10"));
    }

    #[test]
    fn arithmetics() {
        assert_eq!(usd("10.50") + usd("0.25"), usd("10.75"));
        assert_eq!(usd("10.50") - usd("0.25"), usd("10.25"));
        assert_eq!(usd("10.50") * decimal("3"), usd("31.50"));
        assert!(Money::zero(Currency::Usd).is_zero());
    }

    #[test]
    #[should_panic(expected = "`Currency` mismatch")]
    fn addition_requires_same_currency() {
        _ = usd("1") + Money::from_str("1EUR").unwrap();
    }
}
