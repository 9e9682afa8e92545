//! Deposit [`Policy`] definitions.

use common::{Money, Percent};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::space;

/// Deposit policy of a space: which bookings may be held for a deposit
/// instead of their full price, and how big that deposit is.
#[derive(Clone, Debug)]
pub struct Policy {
    /// ID of this [`Policy`].
    pub id: Id,

    /// Minimum booking total a deposit applies from.
    pub min_amount: Money,

    /// Share of the booking's total held as a deposit.
    pub percent: Percent,

    /// Space [`Kind`]s this [`Policy`] applies to.
    ///
    /// [`Kind`]: space::Kind
    pub applies_to: Vec<space::Kind>,
}

impl Policy {
    /// Returns the deposit required for booking a space of the given
    /// [`Kind`] at the given `total` price, or [`None`] if the full price
    /// should be held instead.
    ///
    /// No deposit applies to totals below [`Policy::min_amount`], to
    /// [`Kind`]s outside [`Policy::applies_to`], or to totals in a currency
    /// other than the [`Policy::min_amount`]'s one.
    ///
    /// [`Kind`]: space::Kind
    #[must_use]
    pub fn required(&self, kind: space::Kind, total: Money) -> Option<Money> {
        (self.applies_to.contains(&kind)
            && total.currency == self.min_amount.currency
            && total.amount >= self.min_amount.amount)
            .then(|| self.percent.of(total))
    }
}

/// ID of a deposit [`Policy`].
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

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money, Percent};
    use rust_decimal::Decimal;

    use crate::domain::space;

    use super::{Id, Policy};

    fn usd(amount: u32) -> Money {
        Money {
            amount: Decimal::from(amount),
            currency: Currency::Usd,
        }
    }

    fn policy() -> Policy {
        Policy {
            id: Id::new(),
            min_amount: usd(200),
            percent: Percent::new(Decimal::from(50)).unwrap(),
            applies_to: vec![space::Kind::EventHall],
        }
    }

    #[test]
    fn gates_on_total_and_kind() {
        let p = policy();

        assert_eq!(p.required(space::Kind::EventHall, usd(199)), None);
        assert_eq!(
            p.required(space::Kind::EventHall, usd(200)),
            Some(usd(100)),
        );
        assert_eq!(
            p.required(space::Kind::EventHall, usd(500)),
            Some(usd(250)),
        );
        assert_eq!(p.required(space::Kind::MeetingRoom, usd(500)), None);
    }

    #[test]
    fn skips_foreign_currency_totals() {
        let p = policy();
        let eur = Money {
            amount: Decimal::from(500),
            currency: Currency::Eur,
        };

        assert_eq!(p.required(space::Kind::EventHall, eur), None);
    }
}
