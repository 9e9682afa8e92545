//! Pricing [`Rule`]s and price computation.

use common::{define_kind, Money};
use derive_more::{Display, Error as StdError};
use rust_decimal::Decimal;

use crate::domain::booking::{slot, Term};

use super::Capacity;

/// Pricing rule of a space.
#[derive(Clone, Debug)]
pub enum Rule {
    /// Per-person hourly rate switching to a flat per-person daily rate
    /// once the booked term reaches a threshold of hours.
    PerPerson(PerPerson),

    /// Flat rate chosen by the capacity tier containing the party size,
    /// with optional surcharges for people above the tier.
    CapacityTiered(Tiered),

    /// No computed price; the space is booked via a manual quote only.
    Quote,
}

impl Rule {
    /// Computes the price of booking a space under this [`Rule`].
    ///
    /// The party size is expected to be within the space capacity bounds
    /// already; `max_capacity` is only used to validate tier coverage.
    ///
    /// # Errors
    ///
    /// See [`SpaceConfiguration::price()`].
    ///
    /// [`SpaceConfiguration::price()`]: super::SpaceConfiguration::price
    pub fn price(
        &self,
        term: &Term,
        party_size: Capacity,
        max_capacity: Capacity,
    ) -> Result<Breakdown, Error> {
        match self {
            Self::PerPerson(r) => Ok(r.price(term, party_size)),
            Self::CapacityTiered(r) => r.price(term, party_size, max_capacity),
            Self::Quote => Err(Error::QuotationRequired),
        }
    }

    /// Returns the [`Kind`] of this [`Rule`].
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::PerPerson(..) => Kind::PerPerson,
            Self::CapacityTiered(..) => Kind::CapacityTiered,
            Self::Quote => Kind::Quote,
        }
    }
}

define_kind! {
    #[doc = "Kind of a pricing [`Rule`]."]
    enum Kind {
        #[doc = "[`Rule::PerPerson`] pricing."]
        PerPerson = 1,

        #[doc = "[`Rule::CapacityTiered`] pricing."]
        CapacityTiered = 2,

        #[doc = "[`Rule::Quote`] pricing."]
        Quote = 3,
    }
}

/// Per-person pricing rates.
#[derive(Clone, Copy, Debug)]
pub struct PerPerson {
    /// Rate per person per billed hour.
    pub hourly_rate: Money,

    /// Flat rate per person per day.
    pub daily_rate: Money,

    /// Number of billed hours at which the [`daily_rate`] replaces the
    /// hourly accumulation.
    ///
    /// [`daily_rate`]: Self::daily_rate
    pub full_day_after: u8,
}

impl PerPerson {
    /// Computes the price for the provided [`Term`] and party size.
    fn price(&self, term: &Term, party_size: Capacity) -> Breakdown {
        let party = Decimal::from(party_size.get());
        let base = match *term {
            Term::Days { count } => {
                self.daily_rate * party * Decimal::from(count)
            }
            Term::Hours { start, end } => {
                let billed = slot::billed_hours(start, end);
                if billed >= Decimal::from(self.full_day_after) {
                    self.daily_rate * party
                } else {
                    self.hourly_rate * billed * party
                }
            }
        }
        .round_to_minor();

        Breakdown {
            base,
            extra_persons: Money::zero(base.currency),
            total: base,
        }
    }
}

/// Capacity-tiered flat rates.
#[derive(Clone, Debug)]
pub struct Tiered {
    /// Capacity [`Tier`]s, ascending by party size and contiguous.
    pub tiers: Vec<Tier>,
}

/// Single capacity bracket of a [`Tiered`] rule.
#[derive(Clone, Copy, Debug)]
pub struct Tier {
    /// Minimum party size of this [`Tier`] (inclusive).
    pub min_people: Capacity,

    /// Maximum party size of this [`Tier`] (inclusive).
    pub max_people: Capacity,

    /// Flat rate per billed hour.
    pub hourly_rate: Money,

    /// Flat rate per day.
    pub daily_rate: Money,

    /// Surcharge per extra person per billed hour, for parties above
    /// [`max_people`].
    ///
    /// [`max_people`]: Self::max_people
    pub extra_person_hourly: Option<Money>,

    /// Surcharge per extra person per day, for parties above
    /// [`max_people`].
    ///
    /// [`max_people`]: Self::max_people
    pub extra_person_daily: Option<Money>,
}

impl Tiered {
    /// Validates the [`Tier`] bracket invariants: non-empty, ascending,
    /// contiguous, and covering the whole capacity range (either directly
    /// or via extra-person surcharges on the top [`Tier`]).
    ///
    /// # Errors
    ///
    /// [`Error::Misconfigured`] on any violation.
    pub fn validate(&self, max_capacity: Capacity) -> Result<(), Error> {
        use Error as E;

        let Some(first) = self.tiers.first() else {
            return Err(E::Misconfigured("no capacity tiers"));
        };
        if first.min_people.get() != 1 {
            return Err(E::Misconfigured("tiers must start at 1 person"));
        }

        let mut prev: Option<&Tier> = None;
        for tier in &self.tiers {
            if tier.max_people < tier.min_people {
                return Err(E::Misconfigured("tier bounds are inverted"));
            }
            if let Some(p) = prev {
                if tier.min_people.get() != p.max_people.get() + 1 {
                    return Err(E::Misconfigured(
                        "tiers must be contiguous and non-overlapping",
                    ));
                }
            }
            prev = Some(tier);
        }

        let last = prev.expect("checked non-empty");
        if max_capacity > last.max_people
            && (last.extra_person_hourly.is_none()
                || last.extra_person_daily.is_none())
        {
            return Err(E::Misconfigured(
                "top tier lacks extra-person rates below the space capacity",
            ));
        }

        Ok(())
    }

    /// Computes the price for the provided [`Term`] and party size.
    fn price(
        &self,
        term: &Term,
        party_size: Capacity,
        max_capacity: Capacity,
    ) -> Result<Breakdown, Error> {
        self.validate(max_capacity)?;

        let (tier, extras) = self
            .tiers
            .iter()
            .find(|t| {
                t.min_people <= party_size && party_size <= t.max_people
            })
            .map(|t| (t, 0))
            .unwrap_or_else(|| {
                let last = self.tiers.last().expect("validated non-empty");
                (last, party_size.get() - last.max_people.get())
            });

        let units = match *term {
            Term::Days { count } => Decimal::from(count),
            Term::Hours { start, end } => slot::billed_hours(start, end),
        };
        let (rate, extra_rate) = match term {
            Term::Days { .. } => (tier.daily_rate, tier.extra_person_daily),
            Term::Hours { .. } => (tier.hourly_rate, tier.extra_person_hourly),
        };

        let base = (rate * units).round_to_minor();
        let extra_persons = if extras > 0 {
            let rate = extra_rate.expect("validated extra-person rates");
            (rate * Decimal::from(extras) * units).round_to_minor()
        } else {
            Money::zero(base.currency)
        };

        Ok(Breakdown {
            base,
            extra_persons,
            total: base + extra_persons,
        })
    }
}

/// Computed price of a booking.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Breakdown {
    /// Price of the booked term itself.
    pub base: Money,

    /// Extra-person surcharges on top of the [`base`] price.
    ///
    /// [`base`]: Self::base
    pub extra_persons: Money,

    /// Total price ([`base`] plus [`extra_persons`]).
    ///
    /// [`base`]: Self::base
    /// [`extra_persons`]: Self::extra_persons
    pub total: Money,
}

/// Error of computing a booking price.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Party size is outside the space capacity bounds.
    #[display("party of {_0} is outside the space capacity bounds")]
    CapacityOutOfRange(#[error(not(source))] Capacity),

    /// The pricing [`Rule`] violates its own invariants.
    #[display("pricing rule is misconfigured: {_0}")]
    Misconfigured(#[error(not(source))] &'static str),

    /// The space has no computed price and requires a manual quote.
    #[display("the space requires a manual quotation")]
    QuotationRequired,
}

#[cfg(test)]
mod spec {
    use common::Money;
    use time::Time;

    use crate::domain::{
        booking::Term,
        policy,
        space::{Capacity, Id, Name, SpaceConfiguration},
    };

    use super::{Error, PerPerson, Rule, Tier, Tiered};

    fn usd(s: &str) -> Money {
        format!("{s}USD").parse().unwrap()
    }

    fn people(n: u16) -> Capacity {
        Capacity::new(n).unwrap()
    }

    fn hours(from: u8, to: u8) -> Term {
        Term::Hours {
            start: Time::from_hms(from, 0, 0).unwrap(),
            end: Time::from_hms(to, 0, 0).unwrap(),
        }
    }

    fn space(rule: Rule, min: u16, max: u16) -> SpaceConfiguration {
        SpaceConfiguration {
            id: Id::new(),
            name: Name::new("Open floor").unwrap(),
            kind: crate::domain::space::Kind::OpenFloor,
            min_capacity: people(min),
            max_capacity: people(max),
            rule,
            cancellation_policy: policy::cancellation::Id::default(),
            deposit_policy: policy::deposit::Id::default(),
            is_active: true,
        }
    }

    fn per_person() -> Rule {
        Rule::PerPerson(PerPerson {
            hourly_rate: usd("5"),
            daily_rate: usd("40"),
            full_day_after: 8,
        })
    }

    fn tiered() -> Rule {
        Rule::CapacityTiered(Tiered {
            tiers: vec![
                Tier {
                    min_people: people(1),
                    max_people: people(4),
                    hourly_rate: usd("30"),
                    daily_rate: usd("180"),
                    extra_person_hourly: None,
                    extra_person_daily: None,
                },
                Tier {
                    min_people: people(5),
                    max_people: people(10),
                    hourly_rate: usd("50"),
                    daily_rate: usd("300"),
                    extra_person_hourly: Some(usd("4")),
                    extra_person_daily: Some(usd("25")),
                },
            ],
        })
    }

    #[test]
    fn bills_first_hour_in_full() {
        let cfg = space(per_person(), 1, 20);
        let half_hour = Term::Hours {
            start: Time::from_hms(9, 0, 0).unwrap(),
            end: Time::from_hms(9, 30, 0).unwrap(),
        };

        let price = cfg.price(&half_hour, people(2)).unwrap();
        assert_eq!(price.total, usd("10"));
    }

    #[test]
    fn bills_fractional_hours_pro_rata_after_the_first() {
        let cfg = space(per_person(), 1, 20);
        let term = Term::Hours {
            start: Time::from_hms(9, 0, 0).unwrap(),
            end: Time::from_hms(11, 30, 0).unwrap(),
        };

        // 2.5 billed hours * 5 USD * 2 people.
        let price = cfg.price(&term, people(2)).unwrap();
        assert_eq!(price.total, usd("25"));
    }

    #[test]
    fn switches_to_daily_rate_at_the_threshold() {
        let cfg = space(per_person(), 1, 20);

        let at_threshold = cfg.price(&hours(9, 17), people(3)).unwrap();
        assert_eq!(at_threshold.total, usd("120")); // 40 * 3

        let just_below = Term::Hours {
            start: Time::from_hms(9, 0, 0).unwrap(),
            end: Time::from_hms(16, 30, 0).unwrap(),
        };
        let below = cfg.price(&just_below, people(3)).unwrap();
        assert_eq!(below.total, usd("112.50")); // 7.5 * 5 * 3
        assert!(below.total.amount < at_threshold.total.amount);
    }

    #[test]
    fn prices_daily_terms_per_day() {
        let cfg = space(per_person(), 1, 20);

        let price = cfg.price(&Term::Days { count: 3 }, people(2)).unwrap();
        assert_eq!(price.total, usd("240")); // 40 * 2 * 3
    }

    #[test]
    fn selects_the_tier_containing_the_party() {
        let cfg = space(tiered(), 1, 12);

        let small = cfg.price(&hours(10, 12), people(3)).unwrap();
        assert_eq!(small.total, usd("60")); // 30 * 2h

        let large = cfg.price(&hours(10, 12), people(8)).unwrap();
        assert_eq!(large.total, usd("100")); // 50 * 2h
    }

    #[test]
    fn charges_extra_persons_above_the_top_tier() {
        let cfg = space(tiered(), 1, 12);

        let price = cfg.price(&hours(10, 12), people(12)).unwrap();
        assert_eq!(price.base, usd("100")); // 50 * 2h
        assert_eq!(price.extra_persons, usd("16")); // 4 * 2 extras * 2h
        assert_eq!(price.total, usd("116"));

        let daily = cfg.price(&Term::Days { count: 1 }, people(12)).unwrap();
        assert_eq!(daily.total, usd("350")); // 300 + 25 * 2
    }

    #[test]
    fn grows_with_party_and_duration() {
        let cfg = space(per_person(), 1, 20);

        let less_people = cfg.price(&hours(9, 12), people(2)).unwrap();
        let more_people = cfg.price(&hours(9, 12), people(5)).unwrap();
        assert!(less_people.total.amount <= more_people.total.amount);

        let shorter = cfg.price(&hours(9, 12), people(2)).unwrap();
        let longer = cfg.price(&hours(9, 15), people(2)).unwrap();
        assert!(shorter.total.amount <= longer.total.amount);
    }

    #[test]
    fn rejects_quote_only_spaces() {
        let cfg = space(Rule::Quote, 1, 100);

        assert!(matches!(
            cfg.price(&hours(9, 12), people(10)),
            Err(Error::QuotationRequired),
        ));
    }

    #[test]
    fn rejects_party_outside_capacity_bounds() {
        let cfg = space(per_person(), 2, 10);

        assert!(matches!(
            cfg.price(&hours(9, 12), people(1)),
            Err(Error::CapacityOutOfRange(..)),
        ));
        assert!(matches!(
            cfg.price(&hours(9, 12), people(11)),
            Err(Error::CapacityOutOfRange(..)),
        ));
    }

    #[test]
    fn rejects_gapped_or_uncovered_tiers() {
        let gapped = Tiered {
            tiers: vec![
                Tier {
                    min_people: people(1),
                    max_people: people(4),
                    hourly_rate: usd("30"),
                    daily_rate: usd("180"),
                    extra_person_hourly: None,
                    extra_person_daily: None,
                },
                Tier {
                    min_people: people(6),
                    max_people: people(10),
                    hourly_rate: usd("50"),
                    daily_rate: usd("300"),
                    extra_person_hourly: None,
                    extra_person_daily: None,
                },
            ],
        };
        assert!(gapped.validate(people(10)).is_err());

        let uncovered = Tiered {
            tiers: vec![Tier {
                min_people: people(1),
                max_people: people(4),
                hourly_rate: usd("30"),
                daily_rate: usd("180"),
                extra_person_hourly: None,
                extra_person_daily: None,
            }],
        };
        assert!(uncovered.validate(people(10)).is_err());
        assert!(uncovered.validate(people(4)).is_ok());
    }
}
