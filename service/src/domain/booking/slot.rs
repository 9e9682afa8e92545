//! [`Slot`] being reserved: a calendar date plus a booked [`Term`].

use common::{define_kind, DateTime};
use derive_more::{Display, Error as StdError};
use rust_decimal::Decimal;
use time::Time;

/// Booked term within a [`Slot`]'s date.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Term {
    /// Sub-day window between two times of the [`Slot`]'s date.
    Hours {
        /// Start of the window (inclusive).
        start: Time,

        /// End of the window (exclusive).
        end: Time,
    },

    /// One or more whole days starting at the [`Slot`]'s date.
    ///
    /// Weekly and monthly reservations are expressed as day counts and
    /// occupy their whole range.
    Days {
        /// Number of occupied days.
        count: u32,
    },
}

impl Term {
    /// Returns the [`TermKind`] of this [`Term`].
    #[must_use]
    pub fn kind(&self) -> TermKind {
        match self {
            Self::Hours { .. } => TermKind::Hours,
            Self::Days { .. } => TermKind::Days,
        }
    }
}

define_kind! {
    #[doc = "Kind of a [`Term`]."]
    enum TermKind {
        #[doc = "[`Term::Hours`] term."]
        Hours = 1,

        #[doc = "[`Term::Days`] term."]
        Days = 2,
    }
}

/// Returns the billed hour count of an hourly window.
///
/// The first hour is always billed in full; subsequent fractional hours are
/// billed pro-rata.
pub(crate) fn billed_hours(start: Time, end: Time) -> Decimal {
    let minutes = Decimal::from((end - start).whole_minutes());
    (minutes / Decimal::from(60)).max(Decimal::ONE)
}

/// Space-and-time combination being reserved.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Slot {
    /// Calendar date the reservation starts at.
    date: time::Date,

    /// Booked [`Term`].
    term: Term,
}

impl Slot {
    /// Creates a new [`Slot`] if the provided [`Term`] forms a valid
    /// time window.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTimeWindow`] on an empty or inverted window.
    pub fn new(date: time::Date, term: Term) -> Result<Self, Error> {
        match term {
            Term::Hours { start, end } if end <= start => {
                Err(Error::InvalidTimeWindow)
            }
            Term::Days { count: 0 } => Err(Error::InvalidTimeWindow),
            Term::Hours { .. } | Term::Days { .. } => Ok(Self { date, term }),
        }
    }

    /// Returns the calendar date this [`Slot`] starts at.
    #[must_use]
    pub fn date(&self) -> time::Date {
        self.date
    }

    /// Returns the booked [`Term`] of this [`Slot`].
    #[must_use]
    pub fn term(&self) -> Term {
        self.term
    }

    /// Returns the [`DateTime`] this [`Slot`] starts at (inclusive).
    #[must_use]
    pub fn starts_at(&self) -> DateTime {
        match self.term {
            Term::Hours { start, .. } => {
                DateTime::from_date_time(self.date, start)
            }
            Term::Days { .. } => {
                DateTime::from_date_time(self.date, Time::MIDNIGHT)
            }
        }
    }

    /// Returns the [`DateTime`] this [`Slot`] ends at (exclusive).
    #[must_use]
    pub fn ends_at(&self) -> DateTime {
        match self.term {
            Term::Hours { end, .. } => DateTime::from_date_time(self.date, end),
            Term::Days { count } => {
                DateTime::from_date_time(self.date, Time::MIDNIGHT)
                    + std::time::Duration::from_secs(
                        u64::from(count) * 24 * 60 * 60,
                    )
            }
        }
    }

    /// Indicates whether this [`Slot`] overlaps with the `other` one.
    ///
    /// Intervals are half-open: a [`Slot`] ending exactly when another one
    /// starts does not overlap it.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.starts_at() < other.ends_at() && self.ends_at() > other.starts_at()
    }

    /// Returns the number of whole calendar days between `now` and this
    /// [`Slot`]'s date.
    ///
    /// Dates in the past (or today) count as `0` days before.
    #[must_use]
    pub fn days_before(&self, now: DateTime) -> u16 {
        u16::try_from((self.date - now.date()).whole_days().max(0))
            .unwrap_or(u16::MAX)
    }
}

/// Error of creating a [`Slot`].
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// The requested time window is empty or inverted.
    #[display("the requested time window is empty or inverted")]
    InvalidTimeWindow,
}

#[cfg(test)]
mod spec {
    use common::DateTime;
    use time::{Date, Month, Time};

    use super::{Slot, Term};

    fn date(day: u8) -> Date {
        Date::from_calendar_date(2025, Month::March, day).unwrap()
    }

    fn hours(day: u8, from: u8, to: u8) -> Slot {
        Slot::new(
            date(day),
            Term::Hours {
                start: Time::from_hms(from, 0, 0).unwrap(),
                end: Time::from_hms(to, 0, 0).unwrap(),
            },
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted_windows() {
        let start = Time::from_hms(12, 0, 0).unwrap();

        assert!(Slot::new(
            date(1),
            Term::Hours {
                start,
                end: start,
            },
        )
        .is_err());
        assert!(Slot::new(
            date(1),
            Term::Hours {
                start,
                end: Time::from_hms(11, 0, 0).unwrap(),
            },
        )
        .is_err());
        assert!(Slot::new(date(1), Term::Days { count: 0 }).is_err());
    }

    #[test]
    fn overlap_is_half_open() {
        let morning = hours(1, 9, 12);
        let noon = hours(1, 12, 15);
        let late_morning = hours(1, 11, 13);

        // Touching boundaries do not conflict.
        assert!(!morning.overlaps(&noon));
        assert!(!noon.overlaps(&morning));

        assert!(morning.overlaps(&late_morning));
        assert!(late_morning.overlaps(&noon));
        assert!(morning.overlaps(&morning));
    }

    #[test]
    fn daily_terms_occupy_whole_days() {
        let two_days = Slot::new(date(1), Term::Days { count: 2 }).unwrap();

        assert!(two_days.overlaps(&hours(1, 9, 10)));
        assert!(two_days.overlaps(&hours(2, 22, 23)));
        assert!(!two_days.overlaps(&hours(3, 0, 1)));
    }

    #[test]
    fn days_before_counts_calendar_days() {
        let slot = hours(10, 9, 12);

        let five_before = DateTime::from_date_time(
            date(5),
            Time::from_hms(23, 59, 0).unwrap(),
        );
        assert_eq!(slot.days_before(five_before), 5);

        let same_day =
            DateTime::from_date_time(date(10), Time::MIDNIGHT);
        assert_eq!(slot.days_before(same_day), 0);

        let after = DateTime::from_date_time(date(15), Time::MIDNIGHT);
        assert_eq!(slot.days_before(after), 0);
    }
}
