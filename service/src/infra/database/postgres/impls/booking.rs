//! [`Booking`]-related [`Database`] implementations.

use common::{
    money::Currency,
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use rust_decimal::Decimal;
use time::Time;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, Slot, Term, TermKind},
        space::price,
        Booking,
    },
    infra::{
        database::{self, Postgres},
        postgres::Connection,
        Database,
    },
    read::{self, Occupying},
};

use super::space::{capacity, money};

/// Reconstructs a [`Booking`] out of its stored row.
fn from_row(row: &Row) -> Result<Booking, Traced<database::Error>> {
    let currency: Currency = row.get("price_currency");

    let term = match row.get("term_kind") {
        TermKind::Hours => {
            match (
                row.get::<_, Option<Time>>("term_start"),
                row.get::<_, Option<Time>>("term_end"),
            ) {
                (Some(start), Some(end)) => Term::Hours { start, end },
                _ => {
                    return Err(tracerr::new!(database::Error::Corrupted(
                        "hourly term without a time window",
                    )));
                }
            }
        }
        TermKind::Days => Term::Days {
            count: row
                .get::<_, Option<i32>>("term_days")
                .and_then(|d| u32::try_from(d).ok())
                .ok_or_else(|| {
                    tracerr::new!(database::Error::Corrupted(
                        "daily term without a day count",
                    ))
                })?,
        },
    };
    let slot = Slot::new(row.get("date"), term).map_err(|_| {
        tracerr::new!(database::Error::Corrupted("invalid stored slot"))
    })?;

    let cancellation = row
        .get::<_, Option<booking::Reason>>("cancel_reason")
        .map(|reason| -> Result<_, Traced<database::Error>> {
            Ok(booking::Cancellation {
                reason,
                by_admin: row
                    .get::<_, Option<bool>>("cancelled_by_admin")
                    .ok_or_else(|| {
                        tracerr::new!(database::Error::Corrupted(
                            "cancellation without an initiator",
                        ))
                    })?,
                at: row
                    .get::<_, Option<booking::CancellationDateTime>>(
                        "cancelled_at",
                    )
                    .ok_or_else(|| {
                        tracerr::new!(database::Error::Corrupted(
                            "cancellation without a timestamp",
                        ))
                    })?,
            })
        })
        .transpose()?;

    Ok(Booking {
        id: row.get("id"),
        space_id: row.get("space_id"),
        client_id: row.get("client_id"),
        created_by_admin: row.get("created_by_admin"),
        slot,
        party_size: capacity(row.get("party_size"))
            .map_err(tracerr::wrap!())?,
        price: price::Breakdown {
            base: money(row.get("price_base"), Some(currency))
                .map_err(tracerr::wrap!())?,
            extra_persons: money(row.get("price_extra"), Some(currency))
                .map_err(tracerr::wrap!())?,
            total: money(row.get("price_total"), Some(currency))
                .map_err(tracerr::wrap!())?,
        },
        deposit: row
            .get::<_, Option<Decimal>>("deposit")
            .map(|amount| Money { amount, currency }),
        amount_held: money(row.get("held"), Some(currency))
            .map_err(tracerr::wrap!())?,
        hold: row.get("hold_ref"),
        settlement: booking::Settlement {
            refunded: row
                .get::<_, Option<Decimal>>("refunded")
                .map(|amount| Money { amount, currency }),
            captured: row
                .get::<_, Option<Decimal>>("captured")
                .map(|amount| Money { amount, currency }),
        },
        status: row.get("status"),
        cancellation,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Columns selected by every [`Booking`] query.
const COLUMNS: &str = "\
    id, space_id, client_id, created_by_admin, \
    date, term_kind, term_start, term_end, term_days, \
    party_size, \
    price_base, price_extra, price_total, price_currency, \
    deposit, held, hold_ref, \
    refunded, captured, \
    status, \
    cancel_reason, cancelled_by_admin, cancelled_at, \
    created_at, updated_at";

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE id = $1::UUID",
        );
        self.query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row)
            .transpose()
    }
}

impl<C> Database<Select<By<Vec<Occupying<Booking>>, read::SlotFilter>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Occupying<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Occupying<Booking>>, read::SlotFilter>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::SlotFilter { space, from, until } = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE space_id = $1::UUID \
               AND status IN (SELECT unnest($2::INT2[]) LIMIT $3::INT4) \
               AND start_at < $4::TIMESTAMPTZ \
               AND end_at > $5::TIMESTAMPTZ",
        );
        self.query(
            &sql,
            &[
                &space,
                &[booking::Status::Pending, booking::Status::Confirmed]
                    .as_slice(),
                &2i32,
                &until,
                &from,
            ],
        )
        .await
        .map_err(tracerr::wrap!())?
        .iter()
        .map(|row| from_row(row).map(Occupying))
        .collect()
    }
}

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let (term_start, term_end, term_days) = match booking.slot.term() {
            Term::Hours { start, end } => (Some(start), Some(end), None),
            Term::Days { count } => {
                (None, None, Some(i32::try_from(count).unwrap_or(i32::MAX)))
            }
        };

        const SQL: &str = "\
            INSERT INTO bookings (\
                id, space_id, client_id, created_by_admin, \
                date, term_kind, term_start, term_end, term_days, \
                start_at, end_at, \
                party_size, \
                price_base, price_extra, price_total, price_currency, \
                deposit, held, hold_ref, \
                refunded, captured, \
                status, \
                cancel_reason, cancelled_by_admin, cancelled_at, \
                created_at, updated_at\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::BOOLEAN, \
                $5::DATE, $6::INT2, $7::TIME, $8::TIME, $9::INT4, \
                $10::TIMESTAMPTZ, $11::TIMESTAMPTZ, \
                $12::INT2, \
                $13::NUMERIC, $14::NUMERIC, $15::NUMERIC, $16::INT2, \
                $17::NUMERIC, $18::NUMERIC, $19::VARCHAR, \
                $20::NUMERIC, $21::NUMERIC, \
                $22::INT2, \
                $23::VARCHAR, $24::BOOLEAN, $25::TIMESTAMPTZ, \
                $26::TIMESTAMPTZ, $27::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &booking.id,
                &booking.space_id,
                &booking.client_id,
                &booking.created_by_admin,
                &booking.slot.date(),
                &booking.slot.term().kind(),
                &term_start,
                &term_end,
                &term_days,
                &booking.slot.starts_at(),
                &booking.slot.ends_at(),
                &i16::try_from(booking.party_size.get()).unwrap_or(i16::MAX),
                &booking.price.base.amount,
                &booking.price.extra_persons.amount,
                &booking.price.total.amount,
                &booking.price.total.currency,
                &booking.deposit.map(|d| d.amount),
                &booking.amount_held.amount,
                &booking.hold,
                &booking.settlement.refunded.map(|m| m.amount),
                &booking.settlement.captured.map(|m| m.amount),
                &booking.status,
                &booking.cancellation.as_ref().map(|c| c.reason.clone()),
                &booking.cancellation.as_ref().map(|c| c.by_admin),
                &booking.cancellation.as_ref().map(|c| c.at),
                &booking.created_at,
                &booking.updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE bookings \
            SET refunded = $2::NUMERIC, \
                captured = $3::NUMERIC, \
                status = $4::INT2, \
                cancel_reason = $5::VARCHAR, \
                cancelled_by_admin = $6::BOOLEAN, \
                cancelled_at = $7::TIMESTAMPTZ, \
                updated_at = $8::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &booking.id,
                &booking.settlement.refunded.map(|m| m.amount),
                &booking.settlement.captured.map(|m| m.amount),
                &booking.status,
                &booking.cancellation.as_ref().map(|c| c.reason.clone()),
                &booking.cancellation.as_ref().map(|c| c.by_admin),
                &booking.cancellation.as_ref().map(|c| c.at),
                &booking.updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Booking, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM bookings \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Update<By<Vec<booking::Id>, booking::CompletionDeadline>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<By<Vec<booking::Id>, booking::CompletionDeadline>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let deadline: booking::CompletionDeadline = by.into_inner();

        const SQL: &str = "\
            UPDATE bookings \
            SET status = $1::INT2, \
                updated_at = NOW() \
            WHERE status = $2::INT2 \
              AND end_at <= $3::TIMESTAMPTZ \
            RETURNING id";
        self.query(
            SQL,
            &[
                &booking::Status::Completed,
                &booking::Status::Confirmed,
                &deadline,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|rows| rows.into_iter().map(|row| row.get("id")).collect())
    }
}
