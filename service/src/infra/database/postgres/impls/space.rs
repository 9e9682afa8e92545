//! [`SpaceConfiguration`]-related [`Database`] implementations.

use common::{
    operations::{By, Lock, Select},
    Money,
};
use rust_decimal::Decimal;
use tracerr::Traced;

use crate::{
    domain::{
        space::{self, price},
        SpaceConfiguration,
    },
    infra::{
        database::{self, Postgres},
        postgres::Connection,
        Database,
    },
};

/// Parses a [`space::Capacity`] out of its stored `INT2` representation.
pub(super) fn capacity(
    v: i16,
) -> Result<space::Capacity, Traced<database::Error>> {
    u16::try_from(v)
        .ok()
        .and_then(space::Capacity::new)
        .ok_or_else(|| {
            tracerr::new!(database::Error::Corrupted("non-positive capacity"))
        })
}

/// Parses a [`Money`] out of its stored nullable amount and currency columns.
pub(super) fn money(
    amount: Option<Decimal>,
    currency: Option<common::money::Currency>,
) -> Result<Money, Traced<database::Error>> {
    match (amount, currency) {
        (Some(amount), Some(currency)) => Ok(Money { amount, currency }),
        _ => Err(tracerr::new!(database::Error::Corrupted(
            "money amount without currency",
        ))),
    }
}

impl<C> Database<Select<By<Option<SpaceConfiguration>, space::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<SpaceConfiguration>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<SpaceConfiguration>, space::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: space::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, name, kind, \
                   min_capacity, max_capacity, \
                   rule_kind, \
                   hourly_rate, daily_rate, rate_currency, full_day_after, \
                   cancellation_policy_id, deposit_policy_id, \
                   is_active \
            FROM spaces \
            WHERE id = $1::UUID";
        let Some(row) = self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        let rule = match row.get("rule_kind") {
            price::Kind::PerPerson => {
                let rate_currency = row.get("rate_currency");
                price::Rule::PerPerson(price::PerPerson {
                    hourly_rate: money(row.get("hourly_rate"), rate_currency)
                        .map_err(tracerr::wrap!())?,
                    daily_rate: money(row.get("daily_rate"), rate_currency)
                        .map_err(tracerr::wrap!())?,
                    full_day_after: row
                        .get::<_, Option<i16>>("full_day_after")
                        .and_then(|h| u8::try_from(h).ok())
                        .ok_or_else(|| {
                            tracerr::new!(database::Error::Corrupted(
                                "missing daily rate threshold",
                            ))
                        })?,
                })
            }
            price::Kind::CapacityTiered => {
                const TIERS_SQL: &str = "\
                    SELECT min_people, max_people, \
                           hourly_rate, daily_rate, currency, \
                           extra_person_hourly, extra_person_daily \
                    FROM space_price_tiers \
                    WHERE space_id = $1::UUID \
                    ORDER BY min_people ASC";
                let tiers = self
                    .query(TIERS_SQL, &[&id])
                    .await
                    .map_err(tracerr::wrap!())?
                    .into_iter()
                    .map(|row| {
                        let currency = row.get("currency");
                        Ok(price::Tier {
                            min_people: capacity(row.get("min_people"))
                                .map_err(tracerr::wrap!())?,
                            max_people: capacity(row.get("max_people"))
                                .map_err(tracerr::wrap!())?,
                            hourly_rate: money(
                                row.get("hourly_rate"),
                                Some(currency),
                            )
                            .map_err(tracerr::wrap!())?,
                            daily_rate: money(
                                row.get("daily_rate"),
                                Some(currency),
                            )
                            .map_err(tracerr::wrap!())?,
                            extra_person_hourly: row
                                .get::<_, Option<Decimal>>(
                                    "extra_person_hourly",
                                )
                                .map(|amount| Money { amount, currency }),
                            extra_person_daily: row
                                .get::<_, Option<Decimal>>(
                                    "extra_person_daily",
                                )
                                .map(|amount| Money { amount, currency }),
                        })
                    })
                    .collect::<Result<Vec<_>, Traced<database::Error>>>()?;
                price::Rule::CapacityTiered(price::Tiered { tiers })
            }
            price::Kind::Quote => price::Rule::Quote,
        };

        Ok(Some(SpaceConfiguration {
            id: row.get("id"),
            name: row.get("name"),
            kind: row.get("kind"),
            min_capacity: capacity(row.get("min_capacity"))
                .map_err(tracerr::wrap!())?,
            max_capacity: capacity(row.get("max_capacity"))
                .map_err(tracerr::wrap!())?,
            rule,
            cancellation_policy: row.get("cancellation_policy_id"),
            deposit_policy: row.get("deposit_policy_id"),
            is_active: row.get("is_active"),
        }))
    }
}

impl<C> Database<Lock<By<SpaceConfiguration, space::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<SpaceConfiguration, space::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: space::Id = by.into_inner();

        // `DO NOTHING` takes no lock on a conflicting committed row, while
        // `DO UPDATE` locks it, serializing concurrent transactions on the
        // same space.
        const SQL: &str = "\
            INSERT INTO spaces_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET id = excluded.id";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
