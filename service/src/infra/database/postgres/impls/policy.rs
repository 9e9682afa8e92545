//! Policy-related [`Database`] implementations.

use common::{
    operations::{By, Select},
    Money,
};
use tracerr::Traced;

use crate::{
    domain::policy::{cancellation, deposit},
    infra::{
        database::{self, Postgres},
        postgres::Connection,
        Database,
    },
};

impl<C> Database<Select<By<Option<cancellation::Policy>, cancellation::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<cancellation::Policy>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<cancellation::Policy>, cancellation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: cancellation::Id = by.into_inner();

        const SQL: &str = "\
            SELECT days_before, charge \
            FROM cancellation_policy_tiers \
            WHERE policy_id = $1::UUID \
            ORDER BY days_before DESC";
        let tiers = self
            .query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                Ok(cancellation::Tier {
                    days_before: u16::try_from(
                        row.get::<_, i16>("days_before"),
                    )
                    .map_err(|_| {
                        tracerr::new!(database::Error::Corrupted(
                            "negative cancellation tier days",
                        ))
                    })?,
                    charge: row.get("charge"),
                })
            })
            .collect::<Result<Vec<_>, Traced<database::Error>>>()?;

        if tiers.is_empty() {
            return Ok(None);
        }
        cancellation::Policy::new(id, tiers)
            .map(Some)
            .map_err(|_| {
                tracerr::new!(database::Error::Corrupted(
                    "invalid cancellation policy tiers",
                ))
            })
    }
}

impl<C> Database<Select<By<Option<deposit::Policy>, deposit::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<deposit::Policy>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<deposit::Policy>, deposit::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: deposit::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, min_amount, currency, percent \
            FROM deposit_policies \
            WHERE id = $1::UUID";
        let Some(row) = self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        const KINDS_SQL: &str = "\
            SELECT kind \
            FROM deposit_policy_kinds \
            WHERE policy_id = $1::UUID";
        let applies_to = self
            .query(KINDS_SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get("kind"))
            .collect();

        Ok(Some(deposit::Policy {
            id: row.get("id"),
            min_amount: Money {
                amount: row.get("min_amount"),
                currency: row.get("currency"),
            },
            percent: row.get("percent"),
            applies_to,
        }))
    }
}
