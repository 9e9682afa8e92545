//! Transactional [`Tx`] client.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

use super::NonTx;

/// Postgres client running its statements inside a transaction.
///
/// The transaction is begun lazily, on the first statement. Committing
/// releases the [`Connection`], so a committed [`Tx`] client begins a fresh
/// transaction once used again, which allows phased multi-commit flows over
/// a single client.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`connection::Pool`] to check a [`Connection`] out of, whenever the
    /// originating [`NonTx`] client has none to hand over.
    pool: connection::Pool,

    /// Shared state of this client.
    inner: Arc<Inner>,
}

/// Shared state of a [`Tx`] client.
#[derive(Debug)]
struct Inner {
    /// Originating [`NonTx`] client to take the [`Connection`] over from.
    non_tx: RwLock<Option<NonTx>>,

    /// Lazily begun [`connection::Tx`].
    tx: RwLock<Option<connection::Tx>>,
}

impl Tx {
    /// Creates a new [`Tx`] client taking over the provided [`NonTx`]
    /// client's [`Connection`].
    #[must_use]
    pub fn from_non_tx(client: NonTx) -> Self {
        Self {
            pool: client.pool.clone(),
            inner: Arc::new(Inner {
                non_tx: RwLock::new(Some(client)),
                tx: RwLock::new(None),
            }),
        }
    }

    /// Returns the transactional [`Connection`] of this client, beginning a
    /// new transaction if none is active.
    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::Tx>, Traced<database::Error>>
    {
        let active = self.inner.tx.read().await;
        let guard = if active.is_some() {
            active
        } else {
            drop(active);

            let mut active = self.inner.tx.write().await;
            if active.is_none() {
                let handed_over =
                    match self.inner.non_tx.write().await.take() {
                        Some(client) => client.take_connection().await,
                        None => None,
                    };
                let conn = match handed_over {
                    Some(conn) => conn,
                    None => self
                        .pool
                        .get()
                        .await
                        .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                        .map_err(tracerr::map_from)?,
                };

                *active = Some(
                    connection::Tx::from_non_tx(conn)
                        .await
                        .map_err(tracerr::wrap!())?,
                );
            }
            active.downgrade()
        };

        Ok(RwLockReadGuard::map(guard, |conn| {
            conn.as_ref()
                .expect("connection cannot be dropped while guard is alive")
        }))
    }

    /// Commits the active transaction of this [`Tx`] client, if any.
    ///
    /// # Errors
    ///
    /// If the transaction fails to commit.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        if let Some(tx) = self.inner.tx.write().await.take() {
            tx.commit().await.map_err(tracerr::wrap!())
        } else {
            // No transaction was begun, so nothing to commit.
            Ok(())
        }
    }
}

impl Connection for Tx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.connection()
            .await
            .map_err(tracerr::wrap!())?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.connection()
            .await
            .map_err(tracerr::wrap!())?
            .query_opt(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.connection()
            .await
            .map_err(tracerr::wrap!())?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}
