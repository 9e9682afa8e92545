//! [`CompleteElapsedBookings`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Start, Update};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::booking,
    infra::{database, Database},
    Service,
};

use super::Task;

/// Configuration for [`CompleteElapsedBookings`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between sweeps of elapsed [`Booking`]s.
    ///
    /// [`Booking`]: crate::domain::Booking
    #[default(time::Duration::from_secs(60))]
    pub interval: time::Duration,
}

/// [`Task`] for sweeping confirmed [`Booking`]s whose slots have elapsed
/// into the completed status.
///
/// [`Booking`]: crate::domain::Booking
#[derive(Clone, Copy, Debug)]
pub struct CompleteElapsedBookings<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Pmt, Ntf> Task<Start<By<CompleteElapsedBookings<Self>, Config>>>
    for Service<Db, Pmt, Ntf>
where
    CompleteElapsedBookings<Service<Db, Pmt, Ntf>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<CompleteElapsedBookings<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = CompleteElapsedBookings {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::CompleteElapsedBookings` failed: {e}");
            });
        }
    }
}

impl<Db, Pmt, Ntf> Task<Perform<()>>
    for CompleteElapsedBookings<Service<Db, Pmt, Ntf>>
where
    Db: Database<
        Update<By<Vec<booking::Id>, booking::CompletionDeadline>>,
        Ok = Vec<booking::Id>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let completed = self
            .service
            .database()
            .execute(Update(By::new(booking::CompletionDeadline::now())))
            .await
            .map_err(tracerr::wrap!())?;
        if !completed.is_empty() {
            log::info!("completed {} elapsed bookings", completed.len());
        }
        Ok(())
    }
}

/// Error of [`CompleteElapsedBookings`] execution.
pub type ExecutionError = Traced<database::Error>;
