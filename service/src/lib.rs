//! Service containing the reservation engine business logic.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;

use common::operations::{By, Start};
use derive_more::{Debug, Display, Error};

#[cfg(doc)]
use infra::{Database, Notifier, Payments};

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    /// [`task::CompleteElapsedBookings`] configuration.
    pub complete_elapsed_bookings: task::complete_elapsed_bookings::Config,
}

/// Domain service.
///
/// Orchestrates the booking lifecycle over a [`Database`], an external
/// [`Payments`] holder and a [`Notifier`].
#[derive(Clone, Debug)]
pub struct Service<Db, Pmt, Ntf> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// External [`Payments`] holder of this [`Service`].
    payments: Pmt,

    /// External [`Notifier`] of this [`Service`].
    notifier: Ntf,
}

impl<Db, Pmt, Ntf> Service<Db, Pmt, Ntf> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(
        config: Config,
        database: Db,
        payments: Pmt,
        notifier: Ntf,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::CompleteElapsedBookings<Self>,
                        task::complete_elapsed_bookings::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Service {
            config,
            database,
            payments,
            notifier,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(
                svc.config().complete_elapsed_bookings,
            )))
            .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns the external [`Payments`] holder of this [`Service`].
    #[must_use]
    pub fn payments(&self) -> &Pmt {
        &self.payments
    }

    /// Returns the external [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &Ntf {
        &self.notifier
    }
}

/// Shortcut for the error of starting a [`Task`].
type TaskStartError<Svc, T, Args> = <Svc as Task<Start<By<T, Args>>>>::Err;

/// Error of starting a [`Service`].
#[derive(Debug, Display, Error)]
pub enum StartupError<Svc>
where
    Svc: Task<
        Start<
            By<
                task::CompleteElapsedBookings<Svc>,
                task::complete_elapsed_bookings::Config,
            >,
        >,
    >,
{
    /// [`task::CompleteElapsedBookings`] failed to start.
    CompleteElapsedBookingsTask(
        TaskStartError<
            Svc,
            task::CompleteElapsedBookings<Svc>,
            task::complete_elapsed_bookings::Config,
        >,
    ),
}
