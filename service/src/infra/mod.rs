//! Infrastructure implementations.

pub mod database;
pub mod notify;
pub mod payment;

pub use self::{
    database::Database, notify::Notifier, payment::Payments,
};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
