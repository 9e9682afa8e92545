//! Domain definitions.

pub mod booking;
pub mod client;
pub mod policy;
pub mod space;

pub use self::{booking::Booking, space::SpaceConfiguration};
