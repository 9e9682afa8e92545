//! [`Command`] for completing an elapsed [`Booking`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, Booking},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for completing a confirmed [`Booking`] whose slot has
/// elapsed.
#[derive(Clone, Copy, Debug)]
pub struct CompleteBooking {
    /// ID of the [`Booking`] to complete.
    pub booking_id: booking::Id,
}

impl<Db, Pmt, Ntf> Command<CompleteBooking> for Service<Db, Pmt, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CompleteBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CompleteBooking { booking_id } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent transitions of the same `Booking`.
        tx.execute(Lock(By::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        if !booking.status.can_become(booking::Status::Completed) {
            return Err(tracerr::new!(E::CannotComplete(booking.status)));
        }
        if booking.slot.ends_at() > DateTime::now() {
            return Err(tracerr::new!(E::NotYetElapsed(booking_id)));
        }

        booking.status = booking::Status::Completed;
        booking.updated_at = DateTime::now().coerce();
        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(booking)
    }
}

/// Error of [`CompleteBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// Only confirmed [`Booking`]s can be completed.
    #[display("cannot complete a booking in the `{_0}` status")]
    CannotComplete(#[error(not(source))] booking::Status),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`]'s slot has not elapsed yet.
    #[display("`Booking(id: {_0})` has not elapsed yet")]
    NotYetElapsed(#[error(not(source))] booking::Id),
}
