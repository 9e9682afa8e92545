//! [`Command`] for confirming a pending [`Booking`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, Booking},
    infra::{database, notify, Database, Notifier},
    Service,
};

use super::Command;

/// [`Command`] for confirming a pending [`Booking`] once its payment is
/// confirmed.
#[derive(Clone, Copy, Debug)]
pub struct ConfirmBooking {
    /// ID of the [`Booking`] to confirm.
    pub booking_id: booking::Id,
}

impl<Db, Pmt, Ntf> Command<ConfirmBooking> for Service<Db, Pmt, Ntf>
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
    Ntf: Notifier<notify::Notify, Ok = (), Err = notify::Error>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ConfirmBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ConfirmBooking { booking_id } = cmd;

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

        if !booking.status.can_become(booking::Status::Confirmed) {
            return Err(tracerr::new!(E::CannotConfirm(booking.status)));
        }

        booking.status = booking::Status::Confirmed;
        booking.updated_at = DateTime::now().coerce();
        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        if let Err(e) = self
            .notifier()
            .execute(notify::Notify {
                template: notify::Template::BookingConfirmed,
                client: booking.client_id,
                booking: booking.id,
            })
            .await
        {
            log::warn!(
                "failed to notify about `Booking(id: {booking_id})`: {e}",
            );
        }

        Ok(booking)
    }
}

/// Error of [`ConfirmBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Booking`] is not awaiting confirmation.
    #[display("cannot confirm a booking in the `{_0}` status")]
    CannotConfirm(#[error(not(source))] booking::Status),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}
