//! [`Command`] for marking a confirmed [`Booking`] as a no-show.

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, Booking},
    infra::{database, notify, payment, Database, Notifier, Payments},
    Service,
};

use super::Command;

/// [`Command`] for marking a confirmed [`Booking`] as a no-show.
///
/// The whole held amount is forfeited.
#[derive(Clone, Copy, Debug)]
pub struct MarkNoShow {
    /// ID of the [`Booking`] to mark.
    pub booking_id: booking::Id,
}

impl<Db, Pmt, Ntf> Command<MarkNoShow> for Service<Db, Pmt, Ntf>
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
    Pmt: Payments<payment::Capture, Ok = (), Err = payment::Error>,
    Ntf: Notifier<notify::Notify, Ok = (), Err = notify::Error>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: MarkNoShow) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let MarkNoShow { booking_id } = cmd;

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

        if !booking.status.can_become(booking::Status::NoShow) {
            return Err(tracerr::new!(E::CannotMarkNoShow(booking.status)));
        }

        // The capture is recorded in its own committed step before the
        // status advances, so a retry never captures the hold twice.
        // Committing releases the row lock, so the status step re-acquires
        // it and re-reads the booking in its own transaction.
        if !booking.amount_held.is_zero()
            && booking.settlement.captured.is_none()
        {
            self.payments()
                .execute(payment::Capture {
                    hold: booking.hold.clone(),
                    amount: booking.amount_held,
                })
                .await
                .map_err(tracerr::from_and_wrap!(=> E))?;
            booking.settlement.captured = Some(booking.amount_held);
            booking.updated_at = DateTime::now().coerce();
            tx.execute(Update(booking.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Lock(By::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;
        if !booking.status.can_become(booking::Status::NoShow) {
            return Err(tracerr::new!(E::CannotMarkNoShow(booking.status)));
        }
        booking.status = booking::Status::NoShow;
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
                template: notify::Template::NoShowRecorded,
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

/// Error of [`MarkNoShow`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// Only confirmed [`Booking`]s can be marked as no-shows.
    #[display("cannot mark a booking in the `{_0}` status as a no-show")]
    CannotMarkNoShow(#[error(not(source))] booking::Status),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Payments`] operation failed.
    #[display("`Payments` operation failed: {_0}")]
    #[from]
    Payment(payment::Error),
}
