//! [`Command`] for cancelling a [`Booking`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking, client, policy::cancellation, space, Booking,
        SpaceConfiguration,
    },
    infra::{database, notify, payment, Database, Notifier, Payments},
    Service,
};

use super::Command;

/// [`Command`] for cancelling a [`Booking`].
#[derive(Clone, Debug)]
pub struct CancelBooking {
    /// ID of the [`Booking`] to cancel.
    pub booking_id: booking::Id,

    /// [`Initiator`] of the cancellation.
    pub initiator: Initiator,

    /// [`Reason`] of the cancellation.
    ///
    /// [`Reason`]: booking::Reason
    pub reason: booking::Reason,
}

/// Initiator of a [`CancelBooking`] [`Command`].
#[derive(Clone, Copy, Debug)]
pub enum Initiator {
    /// Client owning the [`Booking`].
    ///
    /// [`Booking`]: crate::domain::Booking
    Client(client::Id),

    /// Administrator.
    Admin,
}

impl Initiator {
    /// Indicates whether this [`Initiator`] is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl<Db, Pmt, Ntf> Command<CancelBooking> for Service<Db, Pmt, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<SpaceConfiguration>, space::Id>>,
            Ok = Option<SpaceConfiguration>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<cancellation::Policy>, cancellation::Id>>,
            Ok = Option<cancellation::Policy>,
            Err = Traced<database::Error>,
        > + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Pmt: Payments<payment::Refund, Ok = (), Err = payment::Error>
        + Payments<payment::Capture, Ok = (), Err = payment::Error>,
    Ntf: Notifier<notify::Notify, Ok = (), Err = notify::Error>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CancelBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelBooking {
            booking_id,
            initiator,
            reason,
        } = cmd;

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

        if let Initiator::Client(client_id) = initiator {
            if booking.client_id != client_id {
                return Err(tracerr::new!(E::NotBookingOwner(client_id)));
            }
        }
        if !booking.status.can_become(booking::Status::Cancelled) {
            return Err(tracerr::new!(E::CannotCancel(booking.status)));
        }

        let space = tx
            .execute(Select(By::<Option<SpaceConfiguration>, _>::new(
                booking.space_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SpaceNotExists(booking.space_id))
            .map_err(tracerr::wrap!())?;

        let policy = tx
            .execute(Select(By::<Option<cancellation::Policy>, _>::new(
                space.cancellation_policy,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::CancellationPolicyNotExists(space.cancellation_policy))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let charge = policy.charge(booking.slot.days_before(now));
        let captured = charge.of(booking.amount_held);
        let refunded = booking.amount_held - captured;

        // Every money movement is recorded in its own committed step before
        // the status advances, so a retried cancellation never re-issues an
        // already confirmed refund or capture. Committing releases the row
        // lock, so every following step re-acquires it and re-reads the
        // settlement in its own transaction.
        if !refunded.is_zero() && booking.settlement.refunded.is_none() {
            self.payments()
                .execute(payment::Refund {
                    hold: booking.hold.clone(),
                    amount: refunded,
                })
                .await
                .map_err(tracerr::from_and_wrap!(=> E))?;
            booking.settlement.refunded = Some(refunded);
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

        if !captured.is_zero() {
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
            if !booking.status.can_become(booking::Status::Cancelled) {
                return Err(tracerr::new!(E::CannotCancel(booking.status)));
            }
            if booking.settlement.captured.is_none() {
                self.payments()
                    .execute(payment::Capture {
                        hold: booking.hold.clone(),
                        amount: captured,
                    })
                    .await
                    .map_err(tracerr::from_and_wrap!(=> E))?;
                booking.settlement.captured = Some(captured);
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
        }

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
        if !booking.status.can_become(booking::Status::Cancelled) {
            return Err(tracerr::new!(E::CannotCancel(booking.status)));
        }
        booking.status = booking::Status::Cancelled;
        booking.cancellation = Some(booking::Cancellation {
            reason,
            by_admin: initiator.is_admin(),
            at: now.coerce(),
        });
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
                template: notify::Template::for_cancellation(
                    initiator.is_admin(),
                    booking.created_by_admin,
                ),
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

/// Error of [`CancelBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// Cancellation policy referenced by the space does not exist.
    #[display("`cancellation::Policy(id: {_0})` does not exist")]
    CancellationPolicyNotExists(#[error(not(source))] cancellation::Id),

    /// [`Booking`] is not in a cancellable [`Status`].
    ///
    /// [`Status`]: booking::Status
    #[display("cannot cancel a booking in the `{_0}` status")]
    CannotCancel(#[error(not(source))] booking::Status),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Client does not own the [`Booking`].
    #[display("`Client(id: {_0})` does not own the booking")]
    NotBookingOwner(#[error(not(source))] client::Id),

    /// [`Payments`] operation failed.
    #[display("`Payments` operation failed: {_0}")]
    #[from]
    Payment(payment::Error),

    /// Space referenced by the [`Booking`] does not exist.
    #[display("`Space(id: {_0})` does not exist")]
    SpaceNotExists(#[error(not(source))] space::Id),
}
