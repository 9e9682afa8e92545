//! [`Command`] for creating a new [`Booking`].

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking::{self, slot, Slot, Term},
        client,
        policy::deposit,
        space::{self, price},
        Booking, SpaceConfiguration,
    },
    infra::{
        database, notify, payment, Database, Notifier, Payments,
    },
    read::{self, Occupying},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Booking`].
#[derive(Clone, Copy, Debug)]
pub struct CreateBooking {
    /// ID of the space to book.
    pub space_id: space::Id,

    /// ID of the client the [`Booking`] belongs to.
    pub client_id: client::Id,

    /// Calendar date the [`Booking`] starts at.
    pub date: time::Date,

    /// [`Term`] to book.
    pub term: Term,

    /// Size of the party the space is booked for.
    pub party_size: space::Capacity,

    /// Indicator whether an administrator creates the [`Booking`] on
    /// behalf of the client.
    pub by_admin: bool,
}

impl<Db, Pmt, Ntf> Command<CreateBooking> for Service<Db, Pmt, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<SpaceConfiguration>, space::Id>>,
            Ok = Option<SpaceConfiguration>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<deposit::Policy>, deposit::Id>>,
            Ok = Option<deposit::Policy>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<SpaceConfiguration, space::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Occupying<Booking>>, read::SlotFilter>>,
            Ok = Vec<Occupying<Booking>>,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Pmt: Payments<
            payment::CreateHold,
            Ok = booking::HoldRef,
            Err = payment::Error,
        > + Payments<payment::CancelHold, Ok = (), Err = payment::Error>,
    Ntf: Notifier<notify::Notify, Ok = (), Err = notify::Error>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateBooking {
            space_id,
            client_id,
            date,
            term,
            party_size,
            by_admin,
        } = cmd;

        let space = self
            .database()
            .execute(Select(By::<Option<SpaceConfiguration>, _>::new(
                space_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SpaceNotExists(space_id))
            .map_err(tracerr::wrap!())?;
        if !space.is_active {
            return Err(tracerr::new!(E::SpaceNotBookable(space_id)));
        }

        let slot =
            Slot::new(date, term).map_err(tracerr::from_and_wrap!(=> E))?;

        let price = space
            .price(&term, party_size)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let deposit = self
            .database()
            .execute(Select(By::<Option<deposit::Policy>, _>::new(
                space.deposit_policy,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::DepositPolicyNotExists(space.deposit_policy))
            .map_err(tracerr::wrap!())?
            .required(space.kind, price.total);
        let amount_held = deposit.unwrap_or(price.total);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent bookings of the same space.
        tx.execute(Lock(By::new(space_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        // The exclusion constraint is the last line of defense, so check
        // availability inside the transaction too.
        let occupying = tx
            .execute(Select(By::<Vec<Occupying<Booking>>, _>::new(
                read::SlotFilter {
                    space: space_id,
                    from: slot.starts_at(),
                    until: slot.ends_at(),
                },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if occupying.iter().any(|b| b.0.slot.overlaps(&slot)) {
            return Err(tracerr::new!(E::SlotTaken(space_id)));
        }

        let id = booking::Id::new();
        let hold = self
            .payments()
            .execute(payment::CreateHold {
                amount: amount_held,
                booking: id,
            })
            .await
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let now = DateTime::now();
        let booking = Booking {
            id,
            space_id,
            client_id,
            created_by_admin: by_admin,
            slot,
            party_size,
            price,
            deposit,
            amount_held,
            hold,
            settlement: booking::Settlement::default(),
            status: booking::Status::Pending,
            cancellation: None,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };

        let persisted = async {
            tx.execute(Insert(booking.clone())).await?;
            tx.execute(Commit).await
        }
        .await;
        if let Err(e) = persisted {
            // The hold must not outlive a booking that was never persisted.
            if let Err(e) = self
                .payments()
                .execute(payment::CancelHold {
                    hold: booking.hold.clone(),
                })
                .await
            {
                log::warn!("failed to void a dangling payment hold: {e}");
            }

            let (e, _) = e.split();
            return Err(if e.is_slot_conflict() {
                tracerr::new!(E::SlotTaken(space_id))
            } else {
                tracerr::new!(E::from(e))
            });
        }

        if let Err(e) = self
            .notifier()
            .execute(notify::Notify {
                template: notify::Template::BookingCreated,
                client: client_id,
                booking: booking.id,
            })
            .await
        {
            log::warn!("failed to notify about `Booking(id: {id})`: {e}");
        }

        Ok(booking)
    }
}

/// Error of [`CreateBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Deposit policy referenced by the space does not exist.
    #[display("`deposit::Policy(id: {_0})` does not exist")]
    DepositPolicyNotExists(#[error(not(source))] deposit::Id),

    /// Requested [`Slot`] is invalid.
    #[display("invalid slot: {_0}")]
    #[from]
    InvalidSlot(slot::Error),

    /// [`Payments`] operation failed.
    #[display("`Payments` operation failed: {_0}")]
    #[from]
    Payment(payment::Error),

    /// Requested [`Booking`] cannot be priced.
    #[display("cannot price the requested booking: {_0}")]
    #[from]
    Price(price::Error),

    /// Requested [`Slot`] conflicts with an existing [`Booking`].
    #[display("requested slot of the `Space(id: {_0})` is already taken")]
    SlotTaken(#[error(not(source))] space::Id),

    /// Space is not open for booking.
    #[display("`Space(id: {_0})` is not open for booking")]
    SpaceNotBookable(#[error(not(source))] space::Id),

    /// Space with the provided ID does not exist.
    #[display("`Space(id: {_0})` does not exist")]
    SpaceNotExists(#[error(not(source))] space::Id),
}
