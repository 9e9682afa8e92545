//! [`Command`] execution tests over mocked collaborators.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use common::{
    money::Currency,
    operations::{By, Commit, Insert, Lock, Select, Transact, Update},
    DateTime, Money, Percent,
};
use time::{Date, Time};
use tokio::sync::{Mutex as AsyncMutex, Notify, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, Slot, Term},
        client,
        policy::{cancellation, deposit},
        space::{self, price},
        Booking, SpaceConfiguration,
    },
    infra::{database, notify, payment, Database, Notifier, Payments},
    read::{self, Occupying},
    Config, Service,
};

use super::{
    cancel_booking::{ExecutionError as CancelErr, Initiator},
    complete_booking::ExecutionError as CompleteErr,
    confirm_booking::ExecutionError as ConfirmErr,
    create_booking::ExecutionError as CreateErr,
    mark_no_show::ExecutionError as NoShowErr,
    CancelBooking, CompleteBooking, ConfirmBooking, CreateBooking, MarkNoShow,
};

/// In-memory [`Database`] mock.
///
/// [`Database`]: crate::infra::Database
#[derive(Clone, Debug, Default)]
struct MockDb(Arc<Storage>);

#[derive(Debug, Default)]
struct Storage {
    spaces: Mutex<HashMap<space::Id, SpaceConfiguration>>,
    deposit_policies: Mutex<HashMap<deposit::Id, deposit::Policy>>,
    cancellation_policies:
        Mutex<HashMap<cancellation::Id, cancellation::Policy>>,
    bookings: Mutex<HashMap<booking::Id, Booking>>,
    space_locks: Mutex<HashMap<space::Id, Arc<AsyncMutex<()>>>>,
    booking_locks: Mutex<HashMap<booking::Id, Arc<AsyncMutex<()>>>>,
}

impl MockDb {
    fn space_lock(&self, id: space::Id) -> Arc<AsyncMutex<()>> {
        self.0.space_locks.lock().unwrap().entry(id).or_default().clone()
    }

    fn booking_lock(&self, id: booking::Id) -> Arc<AsyncMutex<()>> {
        self.0.booking_locks.lock().unwrap().entry(id).or_default().clone()
    }

    fn booking(&self, id: booking::Id) -> Option<Booking> {
        self.0.bookings.lock().unwrap().get(&id).cloned()
    }

    fn put_booking(&self, b: Booking) {
        _ = self.0.bookings.lock().unwrap().insert(b.id, b);
    }
}

/// Transactional [`MockDb`] client, holding acquired locks until committed.
#[derive(Clone, Debug)]
struct MockTx {
    db: MockDb,
    guards: Arc<Mutex<Vec<OwnedMutexGuard<()>>>>,
}

impl Database<Transact> for MockDb {
    type Ok = MockTx;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(MockTx {
            db: self.clone(),
            guards: Arc::default(),
        })
    }
}

impl Database<Select<By<Option<SpaceConfiguration>, space::Id>>>
    for MockDb
{
    type Ok = Option<SpaceConfiguration>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<SpaceConfiguration>, space::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.0.spaces.lock().unwrap().get(&by.into_inner()).cloned())
    }
}

impl Database<Select<By<Option<deposit::Policy>, deposit::Id>>>
    for MockDb
{
    type Ok = Option<deposit::Policy>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<deposit::Policy>, deposit::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .0
            .deposit_policies
            .lock()
            .unwrap()
            .get(&by.into_inner())
            .cloned())
    }
}

impl Database<Update<By<Vec<booking::Id>, booking::CompletionDeadline>>>
    for MockDb
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<By<Vec<booking::Id>, booking::CompletionDeadline>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner().coerce();
        Ok(self
            .0
            .bookings
            .lock()
            .unwrap()
            .values_mut()
            .filter(|b| {
                b.status == booking::Status::Confirmed
                    && b.slot.ends_at() <= deadline
            })
            .map(|b| {
                b.status = booking::Status::Completed;
                b.id
            })
            .collect())
    }
}

impl Database<Lock<By<SpaceConfiguration, space::Id>>> for MockTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<SpaceConfiguration, space::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let lock = self.db.space_lock(by.into_inner());
        let guard = lock.lock_owned().await;
        self.guards.lock().unwrap().push(guard);
        Ok(())
    }
}

impl Database<Lock<By<Booking, booking::Id>>> for MockTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let lock = self.db.booking_lock(by.into_inner());
        let guard = lock.lock_owned().await;
        self.guards.lock().unwrap().push(guard);
        Ok(())
    }
}

impl Database<Select<By<Option<Booking>, booking::Id>>> for MockTx {
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.db.booking(by.into_inner()))
    }
}

impl Database<Select<By<Option<SpaceConfiguration>, space::Id>>>
    for MockTx
{
    type Ok = Option<SpaceConfiguration>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        sel: Select<By<Option<SpaceConfiguration>, space::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.db.execute(sel).await
    }
}

impl Database<Select<By<Option<cancellation::Policy>, cancellation::Id>>>
    for MockTx
{
    type Ok = Option<cancellation::Policy>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<cancellation::Policy>, cancellation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .db
            .0
            .cancellation_policies
            .lock()
            .unwrap()
            .get(&by.into_inner())
            .cloned())
    }
}

impl Database<Select<By<Vec<Occupying<Booking>>, read::SlotFilter>>>
    for MockTx
{
    type Ok = Vec<Occupying<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Occupying<Booking>>, read::SlotFilter>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::SlotFilter { space, from, until } = by.into_inner();
        Ok(self
            .db
            .0
            .bookings
            .lock()
            .unwrap()
            .values()
            .filter(|b| {
                b.space_id == space
                    && b.status.occupies()
                    && b.slot.starts_at() < until
                    && b.slot.ends_at() > from
            })
            .cloned()
            .map(Occupying)
            .collect())
    }
}

impl Database<Insert<Booking>> for MockTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(b): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        assert!(
            self.db.booking(b.id).is_none(),
            "duplicate booking inserted",
        );
        self.db.put_booking(b);
        Ok(())
    }
}

impl Database<Update<Booking>> for MockTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(b): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.db.put_booking(b);
        Ok(())
    }
}

impl Database<Commit> for MockTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.guards.lock().unwrap().clear();
        Ok(())
    }
}

/// External payment holder mock.
#[derive(Clone, Debug, Default)]
struct MockPayments(Arc<PaymentsState>);

#[derive(Debug, Default)]
struct PaymentsState {
    holds: Mutex<Vec<(booking::Id, Money)>>,
    captures: Mutex<Vec<(booking::HoldRef, Money)>>,
    refunds: Mutex<Vec<(booking::HoldRef, Money)>>,
    voided: Mutex<Vec<booking::HoldRef>>,
    decline_holds: AtomicBool,
    fail_next_capture: AtomicBool,
    gate_captures: AtomicBool,
    capture_gate: Notify,
}

impl Payments<payment::CreateHold> for MockPayments {
    type Ok = booking::HoldRef;
    type Err = payment::Error;

    async fn execute(
        &self,
        op: payment::CreateHold,
    ) -> Result<Self::Ok, Self::Err> {
        if self.0.decline_holds.load(Ordering::SeqCst) {
            return Err(payment::Error::Declined("insufficient funds".into()));
        }
        self.0.holds.lock().unwrap().push((op.booking, op.amount));
        Ok(booking::HoldRef::new(format!("hold-{}", op.booking)))
    }
}

impl Payments<payment::Capture> for MockPayments {
    type Ok = ();
    type Err = payment::Error;

    async fn execute(
        &self,
        op: payment::Capture,
    ) -> Result<Self::Ok, Self::Err> {
        while self.0.gate_captures.load(Ordering::SeqCst) {
            self.0.capture_gate.notified().await;
        }
        if self.0.fail_next_capture.swap(false, Ordering::SeqCst) {
            return Err(payment::Error::Unavailable("timed out".into()));
        }
        self.0.captures.lock().unwrap().push((op.hold, op.amount));
        Ok(())
    }
}

impl Payments<payment::Refund> for MockPayments {
    type Ok = ();
    type Err = payment::Error;

    async fn execute(
        &self,
        op: payment::Refund,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.refunds.lock().unwrap().push((op.hold, op.amount));
        Ok(())
    }
}

impl Payments<payment::CancelHold> for MockPayments {
    type Ok = ();
    type Err = payment::Error;

    async fn execute(
        &self,
        op: payment::CancelHold,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.voided.lock().unwrap().push(op.hold);
        Ok(())
    }
}

/// External notifier mock.
#[derive(Clone, Debug, Default)]
struct MockNotifier(Arc<NotifierState>);

#[derive(Debug, Default)]
struct NotifierState {
    sent: Mutex<Vec<notify::Notify>>,
    fail: AtomicBool,
}

impl MockNotifier {
    fn templates(&self) -> Vec<notify::Template> {
        self.0.sent.lock().unwrap().iter().map(|n| n.template).collect()
    }
}

impl Notifier<notify::Notify> for MockNotifier {
    type Ok = ();
    type Err = notify::Error;

    async fn execute(&self, op: notify::Notify) -> Result<Self::Ok, Self::Err> {
        if self.0.fail.load(Ordering::SeqCst) {
            return Err(notify::Error("smtp is down".into()));
        }
        self.0.sent.lock().unwrap().push(op);
        Ok(())
    }
}

type Svc = Service<MockDb, MockPayments, MockNotifier>;

fn service() -> (Svc, MockDb, MockPayments, MockNotifier) {
    let db = MockDb::default();
    let pmt = MockPayments::default();
    let ntf = MockNotifier::default();
    let (svc, _bg) =
        Service::new(Config::default(), db.clone(), pmt.clone(), ntf.clone());
    (svc, db, pmt, ntf)
}

fn usd(amount: &str) -> Money {
    Money {
        amount: amount.parse().unwrap(),
        currency: Currency::Usd,
    }
}

fn percent(value: &str) -> Percent {
    Percent::new(value.parse().unwrap()).unwrap()
}

fn capacity(people: u16) -> space::Capacity {
    space::Capacity::new(people).unwrap()
}

fn date_in(days: i64) -> Date {
    DateTime::now().date() + time::Duration::days(days)
}

fn hours(from: u8, to: u8) -> Term {
    Term::Hours {
        start: Time::from_hms(from, 0, 0).unwrap(),
        end: Time::from_hms(to, 0, 0).unwrap(),
    }
}

fn per_person_rule() -> price::Rule {
    price::Rule::PerPerson(price::PerPerson {
        hourly_rate: usd("5"),
        daily_rate: usd("40"),
        full_day_after: 8,
    })
}

fn default_tiers() -> Vec<cancellation::Tier> {
    vec![
        cancellation::Tier {
            days_before: 7,
            charge: percent("0"),
        },
        cancellation::Tier {
            days_before: 3,
            charge: percent("50"),
        },
        cancellation::Tier {
            days_before: 0,
            charge: percent("100"),
        },
    ]
}

/// Seeds a space with the provided pricing rule and the default policies:
/// 0/50/100% cancellation charges at 7/3/0 days, and a deposit only for
/// totals from the provided minimum.
fn seed_space(
    db: &MockDb,
    rule: price::Rule,
    deposit_from: Money,
) -> space::Id {
    let cancellation_policy = cancellation::Id::new();
    let deposit_policy = deposit::Id::new();
    let id = space::Id::new();

    _ = db.0.cancellation_policies.lock().unwrap().insert(
        cancellation_policy,
        cancellation::Policy::new(cancellation_policy, default_tiers())
            .unwrap(),
    );
    _ = db.0.deposit_policies.lock().unwrap().insert(
        deposit_policy,
        deposit::Policy {
            id: deposit_policy,
            min_amount: deposit_from,
            percent: percent("50"),
            applies_to: vec![space::Kind::MeetingRoom],
        },
    );
    _ = db.0.spaces.lock().unwrap().insert(
        id,
        SpaceConfiguration {
            id,
            name: space::Name::new("Aurora room").unwrap(),
            kind: space::Kind::MeetingRoom,
            min_capacity: capacity(1),
            max_capacity: capacity(10),
            rule,
            cancellation_policy,
            deposit_policy,
            is_active: true,
        },
    );
    id
}

fn create_cmd(
    space_id: space::Id,
    client_id: client::Id,
    days_ahead: i64,
    term: Term,
) -> CreateBooking {
    CreateBooking {
        space_id,
        client_id,
        date: date_in(days_ahead),
        term,
        party_size: capacity(2),
        by_admin: false,
    }
}

fn err_of<T: std::fmt::Debug, E>(res: Result<T, Traced<E>>) -> E {
    res.unwrap_err().split().0
}

#[tokio::test]
async fn creates_pending_booking_with_hold_and_notification() {
    let (svc, db, pmt, ntf) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));
    let client_id = client::Id::new();

    let booking = svc
        .execute(create_cmd(space_id, client_id, 10, hours(9, 11)))
        .await
        .unwrap();

    assert_eq!(booking.status, booking::Status::Pending);
    assert_eq!(booking.price.total, usd("20"));
    assert_eq!(booking.deposit, None);
    assert_eq!(booking.amount_held, usd("20"));

    assert!(db.booking(booking.id).is_some());
    assert_eq!(
        *pmt.0.holds.lock().unwrap(),
        vec![(booking.id, usd("20"))],
    );
    assert_eq!(ntf.templates(), vec![notify::Template::BookingCreated]);
}

#[tokio::test]
async fn rejects_invalid_time_windows() {
    let (svc, db, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));

    let res = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(12, 12)))
        .await;
    assert!(matches!(err_of(res), CreateErr::InvalidSlot(_)));

    let res = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(15, 9)))
        .await;
    assert!(matches!(err_of(res), CreateErr::InvalidSlot(_)));
}

#[tokio::test]
async fn rejects_party_sizes_outside_capacity() {
    let (svc, db, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));

    let mut cmd = create_cmd(space_id, client::Id::new(), 10, hours(9, 11));
    cmd.party_size = capacity(11);

    assert!(matches!(
        err_of(svc.execute(cmd).await),
        CreateErr::Price(price::Error::CapacityOutOfRange(_)),
    ));
}

#[tokio::test]
async fn rejects_quote_only_spaces() {
    let (svc, db, ..) = service();
    let space_id = seed_space(&db, price::Rule::Quote, usd("10000"));

    assert!(matches!(
        err_of(
            svc.execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 11)))
                .await,
        ),
        CreateErr::Price(price::Error::QuotationRequired),
    ));
}

#[tokio::test]
async fn rejects_taken_slots_but_allows_touching_ones() {
    let (svc, db, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));

    _ = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 12)))
        .await
        .unwrap();

    assert!(matches!(
        err_of(
            svc.execute(create_cmd(space_id, client::Id::new(), 10, hours(11, 13)))
                .await,
        ),
        CreateErr::SlotTaken(_),
    ));

    // Half-open intervals: a slot starting exactly at another's end is free.
    assert!(svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(12, 14)))
        .await
        .is_ok());
}

#[tokio::test]
async fn holds_only_the_deposit_for_large_bookings() {
    let (svc, db, pmt, ..) = service();
    // 2 people for 8 hours hit the daily cap: 40 * 2 = 80, above the
    // deposit minimum of 50.
    let space_id = seed_space(&db, per_person_rule(), usd("50"));

    let booking = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 17)))
        .await
        .unwrap();

    assert_eq!(booking.price.total, usd("80"));
    assert_eq!(booking.deposit, Some(usd("40")));
    assert_eq!(booking.amount_held, usd("40"));
    assert_eq!(
        *pmt.0.holds.lock().unwrap(),
        vec![(booking.id, usd("40"))],
    );
}

#[tokio::test]
async fn persists_nothing_when_hold_is_declined() {
    let (svc, db, pmt, ntf) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));
    pmt.0.decline_holds.store(true, Ordering::SeqCst);

    let res = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 11)))
        .await;

    assert!(matches!(err_of(res), CreateErr::Payment(_)));
    assert!(db.0.bookings.lock().unwrap().is_empty());
    assert!(ntf.templates().is_empty());
}

#[tokio::test]
async fn only_one_of_two_concurrent_creates_wins() {
    let (svc, db, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));

    let a = svc.execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 12)));
    let b = svc.execute(create_cmd(space_id, client::Id::new(), 10, hours(10, 13)));
    let (a, b) = tokio::join!(a, b);

    assert_eq!(
        u8::from(a.is_ok()) + u8::from(b.is_ok()),
        1,
        "exactly one of the conflicting bookings must win",
    );
    assert_eq!(db.0.bookings.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn recheck_catches_bookings_racing_ahead_of_the_lock() {
    let (svc, db, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));

    // Park the space lock, so the command blocks right before its
    // availability re-check.
    let guard = db.space_lock(space_id).lock_owned().await;

    let racing = tokio::spawn({
        let svc = svc.clone();
        let cmd = create_cmd(space_id, client::Id::new(), 10, hours(9, 12));
        async move { svc.execute(cmd).await }
    });
    tokio::task::yield_now().await;

    // Another booking sneaks into the overlapping slot.
    let sneaky = Booking {
        id: booking::Id::new(),
        space_id,
        client_id: client::Id::new(),
        created_by_admin: false,
        slot: Slot::new(date_in(10), hours(11, 14)).unwrap(),
        party_size: capacity(2),
        price: price::Breakdown {
            base: usd("30"),
            extra_persons: usd("0"),
            total: usd("30"),
        },
        deposit: None,
        amount_held: usd("30"),
        hold: booking::HoldRef::new("hold-sneaky"),
        settlement: booking::Settlement::default(),
        status: booking::Status::Pending,
        cancellation: None,
        created_at: DateTime::now().coerce(),
        updated_at: DateTime::now().coerce(),
    };
    db.put_booking(sneaky);
    drop(guard);

    assert!(matches!(
        err_of(racing.await.unwrap()),
        CreateErr::SlotTaken(_),
    ));
}

#[tokio::test]
async fn confirms_pending_bookings_only() {
    let (svc, db, _, ntf) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));

    let booking = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 11)))
        .await
        .unwrap();

    let confirmed = svc
        .execute(ConfirmBooking {
            booking_id: booking.id,
        })
        .await
        .unwrap();
    assert_eq!(confirmed.status, booking::Status::Confirmed);
    assert_eq!(
        ntf.templates(),
        vec![
            notify::Template::BookingCreated,
            notify::Template::BookingConfirmed,
        ],
    );

    assert!(matches!(
        err_of(
            svc.execute(ConfirmBooking {
                booking_id: booking.id,
            })
            .await,
        ),
        ConfirmErr::CannotConfirm(booking::Status::Confirmed),
    ));
}

#[tokio::test]
async fn cancellation_charge_follows_the_notice_given() {
    let (svc, db, pmt, ntf) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));
    let client_id = client::Id::new();

    // 10 days of notice falls into the free tier.
    let early = svc
        .execute(create_cmd(space_id, client_id, 10, hours(9, 11)))
        .await
        .unwrap();
    let early = svc
        .execute(CancelBooking {
            booking_id: early.id,
            initiator: Initiator::Client(client_id),
            reason: booking::Reason::new("change of plans").unwrap(),
        })
        .await
        .unwrap();
    assert_eq!(early.status, booking::Status::Cancelled);
    assert_eq!(early.settlement.refunded, Some(usd("20")));
    assert_eq!(early.settlement.captured, None);
    assert_eq!(pmt.0.refunds.lock().unwrap().len(), 1);
    assert!(pmt.0.captures.lock().unwrap().is_empty());

    // 5 days of notice falls into the 50% tier.
    let late = svc
        .execute(create_cmd(space_id, client_id, 5, hours(9, 11)))
        .await
        .unwrap();
    let late = svc
        .execute(CancelBooking {
            booking_id: late.id,
            initiator: Initiator::Client(client_id),
            reason: booking::Reason::new("change of plans").unwrap(),
        })
        .await
        .unwrap();
    assert_eq!(late.settlement.refunded, Some(usd("10")));
    assert_eq!(late.settlement.captured, Some(usd("10")));

    assert_eq!(
        ntf.templates(),
        vec![
            notify::Template::BookingCreated,
            notify::Template::CancelledByClient,
            notify::Template::BookingCreated,
            notify::Template::CancelledByClient,
        ],
    );
}

#[tokio::test]
async fn retried_cancellation_never_refunds_twice() {
    let (svc, db, pmt, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));
    let client_id = client::Id::new();

    // 5 days of notice: half refunded, half captured.
    let booking = svc
        .execute(create_cmd(space_id, client_id, 5, hours(9, 11)))
        .await
        .unwrap();

    pmt.0.fail_next_capture.store(true, Ordering::SeqCst);
    let cancel = CancelBooking {
        booking_id: booking.id,
        initiator: Initiator::Client(client_id),
        reason: booking::Reason::new("change of plans").unwrap(),
    };
    assert!(matches!(
        err_of(svc.execute(cancel.clone()).await),
        CancelErr::Payment(_),
    ));

    // The refund got through and was recorded before the failure.
    let stored = db.booking(booking.id).unwrap();
    assert_eq!(stored.status, booking::Status::Pending);
    assert_eq!(stored.settlement.refunded, Some(usd("10")));
    assert_eq!(stored.settlement.captured, None);

    let cancelled = svc.execute(cancel).await.unwrap();
    assert_eq!(cancelled.status, booking::Status::Cancelled);
    assert_eq!(pmt.0.refunds.lock().unwrap().len(), 1);
    assert_eq!(pmt.0.captures.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_cancellations_capture_the_hold_once() {
    let (svc, db, pmt, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));
    let client_id = client::Id::new();

    // 5 days of notice: half refunded, half captured.
    let booking = svc
        .execute(create_cmd(space_id, client_id, 5, hours(9, 11)))
        .await
        .unwrap();
    let cancel = CancelBooking {
        booking_id: booking.id,
        initiator: Initiator::Client(client_id),
        reason: booking::Reason::new("change of plans").unwrap(),
    };

    // Park the first cancellation at its capture, right after its refund
    // settlement was committed and the row lock released.
    pmt.0.gate_captures.store(true, Ordering::SeqCst);
    let first = tokio::spawn({
        let (svc, cancel) = (svc.clone(), cancel.clone());
        async move { svc.execute(cancel).await }
    });
    tokio::task::yield_now().await;

    let second = tokio::spawn({
        let svc = svc.clone();
        async move { svc.execute(cancel).await }
    });
    tokio::task::yield_now().await;

    pmt.0.gate_captures.store(false, Ordering::SeqCst);
    pmt.0.capture_gate.notify_waiters();
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    assert!(
        first.is_ok() != second.is_ok(),
        "exactly one of the concurrent cancellations must win",
    );
    assert_eq!(
        pmt.0.captures.lock().unwrap().len(),
        1,
        "the hold must be captured exactly once",
    );
    assert_eq!(pmt.0.refunds.lock().unwrap().len(), 1);
    assert_eq!(
        db.booking(booking.id).unwrap().status,
        booking::Status::Cancelled,
    );
}

#[tokio::test]
async fn cancellation_requires_ownership_unless_admin() {
    let (svc, db, _, ntf) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));
    let owner = client::Id::new();

    let booking = svc
        .execute(create_cmd(space_id, owner, 10, hours(9, 11)))
        .await
        .unwrap();

    assert!(matches!(
        err_of(
            svc.execute(CancelBooking {
                booking_id: booking.id,
                initiator: Initiator::Client(client::Id::new()),
                reason: booking::Reason::new("not mine").unwrap(),
            })
            .await,
        ),
        CancelErr::NotBookingOwner(_),
    ));

    let cancelled = svc
        .execute(CancelBooking {
            booking_id: booking.id,
            initiator: Initiator::Admin,
            reason: booking::Reason::new("maintenance").unwrap(),
        })
        .await
        .unwrap();
    assert!(cancelled.cancellation.unwrap().by_admin);
    assert_eq!(
        ntf.templates(),
        vec![
            notify::Template::BookingCreated,
            notify::Template::CancelledByAdmin,
        ],
    );
}

#[tokio::test]
async fn admin_created_bookings_use_their_own_cancellation_wording() {
    let (svc, db, _, ntf) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));
    let client_id = client::Id::new();

    let mut cmd = create_cmd(space_id, client_id, 10, hours(9, 11));
    cmd.by_admin = true;
    let booking = svc.execute(cmd).await.unwrap();

    _ = svc
        .execute(CancelBooking {
            booking_id: booking.id,
            initiator: Initiator::Client(client_id),
            reason: booking::Reason::new("change of plans").unwrap(),
        })
        .await
        .unwrap();
    assert_eq!(
        ntf.templates(),
        vec![
            notify::Template::BookingCreated,
            notify::Template::AdminBookingCancelled,
        ],
    );
}

#[tokio::test]
async fn cancelled_bookings_cannot_be_cancelled_again() {
    let (svc, db, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));
    let client_id = client::Id::new();

    let booking = svc
        .execute(create_cmd(space_id, client_id, 10, hours(9, 11)))
        .await
        .unwrap();
    let cancel = CancelBooking {
        booking_id: booking.id,
        initiator: Initiator::Client(client_id),
        reason: booking::Reason::new("change of plans").unwrap(),
    };

    _ = svc.execute(cancel.clone()).await.unwrap();
    assert!(matches!(
        err_of(svc.execute(cancel).await),
        CancelErr::CannotCancel(booking::Status::Cancelled),
    ));
}

#[tokio::test]
async fn no_show_forfeits_the_whole_hold() {
    let (svc, db, pmt, ntf) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));

    let booking = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 11)))
        .await
        .unwrap();

    // Only confirmed bookings can become no-shows.
    assert!(matches!(
        err_of(
            svc.execute(MarkNoShow {
                booking_id: booking.id,
            })
            .await,
        ),
        NoShowErr::CannotMarkNoShow(booking::Status::Pending),
    ));

    _ = svc
        .execute(ConfirmBooking {
            booking_id: booking.id,
        })
        .await
        .unwrap();
    let marked = svc
        .execute(MarkNoShow {
            booking_id: booking.id,
        })
        .await
        .unwrap();

    assert_eq!(marked.status, booking::Status::NoShow);
    assert_eq!(marked.settlement.captured, Some(usd("20")));
    assert_eq!(marked.settlement.refunded, None);
    assert_eq!(pmt.0.captures.lock().unwrap().len(), 1);
    assert!(pmt.0.refunds.lock().unwrap().is_empty());
    assert_eq!(
        ntf.templates().last(),
        Some(&notify::Template::NoShowRecorded),
    );
}

#[tokio::test]
async fn completes_only_elapsed_confirmed_bookings() {
    let (svc, db, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));

    let upcoming = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 11)))
        .await
        .unwrap();
    _ = svc
        .execute(ConfirmBooking {
            booking_id: upcoming.id,
        })
        .await
        .unwrap();
    assert!(matches!(
        err_of(
            svc.execute(CompleteBooking {
                booking_id: upcoming.id,
            })
            .await,
        ),
        CompleteErr::NotYetElapsed(_),
    ));

    let elapsed = svc
        .execute(create_cmd(space_id, client::Id::new(), -1, hours(9, 11)))
        .await
        .unwrap();
    _ = svc
        .execute(ConfirmBooking {
            booking_id: elapsed.id,
        })
        .await
        .unwrap();
    let completed = svc
        .execute(CompleteBooking {
            booking_id: elapsed.id,
        })
        .await
        .unwrap();
    assert_eq!(completed.status, booking::Status::Completed);
}

#[tokio::test]
async fn sweep_completes_elapsed_confirmed_bookings_in_bulk() {
    let (svc, db, ..) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));

    let elapsed = svc
        .execute(create_cmd(space_id, client::Id::new(), -2, hours(9, 11)))
        .await
        .unwrap();
    _ = svc
        .execute(ConfirmBooking {
            booking_id: elapsed.id,
        })
        .await
        .unwrap();
    let upcoming = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 11)))
        .await
        .unwrap();

    let completed = db
        .execute(Update(By::new(booking::CompletionDeadline::now())))
        .await
        .unwrap();

    assert_eq!(completed, vec![elapsed.id]);
    assert_eq!(
        db.booking(elapsed.id).unwrap().status,
        booking::Status::Completed,
    );
    assert_eq!(
        db.booking(upcoming.id).unwrap().status,
        booking::Status::Pending,
    );
}

#[tokio::test]
async fn notifier_failures_never_fail_the_transition() {
    let (svc, db, _, ntf) = service();
    let space_id = seed_space(&db, per_person_rule(), usd("10000"));
    ntf.0.fail.store(true, Ordering::SeqCst);

    let booking = svc
        .execute(create_cmd(space_id, client::Id::new(), 10, hours(9, 11)))
        .await
        .unwrap();
    let confirmed = svc
        .execute(ConfirmBooking {
            booking_id: booking.id,
        })
        .await
        .unwrap();

    assert_eq!(confirmed.status, booking::Status::Confirmed);
    assert!(ntf.templates().is_empty());
}
