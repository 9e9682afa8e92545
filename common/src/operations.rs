//! Abstract operations dispatched to a [`Handler`].

use std::marker::PhantomData;

use crate::Handler;

/// Operation inserting a value.
#[derive(Clone, Copy, Debug)]
pub struct Insert<T>(pub T);

/// Operation updating a value.
#[derive(Clone, Copy, Debug)]
pub struct Update<T>(pub T);

/// Operation selecting a value.
#[derive(Clone, Copy, Debug)]
pub struct Select<T>(pub T);

/// Operation locking a value.
#[derive(Clone, Copy, Debug)]
pub struct Lock<T>(pub T);

/// Operation starting a value.
#[derive(Clone, Copy, Debug)]
pub struct Start<T>(pub T);

/// Operation performing a value.
#[derive(Clone, Copy, Debug)]
pub struct Perform<T>(pub T);

/// Operation beginning a transaction.
#[derive(Clone, Copy, Debug)]
pub struct Transact;

/// Transactional [`Handler`] begun by a [`Transact`] operation.
pub type Transacted<T> = <T as Handler<Transact>>::Ok;

/// Operation committing a transaction.
#[derive(Clone, Copy, Debug)]
pub struct Commit;

/// Selector of a `W` value by a `B` one.
#[derive(Clone, Copy, Debug)]
pub struct By<W, B> {
    /// Type of the value being selected.
    _what: PhantomData<W>,

    /// Value to select by.
    by: B,
}

impl<W, B> By<W, B> {
    /// Creates a new [`By`] selector out of the provided value.
    #[must_use]
    pub fn new(by: B) -> Self {
        Self {
            _what: PhantomData,
            by,
        }
    }

    /// Unwraps this [`By`] selector into the value it selects by.
    #[must_use]
    pub fn into_inner(self) -> B {
        self.by
    }
}
