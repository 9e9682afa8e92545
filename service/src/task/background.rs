//! Environment driving [`Task`]s in the background.

use std::{
    error::Error,
    future::{Future, IntoFuture},
    iter,
};

use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;

#[cfg(doc)]
use crate::Task;

/// Environment driving [`Task`]s in the background.
///
/// Awaiting it runs all the spawned [`Task`]s, resolving once any of them
/// errors or panics.
#[derive(Debug, Default)]
pub struct Background {
    /// [`task::LocalSet`] the [`Task`]s are spawned onto.
    local: task::LocalSet,

    /// Handles of the spawned [`Task`]s.
    spawned: Vec<task::JoinHandle<Result<(), Box<dyn Error + 'static>>>>,
}

impl Background {
    /// Spawns the provided [`Task`] future onto this [`Background`]
    /// environment.
    pub fn spawn<F, E>(&mut self, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        let handle = self.local.spawn_local(
            future.map_err(|e| Box::<dyn Error + 'static>::from(Box::new(e))),
        );
        self.spawned.push(handle);
    }
}

impl IntoFuture for Background {
    type Output = Result<(), Box<dyn Error>>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { local, spawned } = self;

        let driver = local.map(Ok).boxed_local();
        let watched = spawned.into_iter().map(|handle| {
            handle
                .map(|joined| match joined {
                    Ok(result) => result,
                    Err(e) => {
                        Err(Box::<dyn Error + 'static>::from(Box::new(e)))
                    }
                })
                .boxed_local()
        });

        future::try_join_all(iter::once(driver).chain(watched))
            .map_ok(drop)
            .boxed_local()
    }
}
