//! [`Handler`] abstractions.

use std::future::Future;

/// Unit of execution taking `Args` and producing a [`Result`].
///
/// Commands, queries, tasks and infrastructure operations all share this
/// shape, differing only in their argument and result types.
pub trait Handler<Args = ()> {
    /// Type of the value produced by a successful execution.
    type Ok;

    /// Type of the error produced by a failed execution.
    type Err;

    /// Executes this [`Handler`] with the provided arguments.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
