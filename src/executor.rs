use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Where connection I/O, request handlers and client calls run.
///
/// Any `Fn(BoxFuture<'static, ()>)` closure is an executor, which makes it easy to
/// plug in another runtime:
///
/// ```
/// use h1_connect::Server;
/// use std::sync::Arc;
///
/// let server = Server::new();
/// server.use_executor(Arc::new(|fut: futures_util::future::BoxFuture<'static, ()>| {
///     async_std::task::spawn(fut);
/// }));
/// ```
pub trait Executor: Send + Sync {
    /// Run the future to completion in the background.
    fn execute(&self, fut: BoxFuture<'static, ()>);
}

impl<F> Executor for F
where
    F: Fn(BoxFuture<'static, ()>) + Send + Sync,
{
    fn execute(&self, fut: BoxFuture<'static, ()>) {
        (self)(fut)
    }
}

/// Spawns on the async-std global executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncStdExecutor;

impl Executor for AsyncStdExecutor {
    fn execute(&self, fut: BoxFuture<'static, ()>) {
        async_std::task::spawn(fut);
    }
}

/// The executor used when none is configured.
pub fn default_executor() -> Arc<dyn Executor> {
    Arc::new(AsyncStdExecutor)
}

pub(crate) struct DebugExecutor<'a>(pub &'a Arc<dyn Executor>);

impl fmt::Debug for DebugExecutor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Executor@{:p}", Arc::as_ptr(self.0) as *const ())
    }
}
