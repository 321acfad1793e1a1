//! Transformation abstraction applied to every item of a batch.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{CancellationToken, ItemError};

/// The per-item transformation run by batch workers.
///
/// Results do not need to be serializable; anything `Send` can flow back to the
/// aggregator.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_fanout::core::{BatchExecutor, CancellationToken, ItemError};
///
/// #[derive(Clone)]
/// struct Fetch;
///
/// #[async_trait]
/// impl BatchExecutor<String, usize> for Fetch {
///     async fn execute(&self, url: String, token: CancellationToken) -> Result<usize, ItemError> {
///         token.check()?;
///         Ok(url.len())
///     }
/// }
/// ```
#[async_trait]
pub trait BatchExecutor<I, O>: Send + Sync + Clone + 'static
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Transform one input.
    ///
    /// The worker has already checked `token` before calling this. Long-running
    /// transforms may recheck it with [`CancellationToken::check`] and return
    /// [`ItemError::Cancelled`] to stop early.
    ///
    /// # Threading
    ///
    /// Under the shared-queue and static-partition strategies this runs on a
    /// dedicated worker thread with its own single-threaded tokio runtime.
    /// Under the per-item strategy it runs as a task on a per-batch
    /// multi-threaded runtime. The synchronous adapters ([`FnExecutor`],
    /// [`CtxFnExecutor`]) hand their closure to the runtime's blocking pool, so
    /// a blocking transform never holds an async worker thread.
    async fn execute(&self, input: I, token: CancellationToken) -> Result<O, ItemError>;
}

/// Run a synchronous transform on the blocking pool. A panic is resumed on the
/// awaiting task so per-item isolation still sees it.
async fn run_blocking_transform<O, G>(transform: G) -> Result<O, ItemError>
where
    O: Send + 'static,
    G: FnOnce() -> Result<O, ItemError> + Send + 'static,
{
    match tokio::task::spawn_blocking(transform).await {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Err(ItemError::Cancelled),
    }
}

/// Adapter for a plain function `Fn(I) -> Result<O, ItemError>`.
pub struct FnExecutor<F> {
    f: Arc<F>,
}

impl<F> FnExecutor<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> Clone for FnExecutor<F> {
    fn clone(&self) -> Self {
        Self { f: Arc::clone(&self.f) }
    }
}

#[async_trait]
impl<I, O, F> BatchExecutor<I, O> for FnExecutor<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Result<O, ItemError> + Send + Sync + 'static,
{
    async fn execute(&self, input: I, _token: CancellationToken) -> Result<O, ItemError> {
        let f = Arc::clone(&self.f);
        run_blocking_transform(move || (*f)(input)).await
    }
}

/// Adapter for a function that also observes the batch's cancellation token.
pub struct CtxFnExecutor<F> {
    f: Arc<F>,
}

impl<F> CtxFnExecutor<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> Clone for CtxFnExecutor<F> {
    fn clone(&self) -> Self {
        Self { f: Arc::clone(&self.f) }
    }
}

#[async_trait]
impl<I, O, F> BatchExecutor<I, O> for CtxFnExecutor<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, &CancellationToken) -> Result<O, ItemError> + Send + Sync + 'static,
{
    async fn execute(&self, input: I, token: CancellationToken) -> Result<O, ItemError> {
        let f = Arc::clone(&self.f);
        run_blocking_transform(move || (*f)(input, &token)).await
    }
}

/// Adapter for an async closure `Fn(I, CancellationToken) -> impl Future`.
pub struct AsyncFnExecutor<F> {
    f: Arc<F>,
}

impl<F> AsyncFnExecutor<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> Clone for AsyncFnExecutor<F> {
    fn clone(&self) -> Self {
        Self { f: Arc::clone(&self.f) }
    }
}

#[async_trait]
impl<I, O, F, Fut> BatchExecutor<I, O> for AsyncFnExecutor<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ItemError>> + Send + 'static,
{
    async fn execute(&self, input: I, token: CancellationToken) -> Result<O, ItemError> {
        (self.f)(input, token).await
    }
}
