//! Lazily constructed shared clients for tools.
//!
//! Some tools sit on top of expensive clients (an HTTP client with its own
//! pool, an authenticated API session). A `LazyService` builds such a client
//! on first use, exactly once per process, and hands the same `Arc` to every
//! caller afterwards. Concurrent first access is serialised by
//! `tokio::sync::OnceCell`; a failed initialisation leaves the cell empty so
//! the next caller retries.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::Result;

type Factory<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// A once-per-process client, constructed on first access.
///
/// # Example
///
/// ```rust
/// use loopclaw::tools::LazyService;
///
/// # tokio_test::block_on(async {
/// let service = LazyService::new("greeting", || async { Ok(String::from("hello")) });
/// assert!(!service.is_initialized());
/// let value = service.get().await.unwrap();
/// assert_eq!(value.as_str(), "hello");
/// assert!(service.is_initialized());
/// # });
/// ```
pub struct LazyService<T> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
    factory: Factory<T>,
}

impl<T: Send + Sync + 'static> LazyService<T> {
    /// Create a service whose value is produced by `factory` on first use.
    pub fn new<F, Fut>(name: &'static str, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            name,
            cell: OnceCell::new(),
            factory: Box::new(move || Box::pin(factory())),
        }
    }

    /// Get the shared value, constructing it if this is the first call.
    pub async fn get(&self) -> Result<Arc<T>> {
        let value = self
            .cell
            .get_or_try_init(|| async {
                let value = (self.factory)().await?;
                info!(service = self.name, "Initialized shared service");
                Ok::<_, crate::error::LoopError>(Arc::new(value))
            })
            .await?;
        Ok(Arc::clone(value))
    }

    /// Whether the value has been constructed.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Service name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for LazyService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyService")
            .field("name", &self.name)
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}
