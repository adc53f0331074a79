use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Relevance token for a view or dialog.
///
/// Work started while the scope is live takes a [`Ticket`]; once the scope is
/// invalidated (the view closed, or was re-opened for another target) every
/// outstanding ticket goes stale and its result must be dropped. Invalidation
/// does not cancel the work itself.
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    generation: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> Ticket {
        Ticket(self.generation.load(Ordering::Acquire))
    }

    pub fn is_live(&self, ticket: Ticket) -> bool {
        self.generation.load(Ordering::Acquire) == ticket.0
    }

    /// Makes every ticket issued so far stale.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Awaits `fut` and returns its output only if the scope stayed live.
    pub async fn settle<F, T>(&self, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let ticket = self.ticket();
        let output = fut.await;
        if self.is_live(ticket) {
            Some(output)
        } else {
            tracing::debug!("discarding result of a closed view");
            None
        }
    }
}
