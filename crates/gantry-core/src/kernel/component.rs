use std::fmt::Debug;

use async_trait::async_trait;

use crate::kernel::error::Result;

/// Lifecycle contract for components wired by [`Application`](super::Application).
///
/// Phases run in order `initialize`, `start`, then `stop` at shutdown. A
/// failure in any phase is wrapped in a kernel lifecycle error naming the
/// component and keeps the kind of the underlying error.
#[async_trait]
pub trait KernelComponent: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Check that the component's collaborators are reachable
    async fn initialize(&self) -> Result<()>;

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
