//! Outbound notification trait.

use async_trait::async_trait;

use crate::result::AppResult;

/// Delivers a failure report to a human.
///
/// Sender and recipient are fixed by the implementation's configuration.
/// Delivery errors are reported to the caller, which logs them; they must
/// never affect store or filesystem state.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug + 'static {
    /// Send one message.
    async fn send(&self, subject: &str, body: &str) -> AppResult<()>;
}
