pub mod webhook;

pub use webhook::WebhookNotifier;

use crate::cancel::Context;
use crate::utils::errors::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message. Returns `Cancelled` if `ctx` finishes first.
    async fn send(&self, ctx: &Context, subject: &str, body: &str) -> Result<()>;
}
