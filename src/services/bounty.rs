//! Bounty ledger hook
//!
//! Posts can carry a bounty, but bounty accounting lives outside this
//! service. The forum only forwards the request to a [`BountyLedger`].

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BountyLedger: Send + Sync {
    async fn set_bounty(&self, post_id: &str, actor_id: i64, amount: i64) -> Result<()>;
}

/// Ledger that records nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBountyLedger;

#[async_trait]
impl BountyLedger for NoopBountyLedger {
    async fn set_bounty(&self, post_id: &str, actor_id: i64, amount: i64) -> Result<()> {
        tracing::debug!(post_id, actor_id, amount, "Bounty ignored by no-op ledger");
        Ok(())
    }
}
