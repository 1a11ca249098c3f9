//! On-chain price submission seam

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Confirmed,
    /// Submission not attempted (chain disabled or not configured)
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub status: SubmissionStatus,
    pub tx_id: Option<String>,
    pub reason: Option<String>,
}

impl SubmissionOutcome {
    pub fn confirmed(tx_id: impl Into<String>) -> Self {
        Self {
            status: SubmissionStatus::Confirmed,
            tx_id: Some(tx_id.into()),
            reason: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: SubmissionStatus::Skipped,
            tx_id: None,
            reason: Some(reason.into()),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: SubmissionStatus::Failed,
            tx_id: None,
            reason: Some(reason.into()),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == SubmissionStatus::Confirmed
    }
}

/// Writes a product price (minor units) to the ledger
#[async_trait]
pub trait ChainSubmitter: Send + Sync {
    async fn submit(&self, product_id: &str, price_minor: i64) -> Result<SubmissionOutcome>;
}

/// Submitter used when no chain is configured
#[derive(Debug, Clone)]
pub struct DisabledSubmitter {
    reason: String,
}

impl DisabledSubmitter {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for DisabledSubmitter {
    fn default() -> Self {
        Self::new("chain submission disabled")
    }
}

#[async_trait]
impl ChainSubmitter for DisabledSubmitter {
    async fn submit(&self, product_id: &str, price_minor: i64) -> Result<SubmissionOutcome> {
        tracing::debug!(product_id, price_minor, reason = %self.reason, "Chain submission skipped");
        Ok(SubmissionOutcome::skipped(self.reason.clone()))
    }
}
