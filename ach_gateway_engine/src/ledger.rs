//! Client for the accounts ledger.
//!
//! When a returned entry reclaims a transfer that has a ledger transaction recorded against it, the transaction must
//! be reversed in the accounts service. [`LedgerClient`] is the narrow interface the return reconciler needs;
//! [`AccountsClient`] implements it over HTTP.
use std::time::Duration;

use log::*;
use thiserror::Error;

pub const DEFAULT_ACCOUNTS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Could not configure the accounts client. {0}")]
    ConfigurationError(String),
    #[error("Could not reach the accounts service. {0}")]
    Unreachable(String),
    #[error("The accounts service refused to reverse transaction {transaction_id} ({status}). {body}")]
    ReversalRejected { transaction_id: String, status: u16, body: String },
}

#[allow(async_fn_in_trait)]
pub trait LedgerClient {
    /// Requests a reversal of the ledger transaction on behalf of `user_id`.
    async fn reverse_transaction(&self, transaction_id: &str, user_id: &str, request_id: &str)
        -> Result<(), LedgerError>;
}

#[derive(Debug, Clone)]
pub struct AccountsClient {
    endpoint: String,
    client: reqwest::Client,
}

impl AccountsClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::ConfigurationError(e.to_string()))?;
        Ok(Self { endpoint: endpoint.trim_end_matches('/').to_string(), client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn reversal_url(&self, transaction_id: &str) -> String {
        format!("{}/accounts/transactions/{transaction_id}/reversal", self.endpoint)
    }
}

/// The idempotency key for reversing a transaction. A transaction is only ever reversed once, so repeated requests
/// for the same transaction share a key.
pub fn reversal_idempotency_key(transaction_id: &str) -> String {
    format!("reversal-{transaction_id}")
}

impl LedgerClient for AccountsClient {
    async fn reverse_transaction(
        &self,
        transaction_id: &str,
        user_id: &str,
        request_id: &str,
    ) -> Result<(), LedgerError> {
        let url = self.reversal_url(transaction_id);
        debug!("💸️ Requesting reversal of {transaction_id} [{request_id}]");
        let response = self
            .client
            .post(&url)
            .header("X-Request-ID", request_id)
            .header("X-User-ID", user_id)
            .header("Idempotency-Key", reversal_idempotency_key(transaction_id))
            .send()
            .await
            .map_err(|e| LedgerError::Unreachable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            info!("💸️ Transaction {transaction_id} reversed");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(LedgerError::ReversalRejected { transaction_id: transaction_id.to_string(), status: status.as_u16(), body })
    }
}

/// A random identifier for correlating a reversal request with the accounts service's logs.
pub fn new_request_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reversal_urls() {
        let client = AccountsClient::new("http://accounts:8085/", DEFAULT_ACCOUNTS_TIMEOUT).unwrap();
        assert_eq!(client.reversal_url("tx-1"), "http://accounts:8085/accounts/transactions/tx-1/reversal");
    }

    #[test]
    fn request_ids_are_distinct() {
        let a = new_request_id();
        assert_eq!(a.len(), 16);
        assert_ne!(a, new_request_id());
        assert_eq!(reversal_idempotency_key("tx-1"), reversal_idempotency_key("tx-1"));
        assert_ne!(reversal_idempotency_key("tx-1"), reversal_idempotency_key("tx-2"));
    }

    #[tokio::test]
    async fn unreachable_service() {
        let client = AccountsClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = client.reverse_transaction("tx-1", "user-1", "req").await.unwrap_err();
        assert!(matches!(err, LedgerError::Unreachable(_)));
    }
}
