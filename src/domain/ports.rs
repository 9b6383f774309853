use super::payment::{CallbackPayload, PaymentParameters, PaymentRequest};
use super::result::PaymentResult;
use super::session::SessionId;
use crate::error::{IntegrityError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Byte-blob storage scoped to one session.
///
/// Each call must be atomic on its own. Expired sessions read as `None`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, session: &SessionId, key: &str, value: Vec<u8>) -> Result<()>;
    async fn remove(&self, session: &SessionId, key: &str) -> Result<()>;
}

pub type SessionStoreBox = Box<dyn SessionStore>;

/// One bank integration.
///
/// Both operations are pure computation: no network, no clock beyond what a
/// provider chooses to put into its own nonces.
pub trait PaymentProvider: Send + Sync {
    /// Builds the fields the bank's authentication page needs.
    ///
    /// Fails with `ProviderConfiguration` when credentials are missing and with
    /// `Validation` when the request cannot be served by this bank.
    fn build_parameters(&self, request: &PaymentRequest) -> Result<PaymentParameters>;

    /// Classifies what the bank posted back.
    ///
    /// Missing or malformed business fields yield a failed result. Only a
    /// failed authenticity check is an error.
    fn interpret_callback(
        &self,
        payload: &CallbackPayload,
    ) -> std::result::Result<PaymentResult, IntegrityError>;
}

pub type PaymentProviderRef = Arc<dyn PaymentProvider>;
