use crate::error::IntegrityError;
use serde::{Deserialize, Serialize};

/// How a provider classified the bank's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    Approved,
    /// The bank authenticated the cardholder but refused the payment.
    Declined,
    /// 3-D authentication did not complete successfully.
    AuthenticationFailed,
    /// Required fields were missing or could not be read.
    MalformedCallback,
    /// Signature or hash missing or not matching. Audit relevant.
    IntegrityViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    pub diagnostic: Diagnostic,
    #[serde(default)]
    pub response_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub auth_code: Option<String>,
    #[serde(default)]
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub masked_card_number: Option<String>,
    #[serde(default)]
    pub order_number: Option<String>,
}

impl PaymentResult {
    pub fn approved() -> Self {
        Self::with(true, Diagnostic::Approved)
    }

    /// A failed result. `Diagnostic::Approved` is not accepted here.
    pub fn failed(diagnostic: Diagnostic, message: impl Into<String>) -> Self {
        let diagnostic = match diagnostic {
            Diagnostic::Approved => Diagnostic::Declined,
            other => other,
        };
        let mut result = Self::with(false, diagnostic);
        result.message = Some(message.into());
        result
    }

    pub fn integrity_failure(error: &IntegrityError) -> Self {
        Self::failed(Diagnostic::IntegrityViolation, error.reason.clone())
    }

    fn with(success: bool, diagnostic: Diagnostic) -> Self {
        Self {
            success,
            diagnostic,
            response_code: None,
            message: None,
            auth_code: None,
            transaction_reference: None,
            masked_card_number: None,
            order_number: None,
        }
    }

    pub fn is_integrity_failure(&self) -> bool {
        self.diagnostic == Diagnostic::IntegrityViolation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_never_carries_approved() {
        let result = PaymentResult::failed(Diagnostic::Approved, "odd");
        assert!(!result.success);
        assert_eq!(result.diagnostic, Diagnostic::Declined);
    }

    #[test]
    fn test_integrity_failure_is_flagged() {
        let result = PaymentResult::integrity_failure(&IntegrityError::new("hash missing"));
        assert!(!result.success);
        assert!(result.is_integrity_failure());
        assert_eq!(result.message.as_deref(), Some("hash missing"));
    }

    #[test]
    fn test_diagnostic_serialization() {
        let json = serde_json::to_string(&Diagnostic::IntegrityViolation).unwrap();
        assert_eq!(json, "\"integrity_violation\"");
    }
}
