use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use url::Url;

/// Server-side values injected into every payment request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CheckoutSettings {
    pub amount: Decimal,
    /// ISO 4217 numeric code, 949 is TRY.
    pub currency_iso_code: String,
    pub language_iso_code: String,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            amount: dec!(1.00),
            currency_iso_code: "949".to_string(),
            language_iso_code: "tr".to_string(),
        }
    }
}

/// Merchant credentials for a NestPay hosted 3-D page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NestPayCredentials {
    pub client_id: String,
    pub store_key: String,
    pub gateway_url: String,
    pub ok_url: String,
    pub fail_url: String,
    pub store_type: Option<String>,
    pub max_installment: Option<u8>,
}

/// Merchant credentials for the Garanti virtual POS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GarantiCredentials {
    pub terminal_id: String,
    pub merchant_id: String,
    pub user_id: String,
    pub password: String,
    pub store_key: String,
    pub gateway_url: String,
    pub success_url: String,
    pub error_url: String,
    pub mode: Option<String>,
    pub max_installment: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BankCredentials {
    pub akbank: Option<NestPayCredentials>,
    pub isbank: Option<NestPayCredentials>,
    pub halkbank: Option<NestPayCredentials>,
    pub garanti: Option<GarantiCredentials>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub checkout: CheckoutSettings,
    pub banks: BankCredentials,
}

impl GatewayConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PaymentError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: GatewayConfig = serde_json::from_str(raw)
            .map_err(|e| PaymentError::Config(format!("invalid gateway config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that can never work. Blank credentials are allowed here
    /// and reported by the provider when it is used.
    pub fn validate(&self) -> Result<()> {
        if self.checkout.amount <= Decimal::ZERO {
            return Err(PaymentError::Config(
                "checkout.amount must be positive".to_string(),
            ));
        }
        if self.checkout.currency_iso_code.trim().is_empty() {
            return Err(PaymentError::Config(
                "checkout.currency_iso_code is required".to_string(),
            ));
        }

        let nestpay = [
            ("akbank", &self.banks.akbank),
            ("isbank", &self.banks.isbank),
            ("halkbank", &self.banks.halkbank),
        ];
        for (name, credentials) in nestpay {
            if let Some(c) = credentials {
                check_url(name, "gateway_url", &c.gateway_url)?;
                check_url(name, "ok_url", &c.ok_url)?;
                check_url(name, "fail_url", &c.fail_url)?;
            }
        }
        if let Some(c) = &self.banks.garanti {
            check_url("garanti", "gateway_url", &c.gateway_url)?;
            check_url("garanti", "success_url", &c.success_url)?;
            check_url("garanti", "error_url", &c.error_url)?;
        }
        Ok(())
    }
}

fn check_url(bank: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Ok(());
    }
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| PaymentError::Config(format!("banks.{}.{}: {}", bank, field, e)))
}
