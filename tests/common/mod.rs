#![allow(dead_code)]

use std::sync::Arc;
use threedgate::application::factory::PaymentProviderFactory;
use threedgate::application::orchestrator::PaymentOrchestrator;
use threedgate::config::GatewayConfig;
use threedgate::domain::attempt::PaymentForm;
use threedgate::domain::payment::CallbackPayload;
use threedgate::domain::ports::SessionStoreBox;
use threedgate::infrastructure::providers::garanti::{callback_hash, hash_params_value};
use threedgate::infrastructure::providers::nestpay::ver3_hash;

pub const GATEWAY_CONFIG: &str = "tests/fixtures/gateway.json";
pub const AKBANK_STORE_KEY: &str = "AKBANK0001";
pub const GARANTI_STORE_KEY: &str = "12345678";

pub fn config() -> GatewayConfig {
    GatewayConfig::from_path(GATEWAY_CONFIG).unwrap()
}

pub fn orchestrator(sessions: SessionStoreBox) -> PaymentOrchestrator {
    let config = config();
    let providers = PaymentProviderFactory::from_credentials(&config.banks).unwrap();
    PaymentOrchestrator::new(sessions, Arc::new(providers), config.checkout)
}

pub fn card_form(bank: &str) -> PaymentForm {
    PaymentForm {
        card_holder_name: "Ada Lovelace".to_string(),
        card_number: "4111111111111111".to_string(),
        expire_month: "12".to_string(),
        expire_year: "30".to_string(),
        cvv: "123".to_string(),
        installment: "1".to_string(),
        bank: bank.to_string(),
    }
}

/// A NestPay callback signed the way the bank signs it.
pub fn nestpay_callback(pairs: &[(&str, &str)], store_key: &str) -> CallbackPayload {
    let mut payload: CallbackPayload = pairs.iter().copied().collect();
    let hash = ver3_hash(&payload, store_key);
    payload.insert("HASH", hash);
    payload
}

/// A Garanti callback signed over every field it carries.
pub fn garanti_callback(pairs: &[(&str, &str)], store_key: &str) -> CallbackPayload {
    let mut payload: CallbackPayload = pairs.iter().copied().collect();
    let hash_params = pairs
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(":");
    let value = hash_params_value(&payload, &hash_params);
    payload.insert("hash", callback_hash(&value, store_key));
    payload.insert("hashparams", hash_params);
    payload.insert("hashparamsval", value);
    payload
}
