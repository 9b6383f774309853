use crate::config::{BankCredentials, NestPayCredentials};
use crate::domain::attempt::Field;
use crate::domain::bank::Bank;
use crate::domain::payment::{PaymentParameters, RedirectForm};
use crate::domain::ports::{PaymentProvider, PaymentProviderRef};
use crate::error::{PaymentError, Result};
use crate::infrastructure::providers::{GarantiProvider, NestPayProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of bank providers.
///
/// Only constructible through [`PaymentProviderFactoryBuilder::build`], which
/// refuses to produce a factory that is missing any [`Bank`].
pub struct PaymentProviderFactory {
    providers: HashMap<Bank, PaymentProviderRef>,
}

#[derive(Default)]
pub struct PaymentProviderFactoryBuilder {
    providers: HashMap<Bank, PaymentProviderRef>,
}

impl PaymentProviderFactoryBuilder {
    pub fn register(mut self, bank: Bank, provider: impl PaymentProvider + 'static) -> Self {
        self.providers.insert(bank, Arc::new(provider));
        self
    }

    pub fn register_shared(mut self, bank: Bank, provider: PaymentProviderRef) -> Self {
        self.providers.insert(bank, provider);
        self
    }

    /// Fails fast if any supported bank has no provider.
    pub fn build(self) -> Result<PaymentProviderFactory> {
        let missing: Vec<&str> = Bank::ALL
            .iter()
            .filter(|bank| !self.providers.contains_key(*bank))
            .map(Bank::code)
            .collect();
        if !missing.is_empty() {
            return Err(PaymentError::ProviderConfiguration(format!(
                "no provider registered for: {}",
                missing.join(", ")
            )));
        }
        tracing::debug!(banks = self.providers.len(), "provider registry verified");
        Ok(PaymentProviderFactory {
            providers: self.providers,
        })
    }
}

impl PaymentProviderFactory {
    pub fn builder() -> PaymentProviderFactoryBuilder {
        PaymentProviderFactoryBuilder::default()
    }

    /// Wires every bank to its provider family. Banks without credentials are
    /// still registered and report a configuration error when used.
    pub fn from_credentials(credentials: &BankCredentials) -> Result<Self> {
        let nestpay = |bank: Bank, c: &Option<NestPayCredentials>| match c {
            Some(c) => NestPayProvider::new(bank, c.clone()),
            None => NestPayProvider::unconfigured(bank),
        };
        let garanti = match &credentials.garanti {
            Some(c) => GarantiProvider::new(c.clone()),
            None => GarantiProvider::unconfigured(),
        };

        Self::builder()
            .register(Bank::Akbank, nestpay(Bank::Akbank, &credentials.akbank))
            .register(Bank::IsBank, nestpay(Bank::IsBank, &credentials.isbank))
            .register(Bank::HalkBank, nestpay(Bank::HalkBank, &credentials.halkbank))
            .register(Bank::Garanti, garanti)
            .build()
    }

    pub fn resolve(&self, bank: Bank) -> Result<PaymentProviderRef> {
        self.providers
            .get(&bank)
            .cloned()
            .ok_or_else(|| PaymentError::UnknownBank(bank.code().to_string()))
    }

    /// Resolves a textual selector, e.g. a form value.
    pub fn resolve_selector(&self, selector: &str) -> Result<PaymentProviderRef> {
        self.resolve(selector.parse()?)
    }

    /// Turns provider parameters into the form posted to the bank.
    pub fn build_redirect_form(&self, parameters: PaymentParameters) -> Result<RedirectForm> {
        let action_url = parameters.payment_url.trim();
        if action_url.is_empty() {
            return Err(PaymentError::invalid(Field::Form, "Redirect target URL is empty"));
        }
        Ok(RedirectForm {
            method: parameters.method,
            action_url: action_url.to_string(),
            fields: parameters.fields,
        })
    }
}
