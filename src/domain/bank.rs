use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Banks a cardholder can pick for the 3-D Secure step.
///
/// The set is closed: every variant must have a registered provider before the
/// orchestrator is allowed to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bank {
    Akbank,
    IsBank,
    HalkBank,
    Garanti,
}

impl Bank {
    pub const ALL: [Bank; 4] = [Bank::Akbank, Bank::IsBank, Bank::HalkBank, Bank::Garanti];

    /// Selector code used on forms, in config files and in stored attempts.
    pub fn code(&self) -> &'static str {
        match self {
            Bank::Akbank => "akbank",
            Bank::IsBank => "isbank",
            Bank::HalkBank => "halkbank",
            Bank::Garanti => "garanti",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Bank::Akbank => "Akbank",
            Bank::IsBank => "Türkiye İş Bankası",
            Bank::HalkBank => "Halkbank",
            Bank::Garanti => "Garanti BBVA",
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Bank {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector = s.trim();
        Bank::ALL
            .into_iter()
            .find(|bank| bank.code().eq_ignore_ascii_case(selector))
            .ok_or_else(|| PaymentError::UnknownBank(selector.to_string()))
    }
}
