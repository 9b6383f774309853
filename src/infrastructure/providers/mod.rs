//! Bank integrations.
//!
//! Each family implements [`PaymentProvider`](crate::domain::ports::PaymentProvider)
//! on its own; the helpers below are only the hashing and parsing bits they
//! happen to share.

pub mod garanti;
pub mod nestpay;

use crate::domain::attempt::Field;
use crate::error::{PaymentError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rust_decimal::Decimal;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

pub use garanti::GarantiProvider;
pub use nestpay::NestPayProvider;

pub(crate) fn sha512_base64(data: &str) -> String {
    STANDARD.encode(Sha512::digest(data.as_bytes()))
}

pub(crate) fn sha512_hex_upper(data: &str) -> String {
    hex::encode_upper(Sha512::digest(data.as_bytes()))
}

pub(crate) fn hashes_match(expected: &str, received: &str) -> bool {
    expected.as_bytes().ct_eq(received.trim().as_bytes()).into()
}

/// 3-D Secure `mdStatus` values that mean the cardholder was authenticated
/// (full, half or attempted authentication).
pub(crate) fn md_status_authenticated(md_status: &str) -> bool {
    matches!(md_status.trim(), "1" | "2" | "3" | "4")
}

/// Errors out when a credential is blank.
pub(crate) fn required<'a>(bank: &str, name: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PaymentError::ProviderConfiguration(format!(
            "{}: {} is not configured",
            bank, name
        )));
    }
    Ok(value)
}

/// Single payments are sent with an empty installment field.
pub(crate) fn installment_field(bank: &str, installment: u8, max: u8) -> Result<String> {
    if installment == 0 || installment > max {
        return Err(PaymentError::invalid(
            Field::Installment,
            format!("{} supports 1 to {} installments", bank, max),
        ));
    }
    Ok(if installment == 1 {
        String::new()
    } else {
        installment.to_string()
    })
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn major_units(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

pub(crate) fn minor_units(amount: Decimal) -> String {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp(0)
        .normalize()
        .to_string()
}
