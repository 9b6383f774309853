use super::bank::Bank;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const MAX_INSTALLMENT: u8 = 12;

/// Form field a validation message is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CardHolderName,
    CardNumber,
    ExpireMonth,
    ExpireYear,
    Cvv,
    Installment,
    Bank,
    /// Not tied to a single input, e.g. a malformed redirect target.
    Form,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Field-level problems found in submitted card data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: Field, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: Field) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

/// Raw card data as submitted by the cardholder. Every field is text so that
/// nothing is lost before validation can report on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaymentForm {
    pub card_holder_name: String,
    pub card_number: String,
    pub expire_month: String,
    pub expire_year: String,
    pub cvv: String,
    #[serde(default)]
    pub installment: String,
    pub bank: String,
}

/// Card data accepted by the collect step, held in the session until the bank
/// calls back. The card number and CVV stay wrapped until a provider copies
/// them into the bank's form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub card_holder_name: String,
    #[serde(serialize_with = "expose", deserialize_with = "conceal")]
    pub card_number: SecretString,
    pub expire_month: u8,
    pub expire_year: u16,
    #[serde(serialize_with = "expose", deserialize_with = "conceal")]
    pub cvv: SecretString,
    #[serde(default = "default_installment")]
    pub installment: u8,
    pub bank: Bank,
}

fn default_installment() -> u8 {
    1
}

// The session envelope is the only place the plain values are written.
fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn conceal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl PaymentAttempt {
    /// PAN with everything except the first six and last four digits hidden.
    pub fn masked_card_number(&self) -> String {
        mask_pan(self.card_number.expose_secret())
    }
}

pub fn mask_pan(pan: &str) -> String {
    let len = pan.chars().count();
    if len <= 10 {
        return "*".repeat(len);
    }
    pan.chars()
        .enumerate()
        .map(|(i, c)| if i < 6 || i >= len - 4 { c } else { '*' })
        .collect()
}

impl PaymentForm {
    /// Structural validation of the submitted form.
    ///
    /// Collects every problem instead of stopping at the first one so the
    /// caller can render them all against the original input.
    pub fn validate(&self) -> Result<PaymentAttempt, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let card_holder_name = self.card_holder_name.trim().to_string();
        if card_holder_name.is_empty() {
            errors.add(Field::CardHolderName, "Card holder name is required");
        }

        let card_number: String = self
            .card_number
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if card_number.is_empty() {
            errors.add(Field::CardNumber, "Card number is required");
        } else if !card_number.chars().all(|c| c.is_ascii_digit())
            || !(12..=19).contains(&card_number.len())
        {
            errors.add(Field::CardNumber, "Card number must be 12 to 19 digits");
        } else if !luhn::valid(&card_number) {
            errors.add(Field::CardNumber, "Card number is not valid");
        }

        let expire_month = match parse_digits::<u8>(&self.expire_month) {
            Some(m) if (1..=12).contains(&m) => Some(m),
            Some(_) => {
                errors.add(Field::ExpireMonth, "Expiry month must be between 1 and 12");
                None
            }
            None => {
                errors.add(Field::ExpireMonth, "Expiry month is required");
                None
            }
        };

        let year_text = self.expire_year.trim();
        let expire_year = match parse_digits::<u16>(year_text) {
            Some(y) if year_text.len() == 2 => Some(2000 + y),
            Some(y) if year_text.len() == 4 && (2000..=2099).contains(&y) => Some(y),
            Some(_) => {
                errors.add(
                    Field::ExpireYear,
                    "Expiry year must be two digits or between 2000 and 2099",
                );
                None
            }
            None => {
                errors.add(Field::ExpireYear, "Expiry year is required");
                None
            }
        };

        let cvv = self.cvv.trim().to_string();
        if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
            errors.add(Field::Cvv, "CVV must be 3 or 4 digits");
        }

        let installment = if self.installment.trim().is_empty() {
            Some(1)
        } else {
            match parse_digits::<u8>(&self.installment) {
                Some(n) if (1..=MAX_INSTALLMENT).contains(&n) => Some(n),
                _ => {
                    errors.add(
                        Field::Installment,
                        format!("Installment must be between 1 and {}", MAX_INSTALLMENT),
                    );
                    None
                }
            }
        };

        let bank = if self.bank.trim().is_empty() {
            errors.add(Field::Bank, "Please select a bank");
            None
        } else {
            match self.bank.parse::<Bank>() {
                Ok(bank) => Some(bank),
                Err(_) => {
                    errors.add(Field::Bank, "Selected bank is not supported");
                    None
                }
            }
        };

        match (expire_month, expire_year, installment, bank) {
            (Some(expire_month), Some(expire_year), Some(installment), Some(bank))
                if errors.is_empty() =>
            {
                Ok(PaymentAttempt {
                    card_holder_name,
                    card_number: SecretString::from(card_number),
                    expire_month,
                    expire_year,
                    cvv: SecretString::from(cvv),
                    installment,
                    bank,
                })
            }
            _ => Err(errors),
        }
    }
}

fn parse_digits<T: std::str::FromStr>(value: &str) -> Option<T> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
