use super::attempt::PaymentAttempt;
use super::bank::Bank;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;

/// Everything a provider needs to build the bank's authentication request.
///
/// Built by the orchestrator for a single gate step and dropped afterwards.
/// Amount, currency, language and order number are server-side values.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub card_holder_name: String,
    pub card_number: SecretString,
    pub expire_month: u8,
    pub expire_year: u16,
    pub cvv: SecretString,
    pub installment: u8,
    pub bank: Bank,
    pub total_amount: Decimal,
    pub customer_ip: IpAddr,
    pub currency_iso_code: String,
    pub language_iso_code: String,
    pub order_number: String,
}

impl PaymentRequest {
    pub fn from_attempt(
        attempt: PaymentAttempt,
        total_amount: Decimal,
        customer_ip: IpAddr,
        currency_iso_code: impl Into<String>,
        language_iso_code: impl Into<String>,
        order_number: impl Into<String>,
    ) -> Self {
        Self {
            card_holder_name: attempt.card_holder_name,
            card_number: attempt.card_number,
            expire_month: attempt.expire_month,
            expire_year: attempt.expire_year,
            cvv: attempt.cvv,
            installment: attempt.installment,
            bank: attempt.bank,
            total_amount,
            customer_ip,
            currency_iso_code: currency_iso_code.into(),
            language_iso_code: language_iso_code.into(),
            order_number: order_number.into(),
        }
    }

    /// Two digit expiry year, as most gateways expect it.
    pub fn expire_year_short(&self) -> String {
        format!("{:02}", self.expire_year % 100)
    }

    pub fn expire_month_padded(&self) -> String {
        format!("{:02}", self.expire_month)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormMethod {
    #[default]
    Post,
    Get,
}

/// Ordered name/value pairs. Insertion order is kept because some gateways
/// are sensitive to it when re-hashing what they received; it is also kept
/// when serialized as a map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an earlier value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FormFields::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

impl Serialize for FormFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

struct FormFieldsVisitor;

impl<'de> Visitor<'de> for FormFieldsVisitor {
    type Value = FormFields;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of form field names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FormFields, A::Error> {
        let mut fields = FormFields::new();
        while let Some((name, value)) = map.next_entry::<String, String>()? {
            fields.insert(name, value);
        }
        Ok(fields)
    }
}

impl<'de> Deserialize<'de> for FormFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FormFieldsVisitor)
    }
}

/// What a provider hands back for the gate step: the bank page to post to and
/// the fields to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentParameters {
    pub payment_url: String,
    pub method: FormMethod,
    pub fields: FormFields,
}

impl PaymentParameters {
    pub fn post(payment_url: impl Into<String>, fields: FormFields) -> Self {
        Self {
            payment_url: payment_url.into(),
            method: FormMethod::Post,
            fields,
        }
    }
}

/// Auto-submitting form the presentation layer renders to send the cardholder
/// to the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectForm {
    pub method: FormMethod,
    pub action_url: String,
    pub fields: FormFields,
}

/// Raw data the bank posted (or sent as a query string) to the callback URL.
pub type CallbackPayload = FormFields;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::net::Ipv4Addr;

    #[test]
    fn test_form_fields_keep_order_and_replace() {
        let mut fields = FormFields::new();
        fields.insert("b", "1");
        fields.insert("a", "2");
        fields.insert("b", "3");
        let pairs: Vec<_> = fields.iter().collect();
        assert_eq!(pairs, vec![("b", "3"), ("a", "2")]);
        assert_eq!(fields.get("a"), Some("2"));
        assert_eq!(fields.get("c"), None);
    }

    #[test]
    fn test_form_fields_serialize_in_insertion_order() {
        let fields: FormFields = [("z", "1"), ("a", "2"), ("m", "3")].into_iter().collect();
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"z":"1","a":"2","m":"3"}"#);

        let parsed: FormFields = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, fields);
    }

    #[test]
    fn test_request_debug_hides_card_data() {
        let attempt = PaymentAttempt {
            card_holder_name: "Ada Lovelace".to_string(),
            card_number: "4111111111111111".to_string().into(),
            expire_month: 3,
            expire_year: 2031,
            cvv: "987".to_string().into(),
            installment: 1,
            bank: Bank::Garanti,
        };
        let request = PaymentRequest::from_attempt(
            attempt,
            dec!(1.00),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            "949",
            "tr",
            "order-1",
        );
        assert_eq!(request.expire_month_padded(), "03");
        assert_eq!(request.expire_year_short(), "31");

        let debug = format!("{:?}", request);
        assert!(!debug.contains("4111111111111111"));
        assert!(!debug.contains("987"));
    }
}
