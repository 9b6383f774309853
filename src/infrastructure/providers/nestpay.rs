use super::{
    hashes_match, installment_field, major_units, md_status_authenticated, non_blank, required,
    sha512_base64,
};
use crate::config::NestPayCredentials;
use crate::domain::attempt::MAX_INSTALLMENT;
use crate::domain::bank::Bank;
use crate::domain::payment::{CallbackPayload, FormFields, PaymentParameters, PaymentRequest};
use crate::domain::ports::PaymentProvider;
use crate::domain::result::{Diagnostic, PaymentResult};
use crate::error::{IntegrityError, Result};
use secrecy::ExposeSecret;
use uuid::Uuid;

const HASH_FIELD: &str = "HASH";
const DEFAULT_STORE_TYPE: &str = "3d_pay";

/// Hosted 3-D page used by several banks (Akbank, İş Bankası, Halkbank).
///
/// Requests and callbacks are signed with the "ver3" scheme: every field value
/// except the hash itself, ordered by field name, escaped, pipe-joined and
/// followed by the store key, then SHA-512 and base64.
pub struct NestPayProvider {
    bank: Bank,
    credentials: NestPayCredentials,
}

impl NestPayProvider {
    pub fn new(bank: Bank, credentials: NestPayCredentials) -> Self {
        Self { bank, credentials }
    }

    /// Provider with no credentials; every gate attempt fails with a
    /// configuration error until the bank is configured.
    pub fn unconfigured(bank: Bank) -> Self {
        Self::new(bank, NestPayCredentials::default())
    }
}

/// Computes the ver3 hash of `fields` with `store_key`.
pub fn ver3_hash(fields: &FormFields, store_key: &str) -> String {
    let mut signed: Vec<(&str, &str)> = fields
        .iter()
        .filter(|(name, _)| {
            !name.eq_ignore_ascii_case(HASH_FIELD) && !name.eq_ignore_ascii_case("encoding")
        })
        .collect();
    signed.sort_by_key(|(name, _)| name.to_ascii_lowercase());

    let mut plain: String = signed
        .iter()
        .map(|(_, value)| escape(value))
        .collect::<Vec<_>>()
        .join("|");
    plain.push('|');
    plain.push_str(&escape(store_key));
    sha512_base64(&plain)
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('|', "\\|")
}

impl PaymentProvider for NestPayProvider {
    fn build_parameters(&self, request: &PaymentRequest) -> Result<PaymentParameters> {
        let bank = self.bank.code();
        let c = &self.credentials;
        let client_id = required(bank, "client_id", &c.client_id)?;
        let store_key = required(bank, "store_key", &c.store_key)?;
        let gateway_url = required(bank, "gateway_url", &c.gateway_url)?;
        let ok_url = required(bank, "ok_url", &c.ok_url)?;
        let fail_url = required(bank, "fail_url", &c.fail_url)?;
        let installment = installment_field(
            bank,
            request.installment,
            c.max_installment.unwrap_or(MAX_INSTALLMENT),
        )?;

        let mut fields = FormFields::new();
        fields.insert("clientid", client_id);
        fields.insert("amount", major_units(request.total_amount));
        fields.insert("oid", request.order_number.as_str());
        fields.insert("okUrl", ok_url);
        fields.insert("failUrl", fail_url);
        fields.insert("islemtipi", "Auth");
        fields.insert("taksit", installment);
        fields.insert("rnd", Uuid::new_v4().simple().to_string());
        fields.insert(
            "storetype",
            c.store_type.as_deref().unwrap_or(DEFAULT_STORE_TYPE),
        );
        fields.insert("lang", request.language_iso_code.as_str());
        fields.insert("currency", request.currency_iso_code.as_str());
        fields.insert("pan", request.card_number.expose_secret());
        fields.insert("cardHolderName", request.card_holder_name.as_str());
        fields.insert("Ecom_Payment_Card_ExpDate_Year", request.expire_year_short());
        fields.insert("Ecom_Payment_Card_ExpDate_Month", request.expire_month_padded());
        fields.insert("cv2", request.cvv.expose_secret());
        fields.insert("hashAlgorithm", "ver3");
        let hash = ver3_hash(&fields, store_key);
        fields.insert(HASH_FIELD, hash);

        tracing::debug!(bank, order = %request.order_number, "built nestpay gate parameters");
        Ok(PaymentParameters::post(gateway_url, fields))
    }

    fn interpret_callback(
        &self,
        payload: &CallbackPayload,
    ) -> std::result::Result<PaymentResult, IntegrityError> {
        let received = payload
            .get(HASH_FIELD)
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| IntegrityError::new("HASH field is missing"))?;
        let store_key = self.credentials.store_key.trim();
        if store_key.is_empty() {
            return Err(IntegrityError::new(format!(
                "{}: store_key is not configured, callback cannot be verified",
                self.bank
            )));
        }
        if !hashes_match(&ver3_hash(payload, store_key), received) {
            return Err(IntegrityError::new("HASH does not match callback fields"));
        }

        let order_number = non_blank(payload.get("oid"));
        let Some(md_status) = non_blank(payload.get("mdStatus")) else {
            let mut result =
                PaymentResult::failed(Diagnostic::MalformedCallback, "mdStatus is missing");
            result.order_number = order_number;
            return Ok(result);
        };
        if !md_status_authenticated(&md_status) {
            let message = non_blank(payload.get("mdErrorMsg"))
                .unwrap_or_else(|| "3-D authentication failed".to_string());
            let mut result = PaymentResult::failed(Diagnostic::AuthenticationFailed, message);
            result.response_code = Some(md_status);
            result.order_number = order_number;
            return Ok(result);
        }

        let response = non_blank(payload.get("Response"));
        let return_code = non_blank(payload.get("ProcReturnCode"));
        let mut result = match (response.as_deref(), return_code.as_deref()) {
            (Some("Approved"), Some("00")) => {
                let mut approved = PaymentResult::approved();
                approved.message = response.clone();
                approved
            }
            (None, _) | (_, None) => PaymentResult::failed(
                Diagnostic::MalformedCallback,
                "Response or ProcReturnCode is missing",
            ),
            _ => PaymentResult::failed(
                Diagnostic::Declined,
                non_blank(payload.get("ErrMsg")).unwrap_or_else(|| "Declined".to_string()),
            ),
        };
        result.response_code = return_code;
        result.auth_code = non_blank(payload.get("AuthCode"));
        result.transaction_reference = non_blank(payload.get("TransId"));
        result.masked_card_number = non_blank(payload.get("MaskedPan"));
        result.order_number = order_number;
        Ok(result)
    }
}
