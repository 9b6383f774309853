use super::{
    hashes_match, installment_field, md_status_authenticated, minor_units, non_blank, required,
    sha512_base64, sha512_hex_upper,
};
use crate::config::GarantiCredentials;
use crate::domain::attempt::MAX_INSTALLMENT;
use crate::domain::payment::{CallbackPayload, FormFields, PaymentParameters, PaymentRequest};
use crate::domain::ports::PaymentProvider;
use crate::domain::result::{Diagnostic, PaymentResult};
use crate::error::{IntegrityError, Result};
use secrecy::ExposeSecret;

const BANK: &str = "garanti";
const TXN_TYPE: &str = "sales";
const DEFAULT_USER_ID: &str = "PROVAUT";
const DEFAULT_MODE: &str = "PROD";
/// Fields the classification depends on. A callback whose signature does not
/// cover them cannot be trusted.
const SIGNED_FIELDS: [&str; 2] = ["mdstatus", "procreturncode"];
const ORDER_FIELDS: [&str; 2] = ["oid", "orderid"];

pub struct GarantiProvider {
    credentials: GarantiCredentials,
}

impl GarantiProvider {
    pub fn new(credentials: GarantiCredentials) -> Self {
        Self { credentials }
    }

    pub fn unconfigured() -> Self {
        Self::new(GarantiCredentials::default())
    }
}

/// The provisioning password is never sent; its hash salted with the
/// zero-padded terminal id is.
fn hashed_password(password: &str, terminal_id: &str) -> String {
    sha512_hex_upper(&format!("{}{:0>9}", password, terminal_id))
}

/// Signature the bank attaches to its callback: base64 SHA-512 of the
/// concatenated `hashparamsval` and the store key.
pub fn callback_hash(hash_params_val: &str, store_key: &str) -> String {
    sha512_base64(&format!("{}{}", hash_params_val, store_key))
}

/// Concatenates the values of the fields named in `hashparams`
/// (colon separated), in the listed order.
pub fn hash_params_value(payload: &CallbackPayload, hash_params: &str) -> String {
    hash_params
        .split(':')
        .filter(|name| !name.is_empty())
        .map(|name| payload.get(name).unwrap_or_default())
        .collect()
}

/// The part of `payload` covered by the signature: the fields listed in
/// `hashparams`, nothing else.
fn signed_fields(payload: &CallbackPayload, hash_params: &str) -> CallbackPayload {
    hash_params
        .split(':')
        .filter(|name| !name.is_empty())
        .filter_map(|name| payload.get(name).map(|value| (name, value)))
        .collect()
}

impl PaymentProvider for GarantiProvider {
    fn build_parameters(&self, request: &PaymentRequest) -> Result<PaymentParameters> {
        let c = &self.credentials;
        let terminal_id = required(BANK, "terminal_id", &c.terminal_id)?;
        let merchant_id = required(BANK, "merchant_id", &c.merchant_id)?;
        let password = required(BANK, "password", &c.password)?;
        let store_key = required(BANK, "store_key", &c.store_key)?;
        let gateway_url = required(BANK, "gateway_url", &c.gateway_url)?;
        let success_url = required(BANK, "success_url", &c.success_url)?;
        let error_url = required(BANK, "error_url", &c.error_url)?;
        let user_id =
            non_blank(Some(c.user_id.as_str())).unwrap_or_else(|| DEFAULT_USER_ID.to_string());
        let installment = installment_field(
            BANK,
            request.installment,
            c.max_installment.unwrap_or(MAX_INSTALLMENT),
        )?;
        let amount = minor_units(request.total_amount);

        let security_hash = sha512_hex_upper(&format!(
            "{}{}{}{}{}{}{}{}{}{}",
            terminal_id,
            request.order_number,
            amount,
            request.currency_iso_code,
            success_url,
            error_url,
            TXN_TYPE,
            installment,
            store_key,
            hashed_password(password, terminal_id),
        ));

        let mut fields = FormFields::new();
        fields.insert("mode", c.mode.as_deref().unwrap_or(DEFAULT_MODE));
        fields.insert("apiversion", "512");
        fields.insert("secure3dsecuritylevel", "3D_PAY");
        fields.insert("terminalprovuserid", user_id.as_str());
        fields.insert("terminaluserid", user_id.as_str());
        fields.insert("terminalmerchantid", merchant_id);
        fields.insert("terminalid", terminal_id);
        fields.insert("orderid", request.order_number.as_str());
        fields.insert("customeripaddress", request.customer_ip.to_string());
        fields.insert("txntype", TXN_TYPE);
        fields.insert("txnamount", amount);
        fields.insert("txncurrencycode", request.currency_iso_code.as_str());
        fields.insert("txninstallmentcount", installment);
        fields.insert("successurl", success_url);
        fields.insert("errorurl", error_url);
        fields.insert("cardnumber", request.card_number.expose_secret());
        fields.insert("cardexpiredatemonth", request.expire_month_padded());
        fields.insert("cardexpiredateyear", request.expire_year_short());
        fields.insert("cardcvv2", request.cvv.expose_secret());
        fields.insert("lang", request.language_iso_code.as_str());
        fields.insert("secure3dhash", security_hash);

        tracing::debug!(bank = BANK, order = %request.order_number, "built garanti gate parameters");
        Ok(PaymentParameters::post(gateway_url, fields))
    }

    fn interpret_callback(
        &self,
        payload: &CallbackPayload,
    ) -> std::result::Result<PaymentResult, IntegrityError> {
        let hash = non_blank(payload.get("hash"))
            .ok_or_else(|| IntegrityError::new("hash field is missing"))?;
        let hash_params = non_blank(payload.get("hashparams"))
            .ok_or_else(|| IntegrityError::new("hashparams field is missing"))?;
        let hash_params_val = payload
            .get("hashparamsval")
            .ok_or_else(|| IntegrityError::new("hashparamsval field is missing"))?;
        let store_key = self.credentials.store_key.trim();
        if store_key.is_empty() {
            return Err(IntegrityError::new(
                "garanti: store_key is not configured, callback cannot be verified",
            ));
        }
        if hash_params_value(payload, &hash_params) != hash_params_val {
            return Err(IntegrityError::new(
                "hashparamsval does not match the listed fields",
            ));
        }
        if !hashes_match(&callback_hash(hash_params_val, store_key), &hash) {
            return Err(IntegrityError::new("hash does not match callback fields"));
        }

        let payload = &signed_fields(payload, &hash_params);
        if let Some(name) = SIGNED_FIELDS.iter().find(|name| payload.get(name).is_none()) {
            return Err(IntegrityError::new(format!(
                "{} is not covered by hashparams",
                name
            )));
        }
        if ORDER_FIELDS.iter().all(|name| payload.get(name).is_none()) {
            return Err(IntegrityError::new("order id is not covered by hashparams"));
        }

        let order_number = non_blank(payload.get("oid").or_else(|| payload.get("orderid")));
        let Some(md_status) = non_blank(payload.get("mdstatus")) else {
            let mut result =
                PaymentResult::failed(Diagnostic::MalformedCallback, "mdstatus is missing");
            result.order_number = order_number;
            return Ok(result);
        };
        if !md_status_authenticated(&md_status) {
            let message = non_blank(payload.get("mderrormessage"))
                .unwrap_or_else(|| "3-D authentication failed".to_string());
            let mut result = PaymentResult::failed(Diagnostic::AuthenticationFailed, message);
            result.response_code = Some(md_status);
            result.order_number = order_number;
            return Ok(result);
        }

        let return_code = non_blank(payload.get("procreturncode"));
        let mut result = match return_code.as_deref() {
            Some("00") => {
                let mut approved = PaymentResult::approved();
                approved.message = non_blank(payload.get("response"));
                approved
            }
            None => PaymentResult::failed(
                Diagnostic::MalformedCallback,
                "procreturncode is missing",
            ),
            Some(_) => PaymentResult::failed(
                Diagnostic::Declined,
                non_blank(payload.get("errmsg"))
                    .or_else(|| non_blank(payload.get("response")))
                    .unwrap_or_else(|| "Declined".to_string()),
            ),
        };
        result.response_code = return_code;
        result.auth_code = non_blank(payload.get("authcode"));
        result.transaction_reference = non_blank(payload.get("hostrefnum"));
        result.masked_card_number = non_blank(payload.get("MaskedPan"));
        result.order_number = order_number;
        Ok(result)
    }
}
