use crate::application::factory::PaymentProviderFactory;
use crate::config::CheckoutSettings;
use crate::domain::attempt::{PaymentAttempt, PaymentForm, ValidationErrors};
use crate::domain::payment::{CallbackPayload, PaymentRequest, RedirectForm};
use crate::domain::ports::SessionStoreBox;
use crate::domain::result::PaymentResult;
use crate::domain::session::{SessionId, SessionKey, decode, encode};
use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of submitting card data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    /// Attempt stored; continue to the gate.
    Accepted,
    /// Nothing stored; render the errors against the submitted form.
    Rejected(ValidationErrors),
}

/// Outcome of the gate step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Post `form` to the bank. `order_number` is the identifier generated for
    /// this request.
    Redirect {
        form: RedirectForm,
        order_number: String,
    },
    /// No attempt in session; send the cardholder back to the card form.
    Restart,
}

/// Where the bank's callback sends the cardholder next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Success,
    Fail,
    Restart,
}

/// Outcome of reading the stored result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Show(PaymentResult),
    Restart,
}

/// Observable state of the payment flow for one session.
///
/// Issuing the gate leaves no trace in the session, so a session that has been
/// redirected to its bank still reads as `Collected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum AttemptState {
    Empty,
    Collected,
    Resolved { success: bool },
}

/// Drives one payment attempt per session through collect, gate, callback and
/// outcome.
///
/// Holds no per-session state of its own: every step re-reads the session
/// store, and every fallible computation happens before the session is
/// written.
pub struct PaymentOrchestrator {
    sessions: SessionStoreBox,
    providers: Arc<PaymentProviderFactory>,
    checkout: CheckoutSettings,
}

impl PaymentOrchestrator {
    /// Creates a new `PaymentOrchestrator`.
    ///
    /// # Arguments
    ///
    /// * `sessions` - Where attempts and results are kept between steps.
    /// * `providers` - Verified registry of bank providers.
    /// * `checkout` - Amount, currency and language applied to every request.
    pub fn new(
        sessions: SessionStoreBox,
        providers: Arc<PaymentProviderFactory>,
        checkout: CheckoutSettings,
    ) -> Self {
        Self {
            sessions,
            providers,
            checkout,
        }
    }

    /// Validates submitted card data and stores it as the session's attempt.
    ///
    /// A new attempt replaces any earlier one and discards an unread result.
    #[instrument(skip_all, fields(%session))]
    pub async fn collect(&self, session: &SessionId, form: &PaymentForm) -> Result<Collection> {
        let attempt = match form.validate() {
            Ok(attempt) => attempt,
            Err(errors) => {
                info!(errors = errors.errors.len(), "card data rejected");
                return Ok(Collection::Rejected(errors));
            }
        };

        let encoded = encode(&attempt)?;
        self.sessions
            .remove(session, SessionKey::Result.as_str())
            .await?;
        self.sessions
            .set(session, SessionKey::Attempt.as_str(), encoded)
            .await?;
        info!(bank = %attempt.bank, "card data collected");
        Ok(Collection::Accepted)
    }

    /// Builds the form that sends the cardholder to the bank's 3-D page.
    ///
    /// Read-only with respect to the session, so it can be repeated; each call
    /// gets a fresh order number.
    #[instrument(skip_all, fields(%session))]
    pub async fn issue_gate(&self, session: &SessionId, client_ip: IpAddr) -> Result<Gate> {
        let attempt = self.load::<PaymentAttempt>(session, SessionKey::Attempt).await?;
        let Some(attempt) = attempt else {
            info!("no attempt in session, restarting");
            return Ok(Gate::Restart);
        };

        let bank = attempt.bank;
        let order_number = Uuid::new_v4().to_string();
        let request = PaymentRequest::from_attempt(
            attempt,
            self.checkout.amount,
            client_ip,
            self.checkout.currency_iso_code.as_str(),
            self.checkout.language_iso_code.as_str(),
            order_number.as_str(),
        );

        let provider = self.providers.resolve(bank)?;
        let parameters = provider.build_parameters(&request).inspect_err(|e| {
            tracing::error!(%bank, error = %e, "provider could not build gate parameters")
        })?;
        let form = self.providers.build_redirect_form(parameters)?;

        info!(%bank, order = %order_number, "gate issued");
        Ok(Gate::Redirect { form, order_number })
    }

    /// Handles the bank's return call.
    ///
    /// Only proceeds when an attempt is in the session; otherwise the callback
    /// is spurious or replayed. A payload failing its integrity check is
    /// stored as a failed result flagged as an integrity violation.
    #[instrument(skip_all, fields(%session))]
    pub async fn callback(
        &self,
        session: &SessionId,
        payload: &CallbackPayload,
    ) -> Result<Resolution> {
        let attempt = self.load::<PaymentAttempt>(session, SessionKey::Attempt).await?;
        let Some(attempt) = attempt else {
            warn!("callback without a pending attempt, ignoring");
            return Ok(Resolution::Restart);
        };

        let provider = self.providers.resolve(attempt.bank)?;
        let result = match provider.interpret_callback(payload) {
            Ok(result) => result,
            Err(e) => {
                warn!(bank = %attempt.bank, reason = %e.reason, "callback failed integrity check");
                PaymentResult::integrity_failure(&e)
            }
        };
        let encoded = encode(&result)?;

        self.sessions
            .remove(session, SessionKey::Attempt.as_str())
            .await?;
        self.sessions
            .set(session, SessionKey::Result.as_str(), encoded)
            .await?;

        info!(
            bank = %attempt.bank,
            success = result.success,
            diagnostic = ?result.diagnostic,
            "payment resolved"
        );
        Ok(if result.success {
            Resolution::Success
        } else {
            Resolution::Fail
        })
    }

    /// Hands out the stored result once.
    #[instrument(skip_all, fields(%session))]
    pub async fn outcome(&self, session: &SessionId) -> Result<Outcome> {
        let key = SessionKey::Result.as_str();
        let Some(bytes) = self.sessions.get(session, key).await? else {
            info!("no result in session, restarting");
            return Ok(Outcome::Restart);
        };
        self.sessions.remove(session, key).await?;

        match decode::<PaymentResult>(&bytes) {
            Some(result) => Ok(Outcome::Show(result)),
            None => Ok(Outcome::Restart),
        }
    }

    /// Reports where the session currently stands.
    pub async fn state(&self, session: &SessionId) -> Result<AttemptState> {
        if self
            .load::<PaymentAttempt>(session, SessionKey::Attempt)
            .await?
            .is_some()
        {
            return Ok(AttemptState::Collected);
        }
        Ok(
            match self.load::<PaymentResult>(session, SessionKey::Result).await? {
                Some(result) => AttemptState::Resolved {
                    success: result.success,
                },
                None => AttemptState::Empty,
            },
        )
    }

    /// Drops whatever the payment flow holds for this session.
    #[instrument(skip_all, fields(%session))]
    pub async fn abandon(&self, session: &SessionId) -> Result<()> {
        self.sessions
            .remove(session, SessionKey::Attempt.as_str())
            .await?;
        self.sessions
            .remove(session, SessionKey::Result.as_str())
            .await?;
        Ok(())
    }

    async fn load<T: DeserializeOwned>(
        &self,
        session: &SessionId,
        key: SessionKey,
    ) -> Result<Option<T>> {
        Ok(self
            .sessions
            .get(session, key.as_str())
            .await?
            .and_then(|bytes| decode(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attempt::Field;
    use crate::domain::bank::Bank;
    use crate::domain::payment::{FormFields, PaymentParameters};
    use crate::domain::ports::{PaymentProvider, SessionStore};
    use crate::domain::result::Diagnostic;
    use crate::error::{IntegrityError, PaymentError};
    use crate::infrastructure::in_memory::InMemorySessionStore;
    use rust_decimal_macros::dec;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    /// Approves when the payload says `status=ok`, rejects unsigned payloads.
    #[derive(Default)]
    struct ScriptedProvider {
        requests: Mutex<Vec<PaymentRequest>>,
    }

    impl PaymentProvider for ScriptedProvider {
        fn build_parameters(&self, request: &PaymentRequest) -> Result<PaymentParameters> {
            self.requests.lock().unwrap().push(request.clone());
            let amount = request.total_amount.to_string();
            let fields: FormFields = [
                ("oid", request.order_number.as_str()),
                ("amount", amount.as_str()),
            ]
            .into_iter()
            .collect();
            Ok(PaymentParameters::post("https://bank.example/3d", fields))
        }

        fn interpret_callback(
            &self,
            payload: &CallbackPayload,
        ) -> std::result::Result<PaymentResult, IntegrityError> {
            if payload.get("sig") != Some("valid") {
                return Err(IntegrityError::new("bad signature"));
            }
            Ok(match payload.get("status") {
                Some("ok") => PaymentResult::approved(),
                _ => PaymentResult::failed(Diagnostic::Declined, "declined"),
            })
        }
    }

    struct Harness {
        orchestrator: PaymentOrchestrator,
        store: InMemorySessionStore,
        provider: Arc<ScriptedProvider>,
    }

    fn harness() -> Harness {
        let store = InMemorySessionStore::new();
        let provider = Arc::new(ScriptedProvider::default());
        let factory = Bank::ALL
            .into_iter()
            .fold(PaymentProviderFactory::builder(), |builder, bank| {
                builder.register_shared(bank, provider.clone())
            })
            .build()
            .unwrap();
        let checkout = CheckoutSettings {
            amount: dec!(10.00),
            ..Default::default()
        };
        Harness {
            orchestrator: PaymentOrchestrator::new(
                Box::new(store.clone()),
                Arc::new(factory),
                checkout,
            ),
            store,
            provider,
        }
    }

    fn form() -> PaymentForm {
        PaymentForm {
            card_holder_name: "Ada Lovelace".to_string(),
            card_number: "4111111111111111".to_string(),
            expire_month: "12".to_string(),
            expire_year: "2030".to_string(),
            cvv: "123".to_string(),
            installment: "1".to_string(),
            bank: "halkbank".to_string(),
        }
    }

    fn payload(pairs: &[(&str, &str)]) -> CallbackPayload {
        pairs.iter().copied().collect()
    }

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9))
    }

    #[tokio::test]
    async fn test_collect_rejects_without_writing() {
        let h = harness();
        let session = SessionId::new("s");
        let mut bad = form();
        bad.expire_month = "13".to_string();

        match h.orchestrator.collect(&session, &bad).await.unwrap() {
            Collection::Rejected(errors) => assert!(errors.has(Field::ExpireMonth)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            h.orchestrator.state(&session).await.unwrap(),
            AttemptState::Empty
        );
    }

    #[tokio::test]
    async fn test_gate_uses_server_values() {
        let h = harness();
        let session = SessionId::new("s");
        h.orchestrator.collect(&session, &form()).await.unwrap();

        let Gate::Redirect {
            form: redirect,
            order_number,
        } = h.orchestrator.issue_gate(&session, ip()).await.unwrap()
        else {
            panic!("expected a redirect");
        };
        assert_eq!(redirect.action_url, "https://bank.example/3d");
        assert_eq!(redirect.fields.get("oid"), Some(order_number.as_str()));

        let requests = h.provider.requests.lock().unwrap();
        assert_eq!(requests[0].total_amount, dec!(10.00));
        assert_eq!(requests[0].customer_ip, ip());
        assert_eq!(requests[0].currency_iso_code, "949");
        assert_eq!(requests[0].bank, Bank::HalkBank);
    }

    #[tokio::test]
    async fn test_gate_without_attempt_restarts() {
        let h = harness();
        let gate = h
            .orchestrator
            .issue_gate(&SessionId::new("s"), ip())
            .await
            .unwrap();
        assert_eq!(gate, Gate::Restart);
    }

    #[tokio::test]
    async fn test_undecodable_attempt_is_treated_as_absent() {
        let h = harness();
        let session = SessionId::new("s");
        h.store
            .set(&session, SessionKey::Attempt.as_str(), b"{broken".to_vec())
            .await
            .unwrap();

        assert_eq!(
            h.orchestrator.issue_gate(&session, ip()).await.unwrap(),
            Gate::Restart
        );
        assert_eq!(
            h.orchestrator
                .callback(&session, &payload(&[("sig", "valid")]))
                .await
                .unwrap(),
            Resolution::Restart
        );
    }

    #[tokio::test]
    async fn test_callback_consumes_attempt() {
        let h = harness();
        let session = SessionId::new("s");
        h.orchestrator.collect(&session, &form()).await.unwrap();

        let approved = payload(&[("sig", "valid"), ("status", "ok")]);
        assert_eq!(
            h.orchestrator.callback(&session, &approved).await.unwrap(),
            Resolution::Success
        );
        assert_eq!(
            h.orchestrator.state(&session).await.unwrap(),
            AttemptState::Resolved { success: true }
        );

        // Replaying the same callback finds no attempt.
        assert_eq!(
            h.orchestrator.callback(&session, &approved).await.unwrap(),
            Resolution::Restart
        );
    }

    #[tokio::test]
    async fn test_integrity_failure_dominates() {
        let h = harness();
        let session = SessionId::new("s");
        h.orchestrator.collect(&session, &form()).await.unwrap();

        let forged = payload(&[("sig", "forged"), ("status", "ok")]);
        assert_eq!(
            h.orchestrator.callback(&session, &forged).await.unwrap(),
            Resolution::Fail
        );
        let Outcome::Show(result) = h.orchestrator.outcome(&session).await.unwrap() else {
            panic!("expected a result");
        };
        assert!(!result.success);
        assert_eq!(result.diagnostic, Diagnostic::IntegrityViolation);
    }

    #[tokio::test]
    async fn test_outcome_is_single_use() {
        let h = harness();
        let session = SessionId::new("s");
        h.orchestrator.collect(&session, &form()).await.unwrap();
        h.orchestrator
            .callback(&session, &payload(&[("sig", "valid"), ("status", "no")]))
            .await
            .unwrap();

        let first = h.orchestrator.outcome(&session).await.unwrap();
        assert!(matches!(first, Outcome::Show(ref r) if r.diagnostic == Diagnostic::Declined));
        assert_eq!(
            h.orchestrator.outcome(&session).await.unwrap(),
            Outcome::Restart
        );
        assert_eq!(
            h.orchestrator.state(&session).await.unwrap(),
            AttemptState::Empty
        );
    }

    #[tokio::test]
    async fn test_new_collect_discards_unread_result() {
        let h = harness();
        let session = SessionId::new("s");
        h.orchestrator.collect(&session, &form()).await.unwrap();
        h.orchestrator
            .callback(&session, &payload(&[("sig", "valid"), ("status", "ok")]))
            .await
            .unwrap();

        h.orchestrator.collect(&session, &form()).await.unwrap();
        assert_eq!(
            h.orchestrator.outcome(&session).await.unwrap(),
            Outcome::Restart
        );
        assert_eq!(
            h.orchestrator.state(&session).await.unwrap(),
            AttemptState::Collected
        );
    }

    #[tokio::test]
    async fn test_failed_collect_leaves_no_stale_result() {
        /// Accepts reads and removals, refuses every write.
        struct ReadOnly(InMemorySessionStore);

        #[async_trait::async_trait]
        impl SessionStore for ReadOnly {
            async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Vec<u8>>> {
                self.0.get(session, key).await
            }
            async fn set(&self, _: &SessionId, _: &str, _: Vec<u8>) -> Result<()> {
                Err(PaymentError::Storage("disk full".to_string()))
            }
            async fn remove(&self, session: &SessionId, key: &str) -> Result<()> {
                self.0.remove(session, key).await
            }
        }

        let store = InMemorySessionStore::new();
        let session = SessionId::new("s");
        let earlier = encode(&PaymentResult::approved()).unwrap();
        store
            .set(&session, SessionKey::Result.as_str(), earlier)
            .await
            .unwrap();

        let factory = Bank::ALL
            .into_iter()
            .fold(PaymentProviderFactory::builder(), |builder, bank| {
                builder.register(bank, ScriptedProvider::default())
            })
            .build()
            .unwrap();
        let orchestrator = PaymentOrchestrator::new(
            Box::new(ReadOnly(store.clone())),
            Arc::new(factory),
            CheckoutSettings::default(),
        );

        assert!(matches!(
            orchestrator.collect(&session, &form()).await,
            Err(PaymentError::Storage(_))
        ));
        assert!(
            store
                .get(&session, SessionKey::Result.as_str())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_abandon_clears_session() {
        let h = harness();
        let session = SessionId::new("s");
        h.orchestrator.collect(&session, &form()).await.unwrap();
        h.orchestrator.abandon(&session).await.unwrap();
        assert_eq!(
            h.orchestrator.state(&session).await.unwrap(),
            AttemptState::Empty
        );
    }

    #[tokio::test]
    async fn test_provider_error_keeps_attempt() {
        struct Unconfigured;
        impl PaymentProvider for Unconfigured {
            fn build_parameters(&self, _: &PaymentRequest) -> Result<PaymentParameters> {
                Err(PaymentError::ProviderConfiguration("missing".to_string()))
            }
            fn interpret_callback(
                &self,
                _: &CallbackPayload,
            ) -> std::result::Result<PaymentResult, IntegrityError> {
                Ok(PaymentResult::approved())
            }
        }

        let store = InMemorySessionStore::new();
        let factory = Bank::ALL
            .into_iter()
            .fold(PaymentProviderFactory::builder(), |builder, bank| {
                builder.register(bank, Unconfigured)
            })
            .build()
            .unwrap();
        let orchestrator = PaymentOrchestrator::new(
            Box::new(store.clone()),
            Arc::new(factory),
            CheckoutSettings::default(),
        );
        let session = SessionId::new("s");
        orchestrator.collect(&session, &form()).await.unwrap();

        assert!(matches!(
            orchestrator.issue_gate(&session, ip()).await,
            Err(PaymentError::ProviderConfiguration(_))
        ));
        assert_eq!(
            orchestrator.state(&session).await.unwrap(),
            AttemptState::Collected
        );
    }
}
