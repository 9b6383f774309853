use crate::application::orchestrator::{AttemptState, Resolution};
use crate::domain::attempt::ValidationErrors;
use crate::domain::bank::Bank;
use crate::domain::payment::{FormFields, FormMethod, RedirectForm};
use crate::domain::result::PaymentResult;
use crate::error::Result;
use serde::Serialize;
use serde_json::json;
use std::io::Write;

/// Renders what each step of the payment flow produced.
pub trait Presenter {
    fn redirect(&mut self, form: &RedirectForm, order_number: &str) -> Result<()>;
    fn result(&mut self, result: &PaymentResult) -> Result<()>;
    fn validation_errors(&mut self, errors: &ValidationErrors) -> Result<()>;
    fn resolution(&mut self, resolution: Resolution) -> Result<()>;
    /// The step found nothing to work on; the cardholder goes back to the form.
    fn restart(&mut self) -> Result<()>;
    fn state(&mut self, state: AttemptState) -> Result<()>;
    fn accepted(&mut self) -> Result<()>;
}

#[derive(Serialize)]
struct RedirectView<'a> {
    step: &'static str,
    order_number: &'a str,
    method: FormMethod,
    action_url: &'a str,
    fields: &'a FormFields,
}

/// Writes one JSON document per line to any `Write` sink.
pub struct JsonPresenter<W: Write> {
    writer: W,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn banks(&mut self) -> Result<()> {
        let banks: Vec<_> = Bank::ALL
            .iter()
            .map(|bank| json!({ "code": bank.code(), "name": bank.display_name() }))
            .collect();
        self.emit(&json!({ "banks": banks }))
    }

    fn emit<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn redirect(&mut self, form: &RedirectForm, order_number: &str) -> Result<()> {
        // Serialized directly so the fields keep the order the bank expects.
        self.emit(&RedirectView {
            step: "redirect",
            order_number,
            method: form.method,
            action_url: &form.action_url,
            fields: &form.fields,
        })
    }

    fn result(&mut self, result: &PaymentResult) -> Result<()> {
        self.emit(&json!({ "step": "outcome", "result": result }))
    }

    fn validation_errors(&mut self, errors: &ValidationErrors) -> Result<()> {
        self.emit(&json!({ "step": "collect", "accepted": false, "errors": errors.errors }))
    }

    fn resolution(&mut self, resolution: Resolution) -> Result<()> {
        self.emit(&json!({ "step": "callback", "route": resolution }))
    }

    fn restart(&mut self) -> Result<()> {
        self.emit(&json!({ "route": "collect" }))
    }

    fn state(&mut self, state: AttemptState) -> Result<()> {
        self.emit(&state)
    }

    fn accepted(&mut self) -> Result<()> {
        self.emit(&json!({ "step": "collect", "accepted": true }))
    }
}
