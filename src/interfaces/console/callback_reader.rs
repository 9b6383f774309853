use crate::domain::payment::CallbackPayload;
use crate::error::Result;
use std::io::Read;

/// Reads a bank callback body in `application/x-www-form-urlencoded` form.
///
/// The same encoding covers both a posted form and a query string, so either
/// can be fed in as-is. Repeated names keep their last value.
pub struct CallbackReader<R: Read> {
    source: R,
}

impl<R: Read> CallbackReader<R> {
    /// Creates a new `CallbackReader` from any `Read` source (e.g. Stdin).
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Consumes the source and decodes it into a payload.
    pub fn payload(mut self) -> Result<CallbackPayload> {
        let mut body = Vec::new();
        self.source.read_to_end(&mut body)?;
        Ok(parse_payload(&body))
    }
}

fn trim_query_prefix(body: &[u8]) -> &[u8] {
    let body = body.trim_ascii();
    body.strip_prefix(b"?").unwrap_or(body)
}

/// Decodes a form body or query string; surrounding whitespace and a leading
/// `?` are ignored.
pub fn parse_payload(body: &[u8]) -> CallbackPayload {
    url::form_urlencoded::parse(trim_query_prefix(body))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}
