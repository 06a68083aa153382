use crate::error::{ClientError, Result};
use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Sent as `multipart/form-data` exactly as given.
    Multipart(MultipartPayload),
}

#[derive(Debug, Clone)]
enum PartValue {
    Text(String),
    File { bytes: Bytes, file_name: Option<String>, mime: Option<String> },
}

#[derive(Debug, Clone)]
struct Part {
    name: String,
    value: PartValue,
}

/// Multipart form fields held as owned bytes so a request can be sent more than once.
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    parts: Vec<Part>,
}

impl MultipartPayload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part { name: name.into(), value: PartValue::Text(value.into()) });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        file_name: Option<String>,
        mime: Option<String>,
    ) -> Self {
        self.parts.push(Part { name: name.into(), value: PartValue::File { bytes: bytes.into(), file_name, mime } });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn into_form(self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for Part { name, value } in self.parts {
            form = match value {
                PartValue::Text(text) => form.text(name, text),
                PartValue::File { bytes, file_name, mime } => {
                    let mut part = reqwest::multipart::Part::bytes(bytes.to_vec());
                    if let Some(file_name) = file_name {
                        part = part.file_name(file_name);
                    }
                    if let Some(mime) = mime {
                        part = part
                            .mime_str(&mime)
                            .map_err(|_| ClientError::unknown(format!("Invalid content type for {name}: {mime}")))?;
                    }
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

/// Everything needed to perform one call. Built per call and never persisted.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: RequestBody,
    pub(crate) timeout: Option<Duration>,
    pub(crate) account_lookup: bool,
}

impl ApiRequest {
    /// `url` is either absolute or a path relative to the configured base URL.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
            account_lookup: false,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    #[must_use]
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Serializes `body` as the JSON payload.
    ///
    /// # Errors
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn serialize<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::unknown(format!("Could not encode request body: {e}")))?;
        Ok(self.json(value))
    }

    #[must_use]
    pub fn multipart(mut self, payload: MultipartPayload) -> Self {
        self.body = RequestBody::Multipart(payload);
        self
    }

    /// Adds a header that takes precedence over the executor's defaults.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Overrides the executor's deadline for this call.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks the call as an account lookup, where a 404 means the credentials
    /// do not identify an account.
    #[must_use]
    pub fn account_lookup(mut self) -> Self {
        self.account_lookup = true;
        self
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub const fn body(&self) -> &RequestBody {
        &self.body
    }
}
