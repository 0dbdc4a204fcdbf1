use std::convert::TryInto;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use serde::Serialize;

use crate::payload::{Payload, PayloadFormat};

/// The blueprint for the response served when a stub matches an incoming
/// request: status code, headers, cookies, an optional fixed delay and a
/// [`Payload`] body.
///
/// [`Payload`]: crate::Payload
#[derive(Debug, Clone)]
pub struct ResponseDefinition {
    status_code: StatusCode,
    headers: HeaderMap,
    mime: String,
    body: Payload,
    delay: Option<Duration>,
}

// This crate is meant for testing - failures here are most likely permanent
// mistakes rather than conditions to recover from. Hence the widening
// conversions below prefer to panic over returning `Result`s, pushing less
// conversion burden on the user. The fallible seams (stub completion,
// verification) return `Result` instead - see `Error`.
impl ResponseDefinition {
    /// Start building a `ResponseDefinition` specifying the status code of the response.
    pub fn new<S>(s: S) -> Self
    where
        S: TryInto<StatusCode>,
        <S as TryInto<StatusCode>>::Error: std::fmt::Debug,
    {
        let status_code = s.try_into().expect("Failed to convert into status code.");
        Self {
            status_code,
            headers: HeaderMap::new(),
            mime: String::new(),
            body: Payload::empty(),
            delay: None,
        }
    }

    /// The fixed response served when no stub matches, and by exhausted
    /// bounded stubs: 404 with an empty body.
    pub fn not_found() -> Self {
        Self::new(404)
    }

    /// Append a header `value` to the list of headers with `key` as header name.
    ///
    /// Unlike `insert_header`, this function will not override the contents of a header:
    /// - if there are no header values with `key` as header name, it will insert one;
    /// - if there are already some values with `key` as header name, it will append to the
    ///   existing list.
    pub fn append_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert into header name.");
        let value = value
            .try_into()
            .expect("Failed to convert into header value.");
        self.headers.append(key, value);
        self
    }

    /// Insert a header `value` with `key` as header name.
    ///
    /// This function will override the contents of a header:
    /// - if there are no header values with `key` as header name, it will insert one;
    /// - if there are already some values with `key` as header name, it will drop them and
    ///   start a new list of header values, containing only `value`.
    pub fn insert_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert into header name.");
        let value = value
            .try_into()
            .expect("Failed to convert into header value.");
        self.headers.insert(key, value);
        self
    }

    /// Add a cookie to the response, rendered as a `Set-Cookie` header pair.
    pub fn set_cookie(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.append_header(
            http::header::SET_COOKIE,
            format!("{}={}", name.as_ref(), value.as_ref()).as_str(),
        )
    }

    /// Set the response body with bytes.
    ///
    /// It sets "Content-Type" to "application/octet-stream".
    pub fn set_body_bytes<B>(mut self, body: B) -> Self
    where
        B: TryInto<Vec<u8>>,
        <B as TryInto<Vec<u8>>>::Error: std::fmt::Debug,
    {
        let body = body.try_into().expect("Failed to convert into body.");
        self.body = Payload::bytes(body);
        self.mime = "application/octet-stream".to_string();
        self
    }

    /// Set the response body from a JSON-serializable value.
    ///
    /// It sets "Content-Type" to "application/json".
    pub fn set_body_json<B: Serialize>(mut self, body: B) -> Self {
        self.body = Payload::json(&body).expect("Failed to convert into body.");
        self.mime = "application/json".to_string();
        self
    }

    /// Set the response body to a string.
    ///
    /// It sets "Content-Type" to "text/plain".
    pub fn set_body_string<T>(mut self, body: T) -> Self
    where
        T: TryInto<String>,
        <T as TryInto<String>>::Error: std::fmt::Debug,
    {
        let body = body.try_into().expect("Failed to convert into body.");
        self.body = Payload::text(body);
        self.mime = "text/plain".to_string();
        self
    }

    /// Set a raw response body. The mime type needs to be set because the
    /// raw body could be of any type.
    pub fn set_body_raw<B>(mut self, body: B, mime: &str) -> Self
    where
        B: TryInto<Vec<u8>>,
        <B as TryInto<Vec<u8>>>::Error: std::fmt::Debug,
    {
        let body = body.try_into().expect("Failed to convert into body.");
        self.body = Payload::bytes(body);
        self.mime = mime.to_string();
        self
    }

    /// Set the response body from a [`Payload`], deriving the content type
    /// from its format unless one was set explicitly.
    pub fn set_body(mut self, payload: Payload) -> Self {
        if self.mime.is_empty() {
            self.mime = match payload.format() {
                PayloadFormat::Empty => String::new(),
                PayloadFormat::Text => "text/plain".to_string(),
                PayloadFormat::Bytes => "application/octet-stream".to_string(),
                PayloadFormat::Json => "application/json".to_string(),
            };
        }
        self.body = payload;
        self
    }

    /// Override the content type derived from the body payload.
    pub fn content_type(mut self, mime: &str) -> Self {
        self.mime = mime.to_string();
        self
    }

    /// Introduce an artificial delay before the response is served, to
    /// simulate a server with non-negligible latency.
    pub fn set_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status_code
    }

    pub fn delay(&self) -> &Option<Duration> {
        &self.delay
    }

    /// Generate a response from the definition.
    pub fn generate_response(&self) -> Response<Full<Bytes>> {
        let mut response = Response::builder().status(self.status_code);

        let mut headers = self.headers.clone();
        // Set content-type, if needed
        if !self.mime.is_empty() {
            headers.insert(
                http::header::CONTENT_TYPE,
                self.mime.parse().expect("Failed to parse mime type."),
            );
        }
        *response
            .headers_mut()
            .expect("Response builder is never in an errored state here.") = headers;

        let body = self.body.data().to_vec();
        response
            .body(Full::new(Bytes::from(body)))
            .expect("Failed to build response.")
    }
}
