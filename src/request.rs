use std::fmt;

use http::{HeaderMap, Method};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use url::Url;

/// A request observed by a backend and recorded in its invocation journal.
///
/// Verification never mutates the journal; a `ReceivedRequest` is a read-only
/// snapshot of what arrived on the wire, with enough of the original request
/// to re-evaluate a [`RequestMatcher`] against it retroactively.
///
/// [`RequestMatcher`]: crate::RequestMatcher
///
/// ### Implementation notes:
/// We can't match against a `hyper::Request` directly: extracting the body
/// consumes it. The embedded backend performs the extraction once, when the
/// request arrives, and every matcher then gets an immutable reference.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    /// Deserialize the recorded body as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub(crate) async fn from_hyper(request: hyper::Request<hyper::body::Incoming>) -> Self {
        let (parts, body) = request.into_parts();
        let url = match parts.uri.authority() {
            Some(_) => parts.uri.to_string(),
            None => format!("http://localhost{}", parts.uri),
        }
        .parse()
        .expect("Failed to parse request URI.");

        let body = body
            .collect()
            .await
            .expect("Failed to read request body.")
            .to_bytes();

        Self {
            url,
            method: parts.method,
            headers: parts.headers,
            body: body.to_vec(),
        }
    }
}

/// One entry of a backend's invocation journal: the request, whether any
/// active rule answered it, and when it arrived.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub request: ReceivedRequest,
    /// `false` when the request fell through to the default 404 response.
    pub matched: bool,
    pub received_at: std::time::SystemTime,
}

impl fmt::Display for ReceivedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.method, self.url)?;
        for name in self.headers.keys() {
            let values = self
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>();
            writeln!(f, "{}: {}", name, values.join(","))?;
        }
        if self.body.is_empty() {
            Ok(())
        } else if let Ok(body) = std::str::from_utf8(&self.body) {
            writeln!(f, "{}", body)
        } else {
            writeln!(
                f,
                "Body is likely binary (invalid utf-8) size is {} bytes",
                self.body.len()
            )
        }
    }
}
