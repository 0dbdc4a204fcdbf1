use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use http::{HeaderName, Method};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::Error;
use crate::payload::{Payload, PayloadFormat};
use crate::request::ReceivedRequest;

static PATH_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^/}]+)\}").expect("Failed to compile path parameter regex"));

/// How the request method is constrained.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MethodMatcher {
    /// The `ANY` wildcard - every method matches.
    Any,
    Exact(Method),
}

/// How the request body is constrained.
///
/// A matcher without a body constraint matches any body.
#[derive(Debug, Clone)]
pub enum BodyMatcher {
    /// The body must equal these bytes exactly.
    Bytes(Vec<u8>),
    /// The body must equal this text exactly.
    Text(String),
    /// The body must be JSON semantically covering this value: object fields
    /// are compared ignoring any extra fields in the request, arrays are
    /// compared ignoring element order.
    Json(Value),
}

/// The canonical description of an expected request: method, path template,
/// path parameters, query parameters, headers, cookies and an optional body
/// constraint.
///
/// A `RequestMatcher` is an immutable value - build one with
/// [`RequestMatcher::builder`]. Fields left unset always match, so the
/// default matcher matches every request.
///
/// Invariant, checked at build time: the path-parameter keys are exactly the
/// set of `{name}` placeholders in the path template - no more, no fewer.
#[derive(Debug, Clone)]
pub struct RequestMatcher {
    method: MethodMatcher,
    path_template: Option<String>,
    path_params: BTreeMap<String, String>,
    // The template with every placeholder substituted, ready for comparison
    // against an incoming request path.
    rendered_path: Option<String>,
    query_params: BTreeMap<String, Vec<String>>,
    headers: Vec<(HeaderName, String)>,
    cookies: BTreeMap<String, String>,
    body: Option<BodyMatcher>,
}

impl RequestMatcher {
    /// Start building a `RequestMatcher`.
    pub fn builder() -> RequestMatcherBuilder {
        RequestMatcherBuilder::new()
    }

    /// The path template, with placeholders substituted, that incoming
    /// request paths are compared against. `None` when the matcher accepts
    /// any path.
    pub fn path(&self) -> Option<&str> {
        self.rendered_path.as_deref()
    }

    /// The raw path template, placeholders included, as given to the builder.
    pub fn path_template(&self) -> Option<&str> {
        self.path_template.as_deref()
    }

    /// The placeholder bindings for the path template.
    pub fn path_params(&self) -> &BTreeMap<String, String> {
        &self.path_params
    }

    /// The expected method, or `None` for the `ANY` wildcard.
    pub fn method(&self) -> Option<&Method> {
        match &self.method {
            MethodMatcher::Any => None,
            MethodMatcher::Exact(m) => Some(m),
        }
    }

    pub fn query_params(&self) -> &BTreeMap<String, Vec<String>> {
        &self.query_params
    }

    pub fn headers(&self) -> &[(HeaderName, String)] {
        &self.headers
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn body(&self) -> Option<&BodyMatcher> {
        self.body.as_ref()
    }

    /// Evaluate the matcher against a recorded request.
    ///
    /// Every populated field must match; unset fields always do. This is the
    /// same predicate backends use to route live traffic and the verification
    /// engine uses to filter the journal.
    pub fn matches(&self, request: &ReceivedRequest) -> bool {
        if let MethodMatcher::Exact(method) = &self.method {
            if request.method != *method {
                return false;
            }
        }

        if let Some(path) = &self.rendered_path {
            if request.url.path() != path {
                return false;
            }
        }

        for (name, expected) in &self.query_params {
            let mut actual: Vec<String> = request
                .url
                .query_pairs()
                .filter(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .collect();
            let mut expected = expected.clone();
            actual.sort();
            expected.sort();
            if actual != expected {
                return false;
            }
        }

        for (name, value) in &self.headers {
            let found = request
                .headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(',').map(str::trim))
                .any(|v| v == value);
            if !found {
                return false;
            }
        }

        if !self.cookies.is_empty() {
            let cookies = request_cookies(request);
            for (name, value) in &self.cookies {
                if cookies.get(name) != Some(value) {
                    return false;
                }
            }
        }

        match &self.body {
            None => true,
            Some(BodyMatcher::Bytes(bytes)) => request.body == *bytes,
            Some(BodyMatcher::Text(text)) => request.body == text.as_bytes(),
            Some(BodyMatcher::Json(expected)) => {
                match serde_json::from_slice::<Value>(&request.body) {
                    Ok(actual) => json_covers(&actual, expected),
                    Err(_) => false,
                }
            }
        }
    }
}

/// `true` when `actual` semantically covers `expected`: extra object fields
/// in `actual` are ignored, array elements are matched in any order.
fn json_covers(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, ev)| actual.get(key).is_some_and(|av| json_covers(av, ev))),
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|ev| actual.iter().any(|av| json_covers(av, ev))),
        _ => actual == expected,
    }
}

fn request_cookies(request: &ReceivedRequest) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for header in request.headers.get_all(http::header::COOKIE) {
        if let Ok(header) = header.to_str() {
            for pair in header.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    cookies.insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }
    }
    cookies
}

/// A fluent builder for [`RequestMatcher`].
///
/// All setters are infallible; [`build`] validates the assembled matcher and
/// is where malformed input surfaces, before anything touches a backend.
///
/// [`build`]: RequestMatcherBuilder::build
#[derive(Debug, Clone, Default)]
pub struct RequestMatcherBuilder {
    method: Option<String>,
    path_template: Option<String>,
    path_params: BTreeMap<String, String>,
    query_params: BTreeMap<String, Vec<String>>,
    headers: Vec<(String, String)>,
    cookies: BTreeMap<String, String>,
    body: Option<Payload>,
}

impl RequestMatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect this HTTP method, case-insensitively. `"ANY"` matches every
    /// method.
    pub fn method(mut self, method: impl AsRef<str>) -> Self {
        self.method = Some(method.as_ref().to_ascii_uppercase());
        self
    }

    /// Expect this path. The template may contain `{name}` placeholders;
    /// every placeholder must be bound with [`path_param`].
    ///
    /// [`path_param`]: RequestMatcherBuilder::path_param
    pub fn path(mut self, template: impl Into<String>) -> Self {
        self.path_template = Some(template.into());
        self
    }

    /// Bind a path-template placeholder to its expected literal value.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Expect a query parameter with this value. Call repeatedly with the
    /// same name to expect multiple values for one parameter.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Expect a header with this value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Expect a cookie with this value.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Constrain the request body with a [`Payload`]. An empty payload
    /// leaves the body unconstrained; text and bytes payloads require an
    /// exact match; a JSON payload matches semantically, ignoring extra
    /// fields and array order.
    pub fn body(mut self, payload: Payload) -> Self {
        self.body = Some(payload);
        self
    }

    /// Validate and build the matcher.
    pub fn build(self) -> Result<RequestMatcher, Error> {
        let method = match self.method.as_deref() {
            None | Some("ANY") => MethodMatcher::Any,
            Some(raw) => MethodMatcher::Exact(
                Method::from_str(raw)
                    .map_err(|_| Error::Validation(format!("`{}` is not a valid HTTP method", raw)))?,
            ),
        };

        let rendered_path = match &self.path_template {
            None => {
                if let Some(name) = self.path_params.keys().next() {
                    return Err(Error::Validation(format!(
                        "path parameter `{}` given, but no path template was set",
                        name
                    )));
                }
                None
            }
            Some(template) => Some(render_path(template, &self.path_params)?),
        };

        let mut headers = Vec::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            let name = HeaderName::from_str(&name)
                .map_err(|_| Error::Validation(format!("`{}` is not a valid header name", name)))?;
            headers.push((name, value));
        }

        let body = match self.body {
            None => None,
            Some(payload) => body_matcher(payload)?,
        };

        Ok(RequestMatcher {
            method,
            path_template: self.path_template,
            path_params: self.path_params,
            rendered_path,
            query_params: self.query_params,
            headers,
            cookies: self.cookies,
            body,
        })
    }
}

fn body_matcher(payload: Payload) -> Result<Option<BodyMatcher>, Error> {
    match payload.format() {
        PayloadFormat::Empty => Ok(None),
        PayloadFormat::Bytes => Ok(Some(BodyMatcher::Bytes(payload.into_bytes()))),
        PayloadFormat::Text => {
            let text = String::from_utf8(payload.into_bytes())
                .map_err(|e| Error::Payload(format!("not valid UTF-8 text: {}", e)))?;
            Ok(Some(BodyMatcher::Text(text)))
        }
        PayloadFormat::Json => {
            let value = serde_json::from_slice(payload.data())
                .map_err(|e| Error::Payload(format!("not valid JSON: {}", e)))?;
            Ok(Some(BodyMatcher::Json(value)))
        }
    }
}

fn render_path(template: &str, params: &BTreeMap<String, String>) -> Result<String, Error> {
    if template.contains('?') {
        return Err(Error::Validation(format!(
            "the path `{}` contains a `?`: use `query_param` to match on query parameters",
            template
        )));
    }

    let placeholders: BTreeSet<&str> = PATH_PARAM
        .captures_iter(template)
        .map(|c| c.get(1).expect("capture group 1 always present").as_str())
        .collect();

    let missing: Vec<&str> = placeholders
        .iter()
        .filter(|name| !params.contains_key(**name))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(Error::Validation(format!(
            "missing value for path parameter(s) {:?} in URL template `{}`",
            missing, template
        )));
    }

    let unknown: Vec<&str> = params
        .keys()
        .filter(|name| !placeholders.contains(name.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(Error::Validation(format!(
            "path parameter(s) {:?} do not appear in URL template `{}`",
            unknown, template
        )));
    }

    let mut rendered = template.to_string();
    for (name, value) in params {
        rendered = rendered.replace(&format!("{{{}}}", name), value);
    }

    // Prepend "/" to the path if missing.
    if rendered.starts_with('/') {
        Ok(rendered)
    } else {
        Ok(format!("/{}", rendered))
    }
}
