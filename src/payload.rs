use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// The closed set of payload representations understood by backend encoders.
///
/// Keeping the enumeration closed (rather than dispatching through a trait
/// per backend) lets every consumer match exhaustively on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Empty,
    Text,
    Bytes,
    Json,
}

/// A request or response body, tagged with its [`PayloadFormat`].
///
/// A payload can be assembled from literals, from a serializable value or
/// from a file, and - when it holds JSON - individual values can be replaced
/// in place with [`override_path`].
///
/// ```rust
/// use stubkit::Payload;
///
/// let payload = Payload::json_str(r#"{"message":"original"}"#)
///     .unwrap()
///     .override_path("message", &"overridden")
///     .unwrap();
///
/// assert_eq!(payload.data(), br#"{"message":"overridden"}"#);
/// ```
///
/// [`override_path`]: Payload::override_path
#[derive(Debug, Clone)]
pub struct Payload {
    bytes: Vec<u8>,
    format: PayloadFormat,
}

impl Payload {
    /// The absent payload. Matches any body when used as a request body
    /// matcher; renders as an empty response body.
    pub fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            format: PayloadFormat::Empty,
        }
    }

    /// A plain-text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            bytes: text.into().into_bytes(),
            format: PayloadFormat::Text,
        }
    }

    /// A raw binary payload.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: PayloadFormat::Bytes,
        }
    }

    /// A JSON payload from anything serializable.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| Error::Payload(format!("failed to serialize value to JSON: {}", e)))?;
        Ok(Self {
            bytes,
            format: PayloadFormat::Json,
        })
    }

    /// A JSON payload from a string, validated eagerly.
    pub fn json_str(json: impl AsRef<str>) -> Result<Self, Error> {
        let json = json.as_ref();
        serde_json::from_str::<Value>(json)
            .map_err(|e| Error::Payload(format!("not valid JSON: {}", e)))?;
        Ok(Self {
            bytes: json.as_bytes().to_vec(),
            format: PayloadFormat::Json,
        })
    }

    /// A JSON payload from an already-parsed value.
    pub fn json_value(value: Value) -> Self {
        Self {
            bytes: serde_json::to_vec(&value).expect("Value serialization is infallible"),
            format: PayloadFormat::Json,
        }
    }

    /// Load a payload from a file. The payload is tagged as raw bytes; use
    /// [`as_text`] or [`as_json`] to re-tag it.
    ///
    /// [`as_text`]: Payload::as_text
    /// [`as_json`]: Payload::as_json
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Error::PayloadFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            bytes,
            format: PayloadFormat::Bytes,
        })
    }

    /// Re-tag the payload as plain text. Fails if the bytes are not UTF-8.
    pub fn as_text(self) -> Result<Self, Error> {
        std::str::from_utf8(&self.bytes)
            .map_err(|e| Error::Payload(format!("not valid UTF-8 text: {}", e)))?;
        Ok(Self {
            bytes: self.bytes,
            format: PayloadFormat::Text,
        })
    }

    /// Re-tag the payload as JSON. Fails if the bytes are not valid JSON.
    pub fn as_json(self) -> Result<Self, Error> {
        serde_json::from_slice::<Value>(&self.bytes)
            .map_err(|e| Error::Payload(format!("not valid JSON: {}", e)))?;
        Ok(Self {
            bytes: self.bytes,
            format: PayloadFormat::Json,
        })
    }

    /// Re-tag the payload as raw bytes.
    pub fn as_raw(self) -> Self {
        Self {
            bytes: self.bytes,
            format: PayloadFormat::Bytes,
        }
    }

    /// Replace the value at `selector` with `value`, in place.
    ///
    /// The selector is a JSON-path-style dotted expression with an optional
    /// `$.` prefix and `[idx]` array steps - e.g. `message`,
    /// `$.items[0].name`. Only existing locations can be overridden; a
    /// selector that misses, or a payload that is not valid JSON, fails with
    /// [`Error::Payload`].
    pub fn override_path<T: Serialize>(self, selector: &str, value: &T) -> Result<Self, Error> {
        if self.format != PayloadFormat::Json {
            return Err(Error::Payload(
                "override requires a JSON payload - tag it with `as_json` first".into(),
            ));
        }
        let mut root: Value = serde_json::from_slice(&self.bytes)
            .map_err(|e| Error::Payload(format!("not valid JSON: {}", e)))?;
        let new_value = serde_json::to_value(value)
            .map_err(|e| Error::Payload(format!("failed to serialize override value: {}", e)))?;

        let target = select_mut(&mut root, selector)?;
        *target = new_value;

        Ok(Self {
            bytes: serde_json::to_vec(&root).expect("Value serialization is infallible"),
            format: PayloadFormat::Json,
        })
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.format == PayloadFormat::Empty
    }
}

enum Step {
    Key(String),
    Index(usize),
}

fn parse_selector(selector: &str) -> Result<Vec<Step>, Error> {
    let trimmed = selector
        .strip_prefix("$.")
        .or_else(|| selector.strip_prefix('$'))
        .unwrap_or(selector);
    if trimmed.is_empty() {
        return Err(Error::Payload(format!("empty selector `{}`", selector)));
    }

    let mut steps = Vec::new();
    for segment in trimmed.split('.') {
        let (key, indices) = match segment.find('[') {
            Some(at) => segment.split_at(at),
            None => (segment, ""),
        };
        if !key.is_empty() {
            steps.push(Step::Key(key.to_string()));
        }
        for index in indices.split('[').filter(|s| !s.is_empty()) {
            let index = index.strip_suffix(']').ok_or_else(|| {
                Error::Payload(format!("malformed array step in selector `{}`", selector))
            })?;
            let index = index.parse::<usize>().map_err(|_| {
                Error::Payload(format!("malformed array step in selector `{}`", selector))
            })?;
            steps.push(Step::Index(index));
        }
    }
    Ok(steps)
}

fn select_mut<'a>(root: &'a mut Value, selector: &str) -> Result<&'a mut Value, Error> {
    let mut current = root;
    for step in parse_selector(selector)? {
        current = match step {
            Step::Key(key) => current.get_mut(&key).ok_or_else(|| {
                Error::Payload(format!("selector `{}` does not match the payload", selector))
            })?,
            Step::Index(index) => current.get_mut(index).ok_or_else(|| {
                Error::Payload(format!("selector `{}` does not match the payload", selector))
            })?,
        };
    }
    Ok(current)
}
