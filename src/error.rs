use crate::verification::VerificationFailure;

/// An error reported by a backend adapter while talking to its matching
/// engine.
///
/// The embedded [`LocalMockServer`] never produces one; adapters for remote
/// engines surface transport and protocol failures through it.
///
/// [`LocalMockServer`]: crate::LocalMockServer
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Anything that can go wrong registering, verifying or tearing down stubs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stub description is malformed: an unbound path parameter, an
    /// invalid HTTP method or header name, inverted `between` bounds.
    /// Raised before anything reaches a backend.
    #[error("invalid stub: {0}")]
    Validation(String),

    /// A verification did not hold; carries the expectation, the observed
    /// count and the journaled requests.
    #[error(transparent)]
    Verification(#[from] VerificationFailure),

    /// The backend failed to execute an operation.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A payload could not be assembled or transformed.
    #[error("invalid payload: {0}")]
    Payload(String),

    /// A payload file could not be read.
    #[error("failed to read payload file `{path}`")]
    PayloadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// One or more stubs could not be removed during teardown. Removal is
    /// attempted for every stub regardless; the failures are collected here.
    #[error("failed to tear down mocks: {}", format_teardown(.0))]
    Teardown(Vec<BackendError>),
}

fn format_teardown(failures: &[BackendError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
