use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::backend::{MockBackend, RuleId};
use crate::compiler::{InvocationBudget, StubCompiler};
use crate::error::Error;
use crate::handle::StubHandle;
use crate::matcher::RequestMatcherBuilder;
use crate::payload::Payload;
use crate::response::ResponseDefinition;

/// The entry point for registering stubs against a backend and tearing them
/// all down between tests.
///
/// The registry remembers every stub it registered, so [`clear_mocks`] can
/// remove exactly those rules (and nothing registered by other parties) and
/// wipe the invocation journal.
///
/// [`clear_mocks`]: MockRegistry::clear_mocks
pub struct MockRegistry {
    backend: Arc<dyn MockBackend>,
    // One entry per registered stub, so teardown can report which stubs
    // failed to unregister.
    live: Mutex<Vec<Vec<RuleId>>>,
}

impl MockRegistry {
    pub fn new<B: MockBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            live: Mutex::new(Vec::new()),
        }
    }

    /// Start describing a stub: what to match, what to answer, how many
    /// times.
    pub fn stub(&self) -> StubBuilder<'_> {
        StubBuilder {
            registry: self,
            matcher: RequestMatcherBuilder::new(),
            response: ResponseDefinition::new(200),
        }
    }

    /// Remove every stub registered through this registry and clear the
    /// backend's invocation journal.
    ///
    /// Removal is attempted for each stub even if an earlier one fails; all
    /// failures are aggregated into [`Error::Teardown`].
    pub async fn clear_mocks(&self) -> Result<(), Error> {
        let stubs: Vec<Vec<RuleId>> = self.live.lock().await.drain(..).collect();

        let mut failures = Vec::new();
        for rule_ids in &stubs {
            if let Err(e) = self.backend.remove_rules(rule_ids).await {
                failures.push(e);
            }
        }
        if let Err(e) = self.backend.reset_journal().await {
            failures.push(e);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Teardown(failures))
        }
    }
}

/// Fluent description of a single stub.
///
/// Matching criteria and the response are accumulated on the builder; one of
/// the finishers ([`unlimited`], [`once`], [`exactly`], [`times`]) validates
/// the criteria, registers the stub and returns a [`StubHandle`].
///
/// [`unlimited`]: StubBuilder::unlimited
/// [`once`]: StubBuilder::once
/// [`exactly`]: StubBuilder::exactly
/// [`times`]: StubBuilder::times
pub struct StubBuilder<'a> {
    registry: &'a MockRegistry,
    matcher: RequestMatcherBuilder,
    response: ResponseDefinition,
}

impl<'a> StubBuilder<'a> {
    /// Match on the HTTP method. `"ANY"` (the default) matches every method.
    pub fn method(mut self, method: impl AsRef<str>) -> Self {
        self.matcher = self.matcher.method(method);
        self
    }

    /// Match on the request path. The path may contain `{name}` placeholders,
    /// filled in with [`path_param`].
    ///
    /// [`path_param`]: StubBuilder::path_param
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.matcher = self.matcher.path(path);
        self
    }

    /// Supply the value for a `{name}` placeholder in the path template.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.matcher = self.matcher.path_param(name, value);
        self
    }

    /// Require a query parameter. Call repeatedly with the same name to
    /// require multiple values for it.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.matcher = self.matcher.query_param(name, value);
        self
    }

    /// Require a header with the given value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.matcher = self.matcher.header(name, value);
        self
    }

    /// Require a cookie with the given value.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.matcher = self.matcher.cookie(name, value);
        self
    }

    /// Require a request body. Text and byte payloads are compared exactly;
    /// JSON payloads match structurally, ignoring extra fields and array
    /// order.
    pub fn body(mut self, payload: Payload) -> Self {
        self.matcher = self.matcher.body(payload);
        self
    }

    /// Require an exact plain-text request body.
    pub fn body_text(self, text: impl Into<String>) -> Self {
        self.body(Payload::text(text))
    }

    /// Require an exact binary request body.
    pub fn body_bytes(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body(Payload::bytes(bytes))
    }

    /// Require a JSON request body matching `value` structurally.
    pub fn body_json<T: Serialize>(self, value: &T) -> Self {
        let payload = Payload::json(value).expect("Failed to serialize body to JSON.");
        self.body(payload)
    }

    /// Set the response served while the stub's budget lasts.
    pub fn respond(mut self, response: ResponseDefinition) -> Self {
        self.response = response;
        self
    }

    /// Register the stub with no invocation limit.
    pub async fn unlimited(self) -> Result<StubHandle, Error> {
        self.times(InvocationBudget::Unlimited).await
    }

    /// Register the stub to answer a single matching request.
    pub async fn once(self) -> Result<StubHandle, Error> {
        self.times(InvocationBudget::Once).await
    }

    /// Register the stub to answer exactly `n` matching requests.
    pub async fn exactly(self, n: u64) -> Result<StubHandle, Error> {
        self.times(InvocationBudget::Exactly(n)).await
    }

    /// Register the stub with an explicit [`InvocationBudget`].
    ///
    /// The matching criteria are validated before anything reaches the
    /// backend; an incomplete path template or a malformed header name fails
    /// here with [`Error::Validation`].
    pub async fn times(self, budget: InvocationBudget) -> Result<StubHandle, Error> {
        let matcher = self.matcher.build()?;
        let backend = Arc::clone(&self.registry.backend);

        let rule_ids =
            StubCompiler::compile(backend.as_ref(), matcher.clone(), self.response, budget).await?;
        self.registry.live.lock().await.push(rule_ids.clone());

        Ok(StubHandle::new(backend, matcher, rule_ids))
    }
}

impl std::fmt::Debug for MockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRegistry").finish_non_exhaustive()
    }
}
