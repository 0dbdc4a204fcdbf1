use std::sync::Arc;
use std::time::Duration;

use crate::backend::{MockBackend, RuleId};
use crate::error::Error;
use crate::expectation::Expectation;
use crate::matcher::RequestMatcher;
use crate::verification;

const DEFAULT_AWAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// A registered stub, ready to be verified.
///
/// Obtained from the [`StubBuilder`] finishers. Verification counts every
/// journaled request matching the stub's request pattern, including requests
/// served with 404 after a bounded stub ran out of budget.
///
/// By default a verification checks the count once. Chain [`wait`] (3 second
/// timeout) or [`wait_at_most`] to poll until the expectation is met, for
/// traffic generated by code that is still in flight.
///
/// [`StubBuilder`]: crate::StubBuilder
/// [`wait`]: StubHandle::wait
/// [`wait_at_most`]: StubHandle::wait_at_most
pub struct StubHandle {
    backend: Arc<dyn MockBackend>,
    matcher: RequestMatcher,
    rule_ids: Vec<RuleId>,
    await_timeout: Option<Duration>,
}

impl std::fmt::Debug for StubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubHandle")
            .field("matcher", &self.matcher)
            .field("rule_ids", &self.rule_ids)
            .field("await_timeout", &self.await_timeout)
            .finish_non_exhaustive()
    }
}

impl StubHandle {
    pub(crate) fn new(
        backend: Arc<dyn MockBackend>,
        matcher: RequestMatcher,
        rule_ids: Vec<RuleId>,
    ) -> Self {
        Self {
            backend,
            matcher,
            rule_ids,
            await_timeout: None,
        }
    }

    /// Make subsequent verifications poll for up to 3 seconds before
    /// declaring failure.
    pub fn wait(mut self) -> Self {
        self.await_timeout = Some(DEFAULT_AWAIT_TIMEOUT);
        self
    }

    /// Make subsequent verifications poll for up to `timeout` before
    /// declaring failure.
    pub fn wait_at_most(mut self, timeout: Duration) -> Self {
        self.await_timeout = Some(timeout);
        self
    }

    /// Check an [`Expectation`] against the number of matching requests the
    /// backend has journaled.
    pub async fn verify(&self, expectation: Expectation) -> Result<(), Error> {
        verification::verify(
            self.backend.as_ref(),
            &self.matcher,
            expectation,
            self.await_timeout,
        )
        .await
    }

    /// Assert the request pattern was never observed.
    pub async fn verify_never(&self) -> Result<(), Error> {
        self.verify(Expectation::Never).await
    }

    /// Assert the request pattern was observed exactly once.
    pub async fn verify_once(&self) -> Result<(), Error> {
        self.verify(Expectation::Once).await
    }

    /// Assert the request pattern was observed exactly `n` times.
    pub async fn verify_exactly(&self, n: u64) -> Result<(), Error> {
        self.verify(Expectation::Exactly(n)).await
    }

    /// Assert the request pattern was observed at least `n` times.
    pub async fn verify_at_least(&self, n: u64) -> Result<(), Error> {
        self.verify(Expectation::AtLeast(n)).await
    }

    /// Assert the request pattern was observed at most `n` times.
    pub async fn verify_at_most(&self, n: u64) -> Result<(), Error> {
        self.verify(Expectation::AtMost(n)).await
    }

    /// Assert the request pattern was observed between `lo` and `hi` times,
    /// both inclusive. Fails with [`Error::Validation`] if `lo > hi`.
    pub async fn verify_between(&self, lo: u64, hi: u64) -> Result<(), Error> {
        self.verify(Expectation::between(lo, hi)?).await
    }

    /// The backend rules this stub expanded into.
    pub fn rule_ids(&self) -> &[RuleId] {
        &self.rule_ids
    }

    /// The request pattern this stub answers and verifies against.
    pub fn matcher(&self) -> &RequestMatcher {
        &self.matcher
    }
}
