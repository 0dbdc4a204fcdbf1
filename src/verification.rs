use std::fmt;
use std::time::Duration;

use log::debug;

use crate::backend::MockBackend;
use crate::error::Error;
use crate::expectation::Expectation;
use crate::matcher::RequestMatcher;
use crate::request::InvocationRecord;

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Carries the details of a failed verification: what was expected, what was
/// counted, and every request the backend journaled, so the mismatch can be
/// diagnosed without re-running the test under a debugger.
#[derive(Debug)]
pub struct VerificationFailure {
    expectation: Expectation,
    actual: u64,
    received: Vec<InvocationRecord>,
}

impl VerificationFailure {
    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }

    pub fn actual(&self) -> u64 {
        self.actual
    }

    pub fn received_requests(&self) -> &[InvocationRecord] {
        &self.received
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Expected number of matching requests: {}, actual: {}",
            self.expectation, self.actual
        )?;
        if self.received.is_empty() {
            writeln!(f, "The server did not receive any request.")?;
        } else {
            writeln!(f, "Received requests:")?;
            for (index, record) in self.received.iter().enumerate() {
                let unix_ms = record
                    .received_at
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis();
                writeln!(
                    f,
                    "- Request #{} ({}, at unix-ms {})\n\t{}",
                    index + 1,
                    if record.matched { "matched" } else { "unmatched" },
                    unix_ms,
                    format!("{}", record.request).replace('\n', "\n\t")
                )?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for VerificationFailure {}

/// Check `expectation` against the number of journaled requests matching
/// `matcher`.
///
/// With no timeout the count is taken once. With a timeout the count is
/// re-taken every [`POLL_INTERVAL`] until it satisfies the expectation or the
/// deadline passes; the final count decides the outcome either way.
pub(crate) async fn verify(
    backend: &dyn MockBackend,
    matcher: &RequestMatcher,
    expectation: Expectation,
    timeout: Option<Duration>,
) -> Result<(), Error> {
    let mut actual = backend.query_count(matcher).await?;
    if expectation.contains(actual) {
        return Ok(());
    }

    if let Some(timeout) = timeout {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(remaining.min(POLL_INTERVAL)).await;

            actual = backend.query_count(matcher).await?;
            if expectation.contains(actual) {
                return Ok(());
            }
            debug!(
                "Verification not yet satisfied (expected {}, counted {}), polling again",
                expectation, actual
            );
        }
    }

    let received = backend.received_requests().await?;
    Err(Error::Verification(VerificationFailure {
        expectation,
        actual,
        received,
    }))
}
