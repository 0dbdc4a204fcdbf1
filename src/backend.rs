use async_trait::async_trait;

use crate::error::BackendError;
use crate::matcher::RequestMatcher;
use crate::request::InvocationRecord;
use crate::response::ResponseDefinition;
use crate::scenario::ScenarioToken;

/// An opaque identifier for a rule registered against a backend.
///
/// Minted by the backend on registration; the only thing callers do with it
/// is hand it back for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(u64);

impl RuleId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Scopes a rule to a scenario: the rule only applies while the scenario sits
/// in `required_state`, and firing it moves the scenario to `next_state`.
#[derive(Debug, Clone)]
pub struct ScenarioBinding {
    pub token: ScenarioToken,
    pub required_state: String,
    /// `None` leaves the scenario state untouched when the rule fires.
    pub next_state: Option<String>,
}

/// The single primitive backends understand: "when the request matches (and,
/// if scoped, the scenario is in the required state), serve this response and
/// optionally advance the scenario".
#[derive(Debug, Clone)]
pub struct StubRule {
    /// `None` for an always-active rule, `Some` for a scenario-scoped one.
    pub scenario: Option<ScenarioBinding>,
    pub matcher: RequestMatcher,
    pub response: ResponseDefinition,
}

impl StubRule {
    /// An unscoped rule: active from registration until removal.
    pub fn always(matcher: RequestMatcher, response: ResponseDefinition) -> Self {
        Self {
            scenario: None,
            matcher,
            response,
        }
    }

    /// A rule scoped to one state of a scenario.
    pub fn in_scenario(
        binding: ScenarioBinding,
        matcher: RequestMatcher,
        response: ResponseDefinition,
    ) -> Self {
        Self {
            scenario: Some(binding),
            matcher,
            response,
        }
    }
}

/// The contract a concrete matching engine has to implement, once per
/// backend.
///
/// Behavioral guarantees every adapter must uphold:
///
/// - Matching a request against a scenario-scoped rule and performing the
///   state transition is a single atomic operation: at most one transition
///   fires per physical request, even under concurrent traffic.
/// - A request no active rule applies to (including requests that arrive
///   while a scenario sits in a sink state) receives a fixed default
///   response - HTTP 404 with an empty body, the same value
///   [`ResponseDefinition::not_found`] produces - and is still recorded in
///   the journal, so [`query_count`] sees every matching attempt.
///
/// [`ResponseDefinition::not_found`]: crate::ResponseDefinition::not_found
/// [`query_count`]: MockBackend::query_count
#[async_trait]
pub trait MockBackend: Send + Sync {
    /// Register a rule; it takes effect immediately.
    async fn register(&self, rule: StubRule) -> Result<RuleId, BackendError>;

    /// Initialize a scenario's current state. Must be called before any of
    /// the scenario's rules can be exercised.
    async fn set_initial_state(
        &self,
        token: &ScenarioToken,
        state: &str,
    ) -> Result<(), BackendError>;

    /// Count the journaled requests whose recorded attributes satisfy every
    /// populated field of `matcher`.
    async fn query_count(&self, matcher: &RequestMatcher) -> Result<u64, BackendError>;

    /// A snapshot of the journal, in arrival order. Each record carries the
    /// request, its arrival time and whether any rule answered it. Used to
    /// enrich verification failure messages.
    async fn received_requests(&self) -> Result<Vec<InvocationRecord>, BackendError>;

    /// Remove the given rules. Unknown ids are ignored.
    async fn remove_rules(&self, rules: &[RuleId]) -> Result<(), BackendError>;

    /// Clear the invocation journal.
    async fn reset_journal(&self) -> Result<(), BackendError>;
}
