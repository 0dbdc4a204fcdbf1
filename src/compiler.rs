use crate::backend::{MockBackend, RuleId, StubRule};
use crate::error::Error;
use crate::matcher::RequestMatcher;
use crate::response::ResponseDefinition;
use crate::scenario::ScenarioStateMachine;

/// How many times a stub is allowed to answer before it stops matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationBudget {
    /// Answer every matching request, forever.
    Unlimited,
    /// Answer the first matching request, then serve 404.
    Once,
    /// Answer the first `n` matching requests, then serve 404.
    /// `Exactly(0)` is a stub that always serves 404 while still recording
    /// matching traffic in the journal.
    Exactly(u64),
}

/// Lowers a (matcher, response, budget) triple into the rules a backend can
/// actually hold.
pub(crate) struct StubCompiler;

impl StubCompiler {
    pub(crate) async fn compile(
        backend: &dyn MockBackend,
        matcher: RequestMatcher,
        response: ResponseDefinition,
        budget: InvocationBudget,
    ) -> Result<Vec<RuleId>, Error> {
        let rule_ids = match budget {
            InvocationBudget::Unlimited => {
                let rule = StubRule::always(matcher, response);
                vec![backend.register(rule).await?]
            }
            InvocationBudget::Exactly(0) => {
                // No scenario needed: a single always-active rule that serves
                // the default 404 keeps the journal populated.
                let rule = StubRule::always(matcher, ResponseDefinition::not_found());
                vec![backend.register(rule).await?]
            }
            InvocationBudget::Once => {
                ScenarioStateMachine::build(backend, matcher, response, 1).await?
            }
            InvocationBudget::Exactly(n) => {
                ScenarioStateMachine::build(backend, matcher, response, n).await?
            }
        };
        Ok(rule_ids)
    }
}
