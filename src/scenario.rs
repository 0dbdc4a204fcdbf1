use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;

use crate::backend::{MockBackend, RuleId, ScenarioBinding, StubRule};
use crate::error::BackendError;
use crate::matcher::RequestMatcher;
use crate::response::ResponseDefinition;

/// The sink state every bounded scenario ends in. No rule is active there,
/// so further matching requests fall through to the backend's 404 default.
pub(crate) const COMPLETED_STATE: &str = "Completed";

/// A unique name for one scenario state machine.
///
/// Tokens are minted with [`ScenarioToken::random`], so two bounded stubs for
/// the same request pattern never share state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScenarioToken(String);

impl ScenarioToken {
    /// Mint a fresh token. The random component keeps tokens unique across
    /// processes sharing a backend; the counter keeps them unique within one.
    pub fn random() -> Self {
        static NEXT_SCENARIO: AtomicU64 = AtomicU64::new(0);
        Self(format!(
            "scenario-{:016x}-{}",
            rand::random::<u64>(),
            NEXT_SCENARIO.fetch_add(1, Ordering::Relaxed)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub(crate) fn step_state(i: u64) -> String {
    format!("step-{}", i)
}

/// Compiles an "answer exactly `n` times" stub into a chain of single-shot
/// scenario rules.
///
/// Backends only understand "always match in state S, then move to S'", so a
/// budget of `n` becomes `n + 1` rules over states `step-0 .. step-n`:
/// the first `n` serve the canned response and advance one step each, and a
/// final exhaustion rule serves 404 from `step-n` into [`COMPLETED_STATE`].
/// The exhaustion rule carries the same matcher, so the hit is journaled and
/// counted like any other.
pub(crate) struct ScenarioStateMachine;

impl ScenarioStateMachine {
    pub(crate) async fn build(
        backend: &dyn MockBackend,
        matcher: RequestMatcher,
        response: ResponseDefinition,
        n: u64,
    ) -> Result<Vec<RuleId>, BackendError> {
        let token = ScenarioToken::random();
        let mut rule_ids = Vec::with_capacity(n as usize + 1);

        for step in 0..n {
            let binding = ScenarioBinding {
                token: token.clone(),
                required_state: step_state(step),
                next_state: Some(step_state(step + 1)),
            };
            let rule = StubRule::in_scenario(binding, matcher.clone(), response.clone());
            match backend.register(rule).await {
                Ok(id) => rule_ids.push(id),
                Err(e) => {
                    unregister(backend, &rule_ids).await;
                    return Err(e);
                }
            }
        }

        let exhaustion = ScenarioBinding {
            token: token.clone(),
            required_state: step_state(n),
            next_state: Some(COMPLETED_STATE.to_string()),
        };
        let rule = StubRule::in_scenario(exhaustion, matcher, ResponseDefinition::not_found());
        match backend.register(rule).await {
            Ok(id) => rule_ids.push(id),
            Err(e) => {
                unregister(backend, &rule_ids).await;
                return Err(e);
            }
        }

        // Rules are armed only once the scenario is placed in its first
        // state, after all of them are registered.
        if let Err(e) = backend.set_initial_state(&token, &step_state(0)).await {
            unregister(backend, &rule_ids).await;
            return Err(e);
        }

        Ok(rule_ids)
    }
}

/// Best-effort removal of the rules registered before a chain build failed,
/// so they cannot outlive the registry's knowledge of them.
async fn unregister(backend: &dyn MockBackend, rule_ids: &[RuleId]) {
    if rule_ids.is_empty() {
        return;
    }
    if let Err(e) = backend.remove_rules(rule_ids).await {
        warn!("Failed to remove partially registered scenario rules: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::request::InvocationRecord;

    #[test]
    fn tokens_are_unique() {
        let a = ScenarioToken::random();
        let b = ScenarioToken::random();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("scenario-"));
    }

    /// A backend whose engine goes away after `fail_at` registrations.
    struct FlakyBackend {
        fail_at: u64,
        registered: Mutex<u64>,
        removed: Mutex<Vec<RuleId>>,
    }

    impl FlakyBackend {
        fn failing_at(fail_at: u64) -> Self {
            Self {
                fail_at,
                registered: Mutex::new(0),
                removed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MockBackend for FlakyBackend {
        async fn register(&self, _rule: StubRule) -> Result<RuleId, BackendError> {
            let mut registered = self.registered.lock().unwrap();
            if *registered == self.fail_at {
                return Err(BackendError::new("engine unavailable"));
            }
            let id = RuleId::new(*registered);
            *registered += 1;
            Ok(id)
        }

        async fn set_initial_state(
            &self,
            _token: &ScenarioToken,
            _state: &str,
        ) -> Result<(), BackendError> {
            Ok(())
        }

        async fn query_count(&self, _matcher: &RequestMatcher) -> Result<u64, BackendError> {
            Ok(0)
        }

        async fn received_requests(&self) -> Result<Vec<InvocationRecord>, BackendError> {
            Ok(Vec::new())
        }

        async fn remove_rules(&self, rules: &[RuleId]) -> Result<(), BackendError> {
            self.removed.lock().unwrap().extend_from_slice(rules);
            Ok(())
        }

        async fn reset_journal(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_chain_build_removes_the_rules_already_registered() {
        let backend = FlakyBackend::failing_at(2);
        let matcher = RequestMatcher::builder().build().unwrap();

        let result =
            ScenarioStateMachine::build(&backend, matcher, ResponseDefinition::new(200), 3).await;

        assert!(result.is_err());
        let removed = backend.removed.lock().unwrap();
        assert_eq!(removed.as_slice(), &[RuleId::new(0), RuleId::new(1)]);
    }
}
