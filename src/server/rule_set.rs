use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use http::Response;
use http_body_util::Full;
use hyper::body::Bytes;
use log::debug;

use crate::backend::{RuleId, StubRule};
use crate::matcher::RequestMatcher;
use crate::request::{InvocationRecord, ReceivedRequest};
use crate::response::ResponseDefinition;
use crate::scenario::ScenarioToken;

struct RegisteredRule {
    id: RuleId,
    rule: StubRule,
}

/// The in-memory state behind [`LocalMockServer`]: the registered rules, the
/// current state of every scenario, and the journal of received requests.
///
/// All mutation happens through `&mut self`, under the server's write lock,
/// so matching a request and advancing its scenario is one atomic step.
///
/// [`LocalMockServer`]: crate::LocalMockServer
pub(crate) struct RuleSet {
    rules: Vec<RegisteredRule>,
    scenario_states: HashMap<ScenarioToken, String>,
    journal: Vec<InvocationRecord>,
    next_rule_id: u64,
}

impl RuleSet {
    pub(crate) fn new() -> Self {
        Self {
            rules: Vec::new(),
            scenario_states: HashMap::new(),
            journal: Vec::new(),
            next_rule_id: 0,
        }
    }

    pub(crate) fn register(&mut self, rule: StubRule) -> RuleId {
        let id = RuleId::new(self.next_rule_id);
        self.next_rule_id += 1;
        self.rules.push(RegisteredRule { id, rule });
        id
    }

    pub(crate) fn set_state(&mut self, token: &ScenarioToken, state: &str) {
        self.scenario_states
            .insert(token.clone(), state.to_string());
    }

    /// Route a request: find the first active rule it satisfies, perform the
    /// scenario transition if the rule has one, journal the request and
    /// return the response to serve.
    ///
    /// The returned delay, if any, is to be awaited by the caller after the
    /// lock is released.
    pub(crate) fn handle_request(
        &mut self,
        request: ReceivedRequest,
    ) -> (Response<Full<Bytes>>, Option<Duration>) {
        let received_at = SystemTime::now();
        let matched = self.rules.iter().find(|registered| {
            let rule = &registered.rule;
            if let Some(binding) = &rule.scenario {
                let current = self.scenario_states.get(&binding.token);
                if current.map(String::as_str) != Some(binding.required_state.as_str()) {
                    return false;
                }
            }
            rule.matcher.matches(&request)
        });

        match matched {
            Some(registered) => {
                let response = registered.rule.response.generate_response();
                let delay = *registered.rule.response.delay();
                if let Some(binding) = &registered.rule.scenario {
                    if let Some(next) = &binding.next_state {
                        self.scenario_states
                            .insert(binding.token.clone(), next.clone());
                    }
                }
                self.journal.push(InvocationRecord {
                    request,
                    matched: true,
                    received_at,
                });
                (response, delay)
            }
            None => {
                debug!("Got unexpected request:\n{}", request);
                self.journal.push(InvocationRecord {
                    request,
                    matched: false,
                    received_at,
                });
                (ResponseDefinition::not_found().generate_response(), None)
            }
        }
    }

    pub(crate) fn count_matching(&self, matcher: &RequestMatcher) -> u64 {
        self.journal
            .iter()
            .filter(|record| matcher.matches(&record.request))
            .count() as u64
    }

    pub(crate) fn received_requests(&self) -> Vec<InvocationRecord> {
        self.journal.clone()
    }

    pub(crate) fn remove(&mut self, ids: &[RuleId]) {
        self.rules.retain(|registered| !ids.contains(&registered.id));
    }

    pub(crate) fn reset_journal(&mut self) {
        self.journal.clear();
    }
}
