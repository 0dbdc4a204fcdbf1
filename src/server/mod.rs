use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::{oneshot, RwLock};

use crate::backend::{MockBackend, RuleId, StubRule};
use crate::error::BackendError;
use crate::matcher::RequestMatcher;
use crate::request::InvocationRecord;
use crate::scenario::ScenarioToken;

mod hyper;
mod rule_set;

use rule_set::RuleSet;

/// An embedded HTTP mock server, the reference [`MockBackend`].
///
/// `start` binds a random port on `127.0.0.1` and spins up the server on a
/// dedicated thread with its own single-threaded `tokio` runtime, isolated
/// from the runtime running the tests. The server shuts down when the last
/// clone of the handle is dropped.
///
/// The server holds its rules, scenario states and request journal in memory:
/// every [`MockBackend`] operation is a lock acquisition away, so none of
/// them can actually fail.
#[derive(Clone)]
pub struct LocalMockServer {
    state: Arc<RwLock<RuleSet>>,
    server_address: SocketAddr,
    // Dropping the sender stops the accept loop.
    _shutdown_trigger: Arc<oneshot::Sender<()>>,
}

impl LocalMockServer {
    /// Bind a random port on localhost and start serving.
    pub async fn start() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")
            .expect("Failed to bind an OS-assigned port on localhost.");
        listener
            .set_nonblocking(true)
            .expect("Failed to configure the listener.");
        let server_address = listener
            .local_addr()
            .expect("Failed to read the listener's address.");

        let state = Arc::new(RwLock::new(RuleSet::new()));
        let (shutdown_trigger, shutdown_receiver) = oneshot::channel();

        let server_state = state.clone();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to build the server runtime.");
            runtime.block_on(hyper::run_server(listener, server_state, shutdown_receiver));
        });
        debug!("Started mock server on {}", server_address);

        Self {
            state,
            server_address,
            _shutdown_trigger: Arc::new(shutdown_trigger),
        }
    }

    /// The base URL of the server, e.g. `http://127.0.0.1:5417`.
    pub fn uri(&self) -> String {
        format!("http://{}", self.server_address)
    }

    /// The socket address the server is listening on.
    pub fn address(&self) -> &SocketAddr {
        &self.server_address
    }
}

#[async_trait]
impl MockBackend for LocalMockServer {
    async fn register(&self, rule: StubRule) -> Result<RuleId, BackendError> {
        Ok(self.state.write().await.register(rule))
    }

    async fn set_initial_state(
        &self,
        token: &ScenarioToken,
        state: &str,
    ) -> Result<(), BackendError> {
        self.state.write().await.set_state(token, state);
        Ok(())
    }

    async fn query_count(&self, matcher: &RequestMatcher) -> Result<u64, BackendError> {
        Ok(self.state.read().await.count_matching(matcher))
    }

    async fn received_requests(&self) -> Result<Vec<InvocationRecord>, BackendError> {
        Ok(self.state.read().await.received_requests())
    }

    async fn remove_rules(&self, rules: &[RuleId]) -> Result<(), BackendError> {
        self.state.write().await.remove(rules);
        Ok(())
    }

    async fn reset_journal(&self) -> Result<(), BackendError> {
        self.state.write().await.reset_journal();
        Ok(())
    }
}
