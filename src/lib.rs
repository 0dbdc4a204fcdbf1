//! `stubkit` provides HTTP stubbing with bounded invocation budgets and
//! invocation-count verification, on top of interchangeable matching
//! backends.
//!
//! A stub pairs a request pattern with a canned response and a budget: how
//! many times it answers before it starts serving 404. Budgets work against
//! engines that only understand "always match while in state S, then move to
//! S'": the stub is compiled into a chain of single-shot scenario rules, one
//! per allowed invocation, plus a final exhaustion rule. Because the
//! exhaustion rule carries the same request pattern, over-budget calls are
//! journaled too and show up in verification counts.
//!
//! The crate ships [`LocalMockServer`], an embedded `hyper`-based backend
//! bound to a random localhost port; any other engine can be plugged in by
//! implementing [`MockBackend`].
//!
//! ## Getting started
//! ```rust
//! use stubkit::{LocalMockServer, MockRegistry, ResponseDefinition};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Start a backend and a registry on top of it.
//!     let server = LocalMockServer::start().await;
//!     let registry = MockRegistry::new(server.clone());
//!
//!     // A stub with a budget of one: the first matching request gets a 200,
//!     // every following one a 404.
//!     let mock = registry
//!         .stub()
//!         .method("GET")
//!         .path("/hello")
//!         .respond(ResponseDefinition::new(200))
//!         .exactly(1)
//!         .await?;
//!
//!     let url = format!("{}/hello", server.uri());
//!     assert_eq!(reqwest::get(&url).await?.status(), 200);
//!     assert_eq!(reqwest::get(&url).await?.status(), 404);
//!
//!     // Both calls were journaled, the over-budget one included.
//!     mock.verify_exactly(2).await?;
//!
//!     // Remove every registered stub and wipe the journal.
//!     registry.clear_mocks().await?;
//!     Ok(())
//! }
//! ```
mod backend;
mod compiler;
mod error;
mod expectation;
mod handle;
mod matcher;
mod payload;
mod registry;
mod request;
mod response;
mod scenario;
mod server;
mod verification;

pub use backend::{MockBackend, RuleId, ScenarioBinding, StubRule};
pub use compiler::InvocationBudget;
pub use error::{BackendError, Error};
pub use expectation::Expectation;
pub use handle::StubHandle;
pub use matcher::{BodyMatcher, RequestMatcher, RequestMatcherBuilder};
pub use payload::{Payload, PayloadFormat};
pub use registry::{MockRegistry, StubBuilder};
pub use request::{InvocationRecord, ReceivedRequest};
pub use response::ResponseDefinition;
pub use scenario::ScenarioToken;
pub use server::LocalMockServer;
pub use verification::VerificationFailure;
