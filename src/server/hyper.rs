use std::convert::Infallible;
use std::sync::Arc;

use http::Response;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use log::warn;
use tokio::sync::{oneshot, RwLock};

use crate::request::ReceivedRequest;
use crate::server::rule_set::RuleSet;

async fn handle(
    request: hyper::Request<Incoming>,
    state: Arc<RwLock<RuleSet>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let request = ReceivedRequest::from_hyper(request).await;
    // Matching and the scenario transition happen under the write lock; the
    // artificial delay is awaited after it is released, so a slow stub does
    // not stall unrelated traffic.
    let (response, delay) = state.write().await.handle_request(request);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    Ok(response)
}

pub(super) async fn run_server(
    listener: std::net::TcpListener,
    state: Arc<RwLock<RuleSet>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let listener = tokio::net::TcpListener::from_std(listener)
        .expect("Failed to convert the listener to the tokio runtime.");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                break;
            }
            accepted = listener.accept() => {
                let (stream, _) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept a connection: {}", e);
                        continue;
                    }
                };
                let state = state.clone();
                tokio::spawn(async move {
                    let service =
                        service_fn(move |request| handle(request, state.clone()));
                    if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        warn!("Failed to serve a connection: {}", e);
                    }
                });
            }
        }
    }
}
