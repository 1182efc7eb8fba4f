//! Request engine: one inbound call in, at most one response out.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::dispatcher::{Access, Dispatcher};
use crate::entity::{Session, Store, UserDirectory};
use crate::errors::RpcError;
use crate::metrics::{RPC_ERRORS_TOTAL, RPC_REQUEST_DURATION_SECONDS, RPC_REQUESTS_TOTAL};
use crate::request::Request;
use crate::types::{Params, RpcRequest, RpcResponse};

/// Top-level registry: dispatcher plus the app-wide user directory.
pub struct App {
    dispatcher: Dispatcher,
    directory: Arc<UserDirectory>,
    store: Store,
}

impl App {
    /// Create an app with a fresh user directory.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_directory(dispatcher, UserDirectory::new())
    }

    /// Create an app over an existing directory (shared with its rooms).
    pub fn with_directory(dispatcher: Dispatcher, directory: Arc<UserDirectory>) -> Self {
        Self {
            dispatcher,
            directory,
            store: Store::new(),
        }
    }

    /// Registered methods.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// All authenticated users by login.
    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// App-wide scratch store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run one call for `session`.
    ///
    /// Calls with an id always yield `Some(response)`; notifications always
    /// yield `None`, failures included.
    #[instrument(skip_all, fields(method = %message.method, session = %session.id()))]
    pub async fn handle(&self, session: Arc<Session>, message: RpcRequest) -> Option<RpcResponse> {
        let RpcRequest {
            id, method, params, ..
        } = message;
        counter!(RPC_REQUESTS_TOTAL, "method" => method.clone()).increment(1);
        let start = Instant::now();

        let outcome = self.dispatch(session, id.clone(), &method, params).await;

        histogram!(RPC_REQUEST_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
        if let Err(err) = &outcome {
            counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => err.kind())
                .increment(1);
        }

        match (id, outcome) {
            (Some(id), Ok(result)) => Some(RpcResponse::success(id, result)),
            (Some(id), Err(err)) => {
                debug!(error = %err, kind = err.kind(), "request failed");
                Some(RpcResponse::failure(Some(id), err.to_error_body()))
            }
            (None, Ok(Value::Null)) => None,
            (None, Ok(result)) => {
                warn!(%result, "notification handler returned a non-null result; dropped");
                None
            }
            (None, Err(err)) => {
                warn!(error = %err, kind = err.kind(), "notification failed");
                None
            }
        }
    }

    async fn dispatch(
        &self,
        session: Arc<Session>,
        id: Option<Value>,
        method: &str,
        params: Params,
    ) -> Result<Value, RpcError> {
        let route = self.dispatcher.resolve(method)?;
        if route.access == Access::Authenticated && !session.is_authenticated() {
            return Err(RpcError::Unauthenticated {
                method: method.to_owned(),
            });
        }

        let handler = Arc::clone(&route.handler);
        let request = Request::new(id, method, params, session, Arc::clone(&self.directory));
        match AssertUnwindSafe(handler.handle(request)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_owned());
                warn!(method, panic = %message, "handler panicked");
                Err(RpcError::Internal { message })
            }
        }
    }
}
