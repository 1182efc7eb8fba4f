//! Method resolution: exact names first, then namespace prefixes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::RpcError;
use crate::request::Request;

/// Trait implemented by every method handler.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the handler for one inbound call.
    async fn handle(&self, request: Request) -> Result<Value, RpcError>;
}

/// Who may call a registered method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Callable before `authenticate`.
    Public,
    /// Requires an authenticated session.
    Authenticated,
}

/// How a method name was matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteKind {
    /// Registered under the full method name.
    Exact,
    /// Matched by the prefix before the first `.`.
    Namespace,
}

/// A resolved handler and its access policy.
#[derive(Clone)]
pub struct Route {
    /// Handler to invoke.
    pub handler: Arc<dyn MethodHandler>,
    /// Access policy stored at registration.
    pub access: Access,
    /// Exact or namespace match.
    pub kind: RouteKind,
}

impl Route {
    /// Whether unauthenticated sessions may call this route.
    pub fn is_public(&self) -> bool {
        self.access == Access::Public
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("access", &self.access)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Registry mapping method names and namespaces to handlers.
pub struct Dispatcher {
    methods: HashMap<String, Route>,
    namespaces: HashMap<String, Route>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            namespaces: HashMap::new(),
        }
    }

    /// Register a handler under an exact method name.
    pub fn register(
        &mut self,
        method: &str,
        handler: impl MethodHandler + 'static,
        access: Access,
    ) {
        let route = Route {
            handler: Arc::new(handler),
            access,
            kind: RouteKind::Exact,
        };
        let _ = self.methods.insert(method.to_owned(), route);
    }

    /// Register a handler for every method named `"<prefix>.<anything>"`.
    pub fn register_namespace(
        &mut self,
        prefix: &str,
        handler: impl MethodHandler + 'static,
        access: Access,
    ) {
        let route = Route {
            handler: Arc::new(handler),
            access,
            kind: RouteKind::Namespace,
        };
        let _ = self.namespaces.insert(prefix.to_owned(), route);
    }

    /// Resolve a method name to its route.
    pub fn resolve(&self, method: &str) -> Result<&Route, RpcError> {
        if let Some(route) = self.methods.get(method) {
            return Ok(route);
        }
        method
            .split_once('.')
            .and_then(|(prefix, _)| self.namespaces.get(prefix))
            .ok_or_else(|| RpcError::MethodNotFound {
                method: method.to_owned(),
            })
    }

    /// All exact method names (sorted).
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// All namespace prefixes (sorted).
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether an exact method is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
