//! Adapters turning plain async functions into [`MethodHandler`]s.
//!
//! - [`handler_fn`]: closure over the whole [`Request`].
//! - [`typed_fn`]: closure over deserialized params; positional params
//!   bind to a tuple or sequence, named params to a struct.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::dispatcher::MethodHandler;
use crate::errors::RpcError;
use crate::request::Request;

/// Handler backed by a closure over [`Request`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap `f` as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> MethodHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    async fn handle(&self, request: Request) -> Result<Value, RpcError> {
        (self.f)(request).await
    }
}

/// Handler backed by a closure over typed params.
pub struct TypedFn<F, P, R> {
    f: F,
    _marker: PhantomData<fn(P) -> R>,
}

/// Wrap `f` as a handler whose params are decoded into `P` and whose
/// output `R` is serialized as the result.
pub fn typed_fn<F, Fut, P, R>(f: F) -> TypedFn<F, P, R>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, RpcError>> + Send + 'static,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    TypedFn {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, P, R> MethodHandler for TypedFn<F, P, R>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, RpcError>> + Send + 'static,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    async fn handle(&self, request: Request) -> Result<Value, RpcError> {
        let params: P = request.params().decode()?;
        let output = (self.f)(params).await?;
        Ok(serde_json::to_value(output)?)
    }
}
