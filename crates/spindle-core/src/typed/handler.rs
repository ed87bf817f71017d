//! Handler trait - typed handlers and their adapter to `TaskHandler`.

use std::marker::PhantomData;

use async_trait::async_trait;

use super::codec::PayloadCodec;
use super::task::TypedTask;
use crate::domain::{ExecutorError, TaskEnvelope};
use crate::impls::TaskHandler;

/// Runs a `T` and produces its `T::Output`.
///
/// `Handler<Resize>` only ever sees a `Resize`; the pairing is checked at
/// compile time and the JSON plumbing happens in [`TypedHandler`].
#[async_trait]
pub trait Handler<T: TypedTask>: Send + Sync {
    async fn handle(&self, task: T) -> Result<T::Output, ExecutorError>;
}

/// Type-erasing adapter so a typed handler can back an in-process executor.
pub struct TypedHandler<T: TypedTask, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<T>,
}

impl<T: TypedTask, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TypedTask, H: Handler<T>> TaskHandler for TypedHandler<T, H> {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<serde_json::Value, ExecutorError> {
        let task: T = PayloadCodec::decode(envelope.payload().clone())
            .map_err(|e| ExecutorError::Failed(format!("{} {e}", T::TYPE)))?;
        let output = self.handler.handle(task).await?;
        PayloadCodec::encode(&output).map_err(|e| ExecutorError::Failed(format!("{} {e}", T::TYPE)))
    }
}
