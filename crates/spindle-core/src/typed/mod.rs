//! Typed - serde-typed tasks on top of the JSON pool.
//!
//! # Two layers
//! - **Typed**: `TypedTask`, `Handler<T>`, `Pool::run_typed` - type safe
//! - **Erased**: `TaskHandler` over `serde_json::Value` - what executors run

pub mod codec;
pub mod handler;
pub mod task;

pub use self::codec::{CodecError, PayloadCodec};
pub use self::handler::{Handler, TypedHandler};
pub use self::task::TypedTask;
