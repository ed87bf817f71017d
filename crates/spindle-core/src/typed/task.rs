//! TypedTask trait - ties a payload type to its output type.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A task whose payload and result have concrete types.
///
/// # Example
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Resize { width: u32, height: u32 }
///
/// impl TypedTask for Resize {
///     const TYPE: &'static str = "media.resize.v1";
///     type Output = String;
/// }
/// ```
///
/// # Trait bounds
/// - `Serialize + DeserializeOwned`: the task crosses the pool as JSON
/// - `Send + Sync + 'static`: handlers live in an `Arc` shared by executors
pub trait TypedTask: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Naming convention: `{namespace}.{domain}.{action}.v{major}`
    const TYPE: &'static str;

    type Output: Serialize + DeserializeOwned + Send + 'static;
}
