//! Request dispatch: endpoint state machine, body validation, resource hooks.

mod endpoint;
mod hooks;
mod validation;
pub use endpoint::{resolve_operation, ApiRequest, Endpoint, ANONYMOUS_CLIENT};
pub use hooks::{HookContext, HookError, Hooks, PermissionHook, PostSaveHook, PreSaveHook};
pub use validation::{RequestValidator, WriteKind};
