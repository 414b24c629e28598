//! Resource hooks: function values attached to a descriptor and run at fixed endpoint boundaries.

use crate::backend::Entity;
use crate::config::Operation;
use crate::error::AppError;
use axum::http::StatusCode;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// What a hook sees about the request in flight.
#[derive(Clone, Debug)]
pub struct HookContext {
    pub resource: String,
    pub operation: Operation,
    /// Parsed path id for item operations.
    pub id: Option<Value>,
    /// Client key (forwarded address or "anonymous").
    pub client: String,
}

/// Raised by a hook to abort the request. Status defaults to 400.
#[derive(Clone, Debug)]
pub struct HookError {
    pub status: StatusCode,
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        HookError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        HookError {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl From<HookError> for AppError {
    fn from(e: HookError) -> Self {
        AppError::Hook {
            status: e.status,
            message: e.message,
        }
    }
}

pub type PermissionHook = Arc<dyn Fn(&HookContext) -> Result<(), HookError> + Send + Sync>;
/// Runs before the adapter write; may rewrite the validated fields.
pub type PreSaveHook = Arc<dyn Fn(&HookContext, &mut Entity) -> Result<(), HookError> + Send + Sync>;
/// Runs after the adapter write. Failing here does not undo the write.
pub type PostSaveHook = Arc<dyn Fn(&HookContext, &Entity) -> Result<(), HookError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    pub permission: Option<PermissionHook>,
    pub pre_save: Option<PreSaveHook>,
    pub post_save: Option<PostSaveHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("permission", &self.permission.is_some())
            .field("pre_save", &self.pre_save.is_some())
            .field("post_save", &self.post_save.is_some())
            .finish()
    }
}

impl Hooks {
    pub fn permission<F>(mut self, f: F) -> Self
    where
        F: Fn(&HookContext) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.permission = Some(Arc::new(f));
        self
    }

    pub fn pre_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&HookContext, &mut Entity) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.pre_save = Some(Arc::new(f));
        self
    }

    pub fn post_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&HookContext, &Entity) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.post_save = Some(Arc::new(f));
        self
    }

    pub(crate) fn check_permission(&self, ctx: &HookContext) -> Result<(), AppError> {
        match &self.permission {
            Some(hook) => hook(ctx).map_err(AppError::from),
            None => Ok(()),
        }
    }

    pub(crate) fn run_pre_save(&self, ctx: &HookContext, fields: &mut Entity) -> Result<(), AppError> {
        match &self.pre_save {
            Some(hook) => hook(ctx, fields).map_err(AppError::from),
            None => Ok(()),
        }
    }

    pub(crate) fn run_post_save(&self, ctx: &HookContext, entity: &Entity) -> Result<(), AppError> {
        match &self.post_save {
            Some(hook) => hook(ctx, entity).map_err(AppError::from),
            None => Ok(()),
        }
    }
}
