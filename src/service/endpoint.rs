//! Per-resource request dispatcher.
//!
//! Every request walks `Resolved -> Validated -> Executed -> Serialized`. A failure in any state
//! ends the request there; nothing past validation runs unless the request is well formed, and the
//! adapter is called exactly once per logical operation.

use super::hooks::HookContext;
use super::validation::{RequestValidator, WriteKind};
use crate::backend::{BackendAdapter, Entity, Page, SearchCapability, UpdateMode};
use crate::config::{Operation, ResourceDescriptor};
use crate::error::AppError;
use crate::limits::RateLimiter;
use crate::query::{paginate, Projection, Query, Window};
use crate::response::{ApiResponse, ListEnvelope};
use axum::http::Method;
use serde_json::Value;
use std::sync::Arc;

pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Transport-neutral request: verb, optional path id, raw query pairs, JSON body.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub id: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub client: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method) -> Self {
        ApiRequest {
            method,
            id: None,
            query: Vec::new(),
            body: None,
            client: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add query pairs from a raw query string (`a=1&b=2`).
    pub fn query_string(mut self, raw: &str) -> Result<Self, AppError> {
        self.query.extend(crate::query::parse_query_string(Some(raw))?);
        Ok(self)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }
}

/// Map verb and id presence to an operation. `None` means no operation exists for the pair.
pub fn resolve_operation(method: &Method, has_id: bool) -> Option<(Operation, UpdateMode)> {
    match (method.as_str(), has_id) {
        ("GET", false) => Some((Operation::List, UpdateMode::Partial)),
        ("POST", false) => Some((Operation::Create, UpdateMode::Partial)),
        ("GET", true) => Some((Operation::Retrieve, UpdateMode::Partial)),
        ("PUT", true) => Some((Operation::Update, UpdateMode::Full)),
        ("PATCH", true) => Some((Operation::Update, UpdateMode::Partial)),
        ("DELETE", _) => Some((Operation::Delete, UpdateMode::Partial)),
        _ => None,
    }
}

struct Resolved {
    mode: UpdateMode,
    ctx: HookContext,
}

enum Validated {
    List(Query),
    Retrieve(Value),
    Create { items: Vec<Entity>, bulk: bool },
    Update { id: Value, fields: Entity, mode: UpdateMode },
    Delete(Value),
    DeleteMany(Vec<Value>),
}

enum Executed {
    Page { page: Page, window: Window },
    One(Entity),
    Created(Entity),
    CreatedMany(Vec<Entity>),
    Deleted,
}

pub struct Endpoint {
    resource: Arc<ResourceDescriptor>,
    adapter: Arc<dyn BackendAdapter>,
    limiter: Option<(Arc<dyn RateLimiter>, u32)>,
}

impl Endpoint {
    pub fn new(resource: ResourceDescriptor, adapter: Arc<dyn BackendAdapter>) -> Self {
        Endpoint {
            resource: Arc::new(resource),
            adapter,
            limiter: None,
        }
    }

    /// Throttle to `limit` requests per client per limiter window. Zero disables throttling.
    pub fn with_rate_limit(mut self, limiter: Arc<dyn RateLimiter>, limit: u32) -> Self {
        self.limiter = if limit == 0 { None } else { Some((limiter, limit)) };
        self
    }

    pub fn resource(&self) -> &ResourceDescriptor {
        &self.resource
    }

    pub fn adapter(&self) -> &Arc<dyn BackendAdapter> {
        &self.adapter
    }

    pub async fn handle(&self, req: ApiRequest) -> Result<ApiResponse, AppError> {
        let resolved = self.resolve(&req).await?;
        tracing::debug!(
            resource = %self.resource.name,
            operation = %resolved.ctx.operation,
            client = %resolved.ctx.client,
            "resolved"
        );
        let projection = Projection::compile(&req.query, &self.resource)?;
        let validated = self.validate(&resolved, req)?;
        let executed = self.execute(&resolved, validated).await?;
        self.serialize(executed, &projection)
    }

    async fn resolve(&self, req: &ApiRequest) -> Result<Resolved, AppError> {
        let resource = &*self.resource;
        let (operation, mode) = resolve_operation(&req.method, req.id.is_some())
            .filter(|(op, _)| resource.allows(*op))
            .ok_or_else(|| AppError::MethodNotAllowed(format!("{} on {}", req.method, resource.name)))?;

        let client = req.client.clone().unwrap_or_else(|| ANONYMOUS_CLIENT.to_string());
        if let Some((limiter, limit)) = &self.limiter {
            let key = format!("{}:{}", resource.name, client);
            if !limiter.check(&key, *limit).await {
                tracing::warn!(resource = %resource.name, client = %client, "rate limit exceeded");
                return Err(AppError::TooManyRequests);
            }
        }

        let id = req.id.as_deref().map(|raw| self.parse_id(raw)).transpose()?;
        let ctx = HookContext {
            resource: resource.name.clone(),
            operation,
            id,
            client,
        };
        resource.hooks.check_permission(&ctx)?;
        Ok(Resolved { mode, ctx })
    }

    fn parse_id(&self, raw: &str) -> Result<Value, AppError> {
        let pk = self.resource.id_field();
        pk.parse_query(raw)
            .map_err(|msg| AppError::field(pk.name.as_str(), format!("invalid id: {}", msg)))
    }

    /// Ids of a bulk delete body, typed like path ids. Duplicates collapse.
    fn body_ids(&self, body: &Value) -> Result<Vec<Value>, AppError> {
        let items = match body {
            Value::Array(items) if !items.is_empty() => items,
            _ => return Err(AppError::validation("bulk delete needs a non-empty JSON array of ids")),
        };
        let pk = self.resource.id_field();
        let mut ids: Vec<Value> = Vec::with_capacity(items.len());
        for (i, raw) in items.iter().enumerate() {
            let id = match raw {
                Value::String(s) => pk.parse_query(s),
                other => pk.coerce(other),
            }
            .map_err(|msg| AppError::field(pk.name.as_str(), format!("item {}: invalid id: {}", i, msg)))?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn validate(&self, resolved: &Resolved, req: ApiRequest) -> Result<Validated, AppError> {
        let resource = &*self.resource;
        let id = || resolved.ctx.id.clone().unwrap_or(Value::Null);
        Ok(match resolved.ctx.operation {
            Operation::List => {
                let query = Query::compile(&req.query, resource)?;
                let caps = self.adapter.capabilities();
                if query.search.is_some() && caps.search == SearchCapability::None {
                    return Err(AppError::UnsupportedOperation(format!(
                        "search is not supported by the {} backend",
                        self.adapter.name()
                    )));
                }
                if matches!(query.window, Window::Cursor { .. }) && !caps.cursor {
                    return Err(AppError::UnsupportedOperation(format!(
                        "cursor pagination is not supported by the {} backend",
                        self.adapter.name()
                    )));
                }
                Validated::List(query)
            }
            Operation::Retrieve => Validated::Retrieve(id()),
            Operation::Delete if resolved.ctx.id.is_some() => Validated::Delete(id()),
            Operation::Delete => {
                let body = req.body.ok_or_else(|| AppError::validation("bulk delete needs a JSON array of ids"))?;
                Validated::DeleteMany(self.body_ids(&body)?)
            }
            Operation::Create => {
                let body = req.body.ok_or_else(|| AppError::validation("request body is required"))?;
                let (items, bulk) = RequestValidator::validate_create(resource, &body)?;
                Validated::Create { items, bulk }
            }
            Operation::Update => {
                let body = req.body.ok_or_else(|| AppError::validation("request body is required"))?;
                let kind = match resolved.mode {
                    UpdateMode::Full => WriteKind::Replace,
                    UpdateMode::Partial => WriteKind::Merge,
                };
                Validated::Update {
                    id: id(),
                    fields: RequestValidator::validate(resource, &body, kind)?,
                    mode: resolved.mode,
                }
            }
        })
    }

    async fn execute(&self, resolved: &Resolved, validated: Validated) -> Result<Executed, AppError> {
        let resource = &*self.resource;
        let hooks = &resource.hooks;
        let ctx = &resolved.ctx;
        Ok(match validated {
            Validated::List(query) => {
                let page = self.adapter.list(resource, &query).await?;
                Executed::Page {
                    page,
                    window: query.window,
                }
            }
            Validated::Retrieve(id) => Executed::One(self.adapter.get(resource, &id).await?),
            Validated::Delete(id) => {
                self.adapter.delete(resource, &id).await?;
                Executed::Deleted
            }
            Validated::DeleteMany(ids) => {
                let removed = self.adapter.delete_many(resource, &ids).await?;
                if removed == 0 {
                    return Err(AppError::NotFound(format!("no {} matched the given ids", resource.name)));
                }
                tracing::debug!(resource = %resource.name, requested = ids.len(), removed, "bulk delete");
                Executed::Deleted
            }
            Validated::Create { mut items, bulk } => {
                for fields in items.iter_mut() {
                    hooks.run_pre_save(ctx, fields)?;
                }
                let mut created = Vec::with_capacity(items.len());
                for fields in items {
                    created.push(self.adapter.create(resource, fields).await?);
                }
                for entity in &created {
                    hooks.run_post_save(ctx, entity)?;
                }
                if bulk {
                    Executed::CreatedMany(created)
                } else {
                    let entity = created
                        .pop()
                        .ok_or_else(|| AppError::Backend(format!("create on {} returned nothing", resource.name)))?;
                    Executed::Created(entity)
                }
            }
            Validated::Update { id, mut fields, mode } => {
                hooks.run_pre_save(ctx, &mut fields)?;
                let entity = self.adapter.update(resource, &id, fields, mode).await?;
                hooks.run_post_save(ctx, &entity)?;
                Executed::One(entity)
            }
        })
    }

    fn serialize(&self, executed: Executed, projection: &Projection) -> Result<ApiResponse, AppError> {
        Ok(match executed {
            Executed::Page { page, window } => {
                let meta = paginate::format(&page, &window);
                let envelope = ListEnvelope {
                    items: page.items.iter().map(|e| self.to_wire(e, projection)).collect(),
                    total: meta.total,
                    next: meta.next.clone(),
                };
                let mut response = ApiResponse::ok(serde_json::to_value(envelope)?);
                response.headers = meta.headers();
                response
            }
            Executed::One(entity) => ApiResponse::ok(self.to_wire(&entity, projection)),
            Executed::Created(entity) => ApiResponse::created(self.to_wire(&entity, projection)),
            Executed::CreatedMany(entities) => ApiResponse::created(Value::Array(
                entities.iter().map(|e| self.to_wire(e, projection)).collect(),
            )),
            Executed::Deleted => ApiResponse::no_content(),
        })
    }

    /// Wire form of an entity: every projected field, in declaration order.
    fn to_wire(&self, entity: &Entity, projection: &Projection) -> Value {
        let mut out = serde_json::Map::new();
        for field in self.resource.fields.iter().filter(|f| projection.includes(&f.name)) {
            let value = entity.get(&field.name).unwrap_or(&Value::Null);
            out.insert(field.name.clone(), field.serialize(value));
        }
        Value::Object(out)
    }
}
