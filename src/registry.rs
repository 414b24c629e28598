//! Append-only API registry: resources are registered at startup, then frozen.

use crate::backend::BackendAdapter;
use crate::config::{resolve, ApiSettings, ResourceConfig, ResourceDescriptor};
use crate::error::{AppError, ConfigError};
use crate::limits::{MemoryRateLimiter, RateLimiter};
use crate::response::ApiResponse;
use crate::service::{ApiRequest, Endpoint};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Returned by registration: the resource name and its collection path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceHandle {
    pub name: String,
    pub path: String,
}

pub struct ApiBuilder {
    settings: ApiSettings,
    endpoints: BTreeMap<String, Endpoint>,
    limiter: Arc<dyn RateLimiter>,
}

impl ApiBuilder {
    /// Replace the in-memory rate limiter (e.g. one shared across processes).
    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn register(
        &mut self,
        resource: ResourceDescriptor,
        adapter: Arc<dyn BackendAdapter>,
    ) -> Result<ResourceHandle, ConfigError> {
        if self.endpoints.contains_key(&resource.name) {
            return Err(ConfigError::DuplicateResource(resource.name));
        }
        let handle = ResourceHandle {
            path: format!("{}/{}", self.settings.prefix.trim_end_matches('/'), resource.name),
            name: resource.name.clone(),
        };
        let limit = resource.rate_limit.unwrap_or(self.settings.rate_limit);
        tracing::info!(
            resource = %handle.name,
            backend = adapter.name(),
            path = %handle.path,
            rate_limit = limit,
            "registered resource"
        );
        let endpoint = Endpoint::new(resource, adapter).with_rate_limit(self.limiter.clone(), limit);
        self.endpoints.insert(handle.name.clone(), endpoint);
        Ok(handle)
    }

    /// Resolve a declarative config against the builder's settings, then register it.
    pub fn register_config(
        &mut self,
        config: &ResourceConfig,
        adapter: Arc<dyn BackendAdapter>,
    ) -> Result<ResourceHandle, ConfigError> {
        let resource = resolve(config, &self.settings)?;
        self.register(resource, adapter)
    }

    /// Freeze the registry and render the schema document once.
    pub fn build(self) -> Result<Arc<Api>, ConfigError> {
        let mut api = Api {
            settings: self.settings,
            endpoints: self.endpoints,
            schema_json: String::new(),
        };
        api.schema_json = crate::openapi::generate(&api)
            .to_pretty_json()
            .map_err(|e| ConfigError::Schema(e.to_string()))?;
        Ok(Arc::new(api))
    }
}

pub struct Api {
    settings: ApiSettings,
    endpoints: BTreeMap<String, Endpoint>,
    schema_json: String,
}

impl Api {
    pub fn builder(settings: ApiSettings) -> ApiBuilder {
        let period = Duration::from_secs(settings.rate_limit_period_secs.max(1));
        ApiBuilder {
            settings,
            endpoints: BTreeMap::new(),
            limiter: Arc::new(MemoryRateLimiter::new(period)),
        }
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    /// Endpoints ordered by resource name.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// The OpenAPI document rendered at build time.
    pub fn schema_json(&self) -> &str {
        &self.schema_json
    }

    /// Route a request to the named resource's endpoint.
    pub async fn dispatch(&self, resource: &str, req: ApiRequest) -> Result<ApiResponse, AppError> {
        let endpoint = self
            .endpoint(resource)
            .ok_or_else(|| AppError::NotFound(format!("resource {}", resource)))?;
        endpoint.handle(req).await
    }
}
