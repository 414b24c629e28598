//! OpenAPI 3.1 document derived from the registered resources.
//!
//! The document only depends on descriptors and adapter capabilities, and utoipa keeps paths,
//! components and properties in ordered maps, so rendering the same registry twice yields the
//! same bytes.

use crate::backend::SearchCapability;
use crate::config::{Operation, ResourceDescriptor};
use crate::field::{FieldKind, FieldSchema, IdKind};
use crate::query::{
    Operator, COUNT_PARAM, CURSOR_PARAM, LIMIT_PARAM, OFFSET_PARAM, OPERATOR_SEPARATOR, SCHEMA_EXCLUDE_PARAM,
    SCHEMA_ONLY_PARAM, SEARCH_PARAM, SORT_PARAM,
};
use crate::registry::Api;
use crate::service::Endpoint;
use serde_json::json;
use utoipa::openapi::path::{HttpMethod, Operation as PathOperation, OperationBuilder, Parameter, ParameterBuilder, ParameterIn, ParameterStyle, PathItemBuilder};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::response::ResponseBuilder;
use utoipa::openapi::schema::{ArrayBuilder, KnownFormat, ObjectBuilder, SchemaFormat, SchemaType, Type};
use utoipa::openapi::tag::TagBuilder;
use utoipa::openapi::{
    ComponentsBuilder, ContentBuilder, InfoBuilder, OpenApi, OpenApiBuilder, PathsBuilder, Ref, RefOr, Required, Response,
    Schema,
};

pub const ERROR_SCHEMA: &str = "Error";

pub fn generate(api: &Api) -> OpenApi {
    let settings = api.settings();
    let prefix = settings.prefix.trim_end_matches('/');
    let mut paths = PathsBuilder::new();
    let mut components = ComponentsBuilder::new().schema(ERROR_SCHEMA, error_schema());
    let mut tags = Vec::new();

    for endpoint in api.endpoints() {
        let resource = endpoint.resource();
        let name = resource.schema_name();
        components = components
            .schema(name.clone(), resource_schema(resource))
            .schema(format!("{}Page", name), page_schema(&name));
        if resource.allows(Operation::Update) {
            components = components.schema(format!("{}Patch", name), patch_schema(resource));
        }
        tags.push(
            TagBuilder::new()
                .name(resource.name.clone())
                .description(resource.description.clone())
                .build(),
        );

        let mut collection = PathItemBuilder::new();
        let mut collection_ops = 0;
        if resource.allows(Operation::List) {
            collection = collection.operation(HttpMethod::Get, list_operation(endpoint));
            collection_ops += 1;
        }
        if resource.allows(Operation::Create) {
            collection = collection.operation(HttpMethod::Post, create_operation(resource));
            collection_ops += 1;
        }
        if resource.allows(Operation::Delete) {
            collection = collection.operation(HttpMethod::Delete, bulk_delete_operation(resource));
            collection_ops += 1;
        }
        if collection_ops > 0 {
            paths = paths.path(format!("{}/{}/", prefix, resource.name), collection.build());
        }

        let mut item = PathItemBuilder::new();
        let mut item_ops = 0;
        if resource.allows(Operation::Retrieve) {
            item = item.operation(HttpMethod::Get, retrieve_operation(resource));
            item_ops += 1;
        }
        if resource.allows(Operation::Update) {
            item = item
                .operation(HttpMethod::Put, update_operation(resource, false))
                .operation(HttpMethod::Patch, update_operation(resource, true));
            item_ops += 1;
        }
        if resource.allows(Operation::Delete) {
            item = item.operation(HttpMethod::Delete, delete_operation(resource));
            item_ops += 1;
        }
        if item_ops > 0 {
            paths = paths.path(format!("{}/{}/{{id}}/", prefix, resource.name), item.build());
        }
    }

    OpenApiBuilder::new()
        .info(InfoBuilder::new().title(settings.title.clone()).version(settings.version.clone()).build())
        .paths(paths.build())
        .components(Some(components.build()))
        .tags(Some(tags))
        .build()
}

fn kind_type(kind: &FieldKind) -> (Type, Option<KnownFormat>) {
    match kind {
        FieldKind::String | FieldKind::Enum(_) | FieldKind::Id(IdKind::Text) => (Type::String, None),
        FieldKind::Int | FieldKind::Id(IdKind::Int) => (Type::Integer, Some(KnownFormat::Int64)),
        FieldKind::Float => (Type::Number, Some(KnownFormat::Double)),
        FieldKind::Bool => (Type::Boolean, None),
        FieldKind::Datetime => (Type::String, Some(KnownFormat::DateTime)),
        FieldKind::Id(IdKind::Uuid) => (Type::String, Some(KnownFormat::Uuid)),
    }
}

/// Bare value schema for a field kind: type, format and enum values.
fn value_schema(kind: &FieldKind, nullable: bool) -> ObjectBuilder {
    let (ty, format) = kind_type(kind);
    let schema_type = if nullable {
        SchemaType::Array(vec![ty, Type::Null])
    } else {
        SchemaType::Type(ty)
    };
    let mut b = ObjectBuilder::new()
        .schema_type(schema_type)
        .format(format.map(SchemaFormat::KnownFormat));
    if let FieldKind::Enum(values) = kind {
        b = b.enum_values(Some(values.clone()));
    }
    b
}

fn property_schema(field: &FieldSchema) -> ObjectBuilder {
    let rules = &field.rules;
    let mut b = value_schema(&field.kind, field.nullable)
        .description(field.description.clone())
        .max_length(rules.max_length.map(|n| n as usize))
        .min_length(rules.min_length.map(|n| n as usize))
        .pattern(rules.pattern.as_ref().map(|re| re.as_str().to_string()))
        .minimum(rules.minimum)
        .maximum(rules.maximum);
    if field.read_only {
        b = b.read_only(Some(true));
    }
    b
}

fn resource_schema(resource: &ResourceDescriptor) -> Schema {
    let mut b = ObjectBuilder::new()
        .schema_type(SchemaType::Type(Type::Object))
        .title(Some(resource.schema_name()))
        .description(resource.description.clone());
    for field in &resource.fields {
        b = b.property(field.name.clone(), property_schema(field));
        if field.required_on_write() {
            b = b.required(field.name.clone());
        }
    }
    Schema::Object(b.build())
}

/// PATCH body: the writable fields, none required.
fn patch_schema(resource: &ResourceDescriptor) -> Schema {
    let mut b = ObjectBuilder::new()
        .schema_type(SchemaType::Type(Type::Object))
        .title(Some(format!("{}Patch", resource.schema_name())));
    for field in resource.writable_fields() {
        b = b.property(field.name.clone(), property_schema(field));
    }
    Schema::Object(b.build())
}

fn page_schema(name: &str) -> Schema {
    Schema::Object(
        ObjectBuilder::new()
            .schema_type(SchemaType::Type(Type::Object))
            .property("items", ArrayBuilder::new().items(Ref::from_schema_name(name)))
            .required("items")
            .property(
                "total",
                ObjectBuilder::new()
                    .schema_type(SchemaType::Type(Type::Integer))
                    .description(Some("Present only when count=true was requested")),
            )
            .property(
                "next",
                ObjectBuilder::new()
                    .schema_type(SchemaType::Array(vec![Type::Integer, Type::String]))
                    .description(Some("Next offset, or cursor token in cursor mode")),
            )
            .build(),
    )
}

fn error_schema() -> Schema {
    let text = || ObjectBuilder::new().schema_type(SchemaType::Type(Type::String));
    Schema::Object(
        ObjectBuilder::new()
            .schema_type(SchemaType::Type(Type::Object))
            .property("error", text())
            .property("message", text())
            .property("field", text())
            .required("error")
            .required("message")
            .build(),
    )
}

fn json_response(description: &str, schema: impl Into<RefOr<Schema>>) -> RefOr<Response> {
    RefOr::T(
        ResponseBuilder::new()
            .description(description)
            .content("application/json", ContentBuilder::new().schema(Some(schema)).build())
            .build(),
    )
}

fn error_response(description: &str) -> RefOr<Response> {
    json_response(description, Ref::from_schema_name(ERROR_SCHEMA))
}

fn query_param(name: impl Into<String>, schema: impl Into<RefOr<Schema>>, description: &str) -> Parameter {
    ParameterBuilder::new()
        .name(name)
        .parameter_in(ParameterIn::Query)
        .required(Required::False)
        .schema(Some(schema))
        .description(Some(description))
        .build()
}

fn id_param(resource: &ResourceDescriptor) -> Parameter {
    ParameterBuilder::new()
        .name("id")
        .parameter_in(ParameterIn::Path)
        .required(Required::True)
        .schema(Some(value_schema(&resource.id_field().kind, false)))
        .build()
}

fn list_parameters(endpoint: &Endpoint) -> Vec<Parameter> {
    let resource = endpoint.resource();
    let caps = endpoint.adapter().capabilities();
    let mut params = Vec::new();

    for field in resource.fields.iter().filter(|f| f.filterable) {
        params.push(query_param(
            field.name.clone(),
            value_schema(&field.kind, false),
            &format!("{} equals", field.name),
        ));
        for op in Operator::ALL.iter().filter(|op| op.valid_for(&field.kind)) {
            let schema = if op.takes_list() {
                ObjectBuilder::new().schema_type(SchemaType::Type(Type::String))
            } else {
                value_schema(&field.kind, false)
            };
            let description = if op.takes_list() {
                format!("{} {} (comma-separated)", field.name, op.as_str())
            } else {
                format!("{} {}", field.name, op.as_str())
            };
            params.push(query_param(
                format!("{}{}{}", field.name, OPERATOR_SEPARATOR, op.as_str()),
                schema,
                &description,
            ));
        }
    }

    let sort_values: Vec<String> = resource
        .fields
        .iter()
        .filter(|f| f.sortable)
        .flat_map(|f| [f.name.clone(), format!("-{}", f.name)])
        .collect();
    params.push(
        ParameterBuilder::new()
            .name(SORT_PARAM)
            .parameter_in(ParameterIn::Query)
            .required(Required::False)
            .style(Some(ParameterStyle::Form))
            .explode(Some(false))
            .schema(Some(
                ArrayBuilder::new().items(
                    ObjectBuilder::new()
                        .schema_type(SchemaType::Type(Type::String))
                        .enum_values(Some(sort_values)),
                ),
            ))
            .description(Some("Comma-separated sort keys; a leading '-' sorts descending"))
            .build(),
    );
    params.push(query_param(
        LIMIT_PARAM,
        ObjectBuilder::new()
            .schema_type(SchemaType::Type(Type::Integer))
            .minimum(Some(1))
            .maximum(Some(resource.max_page_size))
            .default(Some(json!(resource.default_page_size))),
        "Page size",
    ));
    params.push(query_param(
        OFFSET_PARAM,
        ObjectBuilder::new()
            .schema_type(SchemaType::Type(Type::Integer))
            .minimum(Some(0)),
        "Items to skip",
    ));
    if caps.cursor {
        params.push(query_param(
            CURSOR_PARAM,
            ObjectBuilder::new().schema_type(SchemaType::Type(Type::String)),
            "Opaque cursor from a previous page's next",
        ));
    }
    if caps.search != SearchCapability::None {
        params.push(query_param(
            SEARCH_PARAM,
            ObjectBuilder::new().schema_type(SchemaType::Type(Type::String)),
            "Match across searchable fields",
        ));
    }
    params.push(query_param(
        COUNT_PARAM,
        ObjectBuilder::new().schema_type(SchemaType::Type(Type::Boolean)),
        "Include the total count",
    ));
    params
}

fn projection_parameters() -> [Parameter; 2] {
    let names = || ObjectBuilder::new().schema_type(SchemaType::Type(Type::String));
    [
        query_param(SCHEMA_ONLY_PARAM, names(), "Comma-separated fields to keep in the response"),
        query_param(SCHEMA_EXCLUDE_PARAM, names(), "Comma-separated fields to drop from the response"),
    ]
}

fn operation_base(resource: &ResourceDescriptor, id: &str, summary: String) -> OperationBuilder {
    OperationBuilder::new()
        .tag(resource.name.clone())
        .operation_id(Some(format!("{}_{}", id, resource.name)))
        .summary(Some(summary))
}

fn list_operation(endpoint: &Endpoint) -> PathOperation {
    let resource = endpoint.resource();
    let name = resource.schema_name();
    let mut b = operation_base(resource, "list", format!("List {}", resource.name));
    for p in list_parameters(endpoint).into_iter().chain(projection_parameters()) {
        b = b.parameter(p);
    }
    b.response("200", json_response("Page of items", Ref::from_schema_name(format!("{}Page", name))))
        .response("400", error_response("Invalid filter, sort or pagination"))
        .build()
}

fn create_operation(resource: &ResourceDescriptor) -> PathOperation {
    let name = resource.schema_name();
    operation_base(resource, "create", format!("Create {}", resource.name))
        .parameters(Some(projection_parameters()))
        .request_body(Some(
            RequestBodyBuilder::new()
                .content(
                    "application/json",
                    ContentBuilder::new().schema(Some(Ref::from_schema_name(name.clone()))).build(),
                )
                .required(Some(Required::True))
                .build(),
        ))
        .response("201", json_response("Created", Ref::from_schema_name(name)))
        .response("400", error_response("Validation failed"))
        .response("409", error_response("Constraint violation"))
        .build()
}

fn retrieve_operation(resource: &ResourceDescriptor) -> PathOperation {
    operation_base(resource, "retrieve", format!("Retrieve {}", resource.name))
        .parameter(id_param(resource))
        .parameters(Some(projection_parameters()))
        .response("200", json_response("Item", Ref::from_schema_name(resource.schema_name())))
        .response("404", error_response("Not found"))
        .build()
}

fn update_operation(resource: &ResourceDescriptor, partial: bool) -> PathOperation {
    let name = resource.schema_name();
    let (id, summary, body) = if partial {
        ("partial_update", format!("Partially update {}", resource.name), format!("{}Patch", name))
    } else {
        ("update", format!("Replace {}", resource.name), name.clone())
    };
    operation_base(resource, id, summary)
        .parameter(id_param(resource))
        .parameters(Some(projection_parameters()))
        .request_body(Some(
            RequestBodyBuilder::new()
                .content(
                    "application/json",
                    ContentBuilder::new().schema(Some(Ref::from_schema_name(body))).build(),
                )
                .required(Some(Required::True))
                .build(),
        ))
        .response("200", json_response("Updated", Ref::from_schema_name(name)))
        .response("400", error_response("Validation failed"))
        .response("404", error_response("Not found"))
        .response("409", error_response("Constraint violation"))
        .build()
}

fn delete_operation(resource: &ResourceDescriptor) -> PathOperation {
    operation_base(resource, "destroy", format!("Delete {}", resource.name))
        .parameter(id_param(resource))
        .response("204", RefOr::T(ResponseBuilder::new().description("Deleted").build()))
        .response("404", error_response("Not found"))
        .build()
}

fn bulk_delete_operation(resource: &ResourceDescriptor) -> PathOperation {
    let ids = ArrayBuilder::new().items(value_schema(&resource.id_field().kind, false)).min_items(Some(1));
    operation_base(resource, "bulk_destroy", format!("Delete several {}", resource.name))
        .request_body(Some(
            RequestBodyBuilder::new()
                .description(Some("Ids to delete"))
                .content("application/json", ContentBuilder::new().schema(Some(ids)).build())
                .required(Some(Required::True))
                .build(),
        ))
        .response("204", RefOr::T(ResponseBuilder::new().description("Deleted").build()))
        .response("400", error_response("Invalid id list"))
        .response("404", error_response("No id matched"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendAdapter, DocumentStore};
    use crate::config::{resolve, ApiSettings, ResourceConfig};
    use std::sync::Arc;

    fn three_fields(operations: &[&str]) -> ResourceConfig {
        serde_json::from_value(json!({
            "name": "people",
            "operations": operations,
            "fields": [
                {"name": "id", "type": "id"},
                {"name": "name", "type": "string", "filterable": true, "sortable": true},
                {"name": "age", "type": "int", "filterable": true}
            ]
        }))
        .unwrap()
    }

    fn api(operations: &[&str]) -> Arc<Api> {
        let settings = ApiSettings::default();
        let store: Arc<dyn BackendAdapter> = Arc::new(DocumentStore::new());
        let mut builder = Api::builder(settings.clone());
        builder
            .register(resolve(&three_fields(operations), &settings).unwrap(), store)
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn one_property_per_field() {
        let doc = generate(&api(&["list", "create", "retrieve", "update", "delete"]));
        let components = doc.components.unwrap();
        match components.schemas.get("People") {
            Some(RefOr::T(Schema::Object(obj))) => {
                assert_eq!(obj.properties.len(), 3);
                assert!(obj.properties.contains_key("age"));
            }
            _ => panic!("People schema missing"),
        }
        assert!(components.schemas.contains_key("PeoplePage"));
        assert!(components.schemas.contains_key(ERROR_SCHEMA));
    }

    #[test]
    fn operations_follow_allowed_set() {
        let doc = generate(&api(&["list", "retrieve"]));
        let collection = doc.paths.paths.get("/api/people/").unwrap();
        assert!(collection.get.is_some());
        assert!(collection.post.is_none() && collection.delete.is_none());
        let item = doc.paths.paths.get("/api/people/{id}/").unwrap();
        assert!(item.get.is_some());
        assert!(item.put.is_none() && item.patch.is_none() && item.delete.is_none());
    }

    #[test]
    fn list_advertises_filters_and_search() {
        let doc = generate(&api(&["list"]));
        let list = doc.paths.paths.get("/api/people/").unwrap().get.clone().unwrap();
        let names: Vec<String> = list.parameters.unwrap().into_iter().map(|p| p.name).collect();
        for expected in [
            "name",
            "name__contains",
            "age__gte",
            "age__in",
            "sort",
            "limit",
            "cursor",
            "search",
            "count",
            "schema_only",
            "schema_exclude",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
        assert!(!names.iter().any(|n| n == "age__contains"));
    }

    #[test]
    fn patch_body_has_no_required_fields() {
        let doc = generate(&api(&["update", "delete"]));
        let schemas = doc.components.unwrap().schemas;
        match schemas.get("People") {
            Some(RefOr::T(Schema::Object(obj))) => assert_eq!(obj.required, vec!["name", "age"]),
            _ => panic!("People schema missing"),
        }
        match schemas.get("PeoplePatch") {
            Some(RefOr::T(Schema::Object(obj))) => {
                assert!(obj.required.is_empty());
                assert!(!obj.properties.contains_key("id"));
            }
            _ => panic!("PeoplePatch schema missing"),
        }

        let item = doc.paths.paths.get("/api/people/{id}/").unwrap();
        let body_ref = |op: &PathOperation| {
            let body = op.request_body.clone().unwrap();
            match body.content.get("application/json").and_then(|c| c.schema.clone()) {
                Some(RefOr::Ref(r)) => r.ref_location,
                _ => panic!("request body is not a reference"),
            }
        };
        assert_eq!(body_ref(item.patch.as_ref().unwrap()), "#/components/schemas/PeoplePatch");
        assert_eq!(body_ref(item.put.as_ref().unwrap()), "#/components/schemas/People");
        assert!(doc.paths.paths.get("/api/people/").unwrap().delete.is_some());
    }

    #[test]
    fn regenerating_is_byte_identical() {
        let api = api(&["list", "create", "retrieve", "update", "delete"]);
        let first = generate(&api).to_pretty_json().unwrap();
        let second = generate(&api).to_pretty_json().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, api.schema_json());
    }
}
