//! Resolved resource model: config validated and flattened for runtime use.

use crate::field::FieldSchema;
use crate::query::SortSpec;
use crate::service::Hooks;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    List,
    Create,
    Retrieve,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::List,
        Operation::Create,
        Operation::Retrieve,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn parse(s: &str) -> Option<Operation> {
        Some(match s {
            "list" => Operation::List,
            "create" => Operation::Create,
            "retrieve" => Operation::Retrieve,
            "update" => Operation::Update,
            "delete" => Operation::Delete,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Retrieve => "retrieve",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an SQL adapter finds the resource's rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageTarget {
    pub schema: Option<String>,
    pub table: String,
}

/// Immutable description of one resource, built at registration and shared by every request.
#[derive(Clone, Debug)]
pub struct ResourceDescriptor {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    pub(crate) id_index: usize,
    pub operations: BTreeSet<Operation>,
    /// Sort used when the request has none; does not include the id tie-break.
    pub default_sort: SortSpec,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub always_count: bool,
    pub rate_limit: Option<u32>,
    pub storage: StorageTarget,
    pub hooks: Hooks,
    pub description: Option<String>,
}

impl ResourceDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn id_field(&self) -> &FieldSchema {
        &self.fields[self.id_index]
    }

    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    /// Fields a client may write.
    pub fn writable_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| !f.read_only && !f.is_id())
    }

    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.searchable)
    }

    /// Attach pre-save / post-save / permission hooks.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Schema component name, e.g. "people" -> "People".
    pub fn schema_name(&self) -> String {
        self.name
            .split(['_', '-'])
            .filter(|s| !s.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect()
    }
}
