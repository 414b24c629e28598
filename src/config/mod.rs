pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;
pub mod settings;

pub use types::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
pub use settings::*;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use serde_json::json;

    /// `id:int, name:string(filterable, sortable, searchable), age:int(filterable, sortable), bio:string(nullable)`.
    pub fn people_config() -> ResourceConfig {
        serde_json::from_value(json!({
            "name": "people",
            "fields": [
                {"name": "id", "type": "id", "filterable": true},
                {"name": "name", "type": "string", "filterable": true, "sortable": true, "searchable": true, "required": true},
                {"name": "age", "type": "int", "filterable": true, "sortable": true},
                {"name": "bio", "type": "string", "nullable": true, "searchable": true}
            ],
            "default_sort": ["name"],
            "default_page_size": 10,
            "max_page_size": 50
        }))
        .expect("people config")
    }

    pub fn people() -> ResourceDescriptor {
        resolve(&people_config(), &ApiSettings::default()).expect("people descriptor")
    }
}
