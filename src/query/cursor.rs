//! Opaque keyset cursors.
//!
//! A cursor is base64url JSON holding the sort-key tuple of the last returned item and a
//! checksum over that tuple, the resource name and the sort signature. A token edited by hand,
//! or replayed against another resource or ordering, fails to decode.

use super::SortSpec;
use crate::backend::Entity;
use crate::config::ResourceDescriptor;
use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

const CURSOR_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    v: u8,
    k: Vec<Value>,
    c: String,
}

pub struct CursorToken;

impl CursorToken {
    pub fn encode(resource: &str, sort: &SortSpec, key: &[Value]) -> Result<String, AppError> {
        let payload = CursorPayload {
            v: CURSOR_VERSION,
            k: key.to_vec(),
            c: checksum(resource, sort, key)?,
        };
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?))
    }

    /// Cursor resuming after `entity` under `sort`.
    pub fn for_entity(resource: &ResourceDescriptor, sort: &SortSpec, entity: &Entity) -> Result<String, AppError> {
        let key: Vec<Value> = sort
            .keys()
            .iter()
            .map(|k| entity.get(&k.field).cloned().unwrap_or(Value::Null))
            .collect();
        Self::encode(&resource.name, sort, &key)
    }

    /// Decode and verify a token, returning the sort-key tuple it resumes after.
    pub fn decode(token: &str, resource: &ResourceDescriptor, sort: &SortSpec) -> Result<Vec<Value>, AppError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AppError::InvalidCursor)?;
        let payload: CursorPayload = serde_json::from_slice(&bytes).map_err(|_| AppError::InvalidCursor)?;
        if payload.v != CURSOR_VERSION || payload.k.len() != sort.keys().len() {
            return Err(AppError::InvalidCursor);
        }
        if payload.c != checksum(&resource.name, sort, &payload.k)? {
            tracing::debug!(resource = %resource.name, "cursor checksum mismatch");
            return Err(AppError::InvalidCursor);
        }
        for (key, value) in sort.keys().iter().zip(&payload.k) {
            let field = resource.field(&key.field).ok_or(AppError::InvalidCursor)?;
            if !value.is_null() && field.coerce(value).is_err() {
                return Err(AppError::InvalidCursor);
            }
        }
        Ok(payload.k)
    }
}

fn checksum(resource: &str, sort: &SortSpec, key: &[Value]) -> Result<String, AppError> {
    let mut hasher = Sha256::new();
    hasher.update(resource.as_bytes());
    hasher.update([0u8]);
    hasher.update(sort.signature().as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(key)?);
    let digest = hasher.finalize();
    Ok(URL_SAFE_NO_PAD.encode(&digest[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::people;
    use crate::query::SortKey;
    use serde_json::json;

    fn spec() -> SortSpec {
        SortSpec(vec![SortKey::desc("name"), SortKey::asc("id")])
    }

    #[test]
    fn decodes_what_it_encodes() {
        let token = CursorToken::encode("people", &spec(), &[json!("x"), json!(3)]).unwrap();
        let key = CursorToken::decode(&token, &people(), &spec()).unwrap();
        assert_eq!(key, vec![json!("x"), json!(3)]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            CursorToken::decode("not-a-cursor!", &people(), &spec()),
            Err(AppError::InvalidCursor)
        ));
    }

    #[test]
    fn tampered_key_is_rejected() {
        let token = CursorToken::encode("people", &spec(), &[json!("x"), json!(3)]).unwrap();
        let bytes = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let mut payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        payload["k"][1] = json!(4);
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        assert!(matches!(
            CursorToken::decode(&forged, &people(), &spec()),
            Err(AppError::InvalidCursor)
        ));
    }

    #[test]
    fn other_sort_is_rejected() {
        let token = CursorToken::encode("people", &spec(), &[json!("x"), json!(3)]).unwrap();
        let other = SortSpec(vec![SortKey::asc("name"), SortKey::asc("id")]);
        assert!(matches!(
            CursorToken::decode(&token, &people(), &other),
            Err(AppError::InvalidCursor)
        ));
    }
}
