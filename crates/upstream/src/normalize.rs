//! Resilience layer over the upstream's inconsistent JSON shapes.
//!
//! The upstream API wraps lists under varying keys and names the same
//! logical field differently per resource (and sometimes per endpoint of
//! the same resource). Normalization resolves each field through a fixed
//! priority list: entity-specific synonym first, generic synonym last,
//! first non-empty value wins.

use serde_json::{Map, Value};
use shared::domain::{CanonicalEntity, Identity, Role};
use shared::error::UpstreamFailure;

/// Wrapper keys tried, in order, when a list endpoint returns an object
/// instead of a bare array.
const GENERIC_WRAPPERS: &[&str] = &["data", "items", "results", "lista"];

const GENERIC_ID_KEYS: &[&str] = &["id", "uuid", "_id", "codigo"];
const GENERIC_NAME_KEYS: &[&str] = &["name", "nome", "titulo", "title", "descricao"];
const GENERIC_CATEGORY_KEYS: &[&str] = &["category", "categoria", "tipo", "area"];

const EMAIL_KEYS: &[&str] = &["email", "e_mail"];
const NAME_PLACEHOLDER: &str = "(unnamed)";

/// Per-resource key priorities, consulted before the generic synonyms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListKeys {
    pub wrappers: &'static [&'static str],
    pub id: &'static [&'static str],
    pub name: &'static [&'static str],
    pub category: &'static [&'static str],
}

/// Normalizes a list response into canonical entities. Accepts either a
/// bare JSON array or an object wrapping an array; an unrecognized shape
/// yields an empty list rather than an error.
pub fn normalize_list(raw: &Value, keys: &ListKeys) -> Vec<CanonicalEntity> {
    let Some(items) = unwrap_array(raw, keys.wrappers) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| item.as_object())
        .map(|obj| normalize_entity(obj, keys))
        .collect()
}

fn normalize_entity(obj: &Map<String, Value>, keys: &ListKeys) -> CanonicalEntity {
    let id = first_non_empty(obj, keys.id)
        .or_else(|| first_non_empty(obj, GENERIC_ID_KEYS))
        .map(stringify)
        .unwrap_or_default();
    let name = first_non_empty(obj, keys.name)
        .or_else(|| first_non_empty(obj, GENERIC_NAME_KEYS))
        .map(stringify)
        .unwrap_or_else(|| name_fallback(obj));
    let category = first_non_empty(obj, keys.category)
        .or_else(|| first_non_empty(obj, GENERIC_CATEGORY_KEYS))
        .map(stringify);
    CanonicalEntity { id, name, category }
}

fn unwrap_array<'a>(raw: &'a Value, wrappers: &[&str]) -> Option<&'a Vec<Value>> {
    if let Some(items) = raw.as_array() {
        return Some(items);
    }
    let obj = raw.as_object()?;
    for key in wrappers.iter().chain(GENERIC_WRAPPERS) {
        if let Some(items) = obj.get(*key).and_then(Value::as_array) {
            return Some(items);
        }
    }
    None
}

/// First candidate key holding a non-empty value. Null and blank strings
/// do not count as present.
pub fn first_non_empty<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| {
        obj.get(*key).filter(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
    })
}

/// Stringifies a scalar the way the upstream mixes them: integer ids,
/// UUID strings, and plain strings all become strings.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn name_fallback(obj: &Map<String, Value>) -> String {
    first_non_empty(obj, EMAIL_KEYS)
        .and_then(Value::as_str)
        .and_then(|email| email.split('@').next())
        .filter(|local| !local.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NAME_PLACEHOLDER.to_string())
}

/// Extracts an authenticated identity from the login response body. The
/// token is the only hard requirement; everything else degrades through
/// the usual candidate-key fallbacks.
pub fn parse_identity(raw: &Value) -> Result<Identity, UpstreamFailure> {
    let obj = raw.as_object().ok_or_else(|| UpstreamFailure::Malformed {
        context: "login response is not a JSON object".into(),
    })?;
    // Some iterations of the upstream nest the user under "user"/"usuario".
    let user = first_non_empty(obj, &["user", "usuario", "dados"])
        .and_then(Value::as_object)
        .unwrap_or(obj);

    let token = first_non_empty(obj, &["token", "access_token", "jwt"])
        .or_else(|| first_non_empty(user, &["token", "access_token", "jwt"]))
        .and_then(Value::as_str)
        .ok_or_else(|| UpstreamFailure::Malformed {
            context: "login response carries no token".into(),
        })?
        .to_string();

    let user_id = first_non_empty(user, &["id", "user_id", "uuid", "matricula"])
        .map(stringify)
        .unwrap_or_default();
    let display_name = first_non_empty(user, &["nome", "name", "nome_completo", "username"])
        .map(stringify)
        .unwrap_or_else(|| name_fallback(user));
    let role = first_non_empty(user, &["tipo", "role", "perfil", "cargo"])
        .and_then(Value::as_str)
        .map(Role::parse)
        .unwrap_or(Role::Other("unknown".into()));

    Ok(Identity {
        user_id,
        display_name,
        role,
        token,
    })
}
