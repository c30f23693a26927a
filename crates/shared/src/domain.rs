use serde::{Deserialize, Serialize};

/// Role reported by the upstream API for an authenticated user.
///
/// The upstream is not consistent about its role vocabulary, so unknown
/// strings are carried through verbatim instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coordinator,
    Professor,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "coordenador" | "coordinator" | "admin" => Role::Coordinator,
            "professor" | "docente" | "teacher" => Role::Professor,
            _ => Role::Other(raw.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Role::Coordinator => "coordinator",
            Role::Professor => "professor",
            Role::Other(raw) => raw.as_str(),
        }
    }
}

/// Authenticated identity held in the session between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    /// Opaque bearer token minted by the upstream login endpoint.
    pub token: String,
}

/// Normalized view of an upstream JSON object after resolving its
/// ambiguous field names. `id` is always stringified; the upstream mixes
/// integer ids, UUID strings, and plain strings across resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
}
