//! Session cookie plumbing.
//!
//! The cookie value is `<session id>.<tag>`, where the tag is derived from
//! the session id and the configured secret. The id itself is an opaque
//! uuid; all session data lives server-side. The tag only stops casual
//! tampering with the cookie value; a forged id without the secret never
//! opens.

use axum::http::{header, HeaderMap, HeaderValue};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "campus_session";

fn tag_for(secret: &str, session_id: &str) -> String {
    let namespace = Uuid::new_v5(&Uuid::NAMESPACE_OID, secret.as_bytes());
    Uuid::new_v5(&namespace, session_id.as_bytes()).simple().to_string()
}

/// Produces the cookie value for a session id.
pub fn seal(secret: &str, session_id: &str) -> String {
    format!("{session_id}.{}", tag_for(secret, session_id))
}

/// Recovers the session id from a cookie value, rejecting values whose
/// tag does not match the secret.
pub fn open(secret: &str, cookie_value: &str) -> Option<String> {
    let (session_id, tag) = cookie_value.rsplit_once('.')?;
    if tag == tag_for(secret, session_id) {
        Some(session_id.to_string())
    } else {
        None
    }
}

/// Extracts the verified session id from the request's `Cookie` headers.
pub fn session_id_from_headers(secret: &str, headers: &HeaderMap) -> Option<String> {
    for header_value in headers.get_all(header::COOKIE) {
        let raw = header_value.to_str().ok()?;
        for pair in raw.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            if name.trim() == SESSION_COOKIE {
                if let Some(session_id) = open(secret, value.trim()) {
                    return Some(session_id);
                }
            }
        }
    }
    None
}

/// `Set-Cookie` value for a fresh session.
pub fn set_cookie_value(secret: &str, session_id: &str) -> HeaderValue {
    let value = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        seal(secret, session_id)
    );
    HeaderValue::from_str(&value)
        .unwrap_or_else(|_| HeaderValue::from_static("campus_session=invalid; Path=/"))
}

/// `Set-Cookie` value that expires the session cookie (logout).
pub fn clear_cookie_value() -> HeaderValue {
    HeaderValue::from_static(
        "campus_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_cookie_opens_with_the_same_secret() {
        let sealed = seal("secret-a", "sid-1");
        assert_eq!(open("secret-a", &sealed), Some("sid-1".to_string()));
    }

    #[test]
    fn wrong_secret_or_tampered_id_is_rejected() {
        let sealed = seal("secret-a", "sid-1");
        assert_eq!(open("secret-b", &sealed), None);

        let tampered = sealed.replacen("sid-1", "sid-2", 1);
        assert_eq!(open("secret-a", &tampered), None);
        assert_eq!(open("secret-a", "no-separator"), None);
    }

    #[test]
    fn session_id_is_parsed_out_of_a_multi_cookie_header() {
        let mut headers = HeaderMap::new();
        let cookie = format!("theme=dark; {}={}; lang=pt", SESSION_COOKIE, seal("s", "sid-9"));
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).expect("header"));
        assert_eq!(session_id_from_headers("s", &headers), Some("sid-9".to_string()));
        assert_eq!(session_id_from_headers("other", &headers), None);
    }
}
