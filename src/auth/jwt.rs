// src/auth/jwt.rs
//
// Claim inspection only. Signatures are not checked; Graph does that.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;

/// Decode the payload segment of a JWT into JSON.
pub fn claims(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Delegated scopes (`scp`) granted to the token, falling back to app `roles`.
pub fn token_scopes(token: &str) -> Vec<String> {
    let Some(c) = claims(token) else {
        return Vec::new();
    };
    if let Some(scp) = c.get("scp").and_then(Value::as_str) {
        return scp.split_whitespace().map(str::to_string).collect();
    }
    c.get("roles")
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn account_name(token: &str) -> Option<String> {
    let c = claims(token)?;
    ["preferred_username", "upn", "unique_name", "email"]
        .iter()
        .find_map(|k| c.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jwt(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_reads_delegated_scopes() {
        let t = fake_jwt(r#"{"scp":"Files.Read.All Sites.Read.All","upn":"ana@contoso.com"}"#);
        assert_eq!(token_scopes(&t), vec!["Files.Read.All", "Sites.Read.All"]);
        assert_eq!(account_name(&t).as_deref(), Some("ana@contoso.com"));
    }

    #[test]
    fn test_opaque_tokens_have_no_claims() {
        assert!(claims("not-a-jwt").is_none());
        assert!(token_scopes("EwBwA8l6BAAU").is_empty());
        assert!(account_name("a.b.c").is_none());
    }
}
