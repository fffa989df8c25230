// src/graph/share.rs

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use url::Url;

use crate::error::{FormError, Result};

const SHARE_ID_PREFIX: &str = "u!";

/// Turn a sharing URL into the `{shareId}` accepted by `/shares/{shareId}`:
/// `u!` followed by the unpadded base64url encoding of the link.
pub fn encode_share_id(link: &str) -> Result<String> {
    let link = link.trim();
    let parsed = Url::parse(link).map_err(|e| FormError::MalformedLink {
        link: link.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(FormError::MalformedLink {
            link: link.to_string(),
            reason: "expected an http(s) sharing URL".into(),
        });
    }
    Ok(format!("{}{}", SHARE_ID_PREFIX, URL_SAFE_NO_PAD.encode(link)))
}

/// Inverse of [`encode_share_id`].
pub fn decode_share_id(share_id: &str) -> Result<String> {
    let malformed = |reason: String| FormError::MalformedLink {
        link: share_id.to_string(),
        reason,
    };
    let body = share_id
        .strip_prefix(SHARE_ID_PREFIX)
        .ok_or_else(|| malformed("missing `u!` prefix".into()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|e| malformed(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| malformed(e.to_string()))
}
