// src/form/query.rs

use tracing::{debug, warn};
use url::form_urlencoded;

use super::FormSurface;

/// Query-string keys that pre-fill a control of the same name.
pub const PREFILL_KEYS: &[&str] = &["fecha_llamada", "fecha_revision"];

/// Pre-fill date controls from a page query string such as
/// `?fecha_llamada=2024-01-10`. Unrecognized keys are ignored. Returns the
/// keys that were applied.
pub fn prefill_from_query<F: FormSurface + ?Sized>(form: &mut F, query: &str) -> Vec<String> {
    let query = query.trim().trim_start_matches('?');
    let mut applied = Vec::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if !PREFILL_KEYS.iter().any(|k| *k == key) {
            debug!(%key, "query parameter ignored");
            continue;
        }
        if form.set_value(&key, value.trim()) {
            applied.push(key.into_owned());
        } else {
            warn!(%key, %value, "query value not accepted");
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Form;

    #[test]
    fn test_prefill_from_query() {
        let mut f = Form::cross_selling();
        let applied = prefill_from_query(&mut f, "?fecha_llamada=2024-01-10&utm=x&telefono=1");
        assert_eq!(applied, vec!["fecha_llamada"]);
        assert_eq!(f.value("fecha_llamada").as_deref(), Some("2024-01-10"));
        assert_eq!(f.value("fecha_revision").as_deref(), Some(""));
        assert_eq!(f.value("telefono").as_deref(), Some(""));
    }

    #[test]
    fn test_absent_key_keeps_default() {
        let mut f = Form::new().with_control("fecha_revision", crate::form::ControlKind::Date, "2024-05-01");
        assert!(prefill_from_query(&mut f, "").is_empty());
        assert_eq!(f.value("fecha_revision").as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_percent_decoding_and_later_key_wins() {
        let mut f = Form::cross_selling();
        let applied = prefill_from_query(
            &mut f,
            "fecha_revision=2024%2D02%2D01&fecha_revision=2024-03-01",
        );
        assert_eq!(applied.len(), 2);
        assert_eq!(f.value("fecha_revision").as_deref(), Some("2024-03-01"));
    }
}
