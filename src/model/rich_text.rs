//! Sanitizing of rich text documents.
//!
//! Descriptions and page contents are edited with Draft.js in the dashboard
//! and stored in its "raw" JSON format:
//!
//! ```text
//! {
//!     "blocks": [{ "key": "...", "text": "...", "type": "unstyled", ... }],
//!     "entityMap": { "0": { "type": "LINK", "mutability": "MUTABLE", "data": { "url": "..." } } }
//! }
//! ```
//!
//! Storefronts render these documents, so everything that ends up as an URL
//! has to be harmless. Everything else is text and escaped by the renderer.

use serde_json::{Map, Value};


/// Replacement for URLs with a forbidden scheme.
pub(crate) const INVALID_URL: &str = "#invalid";

/// Top level keys of a raw Draft.js document.
const DOCUMENT_KEYS: &[&str] = &["blocks", "entityMap"];

/// Entity types whose data contains URLs.
const URL_ENTITIES: &[&str] = &["LINK", "IMAGE", "EMBED"];

/// Keys in an entity's `data` that hold URLs.
const URL_KEYS: &[&str] = &["url", "href", "src"];

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];


/// Returns a sanitized copy of the given document. Sanitizing a sanitized
/// document returns it unchanged.
pub(crate) fn sanitize(doc: Value) -> Value {
    let Value::Object(mut doc) = doc else {
        return Value::Object(Map::new());
    };

    doc.retain(|k, _| DOCUMENT_KEYS.contains(&k.as_str()));

    if let Some(Value::Object(entities)) = doc.get_mut("entityMap") {
        for entity in entities.values_mut() {
            sanitize_entity(entity);
        }
    }

    Value::Object(doc)
}

fn sanitize_entity(entity: &mut Value) {
    let is_url_entity = entity.get("type")
        .and_then(Value::as_str)
        .is_some_and(|ty| URL_ENTITIES.contains(&ty));
    if !is_url_entity {
        return;
    }

    let Some(Value::Object(data)) = entity.get_mut("data") else {
        return;
    };

    for key in URL_KEYS {
        match data.get_mut(*key) {
            Some(Value::String(url)) => *url = clean_url(url),

            // Whatever this is, a renderer must not treat it as an URL.
            Some(other) if !other.is_null() => *other = Value::String(INVALID_URL.into()),
            _ => {}
        }
    }
}

/// Removes whitespace and control characters (browsers ignore those, so
/// `java\tscript:` is `javascript:`) and replaces the URL if its scheme is
/// not allowed. Relative URLs are kept.
pub(crate) fn clean_url(url: &str) -> String {
    let url: String = url.chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();

    match scheme_of(&url) {
        None => url,
        Some(scheme) if ALLOWED_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) => url,
        Some(_) => INVALID_URL.into(),
    }
}

/// Returns the scheme if `url` starts with one. A colon after a `/`, `?` or
/// `#` does not end a scheme, it is part of a relative URL.
fn scheme_of(url: &str) -> Option<&str> {
    let end = url.find(|c| matches!(c, ':' | '/' | '?' | '#'))?;
    if url.as_bytes()[end] != b':' {
        return None;
    }

    Some(&url[..end])
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::{sanitize, clean_url, INVALID_URL};

    fn link(url: &str) -> serde_json::Value {
        json!({
            "blocks": [{ "key": "a", "text": "x", "type": "unstyled", "entityRanges": [] }],
            "entityMap": {
                "0": { "type": "LINK", "mutability": "MUTABLE", "data": { "url": url } },
            },
        })
    }

    fn url_of(doc: &serde_json::Value) -> &str {
        doc["entityMap"]["0"]["data"]["url"].as_str().expect("url missing")
    }

    #[test]
    fn keeps_harmless_urls() {
        for url in [
            "https://example.com/a?b=c#d",
            "http://example.com",
            "mailto:shop@example.com",
            "tel:+49123",
            "/relative/path",
            "relative/path:with-colon",
            "?q=1",
            "#anchor",
            "HTTPS://EXAMPLE.COM",
        ] {
            assert_eq!(url_of(&sanitize(link(url))), url);
        }
    }

    #[test]
    fn replaces_dangerous_urls() {
        for url in [
            "javascript:alert(1)",
            "JavaScript:alert(1)",
            " java\tscript:alert(1)",
            "java\u{0}script:alert(1)",
            "data:text/html;base64,PHNjcmlwdD4=",
            "vbscript:msgbox",
            "foo@bar:baz",
        ] {
            assert_eq!(url_of(&sanitize(link(url))), INVALID_URL, "{url:?}");
        }
    }

    #[test]
    fn strips_whitespace_in_urls() {
        assert_eq!(clean_url(" https://exa mple.com\n"), "https://example.com");
    }

    #[test]
    fn other_entities_untouched() {
        let doc = json!({
            "blocks": [],
            "entityMap": {
                "0": { "type": "MENTION", "data": { "url": "javascript:x" } },
                "1": { "type": "IMAGE", "data": { "src": "javascript:x", "alt": "javascript:x" } },
                "2": { "type": "EMBED", "data": { "href": 5 } },
            },
        });
        let clean = sanitize(doc);
        assert_eq!(clean["entityMap"]["0"]["data"]["url"], "javascript:x");
        assert_eq!(clean["entityMap"]["1"]["data"]["src"], INVALID_URL);
        assert_eq!(clean["entityMap"]["1"]["data"]["alt"], "javascript:x");
        assert_eq!(clean["entityMap"]["2"]["data"]["href"], INVALID_URL);
    }

    #[test]
    fn drops_unknown_keys_and_non_objects() {
        let doc = json!({ "blocks": [], "entityMap": {}, "script": "<script>" });
        assert_eq!(sanitize(doc), json!({ "blocks": [], "entityMap": {} }));
        assert_eq!(sanitize(json!("<b>hi</b>")), json!({}));
        assert_eq!(sanitize(json!([1, 2])), json!({}));
        assert_eq!(sanitize(json!(null)), json!({}));
    }

    #[test]
    fn idempotent() {
        let docs = [
            link("javascript:alert(1)"),
            link(" https://example.com "),
            link("/a"),
            json!({ "blocks": [{ "text": "<img onerror=x>" }], "other": 1 }),
            json!(3),
        ];
        for doc in docs {
            let once = sanitize(doc);
            assert_eq!(sanitize(once.clone()), once);
        }
    }
}
