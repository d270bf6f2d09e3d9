//! Translations are stored in one table per translatable entity, with at most
//! one row per `(language_code, <entity>)`.

use crate::{
    api::{
        Context,
        err::{self, ApiResult},
    },
    db::util::{FromDb, SqlAssignments},
    model::Key,
    prelude::*,
};


/// Describes the translation table of one entity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Translations {
    /// E.g. `page_translations`.
    pub(crate) table: &'static str,

    /// Column referencing the translated entity, e.g. `page`.
    pub(crate) owner_col: &'static str,

    /// Name of the `unique (language_code, <owner_col>)` constraint.
    pub(crate) constraint: &'static str,
}

impl Translations {
    /// Loads the translation of `owner` into `language_code`, if it exists.
    pub(crate) async fn load<T: FromDb>(
        &self,
        context: &Context,
        owner: Key,
        language_code: &str,
    ) -> ApiResult<Option<T>> {
        let query = format!(
            "select {} from {table} where {table}.{owner_col} = $1 and language_code = $2",
            T::SELECT,
            table = self.table,
            owner_col = self.owner_col,
        );
        context.db.query_opt(&query, &[&owner, &language_code]).await?
            .map(|row| T::from_row_start(&row))
            .pipe(Ok)
    }

    /// Inserts the translation of `owner` into `language_code` or updates
    /// the existing one with `values`.
    pub(crate) async fn upsert<T: FromDb>(
        &self,
        context: &Context,
        owner: Key,
        language_code: &str,
        mut values: SqlAssignments,
    ) -> ApiResult<T> {
        context.check_language(language_code)?;

        values.set("language_code", language_code.to_owned());
        values.set(self.owner_col, owner);
        let query = format!(
            "insert into {table} {insert} \
                on conflict on constraint {constraint} do update set {set} \
                returning {selection}",
            table = self.table,
            insert = values.insert_clause(),
            constraint = self.constraint,
            set = values.set_clause(),
            selection = T::SELECT,
        );
        let row = context.db.query_one(&query, &values.params()).await
            .map_err(|e| err::constraint_violation(e, &[]))?;

        debug!("Stored '{language_code}' translation in '{}'", self.table);
        Ok(T::from_row_start(&row))
    }
}

/// Returns the translated value if it is present and not empty, and the
/// original value otherwise.
pub(crate) fn or_original(translated: Option<&str>, original: &str) -> String {
    translated
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(original)
        .to_owned()
}

/// Like `or_original`, but for optional fields.
pub(crate) fn or_original_opt(translated: Option<&str>, original: Option<&str>) -> Option<String> {
    translated
        .filter(|s| !s.trim().is_empty())
        .or(original)
        .map(ToOwned::to_owned)
}

/// Like `or_original`, but for rich text documents: an empty document does
/// not override.
pub(crate) fn or_original_json(
    translated: Option<&serde_json::Value>,
    original: &serde_json::Value,
) -> serde_json::Value {
    let is_empty = |v: &serde_json::Value| match v {
        serde_json::Value::Object(m) => m.is_empty(),
        serde_json::Value::Null => true,
        _ => false,
    };
    translated.filter(|v| !is_empty(v)).unwrap_or(original).clone()
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::{or_original, or_original_json, or_original_opt};

    #[test]
    fn fallback() {
        assert_eq!(or_original(Some("Über uns"), "About us"), "Über uns");
        assert_eq!(or_original(Some("  "), "About us"), "About us");
        assert_eq!(or_original(None, "About us"), "About us");

        assert_eq!(or_original_opt(Some("SEO"), None), Some("SEO".into()));
        assert_eq!(or_original_opt(Some(""), Some("orig")), Some("orig".into()));
        assert_eq!(or_original_opt(None, None), None);
    }

    #[test]
    fn json_fallback() {
        let original = json!({ "blocks": [] });
        assert_eq!(or_original_json(Some(&json!({})), &original), original);
        assert_eq!(or_original_json(None, &original), original);
        let translated = json!({ "blocks": [{ "text": "Hallo" }] });
        assert_eq!(or_original_json(Some(&translated), &original), translated);
    }
}
