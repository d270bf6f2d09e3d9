//! Public and private metadata of entities, exposed as `meta`/`privateMeta`
//! fields and changed by the `...UpdateMeta...`/`...ClearMeta...` mutations.

use juniper::{GraphQLInputObject, GraphQLObject};
use serde_json::Value;

use crate::{
    api::{
        Context, Id,
        err::{invalid_input, not_authorized, ApiResult},
        model::shared::not_found,
    },
    auth::{HasPermissions, Permission},
    db::util::FromDb,
    model::{metadata, Key},
    prelude::*,
};


#[derive(Debug, Clone, GraphQLObject)]
pub(crate) struct MetaStore {
    pub(crate) namespace: String,
    pub(crate) clients: Vec<MetaClientStore>,
}

#[derive(Debug, Clone, GraphQLObject)]
pub(crate) struct MetaClientStore {
    pub(crate) name: String,
    pub(crate) metadata: Vec<MetaItem>,
}

#[derive(Debug, Clone, GraphQLObject)]
pub(crate) struct MetaItem {
    pub(crate) key: String,
    pub(crate) value: String,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct MetaInput {
    pub(crate) namespace: String,
    pub(crate) client_name: String,
    pub(crate) key: String,
    pub(crate) value: String,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct MetaPath {
    pub(crate) namespace: String,
    pub(crate) client_name: String,
    pub(crate) key: String,
}

/// Which of the two stores of an entity to work on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Public,
    Private,
}

impl Visibility {
    fn column(self) -> &'static str {
        match self {
            Self::Public => "metadata",
            Self::Private => "private_metadata",
        }
    }
}

/// Converts a stored metadata object into its GraphQL representation.
pub(crate) fn stores(store: &Value) -> Vec<MetaStore> {
    metadata::list(store)
        .into_iter()
        .map(|(namespace, clients)| MetaStore {
            namespace,
            clients: clients.into_iter()
                .map(|c| MetaClientStore {
                    name: c.name,
                    metadata: c.items.into_iter()
                        .map(|(key, value)| MetaItem { key, value })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

/// Like `stores`, but for the private store, which is only readable for
/// holders of `perm`.
pub(crate) fn private_stores(
    context: &Context,
    store: &Value,
    perm: Permission,
) -> ApiResult<Vec<MetaStore>> {
    if !context.auth.has_perm(perm) {
        return Err(not_authorized!(
            key = "missing-permission",
            "private metadata requires '{perm}'",
        ));
    }
    Ok(stores(store))
}

/// Entities with a `metadata` and `private_metadata` column.
pub(crate) trait HasMetadata: FromDb {
    const TABLE: &'static str;
    const ID_KIND: [u8; 2];
}

/// `update` for the object with the given ID.
pub(crate) async fn update_by_id<T: HasMetadata>(
    context: &Context,
    id: Id,
    visibility: Visibility,
    input: MetaInput,
) -> ApiResult<T> {
    let key = id.require_key(T::ID_KIND, "id")?;
    update(context, T::TABLE, key, visibility, input).await
}

/// `clear` for the object with the given ID.
pub(crate) async fn clear_by_id<T: HasMetadata>(
    context: &Context,
    id: Id,
    visibility: Visibility,
    path: MetaPath,
) -> ApiResult<T> {
    let key = id.require_key(T::ID_KIND, "id")?;
    clear(context, T::TABLE, key, visibility, path).await
}

/// Sets one metadata item of the row `key` in `table` and returns the
/// updated row.
pub(crate) async fn update<T: FromDb>(
    context: &Context,
    table: &'static str,
    key: Key,
    visibility: Visibility,
    input: MetaInput,
) -> ApiResult<T> {
    check_path(&input.namespace, &input.client_name, &input.key)?;
    modify(context, table, key, visibility, |store| {
        metadata::set(store, &input.namespace, &input.client_name, &input.key, &input.value);
    }).await
}

/// Removes one metadata item. Removing an item that does not exist is not
/// an error.
pub(crate) async fn clear<T: FromDb>(
    context: &Context,
    table: &'static str,
    key: Key,
    visibility: Visibility,
    path: MetaPath,
) -> ApiResult<T> {
    check_path(&path.namespace, &path.client_name, &path.key)?;
    modify(context, table, key, visibility, |store| {
        if !metadata::clear(store, &path.namespace, &path.client_name, &path.key) {
            debug!("Metadata '{}/{}/{}' did not exist", path.namespace, path.client_name, path.key);
        }
    }).await
}

async fn modify<T: FromDb>(
    context: &Context,
    table: &'static str,
    key: Key,
    visibility: Visibility,
    f: impl FnOnce(&mut Value),
) -> ApiResult<T> {
    let column = visibility.column();
    let query = format!("select {column} from {table} where id = $1 for update");
    let mut store = context.db.query_opt(&query, &[&key]).await?
        .ok_or_else(|| not_found("id"))?
        .get::<_, Value>(0);

    f(&mut store);

    let query = format!(
        "update {table} set {column} = $2 where {table}.id = $1 returning {}",
        T::SELECT,
    );
    let row = context.db.query_one(&query, &[&key, &store]).await?;
    Ok(T::from_row_start(&row))
}

fn check_path(namespace: &str, client_name: &str, key: &str) -> ApiResult<()> {
    for (value, field) in [(namespace, "namespace"), (client_name, "clientName"), (key, "key")] {
        if value.trim().is_empty() {
            return Err(invalid_input!(
                key = "required",
                "metadata {field} must not be empty",
            ).on_field(field));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::{check_path, stores};

    #[test]
    fn graphql_representation() {
        let store = json!({
            "erp": { "sync": { "id": "17", "batch": "b2" } },
            "analytics": { "ga": { "cat": "shoes" } },
        });
        let out = stores(&store);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].namespace, "analytics");
        assert_eq!(out[1].clients[0].name, "sync");
        let keys = out[1].clients[0].metadata.iter().map(|i| i.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, ["batch", "id"]);
    }

    #[test]
    fn empty_path_segments() {
        assert!(check_path("erp", "sync", "id").is_ok());
        assert_eq!(check_path(" ", "sync", "id").unwrap_err().field, Some("namespace"));
        assert_eq!(check_path("erp", "", "id").unwrap_err().field, Some("clientName"));
        assert_eq!(check_path("erp", "sync", "").unwrap_err().field, Some("key"));
    }
}
