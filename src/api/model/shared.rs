use juniper::{GraphQLEnum, GraphQLInputObject, GraphQLObject};
use once_cell::sync::Lazy;
use postgres_types::ToSql;
use regex::Regex;

use crate::{
    api::{
        ApiConfig, BulkResult, Context, Cursor, JsonString,
        err::{self, invalid_input, ApiResult},
    },
    db::util::{FromDb, SqlAssignments, SqlFilter},
    model::{ordering, rich_text, slugify, Key},
    prelude::*,
};


/// Generates an enum for the sort fields of one type and the matching
/// `...SortingInput` struct.
///
/// Each variant maps to an SQL expression (a table-qualified column or a
/// correlated subquery). The input struct holds the field and a direction
/// and converts into a `SortOrder`. Example usage:
///
/// ```ignore
/// define_sort_field_and_input!(
///     pub(crate) enum PageSortField {
///         #[default]
///         Slug => "pages.slug",
///         Title => "pages.title",
///     };
///     pub(crate) struct PageSortingInput, default direction Ascending;
/// );
/// ```
macro_rules! define_sort_field_and_input {
    (
        $vis_enum:vis enum $enum_name:ident {
            $( $(#[$attr:meta])* $variant:ident => $sql:expr ),+ $(,)?
        };
        $vis_input:vis struct $input_name:ident, default direction $dir:ident;
    ) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, juniper::GraphQLEnum)]
        $vis_enum enum $enum_name {
            $( $(#[$attr])* $variant ),+
        }

        impl $crate::api::model::shared::ToSqlColumn for $enum_name {
            fn to_sql(&self) -> &'static str {
                match self {
                    $(Self::$variant => $sql),+
                }
            }
        }

        #[derive(Debug, Clone, Copy, juniper::GraphQLInputObject)]
        $vis_input struct $input_name {
            pub(crate) field: $enum_name,
            pub(crate) direction: $crate::api::model::shared::SortDirection,
        }

        impl Default for $input_name {
            fn default() -> Self {
                Self {
                    field: $enum_name::default(),
                    direction: $crate::api::model::shared::SortDirection::$dir,
                }
            }
        }

        impl From<$input_name> for $crate::api::model::shared::SortOrder {
            fn from(input: $input_name) -> Self {
                use $crate::api::model::shared::ToSqlColumn;
                Self {
                    column: input.field.to_sql(),
                    direction: input.direction,
                }
            }
        }
    };
}

pub(crate) use define_sort_field_and_input;


/// Used to convert enum variants to their respective SQL column names.
pub(crate) trait ToSqlColumn {
    fn to_sql(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SortOrder {
    pub(crate) column: &'static str,
    pub(crate) direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub(crate) fn to_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}


// ===== Pagination ============================================================================

/// The relay pagination arguments of a list query.
#[derive(Debug, Clone, Default)]
pub(crate) struct PaginationArgs {
    pub(crate) first: Option<i32>,
    pub(crate) after: Option<Cursor>,
    pub(crate) last: Option<i32>,
    pub(crate) before: Option<Cursor>,
}

/// The slice `offset..offset + limit` of a result set with `total` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub(crate) offset: u64,
    pub(crate) limit: u64,
    pub(crate) total: u64,
}

impl PaginationArgs {
    pub(crate) fn new(
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
    ) -> Self {
        Self { first, after, last, before }
    }

    /// Figures out which items of a result set with `total` items are
    /// requested.
    pub(crate) fn window(&self, total: u64, config: &ApiConfig) -> ApiResult<Window> {
        let count_arg = |v: Option<i32>, name: &'static str| -> ApiResult<Option<u64>> {
            match v {
                Some(n) if n < 0 => Err(invalid_input!(
                    key = "invalid",
                    "argument '{name}' has to be >= 0, but is {n}",
                ).on_field(name)),
                Some(n) => Ok(Some(u64::from(n.unsigned_abs()).min(config.max_page_size.into()))),
                None => Ok(None),
            }
        };
        let cursor_arg = |c: &Option<Cursor>, name: &'static str| -> ApiResult<Option<u64>> {
            c.as_ref()
                .map(|c| c.offset().map_err(|e| invalid_input!(
                    key = "invalid-cursor",
                    "argument '{name}': {e}",
                ).on_field(name)))
                .transpose()
        };

        let first = count_arg(self.first, "first")?;
        let last = count_arg(self.last, "last")?;
        let after = cursor_arg(&self.after, "after")?;
        let before = cursor_arg(&self.before, "before")?;

        let mut start = after.map_or(0, |a| a.saturating_add(1)).min(total);
        let mut end = before.unwrap_or(total).min(total).max(start);
        match (first, last) {
            (Some(_), Some(_)) => {
                return Err(invalid_input!("only one of 'first' and 'last' may be given"));
            }
            (Some(first), None) => end = end.min(start + first),
            (None, Some(last)) => start = start.max(end.saturating_sub(last)),
            (None, None) => end = end.min(start + u64::from(config.default_page_size)),
        }

        Ok(Window { offset: start, limit: end - start, total })
    }
}

impl Window {
    pub(crate) fn has_previous_page(&self) -> bool {
        self.offset > 0
    }

    pub(crate) fn has_next_page(&self) -> bool {
        self.offset + self.limit < self.total
    }
}

/// One page of a list query, not yet wrapped in the GraphQL types.
#[derive(Debug)]
pub(crate) struct Connection<T> {
    pub(crate) items: Vec<T>,
    pub(crate) window: Window,
}

impl<T> Connection<T> {
    pub(crate) fn page_info(&self) -> PageInfo {
        let cursor = |i: usize| Cursor::for_offset(self.window.offset + i as u64);
        PageInfo {
            has_next_page: self.window.has_next_page(),
            has_previous_page: self.window.has_previous_page(),
            start_cursor: (!self.items.is_empty()).then(|| cursor(0)),
            end_cursor: self.items.len().checked_sub(1).map(cursor),
        }
    }

    pub(crate) fn total_count(&self) -> i32 {
        self.window.total.try_into().unwrap_or(i32::MAX)
    }

    /// Items with their cursors.
    pub(crate) fn into_edges(self) -> impl Iterator<Item = (T, Cursor)> {
        let offset = self.window.offset;
        self.items.into_iter()
            .enumerate()
            .map(move |(i, item)| (item, Cursor::for_offset(offset + i as u64)))
    }

    /// Builds a connection from a list that is already completely in memory.
    pub(crate) fn from_vec(all: Vec<T>, args: &PaginationArgs, config: &ApiConfig) -> ApiResult<Self> {
        let window = args.window(all.len() as u64, config)?;
        let items = all.into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect();
        Ok(Self { items, window })
    }
}

#[derive(Debug, Clone, GraphQLObject)]
pub(crate) struct PageInfo {
    pub(crate) has_next_page: bool,
    pub(crate) has_previous_page: bool,
    pub(crate) start_cursor: Option<Cursor>,
    pub(crate) end_cursor: Option<Cursor>,
}

/// Defines the GraphQL connection and edge types for one node type.
macro_rules! define_connection {
    ($connection:ident, $edge:ident, $node:ty) => {
        #[derive(juniper::GraphQLObject)]
        #[graphql(context = $crate::api::Context)]
        pub(crate) struct $connection {
            pub(crate) edges: Vec<$edge>,
            pub(crate) page_info: $crate::api::model::shared::PageInfo,
            pub(crate) total_count: i32,
        }

        #[derive(juniper::GraphQLObject)]
        #[graphql(context = $crate::api::Context)]
        pub(crate) struct $edge {
            pub(crate) node: $node,
            pub(crate) cursor: $crate::api::Cursor,
        }

        impl From<$crate::api::model::shared::Connection<$node>> for $connection {
            fn from(conn: $crate::api::model::shared::Connection<$node>) -> Self {
                Self {
                    page_info: conn.page_info(),
                    total_count: conn.total_count(),
                    edges: conn.into_edges()
                        .map(|(node, cursor)| $edge { node, cursor })
                        .collect(),
                }
            }
        }
    };
}

pub(crate) use define_connection;


/// Loads one page of `T` from `table`,
/// filtered by `filter` and sorted by `order` with `{table}.id` as tie
/// breaker.
pub(crate) async fn load_connection<T: FromDb>(
    context: &Context,
    table: &str,
    filter: &SqlFilter,
    order: impl Into<SortOrder>,
    args: &PaginationArgs,
) -> ApiResult<Connection<T>> {
    let order = order.into();
    let where_clause = filter.where_clause();

    let count_query = format!("select count(*) from {table} {where_clause}");
    let total = context.db.query_one(&count_query, &filter.params()).await?
        .get::<_, i64>(0);
    let window = args.window(total.try_into().unwrap_or(0), &context.config.api)?;

    if window.limit == 0 {
        return Ok(Connection { items: vec![], window });
    }

    let n = filter.num_params();
    let query = format!(
        "select {selection} from {table} {where_clause} \
            order by {col} {dir}, {table}.id {dir} \
            limit ${limit} offset ${offset}",
        selection = T::SELECT,
        col = order.column,
        dir = order.direction.to_sql(),
        limit = n + 1,
        offset = n + 2,
    );
    let limit = window.limit as i64;
    let offset = window.offset as i64;
    let mut params = filter.params();
    params.push(&limit);
    params.push(&offset);

    let items = context.db.query(&query, &params).await?
        .iter()
        .map(T::from_row_start)
        .collect();

    Ok(Connection { items, window })
}


// ===== Input validation ======================================================================

/// Checks that `value` has at most `max` characters, which is what the
/// `varchar` column it is stored in allows.
pub(crate) fn check_length(value: &str, max: usize, field: &'static str) -> ApiResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(invalid_input!(
            key = "max-length",
            "value has {len} characters, but at most {max} are allowed",
        ).on_field(field));
    }
    Ok(())
}

/// Checks that a required text value is not empty and not too long.
pub(crate) fn check_required(value: &str, max: usize, field: &'static str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(invalid_input!(key = "required", "value must not be empty").on_field(field));
    }
    check_length(value, max, field)
}

/// Slugs consist of letters, digits, `-` and `_`.
pub(crate) fn check_slug(slug: &str, max: usize) -> ApiResult<()> {
    static SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w-]+$").expect("invalid regex"));

    if !SLUG.is_match(slug) {
        return Err(invalid_input!(
            key = "invalid",
            "'{slug}' is not a valid slug: use letters, numbers, underscores or hyphens",
        ).on_field("slug"));
    }
    check_length(slug, max, "slug")
}

/// Returns the given slug after validating it, or one derived from `name`.
pub(crate) fn slug_or_default(slug: Option<String>, name: &str, max: usize) -> ApiResult<String> {
    let slug = match slug {
        Some(slug) => slug,
        None => slugify(name),
    };
    check_slug(&slug, max)?;
    Ok(slug)
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct SeoInput {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
}

impl SeoInput {
    pub(crate) fn apply(self, values: &mut SqlAssignments) -> ApiResult<()> {
        if let Some(title) = self.title {
            check_length(&title, 70, "seo")?;
            values.set("seo_title", title);
        }
        if let Some(description) = self.description {
            check_length(&description, 300, "seo")?;
            values.set("seo_description", description);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, GraphQLObject)]
pub(crate) struct Seo {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
}

/// Sanitizes a rich text document passed to the API before it is stored.
pub(crate) fn sanitized(doc: JsonString) -> serde_json::Value {
    rich_text::sanitize(doc.0)
}


// ===== Generic persistence helpers ===========================================================

/// SQL condition that is true for rows visible to everyone: published, with
/// a publication date that is absent or not in the future.
pub(crate) fn visibility_clause(table: &str) -> String {
    format!(
        "({table}.is_published and \
            ({table}.publication_date is null or {table}.publication_date <= current_date))"
    )
}

/// Returns `T` with the given key, or `None`. `condition` is an additional
/// parameterless SQL condition, e.g. a visibility clause.
pub(crate) async fn load_by_key<T: FromDb>(
    context: &Context,
    table: &str,
    key: Key,
    condition: Option<&str>,
) -> ApiResult<Option<T>> {
    let extra = condition.map(|c| format!("and {c}")).unwrap_or_default();
    let query = format!("select {} from {table} where {table}.id = $1 {extra}", T::SELECT);
    context.db.query_opt(&query, &[&key]).await?
        .map(|row| T::from_row_start(&row))
        .pipe(Ok)
}

/// Like `load_by_key` but for mutations, where a missing object is an error
/// about `field`.
pub(crate) async fn require_by_key<T: FromDb>(
    context: &Context,
    table: &str,
    key: Key,
    field: &'static str,
) -> ApiResult<T> {
    load_by_key(context, table, key, None).await?
        .ok_or_else(|| not_found(field))
}

pub(crate) fn reorder_error(e: ordering::ReorderError, field: &'static str) -> err::ApiError {
    match e {
        ordering::ReorderError::UnknownKey(key) => invalid_input!(
            key = "not-found",
            "object {key} is not part of the list",
        ).on_field(field),
    }
}

pub(crate) fn not_found(field: &'static str) -> err::ApiError {
    invalid_input!(key = "not-found", "referenced object does not exist").on_field(field)
}

/// Inserts a row and returns it. `unique_fields` maps unique constraint
/// names to input fields for error reporting.
pub(crate) async fn insert_returning<T: FromDb>(
    context: &Context,
    table: &str,
    values: &SqlAssignments,
    unique_fields: &[(&str, &'static str)],
) -> ApiResult<T> {
    let query = format!(
        "insert into {table} {} returning {}",
        values.insert_clause(),
        T::SELECT,
    );
    context.db.query_one(&query, &values.params()).await
        .map_err(|e| err::constraint_violation(e, unique_fields))
        .map(|row| T::from_row_start(&row))
}

/// Updates the row with the given key and returns it. An empty set of
/// assignments just loads the row.
pub(crate) async fn update_returning<T: FromDb>(
    context: &Context,
    table: &str,
    key: Key,
    values: &SqlAssignments,
    unique_fields: &[(&str, &'static str)],
) -> ApiResult<T> {
    if values.is_empty() {
        return require_by_key(context, table, key, "id").await;
    }

    let query = format!(
        "update {table} set {} where {table}.id = ${} returning {}",
        values.set_clause(),
        values.num_params() + 1,
        T::SELECT,
    );
    let mut params = values.params();
    params.push(&key);
    context.db.query_opt(&query, &params).await
        .map_err(|e| err::constraint_violation(e, unique_fields))?
        .map(|row| T::from_row_start(&row))
        .ok_or_else(|| not_found("id"))
}

/// Deletes the row with the given key and returns its data.
pub(crate) async fn delete_returning<T: FromDb>(
    context: &Context,
    table: &str,
    key: Key,
) -> ApiResult<T> {
    let query = format!("delete from {table} where {table}.id = $1 returning {}", T::SELECT);
    context.db.query_opt(&query, &[&key]).await
        .map_err(|e| err::constraint_violation(e, &[]))?
        .map(|row| T::from_row_start(&row))
        .ok_or_else(|| not_found("id"))
}

/// Deletes all rows with the given keys. `condition` restricts which rows
/// may be deleted, e.g. only draft orders.
pub(crate) async fn bulk_delete(
    context: &Context,
    table: &str,
    keys: &[Key],
    condition: Option<&str>,
) -> ApiResult<BulkResult> {
    let extra = condition.map(|c| format!("and {c}")).unwrap_or_default();
    let query = format!("delete from {table} where id = any($1) {extra}");
    let count = context.db.execute(&query, &[&keys]).await
        .map_err(|e| err::constraint_violation(e, &[]))?;
    debug!("Bulk deleted {count} rows from '{table}'");
    Ok(BulkResult::new(count))
}

pub(crate) async fn bulk_publish(
    context: &Context,
    table: &str,
    keys: &[Key],
    is_published: bool,
) -> ApiResult<BulkResult> {
    let query = format!("update {table} set is_published = $2 where id = any($1)");
    let count = context.db.execute(&query, &[&keys, &is_published]).await?;
    Ok(BulkResult::new(count))
}

/// Adds rows `(owner, item)` to a link table. Existing links are kept.
pub(crate) async fn link(
    context: &Context,
    link_table: &str,
    owner_col: &str,
    owner: Key,
    item_col: &str,
    items: &[Key],
) -> ApiResult<()> {
    let query = format!(
        "insert into {link_table} ({owner_col}, {item_col}) \
            select $1, unnest($2::bigint[]) \
            on conflict do nothing",
    );
    context.db.execute(&query, &[&owner, &items]).await
        .map_err(|e| err::constraint_violation(e, &[]))?;
    Ok(())
}

pub(crate) async fn unlink(
    context: &Context,
    link_table: &str,
    owner_col: &str,
    owner: Key,
    item_col: &str,
    items: &[Key],
) -> ApiResult<()> {
    let query = format!(
        "delete from {link_table} where {owner_col} = $1 and {item_col} = any($2)",
    );
    context.db.execute(&query, &[&owner, &items]).await?;
    Ok(())
}

/// A table linking rows of two other tables, e.g. `sale_products`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkTable {
    pub(crate) table: &'static str,
    pub(crate) owner_col: &'static str,
    pub(crate) item_col: &'static str,
}

impl LinkTable {
    pub(crate) async fn add(&self, context: &Context, owner: Key, items: &[Key]) -> ApiResult<()> {
        link(context, self.table, self.owner_col, owner, self.item_col, items).await
    }

    pub(crate) async fn remove(&self, context: &Context, owner: Key, items: &[Key]) -> ApiResult<()> {
        unlink(context, self.table, self.owner_col, owner, self.item_col, items).await
    }

    /// Makes `items` the exact set of rows linked to `owner`.
    pub(crate) async fn set(&self, context: &Context, owner: Key, items: &[Key]) -> ApiResult<()> {
        let query = format!(
            "delete from {table} where {owner_col} = $1 and not ({item} = any($2))",
            table = self.table,
            owner_col = self.owner_col,
            item = self.item_col,
        );
        context.db.execute(&query, &[&owner, &items]).await?;
        self.add(context, owner, items).await
    }

    /// Loads one page of the rows of `item_table` linked to `owner`.
    pub(crate) async fn load<T: FromDb>(
        &self,
        context: &Context,
        owner: Key,
        item_table: &str,
        order: impl Into<SortOrder>,
        args: &PaginationArgs,
    ) -> ApiResult<Connection<T>> {
        let mut filter = SqlFilter::new();
        let p = filter.arg(owner);
        filter.and(format!(
            "{item_table}.id in (select {item} from {link} where {owner_col} = {p})",
            item = self.item_col,
            link = self.table,
            owner_col = self.owner_col,
        ));
        load_connection(context, item_table, &filter, order, args).await
    }
}

/// Scope of an ordered list inside a table: an SQL condition (given the
/// index of its first placeholder) and the arguments it references.
pub(crate) struct OrderScope<'a> {
    pub(crate) table: &'static str,
    pub(crate) item_col: &'static str,
    pub(crate) condition: &'a (dyn Fn(usize) -> String + Sync),
    pub(crate) args: &'a [&'a (dyn ToSql + Sync)],
}

impl OrderScope<'_> {
    /// Loads the keys of the list in their current order.
    pub(crate) async fn load(&self, context: &Context) -> ApiResult<Vec<Key>> {
        let query = format!(
            "select {item} from {table} where {cond} order by sort_order, {item}",
            item = self.item_col,
            table = self.table,
            cond = (self.condition)(1),
        );
        context.db.query(&query, self.args).await?
            .iter()
            .map(|row| row.get::<_, Key>(0))
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    /// Stores `items` as the new order of the list.
    pub(crate) async fn save(&self, context: &Context, items: &[Key]) -> ApiResult<()> {
        let query = format!(
            "update {table} set sort_order = o.pos::int \
                from unnest($1::bigint[]) with ordinality as o(item, pos) \
                where {table}.{item} = o.item and {cond}",
            item = self.item_col,
            table = self.table,
            cond = (self.condition)(2),
        );
        let items = items.to_vec();
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&items];
        params.extend_from_slice(self.args);
        context.db.execute(&query, &params).await?;
        Ok(())
    }

    /// Applies relative moves to the list and stores the result.
    pub(crate) async fn apply_moves(
        &self,
        context: &Context,
        moves: &[ordering::Move],
        field: &'static str,
    ) -> ApiResult<()> {
        let items = ordering::apply_moves(self.load(context).await?, moves)
            .map_err(|e| reorder_error(e, field))?;
        self.save(context, &items).await
    }
}


#[cfg(test)]
mod tests {
    use crate::api::{ApiConfig, Cursor};
    use super::{
        check_length, check_slug, slug_or_default, Connection, PaginationArgs, Window,
        visibility_clause,
    };

    fn config() -> ApiConfig {
        ApiConfig { default_page_size: 20, max_page_size: 100 }
    }

    fn window(
        first: Option<i32>,
        after: Option<u64>,
        last: Option<i32>,
        before: Option<u64>,
        total: u64,
    ) -> Window {
        PaginationArgs {
            first,
            after: after.map(Cursor::for_offset),
            last,
            before: before.map(Cursor::for_offset),
        }.window(total, &config()).unwrap()
    }

    #[test]
    fn forward() {
        let w = window(Some(10), None, None, None, 25);
        assert_eq!((w.offset, w.limit), (0, 10));
        assert!(w.has_next_page());
        assert!(!w.has_previous_page());

        let w = window(Some(10), Some(19), None, None, 25);
        assert_eq!((w.offset, w.limit), (20, 5));
        assert!(!w.has_next_page());
        assert!(w.has_previous_page());
    }

    #[test]
    fn backward() {
        let w = window(None, None, Some(10), None, 25);
        assert_eq!((w.offset, w.limit), (15, 10));

        let w = window(None, None, Some(10), Some(5), 25);
        assert_eq!((w.offset, w.limit), (0, 5));
        assert!(w.has_next_page());
    }

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(window(None, None, None, None, 50).limit, 20);
        assert_eq!(window(Some(1000), None, None, None, 500).limit, 100);
        assert_eq!(window(Some(0), None, None, None, 5).limit, 0);

        // Cursors beyond the end yield empty pages.
        let w = window(Some(5), Some(100), None, None, 3);
        assert_eq!((w.offset, w.limit), (3, 0));
    }

    #[test]
    fn invalid_arguments() {
        let args = PaginationArgs { first: Some(-1), ..Default::default() };
        assert_eq!(args.window(10, &config()).unwrap_err().field, Some("first"));

        let args = PaginationArgs { first: Some(1), last: Some(1), ..Default::default() };
        assert!(args.window(10, &config()).is_err());

        let args = PaginationArgs { after: Some(Cursor::for_offset(1)), ..Default::default() };
        assert!(args.window(10, &config()).is_ok());
    }

    #[test]
    fn in_memory_connection() {
        let args = PaginationArgs { first: Some(2), after: Some(Cursor::for_offset(0)), ..Default::default() };
        let conn = Connection::from_vec(vec!["a", "b", "c", "d"], &args, &config()).unwrap();
        let info = conn.page_info();
        assert!(info.has_next_page);
        assert!(info.has_previous_page);
        assert_eq!(info.start_cursor, Some(Cursor::for_offset(1)));
        assert_eq!(info.end_cursor, Some(Cursor::for_offset(2)));
        assert_eq!(conn.total_count(), 4);

        let edges = conn.into_edges().collect::<Vec<_>>();
        assert_eq!(edges, vec![("b", Cursor::for_offset(1)), ("c", Cursor::for_offset(2))]);
    }

    #[test]
    fn visibility() {
        assert_eq!(
            visibility_clause("pages"),
            "(pages.is_published and \
                (pages.publication_date is null or pages.publication_date <= current_date))",
        );
    }

    #[test]
    fn lengths() {
        assert!(check_length("äöü", 3, "title").is_ok());
        assert_eq!(check_length("abcd", 3, "title").unwrap_err().field, Some("title"));
    }

    #[test]
    fn slugs() {
        assert!(check_slug("about-us_2", 100).is_ok());
        assert!(check_slug("über", 100).is_ok());
        assert!(check_slug("", 100).is_err());
        assert!(check_slug("about us", 100).is_err());
        assert!(check_slug("a/b", 100).is_err());
        assert!(check_slug(&"a".repeat(101), 100).is_err());

        assert_eq!(slug_or_default(None, "Blue T-Shirt", 255).unwrap(), "blue-t-shirt");
        assert_eq!(slug_or_default(Some("custom".into()), "Blue", 255).unwrap(), "custom");
        assert!(slug_or_default(None, "!!!", 255).is_err());
    }
}
