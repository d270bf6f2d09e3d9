use juniper::{graphql_object, GraphQLInputObject, GraphQLObject};
use serde_json::Value;
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Id,
        err::{invalid_input, ApiResult},
        model::{
            meta::{self, HasMetadata, MetaStore},
            shared::{
                self, define_connection, define_sort_field_and_input, load_connection,
                check_length, check_required, check_slug, slug_or_default, OrderScope,
                PaginationArgs,
            },
            translation::{self, Translations},
        },
    },
    auth::Permission,
    db::{
        types::AttributeInputType,
        util::{dbargs, FromDb, SqlAssignments, SqlFilter},
    },
    model::{slugify, Key},
    prelude::*,
};
use super::{category_tree_query, to_moves, AttributeTypeEnum, ProductType, ReorderInput};


const TRANSLATIONS: Translations = Translations {
    table: "attribute_translations",
    owner_col: "attribute",
    constraint: "unique_attribute_translation",
};

const VALUE_TRANSLATIONS: Translations = Translations {
    table: "attribute_value_translations",
    owner_col: "attribute_value",
    constraint: "unique_attribute_value_translation",
};

const UNIQUE_FIELDS: &[(&str, &str)] = &[("unique_attribute_slug", "slug")];
const VALUE_UNIQUE_FIELDS: &[(&str, &str)] = &[("unique_attribute_value_slug", "name")];


/// A property of products or variants, like "color", with the values it
/// can take.
pub(crate) struct Attribute {
    pub(crate) key: Key,
    name: String,
    slug: String,
    input_type: AttributeInputType,
    value_required: bool,
    is_variant_only: bool,
    visible_in_storefront: bool,
    filterable_in_storefront: bool,
    filterable_in_dashboard: bool,
    storefront_search_position: i32,
    available_in_grid: bool,
    metadata: Value,
    private_metadata: Value,
}

impl FromDb for Attribute {
    const SELECT: &'static str = "attributes.id, attributes.name, attributes.slug, \
        attributes.input_type, attributes.value_required, attributes.is_variant_only, \
        attributes.visible_in_storefront, attributes.filterable_in_storefront, \
        attributes.filterable_in_dashboard, attributes.storefront_search_position, \
        attributes.available_in_grid, attributes.metadata, attributes.private_metadata";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            name: row.get(1),
            slug: row.get(2),
            input_type: row.get(3),
            value_required: row.get(4),
            is_variant_only: row.get(5),
            visible_in_storefront: row.get(6),
            filterable_in_storefront: row.get(7),
            filterable_in_dashboard: row.get(8),
            storefront_search_position: row.get(9),
            available_in_grid: row.get(10),
            metadata: row.get(11),
            private_metadata: row.get(12),
        }
    }
}

impl HasMetadata for Attribute {
    const TABLE: &'static str = "attributes";
    const ID_KIND: [u8; 2] = Id::ATTRIBUTE_KIND;
}

#[graphql_object(Context = Context)]
impl Attribute {
    fn id(&self) -> Id {
        Id::attribute(self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    fn input_type(&self) -> AttributeInputType {
        self.input_type
    }

    fn value_required(&self) -> bool {
        self.value_required
    }

    fn is_variant_only(&self) -> bool {
        self.is_variant_only
    }

    fn visible_in_storefront(&self) -> bool {
        self.visible_in_storefront
    }

    fn filterable_in_storefront(&self) -> bool {
        self.filterable_in_storefront
    }

    fn filterable_in_dashboard(&self) -> bool {
        self.filterable_in_dashboard
    }

    fn storefront_search_position(&self) -> i32 {
        self.storefront_search_position
    }

    fn available_in_grid(&self) -> bool {
        self.available_in_grid
    }

    /// All values in their manual order.
    async fn values(&self, context: &Context) -> ApiResult<Vec<AttributeValue>> {
        let query = format!(
            "select {} from attribute_values where attribute = $1 order by sort_order, id",
            AttributeValue::SELECT,
        );
        context.db.query(&query, &[&self.key]).await?
            .iter()
            .map(AttributeValue::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    fn meta(&self) -> Vec<MetaStore> {
        meta::stores(&self.metadata)
    }

    fn private_meta(&self, context: &Context) -> ApiResult<Vec<MetaStore>> {
        meta::private_stores(context, &self.private_metadata, Permission::ManageProducts)
    }

    async fn translation(
        &self,
        language_code: String,
        context: &Context,
    ) -> ApiResult<Option<NameTranslation>> {
        TRANSLATIONS.load(context, self.key, &language_code).await
    }

    async fn translated(&self, language_code: String, context: &Context) -> ApiResult<NameTranslation> {
        let t = TRANSLATIONS.load(context, self.key, &language_code).await?;
        Ok(NameTranslation::merged(t, language_code, &self.name))
    }
}

pub(crate) struct AttributeValue {
    pub(crate) key: Key,
    attribute: Key,
    name: String,
    slug: String,
    value: String,
}

impl FromDb for AttributeValue {
    const SELECT: &'static str = "attribute_values.id, attribute_values.attribute, \
        attribute_values.name, attribute_values.slug, attribute_values.value";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            attribute: row.get(1),
            name: row.get(2),
            slug: row.get(3),
            value: row.get(4),
        }
    }
}

#[graphql_object(Context = Context)]
impl AttributeValue {
    fn id(&self) -> Id {
        Id::attribute_value(self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    /// Free-form representation, e.g. a color code.
    fn value(&self) -> &str {
        &self.value
    }

    async fn attribute(&self, context: &Context) -> ApiResult<Option<Attribute>> {
        shared::load_by_key(context, "attributes", self.attribute, None).await
    }

    async fn translation(
        &self,
        language_code: String,
        context: &Context,
    ) -> ApiResult<Option<NameTranslation>> {
        VALUE_TRANSLATIONS.load(context, self.key, &language_code).await
    }

    async fn translated(&self, language_code: String, context: &Context) -> ApiResult<NameTranslation> {
        let t = VALUE_TRANSLATIONS.load(context, self.key, &language_code).await?;
        Ok(NameTranslation::merged(t, language_code, &self.name))
    }
}

/// Translation of entities whose only translatable field is the name.
#[derive(Debug, GraphQLObject)]
pub(crate) struct NameTranslation {
    language_code: String,
    name: String,
}

// Selected from one translation table at a time.
impl FromDb for NameTranslation {
    const SELECT: &'static str = "language_code, name";

    fn from_row_start(row: &Row) -> Self {
        Self {
            language_code: row.get(0),
            name: row.get(1),
        }
    }
}

impl NameTranslation {
    pub(crate) fn merged(t: Option<Self>, language_code: String, original: &str) -> Self {
        Self {
            name: translation::or_original(t.as_ref().map(|t| &*t.name), original),
            language_code,
        }
    }
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct NameTranslationInput {
    name: Option<String>,
}

impl NameTranslationInput {
    pub(crate) fn into_assignments(self, max_name: usize) -> ApiResult<SqlAssignments> {
        let mut values = SqlAssignments::new();
        if let Some(name) = self.name {
            check_length(&name, max_name, "name")?;
            values.set("name", name);
        }
        Ok(values)
    }
}

define_connection!(AttributeConnection, AttributeEdge, Attribute);

define_sort_field_and_input!(
    pub(crate) enum AttributeSortField {
        #[default]
        Name => "attributes.name",
        Slug => "attributes.slug",
        ValueRequired => "attributes.value_required",
        IsVariantOnly => "attributes.is_variant_only",
        VisibleInStorefront => "attributes.visible_in_storefront",
        FilterableInStorefront => "attributes.filterable_in_storefront",
        FilterableInDashboard => "attributes.filterable_in_dashboard",
        StorefrontSearchPosition => "attributes.storefront_search_position",
        AvailableInGrid => "attributes.available_in_grid",
    };
    pub(crate) struct AttributeSortingInput, default direction Ascending;
);

#[derive(Debug, Clone, Default, GraphQLInputObject)]
pub(crate) struct AttributeFilterInput {
    value_required: Option<bool>,
    is_variant_only: Option<bool>,
    visible_in_storefront: Option<bool>,
    filterable_in_storefront: Option<bool>,
    filterable_in_dashboard: Option<bool>,
    available_in_grid: Option<bool>,
    search: Option<String>,
    ids: Option<Vec<Id>>,
    in_category: Option<Id>,
    in_collection: Option<Id>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct AttributeValueCreateInput {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct AttributeCreateInput {
    name: String,
    slug: Option<String>,
    input_type: Option<AttributeInputType>,
    values: Option<Vec<AttributeValueCreateInput>>,
    value_required: Option<bool>,
    is_variant_only: Option<bool>,
    visible_in_storefront: Option<bool>,
    filterable_in_storefront: Option<bool>,
    filterable_in_dashboard: Option<bool>,
    storefront_search_position: Option<i32>,
    available_in_grid: Option<bool>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct AttributeUpdateInput {
    name: Option<String>,
    slug: Option<String>,
    remove_values: Option<Vec<Id>>,
    add_values: Option<Vec<AttributeValueCreateInput>>,
    value_required: Option<bool>,
    is_variant_only: Option<bool>,
    visible_in_storefront: Option<bool>,
    filterable_in_storefront: Option<bool>,
    filterable_in_dashboard: Option<bool>,
    storefront_search_position: Option<i32>,
    available_in_grid: Option<bool>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct AttributeAssignInput {
    id: Id,
    #[graphql(name = "type")]
    typ: AttributeTypeEnum,
}

/// Values selected for one attribute of a product or variant. Values are
/// given by name and created if they do not exist yet.
#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct AttributeValueInput {
    id: Id,
    values: Vec<String>,
}


impl Attribute {
    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::ATTRIBUTE_KIND) else {
            return Ok(None);
        };
        shared::load_by_key(context, "attributes", key, None).await
    }

    pub(crate) async fn list(
        query: Option<String>,
        filter: Option<AttributeFilterInput>,
        sort_by: Option<AttributeSortingInput>,
        in_category: Option<Id>,
        in_collection: Option<Id>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<AttributeConnection> {
        let search = ["attributes.name", "attributes.slug"];
        let mut sql = SqlFilter::new();
        if let Some(query) = &query {
            sql.search(&search, query);
        }

        let filter = filter.unwrap_or_default();
        for (value, column) in [
            (filter.value_required, "attributes.value_required"),
            (filter.is_variant_only, "attributes.is_variant_only"),
            (filter.visible_in_storefront, "attributes.visible_in_storefront"),
            (filter.filterable_in_storefront, "attributes.filterable_in_storefront"),
            (filter.filterable_in_dashboard, "attributes.filterable_in_dashboard"),
            (filter.available_in_grid, "attributes.available_in_grid"),
        ] {
            if let Some(value) = value {
                sql.eq(column, value);
            }
        }
        if let Some(needle) = &filter.search {
            sql.search(&search, needle);
        }
        if let Some(ids) = &filter.ids {
            let keys = Id::require_keys(ids, Id::ATTRIBUTE_KIND, "ids")?;
            let p = sql.arg(keys);
            sql.and(format!("attributes.id = any({p})"));
        }

        // Unknown or foreign IDs match nothing.
        for id in [in_category, filter.in_category].into_iter().flatten() {
            let key = id.key_for(Id::CATEGORY_KIND).unwrap_or(Key(0));
            let p = sql.arg(vec![key]);
            sql.and(format!(
                "attributes.id in (select pta.attribute from product_type_attributes pta \
                    join products on products.product_type = pta.product_type \
                    where products.category in ({}))",
                category_tree_query(&p),
            ));
        }
        for id in [in_collection, filter.in_collection].into_iter().flatten() {
            let key = id.key_for(Id::COLLECTION_KIND).unwrap_or(Key(0));
            let p = sql.arg(key);
            sql.and(format!(
                "attributes.id in (select pta.attribute from product_type_attributes pta \
                    join products on products.product_type = pta.product_type \
                    join collection_products cp on cp.product = products.id \
                    where cp.collection = {p})",
            ));
        }

        load_connection(context, "attributes", &sql, sort_by.unwrap_or_default(), &pagination)
            .await
            .map(Into::into)
    }

    pub(crate) async fn create(input: AttributeCreateInput, context: &Context) -> ApiResult<Self> {
        check_required(&input.name, 255, "name")?;
        let slug = slug_or_default(input.slug, &input.name, 250)?;

        let mut values = SqlAssignments::new();
        values
            .set("name", input.name)
            .set("slug", slug)
            .set_some("input_type", input.input_type)
            .set_some("value_required", input.value_required)
            .set_some("is_variant_only", input.is_variant_only)
            .set_some("visible_in_storefront", input.visible_in_storefront)
            .set_some("filterable_in_storefront", input.filterable_in_storefront)
            .set_some("filterable_in_dashboard", input.filterable_in_dashboard)
            .set_some("storefront_search_position", input.storefront_search_position)
            .set_some("available_in_grid", input.available_in_grid);
        let attribute = shared::insert_returning::<Self>(context, "attributes", &values, UNIQUE_FIELDS)
            .await?;

        for value in input.values.into_iter().flatten() {
            AttributeValue::insert(context, attribute.key, value).await?;
        }

        info!("Created attribute '{}' ({:?})", attribute.slug, attribute.key);
        Ok(attribute)
    }

    pub(crate) async fn update(id: Id, input: AttributeUpdateInput, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::ATTRIBUTE_KIND, "id")?;
        let mut values = SqlAssignments::new();
        if let Some(name) = &input.name {
            check_required(name, 255, "name")?;
        }
        if let Some(slug) = &input.slug {
            check_slug(slug, 250)?;
        }
        values
            .set_some("name", input.name)
            .set_some("slug", input.slug)
            .set_some("value_required", input.value_required)
            .set_some("is_variant_only", input.is_variant_only)
            .set_some("visible_in_storefront", input.visible_in_storefront)
            .set_some("filterable_in_storefront", input.filterable_in_storefront)
            .set_some("filterable_in_dashboard", input.filterable_in_dashboard)
            .set_some("storefront_search_position", input.storefront_search_position)
            .set_some("available_in_grid", input.available_in_grid);
        let attribute = shared::update_returning::<Self>(context, "attributes", key, &values, UNIQUE_FIELDS)
            .await?;

        if let Some(ids) = input.remove_values {
            let remove = Id::require_keys(&ids, Id::ATTRIBUTE_VALUE_KIND, "removeValues")?;
            let n = context.db
                .execute("delete from attribute_values where attribute = $1 and id = any($2)", &[&key, &remove])
                .await?;
            if n as usize != remove.len() {
                return Err(invalid_input!(
                    key = "not-found",
                    "some values to remove do not belong to this attribute",
                ).on_field("removeValues"));
            }
        }
        for value in input.add_values.into_iter().flatten() {
            AttributeValue::insert(context, key, value).await?;
        }

        Ok(attribute)
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::ATTRIBUTE_KIND, "id")?;
        let attribute = shared::delete_returning::<Self>(context, "attributes", key).await?;
        info!("Deleted attribute '{}' ({:?})", attribute.slug, attribute.key);
        Ok(attribute)
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::ATTRIBUTE_KIND, "ids")?;
        shared::bulk_delete(context, "attributes", &keys, None).await
    }

    /// Assigns attributes to a product type, appending them to the product
    /// or variant attribute list.
    pub(crate) async fn assign(
        product_type_id: Id,
        operations: Vec<AttributeAssignInput>,
        context: &Context,
    ) -> ApiResult<ProductType> {
        let type_key = product_type_id.require_key(Id::PRODUCT_TYPE_KIND, "productTypeId")?;
        let product_type = ProductType::require(type_key, "productTypeId", context).await?;

        for op in &operations {
            let attribute = op.id.require_key(Id::ATTRIBUTE_KIND, "operations")?;
            if op.typ.is_variant() && !product_type.has_variants() {
                return Err(invalid_input!(
                    key = "invalid",
                    "variants are disabled for this product type",
                ).on_field("operations"));
            }
            let row = context.db.query_one(
                "select exists (select from product_type_attributes \
                    where product_type = $1 and attribute = $2)",
                &[&type_key, &attribute],
            ).await?;
            if row.get::<_, bool>(0) {
                return Err(invalid_input!(
                    key = "unique",
                    "attribute is already assigned to this product type",
                ).on_field("operations"));
            }

            context.db.execute(
                "insert into product_type_attributes \
                    (product_type, attribute, variant_attribute, sort_order) \
                    values ($1, $2, $3, coalesce(( \
                        select max(sort_order) + 1 from product_type_attributes \
                        where product_type = $1 and variant_attribute = $3 \
                    ), 0))",
                &[&type_key, &attribute, &op.typ.is_variant()],
            ).await.map_err(|e| crate::api::err::constraint_violation(e, &[]).on_field("operations"))?;
        }

        Ok(product_type)
    }

    /// Removes attributes from a product type together with the values
    /// products and variants of that type had selected for them.
    pub(crate) async fn unassign(
        product_type_id: Id,
        attribute_ids: Vec<Id>,
        context: &Context,
    ) -> ApiResult<ProductType> {
        let type_key = product_type_id.require_key(Id::PRODUCT_TYPE_KIND, "productTypeId")?;
        let attributes = Id::require_keys(&attribute_ids, Id::ATTRIBUTE_KIND, "attributeIds")?;
        let product_type = ProductType::require(type_key, "productTypeId", context).await?;

        context.db.execute(
            "delete from product_type_attributes where product_type = $1 and attribute = any($2)",
            &[&type_key, &attributes],
        ).await?;
        context.db.execute(
            "delete from product_attribute_values pav \
                using products, attribute_values av \
                where pav.product = products.id and products.product_type = $1 \
                    and pav.attribute_value = av.id and av.attribute = any($2)",
            &[&type_key, &attributes],
        ).await?;
        context.db.execute(
            "delete from variant_attribute_values vav \
                using product_variants v, products, attribute_values av \
                where vav.variant = v.id and v.product = products.id \
                    and products.product_type = $1 \
                    and vav.attribute_value = av.id and av.attribute = any($2)",
            &[&type_key, &attributes],
        ).await?;

        Ok(product_type)
    }

    pub(crate) async fn reorder_values(
        attribute_id: Id,
        moves: Vec<ReorderInput>,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = attribute_id.require_key(Id::ATTRIBUTE_KIND, "attributeId")?;
        let moves = to_moves(&moves, Id::ATTRIBUTE_VALUE_KIND, "moves")?;
        let attribute = shared::require_by_key::<Self>(context, "attributes", key, "attributeId")
            .await?;

        let scope = OrderScope {
            table: "attribute_values",
            item_col: "id",
            condition: &|p| format!("attribute = ${p}"),
            args: &dbargs![&key],
        };
        scope.apply_moves(context, &moves, "moves").await?;
        Ok(attribute)
    }

    pub(crate) async fn translate(
        id: Id,
        language_code: String,
        input: NameTranslationInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::ATTRIBUTE_KIND, "id")?;
        let attribute = shared::require_by_key::<Self>(context, "attributes", key, "id").await?;
        let values = input.into_assignments(100)?;
        TRANSLATIONS.upsert::<NameTranslation>(context, key, &language_code, values).await?;
        Ok(attribute)
    }

    /// Resolves the selected values of `inputs` for an object of the given
    /// product type, creating values that do not exist yet. Every attribute
    /// has to be assigned to the product type, and every required attribute
    /// of the type has to get a value.
    pub(crate) async fn resolve_selection(
        context: &Context,
        product_type: Key,
        variant: bool,
        inputs: &[AttributeValueInput],
        field: &'static str,
    ) -> ApiResult<Vec<Key>> {
        let rows = context.db.query(
            &format!(
                "select {} from attributes \
                    join product_type_attributes pta on pta.attribute = attributes.id \
                    where pta.product_type = $1 and pta.variant_attribute = $2",
                Self::SELECT,
            ),
            &[&product_type, &variant],
        ).await?;
        let assigned = rows.iter().map(Self::from_row_start).collect::<Vec<_>>();

        let mut out = vec![];
        for input in inputs {
            let key = input.id.require_key(Id::ATTRIBUTE_KIND, field)?;
            if !assigned.iter().any(|a| a.key == key) {
                return Err(invalid_input!(
                    key = "invalid",
                    "attribute {} is not assigned to this product type",
                    input.id,
                ).on_field(field));
            }
            for name in &input.values {
                check_required(name, 250, field)?;
                out.push(AttributeValue::get_or_create(context, key, name).await?);
            }
        }

        let missing = assigned.iter()
            .filter(|a| a.value_required)
            .find(|a| !inputs.iter().any(|i| {
                i.id.key_for(Id::ATTRIBUTE_KIND) == Some(a.key) && !i.values.is_empty()
            }));
        if let Some(missing) = missing {
            return Err(invalid_input!(
                key = "required",
                "attribute '{}' requires a value",
                missing.slug,
            ).on_field(field));
        }

        Ok(out)
    }
}

impl AttributeValue {
    async fn insert(context: &Context, attribute: Key, input: AttributeValueCreateInput) -> ApiResult<Self> {
        check_required(&input.name, 250, "name")?;
        let slug = slug_or_default(None, &input.name, 255)?;
        if let Some(value) = &input.value {
            check_length(value, 100, "value")?;
        }

        let mut values = SqlAssignments::new();
        values
            .set("attribute", attribute)
            .set("name", input.name)
            .set("slug", slug)
            .set_some("value", input.value)
            .set_expr("sort_order", "coalesce((select max(sort_order) + 1 from attribute_values \
                where attribute = $1), 0)");
        shared::insert_returning(context, "attribute_values", &values, VALUE_UNIQUE_FIELDS).await
    }

    /// Returns the key of the value with the given name's slug, inserting
    /// the value if needed.
    async fn get_or_create(context: &Context, attribute: Key, name: &str) -> ApiResult<Key> {
        let slug = slugify(name);
        let existing = context.db.query_opt(
            "select id from attribute_values where attribute = $1 and slug = $2",
            &[&attribute, &slug],
        ).await?;
        match existing {
            Some(row) => Ok(row.get(0)),
            None => {
                let input = AttributeValueCreateInput { name: name.to_owned(), value: None };
                Ok(Self::insert(context, attribute, input).await?.key)
            }
        }
    }

    pub(crate) async fn create(
        attribute: Id,
        input: AttributeValueCreateInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let attribute_key = attribute.require_key(Id::ATTRIBUTE_KIND, "attribute")?;
        shared::require_by_key::<Attribute>(context, "attributes", attribute_key, "attribute").await?;
        Self::insert(context, attribute_key, input).await
    }

    pub(crate) async fn update(
        id: Id,
        input: AttributeValueCreateInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::ATTRIBUTE_VALUE_KIND, "id")?;
        check_required(&input.name, 250, "name")?;
        let slug = slug_or_default(None, &input.name, 255)?;
        if let Some(value) = &input.value {
            check_length(value, 100, "value")?;
        }
        let mut values = SqlAssignments::new();
        values
            .set("name", input.name)
            .set("slug", slug)
            .set_some("value", input.value);
        shared::update_returning(context, "attribute_values", key, &values, VALUE_UNIQUE_FIELDS).await
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::ATTRIBUTE_VALUE_KIND, "id")?;
        shared::delete_returning(context, "attribute_values", key).await
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::ATTRIBUTE_VALUE_KIND, "ids")?;
        shared::bulk_delete(context, "attribute_values", &keys, None).await
    }

    pub(crate) async fn translate(
        id: Id,
        language_code: String,
        input: NameTranslationInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::ATTRIBUTE_VALUE_KIND, "id")?;
        let value = shared::require_by_key::<Self>(context, "attribute_values", key, "id").await?;
        let values = input.into_assignments(100)?;
        VALUE_TRANSLATIONS.upsert::<NameTranslation>(context, key, &language_code, values).await?;
        Ok(value)
    }

    /// Selected values (with their attributes) of a product or variant,
    /// ordered like the attributes of the product type.
    pub(crate) async fn load_selected(
        context: &Context,
        link_table: &str,
        owner_col: &str,
        owner: Key,
        variant: bool,
    ) -> ApiResult<Vec<(Attribute, AttributeValue)>> {
        let query = format!(
            "select {attr}, {value} from {link_table} link \
                join attribute_values on attribute_values.id = link.attribute_value \
                join attributes on attributes.id = attribute_values.attribute \
                left join product_type_attributes pta on pta.attribute = attributes.id \
                    and pta.variant_attribute = $2 \
                    and pta.product_type = $3 \
                where link.{owner_col} = $1 \
                order by pta.sort_order nulls last, attributes.id, attribute_values.sort_order",
            attr = Attribute::SELECT,
            value = AttributeValue::SELECT,
        );
        let product_type = Self::product_type_of(context, link_table, owner).await?;
        let rows = context.db.query(&query, &[&owner, &variant, &product_type]).await?;
        let offset = Attribute::SELECT.split(',').count();
        rows.iter()
            .map(|row| (Attribute::from_row_start(row), Self::from_row_offset(row, offset)))
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    async fn product_type_of(context: &Context, link_table: &str, owner: Key) -> ApiResult<Option<Key>> {
        let query = if link_table == "variant_attribute_values" {
            "select products.product_type from product_variants \
                join products on products.id = product_variants.product \
                where product_variants.id = $1"
        } else {
            "select product_type from products where id = $1"
        };
        Ok(context.db.query_opt(query, &[&owner]).await?.map(|row| row.get(0)))
    }

    fn from_row_offset(row: &Row, offset: usize) -> Self {
        Self {
            key: row.get(offset),
            attribute: row.get(offset + 1),
            name: row.get(offset + 2),
            slug: row.get(offset + 3),
            value: row.get(offset + 4),
        }
    }
}


#[cfg(test)]
mod tests {
    use crate::db::util::FromDb;
    use super::{Attribute, NameTranslation, NameTranslationInput};

    #[test]
    fn translation_fallback() {
        let t = NameTranslation { language_code: "de".into(), name: "Farbe".into() };
        assert_eq!(NameTranslation::merged(Some(t), "de".into(), "Color").name, "Farbe");
        assert_eq!(NameTranslation::merged(None, "de".into(), "Color").name, "Color");
    }

    #[test]
    fn translation_input() {
        let input = NameTranslationInput { name: Some("x".repeat(101)) };
        assert_eq!(input.into_assignments(100).unwrap_err().field, Some("name"));
        let input = NameTranslationInput { name: None };
        assert!(input.into_assignments(100).unwrap().is_empty());
    }

    #[test]
    fn selection_offset() {
        // `load_selected` reads the value columns after the attribute ones.
        assert_eq!(Attribute::SELECT.split(',').count(), 13);
    }
}
