use chrono::{DateTime, NaiveDate, Utc};
use juniper::{graphql_object, GraphQLInputObject};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Id, JsonString, Money,
        common::{to_positive_decimal, PriceRangeInput},
        err::{invalid_input, ApiResult},
        model::{
            meta::{self, HasMetadata, MetaStore},
            shared::{
                self, define_connection, define_sort_field_and_input, load_connection,
                check_required, check_slug, sanitized, slug_or_default,
                visibility_clause, PaginationArgs, SeoInput, SortOrder,
            },
            translation::Translations,
        },
    },
    auth::Permission,
    db::util::{FromDb, SqlAssignments, SqlFilter},
    model::Key,
    prelude::*,
};
use super::{
    category_tree_query, group_selected, parse_attribute_pairs, stock_condition, Attribute,
    AttributeValue, AttributeValueInput, CatalogueTranslation, CatalogueTranslationInput, Category,
    Collection, Image, Original, ProductImage, ProductType, ProductVariant, SelectedAttribute,
    StockAvailability,
};


const TRANSLATIONS: Translations = Translations {
    table: "product_translations",
    owner_col: "product",
    constraint: "unique_product_translation",
};

const UNIQUE_FIELDS: &[(&str, &str)] = &[
    ("unique_product_slug", "slug"),
    ("unique_variant_sku", "sku"),
];


/// Something that is sold. What is actually put in a cart is one of its
/// variants.
pub(crate) struct Product {
    pub(crate) key: Key,
    product_type: Key,
    category: Option<Key>,
    name: String,
    slug: String,
    description: String,
    description_json: Value,
    price: Decimal,
    is_published: bool,
    publication_date: Option<NaiveDate>,
    updated_at: DateTime<Utc>,
    charge_taxes: bool,
    weight: Option<f32>,
    seo_title: Option<String>,
    seo_description: Option<String>,
    metadata: Value,
    private_metadata: Value,
}

impl FromDb for Product {
    const SELECT: &'static str = "products.id, products.product_type, products.category, \
        products.name, products.slug, products.description, products.description_json, \
        products.price, products.is_published, products.publication_date, \
        products.updated_at, products.charge_taxes, products.weight, products.seo_title, \
        products.seo_description, products.metadata, products.private_metadata";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            product_type: row.get(1),
            category: row.get(2),
            name: row.get(3),
            slug: row.get(4),
            description: row.get(5),
            description_json: row.get(6),
            price: row.get(7),
            is_published: row.get(8),
            publication_date: row.get(9),
            updated_at: row.get(10),
            charge_taxes: row.get(11),
            weight: row.get(12),
            seo_title: row.get(13),
            seo_description: row.get(14),
            metadata: row.get(15),
            private_metadata: row.get(16),
        }
    }
}

impl HasMetadata for Product {
    const TABLE: &'static str = "products";
    const ID_KIND: [u8; 2] = Id::PRODUCT_KIND;
}

#[graphql_object(Context = Context)]
impl Product {
    fn id(&self) -> Id {
        Id::product(self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn description_json(&self) -> JsonString {
        JsonString(self.description_json.clone())
    }

    fn seo_title(&self) -> Option<&str> {
        self.seo_title.as_deref()
    }

    fn seo_description(&self) -> Option<&str> {
        self.seo_description.as_deref()
    }

    async fn product_type(&self, context: &Context) -> ApiResult<ProductType> {
        ProductType::require(self.product_type, "productType", context).await
    }

    async fn category(&self, context: &Context) -> ApiResult<Option<Category>> {
        match self.category {
            Some(key) => shared::load_by_key(context, "categories", key, None).await,
            None => Ok(None),
        }
    }

    /// Base price. Variants may override it.
    fn price(&self, context: &Context) -> Money {
        Money::new(self.price, context.config.general.currency.as_str())
    }

    fn is_published(&self) -> bool {
        self.is_published
    }

    fn publication_date(&self) -> Option<NaiveDate> {
        self.publication_date
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn charge_taxes(&self) -> bool {
        self.charge_taxes
    }

    fn weight(&self) -> Option<f64> {
        self.weight.map(f64::from)
    }

    /// Whether the product is visible and at least one variant can be sold.
    async fn is_available(&self, context: &Context) -> ApiResult<bool> {
        if !self.is_visible(Utc::now().date_naive()) {
            return Ok(false);
        }
        let query = format!(
            "select {} from products where products.id = $1",
            stock_condition(StockAvailability::InStock),
        );
        Ok(context.db.query_one(&query, &[&self.key]).await?.get(0))
    }

    async fn variants(&self, context: &Context) -> ApiResult<Vec<ProductVariant>> {
        ProductVariant::of_product(context, self.key).await
    }

    async fn images(&self, context: &Context) -> ApiResult<Vec<ProductImage>> {
        ProductImage::of_product(context, self.key).await
    }

    /// The first image of the product.
    async fn thumbnail(&self, context: &Context) -> ApiResult<Option<Image>> {
        let first = ProductImage::of_product(context, self.key).await?.into_iter().next();
        Ok(first.and_then(ProductImage::into_image))
    }

    /// Collections containing this product. Hidden collections are only
    /// included for staff.
    async fn collections(&self, context: &Context) -> ApiResult<Vec<Collection>> {
        let visibility = (!context.can_see_unpublished(Permission::ManageProducts))
            .then(|| format!("and {}", visibility_clause("collections")))
            .unwrap_or_default();
        let query = format!(
            "select {} from collections \
                join collection_products cp on cp.collection = collections.id \
                where cp.product = $1 {visibility} \
                order by collections.name, collections.id",
            Collection::SELECT,
        );
        context.db.query(&query, &[&self.key]).await?
            .iter()
            .map(Collection::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    async fn attributes(&self, context: &Context) -> ApiResult<Vec<SelectedAttribute>> {
        let rows = AttributeValue::load_selected(
            context,
            "product_attribute_values",
            "product",
            self.key,
            false,
        ).await?;
        Ok(group_selected(rows))
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
    ) -> ApiResult<Option<CatalogueTranslation>> {
        TRANSLATIONS.load(context, self.key, &language_code).await
    }

    async fn translated(
        &self,
        language_code: String,
        context: &Context,
    ) -> ApiResult<CatalogueTranslation> {
        let t = TRANSLATIONS.load(context, self.key, &language_code).await?;
        Ok(CatalogueTranslation::merged(t, language_code, Original {
            name: &self.name,
            description: &self.description,
            description_json: &self.description_json,
            seo_title: self.seo_title.as_deref(),
            seo_description: self.seo_description.as_deref(),
        }))
    }
}

define_connection!(ProductConnection, ProductEdge, Product);

define_sort_field_and_input!(
    pub(crate) enum ProductOrderField {
        #[default]
        Name => "products.name",
        Price => "products.price",
        Date => "products.updated_at",
        Type => "(select pt.name from product_types pt where pt.id = products.product_type)",
        Published => "products.is_published",
    };
    pub(crate) struct ProductOrder, default direction Ascending;
);

/// Products having one of `values` (slugs) for the attribute `slug`, either
/// on the product itself or on one of its variants.
#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct AttributeFilter {
    slug: String,
    values: Vec<String>,
}

#[derive(Debug, Clone, Default, GraphQLInputObject)]
pub(crate) struct ProductFilterInput {
    is_published: Option<bool>,
    collections: Option<Vec<Id>>,
    categories: Option<Vec<Id>>,
    has_category: Option<bool>,
    price: Option<PriceRangeInput>,
    attributes: Option<Vec<AttributeFilter>>,
    stock_availability: Option<StockAvailability>,
    product_type: Option<Id>,
    search: Option<String>,
    ids: Option<Vec<Id>>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct ProductInput {
    /// Only used when creating a product. The type cannot be changed later.
    product_type: Option<Id>,
    category: Option<Id>,
    name: Option<String>,
    slug: Option<String>,
    description: Option<String>,
    description_json: Option<JsonString>,
    base_price: Option<f64>,
    is_published: Option<bool>,
    publication_date: Option<NaiveDate>,
    charge_taxes: Option<bool>,
    weight: Option<f64>,
    seo: Option<SeoInput>,
    attributes: Option<Vec<AttributeValueInput>>,
    collections: Option<Vec<Id>>,
    /// Stock keeping unit of the single variant of products whose type has
    /// no variants.
    sku: Option<String>,
    quantity: Option<i32>,
    track_inventory: Option<bool>,
}


impl Product {
    fn is_visible(&self, today: NaiveDate) -> bool {
        self.is_published && self.publication_date.map_or(true, |d| d <= today)
    }

    fn visibility_filter(context: &Context) -> Option<String> {
        (!context.can_see_unpublished(Permission::ManageProducts))
            .then(|| visibility_clause("products"))
    }

    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::PRODUCT_KIND) else {
            return Ok(None);
        };
        let visibility = Self::visibility_filter(context);
        shared::load_by_key(context, "products", key, visibility.as_deref()).await
    }

    pub(crate) async fn require(key: Key, field: &'static str, context: &Context) -> ApiResult<Self> {
        shared::require_by_key(context, "products", key, field).await
    }

    /// Loads products matching `sql`, hiding invisible ones from actors who
    /// may not see them. The parameters of `sql` keep their positions.
    pub(crate) async fn list_filtered(
        mut sql: SqlFilter,
        order: impl Into<SortOrder>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<ProductConnection> {
        if let Some(visibility) = Self::visibility_filter(context) {
            sql.and(visibility);
        }
        load_connection(context, "products", &sql, order, &pagination)
            .await
            .map(Into::into)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn list(
        query: Option<String>,
        filter: Option<ProductFilterInput>,
        sort_by: Option<ProductOrder>,
        attributes: Option<Vec<String>>,
        categories: Option<Vec<Id>>,
        collections: Option<Vec<Id>>,
        stock_availability: Option<StockAvailability>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<ProductConnection> {
        let search = ["products.name", "products.slug", "products.description"];
        let mut sql = SqlFilter::new();
        if let Some(query) = &query {
            sql.search(&search, query);
        }

        // The top level arguments predate `filter` and behave the same.
        let mut filter = filter.unwrap_or_default();
        if let Some(pairs) = attributes {
            let parsed = parse_attribute_pairs(&pairs)?
                .into_iter()
                .map(|(slug, values)| AttributeFilter { slug, values });
            filter.attributes.get_or_insert_with(Vec::new).extend(parsed);
        }
        if let Some(categories) = categories {
            filter.categories.get_or_insert_with(Vec::new).extend(categories);
        }
        if let Some(collections) = collections {
            filter.collections.get_or_insert_with(Vec::new).extend(collections);
        }
        if stock_availability.is_some() {
            filter.stock_availability = stock_availability;
        }
        Self::apply_filter(&mut sql, filter, &search)?;

        Self::list_filtered(sql, sort_by.unwrap_or_default(), pagination, context).await
    }

    fn apply_filter(sql: &mut SqlFilter, filter: ProductFilterInput, search: &[&str]) -> ApiResult<()> {
        if let Some(is_published) = filter.is_published {
            sql.eq("products.is_published", is_published);
        }
        if let Some(ids) = &filter.collections {
            let keys = Id::require_keys(ids, Id::COLLECTION_KIND, "collections")?;
            let p = sql.arg(keys);
            sql.and(format!(
                "products.id in (select product from collection_products where collection = any({p}))",
            ));
        }
        if let Some(ids) = &filter.categories {
            let keys = Id::require_keys(ids, Id::CATEGORY_KIND, "categories")?;
            let p = sql.arg(keys);
            sql.and(format!("products.category in ({})", category_tree_query(&p)));
        }
        match filter.has_category {
            Some(true) => { sql.and("products.category is not null"); }
            Some(false) => { sql.and("products.category is null"); }
            None => {}
        }
        if let Some(price) = &filter.price {
            price.apply(sql, "products.price")?;
        }
        for AttributeFilter { slug, values } in filter.attributes.into_iter().flatten() {
            let slug = sql.arg(slug);
            let values = sql.arg(values);
            let matching = format!(
                "select av.id from attribute_values av \
                    join attributes a on a.id = av.attribute \
                    where a.slug = {slug} and av.slug = any({values})",
            );
            sql.and(format!(
                "(products.id in (select product from product_attribute_values \
                    where attribute_value in ({matching})) \
                or products.id in (select v.product from product_variants v \
                    join variant_attribute_values vav on vav.variant = v.id \
                    where vav.attribute_value in ({matching})))",
            ));
        }
        if let Some(availability) = filter.stock_availability {
            sql.and(stock_condition(availability));
        }
        if let Some(id) = &filter.product_type {
            let key = id.require_key(Id::PRODUCT_TYPE_KIND, "productType")?;
            sql.eq("products.product_type", key);
        }
        if let Some(needle) = &filter.search {
            sql.search(search, needle);
        }
        if let Some(ids) = &filter.ids {
            let keys = Id::require_keys(ids, Id::PRODUCT_KIND, "ids")?;
            let p = sql.arg(keys);
            sql.and(format!("products.id = any({p})"));
        }
        Ok(())
    }

    pub(crate) async fn create(mut input: ProductInput, context: &Context) -> ApiResult<Self> {
        let Some(type_id) = input.product_type.take() else {
            return Err(invalid_input!(key = "required", "a product type is required")
                .on_field("productType"));
        };
        let type_key = type_id.require_key(Id::PRODUCT_TYPE_KIND, "productType")?;
        let product_type = ProductType::require(type_key, "productType", context).await?;

        let Some(name) = input.name.clone() else {
            return Err(invalid_input!(key = "required", "a name is required").on_field("name"));
        };
        check_required(&name, 250, "name")?;
        let slug = slug_or_default(input.slug.clone(), &name, 255)?;
        if input.base_price.is_none() {
            return Err(invalid_input!(key = "required", "a base price is required")
                .on_field("basePrice"));
        }

        // Products without variants get exactly one, created here.
        let simple = Self::simple_variant_input(&mut input, !product_type.has_variants())?;
        if !product_type.has_variants() && simple.sku.is_none() {
            return Err(invalid_input!(
                key = "required",
                "products of a type without variants need a SKU",
            ).on_field("sku"));
        }

        let attributes = input.attributes.take();
        let collections = input.collections.take();
        let mut values = SqlAssignments::new();
        values.set("product_type", type_key).set("slug", slug);
        Self::apply_input(context, input, &mut values).await?;
        let product = shared::insert_returning::<Self>(context, "products", &values, UNIQUE_FIELDS)
            .await?;

        let selected = Attribute::resolve_selection(
            context,
            type_key,
            false,
            attributes.as_deref().unwrap_or_default(),
            "attributes",
        ).await?;
        Self::set_attribute_values(context, product.key, &selected).await?;
        if let Some(ids) = collections {
            Self::set_collections(context, product.key, &ids).await?;
        }
        if let Some(sku) = simple.sku {
            let mut values = SqlAssignments::new();
            values
                .set("product", product.key)
                .set("sku", sku)
                .set_some("quantity", simple.quantity)
                .set_some("track_inventory", simple.track_inventory);
            let query = format!("insert into product_variants {}", values.insert_clause());
            context.db.execute(&query, &values.params()).await
                .map_err(|e| crate::api::err::constraint_violation(e, UNIQUE_FIELDS))?;
        }

        info!("Created product '{}' ({:?})", product.slug, product.key);
        Ok(product)
    }

    pub(crate) async fn update(id: Id, mut input: ProductInput, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_KIND, "id")?;
        if input.product_type.is_some() {
            return Err(invalid_input!(
                key = "invalid",
                "the product type cannot be changed",
            ).on_field("productType"));
        }
        let existing = Self::require(key, "id", context).await?;
        let product_type = ProductType::require(existing.product_type, "id", context).await?;

        let mut values = SqlAssignments::new();
        if let Some(slug) = &input.slug {
            check_slug(slug, 255)?;
            values.set("slug", slug.clone());
        }
        if let Some(name) = &input.name {
            check_required(name, 250, "name")?;
        }
        let simple = Self::simple_variant_input(&mut input, !product_type.has_variants())?;
        let attributes = input.attributes.take();
        let collections = input.collections.take();
        Self::apply_input(context, input, &mut values).await?;
        values.set_expr("updated_at", "now()");
        let product = shared::update_returning::<Self>(context, "products", key, &values, UNIQUE_FIELDS)
            .await?;

        if let Some(attributes) = attributes {
            let selected = Attribute::resolve_selection(
                context,
                product.product_type,
                false,
                &attributes,
                "attributes",
            ).await?;
            context.db.execute("delete from product_attribute_values where product = $1", &[&key])
                .await?;
            Self::set_attribute_values(context, key, &selected).await?;
        }
        if let Some(ids) = collections {
            Self::set_collections(context, key, &ids).await?;
        }

        let mut variant = SqlAssignments::new();
        variant
            .set_some("sku", simple.sku)
            .set_some("quantity", simple.quantity)
            .set_some("track_inventory", simple.track_inventory);
        if !variant.is_empty() {
            let query = format!(
                "update product_variants set {} where product = ${}",
                variant.set_clause(),
                variant.num_params() + 1,
            );
            let mut params = variant.params();
            params.push(&key);
            context.db.execute(&query, &params).await
                .map_err(|e| crate::api::err::constraint_violation(e, UNIQUE_FIELDS))?;
        }

        Ok(product)
    }

    /// Takes the fields only meaningful for products without variants out
    /// of `input`, rejecting them if the product type has variants.
    fn simple_variant_input(input: &mut ProductInput, simple: bool) -> ApiResult<SimpleVariant> {
        let out = SimpleVariant {
            sku: input.sku.take(),
            quantity: input.quantity.take(),
            track_inventory: input.track_inventory.take(),
        };
        let given = out.sku.is_some() || out.quantity.is_some() || out.track_inventory.is_some();
        if given && !simple {
            return Err(invalid_input!(
                key = "invalid",
                "stock fields can only be set for product types without variants",
            ).on_field("sku"));
        }
        if let Some(sku) = &out.sku {
            check_required(sku, 255, "sku")?;
        }
        if out.quantity.is_some_and(|q| q < 0) {
            return Err(invalid_input!(key = "invalid", "quantity must not be negative")
                .on_field("quantity"));
        }
        Ok(out)
    }

    async fn apply_input(
        context: &Context,
        input: ProductInput,
        values: &mut SqlAssignments,
    ) -> ApiResult<()> {
        if let Some(category) = &input.category {
            let key = category.require_key(Id::CATEGORY_KIND, "category")?;
            shared::require_by_key::<Category>(context, "categories", key, "category").await?;
            values.set("category", key);
        }
        if let Some(price) = input.base_price {
            values.set("price", to_positive_decimal(price, "basePrice")?);
        }
        if let Some(weight) = input.weight {
            if weight < 0.0 {
                return Err(invalid_input!(key = "invalid", "weight must not be negative")
                    .on_field("weight"));
            }
            values.set("weight", weight as f32);
        }
        values
            .set_some("name", input.name)
            .set_some("description", input.description)
            .set_some("description_json", input.description_json.map(sanitized))
            .set_some("is_published", input.is_published)
            .set_some("publication_date", input.publication_date)
            .set_some("charge_taxes", input.charge_taxes);
        if let Some(seo) = input.seo {
            seo.apply(values)?;
        }
        Ok(())
    }

    async fn set_attribute_values(context: &Context, product: Key, values: &[Key]) -> ApiResult<()> {
        shared::link(context, "product_attribute_values", "product", product, "attribute_value", values)
            .await
    }

    /// Makes the product part of exactly the given collections, appending it
    /// to collections it was not in before.
    async fn set_collections(context: &Context, product: Key, ids: &[Id]) -> ApiResult<()> {
        let keys = Id::require_keys(ids, Id::COLLECTION_KIND, "collections")?;
        context.db.execute(
            "delete from collection_products where product = $1 and not (collection = any($2))",
            &[&product, &keys],
        ).await?;
        context.db.execute(
            "insert into collection_products (collection, product, sort_order) \
                select c, $1, coalesce(( \
                    select max(sort_order) + 1 from collection_products where collection = c \
                ), 0) \
                from unnest($2::bigint[]) as c \
                on conflict do nothing",
            &[&product, &keys],
        ).await.map_err(|e| crate::api::err::constraint_violation(e, &[]).on_field("collections"))?;
        Ok(())
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_KIND, "id")?;
        let product = shared::delete_returning::<Self>(context, "products", key).await?;
        info!("Deleted product '{}' ({:?})", product.slug, product.key);
        Ok(product)
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::PRODUCT_KIND, "ids")?;
        shared::bulk_delete(context, "products", &keys, None).await
    }

    pub(crate) async fn bulk_publish(
        ids: Vec<Id>,
        is_published: bool,
        context: &Context,
    ) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::PRODUCT_KIND, "ids")?;
        shared::bulk_publish(context, "products", &keys, is_published).await
    }

    pub(crate) async fn translate(
        id: Id,
        language_code: String,
        input: CatalogueTranslationInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_KIND, "id")?;
        let product = Self::require(key, "id", context).await?;
        let values = input.into_assignments(250)?;
        TRANSLATIONS.upsert::<CatalogueTranslation>(context, key, &language_code, values).await?;
        Ok(product)
    }

    pub(crate) fn product_type_key(&self) -> Key {
        self.product_type
    }

    pub(crate) fn price_amount(&self) -> Decimal {
        self.price
    }

    pub(crate) fn display_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
struct SimpleVariant {
    sku: Option<String>,
    quantity: Option<i32>,
    track_inventory: Option<bool>,
}


#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::{api::Id, db::util::SqlFilter, model::Key};
    use super::{Product, ProductFilterInput, ProductInput, StockAvailability};

    fn product(is_published: bool, publication_date: Option<NaiveDate>) -> Product {
        Product {
            key: Key(1),
            product_type: Key(1),
            category: None,
            name: "Shirt".into(),
            slug: "shirt".into(),
            description: String::new(),
            description_json: serde_json::json!({}),
            price: Decimal::new(1999, 2),
            is_published,
            publication_date,
            updated_at: Utc::now(),
            charge_taxes: true,
            weight: None,
            seo_title: None,
            seo_description: None,
            metadata: serde_json::json!({}),
            private_metadata: serde_json::json!({}),
        }
    }

    fn input() -> ProductInput {
        ProductInput {
            product_type: None,
            category: None,
            name: None,
            slug: None,
            description: None,
            description_json: None,
            base_price: None,
            is_published: None,
            publication_date: None,
            charge_taxes: None,
            weight: None,
            seo: None,
            attributes: None,
            collections: None,
            sku: None,
            quantity: None,
            track_inventory: None,
        }
    }

    #[test]
    fn visibility() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2024, 5, 11).unwrap();
        assert!(product(true, None).is_visible(today));
        assert!(product(true, Some(today)).is_visible(today));
        assert!(!product(true, Some(tomorrow)).is_visible(today));
        assert!(!product(false, None).is_visible(today));
    }

    #[test]
    fn stock_fields_need_simple_type() {
        let mut i = input();
        i.sku = Some("SKU-1".into());
        assert_eq!(
            Product::simple_variant_input(&mut i.clone(), false).unwrap_err().field,
            Some("sku"),
        );
        let simple = Product::simple_variant_input(&mut i, true).unwrap();
        assert_eq!(simple.sku.as_deref(), Some("SKU-1"));
        assert!(i.sku.is_none());

        let mut i = input();
        i.quantity = Some(-1);
        assert_eq!(Product::simple_variant_input(&mut i, true).unwrap_err().field, Some("quantity"));
    }

    #[test]
    fn filter_params_in_order() {
        let mut sql = SqlFilter::new();
        let filter = ProductFilterInput {
            is_published: Some(true),
            product_type: Some(Id::product_type(Key(4))),
            stock_availability: Some(StockAvailability::InStock),
            ..Default::default()
        };
        Product::apply_filter(&mut sql, filter, &["products.name"]).unwrap();
        assert_eq!(sql.num_params(), 2);
        let clause = sql.where_clause();
        assert!(clause.contains("products.is_published = $1"));
        assert!(clause.contains("products.product_type = $2"));
        assert!(clause.contains("exists (select 1 from product_variants"));
    }

    #[test]
    fn filter_rejects_foreign_ids() {
        let mut sql = SqlFilter::new();
        let filter = ProductFilterInput {
            categories: Some(vec![Id::collection(Key(1))]),
            ..Default::default()
        };
        let err = Product::apply_filter(&mut sql, filter, &[]).unwrap_err();
        assert_eq!(err.field, Some("categories"));
    }
}
