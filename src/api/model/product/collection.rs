use chrono::NaiveDate;
use juniper::{graphql_object, GraphQLEnum, GraphQLInputObject};
use serde_json::Value;
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Cursor, Id, JsonString,
        err::{invalid_input, ApiResult},
        model::{
            meta::{self, HasMetadata, MetaStore},
            shared::{
                self, define_connection, define_sort_field_and_input, load_connection,
                check_length, check_required, check_slug, sanitized, slug_or_default,
                visibility_clause, OrderScope, PaginationArgs, SeoInput, SortDirection, SortOrder,
            },
            translation::Translations,
        },
    },
    auth::Permission,
    db::util::{dbargs, FromDb, SqlAssignments, SqlFilter},
    model::{ordering::Move, Key},
    prelude::*,
};
use super::{
    CatalogueTranslation, CatalogueTranslationInput, Image, Original, Product, ProductConnection,
};


const TRANSLATIONS: Translations = Translations {
    table: "collection_translations",
    owner_col: "collection",
    constraint: "unique_collection_translation",
};

const UNIQUE_FIELDS: &[(&str, &str)] = &[("unique_collection_slug", "slug")];


/// A hand-picked, ordered list of products, e.g. "Summer sale".
pub(crate) struct Collection {
    pub(crate) key: Key,
    name: String,
    slug: String,
    description: String,
    description_json: Value,
    background_image: Option<String>,
    background_image_alt: String,
    is_published: bool,
    publication_date: Option<NaiveDate>,
    seo_title: Option<String>,
    seo_description: Option<String>,
    metadata: Value,
    private_metadata: Value,
}

impl FromDb for Collection {
    const SELECT: &'static str = "collections.id, collections.name, collections.slug, \
        collections.description, collections.description_json, collections.background_image, \
        collections.background_image_alt, collections.is_published, \
        collections.publication_date, collections.seo_title, collections.seo_description, \
        collections.metadata, collections.private_metadata";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            name: row.get(1),
            slug: row.get(2),
            description: row.get(3),
            description_json: row.get(4),
            background_image: row.get(5),
            background_image_alt: row.get(6),
            is_published: row.get(7),
            publication_date: row.get(8),
            seo_title: row.get(9),
            seo_description: row.get(10),
            metadata: row.get(11),
            private_metadata: row.get(12),
        }
    }
}

impl HasMetadata for Collection {
    const TABLE: &'static str = "collections";
    const ID_KIND: [u8; 2] = Id::COLLECTION_KIND;
}

#[graphql_object(Context = Context)]
impl Collection {
    fn id(&self) -> Id {
        Id::collection(self.key)
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

    fn is_published(&self) -> bool {
        self.is_published
    }

    fn publication_date(&self) -> Option<NaiveDate> {
        self.publication_date
    }

    fn seo_title(&self) -> Option<&str> {
        self.seo_title.as_deref()
    }

    fn seo_description(&self) -> Option<&str> {
        self.seo_description.as_deref()
    }

    fn background_image(&self) -> Option<Image> {
        Image::new(self.background_image.clone(), self.background_image_alt.clone())
    }

    /// The products of this collection in their manual order.
    async fn products(
        &self,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<ProductConnection> {
        let mut sql = SqlFilter::new();
        // Has to be `$1`: the sort expression below refers to it.
        let p = sql.arg(self.key);
        sql.and(format!(
            "products.id in (select product from collection_products where collection = {p})",
        ));
        let order = SortOrder {
            column: "(select sort_order from collection_products cp \
                where cp.product = products.id and cp.collection = $1)",
            direction: SortDirection::Ascending,
        };
        let pagination = PaginationArgs::new(first, after, last, before);
        Product::list_filtered(sql, order, pagination, context).await
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

define_connection!(CollectionConnection, CollectionEdge, Collection);

define_sort_field_and_input!(
    pub(crate) enum CollectionSortField {
        #[default]
        Name => "collections.name",
        Availability => "collections.is_published",
        ProductCount => "(select count(*) from collection_products cp \
            where cp.collection = collections.id)",
    };
    pub(crate) struct CollectionSortingInput, default direction Ascending;
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum CollectionPublished {
    Published,
    Hidden,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct CollectionFilterInput {
    published: Option<CollectionPublished>,
    search: Option<String>,
    ids: Option<Vec<Id>>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct CollectionInput {
    name: Option<String>,
    slug: Option<String>,
    description: Option<String>,
    description_json: Option<JsonString>,
    is_published: Option<bool>,
    publication_date: Option<NaiveDate>,
    background_image: Option<String>,
    background_image_alt: Option<String>,
    seo: Option<SeoInput>,
    /// Initial products. Only allowed on creation.
    products: Option<Vec<Id>>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct MoveProductInput {
    product_id: Id,
    /// Relative shift. Negative values move the product to the front.
    sort_order: Option<i32>,
}


impl Collection {
    fn visibility_filter(context: &Context) -> Option<String> {
        (!context.can_see_unpublished(Permission::ManageProducts))
            .then(|| visibility_clause("collections"))
    }

    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::COLLECTION_KIND) else {
            return Ok(None);
        };
        let visibility = Self::visibility_filter(context);
        shared::load_by_key(context, "collections", key, visibility.as_deref()).await
    }

    pub(crate) async fn list(
        query: Option<String>,
        filter: Option<CollectionFilterInput>,
        sort_by: Option<CollectionSortingInput>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<CollectionConnection> {
        let search = ["collections.name", "collections.slug"];
        let mut sql = SqlFilter::new();
        if let Some(visibility) = Self::visibility_filter(context) {
            sql.and(visibility);
        }
        if let Some(query) = &query {
            sql.search(&search, query);
        }
        if let Some(filter) = filter {
            match filter.published {
                Some(CollectionPublished::Published) => { sql.eq("collections.is_published", true); }
                Some(CollectionPublished::Hidden) => { sql.eq("collections.is_published", false); }
                None => {}
            }
            if let Some(needle) = &filter.search {
                sql.search(&search, needle);
            }
            if let Some(ids) = &filter.ids {
                let keys = Id::require_keys(ids, Id::COLLECTION_KIND, "ids")?;
                let p = sql.arg(keys);
                sql.and(format!("collections.id = any({p})"));
            }
        }

        load_connection(context, "collections", &sql, sort_by.unwrap_or_default(), &pagination)
            .await
            .map(Into::into)
    }

    pub(crate) async fn create(mut input: CollectionInput, context: &Context) -> ApiResult<Self> {
        let Some(name) = input.name.clone() else {
            return Err(invalid_input!(key = "required", "a name is required").on_field("name"));
        };
        check_required(&name, 250, "name")?;
        let slug = slug_or_default(input.slug.clone(), &name, 255)?;
        let products = input.products.take()
            .map(|ids| Id::require_keys(&ids, Id::PRODUCT_KIND, "products"))
            .transpose()?;

        let mut values = SqlAssignments::new();
        values.set("slug", slug);
        Self::apply_input(input, &mut values)?;
        let collection = shared::insert_returning::<Self>(context, "collections", &values, UNIQUE_FIELDS)
            .await?;
        if let Some(products) = products {
            Self::append_products(context, collection.key, &products).await?;
        }

        info!("Created collection '{}' ({:?})", collection.slug, collection.key);
        Ok(collection)
    }

    pub(crate) async fn update(id: Id, input: CollectionInput, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::COLLECTION_KIND, "id")?;
        if input.products.is_some() {
            return Err(invalid_input!(
                key = "invalid",
                "use 'collectionAddProducts' and 'collectionRemoveProducts' to change products",
            ).on_field("products"));
        }
        let mut values = SqlAssignments::new();
        if let Some(slug) = &input.slug {
            check_slug(slug, 255)?;
            values.set("slug", slug.clone());
        }
        if let Some(name) = &input.name {
            check_required(name, 250, "name")?;
        }
        Self::apply_input(input, &mut values)?;

        shared::update_returning(context, "collections", key, &values, UNIQUE_FIELDS).await
    }

    fn apply_input(input: CollectionInput, values: &mut SqlAssignments) -> ApiResult<()> {
        if let Some(alt) = &input.background_image_alt {
            check_length(alt, 128, "backgroundImageAlt")?;
        }
        values
            .set_some("name", input.name)
            .set_some("description", input.description)
            .set_some("description_json", input.description_json.map(sanitized))
            .set_some("is_published", input.is_published)
            .set_some("publication_date", input.publication_date)
            .set_some("background_image", input.background_image)
            .set_some("background_image_alt", input.background_image_alt);
        if let Some(seo) = input.seo {
            seo.apply(values)?;
        }
        Ok(())
    }

    /// Adds products to the end of the collection. Products already in it
    /// keep their position.
    async fn append_products(context: &Context, key: Key, products: &[Key]) -> ApiResult<()> {
        let query = "insert into collection_products (collection, product, sort_order) \
            select $1, t.product, coalesce( \
                (select max(sort_order) from collection_products where collection = $1), 0 \
            ) + t.pos::int \
            from unnest($2::bigint[]) with ordinality as t(product, pos) \
            on conflict do nothing";
        context.db.execute(query, &[&key, &products]).await
            .map_err(|e| crate::api::err::constraint_violation(e, &[]).on_field("products"))?;
        Ok(())
    }

    pub(crate) async fn add_products(
        collection_id: Id,
        products: Vec<Id>,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = collection_id.require_key(Id::COLLECTION_KIND, "collectionId")?;
        let products = Id::require_keys(&products, Id::PRODUCT_KIND, "products")?;
        let collection = shared::require_by_key::<Self>(context, "collections", key, "collectionId")
            .await?;
        Self::append_products(context, key, &products).await?;
        Ok(collection)
    }

    pub(crate) async fn remove_products(
        collection_id: Id,
        products: Vec<Id>,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = collection_id.require_key(Id::COLLECTION_KIND, "collectionId")?;
        let products = Id::require_keys(&products, Id::PRODUCT_KIND, "products")?;
        let collection = shared::require_by_key::<Self>(context, "collections", key, "collectionId")
            .await?;
        shared::unlink(context, "collection_products", "collection", key, "product", &products)
            .await?;
        Ok(collection)
    }

    pub(crate) async fn reorder_products(
        collection_id: Id,
        moves: Vec<MoveProductInput>,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = collection_id.require_key(Id::COLLECTION_KIND, "collectionId")?;
        let moves = moves.iter()
            .map(|m| Ok(Move {
                key: m.product_id.require_key(Id::PRODUCT_KIND, "moves")?,
                shift: m.sort_order.unwrap_or(0),
            }))
            .collect::<ApiResult<Vec<_>>>()?;
        let collection = shared::require_by_key::<Self>(context, "collections", key, "collectionId")
            .await?;

        let scope = OrderScope {
            table: "collection_products",
            item_col: "product",
            condition: &|p| format!("collection = ${p}"),
            args: &dbargs![&key],
        };
        scope.apply_moves(context, &moves, "moves").await?;
        Ok(collection)
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::COLLECTION_KIND, "id")?;
        let collection = shared::delete_returning::<Self>(context, "collections", key).await?;
        info!("Deleted collection '{}' ({:?})", collection.slug, collection.key);
        Ok(collection)
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::COLLECTION_KIND, "ids")?;
        shared::bulk_delete(context, "collections", &keys, None).await
    }

    pub(crate) async fn bulk_publish(
        ids: Vec<Id>,
        is_published: bool,
        context: &Context,
    ) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::COLLECTION_KIND, "ids")?;
        shared::bulk_publish(context, "collections", &keys, is_published).await
    }

    pub(crate) async fn translate(
        id: Id,
        language_code: String,
        input: CatalogueTranslationInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::COLLECTION_KIND, "id")?;
        let collection = shared::require_by_key::<Self>(context, "collections", key, "id").await?;
        let values = input.into_assignments(128)?;
        TRANSLATIONS.upsert::<CatalogueTranslation>(context, key, &language_code, values).await?;
        Ok(collection)
    }
}
