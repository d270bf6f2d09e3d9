use juniper::{graphql_object, GraphQLInputObject};
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
                PaginationArgs, SeoInput,
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
    category_tree_query, CatalogueTranslation, CatalogueTranslationInput, Image, Original, Product,
    ProductConnection, ProductOrder,
};


const TRANSLATIONS: Translations = Translations {
    table: "category_translations",
    owner_col: "category",
    constraint: "unique_category_translation",
};

const UNIQUE_FIELDS: &[(&str, &str)] = &[("unique_category_slug", "slug")];


/// A node in the category tree. Every product is in at most one category.
pub(crate) struct Category {
    pub(crate) key: Key,
    name: String,
    slug: String,
    description: String,
    description_json: Value,
    parent: Option<Key>,
    level: i32,
    background_image: Option<String>,
    background_image_alt: String,
    seo_title: Option<String>,
    seo_description: Option<String>,
    metadata: Value,
    private_metadata: Value,
}

impl FromDb for Category {
    const SELECT: &'static str = "categories.id, categories.name, categories.slug, \
        categories.description, categories.description_json, categories.parent, \
        categories.level, categories.background_image, categories.background_image_alt, \
        categories.seo_title, categories.seo_description, categories.metadata, \
        categories.private_metadata";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            name: row.get(1),
            slug: row.get(2),
            description: row.get(3),
            description_json: row.get(4),
            parent: row.get(5),
            level: row.get(6),
            background_image: row.get(7),
            background_image_alt: row.get(8),
            seo_title: row.get(9),
            seo_description: row.get(10),
            metadata: row.get(11),
            private_metadata: row.get(12),
        }
    }
}

impl HasMetadata for Category {
    const TABLE: &'static str = "categories";
    const ID_KIND: [u8; 2] = Id::CATEGORY_KIND;
}

#[graphql_object(Context = Context)]
impl Category {
    fn id(&self) -> Id {
        Id::category(self.key)
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

    /// Depth in the category tree. Root categories have level 0.
    fn level(&self) -> i32 {
        self.level
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

    async fn parent(&self, context: &Context) -> ApiResult<Option<Category>> {
        match self.parent {
            Some(key) => shared::load_by_key(context, "categories", key, None).await,
            None => Ok(None),
        }
    }

    /// All categories from the root down to (excluding) this one.
    async fn ancestors(&self, context: &Context) -> ApiResult<Vec<Category>> {
        let query = format!(
            "with recursive path(id, depth) as ( \
                select parent, 1 from categories where id = $1 and parent is not null \
                union all select c.parent, path.depth + 1 from categories c \
                    join path on c.id = path.id where c.parent is not null \
            ) select {} from path join categories on categories.id = path.id \
                order by path.depth desc",
            Self::SELECT,
        );
        context.db.query(&query, &[&self.key]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    async fn children(
        &self,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<CategoryConnection> {
        let mut sql = SqlFilter::new();
        sql.eq("categories.parent", self.key);
        let pagination = PaginationArgs::new(first, after, last, before);
        load_connection(context, "categories", &sql, CategorySortingInput::default(), &pagination)
            .await
            .map(Into::into)
    }

    /// Products in this category and all its descendants.
    async fn products(
        &self,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<ProductConnection> {
        let mut sql = SqlFilter::new();
        let p = sql.arg(vec![self.key]);
        sql.and(format!("products.category in ({})", category_tree_query(&p)));
        let pagination = PaginationArgs::new(first, after, last, before);
        Product::list_filtered(sql, ProductOrder::default(), pagination, context).await
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

define_connection!(CategoryConnection, CategoryEdge, Category);

define_sort_field_and_input!(
    pub(crate) enum CategorySortField {
        #[default]
        Name => "categories.name",
        ProductCount => "(select count(*) from products where products.category = categories.id)",
        SubcategoryCount => "(select count(*) from categories c where c.parent = categories.id)",
    };
    pub(crate) struct CategorySortingInput, default direction Ascending;
);

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct CategoryFilterInput {
    search: Option<String>,
    ids: Option<Vec<Id>>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct CategoryInput {
    name: Option<String>,
    slug: Option<String>,
    description: Option<String>,
    description_json: Option<JsonString>,
    seo: Option<SeoInput>,
    background_image: Option<String>,
    background_image_alt: Option<String>,
}


impl Category {
    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::CATEGORY_KIND) else {
            return Ok(None);
        };
        shared::load_by_key(context, "categories", key, None).await
    }

    pub(crate) async fn list(
        query: Option<String>,
        filter: Option<CategoryFilterInput>,
        sort_by: Option<CategorySortingInput>,
        level: Option<i32>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<CategoryConnection> {
        let search = ["categories.name", "categories.slug", "categories.description"];
        let mut sql = SqlFilter::new();
        if let Some(query) = &query {
            sql.search(&search, query);
        }
        if let Some(level) = level {
            sql.eq("categories.level", level);
        }
        if let Some(filter) = filter {
            if let Some(needle) = &filter.search {
                sql.search(&search, needle);
            }
            if let Some(ids) = &filter.ids {
                let keys = Id::require_keys(ids, Id::CATEGORY_KIND, "ids")?;
                let p = sql.arg(keys);
                sql.and(format!("categories.id = any({p})"));
            }
        }

        load_connection(context, "categories", &sql, sort_by.unwrap_or_default(), &pagination)
            .await
            .map(Into::into)
    }

    pub(crate) async fn create(
        input: CategoryInput,
        parent: Option<Id>,
        context: &Context,
    ) -> ApiResult<Self> {
        let Some(name) = input.name.clone() else {
            return Err(invalid_input!(key = "required", "a name is required").on_field("name"));
        };
        check_required(&name, 250, "name")?;
        let slug = slug_or_default(input.slug.clone(), &name, 255)?;

        let mut values = SqlAssignments::new();
        values.set("slug", slug);
        if let Some(parent) = parent {
            let parent_key = parent.require_key(Id::CATEGORY_KIND, "parent")?;
            let parent = shared::require_by_key::<Self>(context, "categories", parent_key, "parent")
                .await?;
            values.set("parent", parent.key).set("level", parent.level + 1);
        }
        Self::apply_input(input, &mut values)?;
        let category = shared::insert_returning::<Self>(context, "categories", &values, UNIQUE_FIELDS)
            .await?;

        info!("Created category '{}' ({:?})", category.slug, category.key);
        Ok(category)
    }

    pub(crate) async fn update(id: Id, input: CategoryInput, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::CATEGORY_KIND, "id")?;
        let mut values = SqlAssignments::new();
        if let Some(slug) = &input.slug {
            check_slug(slug, 255)?;
            values.set("slug", slug.clone());
        }
        if let Some(name) = &input.name {
            check_required(name, 250, "name")?;
        }
        Self::apply_input(input, &mut values)?;

        shared::update_returning(context, "categories", key, &values, UNIQUE_FIELDS).await
    }

    fn apply_input(input: CategoryInput, values: &mut SqlAssignments) -> ApiResult<()> {
        if let Some(alt) = &input.background_image_alt {
            check_length(alt, 128, "backgroundImageAlt")?;
        }
        values
            .set_some("name", input.name)
            .set_some("description", input.description)
            .set_some("description_json", input.description_json.map(sanitized))
            .set_some("background_image", input.background_image)
            .set_some("background_image_alt", input.background_image_alt);
        if let Some(seo) = input.seo {
            seo.apply(values)?;
        }
        Ok(())
    }

    /// Deletes the category with all its descendants. Products in any of
    /// them lose their category and are unpublished.
    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::CATEGORY_KIND, "id")?;
        Self::unpublish_products(context, &[key]).await?;
        let category = shared::delete_returning::<Self>(context, "categories", key).await?;
        info!("Deleted category '{}' ({:?})", category.slug, category.key);
        Ok(category)
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::CATEGORY_KIND, "ids")?;
        Self::unpublish_products(context, &keys).await?;
        shared::bulk_delete(context, "categories", &keys, None).await
    }

    async fn unpublish_products(context: &Context, roots: &[Key]) -> ApiResult<()> {
        let query = format!(
            "update products set is_published = false where category in ({})",
            category_tree_query("$1"),
        );
        let count = context.db.execute(&query, &[&roots]).await?;
        if count > 0 {
            debug!("Unpublished {count} products of deleted categories");
        }
        Ok(())
    }

    pub(crate) async fn translate(
        id: Id,
        language_code: String,
        input: CatalogueTranslationInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::CATEGORY_KIND, "id")?;
        let category = shared::require_by_key::<Self>(context, "categories", key, "id").await?;
        let values = input.into_assignments(128)?;
        TRANSLATIONS.upsert::<CatalogueTranslation>(context, key, &language_code, values).await?;
        Ok(category)
    }
}
