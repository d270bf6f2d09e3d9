use chrono::{DateTime, NaiveDate, Utc};
use juniper::{graphql_object, GraphQLInputObject, GraphQLObject};
use serde_json::Value;
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Id, JsonString,
        err::{invalid_input, ApiResult},
        model::{
            shared::{
                self, define_connection, define_sort_field_and_input, load_connection,
                PaginationArgs, Seo, SeoInput, check_length, check_required,
                slug_or_default, check_slug, sanitized, visibility_clause,
            },
            translation::{self, Translations},
        },
    },
    auth::Permission,
    db::util::{FromDb, SqlAssignments, SqlFilter},
    model::Key,
    prelude::*,
};


const TRANSLATIONS: Translations = Translations {
    table: "page_translations",
    owner_col: "page",
    constraint: "unique_page_translation",
};

const UNIQUE_FIELDS: &[(&str, &str)] = &[("unique_page_slug", "slug")];


/// A content page like "About us".
pub(crate) struct Page {
    pub(crate) key: Key,
    slug: String,
    title: String,
    content: String,
    content_json: Value,
    created: DateTime<Utc>,
    is_published: bool,
    publication_date: Option<NaiveDate>,
    seo_title: Option<String>,
    seo_description: Option<String>,
}

impl FromDb for Page {
    const SELECT: &'static str = "pages.id, pages.slug, pages.title, pages.content, \
        pages.content_json, pages.created, pages.is_published, pages.publication_date, \
        pages.seo_title, pages.seo_description";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            slug: row.get(1),
            title: row.get(2),
            content: row.get(3),
            content_json: row.get(4),
            created: row.get(5),
            is_published: row.get(6),
            publication_date: row.get(7),
            seo_title: row.get(8),
            seo_description: row.get(9),
        }
    }
}

#[graphql_object(Context = Context)]
impl Page {
    fn id(&self) -> Id {
        Id::page(self.key)
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn content(&self) -> &str {
        &self.content
    }

    /// Sanitized rich text document (Draft.js raw format).
    fn content_json(&self) -> JsonString {
        JsonString(self.content_json.clone())
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
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

    /// The stored translation into the given language, if any.
    async fn translation(
        &self,
        language_code: String,
        context: &Context,
    ) -> ApiResult<Option<PageTranslation>> {
        TRANSLATIONS.load(context, self.key, &language_code).await
    }

    /// This page in the given language, falling back to the untranslated
    /// value for every field that is not translated.
    async fn translated(&self, language_code: String, context: &Context) -> ApiResult<PageTranslation> {
        let t = TRANSLATIONS.load::<PageTranslation>(context, self.key, &language_code).await?;
        Ok(PageTranslation {
            title: translation::or_original(t.as_ref().map(|t| &*t.title), &self.title),
            content: translation::or_original(t.as_ref().map(|t| &*t.content), &self.content),
            content_json: JsonString(translation::or_original_json(
                t.as_ref().map(|t| &t.content_json.0),
                &self.content_json,
            )),
            seo: Seo {
                title: translation::or_original_opt(
                    t.as_ref().and_then(|t| t.seo.title.as_deref()),
                    self.seo_title.as_deref(),
                ),
                description: translation::or_original_opt(
                    t.as_ref().and_then(|t| t.seo.description.as_deref()),
                    self.seo_description.as_deref(),
                ),
            },
            language_code,
        })
    }
}

#[derive(Debug, GraphQLObject)]
pub(crate) struct PageTranslation {
    language_code: String,
    title: String,
    content: String,
    content_json: JsonString,
    seo: Seo,
}

impl FromDb for PageTranslation {
    const SELECT: &'static str = "page_translations.language_code, page_translations.title, \
        page_translations.content, page_translations.content_json, \
        page_translations.seo_title, page_translations.seo_description";

    fn from_row_start(row: &Row) -> Self {
        Self {
            language_code: row.get(0),
            title: row.get(1),
            content: row.get(2),
            content_json: JsonString(row.get(3)),
            seo: Seo {
                title: row.get(4),
                description: row.get(5),
            },
        }
    }
}

define_connection!(PageConnection, PageEdge, Page);

define_sort_field_and_input!(
    pub(crate) enum PageSortField {
        #[default]
        Slug => "pages.slug",
        Title => "pages.title",
        CreationDate => "pages.created",
        PublicationDate => "pages.publication_date",
        Visibility => "pages.is_published",
    };
    pub(crate) struct PageSortingInput, default direction Ascending;
);

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct PageFilterInput {
    search: Option<String>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct PageInput {
    slug: Option<String>,
    title: Option<String>,
    content: Option<String>,
    content_json: Option<JsonString>,
    is_published: Option<bool>,
    publication_date: Option<NaiveDate>,
    seo: Option<SeoInput>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct PageTranslationInput {
    title: Option<String>,
    content: Option<String>,
    content_json: Option<JsonString>,
    seo_title: Option<String>,
    seo_description: Option<String>,
}


impl Page {
    fn visibility_filter(context: &Context) -> Option<String> {
        (!context.can_see_unpublished(Permission::ManagePages))
            .then(|| visibility_clause("pages"))
    }

    /// Loads a page by ID or slug. Exactly one of both has to be given.
    pub(crate) async fn load(
        id: Option<Id>,
        slug: Option<String>,
        context: &Context,
    ) -> ApiResult<Option<Self>> {
        let visibility = Self::visibility_filter(context);
        match (id, slug) {
            (Some(id), None) => {
                let Some(key) = id.key_for(Id::PAGE_KIND) else {
                    return Ok(None);
                };
                shared::load_by_key(context, "pages", key, visibility.as_deref()).await
            }
            (None, Some(slug)) => {
                let extra = visibility.map(|v| format!("and {v}")).unwrap_or_default();
                let query = format!("select {} from pages where slug = $1 {extra}", Self::SELECT);
                context.db.query_opt(&query, &[&slug]).await?
                    .map(|row| Self::from_row_start(&row))
                    .pipe(Ok)
            }
            _ => Err(invalid_input!("exactly one of 'id' and 'slug' has to be given")),
        }
    }

    pub(crate) async fn list(
        query: Option<String>,
        filter: Option<PageFilterInput>,
        sort_by: Option<PageSortingInput>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<PageConnection> {
        let mut sql = SqlFilter::new();
        if let Some(visibility) = Self::visibility_filter(context) {
            sql.and(visibility);
        }
        let search = ["pages.title", "pages.slug", "pages.content"];
        if let Some(query) = &query {
            sql.search(&search, query);
        }
        if let Some(needle) = filter.and_then(|f| f.search) {
            sql.search(&search, &needle);
        }

        load_connection(context, "pages", &sql, sort_by.unwrap_or_default(), &pagination)
            .await
            .map(Into::into)
    }

    pub(crate) async fn create(input: PageInput, context: &Context) -> ApiResult<Self> {
        let Some(title) = input.title.clone() else {
            return Err(invalid_input!(key = "required", "a title is required").on_field("title"));
        };
        check_required(&title, 200, "title")?;
        let slug = slug_or_default(input.slug.clone(), &title, 100)?;

        let mut values = SqlAssignments::new();
        values.set("slug", slug);
        Self::apply_input(input, &mut values)?;
        let page = shared::insert_returning::<Self>(context, "pages", &values, UNIQUE_FIELDS).await?;

        info!("Created page '{}' ({:?})", page.slug, page.key);
        Ok(page)
    }

    pub(crate) async fn update(id: Id, input: PageInput, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::PAGE_KIND, "id")?;
        let mut values = SqlAssignments::new();
        if let Some(slug) = &input.slug {
            check_slug(slug, 100)?;
            values.set("slug", slug.clone());
        }
        if let Some(title) = &input.title {
            check_required(title, 200, "title")?;
        }
        Self::apply_input(input, &mut values)?;

        shared::update_returning(context, "pages", key, &values, UNIQUE_FIELDS).await
    }

    /// Adds all fields of `input` except `slug` to `values`.
    fn apply_input(input: PageInput, values: &mut SqlAssignments) -> ApiResult<()> {
        values
            .set_some("title", input.title)
            .set_some("content", input.content)
            .set_some("content_json", input.content_json.map(sanitized))
            .set_some("is_published", input.is_published)
            .set_some("publication_date", input.publication_date);
        if let Some(seo) = input.seo {
            seo.apply(values)?;
        }
        Ok(())
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::PAGE_KIND, "id")?;
        let page = shared::delete_returning::<Self>(context, "pages", key).await?;
        info!("Deleted page '{}' ({:?})", page.slug, page.key);
        Ok(page)
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::PAGE_KIND, "ids")?;
        shared::bulk_delete(context, "pages", &keys, None).await
    }

    pub(crate) async fn bulk_publish(
        ids: Vec<Id>,
        is_published: bool,
        context: &Context,
    ) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::PAGE_KIND, "ids")?;
        shared::bulk_publish(context, "pages", &keys, is_published).await
    }

    pub(crate) async fn translate(
        id: Id,
        language_code: String,
        input: PageTranslationInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::PAGE_KIND, "id")?;
        let page = shared::require_by_key::<Self>(context, "pages", key, "id").await?;

        let mut values = SqlAssignments::new();
        if let Some(title) = &input.title {
            check_length(title, 255, "title")?;
        }
        if let Some(seo_title) = &input.seo_title {
            check_length(seo_title, 70, "seoTitle")?;
        }
        if let Some(seo_description) = &input.seo_description {
            check_length(seo_description, 300, "seoDescription")?;
        }
        values
            .set_some("title", input.title)
            .set_some("content", input.content)
            .set_some("content_json", input.content_json.map(sanitized))
            .set_some("seo_title", input.seo_title)
            .set_some("seo_description", input.seo_description);

        TRANSLATIONS.upsert::<PageTranslation>(context, key, &language_code, values).await?;
        Ok(page)
    }
}
