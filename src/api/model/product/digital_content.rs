use chrono::{DateTime, Utc};
use juniper::{graphql_object, GraphQLInputObject};
use serde_json::Value;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::{
    api::{
        Context, Id,
        err::{invalid_input, ApiResult},
        model::{
            meta::{self, HasMetadata, MetaStore},
            shared::{
                self, define_connection, load_connection, check_required, PaginationArgs,
                SortDirection, SortOrder,
            },
        },
    },
    auth::Permission,
    db::util::{FromDb, SqlAssignments, SqlFilter},
    model::Key,
    prelude::*,
};
use super::ProductVariant;


const UNIQUE_FIELDS: &[(&str, &str)] = &[("unique_digital_content_variant", "variantId")];


/// A downloadable file sold as a product variant.
pub(crate) struct DigitalContent {
    pub(crate) key: Key,
    product_variant: Key,
    use_default_settings: bool,
    automatic_fulfillment: bool,
    content_file: String,
    max_downloads: Option<i32>,
    url_valid_days: Option<i32>,
    metadata: Value,
    private_metadata: Value,
}

impl FromDb for DigitalContent {
    const SELECT: &'static str = "digital_contents.id, digital_contents.product_variant, \
        digital_contents.use_default_settings, digital_contents.automatic_fulfillment, \
        digital_contents.content_file, digital_contents.max_downloads, \
        digital_contents.url_valid_days, digital_contents.metadata, \
        digital_contents.private_metadata";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            product_variant: row.get(1),
            use_default_settings: row.get(2),
            automatic_fulfillment: row.get(3),
            content_file: row.get(4),
            max_downloads: row.get(5),
            url_valid_days: row.get(6),
            metadata: row.get(7),
            private_metadata: row.get(8),
        }
    }
}

impl HasMetadata for DigitalContent {
    const TABLE: &'static str = "digital_contents";
    const ID_KIND: [u8; 2] = Id::DIGITAL_CONTENT_KIND;
}

#[graphql_object(Context = Context)]
impl DigitalContent {
    fn id(&self) -> Id {
        Id::digital_content(self.key)
    }

    fn use_default_settings(&self) -> bool {
        self.use_default_settings
    }

    fn automatic_fulfillment(&self) -> bool {
        self.automatic_fulfillment
    }

    fn content_file(&self) -> &str {
        &self.content_file
    }

    fn max_downloads(&self) -> Option<i32> {
        self.max_downloads
    }

    fn url_valid_days(&self) -> Option<i32> {
        self.url_valid_days
    }

    async fn urls(&self, context: &Context) -> ApiResult<Vec<DigitalContentUrl>> {
        let query = format!(
            "select {} from digital_content_urls where content = $1 order by created, id",
            DigitalContentUrl::SELECT,
        );
        context.db.query(&query, &[&self.key]).await?
            .iter()
            .map(DigitalContentUrl::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    async fn product_variant(&self, context: &Context) -> ApiResult<ProductVariant> {
        ProductVariant::require(self.product_variant, "productVariant", context).await
    }

    fn meta(&self) -> Vec<MetaStore> {
        meta::stores(&self.metadata)
    }

    fn private_meta(&self, context: &Context) -> ApiResult<Vec<MetaStore>> {
        meta::private_stores(context, &self.private_metadata, Permission::ManageProducts)
    }
}

/// A personal download link for digital content.
pub(crate) struct DigitalContentUrl {
    key: Key,
    token: Uuid,
    content: Key,
    created: DateTime<Utc>,
    download_num: i32,
}

impl FromDb for DigitalContentUrl {
    const SELECT: &'static str = "digital_content_urls.id, digital_content_urls.token, \
        digital_content_urls.content, digital_content_urls.created, \
        digital_content_urls.download_num";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            token: row.get(1),
            content: row.get(2),
            created: row.get(3),
            download_num: row.get(4),
        }
    }
}

#[graphql_object(Context = Context)]
impl DigitalContentUrl {
    fn id(&self) -> Id {
        Id::digital_content_url(self.key)
    }

    fn token(&self) -> Uuid {
        self.token
    }

    /// Path of the download, relative to the shop's domain.
    fn url(&self) -> String {
        download_path(self.token)
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn download_num(&self) -> i32 {
        self.download_num
    }

    async fn content(&self, context: &Context) -> ApiResult<DigitalContent> {
        shared::require_by_key(context, "digital_contents", self.content, "content").await
    }
}

fn download_path(token: Uuid) -> String {
    format!("/digital-download/{token}/")
}

define_connection!(DigitalContentConnection, DigitalContentEdge, DigitalContent);

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct DigitalContentInput {
    /// If set, the shop wide settings apply and the other settings are
    /// ignored.
    use_default_settings: bool,
    max_downloads: Option<i32>,
    url_valid_days: Option<i32>,
    automatic_fulfillment: Option<bool>,
    /// URL of the uploaded file. Required when creating.
    content_file: Option<String>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct DigitalContentUrlCreateInput {
    content: Id,
}


impl DigitalContentInput {
    fn into_assignments(self) -> ApiResult<SqlAssignments> {
        if !self.use_default_settings {
            let missing = [
                (self.max_downloads.is_none(), "maxDownloads"),
                (self.url_valid_days.is_none(), "urlValidDays"),
                (self.automatic_fulfillment.is_none(), "automaticFulfillment"),
            ].into_iter().find(|(missing, _)| *missing);
            if let Some((_, field)) = missing {
                return Err(invalid_input!(
                    key = "required",
                    "all settings are required unless the default settings are used",
                ).on_field(field));
            }
        }
        for (value, field) in [(self.max_downloads, "maxDownloads"), (self.url_valid_days, "urlValidDays")] {
            if value.is_some_and(|v| v < 1) {
                return Err(invalid_input!(key = "invalid", "value has to be positive").on_field(field));
            }
        }
        if let Some(file) = &self.content_file {
            check_required(file, usize::MAX, "contentFile")?;
        }

        let mut values = SqlAssignments::new();
        values.set("use_default_settings", self.use_default_settings);
        if !self.use_default_settings {
            values
                .set("max_downloads", self.max_downloads)
                .set("url_valid_days", self.url_valid_days)
                .set_some("automatic_fulfillment", self.automatic_fulfillment);
        }
        values.set_some("content_file", self.content_file);
        Ok(values)
    }
}

impl DigitalContent {
    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::DIGITAL_CONTENT_KIND) else {
            return Ok(None);
        };
        shared::load_by_key(context, "digital_contents", key, None).await
    }

    pub(crate) async fn of_variant(context: &Context, variant: Key) -> ApiResult<Option<Self>> {
        let query = format!("select {} from digital_contents where product_variant = $1", Self::SELECT);
        context.db.query_opt(&query, &[&variant]).await?
            .map(|row| Self::from_row_start(&row))
            .pipe(Ok)
    }

    pub(crate) async fn list(
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<DigitalContentConnection> {
        let order = SortOrder { column: "digital_contents.id", direction: SortDirection::Ascending };
        load_connection(context, "digital_contents", &SqlFilter::new(), order, &pagination)
            .await
            .map(Into::into)
    }

    pub(crate) async fn create(
        variant_id: Id,
        input: DigitalContentInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let variant = variant_id.require_key(Id::PRODUCT_VARIANT_KIND, "variantId")?;
        ProductVariant::require(variant, "variantId", context).await?;
        if input.content_file.is_none() {
            return Err(invalid_input!(key = "required", "a content file is required")
                .on_field("contentFile"));
        }

        let mut values = input.into_assignments()?;
        values.set("product_variant", variant);
        let content = shared::insert_returning::<Self>(context, "digital_contents", &values, UNIQUE_FIELDS)
            .await?;
        info!("Added digital content {:?} to variant {:?}", content.key, variant);
        Ok(content)
    }

    pub(crate) async fn update(
        variant_id: Id,
        input: DigitalContentInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let variant = variant_id.require_key(Id::PRODUCT_VARIANT_KIND, "variantId")?;
        let existing = Self::require_of_variant(context, variant).await?;
        let values = input.into_assignments()?;
        shared::update_returning(context, "digital_contents", existing.key, &values, UNIQUE_FIELDS).await
    }

    /// Removes the digital content of a variant and returns the variant.
    pub(crate) async fn delete(variant_id: Id, context: &Context) -> ApiResult<ProductVariant> {
        let variant = variant_id.require_key(Id::PRODUCT_VARIANT_KIND, "variantId")?;
        let existing = Self::require_of_variant(context, variant).await?;
        shared::delete_returning::<Self>(context, "digital_contents", existing.key).await?;
        ProductVariant::require(variant, "variantId", context).await
    }

    async fn require_of_variant(context: &Context, variant: Key) -> ApiResult<Self> {
        Self::of_variant(context, variant).await?.ok_or_else(|| invalid_input!(
            key = "not-found",
            "the variant has no digital content",
        ).on_field("variantId"))
    }
}

impl DigitalContentUrl {
    pub(crate) async fn create(input: DigitalContentUrlCreateInput, context: &Context) -> ApiResult<Self> {
        let content = input.content.require_key(Id::DIGITAL_CONTENT_KIND, "content")?;
        shared::require_by_key::<DigitalContent>(context, "digital_contents", content, "content")
            .await?;

        let mut values = SqlAssignments::new();
        values.set("content", content).set("token", Uuid::new_v4());
        shared::insert_returning(context, "digital_content_urls", &values, &[]).await
    }

    pub(crate) async fn of_line(context: &Context, line: Key) -> ApiResult<Option<Self>> {
        let query = format!("select {} from digital_content_urls where line = $1", Self::SELECT);
        context.db.query_opt(&query, &[&line]).await?
            .map(|row| Self::from_row_start(&row))
            .pipe(Ok)
    }

    /// Creates the download link for an order line if `variant` has digital
    /// content and the line has no link yet.
    pub(crate) async fn issue_for_line(
        context: &Context,
        variant: Key,
        line: Key,
    ) -> ApiResult<Option<Self>> {
        let query = format!(
            "insert into digital_content_urls (content, token, line) \
                select digital_contents.id, $3, $2 from digital_contents \
                where digital_contents.product_variant = $1 \
                on conflict (line) do nothing \
                returning {}",
            Self::SELECT,
        );
        let url = context.db.query_opt(&query, &[&variant, &line, &Uuid::new_v4()]).await?
            .map(|row| Self::from_row_start(&row));
        if let Some(url) = &url {
            debug!("Issued download link {:?} for order line {line:?}", url.key);
        }
        Ok(url)
    }
}


#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use super::{download_path, DigitalContentInput};

    fn input(use_default_settings: bool) -> DigitalContentInput {
        DigitalContentInput {
            use_default_settings,
            max_downloads: None,
            url_valid_days: None,
            automatic_fulfillment: None,
            content_file: Some("https://cdn.example.com/book.pdf".into()),
        }
    }

    #[test]
    fn default_settings_need_nothing_else() {
        let values = input(true).into_assignments().unwrap();
        assert!(values.contains("use_default_settings"));
        assert!(!values.contains("max_downloads"));
        assert!(values.contains("content_file"));
    }

    #[test]
    fn custom_settings_are_required() {
        let err = input(false).into_assignments().unwrap_err();
        assert_eq!(err.field, Some("maxDownloads"));

        let mut i = input(false);
        i.max_downloads = Some(3);
        i.url_valid_days = Some(0);
        i.automatic_fulfillment = Some(true);
        assert_eq!(i.into_assignments().unwrap_err().field, Some("urlValidDays"));
    }

    #[test]
    fn paths() {
        let token = Uuid::nil();
        assert_eq!(
            download_path(token),
            "/digital-download/00000000-0000-0000-0000-000000000000/",
        );
    }
}
