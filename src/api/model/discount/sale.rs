use chrono::{DateTime, Utc};
use juniper::{graphql_object, GraphQLInputObject, GraphQLObject};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Cursor, Id,
        common::{to_positive_decimal, DateTimeRangeInput},
        err::{invalid_input, ApiResult},
        model::{
            product::{CategoryConnection, CollectionConnection, ProductConnection},
            shared::{
                self, define_connection, define_sort_field_and_input, load_connection,
                check_length, check_required, PaginationArgs,
            },
            translation::{self, Translations},
        },
    },
    db::{types::SaleType, util::{FromDb, SqlAssignments, SqlFilter}},
    model::Key,
    prelude::*,
};
use super::{check_dates, filter_status, Catalogue, CatalogueInput, DiscountStatus};


const TRANSLATIONS: Translations = Translations {
    table: "sale_translations",
    owner_col: "sale",
    constraint: "unique_sale_translation",
};

const CATALOGUE: Catalogue = Catalogue::new(
    "sale",
    "sale_products",
    "sale_categories",
    "sale_collections",
);


/// A discount that applies automatically to all matching catalogue items
/// while it is active.
pub(crate) struct Sale {
    pub(crate) key: Key,
    name: String,
    typ: SaleType,
    value: Decimal,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
}

impl FromDb for Sale {
    const SELECT: &'static str = "sales.id, sales.name, sales.type, sales.value, \
        sales.start_date, sales.end_date";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            name: row.get(1),
            typ: row.get(2),
            value: row.get(3),
            start_date: row.get(4),
            end_date: row.get(5),
        }
    }
}

#[graphql_object(Context = Context)]
impl Sale {
    fn id(&self) -> Id {
        Id::sale(self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[graphql(name = "type")]
    fn typ(&self) -> SaleType {
        self.typ
    }

    /// Fixed amount in the shop currency or a percentage, depending on `type`.
    fn value(&self) -> f64 {
        self.value.to_f64().unwrap_or_default()
    }

    fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    async fn products(
        &self,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<ProductConnection> {
        CATALOGUE.products(context, self.key, PaginationArgs::new(first, after, last, before)).await
    }

    async fn categories(
        &self,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<CategoryConnection> {
        CATALOGUE.categories(context, self.key, PaginationArgs::new(first, after, last, before)).await
    }

    async fn collections(
        &self,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<CollectionConnection> {
        CATALOGUE.collections(context, self.key, PaginationArgs::new(first, after, last, before)).await
    }

    async fn translation(
        &self,
        language_code: String,
        context: &Context,
    ) -> ApiResult<Option<SaleTranslation>> {
        TRANSLATIONS.load(context, self.key, &language_code).await
    }

    async fn translated(&self, language_code: String, context: &Context) -> ApiResult<SaleTranslation> {
        let t = TRANSLATIONS.load::<SaleTranslation>(context, self.key, &language_code).await?;
        Ok(SaleTranslation {
            name: translation::or_original(t.as_ref().map(|t| &*t.name), &self.name),
            language_code,
        })
    }
}

#[derive(Debug, GraphQLObject)]
pub(crate) struct SaleTranslation {
    language_code: String,
    name: String,
}

impl FromDb for SaleTranslation {
    const SELECT: &'static str = "sale_translations.language_code, sale_translations.name";

    fn from_row_start(row: &Row) -> Self {
        Self {
            language_code: row.get(0),
            name: row.get(1),
        }
    }
}

define_connection!(SaleConnection, SaleEdge, Sale);

define_sort_field_and_input!(
    pub(crate) enum SaleSortField {
        #[default]
        Name => "sales.name",
        StartDate => "sales.start_date",
        EndDate => "sales.end_date",
        Value => "sales.value",
        Type => "sales.type",
    };
    pub(crate) struct SaleSortingInput, default direction Ascending;
);

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct SaleFilterInput {
    status: Option<Vec<DiscountStatus>>,
    sale_type: Option<SaleType>,
    started: Option<DateTimeRangeInput>,
    search: Option<String>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct SaleInput {
    name: Option<String>,
    #[graphql(name = "type")]
    typ: Option<SaleType>,
    value: Option<f64>,
    products: Option<Vec<Id>>,
    categories: Option<Vec<Id>>,
    collections: Option<Vec<Id>>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct SaleTranslationInput {
    name: Option<String>,
}

const SEARCH: [&str; 3] = ["sales.name", "sales.value", "sales.type"];

impl Sale {
    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::SALE_KIND) else {
            return Ok(None);
        };
        shared::load_by_key(context, "sales", key, None).await
    }

    pub(crate) async fn list(
        query: Option<String>,
        filter: Option<SaleFilterInput>,
        sort_by: Option<SaleSortingInput>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<SaleConnection> {
        let mut sql = SqlFilter::new();
        if let Some(query) = &query {
            sql.search(&SEARCH, query);
        }
        if let Some(filter) = filter {
            filter_status(&mut sql, "sales", filter.status.as_deref().unwrap_or_default());
            if let Some(typ) = filter.sale_type {
                sql.eq("sales.type", typ);
            }
            if let Some(started) = &filter.started {
                started.apply(&mut sql, "sales.start_date");
            }
            if let Some(search) = &filter.search {
                sql.search(&SEARCH, search);
            }
        }

        load_connection(context, "sales", &sql, sort_by.unwrap_or_default(), &pagination)
            .await
            .map(Into::into)
    }

    pub(crate) async fn create(input: SaleInput, context: &Context) -> ApiResult<Self> {
        if input.name.is_none() {
            return Err(invalid_input!(key = "required", "a name is required").on_field("name"));
        }
        let (values, catalogue) = Self::assignments(input)?;
        let sale = shared::insert_returning::<Self>(context, "sales", &values, &[]).await?;
        CATALOGUE.add(context, sale.key, catalogue).await?;

        info!("Created sale '{}' ({:?})", sale.name, sale.key);
        Ok(sale)
    }

    pub(crate) async fn update(id: Id, input: SaleInput, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::SALE_KIND, "id")?;
        let (values, catalogue) = Self::assignments(input)?;
        let sale = shared::update_returning::<Self>(context, "sales", key, &values, &[]).await?;
        CATALOGUE.set(context, key, catalogue).await?;
        Ok(sale)
    }

    fn assignments(input: SaleInput) -> ApiResult<(SqlAssignments, CatalogueInput)> {
        if let Some(name) = &input.name {
            check_required(name, 255, "name")?;
        }
        check_dates(input.start_date, input.end_date)?;
        let value = input.value.map(|v| to_positive_decimal(v, "value")).transpose()?;
        if let (Some(SaleType::Percentage), Some(value)) = (input.typ, value) {
            if value > Decimal::ONE_HUNDRED {
                return Err(invalid_input!(
                    key = "invalid",
                    "a percentage must not be larger than 100",
                ).on_field("value"));
            }
        }

        let mut values = SqlAssignments::new();
        values
            .set_some("name", input.name)
            .set_some("type", input.typ)
            .set_some("value", value)
            .set_some("start_date", input.start_date)
            .set_some("end_date", input.end_date);
        let catalogue = CatalogueInput {
            products: input.products,
            categories: input.categories,
            collections: input.collections,
        };
        Ok((values, catalogue))
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::SALE_KIND, "id")?;
        let sale = shared::delete_returning::<Self>(context, "sales", key).await?;
        info!("Deleted sale '{}' ({:?})", sale.name, sale.key);
        Ok(sale)
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::SALE_KIND, "ids")?;
        shared::bulk_delete(context, "sales", &keys, None).await
    }

    pub(crate) async fn catalogues_add(
        id: Id,
        input: CatalogueInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::SALE_KIND, "id")?;
        let sale = shared::require_by_key::<Self>(context, "sales", key, "id").await?;
        CATALOGUE.add(context, key, input).await?;
        Ok(sale)
    }

    pub(crate) async fn catalogues_remove(
        id: Id,
        input: CatalogueInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::SALE_KIND, "id")?;
        let sale = shared::require_by_key::<Self>(context, "sales", key, "id").await?;
        CATALOGUE.remove(context, key, input).await?;
        Ok(sale)
    }

    pub(crate) async fn translate(
        id: Id,
        language_code: String,
        input: SaleTranslationInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::SALE_KIND, "id")?;
        let sale = shared::require_by_key::<Self>(context, "sales", key, "id").await?;

        let mut values = SqlAssignments::new();
        if let Some(name) = input.name {
            check_length(&name, 255, "name")?;
            values.set("name", name);
        }
        TRANSLATIONS.upsert::<SaleTranslation>(context, key, &language_code, values).await?;
        Ok(sale)
    }
}
