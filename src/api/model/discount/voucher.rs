use chrono::{DateTime, Utc};
use juniper::{graphql_object, GraphQLEnum, GraphQLInputObject, GraphQLObject};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Cursor, Id, Money,
        common::{to_positive_decimal, DateTimeRangeInput, IntRangeInput},
        err::{invalid_input, ApiResult},
        model::{
            product::{CategoryConnection, CollectionConnection, ProductConnection},
            shared::{
                self, define_connection, define_sort_field_and_input, load_connection,
                check_length, PaginationArgs,
            },
            translation::{self, Translations},
        },
    },
    db::{
        types::{DiscountValueType, VoucherType},
        util::{FromDb, SqlAssignments, SqlFilter},
    },
    model::Key,
    prelude::*,
    util::random_code,
};
use super::{check_dates, filter_status, Catalogue, CatalogueInput, DiscountStatus};


const TRANSLATIONS: Translations = Translations {
    table: "voucher_translations",
    owner_col: "voucher",
    constraint: "unique_voucher_translation",
};

const CATALOGUE: Catalogue = Catalogue::new(
    "voucher",
    "voucher_products",
    "voucher_categories",
    "voucher_collections",
);

const UNIQUE_FIELDS: &[(&str, &str)] = &[("unique_voucher_code", "code")];

const CODE_LEN: usize = 12;


/// A discount code customers can enter at checkout.
pub(crate) struct Voucher {
    pub(crate) key: Key,
    typ: VoucherType,
    name: Option<String>,
    code: String,
    usage_limit: Option<i32>,
    used: i32,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    apply_once_per_order: bool,
    apply_once_per_customer: bool,
    discount_value_type: DiscountValueType,
    discount_value: Decimal,
    min_spent: Option<Decimal>,
    min_checkout_items_quantity: Option<i32>,
    countries: Vec<String>,
}

impl FromDb for Voucher {
    const SELECT: &'static str = "vouchers.id, vouchers.type, vouchers.name, vouchers.code, \
        vouchers.usage_limit, vouchers.used, vouchers.start_date, vouchers.end_date, \
        vouchers.apply_once_per_order, vouchers.apply_once_per_customer, \
        vouchers.discount_value_type, vouchers.discount_value, vouchers.min_spent, \
        vouchers.min_checkout_items_quantity, vouchers.countries";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            typ: row.get(1),
            name: row.get(2),
            code: row.get(3),
            usage_limit: row.get(4),
            used: row.get(5),
            start_date: row.get(6),
            end_date: row.get(7),
            apply_once_per_order: row.get(8),
            apply_once_per_customer: row.get(9),
            discount_value_type: row.get(10),
            discount_value: row.get(11),
            min_spent: row.get(12),
            min_checkout_items_quantity: row.get(13),
            countries: row.get(14),
        }
    }
}

#[graphql_object(Context = Context)]
impl Voucher {
    fn id(&self) -> Id {
        Id::voucher(self.key)
    }

    #[graphql(name = "type")]
    fn typ(&self) -> VoucherType {
        self.typ
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn code(&self) -> &str {
        &self.code
    }

    /// How often the voucher may be used in total. `null` means unlimited.
    fn usage_limit(&self) -> Option<i32> {
        self.usage_limit
    }

    fn used(&self) -> i32 {
        self.used
    }

    fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    fn apply_once_per_order(&self) -> bool {
        self.apply_once_per_order
    }

    fn apply_once_per_customer(&self) -> bool {
        self.apply_once_per_customer
    }

    fn discount_value_type(&self) -> DiscountValueType {
        self.discount_value_type
    }

    fn discount_value(&self) -> f64 {
        self.discount_value.to_f64().unwrap_or_default()
    }

    fn min_spent(&self, context: &Context) -> Option<Money> {
        self.min_spent.map(|amount| Money::new(amount, context.config.general.currency.as_str()))
    }

    fn min_checkout_items_quantity(&self) -> Option<i32> {
        self.min_checkout_items_quantity
    }

    /// ISO 3166-1 alpha-2 codes of the countries the voucher is valid in.
    /// Empty means everywhere.
    fn countries(&self) -> Vec<String> {
        self.countries.clone()
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
    ) -> ApiResult<Option<VoucherTranslation>> {
        TRANSLATIONS.load(context, self.key, &language_code).await
    }

    async fn translated(
        &self,
        language_code: String,
        context: &Context,
    ) -> ApiResult<VoucherTranslation> {
        let t = TRANSLATIONS.load::<VoucherTranslation>(context, self.key, &language_code).await?;
        Ok(VoucherTranslation {
            name: translation::or_original_opt(
                t.as_ref().and_then(|t| t.name.as_deref()),
                self.name.as_deref(),
            ),
            language_code,
        })
    }
}

#[derive(Debug, GraphQLObject)]
pub(crate) struct VoucherTranslation {
    language_code: String,
    name: Option<String>,
}

impl FromDb for VoucherTranslation {
    const SELECT: &'static str = "voucher_translations.language_code, voucher_translations.name";

    fn from_row_start(row: &Row) -> Self {
        Self {
            language_code: row.get(0),
            name: Some(row.get(1)),
        }
    }
}

define_connection!(VoucherConnection, VoucherEdge, Voucher);

define_sort_field_and_input!(
    pub(crate) enum VoucherSortField {
        #[default]
        Code => "vouchers.code",
        StartDate => "vouchers.start_date",
        EndDate => "vouchers.end_date",
        Value => "vouchers.discount_value",
        Type => "vouchers.type",
        UsageLimit => "vouchers.usage_limit",
        MinimumSpentAmount => "vouchers.min_spent",
    };
    pub(crate) struct VoucherSortingInput, default direction Ascending;
);

/// Kind of discount used for filtering: the value type, or free shipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum VoucherDiscountType {
    Fixed,
    Percentage,
    Shipping,
}

impl VoucherDiscountType {
    fn condition(self) -> &'static str {
        match self {
            Self::Fixed => "vouchers.discount_value_type = 'fixed'",
            Self::Percentage => "vouchers.discount_value_type = 'percentage'",
            Self::Shipping => "vouchers.type = 'shipping'",
        }
    }
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct VoucherFilterInput {
    status: Option<Vec<DiscountStatus>>,
    times_used: Option<IntRangeInput>,
    discount_type: Option<Vec<VoucherDiscountType>>,
    started: Option<DateTimeRangeInput>,
    search: Option<String>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct VoucherInput {
    #[graphql(name = "type")]
    typ: Option<VoucherType>,
    name: Option<String>,
    /// Generated when not given on creation.
    code: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    discount_value_type: Option<DiscountValueType>,
    discount_value: Option<f64>,
    products: Option<Vec<Id>>,
    collections: Option<Vec<Id>>,
    categories: Option<Vec<Id>>,
    min_amount_spent: Option<f64>,
    min_checkout_items_quantity: Option<i32>,
    countries: Option<Vec<String>>,
    apply_once_per_order: Option<bool>,
    apply_once_per_customer: Option<bool>,
    usage_limit: Option<i32>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct VoucherTranslationInput {
    name: Option<String>,
}

const SEARCH: [&str; 2] = ["vouchers.name", "vouchers.code"];

impl Voucher {
    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::VOUCHER_KIND) else {
            return Ok(None);
        };
        shared::load_by_key(context, "vouchers", key, None).await
    }

    pub(crate) async fn list(
        query: Option<String>,
        filter: Option<VoucherFilterInput>,
        sort_by: Option<VoucherSortingInput>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<VoucherConnection> {
        let mut sql = SqlFilter::new();
        if let Some(query) = &query {
            sql.search(&SEARCH, query);
        }
        if let Some(filter) = filter {
            filter_status(&mut sql, "vouchers", filter.status.as_deref().unwrap_or_default());
            if let Some(times_used) = &filter.times_used {
                times_used.apply(&mut sql, "vouchers.used");
            }
            if let Some(types) = filter.discount_type.filter(|t| !t.is_empty()) {
                let ors = types.iter().map(|t| t.condition()).collect::<Vec<_>>().join(" or ");
                sql.and(format!("({ors})"));
            }
            if let Some(started) = &filter.started {
                started.apply(&mut sql, "vouchers.start_date");
            }
            if let Some(search) = &filter.search {
                sql.search(&SEARCH, search);
            }
        }

        load_connection(context, "vouchers", &sql, sort_by.unwrap_or_default(), &pagination)
            .await
            .map(Into::into)
    }

    pub(crate) async fn create(mut input: VoucherInput, context: &Context) -> ApiResult<Self> {
        if input.discount_value.is_none() {
            return Err(invalid_input!(key = "required", "a discount value is required")
                .on_field("discountValue"));
        }
        if input.code.is_none() {
            input.code = Some(random_code(CODE_LEN));
        }

        let (values, catalogue) = Self::assignments(input)?;
        let voucher = shared::insert_returning::<Self>(context, "vouchers", &values, UNIQUE_FIELDS)
            .await?;
        CATALOGUE.add(context, voucher.key, catalogue).await?;

        info!("Created voucher '{}' ({:?})", voucher.code, voucher.key);
        Ok(voucher)
    }

    pub(crate) async fn update(id: Id, input: VoucherInput, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::VOUCHER_KIND, "id")?;
        let (values, catalogue) = Self::assignments(input)?;
        let voucher = shared::update_returning::<Self>(context, "vouchers", key, &values, UNIQUE_FIELDS)
            .await?;
        CATALOGUE.set(context, key, catalogue).await?;
        Ok(voucher)
    }

    fn assignments(input: VoucherInput) -> ApiResult<(SqlAssignments, CatalogueInput)> {
        if let Some(code) = &input.code {
            check_code(code)?;
        }
        if let Some(name) = &input.name {
            check_length(name, 255, "name")?;
        }
        if let Some(countries) = &input.countries {
            check_countries(countries)?;
        }
        for (value, field) in [
            (input.usage_limit, "usageLimit"),
            (input.min_checkout_items_quantity, "minCheckoutItemsQuantity"),
        ] {
            if value.is_some_and(|v| v < 0) {
                return Err(invalid_input!(key = "invalid", "value must not be negative")
                    .on_field(field));
            }
        }
        check_dates(input.start_date, input.end_date)?;

        let discount_value = input.discount_value
            .map(|v| to_positive_decimal(v, "discountValue"))
            .transpose()?;
        if let (Some(DiscountValueType::Percentage), Some(v)) = (input.discount_value_type, discount_value) {
            if v > Decimal::ONE_HUNDRED {
                return Err(invalid_input!(
                    key = "invalid",
                    "a percentage must not be larger than 100",
                ).on_field("discountValue"));
            }
        }
        let min_spent = input.min_amount_spent
            .map(|v| to_positive_decimal(v, "minAmountSpent"))
            .transpose()?;

        let mut values = SqlAssignments::new();
        values
            .set_some("type", input.typ)
            .set_some("name", input.name)
            .set_some("code", input.code)
            .set_some("start_date", input.start_date)
            .set_some("end_date", input.end_date)
            .set_some("discount_value_type", input.discount_value_type)
            .set_some("discount_value", discount_value)
            .set_some("min_spent", min_spent)
            .set_some("min_checkout_items_quantity", input.min_checkout_items_quantity)
            .set_some("countries", input.countries)
            .set_some("apply_once_per_order", input.apply_once_per_order)
            .set_some("apply_once_per_customer", input.apply_once_per_customer)
            .set_some("usage_limit", input.usage_limit);
        let catalogue = CatalogueInput {
            products: input.products,
            categories: input.categories,
            collections: input.collections,
        };
        Ok((values, catalogue))
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::VOUCHER_KIND, "id")?;
        let voucher = shared::delete_returning::<Self>(context, "vouchers", key).await?;
        info!("Deleted voucher '{}' ({:?})", voucher.code, voucher.key);
        Ok(voucher)
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::VOUCHER_KIND, "ids")?;
        shared::bulk_delete(context, "vouchers", &keys, None).await
    }

    pub(crate) async fn catalogues_add(
        id: Id,
        input: CatalogueInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::VOUCHER_KIND, "id")?;
        let voucher = shared::require_by_key::<Self>(context, "vouchers", key, "id").await?;
        CATALOGUE.add(context, key, input).await?;
        Ok(voucher)
    }

    pub(crate) async fn catalogues_remove(
        id: Id,
        input: CatalogueInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::VOUCHER_KIND, "id")?;
        let voucher = shared::require_by_key::<Self>(context, "vouchers", key, "id").await?;
        CATALOGUE.remove(context, key, input).await?;
        Ok(voucher)
    }

    pub(crate) async fn translate(
        id: Id,
        language_code: String,
        input: VoucherTranslationInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::VOUCHER_KIND, "id")?;
        let voucher = shared::require_by_key::<Self>(context, "vouchers", key, "id").await?;

        let mut values = SqlAssignments::new();
        if let Some(name) = input.name {
            check_length(&name, 255, "name")?;
            values.set("name", name);
        }
        TRANSLATIONS.upsert::<VoucherTranslation>(context, key, &language_code, values).await?;
        Ok(voucher)
    }
}

fn check_code(code: &str) -> ApiResult<()> {
    if code.trim().is_empty() {
        return Err(invalid_input!(key = "required", "code must not be empty").on_field("code"));
    }
    check_length(code, CODE_LEN, "code")
}

fn check_countries(countries: &[String]) -> ApiResult<()> {
    match countries.iter().find(|c| c.len() != 2 || !c.bytes().all(|b| b.is_ascii_uppercase())) {
        Some(bad) => Err(invalid_input!(
            key = "invalid",
            "'{bad}' is not an ISO 3166-1 alpha-2 country code",
        ).on_field("countries")),
        None => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::{check_code, check_countries, VoucherDiscountType};

    #[test]
    fn codes() {
        assert!(check_code("SUMMER24").is_ok());
        assert_eq!(check_code("").unwrap_err().key, Some("required"));
        assert_eq!(check_code("THIRTEENCHARS").unwrap_err().key, Some("max-length"));
    }

    #[test]
    fn countries() {
        assert!(check_countries(&["DE".into(), "PL".into()]).is_ok());
        assert!(check_countries(&[]).is_ok());
        assert!(check_countries(&["de".into()]).is_err());
        assert!(check_countries(&["DEU".into()]).is_err());
    }

    #[test]
    fn discount_type_conditions() {
        assert_eq!(VoucherDiscountType::Shipping.condition(), "vouchers.type = 'shipping'");
        assert!(VoucherDiscountType::Fixed.condition().contains("'fixed'"));
    }
}
