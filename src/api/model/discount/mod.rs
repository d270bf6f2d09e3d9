//! Sales (automatic discounts on parts of the catalogue) and vouchers
//! (discount codes).

use chrono::{DateTime, Utc};
use juniper::{GraphQLEnum, GraphQLInputObject};

use crate::{
    api::{
        Context, Id,
        err::{invalid_input, ApiResult},
        model::{
            product::{
                Category, CategoryConnection, CategorySortingInput,
                Collection, CollectionConnection, CollectionSortingInput,
                Product, ProductConnection, ProductSortingInput,
            },
            shared::{LinkTable, PaginationArgs},
        },
    },
    db::util::SqlFilter,
    model::Key,
};

mod sale;
mod voucher;

pub(crate) use self::{
    sale::{Sale, SaleConnection, SaleFilterInput, SaleInput, SaleSortingInput, SaleTranslationInput},
    voucher::{
        Voucher, VoucherConnection, VoucherFilterInput, VoucherInput, VoucherSortingInput,
        VoucherTranslationInput,
    },
};


#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum DiscountStatus {
    Active,
    Expired,
    Scheduled,
}

impl DiscountStatus {
    /// SQL condition matching discounts of `table` in this status. `now` is
    /// the placeholder of the current time.
    fn condition(self, table: &str, now: &str) -> String {
        match self {
            Self::Active => format!(
                "({table}.start_date <= {now} and \
                    ({table}.end_date is null or {table}.end_date >= {now}))"
            ),
            Self::Expired => format!("({table}.end_date < {now})"),
            Self::Scheduled => format!("({table}.start_date > {now})"),
        }
    }
}

/// Adds a condition matching any of `statuses`.
fn filter_status(sql: &mut SqlFilter, table: &str, statuses: &[DiscountStatus]) {
    if statuses.is_empty() {
        return;
    }
    let now = sql.arg(Utc::now());
    let ors = statuses.iter()
        .map(|s| s.condition(table, &now))
        .collect::<Vec<_>>()
        .join(" or ");
    sql.and(format!("({ors})"));
}

fn check_dates(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> ApiResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(invalid_input!(
                key = "invalid",
                "end date must not be before the start date",
            ).on_field("endDate"));
        }
    }
    Ok(())
}

/// Parts of the catalogue a discount applies to.
#[derive(Debug, Clone, Default, GraphQLInputObject)]
pub(crate) struct CatalogueInput {
    products: Option<Vec<Id>>,
    categories: Option<Vec<Id>>,
    collections: Option<Vec<Id>>,
}

/// The three link tables connecting a discount to the catalogue.
struct Catalogue {
    products: LinkTable,
    categories: LinkTable,
    collections: LinkTable,
}

impl Catalogue {
    const fn new(
        owner_col: &'static str,
        products: &'static str,
        categories: &'static str,
        collections: &'static str,
    ) -> Self {
        Self {
            products: LinkTable { table: products, owner_col, item_col: "product" },
            categories: LinkTable { table: categories, owner_col, item_col: "category" },
            collections: LinkTable { table: collections, owner_col, item_col: "collection" },
        }
    }

    async fn add(&self, context: &Context, owner: Key, input: CatalogueInput) -> ApiResult<()> {
        for (link, keys) in self.resolve(input)? {
            link.add(context, owner, &keys).await?;
        }
        Ok(())
    }

    async fn remove(&self, context: &Context, owner: Key, input: CatalogueInput) -> ApiResult<()> {
        for (link, keys) in self.resolve(input)? {
            link.remove(context, owner, &keys).await?;
        }
        Ok(())
    }

    /// Replaces the links of each part that is given in `input`.
    async fn set(&self, context: &Context, owner: Key, input: CatalogueInput) -> ApiResult<()> {
        for (link, keys) in self.resolve(input)? {
            link.set(context, owner, &keys).await?;
        }
        Ok(())
    }

    fn resolve(&self, input: CatalogueInput) -> ApiResult<Vec<(&LinkTable, Vec<Key>)>> {
        let mut out = vec![];
        if let Some(ids) = input.products {
            out.push((&self.products, Id::require_keys(&ids, Id::PRODUCT_KIND, "products")?));
        }
        if let Some(ids) = input.categories {
            out.push((&self.categories, Id::require_keys(&ids, Id::CATEGORY_KIND, "categories")?));
        }
        if let Some(ids) = input.collections {
            out.push((&self.collections, Id::require_keys(&ids, Id::COLLECTION_KIND, "collections")?));
        }
        Ok(out)
    }

    async fn products(
        &self,
        context: &Context,
        owner: Key,
        pagination: PaginationArgs,
    ) -> ApiResult<ProductConnection> {
        self.products
            .load::<Product>(context, owner, "products", ProductSortingInput::default(), &pagination)
            .await
            .map(Into::into)
    }

    async fn categories(
        &self,
        context: &Context,
        owner: Key,
        pagination: PaginationArgs,
    ) -> ApiResult<CategoryConnection> {
        self.categories
            .load::<Category>(context, owner, "categories", CategorySortingInput::default(), &pagination)
            .await
            .map(Into::into)
    }

    async fn collections(
        &self,
        context: &Context,
        owner: Key,
        pagination: PaginationArgs,
    ) -> ApiResult<CollectionConnection> {
        self.collections
            .load::<Collection>(context, owner, "collections", CollectionSortingInput::default(), &pagination)
            .await
            .map(Into::into)
    }
}


#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use crate::db::util::SqlFilter;
    use super::{check_dates, filter_status, DiscountStatus};

    #[test]
    fn status_conditions() {
        let mut sql = SqlFilter::new();
        filter_status(&mut sql, "sales", &[DiscountStatus::Expired, DiscountStatus::Scheduled]);
        assert_eq!(
            sql.where_clause(),
            "where ((sales.end_date < $1) or (sales.start_date > $1))",
        );

        let mut none = SqlFilter::new();
        filter_status(&mut none, "sales", &[]);
        assert!(none.is_empty());
    }

    #[test]
    fn date_order() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!(check_dates(Some(a), Some(b)).is_ok());
        assert!(check_dates(Some(a), None).is_ok());
        assert_eq!(check_dates(Some(b), Some(a)).unwrap_err().field, Some("endDate"));
    }
}
