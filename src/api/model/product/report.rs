use chrono::Utc;
use juniper::GraphQLObject;
use rust_decimal::Decimal;

use crate::{
    api::{
        Context, ReportingPeriod, TaxedMoney,
        err::ApiResult,
        model::shared::{define_connection, Connection, PaginationArgs},
    },
    db::util::FromDb,
    prelude::*,
};
use super::ProductVariant;


/// How often a variant was ordered in the reporting period.
#[derive(GraphQLObject)]
#[graphql(context = Context)]
pub(crate) struct ProductSales {
    variant: ProductVariant,
    quantity_ordered: i32,
    revenue: TaxedMoney,
}

define_connection!(ProductSalesConnection, ProductSalesEdge, ProductSales);

/// Per variant totals of all placed, not canceled orders created since
/// `$1`.
const SALES: &str = "select ol.variant, sum(ol.quantity)::int as quantity, \
        sum(ol.quantity * ol.unit_price) as revenue \
    from order_lines ol \
    join orders o on o.id = ol.order_id \
    where o.created >= $1 \
        and o.status not in ('draft', 'canceled') \
        and ol.variant is not null \
    group by ol.variant";


/// Best selling variants of the period, by ordered quantity.
pub(crate) async fn product_sales(
    period: ReportingPeriod,
    pagination: PaginationArgs,
    context: &Context,
) -> ApiResult<ProductSalesConnection> {
    let start = period.start(Utc::now());

    let count_query = format!("select count(*) from ({SALES}) as sales");
    let total = context.db.query_one(&count_query, &[&start]).await?.get::<_, i64>(0);
    let window = pagination.window(total.try_into().unwrap_or(0), &context.config.api)?;
    if window.limit == 0 {
        return Ok(Connection { items: vec![], window }.into());
    }

    let query = format!(
        "with sales as ({SALES}) \
            select {}, sales.quantity, sales.revenue from sales \
            join product_variants on product_variants.id = sales.variant \
            order by sales.quantity desc, product_variants.id \
            limit $2 offset $3",
        ProductVariant::SELECT,
    );
    let limit = window.limit as i64;
    let offset = window.offset as i64;
    let rows = context.db.query(&query, &[&start, &limit, &offset]).await?;

    let currency = context.config.general.currency.as_str();
    let items = rows.iter()
        .map(|row| ProductSales {
            variant: ProductVariant::from_row_start(row),
            quantity_ordered: row.get(row.len() - 2),
            revenue: TaxedMoney::new(row.get::<_, Decimal>(row.len() - 1), currency),
        })
        .collect::<Vec<_>>();
    debug!("Loaded {} product sales rows since {start}", items.len());

    Ok(Connection { items, window }.into())
}
