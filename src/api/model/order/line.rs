use juniper::{graphql_object, GraphQLInputObject};
use rust_decimal::Decimal;
use serde_json::json;
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Id, TaxedMoney,
        err::{invalid_input, ApiResult},
        model::{
            product::{DigitalContentUrl, ProductVariant},
            shared,
        },
    },
    db::{types::OrderEventType, util::FromDb},
    model::Key,
    prelude::*,
};
use super::{recalculate_total, Order, OrderEvent};


/// One variant with its quantity in an order. Product data is copied into
/// the line when it is added, so later catalogue changes do not alter
/// existing orders.
#[derive(Debug)]
pub(crate) struct OrderLine {
    pub(crate) key: Key,
    pub(super) order: Key,
    pub(super) variant: Option<Key>,
    pub(super) product_name: String,
    variant_name: String,
    product_sku: String,
    is_shipping_required: bool,
    pub(super) quantity: i32,
    pub(super) quantity_fulfilled: i32,
    unit_price: Decimal,
    currency: String,
}

impl FromDb for OrderLine {
    const SELECT: &'static str = "order_lines.id, order_lines.order_id, order_lines.variant, \
        order_lines.product_name, order_lines.variant_name, order_lines.product_sku, \
        order_lines.is_shipping_required, order_lines.quantity, order_lines.quantity_fulfilled, \
        order_lines.unit_price, \
        (select o.currency from orders o where o.id = order_lines.order_id)";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            order: row.get(1),
            variant: row.get(2),
            product_name: row.get(3),
            variant_name: row.get(4),
            product_sku: row.get(5),
            is_shipping_required: row.get(6),
            quantity: row.get(7),
            quantity_fulfilled: row.get(8),
            unit_price: row.get(9),
            currency: row.get(10),
        }
    }
}

#[graphql_object(Context = Context)]
impl OrderLine {
    fn id(&self) -> Id {
        Id::order_line(self.key)
    }

    fn product_name(&self) -> &str {
        &self.product_name
    }

    fn variant_name(&self) -> &str {
        &self.variant_name
    }

    fn product_sku(&self) -> &str {
        &self.product_sku
    }

    fn is_shipping_required(&self) -> bool {
        self.is_shipping_required
    }

    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn quantity_fulfilled(&self) -> i32 {
        self.quantity_fulfilled
    }

    fn unit_price(&self) -> TaxedMoney {
        TaxedMoney::new(self.unit_price, &self.currency)
    }

    fn total_price(&self) -> TaxedMoney {
        TaxedMoney::new(self.unit_price * Decimal::from(self.quantity), &self.currency)
    }

    /// The ordered variant, unless it was deleted in the meantime.
    async fn variant(&self, context: &Context) -> ApiResult<Option<ProductVariant>> {
        match self.variant {
            None => Ok(None),
            Some(key) => shared::load_by_key(context, "product_variants", key, None).await,
        }
    }

    /// Download link for digital products, issued when the line is fulfilled.
    async fn digital_content_url(&self, context: &Context) -> ApiResult<Option<DigitalContentUrl>> {
        DigitalContentUrl::of_line(context, self.key).await
    }
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct OrderLineCreateInput {
    quantity: i32,
    variant_id: Id,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct OrderLineInput {
    quantity: i32,
}

fn check_quantity(quantity: i32) -> ApiResult<()> {
    if quantity < 1 {
        return Err(invalid_input!(key = "invalid", "the quantity has to be at least 1")
            .on_field("quantity"));
    }
    Ok(())
}

/// Makes sure `quantity` items of `variant` are in stock, if the variant's
/// inventory is tracked at all.
fn check_stock(variant: &ProductVariant, quantity: i32) -> ApiResult<()> {
    match variant.available_quantity() {
        Some(available) if available < quantity => Err(invalid_input!(
            key = "insufficient-stock",
            "only {available} items of '{}' are in stock",
            variant.sku_str(),
        ).on_field("quantity")),
        _ => Ok(()),
    }
}


impl OrderLine {
    pub(crate) async fn of_order(context: &Context, order: Key) -> ApiResult<Vec<Self>> {
        let query = format!(
            "select {} from order_lines where order_id = $1 order by id",
            Self::SELECT,
        );
        context.db.query(&query, &[&order]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    pub(super) fn unfulfilled(&self) -> i32 {
        self.quantity - self.quantity_fulfilled
    }

    #[cfg(test)]
    pub(super) fn for_tests(key: Key, quantity: i32, quantity_fulfilled: i32, unit_price: Decimal) -> Self {
        Self {
            key,
            order: Key(1),
            variant: None,
            product_name: "Shirt".into(),
            variant_name: "M".into(),
            product_sku: "shirt-m".into(),
            is_shipping_required: true,
            quantity,
            quantity_fulfilled,
            unit_price,
            currency: "EUR".into(),
        }
    }

    /// Loads a line and its order, which has to be a draft.
    async fn require_on_draft(id: &Id, context: &Context) -> ApiResult<(Self, Order)> {
        let key = id.require_key(Id::ORDER_LINE_KIND, "id")?;
        let line = shared::require_by_key::<Self>(context, "order_lines", key, "id").await?;
        let order = Order::require(line.order, "id", context).await?;
        order.check_draft("id")?;
        Ok((line, order))
    }

    /// Adds `quantity` of `variant` to the draft, merging with an existing
    /// line of the same variant.
    async fn add(
        context: &Context,
        order: Key,
        variant: &ProductVariant,
        quantity: i32,
    ) -> ApiResult<Self> {
        let existing = context.db.query_opt(
            "select quantity from order_lines where order_id = $1 and variant = $2",
            &[&order, &variant.key],
        ).await?.map(|row| row.get::<_, i32>(0)).unwrap_or(0);
        check_stock(variant, existing + quantity)?;

        if existing > 0 {
            let query = format!(
                "update order_lines set quantity = quantity + $3 \
                    where order_id = $1 and variant = $2 \
                    returning {}",
                Self::SELECT,
            );
            let row = context.db.query_one(&query, &[&order, &variant.key, &quantity]).await?;
            return Ok(Self::from_row_start(&row));
        }

        let query = format!(
            "insert into order_lines (order_id, variant, product_name, variant_name, \
                    product_sku, is_shipping_required, quantity, unit_price) \
                select $1, v.id, p.name, v.name, v.sku, pt.is_shipping_required, $3, \
                    coalesce(v.price_override, p.price) \
                from product_variants v \
                join products p on p.id = v.product \
                join product_types pt on pt.id = p.product_type \
                where v.id = $2 \
                returning {}",
            Self::SELECT,
        );
        let row = context.db.query_one(&query, &[&order, &variant.key, &quantity]).await?;
        Ok(Self::from_row_start(&row))
    }

    /// Adds lines to a draft order.
    pub(crate) async fn create(
        order_id: Id,
        input: Vec<OrderLineCreateInput>,
        context: &Context,
    ) -> ApiResult<Order> {
        let key = order_id.require_key(Id::ORDER_KIND, "id")?;
        let order = Order::require(key, "id", context).await?;
        order.check_draft("id")?;
        add_lines(context, key, input).await?;
        recalculate_total(context, key).await?;
        order.reload(context).await
    }

    /// Removes a line from a draft order and returns the order.
    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Order> {
        let (line, order) = Self::require_on_draft(&id, context).await?;
        shared::delete_returning::<Self>(context, "order_lines", line.key).await?;
        recalculate_total(context, order.key).await?;
        OrderEvent::record(
            context,
            order.key,
            OrderEventType::DraftRemovedProducts,
            json!({ "lines": [{ "quantity": line.quantity, "line": line.product_name }] }),
        ).await?;
        order.reload(context).await
    }

    pub(crate) async fn update(id: Id, input: OrderLineInput, context: &Context) -> ApiResult<Self> {
        let (line, order) = Self::require_on_draft(&id, context).await?;
        check_quantity(input.quantity)?;
        if let Some(variant) = line.variant {
            let variant = ProductVariant::require(variant, "id", context).await?;
            check_stock(&variant, input.quantity)?;
        }

        let query = format!(
            "update order_lines set quantity = $2 where id = $1 returning {}",
            Self::SELECT,
        );
        let row = context.db.query_one(&query, &[&line.key, &input.quantity]).await?;
        recalculate_total(context, order.key).await?;
        Ok(Self::from_row_start(&row))
    }

    /// Deletes lines of draft orders. Lines of placed orders are left alone
    /// and not counted.
    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::ORDER_LINE_KIND, "ids")?;
        let rows = context.db.query(
            "delete from order_lines \
                where id = any($1) \
                    and order_id in (select id from orders where status = 'draft') \
                returning order_id",
            &[&keys],
        ).await?;

        let mut orders = rows.iter().map(|row| row.get::<_, Key>(0)).collect::<Vec<_>>();
        orders.sort();
        orders.dedup();
        for order in orders {
            recalculate_total(context, order).await?;
        }
        Ok(BulkResult::new(rows.len() as u64))
    }
}

/// Adds all given lines to the draft `order` and records one event for them.
pub(super) async fn add_lines(
    context: &Context,
    order: Key,
    input: Vec<OrderLineCreateInput>,
) -> ApiResult<()> {
    if input.is_empty() {
        return Ok(());
    }

    let mut added = vec![];
    for line in input {
        check_quantity(line.quantity)?;
        let variant = line.variant_id.require_key(Id::PRODUCT_VARIANT_KIND, "variantId")?;
        let variant = ProductVariant::require(variant, "variantId", context).await?;
        let line_row = OrderLine::add(context, order, &variant, line.quantity).await?;
        added.push(json!({ "quantity": line.quantity, "line": line_row.product_name }));
    }
    OrderEvent::record(
        context,
        order,
        OrderEventType::DraftAddedProducts,
        json!({ "lines": added }),
    ).await?;
    Ok(())
}


// ===== Stock =================================================================================
//
// `quantity` of a variant is what is physically in stock. `quantity_allocated`
// is the part of it that is promised to placed, but not yet shipped orders.

/// Allocates stock for everything not yet fulfilled in the order.
pub(super) async fn allocate_stock(context: &Context, order: Key) -> ApiResult<()> {
    adjust_order_stock(context, order, "quantity_allocated = v.quantity_allocated + l.amount").await
}

/// Releases the stock allocated for the order.
pub(super) async fn deallocate_stock(context: &Context, order: Key) -> ApiResult<()> {
    adjust_order_stock(
        context,
        order,
        "quantity_allocated = greatest(0, v.quantity_allocated - l.amount)",
    ).await
}

/// Removes allocated stock of the order from the inventory altogether.
pub(super) async fn consume_allocated_stock(context: &Context, order: Key) -> ApiResult<()> {
    adjust_order_stock(
        context,
        order,
        "quantity = greatest(0, v.quantity - l.amount), \
            quantity_allocated = greatest(0, v.quantity_allocated - l.amount)",
    ).await
}

async fn adjust_order_stock(context: &Context, order: Key, assignments: &str) -> ApiResult<()> {
    let query = format!(
        "update product_variants v set {assignments} \
            from ( \
                select variant, sum(quantity - quantity_fulfilled) as amount \
                from order_lines \
                where order_id = $1 and variant is not null \
                group by variant \
            ) l \
            where v.id = l.variant and v.track_inventory"
    );
    let count = context.db.execute(&query, &[&order]).await?;
    debug!("Adjusted stock of {count} variants for order {order:?}");
    Ok(())
}

/// Changes the stock of a single variant by the given deltas, never going
/// below 0.
pub(super) async fn change_variant_stock(
    context: &Context,
    variant: Key,
    quantity: i32,
    allocated: i32,
) -> ApiResult<()> {
    context.db.execute(
        "update product_variants \
            set quantity = greatest(0, quantity + $2), \
                quantity_allocated = greatest(0, quantity_allocated + $3) \
            where id = $1 and track_inventory",
        &[&variant, &quantity, &allocated],
    ).await?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::check_quantity;

    #[test]
    fn quantities() {
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(250).is_ok());
        assert_eq!(check_quantity(0).unwrap_err().field, Some("quantity"));
        assert_eq!(check_quantity(-3).unwrap_err().key, Some("invalid"));
    }
}
