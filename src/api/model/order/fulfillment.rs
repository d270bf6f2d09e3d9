use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use juniper::{graphql_object, GraphQLInputObject};
use serde_json::{json, Value};
use tokio_postgres::Row;

use crate::{
    api::{
        Context, Id,
        err::{invalid_input, map_db_err, ApiResult},
        model::{
            meta::{self, HasMetadata, MetaStore},
            product::DigitalContentUrl,
            shared::{self, check_length},
        },
    },
    auth::Permission,
    db::{types::{FulfillmentStatus, OrderEventType, OrderStatus}, util::FromDb},
    model::Key,
    prelude::*,
};
use super::{line::change_variant_stock, refresh_status, Order, OrderEvent, OrderLine};


/// A shipment of some of the ordered items. Numbered per order, starting
/// at 1.
pub(crate) struct Fulfillment {
    pub(crate) key: Key,
    order: Key,
    fulfillment_order: i32,
    status: FulfillmentStatus,
    tracking_number: String,
    created: DateTime<Utc>,
    metadata: Value,
    private_metadata: Value,
}

impl FromDb for Fulfillment {
    const SELECT: &'static str = "fulfillments.id, fulfillments.order_id, \
        fulfillments.fulfillment_order, fulfillments.status, fulfillments.tracking_number, \
        fulfillments.created, fulfillments.metadata, fulfillments.private_metadata";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            order: row.get(1),
            fulfillment_order: row.get(2),
            status: row.get(3),
            tracking_number: row.get(4),
            created: row.get(5),
            metadata: row.get(6),
            private_metadata: row.get(7),
        }
    }
}

impl HasMetadata for Fulfillment {
    const TABLE: &'static str = "fulfillments";
    const ID_KIND: [u8; 2] = Id::FULFILLMENT_KIND;
}

#[graphql_object(Context = Context)]
impl Fulfillment {
    fn id(&self) -> Id {
        Id::fulfillment(self.key)
    }

    fn fulfillment_order(&self) -> i32 {
        self.fulfillment_order
    }

    fn status(&self) -> FulfillmentStatus {
        self.status
    }

    fn tracking_number(&self) -> &str {
        &self.tracking_number
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    async fn order(&self, context: &Context) -> ApiResult<Order> {
        Order::require(self.order, "order", context).await
    }

    async fn lines(&self, context: &Context) -> ApiResult<Vec<FulfillmentLine>> {
        FulfillmentLine::of_fulfillment(context, self.key).await
    }

    fn meta(&self) -> Vec<MetaStore> {
        meta::stores(&self.metadata)
    }

    fn private_meta(&self, context: &Context) -> ApiResult<Vec<MetaStore>> {
        meta::private_stores(context, &self.private_metadata, Permission::ManageOrders)
    }
}

pub(crate) struct FulfillmentLine {
    key: Key,
    order_line: Key,
    quantity: i32,
}

impl FromDb for FulfillmentLine {
    const SELECT: &'static str = "fulfillment_lines.id, fulfillment_lines.order_line, \
        fulfillment_lines.quantity";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            order_line: row.get(1),
            quantity: row.get(2),
        }
    }
}

#[graphql_object(Context = Context)]
impl FulfillmentLine {
    fn id(&self) -> Id {
        Id::fulfillment_line(self.key)
    }

    fn quantity(&self) -> i32 {
        self.quantity
    }

    async fn order_line(&self, context: &Context) -> ApiResult<OrderLine> {
        shared::require_by_key(context, "order_lines", self.order_line, "orderLine").await
    }
}

impl FulfillmentLine {
    async fn of_fulfillment(context: &Context, fulfillment: Key) -> ApiResult<Vec<Self>> {
        let query = format!(
            "select {} from fulfillment_lines where fulfillment = $1 order by id",
            Self::SELECT,
        );
        context.db.query(&query, &[&fulfillment]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct FulfillmentCreateInput {
    tracking_number: Option<String>,
    lines: Vec<FulfillmentLineInput>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct FulfillmentLineInput {
    order_line_id: Id,
    quantity: i32,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct FulfillmentCancelInput {
    /// Whether the items go back into stock. Defaults to `true`.
    restock: Option<bool>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct FulfillmentUpdateTrackingInput {
    tracking_number: Option<String>,
}


/// Checks the requested quantities against the lines of the order and
/// returns the lines to fulfill with their quantities. Lines requested with
/// quantity 0 are skipped.
fn plan<'a>(
    lines: &'a [OrderLine],
    requested: &[(Key, i32)],
) -> ApiResult<Vec<(&'a OrderLine, i32)>> {
    let by_key = lines.iter().map(|l| (l.key, l)).collect::<HashMap<_, _>>();
    let mut seen = HashSet::new();
    let mut out = vec![];
    for &(key, quantity) in requested {
        let Some(line) = by_key.get(&key) else {
            return Err(invalid_input!(key = "not-found", "line is not part of the order")
                .on_field("orderLineId"));
        };
        if !seen.insert(key) {
            return Err(invalid_input!(key = "duplicated", "line is given more than once")
                .on_field("orderLineId"));
        }
        if quantity < 0 {
            return Err(invalid_input!(key = "invalid", "quantity must not be negative")
                .on_field("quantity"));
        }
        if quantity > line.unfulfilled() {
            return Err(invalid_input!(
                key = "quantity-too-large",
                "only {} items of '{}' are left to fulfill",
                line.unfulfilled(),
                line.product_name,
            ).on_field("quantity"));
        }
        if quantity > 0 {
            out.push((*line, quantity));
        }
    }

    if out.is_empty() {
        return Err(invalid_input!(key = "required", "at least one item has to be fulfilled")
            .on_field("lines"));
    }
    Ok(out)
}


impl Fulfillment {
    pub(crate) async fn of_order(context: &Context, order: Key) -> ApiResult<Vec<Self>> {
        let query = format!(
            "select {} from fulfillments where order_id = $1 order by fulfillment_order",
            Self::SELECT,
        );
        context.db.query(&query, &[&order]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    async fn require(id: &Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::FULFILLMENT_KIND, "id")?;
        shared::require_by_key(context, "fulfillments", key, "id").await
    }

    /// Ships items of an order. Takes them out of the stock and issues
    /// download links for digital products.
    pub(crate) async fn create(
        order_id: Id,
        input: FulfillmentCreateInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let order = Order::require_placed(&order_id, "order", context).await?;
        if !matches!(order.status, OrderStatus::Unfulfilled | OrderStatus::PartiallyFulfilled) {
            return Err(invalid_input!(
                key = "cannot-fulfill",
                "only unfulfilled or partially fulfilled orders can be fulfilled",
            ).on_field("order"));
        }
        let tracking_number = input.tracking_number.unwrap_or_default();
        check_length(&tracking_number, 255, "trackingNumber")?;

        let requested = input.lines.iter()
            .map(|l| Ok((l.order_line_id.require_key(Id::ORDER_LINE_KIND, "orderLineId")?, l.quantity)))
            .collect::<ApiResult<Vec<_>>>()?;
        let lines = OrderLine::of_order(context, order.key).await?;
        let plan = plan(&lines, &requested)?;

        let query = format!(
            "insert into fulfillments (order_id, fulfillment_order, tracking_number) \
                values ($1, \
                    (select coalesce(max(fulfillment_order), 0) + 1 \
                        from fulfillments where order_id = $1), \
                    $2) \
                returning {}",
            Self::SELECT,
        );
        let result = context.db.query_one(&query, &[&order.key, &tracking_number]).await;
        let row = map_db_err!(result, {
            if constraint == "unique_fulfillment_number" => invalid_input!(
                key = "concurrent-fulfillment",
                field = "order",
                "another fulfillment of this order was created at the same time",
            ),
        })?;
        let fulfillment = Self::from_row_start(&row);

        let mut total = 0;
        for (line, quantity) in plan {
            context.db.execute(
                "insert into fulfillment_lines (fulfillment, order_line, quantity) \
                    values ($1, $2, $3)",
                &[&fulfillment.key, &line.key, &quantity],
            ).await?;
            context.db.execute(
                "update order_lines set quantity_fulfilled = quantity_fulfilled + $2 where id = $1",
                &[&line.key, &quantity],
            ).await?;
            if let Some(variant) = line.variant {
                change_variant_stock(context, variant, -quantity, -quantity).await?;
                DigitalContentUrl::issue_for_line(context, variant, line.key).await?;
            }
            total += quantity;
        }

        let status = refresh_status(context, order.key).await?;
        OrderEvent::record(
            context,
            order.key,
            OrderEventType::FulfillmentFulfilledItems,
            json!({ "quantity": total, "fulfillment": fulfillment.fulfillment_order }),
        ).await?;
        info!(
            "Created fulfillment #{} of order {:?} with {total} items (order is now {status:?})",
            fulfillment.fulfillment_order,
            order.key,
        );
        Ok(fulfillment)
    }

    /// Cancels a fulfillment: its items count as unfulfilled again. With
    /// `restock`, they are put back into stock and allocated for the order.
    pub(crate) async fn cancel(
        id: Id,
        input: FulfillmentCancelInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let fulfillment = Self::require(&id, context).await?;
        if fulfillment.status == FulfillmentStatus::Canceled {
            return Err(invalid_input!(key = "already-canceled", "fulfillment is already canceled")
                .on_field("id"));
        }
        let restock = input.restock.unwrap_or(true);

        let rows = context.db.query(
            "update order_lines ol set quantity_fulfilled = ol.quantity_fulfilled - fl.quantity \
                from fulfillment_lines fl \
                where fl.fulfillment = $1 and fl.order_line = ol.id \
                returning ol.variant, fl.quantity",
            &[&fulfillment.key],
        ).await?;
        let mut total = 0;
        for row in &rows {
            let quantity = row.get::<_, i32>(1);
            total += quantity;
            if let (true, Some(variant)) = (restock, row.get::<_, Option<Key>>(0)) {
                change_variant_stock(context, variant, quantity, quantity).await?;
            }
        }

        let query = format!(
            "update fulfillments set status = 'canceled' where id = $1 returning {}",
            Self::SELECT,
        );
        let row = context.db.query_one(&query, &[&fulfillment.key]).await?;
        refresh_status(context, fulfillment.order).await?;
        OrderEvent::record(
            context,
            fulfillment.order,
            OrderEventType::FulfillmentCanceled,
            json!({
                "fulfillment": fulfillment.fulfillment_order,
                "quantity": total,
                "restock": restock,
            }),
        ).await?;
        Ok(Self::from_row_start(&row))
    }

    pub(crate) async fn update_tracking(
        id: Id,
        input: FulfillmentUpdateTrackingInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let fulfillment = Self::require(&id, context).await?;
        let tracking_number = input.tracking_number.unwrap_or_default();
        check_length(&tracking_number, 255, "trackingNumber")?;

        let query = format!(
            "update fulfillments set tracking_number = $2 where id = $1 returning {}",
            Self::SELECT,
        );
        let row = context.db.query_one(&query, &[&fulfillment.key, &tracking_number]).await?;
        OrderEvent::record(
            context,
            fulfillment.order,
            OrderEventType::TrackingUpdated,
            json!({
                "fulfillment": fulfillment.fulfillment_order,
                "trackingNumber": tracking_number,
            }),
        ).await?;
        Ok(Self::from_row_start(&row))
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use crate::model::Key;
    use super::{plan, OrderLine};

    fn line(key: u64, quantity: i32, fulfilled: i32) -> OrderLine {
        OrderLine::for_tests(Key(key), quantity, fulfilled, Decimal::ONE)
    }

    #[test]
    fn fulfill_within_quantity() {
        let lines = [line(1, 5, 2), line(2, 1, 0)];
        let p = plan(&lines, &[(Key(1), 3), (Key(2), 0)]).unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].0.key, Key(1));
        assert_eq!(p[0].1, 3);
    }

    #[test]
    fn rejects_too_much() {
        let lines = [line(1, 5, 2)];
        let err = plan(&lines, &[(Key(1), 4)]).unwrap_err();
        assert_eq!(err.key, Some("quantity-too-large"));
        assert_eq!(err.field, Some("quantity"));
    }

    #[test]
    fn rejects_bad_lines() {
        let lines = [line(1, 5, 0)];
        assert_eq!(plan(&lines, &[(Key(9), 1)]).unwrap_err().key, Some("not-found"));
        assert_eq!(
            plan(&lines, &[(Key(1), 1), (Key(1), 1)]).unwrap_err().key,
            Some("duplicated"),
        );
        assert_eq!(plan(&lines, &[(Key(1), -1)]).unwrap_err().key, Some("invalid"));
        assert_eq!(plan(&lines, &[(Key(1), 0)]).unwrap_err().field, Some("lines"));
        assert_eq!(plan(&lines, &[]).unwrap_err().field, Some("lines"));
    }
}
