use chrono::{DateTime, Utc};
use juniper::{graphql_object, GraphQLInputObject};
use serde_json::{json, Value};
use tokio_postgres::Row;

use crate::{
    api::{
        Context, Id,
        err::ApiResult,
        model::shared::{
            self, check_required, define_connection, load_connection, PaginationArgs,
            SortDirection, SortOrder,
        },
    },
    auth::User,
    db::{types::OrderEventType, util::{FromDb, SqlFilter}},
    model::Key,
    prelude::*,
};
use super::{actor, Order};


/// An entry in the history of an order.
pub(crate) struct OrderEvent {
    key: Key,
    order: Key,
    date: DateTime<Utc>,
    typ: OrderEventType,
    actor: Option<Key>,
    parameters: Value,
}

impl FromDb for OrderEvent {
    const SELECT: &'static str = "order_events.id, order_events.order_id, order_events.date, \
        order_events.type, order_events.actor, order_events.parameters";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            order: row.get(1),
            date: row.get(2),
            typ: row.get(3),
            actor: row.get(4),
            parameters: row.get(5),
        }
    }
}

#[graphql_object(Context = Context)]
impl OrderEvent {
    fn id(&self) -> Id {
        Id::order_event(self.key)
    }

    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    #[graphql(name = "type")]
    fn typ(&self) -> OrderEventType {
        self.typ
    }

    /// The staff member who caused the event, if any.
    async fn user(&self, context: &Context) -> ApiResult<Option<User>> {
        match self.actor {
            None => Ok(None),
            Some(key) => shared::load_by_key(context, "users", key, None).await,
        }
    }

    async fn order(&self, context: &Context) -> ApiResult<Order> {
        Order::require(self.order, "order", context).await
    }

    /// Content of a note.
    fn message(&self) -> Option<&str> {
        self.parameters.get("message").and_then(Value::as_str)
    }

    /// Amount of a payment event.
    fn amount(&self) -> Option<f64> {
        self.parameters.get("amount").and_then(Value::as_f64)
    }

    /// Number of items fulfilled or canceled.
    fn quantity(&self) -> Option<i32> {
        self.parameters.get("quantity")
            .and_then(Value::as_i64)
            .and_then(|q| i32::try_from(q).ok())
    }

    /// Number of the fulfillment this event is about.
    fn fulfillment_number(&self) -> Option<i32> {
        self.parameters.get("fulfillment")
            .and_then(Value::as_i64)
            .and_then(|q| i32::try_from(q).ok())
    }

    fn tracking_number(&self) -> Option<&str> {
        self.parameters.get("trackingNumber").and_then(Value::as_str)
    }

    /// Lines added to or removed from a draft.
    fn lines(&self) -> Vec<OrderEventLine> {
        self.parameters.get("lines")
            .and_then(Value::as_array)
            .map(|lines| lines.iter().map(OrderEventLine::from_value).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, juniper::GraphQLObject)]
pub(crate) struct OrderEventLine {
    quantity: Option<i32>,
    item_name: Option<String>,
}

impl OrderEventLine {
    fn from_value(v: &Value) -> Self {
        Self {
            quantity: v.get("quantity").and_then(Value::as_i64).and_then(|q| i32::try_from(q).ok()),
            item_name: v.get("line").and_then(Value::as_str).map(Into::into),
        }
    }
}

define_connection!(OrderEventConnection, OrderEventEdge, OrderEvent);

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct OrderNoteInput {
    message: String,
}

/// Events shown on the dashboard's home page.
const HOMEPAGE_TYPES: &str = "('placed', 'placed_from_draft', 'order_fully_paid')";


impl OrderEvent {
    /// Appends an event to the history of `order`, attributed to the
    /// current user.
    pub(crate) async fn record(
        context: &Context,
        order: Key,
        typ: OrderEventType,
        parameters: Value,
    ) -> ApiResult<Self> {
        let parameters = match parameters {
            Value::Null => json!({}),
            other => other,
        };
        let query = format!(
            "insert into order_events (order_id, type, actor, parameters) \
                values ($1, $2, $3, $4) \
                returning {}",
            Self::SELECT,
        );
        let row = context.db
            .query_one(&query, &[&order, &typ, &actor(context), &parameters])
            .await?;
        trace!("Recorded {typ:?} event for order {order:?}");
        Ok(Self::from_row_start(&row))
    }

    pub(crate) async fn of_order(context: &Context, order: Key) -> ApiResult<Vec<Self>> {
        let query = format!(
            "select {} from order_events where order_id = $1 order by date, id",
            Self::SELECT,
        );
        context.db.query(&query, &[&order]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    /// Placed and fully paid orders, newest first.
    pub(crate) async fn homepage(
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<OrderEventConnection> {
        let mut sql = SqlFilter::new();
        sql.and(format!("order_events.type in {HOMEPAGE_TYPES}"));
        let order = SortOrder { column: "order_events.date", direction: SortDirection::Descending };
        load_connection(context, "order_events", &sql, order, &pagination)
            .await
            .map(Into::into)
    }

    /// Adds a staff note to the history of an order.
    pub(crate) async fn add_note(
        order_id: Id,
        input: OrderNoteInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = order_id.require_key(Id::ORDER_KIND, "order")?;
        Order::require(key, "order", context).await?;
        check_required(&input.message, usize::MAX, "message")?;

        let message = input.message.trim();
        Self::record(context, key, OrderEventType::NoteAdded, json!({ "message": message })).await
    }
}


#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use crate::{db::types::OrderEventType, model::Key};
    use super::OrderEvent;

    fn event(parameters: serde_json::Value) -> OrderEvent {
        OrderEvent {
            key: Key(1),
            order: Key(7),
            date: Utc::now(),
            typ: OrderEventType::NoteAdded,
            actor: None,
            parameters,
        }
    }

    #[test]
    fn parameters() {
        let e = event(json!({ "message": "call back", "amount": 12.5, "quantity": 3 }));
        assert_eq!(e.message(), Some("call back"));
        assert_eq!(e.amount(), Some(12.5));
        assert_eq!(e.quantity(), Some(3));
        assert_eq!(e.fulfillment_number(), None);
        assert!(e.lines().is_empty());
    }

    #[test]
    fn lines() {
        let e = event(json!({ "lines": [{ "quantity": 2, "line": "Shirt" }, {}] }));
        let lines = e.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].quantity, Some(2));
        assert_eq!(lines[0].item_name.as_deref(), Some("Shirt"));
        assert_eq!(lines[1].item_name, None);
    }
}
