//! Orders: drafts edited in the dashboard, placed orders with their lines,
//! fulfillments, payments and the event log.

use chrono::{DateTime, Utc};
use juniper::{graphql_object, GraphQLEnum, GraphQLInputObject};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::{
    api::{
        BulkResult, Context, Id, Money, ReportingPeriod, TaxedMoney,
        common::{to_positive_decimal, DateRangeInput},
        err::{invalid_input, not_authorized, ApiResult},
        model::{
            discount::Voucher,
            meta::{self, HasMetadata, MetaStore},
            shared::{
                self, define_connection, define_sort_field_and_input, load_connection,
                check_required, PaginationArgs,
            },
        },
    },
    auth::{HasPermissions, Permission, User},
    db::{
        types::{ChargeStatus, OrderEventType, OrderStatus},
        util::{FromDb, SqlAssignments, SqlFilter},
    },
    model::Key,
    prelude::*,
};

mod address;
mod draft;
mod event;
mod fulfillment;
mod line;
mod payment;

pub(crate) use self::{
    address::{Address, AddressInput},
    draft::{DraftOrderCreateInput, DraftOrderInput},
    event::{OrderEvent, OrderEventConnection, OrderNoteInput},
    fulfillment::{
        Fulfillment, FulfillmentCancelInput, FulfillmentCreateInput,
        FulfillmentUpdateTrackingInput,
    },
    line::{OrderLine, OrderLineCreateInput, OrderLineInput},
    payment::Payment,
};


/// An order of a customer. While its status is `DRAFT`, it is edited by
/// staff and not visible to the customer.
pub(crate) struct Order {
    pub(crate) key: Key,
    token: Uuid,
    created: DateTime<Utc>,
    status: OrderStatus,
    customer: Option<Key>,
    user_email: String,
    customer_note: String,
    shipping_address: Option<Value>,
    billing_address: Option<Value>,
    shipping_method_name: Option<String>,
    shipping_price: Decimal,
    voucher: Option<Key>,
    discount_amount: Decimal,
    total: Decimal,
    currency: String,
    metadata: Value,
    private_metadata: Value,
}

impl FromDb for Order {
    const SELECT: &'static str = "orders.id, orders.token, orders.created, orders.status, \
        orders.customer, orders.user_email, orders.customer_note, orders.shipping_address, \
        orders.billing_address, orders.shipping_method_name, orders.shipping_price, \
        orders.voucher, orders.discount_amount, orders.total, orders.currency, \
        orders.metadata, orders.private_metadata";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            token: row.get(1),
            created: row.get(2),
            status: row.get(3),
            customer: row.get(4),
            user_email: row.get(5),
            customer_note: row.get(6),
            shipping_address: row.get(7),
            billing_address: row.get(8),
            shipping_method_name: row.get(9),
            shipping_price: row.get(10),
            voucher: row.get(11),
            discount_amount: row.get(12),
            total: row.get(13),
            currency: row.get(14),
            metadata: row.get(15),
            private_metadata: row.get(16),
        }
    }
}

impl HasMetadata for Order {
    const TABLE: &'static str = "orders";
    const ID_KIND: [u8; 2] = Id::ORDER_KIND;
}

#[graphql_object(Context = Context)]
impl Order {
    fn id(&self) -> Id {
        Id::order(self.key)
    }

    /// Human readable order number.
    fn number(&self) -> String {
        self.key.0.to_string()
    }

    /// Secret token with which customers can look up their order without
    /// logging in.
    fn token(&self) -> Uuid {
        self.token
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn user_email(&self) -> &str {
        &self.user_email
    }

    fn customer_note(&self) -> &str {
        &self.customer_note
    }

    async fn user(&self, context: &Context) -> ApiResult<Option<User>> {
        match self.customer {
            None => Ok(None),
            Some(key) => shared::load_by_key(context, "users", key, None).await,
        }
    }

    fn shipping_address(&self) -> Option<Address> {
        Address::from_stored(self.shipping_address.as_ref())
    }

    fn billing_address(&self) -> Option<Address> {
        Address::from_stored(self.billing_address.as_ref())
    }

    fn shipping_method_name(&self) -> Option<&str> {
        self.shipping_method_name.as_deref()
    }

    fn shipping_price(&self) -> Money {
        Money::new(self.shipping_price, &self.currency)
    }

    async fn voucher(&self, context: &Context) -> ApiResult<Option<Voucher>> {
        match self.voucher {
            None => Ok(None),
            Some(key) => shared::load_by_key(context, "vouchers", key, None).await,
        }
    }

    fn discount_amount(&self) -> Money {
        Money::new(self.discount_amount, &self.currency)
    }

    /// Sum of all lines, without shipping and discount.
    async fn subtotal(&self, context: &Context) -> ApiResult<TaxedMoney> {
        let query = "select coalesce(sum(quantity * unit_price), 0) \
            from order_lines where order_id = $1";
        let sum = context.db.query_one(query, &[&self.key]).await?.get::<_, Decimal>(0);
        Ok(TaxedMoney::new(sum, &self.currency))
    }

    fn total(&self) -> TaxedMoney {
        TaxedMoney::new(self.total, &self.currency)
    }

    async fn lines(&self, context: &Context) -> ApiResult<Vec<OrderLine>> {
        OrderLine::of_order(context, self.key).await
    }

    async fn fulfillments(&self, context: &Context) -> ApiResult<Vec<Fulfillment>> {
        Fulfillment::of_order(context, self.key).await
    }

    async fn payments(&self, context: &Context) -> ApiResult<Vec<Payment>> {
        Payment::of_order(context, self.key).await
    }

    /// Charge status of the active payment. `NOT_CHARGED` if there is none.
    async fn payment_status(&self, context: &Context) -> ApiResult<ChargeStatus> {
        Payment::active_of(context, self.key).await?
            .map_or(ChargeStatus::NotCharged, |p| p.charge_status)
            .pipe(Ok)
    }

    async fn total_captured(&self, context: &Context) -> ApiResult<Money> {
        let captured = self.captured(context).await?;
        Ok(Money::new(captured, &self.currency))
    }

    /// Captured amount minus the order total. Negative while the customer
    /// still owes money.
    async fn total_balance(&self, context: &Context) -> ApiResult<Money> {
        let captured = self.captured(context).await?;
        Ok(Money::new(captured - self.total, &self.currency))
    }

    async fn is_paid(&self, context: &Context) -> ApiResult<bool> {
        Ok(self.captured(context).await? >= self.total)
    }

    async fn is_shipping_required(&self, context: &Context) -> ApiResult<bool> {
        self.requires_shipping(context).await
    }

    /// Whether `draftOrderComplete` would currently succeed.
    async fn can_finalize(&self, context: &Context) -> ApiResult<bool> {
        if self.status != OrderStatus::Draft {
            return Ok(false);
        }
        Ok(draft::completion_problem(self, context).await?.is_none())
    }

    /// Event log of the order, newest last. Only visible to staff.
    async fn events(&self, context: &Context) -> ApiResult<Vec<OrderEvent>> {
        require_manage_orders(context, "events")?;
        OrderEvent::of_order(context, self.key).await
    }

    fn meta(&self) -> Vec<MetaStore> {
        meta::stores(&self.metadata)
    }

    fn private_meta(&self, context: &Context) -> ApiResult<Vec<MetaStore>> {
        meta::private_stores(context, &self.private_metadata, Permission::ManageOrders)
    }
}

define_connection!(OrderConnection, OrderEdge, Order);

define_sort_field_and_input!(
    pub(crate) enum OrderSortField {
        #[default]
        Number => "orders.id",
        CreationDate => "orders.created",
        Customer => "orders.user_email",
        Payment => "(select p.charge_status from payments p \
            where p.order_id = orders.id and p.is_active order by p.id desc limit 1)",
        FulfillmentStatus => "orders.status",
        Total => "orders.total",
    };
    pub(crate) struct OrderSortingInput, default direction Descending;
);

/// Coarse order states used by the `orders` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum OrderStatusFilter {
    /// Not completely fulfilled yet, but fully paid.
    ReadyToFulfill,
    /// Has an active payment of which nothing is captured yet.
    ReadyToCapture,
    Unfulfilled,
    PartiallyFulfilled,
    Fulfilled,
    Canceled,
}

impl OrderStatusFilter {
    fn condition(self) -> &'static str {
        match self {
            Self::ReadyToFulfill => "(orders.status in ('unfulfilled', 'partially_fulfilled') \
                and orders.total <= (select coalesce(sum(p.captured_amount), 0) \
                    from payments p where p.order_id = orders.id and p.is_active))",
            Self::ReadyToCapture => "(orders.status not in ('draft', 'canceled') \
                and exists (select 1 from payments p where p.order_id = orders.id \
                    and p.is_active and p.charge_status = 'not_charged'))",
            Self::Unfulfilled => "orders.status = 'unfulfilled'",
            Self::PartiallyFulfilled => "orders.status = 'partially_fulfilled'",
            Self::Fulfilled => "orders.status = 'fulfilled'",
            Self::Canceled => "orders.status = 'canceled'",
        }
    }
}

/// Adds a condition matching any of `statuses`.
fn filter_status(sql: &mut SqlFilter, statuses: &[OrderStatusFilter]) {
    if statuses.is_empty() {
        return;
    }
    let ors = statuses.iter()
        .map(|s| s.condition())
        .collect::<Vec<_>>()
        .join(" or ");
    sql.and(format!("({ors})"));
}

#[derive(Debug, Clone, Default, GraphQLInputObject)]
pub(crate) struct OrderFilterInput {
    payment_status: Option<Vec<ChargeStatus>>,
    status: Option<Vec<OrderStatusFilter>>,
    /// Matches the e-mail address or name of the customer.
    customer: Option<String>,
    created: Option<DateRangeInput>,
    search: Option<String>,
}

#[derive(Debug, Clone, Default, GraphQLInputObject)]
pub(crate) struct OrderDraftFilterInput {
    customer: Option<String>,
    created: Option<DateRangeInput>,
    search: Option<String>,
}

const CUSTOMER_NAME: &str = "(select concat_ws(' ', u.email, u.first_name, u.last_name) \
    from users u where u.id = orders.customer)";

const SEARCH: [&str; 4] = ["orders.id", "orders.user_email", "orders.customer_note", CUSTOMER_NAME];

fn filter_customer(sql: &mut SqlFilter, customer: &str) {
    sql.search(&["orders.user_email", CUSTOMER_NAME], customer);
}

fn require_manage_orders(context: &Context, what: &str) -> ApiResult<()> {
    if !context.auth.has_perm(Permission::ManageOrders) {
        return Err(not_authorized!(
            key = "missing-permission",
            "'{what}' requires '{}'",
            Permission::ManageOrders,
        ));
    }
    Ok(())
}


impl Order {
    /// Staff managing orders see all orders. Everyone else only sees their
    /// own placed orders.
    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::ORDER_KIND) else {
            return Ok(None);
        };
        if context.auth.has_perm(Permission::ManageOrders) {
            return shared::load_by_key(context, "orders", key, None).await;
        }

        let Some(user) = context.auth.user() else {
            return Ok(None);
        };
        let query = format!(
            "select {} from orders \
                where orders.id = $1 and orders.customer = $2 and orders.status <> 'draft'",
            Self::SELECT,
        );
        context.db.query_opt(&query, &[&key, &user.key]).await?
            .map(|row| Self::from_row_start(&row))
            .pipe(Ok)
    }

    pub(crate) async fn load_by_token(token: Uuid, context: &Context) -> ApiResult<Option<Self>> {
        let query = format!("select {} from orders where orders.token = $1", Self::SELECT);
        context.db.query_opt(&query, &[&token]).await?
            .map(|row| Self::from_row_start(&row))
            .pipe(Ok)
    }

    pub(crate) async fn require(key: Key, field: &'static str, context: &Context) -> ApiResult<Self> {
        shared::require_by_key(context, "orders", key, field).await
    }

    pub(crate) async fn of_customer(context: &Context, customer: Key) -> ApiResult<Vec<Self>> {
        let query = format!(
            "select {} from orders \
                where orders.customer = $1 and orders.status <> 'draft' \
                order by orders.created desc, orders.id desc",
            Self::SELECT,
        );
        context.db.query(&query, &[&customer]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    /// Loads an order for a mutation that is only allowed on placed orders.
    async fn require_placed(id: &Id, field: &'static str, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::ORDER_KIND, field)?;
        let order = Self::require(key, field, context).await?;
        if order.status == OrderStatus::Draft {
            return Err(invalid_input!(
                key = "draft",
                "this operation is not possible on draft orders",
            ).on_field(field));
        }
        Ok(order)
    }

    pub(crate) async fn list(
        query: Option<String>,
        filter: Option<OrderFilterInput>,
        sort_by: Option<OrderSortingInput>,
        created: Option<ReportingPeriod>,
        status: Option<OrderStatusFilter>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<OrderConnection> {
        let mut sql = SqlFilter::new();
        sql.and("orders.status <> 'draft'");
        if let Some(query) = &query {
            sql.search(&SEARCH, query);
        }
        if let Some(period) = created {
            let start = sql.arg(period.start(Utc::now()));
            sql.and(format!("orders.created >= {start}"));
        }
        if let Some(status) = status {
            filter_status(&mut sql, &[status]);
        }
        if let Some(filter) = filter {
            if let Some(statuses) = filter.payment_status.filter(|s| !s.is_empty()) {
                let p = sql.arg(statuses);
                sql.and(format!(
                    "exists (select 1 from payments p where p.order_id = orders.id \
                        and p.is_active and p.charge_status = any({p}))"
                ));
            }
            filter_status(&mut sql, filter.status.as_deref().unwrap_or_default());
            if let Some(customer) = &filter.customer {
                filter_customer(&mut sql, customer);
            }
            if let Some(created) = &filter.created {
                created.apply(&mut sql, "orders.created");
            }
            if let Some(search) = &filter.search {
                sql.search(&SEARCH, search);
            }
        }

        load_connection(context, "orders", &sql, sort_by.unwrap_or_default(), &pagination)
            .await
            .map(Into::into)
    }

    pub(crate) async fn list_drafts(
        query: Option<String>,
        filter: Option<OrderDraftFilterInput>,
        sort_by: Option<OrderSortingInput>,
        created: Option<ReportingPeriod>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<OrderConnection> {
        let mut sql = SqlFilter::new();
        sql.and("orders.status = 'draft'");
        if let Some(query) = &query {
            sql.search(&SEARCH, query);
        }
        if let Some(period) = created {
            let start = sql.arg(period.start(Utc::now()));
            sql.and(format!("orders.created >= {start}"));
        }
        if let Some(filter) = filter {
            if let Some(customer) = &filter.customer {
                filter_customer(&mut sql, customer);
            }
            if let Some(created) = &filter.created {
                created.apply(&mut sql, "orders.created");
            }
            if let Some(search) = &filter.search {
                sql.search(&SEARCH, search);
            }
        }

        load_connection(context, "orders", &sql, sort_by.unwrap_or_default(), &pagination)
            .await
            .map(Into::into)
    }

    /// Sum of the totals of all placed, not canceled orders of the period.
    pub(crate) async fn total_of_period(
        period: ReportingPeriod,
        context: &Context,
    ) -> ApiResult<TaxedMoney> {
        let query = "select coalesce(sum(total), 0) from orders \
            where created >= $1 and status not in ('draft', 'canceled')";
        let start = period.start(Utc::now());
        let sum = context.db.query_one(query, &[&start]).await?.get::<_, Decimal>(0);
        Ok(TaxedMoney::new(sum, context.config.general.currency.as_str()))
    }

    async fn captured(&self, context: &Context) -> ApiResult<Decimal> {
        let query = "select coalesce(sum(captured_amount), 0) from payments \
            where order_id = $1 and is_active";
        Ok(context.db.query_one(query, &[&self.key]).await?.get(0))
    }

    async fn requires_shipping(&self, context: &Context) -> ApiResult<bool> {
        let query = "select exists (select 1 from order_lines \
            where order_id = $1 and is_shipping_required)";
        Ok(context.db.query_one(query, &[&self.key]).await?.get(0))
    }

    async fn reload(&self, context: &Context) -> ApiResult<Self> {
        Self::require(self.key, "id", context).await
    }


    // ===== Mutations on placed orders ========================================================

    pub(crate) async fn update(id: Id, input: OrderUpdateInput, context: &Context) -> ApiResult<Self> {
        let order = Self::require_placed(&id, "id", context).await?;

        let mut values = SqlAssignments::new();
        if let Some(email) = input.user_email {
            check_email(&email, "userEmail")?;
            values.set("user_email", email);
        }
        if let Some(address) = input.shipping_address {
            values.set("shipping_address", address.into_address("shippingAddress")?.to_stored());
        }
        if let Some(address) = input.billing_address {
            values.set("billing_address", address.into_address("billingAddress")?.to_stored());
        }
        if values.is_empty() {
            return Ok(order);
        }

        let order = shared::update_returning::<Self>(context, "orders", order.key, &values, &[])
            .await?;
        OrderEvent::record(context, order.key, OrderEventType::Updated, Value::Null).await?;
        Ok(order)
    }

    /// Sets or removes the shipping method. Possible for drafts and for
    /// orders that were not shipped yet.
    pub(crate) async fn update_shipping(
        order_id: Id,
        input: OrderUpdateShippingInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = order_id.require_key(Id::ORDER_KIND, "order")?;
        let order = Self::require(key, "order", context).await?;
        if !matches!(order.status, OrderStatus::Draft | OrderStatus::Unfulfilled) {
            return Err(invalid_input!(
                key = "not-editable",
                "shipping can only be changed for unfulfilled orders",
            ).on_field("order"));
        }

        let mut values = SqlAssignments::new();
        match input.shipping_method_name {
            Some(name) => {
                check_required(&name, 255, "shippingMethodName")?;
                let price = to_positive_decimal(
                    input.shipping_price.unwrap_or(0.0),
                    "shippingPrice",
                )?;
                values.set("shipping_method_name", Some(name)).set("shipping_price", price);
            }
            None => {
                if order.requires_shipping(context).await? {
                    return Err(invalid_input!(
                        key = "shipping-required",
                        "the order contains products that need shipping",
                    ).on_field("shippingMethodName"));
                }
                values
                    .set("shipping_method_name", None::<String>)
                    .set("shipping_price", Decimal::ZERO);
            }
        }
        shared::update_returning::<Self>(context, "orders", key, &values, &[]).await?;
        recalculate_total(context, key).await?;
        if order.status != OrderStatus::Draft {
            OrderEvent::record(context, key, OrderEventType::Updated, Value::Null).await?;
        }
        order.reload(context).await
    }

    /// Cancels an order of which nothing has been fulfilled yet. With
    /// `restock`, allocated stock is released. Otherwise it is considered
    /// gone and removed from the stock.
    pub(crate) async fn cancel(id: Id, restock: bool, context: &Context) -> ApiResult<Self> {
        let order = Self::require_placed(&id, "id", context).await?;
        order.cancel_checked(restock, context).await
    }

    pub(crate) async fn bulk_cancel(
        ids: Vec<Id>,
        restock: bool,
        context: &Context,
    ) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::ORDER_KIND, "ids")?;
        let mut count = 0;
        for key in keys {
            let order = Self::require(key, "ids", context).await?;
            if order.status == OrderStatus::Draft {
                return Err(invalid_input!(
                    key = "draft",
                    "draft orders cannot be canceled",
                ).on_field("ids"));
            }
            order.cancel_checked(restock, context).await?;
            count += 1;
        }
        Ok(BulkResult::new(count))
    }

    async fn cancel_checked(self, restock: bool, context: &Context) -> ApiResult<Self> {
        if self.status != OrderStatus::Unfulfilled {
            return Err(invalid_input!(
                key = "cannot-cancel",
                "only unfulfilled orders that are not canceled yet can be canceled",
            ).on_field("id"));
        }

        if restock {
            line::deallocate_stock(context, self.key).await?;
        } else {
            line::consume_allocated_stock(context, self.key).await?;
        }
        context.db.execute("update orders set status = 'canceled' where id = $1", &[&self.key])
            .await?;
        OrderEvent::record(
            context,
            self.key,
            OrderEventType::Canceled,
            serde_json::json!({ "restock": restock }),
        ).await?;
        info!("Canceled order {:?} (restock: {restock})", self.key);
        self.reload(context).await
    }
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct OrderUpdateInput {
    billing_address: Option<AddressInput>,
    user_email: Option<String>,
    shipping_address: Option<AddressInput>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct OrderUpdateShippingInput {
    /// Name of the shipping method. `null` removes shipping from the order.
    shipping_method_name: Option<String>,
    shipping_price: Option<f64>,
}

/// Very rough plausibility check. Real validation happens by sending mails.
fn check_email(email: &str, field: &'static str) -> ApiResult<()> {
    check_required(email, 254, field)?;
    let valid = email.split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.')
            && !email.chars().any(char::is_whitespace));
    if !valid {
        return Err(invalid_input!(key = "invalid", "'{email}' is not an e-mail address")
            .on_field(field));
    }
    Ok(())
}

/// Sets the total to lines plus shipping minus discount, but never below 0.
async fn recalculate_total(context: &Context, order: Key) -> ApiResult<()> {
    context.db.execute(
        "update orders set total = greatest(0, \
            (select coalesce(sum(quantity * unit_price), 0) from order_lines where order_id = $1) \
            + shipping_price - discount_amount) \
            where id = $1",
        &[&order],
    ).await?;
    Ok(())
}

/// Derives the status of a placed order from the fulfilled quantities of
/// its lines.
async fn refresh_status(context: &Context, order: Key) -> ApiResult<OrderStatus> {
    let row = context.db.query_one(
        "select coalesce(sum(quantity), 0)::bigint, coalesce(sum(quantity_fulfilled), 0)::bigint \
            from order_lines where order_id = $1",
        &[&order],
    ).await?;
    let status = OrderStatus::from_fulfillment(row.get(0), row.get(1));
    context.db.execute(
        "update orders set status = $2 where id = $1 and status not in ('draft', 'canceled')",
        &[&order, &status],
    ).await?;
    Ok(status)
}

/// The user on whose behalf a mutation is executed, for the event log.
fn actor(context: &Context) -> Option<Key> {
    context.auth.user().map(|u| u.key)
}


#[cfg(test)]
mod tests {
    use crate::db::util::SqlFilter;
    use super::{check_email, filter_status, OrderStatusFilter};

    #[test]
    fn status_filter() {
        let mut sql = SqlFilter::new();
        filter_status(&mut sql, &[OrderStatusFilter::Fulfilled, OrderStatusFilter::Canceled]);
        assert_eq!(
            sql.where_clause(),
            "where (orders.status = 'fulfilled' or orders.status = 'canceled')",
        );

        let mut none = SqlFilter::new();
        filter_status(&mut none, &[]);
        assert!(none.is_empty());
    }

    #[test]
    fn ready_to_fulfill_needs_payment() {
        let condition = OrderStatusFilter::ReadyToFulfill.condition();
        assert!(condition.contains("captured_amount"));
        assert!(condition.contains("partially_fulfilled"));
    }

    #[test]
    fn emails() {
        assert!(check_email("ada@example.com", "userEmail").is_ok());
        for invalid in ["", "ada", "@example.com", "ada@localhost", "a da@example.com"] {
            assert_eq!(
                check_email(invalid, "userEmail").unwrap_err().field,
                Some("userEmail"),
                "{invalid:?}",
            );
        }
    }
}
