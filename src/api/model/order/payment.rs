use chrono::{DateTime, Utc};
use juniper::graphql_object;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde_json::json;
use tokio_postgres::Row;

use crate::{
    api::{
        Context, Id, Money,
        common::to_positive_decimal,
        err::{invalid_input, ApiResult},
    },
    db::{types::{ChargeStatus, OrderEventType}, util::FromDb},
    model::Key,
    prelude::*,
};
use super::{Order, OrderEvent};


/// Gateway used for payments created by `orderMarkAsPaid`.
const MANUAL_GATEWAY: &str = "manual";


/// A payment of an order. Talking to payment gateways is not part of this
/// service: payments are only records whose state is changed by staff.
pub(crate) struct Payment {
    key: Key,
    gateway: String,
    is_active: bool,
    created: DateTime<Utc>,
    pub(super) charge_status: ChargeStatus,
    total: Decimal,
    captured_amount: Decimal,
    currency: String,
}

impl FromDb for Payment {
    const SELECT: &'static str = "payments.id, payments.gateway, payments.is_active, \
        payments.created, payments.charge_status, payments.total, payments.captured_amount, \
        payments.currency";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            gateway: row.get(1),
            is_active: row.get(2),
            created: row.get(3),
            charge_status: row.get(4),
            total: row.get(5),
            captured_amount: row.get(6),
            currency: row.get(7),
        }
    }
}

#[graphql_object(Context = Context)]
impl Payment {
    fn id(&self) -> Id {
        Id::payment(self.key)
    }

    fn gateway(&self) -> &str {
        &self.gateway
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn charge_status(&self) -> ChargeStatus {
        self.charge_status
    }

    fn total(&self) -> Money {
        Money::new(self.total, &self.currency)
    }

    fn captured_amount(&self) -> Money {
        Money::new(self.captured_amount, &self.currency)
    }
}

/// What a payment operation does to the captured amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Capture(Decimal),
    Refund(Decimal),
    Void,
}

impl Payment {
    pub(crate) async fn of_order(context: &Context, order: Key) -> ApiResult<Vec<Self>> {
        let query = format!(
            "select {} from payments where order_id = $1 order by created, id",
            Self::SELECT,
        );
        context.db.query(&query, &[&order]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    /// The newest active payment of the order.
    pub(crate) async fn active_of(context: &Context, order: Key) -> ApiResult<Option<Self>> {
        let query = format!(
            "select {} from payments where order_id = $1 and is_active \
                order by created desc, id desc limit 1",
            Self::SELECT,
        );
        context.db.query_opt(&query, &[&order]).await?
            .map(|row| Self::from_row_start(&row))
            .pipe(Ok)
    }

    /// Checks whether `op` is allowed and returns the new captured amount
    /// and charge status.
    fn apply(&self, op: Operation) -> ApiResult<(Decimal, ChargeStatus)> {
        use ChargeStatus::*;

        match op {
            Operation::Capture(amount) | Operation::Refund(amount) if amount <= Decimal::ZERO => {
                Err(invalid_input!(key = "invalid", "the amount has to be positive")
                    .on_field("amount"))
            }
            Operation::Capture(amount) => {
                if !matches!(self.charge_status, NotCharged | PartiallyCharged) {
                    return Err(invalid_input!(
                        key = "cannot-capture",
                        "the payment cannot be captured anymore",
                    ).on_field("amount"));
                }
                let captured = self.captured_amount + amount;
                if captured > self.total {
                    return Err(invalid_input!(
                        key = "amount-too-large",
                        "cannot capture more than the payment total",
                    ).on_field("amount"));
                }
                let status = if captured == self.total { FullyCharged } else { PartiallyCharged };
                Ok((captured, status))
            }
            Operation::Refund(amount) => {
                if !matches!(self.charge_status, PartiallyCharged | FullyCharged | PartiallyRefunded) {
                    return Err(invalid_input!(
                        key = "cannot-refund",
                        "nothing of this payment can be refunded",
                    ).on_field("amount"));
                }
                if amount > self.captured_amount {
                    return Err(invalid_input!(
                        key = "amount-too-large",
                        "cannot refund more than was captured",
                    ).on_field("amount"));
                }
                let captured = self.captured_amount - amount;
                let status = if captured.is_zero() { FullyRefunded } else { PartiallyRefunded };
                Ok((captured, status))
            }
            Operation::Void => {
                if self.charge_status != NotCharged {
                    return Err(invalid_input!(
                        key = "cannot-void",
                        "only payments of which nothing was captured can be voided",
                    ).on_field("id"));
                }
                Ok((self.captured_amount, NotCharged))
            }
        }
    }

    async fn require_active(order: &Order, context: &Context) -> ApiResult<Self> {
        Self::active_of(context, order.key).await?.ok_or_else(|| invalid_input!(
            key = "no-payment",
            "the order has no active payment",
        ).on_field("id"))
    }

    /// Runs a payment operation on the active payment of an order and
    /// records the matching events.
    async fn run(id: Id, op: Operation, context: &Context) -> ApiResult<Order> {
        let order = Order::require_placed(&id, "id", context).await?;
        let payment = Self::require_active(&order, context).await?;
        let (captured, status) = payment.apply(op)?;

        let is_active = op != Operation::Void;
        context.db.execute(
            "update payments set captured_amount = $2, charge_status = $3, is_active = $4 \
                where id = $1",
            &[&payment.key, &captured, &status, &is_active],
        ).await?;

        let (typ, params) = match op {
            Operation::Capture(amount) => (OrderEventType::PaymentCaptured, json!({ "amount": amount.to_f64() })),
            Operation::Refund(amount) => (OrderEventType::PaymentRefunded, json!({ "amount": amount.to_f64() })),
            Operation::Void => (OrderEventType::PaymentVoided, json!({})),
        };
        OrderEvent::record(context, order.key, typ, params).await?;
        if status == ChargeStatus::FullyCharged {
            OrderEvent::record(context, order.key, OrderEventType::OrderFullyPaid, json!({})).await?;
        }

        info!("{op:?} on payment {:?} of order {:?}", payment.key, order.key);
        order.reload(context).await
    }

    pub(crate) async fn capture(id: Id, amount: f64, context: &Context) -> ApiResult<Order> {
        let amount = to_positive_decimal(amount, "amount")?;
        Self::run(id, Operation::Capture(amount), context).await
    }

    pub(crate) async fn refund(id: Id, amount: f64, context: &Context) -> ApiResult<Order> {
        let amount = to_positive_decimal(amount, "amount")?;
        Self::run(id, Operation::Refund(amount), context).await
    }

    pub(crate) async fn void(id: Id, context: &Context) -> ApiResult<Order> {
        Self::run(id, Operation::Void, context).await
    }

    /// Marks an order as paid outside of any gateway. An active payment of
    /// which nothing is captured yet is captured completely. Otherwise, a
    /// new fully charged manual payment is created.
    pub(crate) async fn mark_as_paid(id: Id, context: &Context) -> ApiResult<Order> {
        let order = Order::require_placed(&id, "id", context).await?;
        if let Some(payment) = Self::active_of(context, order.key).await? {
            if payment.charge_status != ChargeStatus::NotCharged {
                return Err(invalid_input!(
                    key = "already-paid",
                    "orders with captured payments cannot be marked as paid",
                ).on_field("id"));
            }
            context.db.execute(
                "update payments set captured_amount = total, charge_status = 'fully_charged' \
                    where id = $1",
                &[&payment.key],
            ).await?;
        } else {
            context.db.execute(
                "insert into payments \
                    (order_id, gateway, charge_status, total, captured_amount, currency) \
                    values ($1, $2, 'fully_charged', $3, $3, $4)",
                &[&order.key, &MANUAL_GATEWAY, &order.total, &order.currency],
            ).await?;
        }

        OrderEvent::record(context, order.key, OrderEventType::OrderMarkedAsPaid, json!({})).await?;
        OrderEvent::record(context, order.key, OrderEventType::OrderFullyPaid, json!({})).await?;
        info!("Marked order {:?} as paid", order.key);
        order.reload(context).await
    }
}


#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use crate::{db::types::ChargeStatus, model::Key};
    use super::{Operation, Payment};

    fn payment(status: ChargeStatus, total: i64, captured: i64) -> Payment {
        Payment {
            key: Key(1),
            gateway: "manual".into(),
            is_active: true,
            created: Utc::now(),
            charge_status: status,
            total: Decimal::from(total),
            captured_amount: Decimal::from(captured),
            currency: "EUR".into(),
        }
    }

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn capture() {
        let p = payment(ChargeStatus::NotCharged, 100, 0);
        assert_eq!(p.apply(Operation::Capture(dec(40))).unwrap(), (dec(40), ChargeStatus::PartiallyCharged));
        assert_eq!(p.apply(Operation::Capture(dec(100))).unwrap(), (dec(100), ChargeStatus::FullyCharged));
        assert_eq!(p.apply(Operation::Capture(dec(101))).unwrap_err().key, Some("amount-too-large"));
        assert_eq!(p.apply(Operation::Capture(dec(0))).unwrap_err().key, Some("invalid"));

        let partial = payment(ChargeStatus::PartiallyCharged, 100, 40);
        assert_eq!(partial.apply(Operation::Capture(dec(60))).unwrap(), (dec(100), ChargeStatus::FullyCharged));

        let refunded = payment(ChargeStatus::FullyRefunded, 100, 0);
        assert_eq!(refunded.apply(Operation::Capture(dec(10))).unwrap_err().key, Some("cannot-capture"));
    }

    #[test]
    fn refund() {
        let p = payment(ChargeStatus::FullyCharged, 100, 100);
        assert_eq!(p.apply(Operation::Refund(dec(30))).unwrap(), (dec(70), ChargeStatus::PartiallyRefunded));
        assert_eq!(p.apply(Operation::Refund(dec(100))).unwrap(), (dec(0), ChargeStatus::FullyRefunded));
        assert_eq!(p.apply(Operation::Refund(dec(101))).unwrap_err().key, Some("amount-too-large"));

        let uncharged = payment(ChargeStatus::NotCharged, 100, 0);
        assert_eq!(uncharged.apply(Operation::Refund(dec(1))).unwrap_err().key, Some("cannot-refund"));
    }

    #[test]
    fn void() {
        let p = payment(ChargeStatus::NotCharged, 100, 0);
        assert_eq!(p.apply(Operation::Void).unwrap(), (dec(0), ChargeStatus::NotCharged));

        let charged = payment(ChargeStatus::PartiallyCharged, 100, 10);
        assert_eq!(charged.apply(Operation::Void).unwrap_err().key, Some("cannot-void"));
    }
}
