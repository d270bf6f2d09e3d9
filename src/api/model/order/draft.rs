use juniper::GraphQLInputObject;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    api::{
        BulkResult, Context, Id,
        common::to_positive_decimal,
        err::{invalid_input, ApiError, ApiResult},
        model::{discount::Voucher, shared::{self, check_length, check_required}},
    },
    auth::User,
    db::{types::{OrderEventType, OrderStatus}, util::SqlAssignments},
    prelude::*,
};
use super::{
    check_email, line, recalculate_total, AddressInput, Order, OrderEvent, OrderLineCreateInput,
};


#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct DraftOrderInput {
    billing_address: Option<AddressInput>,
    /// The customer. Their e-mail address is used unless `userEmail` is
    /// given.
    user: Option<Id>,
    user_email: Option<String>,
    /// Discount amount in the order's currency.
    discount: Option<f64>,
    shipping_address: Option<AddressInput>,
    shipping_method_name: Option<String>,
    shipping_price: Option<f64>,
    voucher: Option<Id>,
    customer_note: Option<String>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct DraftOrderCreateInput {
    billing_address: Option<AddressInput>,
    user: Option<Id>,
    user_email: Option<String>,
    discount: Option<f64>,
    shipping_address: Option<AddressInput>,
    shipping_method_name: Option<String>,
    shipping_price: Option<f64>,
    voucher: Option<Id>,
    customer_note: Option<String>,
    lines: Option<Vec<OrderLineCreateInput>>,
}

impl DraftOrderCreateInput {
    fn into_parts(self) -> (DraftOrderInput, Vec<OrderLineCreateInput>) {
        let fields = DraftOrderInput {
            billing_address: self.billing_address,
            user: self.user,
            user_email: self.user_email,
            discount: self.discount,
            shipping_address: self.shipping_address,
            shipping_method_name: self.shipping_method_name,
            shipping_price: self.shipping_price,
            voucher: self.voucher,
            customer_note: self.customer_note,
        };
        (fields, self.lines.unwrap_or_default())
    }
}

impl DraftOrderInput {
    async fn into_assignments(self, context: &Context) -> ApiResult<SqlAssignments> {
        let mut values = SqlAssignments::new();

        if let Some(id) = self.user {
            let key = id.require_key(Id::USER_KIND, "user")?;
            let user = shared::require_by_key::<User>(context, "users", key, "user").await?;
            values.set("customer", Some(key));
            if self.user_email.is_none() {
                values.set("user_email", user.email);
            }
        }
        if let Some(email) = self.user_email {
            check_email(&email, "userEmail")?;
            values.set("user_email", email);
        }
        if let Some(id) = self.voucher {
            let key = id.require_key(Id::VOUCHER_KIND, "voucher")?;
            shared::require_by_key::<Voucher>(context, "vouchers", key, "voucher").await?;
            values.set("voucher", Some(key));
        }
        if let Some(discount) = self.discount {
            values.set("discount_amount", to_positive_decimal(discount, "discount")?);
        }
        if let Some(address) = self.shipping_address {
            values.set("shipping_address", address.into_address("shippingAddress")?.to_stored());
        }
        if let Some(address) = self.billing_address {
            values.set("billing_address", address.into_address("billingAddress")?.to_stored());
        }
        if let Some(name) = self.shipping_method_name {
            check_required(&name, 255, "shippingMethodName")?;
            values.set("shipping_method_name", Some(name));
        }
        if let Some(price) = self.shipping_price {
            values.set("shipping_price", to_positive_decimal(price, "shippingPrice")?);
        }
        if let Some(note) = self.customer_note {
            check_length(&note, 2000, "customerNote")?;
            values.set("customer_note", note);
        }

        Ok(values)
    }
}

/// Returns the reason why the draft cannot be completed, if any.
pub(super) async fn completion_problem(
    order: &Order,
    context: &Context,
) -> ApiResult<Option<ApiError>> {
    let has_lines = context.db
        .query_one("select exists (select 1 from order_lines where order_id = $1)", &[&order.key])
        .await?
        .get::<_, bool>(0);
    if !has_lines {
        return Ok(Some(invalid_input!(key = "no-lines", "the order has no lines").on_field("id")));
    }
    if order.user_email.is_empty() && order.customer.is_none() {
        return Ok(Some(invalid_input!(
            key = "required",
            "a customer or customer e-mail is required",
        ).on_field("userEmail")));
    }
    if order.shipping_address.is_none() && order.requires_shipping(context).await? {
        return Ok(Some(invalid_input!(
            key = "required",
            "the order contains products that need shipping",
        ).on_field("shippingAddress")));
    }
    Ok(None)
}


impl Order {
    pub(super) fn check_draft(&self, field: &'static str) -> ApiResult<()> {
        if self.status != OrderStatus::Draft {
            return Err(invalid_input!(key = "not-draft", "the order is not a draft anymore")
                .on_field(field));
        }
        Ok(())
    }

    async fn require_draft(id: &Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::ORDER_KIND, "id")?;
        let order = Self::require(key, "id", context).await?;
        order.check_draft("id")?;
        Ok(order)
    }

    pub(crate) async fn create_draft(
        input: DraftOrderCreateInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let (fields, lines) = input.into_parts();
        let mut values = fields.into_assignments(context).await?;
        values
            .set("status", OrderStatus::Draft)
            .set("token", Uuid::new_v4())
            .set("currency", context.config.general.currency.as_str().to_owned());
        let order = shared::insert_returning::<Self>(context, "orders", &values, &[]).await?;

        OrderEvent::record(context, order.key, OrderEventType::DraftCreated, Value::Null).await?;
        line::add_lines(context, order.key, lines).await?;
        recalculate_total(context, order.key).await?;
        info!("Created draft order {:?}", order.key);
        order.reload(context).await
    }

    pub(crate) async fn update_draft(
        id: Id,
        input: DraftOrderInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let order = Self::require_draft(&id, context).await?;
        let values = input.into_assignments(context).await?;
        shared::update_returning::<Self>(context, "orders", order.key, &values, &[]).await?;
        recalculate_total(context, order.key).await?;
        order.reload(context).await
    }

    pub(crate) async fn delete_draft(id: Id, context: &Context) -> ApiResult<Self> {
        let order = Self::require_draft(&id, context).await?;
        let order = shared::delete_returning::<Self>(context, "orders", order.key).await?;
        info!("Deleted draft order {:?}", order.key);
        Ok(order)
    }

    /// Deletes the given orders that are drafts. Other orders are ignored.
    pub(crate) async fn bulk_delete_drafts(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::ORDER_KIND, "ids")?;
        shared::bulk_delete(context, "orders", &keys, Some("status = 'draft'")).await
    }

    /// Places a draft order: it becomes unfulfilled and its items are
    /// allocated in stock.
    pub(crate) async fn complete_draft(id: Id, context: &Context) -> ApiResult<Self> {
        let order = Self::require_draft(&id, context).await?;
        if let Some(problem) = completion_problem(&order, context).await? {
            return Err(problem);
        }

        // Customers without a given e-mail are contacted via their account.
        context.db.execute(
            "update orders set status = 'unfulfilled', \
                user_email = case when user_email = '' \
                    then coalesce((select email from users where users.id = orders.customer), '') \
                    else user_email end \
                where id = $1",
            &[&order.key],
        ).await?;
        line::allocate_stock(context, order.key).await?;
        OrderEvent::record(context, order.key, OrderEventType::PlacedFromDraft, Value::Null).await?;

        info!("Placed draft order {:?}", order.key);
        order.reload(context).await
    }
}


#[cfg(test)]
mod tests {
    use crate::api::Id;
    use crate::model::Key;
    use super::DraftOrderCreateInput;

    #[test]
    fn create_input_parts() {
        let input = DraftOrderCreateInput {
            billing_address: None,
            user: Some(Id::user(Key(3))),
            user_email: None,
            discount: Some(5.0),
            shipping_address: None,
            shipping_method_name: Some("DHL".into()),
            shipping_price: None,
            voucher: None,
            customer_note: None,
            lines: None,
        };
        let (fields, lines) = input.into_parts();
        assert!(lines.is_empty());
        assert_eq!(fields.discount, Some(5.0));
        assert_eq!(fields.shipping_method_name.as_deref(), Some("DHL"));
        assert_eq!(fields.user.and_then(|id| id.key_for(Id::USER_KIND)), Some(Key(3)));
    }
}
