//! Rust representations of the custom types defined in our migrations.

use juniper::GraphQLEnum;
use postgres_types::{FromSql, ToSql};


/// Represents the `attribute_input_type` type defined in `03-catalog.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSql, ToSql, GraphQLEnum)]
#[postgres(name = "attribute_input_type")]
#[graphql(description = "How values of an attribute are picked in the dashboard")]
pub(crate) enum AttributeInputType {
    #[postgres(name = "dropdown")]
    Dropdown,
    #[postgres(name = "multiselect")]
    Multiselect,
}

/// Represents the `sale_type` type defined in `04-discounts.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSql, ToSql, GraphQLEnum)]
#[postgres(name = "sale_type")]
pub(crate) enum SaleType {
    #[postgres(name = "fixed")]
    Fixed,
    #[postgres(name = "percentage")]
    Percentage,
}

/// Represents the `voucher_type` type defined in `04-discounts.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSql, ToSql, GraphQLEnum)]
#[postgres(name = "voucher_type")]
pub(crate) enum VoucherType {
    #[postgres(name = "entire_order")]
    EntireOrder,
    #[postgres(name = "shipping")]
    Shipping,
    #[postgres(name = "specific_product")]
    SpecificProduct,
}

/// Represents the `discount_value_type` type defined in `04-discounts.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSql, ToSql, GraphQLEnum)]
#[postgres(name = "discount_value_type")]
pub(crate) enum DiscountValueType {
    #[postgres(name = "fixed")]
    Fixed,
    #[postgres(name = "percentage")]
    Percentage,
}

/// Represents the `order_status` type defined in `05-orders.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSql, ToSql, GraphQLEnum)]
#[postgres(name = "order_status")]
pub(crate) enum OrderStatus {
    #[postgres(name = "draft")]
    Draft,
    #[postgres(name = "unfulfilled")]
    Unfulfilled,
    #[postgres(name = "partially_fulfilled")]
    PartiallyFulfilled,
    #[postgres(name = "fulfilled")]
    Fulfilled,
    #[postgres(name = "canceled")]
    Canceled,
}

impl OrderStatus {
    /// Status derived from how many of the ordered items have been fulfilled.
    pub(crate) fn from_fulfillment(total_quantity: i64, fulfilled_quantity: i64) -> Self {
        if fulfilled_quantity <= 0 {
            Self::Unfulfilled
        } else if fulfilled_quantity < total_quantity {
            Self::PartiallyFulfilled
        } else {
            Self::Fulfilled
        }
    }
}

/// Represents the `fulfillment_status` type defined in `05-orders.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSql, ToSql, GraphQLEnum)]
#[postgres(name = "fulfillment_status")]
pub(crate) enum FulfillmentStatus {
    #[postgres(name = "fulfilled")]
    Fulfilled,
    #[postgres(name = "canceled")]
    Canceled,
}

/// Represents the `charge_status` type defined in `05-orders.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSql, ToSql, GraphQLEnum)]
#[postgres(name = "charge_status")]
pub(crate) enum ChargeStatus {
    #[postgres(name = "not_charged")]
    NotCharged,
    #[postgres(name = "partially_charged")]
    PartiallyCharged,
    #[postgres(name = "fully_charged")]
    FullyCharged,
    #[postgres(name = "partially_refunded")]
    PartiallyRefunded,
    #[postgres(name = "fully_refunded")]
    FullyRefunded,
}

/// Represents the `order_event_type` type defined in `05-orders.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSql, ToSql, GraphQLEnum)]
#[postgres(name = "order_event_type")]
pub(crate) enum OrderEventType {
    #[postgres(name = "draft_created")]
    DraftCreated,
    #[postgres(name = "draft_added_products")]
    DraftAddedProducts,
    #[postgres(name = "draft_removed_products")]
    DraftRemovedProducts,
    #[postgres(name = "placed")]
    Placed,
    #[postgres(name = "placed_from_draft")]
    PlacedFromDraft,
    #[postgres(name = "canceled")]
    Canceled,
    #[postgres(name = "order_marked_as_paid")]
    OrderMarkedAsPaid,
    #[postgres(name = "order_fully_paid")]
    OrderFullyPaid,
    #[postgres(name = "updated")]
    Updated,
    #[postgres(name = "payment_captured")]
    PaymentCaptured,
    #[postgres(name = "payment_refunded")]
    PaymentRefunded,
    #[postgres(name = "payment_voided")]
    PaymentVoided,
    #[postgres(name = "fulfillment_canceled")]
    FulfillmentCanceled,
    #[postgres(name = "fulfillment_fulfilled_items")]
    FulfillmentFulfilledItems,
    #[postgres(name = "tracking_updated")]
    TrackingUpdated,
    #[postgres(name = "note_added")]
    NoteAdded,
}


#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn status_from_fulfillment() {
        assert_eq!(OrderStatus::from_fulfillment(5, 0), OrderStatus::Unfulfilled);
        assert_eq!(OrderStatus::from_fulfillment(5, 3), OrderStatus::PartiallyFulfilled);
        assert_eq!(OrderStatus::from_fulfillment(5, 5), OrderStatus::Fulfilled);
        assert_eq!(OrderStatus::from_fulfillment(0, 0), OrderStatus::Unfulfilled);
    }
}
