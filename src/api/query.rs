use juniper::graphql_object;
use uuid::Uuid;

use crate::auth::User;
use super::{
    Context, Cursor, Id, ReportingPeriod, TaxedMoney,
    err::ApiResult,
    model::{
        account::{
            self, ServiceAccountConnection, ServiceAccountSortingInput, UserConnection,
            UserSortingInput,
        },
        discount::{
            Sale, SaleConnection, SaleFilterInput, SaleSortingInput,
            Voucher, VoucherConnection, VoucherFilterInput, VoucherSortingInput,
        },
        order::{
            Order, OrderConnection, OrderDraftFilterInput, OrderEvent, OrderEventConnection,
            OrderFilterInput, OrderSortingInput, OrderStatusFilter,
        },
        page::{Page, PageConnection, PageFilterInput, PageSortingInput},
        product::{
            self, Attribute, AttributeConnection, AttributeFilterInput, AttributeSortingInput,
            Category, CategoryConnection, CategoryFilterInput, CategorySortingInput,
            Collection, CollectionConnection, CollectionFilterInput, CollectionSortingInput,
            DigitalContent, DigitalContentConnection, Product, ProductConnection,
            ProductFilterInput, ProductOrder, ProductSalesConnection, ProductType,
            ProductTypeConnection, ProductTypeFilterInput, ProductTypeSortingInput,
            ProductVariant, ProductVariantConnection, StockAvailability,
        },
        shared::PaginationArgs,
    },
};


/// The root query object.
///
/// Every field first passes the gate of the field registry
/// (`context.gate`) and then delegates to the model.
pub(crate) struct Query;

#[graphql_object(Context = Context)]
impl Query {
    // ===== Account =====

    /// Returns the currently logged in user.
    fn me(context: &Context) -> ApiResult<Option<User>> {
        context.gate("me")?;
        Ok(account::me(context))
    }

    /// Looks up a user by ID. Staff managers see staff members, user managers
    /// see customers.
    async fn user(id: Id, context: &Context) -> ApiResult<Option<User>> {
        context.gate("user")?;
        account::load_user(id, context).await
    }

    async fn customers(
        query: Option<String>,
        sort_by: Option<UserSortingInput>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<UserConnection> {
        context.gate("customers")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        account::customers(query, sort_by, pagination, context).await
    }

    async fn staff_users(
        query: Option<String>,
        sort_by: Option<UserSortingInput>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<UserConnection> {
        context.gate("staffUsers")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        account::staff_users(query, sort_by, pagination, context).await
    }

    async fn service_accounts(
        sort_by: Option<ServiceAccountSortingInput>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<ServiceAccountConnection> {
        context.gate("serviceAccounts")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        account::service_accounts(sort_by, pagination, context).await
    }


    // ===== Discount =====

    async fn sale(id: Id, context: &Context) -> ApiResult<Option<Sale>> {
        context.gate("sale")?;
        Sale::load(id, context).await
    }

    /// Lists sales. `query` searches name, value and type.
    async fn sales(
        query: Option<String>,
        filter: Option<SaleFilterInput>,
        sort_by: Option<SaleSortingInput>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<SaleConnection> {
        context.gate("sales")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        Sale::list(query, filter, sort_by, pagination, context).await
    }

    async fn voucher(id: Id, context: &Context) -> ApiResult<Option<Voucher>> {
        context.gate("voucher")?;
        Voucher::load(id, context).await
    }

    /// Lists vouchers. `query` searches name and code.
    async fn vouchers(
        query: Option<String>,
        filter: Option<VoucherFilterInput>,
        sort_by: Option<VoucherSortingInput>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<VoucherConnection> {
        context.gate("vouchers")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        Voucher::list(query, filter, sort_by, pagination, context).await
    }


    // ===== Order =====

    /// Recent events shown on the dashboard: placed and fully paid orders.
    async fn homepage_events(
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<OrderEventConnection> {
        context.gate("homepageEvents")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        OrderEvent::homepage(pagination, context).await
    }

    /// Returns an order. Customers can only see their own orders.
    async fn order(id: Id, context: &Context) -> ApiResult<Option<Order>> {
        context.gate("order")?;
        Order::load(id, context).await
    }

    /// Lists placed orders. Drafts are listed by `draftOrders`.
    async fn orders(
        query: Option<String>,
        filter: Option<OrderFilterInput>,
        sort_by: Option<OrderSortingInput>,
        created: Option<ReportingPeriod>,
        status: Option<OrderStatusFilter>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<OrderConnection> {
        context.gate("orders")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        Order::list(query, filter, sort_by, created, status, pagination, context).await
    }

    async fn draft_orders(
        query: Option<String>,
        filter: Option<OrderDraftFilterInput>,
        sort_by: Option<OrderSortingInput>,
        created: Option<ReportingPeriod>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<OrderConnection> {
        context.gate("draftOrders")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        Order::list_drafts(query, filter, sort_by, created, pagination, context).await
    }

    /// Sum of the totals of all placed, not canceled orders in `period`.
    async fn orders_total(period: ReportingPeriod, context: &Context) -> ApiResult<TaxedMoney> {
        context.gate("ordersTotal")?;
        Order::total_of_period(period, context).await
    }

    /// Looks up an order by the token handed out to the customer.
    async fn order_by_token(token: Uuid, context: &Context) -> ApiResult<Option<Order>> {
        context.gate("orderByToken")?;
        Order::load_by_token(token, context).await
    }


    // ===== Page =====

    /// Returns a page by ID or slug. Exactly one of both has to be given.
    async fn page(id: Option<Id>, slug: Option<String>, context: &Context) -> ApiResult<Option<Page>> {
        context.gate("page")?;
        Page::load(id, slug, context).await
    }

    async fn pages(
        query: Option<String>,
        filter: Option<PageFilterInput>,
        sort_by: Option<PageSortingInput>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<PageConnection> {
        context.gate("pages")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        Page::list(query, filter, sort_by, pagination, context).await
    }


    // ===== Product =====

    async fn product(id: Id, context: &Context) -> ApiResult<Option<Product>> {
        context.gate("product")?;
        Product::load(id, context).await
    }

    /// Lists products. `attributes`, `categories` and `collections` are
    /// deprecated in favor of the respective `filter` fields.
    async fn products(
        query: Option<String>,
        filter: Option<ProductFilterInput>,
        sort_by: Option<ProductOrder>,
        attributes: Option<Vec<String>>,
        categories: Option<Vec<Id>>,
        collections: Option<Vec<Id>>,
        stock_availability: Option<StockAvailability>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<ProductConnection> {
        context.gate("products")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        Product::list(
            query,
            filter,
            sort_by,
            attributes,
            categories,
            collections,
            stock_availability,
            pagination,
            context,
        ).await
    }

    async fn category(id: Id, context: &Context) -> ApiResult<Option<Category>> {
        context.gate("category")?;
        Category::load(id, context).await
    }

    /// Lists categories. `level` 0 returns only root categories.
    async fn categories(
        query: Option<String>,
        filter: Option<CategoryFilterInput>,
        sort_by: Option<CategorySortingInput>,
        level: Option<i32>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<CategoryConnection> {
        context.gate("categories")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        Category::list(query, filter, sort_by, level, pagination, context).await
    }

    async fn collection(id: Id, context: &Context) -> ApiResult<Option<Collection>> {
        context.gate("collection")?;
        Collection::load(id, context).await
    }

    async fn collections(
        query: Option<String>,
        filter: Option<CollectionFilterInput>,
        sort_by: Option<CollectionSortingInput>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<CollectionConnection> {
        context.gate("collections")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        Collection::list(query, filter, sort_by, pagination, context).await
    }

    async fn attribute(id: Id, context: &Context) -> ApiResult<Option<Attribute>> {
        context.gate("attribute")?;
        Attribute::load(id, context).await
    }

    /// Lists attributes, optionally only those used by products in a
    /// category or collection.
    async fn attributes(
        query: Option<String>,
        filter: Option<AttributeFilterInput>,
        sort_by: Option<AttributeSortingInput>,
        in_category: Option<Id>,
        in_collection: Option<Id>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<AttributeConnection> {
        context.gate("attributes")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        Attribute::list(query, filter, sort_by, in_category, in_collection, pagination, context)
            .await
    }

    async fn product_type(id: Id, context: &Context) -> ApiResult<Option<ProductType>> {
        context.gate("productType")?;
        ProductType::load(id, context).await
    }

    async fn product_types(
        query: Option<String>,
        filter: Option<ProductTypeFilterInput>,
        sort_by: Option<ProductTypeSortingInput>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<ProductTypeConnection> {
        context.gate("productTypes")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        ProductType::list(query, filter, sort_by, pagination, context).await
    }

    async fn product_variant(id: Id, context: &Context) -> ApiResult<Option<ProductVariant>> {
        context.gate("productVariant")?;
        ProductVariant::load(id, context).await
    }

    async fn product_variants(
        ids: Option<Vec<Id>>,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<ProductVariantConnection> {
        context.gate("productVariants")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        ProductVariant::list(ids, pagination, context).await
    }

    async fn digital_content(id: Id, context: &Context) -> ApiResult<Option<DigitalContent>> {
        context.gate("digitalContent")?;
        DigitalContent::load(id, context).await
    }

    async fn digital_contents(
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<DigitalContentConnection> {
        context.gate("digitalContents")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        DigitalContent::list(pagination, context).await
    }

    /// Variants by number of sold items in `period`, best selling first.
    async fn report_product_sales(
        period: ReportingPeriod,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<ProductSalesConnection> {
        context.gate("reportProductSales")?;
        let pagination = PaginationArgs::new(first, after, last, before);
        product::product_sales(period, pagination, context).await
    }
}
