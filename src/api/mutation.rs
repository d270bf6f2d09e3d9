use juniper::graphql_object;

use super::{
    BulkResult, Context, Id,
    err::ApiResult,
    model::{
        discount::{
            CatalogueInput, Sale, SaleInput, SaleTranslationInput, Voucher, VoucherInput,
            VoucherTranslationInput,
        },
        meta::{self, MetaInput, MetaPath, Visibility},
        order::{
            DraftOrderCreateInput, DraftOrderInput, Fulfillment, FulfillmentCancelInput,
            FulfillmentCreateInput, FulfillmentUpdateTrackingInput, Order, OrderEvent,
            OrderLine, OrderLineCreateInput, OrderLineInput, OrderNoteInput, OrderUpdateInput,
            OrderUpdateShippingInput, Payment,
        },
        page::{Page, PageInput, PageTranslationInput},
        product::{
            Attribute, AttributeAssignInput, AttributeCreateInput, AttributeTypeEnum,
            AttributeUpdateInput, AttributeValue, AttributeValueCreateInput,
            CatalogueTranslationInput, Category, CategoryInput, Collection, CollectionInput,
            DigitalContent, DigitalContentInput, DigitalContentUrl, DigitalContentUrlCreateInput,
            MoveProductInput, NameTranslationInput, Product, ProductImage,
            ProductImageCreateInput, ProductImageUpdateInput, ProductInput, ProductType,
            ProductTypeInput, ProductVariant, ProductVariantBulkCreateInput,
            ProductVariantBulkResult, ProductVariantCreateInput, ProductVariantUpdateInput,
            ReorderInput,
        },
    },
};


/// The root mutation object.
///
/// Like `Query`, each field passes the registry gate first. Each field then
/// runs in its own savepoint (`Context::atomically`), so a failing mutation
/// leaves nothing behind while earlier fields of the request are kept. The
/// four metadata mutations of an entity all go through `meta`.
pub(crate) struct Mutation;

#[graphql_object(Context = Context)]
impl Mutation {
    // ===== Discount =====

    async fn sale_create(input: SaleInput, context: &Context) -> ApiResult<Sale> {
        context.gate("saleCreate")?;
        context.atomically(Sale::create(input, context)).await
    }

    async fn sale_delete(id: Id, context: &Context) -> ApiResult<Sale> {
        context.gate("saleDelete")?;
        context.atomically(Sale::delete(id, context)).await
    }

    async fn sale_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("saleBulkDelete")?;
        context.atomically(Sale::bulk_delete(ids, context)).await
    }

    async fn sale_update(id: Id, input: SaleInput, context: &Context) -> ApiResult<Sale> {
        context.gate("saleUpdate")?;
        context.atomically(Sale::update(id, input, context)).await
    }

    /// Adds products, categories and collections to a sale.
    async fn sale_catalogues_add(
        id: Id,
        input: CatalogueInput,
        context: &Context,
    ) -> ApiResult<Sale> {
        context.gate("saleCataloguesAdd")?;
        context.atomically(Sale::catalogues_add(id, input, context)).await
    }

    async fn sale_catalogues_remove(
        id: Id,
        input: CatalogueInput,
        context: &Context,
    ) -> ApiResult<Sale> {
        context.gate("saleCataloguesRemove")?;
        context.atomically(Sale::catalogues_remove(id, input, context)).await
    }

    async fn sale_translate(
        id: Id,
        language_code: String,
        input: SaleTranslationInput,
        context: &Context,
    ) -> ApiResult<Sale> {
        context.gate("saleTranslate")?;
        context.atomically(Sale::translate(id, language_code, input, context)).await
    }

    async fn voucher_create(input: VoucherInput, context: &Context) -> ApiResult<Voucher> {
        context.gate("voucherCreate")?;
        context.atomically(Voucher::create(input, context)).await
    }

    async fn voucher_delete(id: Id, context: &Context) -> ApiResult<Voucher> {
        context.gate("voucherDelete")?;
        context.atomically(Voucher::delete(id, context)).await
    }

    async fn voucher_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("voucherBulkDelete")?;
        context.atomically(Voucher::bulk_delete(ids, context)).await
    }

    async fn voucher_update(id: Id, input: VoucherInput, context: &Context) -> ApiResult<Voucher> {
        context.gate("voucherUpdate")?;
        context.atomically(Voucher::update(id, input, context)).await
    }

    async fn voucher_catalogues_add(
        id: Id,
        input: CatalogueInput,
        context: &Context,
    ) -> ApiResult<Voucher> {
        context.gate("voucherCataloguesAdd")?;
        context.atomically(Voucher::catalogues_add(id, input, context)).await
    }

    async fn voucher_catalogues_remove(
        id: Id,
        input: CatalogueInput,
        context: &Context,
    ) -> ApiResult<Voucher> {
        context.gate("voucherCataloguesRemove")?;
        context.atomically(Voucher::catalogues_remove(id, input, context)).await
    }

    async fn voucher_translate(
        id: Id,
        language_code: String,
        input: VoucherTranslationInput,
        context: &Context,
    ) -> ApiResult<Voucher> {
        context.gate("voucherTranslate")?;
        context.atomically(Voucher::translate(id, language_code, input, context)).await
    }


    // ===== Order =====

    /// Turns a draft into a placed order and allocates its items in stock.
    async fn draft_order_complete(id: Id, context: &Context) -> ApiResult<Order> {
        context.gate("draftOrderComplete")?;
        context.atomically(Order::complete_draft(id, context)).await
    }

    async fn draft_order_create(input: DraftOrderCreateInput, context: &Context) -> ApiResult<Order> {
        context.gate("draftOrderCreate")?;
        context.atomically(Order::create_draft(input, context)).await
    }

    async fn draft_order_delete(id: Id, context: &Context) -> ApiResult<Order> {
        context.gate("draftOrderDelete")?;
        context.atomically(Order::delete_draft(id, context)).await
    }

    /// Deletes draft orders. IDs of placed orders are ignored.
    async fn draft_order_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("draftOrderBulkDelete")?;
        context.atomically(Order::bulk_delete_drafts(ids, context)).await
    }

    async fn draft_order_lines_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("draftOrderLinesBulkDelete")?;
        context.atomically(OrderLine::bulk_delete(ids, context)).await
    }

    /// Adds variants to a draft. Variants already in the draft have their
    /// quantity increased.
    async fn draft_order_lines_create(
        id: Id,
        input: Vec<OrderLineCreateInput>,
        context: &Context,
    ) -> ApiResult<Order> {
        context.gate("draftOrderLinesCreate")?;
        context.atomically(OrderLine::create(id, input, context)).await
    }

    async fn draft_order_line_delete(id: Id, context: &Context) -> ApiResult<Order> {
        context.gate("draftOrderLineDelete")?;
        context.atomically(OrderLine::delete(id, context)).await
    }

    async fn draft_order_line_update(
        id: Id,
        input: OrderLineInput,
        context: &Context,
    ) -> ApiResult<OrderLine> {
        context.gate("draftOrderLineUpdate")?;
        context.atomically(OrderLine::update(id, input, context)).await
    }

    async fn draft_order_update(
        id: Id,
        input: DraftOrderInput,
        context: &Context,
    ) -> ApiResult<Order> {
        context.gate("draftOrderUpdate")?;
        context.atomically(Order::update_draft(id, input, context)).await
    }

    async fn order_add_note(
        order: Id,
        input: OrderNoteInput,
        context: &Context,
    ) -> ApiResult<OrderEvent> {
        context.gate("orderAddNote")?;
        context.atomically(OrderEvent::add_note(order, input, context)).await
    }

    /// Cancels an order of which nothing is fulfilled. With `restock`, the
    /// allocated items go back into stock.
    async fn order_cancel(id: Id, restock: bool, context: &Context) -> ApiResult<Order> {
        context.gate("orderCancel")?;
        context.atomically(Order::cancel(id, restock, context)).await
    }

    async fn order_capture(id: Id, amount: f64, context: &Context) -> ApiResult<Order> {
        context.gate("orderCapture")?;
        context.atomically(Payment::capture(id, amount, context)).await
    }

    async fn order_clear_private_meta(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Order> {
        context.gate("orderClearPrivateMeta")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Private, input)).await
    }

    async fn order_clear_meta(id: Id, input: MetaPath, context: &Context) -> ApiResult<Order> {
        context.gate("orderClearMeta")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Public, input)).await
    }

    async fn order_fulfillment_cancel(
        id: Id,
        input: FulfillmentCancelInput,
        context: &Context,
    ) -> ApiResult<Fulfillment> {
        context.gate("orderFulfillmentCancel")?;
        context.atomically(Fulfillment::cancel(id, input, context)).await
    }

    async fn order_fulfillment_create(
        order: Id,
        input: FulfillmentCreateInput,
        context: &Context,
    ) -> ApiResult<Fulfillment> {
        context.gate("orderFulfillmentCreate")?;
        context.atomically(Fulfillment::create(order, input, context)).await
    }

    async fn order_fulfillment_update_tracking(
        id: Id,
        input: FulfillmentUpdateTrackingInput,
        context: &Context,
    ) -> ApiResult<Fulfillment> {
        context.gate("orderFulfillmentUpdateTracking")?;
        context.atomically(Fulfillment::update_tracking(id, input, context)).await
    }

    async fn order_fulfillment_clear_meta(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Fulfillment> {
        context.gate("orderFulfillmentClearMeta")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Public, input)).await
    }

    async fn order_fulfillment_clear_private_meta(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Fulfillment> {
        context.gate("orderFulfillmentClearPrivateMeta")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Private, input)).await
    }

    async fn order_fulfillment_update_meta(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Fulfillment> {
        context.gate("orderFulfillmentUpdateMeta")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Public, input)).await
    }

    async fn order_fulfillment_update_private_meta(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Fulfillment> {
        context.gate("orderFulfillmentUpdatePrivateMeta")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Private, input)).await
    }

    /// Marks an order as paid without involving a payment gateway.
    async fn order_mark_as_paid(id: Id, context: &Context) -> ApiResult<Order> {
        context.gate("orderMarkAsPaid")?;
        context.atomically(Payment::mark_as_paid(id, context)).await
    }

    async fn order_refund(id: Id, amount: f64, context: &Context) -> ApiResult<Order> {
        context.gate("orderRefund")?;
        context.atomically(Payment::refund(id, amount, context)).await
    }

    async fn order_update(id: Id, input: OrderUpdateInput, context: &Context) -> ApiResult<Order> {
        context.gate("orderUpdate")?;
        context.atomically(Order::update(id, input, context)).await
    }

    async fn order_update_meta(id: Id, input: MetaInput, context: &Context) -> ApiResult<Order> {
        context.gate("orderUpdateMeta")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Public, input)).await
    }

    async fn order_update_private_meta(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Order> {
        context.gate("orderUpdatePrivateMeta")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Private, input)).await
    }

    async fn order_update_shipping(
        order: Id,
        input: OrderUpdateShippingInput,
        context: &Context,
    ) -> ApiResult<Order> {
        context.gate("orderUpdateShipping")?;
        context.atomically(Order::update_shipping(order, input, context)).await
    }

    async fn order_void(id: Id, context: &Context) -> ApiResult<Order> {
        context.gate("orderVoid")?;
        context.atomically(Payment::void(id, context)).await
    }

    /// Cancels several orders. Fails as a whole if any of them cannot be
    /// canceled.
    async fn order_bulk_cancel(
        ids: Vec<Id>,
        restock: bool,
        context: &Context,
    ) -> ApiResult<BulkResult> {
        context.gate("orderBulkCancel")?;
        context.atomically(Order::bulk_cancel(ids, restock, context)).await
    }


    // ===== Page =====

    async fn page_create(input: PageInput, context: &Context) -> ApiResult<Page> {
        context.gate("pageCreate")?;
        context.atomically(Page::create(input, context)).await
    }

    async fn page_update(id: Id, input: PageInput, context: &Context) -> ApiResult<Page> {
        context.gate("pageUpdate")?;
        context.atomically(Page::update(id, input, context)).await
    }

    async fn page_delete(id: Id, context: &Context) -> ApiResult<Page> {
        context.gate("pageDelete")?;
        context.atomically(Page::delete(id, context)).await
    }

    async fn page_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("pageBulkDelete")?;
        context.atomically(Page::bulk_delete(ids, context)).await
    }

    async fn page_bulk_publish(
        ids: Vec<Id>,
        is_published: bool,
        context: &Context,
    ) -> ApiResult<BulkResult> {
        context.gate("pageBulkPublish")?;
        context.atomically(Page::bulk_publish(ids, is_published, context)).await
    }

    async fn page_translate(
        id: Id,
        language_code: String,
        input: PageTranslationInput,
        context: &Context,
    ) -> ApiResult<Page> {
        context.gate("pageTranslate")?;
        context.atomically(Page::translate(id, language_code, input, context)).await
    }


    // ===== Product: attributes =====

    async fn attribute_create(input: AttributeCreateInput, context: &Context) -> ApiResult<Attribute> {
        context.gate("attributeCreate")?;
        context.atomically(Attribute::create(input, context)).await
    }

    async fn attribute_delete(id: Id, context: &Context) -> ApiResult<Attribute> {
        context.gate("attributeDelete")?;
        context.atomically(Attribute::delete(id, context)).await
    }

    async fn attribute_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("attributeBulkDelete")?;
        context.atomically(Attribute::bulk_delete(ids, context)).await
    }

    /// Assigns attributes to a product type, either as product or as variant
    /// attributes.
    async fn attribute_assign(
        product_type_id: Id,
        operations: Vec<AttributeAssignInput>,
        context: &Context,
    ) -> ApiResult<ProductType> {
        context.gate("attributeAssign")?;
        context.atomically(Attribute::assign(product_type_id, operations, context)).await
    }

    async fn attribute_unassign(
        product_type_id: Id,
        attribute_ids: Vec<Id>,
        context: &Context,
    ) -> ApiResult<ProductType> {
        context.gate("attributeUnassign")?;
        context.atomically(Attribute::unassign(product_type_id, attribute_ids, context)).await
    }

    async fn attribute_update(
        id: Id,
        input: AttributeUpdateInput,
        context: &Context,
    ) -> ApiResult<Attribute> {
        context.gate("attributeUpdate")?;
        context.atomically(Attribute::update(id, input, context)).await
    }

    async fn attribute_translate(
        id: Id,
        language_code: String,
        input: NameTranslationInput,
        context: &Context,
    ) -> ApiResult<Attribute> {
        context.gate("attributeTranslate")?;
        context.atomically(Attribute::translate(id, language_code, input, context)).await
    }

    async fn attribute_update_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Attribute> {
        context.gate("attributeUpdateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Public, input)).await
    }

    async fn attribute_clear_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Attribute> {
        context.gate("attributeClearMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Public, input)).await
    }

    async fn attribute_update_private_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Attribute> {
        context.gate("attributeUpdatePrivateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Private, input)).await
    }

    async fn attribute_clear_private_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Attribute> {
        context.gate("attributeClearPrivateMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Private, input)).await
    }

    async fn attribute_value_create(
        attribute: Id,
        input: AttributeValueCreateInput,
        context: &Context,
    ) -> ApiResult<AttributeValue> {
        context.gate("attributeValueCreate")?;
        context.atomically(AttributeValue::create(attribute, input, context)).await
    }

    async fn attribute_value_delete(id: Id, context: &Context) -> ApiResult<AttributeValue> {
        context.gate("attributeValueDelete")?;
        context.atomically(AttributeValue::delete(id, context)).await
    }

    async fn attribute_value_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("attributeValueBulkDelete")?;
        context.atomically(AttributeValue::bulk_delete(ids, context)).await
    }

    async fn attribute_value_update(
        id: Id,
        input: AttributeValueCreateInput,
        context: &Context,
    ) -> ApiResult<AttributeValue> {
        context.gate("attributeValueUpdate")?;
        context.atomically(AttributeValue::update(id, input, context)).await
    }

    async fn attribute_value_translate(
        id: Id,
        language_code: String,
        input: NameTranslationInput,
        context: &Context,
    ) -> ApiResult<AttributeValue> {
        context.gate("attributeValueTranslate")?;
        context.atomically(AttributeValue::translate(id, language_code, input, context)).await
    }

    async fn attribute_reorder_values(
        attribute_id: Id,
        moves: Vec<ReorderInput>,
        context: &Context,
    ) -> ApiResult<Attribute> {
        context.gate("attributeReorderValues")?;
        context.atomically(Attribute::reorder_values(attribute_id, moves, context)).await
    }


    // ===== Product: categories =====

    /// Creates a category, as child of `parent` if given.
    async fn category_create(
        input: CategoryInput,
        parent: Option<Id>,
        context: &Context,
    ) -> ApiResult<Category> {
        context.gate("categoryCreate")?;
        context.atomically(Category::create(input, parent, context)).await
    }

    /// Deletes a category with all its subcategories. Products of deleted
    /// categories are unpublished.
    async fn category_delete(id: Id, context: &Context) -> ApiResult<Category> {
        context.gate("categoryDelete")?;
        context.atomically(Category::delete(id, context)).await
    }

    async fn category_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("categoryBulkDelete")?;
        context.atomically(Category::bulk_delete(ids, context)).await
    }

    async fn category_update(id: Id, input: CategoryInput, context: &Context) -> ApiResult<Category> {
        context.gate("categoryUpdate")?;
        context.atomically(Category::update(id, input, context)).await
    }

    async fn category_translate(
        id: Id,
        language_code: String,
        input: CatalogueTranslationInput,
        context: &Context,
    ) -> ApiResult<Category> {
        context.gate("categoryTranslate")?;
        context.atomically(Category::translate(id, language_code, input, context)).await
    }

    async fn category_update_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Category> {
        context.gate("categoryUpdateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Public, input)).await
    }

    async fn category_clear_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Category> {
        context.gate("categoryClearMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Public, input)).await
    }

    async fn category_update_private_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Category> {
        context.gate("categoryUpdatePrivateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Private, input)).await
    }

    async fn category_clear_private_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Category> {
        context.gate("categoryClearPrivateMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Private, input)).await
    }


    // ===== Product: collections =====

    async fn collection_add_products(
        collection_id: Id,
        products: Vec<Id>,
        context: &Context,
    ) -> ApiResult<Collection> {
        context.gate("collectionAddProducts")?;
        context.atomically(Collection::add_products(collection_id, products, context)).await
    }

    async fn collection_create(input: CollectionInput, context: &Context) -> ApiResult<Collection> {
        context.gate("collectionCreate")?;
        context.atomically(Collection::create(input, context)).await
    }

    async fn collection_delete(id: Id, context: &Context) -> ApiResult<Collection> {
        context.gate("collectionDelete")?;
        context.atomically(Collection::delete(id, context)).await
    }

    async fn collection_reorder_products(
        collection_id: Id,
        moves: Vec<MoveProductInput>,
        context: &Context,
    ) -> ApiResult<Collection> {
        context.gate("collectionReorderProducts")?;
        context.atomically(Collection::reorder_products(collection_id, moves, context)).await
    }

    async fn collection_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("collectionBulkDelete")?;
        context.atomically(Collection::bulk_delete(ids, context)).await
    }

    async fn collection_bulk_publish(
        ids: Vec<Id>,
        is_published: bool,
        context: &Context,
    ) -> ApiResult<BulkResult> {
        context.gate("collectionBulkPublish")?;
        context.atomically(Collection::bulk_publish(ids, is_published, context)).await
    }

    async fn collection_remove_products(
        collection_id: Id,
        products: Vec<Id>,
        context: &Context,
    ) -> ApiResult<Collection> {
        context.gate("collectionRemoveProducts")?;
        context.atomically(Collection::remove_products(collection_id, products, context)).await
    }

    async fn collection_update(
        id: Id,
        input: CollectionInput,
        context: &Context,
    ) -> ApiResult<Collection> {
        context.gate("collectionUpdate")?;
        context.atomically(Collection::update(id, input, context)).await
    }

    async fn collection_translate(
        id: Id,
        language_code: String,
        input: CatalogueTranslationInput,
        context: &Context,
    ) -> ApiResult<Collection> {
        context.gate("collectionTranslate")?;
        context.atomically(Collection::translate(id, language_code, input, context)).await
    }

    async fn collection_update_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Collection> {
        context.gate("collectionUpdateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Public, input)).await
    }

    async fn collection_clear_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Collection> {
        context.gate("collectionClearMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Public, input)).await
    }

    async fn collection_update_private_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Collection> {
        context.gate("collectionUpdatePrivateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Private, input)).await
    }

    async fn collection_clear_private_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Collection> {
        context.gate("collectionClearPrivateMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Private, input)).await
    }


    // ===== Product: products =====

    async fn product_create(input: ProductInput, context: &Context) -> ApiResult<Product> {
        context.gate("productCreate")?;
        context.atomically(Product::create(input, context)).await
    }

    async fn product_delete(id: Id, context: &Context) -> ApiResult<Product> {
        context.gate("productDelete")?;
        context.atomically(Product::delete(id, context)).await
    }

    async fn product_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("productBulkDelete")?;
        context.atomically(Product::bulk_delete(ids, context)).await
    }

    async fn product_bulk_publish(
        ids: Vec<Id>,
        is_published: bool,
        context: &Context,
    ) -> ApiResult<BulkResult> {
        context.gate("productBulkPublish")?;
        context.atomically(Product::bulk_publish(ids, is_published, context)).await
    }

    async fn product_update(id: Id, input: ProductInput, context: &Context) -> ApiResult<Product> {
        context.gate("productUpdate")?;
        context.atomically(Product::update(id, input, context)).await
    }

    async fn product_translate(
        id: Id,
        language_code: String,
        input: CatalogueTranslationInput,
        context: &Context,
    ) -> ApiResult<Product> {
        context.gate("productTranslate")?;
        context.atomically(Product::translate(id, language_code, input, context)).await
    }

    async fn product_update_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Product> {
        context.gate("productUpdateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Public, input)).await
    }

    async fn product_clear_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Product> {
        context.gate("productClearMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Public, input)).await
    }

    async fn product_update_private_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<Product> {
        context.gate("productUpdatePrivateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Private, input)).await
    }

    async fn product_clear_private_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<Product> {
        context.gate("productClearPrivateMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Private, input)).await
    }


    // ===== Product: images =====

    async fn product_image_create(
        input: ProductImageCreateInput,
        context: &Context,
    ) -> ApiResult<ProductImage> {
        context.gate("productImageCreate")?;
        context.atomically(ProductImage::create(input, context)).await
    }

    async fn product_image_delete(id: Id, context: &Context) -> ApiResult<ProductImage> {
        context.gate("productImageDelete")?;
        context.atomically(ProductImage::delete(id, context)).await
    }

    async fn product_image_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("productImageBulkDelete")?;
        context.atomically(ProductImage::bulk_delete(ids, context)).await
    }

    /// Sets the order of the images of a product. `imagesIds` has to contain
    /// every image of the product exactly once.
    async fn product_image_reorder(
        product_id: Id,
        images_ids: Vec<Id>,
        context: &Context,
    ) -> ApiResult<Product> {
        context.gate("productImageReorder")?;
        context.atomically(ProductImage::reorder(product_id, images_ids, context)).await
    }

    async fn product_image_update(
        id: Id,
        input: ProductImageUpdateInput,
        context: &Context,
    ) -> ApiResult<ProductImage> {
        context.gate("productImageUpdate")?;
        context.atomically(ProductImage::update(id, input, context)).await
    }


    // ===== Product: product types =====

    async fn product_type_create(input: ProductTypeInput, context: &Context) -> ApiResult<ProductType> {
        context.gate("productTypeCreate")?;
        context.atomically(ProductType::create(input, context)).await
    }

    async fn product_type_delete(id: Id, context: &Context) -> ApiResult<ProductType> {
        context.gate("productTypeDelete")?;
        context.atomically(ProductType::delete(id, context)).await
    }

    async fn product_type_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("productTypeBulkDelete")?;
        context.atomically(ProductType::bulk_delete(ids, context)).await
    }

    async fn product_type_update(
        id: Id,
        input: ProductTypeInput,
        context: &Context,
    ) -> ApiResult<ProductType> {
        context.gate("productTypeUpdate")?;
        context.atomically(ProductType::update(id, input, context)).await
    }

    async fn product_type_reorder_attributes(
        product_type_id: Id,
        attribute_type: AttributeTypeEnum,
        moves: Vec<ReorderInput>,
        context: &Context,
    ) -> ApiResult<ProductType> {
        context.gate("productTypeReorderAttributes")?;
        context.atomically(
            ProductType::reorder_attributes(product_type_id, attribute_type, moves, context),
        ).await
    }

    async fn product_type_update_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<ProductType> {
        context.gate("productTypeUpdateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Public, input)).await
    }

    async fn product_type_clear_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<ProductType> {
        context.gate("productTypeClearMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Public, input)).await
    }

    async fn product_type_update_private_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<ProductType> {
        context.gate("productTypeUpdatePrivateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Private, input)).await
    }

    async fn product_type_clear_private_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<ProductType> {
        context.gate("productTypeClearPrivateMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Private, input)).await
    }


    // ===== Product: digital content =====

    async fn digital_content_create(
        variant_id: Id,
        input: DigitalContentInput,
        context: &Context,
    ) -> ApiResult<DigitalContent> {
        context.gate("digitalContentCreate")?;
        context.atomically(DigitalContent::create(variant_id, input, context)).await
    }

    /// Removes the digital content of a variant and returns the variant.
    async fn digital_content_delete(variant_id: Id, context: &Context) -> ApiResult<ProductVariant> {
        context.gate("digitalContentDelete")?;
        context.atomically(DigitalContent::delete(variant_id, context)).await
    }

    async fn digital_content_update(
        variant_id: Id,
        input: DigitalContentInput,
        context: &Context,
    ) -> ApiResult<DigitalContent> {
        context.gate("digitalContentUpdate")?;
        context.atomically(DigitalContent::update(variant_id, input, context)).await
    }

    async fn digital_content_url_create(
        input: DigitalContentUrlCreateInput,
        context: &Context,
    ) -> ApiResult<DigitalContentUrl> {
        context.gate("digitalContentUrlCreate")?;
        context.atomically(DigitalContentUrl::create(input, context)).await
    }


    // ===== Product: variants =====

    async fn product_variant_create(
        input: ProductVariantCreateInput,
        context: &Context,
    ) -> ApiResult<ProductVariant> {
        context.gate("productVariantCreate")?;
        context.atomically(ProductVariant::create(input, context)).await
    }

    async fn product_variant_delete(id: Id, context: &Context) -> ApiResult<ProductVariant> {
        context.gate("productVariantDelete")?;
        context.atomically(ProductVariant::delete(id, context)).await
    }

    async fn product_variant_bulk_create(
        product: Id,
        variants: Vec<ProductVariantBulkCreateInput>,
        context: &Context,
    ) -> ApiResult<ProductVariantBulkResult> {
        context.gate("productVariantBulkCreate")?;
        context.atomically(ProductVariant::bulk_create(product, variants, context)).await
    }

    async fn product_variant_bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        context.gate("productVariantBulkDelete")?;
        context.atomically(ProductVariant::bulk_delete(ids, context)).await
    }

    async fn product_variant_update(
        id: Id,
        input: ProductVariantUpdateInput,
        context: &Context,
    ) -> ApiResult<ProductVariant> {
        context.gate("productVariantUpdate")?;
        context.atomically(ProductVariant::update(id, input, context)).await
    }

    async fn product_variant_translate(
        id: Id,
        language_code: String,
        input: NameTranslationInput,
        context: &Context,
    ) -> ApiResult<ProductVariant> {
        context.gate("productVariantTranslate")?;
        context.atomically(ProductVariant::translate(id, language_code, input, context)).await
    }

    async fn product_variant_update_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<ProductVariant> {
        context.gate("productVariantUpdateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Public, input)).await
    }

    async fn product_variant_clear_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<ProductVariant> {
        context.gate("productVariantClearMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Public, input)).await
    }

    async fn product_variant_update_private_metadata(
        id: Id,
        input: MetaInput,
        context: &Context,
    ) -> ApiResult<ProductVariant> {
        context.gate("productVariantUpdatePrivateMetadata")?;
        context.atomically(meta::update_by_id(context, id, Visibility::Private, input)).await
    }

    async fn product_variant_clear_private_metadata(
        id: Id,
        input: MetaPath,
        context: &Context,
    ) -> ApiResult<ProductVariant> {
        context.gate("productVariantClearPrivateMetadata")?;
        context.atomically(meta::clear_by_id(context, id, Visibility::Private, input)).await
    }

    async fn variant_image_assign(
        image_id: Id,
        variant_id: Id,
        context: &Context,
    ) -> ApiResult<ProductVariant> {
        context.gate("variantImageAssign")?;
        context.atomically(ProductVariant::image_assign(image_id, variant_id, context)).await
    }

    async fn variant_image_unassign(
        image_id: Id,
        variant_id: Id,
        context: &Context,
    ) -> ApiResult<ProductVariant> {
        context.gate("variantImageUnassign")?;
        context.atomically(ProductVariant::image_unassign(image_id, variant_id, context)).await
    }
}
