use juniper::{graphql_object, GraphQLInputObject, GraphQLObject};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Id, Money,
        common::to_positive_decimal,
        err::{invalid_input, ApiResult},
        model::{
            meta::{self, HasMetadata, MetaStore},
            shared::{
                self, define_connection, load_connection, check_length, check_required,
                PaginationArgs, SortDirection, SortOrder,
            },
            translation::Translations,
        },
    },
    auth::{HasPermissions, Permission},
    db::util::{FromDb, SqlAssignments, SqlFilter},
    model::Key,
    prelude::*,
};
use super::{
    group_selected, Attribute, AttributeValue, AttributeValueInput, DigitalContent,
    NameTranslation, NameTranslationInput, Product, ProductImage, ProductType, SelectedAttribute,
};


const TRANSLATIONS: Translations = Translations {
    table: "product_variant_translations",
    owner_col: "product_variant",
    constraint: "unique_product_variant_translation",
};

const UNIQUE_FIELDS: &[(&str, &str)] = &[("unique_variant_sku", "sku")];


/// A concrete, purchasable version of a product, e.g. "T-shirt, size M".
pub(crate) struct ProductVariant {
    pub(crate) key: Key,
    product: Key,
    sku: String,
    name: String,
    price_override: Option<Decimal>,
    cost_price: Option<Decimal>,
    quantity: i32,
    quantity_allocated: i32,
    track_inventory: bool,
    weight: Option<f32>,
    metadata: Value,
    private_metadata: Value,
    product_price: Decimal,
}

impl FromDb for ProductVariant {
    const SELECT: &'static str = "product_variants.id, product_variants.product, \
        product_variants.sku, product_variants.name, product_variants.price_override, \
        product_variants.cost_price, product_variants.quantity, \
        product_variants.quantity_allocated, product_variants.track_inventory, \
        product_variants.weight, product_variants.metadata, product_variants.private_metadata, \
        (select p.price from products p where p.id = product_variants.product)";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            product: row.get(1),
            sku: row.get(2),
            name: row.get(3),
            price_override: row.get(4),
            cost_price: row.get(5),
            quantity: row.get(6),
            quantity_allocated: row.get(7),
            track_inventory: row.get(8),
            weight: row.get(9),
            metadata: row.get(10),
            private_metadata: row.get(11),
            product_price: row.get(12),
        }
    }
}

impl HasMetadata for ProductVariant {
    const TABLE: &'static str = "product_variants";
    const ID_KIND: [u8; 2] = Id::PRODUCT_VARIANT_KIND;
}

#[graphql_object(Context = Context)]
impl ProductVariant {
    fn id(&self) -> Id {
        Id::product_variant(self.key)
    }

    fn sku(&self) -> &str {
        &self.sku
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn product(&self, context: &Context) -> ApiResult<Product> {
        Product::require(self.product, "product", context).await
    }

    fn track_inventory(&self) -> bool {
        self.track_inventory
    }

    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn quantity_allocated(&self) -> i32 {
        self.quantity_allocated
    }

    /// Quantity that can still be sold.
    fn stock_quantity(&self) -> i32 {
        (self.quantity - self.quantity_allocated).max(0)
    }

    fn is_available(&self) -> bool {
        !self.track_inventory || self.quantity > self.quantity_allocated
    }

    fn price_override(&self, context: &Context) -> Option<Money> {
        self.price_override.map(|p| Money::new(p, context.config.general.currency.as_str()))
    }

    /// The price override or, if there is none, the product price.
    fn price(&self, context: &Context) -> Money {
        Money::new(self.unit_price(), context.config.general.currency.as_str())
    }

    fn cost_price(&self, context: &Context) -> Option<Money> {
        self.cost_price.map(|p| Money::new(p, context.config.general.currency.as_str()))
    }

    fn weight(&self) -> Option<f64> {
        self.weight.map(f64::from)
    }

    async fn attributes(&self, context: &Context) -> ApiResult<Vec<SelectedAttribute>> {
        let rows = AttributeValue::load_selected(
            context,
            "variant_attribute_values",
            "variant",
            self.key,
            true,
        ).await?;
        Ok(group_selected(rows))
    }

    async fn images(&self, context: &Context) -> ApiResult<Vec<ProductImage>> {
        ProductImage::of_variant(context, self.key).await
    }

    async fn digital_content(&self, context: &Context) -> ApiResult<Option<DigitalContent>> {
        if !context.auth.has_perm(Permission::ManageProducts) {
            return Ok(None);
        }
        DigitalContent::of_variant(context, self.key).await
    }

    fn meta(&self) -> Vec<MetaStore> {
        meta::stores(&self.metadata)
    }

    fn private_meta(&self, context: &Context) -> ApiResult<Vec<MetaStore>> {
        meta::private_stores(context, &self.private_metadata, Permission::ManageProducts)
    }

    async fn translation(
        &self,
        language_code: String,
        context: &Context,
    ) -> ApiResult<Option<NameTranslation>> {
        TRANSLATIONS.load(context, self.key, &language_code).await
    }

    async fn translated(&self, language_code: String, context: &Context) -> ApiResult<NameTranslation> {
        let t = TRANSLATIONS.load(context, self.key, &language_code).await?;
        Ok(NameTranslation::merged(t, language_code, &self.name))
    }
}

define_connection!(ProductVariantConnection, ProductVariantEdge, ProductVariant);

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct ProductVariantCreateInput {
    product: Id,
    sku: String,
    name: Option<String>,
    attributes: Vec<AttributeValueInput>,
    price_override: Option<f64>,
    cost_price: Option<f64>,
    quantity: Option<i32>,
    track_inventory: Option<bool>,
    weight: Option<f64>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct ProductVariantBulkCreateInput {
    sku: String,
    name: Option<String>,
    attributes: Vec<AttributeValueInput>,
    price_override: Option<f64>,
    cost_price: Option<f64>,
    quantity: Option<i32>,
    track_inventory: Option<bool>,
    weight: Option<f64>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct ProductVariantUpdateInput {
    sku: Option<String>,
    name: Option<String>,
    attributes: Option<Vec<AttributeValueInput>>,
    price_override: Option<f64>,
    cost_price: Option<f64>,
    quantity: Option<i32>,
    track_inventory: Option<bool>,
    weight: Option<f64>,
}

#[derive(GraphQLObject)]
#[graphql(context = Context)]
pub(crate) struct ProductVariantBulkResult {
    count: i32,
    product_variants: Vec<ProductVariant>,
}

/// The fields shared by all variant inputs.
struct Fields {
    sku: Option<String>,
    name: Option<String>,
    price_override: Option<f64>,
    cost_price: Option<f64>,
    quantity: Option<i32>,
    track_inventory: Option<bool>,
    weight: Option<f64>,
}

impl ProductVariantBulkCreateInput {
    fn into_parts(self) -> (Fields, Vec<AttributeValueInput>) {
        let fields = Fields {
            sku: Some(self.sku),
            name: self.name,
            price_override: self.price_override,
            cost_price: self.cost_price,
            quantity: self.quantity,
            track_inventory: self.track_inventory,
            weight: self.weight,
        };
        (fields, self.attributes)
    }
}

impl Fields {
    fn apply(self, values: &mut SqlAssignments) -> ApiResult<()> {
        if let Some(sku) = &self.sku {
            check_required(sku, 255, "sku")?;
        }
        if let Some(name) = &self.name {
            check_length(name, 255, "name")?;
        }
        if self.quantity.is_some_and(|q| q < 0) {
            return Err(invalid_input!(key = "invalid", "quantity must not be negative")
                .on_field("quantity"));
        }
        if let Some(weight) = self.weight {
            if weight < 0.0 {
                return Err(invalid_input!(key = "invalid", "weight must not be negative")
                    .on_field("weight"));
            }
            values.set("weight", weight as f32);
        }
        let price_override = self.price_override
            .map(|p| to_positive_decimal(p, "priceOverride"))
            .transpose()?;
        let cost_price = self.cost_price
            .map(|p| to_positive_decimal(p, "costPrice"))
            .transpose()?;
        values
            .set_some("sku", self.sku)
            .set_some("name", self.name)
            .set_some("price_override", price_override)
            .set_some("cost_price", cost_price)
            .set_some("quantity", self.quantity)
            .set_some("track_inventory", self.track_inventory);
        Ok(())
    }
}


impl ProductVariant {
    pub(crate) fn unit_price(&self) -> Decimal {
        self.price_override.unwrap_or(self.product_price)
    }

    pub(crate) fn product_key(&self) -> Key {
        self.product
    }

    pub(crate) fn display_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn sku_str(&self) -> &str {
        &self.sku
    }

    pub(crate) fn available_quantity(&self) -> Option<i32> {
        self.track_inventory.then(|| (self.quantity - self.quantity_allocated).max(0))
    }

    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::PRODUCT_VARIANT_KIND) else {
            return Ok(None);
        };
        shared::load_by_key(context, "product_variants", key, Self::visibility_filter(context).as_deref())
            .await
    }

    pub(crate) async fn require(key: Key, field: &'static str, context: &Context) -> ApiResult<Self> {
        shared::require_by_key(context, "product_variants", key, field).await
    }

    /// Variants of invisible products are hidden from actors who cannot see
    /// those products.
    fn visibility_filter(context: &Context) -> Option<String> {
        (!context.can_see_unpublished(Permission::ManageProducts)).then(|| format!(
            "exists (select 1 from products where products.id = product_variants.product and {})",
            shared::visibility_clause("products"),
        ))
    }

    pub(crate) async fn of_product(context: &Context, product: Key) -> ApiResult<Vec<Self>> {
        let query = format!(
            "select {} from product_variants where product = $1 order by sku, id",
            Self::SELECT,
        );
        context.db.query(&query, &[&product]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    pub(crate) async fn list(
        ids: Option<Vec<Id>>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<ProductVariantConnection> {
        let mut sql = SqlFilter::new();
        if let Some(ids) = &ids {
            let keys = Id::require_keys(ids, Id::PRODUCT_VARIANT_KIND, "ids")?;
            let p = sql.arg(keys);
            sql.and(format!("product_variants.id = any({p})"));
        }
        if let Some(visibility) = Self::visibility_filter(context) {
            sql.and(visibility);
        }
        let order = SortOrder { column: "product_variants.sku", direction: SortDirection::Ascending };
        load_connection(context, "product_variants", &sql, order, &pagination)
            .await
            .map(Into::into)
    }

    /// Checks that the product may have (more) variants and returns its type.
    async fn product_type_of(context: &Context, product: &Product) -> ApiResult<ProductType> {
        let product_type = ProductType::require(product.product_type_key(), "product", context).await?;
        if !product_type.has_variants() {
            return Err(invalid_input!(
                key = "invalid",
                "the product type of this product has no variants",
            ).on_field("product"));
        }
        Ok(product_type)
    }

    /// Inserts one variant with its attribute values, rejecting attribute
    /// combinations another variant of the product already has.
    async fn insert(
        context: &Context,
        product: Key,
        product_type: Key,
        fields: Fields,
        attributes: &[AttributeValueInput],
    ) -> ApiResult<Self> {
        let selected = Attribute::resolve_selection(context, product_type, true, attributes, "attributes")
            .await?;
        Self::check_unique_combination(context, product, None, &selected).await?;

        let mut values = SqlAssignments::new();
        values.set("product", product);
        fields.apply(&mut values)?;
        let variant = shared::insert_returning::<Self>(context, "product_variants", &values, UNIQUE_FIELDS)
            .await?;
        shared::link(context, "variant_attribute_values", "variant", variant.key, "attribute_value", &selected)
            .await?;
        Ok(variant)
    }

    async fn check_unique_combination(
        context: &Context,
        product: Key,
        except: Option<Key>,
        values: &[Key],
    ) -> ApiResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut sorted = values.to_vec();
        sorted.sort_unstable_by_key(|k| k.0);
        sorted.dedup();
        let row = context.db.query_one(
            "select exists ( \
                select 1 from product_variants v \
                where v.product = $1 and ($2::bigint is null or v.id <> $2) \
                    and array(select attribute_value from variant_attribute_values \
                        where variant = v.id order by attribute_value) = $3 \
            )",
            &[&product, &except, &sorted],
        ).await?;
        if row.get::<_, bool>(0) {
            return Err(invalid_input!(
                key = "unique",
                "another variant of this product has the same attribute values",
            ).on_field("attributes"));
        }
        Ok(())
    }

    pub(crate) async fn create(input: ProductVariantCreateInput, context: &Context) -> ApiResult<Self> {
        let product_key = input.product.require_key(Id::PRODUCT_KIND, "product")?;
        let product = Product::require(product_key, "product", context).await?;
        let product_type = Self::product_type_of(context, &product).await?;

        let fields = Fields {
            sku: Some(input.sku),
            name: input.name,
            price_override: input.price_override,
            cost_price: input.cost_price,
            quantity: input.quantity,
            track_inventory: input.track_inventory,
            weight: input.weight,
        };
        let variant = Self::insert(context, product_key, product_type.key, fields, &input.attributes)
            .await?;
        info!("Created variant '{}' of product {:?}", variant.sku, product_key);
        Ok(variant)
    }

    pub(crate) async fn bulk_create(
        product: Id,
        variants: Vec<ProductVariantBulkCreateInput>,
        context: &Context,
    ) -> ApiResult<ProductVariantBulkResult> {
        let product_key = product.require_key(Id::PRODUCT_KIND, "product")?;
        let product = Product::require(product_key, "product", context).await?;
        let product_type = Self::product_type_of(context, &product).await?;

        let mut skus = variants.iter().map(|v| &v.sku).collect::<Vec<_>>();
        skus.sort();
        if skus.windows(2).any(|w| w[0] == w[1]) {
            return Err(invalid_input!(key = "unique", "duplicated SKU in input").on_field("sku"));
        }

        let mut out = vec![];
        for input in variants {
            let (fields, attributes) = input.into_parts();
            out.push(Self::insert(context, product_key, product_type.key, fields, &attributes).await?);
        }

        info!("Created {} variants of product {:?}", out.len(), product_key);
        Ok(ProductVariantBulkResult {
            count: out.len().try_into().unwrap_or(i32::MAX),
            product_variants: out,
        })
    }

    pub(crate) async fn update(
        id: Id,
        input: ProductVariantUpdateInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_VARIANT_KIND, "id")?;
        let existing = Self::require(key, "id", context).await?;

        if let Some(attributes) = &input.attributes {
            let product = Product::require(existing.product, "id", context).await?;
            let selected = Attribute::resolve_selection(
                context,
                product.product_type_key(),
                true,
                attributes,
                "attributes",
            ).await?;
            Self::check_unique_combination(context, existing.product, Some(key), &selected).await?;
            context.db.execute("delete from variant_attribute_values where variant = $1", &[&key])
                .await?;
            shared::link(context, "variant_attribute_values", "variant", key, "attribute_value", &selected)
                .await?;
        }

        let fields = Fields {
            sku: input.sku,
            name: input.name,
            price_override: input.price_override,
            cost_price: input.cost_price,
            quantity: input.quantity,
            track_inventory: input.track_inventory,
            weight: input.weight,
        };
        let mut values = SqlAssignments::new();
        fields.apply(&mut values)?;
        shared::update_returning(context, "product_variants", key, &values, UNIQUE_FIELDS).await
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_VARIANT_KIND, "id")?;
        let variant = shared::delete_returning::<Self>(context, "product_variants", key).await?;
        info!("Deleted variant '{}' ({:?})", variant.sku, variant.key);
        Ok(variant)
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::PRODUCT_VARIANT_KIND, "ids")?;
        shared::bulk_delete(context, "product_variants", &keys, None).await
    }

    pub(crate) async fn translate(
        id: Id,
        language_code: String,
        input: NameTranslationInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_VARIANT_KIND, "id")?;
        let variant = Self::require(key, "id", context).await?;
        let values = input.into_assignments(255)?;
        TRANSLATIONS.upsert::<NameTranslation>(context, key, &language_code, values).await?;
        Ok(variant)
    }

    /// Links an image of the variant's product to the variant.
    pub(crate) async fn image_assign(image_id: Id, variant_id: Id, context: &Context) -> ApiResult<Self> {
        let (variant, image) = Self::variant_and_image(image_id, variant_id, context).await?;
        shared::link(context, "variant_images", "variant", variant.key, "image", &[image]).await?;
        Ok(variant)
    }

    pub(crate) async fn image_unassign(image_id: Id, variant_id: Id, context: &Context) -> ApiResult<Self> {
        let (variant, image) = Self::variant_and_image(image_id, variant_id, context).await?;
        let n = context.db.execute(
            "delete from variant_images where variant = $1 and image = $2",
            &[&variant.key, &image],
        ).await?;
        if n == 0 {
            return Err(invalid_input!(
                key = "not-found",
                "image is not assigned to this variant",
            ).on_field("imageId"));
        }
        Ok(variant)
    }

    async fn variant_and_image(
        image_id: Id,
        variant_id: Id,
        context: &Context,
    ) -> ApiResult<(Self, Key)> {
        let image_key = image_id.require_key(Id::PRODUCT_IMAGE_KIND, "imageId")?;
        let variant_key = variant_id.require_key(Id::PRODUCT_VARIANT_KIND, "variantId")?;
        let variant = Self::require(variant_key, "variantId", context).await?;
        let image = ProductImage::require(image_key, "imageId", context).await?;
        if image.product_key() != variant.product {
            return Err(invalid_input!(
                key = "invalid",
                "the image belongs to a different product",
            ).on_field("imageId"));
        }
        Ok((variant, image_key))
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::{db::util::SqlAssignments, model::Key};
    use super::{Fields, ProductVariant};

    fn variant(price_override: Option<Decimal>, quantity: i32, allocated: i32, track: bool) -> ProductVariant {
        ProductVariant {
            key: Key(1),
            product: Key(2),
            sku: "SKU".into(),
            name: "M".into(),
            price_override,
            cost_price: None,
            quantity,
            quantity_allocated: allocated,
            track_inventory: track,
            weight: None,
            metadata: json!({}),
            private_metadata: json!({}),
            product_price: Decimal::new(10, 0),
        }
    }

    fn fields() -> Fields {
        Fields {
            sku: None,
            name: None,
            price_override: None,
            cost_price: None,
            quantity: None,
            track_inventory: None,
            weight: None,
        }
    }

    #[test]
    fn price_falls_back_to_product() {
        assert_eq!(variant(None, 0, 0, true).unit_price(), Decimal::new(10, 0));
        assert_eq!(variant(Some(Decimal::new(7, 0)), 0, 0, true).unit_price(), Decimal::new(7, 0));
    }

    #[test]
    fn availability() {
        assert!(variant(None, 5, 2, true).is_available());
        assert!(!variant(None, 2, 2, true).is_available());
        assert!(variant(None, 0, 0, false).is_available());
        assert_eq!(variant(None, 1, 3, true).stock_quantity(), 0);
        assert_eq!(variant(None, 1, 3, true).available_quantity(), Some(0));
        assert_eq!(variant(None, 1, 3, false).available_quantity(), None);
    }

    #[test]
    fn field_validation() {
        let mut f = fields();
        f.quantity = Some(-2);
        assert_eq!(f.apply(&mut SqlAssignments::new()).unwrap_err().field, Some("quantity"));

        let mut f = fields();
        f.price_override = Some(-1.0);
        assert_eq!(f.apply(&mut SqlAssignments::new()).unwrap_err().field, Some("priceOverride"));

        let mut f = fields();
        f.sku = Some(String::new());
        assert_eq!(f.apply(&mut SqlAssignments::new()).unwrap_err().field, Some("sku"));

        let mut f = fields();
        f.cost_price = Some(3.5);
        let mut values = SqlAssignments::new();
        f.apply(&mut values).unwrap();
        assert!(values.contains("cost_price"));
        assert!(!values.contains("sku"));
    }
}
