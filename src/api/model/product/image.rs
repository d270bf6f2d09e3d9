use juniper::{graphql_object, GraphQLInputObject};
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Id,
        err::ApiResult,
        model::shared::{self, check_length, check_required, reorder_error, OrderScope},
    },
    db::util::{dbargs, FromDb, SqlAssignments},
    model::{ordering, Key},
    prelude::*,
};
use super::{Image, Product};


pub(crate) struct ProductImage {
    pub(crate) key: Key,
    product: Key,
    image: String,
    alt: String,
    sort_order: i32,
}

impl FromDb for ProductImage {
    const SELECT: &'static str = "product_images.id, product_images.product, \
        product_images.image, product_images.alt, product_images.sort_order";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            product: row.get(1),
            image: row.get(2),
            alt: row.get(3),
            sort_order: row.get(4),
        }
    }
}

#[graphql_object(Context = Context)]
impl ProductImage {
    fn id(&self) -> Id {
        Id::product_image(self.key)
    }

    fn url(&self) -> &str {
        &self.image
    }

    fn alt(&self) -> &str {
        &self.alt
    }

    fn sort_order(&self) -> i32 {
        self.sort_order
    }
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct ProductImageCreateInput {
    product: Id,
    /// URL of the already uploaded image.
    image: String,
    alt: Option<String>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct ProductImageUpdateInput {
    alt: Option<String>,
}


impl ProductImage {
    pub(crate) fn product_key(&self) -> Key {
        self.product
    }

    pub(crate) fn into_image(self) -> Option<Image> {
        Image::new(Some(self.image), self.alt)
    }

    pub(crate) async fn of_product(context: &Context, product: Key) -> ApiResult<Vec<Self>> {
        let query = format!(
            "select {} from product_images where product = $1 order by sort_order, id",
            Self::SELECT,
        );
        context.db.query(&query, &[&product]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    pub(crate) async fn of_variant(context: &Context, variant: Key) -> ApiResult<Vec<Self>> {
        let query = format!(
            "select {} from product_images \
                join variant_images vi on vi.image = product_images.id \
                where vi.variant = $1 \
                order by product_images.sort_order, product_images.id",
            Self::SELECT,
        );
        context.db.query(&query, &[&variant]).await?
            .iter()
            .map(Self::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    pub(crate) async fn require(key: Key, field: &'static str, context: &Context) -> ApiResult<Self> {
        shared::require_by_key(context, "product_images", key, field).await
    }

    /// Appends an image to the product's images.
    pub(crate) async fn create(input: ProductImageCreateInput, context: &Context) -> ApiResult<Self> {
        let product = input.product.require_key(Id::PRODUCT_KIND, "product")?;
        Product::require(product, "product", context).await?;
        check_required(&input.image, usize::MAX, "image")?;
        if let Some(alt) = &input.alt {
            check_length(alt, 128, "alt")?;
        }

        let mut values = SqlAssignments::new();
        values
            .set("product", product)
            .set("image", input.image)
            .set_some("alt", input.alt)
            .set_expr("sort_order", "coalesce((select max(sort_order) + 1 from product_images \
                where product = $1), 0)");
        let image = shared::insert_returning::<Self>(context, "product_images", &values, &[]).await?;
        debug!("Added image {:?} to product {:?}", image.key, product);
        Ok(image)
    }

    pub(crate) async fn update(
        id: Id,
        input: ProductImageUpdateInput,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_IMAGE_KIND, "id")?;
        if let Some(alt) = &input.alt {
            check_length(alt, 128, "alt")?;
        }
        let mut values = SqlAssignments::new();
        values.set_some("alt", input.alt);
        shared::update_returning(context, "product_images", key, &values, &[]).await
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_IMAGE_KIND, "id")?;
        shared::delete_returning(context, "product_images", key).await
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::PRODUCT_IMAGE_KIND, "ids")?;
        shared::bulk_delete(context, "product_images", &keys, None).await
    }

    /// Puts the given images first, in the given order. Images not listed
    /// keep their relative order after them.
    pub(crate) async fn reorder(
        product_id: Id,
        images_ids: Vec<Id>,
        context: &Context,
    ) -> ApiResult<Product> {
        let product_key = product_id.require_key(Id::PRODUCT_KIND, "productId")?;
        let new_order = Id::require_keys(&images_ids, Id::PRODUCT_IMAGE_KIND, "imagesIds")?;
        let product = Product::require(product_key, "productId", context).await?;

        let args = dbargs![&product_key];
        let scope = OrderScope {
            table: "product_images",
            item_col: "id",
            condition: &|p| format!("product = ${p}"),
            args: &args,
        };
        let items = ordering::put_first(scope.load(context).await?, &new_order)
            .map_err(|e| reorder_error(e, "imagesIds"))?;
        scope.save(context, &items).await?;
        Ok(product)
    }
}
