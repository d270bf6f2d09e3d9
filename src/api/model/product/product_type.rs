use juniper::{graphql_object, GraphQLEnum, GraphQLInputObject};
use serde_json::Value;
use tokio_postgres::Row;

use crate::{
    api::{
        BulkResult, Context, Cursor, Id,
        err::{invalid_input, ApiResult},
        model::{
            meta::{self, HasMetadata, MetaStore},
            shared::{
                self, define_connection, define_sort_field_and_input, load_connection,
                check_required, OrderScope, PaginationArgs,
            },
        },
    },
    auth::Permission,
    db::util::{dbargs, FromDb, SqlAssignments, SqlFilter},
    model::Key,
    prelude::*,
};
use super::{to_moves, Attribute, AttributeTypeEnum, Product, ProductConnection, ProductOrder, ReorderInput};


/// Defines which attributes products (and their variants) have, and whether
/// they are shipped.
pub(crate) struct ProductType {
    pub(crate) key: Key,
    name: String,
    has_variants: bool,
    is_shipping_required: bool,
    is_digital: bool,
    weight: Option<f32>,
    metadata: Value,
    private_metadata: Value,
}

impl FromDb for ProductType {
    const SELECT: &'static str = "product_types.id, product_types.name, \
        product_types.has_variants, product_types.is_shipping_required, \
        product_types.is_digital, product_types.weight, product_types.metadata, \
        product_types.private_metadata";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            name: row.get(1),
            has_variants: row.get(2),
            is_shipping_required: row.get(3),
            is_digital: row.get(4),
            weight: row.get(5),
            metadata: row.get(6),
            private_metadata: row.get(7),
        }
    }
}

impl HasMetadata for ProductType {
    const TABLE: &'static str = "product_types";
    const ID_KIND: [u8; 2] = Id::PRODUCT_TYPE_KIND;
}

#[graphql_object(Context = Context)]
impl ProductType {
    fn id(&self) -> Id {
        Id::product_type(self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn has_variants(&self) -> bool {
        self.has_variants
    }

    fn is_shipping_required(&self) -> bool {
        self.is_shipping_required
    }

    fn is_digital(&self) -> bool {
        self.is_digital
    }

    fn weight(&self) -> Option<f64> {
        self.weight.map(f64::from)
    }

    async fn product_attributes(&self, context: &Context) -> ApiResult<Vec<Attribute>> {
        self.attributes(context, false).await
    }

    async fn variant_attributes(&self, context: &Context) -> ApiResult<Vec<Attribute>> {
        self.attributes(context, true).await
    }

    async fn products(
        &self,
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<ProductConnection> {
        let mut sql = SqlFilter::new();
        sql.eq("products.product_type", self.key);
        let pagination = PaginationArgs::new(first, after, last, before);
        Product::list_filtered(sql, ProductOrder::default(), pagination, context).await
    }

    fn meta(&self) -> Vec<MetaStore> {
        meta::stores(&self.metadata)
    }

    fn private_meta(&self, context: &Context) -> ApiResult<Vec<MetaStore>> {
        meta::private_stores(context, &self.private_metadata, Permission::ManageProducts)
    }
}

define_connection!(ProductTypeConnection, ProductTypeEdge, ProductType);

define_sort_field_and_input!(
    pub(crate) enum ProductTypeSortField {
        #[default]
        Name => "product_types.name",
        Digital => "product_types.is_digital",
        ShippingRequired => "product_types.is_shipping_required",
    };
    pub(crate) struct ProductTypeSortingInput, default direction Ascending;
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum ProductTypeConfigurable {
    Configurable,
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum ProductTypeEnum {
    Digital,
    Shippable,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct ProductTypeFilterInput {
    search: Option<String>,
    configurable: Option<ProductTypeConfigurable>,
    product_type: Option<ProductTypeEnum>,
    ids: Option<Vec<Id>>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct ProductTypeInput {
    name: Option<String>,
    has_variants: Option<bool>,
    product_attributes: Option<Vec<Id>>,
    variant_attributes: Option<Vec<Id>>,
    is_shipping_required: Option<bool>,
    is_digital: Option<bool>,
    weight: Option<f64>,
}


impl ProductType {
    async fn attributes(&self, context: &Context, variant: bool) -> ApiResult<Vec<Attribute>> {
        let query = format!(
            "select {} from attributes \
                join product_type_attributes pta on pta.attribute = attributes.id \
                where pta.product_type = $1 and pta.variant_attribute = $2 \
                order by pta.sort_order, attributes.id",
            Attribute::SELECT,
        );
        context.db.query(&query, &[&self.key, &variant]).await?
            .iter()
            .map(Attribute::from_row_start)
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    pub(crate) async fn load(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::PRODUCT_TYPE_KIND) else {
            return Ok(None);
        };
        shared::load_by_key(context, "product_types", key, None).await
    }

    pub(crate) async fn require(key: Key, field: &'static str, context: &Context) -> ApiResult<Self> {
        shared::require_by_key(context, "product_types", key, field).await
    }

    pub(crate) async fn list(
        query: Option<String>,
        filter: Option<ProductTypeFilterInput>,
        sort_by: Option<ProductTypeSortingInput>,
        pagination: PaginationArgs,
        context: &Context,
    ) -> ApiResult<ProductTypeConnection> {
        let search = ["product_types.name"];
        let mut sql = SqlFilter::new();
        if let Some(query) = &query {
            sql.search(&search, query);
        }
        if let Some(filter) = filter {
            if let Some(needle) = &filter.search {
                sql.search(&search, needle);
            }
            if let Some(configurable) = filter.configurable {
                sql.eq(
                    "product_types.has_variants",
                    configurable == ProductTypeConfigurable::Configurable,
                );
            }
            match filter.product_type {
                Some(ProductTypeEnum::Digital) => { sql.eq("product_types.is_digital", true); }
                Some(ProductTypeEnum::Shippable) => {
                    sql.eq("product_types.is_shipping_required", true);
                }
                None => {}
            }
            if let Some(ids) = &filter.ids {
                let keys = Id::require_keys(ids, Id::PRODUCT_TYPE_KIND, "ids")?;
                let p = sql.arg(keys);
                sql.and(format!("product_types.id = any({p})"));
            }
        }

        load_connection(context, "product_types", &sql, sort_by.unwrap_or_default(), &pagination)
            .await
            .map(Into::into)
    }

    pub(crate) async fn create(input: ProductTypeInput, context: &Context) -> ApiResult<Self> {
        let Some(name) = &input.name else {
            return Err(invalid_input!(key = "required", "a name is required").on_field("name"));
        };
        check_required(name, 250, "name")?;

        let mut values = SqlAssignments::new();
        let attributes = Self::apply_input(input, &mut values)?;
        let product_type = shared::insert_returning::<Self>(context, "product_types", &values, &[])
            .await?;
        Self::set_attributes(context, product_type.key, attributes).await?;

        info!("Created product type '{}' ({:?})", product_type.name, product_type.key);
        Ok(product_type)
    }

    pub(crate) async fn update(id: Id, input: ProductTypeInput, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_TYPE_KIND, "id")?;
        if let Some(name) = &input.name {
            check_required(name, 250, "name")?;
        }
        let mut values = SqlAssignments::new();
        let attributes = Self::apply_input(input, &mut values)?;
        let product_type = shared::update_returning::<Self>(context, "product_types", key, &values, &[])
            .await?;
        Self::set_attributes(context, key, attributes).await?;
        Ok(product_type)
    }

    /// Returns the attribute lists to set, if given.
    fn apply_input(
        input: ProductTypeInput,
        values: &mut SqlAssignments,
    ) -> ApiResult<[(bool, Option<Vec<Key>>); 2]> {
        if let Some(weight) = input.weight {
            if weight < 0.0 {
                return Err(invalid_input!(key = "invalid", "weight must not be negative")
                    .on_field("weight"));
            }
            values.set("weight", weight as f32);
        }
        values
            .set_some("name", input.name)
            .set_some("has_variants", input.has_variants)
            .set_some("is_shipping_required", input.is_shipping_required)
            .set_some("is_digital", input.is_digital);

        let product = input.product_attributes
            .map(|ids| Id::require_keys(&ids, Id::ATTRIBUTE_KIND, "productAttributes"))
            .transpose()?;
        let variant = input.variant_attributes
            .map(|ids| Id::require_keys(&ids, Id::ATTRIBUTE_KIND, "variantAttributes"))
            .transpose()?;
        if let (Some(p), Some(v)) = (&product, &variant) {
            if p.iter().any(|key| v.contains(key)) {
                return Err(invalid_input!(
                    key = "invalid",
                    "an attribute cannot be both a product and a variant attribute",
                ).on_field("variantAttributes"));
            }
        }
        Ok([(false, product), (true, variant)])
    }

    /// Replaces the product or variant attribute lists, in the given order.
    async fn set_attributes(
        context: &Context,
        key: Key,
        lists: [(bool, Option<Vec<Key>>); 2],
    ) -> ApiResult<()> {
        for (variant, list) in lists {
            let Some(list) = list else { continue };
            context.db.execute(
                "delete from product_type_attributes \
                    where product_type = $1 and variant_attribute = $2",
                &[&key, &variant],
            ).await?;
            context.db.execute(
                "insert into product_type_attributes \
                    (product_type, attribute, variant_attribute, sort_order) \
                    select $1, a, $2, (pos - 1)::int \
                    from unnest($3::bigint[]) with ordinality as t(a, pos) \
                    on conflict do nothing",
                &[&key, &variant, &list],
            ).await.map_err(|e| {
                let field = if variant { "variantAttributes" } else { "productAttributes" };
                crate::api::err::constraint_violation(e, &[]).on_field(field)
            })?;
        }
        Ok(())
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Self> {
        let key = id.require_key(Id::PRODUCT_TYPE_KIND, "id")?;
        let product_type = shared::delete_returning::<Self>(context, "product_types", key).await?;
        info!("Deleted product type '{}' ({:?})", product_type.name, product_type.key);
        Ok(product_type)
    }

    pub(crate) async fn bulk_delete(ids: Vec<Id>, context: &Context) -> ApiResult<BulkResult> {
        let keys = Id::require_keys(&ids, Id::PRODUCT_TYPE_KIND, "ids")?;
        shared::bulk_delete(context, "product_types", &keys, None).await
    }

    pub(crate) async fn reorder_attributes(
        product_type_id: Id,
        attribute_type: AttributeTypeEnum,
        moves: Vec<ReorderInput>,
        context: &Context,
    ) -> ApiResult<Self> {
        let key = product_type_id.require_key(Id::PRODUCT_TYPE_KIND, "productTypeId")?;
        let moves = to_moves(&moves, Id::ATTRIBUTE_KIND, "moves")?;
        let product_type = Self::require(key, "productTypeId", context).await?;

        let variant = attribute_type.is_variant();
        let scope = OrderScope {
            table: "product_type_attributes",
            item_col: "attribute",
            condition: &|p| format!("product_type = ${p} and variant_attribute = ${}", p + 1),
            args: &dbargs![&key, &variant],
        };
        scope.apply_moves(context, &moves, "moves").await?;
        Ok(product_type)
    }
}


#[cfg(test)]
mod tests {
    use crate::{api::Id, db::util::SqlAssignments, model::Key};
    use super::{ProductType, ProductTypeInput};

    fn input() -> ProductTypeInput {
        ProductTypeInput {
            name: Some("Shirt".into()),
            has_variants: Some(true),
            product_attributes: None,
            variant_attributes: None,
            is_shipping_required: None,
            is_digital: None,
            weight: None,
        }
    }

    #[test]
    fn attribute_lists() {
        let mut i = input();
        i.product_attributes = Some(vec![Id::attribute(Key(1)), Id::attribute(Key(2))]);
        let mut values = SqlAssignments::new();
        let [(false, product), (true, variant)] = ProductType::apply_input(i, &mut values).unwrap()
        else { panic!("unexpected order") };
        assert_eq!(product, Some(vec![Key(1), Key(2)]));
        assert_eq!(variant, None);
        assert!(values.contains("has_variants"));
    }

    #[test]
    fn attribute_in_both_lists() {
        let mut i = input();
        i.product_attributes = Some(vec![Id::attribute(Key(1))]);
        i.variant_attributes = Some(vec![Id::attribute(Key(1))]);
        let err = ProductType::apply_input(i, &mut SqlAssignments::new()).unwrap_err();
        assert_eq!(err.field, Some("variantAttributes"));
    }

    #[test]
    fn negative_weight() {
        let mut i = input();
        i.weight = Some(-0.5);
        let err = ProductType::apply_input(i, &mut SqlAssignments::new()).unwrap_err();
        assert_eq!(err.field, Some("weight"));
    }
}
