//! The catalogue: products with their variants and images, and everything
//! used to organize them.

use juniper::{GraphQLEnum, GraphQLInputObject, GraphQLObject};
use serde_json::Value;
use tokio_postgres::Row;

use crate::{
    api::{
        Id, JsonString,
        err::ApiResult,
        model::{shared::{check_length, sanitized, Seo}, translation},
    },
    db::util::{FromDb, SqlAssignments},
    model::ordering::Move,
};

mod attribute;
mod category;
mod collection;
mod digital_content;
mod image;
mod product;
mod product_type;
mod report;
mod variant;

pub(crate) use self::{
    attribute::{
        Attribute, AttributeAssignInput, AttributeConnection, AttributeCreateInput,
        AttributeFilterInput, AttributeSortingInput, AttributeUpdateInput, AttributeValue,
        AttributeValueCreateInput, AttributeValueInput, NameTranslation, NameTranslationInput,
    },
    category::{
        Category, CategoryConnection, CategoryFilterInput, CategoryInput, CategorySortingInput,
    },
    collection::{
        Collection, CollectionConnection, CollectionFilterInput, CollectionInput,
        CollectionSortingInput, MoveProductInput,
    },
    digital_content::{
        DigitalContent, DigitalContentConnection, DigitalContentInput, DigitalContentUrl,
        DigitalContentUrlCreateInput,
    },
    image::{ProductImage, ProductImageCreateInput, ProductImageUpdateInput},
    product::{Product, ProductConnection, ProductFilterInput, ProductInput, ProductOrder},
    product_type::{
        ProductType, ProductTypeConnection, ProductTypeFilterInput, ProductTypeInput,
        ProductTypeSortingInput,
    },
    report::{product_sales, ProductSalesConnection},
    variant::{
        ProductVariant, ProductVariantBulkCreateInput, ProductVariantBulkResult,
        ProductVariantConnection, ProductVariantCreateInput, ProductVariantUpdateInput,
    },
};

/// Default order of products when listed as part of something else.
pub(crate) type ProductSortingInput = ProductOrder;


#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum StockAvailability {
    InStock,
    OutOfStock,
}

/// SQL condition for products with (or without) a variant that can be sold.
fn stock_condition(availability: StockAvailability) -> String {
    let in_stock = "exists (select 1 from product_variants v \
        where v.product = products.id \
            and (not v.track_inventory or v.quantity > v.quantity_allocated))";
    match availability {
        StockAvailability::InStock => format!("({in_stock})"),
        StockAvailability::OutOfStock => format!("(not {in_stock})"),
    }
}

/// Whether an attribute is assigned to the products or the variants of a
/// product type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum AttributeTypeEnum {
    Product,
    Variant,
}

impl AttributeTypeEnum {
    fn is_variant(self) -> bool {
        self == Self::Variant
    }
}

/// Moves an item of a sorted list by `sortOrder` positions.
#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct ReorderInput {
    id: Id,
    /// Relative shift. Negative values move the item to the front.
    sort_order: Option<i32>,
}

fn to_moves(inputs: &[ReorderInput], kind: [u8; 2], field: &'static str) -> ApiResult<Vec<Move>> {
    inputs.iter()
        .map(|m| Ok(Move {
            key: m.id.require_key(kind, field)?,
            shift: m.sort_order.unwrap_or(0),
        }))
        .collect()
}

/// An image URL with its alternative text.
#[derive(Debug, Clone, GraphQLObject)]
pub(crate) struct Image {
    url: String,
    alt: String,
}

impl Image {
    fn new(url: Option<String>, alt: String) -> Option<Self> {
        url.map(|url| Self { url, alt })
    }
}

/// Attribute of a product or variant with the values that are selected.
#[derive(GraphQLObject)]
#[graphql(context = crate::api::Context)]
pub(crate) struct SelectedAttribute {
    attribute: Attribute,
    values: Vec<AttributeValue>,
}

/// Groups values (sorted by attribute) into `SelectedAttribute`s.
fn group_selected(rows: Vec<(Attribute, AttributeValue)>) -> Vec<SelectedAttribute> {
    let mut out: Vec<SelectedAttribute> = vec![];
    for (attribute, value) in rows {
        match out.last_mut() {
            Some(last) if last.attribute.key == attribute.key => last.values.push(value),
            _ => out.push(SelectedAttribute { attribute, values: vec![value] }),
        }
    }
    out
}

/// Parses `slug:value` strings as used by the deprecated `attributes`
/// argument of `products`.
fn parse_attribute_pairs(pairs: &[String]) -> ApiResult<Vec<(String, Vec<String>)>> {
    let mut out: Vec<(String, Vec<String>)> = vec![];
    for pair in pairs {
        let Some((slug, value)) = pair.split_once(':') else {
            return Err(crate::api::err::invalid_input!(
                key = "invalid",
                "'{pair}' is not of the form 'attribute-slug:value-slug'",
            ).on_field("attributes"));
        };
        match out.iter_mut().find(|(s, _)| s == slug) {
            Some((_, values)) => values.push(value.to_owned()),
            None => out.push((slug.to_owned(), vec![value.to_owned()])),
        }
    }
    Ok(out)
}

/// Translated fields of a category, collection or product.
#[derive(Debug, GraphQLObject)]
pub(crate) struct CatalogueTranslation {
    language_code: String,
    name: String,
    description: String,
    description_json: JsonString,
    seo: Seo,
}

/// The untranslated values of the fields in `CatalogueTranslation`.
struct Original<'a> {
    name: &'a str,
    description: &'a str,
    description_json: &'a Value,
    seo_title: Option<&'a str>,
    seo_description: Option<&'a str>,
}

// Only ever selected from one translation table at a time, so the columns
// are not qualified.
impl FromDb for CatalogueTranslation {
    const SELECT: &'static str = "language_code, name, description, description_json, \
        seo_title, seo_description";

    fn from_row_start(row: &Row) -> Self {
        Self {
            language_code: row.get(0),
            name: row.get(1),
            description: row.get(2),
            description_json: JsonString(row.get(3)),
            seo: Seo {
                title: row.get(4),
                description: row.get(5),
            },
        }
    }
}

impl CatalogueTranslation {
    /// The translation `t` with every missing field taken from `original`.
    fn merged(t: Option<Self>, language_code: String, original: Original<'_>) -> Self {
        let t = t.as_ref();
        Self {
            name: translation::or_original(t.map(|t| &*t.name), original.name),
            description: translation::or_original(
                t.map(|t| &*t.description),
                original.description,
            ),
            description_json: JsonString(translation::or_original_json(
                t.map(|t| &t.description_json.0),
                original.description_json,
            )),
            seo: Seo {
                title: translation::or_original_opt(
                    t.and_then(|t| t.seo.title.as_deref()),
                    original.seo_title,
                ),
                description: translation::or_original_opt(
                    t.and_then(|t| t.seo.description.as_deref()),
                    original.seo_description,
                ),
            },
            language_code,
        }
    }
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct CatalogueTranslationInput {
    name: Option<String>,
    description: Option<String>,
    description_json: Option<JsonString>,
    seo_title: Option<String>,
    seo_description: Option<String>,
}

impl CatalogueTranslationInput {
    /// Validates the input and turns it into assignments for a translation
    /// table. `max_name` is the length of its `name` column.
    fn into_assignments(self, max_name: usize) -> ApiResult<SqlAssignments> {
        if let Some(name) = &self.name {
            check_length(name, max_name, "name")?;
        }
        if let Some(seo_title) = &self.seo_title {
            check_length(seo_title, 70, "seoTitle")?;
        }
        if let Some(seo_description) = &self.seo_description {
            check_length(seo_description, 300, "seoDescription")?;
        }

        let mut values = SqlAssignments::new();
        values
            .set_some("name", self.name)
            .set_some("description", self.description)
            .set_some("description_json", self.description_json.map(sanitized))
            .set_some("seo_title", self.seo_title)
            .set_some("seo_description", self.seo_description);
        Ok(values)
    }
}

/// Keys of all categories in the subtrees rooted at `roots`, as SQL
/// subquery. `p` is the placeholder of the `bigint[]` of roots.
fn category_tree_query(p: &str) -> String {
    format!(
        "with recursive tree(id) as ( \
            select id from categories where id = any({p}) \
            union select c.id from categories c join tree on c.parent = tree.id \
        ) select id from tree"
    )
}


#[cfg(test)]
mod tests {
    use crate::{api::Id, model::Key};
    use super::{parse_attribute_pairs, stock_condition, to_moves, ReorderInput, StockAvailability};

    #[test]
    fn attribute_pairs() {
        let pairs = ["color:red", "color:blue", "size:xl"].map(String::from);
        assert_eq!(parse_attribute_pairs(&pairs).unwrap(), vec![
            ("color".to_owned(), vec!["red".to_owned(), "blue".to_owned()]),
            ("size".to_owned(), vec!["xl".to_owned()]),
        ]);
        assert_eq!(
            parse_attribute_pairs(&["color".into()]).unwrap_err().field,
            Some("attributes"),
        );
    }

    #[test]
    fn stock() {
        assert!(stock_condition(StockAvailability::OutOfStock).starts_with("(not exists"));
        assert!(stock_condition(StockAvailability::InStock).starts_with("(exists"));
    }

    #[test]
    fn moves() {
        let inputs = [
            ReorderInput { id: Id::product_image(Key(3)), sort_order: Some(-1) },
            ReorderInput { id: Id::product_image(Key(4)), sort_order: None },
        ];
        let moves = to_moves(&inputs, Id::PRODUCT_IMAGE_KIND, "moves").unwrap();
        assert_eq!((moves[0].key, moves[0].shift), (Key(3), -1));
        assert_eq!(moves[1].shift, 0);
        assert!(to_moves(&inputs, Id::ATTRIBUTE_VALUE_KIND, "moves").is_err());
    }
}
