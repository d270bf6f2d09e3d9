//! The field registry: every root query and mutation field with its domain,
//! arguments and access requirement.
//!
//! The `Query` and `Mutation` objects bind the resolvers, while this registry
//! is the single source of truth for who may call what. Each resolver starts
//! with `context.gate("fieldName")?`, which checks the entry here. At startup
//! (and in tests), `verify` makes sure registry and executable schema agree.

use std::collections::{HashMap, BTreeSet};

use juniper::meta::MetaType;
use once_cell::sync::Lazy;

use crate::{
    auth::{Access, Permission, Requirement},
    prelude::*,
};
use super::RootNode;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Domain {
    Account,
    Discount,
    Order,
    Page,
    Product,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Query,
    Mutation,
}

#[derive(Debug)]
pub(crate) struct Field {
    pub(crate) name: &'static str,
    pub(crate) domain: Domain,
    pub(crate) kind: FieldKind,
    pub(crate) args: &'static [&'static str],
    pub(crate) access: Access,
}


const PUBLIC: Access = Access::Public;
const LOGGED_IN: Access = Access::LoggedIn;
const MANAGE_DISCOUNTS: Access
    = Access::Permissions(Requirement::AllOf(&[Permission::ManageDiscounts]));
const MANAGE_ORDERS: Access
    = Access::Permissions(Requirement::AllOf(&[Permission::ManageOrders]));
const MANAGE_PAGES: Access
    = Access::Permissions(Requirement::AllOf(&[Permission::ManagePages]));
const MANAGE_PRODUCTS: Access
    = Access::Permissions(Requirement::AllOf(&[Permission::ManageProducts]));
const MANAGE_TRANSLATIONS: Access
    = Access::Permissions(Requirement::AllOf(&[Permission::ManageTranslations]));
const MANAGE_USERS: Access
    = Access::Permissions(Requirement::AllOf(&[Permission::ManageUsers]));
const MANAGE_STAFF: Access
    = Access::Permissions(Requirement::AllOf(&[Permission::ManageStaff]));
const MANAGE_SERVICE_ACCOUNTS: Access
    = Access::Permissions(Requirement::AllOf(&[Permission::ManageServiceAccounts]));
const MANAGE_STAFF_OR_USERS: Access = Access::Permissions(
    Requirement::AnyOf(&[Permission::ManageStaff, Permission::ManageUsers]),
);
const MANAGE_ORDERS_AND_PRODUCTS: Access = Access::Permissions(
    Requirement::AllOf(&[Permission::ManageOrders, Permission::ManageProducts]),
);


/// Declares `FIELDS`. Argument names are the GraphQL (camelCase) names.
macro_rules! fields {
    ($(
        $domain:ident {
            $( $kind:ident $name:ident ( $($arg:ident),* ) => $access:expr ; )*
        }
    )*) => {
        static FIELDS: &[Field] = &[$($(
            Field {
                name: stringify!($name),
                domain: Domain::$domain,
                kind: FieldKind::$kind,
                args: &[$(stringify!($arg)),*],
                access: $access,
            },
        )*)*];
    };
}

fields! {
    Account {
        Query me() => LOGGED_IN;
        Query user(id) => MANAGE_STAFF_OR_USERS;
        Query customers(query, sortBy, first, after, last, before) => MANAGE_USERS;
        Query staffUsers(query, sortBy, first, after, last, before) => MANAGE_STAFF;
        Query serviceAccounts(sortBy, first, after, last, before) => MANAGE_SERVICE_ACCOUNTS;
    }

    Discount {
        Query sale(id) => MANAGE_DISCOUNTS;
        Query sales(query, filter, sortBy, first, after, last, before) => MANAGE_DISCOUNTS;
        Query voucher(id) => MANAGE_DISCOUNTS;
        Query vouchers(query, filter, sortBy, first, after, last, before) => MANAGE_DISCOUNTS;

        Mutation saleCreate(input) => MANAGE_DISCOUNTS;
        Mutation saleDelete(id) => MANAGE_DISCOUNTS;
        Mutation saleBulkDelete(ids) => MANAGE_DISCOUNTS;
        Mutation saleUpdate(id, input) => MANAGE_DISCOUNTS;
        Mutation saleCataloguesAdd(id, input) => MANAGE_DISCOUNTS;
        Mutation saleCataloguesRemove(id, input) => MANAGE_DISCOUNTS;
        Mutation saleTranslate(id, languageCode, input) => MANAGE_TRANSLATIONS;
        Mutation voucherCreate(input) => MANAGE_DISCOUNTS;
        Mutation voucherDelete(id) => MANAGE_DISCOUNTS;
        Mutation voucherBulkDelete(ids) => MANAGE_DISCOUNTS;
        Mutation voucherUpdate(id, input) => MANAGE_DISCOUNTS;
        Mutation voucherCataloguesAdd(id, input) => MANAGE_DISCOUNTS;
        Mutation voucherCataloguesRemove(id, input) => MANAGE_DISCOUNTS;
        Mutation voucherTranslate(id, languageCode, input) => MANAGE_TRANSLATIONS;
    }

    Order {
        Query homepageEvents(first, after, last, before) => MANAGE_ORDERS;
        Query order(id) => LOGGED_IN;
        Query orders(query, filter, sortBy, created, status, first, after, last, before)
            => MANAGE_ORDERS;
        Query draftOrders(query, filter, sortBy, created, first, after, last, before)
            => MANAGE_ORDERS;
        Query ordersTotal(period) => MANAGE_ORDERS;
        Query orderByToken(token) => PUBLIC;

        Mutation draftOrderComplete(id) => MANAGE_ORDERS;
        Mutation draftOrderCreate(input) => MANAGE_ORDERS;
        Mutation draftOrderDelete(id) => MANAGE_ORDERS;
        Mutation draftOrderBulkDelete(ids) => MANAGE_ORDERS;
        Mutation draftOrderLinesBulkDelete(ids) => MANAGE_ORDERS;
        Mutation draftOrderLinesCreate(id, input) => MANAGE_ORDERS;
        Mutation draftOrderLineDelete(id) => MANAGE_ORDERS;
        Mutation draftOrderLineUpdate(id, input) => MANAGE_ORDERS;
        Mutation draftOrderUpdate(id, input) => MANAGE_ORDERS;
        Mutation orderAddNote(order, input) => MANAGE_ORDERS;
        Mutation orderCancel(id, restock) => MANAGE_ORDERS;
        Mutation orderCapture(id, amount) => MANAGE_ORDERS;
        Mutation orderClearPrivateMeta(id, input) => MANAGE_ORDERS;
        Mutation orderClearMeta(id, input) => MANAGE_ORDERS;
        Mutation orderFulfillmentCancel(id, input) => MANAGE_ORDERS;
        Mutation orderFulfillmentCreate(order, input) => MANAGE_ORDERS;
        Mutation orderFulfillmentUpdateTracking(id, input) => MANAGE_ORDERS;
        Mutation orderFulfillmentClearMeta(id, input) => MANAGE_ORDERS;
        Mutation orderFulfillmentClearPrivateMeta(id, input) => MANAGE_ORDERS;
        Mutation orderFulfillmentUpdateMeta(id, input) => MANAGE_ORDERS;
        Mutation orderFulfillmentUpdatePrivateMeta(id, input) => MANAGE_ORDERS;
        Mutation orderMarkAsPaid(id) => MANAGE_ORDERS;
        Mutation orderRefund(id, amount) => MANAGE_ORDERS;
        Mutation orderUpdate(id, input) => MANAGE_ORDERS;
        Mutation orderUpdateMeta(id, input) => MANAGE_ORDERS;
        Mutation orderUpdatePrivateMeta(id, input) => MANAGE_ORDERS;
        Mutation orderUpdateShipping(order, input) => MANAGE_ORDERS;
        Mutation orderVoid(id) => MANAGE_ORDERS;
        Mutation orderBulkCancel(ids, restock) => MANAGE_ORDERS;
    }

    Page {
        Query page(id, slug) => PUBLIC;
        Query pages(query, filter, sortBy, first, after, last, before) => PUBLIC;

        Mutation pageCreate(input) => MANAGE_PAGES;
        Mutation pageUpdate(id, input) => MANAGE_PAGES;
        Mutation pageDelete(id) => MANAGE_PAGES;
        Mutation pageBulkDelete(ids) => MANAGE_PAGES;
        Mutation pageBulkPublish(ids, isPublished) => MANAGE_PAGES;
        Mutation pageTranslate(id, languageCode, input) => MANAGE_TRANSLATIONS;
    }

    Product {
        Query product(id) => PUBLIC;
        Query products(
            query, filter, sortBy, attributes, categories, collections, stockAvailability,
            first, after, last, before
        ) => PUBLIC;
        Query category(id) => PUBLIC;
        Query categories(query, filter, sortBy, level, first, after, last, before) => PUBLIC;
        Query collection(id) => PUBLIC;
        Query collections(query, filter, sortBy, first, after, last, before) => PUBLIC;
        Query attribute(id) => PUBLIC;
        Query attributes(
            query, filter, sortBy, inCategory, inCollection, first, after, last, before
        ) => PUBLIC;
        Query productType(id) => PUBLIC;
        Query productTypes(query, filter, sortBy, first, after, last, before) => PUBLIC;
        Query productVariant(id) => PUBLIC;
        Query productVariants(ids, first, after, last, before) => PUBLIC;
        Query digitalContent(id) => MANAGE_PRODUCTS;
        Query digitalContents(first, after, last, before) => MANAGE_PRODUCTS;
        Query reportProductSales(period, first, after, last, before)
            => MANAGE_ORDERS_AND_PRODUCTS;

        Mutation attributeCreate(input) => MANAGE_PRODUCTS;
        Mutation attributeDelete(id) => MANAGE_PRODUCTS;
        Mutation attributeBulkDelete(ids) => MANAGE_PRODUCTS;
        Mutation attributeAssign(productTypeId, operations) => MANAGE_PRODUCTS;
        Mutation attributeUnassign(productTypeId, attributeIds) => MANAGE_PRODUCTS;
        Mutation attributeUpdate(id, input) => MANAGE_PRODUCTS;
        Mutation attributeTranslate(id, languageCode, input) => MANAGE_TRANSLATIONS;
        Mutation attributeUpdateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation attributeClearMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation attributeUpdatePrivateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation attributeClearPrivateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation attributeValueCreate(attribute, input) => MANAGE_PRODUCTS;
        Mutation attributeValueDelete(id) => MANAGE_PRODUCTS;
        Mutation attributeValueBulkDelete(ids) => MANAGE_PRODUCTS;
        Mutation attributeValueUpdate(id, input) => MANAGE_PRODUCTS;
        Mutation attributeValueTranslate(id, languageCode, input) => MANAGE_TRANSLATIONS;
        Mutation attributeReorderValues(attributeId, moves) => MANAGE_PRODUCTS;

        Mutation categoryCreate(input, parent) => MANAGE_PRODUCTS;
        Mutation categoryDelete(id) => MANAGE_PRODUCTS;
        Mutation categoryBulkDelete(ids) => MANAGE_PRODUCTS;
        Mutation categoryUpdate(id, input) => MANAGE_PRODUCTS;
        Mutation categoryTranslate(id, languageCode, input) => MANAGE_TRANSLATIONS;
        Mutation categoryUpdateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation categoryClearMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation categoryUpdatePrivateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation categoryClearPrivateMetadata(id, input) => MANAGE_PRODUCTS;

        Mutation collectionAddProducts(collectionId, products) => MANAGE_PRODUCTS;
        Mutation collectionCreate(input) => MANAGE_PRODUCTS;
        Mutation collectionDelete(id) => MANAGE_PRODUCTS;
        Mutation collectionReorderProducts(collectionId, moves) => MANAGE_PRODUCTS;
        Mutation collectionBulkDelete(ids) => MANAGE_PRODUCTS;
        Mutation collectionBulkPublish(ids, isPublished) => MANAGE_PRODUCTS;
        Mutation collectionRemoveProducts(collectionId, products) => MANAGE_PRODUCTS;
        Mutation collectionUpdate(id, input) => MANAGE_PRODUCTS;
        Mutation collectionTranslate(id, languageCode, input) => MANAGE_TRANSLATIONS;
        Mutation collectionUpdateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation collectionClearMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation collectionUpdatePrivateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation collectionClearPrivateMetadata(id, input) => MANAGE_PRODUCTS;

        Mutation productCreate(input) => MANAGE_PRODUCTS;
        Mutation productDelete(id) => MANAGE_PRODUCTS;
        Mutation productBulkDelete(ids) => MANAGE_PRODUCTS;
        Mutation productBulkPublish(ids, isPublished) => MANAGE_PRODUCTS;
        Mutation productUpdate(id, input) => MANAGE_PRODUCTS;
        Mutation productTranslate(id, languageCode, input) => MANAGE_TRANSLATIONS;
        Mutation productUpdateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation productClearMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation productUpdatePrivateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation productClearPrivateMetadata(id, input) => MANAGE_PRODUCTS;

        Mutation productImageCreate(input) => MANAGE_PRODUCTS;
        Mutation productImageDelete(id) => MANAGE_PRODUCTS;
        Mutation productImageBulkDelete(ids) => MANAGE_PRODUCTS;
        Mutation productImageReorder(productId, imagesIds) => MANAGE_PRODUCTS;
        Mutation productImageUpdate(id, input) => MANAGE_PRODUCTS;

        Mutation productTypeCreate(input) => MANAGE_PRODUCTS;
        Mutation productTypeDelete(id) => MANAGE_PRODUCTS;
        Mutation productTypeBulkDelete(ids) => MANAGE_PRODUCTS;
        Mutation productTypeUpdate(id, input) => MANAGE_PRODUCTS;
        Mutation productTypeReorderAttributes(productTypeId, attributeType, moves)
            => MANAGE_PRODUCTS;
        Mutation productTypeUpdateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation productTypeClearMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation productTypeUpdatePrivateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation productTypeClearPrivateMetadata(id, input) => MANAGE_PRODUCTS;

        Mutation digitalContentCreate(variantId, input) => MANAGE_PRODUCTS;
        Mutation digitalContentDelete(variantId) => MANAGE_PRODUCTS;
        Mutation digitalContentUpdate(variantId, input) => MANAGE_PRODUCTS;
        Mutation digitalContentUrlCreate(input) => MANAGE_PRODUCTS;

        Mutation productVariantCreate(input) => MANAGE_PRODUCTS;
        Mutation productVariantDelete(id) => MANAGE_PRODUCTS;
        Mutation productVariantBulkCreate(product, variants) => MANAGE_PRODUCTS;
        Mutation productVariantBulkDelete(ids) => MANAGE_PRODUCTS;
        Mutation productVariantUpdate(id, input) => MANAGE_PRODUCTS;
        Mutation productVariantTranslate(id, languageCode, input) => MANAGE_TRANSLATIONS;
        Mutation productVariantUpdateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation productVariantClearMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation productVariantUpdatePrivateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation productVariantClearPrivateMetadata(id, input) => MANAGE_PRODUCTS;
        Mutation variantImageAssign(imageId, variantId) => MANAGE_PRODUCTS;
        Mutation variantImageUnassign(imageId, variantId) => MANAGE_PRODUCTS;
    }
}


static BY_NAME: Lazy<HashMap<&'static str, &'static Field>> = Lazy::new(|| {
    FIELDS.iter().map(|f| (f.name, f)).collect()
});

pub(crate) fn lookup(name: &str) -> Option<&'static Field> {
    BY_NAME.get(name).copied()
}

pub(crate) fn all() -> &'static [Field] {
    FIELDS
}

/// Checks that the registry and the executable schema describe the same
/// root fields with the same arguments.
pub(crate) fn verify(root: &RootNode) -> Result<()> {
    if BY_NAME.len() != FIELDS.len() {
        bail!("duplicate field names in registry");
    }

    for (kind, type_name) in [(FieldKind::Query, "Query"), (FieldKind::Mutation, "Mutation")] {
        let Some(MetaType::Object(object)) = root.schema.concrete_type_by_name(type_name) else {
            bail!("schema has no object type '{type_name}'");
        };

        let mut seen = BTreeSet::new();
        for schema_field in object.fields.iter().filter(|f| !f.name.starts_with("__")) {
            let name: &str = &schema_field.name;
            let entry = lookup(name)
                .ok_or_else(|| anyhow!("{type_name}.{name} is not in the field registry"))?;
            if entry.kind != kind {
                bail!("{type_name}.{name} is registered as {:?}", entry.kind);
            }

            let schema_args = schema_field.arguments.iter()
                .flatten()
                .map(|arg| &*arg.name)
                .collect::<BTreeSet<&str>>();
            let registered_args = entry.args.iter().copied().collect::<BTreeSet<&str>>();
            if schema_args != registered_args {
                bail!(
                    "arguments of {type_name}.{name} differ: schema has {schema_args:?}, \
                        registry has {registered_args:?}",
                );
            }

            seen.insert(entry.name);
        }

        if let Some(missing) = FIELDS.iter()
            .filter(|f| f.kind == kind)
            .find(|f| !seen.contains(f.name))
        {
            bail!("registered field '{}' does not exist on {type_name}", missing.name);
        }
    }

    debug!("Verified field registry ({} fields)", FIELDS.len());
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::auth::{tests::user, Access, AuthContext, HasPermissions, Permission};
    use super::{all, lookup, verify, Domain, FieldKind};

    #[test]
    fn registry_matches_schema() {
        verify(&crate::api::root_node()).unwrap();
    }

    #[test]
    fn names_are_unique() {
        let mut names = HashSet::new();
        for f in all() {
            assert!(names.insert(f.name), "'{}' registered twice", f.name);
        }
    }

    #[test]
    fn page_domain_is_isolated() {
        let page_fields = all().iter()
            .filter(|f| f.domain == Domain::Page)
            .map(|f| f.name)
            .collect::<HashSet<_>>();
        assert_eq!(page_fields, HashSet::from([
            "page", "pages", "pageCreate", "pageUpdate", "pageDelete", "pageBulkDelete",
            "pageBulkPublish", "pageTranslate",
        ]));

        // Fields of other domains never land in the page domain and vice versa.
        assert_eq!(lookup("category").map(|f| f.domain), Some(Domain::Product));
        assert_eq!(lookup("sale").map(|f| f.domain), Some(Domain::Discount));
        assert_eq!(lookup("saleCreate").map(|f| f.kind), Some(FieldKind::Mutation));
    }

    #[test]
    fn anonymous_only_reaches_public_fields() {
        let anon = AuthContext::Anonymous;
        for f in all() {
            let allowed = anon.require(&f.access).is_some();
            assert_eq!(allowed, f.access == Access::Public, "field '{}'", f.name);
        }
    }

    #[test]
    fn public_queries() {
        let public = all().iter()
            .filter(|f| f.access == Access::Public)
            .map(|f| f.name)
            .collect::<HashSet<_>>();
        assert_eq!(public, HashSet::from([
            "orderByToken", "page", "pages", "product", "products", "category",
            "categories", "collection", "collections", "attribute", "attributes",
            "productType", "productTypes", "productVariant", "productVariants",
        ]));
        assert!(all().iter()
            .filter(|f| f.kind == FieldKind::Mutation)
            .all(|f| f.access != Access::Public));
    }

    #[test]
    fn permissions_are_enforced() {
        // Each single permission opens exactly the fields requiring only it.
        for perm in Permission::ALL {
            let actor = AuthContext::User(user(&[perm]));
            for f in all() {
                let Access::Permissions(req) = f.access else { continue };
                let expected = req.is_satisfied(|p| p == perm);
                assert_eq!(
                    actor.require(&f.access).is_some(),
                    expected,
                    "field '{}' with permission {perm}",
                    f.name,
                );
            }
        }
    }

    #[test]
    fn report_requires_both_permissions() {
        let access = lookup("reportProductSales").unwrap().access;
        let orders = AuthContext::User(user(&[Permission::ManageOrders]));
        let products = AuthContext::User(user(&[Permission::ManageProducts]));
        let both = AuthContext::User(user(&[Permission::ManageOrders, Permission::ManageProducts]));
        assert!(orders.require(&access).is_none());
        assert!(products.require(&access).is_none());
        assert!(both.require(&access).is_some());
    }

    #[test]
    fn translations_need_translation_permission() {
        for f in all().iter().filter(|f| f.name.ends_with("Translate")) {
            assert_eq!(
                f.access,
                Access::Permissions(crate::auth::Requirement::AllOf(&[Permission::ManageTranslations])),
                "field '{}'",
                f.name,
            );
        }
    }
}
