use juniper::{GraphQLScalar, InputValue, ScalarValue};
use paste::paste;
use static_assertions::const_assert;
use std::fmt;

use crate::{
    api::err::{invalid_input, ApiResult},
    model::{Key, KEY_BASE64_LEN},
};


/// An opaque, globally-unique identifier for all objects that the GraphQL API
/// might return.
///
/// While the ID should be treated as completely opaque by clients, there is
/// some system in it: a two character "kind" prefix followed by the base64
/// encoded primary key. That way, an ID of one kind can never be used to load
/// an object of another kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, GraphQLScalar)]
#[graphql(
    name = "ID",
    description = "An opaque, globally-unique identifier",
    with = Self,
    parse_token(String),
)]
pub(crate) struct Id {
    /// The kind of object, e.g. `b"pr"` for products.
    kind: [u8; 2],

    /// Primary key of the object. Private: use [`Self::key_for`] to prove
    /// you know what kind of ID it is.
    key: Key,
}

const ID_LEN: usize = 2 + KEY_BASE64_LEN;


// Macro to safely define a list of "kinds", each with a two alphanumeric ASCII
// character prefix. This will create a function and a const associated with
// `Id`.
macro_rules! define_kinds {
    ($($name:ident = $val:literal ,)+) => {
        paste!(
            impl Id {
                $(
                    pub(crate) const [<$name:upper _KIND>]: [u8; 2] = *$val;

                    pub(crate) fn $name(key: Key) -> Self {
                        Self {
                            kind: Self:: [<$name:upper _KIND>],
                            key,
                        }
                    }
                )+
            }

            /// Human readable name of a kind, used in error messages.
            pub(crate) fn kind_name(kind: [u8; 2]) -> &'static str {
                $( if kind == *$val { return stringify!($name); } )+
                "unknown"
            }
        );

        // Make sure all kinds are ASCII alphanumeric.
        $(
            const_assert!($val[0].is_ascii_alphanumeric());
            const_assert!($val[1].is_ascii_alphanumeric());
        )+

        // Make sure that all kind prefixes are different. A duplicate results
        // in a duplicate discriminant error.
        #[allow(non_camel_case_types, dead_code)]
        #[repr(u16)]
        enum _KindChecker {
            $( $name = u16::from_ne_bytes(*$val), )+
        }
    };
}

// Define all existing kinds of objects.
//
// If you get a strange error:
// - "discriminant value `25970` already exists": you added a duplicate prefix.
// - "evaluation of constant value failed": you added a prefix that's not
//   alphanumeric ASCII.
define_kinds![
    page = b"pg",
    user = b"us",
    service_account = b"sa",
    sale = b"sl",
    voucher = b"vo",
    order = b"or",
    order_line = b"ol",
    order_event = b"oe",
    fulfillment = b"fu",
    fulfillment_line = b"fl",
    payment = b"pa",
    product = b"pr",
    product_variant = b"pv",
    product_image = b"pi",
    product_type = b"pt",
    category = b"ca",
    collection = b"co",
    attribute = b"at",
    attribute_value = b"av",
    digital_content = b"dc",
    digital_content_url = b"du",
];


impl Id {
    /// See `invalid`.
    const INVALID_KIND: [u8; 2] = *b"!!";

    /// Returns an ID that refers to no object at all. Malformed IDs are
    /// treated this way so that IDs are truly opaque: clients just get "no
    /// object with that ID" instead of a syntax error.
    fn invalid() -> Self {
        Self {
            kind: Self::INVALID_KIND,
            key: Key(0),
        }
    }

    /// Returns the key of this id if the kind is equal to `expected_kind`. If
    /// the kinds don't match, `None` is returned. This is not just a simple
    /// getter as that would make it very easy to accidentally not check the
    /// kind of an id.
    pub(crate) fn key_for(&self, expected_kind: [u8; 2]) -> Option<Key> {
        if self.kind == expected_kind {
            Some(self.key)
        } else {
            None
        }
    }

    /// Like `key_for`, but for IDs passed to mutations, where a mismatch is
    /// an error about the input field `field`.
    pub(crate) fn require_key(&self, expected_kind: [u8; 2], field: &'static str) -> ApiResult<Key> {
        self.key_for(expected_kind).ok_or_else(|| invalid_input!(
            key = "not-found",
            "'{}' is not the ID of a {}",
            self,
            kind_name(expected_kind),
        ).on_field(field))
    }

    pub(crate) fn require_keys(
        ids: &[Id],
        expected_kind: [u8; 2],
        field: &'static str,
    ) -> ApiResult<Vec<Key>> {
        ids.iter().map(|id| id.require_key(expected_kind, field)).collect()
    }

    fn to_output<S: ScalarValue>(&self) -> juniper::Value<S> {
        juniper::Value::scalar(self.to_string())
    }

    fn from_input<S: ScalarValue>(input: &InputValue<S>) -> Result<Self, String> {
        let s = input.as_string_value().ok_or("expected string")?;
        Ok(s.parse().unwrap_or(Self::invalid()))
    }
}

impl std::str::FromStr for Id {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ID_LEN || !s.is_ascii() {
            return Err("invalid length");
        }

        let bytes = s.as_bytes();
        let kind = [bytes[0], bytes[1]];
        let key = Key::from_base64(&s[2..]).ok_or("invalid base64")?;

        Ok(Self { kind, key })
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [0; KEY_BASE64_LEN];
        let key = self.key.to_base64(&mut buf);
        write!(f, "{}{}{key}", self.kind[0] as char, self.kind[1] as char)
    }
}


#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use super::{Id, Key, kind_name};

    #[test]
    fn simple() {
        #[track_caller]
        fn check(kind: [u8; 2], key: u64, s: &str) {
            let left = Id { kind, key: Key(key) };
            assert_eq!(left.to_string(), s);
            assert_eq!(Id::from_str(s), Ok(left));
        }

        check(Id::PAGE_KIND, 0, "pgAAAAAAAAAAA");
        check(Id::PAGE_KIND, 1, "pgAAAAAAAAAAB");
        check(Id::PRODUCT_KIND, 62, "prAAAAAAAAAA-");
        check(Id::ORDER_KIND, 63, "orAAAAAAAAAA_");
        check(Id::ORDER_KIND, 64, "orAAAAAAAAABA");
        check(Id::SALE_KIND, u64::MAX, "slP__________");
    }

    #[test]
    fn invalid_decode() {
        assert_eq!(Id::from_str(""), Err("invalid length"));
        assert_eq!(Id::from_str("pg"), Err("invalid length"));
        assert_eq!(Id::from_str("pgAAAAAAAAAAAA"), Err("invalid length"));
        assert_eq!(Id::from_str("pgäAAAAAAAAA"), Err("invalid length"));
        assert_eq!(Id::from_str("pg0000000000*"), Err("invalid base64"));
        assert_eq!(Id::from_str("slQAAAAAAAAAA"), Err("invalid base64"));
    }

    #[test]
    fn kinds_do_not_mix() {
        let page = Id::page(Key(5));
        assert_eq!(page.key_for(Id::PAGE_KIND), Some(Key(5)));
        assert_eq!(page.key_for(Id::PRODUCT_KIND), None);
        assert_eq!(Id::invalid().key_for(Id::PAGE_KIND), None);

        let err = page.require_key(Id::CATEGORY_KIND, "parent").unwrap_err();
        assert_eq!(err.field, Some("parent"));
        assert!(err.msg.contains("category"));
    }

    #[test]
    fn require_many() {
        let ids = [Id::product(Key(1)), Id::product(Key(2))];
        assert_eq!(Id::require_keys(&ids, Id::PRODUCT_KIND, "products").ok(), Some(vec![Key(1), Key(2)]));

        let mixed = [Id::product(Key(1)), Id::collection(Key(2))];
        assert!(Id::require_keys(&mixed, Id::PRODUCT_KIND, "products").is_err());
    }

    #[test]
    fn names() {
        assert_eq!(kind_name(Id::PRODUCT_VARIANT_KIND), "product_variant");
        assert_eq!(kind_name(*b"!!"), "unknown");
    }
}
