//! Domain logic that is independent of the DB and the API: keys, rich text,
//! metadata stores and the like. Everything in here is pure and unit tested.

mod key;
pub(crate) mod metadata;
pub(crate) mod ordering;
pub(crate) mod rich_text;
mod slug;

pub(crate) use self::{
    key::{Key, KEY_BASE64_LEN},
    slug::slugify,
};
