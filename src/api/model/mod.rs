//! This module and its children define most of the application logic of the
//! API.

pub(crate) mod account;
pub(crate) mod discount;
pub(crate) mod meta;
pub(crate) mod order;
pub(crate) mod page;
pub(crate) mod product;
pub(crate) mod shared;
pub(crate) mod translation;
