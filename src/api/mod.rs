//! Definition of the GraphQL API.

use juniper::EmptySubscription;

use crate::prelude::*;
use self::{
    mutation::Mutation,
    query::Query,
};

pub(crate) mod err;
pub(crate) mod model;
pub(crate) mod registry;

mod common;
mod context;
mod id;
mod mutation;
mod query;

pub(crate) use self::{
    id::Id,
    context::Context,
    common::{BulkResult, Cursor, JsonString, Money, ReportingPeriod, TaxedMoney},
};


#[derive(Debug, confique::Config)]
pub(crate) struct ApiConfig {
    /// Number of items returned by list queries when neither `first` nor
    /// `last` is given.
    #[config(default = 20)]
    pub(crate) default_page_size: u32,

    /// Upper bound for `first` and `last`. Larger values are clamped.
    #[config(default = 100)]
    pub(crate) max_page_size: u32,
}

impl ApiConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            bail!("`api.max_page_size` has to be at least 1");
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            bail!("`api.default_page_size` has to be between 1 and `api.max_page_size`");
        }
        Ok(())
    }
}


/// Creates and returns the API root node.
pub(crate) fn root_node() -> RootNode {
    RootNode::new(Query, Mutation, EmptySubscription::new())
}

/// Type of our API root node.
pub(crate) type RootNode = juniper::RootNode<'static, Query, Mutation, EmptySubscription<Context>>;
