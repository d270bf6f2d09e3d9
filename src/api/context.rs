use std::{future::Future, sync::Arc};
use tokio::sync::Mutex;

use crate::{
    api::{
        err::{not_authorized, internal_server_error, invalid_input, ApiResult},
        registry,
    },
    auth::{Access, AuthContext, AuthToken, HasPermissions},
    config::Config,
    db::Transaction,
    prelude::*,
};


/// The context that is accessible to every resolver in our API.
pub(crate) struct Context {
    pub(crate) db: Transaction,
    pub(crate) auth: AuthContext,
    pub(crate) config: Arc<Config>,

    /// Held by a mutation for as long as its savepoint is open.
    mutation_lock: Mutex<()>,
}

impl juniper::Context for Context {}

impl Context {
    pub(crate) fn new(db: Transaction, auth: AuthContext, config: Arc<Config>) -> Self {
        Self { db, auth, config, mutation_lock: Mutex::new(()) }
    }

    /// Checks that the current actor may use the root field `field` as
    /// declared in the field registry. Has to be called first thing in every
    /// root query and mutation resolver.
    pub(crate) fn gate(&self, field: &str) -> ApiResult<AuthToken> {
        let entry = registry::lookup(field).ok_or_else(|| {
            error!("API field '{field}' is not in the field registry");
            internal_server_error!("unregistered API field")
        })?;

        self.auth.require(&entry.access).ok_or_else(|| {
            debug!(
                "Denied {} access to '{field}' (requires {:?})",
                self.auth.debug_log_name(),
                entry.access,
            );
            match entry.access {
                Access::Permissions(requirement) if self.auth.is_authenticated() => not_authorized!(
                    key = "missing-permission",
                    "'{field}' requires {requirement}",
                ),
                _ => not_authorized!(key = "not-logged-in", "'{field}' requires login"),
            }
        })
    }

    /// Runs a mutation inside a savepoint of the request transaction. If it
    /// fails, everything it wrote is undone and the transaction stays usable
    /// for the following fields, even if a constraint violation aborted it.
    ///
    /// juniper resolves all root fields of an operation concurrently, so
    /// this also makes mutations run one after another, in request order.
    pub(crate) async fn atomically<T>(
        &self,
        mutation: impl Future<Output = ApiResult<T>>,
    ) -> ApiResult<T> {
        let _guard = self.mutation_lock.lock().await;
        self.db.batch_execute("savepoint mutation").await?;
        match mutation.await {
            Ok(out) => {
                self.db.batch_execute("release savepoint mutation").await?;
                Ok(out)
            }
            Err(e) => {
                debug!("Mutation failed, rolling back its changes: {}", e.msg);
                self.db.batch_execute("rollback to savepoint mutation").await?;
                Err(e)
            }
        }
    }

    /// Whether the current actor may see unpublished objects that are
    /// managed with `perm`.
    pub(crate) fn can_see_unpublished(&self, perm: crate::auth::Permission) -> bool {
        self.auth.can_see_unpublished(perm)
    }

    /// Makes sure `language_code` is one of the configured shop languages.
    pub(crate) fn check_language(&self, language_code: &str) -> ApiResult<()> {
        if self.config.general.languages.iter().any(|l| l == language_code) {
            Ok(())
        } else {
            Err(invalid_input!(
                key = "unknown-language",
                field = "languageCode",
                "language '{language_code}' is not configured (available: {})",
                self.config.general.languages.join(", "),
            ))
        }
    }
}
