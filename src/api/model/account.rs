//! Staff members, customers and service accounts as seen through the API.
//! Creating and changing accounts happens via the CLI (`emporium user ...`).

use chrono::{DateTime, Utc};

use crate::{
    api::{
        Context, Id,
        err::{not_authorized, ApiResult},
        model::{
            order::Order,
            shared::{
                self, define_connection, define_sort_field_and_input, load_connection,
                PaginationArgs,
            },
        },
    },
    auth::{HasPermissions, Permission, ServiceAccount, User},
    db::util::SqlFilter,
};


#[juniper::graphql_object(name = "User", context = Context)]
impl User {
    fn id(&self) -> Id {
        Id::user(self.key)
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn first_name(&self) -> &str {
        &self.first_name
    }

    fn last_name(&self) -> &str {
        &self.last_name
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn is_staff(&self) -> bool {
        self.is_staff
    }

    /// Permissions granted to this user. Superusers implicitly hold all of
    /// them.
    fn permissions(&self) -> Vec<Permission> {
        if self.is_superuser {
            Permission::ALL.to_vec()
        } else {
            self.permissions.clone()
        }
    }

    /// Internal note about the user. Only visible to account managers.
    fn note(&self, context: &Context) -> Option<&str> {
        let visible = context.auth.has_perm(Permission::ManageUsers)
            || context.auth.has_perm(Permission::ManageStaff);
        self.note.as_deref().filter(|_| visible)
    }

    fn date_joined(&self) -> DateTime<Utc> {
        self.date_joined
    }

    /// Placed orders of this user, newest first. Readable by the user
    /// themselves and by order managers.
    async fn orders(&self, context: &Context) -> ApiResult<Vec<Order>> {
        let is_self = context.auth.user().is_some_and(|u| u.key == self.key);
        if !is_self && !context.auth.has_perm(Permission::ManageOrders) {
            return Err(not_authorized!(
                key = "missing-permission",
                "orders of other users require '{}'",
                Permission::ManageOrders,
            ));
        }
        Order::of_customer(context, self.key).await
    }
}

#[juniper::graphql_object(name = "ServiceAccount", context = Context)]
impl ServiceAccount {
    fn id(&self) -> Id {
        Id::service_account(self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

define_connection!(UserConnection, UserEdge, User);
define_connection!(ServiceAccountConnection, ServiceAccountEdge, ServiceAccount);

define_sort_field_and_input!(
    pub(crate) enum UserSortField {
        #[default]
        Email => "users.email",
        FirstName => "users.first_name",
        LastName => "users.last_name",
        OrderCount => "(select count(*) from orders \
            where orders.customer = users.id and orders.status <> 'draft')",
    };
    pub(crate) struct UserSortingInput, default direction Ascending;
);

define_sort_field_and_input!(
    pub(crate) enum ServiceAccountSortField {
        #[default]
        Name => "service_accounts.name",
        CreationDate => "service_accounts.created",
    };
    pub(crate) struct ServiceAccountSortingInput, default direction Ascending;
);

/// Which accounts an actor may look up with `user(id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserScope {
    All,
    Staff,
    Customers,
}

impl UserScope {
    fn of(actor: &impl HasPermissions) -> Option<Self> {
        match (actor.has_perm(Permission::ManageStaff), actor.has_perm(Permission::ManageUsers)) {
            (true, true) => Some(Self::All),
            (true, false) => Some(Self::Staff),
            (false, true) => Some(Self::Customers),
            (false, false) => None,
        }
    }

    fn condition(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Staff => Some("users.is_staff"),
            Self::Customers => Some("not users.is_staff"),
        }
    }
}

const USER_SEARCH: [&str; 3] = ["users.email", "users.first_name", "users.last_name"];

/// Returns the current user, if any.
pub(crate) fn me(context: &Context) -> Option<User> {
    context.auth.user().cloned()
}

/// Loads a user, but only if they are within the scope the current actor
/// manages. Staff managers see staff, user managers see customers.
pub(crate) async fn load_user(id: Id, context: &Context) -> ApiResult<Option<User>> {
    let Some(scope) = UserScope::of(&context.auth) else {
        return Err(not_authorized!(key = "missing-permission", "cannot look up users"));
    };
    let Some(key) = id.key_for(Id::USER_KIND) else {
        return Ok(None);
    };
    shared::load_by_key(context, "users", key, scope.condition()).await
}

async fn list_users(
    staff: bool,
    query: Option<String>,
    sort_by: Option<UserSortingInput>,
    pagination: PaginationArgs,
    context: &Context,
) -> ApiResult<UserConnection> {
    let mut sql = SqlFilter::new();
    sql.eq("users.is_staff", staff);
    if let Some(query) = &query {
        sql.search(&USER_SEARCH, query);
    }
    load_connection(context, "users", &sql, sort_by.unwrap_or_default(), &pagination)
        .await
        .map(Into::into)
}

pub(crate) async fn customers(
    query: Option<String>,
    sort_by: Option<UserSortingInput>,
    pagination: PaginationArgs,
    context: &Context,
) -> ApiResult<UserConnection> {
    list_users(false, query, sort_by, pagination, context).await
}

pub(crate) async fn staff_users(
    query: Option<String>,
    sort_by: Option<UserSortingInput>,
    pagination: PaginationArgs,
    context: &Context,
) -> ApiResult<UserConnection> {
    list_users(true, query, sort_by, pagination, context).await
}

pub(crate) async fn service_accounts(
    sort_by: Option<ServiceAccountSortingInput>,
    pagination: PaginationArgs,
    context: &Context,
) -> ApiResult<ServiceAccountConnection> {
    let sql = SqlFilter::new();
    load_connection(context, "service_accounts", &sql, sort_by.unwrap_or_default(), &pagination)
        .await
        .map(Into::into)
}


#[cfg(test)]
mod tests {
    use crate::{
        api::model::shared::{SortDirection, SortOrder},
        auth::{tests::user, AuthContext, Permission},
    };
    use super::{UserScope, UserSortField, UserSortingInput};

    #[test]
    fn user_scope() {
        let of = |perms: &[Permission]| UserScope::of(&AuthContext::User(user(perms)));
        assert_eq!(of(&[]), None);
        assert_eq!(of(&[Permission::ManageStaff]), Some(UserScope::Staff));
        assert_eq!(of(&[Permission::ManageUsers]), Some(UserScope::Customers));
        assert_eq!(
            of(&[Permission::ManageUsers, Permission::ManageStaff]),
            Some(UserScope::All),
        );
        assert_eq!(of(&[Permission::ManageOrders]), None);

        assert_eq!(UserScope::All.condition(), None);
        assert_eq!(UserScope::Customers.condition(), Some("not users.is_staff"));
    }

    #[test]
    fn default_user_order() {
        let order = SortOrder::from(UserSortingInput::default());
        assert_eq!(order.column, "users.email");
        assert_eq!(order.direction, SortDirection::Ascending);

        let by_count = SortOrder::from(UserSortingInput {
            field: UserSortField::OrderCount,
            direction: SortDirection::Descending,
        });
        assert!(by_count.column.contains("count(*)"));
    }
}
