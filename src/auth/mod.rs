use std::borrow::Cow;

use base64::Engine as _;
use hyper::HeaderMap;
use sha1::{Digest, Sha1};
use tokio_postgres::{Error as PgError, GenericClient, Row};

use crate::{db::util::FromDb, model::Key, prelude::*};

mod permission;

pub(crate) use self::permission::{Access, Permission, Requirement, UnknownPermission};


/// Authentication and authorization.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct AuthConfig {
    /// The mode of authentication for staff and customers:
    ///
    /// - "none": nobody is logged in via headers. Only service account tokens
    ///   work. Useful for development and headless setups.
    /// - "auth-proxy": a trusted reverse proxy in front of Emporium
    ///   authenticates users and passes the e-mail address of the user in the
    ///   header `email_header`. That user is then loaded from the DB.
    ///
    /// Service accounts can always authenticate with
    /// `Authorization: Bearer <token>`, regardless of this setting.
    #[config(default = "none")]
    pub(crate) mode: AuthMode,

    /// The header containing the base64 encoded e-mail address of the current
    /// user. Only relevant in mode "auth-proxy". Make sure your proxy removes
    /// this header from incoming requests!
    #[config(default = "x-emporium-user-email")]
    pub(crate) email_header: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum AuthMode {
    None,
    AuthProxy,
}

/// Whoever is sending the current request.
#[derive(Debug)]
pub(crate) enum AuthContext {
    Anonymous,
    User(User),
    ServiceAccount(ServiceAccount),
}

/// A staff member or customer from the `users` table.
#[derive(Debug, Clone)]
pub(crate) struct User {
    pub(crate) key: Key,
    pub(crate) email: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) is_active: bool,
    pub(crate) is_staff: bool,
    pub(crate) is_superuser: bool,
    pub(crate) permissions: Vec<Permission>,
    pub(crate) note: Option<String>,
    pub(crate) date_joined: chrono::DateTime<chrono::Utc>,
}

impl FromDb for User {
    const SELECT: &'static str = "users.id, users.email, users.first_name, users.last_name, \
        users.is_active, users.is_staff, users.is_superuser, users.permissions, users.note, \
        users.date_joined";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            email: row.get(1),
            first_name: row.get(2),
            last_name: row.get(3),
            is_active: row.get(4),
            is_staff: row.get(5),
            is_superuser: row.get(6),
            permissions: Permission::parse_stored(&row.get::<_, Vec<String>>(7)),
            note: row.get(8),
            date_joined: row.get(9),
        }
    }
}

/// A machine client from the `service_accounts` table.
#[derive(Debug, Clone)]
pub(crate) struct ServiceAccount {
    pub(crate) key: Key,
    pub(crate) name: String,
    pub(crate) is_active: bool,
    pub(crate) permissions: Vec<Permission>,
    pub(crate) created: chrono::DateTime<chrono::Utc>,
}

impl FromDb for ServiceAccount {
    const SELECT: &'static str = "service_accounts.id, service_accounts.name, \
        service_accounts.is_active, service_accounts.permissions, service_accounts.created";

    fn from_row_start(row: &Row) -> Self {
        Self {
            key: row.get(0),
            name: row.get(1),
            is_active: row.get(2),
            permissions: Permission::parse_stored(&row.get::<_, Vec<String>>(3)),
            created: row.get(4),
        }
    }
}

impl AuthContext {
    pub(crate) async fn new(
        headers: &HeaderMap,
        config: &AuthConfig,
        db: &impl GenericClient,
    ) -> Result<Self, PgError> {
        if let Some(token) = bearer_token(headers) {
            let query = format!(
                "select {} from service_accounts where token_hash = $1",
                ServiceAccount::SELECT,
            );
            let account = db.query_opt(&query, &[&hash_token(token)]).await?
                .map(|row| ServiceAccount::from_row_start(&row))
                .filter(|account| account.is_active);

            // A wrong token is not silently downgraded to some user from the
            // proxy headers.
            return match account {
                Some(account) => Ok(Self::ServiceAccount(account)),
                None => {
                    debug!("Unknown or inactive service account token");
                    Ok(Self::Anonymous)
                }
            };
        }

        match config.mode {
            AuthMode::None => Ok(Self::Anonymous),
            AuthMode::AuthProxy => {
                let Some(email) = decode_header(headers, &config.email_header) else {
                    return Ok(Self::Anonymous);
                };

                let query = format!("select {} from users where email = $1", User::SELECT);
                let user = db.query_opt(&query, &[&email]).await?
                    .map(|row| User::from_row_start(&row));

                match user {
                    Some(user) if user.is_active => Ok(Self::User(user)),
                    Some(_) => {
                        debug!("User '{email}' is inactive: treating request as anonymous");
                        Ok(Self::Anonymous)
                    }
                    None => {
                        debug!("User '{email}' from auth header does not exist in DB");
                        Ok(Self::Anonymous)
                    }
                }
            }
        }
    }

    pub(crate) fn user(&self) -> Option<&User> {
        match self {
            Self::User(user) => Some(user),
            _ => None,
        }
    }

    /// Returns a representation of the actor useful for logging.
    pub(crate) fn debug_log_name(&self) -> Cow<'static, str> {
        match self {
            Self::Anonymous => "anonymous".into(),
            Self::User(user) => format!("'{}'", user.email).into(),
            Self::ServiceAccount(account) => format!("service account '{}'", account.name).into(),
        }
    }
}

/// Returns the token of an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(hyper::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Reads and base64 decodes a header value.
fn decode_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(value.as_bytes())
        .map_err(|e| warn!("header '{name}' is set but not valid base64: {e}"))
        .ok()?;

    String::from_utf8(decoded)
        .map_err(|e| warn!("header '{name}' is set but decoded base64 is not UTF8: {e}"))
        .ok()
        .filter(|s| !s.trim().is_empty())
}

/// Returns the hex encoded SHA-1 hash of the token, which is what we store in
/// the DB.
pub(crate) fn hash_token(token: &str) -> String {
    hex::encode(Sha1::digest(token.as_bytes()))
}


/// A marker type that serves to prove *some* authorization has been done.
///
/// The goal of this is to prevent devs from forgetting to do authorization at
/// all. Since the token does not contain any information about what was
/// authorized, it cannot protect against anything else.
///
/// Has a private field so it cannot be created outside of this module.
pub(crate) struct AuthToken(());

impl AuthToken {
    fn some_if(v: bool) -> Option<Self> {
        if v { Some(Self(())) } else { None }
    }
}

/// Anything that can hold permissions.
pub(crate) trait HasPermissions {
    fn is_authenticated(&self) -> bool;
    fn is_active(&self) -> bool;
    fn is_superuser(&self) -> bool;
    fn granted(&self) -> &[Permission];

    fn has_perm(&self, perm: Permission) -> bool {
        self.is_active() && (self.is_superuser() || self.granted().contains(&perm))
    }

    fn has_perms(&self, requirement: &Requirement) -> bool {
        requirement.is_satisfied(|p| self.has_perm(p))
    }

    /// Whether this actor sees unpublished pages, products or collections,
    /// i.e. whether they hold the permission to manage those.
    fn can_see_unpublished(&self, manage_perm: Permission) -> bool {
        self.has_perm(manage_perm)
    }

    /// Returns an auth token IF this actor may access something guarded by
    /// `access`.
    fn require(&self, access: &Access) -> Option<AuthToken> {
        AuthToken::some_if(match access {
            Access::Public => true,
            Access::LoggedIn => self.is_authenticated() && self.is_active(),
            Access::Permissions(requirement) => self.has_perms(requirement),
        })
    }
}

impl HasPermissions for User {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn is_superuser(&self) -> bool {
        self.is_superuser
    }

    fn granted(&self) -> &[Permission] {
        &self.permissions
    }
}

impl HasPermissions for ServiceAccount {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn is_superuser(&self) -> bool {
        false
    }

    fn granted(&self) -> &[Permission] {
        &self.permissions
    }
}

impl HasPermissions for AuthContext {
    fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    fn is_active(&self) -> bool {
        match self {
            Self::Anonymous => false,
            Self::User(user) => user.is_active,
            Self::ServiceAccount(account) => account.is_active,
        }
    }

    fn is_superuser(&self) -> bool {
        match self {
            Self::User(user) => user.is_superuser,
            _ => false,
        }
    }

    fn granted(&self) -> &[Permission] {
        match self {
            Self::Anonymous => &[],
            Self::User(user) => &user.permissions,
            Self::ServiceAccount(account) => &account.permissions,
        }
    }
}


#[cfg(test)]
pub(crate) mod tests {
    use hyper::{HeaderMap, header::HeaderValue};

    use crate::model::Key;
    use super::*;

    pub(crate) fn user(perms: &[Permission]) -> User {
        User {
            key: Key(1),
            email: "staff@example.com".into(),
            first_name: "Pat".into(),
            last_name: "Doe".into(),
            is_active: true,
            is_staff: true,
            is_superuser: false,
            permissions: perms.to_vec(),
            note: None,
            date_joined: chrono::Utc::now(),
        }
    }

    #[test]
    fn anonymous_has_nothing() {
        let anon = AuthContext::Anonymous;
        assert!(anon.require(&Access::Public).is_some());
        assert!(anon.require(&Access::LoggedIn).is_none());
        for p in Permission::ALL {
            assert!(!anon.has_perm(p));
        }
    }

    #[test]
    fn superuser_has_everything() {
        let mut su = user(&[]);
        su.is_superuser = true;
        let ctx = AuthContext::User(su);
        for p in Permission::ALL {
            assert!(ctx.has_perm(p));
        }
        assert!(ctx.has_perms(&Requirement::AllOf(&Permission::ALL)));
    }

    #[test]
    fn inactive_user_has_nothing() {
        let mut u = user(&[Permission::ManagePages]);
        u.is_active = false;
        let ctx = AuthContext::User(u);
        assert!(!ctx.has_perm(Permission::ManagePages));
        assert!(!ctx.can_see_unpublished(Permission::ManagePages));
        assert!(ctx.require(&Access::LoggedIn).is_none());
    }

    #[test]
    fn permission_checks() {
        let ctx = AuthContext::User(user(&[Permission::ManageOrders]));
        let both = Access::Permissions(Requirement::AllOf(
            &[Permission::ManageOrders, Permission::ManageProducts],
        ));
        let either = Access::Permissions(Requirement::AnyOf(
            &[Permission::ManageOrders, Permission::ManageProducts],
        ));
        assert!(ctx.require(&both).is_none());
        assert!(ctx.require(&either).is_some());
        assert!(ctx.require(&Access::LoggedIn).is_some());
        assert!(ctx.can_see_unpublished(Permission::ManageOrders));
        assert!(!ctx.can_see_unpublished(Permission::ManagePages));
    }

    #[test]
    fn service_accounts_are_never_superusers() {
        let ctx = AuthContext::ServiceAccount(ServiceAccount {
            key: Key(3),
            name: "erp".into(),
            is_active: true,
            permissions: vec![Permission::ManageProducts],
            created: chrono::Utc::now(),
        });
        assert!(ctx.has_perm(Permission::ManageProducts));
        assert!(!ctx.has_perm(Permission::ManageOrders));
        assert!(ctx.user().is_none());
    }

    #[test]
    fn bearer_tokens() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", HeaderValue::from_static("bearer  xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn email_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-emporium-user-email", HeaderValue::from_static("cGF0QGV4YW1wbGUuY29t"));
        assert_eq!(
            decode_header(&headers, "x-emporium-user-email").as_deref(),
            Some("pat@example.com"),
        );

        headers.insert("x-emporium-user-email", HeaderValue::from_static("not base64!"));
        assert_eq!(decode_header(&headers, "x-emporium-user-email"), None);
    }

    #[test]
    fn token_hash() {
        assert_eq!(hash_token("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
