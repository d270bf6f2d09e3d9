use std::{fmt, str::FromStr};

use juniper::GraphQLEnum;

use crate::prelude::*;


/// Permissions that can be granted to users and service accounts. Their
/// string codes (`Permission::code`) are stored in the DB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, GraphQLEnum)]
pub(crate) enum Permission {
    ManageUsers,
    ManageStaff,
    ManageServiceAccounts,
    ManageDiscounts,
    ManageOrders,
    ManagePages,
    ManageProducts,
    ManageTranslations,
}

impl Permission {
    pub(crate) const ALL: [Self; 8] = [
        Self::ManageUsers,
        Self::ManageStaff,
        Self::ManageServiceAccounts,
        Self::ManageDiscounts,
        Self::ManageOrders,
        Self::ManagePages,
        Self::ManageProducts,
        Self::ManageTranslations,
    ];

    pub(crate) fn code(self) -> &'static str {
        match self {
            Self::ManageUsers => "account.manage_users",
            Self::ManageStaff => "account.manage_staff",
            Self::ManageServiceAccounts => "account.manage_service_accounts",
            Self::ManageDiscounts => "discount.manage_discounts",
            Self::ManageOrders => "order.manage_orders",
            Self::ManagePages => "page.manage_pages",
            Self::ManageProducts => "product.manage_products",
            Self::ManageTranslations => "site.manage_translations",
        }
    }

    /// Parses a list of codes as stored in the DB. Unknown codes are skipped
    /// with a warning, e.g. when a permission was removed in a newer version.
    pub(crate) fn parse_stored(codes: &[String]) -> Vec<Self> {
        codes.iter()
            .filter_map(|code| match code.parse() {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Ignoring stored permission: {e}");
                    None
                }
            })
            .collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission '{0}'")]
pub(crate) struct UnknownPermission(pub(crate) String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter()
            .find(|p| p.code() == s)
            .ok_or_else(|| UnknownPermission(s.to_owned()))
    }
}

/// A combination of permissions an actor needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Requirement {
    AllOf(&'static [Permission]),
    AnyOf(&'static [Permission]),
}

impl Requirement {
    pub(crate) fn is_satisfied(&self, has: impl Fn(Permission) -> bool) -> bool {
        match self {
            Self::AllOf(perms) => perms.iter().all(|&p| has(p)),
            Self::AnyOf(perms) => perms.iter().any(|&p| has(p)),
        }
    }

    pub(crate) fn permissions(&self) -> &'static [Permission] {
        match self {
            Self::AllOf(perms) | Self::AnyOf(perms) => perms,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (perms, sep) = match self {
            Self::AllOf(perms) => (perms, " and "),
            Self::AnyOf(perms) => (perms, " or "),
        };
        for (i, p) in perms.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            write!(f, "'{p}'")?;
        }
        Ok(())
    }
}

/// Who may access an API field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Public,

    /// Any authenticated user or service account.
    LoggedIn,
    Permissions(Requirement),
}


#[cfg(test)]
mod tests {
    use super::{Permission, Requirement, UnknownPermission};

    #[test]
    fn codes_round_trip() {
        for p in Permission::ALL {
            assert_eq!(p.code().parse::<Permission>(), Ok(p));
        }
        assert_eq!(
            "order.manage_everything".parse::<Permission>(),
            Err(UnknownPermission("order.manage_everything".into())),
        );
    }

    #[test]
    fn stored_codes() {
        let stored = vec![
            "page.manage_pages".to_owned(),
            "legacy.manage_menus".to_owned(),
            "order.manage_orders".to_owned(),
        ];
        assert_eq!(
            Permission::parse_stored(&stored),
            vec![Permission::ManagePages, Permission::ManageOrders],
        );
    }

    #[test]
    fn requirements() {
        use Permission::*;
        let has_orders = |p: Permission| p == ManageOrders;

        assert!(Requirement::AllOf(&[ManageOrders]).is_satisfied(has_orders));
        assert!(!Requirement::AllOf(&[ManageOrders, ManageProducts]).is_satisfied(has_orders));
        assert!(Requirement::AnyOf(&[ManageStaff, ManageOrders]).is_satisfied(has_orders));
        assert!(!Requirement::AnyOf(&[ManageStaff, ManageUsers]).is_satisfied(has_orders));
    }

    #[test]
    fn display() {
        use Permission::*;
        assert_eq!(
            Requirement::AllOf(&[ManageOrders, ManageProducts]).to_string(),
            "'order.manage_orders' and 'product.manage_products'",
        );
        assert_eq!(Requirement::AnyOf(&[ManageStaff]).to_string(), "'account.manage_staff'");
    }
}
