//! Account management from the command line. Accounts are not created via
//! the API, so this is how the first staff member and all service accounts
//! come into existence.

use base64::Engine as _;
use secrecy::ExposeSecret as _;
use tokio_postgres::IsolationLevel;

use crate::{
    auth::{hash_token, Permission},
    config::Config,
    db,
    prelude::*,
    util::gen_random_bytes_crypto,
};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum UserCommand {
    /// Creates a user. Customers are created without `--staff`.
    Create {
        email: String,

        #[clap(long, default_value = "")]
        first_name: String,

        #[clap(long, default_value = "")]
        last_name: String,

        /// Makes the user a staff member.
        #[clap(long)]
        staff: bool,

        /// Gives the user all permissions. Implies `--staff`.
        #[clap(long)]
        superuser: bool,

        /// Permission codes to grant, e.g. `order.manage_orders`.
        #[clap(long = "permission", short = 'p')]
        permissions: Vec<String>,
    },

    /// Grants permissions to an existing user, keeping their current ones.
    Grant {
        email: String,

        /// Permission codes to grant. At least one.
        #[clap(required = true)]
        permissions: Vec<String>,
    },

    /// Deactivates a user. Inactive users are treated as anonymous.
    Deactivate {
        email: String,
    },
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum ServiceAccountCommand {
    /// Creates a service account and prints its token. The token cannot be
    /// shown again later.
    Create {
        name: String,

        /// Permission codes to grant, e.g. `product.manage_products`.
        #[clap(long = "permission", short = 'p')]
        permissions: Vec<String>,
    },
}


pub(crate) async fn run_user(cmd: &UserCommand, config: &Config) -> Result<()> {
    let pool = db::create_pool(&config.db).await?;
    let mut conn = pool.get().await?;
    let tx = conn.build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await?;

    match cmd {
        UserCommand::Create { email, first_name, last_name, staff, superuser, permissions } => {
            let email = email.trim();
            if email.is_empty() || !email.contains('@') {
                bail!("'{email}' is not a valid e-mail address");
            }
            let permissions = parse_permissions(permissions)?;
            let is_staff = *staff || *superuser || !permissions.is_empty();

            let affected = tx.execute(
                "insert into users \
                    (email, first_name, last_name, is_staff, is_superuser, permissions) \
                    values ($1, $2, $3, $4, $5, $6) \
                    on conflict on constraint unique_user_email do nothing",
                &[&email, first_name, last_name, &is_staff, superuser, &permissions],
            ).await?;
            if affected == 0 {
                bail!("a user with e-mail '{email}' already exists");
            }
            tx.commit().await?;
            info!("Created user '{email}'");
            println!("Created user '{email}'");
        }
        UserCommand::Grant { email, permissions } => {
            let permissions = parse_permissions(permissions)?;
            let affected = tx.execute(
                "update users \
                    set permissions = array(select distinct unnest(permissions || $2::text[])), \
                        is_staff = true \
                    where email = $1",
                &[email, &permissions],
            ).await?;
            if affected == 0 {
                bail!("no user with e-mail '{email}'");
            }
            tx.commit().await?;
            println!("Granted {} to '{email}'", permissions.join(", "));
        }
        UserCommand::Deactivate { email } => {
            let affected = tx.execute(
                "update users set is_active = false where email = $1",
                &[email],
            ).await?;
            if affected == 0 {
                bail!("no user with e-mail '{email}'");
            }
            tx.commit().await?;
            println!("Deactivated '{email}'");
        }
    }

    Ok(())
}

pub(crate) async fn run_service_account(cmd: &ServiceAccountCommand, config: &Config) -> Result<()> {
    let pool = db::create_pool(&config.db).await?;
    let conn = pool.get().await?;

    match cmd {
        ServiceAccountCommand::Create { name, permissions } => {
            let permissions = parse_permissions(permissions)?;
            let token = new_token();
            conn.execute(
                "insert into service_accounts (name, permissions, token_hash) \
                    values ($1, $2, $3)",
                &[name, &permissions, &hash_token(&token)],
            ).await?;

            info!("Created service account '{name}'");
            bunt::println!("Created service account {[bold]}. Its token is:", name);
            println!();
            println!("    {token}");
            println!();
            bunt::println!("{$yellow}Store it now: it is not saved anywhere and cannot be shown again.{/$}");
        }
    }

    Ok(())
}

/// Checks the given permission codes and returns them deduplicated.
fn parse_permissions(codes: &[String]) -> Result<Vec<String>> {
    let mut out = codes.iter()
        .map(|code| code.trim().parse::<Permission>())
        .collect::<Result<Vec<_>, _>>()?;
    out.sort();
    out.dedup();
    Ok(out.into_iter().map(|p| p.code().to_owned()).collect())
}

/// A new random token: 32 bytes, URL-safe base64 encoded.
fn new_token() -> String {
    let bytes = gen_random_bytes_crypto::<32>();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes.expose_secret())
}


#[cfg(test)]
mod tests {
    use super::{new_token, parse_permissions};

    #[test]
    fn permissions() {
        let codes = vec![
            "order.manage_orders".to_owned(),
            " page.manage_pages".to_owned(),
            "order.manage_orders".to_owned(),
        ];
        assert_eq!(
            parse_permissions(&codes).unwrap(),
            vec!["order.manage_orders".to_owned(), "page.manage_pages".to_owned()],
        );
        assert!(parse_permissions(&["order.manage_everything".to_owned()]).is_err());
        assert!(parse_permissions(&[]).unwrap().is_empty());
    }

    #[test]
    fn tokens() {
        let a = new_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, new_token());
    }
}
