use std::{ffi::OsString, io::Write as _, ops::Deref, sync::Once};
use secrecy::ExposeSecret;
use tokio_postgres::{Client, NoTls};

use crate::{config::Config, prelude::*, model::Key};
use super::super::{DbConfig, TlsMode};


/// Environment variable naming the config file whose `[db]` section is used
/// to create temporary test databases. DB tests are skipped if it's unset.
const TEST_CONFIG_ENV: &str = "EMPORIUM_TEST_CONFIG";

/// Returns the path of the test config, or `None` after announcing that DB
/// tests are skipped. The notice goes to the real stderr, since the test
/// harness swallows `eprintln!` output of passing tests.
fn test_config_path(value: Option<OsString>) -> Option<OsString> {
    static SKIP_NOTICE: Once = Once::new();

    if value.is_none() {
        SKIP_NOTICE.call_once(|| {
            let _ = writeln!(
                std::io::stderr(),
                "warning: '{TEST_CONFIG_ENV}' not set: all DB tests are skipped",
            );
        });
    }
    value
}

async fn conn(config: &DbConfig, database: &str) -> Result<Client> {
    let (client, connection) = tokio_postgres::config::Config::new()
        .user(&config.user)
        .password(config.password.expose_secret())
        .dbname(database)
        .host(&config.host)
        .port(config.port)
        .application_name("Emporium DB tests")
        .connect(NoTls)
        .await
        .context("could not connect to DB in test")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            panic!("PG connection error: {e}");
        }
    });

    Ok(client)
}

/// A temporary DB used for a single unit test. Is removed on drop.
///
/// Be sure to use the multi threaded Tokio runtime or else `drop` will hang
/// indefinitely!
pub(crate) struct TestDb {
    client: Option<Client>,
    controller: Client,
    db_name: String,
    config_path: OsString,
}

impl TestDb {
    /// Creates a new temporary database with connection data from the test
    /// config. Returns `None` if no test config is specified.
    pub(crate) async fn new() -> Result<Option<Self>> {
        let Some(path) = test_config_path(std::env::var_os(TEST_CONFIG_ENV)) else {
            return Ok(None);
        };
        let config = Config::load_from(&path)
            .context("failed to load test config")?;

        // Create connection to original database and create a new temporary one.
        let controller = conn(&config.db, &config.db.database).await?;
        let db_name = format!("emporium_test_{}", rand::random::<u64>());
        controller.execute(&format!("create database {db_name}"), &[]).await
            .context("failed to create temporary test DB")?;

        let client = conn(&config.db, &db_name).await?;

        Ok(Some(Self {
            controller,
            client: Some(client),
            db_name,
            config_path: path,
        }))
    }

    pub(crate) async fn with_migrations() -> Result<Option<Self>> {
        let Some(mut out) = Self::new().await? else {
            return Ok(None);
        };
        let client = out.client.as_mut().ok_or_else(|| anyhow!("client already dropped"))?;
        crate::db::migrate(client).await
            .context("failed to run migrations on test DB")?;

        Ok(Some(out))
    }

    /// Loads the test config again, pointing to this temporary DB. Used to
    /// run the API against it.
    pub(crate) fn config(&self) -> Result<Config> {
        let mut config = Config::load_from(&self.config_path)
            .context("failed to load test config")?;
        config.db.database = self.db_name.clone();
        config.db.tls_mode = TlsMode::Off;
        Ok(config)
    }

    pub(crate) async fn add_page(&self, slug: &str, title: &str, published: bool) -> Result<Key> {
        let row = self.query_one(
            "insert into pages (slug, title, is_published) values ($1, $2, $3) returning id",
            &[&slug, &title, &published],
        ).await?;
        Ok(row.get::<_, Key>(0))
    }

    pub(crate) async fn add_page_translation(
        &self,
        page: Key,
        language_code: &str,
        title: &str,
    ) -> Result<Key> {
        let row = self.query_one(
            "insert into page_translations (page, language_code, title)
                values ($1, $2, $3)
                returning id",
            &[&page, &language_code, &title],
        ).await?;
        Ok(row.get::<_, Key>(0))
    }

    pub(crate) async fn add_product(&self, name: &str, slug: &str, price: i32) -> Result<Key> {
        let product_type = self.query_one(
            "insert into product_types (name) values ('Default') returning id",
            &[],
        ).await?.get::<_, Key>(0);
        let row = self.query_one(
            "insert into products (product_type, name, slug, price)
                values ($1, $2, $3, $4::int4::numeric)
                returning id",
            &[&product_type, &name, &slug, &price],
        ).await?;
        Ok(row.get::<_, Key>(0))
    }
}

impl Deref for TestDb {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("client is only taken on drop")
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        // There is no "async drop", so we close all connections to the
        // temporary database first and then drop it within `block_on`.
        //
        // This code requires the multi threaded Tokio runtime! :(
        //
        // Pools used by API tests might still hold connections, hence `force`.
        drop(self.client.take());
        futures::executor::block_on(async move {
            let sql = format!("drop database {} with (force)", self.db_name);
            self.controller.execute(&sql, &[])
                .await
                .expect("failed to drop temporary test DB");
        });
    }
}

/// Gets a migrated test DB or returns `Ok(())` from the calling test if DB
/// tests are not configured.
macro_rules! test_db {
    () => {
        match TestDb::with_migrations().await? {
            Some(db) => db,
            None => return Ok(()),
        }
    };
}

pub(crate) use test_db;


#[test]
fn db_tests_are_skipped_without_config() {
    assert_eq!(test_config_path(None), None);
    assert_eq!(
        test_config_path(Some("test-config.toml".into())),
        Some(OsString::from("test-config.toml")),
    );
}
