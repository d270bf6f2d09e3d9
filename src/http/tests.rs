//! Runs GraphQL requests through `handle_api` against a temporary DB, so
//! auth, execution and the commit of the request transaction are all real.

use std::sync::Arc;

use base64::Engine as _;
use http_body_util::BodyExt;
use hyper::{header::{HeaderName, HeaderValue}, HeaderMap};
use juniper::http::{GraphQLBatchRequest, GraphQLRequest};
use serde_json::Value;

use crate::{
    api::{self, Id},
    auth::AuthMode,
    db::tests::util::{test_db, TestDb},
    model::Key,
    prelude::*,
};
use super::{handlers::handle_api, Context};


/// Fields are dropped in order, so the pool is closed before the DB is
/// dropped.
struct TestApi {
    ctx: Context,
    db: TestDb,
}

impl TestApi {
    async fn new(db: TestDb) -> Result<Self> {
        let mut config = db.config()?;
        config.auth.mode = AuthMode::AuthProxy;
        let db_pool = crate::db::create_pool(&config.db).await?;
        let ctx = Context {
            api_root: api::root_node(),
            db_pool,
            config: Arc::new(config),
        };

        Ok(Self { ctx, db })
    }

    async fn add_user(&self, email: &str, permissions: &[&str]) -> Result<()> {
        let permissions = permissions.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        self.db.execute(
            "insert into users (email, is_staff, permissions) values ($1, true, $2)",
            &[&email, &permissions],
        ).await?;
        Ok(())
    }

    async fn add_order(&self, status: &str) -> Result<Key> {
        let row = self.db.query_one(
            &format!("insert into orders (token, currency, status) \
                values (gen_random_uuid(), 'USD', '{status}') \
                returning id"),
            &[],
        ).await?;
        Ok(row.get(0))
    }

    async fn order_status(&self, order: Key) -> Result<String> {
        let row = self.db.query_one(
            "select status::text from orders where id = $1",
            &[&order],
        ).await?;
        Ok(row.get(0))
    }

    async fn run(&self, user: Option<&str>, query: &str) -> Result<Value> {
        let request = GraphQLRequest::new(query.to_owned(), None, None);
        self.execute(user, GraphQLBatchRequest::Single(request)).await
    }

    async fn run_batch(&self, user: Option<&str>, queries: &[&str]) -> Result<Value> {
        let requests = queries.iter()
            .map(|q| GraphQLRequest::new((*q).to_owned(), None, None))
            .collect();
        self.execute(user, GraphQLBatchRequest::Batch(requests)).await
    }

    async fn execute(&self, user: Option<&str>, request: GraphQLBatchRequest) -> Result<Value> {
        let mut headers = HeaderMap::new();
        if let Some(email) = user {
            let name = HeaderName::from_bytes(self.ctx.config.auth.email_header.as_bytes())?;
            let value = base64::engine::general_purpose::STANDARD.encode(email);
            headers.insert(name, HeaderValue::from_str(&value)?);
        }

        let response = handle_api(request, &headers, &self.ctx).await;
        let body = response.into_body().collect().await?.to_bytes();
        serde_json::from_slice(&body).context("API response is not JSON")
    }
}

/// Gets an API on a migrated test DB or returns `Ok(())` from the calling
/// test if DB tests are not configured.
macro_rules! test_api {
    () => {
        TestApi::new(test_db!()).await?
    };
}

fn error_kinds(response: &Value) -> Vec<&str> {
    response["errors"].as_array()
        .map(|errors| {
            errors.iter().filter_map(|e| e["extensions"]["kind"].as_str()).collect()
        })
        .unwrap_or_default()
}


#[tokio::test(flavor = "multi_thread")]
async fn anonymous_cannot_list_orders() -> Result<()> {
    let api = test_api!();
    api.add_order("unfulfilled").await?;

    let out = api.run(None, "{ orders { totalCount } }").await?;
    assert_eq!(error_kinds(&out), ["NOT_AUTHORIZED"]);
    assert_eq!(out["errors"][0]["extensions"]["key"], "not-logged-in");
    assert!(out["data"].is_null());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_permission_stops_mutation_before_it_runs() -> Result<()> {
    let api = test_api!();
    api.add_user("pages@example.com", &["page.manage_pages"]).await?;
    let order = api.add_order("unfulfilled").await?;

    let mutation = format!(
        r#"mutation {{ orderCancel(id: "{}", restock: true) {{ id }} }}"#,
        Id::order(order),
    );
    let out = api.run(Some("pages@example.com"), &mutation).await?;
    assert_eq!(error_kinds(&out), ["NOT_AUTHORIZED"]);
    assert_eq!(out["errors"][0]["extensions"]["key"], "missing-permission");
    assert_eq!(api.order_status(order).await?, "unfulfilled");

    let events = api.db.query_one(
        "select count(*) from order_events where order_id = $1",
        &[&order],
    ).await?.get::<_, i64>(0);
    assert_eq!(events, 0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn id_of_other_kind_resolves_to_null() -> Result<()> {
    let api = test_api!();
    api.add_user("sales@example.com", &["discount.manage_discounts"]).await?;
    let page = api.db.add_page("about", "About us", true).await?;

    let query = format!(r#"{{ sale(id: "{}") {{ id name }} }}"#, Id::page(page));
    let out = api.run(Some("sales@example.com"), &query).await?;
    assert!(out.get("errors").is_none(), "unexpected errors: {out}");
    assert!(out["data"]["sale"].is_null());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_bulk_cancel_changes_nothing() -> Result<()> {
    let api = test_api!();
    api.add_user("orders@example.com", &["order.manage_orders"]).await?;

    let product = api.db.add_product("Mug", "mug", 10).await?;
    let variant = api.db.query_one(
        "insert into product_variants (product, sku, quantity, quantity_allocated) \
            values ($1, 'mug-blue', 10, 3) \
            returning id",
        &[&product],
    ).await?.get::<_, Key>(0);

    let open = api.add_order("unfulfilled").await?;
    api.db.execute(
        "insert into order_lines \
            (order_id, variant, product_name, product_sku, is_shipping_required, \
                quantity, unit_price) \
            values ($1, $2, 'Mug', 'mug-blue', true, 3, 10)",
        &[&open, &variant],
    ).await?;
    let shipped = api.add_order("fulfilled").await?;

    let mutation = format!(
        r#"mutation {{ orderBulkCancel(ids: ["{}", "{}"], restock: true) {{ count }} }}"#,
        Id::order(open),
        Id::order(shipped),
    );
    let out = api.run(Some("orders@example.com"), &mutation).await?;
    assert_eq!(error_kinds(&out), ["INVALID_INPUT"]);

    // The first order was canceled and restocked before the second one
    // failed. None of that may survive.
    assert_eq!(api.order_status(open).await?, "unfulfilled");
    let allocated = api.db.query_one(
        "select quantity_allocated from product_variants where id = $1",
        &[&variant],
    ).await?.get::<_, i32>(0);
    assert_eq!(allocated, 3);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn constraint_violation_keeps_earlier_mutations() -> Result<()> {
    let api = test_api!();
    api.add_user("pages@example.com", &["page.manage_pages"]).await?;

    let out = api.run_batch(Some("pages@example.com"), &[
        r#"mutation { pageCreate(input: { title: "About", slug: "about" }) { id } }"#,
        r#"mutation { pageCreate(input: { title: "Again", slug: "about" }) { id } }"#,
        r#"mutation { pageCreate(input: { title: "Terms", slug: "terms" }) { id } }"#,
    ]).await?;

    assert!(out[0]["data"]["pageCreate"]["id"].is_string(), "first failed: {out}");
    assert_eq!(error_kinds(&out[1]), ["INVALID_INPUT"]);
    assert_eq!(out[1]["errors"][0]["extensions"]["key"], "unique");
    assert!(out[2]["data"]["pageCreate"]["id"].is_string(), "third failed: {out}");

    // Everything reported as created is actually committed.
    let slugs = api.db.query("select slug from pages order by slug", &[]).await?
        .into_iter()
        .map(|row| row.get::<_, String>(0))
        .collect::<Vec<_>>();
    assert_eq!(slugs, ["about", "terms"]);

    Ok(())
}
