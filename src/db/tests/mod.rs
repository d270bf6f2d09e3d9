use tokio_postgres::error::SqlState;

use crate::{prelude::*, model::{Key, rich_text}};
use self::util::{TestDb, test_db};

pub(crate) mod util;


fn constraint_of(e: &tokio_postgres::Error) -> Option<&str> {
    e.as_db_error().and_then(|e| e.constraint())
}

#[tokio::test(flavor = "multi_thread")]
async fn all_tables_created() -> Result<()> {
    let db = test_db!();
    let tables = super::query::all_table_names(&*db).await?;
    for expected in [
        "__db_migrations", "users", "service_accounts", "pages", "page_translations",
        "categories", "products", "product_variants", "collections", "sales", "vouchers",
        "orders", "order_lines", "fulfillments", "payments", "order_events",
        "product_translations", "sale_translations",
    ] {
        assert!(tables.iter().any(|t| t == expected), "table '{expected}' missing");
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn migrations_are_idempotent() -> Result<()> {
    let db = test_db!();
    let row = db.query_one("select count(*) from __db_migrations", &[]).await?;
    let applied = row.get::<_, i64>(0);
    assert_eq!(applied, 6);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn page_slug_is_unique() -> Result<()> {
    let db = test_db!();
    db.add_page("about", "About us", true).await?;

    let err = db.add_page("about", "About them", false).await
        .expect_err("duplicate slug was accepted");
    let err = err.downcast_ref::<tokio_postgres::Error>().expect("not a DB error");
    assert_eq!(err.code(), Some(&SqlState::UNIQUE_VIOLATION));
    assert_eq!(constraint_of(err), Some("unique_page_slug"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn page_translation_unique_per_language() -> Result<()> {
    let db = test_db!();
    let page = db.add_page("faq", "FAQ", true).await?;
    db.add_page_translation(page, "de", "Häufige Fragen").await?;
    db.add_page_translation(page, "fr", "Questions fréquentes").await?;

    let err = db.add_page_translation(page, "de", "Fragen").await
        .expect_err("duplicate translation was accepted");
    let err = err.downcast_ref::<tokio_postgres::Error>().expect("not a DB error");
    assert_eq!(constraint_of(err), Some("unique_page_translation"));

    // The same language is fine for a different page.
    let other = db.add_page("shipping", "Shipping", true).await?;
    db.add_page_translation(other, "de", "Versand").await?;

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn page_deletion_cascades_to_translations() -> Result<()> {
    let db = test_db!();
    let page = db.add_page("faq", "FAQ", true).await?;
    let other = db.add_page("terms", "Terms", true).await?;
    db.add_page_translation(page, "de", "Häufige Fragen").await?;
    db.add_page_translation(page, "pl", "Pytania").await?;
    db.add_page_translation(other, "de", "AGB").await?;

    db.execute("delete from pages where id = $1", &[&page]).await?;

    let remaining = db.query("select page from page_translations", &[]).await?
        .into_iter()
        .map(|row| row.get::<_, Key>(0))
        .collect::<Vec<_>>();
    assert_eq!(remaining, vec![other]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn sanitized_content_round_trips_through_jsonb() -> Result<()> {
    let db = test_db!();
    let raw = serde_json::json!({
        "blocks": [{ "key": "a", "text": "click", "type": "unstyled", "entityRanges": [] }],
        "entityMap": {
            "0": { "type": "LINK", "mutability": "MUTABLE", "data": { "url": "javascript:alert(1)" } },
        },
    });
    let clean = rich_text::sanitize(raw);

    let page = db.add_page("danger", "Danger", false).await?;
    db.execute("update pages set content_json = $1 where id = $2", &[&clean, &page]).await?;
    let stored = db.query_one("select content_json from pages where id = $1", &[&page]).await?
        .get::<_, serde_json::Value>(0);

    assert_eq!(stored["entityMap"]["0"]["data"]["url"], "#invalid");
    assert_eq!(rich_text::sanitize(stored.clone()), stored);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn product_slug_unique_and_price_checked() -> Result<()> {
    let db = test_db!();
    db.add_product("Mug", "mug", 10).await?;

    let err = db.add_product("Other mug", "mug", 12).await.expect_err("duplicate slug");
    let err = err.downcast_ref::<tokio_postgres::Error>().expect("not a DB error");
    assert_eq!(constraint_of(err), Some("unique_product_slug"));

    let err = db.add_product("Negative", "negative", -1).await.expect_err("negative price");
    let err = err.downcast_ref::<tokio_postgres::Error>().expect("not a DB error");
    assert_eq!(constraint_of(err), Some("price_not_negative"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn sale_percentage_is_bounded() -> Result<()> {
    let db = test_db!();
    db.execute(
        "insert into sales (name, type, value) values ('Half', 'percentage', 50)",
        &[],
    ).await?;

    let err = db.execute(
        "insert into sales (name, type, value) values ('Too much', 'percentage', 150)",
        &[],
    ).await.expect_err("percentage > 100 accepted");
    assert_eq!(constraint_of(&err), Some("percentage_at_most_100"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn named_constraints_map_to_api_errors() -> Result<()> {
    use crate::api::err::{invalid_input, map_db_err, ApiErrorKind};

    let db = test_db!();
    db.add_page("about", "About us", true).await?;

    let insert = "insert into pages (slug, title) values ($1, 'Some page')";
    let result = db.execute(insert, &[&"about"]).await;
    let err = map_db_err!(result, {
        if constraint == "unique_page_slug" => invalid_input!(
            key = "unique",
            field = "slug",
            "slug already in use",
        ),
    }).expect_err("duplicate slug was accepted");
    assert_eq!(err.kind, ApiErrorKind::InvalidInput);
    assert_eq!(err.key, Some("unique"));
    assert_eq!(err.field, Some("slug"));

    // Violations of constraints that are not listed stay internal errors.
    let result = db.execute(insert, &[&""]).await;
    let err = map_db_err!(result, {
        if constraint == "unique_page_slug" => invalid_input!(
            key = "unique",
            field = "slug",
            "slug already in use",
        ),
    }).expect_err("empty slug was accepted");
    assert_eq!(err.kind, ApiErrorKind::InternalServerError);

    Ok(())
}
