use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{header, Method, StatusCode};
use juniper::{
    http::{graphiql::graphiql_source, GraphQLBatchRequest, GraphQLBatchResponse, GraphQLRequest},
    InputValue,
};
use std::{
    mem,
    sync::Arc,
    time::Instant,
};

use crate::{
    api,
    auth::AuthContext,
    db::{self, Transaction},
    prelude::*,
};
use super::{log, response, Context, Request, Response};


/// This is the main HTTP entry point, called for each incoming request.
pub(super) async fn handle(req: Request, ctx: Arc<Context>) -> Response {
    log::req::log(&req);
    if ctx.config.log.log_http_headers {
        log::headers::log(&req);
    }

    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/');

    match path {
        "/graphql" if method == Method::POST => handle_post_api(req, &ctx).await,
        "/graphql" if method == Method::GET => {
            let query = req.uri().query().unwrap_or_default();
            match parse_get_request(query) {
                Ok(request) => {
                    let request = GraphQLBatchRequest::Single(request);
                    handle_api(request, req.headers(), &ctx).await
                }
                Err(msg) => response::bad_request(Some(&msg)),
            }
        }
        "/graphql" => response::method_not_allowed(),

        // ----- Special, internal routes, starting with `/~` ----------------------------------

        // The interactive GraphQL API explorer/IDE. It does not expose anything
        // that isn't already exposed by the API itself.
        "/~graphiql" if ctx.config.http.graphiql && method == Method::GET => {
            response::html(graphiql_source("/graphql", None))
        }

        "/~health" if method == Method::GET => health(&ctx).await,

        _ => {
            debug!("Responding with 404 to {:?} '{}'", method, path);
            response::not_found()
        }
    }
}

/// Reads the body of a `POST /graphql` request and runs it.
async fn handle_post_api(req: Request, ctx: &Context) -> Response {
    let (parts, body) = req.into_parts();
    let body = match Limited::new(body, ctx.config.http.max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return response::payload_too_large();
        }
        Err(e) => {
            warn!("Failed to read body of API request: {e}");
            return response::bad_request(None);
        }
    };

    let content_type = parts.headers.get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");

    let request = if content_type.starts_with("application/graphql") {
        match String::from_utf8(body.to_vec()) {
            Ok(query) => GraphQLBatchRequest::Single(GraphQLRequest::new(query, None, None)),
            Err(_) => return response::bad_request(Some("body is not valid UTF-8")),
        }
    } else {
        match serde_json::from_slice::<GraphQLBatchRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                let msg = format!("invalid GraphQL request: {e}");
                return response::bad_request(Some(&msg));
            }
        }
    };

    handle_api(request, &parts.headers, ctx).await
}

/// Parses the query string of a `GET /graphql` request.
fn parse_get_request(query_string: &str) -> Result<GraphQLRequest, String> {
    let mut query = None;
    let mut operation_name = None;
    let mut variables = None;
    for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
        match &*key {
            "query" => query = Some(value.into_owned()),
            "operationName" => operation_name = Some(value.into_owned()),
            "variables" => {
                let parsed = serde_json::from_str::<InputValue>(&value)
                    .map_err(|e| format!("invalid 'variables' parameter: {e}"))?;
                variables = Some(parsed);
            }
            _ => {}
        }
    }

    let query = query.ok_or_else(|| "missing 'query' parameter".to_owned())?;
    Ok(GraphQLRequest::new(query, operation_name, variables))
}

/// Executes a GraphQL request inside one DB transaction.
pub(super) async fn handle_api(
    request: GraphQLBatchRequest,
    headers: &hyper::HeaderMap,
    ctx: &Context,
) -> Response {
    let before = Instant::now();
    let mut connection = match db::get_conn_or_service_unavailable(&ctx.db_pool).await {
        Ok(c) => c,
        Err(r) => return r,
    };

    let tx = match connection.transaction().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("Failed to start transaction for API request: {}", e);
            return response::internal_server_error();
        }
    };

    // `juniper` does not support contexts with a lifetime parameter, but the
    // transaction borrows from `connection`. We pretend the lifetime is
    // `'static` and put the transaction into an `Arc`. After the API handlers
    // ran, we check that ours is the last handle, so the transaction cannot
    // outlive the connection. `connection` must not be touched until the
    // transaction is committed or dropped below.
    type PgTx<'a> = deadpool_postgres::Transaction<'a>;
    let tx = unsafe {
        let static_tx = mem::transmute::<PgTx<'_>, PgTx<'static>>(tx);
        Arc::new(static_tx)
    };

    let auth = match AuthContext::new(headers, &ctx.config.auth, &**tx).await {
        Ok(auth) => auth,
        Err(e) => {
            error!("Failed to load auth context for API request: {}", e);
            drop(tx);
            return response::internal_server_error();
        }
    };
    trace!("Auth context: {}", auth.debug_log_name());

    let api_context = api::Context::new(Transaction::new(tx.clone()), auth, ctx.config.clone());
    let out = execute_in_order(&request, &ctx.api_root, &api_context).await;
    let num_queries = api_context.db.num_queries();
    drop(api_context);

    let status = if out.is_ok() { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    let body = match serde_json::to_vec(&out) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize API response: {e}");
            drop(tx);
            return response::internal_server_error();
        }
    };

    // Postgres answers `commit` of an aborted transaction with a silent
    // rollback. Mutations undo their own failures via savepoints, so this
    // only happens when some query failed in the DB. In that case we must
    // not report anything from this request as done.
    if !out.is_ok() {
        if let Err(e) = tx.batch_execute("select 1").await {
            error!("API request left its transaction aborted, nothing is committed: {e}");
            drop(tx);
            return response::internal_server_error();
        }
    }

    // Check whether we own the last remaining handle of this Arc.
    let out = match Arc::try_unwrap(tx) {
        Err(_) => {
            // Some API handler stored the transaction somewhere. Returning
            // from this function would be UB and panicking only brings down
            // the current thread.
            error!("FATAL BUG: API handler kept reference to transaction. Ending process.");
            std::process::abort();
        }
        Ok(tx) => match tx.commit().await {
            Ok(_) => response::json(status, body),
            Err(e) => {
                error!("Failed to commit transaction for API request: {}", e);
                response::service_unavailable()
            }
        },
    };

    debug!(
        "Finished /graphql query in {:.2?} (with {} SQL queries)",
        before.elapsed(),
        num_queries,
    );

    out
}

/// Like `GraphQLBatchRequest::execute`, but runs the operations of a batch
/// one after another instead of concurrently. They share one transaction.
async fn execute_in_order(
    request: &GraphQLBatchRequest,
    root: &api::RootNode,
    context: &api::Context,
) -> GraphQLBatchResponse {
    match request {
        GraphQLBatchRequest::Single(request) => {
            GraphQLBatchResponse::Single(request.execute(root, context).await)
        }
        GraphQLBatchRequest::Batch(requests) => {
            let mut responses = Vec::with_capacity(requests.len());
            for request in requests {
                responses.push(request.execute(root, context).await);
            }
            GraphQLBatchResponse::Batch(responses)
        }
    }
}

/// Replies 200 if a DB connection can be obtained and used.
async fn health(ctx: &Context) -> Response {
    let ok = match ctx.db_pool.get().await {
        Ok(conn) => conn.query_one("select 1", &[]).await.is_ok(),
        Err(_) => false,
    };

    if ok {
        response::text(StatusCode::OK, "OK")
    } else {
        warn!("Health check failed: database not reachable");
        response::service_unavailable()
    }
}


#[cfg(test)]
mod tests {
    use super::parse_get_request;

    #[test]
    fn get_request_parameters() {
        assert!(parse_get_request("query=%7B%20me%20%7B%20id%20%7D%20%7D").is_ok());
        assert!(parse_get_request(
            "query=query%20Q%20%7B%20me%20%7B%20id%20%7D%20%7D&operationName=Q\
                &variables=%7B%22a%22%3A1%7D",
        ).is_ok());
    }

    #[test]
    fn invalid_get_requests() {
        assert!(parse_get_request("").is_err());
        assert!(parse_get_request("operationName=Q").is_err());
        assert!(parse_get_request("query=%7Bme%7D&variables=%7Bnope").is_err());
    }
}
