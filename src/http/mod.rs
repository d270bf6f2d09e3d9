//! The HTTP server, handler and routes.
//!
//! This file itself contains fairly little business logic and just sets up the
//! `hyper` server and catches errors. The main logic is in `handlers.rs`.

use bytes::Bytes;
use deadpool_postgres::Pool;
use http_body_util::Full;
use hyper::{body::Incoming, service::service_fn};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use std::{
    convert::Infallible,
    future::Future,
    net::{IpAddr, SocketAddr},
    panic::AssertUnwindSafe,
    sync::Arc,
};
use tokio::net::TcpListener;

use crate::{api, config::Config, prelude::*};
use self::handlers::handle;


mod handlers;
mod log;
pub(crate) mod response;

#[cfg(test)]
mod tests;


/// HTTP server configuration.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    /// The TCP port the HTTP server should listen on.
    #[config(default = 3080)]
    pub(crate) port: u16,

    /// The bind address to listen on.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,

    /// Maximum size of a request body in bytes. Larger API requests are
    /// rejected with 413.
    #[config(default = 1_048_576)]
    pub(crate) max_body_size: usize,

    /// Whether to serve the interactive GraphiQL explorer at `/~graphiql`.
    #[config(default = true)]
    pub(crate) graphiql: bool,
}


pub(crate) type Response = hyper::Response<Full<Bytes>>;
type Request = hyper::Request<Incoming>;


/// Context that the request handler has access to.
struct Context {
    api_root: api::RootNode,
    db_pool: Pool,
    config: Arc<Config>,
}


/// Starts the HTTP server. The future returned by this function must be awaited
/// to actually run it.
pub(crate) async fn serve(
    config: Config,
    api_root: api::RootNode,
    db: Pool,
) -> Result<()> {
    let addr = SocketAddr::new(config.http.address, config.http.port);
    let ctx = Arc::new(Context {
        api_root,
        db_pool: db,
        config: Arc::new(config),
    });

    let listener = TcpListener::bind(addr).await
        .context(format!("failed to bind to {addr}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    // One task per connection. `auto` speaks HTTP/1 and HTTP/2 depending on
    // what the client sends.
    let builder = auto::Builder::new(TokioExecutor::new());
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(v) => v,
                Err(e) => {
                    warn!("Failed to accept connection: {e}");
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, stopping HTTP server");
                break;
            }
        };

        let ctx = Arc::clone(&ctx);
        let builder = builder.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                handle_internal_errors(handle(req, Arc::clone(&ctx)))
            });
            if let Err(e) = builder.serve_connection(TokioIo::new(stream), service).await {
                debug!("Error serving connection from {peer}: {e}");
            }
        });
    }

    Ok(())
}

/// This just wraps another future and catches all panics that might occur when
/// resolving/polling that given future. This ensures that we always answer with
/// `500` instead of just crashing the thread and closing the connection.
async fn handle_internal_errors(
    future: impl Future<Output = Response>,
) -> Result<Response, Infallible> {
    // The `AssertUnwindSafe` is unfortunately necessary. The whole story of
    // unwind safety is strange. What we are basically saying here is: "if the
    // future panicks, the global/remaining application state is not 'broken'.
    // It is safe to continue with the program in case of a panic."
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => Ok(response),
        Err(panic) => {
            // For most panics (which use `panic!` like `println!`), this is
            // either `&str` or `String`.
            let msg = panic.downcast_ref::<String>()
                .map(|s| s.as_str())
                .or(panic.downcast_ref::<&str>().copied());

            match msg {
                Some(msg) => error!("INTERNAL SERVER ERROR: HTTP handler panicked: '{}'", msg),
                None => error!("INTERNAL SERVER ERROR: HTTP handler panicked"),
            }

            Ok(response::internal_server_error())
        }
    }
}
