use std::convert::Infallible;
use std::sync::Arc;

use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use tracing::info;

use crate::sys_core::router::route;
use crate::sys_core::state::AppState;

/// Serve the file API on the configured address until Ctrl-C.
pub async fn run_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.listen_addr()?;

    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let state = state.clone();
        let remote = conn.remote_addr();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| route(state.clone(), remote, req)))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(%addr, "listening");

    server
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
