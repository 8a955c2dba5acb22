//! Request dispatch: CORS, rate limits, then the file API handlers.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::header::ORIGIN;
use hyper::{Body, Method, Request, Response};
use serde_json::json;
use tracing::{error, info};

use crate::sys_core::cors;
use crate::sys_core::error::ApiError;
use crate::sys_core::response::ok_json;
use crate::sys_core::state::AppState;
use crate::sys_fileapi::handlers;
use crate::sys_ratelimit::Endpoint;
use crate::sys_ratelimit::handlers::guard;

pub async fn route(
    state: Arc<AppState>,
    remote: SocketAddr,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let origin = req.headers().get(ORIGIN).cloned();

    let resp = if method == Method::OPTIONS {
        cors::preflight(&req)
    } else {
        let mut resp = match dispatch(&state, remote, req).await {
            Ok(resp) => resp,
            Err(e) => {
                if e.status().is_server_error() {
                    error!(%method, %path, error = %e, "request failed");
                }
                e.into_response()
            }
        };
        cors::apply(origin, &mut resp);
        resp
    };

    info!(%method, %path, status = resp.status().as_u16(), client = %remote, "request");
    Ok(resp)
}

async fn dispatch(
    state: &AppState,
    remote: SocketAddr,
    req: Request<Body>,
) -> Result<Response<Body>, ApiError> {
    let client = remote.ip();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match path.as_str() {
        "/health" => match method {
            Method::GET => Ok(ok_json(&json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
            }))),
            _ => Err(ApiError::MethodNotAllowed),
        },
        "/upload" => match method {
            Method::POST => {
                guard(&state.limiter, Endpoint::Upload, client)?;
                handlers::handler_upload(state, req).await
            }
            _ => Err(ApiError::MethodNotAllowed),
        },
        "/files" => match method {
            Method::GET => {
                guard(&state.limiter, Endpoint::List, client)?;
                handlers::handler_list(state).await
            }
            Method::DELETE => {
                guard(&state.limiter, Endpoint::DeleteAll, client)?;
                handlers::handler_remove_all(state).await
            }
            _ => Err(ApiError::MethodNotAllowed),
        },
        p => {
            let Some(raw) = p.strip_prefix("/files/").filter(|s| !s.is_empty()) else {
                return Err(ApiError::NotFound("Not Found".into()));
            };
            let filename = urlencoding::decode(raw)
                .map_err(|_| ApiError::BadRequest(format!("Invalid filename: {raw}")))?;
            match method {
                Method::GET => {
                    guard(&state.limiter, Endpoint::Fetch, client)?;
                    handlers::handler_download(state, &filename).await
                }
                Method::DELETE => handlers::handler_remove(state, &filename).await,
                _ => Err(ApiError::MethodNotAllowed),
            }
        }
    }
}
