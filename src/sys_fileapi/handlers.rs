//! HTTP glue: turn core results into hyper::Response<Body>.

use chrono::Utc;
use hyper::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use hyper::{Body, Request, Response};
use multer::Multipart;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::sys_core::error::ApiError;
use crate::sys_core::response::ok_json;
use crate::sys_core::state::AppState;
use crate::sys_fileapi::core::{self, FileApiError, FileEntry};

/// Name of the multipart field carrying the upload.
const UPLOAD_FIELD: &str = "file";

impl From<FileApiError> for ApiError {
    fn from(e: FileApiError) -> Self {
        match e {
            FileApiError::InvalidName(_) => ApiError::BadRequest(e.to_string()),
            FileApiError::NotFound => ApiError::NotFound(e.to_string()),
            FileApiError::Expired => ApiError::Forbidden(e.to_string()),
            FileApiError::Stream(err) => ApiError::BadRequest(format!("Invalid form data: {err}")),
            FileApiError::Io(_) | FileApiError::Metadata(_) => ApiError::Internal(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ListResponse {
    files: Vec<FileEntry>,
}

#[derive(Serialize)]
struct DetailResponse {
    detail: String,
}

pub async fn handler_upload(state: &AppState, req: Request<Body>) -> Result<Response<Body>, ApiError> {
    // parse boundary
    let ct = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Content-Type".into()))?;
    let boundary = multer::parse_boundary(ct)
        .map_err(|e| ApiError::BadRequest(format!("Bad boundary: {e}")))?;

    let mut multipart = Multipart::new(req.into_body(), boundary);
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) && field.file_name().is_none() {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| ApiError::BadRequest("Field has no filename".into()))?;
        let saved = core::api_upload_field(state, &filename, field).await?;
        return Ok(ok_json(&saved));
    }
    Err(ApiError::BadRequest("No file field in form data".into()))
}

pub async fn handler_list(state: &AppState) -> Result<Response<Body>, ApiError> {
    let files = core::api_list_files(state).await?;
    Ok(ok_json(&ListResponse { files }))
}

pub async fn handler_download(state: &AppState, filename: &str) -> Result<Response<Body>, ApiError> {
    let fetched = core::api_fetch_file(state, filename, Utc::now()).await?;

    let disposition = HeaderValue::from_str(&attachment_disposition(filename))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let mut resp = Response::new(Body::wrap_stream(ReaderStream::new(fetched.file)));
    let headers = resp.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(fetched.len));
    headers.insert(CONTENT_DISPOSITION, disposition);
    Ok(resp)
}

pub async fn handler_remove(state: &AppState, filename: &str) -> Result<Response<Body>, ApiError> {
    core::api_delete_file(state, filename).await?;
    Ok(ok_json(&DetailResponse {
        detail: format!("File '{filename}' deleted successfully"),
    }))
}

pub async fn handler_remove_all(state: &AppState) -> Result<Response<Body>, ApiError> {
    let report = core::api_delete_all(state)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to delete files: {e}")))?;
    if report.failed > 0 {
        warn!(failed = report.failed, "some files survived delete-all");
    }
    Ok(ok_json(&DetailResponse {
        detail: "All files deleted successfully".into(),
    }))
}

/// `attachment; filename="..."`. Names that are not plain ASCII also get the
/// RFC 5987 `filename*` form, with `_` standing in for each other character
/// in the plain one.
fn attachment_disposition(filename: &str) -> String {
    let plain = |c: char| (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\';
    if filename.chars().all(plain) {
        return format!("attachment; filename=\"{filename}\"");
    }
    let fallback: String = filename
        .chars()
        .map(|c| if plain(c) { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=utf-8''{}",
        urlencoding::encode(filename)
    )
}
