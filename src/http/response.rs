use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, StatusCode};

use super::Response;


fn with_body(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(content_type),
    );
    response
}

pub(super) fn text(status: StatusCode, body: impl Into<Bytes>) -> Response {
    with_body(status, "text/plain; charset=UTF-8", body)
}

pub(super) fn json(status: StatusCode, body: Vec<u8>) -> Response {
    with_body(status, "application/json", body)
}

pub(super) fn html(body: String) -> Response {
    with_body(StatusCode::OK, "text/html; charset=UTF-8", body)
}

pub(crate) fn service_unavailable() -> Response {
    text(
        StatusCode::SERVICE_UNAVAILABLE,
        "Server error: service unavailable. Potentially try again later.",
    )
}

pub(super) fn bad_request(msg: Option<&str>) -> Response {
    text(StatusCode::BAD_REQUEST, msg.unwrap_or("Bad request").to_owned())
}

pub(super) fn not_found() -> Response {
    text(StatusCode::NOT_FOUND, "404 Not found")
}

pub(super) fn method_not_allowed() -> Response {
    text(StatusCode::METHOD_NOT_ALLOWED, "405 Method not allowed")
}

pub(super) fn payload_too_large() -> Response {
    text(StatusCode::PAYLOAD_TOO_LARGE, "413 Request body too large")
}

pub(super) fn internal_server_error() -> Response {
    text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
