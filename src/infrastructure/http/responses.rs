//! HTTP responses module
//!
//! JSON and text replies with the headers every endpoint carries.

use serde::Serialize;
use warp::http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

use crate::shared::error::AppError;

/// Response formatter for HTTP responses
pub struct ResponseFormatter;

impl ResponseFormatter {
    /// JSON body with the given status
    pub fn json<T: Serialize>(body: &T, status: StatusCode) -> Response {
        let mut response = warp::reply::with_status(warp::reply::json(body), status).into_response();
        Self::harden(&mut response);
        response
    }

    /// Plain text body, used for the Prometheus exposition
    pub fn text(body: String, content_type: &'static str) -> Response {
        let mut response = warp::reply::with_status(body, StatusCode::OK).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self::harden(&mut response);
        response
    }

    /// Error body and status for an application error
    pub fn from_app_error(error: &AppError) -> Response {
        Self::json(&error.to_json(), error.http_status_code())
    }

    fn harden(response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
}
