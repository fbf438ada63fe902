//! One access log line per request.

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

fn header_value<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `"METHOD URI" STATUS "USER-AGENT"`
fn access_line(method: &str, uri: &str, status: StatusCode, user_agent: Option<&str>) -> String {
    format!(
        "\"{} {}\" {} \"{}\"",
        method,
        uri,
        status.as_u16(),
        user_agent.unwrap_or("-")
    )
}

pub async fn access_log(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let user_agent = header_value(req.headers(), header::USER_AGENT).map(str::to_string);
    let content_type = header_value(req.headers(), header::CONTENT_TYPE).map(str::to_string);

    let response = next.run(req).await;
    let status = response.status();
    let line = access_line(method.as_str(), &uri.to_string(), status, user_agent.as_deref());

    if status.is_server_error() {
        tracing::error!("{}", line);
    } else if status == StatusCode::BAD_REQUEST {
        tracing::warn!("{}", line);
    } else {
        tracing::info!("{}", line);
    }

    let is_json = content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        tracing::debug!(
            "Request with incorrect content-type: {:?} is not \"application/json\".",
            content_type.as_deref().unwrap_or("")
        );
    }

    response
}
