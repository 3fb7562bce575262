use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::USER_AGENT;
use actix_web::http::Method;
use actix_web::middleware::{DefaultHeaders, Next};
use actix_web::{web, Error, HttpResponse};
use std::time::Instant;

use crate::metrics::Metrics;

/// Paths left out of the access log.
const QUIET_PATHS: &[&str] = &["/health", "/metrics"];

/// Record request count and latency per route, and write the access log.
pub async fn observe_requests(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.path().to_string();
    let (client_ip, user_agent) = client_details(&req);
    let metrics = req.app_data::<web::Data<Metrics>>().cloned();

    let res = next.call(req).await?;

    let elapsed = start.elapsed();
    let status = res.status().as_u16();
    let route = res
        .request()
        .match_pattern()
        .unwrap_or_else(|| "unknown".to_string());

    if let Some(metrics) = metrics {
        metrics.record_http_request(&method, &route, status, elapsed.as_secs_f64());
    }

    if !QUIET_PATHS.contains(&path.as_str()) {
        tracing::info!(
            method = %method,
            path = %path,
            status = status,
            latency_ms = elapsed.as_millis() as u64,
            client_ip = ?client_ip,
            user_agent = ?user_agent,
            "HTTP request"
        );
    }

    Ok(res)
}

/// Client address (honouring `Forwarded`/`X-Forwarded-For`) and user agent.
fn client_details(req: &ServiceRequest) -> (Option<String>, Option<String>) {
    let client_ip = req.connection_info().realip_remote_addr().map(str::to_string);
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    (client_ip, user_agent)
}

/// Answer CORS preflight requests without reaching the handlers.
pub async fn preflight(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, Error> {
    if req.method() == Method::OPTIONS {
        return Ok(req
            .into_response(HttpResponse::NoContent().finish())
            .map_into_right_body());
    }

    Ok(next.call(req).await?.map_into_left_body())
}

pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"))
        .add(("Access-Control-Allow-Headers", "Content-Type, Authorization"))
}
