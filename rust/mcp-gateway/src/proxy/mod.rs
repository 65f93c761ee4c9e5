//! Stateless request/response translation between the client and the pinned
//! backend instance.
//!
//! Bodies are pumped through as streams in both directions; nothing here
//! materializes a body in memory. Dropping the in-flight future (client
//! disconnect) drops both streams and releases the connections on either
//! side.

use std::net::IpAddr;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Uri};
use axum::response::Response;
use url::Url;

use crate::error::{GatewayError, GatewayResult};

/// Provenance recorded on every outbound request.
#[derive(Debug, Clone)]
pub struct ForwardedParts {
    /// Address the client connected from.
    pub client_ip: IpAddr,
    /// Scheme the client used against the gateway.
    pub proto: String,
    /// Host the client addressed.
    pub host: String,
}

impl ForwardedParts {
    /// Capture the provenance of an inbound request.
    pub fn from_request<B>(request: &Request<B>, client_ip: IpAddr) -> Self {
        let proto = request
            .uri()
            .scheme_str()
            .unwrap_or("http")
            .to_string();
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Self {
            client_ip,
            proto,
            host,
        }
    }

    /// `Forwarded` header value: `for=<ip>;proto=<scheme>;host=<host>`.
    fn header_value(&self) -> GatewayResult<HeaderValue> {
        HeaderValue::from_str(&format!(
            "for={};proto={};host={}",
            self.client_ip, self.proto, self.host
        ))
        .map_err(|e| GatewayError::Internal(e.into()))
    }
}

/// Rewrite an inbound URI onto `target`, keeping path and query intact.
pub fn target_url(target: &str, inbound: &Uri) -> GatewayResult<Url> {
    let mut url = Url::parse(target).map_err(|e| GatewayError::Internal(e.into()))?;
    url.set_path(inbound.path());
    url.set_query(inbound.query());
    Ok(url)
}

/// Build the outbound request for the chosen backend.
///
/// The method is preserved and `rewrite` maps the inbound URI onto the
/// backend. The body is attached as a stream whenever the inbound request
/// declares a positive `Content-Length` or uses chunked transfer encoding.
/// All inbound headers are copied except `Authorization` (client
/// credentials stop at the gateway) and `Transfer-Encoding` (outbound
/// framing is recomputed by the HTTP client); a `Forwarded` entry is
/// appended after any the request already carried.
pub fn build_proxied_request<F>(
    client: &reqwest::Client,
    inbound: Request<Body>,
    rewrite: F,
    forwarded: &ForwardedParts,
) -> GatewayResult<reqwest::Request>
where
    F: FnOnce(&Uri) -> GatewayResult<Url>,
{
    let (parts, body) = inbound.into_parts();
    let url = rewrite(&parts.uri)?;

    // A chunked inbound body carries no Content-Length; either signal means
    // there are bytes to pump through.
    let has_transfer_encoding = parts.headers.contains_key(header::TRANSFER_ENCODING);
    let has_body = declared_content_length(&parts.headers).is_some_and(|len| len > 0);

    let mut builder = client.request(parts.method, url);
    if has_body || has_transfer_encoding {
        builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let mut request = builder.build().map_err(|e| GatewayError::Internal(e.into()))?;

    let headers = request.headers_mut();
    for (name, value) in &parts.headers {
        if name == header::AUTHORIZATION || name == header::TRANSFER_ENCODING {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.append(header::FORWARDED, forwarded.header_value()?);

    Ok(request)
}

/// Copy the upstream response onto a client-facing response.
///
/// Status and headers are copied verbatim apart from `Transfer-Encoding`:
/// the serving layer recomputes its own framing, and relaying the stale
/// value would corrupt the client-facing response. The body is streamed
/// through without buffering.
pub fn relay_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    headers.remove(header::TRANSFER_ENCODING);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn declared_content_length(headers: &axum::http::HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
