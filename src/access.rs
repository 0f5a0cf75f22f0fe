//! Coarse network-origin check.
//!
//! The display lives on the local network, so requests from anywhere else
//! are refused before routing. The check is a plain string prefix match on
//! the peer IP address (`"192.168."`, `"10.0.0."`, `"127.0.0.1"`, ...).
//!
//! # Usage
//!
//! ```rust,ignore
//! use axum::middleware;
//! use framed::access::{filter_origin, OriginPolicy};
//!
//! let app = router.layer(middleware::from_fn_with_state(
//!     Arc::new(OriginPolicy::new(["192.168."])),
//!     filter_origin,
//! ));
//! ```
//!
//! The peer address comes from `ConnectInfo<SocketAddr>`, so the router must
//! be served with `into_make_service_with_connect_info::<SocketAddr>()`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Body sent with every 403.
pub const DENIED_BODY: &str = "Not allowed!";

/// Allow-list of peer address prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::new(["192.168."])
    }
}

impl OriginPolicy {
    /// Allow peers whose address starts with any of `prefixes`.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Allow every peer.
    pub fn allow_all() -> Self {
        Self::new([""])
    }

    /// Configured prefixes.
    pub fn prefixes(&self) -> &[String] {
        &self.allowed
    }

    /// Check a peer address.
    ///
    /// IPv4-mapped IPv6 addresses are checked in their IPv4 form.
    ///
    /// # Example
    ///
    /// ```
    /// use framed::access::OriginPolicy;
    ///
    /// let policy = OriginPolicy::default();
    /// assert!(policy.allows(&"192.168.1.20".parse().unwrap()));
    /// assert!(!policy.allows(&"10.0.0.5".parse().unwrap()));
    /// ```
    pub fn allows(&self, ip: &IpAddr) -> bool {
        let ip = match ip {
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(IpAddr::V4)
                .unwrap_or(IpAddr::V6(*v6)),
            v4 => *v4,
        };
        let addr = ip.to_string();
        self.allowed.iter().any(|prefix| addr.starts_with(prefix.as_str()))
    }
}

/// Refuse requests from peers outside the policy with a plain-text 403.
///
/// Runs ahead of everything else: a refused request is logged once and
/// never reaches request tracing, header logging or any handler.
pub async fn filter_origin(
    State(policy): State<Arc<OriginPolicy>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !policy.allows(&peer.ip()) {
        tracing::warn!(remote = %peer, "Request denied outright");
        return (
            StatusCode::FORBIDDEN,
            [(header::CONTENT_TYPE, "text/plain")],
            DENIED_BODY,
        )
            .into_response();
    }

    tracing::info!(remote = %peer.ip(), method = %request.method(), uri = %request.uri(), "Request");
    for (name, value) in request.headers() {
        tracing::debug!("    {}: {:?}", name, value);
    }

    next.run(request).await
}
