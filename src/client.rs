// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Best-effort client identification for rate limiting and access logs.

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Identifier shared by every client whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Extract the client IP from proxy headers.
///
/// Uses the first `X-Forwarded-For` entry, then `X-Real-IP`. Anything that
/// does not parse as an IP address degrades to [`UNKNOWN_CLIENT`], which
/// puts the request in a shared bucket instead of failing it.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());

    let real_ip = headers.get("x-real-ip").and_then(|v| v.to_str().ok());

    forwarded
        .into_iter()
        .chain(real_ip)
        .filter_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
        .map(|ip| ip.to_string())
        .next()
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
