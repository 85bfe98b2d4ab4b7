//! Host candidate ordering shared by dump and restore.
//!
//! Local servers frequently listen on the IPv6 loopback first, so `::1` leads
//! the list; the configured host follows unless it is the `localhost` alias,
//! and the IPv4 loopback closes it.

pub const IPV6_LOOPBACK: &str = "::1";
pub const IPV4_LOOPBACK: &str = "127.0.0.1";
const LOCALHOST_ALIAS: &str = "localhost";

/// Ordered, de-duplicated hosts to attempt for `configured_host`.
pub fn build_candidates(configured_host: &str) -> Vec<String> {
    let configured = configured_host.trim();

    let mut ordered = vec![IPV6_LOOPBACK];
    if configured != LOCALHOST_ALIAS && !configured.is_empty() {
        ordered.push(configured);
    }
    ordered.push(IPV4_LOOPBACK);

    let mut candidates: Vec<String> = Vec::with_capacity(ordered.len());
    for host in ordered {
        if !candidates.iter().any(|c| c == host) {
            candidates.push(host.to_string());
        }
    }
    candidates
}
