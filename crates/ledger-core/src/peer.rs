//! Peer address handling.

use url::Url;

/// Extract the network location (`host[:port]`) from a URL-like address.
///
/// Userinfo, path, query and fragment are dropped; IPv6 hosts keep their
/// brackets. Addresses without a host (e.g. `a:5000`) have no location.
pub fn network_location(address: &str) -> Option<String> {
    let url = Url::parse(address.trim()).ok()?;
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
