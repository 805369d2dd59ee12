use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors raised when a configured target URL is not fetchable.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points at localhost or a private network while the policy
    /// only allows public hosts.
    #[error("Non-public host not allowed: {0}")]
    NonPublicHost(String),
}

/// Which hosts a target may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostPolicy {
    /// Reject localhost, loopback, link-local and private ranges.
    #[default]
    PublicOnly,
    /// Accept any host. Used for local mirrors and test servers.
    AllowPrivate,
}

impl HostPolicy {
    pub fn from_allow_private(allow: bool) -> Self {
        if allow {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        }
    }
}

/// Validates a target URL before it is handed to the fetcher.
///
/// Only `http` and `https` are accepted. Under [`HostPolicy::PublicOnly`]
/// the host must not be `localhost` or an address in a loopback, private,
/// link-local, unique-local or unspecified range.
///
/// # Errors
///
/// Returns [`UrlValidationError`] describing the first rule the URL breaks.
///
/// # Examples
///
/// ```
/// use driftfeed::util::{validate_target_url, HostPolicy};
///
/// let url = validate_target_url("https://example.com/rss.xml", HostPolicy::PublicOnly).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_target_url("http://127.0.0.1/rss.xml", HostPolicy::PublicOnly).is_err());
/// assert!(validate_target_url("http://127.0.0.1/rss.xml", HostPolicy::AllowPrivate).is_ok());
/// assert!(validate_target_url("file:///etc/passwd", HostPolicy::AllowPrivate).is_err());
/// ```
pub fn validate_target_url(url_str: &str, policy: HostPolicy) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

    if policy == HostPolicy::PublicOnly && !is_public_host(host) {
        return Err(UrlValidationError::NonPublicHost(host.to_owned()));
    }

    Ok(url)
}

fn is_public_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return false;
    }

    // IPv6 hosts come back bracketed from `Url::host_str`
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    match bare.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified())
        }
        Ok(IpAddr::V6(v6)) => {
            let first = v6.segments()[0];
            let unique_local = (first & 0xfe00) == 0xfc00;
            let link_local = (first & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
        Err(_) => true,
    }
}
