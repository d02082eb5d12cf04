//! Origin resolution.
//!
//! The signer shows the user *who* is asking to pair or sign.  That identity
//! is the host the client runs under when there is one, or the plugin name
//! otherwise.  A leading `www.` is dropped so `www.example.com` and
//! `example.com` pair as the same origin.

/// Resolves the origin presented to the signer.
///
/// `hostname` wins when it is present, non-empty, and not `localhost`;
/// otherwise `plugin` is used.
///
/// # Examples
///
/// ```rust
/// use chainx_signer_core::resolve_origin;
///
/// assert_eq!(resolve_origin(Some("www.example.com"), "wallet"), "example.com");
/// assert_eq!(resolve_origin(Some("localhost"), "wallet"), "wallet");
/// assert_eq!(resolve_origin(None, "wallet"), "wallet");
/// ```
pub fn resolve_origin(hostname: Option<&str>, plugin: &str) -> String {
    let origin = match hostname {
        Some(host) if !host.is_empty() && host != "localhost" => host,
        _ => plugin,
    };
    origin.strip_prefix("www.").unwrap_or(origin).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_www_prefix_is_stripped() {
        assert_eq!(resolve_origin(Some("www.example.com"), "p"), "example.com");
    }

    #[test]
    fn test_plain_hostname_is_kept() {
        assert_eq!(resolve_origin(Some("dapp.chainx.org"), "p"), "dapp.chainx.org");
    }

    #[test]
    fn test_inner_www_is_not_touched() {
        assert_eq!(resolve_origin(Some("app.www.io"), "p"), "app.www.io");
    }

    #[test]
    fn test_empty_hostname_falls_back_to_plugin() {
        assert_eq!(resolve_origin(Some(""), "wallet"), "wallet");
    }

    #[test]
    fn test_localhost_falls_back_to_plugin() {
        assert_eq!(resolve_origin(Some("localhost"), "wallet"), "wallet");
    }

    #[test]
    fn test_plugin_name_with_www_prefix_is_stripped_too() {
        assert_eq!(resolve_origin(None, "www.wallet"), "wallet");
    }
}
