//! Worker identity helpers
//!
//! A worker is identified in the membership table by `hostname:sync_port`.

/// Build the membership identity of a worker
///
/// # Examples
///
/// ```
/// use pantry_common::worker_identity;
///
/// assert_eq!(worker_identity("host-a", 9001), "host-a:9001");
/// ```
pub fn worker_identity(hostname: &str, sync_port: u16) -> String {
    format!("{hostname}:{sync_port}")
}

/// Split an identity back into hostname and sync port
///
/// The port is taken after the last colon. Returns `None` when the
/// identity has no colon, an empty hostname, or a port that is not a
/// valid `u16`.
///
/// # Examples
///
/// ```
/// use pantry_common::parse_identity;
///
/// assert_eq!(parse_identity("host-b:9001"), Some(("host-b", 9001)));
/// assert_eq!(parse_identity("host-b"), None);
/// ```
pub fn parse_identity(identity: &str) -> Option<(&str, u16)> {
    let (hostname, port) = identity.rsplit_once(':')?;
    if hostname.is_empty() {
        return None;
    }
    let port = port.parse::<u16>().ok()?;
    Some((hostname, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_identity() {
        assert_eq!(worker_identity("localhost", 8081), "localhost:8081");
    }

    #[test]
    fn test_parse_identity() {
        assert_eq!(parse_identity("host-a:9001"), Some(("host-a", 9001)));
        assert_eq!(parse_identity("10.0.0.7:65535"), Some(("10.0.0.7", 65535)));
    }

    #[test]
    fn test_parse_identity_malformed() {
        assert_eq!(parse_identity("no-port"), None);
        assert_eq!(parse_identity(":9001"), None);
        assert_eq!(parse_identity("host:"), None);
        assert_eq!(parse_identity("host:70000"), None);
        assert_eq!(parse_identity("host:abc"), None);
    }
}
