//! Splitting `host:port` strings.

use crate::error::Error;

/// Split `host:port` into its host and numeric port.
///
/// IPv6 hosts must be bracketed (`[::1]:443`); the brackets are stripped from
/// the returned host. The host may not be empty.
pub(crate) fn split_host_port(hostport: &str) -> Result<(&str, u16), Error> {
    let (host, port) = if let Some(rest) = hostport.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| Error::invalid_address(hostport, "missing ']' in address"))?;
        let host = &rest[..end];
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or_else(|| Error::invalid_address(hostport, "missing port in address"))?;
        if host.contains(['[', ']']) {
            return Err(Error::invalid_address(hostport, "unexpected '[' in address"));
        }
        (host, port)
    } else {
        let (host, port) = hostport
            .rsplit_once(':')
            .ok_or_else(|| Error::invalid_address(hostport, "missing port in address"))?;
        if host.contains(':') {
            return Err(Error::invalid_address(hostport, "too many colons in address"));
        }
        if host.contains(['[', ']']) {
            return Err(Error::invalid_address(hostport, "unexpected bracket in address"));
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(Error::invalid_address(hostport, "empty host"));
    }

    let port = parse_port(port).ok_or_else(|| {
        Error::invalid_address(hostport, format!("invalid port {:?}", port))
    })?;

    Ok((host, port))
}

fn parse_port(port: &str) -> Option<u16> {
    // u16::from_str accepts a leading '+'
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    port.parse().ok()
}
