//! Port binding grammar
//!
//! One record per line:
//! ```text
//! [hostIp:][hostPort](':' | whitespace)containerPort[/protocol]
//! ```
//! - `hostIp` must look like a dotted quad; octet ranges are not checked
//! - `hostPort` may be omitted, meaning an engine-assigned port (0)
//! - `protocol` is `tcp` (default) or `udp`
//!
//! Records collapse into [`PortBindings`] keyed by container port and
//! protocol; a later record for the same key silently replaces an earlier one.

use super::{RecordError, line_records, parse_batch, parse_one, two_pass};
use crate::domain::port::{PortBindingSpec, PortBindings, Protocol};
use crate::error::{GrammarKind, Result};

/// Parse a batch of port bindings into a mapping
///
/// # Example
/// ```
/// use berth_core::domain::ExposedPort;
/// use berth_core::parser::parse_port_bindings;
///
/// let bindings = parse_port_bindings("80 8080\n81 8081")?;
/// assert_eq!(bindings.len(), 2);
/// assert_eq!(bindings.get(&ExposedPort::tcp(8080)).unwrap().host_port, 80);
/// # Ok::<(), berth_core::GrammarError>(())
/// ```
pub fn parse_port_bindings(input: &str) -> Result<PortBindings> {
    Ok(parse_port_specs(input)?.into_iter().collect())
}

/// Parse a batch of port bindings, keeping every record in input order
pub fn parse_port_specs(input: &str) -> Result<Vec<PortBindingSpec>> {
    parse_batch(GrammarKind::PortBinding, line_records(input), parse_record)
}

pub(crate) fn parse_single(text: &str) -> Result<PortBindingSpec> {
    parse_one(GrammarKind::PortBinding, text, parse_record)
}

fn parse_record(text: &str) -> std::result::Result<PortBindingSpec, RecordError> {
    let (head, protocol) = match text.rsplit_once('/') {
        Some((head, protocol)) => (head.trim(), parse_protocol(protocol.trim())?),
        None => (text, Protocol::Tcp),
    };

    let (host_ip, host_port, container_port) = two_pass(head, split_on_colon, split_on_whitespace)?;

    Ok(PortBindingSpec {
        host_ip,
        host_port,
        container_port,
        protocol,
    })
}

type Fields = (Option<String>, u16, u16);

fn split_on_colon(head: &str) -> std::result::Result<Fields, RecordError> {
    let (host, container) = head
        .rsplit_once(':')
        .ok_or_else(|| RecordError::Shape("no ':' before the container port".to_string()))?;
    fields(host, container)
}

fn split_on_whitespace(head: &str) -> std::result::Result<Fields, RecordError> {
    let (host, container) = head
        .trim()
        .rsplit_once(char::is_whitespace)
        .ok_or_else(|| RecordError::Shape("no whitespace before the container port".to_string()))?;
    fields(host.trim_end(), container)
}

fn fields(host: &str, container: &str) -> std::result::Result<Fields, RecordError> {
    let container_port = parse_container_port(container)?;

    let (host_ip, host_port) = match host.rsplit_once(':') {
        Some((ip, port)) => {
            if !is_dotted_quad(ip) {
                return Err(RecordError::Token(format!(
                    "host IP '{}' is not a dotted-quad address",
                    ip
                )));
            }
            (Some(ip.to_string()), parse_host_port(port)?)
        }
        None => (None, parse_host_port(host)?),
    };

    Ok((host_ip, host_port, container_port))
}

fn parse_protocol(token: &str) -> std::result::Result<Protocol, RecordError> {
    match token {
        "tcp" => Ok(Protocol::Tcp),
        "udp" => Ok(Protocol::Udp),
        other => Err(RecordError::Token(format!(
            "protocol must be 'tcp' or 'udp', found '{}'",
            other
        ))),
    }
}

fn parse_host_port(token: &str) -> std::result::Result<u16, RecordError> {
    if token.is_empty() {
        return Ok(0);
    }
    parse_port_number(token, "host port")
}

fn parse_container_port(token: &str) -> std::result::Result<u16, RecordError> {
    if token.is_empty() {
        return Err(RecordError::Empty("container port"));
    }
    match parse_port_number(token, "container port")? {
        0 => Err(RecordError::Token("container port must be positive".to_string())),
        port => Ok(port),
    }
}

fn parse_port_number(token: &str, field: &str) -> std::result::Result<u16, RecordError> {
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RecordError::Token(format!(
            "{} '{}' is not a number",
            field, token
        )));
    }
    token
        .parse()
        .map_err(|_| RecordError::Token(format!("{} '{}' is out of range", field, token)))
}

/// Four dot-separated groups of one to three digits
fn is_dotted_quad(token: &str) -> bool {
    let groups: Vec<&str> = token.split('.').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::port::ExposedPort;
    use crate::error::GrammarError;

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_port_bindings("").unwrap().is_empty());
    }

    #[test]
    fn test_two_space_separated_bindings() {
        let bindings = parse_port_bindings("80 8080\n81 8081").unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings.get(&ExposedPort::tcp(8080)).unwrap().host_port, 80);
        assert_eq!(bindings.get(&ExposedPort::tcp(8081)).unwrap().host_port, 81);
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let bindings = parse_port_bindings("80 8080\n90 8080").unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get(&ExposedPort::tcp(8080)).unwrap().host_port, 90);
    }

    #[test]
    fn test_colon_forms() {
        let specs = parse_port_specs("80:8080\n127.0.0.1:81:8081/udp\n10.0.0.1::9000\n:7000")
            .unwrap();

        assert_eq!(specs[0].host_port, 80);
        assert_eq!(specs[0].container_port, 8080);
        assert_eq!(specs[0].host_ip, None);

        assert_eq!(specs[1].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(specs[1].host_port, 81);
        assert_eq!(specs[1].protocol, Protocol::Udp);

        assert_eq!(specs[2].host_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(specs[2].host_port, 0);
        assert_eq!(specs[2].container_port, 9000);

        assert_eq!(specs[3].host_port, 0);
        assert_eq!(specs[3].container_port, 7000);
    }

    #[test]
    fn test_mixed_delimiters_fall_back_to_whitespace() {
        let spec = parse_single("127.0.0.1:80 8080/udp").unwrap();
        assert_eq!(spec.host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(spec.host_port, 80);
        assert_eq!(spec.container_port, 8080);
        assert_eq!(spec.protocol, Protocol::Udp);
    }

    #[test]
    fn test_octets_are_not_range_checked() {
        let spec = parse_single("999.1.1.1:80:8080").unwrap();
        assert_eq!(spec.host_ip.as_deref(), Some("999.1.1.1"));
    }

    #[test]
    fn test_rejects_malformed_records() {
        for record in [
            "8080",
            "80:8080/sctp",
            "80:0",
            "80:70000",
            "localhost:80:8080",
            "80:http",
            "80:+81",
        ] {
            assert!(
                matches!(
                    parse_port_bindings(record),
                    Err(GrammarError::MalformedRecord { .. })
                ),
                "expected '{}' to be malformed",
                record
            );
        }
    }

    #[test]
    fn test_empty_container_port() {
        let err = parse_port_bindings("80:").unwrap_err();
        assert!(matches!(
            err,
            GrammarError::EmptyRequiredField {
                field: "container port",
                ..
            }
        ));
    }

    #[test]
    fn test_error_names_offending_line() {
        let err = parse_port_bindings("80 8080\r\nbogus\r\n81 8081").unwrap_err();
        assert_eq!(err.record(), 2);
        assert_eq!(err.text(), "bogus");
    }

    #[test]
    fn test_display_round_trips() {
        for record in ["80:8080/tcp", "127.0.0.1::9000/udp", ":7000/tcp"] {
            assert_eq!(parse_single(record).unwrap().to_string(), record);
        }
    }
}
