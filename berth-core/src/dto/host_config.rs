//! Host configuration fragment of a container-creation request

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::bind::BindSpec;
use crate::domain::link::LinkSpec;
use crate::domain::port::PortBindings;

/// Host configuration built from parsed binds, port bindings and links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    /// Bind mounts in `host:container[:mode]` form
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<String>,

    /// Bindings keyed by `port/protocol`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub port_bindings: BTreeMap<String, Vec<PortBindingDto>>,

    /// Links in `name:alias` form
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

/// Host side of one port binding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBindingDto {
    #[serde(rename = "HostIp", skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Empty when the engine assigns the port
    pub host_port: String,
}

impl HostConfig {
    /// Builds the fragment from parsed records
    pub fn from_specs(binds: &[BindSpec], ports: &PortBindings, links: &[LinkSpec]) -> Self {
        let port_bindings = ports
            .iter()
            .map(|(exposed, host)| {
                let dto = PortBindingDto {
                    host_ip: host.host_ip.clone(),
                    host_port: if host.is_ephemeral() {
                        String::new()
                    } else {
                        host.host_port.to_string()
                    },
                };
                (exposed.to_string(), vec![dto])
            })
            .collect();

        Self {
            binds: binds.iter().map(ToString::to_string).collect(),
            port_bindings,
            links: links.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty() && self.port_bindings.is_empty() && self.links.is_empty()
    }
}

/// `ExposedPorts` set of a creation request: `{"8080/tcp": {}}`
pub fn exposed_ports(ports: &PortBindings) -> serde_json::Map<String, serde_json::Value> {
    ports
        .iter()
        .map(|(exposed, _)| (exposed.to_string(), serde_json::json!({})))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_binds, parse_links, parse_port_bindings};

    #[test]
    fn test_host_config_json_shape() {
        let binds = parse_binds("/src:/workspace:ro").unwrap();
        let ports = parse_port_bindings("127.0.0.1:80:8080\n:9000/udp").unwrap();
        let links = parse_links("db:database").unwrap();

        let config = HostConfig::from_specs(&binds, &ports, &links);
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "Binds": ["/src:/workspace:ro"],
                "PortBindings": {
                    "8080/tcp": [{"HostIp": "127.0.0.1", "HostPort": "80"}],
                    "9000/udp": [{"HostPort": ""}]
                },
                "Links": ["db:database"]
            })
        );
    }

    #[test]
    fn test_bind_strings_parse_back() {
        let binds = parse_binds("/cache dir:/cache\n/src /workspace\n/a:/b:rw").unwrap();
        let config = HostConfig::from_specs(&binds, &PortBindings::new(), &[]);

        let reparsed = parse_binds(&config.binds.join("\n")).unwrap();
        assert_eq!(reparsed, binds);
    }

    #[test]
    fn test_empty_fragment_serializes_to_empty_object() {
        let config = HostConfig::from_specs(&[], &PortBindings::new(), &[]);
        assert!(config.is_empty());
        assert_eq!(serde_json::to_string(&config).unwrap(), "{}");
    }

    #[test]
    fn test_exposed_ports() {
        let ports = parse_port_bindings("80 8080\n53:53/udp").unwrap();
        let exposed = exposed_ports(&ports);

        assert_eq!(exposed.len(), 2);
        assert!(exposed.contains_key("8080/tcp"));
        assert!(exposed.contains_key("53/udp"));
    }
}
