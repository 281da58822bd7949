//! Port binding records
//!
//! A batch of [`PortBindingSpec`] collapses into [`PortBindings`], a mapping
//! keyed by container port and protocol. Later bindings for the same key
//! replace earlier ones.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::GrammarError;

/// Transport protocol of an exposed port
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// One parsed port binding record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBindingSpec {
    /// Host interface, dotted-quad shaped (octets are not range checked)
    pub host_ip: Option<String>,
    /// Host port; 0 lets the engine pick an ephemeral port
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortBindingSpec {
    pub fn exposed_port(&self) -> ExposedPort {
        ExposedPort {
            port: self.container_port,
            protocol: self.protocol,
        }
    }

    pub fn host_binding(&self) -> HostBinding {
        HostBinding {
            host_ip: self.host_ip.clone(),
            host_port: self.host_port,
        }
    }
}

/// Engine form: `[ip:]hostPort:containerPort/protocol`
impl std::fmt::Display for PortBindingSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ip) = &self.host_ip {
            write!(f, "{}:", ip)?;
        }
        if self.host_port != 0 {
            write!(f, "{}", self.host_port)?;
        }
        write!(f, ":{}/{}", self.container_port, self.protocol)
    }
}

impl std::str::FromStr for PortBindingSpec {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::port::parse_single(s)
    }
}

/// Container-side key of a port binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExposedPort {
    pub port: u16,
    pub protocol: Protocol,
}

impl ExposedPort {
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self { port, protocol }
    }

    pub fn tcp(port: u16) -> Self {
        Self::new(port, Protocol::Tcp)
    }

    pub fn udp(port: u16) -> Self {
        Self::new(port, Protocol::Udp)
    }
}

/// Engine key form: `8080/tcp`
impl std::fmt::Display for ExposedPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// Host side of a port binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBinding {
    pub host_ip: Option<String>,
    pub host_port: u16,
}

impl HostBinding {
    /// Whether the engine assigns the host port
    pub fn is_ephemeral(&self) -> bool {
        self.host_port == 0
    }
}

/// Port bindings keyed by container port and protocol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortBindings {
    entries: BTreeMap<ExposedPort, HostBinding>,
}

impl PortBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a binding, replacing any earlier one for the same key
    ///
    /// # Returns
    /// The binding that was replaced, if any
    pub fn insert(&mut self, spec: PortBindingSpec) -> Option<HostBinding> {
        self.entries.insert(spec.exposed_port(), spec.host_binding())
    }

    pub fn get(&self, key: &ExposedPort) -> Option<&HostBinding> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates bindings ordered by container port, then protocol
    pub fn iter(&self) -> impl Iterator<Item = (&ExposedPort, &HostBinding)> {
        self.entries.iter()
    }

    /// Flattens the mapping back into records
    pub fn to_specs(&self) -> Vec<PortBindingSpec> {
        self.entries
            .iter()
            .map(|(exposed, host)| PortBindingSpec {
                host_ip: host.host_ip.clone(),
                host_port: host.host_port,
                container_port: exposed.port,
                protocol: exposed.protocol,
            })
            .collect()
    }
}

impl FromIterator<PortBindingSpec> for PortBindings {
    fn from_iter<I: IntoIterator<Item = PortBindingSpec>>(iter: I) -> Self {
        let mut bindings = PortBindings::new();
        for spec in iter {
            bindings.insert(spec);
        }
        bindings
    }
}
