//! Side-channel metadata carried in `#` comments
//!
//! The WireGuard format has no place for a client's private key or the hints
//! needed to build a client config, so they are stored as comments of the
//! fixed form `# <Name> = <value>`. Only the literal prefixes below are
//! recognized; every other comment is operator commentary and stays opaque.

const PRIVATE_KEY_PREFIX: &str = "# PrivateKey = ";
const PUBLIC_KEY_PREFIX: &str = "# PublicKey = ";
const ENDPOINT_PREFIX: &str = "# Endpoint = ";
const NETWORKS_PREFIX: &str = "# Networks = ";

/// A recognized metadata comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataToken {
    /// Peer private key, recorded at creation time
    PrivateKey(String),
    /// Client's own public key, written into generated client configs
    PublicKey(String),
    /// Server endpoint (`host[:port]`) handed to clients
    Endpoint(String),
    /// Networks routed through the tunnel, handed to clients as AllowedIPs
    Networks(String),
}

impl MetadataToken {
    /// Parse a raw line; `None` if it is not a recognized token
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if let Some(value) = line.strip_prefix(PRIVATE_KEY_PREFIX) {
            return Some(MetadataToken::PrivateKey(value.to_string()));
        }
        if let Some(value) = line.strip_prefix(PUBLIC_KEY_PREFIX) {
            return Some(MetadataToken::PublicKey(value.to_string()));
        }
        if let Some(value) = line.strip_prefix(ENDPOINT_PREFIX) {
            return Some(MetadataToken::Endpoint(value.to_string()));
        }
        if let Some(value) = line.strip_prefix(NETWORKS_PREFIX) {
            return Some(MetadataToken::Networks(value.to_string()));
        }
        None
    }

    pub fn render(&self) -> String {
        match self {
            MetadataToken::PrivateKey(v) => format!("{}{}", PRIVATE_KEY_PREFIX, v),
            MetadataToken::PublicKey(v) => format!("{}{}", PUBLIC_KEY_PREFIX, v),
            MetadataToken::Endpoint(v) => format!("{}{}", ENDPOINT_PREFIX, v),
            MetadataToken::Networks(v) => format!("{}{}", NETWORKS_PREFIX, v),
        }
    }
}

/// Whether a raw line is a comment
pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Render a description as a leading comment line
pub fn description_comment(description: &str) -> String {
    format!("# {}", description)
}

/// Extract the description text from a leading comment line
pub fn description_of(line: &str) -> Option<String> {
    let rest = line.trim_start().strip_prefix('#')?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    Some(rest.trim_end_matches('\r').to_string())
}
