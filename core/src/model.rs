//! Domain model types for the WireGuard roadwarrior frontend

use crate::document::{InterfaceSection, PeerSection};
use crate::metadata::{self, description_comment, MetadataToken};
use ipnet::IpNet;
use serde::Serialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Client data derived from a `[Peer]` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerDescriptor {
    pub description: String,
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    pub public_key: String,
    #[serde(skip_serializing)]
    pub preshared_key: Option<String>,
    /// Peer address with the interface's prefix length
    pub address: Option<IpNet>,
    /// URL-safe identifier derived from the address
    pub id: Option<String>,
    pub qr_code_path: Option<PathBuf>,
}

impl PeerDescriptor {
    pub fn from_section(peer: &PeerSection, prefix_len: u8, libdir: &Path) -> Self {
        let description = peer
            .leading_comment
            .as_deref()
            .and_then(metadata::description_of)
            .unwrap_or_else(|| format!("Peer: {}", peer.public_key));

        let address = peer
            .address()
            .map(|ip| IpNet::new(ip, prefix_len).unwrap_or_else(|_| IpNet::from(ip)));
        let id = address.map(|net| peer_id(&net.addr()));
        let qr_code_path = id.as_ref().map(|id| libdir.join(format!("{}.png", id)));

        Self {
            description,
            private_key: peer.private_key.clone(),
            public_key: peer.public_key.clone(),
            preshared_key: peer.preshared_key.clone(),
            address,
            id,
            qr_code_path,
        }
    }

    /// Path of the generated client config file
    pub fn config_path(&self, libdir: &Path) -> Option<PathBuf> {
        self.id
            .as_ref()
            .map(|id| libdir.join(crate::ClientConfigBuilder::file_name(id)))
    }
}

/// Server data derived from the `[Interface]` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceDescriptor {
    pub address: Option<String>,
    pub listen_port: Option<u16>,
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    pub endpoint: Option<String>,
    pub networks: Option<String>,
}

impl From<&InterfaceSection> for InterfaceDescriptor {
    fn from(section: &InterfaceSection) -> Self {
        Self {
            address: section.address.clone(),
            listen_port: section.listen_port,
            private_key: section.private_key.clone(),
            endpoint: section.endpoint.clone(),
            networks: section.networks.clone(),
        }
    }
}

/// URL-safe identifier for a peer address (`192.168.0.5` -> `192-168-0-5`)
pub fn peer_id(addr: &IpAddr) -> String {
    addr.to_string().replace(['.', ':'], "-")
}

/// Validates a peer identifier as produced by [`peer_id`]
pub fn validate_peer_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("Peer id cannot be empty".to_string());
    }

    let re = regex::Regex::new(r"^[0-9a-fA-F-]+$").unwrap();
    if !re.is_match(id) {
        return Err("Peer id must contain only hex digits and hyphens".to_string());
    }

    Ok(())
}

/// Validates a peer description before it is written as a comment line
pub fn validate_description(description: &str) -> Result<(), String> {
    if description.contains('\n') || description.contains('\r') {
        return Err("Description must be a single line".to_string());
    }

    if MetadataToken::parse(&description_comment(description)).is_some() {
        return Err("Description must not look like a metadata comment".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigDocument;

    const CONF: &str = "[Interface]
Address = 192.168.0.1/24

# Alice laptop
[Peer]
PublicKey = alicePublicKey=
PresharedKey = alicePsk=
# PrivateKey = alicePrivateKey=
AllowedIPs = 192.168.0.5/32, 10.1.0.0/16

[Peer]
PublicKey = anonPublicKey=
";

    #[test]
    fn test_descriptor_from_section() {
        let doc = ConfigDocument::parse("/tmp/wg.conf", CONF).unwrap();
        let peer = doc.peer("alicePublicKey=").unwrap();
        let d = PeerDescriptor::from_section(peer, 24, Path::new("/var/lib/wgfrontend"));

        assert_eq!(d.description, "Alice laptop");
        assert_eq!(d.private_key.as_deref(), Some("alicePrivateKey="));
        assert_eq!(d.preshared_key.as_deref(), Some("alicePsk="));
        assert_eq!(d.address.unwrap().to_string(), "192.168.0.5/24");
        assert_eq!(d.id.as_deref(), Some("192-168-0-5"));
        assert_eq!(
            d.qr_code_path,
            Some(PathBuf::from("/var/lib/wgfrontend/192-168-0-5.png"))
        );
        assert_eq!(
            d.config_path(Path::new("/var/lib/wgfrontend")),
            Some(PathBuf::from("/var/lib/wgfrontend/wg_192-168-0-5.conf"))
        );
    }

    #[test]
    fn test_descriptor_without_comment_or_address() {
        let doc = ConfigDocument::parse("/tmp/wg.conf", CONF).unwrap();
        let peer = doc.peer("anonPublicKey=").unwrap();
        let d = PeerDescriptor::from_section(peer, 24, Path::new("/tmp"));

        assert_eq!(d.description, "Peer: anonPublicKey=");
        assert!(d.address.is_none());
        assert!(d.id.is_none());
        assert!(d.qr_code_path.is_none());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let doc = ConfigDocument::parse("/tmp/wg.conf", CONF).unwrap();
        let peer = doc.peer("alicePublicKey=").unwrap();
        let d = PeerDescriptor::from_section(peer, 24, Path::new("/tmp"));
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("alicePrivateKey="));
        assert!(!json.contains("alicePsk="));
        assert!(json.contains("192-168-0-5"));
    }

    #[test]
    fn test_peer_id() {
        assert_eq!(peer_id(&"192.168.0.5".parse().unwrap()), "192-168-0-5");
        assert_eq!(peer_id(&"fd00::2".parse().unwrap()), "fd00--2");
    }

    #[test]
    fn test_validate_peer_id() {
        assert!(validate_peer_id("192-168-0-5").is_ok());
        assert!(validate_peer_id("").is_err());
        assert!(validate_peer_id("../etc/passwd").is_err());
    }

    #[test]
    fn test_validate_description() {
        assert!(validate_description("My new client").is_ok());
        assert!(validate_description("").is_ok());
        assert!(validate_description("two\nlines").is_err());
        assert!(validate_description("PrivateKey = sneaky").is_err());
    }
}
