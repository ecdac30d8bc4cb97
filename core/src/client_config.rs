//! Client configuration generation

use crate::metadata::{description_comment, MetadataToken};

/// Listen port written into every client config
pub const CLIENT_LISTEN_PORT: u16 = 51820;

/// Keepalive written into every client config
pub const CLIENT_KEEPALIVE_SECS: u16 = 25;

/// Everything a client config is made of
#[derive(Debug, Clone, Copy)]
pub struct ClientConfigInput<'a> {
    pub description: &'a str,
    /// Recovered from the peer's `# PrivateKey = ` comment
    pub private_key: &'a str,
    pub public_key: &'a str,
    /// Peer address with the server's prefix length, e.g. `192.168.0.5/24`
    pub address: &'a str,
    pub endpoint: &'a str,
    pub server_public_key: &'a str,
    pub preshared_key: &'a str,
    /// Networks routed through the tunnel
    pub networks: &'a str,
}

/// Builder for standalone client config files
#[derive(Debug)]
pub struct ClientConfigBuilder;

impl ClientConfigBuilder {
    /// Generate the client config text
    pub fn generate(input: &ClientConfigInput<'_>) -> String {
        let mut lines = Vec::new();

        lines.push(description_comment(input.description));
        lines.push("[Interface]".to_string());
        lines.push(format!("ListenPort = {}", CLIENT_LISTEN_PORT));
        lines.push(format!("PrivateKey = {}", input.private_key));
        lines.push(MetadataToken::PublicKey(input.public_key.to_string()).render());
        lines.push(format!("Address = {}", input.address));
        lines.push(String::new());

        lines.push("[Peer]".to_string());
        lines.push(format!("Endpoint = {}", input.endpoint));
        lines.push(format!("PublicKey = {}", input.server_public_key));
        lines.push(format!("PresharedKey = {}", input.preshared_key));
        lines.push(format!("AllowedIPs = {}", input.networks));
        lines.push(format!("PersistentKeepalive = {}", CLIENT_KEEPALIVE_SECS));
        lines.push(String::new());

        lines.join("\n")
    }

    /// File name offered for download / written to the artifact directory
    pub fn file_name(id: &str) -> String {
        format!("wg_{}.conf", id)
    }
}
