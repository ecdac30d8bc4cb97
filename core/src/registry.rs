//! Peer lifecycle on top of a [`ConfigDocument`]
//!
//! The registry holds the collaborators (key source, artifact directory,
//! hooks) but not the document: every operation borrows the document it works
//! on, so the borrow checker enforces a single writer. Hosts that serve
//! concurrent requests keep the document behind their own lock.

use crate::client_config::{ClientConfigBuilder, ClientConfigInput, CLIENT_KEEPALIVE_SECS};
use crate::metadata::{description_comment, MetadataToken};
use crate::model::{self, InterfaceDescriptor, PeerDescriptor};
use crate::notify::ChangeNotifier;
use crate::{storage, AddressAllocator, ConfigDocument, Error, KeyProvider, Result};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Turns client config text into a QR code image
pub trait QrRenderer: Send + Sync {
    fn render(&self, config_text: &str) -> Result<Vec<u8>>;
}

/// Peer create/read/update/delete
pub struct PeerRegistry {
    keys: Box<dyn KeyProvider>,
    libdir: PathBuf,
    notifier: Option<Box<dyn ChangeNotifier>>,
    qr_renderer: Option<Box<dyn QrRenderer>>,
}

impl PeerRegistry {
    /// Create a registry writing client artifacts below `libdir`
    pub fn new(keys: impl KeyProvider + 'static, libdir: impl Into<PathBuf>) -> Self {
        Self {
            keys: Box::new(keys),
            libdir: libdir.into(),
            notifier: None,
            qr_renderer: None,
        }
    }

    pub fn with_notifier(mut self, notifier: impl ChangeNotifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn with_qr_renderer(mut self, renderer: impl QrRenderer + 'static) -> Self {
        self.qr_renderer = Some(Box::new(renderer));
        self
    }

    pub fn libdir(&self) -> &Path {
        &self.libdir
    }

    // ==================== Reads ====================

    pub fn interface(&self, doc: &ConfigDocument) -> InterfaceDescriptor {
        InterfaceDescriptor::from(doc.interface())
    }

    /// Public key derived from the server's private key
    pub fn server_public_key(&self, doc: &ConfigDocument) -> Result<String> {
        let private_key = doc
            .interface()
            .private_key
            .as_deref()
            .ok_or_else(|| Error::validation("[Interface] has no PrivateKey"))?;
        self.keys.public_key_of(private_key)
    }

    pub fn get_peer(&self, doc: &ConfigDocument, public_key: &str) -> Result<Option<PeerDescriptor>> {
        let Some(peer) = doc.peer(public_key) else {
            return Ok(None);
        };
        let prefix_len = doc.interface().network()?.prefix_len();
        Ok(Some(PeerDescriptor::from_section(peer, prefix_len, &self.libdir)))
    }

    /// All peers in file order
    pub fn list_peers(&self, doc: &ConfigDocument) -> Result<Vec<PeerDescriptor>> {
        let prefix_len = doc.interface().network()?.prefix_len();
        Ok(doc
            .peers()
            .iter()
            .map(|p| PeerDescriptor::from_section(p, prefix_len, &self.libdir))
            .collect())
    }

    /// Linear scan comparing the derived Id
    pub fn find_by_external_id(&self, doc: &ConfigDocument, id: &str) -> Result<Option<PeerDescriptor>> {
        Ok(self
            .list_peers(doc)?
            .into_iter()
            .find(|p| p.id.as_deref() == Some(id)))
    }

    /// Client config text for a peer, plus its descriptor
    pub fn client_config(&self, doc: &ConfigDocument, public_key: &str) -> Result<(String, PeerDescriptor)> {
        let peer = self
            .get_peer(doc, public_key)?
            .ok_or_else(|| Error::NotFound(format!("Peer {}", public_key)))?;
        let iface = doc.interface();

        let private_key = peer.private_key.as_deref().ok_or_else(|| {
            Error::validation(format!("Peer {} has no recorded private key", public_key))
        })?;
        let preshared_key = peer.preshared_key.as_deref().ok_or_else(|| {
            Error::validation(format!("Peer {} has no PresharedKey", public_key))
        })?;
        let address = peer
            .address
            .map(|a| a.to_string())
            .ok_or_else(|| Error::validation(format!("Peer {} has no AllowedIPs", public_key)))?;
        let endpoint = iface
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::validation("[Interface] has no '# Endpoint = ' comment"))?;
        let networks = iface
            .networks
            .as_deref()
            .ok_or_else(|| Error::validation("[Interface] has no '# Networks = ' comment"))?;
        let server_public_key = self.server_public_key(doc)?;

        let text = ClientConfigBuilder::generate(&ClientConfigInput {
            description: &peer.description,
            private_key,
            public_key: &peer.public_key,
            address: &address,
            endpoint,
            server_public_key: &server_public_key,
            preshared_key,
            networks,
        });
        Ok((text, peer))
    }

    // ==================== Mutations ====================

    /// Provision a new peer with fresh keys and the next free (or given) address
    pub fn create_peer(
        &self,
        doc: &mut ConfigDocument,
        description: &str,
        explicit_address: Option<&str>,
    ) -> Result<PeerDescriptor> {
        model::validate_description(description).map_err(Error::Validation)?;
        let address = Self::resolve_address(doc, explicit_address)?;
        let host_prefix = if address.is_ipv4() { 32 } else { 128 };

        let private_key = self.keys.generate_private_key()?;
        let public_key = self.keys.public_key_of(&private_key)?;
        let preshared_key = self.keys.generate_preshared_key()?;

        doc.add_peer(&public_key, &description_comment(description))?;
        doc.add_attribute(
            Some(&public_key),
            "PresharedKey",
            &preshared_key,
            Some(&MetadataToken::PrivateKey(private_key).render()),
            true,
        )?;
        doc.add_attribute(
            Some(&public_key),
            "AllowedIPs",
            &format!("{}/{}", address, host_prefix),
            None,
            false,
        )?;
        doc.add_attribute(
            Some(&public_key),
            "PersistentKeepalive",
            &CLIENT_KEEPALIVE_SECS.to_string(),
            None,
            false,
        )?;
        doc.save()?;

        let peer = self.persisted_peer(doc, &public_key)?;
        log::info!(
            "Created peer {} ({})",
            peer.id.as_deref().unwrap_or("-"),
            public_key
        );
        self.regenerate_artifacts(doc, &public_key);
        self.notify();
        Ok(peer)
    }

    /// Rewrite a peer's description, leaving the rest of its block untouched
    pub fn update_peer(
        &self,
        doc: &mut ConfigDocument,
        public_key: &str,
        description: &str,
    ) -> Result<PeerDescriptor> {
        let span = doc
            .peer(public_key)
            .map(|p| p.span)
            .ok_or_else(|| Error::NotFound(format!("Peer {}", public_key)))?;
        if !span.has_leading_comment() {
            return Err(Error::structural(format!(
                "Comment expected in first line of config for peer {}",
                public_key
            )));
        }
        model::validate_description(description).map_err(Error::Validation)?;

        doc.replace_line(span.first_line, &description_comment(description))?;
        doc.save()?;

        let peer = self.persisted_peer(doc, public_key)?;
        log::info!("Updated peer {} ({})", peer.id.as_deref().unwrap_or("-"), public_key);
        self.regenerate_artifacts(doc, public_key);
        self.notify();
        Ok(peer)
    }

    /// Remove a peer; fails for keys that are not (or no longer) present
    pub fn delete_peer(&self, doc: &mut ConfigDocument, public_key: &str) -> Result<()> {
        let previous = match self.get_peer(doc, public_key) {
            Ok(peer) => peer,
            Err(e) => {
                log::warn!("Not removing client artifacts for {}: {}", public_key, e);
                None
            }
        };

        doc.remove_peer(public_key)?;
        doc.save()?;

        log::info!("Deleted peer {}", public_key);
        if let Some(peer) = previous {
            self.remove_artifacts(&peer);
        }
        self.notify();
        Ok(())
    }

    // ==================== Helpers ====================

    fn resolve_address(doc: &ConfigDocument, explicit: Option<&str>) -> Result<IpAddr> {
        let Some(raw) = explicit else {
            return AddressAllocator::find_free_address(doc);
        };
        let address: IpAddr = raw
            .trim()
            .parse()
            .map_err(|_| Error::validation(format!("Invalid address '{}'", raw)))?;
        if AddressAllocator::used_addresses(doc)?.contains(&address) {
            return Err(Error::validation(format!("Address {} is already in use", address)));
        }
        Ok(address)
    }

    fn persisted_peer(&self, doc: &ConfigDocument, public_key: &str) -> Result<PeerDescriptor> {
        self.get_peer(doc, public_key)?
            .ok_or_else(|| Error::NotFound(format!("Peer {}", public_key)))
    }

    fn regenerate_artifacts(&self, doc: &ConfigDocument, public_key: &str) {
        let (config, peer) = match self.client_config(doc, public_key) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Not writing client config for {}: {}", public_key, e);
                return;
            }
        };

        if let Some(path) = peer.config_path(&self.libdir) {
            if let Err(e) = storage::write_atomic(&path, config.as_bytes()) {
                log::warn!("Failed to write {}: {}", path.display(), e);
            }
        }

        if let (Some(renderer), Some(path)) = (&self.qr_renderer, &peer.qr_code_path) {
            let written = renderer
                .render(&config)
                .and_then(|image| storage::write_atomic(path, &image));
            if let Err(e) = written {
                log::warn!("Failed to write QR code {}: {}", path.display(), e);
            }
        }
    }

    fn remove_artifacts(&self, peer: &PeerDescriptor) {
        let paths = [peer.config_path(&self.libdir), peer.qr_code_path.clone()];
        for path in paths.iter().flatten() {
            if let Err(e) = storage::remove_if_exists(path) {
                log::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    fn notify(&self) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.on_change() {
                log::error!("Change notification failed: {}", e);
            }
        }
    }
}
