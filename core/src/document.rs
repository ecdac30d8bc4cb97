//! Line-preserving model of a WireGuard server config file
//!
//! The raw lines are the single source of truth. Typed section views are
//! rebuilt from them after every mutation, so anything the parser does not
//! understand (blank lines, operator comments, unknown attributes) survives
//! a load/save cycle byte for byte.

use crate::metadata::{self, MetadataToken};
use crate::storage;
use crate::{Error, Result};
use ipnet::IpNet;
use std::fs;
use std::mem;
use std::net::IpAddr;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Ordered attribute list; reads resolve to the last occurrence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: Vec<(String, String)>,
}

impl AttributeMap {
    fn push(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// Last value for `name` (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in file order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Raw line range owned by a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    /// First line of the block; a leading comment if one sits above the header
    pub first_line: usize,
    /// Index of the `[Interface]` / `[Peer]` header
    pub header_line: usize,
    /// One past the last line of the block
    pub end_line: usize,
}

impl SectionSpan {
    pub fn lines(&self) -> Range<usize> {
        self.first_line..self.end_line
    }

    pub fn len(&self) -> usize {
        self.end_line - self.first_line
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_leading_comment(&self) -> bool {
        self.first_line < self.header_line
    }
}

/// Typed view of the `[Interface]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSection {
    pub span: SectionSpan,
    pub private_key: Option<String>,
    pub listen_port: Option<u16>,
    /// Server address in CIDR notation, possibly a comma separated list
    pub address: Option<String>,
    /// `# Endpoint = ` hint
    pub endpoint: Option<String>,
    /// `# Networks = ` hint
    pub networks: Option<String>,
    /// All other attributes (PostUp, DNS, MTU, ...)
    pub extra: AttributeMap,
}

impl InterfaceSection {
    /// The server's own address and prefix, taken from the first Address entry
    pub fn network(&self) -> Result<IpNet> {
        let address = self
            .address
            .as_deref()
            .ok_or_else(|| Error::validation("[Interface] has no Address"))?;
        let first = first_list_item(address);
        first.parse::<IpNet>().map_err(|e| {
            Error::validation(format!("Invalid interface address '{}': {}", first, e))
        })
    }
}

/// Typed view of a `[Peer]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSection {
    pub span: SectionSpan,
    pub public_key: String,
    pub preshared_key: Option<String>,
    pub allowed_ips: Option<String>,
    pub persistent_keepalive: Option<String>,
    /// `# PrivateKey = ` side-channel value
    pub private_key: Option<String>,
    /// Raw comment line directly above the header
    pub leading_comment: Option<String>,
    pub extra: AttributeMap,
}

impl PeerSection {
    /// Host address of the first AllowedIPs entry
    pub fn address(&self) -> Option<IpAddr> {
        let allowed = self.allowed_ips.as_deref()?;
        let first = first_list_item(allowed);
        let host = first.split('/').next().unwrap_or(first).trim();
        host.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Interface,
    Peer,
}

enum LineKind<'a> {
    Blank,
    Comment,
    Header(&'a str),
    Attribute(&'a str, &'a str),
    Other,
}

fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed.starts_with('#') {
        return LineKind::Comment;
    }
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        return LineKind::Header(trimmed[1..trimmed.len() - 1].trim());
    }
    if let Some((key, value)) = trimmed.split_once('=') {
        let key = key.trim();
        if !key.is_empty() {
            // wg-quick drops everything after '#'
            let value = value.split('#').next().unwrap_or("").trim();
            return LineKind::Attribute(key, value);
        }
    }
    LineKind::Other
}

fn first_list_item(list: &str) -> &str {
    list.split(',').next().unwrap_or(list).trim()
}

struct RawSection {
    kind: SectionKind,
    span: SectionSpan,
    attrs: AttributeMap,
    tokens: Vec<MetadataToken>,
}

struct Parsed {
    interface: InterfaceSection,
    peers: Vec<PeerSection>,
}

fn parse_lines(lines: &[String]) -> Result<Parsed> {
    let mut sections: Vec<RawSection> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        match classify(line) {
            LineKind::Header(name) => {
                let kind = if name.eq_ignore_ascii_case("interface") {
                    SectionKind::Interface
                } else if name.eq_ignore_ascii_case("peer") {
                    SectionKind::Peer
                } else {
                    return Err(Error::parse(i + 1, format!("Unknown section [{}]", name)));
                };

                // Plain comments directly above the header belong to this block
                let floor = sections.last().map(|s| s.span.header_line + 1).unwrap_or(0);
                let mut first_line = i;
                while first_line > floor {
                    let prev = &lines[first_line - 1];
                    if metadata::is_comment(prev) && MetadataToken::parse(prev).is_none() {
                        first_line -= 1;
                    } else {
                        break;
                    }
                }

                if let Some(prev) = sections.last_mut() {
                    prev.span.end_line = first_line;
                }
                sections.push(RawSection {
                    kind,
                    span: SectionSpan {
                        first_line,
                        header_line: i,
                        end_line: lines.len(),
                    },
                    attrs: AttributeMap::default(),
                    tokens: Vec::new(),
                });
            }
            LineKind::Attribute(key, value) => {
                if let Some(section) = sections.last_mut() {
                    section.attrs.push(key, value);
                }
            }
            LineKind::Comment => {
                if let (Some(section), Some(token)) = (sections.last_mut(), MetadataToken::parse(line)) {
                    section.tokens.push(token);
                }
            }
            LineKind::Blank | LineKind::Other => {}
        }
    }

    let mut interface: Option<InterfaceSection> = None;
    let mut peers: Vec<PeerSection> = Vec::new();

    for raw in sections {
        match raw.kind {
            SectionKind::Interface => {
                if interface.is_some() {
                    return Err(Error::parse(
                        raw.span.header_line + 1,
                        "Duplicate [Interface] section",
                    ));
                }
                interface = Some(build_interface(raw)?);
            }
            SectionKind::Peer => {
                let peer = build_peer(raw, lines)?;
                if peers.iter().any(|p| p.public_key == peer.public_key) {
                    return Err(Error::parse(
                        peer.span.header_line + 1,
                        format!("Duplicate peer public key {}", peer.public_key),
                    ));
                }
                peers.push(peer);
            }
        }
    }

    let interface =
        interface.ok_or_else(|| Error::parse(lines.len(), "No [Interface] section found"))?;
    Ok(Parsed { interface, peers })
}

fn build_interface(raw: RawSection) -> Result<InterfaceSection> {
    let mut section = InterfaceSection {
        span: raw.span,
        private_key: None,
        listen_port: None,
        address: None,
        endpoint: None,
        networks: None,
        extra: AttributeMap::default(),
    };

    for (key, value) in raw.attrs.iter() {
        match key.to_ascii_lowercase().as_str() {
            "privatekey" => section.private_key = Some(value.to_string()),
            "address" => section.address = Some(value.to_string()),
            "listenport" => {
                let port = value.parse::<u16>().map_err(|_| {
                    Error::parse(
                        raw.span.header_line + 1,
                        format!("Invalid ListenPort '{}'", value),
                    )
                })?;
                section.listen_port = Some(port);
            }
            _ => section.extra.push(key, value),
        }
    }

    for token in raw.tokens {
        match token {
            MetadataToken::Endpoint(v) => section.endpoint = Some(v),
            MetadataToken::Networks(v) => section.networks = Some(v),
            _ => {}
        }
    }

    Ok(section)
}

fn build_peer(raw: RawSection, lines: &[String]) -> Result<PeerSection> {
    let public_key = raw
        .attrs
        .get("PublicKey")
        .map(str::to_string)
        .ok_or_else(|| Error::parse(raw.span.header_line + 1, "[Peer] without PublicKey"))?;

    let leading_comment = if raw.span.has_leading_comment() {
        Some(lines[raw.span.first_line].clone())
    } else {
        None
    };

    let mut section = PeerSection {
        span: raw.span,
        public_key,
        preshared_key: None,
        allowed_ips: None,
        persistent_keepalive: None,
        private_key: None,
        leading_comment,
        extra: AttributeMap::default(),
    };

    for (key, value) in raw.attrs.iter() {
        match key.to_ascii_lowercase().as_str() {
            "publickey" => {}
            "presharedkey" => section.preshared_key = Some(value.to_string()),
            "allowedips" => section.allowed_ips = Some(value.to_string()),
            "persistentkeepalive" => section.persistent_keepalive = Some(value.to_string()),
            _ => section.extra.push(key, value),
        }
    }

    for token in raw.tokens {
        if let MetadataToken::PrivateKey(v) = token {
            section.private_key = Some(v);
        }
    }

    Ok(section)
}

fn ensure_single_line(what: &str, text: &str) -> Result<()> {
    if text.contains('\n') || text.contains('\r') {
        return Err(Error::validation(format!("{} must be a single line", what)));
    }
    Ok(())
}

fn ensure_comment(what: &str, text: &str) -> Result<()> {
    ensure_single_line(what, text)?;
    if !metadata::is_comment(text) {
        return Err(Error::validation(format!("{} must start with '#'", what)));
    }
    Ok(())
}

/// In-memory mirror of a WireGuard config file
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    path: PathBuf,
    lines: Vec<String>,
    trailing_newline: bool,
    crlf: bool,
    interface: InterfaceSection,
    peers: Vec<PeerSection>,
}

impl ConfigDocument {
    /// Read and parse the config file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let doc = Self::parse(path, &content)?;
        log::debug!(
            "Loaded {} ({} lines, {} peers)",
            path.display(),
            doc.lines.len(),
            doc.peers.len()
        );
        Ok(doc)
    }

    /// Parse config text that will be saved to `path`
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let mut lines: Vec<String> = if content.is_empty() {
            Vec::new()
        } else {
            content.split('\n').map(str::to_string).collect()
        };
        let trailing_newline = content.ends_with('\n');
        if trailing_newline {
            lines.pop();
        }
        let crlf = lines.first().map(|l| l.ends_with('\r')).unwrap_or(false);

        let parsed = parse_lines(&lines)?;
        Ok(Self {
            path: path.into(),
            lines,
            trailing_newline,
            crlf,
            interface: parsed.interface,
            peers: parsed.peers,
        })
    }

    /// Discard in-memory state and re-read the file
    pub fn reload(&mut self) -> Result<()> {
        *self = Self::load(&self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn interface(&self) -> &InterfaceSection {
        &self.interface
    }

    /// Peers in file order
    pub fn peers(&self) -> &[PeerSection] {
        &self.peers
    }

    pub fn peer(&self, public_key: &str) -> Option<&PeerSection> {
        self.peers.iter().find(|p| p.public_key == public_key)
    }

    /// Reconstructed file content
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    /// Append a new `[Peer]` block with the given leading comment
    pub fn add_peer(&mut self, public_key: &str, leading_comment: &str) -> Result<()> {
        if public_key.is_empty() || public_key.contains(char::is_whitespace) || public_key.contains('#') {
            return Err(Error::validation(format!("Invalid public key '{}'", public_key)));
        }
        ensure_comment("Leading comment", leading_comment)?;
        if MetadataToken::parse(leading_comment).is_some() {
            return Err(Error::validation(
                "Leading comment must not look like a metadata token",
            ));
        }
        if self.peer(public_key).is_some() {
            return Err(Error::DuplicateKey(public_key.to_string()));
        }

        let mut lines = self.lines.clone();
        if lines.last().map(|l| !l.trim().is_empty()).unwrap_or(false) {
            lines.push(self.terminate(""));
        }
        lines.push(self.terminate(leading_comment));
        lines.push(self.terminate("[Peer]"));
        lines.push(self.terminate(&format!("PublicKey = {}", public_key)));
        self.commit(lines)?;
        self.trailing_newline = true;
        Ok(())
    }

    /// Write `name = value` into a section; `None` targets the interface
    ///
    /// With `append_as_line` the attribute is always added after the last
    /// non-blank line of the section. Otherwise the occurrence that reads
    /// resolve to (the last one) is replaced in place, or the attribute is
    /// appended if absent. A trailing comment goes on its own line directly
    /// below the attribute.
    pub fn add_attribute(
        &mut self,
        section: Option<&str>,
        name: &str,
        value: &str,
        trailing_comment: Option<&str>,
        append_as_line: bool,
    ) -> Result<()> {
        if name.is_empty() || name.contains('=') || name.contains('#') || name.starts_with('[') {
            return Err(Error::validation(format!("Invalid attribute name '{}'", name)));
        }
        ensure_single_line("Attribute name", name)?;
        ensure_single_line("Attribute value", value)?;
        if let Some(comment) = trailing_comment {
            ensure_comment("Trailing comment", comment)?;
        }

        let span = self.section_span(section)?;
        let mut lines = self.lines.clone();

        let mut new_lines = vec![self.terminate(&format!("{} = {}", name, value))];
        if let Some(comment) = trailing_comment {
            new_lines.push(self.terminate(comment));
        }

        let existing = if append_as_line {
            None
        } else {
            (span.header_line + 1..span.end_line).rev().find(|&i| {
                matches!(classify(&lines[i]), LineKind::Attribute(k, _) if k.eq_ignore_ascii_case(name))
            })
        };

        match existing {
            Some(i) => {
                // A token of the same kind below the old value is superseded too
                let token = trailing_comment.and_then(MetadataToken::parse);
                let stale = token.is_some_and(|new| {
                    i + 1 < span.end_line
                        && MetadataToken::parse(&lines[i + 1])
                            .is_some_and(|old| mem::discriminant(&old) == mem::discriminant(&new))
                });
                let end = if stale { i + 1 } else { i };
                lines.splice(i..=end, new_lines);
            }
            None => {
                let mut at = span.end_line;
                while at > span.header_line + 1 && lines[at - 1].trim().is_empty() {
                    at -= 1;
                }
                lines.splice(at..at, new_lines);
            }
        }

        self.commit(lines)
    }

    /// Replace a peer's leading comment line
    pub fn replace_line(&mut self, index: usize, new_text: &str) -> Result<()> {
        if index >= self.lines.len() {
            return Err(Error::Index {
                index,
                len: self.lines.len(),
            });
        }
        let is_leading_comment = self
            .peers
            .iter()
            .any(|p| p.span.has_leading_comment() && p.span.first_line == index);
        if !is_leading_comment {
            return Err(Error::structural(format!(
                "Line {} is not the leading comment of a peer",
                index + 1
            )));
        }
        ensure_comment("Replacement line", new_text)?;
        if MetadataToken::parse(new_text).is_some() {
            return Err(Error::validation(
                "Replacement line must not look like a metadata token",
            ));
        }

        let mut lines = self.lines.clone();
        lines[index] = self.terminate(new_text);
        self.commit(lines)
    }

    /// Delete a peer's whole block, returning the span it occupied
    pub fn remove_peer(&mut self, public_key: &str) -> Result<SectionSpan> {
        let span = self
            .peer(public_key)
            .map(|p| p.span)
            .ok_or_else(|| Error::NotFound(format!("Peer {}", public_key)))?;

        let mut lines = self.lines.clone();
        lines.drain(span.lines());
        self.commit(lines)?;
        Ok(span)
    }

    /// Write the whole document back to its file via temp file + rename
    ///
    /// Memory is left as is if this fails; reload to resynchronize.
    pub fn save(&self) -> Result<()> {
        storage::write_atomic(&self.path, self.render().as_bytes())?;
        log::debug!("Saved {} ({} lines)", self.path.display(), self.lines.len());
        Ok(())
    }

    fn section_span(&self, section: Option<&str>) -> Result<SectionSpan> {
        match section {
            None => Ok(self.interface.span),
            Some(key) => self
                .peer(key)
                .map(|p| p.span)
                .ok_or_else(|| Error::NotFound(format!("Peer {}", key))),
        }
    }

    fn terminate(&self, text: &str) -> String {
        if self.crlf {
            format!("{}\r", text)
        } else {
            text.to_string()
        }
    }

    fn commit(&mut self, lines: Vec<String>) -> Result<()> {
        let parsed = parse_lines(&lines)?;
        self.lines = lines;
        self.interface = parsed.interface;
        self.peers = parsed.peers;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SERVER_CONF: &str = "[Interface]
ListenPort = 51820
PrivateKey = cGxhY2Vob2xkZXItc2VydmVyLXByaXZhdGUta2V5MDA=
Address = 192.168.0.1/24
# Endpoint = example.com:51820
# Networks = 192.168.0.0/16
PostUp = iptables -A FORWARD -i %i -j ACCEPT
PostUp = iptables -t nat -A POSTROUTING -o eth0 -j MASQUERADE

# Alice laptop
[Peer]
PublicKey = alicePublicKey=
PresharedKey = alicePsk=
# PrivateKey = alicePrivateKey=
AllowedIPs = 192.168.0.2/32
PersistentKeepalive = 25

# Bob phone
[Peer]
PublicKey = bobPublicKey=
PresharedKey = bobPsk=
# PrivateKey = bobPrivateKey=
AllowedIPs = 192.168.0.3/32
PersistentKeepalive = 25
";

    fn doc() -> ConfigDocument {
        ConfigDocument::parse("/tmp/wg_rw.conf", SERVER_CONF).unwrap()
    }

    #[test]
    fn test_parse_interface() {
        let doc = doc();
        let iface = doc.interface();
        assert_eq!(iface.listen_port, Some(51820));
        assert_eq!(iface.address.as_deref(), Some("192.168.0.1/24"));
        assert_eq!(iface.endpoint.as_deref(), Some("example.com:51820"));
        assert_eq!(iface.networks.as_deref(), Some("192.168.0.0/16"));
        assert_eq!(iface.extra.get_all("PostUp").len(), 2);
        assert_eq!(
            iface.extra.get("postup"),
            Some("iptables -t nat -A POSTROUTING -o eth0 -j MASQUERADE")
        );
        assert_eq!(iface.network().unwrap().to_string(), "192.168.0.1/24");
    }

    #[test]
    fn test_parse_peers_in_file_order() {
        let doc = doc();
        let keys: Vec<_> = doc.peers().iter().map(|p| p.public_key.as_str()).collect();
        assert_eq!(keys, vec!["alicePublicKey=", "bobPublicKey="]);

        let alice = doc.peer("alicePublicKey=").unwrap();
        assert_eq!(alice.leading_comment.as_deref(), Some("# Alice laptop"));
        assert_eq!(alice.private_key.as_deref(), Some("alicePrivateKey="));
        assert_eq!(alice.preshared_key.as_deref(), Some("alicePsk="));
        assert_eq!(alice.address(), Some("192.168.0.2".parse().unwrap()));
        assert_eq!(alice.span.first_line, 9);
        assert_eq!(alice.span.header_line, 10);
        // trailing blank separator belongs to the block
        assert_eq!(alice.span.end_line, 17);
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wg_rw.conf");
        let content = format!("# managed by hand\n\n{}# trailing note", SERVER_CONF);
        fs::write(&path, &content).unwrap();

        let doc = ConfigDocument::load(&path).unwrap();
        doc.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_round_trip_crlf() {
        let content = SERVER_CONF.replace('\n', "\r\n");
        let doc = ConfigDocument::parse("/tmp/x.conf", &content).unwrap();
        assert_eq!(doc.render(), content);
        assert_eq!(doc.peers().len(), 2);
        assert_eq!(
            doc.peer("bobPublicKey=").unwrap().private_key.as_deref(),
            Some("bobPrivateKey=")
        );
    }

    #[test]
    fn test_missing_interface_is_parse_error() {
        let err = ConfigDocument::parse("/tmp/x.conf", "[Peer]\nPublicKey = a\n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_structural_parse_errors() {
        let dup_iface = "[Interface]\nAddress = 10.0.0.1/24\n[Interface]\n";
        assert!(matches!(
            ConfigDocument::parse("/tmp/x.conf", dup_iface),
            Err(Error::Parse { line: 3, .. })
        ));

        let keyless = "[Interface]\nAddress = 10.0.0.1/24\n\n[Peer]\nAllowedIPs = 10.0.0.2/32\n";
        assert!(matches!(
            ConfigDocument::parse("/tmp/x.conf", keyless),
            Err(Error::Parse { .. })
        ));

        let dup_peer = "[Interface]\n[Peer]\nPublicKey = a\n[Peer]\nPublicKey = a\n";
        assert!(matches!(
            ConfigDocument::parse("/tmp/x.conf", dup_peer),
            Err(Error::Parse { .. })
        ));

        let unknown = "[Interface]\n[Wat]\n";
        assert!(matches!(
            ConfigDocument::parse("/tmp/x.conf", unknown),
            Err(Error::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = ConfigDocument::load(dir.path().join("absent.conf")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_duplicate_keys_resolve_last() {
        let content = "[Interface]\nAddress = 10.0.0.1/24\nListenPort = 1000\nListenPort = 2000\n";
        let mut doc = ConfigDocument::parse("/tmp/x.conf", content).unwrap();
        assert_eq!(doc.interface().listen_port, Some(2000));

        // in-place write hits the occurrence reads resolve to
        doc.add_attribute(None, "ListenPort", "3000", None, false).unwrap();
        assert_eq!(doc.interface().listen_port, Some(3000));
        assert_eq!(doc.lines()[2], "ListenPort = 1000");
        assert_eq!(doc.lines()[3], "ListenPort = 3000");
    }

    #[test]
    fn test_inline_comment_stripped_on_read() {
        let content = "[Interface]\nAddress = 10.0.0.1/24 # office\n";
        let doc = ConfigDocument::parse("/tmp/x.conf", content).unwrap();
        assert_eq!(doc.interface().address.as_deref(), Some("10.0.0.1/24"));
    }

    #[test]
    fn test_add_peer_rejects_duplicate() {
        let mut doc = doc();
        let before = doc.render();
        let err = doc.add_peer("alicePublicKey=", "# another Alice").unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
        assert_eq!(doc.render(), before);
    }

    #[test]
    fn test_add_peer_and_attributes() {
        let mut doc = doc();
        doc.add_peer("carolPublicKey=", "# Carol tablet").unwrap();
        doc.add_attribute(
            Some("carolPublicKey="),
            "PresharedKey",
            "carolPsk=",
            Some("# PrivateKey = carolPrivateKey="),
            true,
        )
        .unwrap();
        doc.add_attribute(Some("carolPublicKey="), "AllowedIPs", "192.168.0.4/32", None, false)
            .unwrap();

        let carol = doc.peer("carolPublicKey=").unwrap();
        assert_eq!(carol.private_key.as_deref(), Some("carolPrivateKey="));
        assert_eq!(carol.allowed_ips.as_deref(), Some("192.168.0.4/32"));
        assert_eq!(carol.leading_comment.as_deref(), Some("# Carol tablet"));

        let tail: Vec<&str> = doc.lines()[doc.lines().len() - 6..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(
            tail,
            vec![
                "# Carol tablet",
                "[Peer]",
                "PublicKey = carolPublicKey=",
                "PresharedKey = carolPsk=",
                "# PrivateKey = carolPrivateKey=",
                "AllowedIPs = 192.168.0.4/32",
            ]
        );
        // one blank separator between Bob and Carol
        assert_eq!(doc.lines()[doc.lines().len() - 7], "");
        assert_eq!(doc.lines()[doc.lines().len() - 8], "PersistentKeepalive = 25");
    }

    #[test]
    fn test_add_attribute_to_interface_keeps_following_peer_intact() {
        let mut doc = doc();
        let alice_before: Vec<String> = doc.lines()[9..16].to_vec();
        doc.add_attribute(None, "DNS", "1.1.1.1", None, false).unwrap();

        assert_eq!(doc.interface().extra.get("DNS"), Some("1.1.1.1"));
        // inserted before the blank separator, not inside Alice's block
        assert_eq!(doc.lines()[8], "DNS = 1.1.1.1");
        assert_eq!(doc.lines()[9], "");
        assert_eq!(doc.lines()[10..17].to_vec(), alice_before);
    }

    #[test]
    fn test_add_attribute_in_place_supersedes_token_below() {
        let mut doc = doc();
        let len = doc.lines().len();
        doc.add_attribute(
            Some("alicePublicKey="),
            "PresharedKey",
            "aliceNewPsk=",
            Some("# PrivateKey = aliceNewPrivateKey="),
            false,
        )
        .unwrap();

        let alice = doc.peer("alicePublicKey=").unwrap();
        assert_eq!(alice.preshared_key.as_deref(), Some("aliceNewPsk="));
        assert_eq!(alice.private_key.as_deref(), Some("aliceNewPrivateKey="));
        assert_eq!(doc.lines().len(), len);
        assert!(!doc.render().contains("alicePrivateKey="));
        assert_eq!(
            doc.peer("bobPublicKey=").unwrap().private_key.as_deref(),
            Some("bobPrivateKey=")
        );

        // a plain comment below the old value is left alone
        doc.add_attribute(
            Some("alicePublicKey="),
            "AllowedIPs",
            "192.168.0.20/32",
            Some("# moved"),
            false,
        )
        .unwrap();
        assert_eq!(doc.lines().len(), len + 1);
        assert!(doc.render().contains("AllowedIPs = 192.168.0.20/32\n# moved\nPersistentKeepalive = 25\n"));
    }

    #[test]
    fn test_add_attribute_to_unknown_peer() {
        let mut doc = doc();
        let err = doc.add_attribute(Some("nobody="), "AllowedIPs", "10.0.0.9/32", None, false);
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_add_attribute_rejects_line_breaks() {
        let mut doc = doc();
        let err = doc.add_attribute(None, "PostUp", "true\n[Peer]", None, true);
        assert!(matches!(err, Err(Error::Validation(_))));
        let err = doc.add_attribute(None, "PostUp", "true", Some("no hash"), true);
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn test_replace_line() {
        let mut doc = doc();
        doc.replace_line(9, "# Alice desktop").unwrap();
        assert_eq!(
            doc.peer("alicePublicKey=").unwrap().leading_comment.as_deref(),
            Some("# Alice desktop")
        );

        assert!(matches!(
            doc.replace_line(999, "# x"),
            Err(Error::Index { index: 999, .. })
        ));
        // header line is not a leading comment
        assert!(matches!(doc.replace_line(10, "# x"), Err(Error::Structural(_))));
        // side-channel comment inside the block is not either
        assert!(matches!(doc.replace_line(13, "# x"), Err(Error::Structural(_))));
    }

    #[test]
    fn test_remove_peer() {
        let mut doc = doc();
        let before = doc.lines().len();
        let span = doc.remove_peer("alicePublicKey=").unwrap();
        assert_eq!(doc.lines().len(), before - span.len());
        assert!(doc.peer("alicePublicKey=").is_none());
        assert_eq!(doc.peers().len(), 1);
        assert_eq!(doc.lines()[9], "# Bob phone");

        assert!(matches!(
            doc.remove_peer("alicePublicKey="),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_token_comment_above_header_stays_with_previous_block() {
        let content = "[Interface]\nAddress = 10.0.0.1/24\n# Networks = 10.0.0.0/8\n[Peer]\nPublicKey = k\n";
        let doc = ConfigDocument::parse("/tmp/x.conf", content).unwrap();
        assert_eq!(doc.interface().networks.as_deref(), Some("10.0.0.0/8"));
        let peer = doc.peer("k").unwrap();
        assert!(peer.leading_comment.is_none());
        assert_eq!(peer.span.first_line, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("wg_rw.conf");
        fs::write(&path, SERVER_CONF).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        let mut doc = ConfigDocument::load(&path).unwrap();
        doc.remove_peer("bobPublicKey=").unwrap();
        doc.save().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        let reloaded = ConfigDocument::load(&path).unwrap();
        assert_eq!(reloaded.peers().len(), 1);
    }

    #[test]
    fn test_reload_discards_unsaved_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wg_rw.conf");
        fs::write(&path, SERVER_CONF).unwrap();

        let mut doc = ConfigDocument::load(&path).unwrap();
        doc.remove_peer("bobPublicKey=").unwrap();
        assert_eq!(doc.peers().len(), 1);
        doc.reload().unwrap();
        assert_eq!(doc.peers().len(), 2);
    }
}
