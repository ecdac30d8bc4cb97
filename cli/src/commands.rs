//! Subcommand implementations

use crate::Command;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use wg_roadwarrior_core::{
    validate_peer_id, AddressAllocator, ConfigDocument, PeerDescriptor, PeerRegistry,
};

pub fn run(
    command: &Command,
    registry: &PeerRegistry,
    doc: &mut ConfigDocument,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::List { json } => list(registry, doc, *json, out),
        Command::Interface { json } => interface(registry, doc, *json, out),
        Command::Show { id } => {
            let peer = resolve(registry, doc, id)?;
            show(&peer, out)
        }
        Command::Create {
            description,
            address,
        } => {
            let peer = registry.create_peer(doc, description, address.as_deref())?;
            writeln!(out, "Created peer {}", display_id(&peer))?;
            if let Some(path) = peer.config_path(registry.libdir()) {
                writeln!(out, "Client config: {}", path.display())?;
            }
            Ok(())
        }
        Command::Update { id, description } => {
            let peer = resolve(registry, doc, id)?;
            let peer = registry.update_peer(doc, &peer.public_key, description)?;
            writeln!(out, "Updated peer {}", display_id(&peer))?;
            Ok(())
        }
        Command::Delete { id } => {
            let peer = resolve(registry, doc, id)?;
            registry.delete_peer(doc, &peer.public_key)?;
            writeln!(out, "Deleted peer {}", id)?;
            Ok(())
        }
        Command::ClientConfig { id, output } => {
            let peer = resolve(registry, doc, id)?;
            let (config, _) = registry.client_config(doc, &peer.public_key)?;
            match output {
                Some(path) => fs::write(path, config)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => out.write_all(config.as_bytes())?,
            }
            Ok(())
        }
        Command::NextAddress => {
            let address = AddressAllocator::find_free_address(doc)?;
            writeln!(out, "{}", address)?;
            Ok(())
        }
    }
}

fn resolve(registry: &PeerRegistry, doc: &ConfigDocument, id: &str) -> Result<PeerDescriptor> {
    validate_peer_id(id).map_err(anyhow::Error::msg)?;
    registry
        .find_by_external_id(doc, id)?
        .with_context(|| format!("No peer with id '{}'", id))
}

fn display_id(peer: &PeerDescriptor) -> &str {
    peer.id.as_deref().unwrap_or(&peer.public_key)
}

fn list(
    registry: &PeerRegistry,
    doc: &ConfigDocument,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let peers = registry.list_peers(doc)?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&peers)?)?;
        return Ok(());
    }

    writeln!(out, "{:<20} {:<20} DESCRIPTION", "ID", "ADDRESS")?;
    for peer in &peers {
        let address = peer.address.map(|a| a.to_string()).unwrap_or_default();
        writeln!(
            out,
            "{:<20} {:<20} {}",
            peer.id.as_deref().unwrap_or("-"),
            address,
            peer.description
        )?;
    }
    Ok(())
}

fn interface(
    registry: &PeerRegistry,
    doc: &ConfigDocument,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let iface = registry.interface(doc);
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&iface)?)?;
        return Ok(());
    }

    let unset = || "-".to_string();
    writeln!(out, "Address:      {}", iface.address.clone().unwrap_or_else(unset))?;
    writeln!(
        out,
        "ListenPort:   {}",
        iface.listen_port.map(|p| p.to_string()).unwrap_or_else(unset)
    )?;
    writeln!(out, "Endpoint:     {}", iface.endpoint.clone().unwrap_or_else(unset))?;
    writeln!(out, "Networks:     {}", iface.networks.clone().unwrap_or_else(unset))?;
    match registry.server_public_key(doc) {
        Ok(key) => writeln!(out, "PublicKey:    {}", key)?,
        Err(e) => log::warn!("Cannot derive server public key: {}", e),
    }
    Ok(())
}

fn show(peer: &PeerDescriptor, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Description:  {}", peer.description)?;
    writeln!(out, "Id:           {}", peer.id.as_deref().unwrap_or("-"))?;
    writeln!(
        out,
        "Address:      {}",
        peer.address.map(|a| a.to_string()).unwrap_or_default()
    )?;
    writeln!(out, "PublicKey:    {}", peer.public_key)?;
    if let Some(path) = &peer.qr_code_path {
        writeln!(out, "QRCode:       {}", path.display())?;
    }
    Ok(())
}
