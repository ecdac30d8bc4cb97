//! WireGuard Roadwarrior Core Library
//!
//! This crate manages roadwarrior client peers in a WireGuard server config
//! file: a line-preserving document model, first-fit address allocation,
//! peer lifecycle operations, and client config generation.

pub mod allocator;
pub mod client_config;
pub mod config;
pub mod document;
pub mod error;
pub mod keys;
pub mod metadata;
pub mod model;
pub mod notify;
pub mod registry;
mod storage;

pub use allocator::AddressAllocator;
pub use client_config::{ClientConfigBuilder, ClientConfigInput};
pub use config::FrontendConfig;
pub use document::{AttributeMap, ConfigDocument, InterfaceSection, PeerSection, SectionSpan};
pub use error::{Error, Result};
pub use keys::{KeyProvider, X25519KeyProvider};
pub use metadata::MetadataToken;
pub use model::*;
pub use notify::{ChangeNotifier, CommandNotifier};
pub use registry::{PeerRegistry, QrRenderer};
