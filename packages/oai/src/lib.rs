//! Depot OAI - OAI-PMH 2.0 data provider for the Depot repository platform.
//!
//! This crate implements the harvesting protocol engine: it validates
//! incoming verb requests, queries the external search index for matching
//! items, renders each item's metadata through a format crosswalk and
//! assembles the OAI-PMH XML envelope, including resumption-token
//! pagination and deleted-record stubs. The HTTP routing shell and the
//! index itself are external collaborators.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use depot_oai::{FormatRegistry, MemoryIndex, Provider};
//!
//! let provider = Provider::new(
//!     depot_oai::config::test_config(),
//!     FormatRegistry::with_defaults(),
//!     Arc::new(MemoryIndex::new()),
//! )
//! .unwrap();
//!
//! let mut params = HashMap::new();
//! params.insert("verb".to_string(), "Identify".to_string());
//! let xml = provider.handle(&params).unwrap();
//! assert!(xml.contains("<repositoryName>"));
//! ```
//!
//! # Architecture
//!
//! The provider is organized into several modules:
//!
//! - [`config`]: Repository configuration and the OAI identifier scheme
//! - [`types`]: Core data types (Item, MetadataDocument, Set, QuerySpec)
//! - [`error`]: Protocol and infrastructure error types
//! - [`formats`]: Metadata format registry
//! - [`crosswalk`]: Metadata transformations per output schema
//! - [`token`]: Resumption token codec
//! - [`sets`]: Set hierarchy resolution
//! - [`index`]: Search index boundary and query translation
//! - [`dispatch`]: Verb and argument validation
//! - [`response`]: XML envelope assembly
//! - [`provider`]: The request-handling service

pub mod config;
pub mod crosswalk;
pub mod dispatch;
pub mod error;
pub mod formats;
pub mod index;
pub mod provider;
pub mod response;
pub mod sets;
pub mod token;
pub mod types;
mod xml;

// Re-export the main service type
pub use provider::Provider;

// Re-export commonly used items
pub use config::{DeletedRecordPolicy, RepositoryConfig};
pub use error::{IndexError, OaiError, ProviderError};
pub use formats::{FormatRegistry, MetadataFormat};
pub use index::{ItemIndex, ItemPage, ItemQuery, MemoryIndex};
pub use types::{Cursor, Item, MetadataDocument, MetadataEntry, QuerySpec, Set, Verb};
