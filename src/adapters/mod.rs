//! # Adapters Module
//!
//! Callers talk to evidence sources only through [`EvidenceAdapter`], which
//! wraps a [`crate::client::providers::SourceProvider`] and guarantees a list
//! of records back, with failures folded into sentinel records.
//!
//! ## Example Usage
//!
//! ```no_run
//! use evidence_monitor::{Config, EvidenceSources};
//!
//! # async fn run() -> evidence_monitor::Result<()> {
//! let sources = EvidenceSources::from_config(&Config::default())?;
//! for record in sources.literature.search("semaglutide obesity", 5).await {
//!     println!("{} {}", record.identifier, record.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod evidence_adapter;

pub use evidence_adapter::{EvidenceAdapter, EvidenceSources, Source};
