//! # assure-vault: Evidence Vault
//!
//! Tamper-evident storage for compliance evidence. Artifacts are written
//! once, partitioned by collection date and evidence type, hashed with
//! SHA-256, and verified on every read. A flat metadata index records every
//! artifact and answers list and summary queries.

pub mod content;
pub mod error;
pub mod index;
pub mod record;
pub mod vault;

pub use content::{ContentFormat, EvidenceContent};
pub use error::{VaultError, VaultResult};
pub use index::{INDEX_FILE, LOCK_FILE};
pub use record::{Evidence, EvidenceFilter, EvidenceSummary, IntegrityReport, StoreRequest};
pub use vault::EvidenceVault;
