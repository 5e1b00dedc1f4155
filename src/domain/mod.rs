//! Domain models and types for Pagefold.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ParentId`], [`GroupId`], [`ItemId`], [`ArtifactKey`])
//! - **Records** ([`SourceRow`], [`ArtifactRecord`], [`ParentTextAggregate`], [`OutputRow`])
//! - **Error types** ([`PagefoldError`], [`SourceError`], [`ArtifactError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers use the newtype pattern so the hierarchy levels cannot be mixed:
//!
//! ```rust
//! use pagefold::domain::{ItemId, ParentId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let parent = ParentId::new("1.2.840.1")?;
//! let item = ItemId::new("1.2.840.1.7")?;
//!
//! // This won't compile
//! // let wrong: ParentId = item;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod records;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{ArtifactError, PagefoldError, SourceError};
pub use ids::{ArtifactKey, GroupId, ItemId, ParentId};
pub use records::{ArtifactRecord, OutputRow, ParentTextAggregate, SourceRow, TextEntry};
pub use result::Result;
