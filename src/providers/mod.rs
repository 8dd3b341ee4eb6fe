//! Provider normalization.
//!
//! The gateway talks to several upstream families that differ in how they
//! authenticate and version their APIs. [`registry`] folds those differences
//! into a single [`ProviderDescriptor`] per [`ProviderKind`].

mod registry;

pub use registry::*;
