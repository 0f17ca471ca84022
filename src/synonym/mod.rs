//! Synonym reconciliation across taxonomy schemes
//!
//! ```text
//! SynonymEdge relation ──► SynonymGraph (byCanonical / byAlternate)
//!                                 │
//!                                 ▼
//!        Classification ──► SynonymExpander ──► Expansion (variant set)
//! ```
//!
//! The graph is built once per run and is read-only afterwards.

mod expander;
mod graph;

pub use expander::{Expansion, ExpansionMode, SynonymExpander};
pub use graph::{SchemeLink, SynonymGraph};
