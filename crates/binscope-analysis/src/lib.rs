//! # binscope-analysis
//!
//! Static analyses over a decoded instruction stream:
//! - cross-reference index for direct call/jump targets
//! - function-start detection by end-of-flow partitioning
//! - fixed byte-signature scanning over the code buffer
//! - basic-block partitioning with classified successor edges

pub mod cfg_builder;
pub mod functions;
pub mod signatures;
pub mod xrefs;

pub use cfg_builder::build_cfg;
pub use functions::detect_functions;
pub use signatures::{scan_signatures, SignatureHit, SCAN_CAP};
pub use xrefs::{build_xrefs, parse_direct_target, Xref, XrefKind};
