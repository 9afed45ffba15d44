//! Runtime scanning primitives for `parsegen`-generated JSON parsers.
//!
//! Generated artifacts ship with a verbatim copy of this crate's module
//! source as a sibling `runtime.rs` (see [`RUNTIME_SOURCE`]); compiling the
//! same source here keeps the contract testable and linkable directly.

mod runtime;

pub use runtime::*;

/// Verbatim source of the runtime module, written beside every generated
/// `mod.rs` by the packaging boundary.
pub const RUNTIME_SOURCE: &str = include_str!("runtime.rs");
