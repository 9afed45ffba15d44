//! Schema-directed JSON parser generator.
//!
//! Describe the shape of a JSON document with the [`Schema`] type algebra,
//! open a [`Session`], and `generate` Rust source that parses conforming
//! documents into strongly-typed destinations with minimal allocation. The
//! emitted module is written next to a verbatim copy of the
//! `parsegen-runtime` scanning primitives, so generated code has no
//! dependency on this crate.
//!
//! ```no_run
//! use parsegen::{Field, Options, Schema, Session, UnknownKeys};
//!
//! # fn main() -> Result<(), parsegen::Error> {
//! let trade = Schema::object(
//!     [
//!         Field::new("price", Schema::float64()),
//!         Field::new("size", Schema::uint64()),
//!         Field::new("symbol", Schema::string()).rename("s"),
//!     ],
//!     UnknownKeys::Skip,
//! )
//! .named("Trade");
//!
//! let mut session = Session::create("src/generated", "market", Options::default())?;
//! session.generate(&trade, "unmarshal")?;
//! session.finish()?;
//! # Ok(())
//! # }
//! ```
//!
//! The generated `market/mod.rs` declares `pub struct Trade`, the parser
//! routines behind it, and `impl Trade { pub fn unmarshal(&mut self, data:
//! &[u8]) -> Result<(), ParseError> }`; destinations are reused across
//! calls (slice capacity is kept, maps start fresh).

mod emit;
mod error;
mod registry;
mod schema;
mod session;
mod writer;

pub use error::Error;
pub use schema::{Field, Schema, Shape, StringOptions, UnknownKeys};
pub use session::{KeyDispatch, Options, Session};
pub use writer::Writer;
