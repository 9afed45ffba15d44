//! Emission sessions: lifecycle, the public `generate` driver, and the
//! packaging boundary that places the artifact pair on disk.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::registry::Registry;
use crate::schema::Schema;
use crate::writer::Writer;

/// Strategy for dispatching on object keys in generated struct parsers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyDispatch {
    /// Single-byte switch when every JSON key is one distinct byte, a
    /// whole-key match otherwise.
    #[default]
    Auto,
    /// Always match whole keys.
    ByString,
    /// Match the first byte, then confirm the full key. Measured slower
    /// than whole-key matching, kept selectable for experiments; falls
    /// back to whole-key matching when first bytes collide.
    FirstByte,
}

/// Session-wide generation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub key_dispatch: KeyDispatch,
}

/// A single emission run producing one artifact pair: the generated module
/// (`mod.rs`) and the verbatim runtime (`runtime.rs`) beside it.
///
/// The session value is the whole emission context — registries, section
/// buffers, import set — threaded explicitly through schema traversal.
/// Exclusive use is enforced by `&mut` receivers. Dropping a session
/// without calling [`Session::finish`] flushes nothing.
pub struct Session {
    pub(crate) registry: Registry,
    pub(crate) options: Options,
    /// `use` paths for the generated file, deduplicated and sorted.
    pub(crate) imports: BTreeSet<String>,
    /// Type declarations, in registration order.
    pub(crate) types_out: Writer,
    /// Parser routines, in registration order.
    pub(crate) parsers_out: Writer,
    /// Public entrypoints, in generation order.
    pub(crate) entrypoints_out: Writer,
    /// `<type>.<method>` bindings already generated.
    entrypoints: HashSet<String>,
    module_dir: PathBuf,
}

impl Session {
    /// Opens a session under `output_dir`, which must already exist.
    /// Creates `<output_dir>/<module>/` and drops the runtime file there
    /// immediately; the generated module itself is written by `finish`.
    pub fn create(
        output_dir: impl AsRef<Path>,
        module: &str,
        options: Options,
    ) -> Result<Self, Error> {
        let output_dir = output_dir.as_ref();
        if !output_dir.is_dir() {
            return Err(Error::OutputDirMissing(output_dir.to_path_buf()));
        }
        let module_dir = output_dir.join(module);
        fs::create_dir_all(&module_dir)?;
        fs::write(
            module_dir.join("runtime.rs"),
            parsegen_runtime::RUNTIME_SOURCE,
        )?;
        tracing::debug!(dir = %module_dir.display(), "opened emission session");

        let mut imports = BTreeSet::new();
        imports.insert("self::runtime::*".to_owned());
        Ok(Session {
            registry: Registry::default(),
            options,
            imports,
            types_out: Writer::new(),
            parsers_out: Writer::new(),
            entrypoints_out: Writer::new(),
            entrypoints: HashSet::new(),
            module_dir,
        })
    }

    /// Emits the destination types, parser routines, and public entrypoint
    /// for `root`, deduplicating against everything already generated in
    /// this session.
    ///
    /// The root must carry a destination type name, and each
    /// `<type>.<method>` pair can be generated only once per session.
    pub fn generate(&mut self, root: &Schema, method: &str) -> Result<(), Error> {
        if !root.is_named() {
            return Err(Error::UnnamedRoot);
        }
        let binding = format!("{}.{}", root.name, method);
        if !self.entrypoints.insert(binding.clone()) {
            return Err(Error::DuplicateEntrypoint(binding));
        }
        tracing::debug!(entrypoint = %binding, "generating parser");
        self.generate_types(root);
        self.generate_parsers(root);
        self.emit_entrypoint(root, method);
        Ok(())
    }

    /// Assembles the generated module — header, imports, types, parsers,
    /// entrypoints — writes `mod.rs`, and returns the module directory.
    pub fn finish(self) -> Result<PathBuf, Error> {
        // Section buffers start each item with a separator blank line and
        // never end in a newline, so the header must not either.
        let mut out = String::new();
        out.push_str("// @generated by parsegen. DO NOT EDIT.");
        out.push_str("\n#![allow(dead_code, unused_mut, unused_assignments, clippy::all)]");
        out.push('\n');
        out.push_str("\npub mod runtime;");
        out.push('\n');
        for import in &self.imports {
            out.push_str("\nuse ");
            out.push_str(import);
            out.push(';');
        }
        out.push_str(self.types_out.as_str());
        out.push_str(self.parsers_out.as_str());
        out.push_str(self.entrypoints_out.as_str());
        out.push('\n');

        let path = self.module_dir.join("mod.rs");
        fs::write(&path, &out)?;
        tracing::info!(path = %path.display(), bytes = out.len(), "wrote generated module");
        Ok(self.module_dir)
    }
}
