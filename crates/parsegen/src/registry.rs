//! Identity derivation and the deduplication registry.
//!
//! Two schema nodes with equal [`TypeKey`]s denote the same destination
//! type; equal [`ParserKey`]s denote the same emitted parser routine.
//! `ParserKey` refines `TypeKey` by construction, so equal parser keys
//! always imply equal type keys.

use indexmap::IndexMap;

use crate::schema::{Schema, Shape, StringOptions, UnknownKeys};

/// Equivalence key for destination-type deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct TypeKey {
    name: String,
    shape: ShapeKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ShapeKey {
    Bool,
    Int64,
    Uint64,
    Float32,
    Float64,
    QuotedFloat64,
    Float64WithSrc,
    /// Owned and borrowed strings are distinct destination types.
    Str { borrowed: bool },
    Array { len: usize, elem: Box<TypeKey> },
    Slice { elem: Box<TypeKey> },
    Tuple { fields: Vec<(String, TypeKey)> },
    Struct { fields: Vec<(String, TypeKey)> },
    Map { key: Box<TypeKey>, value: Box<TypeKey> },
}

/// Equivalence key for parser-routine deduplication: the destination type
/// plus every option that changes parsing behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ParserKey {
    ty: TypeKey,
    opts: OptionsKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum OptionsKey {
    None,
    Str(StringOptions),
    Elem(Box<OptionsKey>),
    Fields(Vec<OptionsKey>),
    Object {
        fields: Vec<OptionsKey>,
        /// Ordered JSON key names: two structs that map the same fields to
        /// different keys need different routines.
        json_names: Vec<String>,
        unknown_keys: UnknownKeys,
    },
    Map {
        key: Box<OptionsKey>,
        value: Box<OptionsKey>,
    },
}

/// Derives the destination-type identity of a schema node.
pub(crate) fn type_key(schema: &Schema) -> TypeKey {
    let shape = match &schema.shape {
        Shape::Bool => ShapeKey::Bool,
        Shape::Int64 => ShapeKey::Int64,
        Shape::Uint64 => ShapeKey::Uint64,
        Shape::Float32 => ShapeKey::Float32,
        Shape::Float64 => ShapeKey::Float64,
        Shape::QuotedFloat64 => ShapeKey::QuotedFloat64,
        Shape::Float64WithSrc => ShapeKey::Float64WithSrc,
        Shape::String(opts) => ShapeKey::Str {
            borrowed: !opts.copy,
        },
        Shape::Array { len, elem } => ShapeKey::Array {
            len: *len,
            elem: Box::new(type_key(elem)),
        },
        Shape::Slice { elem } => ShapeKey::Slice {
            elem: Box::new(type_key(elem)),
        },
        Shape::Tuple { fields } => ShapeKey::Tuple {
            fields: fields
                .iter()
                .map(|(name, s)| (name.clone(), type_key(s)))
                .collect(),
        },
        Shape::Struct { fields, .. } => ShapeKey::Struct {
            fields: fields
                .iter()
                .map(|f| (f.name.clone(), type_key(&f.schema)))
                .collect(),
        },
        Shape::Map { key, value } => ShapeKey::Map {
            key: Box::new(type_key(key)),
            value: Box::new(type_key(value)),
        },
    };
    TypeKey {
        name: schema.name.clone(),
        shape,
    }
}

fn options_key(schema: &Schema) -> OptionsKey {
    match &schema.shape {
        Shape::Bool
        | Shape::Int64
        | Shape::Uint64
        | Shape::Float32
        | Shape::Float64
        | Shape::QuotedFloat64
        | Shape::Float64WithSrc => OptionsKey::None,
        Shape::String(opts) => OptionsKey::Str(*opts),
        Shape::Array { elem, .. } | Shape::Slice { elem } => {
            OptionsKey::Elem(Box::new(options_key(elem)))
        }
        Shape::Tuple { fields } => {
            OptionsKey::Fields(fields.iter().map(|(_, s)| options_key(s)).collect())
        }
        Shape::Struct {
            fields,
            unknown_keys,
        } => OptionsKey::Object {
            fields: fields.iter().map(|f| options_key(&f.schema)).collect(),
            json_names: fields.iter().map(|f| f.json.clone()).collect(),
            unknown_keys: *unknown_keys,
        },
        Shape::Map { key, value } => OptionsKey::Map {
            key: Box::new(options_key(key)),
            value: Box::new(options_key(value)),
        },
    }
}

/// Derives the parser-routine identity of a schema node.
pub(crate) fn parser_key(schema: &Schema) -> ParserKey {
    ParserKey {
        ty: type_key(schema),
        opts: options_key(schema),
    }
}

/// Insertion-ordered collections of materialized types and parser routines.
/// Ids are insertion indices, so a fixed traversal order yields a fixed id
/// assignment.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    types: IndexMap<TypeKey, usize>,
    parsers: IndexMap<ParserKey, usize>,
}

impl Registry {
    /// Registers a destination type, returning `(was_new, id)`.
    pub fn register_type(&mut self, key: TypeKey) -> (bool, usize) {
        let next = self.types.len();
        match self.types.entry(key) {
            indexmap::map::Entry::Occupied(e) => (false, *e.get()),
            indexmap::map::Entry::Vacant(e) => {
                tracing::trace!(id = next, "registering destination type");
                e.insert(next);
                (true, next)
            }
        }
    }

    /// Registers a parser routine, returning `(was_new, id)`.
    pub fn register_parser(&mut self, key: ParserKey) -> (bool, usize) {
        let next = self.parsers.len();
        match self.parsers.entry(key) {
            indexmap::map::Entry::Occupied(e) => (false, *e.get()),
            indexmap::map::Entry::Vacant(e) => {
                tracing::trace!(id = next, "registering parser routine");
                e.insert(next);
                (true, next)
            }
        }
    }

    /// Id of an already-registered destination type.
    ///
    /// # Panics
    ///
    /// Panics if the type was never registered — type generation always
    /// precedes uses of the id.
    pub fn type_id(&self, key: &TypeKey) -> usize {
        *self
            .types
            .get(key)
            .expect("destination type used before registration")
    }

    /// Id of an already-registered parser routine.
    ///
    /// # Panics
    ///
    /// Panics if the routine was never registered — parser generation
    /// always precedes call-site emission.
    pub fn parser_id(&self, key: &ParserKey) -> usize {
        *self
            .parsers
            .get(key)
            .expect("parser routine used before registration")
    }
}
