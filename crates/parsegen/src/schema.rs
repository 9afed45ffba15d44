//! The schema type algebra: a closed set of node kinds, each describing one
//! JSON value shape, composed into trees that drive parser emission.

/// Behavior options of a string node.
///
/// The three flags are independent except that `unquote` implies an owned
/// result: escape decoding builds fresh text, so `copy: false` is coerced to
/// `copy: true` at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringOptions {
    /// Own the decoded bytes instead of borrowing from the input buffer.
    pub copy: bool,
    /// Verify the result is well-formed UTF-8.
    pub validate_utf8: bool,
    /// Decode JSON escape sequences (`\n`, `\uXXXX`, surrogate pairs, ...).
    pub unquote: bool,
}

impl Default for StringOptions {
    fn default() -> Self {
        StringOptions {
            copy: true,
            validate_utf8: true,
            unquote: true,
        }
    }
}

/// Policy for object keys the schema does not name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnknownKeys {
    /// Skip the key's value and continue.
    Skip,
    /// Fail the parse with an `unexpected key` error carrying the key text.
    Fail,
}

/// A named object field: destination field name, JSON key, element schema.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) json: String,
    pub(crate) schema: Schema,
}

impl Field {
    /// A field whose JSON key equals its destination name.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        Field {
            json: name.clone(),
            name,
            schema,
        }
    }

    /// Overrides the JSON key this field is read from.
    pub fn rename(mut self, json: impl Into<String>) -> Self {
        self.json = json.into();
        self
    }
}

/// One JSON value shape.
#[derive(Debug, Clone)]
pub enum Shape {
    Bool,
    Int64,
    Uint64,
    Float32,
    Float64,
    /// A 64-bit float wrapped in quotes in the JSON source: `"2.5"`.
    QuotedFloat64,
    /// A 64-bit float plus the literal source bytes it was decoded from.
    Float64WithSrc,
    String(StringOptions),
    /// Fixed-length JSON array of one element shape.
    Array { len: usize, elem: Box<Schema> },
    /// Variable-length JSON array of one element shape.
    Slice { elem: Box<Schema> },
    /// Fixed-length JSON array with per-position shapes, stored in named
    /// fields of a record.
    Tuple { fields: Vec<(String, Schema)> },
    /// JSON object with known keys.
    Struct {
        fields: Vec<Field>,
        unknown_keys: UnknownKeys,
    },
    /// JSON object with arbitrary string keys and one value shape.
    Map { key: Box<Schema>, value: Box<Schema> },
}

/// A schema node: a shape plus an optional destination type name.
///
/// An empty name means the destination type is spelled inline (or, for
/// record shapes, materialized under a generated `T<i>` name) at each use
/// site; a non-empty name materializes a named destination type that is
/// reused wherever a structurally equal schema appears.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) name: String,
    pub(crate) shape: Shape,
}

impl Schema {
    fn with(shape: Shape) -> Self {
        Schema {
            name: String::new(),
            shape,
        }
    }

    pub fn bool() -> Self {
        Self::with(Shape::Bool)
    }

    pub fn int64() -> Self {
        Self::with(Shape::Int64)
    }

    pub fn uint64() -> Self {
        Self::with(Shape::Uint64)
    }

    pub fn float32() -> Self {
        Self::with(Shape::Float32)
    }

    pub fn float64() -> Self {
        Self::with(Shape::Float64)
    }

    /// A float delimited by quotes in the source document.
    pub fn quoted_float64() -> Self {
        Self::with(Shape::QuotedFloat64)
    }

    /// A float captured together with its literal source bytes.
    pub fn float64_with_src() -> Self {
        Self::with(Shape::Float64WithSrc)
    }

    /// An owned, validated, escape-decoded string (all safety on).
    pub fn string() -> Self {
        Self::string_opts(StringOptions::default())
    }

    /// A string with explicit behavior options.
    pub fn string_opts(mut opts: StringOptions) -> Self {
        if opts.unquote {
            // Escape decoding always produces owned text.
            opts.copy = true;
        }
        Self::with(Shape::String(opts))
    }

    /// The fastest string mode: borrow the raw span, no validation, no
    /// escape decoding. Only valid when the caller guarantees well-formed
    /// input that outlives the parsed value.
    pub fn unsafe_string() -> Self {
        Self::string_opts(StringOptions {
            copy: false,
            validate_utf8: false,
            unquote: false,
        })
    }

    /// A JSON array of exactly `len` elements.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero.
    pub fn array(len: usize, elem: Schema) -> Self {
        assert!(len > 0, "array length must be at least 1");
        Self::with(Shape::Array {
            len,
            elem: Box::new(elem),
        })
    }

    /// A JSON array of any length.
    pub fn slice(elem: Schema) -> Self {
        Self::with(Shape::Slice {
            elem: Box::new(elem),
        })
    }

    /// A JSON array of fixed length whose positions have distinct shapes,
    /// parsed into named record fields in order.
    pub fn tuple<N: Into<String>>(fields: impl IntoIterator<Item = (N, Schema)>) -> Self {
        Self::with(Shape::Tuple {
            fields: fields
                .into_iter()
                .map(|(name, schema)| (name.into(), schema))
                .collect(),
        })
    }

    /// A JSON object with known keys.
    pub fn object(fields: impl IntoIterator<Item = Field>, unknown_keys: UnknownKeys) -> Self {
        Self::with(Shape::Struct {
            fields: fields.into_iter().collect(),
            unknown_keys,
        })
    }

    /// A JSON object with arbitrary keys, parsed into a map.
    ///
    /// # Panics
    ///
    /// Panics unless `key` is a string schema.
    pub fn map(key: Schema, value: Schema) -> Self {
        assert!(
            matches!(key.shape, Shape::String(_)),
            "map keys must use a string schema"
        );
        Self::with(Shape::Map {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    /// Attaches a destination type name, materializing a named type that is
    /// reused wherever a structurally equal schema appears.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    /// Child schemas in declaration order. Traversal order — and therefore
    /// registration order and id assignment — is defined by this.
    pub(crate) fn children(&self) -> Vec<&Schema> {
        match &self.shape {
            Shape::Bool
            | Shape::Int64
            | Shape::Uint64
            | Shape::Float32
            | Shape::Float64
            | Shape::QuotedFloat64
            | Shape::Float64WithSrc
            | Shape::String(_) => Vec::new(),
            Shape::Array { elem, .. } | Shape::Slice { elem } => vec![elem.as_ref()],
            Shape::Tuple { fields } => fields.iter().map(|(_, s)| s).collect(),
            Shape::Struct { fields, .. } => fields.iter().map(|f| &f.schema).collect(),
            Shape::Map { key, value } => vec![key.as_ref(), value.as_ref()],
        }
    }

    /// Whether this destination holds references into the input buffer and
    /// therefore carries a lifetime parameter.
    pub(crate) fn borrows(&self) -> bool {
        match &self.shape {
            Shape::String(opts) => !opts.copy,
            Shape::Float64WithSrc => true,
            _ => self.children().iter().any(|c| c.borrows()),
        }
    }

    /// Record shapes materialize a struct declaration (named or `T<i>`);
    /// everything else is spelled structurally or aliased.
    pub(crate) fn is_record(&self) -> bool {
        matches!(
            self.shape,
            Shape::Tuple { .. } | Shape::Struct { .. } | Shape::Float64WithSrc
        )
    }
}
