//! Schema-directed emission: destination type declarations, parser
//! routines, and public entrypoints.
//!
//! Traversal is children-first in declaration order, so registration order
//! (and with it every generated id) is fully determined by the schema.

use std::fmt;

use crate::registry::{parser_key, type_key};
use crate::schema::{Field, Schema, Shape, StringOptions, UnknownKeys};
use crate::session::{KeyDispatch, Session};
use crate::writer::Writer;

/// An lvalue expression for the destination currently being written.
///
/// Roots are pre-parenthesized (`(*v)`, `(*self)`), so field and index
/// projections concatenate without precedence surprises.
#[derive(Debug, Clone)]
struct Place(String);

impl Place {
    fn root(expr: &str) -> Self {
        Place(expr.to_owned())
    }

    fn var(name: &str) -> Self {
        Place(name.to_owned())
    }

    fn field(&self, name: &str) -> Self {
        Place(format!("{}.{}", self.0, name))
    }

    fn index(&self, i: usize) -> Self {
        Place(format!("{}[{}]", self.0, i))
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds whose trim is a call to an emitted routine rather than an inlined
/// primitive call.
fn needs_parser_fn(s: &Schema) -> bool {
    matches!(
        s.shape,
        Shape::QuotedFloat64
            | Shape::Float64WithSrc
            | Shape::Array { .. }
            | Shape::Slice { .. }
            | Shape::Tuple { .. }
            | Shape::Struct { .. }
            | Shape::Map { .. }
    )
}

/// Zero expressions that are plain `Copy` literals, usable in `[expr; N]`.
fn zero_is_copy(s: &Schema) -> bool {
    match &s.shape {
        Shape::Bool
        | Shape::Int64
        | Shape::Uint64
        | Shape::Float32
        | Shape::Float64
        | Shape::QuotedFloat64 => true,
        Shape::String(opts) => !opts.copy,
        Shape::Array { elem, .. } => zero_is_copy(elem),
        _ => false,
    }
}

fn byte_literal(b: u8) -> String {
    match b {
        b'\'' => r"b'\''".to_owned(),
        b'\\' => r"b'\\'".to_owned(),
        0x20..=0x7e => format!("b'{}'", b as char),
        _ => format!("b'\\x{b:02x}'"),
    }
}

fn bytes_literal(s: &str) -> String {
    let mut out = String::from("b\"");
    for b in s.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push('"');
    out
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

const QUOTED_F64_FN: &str = r#"
fn parse_quoted_f64(buf: &[u8], pos: &mut usize) -> Result<f64, ParseError> {
    expect_byte(buf, pos, b'"')?;
    let value = decode_float64(buf, pos)?;
    expect_byte(buf, pos, b'"')?;
    Ok(value)
}
"#;

const OBJECT_LOOP: &str = "
    let mut non_empty = false;
    expect_byte(buf, pos, b'{')?;
    skip_whitespace(buf, pos);
    loop {
        let mut c = next_byte(buf, pos)?;
        if c == b'}' {
            break;
        }
        if non_empty {
            if c != b',' {
                return Err(ParseError::at(buf, *pos - 1, \"expected ','\"));
            }
            skip_whitespace(buf, pos);
            c = next_byte(buf, pos)?;
        }
        *pos -= 1;
        {{}}
    }
    Ok(())
";

const SLICE_HEAD: &str = "
    expect_byte(buf, pos, b'[')?;
    skip_whitespace(buf, pos);
    if *pos >= buf.len() {
        return Err(ParseError::at(buf, *pos, ERR_END_OF_ARRAY));
    }
    if buf[*pos] == b']' {
        *pos += 1;
        return Ok(());
    }
";

const SLICE_LOOP: &str = "
    loop {
        skip_whitespace(buf, pos);
        if *pos >= buf.len() {
            return Err(ParseError::at(buf, *pos, ERR_END_OF_ARRAY));
        }
        if buf[*pos] == b']' {
            *pos += 1;
            return Ok(());
        }
        expect_byte(buf, pos, b',')?;
        skip_whitespace(buf, pos);
        {{}}
        (*v).push(elem);
    }
";

const ENTRY_PRELUDE: &str = "
    let buf = data;
    let mut n = 0usize;
    let pos = &mut n;
    skip_whitespace(buf, pos);
";

impl Session {
    /// Materializes the destination types of `s`, children first. A node
    /// produces a declaration when it is named or is a record shape (Rust
    /// has no anonymous structs, so records always get a declared name —
    /// their own or the generated `T<id>`).
    pub(crate) fn generate_types(&mut self, s: &Schema) {
        for child in s.children() {
            self.generate_types(child);
        }
        if matches!(s.shape, Shape::Map { .. }) {
            self.imports.insert("std::collections::HashMap".to_owned());
        }
        if s.is_named() || s.is_record() {
            let (new, id) = self.registry.register_type(type_key(s));
            if new {
                let decl = self.render_type_decl(s, id);
                self.types_out.raw(&decl);
            }
        }
    }

    /// Materializes the parser routines of `s`, children first. Every node
    /// registers a parser identity; only kinds with out-of-line routines
    /// emit a function.
    pub(crate) fn generate_parsers(&mut self, s: &Schema) {
        for child in s.children() {
            self.generate_parsers(child);
        }
        let (new, id) = self.registry.register_parser(parser_key(s));
        if new && needs_parser_fn(s) {
            let routine = self.render_parser_fn(s, id);
            self.parsers_out.raw(&routine);
        }
    }

    /// The type spelling used at reference sites: the destination name
    /// when named, the structural spelling otherwise.
    fn print_type(&self, s: &Schema) -> String {
        if s.is_named() {
            let lifetime = if s.borrows() { "<'a>" } else { "" };
            return format!("{}{lifetime}", s.name);
        }
        self.long_typename(s)
    }

    /// The structural spelling, regardless of naming. Record shapes have no
    /// inline form in Rust; they resolve to their generated `T<id>` name.
    fn long_typename(&self, s: &Schema) -> String {
        match &s.shape {
            Shape::Bool => "bool".to_owned(),
            Shape::Int64 => "i64".to_owned(),
            Shape::Uint64 => "u64".to_owned(),
            Shape::Float32 => "f32".to_owned(),
            Shape::Float64 | Shape::QuotedFloat64 => "f64".to_owned(),
            Shape::String(opts) => {
                if opts.copy {
                    "String".to_owned()
                } else {
                    "&'a str".to_owned()
                }
            }
            Shape::Array { len, elem } => format!("[{}; {len}]", self.print_type(elem)),
            Shape::Slice { elem } => format!("Vec<{}>", self.print_type(elem)),
            Shape::Map { key, value } => format!(
                "HashMap<{}, {}>",
                self.print_type(key),
                self.print_type(value)
            ),
            Shape::Tuple { .. } | Shape::Struct { .. } | Shape::Float64WithSrc => {
                let id = self.registry.type_id(&type_key(s));
                let lifetime = if s.borrows() { "<'a>" } else { "" };
                format!("T{id}{lifetime}")
            }
        }
    }

    /// The expression form of a zeroed destination, used for local element
    /// variables and `Default` impls.
    fn zero_expr(&self, s: &Schema) -> String {
        match &s.shape {
            Shape::Bool => "false".to_owned(),
            Shape::Int64 | Shape::Uint64 => "0".to_owned(),
            Shape::Float32 | Shape::Float64 | Shape::QuotedFloat64 => "0.0".to_owned(),
            Shape::String(opts) => {
                if opts.copy {
                    "String::new()".to_owned()
                } else {
                    "\"\"".to_owned()
                }
            }
            Shape::Array { len, elem } => {
                let inner = self.zero_expr(elem);
                if zero_is_copy(elem) {
                    format!("[{inner}; {len}]")
                } else {
                    format!("std::array::from_fn(|_| {inner})")
                }
            }
            Shape::Slice { .. } => "Vec::new()".to_owned(),
            Shape::Map { .. } => "HashMap::new()".to_owned(),
            Shape::Tuple { .. } | Shape::Struct { .. } | Shape::Float64WithSrc => {
                let name = if s.is_named() {
                    s.name.clone()
                } else {
                    format!("T{}", self.registry.type_id(&type_key(s)))
                };
                format!("{name}::default()")
            }
        }
    }

    /// Statements that reset the destination at `place`. Slices truncate
    /// without freeing so buffers are reused across calls; maps start
    /// fresh.
    fn zero_stmts(&self, w: &mut Writer, s: &Schema, place: &Place) {
        match &s.shape {
            Shape::Bool => w.line(&format!("{place} = false;")),
            Shape::Int64 | Shape::Uint64 => w.line(&format!("{place} = 0;")),
            Shape::Float32 | Shape::Float64 | Shape::QuotedFloat64 => {
                w.line(&format!("{place} = 0.0;"));
            }
            Shape::String(opts) => {
                if opts.copy {
                    w.line(&format!("{place}.clear();"));
                } else {
                    w.line(&format!("{place} = \"\";"));
                }
            }
            Shape::Array { elem, .. } => {
                w.line(&format!("for e in {place}.iter_mut()"));
                w.open_brace();
                self.zero_stmts(w, elem, &Place::root("(*e)"));
                w.close_brace();
            }
            Shape::Slice { .. } => w.line(&format!("{place}.clear();")),
            Shape::Map { .. } => w.line(&format!("{place} = HashMap::new();")),
            Shape::Tuple { fields } => {
                for (name, child) in fields {
                    self.zero_stmts(w, child, &place.field(name));
                }
            }
            Shape::Struct { fields, .. } => {
                for f in fields {
                    self.zero_stmts(w, &f.schema, &place.field(&f.name));
                }
            }
            Shape::Float64WithSrc => {
                w.line(&format!("{place}.value = 0.0;"));
                w.line(&format!("{place}.src = &[];"));
            }
        }
    }

    /// A call site that parses the value at the cursor into `place`.
    /// Scalars inline a primitive call; everything else calls its
    /// registered routine.
    fn trim_stmts(&self, w: &mut Writer, s: &Schema, place: &Place) {
        match &s.shape {
            Shape::Bool => w.line(&format!("{place} = decode_bool(buf, pos)?;")),
            Shape::Int64 => w.line(&format!("{place} = decode_int64(buf, pos)?;")),
            Shape::Uint64 => w.line(&format!("{place} = decode_uint64(buf, pos)?;")),
            Shape::Float32 => w.line(&format!("{place} = decode_float32(buf, pos)?;")),
            Shape::Float64 => w.line(&format!("{place} = decode_float64(buf, pos)?;")),
            Shape::QuotedFloat64 => w.line(&format!("{place} = parse_quoted_f64(buf, pos)?;")),
            Shape::String(opts) => self.trim_string(w, *opts, place),
            _ => {
                let id = self.registry.parser_id(&parser_key(s));
                w.line(&format!("parse_{id}(buf, pos, &mut {place})?;"));
            }
        }
    }

    fn trim_string(&self, w: &mut Writer, opts: StringOptions, place: &Place) {
        let place = place.to_string();
        let subs: &[(&str, &str)] = &[("place", &place)];
        if opts.unquote {
            w.lines(
                "
                {
                    let s = take_string_bytes(buf, pos)?;
                    match unquote_bytes(s) {
                        Some(text) => {place} = text,
                        None => return Err(ParseError::at(buf, *pos, ERR_UNQUOTE)),
                    }
                }
                ",
                subs,
            );
        } else {
            let convert = match (opts.copy, opts.validate_utf8) {
                (true, true) => "{place} = check_utf8(buf, *pos, s)?.to_owned();",
                (true, false) => {
                    "{place} = unsafe { std::str::from_utf8_unchecked(s) }.to_owned();"
                }
                (false, true) => "{place} = check_utf8(buf, *pos, s)?;",
                (false, false) => "{place} = unsafe { std::str::from_utf8_unchecked(s) };",
            };
            w.line("{");
            w.with_indent(|w| {
                w.line("let s = take_string_bytes(buf, pos)?;");
                w.line(&convert.replace("{place}", &place));
            });
            w.line("}");
        }
    }

    fn render_type_decl(&self, s: &Schema, id: usize) -> String {
        let mut w = Writer::new();
        let name = if s.is_named() {
            s.name.clone()
        } else {
            format!("T{id}")
        };
        let lifetime = if s.borrows() { "<'a>" } else { "" };
        match &s.shape {
            Shape::Tuple { fields } => {
                let fields: Vec<_> = fields
                    .iter()
                    .map(|(n, c)| (n.clone(), self.print_type(c), self.zero_expr(c)))
                    .collect();
                self.render_record_decl(&mut w, &name, lifetime, &fields);
            }
            Shape::Struct { fields, .. } => {
                let fields: Vec<_> = fields
                    .iter()
                    .map(|f| {
                        (
                            f.name.clone(),
                            self.print_type(&f.schema),
                            self.zero_expr(&f.schema),
                        )
                    })
                    .collect();
                self.render_record_decl(&mut w, &name, lifetime, &fields);
            }
            Shape::Float64WithSrc => {
                let fields = vec![
                    ("value".to_owned(), "f64".to_owned(), "0.0".to_owned()),
                    ("src".to_owned(), "&'a [u8]".to_owned(), "&[]".to_owned()),
                ];
                self.render_record_decl(&mut w, &name, lifetime, &fields);
            }
            _ => {
                w.blank();
                w.line(&format!(
                    "pub type {name}{lifetime} = {};",
                    self.long_typename(s)
                ));
            }
        }
        w.take()
    }

    fn render_record_decl(
        &self,
        w: &mut Writer,
        name: &str,
        lifetime: &str,
        fields: &[(String, String, String)],
    ) {
        w.blank();
        w.line("#[derive(Debug, Clone, PartialEq)]");
        w.line(&format!("pub struct {name}{lifetime}"));
        w.open_brace();
        for (fname, ftype, _) in fields {
            w.line(&format!("pub {fname}: {ftype},"));
        }
        w.close_brace();
        w.blank();
        w.line(&format!("impl{lifetime} Default for {name}{lifetime}"));
        w.open_brace();
        w.line("fn default() -> Self");
        w.open_brace();
        w.line("Self");
        w.open_brace();
        for (fname, _, fzero) in fields {
            w.line(&format!("{fname}: {fzero},"));
        }
        w.close_brace();
        w.close_brace();
        w.close_brace();
    }

    fn render_parser_fn(&self, s: &Schema, id: usize) -> String {
        let mut w = Writer::new();
        w.blank();
        if matches!(s.shape, Shape::QuotedFloat64) {
            w.lines(QUOTED_F64_FN, &[]);
            return w.take();
        }
        let dest = self.print_type(s);
        let (generics, buf_ty) = if s.borrows() {
            ("<'a>", "&'a [u8]")
        } else {
            ("", "&[u8]")
        };
        w.line(&format!(
            "fn parse_{id}{generics}(buf: {buf_ty}, pos: &mut usize, v: &mut {dest}) -> Result<(), ParseError>"
        ));
        w.open_brace();
        let v = Place::root("(*v)");
        match &s.shape {
            Shape::Float64WithSrc => {
                w.lines(
                    "
                    let start = *pos;
                    (*v).value = decode_float64(buf, pos)?;
                    (*v).src = &buf[start..*pos];
                    Ok(())
                    ",
                    &[],
                );
            }
            Shape::Array { len, elem } => self.render_array_body(&mut w, *len, elem, &v),
            Shape::Tuple { fields } => self.render_tuple_body(&mut w, fields, &v),
            Shape::Slice { elem } => self.render_slice_body(&mut w, elem),
            Shape::Struct {
                fields,
                unknown_keys,
            } => {
                w.lines_with(OBJECT_LOOP, &[], |w| {
                    w.line("let key = take_key_colon(buf, pos)?;");
                    w.line("non_empty = true;");
                    self.render_key_dispatch(w, fields, *unknown_keys, &v);
                });
            }
            Shape::Map { key, value } => self.render_map_body(&mut w, key, value),
            _ => unreachable!("scalar parsers are inlined at the call site"),
        }
        w.close_brace();
        w.take()
    }

    fn render_array_body(&self, w: &mut Writer, len: usize, elem: &Schema, v: &Place) {
        w.lines(
            "
            expect_byte(buf, pos, b'[')?;
            skip_whitespace(buf, pos);
            ",
            &[],
        );
        for i in 0..len {
            if i > 0 {
                w.lines(
                    "
                    expect_byte(buf, pos, b',')?;
                    skip_whitespace(buf, pos);
                    ",
                    &[],
                );
            }
            self.trim_stmts(w, elem, &v.index(i));
            w.line("skip_whitespace(buf, pos);");
        }
        w.line("expect_byte(buf, pos, b']')?;");
        w.line("Ok(())");
    }

    fn render_tuple_body(&self, w: &mut Writer, fields: &[(String, Schema)], v: &Place) {
        w.lines(
            "
            expect_byte(buf, pos, b'[')?;
            skip_whitespace(buf, pos);
            ",
            &[],
        );
        for (i, (name, child)) in fields.iter().enumerate() {
            if i > 0 {
                w.lines(
                    "
                    expect_byte(buf, pos, b',')?;
                    skip_whitespace(buf, pos);
                    ",
                    &[],
                );
            }
            self.trim_stmts(w, child, &v.field(name));
            w.line("skip_whitespace(buf, pos);");
        }
        w.line("expect_byte(buf, pos, b']')?;");
        w.line("Ok(())");
    }

    fn render_slice_body(&self, w: &mut Writer, elem: &Schema) {
        let elem_ty = self.print_type(elem);
        let elem_zero = self.zero_expr(elem);
        w.lines(SLICE_HEAD, &[]);
        w.line(&format!("let mut elem: {elem_ty} = {elem_zero};"));
        self.trim_stmts(w, elem, &Place::var("elem"));
        w.line("(*v).push(elem);");
        w.lines_with(SLICE_LOOP, &[], |w| {
            w.line(&format!("let mut elem: {elem_ty} = {elem_zero};"));
            self.trim_stmts(w, elem, &Place::var("elem"));
        });
    }

    fn render_map_body(&self, w: &mut Writer, key: &Schema, value: &Schema) {
        let key_ty = self.print_type(key);
        let key_zero = self.zero_expr(key);
        let value_ty = self.print_type(value);
        let value_zero = self.zero_expr(value);
        w.lines_with(OBJECT_LOOP, &[], |w| {
            w.line(&format!("let mut key: {key_ty} = {key_zero};"));
            self.trim_stmts(w, key, &Place::var("key"));
            w.lines(
                "
                skip_whitespace(buf, pos);
                expect_byte(buf, pos, b':')?;
                skip_whitespace(buf, pos);
                non_empty = true;
                ",
                &[],
            );
            w.line(&format!("let mut value: {value_ty} = {value_zero};"));
            self.trim_stmts(w, value, &Place::var("value"));
            w.line("skip_whitespace(buf, pos);");
            w.line("(*v).insert(key, value);");
        });
    }

    /// Emits the per-key dispatch inside the struct parsing loop. `key`
    /// holds the raw key bytes at this point.
    fn render_key_dispatch(
        &self,
        w: &mut Writer,
        fields: &[Field],
        unknown_keys: UnknownKeys,
        v: &Place,
    ) {
        let distinct_first_bytes = {
            let mut firsts: Vec<u8> = fields
                .iter()
                .filter_map(|f| f.json.bytes().next())
                .collect();
            firsts.sort_unstable();
            firsts.dedup();
            fields.iter().all(|f| !f.json.is_empty()) && firsts.len() == fields.len()
        };
        let single_byte = fields.iter().all(|f| f.json.len() == 1);

        enum Strategy {
            Whole,
            Byte,
            FirstByte,
        }
        let strategy = match self.options.key_dispatch {
            KeyDispatch::Auto if !fields.is_empty() && single_byte && distinct_first_bytes => {
                Strategy::Byte
            }
            KeyDispatch::FirstByte if !fields.is_empty() && distinct_first_bytes => {
                Strategy::FirstByte
            }
            _ => Strategy::Whole,
        };

        match strategy {
            Strategy::Whole => {
                w.line("match key");
                w.open_brace();
                for f in fields {
                    w.line(&format!("{} =>", bytes_literal(&f.json)));
                    w.open_brace();
                    self.trim_stmts(w, &f.schema, &v.field(&f.name));
                    w.line("skip_whitespace(buf, pos);");
                    w.close_brace();
                }
                w.line("_ =>");
                w.open_brace();
                self.miss_stmts(w, unknown_keys);
                w.close_brace();
                w.close_brace();
            }
            Strategy::Byte => {
                w.line("if key.len() == 1");
                w.open_brace();
                w.line("match key[0]");
                w.open_brace();
                for f in fields {
                    w.line(&format!("{} =>", byte_literal(f.json.as_bytes()[0])));
                    w.open_brace();
                    self.trim_stmts(w, &f.schema, &v.field(&f.name));
                    w.line("skip_whitespace(buf, pos);");
                    w.close_brace();
                }
                w.line("_ =>");
                w.open_brace();
                self.miss_stmts(w, unknown_keys);
                w.close_brace();
                w.close_brace();
                w.close_brace();
                w.raw(" else");
                w.open_brace();
                self.miss_stmts(w, unknown_keys);
                w.close_brace();
            }
            Strategy::FirstByte => {
                w.line("if key.is_empty()");
                w.open_brace();
                self.miss_stmts(w, unknown_keys);
                w.close_brace();
                w.raw(" else");
                w.open_brace();
                w.line("match key[0]");
                w.open_brace();
                for f in fields {
                    w.line(&format!("{} =>", byte_literal(f.json.as_bytes()[0])));
                    w.open_brace();
                    w.line(&format!("if key != {}", bytes_literal(&f.json)));
                    w.open_brace();
                    self.miss_stmts(w, unknown_keys);
                    w.close_brace();
                    w.raw(" else");
                    w.open_brace();
                    self.trim_stmts(w, &f.schema, &v.field(&f.name));
                    w.line("skip_whitespace(buf, pos);");
                    w.close_brace();
                    w.close_brace();
                }
                w.line("_ =>");
                w.open_brace();
                self.miss_stmts(w, unknown_keys);
                w.close_brace();
                w.close_brace();
                w.close_brace();
            }
        }
    }

    fn miss_stmts(&self, w: &mut Writer, unknown_keys: UnknownKeys) {
        match unknown_keys {
            UnknownKeys::Skip => w.line("skip_value(buf, pos)?;"),
            UnknownKeys::Fail => w.line("return Err(unexpected_key(buf, *pos, key));"),
        }
    }

    /// Emits the public entrypoint bound to the root's destination type.
    /// Record roots get an inherent method; alias roots (scalar, array,
    /// slice, map destinations) cannot carry inherent impls in Rust and get
    /// a free function instead.
    pub(crate) fn emit_entrypoint(&mut self, root: &Schema, method: &str) {
        let mut w = Writer::new();
        let lifetime = if root.borrows() { "<'a>" } else { "" };
        let data_ty = if root.borrows() { "&'a [u8]" } else { "&[u8]" };
        w.blank();
        if root.is_record() {
            w.line(&format!("impl{lifetime} {}{lifetime}", root.name));
            w.open_brace();
            w.line(&format!(
                "pub fn {method}(&mut self, data: {data_ty}) -> Result<(), ParseError>"
            ));
            w.open_brace();
            let dest = Place::root("(*self)");
            self.zero_stmts(&mut w, root, &dest);
            w.lines(ENTRY_PRELUDE, &[]);
            self.trim_stmts(&mut w, root, &dest);
            w.line("Ok(())");
            w.close_brace();
            w.close_brace();
        } else {
            w.line(&format!(
                "pub fn {}_{method}{lifetime}(v: &mut {}{lifetime}, data: {data_ty}) -> Result<(), ParseError>",
                snake_case(&root.name),
                root.name
            ));
            w.open_brace();
            let dest = Place::root("(*v)");
            self.zero_stmts(&mut w, root, &dest);
            w.lines(ENTRY_PRELUDE, &[]);
            self.trim_stmts(&mut w, root, &dest);
            w.line("Ok(())");
            w.close_brace();
        }
        self.entrypoints_out.raw(&w.take());
    }
}
