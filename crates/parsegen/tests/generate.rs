//! End-to-end emission tests: packaging, determinism, deduplication, and
//! the shape of the generated source.

use parsegen::{Error, Field, KeyDispatch, Options, Schema, Session, UnknownKeys};

fn trade() -> Schema {
    Schema::object(
        [
            Field::new("a", Schema::int64()),
            Field::new("b", Schema::bool()),
        ],
        UnknownKeys::Skip,
    )
    .named("Trade")
}

fn generate_to_string(roots: &[(&Schema, &str)], options: Options) -> String {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = Session::create(dir.path(), "out", options).expect("session");
    for (root, method) in roots {
        session.generate(root, method).expect("generate");
    }
    let module_dir = session.finish().expect("finish");
    std::fs::read_to_string(module_dir.join("mod.rs")).expect("read mod.rs")
}

#[test]
fn artifact_pair_is_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = Session::create(dir.path(), "market", Options::default()).expect("session");
    session.generate(&trade(), "unmarshal").expect("generate");
    let module_dir = session.finish().expect("finish");

    assert_eq!(module_dir, dir.path().join("market"));
    let runtime = std::fs::read_to_string(module_dir.join("runtime.rs")).expect("runtime.rs");
    assert_eq!(runtime, parsegen_runtime::RUNTIME_SOURCE);
    let module = std::fs::read_to_string(module_dir.join("mod.rs")).expect("mod.rs");
    assert!(module.ends_with("}\n"));
}

#[test]
fn missing_output_dir_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("does-not-exist");
    let err = Session::create(&missing, "out", Options::default())
        .err()
        .expect("must fail");
    assert!(matches!(err, Error::OutputDirMissing(p) if p == missing));
}

#[test]
fn unnamed_root_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = Session::create(dir.path(), "out", Options::default()).expect("session");
    let err = session
        .generate(&Schema::slice(Schema::int64()), "unmarshal")
        .err()
        .expect("must fail");
    assert!(matches!(err, Error::UnnamedRoot));
}

#[test]
fn duplicate_entrypoint_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = Session::create(dir.path(), "out", Options::default()).expect("session");
    session.generate(&trade(), "unmarshal").expect("first");
    let err = session.generate(&trade(), "unmarshal").err().expect("dup");
    assert!(matches!(err, Error::DuplicateEntrypoint(name) if name == "Trade.unmarshal"));

    // A second method on the same destination type is fine.
    session.generate(&trade(), "parse").expect("second method");
}

#[test]
fn generation_is_deterministic() {
    let schema = Schema::object(
        [
            Field::new("xs", Schema::slice(Schema::int64())),
            Field::new("name", Schema::string()),
            Field::new("grid", Schema::array(3, Schema::float64())),
            Field::new("ratio", Schema::float32()),
            Field::new("seq", Schema::uint64()),
        ],
        UnknownKeys::Fail,
    )
    .named("Doc");
    let first = generate_to_string(&[(&schema, "unmarshal")], Options::default());
    let second = generate_to_string(&[(&schema, "unmarshal")], Options::default());
    assert_eq!(first, second);
}

#[test]
fn equal_subtrees_share_one_routine() {
    let schema = Schema::object(
        [
            Field::new("xs", Schema::slice(Schema::int64())),
            Field::new("ys", Schema::slice(Schema::int64())),
            Field::new("zs", Schema::slice(Schema::float64())),
        ],
        UnknownKeys::Skip,
    )
    .named("Doc");
    let out = generate_to_string(&[(&schema, "unmarshal")], Options::default());
    // One routine for Vec<i64> (shared), one for Vec<f64>, one for the root.
    assert_eq!(out.matches("\nfn parse_").count(), 3);
    assert_eq!(out.matches("\npub struct ").count(), 1);
}

#[test]
fn parser_options_split_routines() {
    use parsegen::StringOptions;
    let unvalidated = StringOptions {
        copy: true,
        validate_utf8: false,
        unquote: false,
    };
    let validated = StringOptions {
        copy: true,
        validate_utf8: true,
        unquote: false,
    };
    let split = Schema::object(
        [
            Field::new("a", Schema::slice(Schema::string_opts(validated))),
            Field::new("b", Schema::slice(Schema::string_opts(unvalidated))),
        ],
        UnknownKeys::Skip,
    )
    .named("Doc");
    let out = generate_to_string(&[(&split, "unmarshal")], Options::default());
    // The two Vec<String> destinations are one type but two routines.
    assert_eq!(out.matches("\nfn parse_").count(), 3);

    let shared = Schema::object(
        [
            Field::new("a", Schema::slice(Schema::string_opts(validated))),
            Field::new("b", Schema::slice(Schema::string_opts(validated))),
        ],
        UnknownKeys::Skip,
    )
    .named("Doc");
    let out = generate_to_string(&[(&shared, "unmarshal")], Options::default());
    assert_eq!(out.matches("\nfn parse_").count(), 2);
}

#[test]
fn named_types_are_declared_once_across_roots() {
    let point = Schema::object(
        [
            Field::new("x", Schema::int64()),
            Field::new("y", Schema::int64()),
        ],
        UnknownKeys::Skip,
    )
    .named("Point");
    let points = Schema::slice(point.clone()).named("Points");
    let frame = Schema::object([Field::new("origin", point)], UnknownKeys::Skip).named("Frame");

    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = Session::create(dir.path(), "out", Options::default()).expect("session");
    session.generate(&points, "unmarshal").expect("points");
    session.generate(&frame, "unmarshal").expect("frame");
    let module_dir = session.finish().expect("finish");
    let out = std::fs::read_to_string(module_dir.join("mod.rs")).expect("mod.rs");

    assert_eq!(out.matches("\npub struct Point {").count(), 1);
    assert!(out.contains("\npub type Points = Vec<Point>;"));
    // Point's routine is shared between the two roots.
    assert_eq!(out.matches("\nfn parse_").count(), 3);
}

#[test]
fn alias_roots_get_free_function_entrypoints() {
    let prices = Schema::slice(Schema::float64()).named("Prices");
    let out = generate_to_string(&[(&prices, "unmarshal")], Options::default());
    assert!(out.contains("\npub type Prices = Vec<f64>;"));
    assert!(
        out.contains("\npub fn prices_unmarshal(v: &mut Prices, data: &[u8]) -> Result<(), ParseError>")
    );
}

#[test]
fn map_emission_imports_hashmap() {
    let counts = Schema::map(Schema::string(), Schema::int64()).named("Counts");
    let out = generate_to_string(&[(&counts, "unmarshal")], Options::default());
    assert!(out.contains("\nuse std::collections::HashMap;"));
    assert!(out.contains("\npub type Counts = HashMap<String, i64>;"));
    assert!(out.contains("(*v).insert(key, value);"));
    // Imports are sorted.
    let runtime_use = out.find("use self::runtime::*;").expect("runtime use");
    let hashmap_use = out.find("use std::collections::HashMap;").expect("map use");
    assert!(runtime_use < hashmap_use);
}

#[test]
fn borrowing_roots_carry_a_lifetime() {
    let tick = Schema::object(
        [
            Field::new("sym", Schema::unsafe_string()),
            Field::new("px", Schema::float64()),
        ],
        UnknownKeys::Skip,
    )
    .named("Tick");
    let out = generate_to_string(&[(&tick, "unmarshal")], Options::default());
    assert!(out.contains("\npub struct Tick<'a> {"));
    assert!(out.contains("pub sym: &'a str,"));
    assert!(out.contains("\nimpl<'a> Tick<'a> {"));
    assert!(out.contains("pub fn unmarshal(&mut self, data: &'a [u8]) -> Result<(), ParseError>"));
    assert!(out.contains("fn parse_2<'a>(buf: &'a [u8], pos: &mut usize, v: &mut Tick<'a>)"));
    assert!(out.contains("unsafe { std::str::from_utf8_unchecked(s) }"));
}

#[test]
fn numeric_specializations_emit_helpers() {
    let quote = Schema::object(
        [
            Field::new("v", Schema::quoted_float64()).rename("value"),
            Field::new("s", Schema::float64_with_src()).rename("raw"),
        ],
        UnknownKeys::Skip,
    )
    .named("Quote");
    let out = generate_to_string(&[(&quote, "unmarshal")], Options::default());
    assert_eq!(out.matches("\nfn parse_quoted_f64").count(), 1);
    assert!(out.contains("(*v).src = &buf[start..*pos];"));
    // The captured-source record borrows from the input.
    assert!(out.contains("\npub struct T0<'a> {"));
    assert!(out.contains("pub src: &'a [u8],"));
}

#[test]
fn key_dispatch_strategies() {
    let single = Schema::object(
        [
            Field::new("a", Schema::int64()),
            Field::new("b", Schema::bool()),
        ],
        UnknownKeys::Skip,
    )
    .named("S");
    let multi = Schema::object(
        [
            Field::new("alpha", Schema::int64()),
            Field::new("beta", Schema::bool()),
        ],
        UnknownKeys::Skip,
    )
    .named("M");

    // Auto: single distinct bytes use the byte switch, longer keys the
    // whole-key match.
    let out = generate_to_string(&[(&single, "unmarshal")], Options::default());
    assert!(out.contains("if key.len() == 1 {"));
    assert!(out.contains("match key[0] {"));
    let out = generate_to_string(&[(&multi, "unmarshal")], Options::default());
    assert!(out.contains("match key {"));
    assert!(out.contains("b\"alpha\" =>"));

    // ByString forces the whole-key match even for single-byte keys.
    let by_string = Options {
        key_dispatch: KeyDispatch::ByString,
    };
    let out = generate_to_string(&[(&single, "unmarshal")], by_string);
    assert!(out.contains("match key {"));
    assert!(!out.contains("match key[0] {"));

    // FirstByte confirms the full key after dispatching on its first byte.
    let first_byte = Options {
        key_dispatch: KeyDispatch::FirstByte,
    };
    let out = generate_to_string(&[(&multi, "unmarshal")], first_byte);
    assert!(out.contains("if key.is_empty() {"));
    assert!(out.contains("if key != b\"alpha\" {"));
}

#[test]
fn unknown_key_policies_change_the_miss_arm() {
    let skip = Schema::object([Field::new("x", Schema::int64())], UnknownKeys::Skip).named("A");
    let out = generate_to_string(&[(&skip, "unmarshal")], Options::default());
    assert!(out.contains("skip_value(buf, pos)?;"));
    assert!(!out.contains("unexpected_key"));

    let fail = Schema::object([Field::new("x", Schema::int64())], UnknownKeys::Fail).named("A");
    let out = generate_to_string(&[(&fail, "unmarshal")], Options::default());
    assert!(out.contains("return Err(unexpected_key(buf, *pos, key));"));
}

#[test]
fn emitted_module_snapshot() {
    let out = generate_to_string(&[(&trade(), "unmarshal")], Options::default());
    insta::assert_snapshot!(out, @r##"
    // @generated by parsegen. DO NOT EDIT.
    #![allow(dead_code, unused_mut, unused_assignments, clippy::all)]

    pub mod runtime;

    use self::runtime::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Trade {
        pub a: i64,
        pub b: bool,
    }

    impl Default for Trade {
        fn default() -> Self {
            Self {
                a: 0,
                b: false,
            }
        }
    }

    fn parse_2(buf: &[u8], pos: &mut usize, v: &mut Trade) -> Result<(), ParseError> {
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
                    return Err(ParseError::at(buf, *pos - 1, "expected ','"));
                }
                skip_whitespace(buf, pos);
                c = next_byte(buf, pos)?;
            }
            *pos -= 1;
            let key = take_key_colon(buf, pos)?;
            non_empty = true;
            if key.len() == 1 {
                match key[0] {
                    b'a' => {
                        (*v).a = decode_int64(buf, pos)?;
                        skip_whitespace(buf, pos);
                    }
                    b'b' => {
                        (*v).b = decode_bool(buf, pos)?;
                        skip_whitespace(buf, pos);
                    }
                    _ => {
                        skip_value(buf, pos)?;
                    }
                }
            } else {
                skip_value(buf, pos)?;
            }
        }
        Ok(())
    }

    impl Trade {
        pub fn unmarshal(&mut self, data: &[u8]) -> Result<(), ParseError> {
            (*self).a = 0;
            (*self).b = false;
            let buf = data;
            let mut n = 0usize;
            let pos = &mut n;
            skip_whitespace(buf, pos);
            parse_2(buf, pos, &mut (*self))?;
            Ok(())
        }
    }
    "##);
}
