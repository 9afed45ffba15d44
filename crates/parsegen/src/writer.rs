//! Append-only text emission with indent control, scoped blocks, and a
//! small multi-line template DSL.

const INDENT: &str = "    ";

/// An append-only code buffer with an indent level.
///
/// Lines are written with a leading newline, so buffer content never ends
/// in one; the final artifact adds its own terminator.
#[derive(Debug, Default)]
pub struct Writer {
    out: String,
    indent: usize,
}

impl Writer {
    pub fn new() -> Self {
        Writer::default()
    }

    /// Appends raw text to the current line.
    pub fn raw(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Starts a new line at the current indent and appends `s`. An empty
    /// `s` produces a bare newline with no trailing indent.
    pub fn line(&mut self, s: &str) {
        self.out.push('\n');
        if !s.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str(INDENT);
            }
            self.out.push_str(s);
        }
    }

    /// Blank separator line.
    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Runs `f` one indent level deeper.
    pub fn with_indent(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    /// Opens a braced block on the current line and indents. Paired with
    /// [`Writer::close_brace`]; blocks nest strictly.
    pub fn open_brace(&mut self) {
        self.out.push_str(" {");
        self.indent += 1;
    }

    /// Closes the innermost braced block on its own line.
    pub fn close_brace(&mut self) {
        self.indent -= 1;
        self.line("}");
    }

    /// Emits a multi-line template at the current indent.
    ///
    /// Substitutes every `{key}` from `subs`, strips leading blank lines and
    /// trailing whitespace, removes the common indent, and re-emits each
    /// line with its relative indent (measured in four-space steps) added
    /// to the writer's current level.
    ///
    /// # Panics
    ///
    /// Panics if a template line is not indented in four-space steps
    /// relative to the template's margin — templates are generator
    /// constants, so this is a programmer error.
    pub fn lines(&mut self, template: &str, subs: &[(&str, &str)]) {
        for (levels, text) in render(template, subs) {
            self.emit_rendered(levels, &text);
        }
    }

    /// Like [`Writer::lines`], but the line consisting of `{{}}` yields to
    /// `hole`, which emits at that line's indent.
    pub fn lines_with(
        &mut self,
        template: &str,
        subs: &[(&str, &str)],
        hole: impl FnOnce(&mut Self),
    ) {
        let mut hole = Some(hole);
        for (levels, text) in render(template, subs) {
            if text == "{{}}" {
                let hole = hole.take().expect("template has more than one {{}} hole");
                self.indent += levels;
                hole(self);
                self.indent -= levels;
            } else {
                self.emit_rendered(levels, &text);
            }
        }
    }

    fn emit_rendered(&mut self, levels: usize, text: &str) {
        self.indent += levels;
        self.line(text);
        self.indent -= levels;
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn take(self) -> String {
        self.out
    }
}

/// Renders a template into `(indent level, text)` lines.
fn render(template: &str, subs: &[(&str, &str)]) -> Vec<(usize, String)> {
    let mut text = template.to_owned();
    for (key, value) in subs {
        text = text.replace(&format!("{{{key}}}"), value);
    }
    let text = text.trim_end();
    let mut lines: Vec<(usize, &str)> = text.lines().map(|l| leading_space(l.trim_end())).collect();
    while lines.first().is_some_and(|(_, l)| l.is_empty()) {
        lines.remove(0);
    }
    let margin = lines
        .iter()
        .filter(|(_, l)| !l.is_empty())
        .map(|(n, _)| *n)
        .min()
        .unwrap_or(0);
    lines
        .into_iter()
        .map(|(n, l)| {
            let rel = n.saturating_sub(margin);
            assert!(
                rel.is_multiple_of(4),
                "template line not indented in four-space steps: {l:?}"
            );
            (rel / 4, l.to_owned())
        })
        .collect()
}

/// Counts leading whitespace (tabs count as four) and returns the rest.
fn leading_space(line: &str) -> (usize, &str) {
    let mut n = 0;
    for (i, b) in line.bytes().enumerate() {
        match b {
            b' ' => n += 1,
            b'\t' => n += 4,
            _ => return (n, &line[i..]),
        }
    }
    (n, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_start_with_newline_and_indent() {
        let mut w = Writer::new();
        w.line("fn demo()");
        w.open_brace();
        w.line("body();");
        w.close_brace();
        assert_eq!(w.as_str(), "\nfn demo() {\n    body();\n}");
    }

    #[test]
    fn empty_line_has_no_trailing_indent() {
        let mut w = Writer::new();
        w.with_indent(|w| {
            w.line("a");
            w.line("");
            w.line("b");
        });
        assert_eq!(w.as_str(), "\n    a\n\n    b");
    }

    #[test]
    fn template_strips_margin_and_substitutes() {
        let mut w = Writer::new();
        w.lines(
            "
            let x = {value};
            if x {
                run();
            }
            ",
            &[("value", "42")],
        );
        assert_eq!(w.as_str(), "\nlet x = 42;\nif x {\n    run();\n}");
    }

    #[test]
    fn template_respects_current_indent() {
        let mut w = Writer::new();
        w.with_indent(|w| w.lines("a();", &[]));
        assert_eq!(w.as_str(), "\n    a();");
    }

    #[test]
    fn template_hole_emits_in_place() {
        let mut w = Writer::new();
        w.lines_with(
            "
            loop {
                {{}}
                push();
            }
            ",
            &[],
            |w| {
                w.line("element();");
            },
        );
        assert_eq!(
            w.as_str(),
            "\nloop {\n    element();\n    push();\n}"
        );
    }

    #[test]
    #[should_panic(expected = "four-space steps")]
    fn template_rejects_stray_indent() {
        let mut w = Writer::new();
        w.lines(
            "
            a();
              b();
            ",
            &[],
        );
    }

    #[test]
    fn template_keeps_blank_interior_lines() {
        let mut w = Writer::new();
        w.lines("\n\n    a();\n\n    b();\n\n", &[]);
        assert_eq!(w.as_str(), "\na();\n\nb();");
    }
}
