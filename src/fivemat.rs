//! Indent-aware emission buffer.

use std::fmt;

/// Indentation unit used in all emitted Go source.
pub const INDENT: &str = "  ";

/// A String-backed `fmt::Write` impl that prefixes every non-empty line
/// with the current indentation. Emitters push and pop indentation around
/// the bodies of the functions they generate instead of hand-padding each
/// `write!`.
pub struct Fivemat {
    buf: String,
    indent_text: &'static str,
    depth: usize,
    line_start: bool,
}

impl Fivemat {
    pub fn new(indent_text: &'static str) -> Self {
        Fivemat {
            buf: String::new(),
            indent_text,
            depth: 0,
            line_start: true,
        }
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        assert!(self.depth > 0, "internal error: unbalanced dedent");
        self.depth -= 1;
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

impl fmt::Write for Fivemat {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if ch == '\n' {
                self.buf.push('\n');
                self.line_start = true;
                continue;
            }
            if self.line_start {
                for _ in 0..self.depth {
                    self.buf.push_str(self.indent_text);
                }
                self.line_start = false;
            }
            self.buf.push(ch);
        }
        Ok(())
    }
}
