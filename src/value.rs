use {
    crate::{Comment, ConfigError},
    log::trace,
};

/// How a value came to be: parsed from a file (raw lines are emitted
/// verbatim on save) or created / modified programmatically (lines are
/// recomputed from the folding boundary on save).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ValueOrigin {
    Read,
    Created,
}

/// A single (key, occurrence) value node.
///
/// Holds the raw source lines that produced the value, the length of the
/// key that introduced it, the 1-based source line of its first raw line,
/// the folding boundary, and the comment lines that preceded it.
///
/// The first raw line stores the right-hand side of the `key = value`
/// line; continuation lines are stored verbatim, including their leading
/// whitespace, so that an unmodified value round-trips byte for byte.
#[derive(Clone, Debug)]
pub struct ValueObj {
    raw_lines: Vec<String>,
    key_len: usize,
    line: u32,
    boundary: u32,
    origin: ValueOrigin,
    comment: Option<Comment>,
}

/// Default folding boundary for multiline values.
pub const DEFAULT_BOUNDARY: u32 = 80;

/// Smallest accepted folding boundary.
pub(crate) const MIN_BOUNDARY: u32 = 2;

impl ValueObj {
    /// Creates a value from parsed raw lines.
    pub(crate) fn from_raw_lines(
        raw_lines: Vec<String>,
        line: u32,
        key_len: usize,
        boundary: u32,
        comment: Option<Comment>,
    ) -> Self {
        Self {
            raw_lines,
            key_len,
            line,
            boundary,
            origin: ValueOrigin::Read,
            comment,
        }
    }

    /// Creates a value programmatically. The logical string is folded
    /// at the given boundary when the value is rendered.
    pub fn new(value: &str, key_len: usize, boundary: u32) -> Self {
        Self {
            raw_lines: fold(value, key_len, boundary),
            key_len,
            line: 0,
            boundary,
            origin: ValueOrigin::Created,
            comment: None,
        }
    }

    /// The canonical logical string: trimmed raw lines joined by single spaces.
    pub fn string(&self) -> String {
        let mut out = String::new();
        for raw in &self.raw_lines {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(trimmed);
        }
        out
    }

    /// 1-based line of the first raw line in the source, `0` for created values.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Current folding boundary.
    pub fn boundary(&self) -> u32 {
        self.boundary
    }

    /// Changes the folding boundary, re-folding the value if it differs.
    pub fn set_boundary(&mut self, boundary: u32) -> Result<(), ConfigError> {
        if boundary < MIN_BOUNDARY {
            return Err(ConfigError::InvalidArgument("folding boundary"));
        }

        if boundary != self.boundary {
            trace!(
                "refolding value at line {} from boundary {} to {}",
                self.line,
                self.boundary,
                boundary
            );
            let value = self.string();
            self.boundary = boundary;
            self.raw_lines = fold(&value, self.key_len, boundary);
            self.origin = ValueOrigin::Created;
        }

        Ok(())
    }

    /// Replaces the logical string, discarding the original raw lines.
    pub fn update(&mut self, value: &str) {
        self.raw_lines = fold(value, self.key_len, self.boundary);
        self.origin = ValueOrigin::Created;
    }

    /// The comment attached in front of this value, if any.
    pub fn comment(&self) -> Option<&Comment> {
        self.comment.as_ref()
    }

    pub fn comment_mut(&mut self) -> Option<&mut Comment> {
        self.comment.as_mut()
    }

    /// Attaches or removes the preceding comment.
    pub fn set_comment(&mut self, comment: Option<Comment>) {
        self.comment = comment;
    }

    pub(crate) fn raw_lines(&self) -> &[String] {
        &self.raw_lines
    }

    /// Replaces the raw contents in place. Used when a synthetic value
    /// (e.g. a section header) is renamed.
    pub(crate) fn set_raw_line(&mut self, line: &str) {
        self.raw_lines = vec![line.to_owned()];
    }

    /// Renders the physical lines for this value, `key = first` followed
    /// by space-prefixed continuations. An unmodified parsed value is
    /// reproduced verbatim.
    pub(crate) fn render_lines(&self, key: &str) -> Vec<String> {
        if self.raw_lines.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(self.raw_lines.len());
        out.push(format!("{} = {}", key, self.raw_lines[0]));

        for cont in &self.raw_lines[1..] {
            match self.origin {
                ValueOrigin::Read => out.push(cont.clone()),
                ValueOrigin::Created => out.push(format!(" {}", cont)),
            }
        }

        out
    }
}

/// Splits `value` into wrapped chunks: the first chunk fits after
/// `key = `, the rest fit after a single continuation space. Splits
/// happen at spaces at or before the boundary; a token with no split
/// point within the boundary is emitted whole.
fn fold(value: &str, key_len: usize, boundary: u32) -> Vec<String> {
    let boundary = boundary.max(MIN_BOUNDARY) as usize;
    let first_budget = boundary.saturating_sub(key_len + 3).max(1);
    let cont_budget = (boundary - 1).max(1);

    let mut out = Vec::new();
    let mut rest = value.trim();
    let mut budget = first_budget;

    loop {
        if rest.len() <= budget {
            out.push(rest.to_owned());
            break;
        }

        let limit = budget.min(rest.len() - 1);
        match rest.as_bytes()[..=limit].iter().rposition(|&b| b == b' ') {
            Some(at) if at > 0 => {
                out.push(rest[..at].to_owned());
                rest = rest[at + 1..].trim_start();
            }
            _ => {
                // No split point within the boundary; take the whole token.
                match rest.as_bytes().iter().position(|&b| b == b' ') {
                    Some(at) => {
                        out.push(rest[..at].to_owned());
                        rest = rest[at + 1..].trim_start();
                    }
                    None => {
                        out.push(rest.to_owned());
                        break;
                    }
                }
            }
        }

        if rest.is_empty() {
            break;
        }
        budget = cont_budget;
    }

    out
}
