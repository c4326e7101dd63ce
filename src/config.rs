use {
    crate::{
        multimap::OrderedMultiMap, value::MIN_BOUNDARY, Comment, ConfigError, ParseError,
        ValueObj, DEFAULT_BOUNDARY,
    },
    log::trace,
};

/// Name of the implied section receiving key/value pairs that appear
/// before any explicit section header.
pub const DEFAULT_SECTION: &str = "default";

/// Synthetic attribute carrying a section header's own comment and raw
/// name line.
pub(crate) const SECTION_KEY: &str = "INI_SECTION";

/// Synthetic attribute carrying a comment that trailed the last value
/// of a section at end of file.
pub(crate) const SPECIAL_KEY: &str = "INI_SPECIAL_KEY";

/// An ordered multi-map of attribute name to value objects; one section
/// of a configuration.
pub(crate) type Section = OrderedMultiMap<ValueObj>;

/// Which occurrence of a duplicated key a lookup returns.
///
/// `NextValue` continues the previous lookup only when section and name
/// match it; otherwise it behaves as `FirstValue`. This allows fetching
/// every duplicate in a single loop.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GetMode {
    /// Get the first value (default).
    FirstValue,
    /// Get the value after the previously returned one.
    NextValue,
    /// Get the last value.
    LastValue,
}

#[derive(Clone, Debug)]
struct Cursor {
    section: String,
    name: String,
    index: usize,
}

/// An in-memory INI configuration: an ordered multi-map of sections, a
/// trailing comment, the default folding boundary, a resumable lookup
/// cursor and the accumulated parse diagnostics.
///
/// Created empty, populated by [`parse`] or programmatic insertion,
/// optionally merged with other configurations, serialized back to text.
///
/// [`parse`]: #method.parse
#[derive(Debug)]
pub struct IniConfig {
    pub(crate) sections: OrderedMultiMap<Section>,
    pub(crate) boundary: u32,
    pub(crate) last_comment: Option<Comment>,
    pub(crate) errors: Vec<ParseError>,
    cursor: Option<Cursor>,
}

impl Default for IniConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl IniConfig {
    /// Creates an empty configuration with the default folding boundary.
    pub fn new() -> Self {
        Self {
            sections: OrderedMultiMap::new(),
            boundary: DEFAULT_BOUNDARY,
            last_comment: None,
            errors: Vec::new(),
            cursor: None,
        }
    }

    /// Creates a deep copy of the configuration data.
    /// The parse-error list and the lookup cursor are not copied.
    pub fn copy(&self) -> Self {
        Self {
            sections: self.sections.clone(),
            boundary: self.boundary,
            last_comment: self.last_comment.clone(),
            errors: Vec::new(),
            cursor: None,
        }
    }

    /// Drops the cached lookup state, restarting any `NextValue` iteration.
    pub fn clean_state(&mut self) {
        self.cursor = None;
    }

    /// Returns `true` if the configuration holds no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Number of sections, the default section included once present.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Current default folding boundary.
    pub fn boundary(&self) -> u32 {
        self.boundary
    }

    /// Sets the folding boundary for multiline values and realigns every
    /// stored value. Use before serializing if the default of 80 does
    /// not fit.
    pub fn set_wrap(&mut self, boundary: u32) -> Result<(), ConfigError> {
        if boundary < MIN_BOUNDARY {
            return Err(ConfigError::InvalidArgument("folding boundary"));
        }

        trace!("realigning values to boundary {}", boundary);
        self.boundary = boundary;
        for (_, section) in self.sections.iter_mut() {
            for (key, value) in section.iter_mut() {
                if key == SECTION_KEY || key == SPECIAL_KEY {
                    continue;
                }
                value.set_boundary(boundary)?;
            }
        }

        Ok(())
    }

    /// The comment that trailed the last value in the source, if any.
    pub fn trailing_comment(&self) -> Option<&Comment> {
        self.last_comment.as_ref()
    }

    pub fn set_trailing_comment(&mut self, comment: Option<Comment>) {
        self.last_comment = comment;
    }

    /// Number of recorded parse diagnostics.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// The recorded parse diagnostics, in the order they were found.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// The recorded diagnostics rendered as display strings.
    pub fn error_strings(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// Names of all sections, in insertion order.
    pub fn section_list(&self) -> Vec<String> {
        self.sections.keys().map(|k| k.to_owned()).collect()
    }

    /// Names of the attributes of a section, duplicates included, in
    /// insertion order. Synthetic bookkeeping attributes are skipped.
    pub fn attribute_list(&self, section: &str) -> Result<Vec<String>, ConfigError> {
        let sec = self.sections.get(section).ok_or(ConfigError::NotFound)?;

        Ok(sec
            .keys()
            .filter(|k| *k != SECTION_KEY && *k != SPECIAL_KEY)
            .map(|k| k.to_owned())
            .collect())
    }

    /// Looks up a value object. `section` of `None` means the default
    /// section. Returns `Ok(None)` when the section or the requested
    /// occurrence does not exist.
    pub fn get_value(
        &mut self,
        section: Option<&str>,
        name: &str,
        mode: GetMode,
    ) -> Result<Option<&ValueObj>, ConfigError> {
        let section = section.unwrap_or(DEFAULT_SECTION);

        let count = match self.sections.get(section) {
            Some(sec) => sec.count(name),
            None => 0,
        };

        let index = match mode {
            GetMode::FirstValue => 0,
            GetMode::LastValue => count.saturating_sub(1),
            GetMode::NextValue => match &self.cursor {
                Some(cursor) if cursor.section == section && cursor.name == name => cursor.index,
                _ => 0,
            },
        };

        if count == 0 || index >= count {
            // Ran off the end; restart on the next call.
            self.cursor = None;
            return Ok(None);
        }

        self.cursor = Some(Cursor {
            section: section.to_owned(),
            name: name.to_owned(),
            index: index + 1,
        });

        Ok(self
            .sections
            .get(section)
            .and_then(|sec| sec.get_nth(name, index)))
    }

    /// Walks the configuration and produces its text: for each section the
    /// header comment, the `[name]` line and the attributes with their
    /// comments and (re)wrapped lines, then the trailing comment.
    /// The output is always UTF-8 without a BOM.
    pub fn serialize(&self) -> String {
        let mut out = String::new();

        for (name, section) in self.sections.iter() {
            if let Some(header) = section.get(SECTION_KEY) {
                if let Some(comment) = header.comment() {
                    for line in comment.lines() {
                        out.push_str(line);
                        out.push('\n');
                    }
                }
                out.push('[');
                out.push_str(name);
                out.push_str("]\n");
            }

            for (key, value) in section.iter() {
                if key == SECTION_KEY {
                    continue;
                }

                if let Some(comment) = value.comment() {
                    for line in comment.lines() {
                        out.push_str(line);
                        out.push('\n');
                    }
                }

                if key == SPECIAL_KEY {
                    continue;
                }

                for line in value.render_lines(key) {
                    out.push_str(&line);
                    out.push('\n');
                }
            }
        }

        if let Some(comment) = &self.last_comment {
            for line in comment.lines() {
                out.push_str(line);
                out.push('\n');
            }
        }

        out
    }

    pub(crate) fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub(crate) fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.get_mut(name)
    }

    pub(crate) fn record(&mut self, error: ParseError) {
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_BOUNDARY;

    fn sample() -> IniConfig {
        let mut cfg = IniConfig::new();
        let mut sec = Section::new();
        sec.push("key", ValueObj::new("first", 3, DEFAULT_BOUNDARY));
        sec.push("other", ValueObj::new("mid", 5, DEFAULT_BOUNDARY));
        sec.push("key", ValueObj::new("second", 3, DEFAULT_BOUNDARY));
        sec.push("key", ValueObj::new("third", 3, DEFAULT_BOUNDARY));
        cfg.sections.push("one", sec);
        cfg
    }

    #[test]
    fn cursor_walks_duplicates() {
        let mut cfg = sample();

        let first = cfg
            .get_value(Some("one"), "key", GetMode::FirstValue)
            .unwrap()
            .unwrap();
        assert_eq!(first.string(), "first");

        let second = cfg
            .get_value(Some("one"), "key", GetMode::NextValue)
            .unwrap()
            .unwrap();
        assert_eq!(second.string(), "second");

        let third = cfg
            .get_value(Some("one"), "key", GetMode::NextValue)
            .unwrap()
            .unwrap();
        assert_eq!(third.string(), "third");

        assert!(cfg
            .get_value(Some("one"), "key", GetMode::NextValue)
            .unwrap()
            .is_none());

        // After running off the end the iteration restarts.
        let restart = cfg
            .get_value(Some("one"), "key", GetMode::NextValue)
            .unwrap()
            .unwrap();
        assert_eq!(restart.string(), "first");
    }

    #[test]
    fn next_with_different_key_restarts() {
        let mut cfg = sample();

        cfg.get_value(Some("one"), "key", GetMode::FirstValue)
            .unwrap();
        let other = cfg
            .get_value(Some("one"), "other", GetMode::NextValue)
            .unwrap()
            .unwrap();
        assert_eq!(other.string(), "mid");
    }

    #[test]
    fn last_value() {
        let mut cfg = sample();
        let last = cfg
            .get_value(Some("one"), "key", GetMode::LastValue)
            .unwrap()
            .unwrap();
        assert_eq!(last.string(), "third");
    }

    #[test]
    fn missing_section_and_key_yield_none() {
        let mut cfg = sample();
        assert!(cfg
            .get_value(Some("nope"), "key", GetMode::FirstValue)
            .unwrap()
            .is_none());
        assert!(cfg
            .get_value(Some("one"), "nope", GetMode::FirstValue)
            .unwrap()
            .is_none());
        assert!(cfg
            .get_value(None, "key", GetMode::FirstValue)
            .unwrap()
            .is_none());
    }

    #[test]
    fn copy_is_disjoint() {
        let cfg = sample();
        let copy = cfg.copy();
        assert_eq!(cfg.serialize(), copy.serialize());

        drop(cfg);
        // The copy must survive its source.
        assert!(copy.serialize().contains("key = first"));
    }

    #[test]
    fn attribute_list_includes_duplicates() {
        let cfg = sample();
        assert_eq!(
            cfg.attribute_list("one").unwrap(),
            vec!["key", "other", "key", "key"]
        );
        assert!(matches!(
            cfg.attribute_list("missing"),
            Err(ConfigError::NotFound)
        ));
    }
}
