use {
    crate::{
        config::{Section, SECTION_KEY},
        multimap::Position,
        parse::MAX_KEY,
        Comment, ConfigError, IniConfig, ValueObj,
    },
    log::trace,
};

/// Duplicate handling for programmatic value insertion.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueAddMode {
    /// Insert at the requested position without looking for duplicates.
    NoCheck,
    /// Fail with *duplicate key* when the key already exists.
    DupError,
    /// Replace the n-th (0-based) duplicate in place,
    /// leaving all others untouched. The position argument is ignored.
    Mod(usize),
}

/// Programmatic construction and modification of a configuration.
impl IniConfig {
    /// Adds a new section at the given position.
    pub fn add_section(
        &mut self,
        name: &str,
        comment: Option<Comment>,
        position: &Position,
    ) -> Result<(), ConfigError> {
        validate_section_name(name)?;

        if self.sections.contains_key(name) {
            return Err(ConfigError::DuplicateSection);
        }

        trace!("adding section [{}]", name);

        let mut section = Section::new();
        let mut header = ValueObj::new(name, SECTION_KEY.len(), self.boundary);
        header.set_comment(comment);
        section.push(SECTION_KEY, header);

        self.sections.insert_at(position, name, section)
    }

    /// Adds a string value to a section.
    pub fn add_str_value(
        &mut self,
        section: &str,
        key: &str,
        value: &str,
        comment: Option<Comment>,
        position: &Position,
        mode: ValueAddMode,
    ) -> Result<(), ConfigError> {
        validate_key(key)?;

        let mut vo = ValueObj::new(value, key.len(), self.boundary);
        vo.set_comment(comment);
        self.add_value_obj(section, key, vo, position, mode)
    }

    /// Adds a signed integer value to a section.
    pub fn add_i64_value(
        &mut self,
        section: &str,
        key: &str,
        value: i64,
        comment: Option<Comment>,
        position: &Position,
        mode: ValueAddMode,
    ) -> Result<(), ConfigError> {
        self.add_str_value(section, key, &value.to_string(), comment, position, mode)
    }

    /// Adds an unsigned integer value to a section.
    pub fn add_u64_value(
        &mut self,
        section: &str,
        key: &str,
        value: u64,
        comment: Option<Comment>,
        position: &Position,
        mode: ValueAddMode,
    ) -> Result<(), ConfigError> {
        self.add_str_value(section, key, &value.to_string(), comment, position, mode)
    }

    /// Adds a floating-point value to a section.
    pub fn add_f64_value(
        &mut self,
        section: &str,
        key: &str,
        value: f64,
        comment: Option<Comment>,
        position: &Position,
        mode: ValueAddMode,
    ) -> Result<(), ConfigError> {
        self.add_str_value(section, key, &value.to_string(), comment, position, mode)
    }

    /// Adds a boolean value to a section, rendered as `true` / `false`.
    pub fn add_bool_value(
        &mut self,
        section: &str,
        key: &str,
        value: bool,
        comment: Option<Comment>,
        position: &Position,
        mode: ValueAddMode,
    ) -> Result<(), ConfigError> {
        let rendered = if value { "true" } else { "false" };
        self.add_str_value(section, key, rendered, comment, position, mode)
    }

    /// Adds a string-array value, tokens joined by `separator`.
    pub fn add_str_arr_value(
        &mut self,
        section: &str,
        key: &str,
        values: &[&str],
        separator: char,
        comment: Option<Comment>,
        position: &Position,
        mode: ValueAddMode,
    ) -> Result<(), ConfigError> {
        let rendered = values.join(&separator.to_string());
        self.add_str_value(section, key, &rendered, comment, position, mode)
    }

    /// Adds a binary value, rendered as a single-quoted hex string.
    pub fn add_bin_value(
        &mut self,
        section: &str,
        key: &str,
        value: &[u8],
        comment: Option<Comment>,
        position: &Position,
        mode: ValueAddMode,
    ) -> Result<(), ConfigError> {
        let mut rendered = String::with_capacity(value.len() * 2 + 2);
        rendered.push('\'');
        for byte in value {
            rendered.push_str(&format!("{:02x}", byte));
        }
        rendered.push('\'');

        self.add_str_value(section, key, &rendered, comment, position, mode)
    }

    /// Deletes the n-th (0-based) duplicate of a key.
    pub fn delete_value(&mut self, section: &str, key: &str, nth: usize) -> Result<(), ConfigError> {
        let sec = self.section_mut(section).ok_or(ConfigError::NotFound)?;
        sec.remove_nth(key, nth)?;
        Ok(())
    }

    /// Replaces the comment attached to the n-th duplicate of a key.
    pub fn update_comment(
        &mut self,
        section: &str,
        key: &str,
        nth: usize,
        comment: Option<Comment>,
    ) -> Result<(), ConfigError> {
        let sec = self.section_mut(section).ok_or(ConfigError::NotFound)?;
        let vo = sec.get_nth_mut(key, nth).ok_or(ConfigError::NotFound)?;
        vo.set_comment(comment);
        Ok(())
    }

    /// Renames a section, keeping its position and contents.
    pub fn rename_section(&mut self, old: &str, new: &str) -> Result<(), ConfigError> {
        validate_section_name(new)?;

        if self.sections.contains_key(new) {
            return Err(ConfigError::DuplicateSection);
        }

        self.sections.rename(old, new)?;

        // The header value carries the raw name line; keep it in step.
        if let Some(header) = self.section_mut(new).and_then(|sec| sec.get_mut(SECTION_KEY)) {
            header.set_raw_line(new);
        }

        Ok(())
    }

    /// Deletes a section by name.
    pub fn delete_section(&mut self, name: &str) -> Result<(), ConfigError> {
        self.sections.remove_nth(name, 0)?;
        Ok(())
    }

    /// Deletes the section at the given position in section order.
    pub fn delete_section_by_position(&mut self, position: usize) -> Result<(), ConfigError> {
        self.sections.remove_at(position)?;
        Ok(())
    }

    fn add_value_obj(
        &mut self,
        section: &str,
        key: &str,
        vo: ValueObj,
        position: &Position,
        mode: ValueAddMode,
    ) -> Result<(), ConfigError> {
        let sec = self.section_mut(section).ok_or(ConfigError::NotFound)?;

        match mode {
            ValueAddMode::NoCheck => sec.insert_at(position, key, vo),
            ValueAddMode::DupError => {
                if sec.contains_key(key) {
                    return Err(ConfigError::DuplicateKey);
                }
                sec.insert_at(position, key, vo)
            }
            ValueAddMode::Mod(nth) => {
                sec.replace_nth(key, nth, vo)?;
                Ok(())
            }
        }
    }
}

fn validate_section_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.len() > MAX_KEY || name.contains(']') {
        return Err(ConfigError::InvalidArgument("section name"));
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<(), ConfigError> {
    if key.is_empty() || key.len() >= MAX_KEY || key.contains('=') {
        return Err(ConfigError::InvalidArgument("key"));
    }
    Ok(())
}
