use {
    crate::{CollisionFlags, ConfigError, ErrorLevel, GetMode, IniConfig, ParseOptions},
    log::{debug, trace},
    regex::RegexBuilder,
    std::path::Path,
};

/// Prefix of the sections of a rules object that define validation rules.
pub const RULE_PREFIX: &str = "rule/";

const EINVAL: i32 = 22;

/// An ordered, cursor-navigable list of validation messages.
#[derive(Debug, Default)]
pub struct ErrObj {
    messages: Vec<String>,
    cursor: usize,
}

impl ErrObj {
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends a message to the end of the list.
    pub fn add_msg<S: Into<String>>(&mut self, message: S) {
        self.messages.push(message.into());
    }

    /// Rewinds the cursor to the first message.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// The message under the cursor.
    pub fn current(&self) -> Option<&str> {
        self.messages.get(self.cursor).map(|m| m.as_str())
    }

    /// Advances the cursor by one message.
    pub fn next(&mut self) {
        if self.cursor < self.messages.len() {
            self.cursor += 1;
        }
    }

    /// `true` once the cursor has moved past the last message.
    pub fn at_end(&self) -> bool {
        self.cursor >= self.messages.len()
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|m| m.as_str())
    }
}

/// A validator: receives the rule section name, the rules object, the
/// configuration under test and a per-rule message accumulator; returns
/// `0` on success or an error code which becomes a synthetic diagnostic.
pub type ValidatorFn = fn(&str, &mut IniConfig, &IniConfig, &mut ErrObj) -> i32;

/// A named caller-supplied validator for the extras table.
#[derive(Clone)]
pub struct Validator {
    pub name: String,
    pub func: ValidatorFn,
}

impl Validator {
    pub fn new<S: Into<String>>(name: S, func: ValidatorFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

/// Loads a rules object from a file. Rules files allow repeated
/// `option` / `section` attributes, so duplicates are parsed permissively.
pub fn rules_from_file<P: AsRef<Path>>(path: P) -> Result<IniConfig, ConfigError> {
    let options = ParseOptions::new()
        .error_level(ErrorLevel::StopOnAny)
        .collision_flags(CollisionFlags::MV1S_ALLOW);
    IniConfig::from_file(path, &options)
}

/// Loads a rules object from a UTF-8 string.
pub fn rules_from_text(text: &str) -> Result<IniConfig, ConfigError> {
    let options = ParseOptions::new()
        .error_level(ErrorLevel::StopOnAny)
        .collision_flags(CollisionFlags::MV1S_ALLOW);
    IniConfig::from_text(text, &options)
}

/// Runs every `rule/*` section of the rules object against the
/// configuration.
///
/// For each rule the named validator is looked up among the built-ins
/// first, then the extras. Its messages are appended to `errobj`
/// prefixed with `[rule-name]: `; a non-zero return code contributes a
/// synthetic diagnostic. A missing validator attribute or an unknown
/// validator name produces a diagnostic and the rule is skipped.
pub fn rules_check(
    rules: &mut IniConfig,
    config: &IniConfig,
    extra_validators: &[Validator],
    errobj: &mut ErrObj,
) -> Result<(), ConfigError> {
    for section in rules.section_list() {
        if !section.starts_with(RULE_PREFIX) {
            continue;
        }

        debug!("checking rule '{}'", section);

        let name = match rules.get_value(Some(&section), "validator", GetMode::FirstValue)? {
            Some(vo) => vo.get_string(),
            None => {
                errobj.add_msg(format!("Rule '{}' has no validator.", section));
                continue;
            }
        };

        let func = match find_validator(&name, extra_validators) {
            Some(func) => func,
            None => {
                errobj.add_msg(format!(
                    "Rule '{}' uses unknown validator '{}'.",
                    section, name
                ));
                continue;
            }
        };

        // Validators get a private accumulator so a misbehaving one
        // cannot corrupt the aggregate list.
        let mut local = ErrObj::new();
        let code = func(&section, rules, config, &mut local);
        if code != 0 {
            errobj.add_msg(format!("Rule '{}' returned error code '{}'", section, code));
        }

        for message in local.iter() {
            errobj.add_msg(format!("[{}]: {}", section, message));
        }
    }

    Ok(())
}

fn find_validator(name: &str, extras: &[Validator]) -> Option<ValidatorFn> {
    match name {
        "ini_dummy_noerror" => return Some(dummy_noerror),
        "ini_dummy_error" => return Some(dummy_error),
        "ini_allowed_options" | "allowed_options" => return Some(allowed_options),
        "ini_allowed_sections" | "allowed_sections" => return Some(allowed_sections),
        _ => {}
    }

    extras
        .iter()
        .filter(|v| !v.name.is_empty())
        .find(|v| v.name == name)
        .map(|v| v.func)
}

/// Built-in no-op validator, useful for wiring tests.
fn dummy_noerror(_rule: &str, _rules: &mut IniConfig, _config: &IniConfig, _errobj: &mut ErrObj) -> i32 {
    0
}

/// Built-in validator that always reports one message.
fn dummy_error(_rule: &str, _rules: &mut IniConfig, _config: &IniConfig, errobj: &mut ErrObj) -> i32 {
    errobj.add_msg("Error");
    0
}

/// `allowed_options`: every attribute of every section matching
/// `section_re` must equal one of the rule's `option` values.
fn allowed_options(rule: &str, rules: &mut IniConfig, config: &IniConfig, errobj: &mut ErrObj) -> i32 {
    let section_re = match rules.get_value(Some(rule), "section_re", GetMode::FirstValue) {
        Ok(Some(vo)) => vo.get_string(),
        _ => {
            errobj.add_msg("Validator misses 'section_re' parameter");
            return EINVAL;
        }
    };

    if section_re.is_empty() {
        errobj.add_msg("Validator misses 'section_re' parameter");
        return EINVAL;
    }

    let regex = match RegexBuilder::new(&section_re).build() {
        Ok(regex) => regex,
        Err(err) => {
            errobj.add_msg(format!(
                "Cannot compile regular expression from option 'section_re'. Error: '{}'",
                err
            ));
            return EINVAL;
        }
    };

    let allowed = collect_values(rules, rule, "option");

    for section in config.section_list() {
        if !regex.is_match(&section) {
            continue;
        }

        let attributes = match config.attribute_list(&section) {
            Ok(attributes) => attributes,
            Err(_) => continue,
        };

        for attribute in attributes {
            if !allowed.iter().any(|option| *option == attribute) {
                errobj.add_msg(format!(
                    "Attribute '{}' is not allowed in section '{}'. Check for typos.",
                    attribute, section
                ));
            }
        }
    }

    0
}

/// `allowed_sections`: every section of the configuration must match one
/// of the rule's `section` names or `section_re` patterns.
fn allowed_sections(rule: &str, rules: &mut IniConfig, config: &IniConfig, errobj: &mut ErrObj) -> i32 {
    let attributes = match rules.attribute_list(rule) {
        Ok(attributes) => attributes,
        Err(_) => return EINVAL,
    };

    let num_names = attributes.iter().filter(|a| *a == "section").count();
    let num_patterns = attributes.iter().filter(|a| *a == "section_re").count();

    if num_names == 0 && num_patterns == 0 {
        errobj.add_msg(
            "No allowed sections specified. \
             Use 'section = default' to allow only default section",
        );
        return 0;
    }

    let case_insensitive = match rules.get_value(Some(rule), "case_insensitive", GetMode::FirstValue)
    {
        Ok(Some(vo)) => {
            let text = vo.get_string();
            text.eq_ignore_ascii_case("yes") || text.eq_ignore_ascii_case("true") || text == "1"
        }
        _ => false,
    };

    let names = collect_values(rules, rule, "section");
    let patterns = collect_values(rules, rule, "section_re");

    let mut regexes = Vec::with_capacity(patterns.len());
    for pattern in &patterns {
        match RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
        {
            Ok(regex) => regexes.push(regex),
            Err(err) => {
                errobj.add_msg(format!(
                    "Validator failed to use regex [{}]:[{}]",
                    pattern, err
                ));
                return EINVAL;
            }
        }
    }

    for section in config.section_list() {
        let by_name = if case_insensitive {
            names.iter().any(|name| name.eq_ignore_ascii_case(&section))
        } else {
            names.iter().any(|name| *name == section)
        };

        let allowed = by_name || regexes.iter().any(|regex| regex.is_match(&section));
        if !allowed {
            trace!("section [{}] rejected by rule '{}'", section, rule);
            errobj.add_msg(format!(
                "Section [{}] is not allowed. Check for typos.",
                section
            ));
        }
    }

    0
}

/// Collects every duplicate of a rule attribute with the resumable cursor.
fn collect_values(rules: &mut IniConfig, rule: &str, name: &str) -> Vec<String> {
    let mut values = Vec::new();
    rules.clean_state();

    while let Ok(Some(vo)) = rules.get_value(Some(rule), name, GetMode::NextValue) {
        values.push(vo.get_string());
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(rules_text: &str, config_text: &str) -> ErrObj {
        let mut rules = rules_from_text(rules_text).unwrap();
        let config = IniConfig::from_text(config_text, &Default::default()).unwrap();
        let mut errobj = ErrObj::new();
        rules_check(&mut rules, &config, &[], &mut errobj).unwrap();
        errobj
    }

    #[test]
    fn missing_validator_attribute() {
        let errobj = check(
            "[rule/generate_error]\nvalid = ini_dummy_error\n",
            "[section]\nkey = value\n",
        );
        assert_eq!(errobj.count(), 1);
        assert_eq!(
            errobj.iter().next().unwrap(),
            "Rule 'rule/generate_error' has no validator."
        );
    }

    #[test]
    fn unknown_validator() {
        let errobj = check(
            "[rule/custom_error]\nvalidator = nonexistent_validator\n",
            "[section]\nkey = value\n",
        );
        assert_eq!(errobj.count(), 1);
        assert_eq!(
            errobj.iter().next().unwrap(),
            "Rule 'rule/custom_error' uses unknown validator 'nonexistent_validator'."
        );
    }

    #[test]
    fn dummy_validators_and_prefixing() {
        let errobj = check(
            "[rule/ok]\nvalidator = ini_dummy_noerror\n\
             [rule/generate_error]\nvalidator = ini_dummy_error\n",
            "[section]\nkey = value\n",
        );
        assert_eq!(errobj.count(), 1);
        assert_eq!(
            errobj.iter().next().unwrap(),
            "[rule/generate_error]: Error"
        );
    }

    #[test]
    fn non_rule_sections_are_ignored() {
        let errobj = check(
            "[settings]\nvalidator = ini_dummy_error\n",
            "[section]\nkey = value\n",
        );
        assert_eq!(errobj.count(), 0);
    }

    #[test]
    fn extras_table() {
        fn custom(_rule: &str, _rules: &mut IniConfig, _config: &IniConfig, errobj: &mut ErrObj) -> i32 {
            errobj.add_msg("custom ran");
            0
        }

        let mut rules = rules_from_text("[rule/custom]\nvalidator = my_custom\n").unwrap();
        let config = IniConfig::from_text("[a]\nk = v\n", &Default::default()).unwrap();
        let mut errobj = ErrObj::new();
        rules_check(
            &mut rules,
            &config,
            &[Validator::new("my_custom", custom)],
            &mut errobj,
        )
        .unwrap();

        assert_eq!(errobj.count(), 1);
        assert_eq!(errobj.iter().next().unwrap(), "[rule/custom]: custom ran");
    }

    #[test]
    fn allowed_options_flags_unknown_attributes() {
        let errobj = check(
            "[rule/options_for_foo]\n\
             validator = ini_allowed_options\n\
             section_re = ^foo$\n\
             option = bar\n\
             option = baz\n",
            "[foo]\nbar = 1\nbaz = 2\nqux = 3\n[other]\nanything = goes\n",
        );
        assert_eq!(errobj.count(), 1);
        assert_eq!(
            errobj.iter().next().unwrap(),
            "[rule/options_for_foo]: Attribute 'qux' is not allowed in section 'foo'. \
             Check for typos."
        );
    }

    #[test]
    fn allowed_options_missing_parameter() {
        let errobj = check(
            "[rule/options_for_foo]\nvalidator = ini_allowed_options\n",
            "[foo]\nbar = 1\n",
        );
        let messages: Vec<&str> = errobj.iter().collect();
        assert!(messages
            .contains(&"Rule 'rule/options_for_foo' returned error code '22'"));
        assert!(messages
            .contains(&"[rule/options_for_foo]: Validator misses 'section_re' parameter"));
    }

    #[test]
    fn allowed_options_bad_regex() {
        let errobj = check(
            "[rule/options_for_foo]\n\
             validator = ini_allowed_options\n\
             section_re = ^foo[$\n\
             option = bar\n",
            "[foo]\nbar = 1\n",
        );
        let messages: Vec<&str> = errobj.iter().collect();
        assert!(messages
            .contains(&"Rule 'rule/options_for_foo' returned error code '22'"));
        assert!(messages.iter().any(|m| m.starts_with(
            "[rule/options_for_foo]: Cannot compile regular expression from option 'section_re'."
        )));
    }

    #[test]
    fn allowed_sections_case_insensitive() {
        // Exactly one diagnostic, about the section matching neither the
        // name nor the pattern.
        let errobj = check(
            "[rule/R]\n\
             validator = allowed_sections\n\
             section = foo\n\
             section_re = ^bar$\n\
             case_insensitive = yes\n",
            "[FOO]\nk = v\n[Baz]\nk = v\n",
        );
        let messages: Vec<&str> = errobj.iter().collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            "[rule/R]: Section [Baz] is not allowed. Check for typos."
        );
    }

    #[test]
    fn allowed_sections_case_sensitive_by_default() {
        let errobj = check(
            "[rule/section_list]\n\
             validator = ini_allowed_sections\n\
             section = foo\n",
            "[foo]\nk = v\n[Foo]\nk = v\n",
        );
        let messages: Vec<&str> = errobj.iter().collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            "[rule/section_list]: Section [Foo] is not allowed. Check for typos."
        );
    }

    #[test]
    fn allowed_sections_empty_rule_gives_guidance() {
        let errobj = check(
            "[rule/section_list]\nvalidator = ini_allowed_sections\n",
            "[foo]\nk = v\n",
        );
        let messages: Vec<&str> = errobj.iter().collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            "[rule/section_list]: No allowed sections specified. \
             Use 'section = default' to allow only default section"
        );
    }

    #[test]
    fn errobj_cursor() {
        let mut errobj = ErrObj::new();
        errobj.add_msg("one");
        errobj.add_msg("two");

        errobj.reset();
        assert_eq!(errobj.current(), Some("one"));
        assert!(!errobj.at_end());
        errobj.next();
        assert_eq!(errobj.current(), Some("two"));
        errobj.next();
        assert!(errobj.at_end());
        assert_eq!(errobj.current(), None);
        errobj.next();
        assert!(errobj.at_end());
        assert_eq!(errobj.count(), 2);
    }
}
