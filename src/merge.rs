use {
    crate::{
        config::{Section, SECTION_KEY},
        flags::{SectionMergeBase, ValueMergeMode},
        AccessCheck, CollisionFlags, ConfigError, ErrorLevel, IniConfig, IniFile, ParseError,
        ParseErrorKind, ParseFlags, ParseOptions, Severity, ValueObj,
    },
    log::{debug, trace, warn},
    regex::Regex,
    std::{fs, path::Path},
};

/// Outcome of inserting a value under a duplicate-key policy.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum InsertOutcome {
    /// The value was appended.
    Inserted,
    /// The value replaced an existing duplicate in place.
    Replaced,
    /// The existing value was kept and the new one dropped.
    Preserved,
    /// The insertion was rejected; the caller records a diagnostic.
    Duplicate,
    /// The value was appended next to an existing duplicate;
    /// the caller records a diagnostic.
    DetectedDuplicate,
}

/// Inserts `value` under `key` applying the duplicate policy.
/// Non-colliding inserts always append, preserving donor order.
pub(crate) fn insert_value(
    section: &mut Section,
    key: &str,
    value: ValueObj,
    mode: ValueMergeMode,
) -> InsertOutcome {
    let exists = section.contains_key(key);

    match mode {
        ValueMergeMode::Allow => {
            section.push(key, value);
            InsertOutcome::Inserted
        }
        ValueMergeMode::Overwrite => {
            if exists {
                // Replace in place so the attribute keeps its position.
                section.replace_nth(key, 0, value).unwrap();
                InsertOutcome::Replaced
            } else {
                section.push(key, value);
                InsertOutcome::Inserted
            }
        }
        ValueMergeMode::Error => {
            if exists {
                InsertOutcome::Duplicate
            } else {
                section.push(key, value);
                InsertOutcome::Inserted
            }
        }
        ValueMergeMode::Preserve => {
            if exists {
                InsertOutcome::Preserved
            } else {
                section.push(key, value);
                InsertOutcome::Inserted
            }
        }
        ValueMergeMode::Detect => {
            let outcome = if exists {
                InsertOutcome::DetectedDuplicate
            } else {
                InsertOutcome::Inserted
            };
            section.push(key, value);
            outcome
        }
    }
}

impl IniConfig {
    /// Merges `other` into a copy of `self` under the collision flags,
    /// producing a new configuration. Neither input is mutated.
    ///
    /// Donor sections with no counterpart are appended in donor order;
    /// colliding sections are resolved by the MS policy, colliding values
    /// within them by the MV2S policy. Detect-mode collisions are recorded
    /// as warnings in the result's error list; Error-mode collisions fail
    /// the merge.
    pub fn merge(
        &self,
        other: &IniConfig,
        collision_flags: CollisionFlags,
    ) -> Result<IniConfig, ConfigError> {
        collision_flags.validate()?;

        let mut result = self.copy();
        merge_into(&mut result, other, collision_flags)?;

        // Wrap boundaries of the two inputs may disagree; realign the
        // result to its own.
        if result.boundary != other.boundary {
            let boundary = result.boundary;
            result.set_wrap(boundary)?;
        }

        Ok(result)
    }
}

fn merge_into(
    acceptor: &mut IniConfig,
    donor: &IniConfig,
    flags: CollisionFlags,
) -> Result<(), ConfigError> {
    let ms = flags.ms();

    for (name, donor_sec) in donor.sections.iter() {
        if acceptor.section(name).is_none() {
            trace!("merge: appending section [{}]", name);
            acceptor.sections.push(name, donor_sec.clone());
            continue;
        }

        debug!("merge: section [{}] collides", name);

        if ms.detect {
            acceptor.record(ParseError {
                line: 0,
                kind: ParseErrorKind::DuplicateSection,
                severity: Severity::Warning,
            });
        }

        match ms.base {
            SectionMergeBase::Error => return Err(ConfigError::DuplicateSection),
            SectionMergeBase::Preserve => continue,
            SectionMergeBase::Overwrite => {
                let section = acceptor.section_mut(name).unwrap();
                section.retain(|key, _| key == SECTION_KEY);
                merge_section_values(acceptor, name, donor_sec, flags)?;
            }
            SectionMergeBase::Merge => {
                merge_section_values(acceptor, name, donor_sec, flags)?;
            }
        }
    }

    // The donor's trailing comment follows the acceptor's.
    if let Some(donor_comment) = &donor.last_comment {
        match &mut acceptor.last_comment {
            Some(acceptor_comment) => acceptor_comment.extend(donor_comment),
            None => acceptor.last_comment = Some(donor_comment.clone()),
        }
    }

    Ok(())
}

fn merge_section_values(
    acceptor: &mut IniConfig,
    name: &str,
    donor_sec: &Section,
    flags: CollisionFlags,
) -> Result<(), ConfigError> {
    let mv2s = flags.mv2s();
    let mut detected = 0u32;

    {
        let section = acceptor.section_mut(name).unwrap();
        for (key, value) in donor_sec.iter() {
            if key == SECTION_KEY {
                continue;
            }

            match insert_value(section, key, value.clone(), mv2s) {
                InsertOutcome::Inserted | InsertOutcome::Replaced | InsertOutcome::Preserved => {}
                InsertOutcome::Duplicate => return Err(ConfigError::DuplicateKey),
                InsertOutcome::DetectedDuplicate => detected += 1,
            }
        }
    }

    for _ in 0..detected {
        acceptor.record(ParseError {
            line: 0,
            kind: ParseErrorKind::DuplicateKeyMerge,
            severity: Severity::Warning,
        });
    }

    Ok(())
}

/// Options of a directory augmentation run.
#[derive(Clone, Debug, Default)]
pub struct AugmentOptions {
    /// File-name inclusion patterns; an empty list admits every file.
    pub include: Vec<String>,
    /// File-name exclusion patterns, applied after inclusion.
    pub exclude: Vec<String>,
    /// Allowed section-name patterns; sections matching none are dropped
    /// from a snippet before it is merged. An empty list admits all.
    pub sections: Vec<String>,
    /// Ownership / permission expectations checked on every file.
    pub access_check: Option<AccessCheck>,
    /// Error tolerance used when parsing each snippet.
    pub error_level: ErrorLevel,
    /// Collision flags used when parsing each snippet.
    pub collision_flags: CollisionFlags,
    /// Line-classification tweaks used when parsing each snippet.
    pub parse_flags: ParseFlags,
    /// Collision flags used when merging each snippet into the base.
    pub merge_flags: CollisionFlags,
}

/// The outcome of an augmentation: the merged configuration plus the
/// per-file error messages and the names of the files that contributed.
#[derive(Debug)]
pub struct AugmentResult {
    pub config: IniConfig,
    pub errors: Vec<String>,
    pub processed: Vec<String>,
}

impl IniConfig {
    /// Augments a copy of this configuration with snippets read from a
    /// directory.
    ///
    /// Every regular file whose name passes the inclusion and exclusion
    /// patterns is access-checked, parsed, filtered down to the allowed
    /// sections and merged into the running result. Failures of
    /// individual files are recorded in the error list and do not stop
    /// the run; a result is always produced, even for an empty directory.
    pub fn augment(&self, dir: &Path, options: &AugmentOptions) -> Result<AugmentResult, ConfigError> {
        options.collision_flags.validate()?;
        options.merge_flags.validate()?;

        let mut errors = Vec::new();
        let mut processed = Vec::new();
        let mut result = self.copy();

        let include = compile_patterns(&options.include, &mut errors);
        let exclude = compile_patterns(&options.exclude, &mut errors);
        let sections = compile_patterns(&options.sections, &mut errors);

        let mut entries = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .collect::<Vec<_>>(),
            Err(err) => {
                warn!("augment: cannot read {}: {}", dir.display(), err);
                errors.push(format!("Failed to read directory {}.", dir.display()));
                return Ok(AugmentResult {
                    config: result,
                    errors,
                    processed,
                });
            }
        };

        // Directory order is unspecified; scan by name so results are
        // reproducible.
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            let path = entry.path();

            if !options.include.is_empty() && !include.iter().any(|re| re.is_match(&name)) {
                continue;
            }
            if exclude.iter().any(|re| re.is_match(&name)) {
                trace!("augment: {} excluded", name);
                continue;
            }

            debug!("augment: processing {}", path.display());

            let file = match IniFile::open(&path) {
                Ok(file) => file,
                Err(err) => {
                    errors.push(format!("Failed to open file {}: {}.", path.display(), err));
                    continue;
                }
            };

            if let Some(check) = &options.access_check {
                if file.access_check(check).is_err() {
                    errors.push(format!(
                        "File {} did not pass access check.",
                        path.display()
                    ));
                    continue;
                }
            }

            let parse_options = ParseOptions::new()
                .error_level(options.error_level)
                .collision_flags(options.collision_flags)
                .parse_flags(options.parse_flags);

            let mut snippet = IniConfig::new();
            let parse_result = snippet.parse(&file, &parse_options);
            errors.extend(snippet.error_strings());
            if parse_result.is_err() {
                errors.push(format!("Failed to parse file {}.", path.display()));
                continue;
            }

            if !options.sections.is_empty() {
                let disallowed: Vec<String> = snippet
                    .section_list()
                    .into_iter()
                    .filter(|sec| !sections.iter().any(|re| re.is_match(sec)))
                    .collect();

                for sec in disallowed {
                    errors.push(format!(
                        "Section [{}] found in file [{}] is not allowed.",
                        sec,
                        path.display()
                    ));
                    snippet.sections.retain(|name, _| name != sec);
                }
            }

            match result.merge(&snippet, options.merge_flags) {
                Ok(mut merged) => {
                    errors.extend(merged.error_strings());
                    merged.errors.clear();
                    result = merged;
                    processed.push(path.display().to_string());
                }
                Err(err) => {
                    errors.push(format!(
                        "Failed to merge file {}: {}.",
                        path.display(),
                        err
                    ));
                }
            }
        }

        Ok(AugmentResult {
            config: result,
            errors,
            processed,
        })
    }
}

fn compile_patterns(patterns: &[String], errors: &mut Vec<String>) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(err) => {
                errors.push(format!(
                    "Failed to compile pattern '{}'. Error: '{}'",
                    pattern, err
                ));
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GetMode, ParseErrorKind, Severity};
    use std::io::Write;

    const BASE: &str = "[section]\nkey1 = first\nkey2 = exists\n";
    const AUGMENT: &str = "[section]\nkey1 = augment\nkey3 = exists\n";

    fn cfg(text: &str) -> IniConfig {
        IniConfig::from_text(text, &Default::default()).unwrap()
    }

    fn attributes(config: &IniConfig, section: &str) -> Vec<(String, String)> {
        let sec = config.section(section).unwrap();
        sec.iter()
            .filter(|(k, _)| *k != SECTION_KEY)
            .map(|(k, v)| (k.to_owned(), v.string()))
            .collect()
    }

    #[test]
    fn disjoint_sections_are_appended_in_donor_order() {
        let first = cfg("[a]\nk = 1\n");
        let second = cfg("[b]\nk = 2\n[c]\nk = 3\n");

        let result = first.merge(&second, CollisionFlags::default()).unwrap();
        assert_eq!(result.section_list(), vec!["a", "b", "c"]);
        // Neither input is mutated.
        assert_eq!(first.section_list(), vec!["a"]);
        assert_eq!(second.section_list(), vec!["b", "c"]);
    }

    #[test]
    fn ms_detect_preserve_keeps_the_base() {
        let base = cfg(BASE);
        let donor = cfg(AUGMENT);

        let result = base
            .merge(
                &donor,
                CollisionFlags::MS_DETECT | CollisionFlags::MS_PRESERVE,
            )
            .unwrap();

        assert_eq!(
            attributes(&result, "section"),
            vec![
                ("key1".to_owned(), "first".to_owned()),
                ("key2".to_owned(), "exists".to_owned()),
            ]
        );
        assert!(result
            .errors()
            .iter()
            .any(|e| e.kind == ParseErrorKind::DuplicateSection));
    }

    #[test]
    fn ms_detect_overwrite_replaces_the_base() {
        let base = cfg(BASE);
        let donor = cfg(AUGMENT);

        let result = base
            .merge(
                &donor,
                CollisionFlags::MS_DETECT | CollisionFlags::MS_OVERWRITE,
            )
            .unwrap();

        assert_eq!(
            attributes(&result, "section"),
            vec![
                ("key1".to_owned(), "augment".to_owned()),
                ("key3".to_owned(), "exists".to_owned()),
            ]
        );
    }

    #[test]
    fn default_merge_with_mv2s_detect_keeps_both() {
        let base = cfg(BASE);
        let donor = cfg(AUGMENT);

        let result = base
            .merge(&donor, CollisionFlags::MV2S_DETECT)
            .unwrap();

        assert_eq!(
            attributes(&result, "section"),
            vec![
                ("key1".to_owned(), "first".to_owned()),
                ("key2".to_owned(), "exists".to_owned()),
                ("key1".to_owned(), "augment".to_owned()),
                ("key3".to_owned(), "exists".to_owned()),
            ]
        );
        let dup_keys: Vec<_> = result
            .errors()
            .iter()
            .filter(|e| e.kind == ParseErrorKind::DuplicateKeyMerge)
            .collect();
        assert_eq!(dup_keys.len(), 1);
        assert_eq!(dup_keys[0].severity, Severity::Warning);
    }

    #[test]
    fn ms_error_fails_the_merge() {
        let base = cfg(BASE);
        let donor = cfg(AUGMENT);
        assert!(matches!(
            base.merge(&donor, CollisionFlags::MS_ERROR),
            Err(ConfigError::DuplicateSection)
        ));
        assert!(matches!(
            base.merge(&donor, CollisionFlags::MV2S_ERROR),
            Err(ConfigError::DuplicateKey)
        ));
    }

    #[test]
    fn mv2s_overwrite_updates_in_place() {
        let base = cfg(BASE);
        let donor = cfg(AUGMENT);

        let result = base
            .merge(&donor, CollisionFlags::MV2S_OVERWRITE)
            .unwrap();
        assert_eq!(
            attributes(&result, "section"),
            vec![
                ("key1".to_owned(), "augment".to_owned()),
                ("key2".to_owned(), "exists".to_owned()),
                ("key3".to_owned(), "exists".to_owned()),
            ]
        );
    }

    #[test]
    fn weak_associativity_of_allow_merge() {
        let flags =
            CollisionFlags::MS_MERGE | CollisionFlags::MV2S_ALLOW | CollisionFlags::MV1S_ALLOW;

        let a = cfg("[x]\nk = a\n[only_a]\nv = 1\n");
        let b = cfg("[x]\nk = b\n[only_b]\nv = 2\n");
        let c = cfg("[x]\nk = c\n");

        let left = a.merge(&b.merge(&c, flags).unwrap(), flags).unwrap();
        let right = a.merge(&b, flags).unwrap().merge(&c, flags).unwrap();

        assert_eq!(left.serialize(), right.serialize());
    }

    #[test]
    fn copies_are_independent() {
        let config = cfg(BASE);
        let copy = config.copy();
        assert_eq!(config.serialize(), copy.serialize());
        drop(config);
        assert!(copy.serialize().contains("key1 = first"));
    }

    #[test]
    fn trailing_comments_are_concatenated() {
        let base = cfg("[a]\nk = 1\n;base trailer\n");
        let donor = cfg("[b]\nk = 2\n;donor trailer\n");

        // Trailing comments at EOF stay inside their last section; merge
        // also concatenates the config-level trailing comments when set.
        let mut base = base;
        base.set_trailing_comment(Some(crate::Comment::from_lines(&[";base end"])));
        let mut donor_cfg = donor;
        donor_cfg.set_trailing_comment(Some(crate::Comment::from_lines(&[";donor end"])));

        let result = base.merge(&donor_cfg, CollisionFlags::default()).unwrap();
        let lines: Vec<&str> = result.trailing_comment().unwrap().lines().collect();
        assert_eq!(lines, vec![";base end", ";donor end"]);
    }

    #[test]
    fn differing_boundaries_realign_to_the_acceptor() {
        let mut base = cfg("[a]\nshort = v\n");
        base.set_wrap(12).unwrap();

        let donor = cfg("[a]\nlong = aaa bbb ccc ddd eee fff\n");
        let result = base.merge(&donor, CollisionFlags::default()).unwrap();

        assert_eq!(result.boundary(), 12);
        for line in result.serialize().lines() {
            if line.starts_with('[') {
                continue;
            }
            assert!(line.len() <= 12, "line too long: {:?}", line);
        }
    }

    fn write_file(dir: &std::path::Path, name: &str, text: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn augment_merges_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "10-first.conf", "[section]\nkey3 = third\n");
        write_file(dir.path(), "20-second.conf", "[extra]\nkey = v\n");
        write_file(dir.path(), "ignored.txt", "not ini at all\n");

        let base = cfg(BASE);
        let options = AugmentOptions {
            include: vec!["\\.conf$".to_owned()],
            ..Default::default()
        };

        let result = base.augment(dir.path(), &options).unwrap();
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.processed.len(), 2);

        let mut merged = result.config;
        assert_eq!(merged.section_list(), vec!["section", "extra"]);
        let key3 = merged
            .get_value(Some("section"), "key3", GetMode::FirstValue)
            .unwrap()
            .unwrap();
        assert_eq!(key3.string(), "third");
    }

    #[test]
    fn augment_exclusion_and_section_filter() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "good.conf",
            "[config]\nkey = v\n[forbidden]\nkey = x\n",
        );
        write_file(dir.path(), "real.conf", "[config]\nreal = yes\n");

        let base = cfg("[config]\nbase = 1\n");
        let options = AugmentOptions {
            include: vec!["\\.conf$".to_owned()],
            exclude: vec!["^real\\.conf$".to_owned()],
            sections: vec!["^config$".to_owned()],
            collision_flags: CollisionFlags::MV1S_ALLOW,
            merge_flags: CollisionFlags::MV2S_ALLOW,
            ..Default::default()
        };

        let result = base.augment(dir.path(), &options).unwrap();

        // The excluded file contributed nothing.
        let merged = result.config;
        assert!(merged.section("forbidden").is_none());
        assert!(!merged.serialize().contains("real = yes"));
        assert!(merged.serialize().contains("key = v"));

        assert_eq!(result.processed.len(), 1);
        assert!(result.processed[0].ends_with("good.conf"));
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("Section [forbidden]") && e.contains("is not allowed")));
    }

    #[test]
    fn augment_of_empty_or_missing_directory_still_returns_a_result() {
        let dir = tempfile::tempdir().unwrap();
        let base = cfg(BASE);

        let result = base.augment(dir.path(), &Default::default()).unwrap();
        assert!(result.errors.is_empty());
        assert!(result.processed.is_empty());
        assert_eq!(result.config.serialize(), base.serialize());

        let missing = dir.path().join("does-not-exist");
        let result = base.augment(&missing, &Default::default()).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Failed to read directory"));
        assert_eq!(result.config.serialize(), base.serialize());
    }

    #[test]
    fn augment_records_parse_diagnostics_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "bad.conf", "[broken\nkey = v\n");
        write_file(dir.path(), "good.conf", "[ok]\nkey = v\n");

        let base = cfg(BASE);
        let result = base.augment(dir.path(), &Default::default()).unwrap();

        assert!(result.errors.iter().any(|e| e.contains("line 1")));
        // The good file still contributed.
        assert!(result.config.section("ok").is_some());
        assert_eq!(result.processed.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn augment_access_check() {
        use crate::{AccessCheck, AccessCheckFlags};
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "secret.conf", "[section]\nkey9 = v\n");
        std::fs::set_permissions(
            dir.path().join("secret.conf"),
            std::fs::Permissions::from_mode(0o600),
        )
        .unwrap();

        let base = cfg(BASE);
        let options = AugmentOptions {
            access_check: Some(AccessCheck {
                flags: AccessCheckFlags::MODE,
                uid: 0,
                gid: 0,
                mode: 0o444,
                mask: 0o444,
            }),
            ..Default::default()
        };

        let result = base.augment(dir.path(), &options).unwrap();
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("did not pass access check")));
        assert!(result.processed.is_empty());
        assert!(result.config.section("section").unwrap().contains_key("key1"));
        assert!(!result.config.section("section").unwrap().contains_key("key9"));
    }

    #[test]
    fn bad_patterns_are_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.conf", "[a]\nk = v\n");

        let base = cfg(BASE);
        let options = AugmentOptions {
            include: vec!["[".to_owned(), "\\.conf$".to_owned()],
            ..Default::default()
        };

        let result = base.augment(dir.path(), &options).unwrap();
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("Failed to compile pattern '['")));
        // The valid pattern still matched the file.
        assert_eq!(result.processed.len(), 1);
    }
}
