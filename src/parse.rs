use {
    crate::{
        config::{Section, DEFAULT_SECTION, SECTION_KEY, SPECIAL_KEY},
        flags::SectionMergeBase,
        merge::{insert_value, InsertOutcome},
        CollisionFlags, Comment, ConfigError, ErrorLevel, IniConfig, IniFile, ParseError,
        ParseErrorKind, ParseFlags, Severity, ValueObj,
    },
    log::{debug, trace},
    std::{collections::VecDeque, mem, path::Path},
};

/// Longest accepted physical line, terminator excluded.
pub const MAX_LINE: usize = 65536;

/// Longest accepted key or section name.
pub const MAX_KEY: usize = 1024;

/// Options of a single parse run.
#[derive(Clone, Copy, Debug)]
pub struct ParseOptions {
    /// When to abort on a recorded diagnostic.
    pub error_level: ErrorLevel,
    /// Duplicate key / section policies.
    pub collision_flags: CollisionFlags,
    /// Line-classification tweaks.
    pub parse_flags: ParseFlags,
    /// Line-length cap; longer lines raise a *long line* diagnostic.
    pub max_line: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            error_level: ErrorLevel::default(),
            collision_flags: CollisionFlags::default(),
            parse_flags: ParseFlags::default(),
            max_line: MAX_LINE,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the error-tolerance level.
    pub fn error_level(mut self, error_level: ErrorLevel) -> Self {
        self.error_level = error_level;
        self
    }

    /// Sets the duplicate key / section policies.
    pub fn collision_flags(mut self, collision_flags: CollisionFlags) -> Self {
        self.collision_flags = collision_flags;
        self
    }

    /// Sets the line-classification tweaks.
    pub fn parse_flags(mut self, parse_flags: ParseFlags) -> Self {
        self.parse_flags = parse_flags;
        self
    }
}

/// Parser actions. The parser dequeues one action per step and executes
/// it; actions enqueue their successors. This keeps error handling a
/// first-class edge of the state machine instead of an unwind path.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ParseAction {
    /// Read the next line from the source.
    Read,
    /// Classify and process the read line.
    Inspect,
    /// Reading is complete; flush pending state.
    Post,
    /// Record the pending diagnostic and decide whether to continue.
    Error,
    /// Parsing is finished.
    Done,
}

impl IniConfig {
    /// Parses INI text from a file object into this configuration.
    ///
    /// The configuration must be empty. Diagnostics are recorded into the
    /// configuration's error list; whether a diagnostic also aborts the
    /// parse is governed by the error-tolerance level of `options`.
    /// An aborted parse returns
    /// [`ParseAborted`](enum.ConfigError.html#variant.ParseAborted) and
    /// leaves the configuration holding everything parsed up to the abort.
    pub fn parse(&mut self, file: &IniFile, options: &ParseOptions) -> Result<(), ConfigError> {
        if !self.is_empty() {
            return Err(ConfigError::InvalidArgument("non-empty configuration"));
        }
        options.collision_flags.validate()?;

        let mut parser = Parser::new(self, file, *options);
        parser.run()
    }

    /// Opens, transcodes and parses a file in one call.
    pub fn from_file<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<Self, ConfigError> {
        let file = IniFile::open(path)?;
        let mut cfg = Self::new();
        cfg.parse(&file, options)?;
        Ok(cfg)
    }

    /// Parses a UTF-8 string in one call.
    pub fn from_text(text: &str, options: &ParseOptions) -> Result<Self, ConfigError> {
        let file = IniFile::from_str(text);
        let mut cfg = Self::new();
        cfg.parse(&file, options)?;
        Ok(cfg)
    }
}

struct Parser<'cfg, 'src> {
    cfg: &'cfg mut IniConfig,
    lines: crate::fileobj::LineIter<'src>,
    options: ParseOptions,
    queue: VecDeque<ParseAction>,
    /// Number of the line read most recently, 1-based.
    linenum: u32,
    /// Line on which the currently-open key was found.
    keylinenum: u32,
    /// Line on which the currently-open section header was found.
    seclinenum: u32,
    last_read: Option<&'src str>,
    key: Option<String>,
    raw_lines: Vec<String>,
    /// The section currently being populated, if any.
    sec: Option<(String, Section)>,
    /// Set when the open section is a rejected duplicate and must be
    /// discarded at save time.
    sec_dropped: bool,
    /// Name of an existing section values are being merged into
    /// (a duplicate section was reopened under a merging policy).
    merge_sec: Option<String>,
    /// Comment lines accumulated since the last value.
    comment: Option<Comment>,
    last_error: Option<(ParseErrorKind, Severity)>,
    aborted: bool,
}

impl<'cfg, 'src> Parser<'cfg, 'src> {
    fn new(cfg: &'cfg mut IniConfig, file: &'src IniFile, options: ParseOptions) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(ParseAction::Read);

        Self {
            cfg,
            lines: file.lines(),
            options,
            queue,
            linenum: 0,
            keylinenum: 0,
            seclinenum: 0,
            last_read: None,
            key: None,
            raw_lines: Vec::new(),
            sec: None,
            sec_dropped: false,
            merge_sec: None,
            comment: None,
            last_error: None,
            aborted: false,
        }
    }

    fn run(&mut self) -> Result<(), ConfigError> {
        loop {
            let action = self.queue.pop_front().unwrap_or(ParseAction::Done);
            trace!("action {:?} at line {}", action, self.linenum);

            match action {
                ParseAction::Read => self.read(),
                ParseAction::Inspect => self.inspect()?,
                ParseAction::Post => self.post()?,
                ParseAction::Error => self.error()?,
                ParseAction::Done => break,
            }
        }

        if self.aborted {
            Err(ConfigError::ParseAborted)
        } else {
            Ok(())
        }
    }

    fn read(&mut self) {
        self.linenum += 1;

        match self.lines.next() {
            None => self.queue.push_back(ParseAction::Post),
            Some(line) => {
                if line.len() >= self.options.max_line {
                    self.last_error = Some((ParseErrorKind::LongLine, Severity::Error));
                    self.queue.push_back(ParseAction::Error);
                } else {
                    self.last_read = Some(line);
                    self.queue.push_back(ParseAction::Inspect);
                }
            }
        }
    }

    fn inspect(&mut self) -> Result<(), ConfigError> {
        let line = self.last_read.take().unwrap_or("");

        match line.chars().next() {
            None | Some(';') | Some('#') => self.handle_comment(line),
            Some(' ') | Some('\t') => self.handle_space(line),
            Some('[') => self.handle_section(line),
            _ => self.handle_kvp(line),
        }
    }

    fn handle_comment(&mut self, line: &str) -> Result<(), ConfigError> {
        // A comment closes the value it follows.
        if self.key.is_some() && self.commit_value()? {
            return Ok(());
        }

        self.comment.get_or_insert_with(Comment::new).append(line);
        self.queue.push_back(ParseAction::Read);
        Ok(())
    }

    fn handle_space(&mut self, line: &str) -> Result<(), ConfigError> {
        let tab = line.starts_with('\t');
        let kind = if tab {
            ParseErrorKind::UnexpectedTab
        } else {
            ParseErrorKind::UnexpectedSpace
        };

        let flags = self.options.parse_flags;
        if (!tab && flags.contains(ParseFlags::NOSPACE))
            || (tab && flags.contains(ParseFlags::NOTAB))
        {
            self.classify_error(kind);
            return Ok(());
        }

        if flags.contains(ParseFlags::NOWRAP) {
            // Folding disabled; only an all-whitespace line is acceptable,
            // as a comment.
            if line.trim().is_empty() {
                return self.handle_comment(line);
            }
            self.classify_error(kind);
            return Ok(());
        }

        if self.key.is_some() {
            // A new physical line of a folded value, kept verbatim.
            self.raw_lines.push(line.to_owned());
            self.queue.push_back(ParseAction::Read);
            return Ok(());
        }

        if line.trim().is_empty() {
            return self.handle_comment(line);
        }

        self.classify_error(kind);
        Ok(())
    }

    fn handle_kvp(&mut self, line: &str) -> Result<(), ConfigError> {
        if line.starts_with('=') {
            self.classify_error(ParseErrorKind::NoKey);
            return Ok(());
        }

        let eq = match line.find('=') {
            Some(eq) => eq,
            None => {
                self.classify_error(ParseErrorKind::NoEqualSign);
                return Ok(());
            }
        };

        let key = line[..eq].trim();
        if key.is_empty() {
            self.classify_error(ParseErrorKind::NoKey);
            return Ok(());
        }
        if key.len() >= MAX_KEY {
            self.classify_error(ParseErrorKind::LongKey);
            return Ok(());
        }

        if self.key.is_some() && self.commit_value()? {
            return Ok(());
        }

        let value = line[eq + 1..].trim();
        self.key = Some(key.to_owned());
        self.raw_lines = vec![value.to_owned()];
        self.keylinenum = self.linenum;

        self.queue.push_back(ParseAction::Read);
        Ok(())
    }

    fn handle_section(&mut self, line: &str) -> Result<(), ConfigError> {
        let trimmed = line.trim_end();
        if !trimmed.ends_with(']') {
            self.classify_error(ParseErrorKind::NoClosingBracket);
            return Ok(());
        }

        let name = trimmed[1..trimmed.len() - 1].trim();
        if name.is_empty() {
            self.classify_error(ParseErrorKind::NoSectionName);
            return Ok(());
        }
        if name.len() > MAX_KEY {
            self.classify_error(ParseErrorKind::SectionNameTooLong);
            return Ok(());
        }

        if self.key.is_some() && self.commit_value()? {
            return Ok(());
        }
        if self.save_section()? {
            return Ok(());
        }

        self.seclinenum = self.linenum;
        self.open_section(name)
    }

    /// Opens a section, resolving a name collision against the already
    /// saved sections with the MS policy.
    fn open_section(&mut self, name: &str) -> Result<(), ConfigError> {
        let ms = self.options.collision_flags.ms();

        if self.cfg.section(name).is_some() {
            debug!("duplicate section [{}] at line {}", name, self.seclinenum);

            match ms.base {
                SectionMergeBase::Error => {
                    // The reopened body still has to be consumed; it is
                    // parsed into a section that save will discard.
                    self.open_fresh(name, true);
                    self.last_error = Some((ParseErrorKind::DuplicateSection, Severity::Error));
                    self.queue.push_back(ParseAction::Error);
                    return Ok(());
                }
                SectionMergeBase::Preserve => {
                    self.open_fresh(name, true);
                }
                SectionMergeBase::Merge => {
                    self.attach_header_comment(name);
                    self.merge_sec = Some(name.to_owned());
                }
                SectionMergeBase::Overwrite => {
                    let section = self.cfg.section_mut(name).unwrap();
                    section.retain(|key, _| key == SECTION_KEY);
                    self.attach_header_comment(name);
                    self.merge_sec = Some(name.to_owned());
                }
            }

            if ms.detect {
                self.last_error = Some((ParseErrorKind::DuplicateSection, Severity::Warning));
                self.queue.push_back(ParseAction::Error);
            } else {
                self.queue.push_back(ParseAction::Read);
            }
            return Ok(());
        }

        self.open_fresh(name, false);
        self.queue.push_back(ParseAction::Read);
        Ok(())
    }

    fn open_fresh(&mut self, name: &str, dropped: bool) {
        let mut section = Section::new();
        let header = ValueObj::from_raw_lines(
            vec![name.to_owned()],
            self.seclinenum,
            SECTION_KEY.len(),
            self.cfg.boundary,
            self.comment.take(),
        );
        section.push(SECTION_KEY, header);

        self.sec = Some((name.to_owned(), section));
        self.sec_dropped = dropped;
    }

    /// Folds a pending header comment into the header of the existing
    /// section a duplicate is merged into.
    fn attach_header_comment(&mut self, name: &str) {
        let comment = match self.comment.take() {
            Some(comment) if !comment.is_empty() => comment,
            _ => return,
        };

        let section = self.cfg.section_mut(name).unwrap();
        if let Some(header) = section.get_mut(SECTION_KEY) {
            match header.comment_mut() {
                Some(existing) => existing.extend(&comment),
                None => header.set_comment(Some(comment)),
            }
        }
    }

    /// Commits the currently-open key into the open section (or the merge
    /// target, or a fresh default section). Returns `true` when a
    /// collision diagnostic aborted the parse.
    fn commit_value(&mut self) -> Result<bool, ConfigError> {
        let key = self.key.take().unwrap();
        let raw_lines = mem::take(&mut self.raw_lines);
        let comment = self.comment.take();

        let vo = ValueObj::from_raw_lines(
            raw_lines,
            self.keylinenum,
            key.len(),
            self.cfg.boundary,
            comment,
        );

        let flags = self.options.collision_flags;
        let (outcome, kind, line) = if let Some(target) = self.merge_sec.clone() {
            let section = self.cfg.section_mut(&target).unwrap();
            (
                insert_value(section, &key, vo, flags.mv2s()),
                ParseErrorKind::DuplicateKeyMerge,
                self.seclinenum,
            )
        } else {
            if self.sec.is_none() {
                // Orphan pair before the first header; open the implied
                // default section. It carries no header entry so a file
                // without sections round-trips without one.
                self.sec = Some((DEFAULT_SECTION.to_owned(), Section::new()));
                self.sec_dropped = false;
            }
            let section = &mut self.sec.as_mut().unwrap().1;
            (
                insert_value(section, &key, vo, flags.mv1s()),
                ParseErrorKind::DuplicateKey,
                self.keylinenum,
            )
        };

        match outcome {
            InsertOutcome::Inserted | InsertOutcome::Replaced | InsertOutcome::Preserved => {
                Ok(false)
            }
            InsertOutcome::Duplicate => self.record_diag(line, kind, Severity::Error),
            InsertOutcome::DetectedDuplicate => self.record_diag(line, kind, Severity::Warning),
        }
    }

    /// Saves the in-progress section into the configuration.
    /// Returns `true` when the save aborted the parse.
    fn save_section(&mut self) -> Result<bool, ConfigError> {
        self.merge_sec = None;

        let (name, section) = match self.sec.take() {
            Some(open) => open,
            None => return Ok(false),
        };

        if self.sec_dropped {
            self.sec_dropped = false;
            trace!("discarding duplicate section [{}]", name);
            return Ok(false);
        }

        debug!("saving section [{}]", name);
        self.cfg.sections.push(&name, section);
        Ok(false)
    }

    fn post(&mut self) -> Result<(), ConfigError> {
        // A comment with no key after it becomes a synthetic
        // comment-only value at the end of the open section.
        if self.comment.is_some() && self.key.is_none() {
            self.key = Some(SPECIAL_KEY.to_owned());
            self.raw_lines = Vec::new();
            self.keylinenum = self.linenum;
        }

        if self.key.is_some() && self.commit_value()? {
            return Ok(());
        }
        if self.save_section()? {
            return Ok(());
        }

        self.queue.push_back(ParseAction::Done);
        Ok(())
    }

    /// Routes a line-classification failure: skipped entirely for
    /// non-key/value lines under `IGNORE_NON_KVP`, otherwise recorded
    /// through the error action.
    fn classify_error(&mut self, kind: ParseErrorKind) {
        use ParseErrorKind::*;

        let skippable = matches!(kind, NoEqualSign | NoKey | UnexpectedSpace | UnexpectedTab);
        if skippable
            && self
                .options
                .parse_flags
                .contains(ParseFlags::IGNORE_NON_KVP)
        {
            trace!("skipping non-kvp line {}", self.linenum);
            self.queue.push_back(ParseAction::Read);
            return;
        }

        self.last_error = Some((kind, Severity::Error));
        self.queue.push_back(ParseAction::Error);
    }

    fn error(&mut self) -> Result<(), ConfigError> {
        let (kind, severity) = self.last_error.take().unwrap();

        if !self.record_diag(self.linenum, kind, severity)? {
            // The offending line is discarded and reading resumes.
            self.queue.push_back(ParseAction::Read);
        }
        Ok(())
    }

    /// Records a diagnostic and applies the tolerance level.
    /// Returns `true` when the parse was aborted.
    fn record_diag(
        &mut self,
        line: u32,
        kind: ParseErrorKind,
        severity: Severity,
    ) -> Result<bool, ConfigError> {
        self.cfg.record(ParseError {
            line,
            kind,
            severity,
        });

        let abort = match self.options.error_level {
            ErrorLevel::StopOnAny => true,
            ErrorLevel::StopOnNone => false,
            ErrorLevel::StopOnError => severity == Severity::Error,
        };

        if abort {
            debug!("aborting parse at line {}: {}", line, kind);
            self.aborted = true;
            self.save_section()?;
            self.queue.clear();
            self.queue.push_back(ParseAction::Done);
        }

        Ok(abort)
    }
}
