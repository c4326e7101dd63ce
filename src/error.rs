use std::{
    error::Error,
    fmt::{Display, Formatter},
    io,
};

/// Kinds of diagnostics the parser may record while reading an INI document.
///
/// The numeric codes (1..14) are stable and exposed through
/// [`code`](#method.code) for programmatic consumers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParseErrorKind {
    /// Line is too long.
    LongLine = 1,
    /// No closing bracket in section definition.
    NoClosingBracket,
    /// Section name is missing.
    NoSectionName,
    /// Section name is too long.
    SectionNameTooLong,
    /// No equal sign on a key/value line.
    NoEqualSign,
    /// No key before the equal sign.
    NoKey,
    /// Key is too long.
    LongKey,
    /// Failed to read the line.
    ReadFailure,
    /// Line starts with a space when it should not.
    UnexpectedSpace,
    /// Duplicate key is not allowed in the section.
    DuplicateKey,
    /// Duplicate key detected while merging sections.
    DuplicateKeyMerge,
    /// Duplicate section is not allowed.
    DuplicateSection,
    /// Line contains invalid characters.
    InvalidCharacters,
    /// Line starts with a tab when it should not.
    UnexpectedTab,
}

impl ParseErrorKind {
    /// Returns the stable numeric code of the diagnostic kind.
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        use ParseErrorKind::*;

        match self {
            LongLine => "Line is too long.".fmt(f),
            NoClosingBracket => "No closing bracket in section definition.".fmt(f),
            NoSectionName => "Section name is missing.".fmt(f),
            SectionNameTooLong => "Section name is too long.".fmt(f),
            NoEqualSign => "Equal sign is missing.".fmt(f),
            NoKey => "Property name is missing.".fmt(f),
            LongKey => "Property name is too long.".fmt(f),
            ReadFailure => "Failed to read line.".fmt(f),
            UnexpectedSpace => "Line starts with a space.".fmt(f),
            DuplicateKey => "Duplicate key is not allowed.".fmt(f),
            DuplicateKeyMerge => "Duplicate key is detected while merging sections.".fmt(f),
            DuplicateSection => "Duplicate section is not allowed.".fmt(f),
            InvalidCharacters => "Invalid character at the beginning of the line.".fmt(f),
            UnexpectedTab => "Line starts with a tab.".fmt(f),
        }
    }
}

/// Severity of a recorded [`parse diagnostic`].
///
/// Warnings never abort a parse under [`StopOnNone`] / [`StopOnError`];
/// errors abort under [`StopOnAny`] and [`StopOnError`].
///
/// [`parse diagnostic`]: struct.ParseError.html
/// [`StopOnNone`]: enum.ErrorLevel.html#variant.StopOnNone
/// [`StopOnError`]: enum.ErrorLevel.html#variant.StopOnError
/// [`StopOnAny`]: enum.ErrorLevel.html#variant.StopOnAny
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Warning,
    Error,
}

/// A single parse diagnostic: a line number paired with an error kind.
///
/// Line numbers are 1-based; diagnostics produced by merge operations,
/// which have no source line, use line `0`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ParseError {
    /// 1-based line in the source, `0` for merge diagnostics.
    pub line: u32,
    /// Actual error.
    pub kind: ParseErrorKind,
    /// Diagnostic severity.
    pub severity: Severity,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };

        write!(
            f,
            "{} ({}) on line {}: {}",
            severity,
            self.kind.code(),
            self.line,
            self.kind
        )
    }
}

/// Failures reported by the transcoder when converting a source buffer to UTF-8.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TranscodeErrorKind {
    /// An invalid byte sequence for the detected encoding.
    InvalidSequence,
    /// The buffer ends in the middle of a multibyte sequence.
    IncompleteSequence,
}

impl Display for TranscodeErrorKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            TranscodeErrorKind::InvalidSequence => "invalid byte sequence".fmt(f),
            TranscodeErrorKind::IncompleteSequence => {
                "incomplete byte sequence at end of input".fmt(f)
            }
        }
    }
}

/// An error returned by the fallible configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// A caller-provided argument is invalid.
    /// Contains a short description of the offending argument.
    InvalidArgument(&'static str),
    /// The requested section, attribute or index does not exist.
    NotFound,
    /// The operation is not supported on this platform.
    NotSupported,
    /// An underlying I/O operation failed.
    Io(io::Error),
    /// The source buffer could not be transcoded to UTF-8.
    Transcode(TranscodeErrorKind),
    /// A duplicate key was rejected by the active collision policy.
    DuplicateKey,
    /// A duplicate section was rejected by the active collision policy.
    DuplicateSection,
    /// The file did not pass the access check.
    /// Contains the name of the mismatched property.
    AccessCheck(&'static str),
    /// The parse was aborted by the error-tolerance policy.
    /// The diagnostics collected so far are in the configuration's error list.
    ParseAborted,
}

impl Error for ConfigError {}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        use ConfigError::*;

        match self {
            InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            NotFound => "requested item was not found".fmt(f),
            NotSupported => "operation is not supported".fmt(f),
            Io(err) => write!(f, "i/o error: {}", err),
            Transcode(kind) => write!(f, "transcoding failed: {}", kind),
            DuplicateKey => "duplicate key rejected by the collision policy".fmt(f),
            DuplicateSection => "duplicate section rejected by the collision policy".fmt(f),
            AccessCheck(what) => write!(f, "access check failed: {} mismatch", what),
            ParseAborted => "parsing was aborted, see the configuration error list".fmt(f),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

/// An error returned by the typed value accessors.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConvertError {
    /// The value string does not parse as the requested type.
    Conversion,
    /// The value parses but does not fit the requested type.
    OutOfRange,
}

impl Error for ConvertError {}

impl Display for ConvertError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ConvertError::Conversion => "value conversion failed".fmt(f),
            ConvertError::OutOfRange => "value is out of range for the requested type".fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_codes_are_stable() {
        assert_eq!(ParseErrorKind::LongLine.code(), 1);
        assert_eq!(ParseErrorKind::NoClosingBracket.code(), 2);
        assert_eq!(ParseErrorKind::NoSectionName.code(), 3);
        assert_eq!(ParseErrorKind::SectionNameTooLong.code(), 4);
        assert_eq!(ParseErrorKind::NoEqualSign.code(), 5);
        assert_eq!(ParseErrorKind::NoKey.code(), 6);
        assert_eq!(ParseErrorKind::LongKey.code(), 7);
        assert_eq!(ParseErrorKind::ReadFailure.code(), 8);
        assert_eq!(ParseErrorKind::UnexpectedSpace.code(), 9);
        assert_eq!(ParseErrorKind::DuplicateKey.code(), 10);
        assert_eq!(ParseErrorKind::DuplicateKeyMerge.code(), 11);
        assert_eq!(ParseErrorKind::DuplicateSection.code(), 12);
        assert_eq!(ParseErrorKind::InvalidCharacters.code(), 13);
        assert_eq!(ParseErrorKind::UnexpectedTab.code(), 14);
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError {
            line: 7,
            kind: ParseErrorKind::NoEqualSign,
            severity: Severity::Error,
        };
        assert_eq!(
            err.to_string(),
            "Error (5) on line 7: Equal sign is missing."
        );
    }
}
