//! An order- and comment-preserving INI configuration library.
//!
//! The library reads INI text (optionally UTF-16 / UTF-32 with a BOM,
//! transcoded to UTF-8 internally), builds an insertion-ordered
//! representation with attached comments and raw source lines, merges
//! configurations under configurable collision policies, augments a base
//! configuration from a directory of snippets, serializes back with
//! comment and wrap fidelity, and validates configurations against a
//! rules document.
//!
//! ```
//! use inifold::{IniConfig, GetMode, ParseOptions};
//!
//! let text = "\
//! ;The main section
//! [config]
//! version = 0.1
//! ";
//!
//! let mut config = IniConfig::from_text(text, &ParseOptions::default()).unwrap();
//! let version = config
//!     .get_value(Some("config"), "version", GetMode::FirstValue)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(version.get_f64(true).unwrap(), 0.1);
//! assert_eq!(config.serialize(), text);
//! ```

mod access;
mod comment;
mod config;
mod convert;
mod error;
mod fileobj;
mod flags;
mod merge;
mod modify;
mod multimap;
mod parse;
mod validate;
mod value;

pub use access::{AccessCheck, AccessCheckFlags};
pub use comment::Comment;
pub use config::{GetMode, IniConfig, DEFAULT_SECTION};
pub use error::{
    ConfigError, ConvertError, ParseError, ParseErrorKind, Severity, TranscodeErrorKind,
};
pub use fileobj::{Encoding, IniFile};
pub use flags::{
    CollisionFlags, ErrorLevel, ParseFlags, SectionMergeBase, SectionMergeMode, ValueMergeMode,
};
pub use merge::{AugmentOptions, AugmentResult};
pub use modify::ValueAddMode;
pub use multimap::Position;
pub use parse::{ParseOptions, MAX_KEY, MAX_LINE};
pub use validate::{
    rules_check, rules_from_file, rules_from_text, ErrObj, Validator, ValidatorFn, RULE_PREFIX,
};
pub use value::{ValueObj, DEFAULT_BOUNDARY};
