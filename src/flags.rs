#![allow(non_upper_case_globals)]

use {
    crate::ConfigError,
    bitflags::bitflags,
    std::ops::{BitOr, BitOrAssign},
};

/// Error-tolerance level of a parse.
///
/// The level controls whether a recorded diagnostic aborts the parse;
/// every encountered diagnostic is recorded regardless.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorLevel {
    /// Abort on any diagnostic, warning or error.
    StopOnAny,
    /// Best effort - never abort.
    StopOnNone,
    /// Abort on errors only; warnings are recorded and parsing continues.
    StopOnError,
}

impl Default for ErrorLevel {
    fn default() -> Self {
        ErrorLevel::StopOnNone
    }
}

bitflags! {
    /// Flags which tweak the line-classification rules of the parser.
    pub struct ParseFlags: u32 {
        /// Do not fold lines starting with whitespace into the previous value.
        const NOWRAP = 0x0001;
        /// No spaces are allowed to the left of a key.
        const NOSPACE = 0x0002;
        /// No tabs are allowed to the left of a key.
        const NOTAB = 0x0004;
        /// Silently skip lines that are not key/value pairs
        /// instead of recording a diagnostic.
        const IGNORE_NON_KVP = 0x0008;
    }
}

impl Default for ParseFlags {
    fn default() -> Self {
        ParseFlags::empty()
    }
}

/// Resolution policy for two values with the same key.
///
/// Selected by the MV1S field of [`CollisionFlags`] for duplicates within
/// one section instance, and by the MV2S field for duplicates introduced
/// when two instances of a section are merged.
///
/// [`CollisionFlags`]: struct.CollisionFlags.html
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueMergeMode {
    /// The existing value is replaced.
    Overwrite,
    /// The insertion fails and a duplicate-key diagnostic is recorded.
    Error,
    /// The new value is silently dropped.
    Preserve,
    /// Both values coexist in insertion order.
    Allow,
    /// Both values coexist and a duplicate-key diagnostic is recorded.
    Detect,
}

/// Base resolution policy for two sections with the same name.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SectionMergeBase {
    /// Entries of the new section are merged into the existing one
    /// under the MV2S value policy.
    Merge,
    /// The insertion fails and a duplicate-section diagnostic is recorded.
    Error,
    /// The existing section is emptied first, then the new entries are inserted.
    Overwrite,
    /// The new section is dropped entirely.
    Preserve,
}

/// Resolution policy for duplicate sections: a base mode plus
/// an optional detect modifier which records a duplicate-section
/// diagnostic without changing the base behavior.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SectionMergeMode {
    pub base: SectionMergeBase,
    pub detect: bool,
}

/// Collision-resolution flags: the MV1S, MV2S and MS policies packed
/// into disjoint bit-fields of a single 32-bit word.
///
/// Combine one constant from each group with `|`:
///
/// ```
/// # use inifold::CollisionFlags;
/// let flags = CollisionFlags::MV1S_ALLOW
///     | CollisionFlags::MV2S_DETECT
///     | CollisionFlags::MS_MERGE;
/// assert!(flags.validate().is_ok());
/// ```
///
/// The MS field additionally accepts [`MS_DETECT`] OR-ed onto a base mode
/// (e.g. `MS_DETECT | MS_PRESERVE`); plain [`MS_DETECT`] behaves as
/// `MS_DETECT | MS_MERGE`.
///
/// Unknown bit patterns are rejected by [`validate`] at the API boundary.
///
/// [`MS_DETECT`]: #associatedconstant.MS_DETECT
/// [`validate`]: #method.validate
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CollisionFlags(u32);

impl CollisionFlags {
    /// Same-section duplicate value is overwritten.
    pub const MV1S_OVERWRITE: Self = Self(0x0000);
    /// Same-section duplicate value causes an error.
    pub const MV1S_ERROR: Self = Self(0x0001);
    /// Same-section duplicate value is discarded.
    pub const MV1S_PRESERVE: Self = Self(0x0002);
    /// Same-section duplicate values are allowed.
    pub const MV1S_ALLOW: Self = Self(0x0003);
    /// Same-section duplicate values are allowed but logged.
    pub const MV1S_DETECT: Self = Self(0x0004);

    /// Cross-section duplicate value is overwritten.
    pub const MV2S_OVERWRITE: Self = Self(0x0000);
    /// Cross-section duplicate value causes an error.
    pub const MV2S_ERROR: Self = Self(0x0010);
    /// Cross-section duplicate value is discarded.
    pub const MV2S_PRESERVE: Self = Self(0x0020);
    /// Cross-section duplicate values are allowed.
    pub const MV2S_ALLOW: Self = Self(0x0030);
    /// Cross-section duplicate values are allowed but logged.
    pub const MV2S_DETECT: Self = Self(0x0040);

    /// Duplicate sections are merged.
    pub const MS_MERGE: Self = Self(0x0000);
    /// Duplicate section causes an error.
    pub const MS_ERROR: Self = Self(0x0100);
    /// The existing section is emptied and replaced.
    pub const MS_OVERWRITE: Self = Self(0x0200);
    /// The new section is discarded.
    pub const MS_PRESERVE: Self = Self(0x0300);
    /// Modifier: log duplicate sections. Combines with a base mode.
    pub const MS_DETECT: Self = Self(0x0400);

    const MV1S_MASK: u32 = 0x000F;
    const MV2S_MASK: u32 = 0x00F0;
    const MS_MASK: u32 = 0x0F00;
    const MS_BASE_MASK: u32 = 0x0300;
    const MS_DETECT_BIT: u32 = 0x0400;

    /// Returns the raw 32-bit encoding.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Reconstructs flags from a raw 32-bit encoding,
    /// rejecting unknown bit patterns.
    pub fn from_bits(bits: u32) -> Result<Self, ConfigError> {
        let flags = Self(bits);
        flags.validate()?;
        Ok(flags)
    }

    /// Checks that exactly one known value is selected in each field
    /// and no stray bits are set.
    pub fn validate(self) -> Result<(), ConfigError> {
        if self.0 & !(Self::MV1S_MASK | Self::MV2S_MASK | Self::MS_MASK) != 0 {
            return Err(ConfigError::InvalidArgument("collision flags"));
        }
        if self.0 & Self::MV1S_MASK > 0x0004 {
            return Err(ConfigError::InvalidArgument("MV1S collision flag"));
        }
        if (self.0 & Self::MV2S_MASK) >> 4 > 0x0004 {
            return Err(ConfigError::InvalidArgument("MV2S collision flag"));
        }
        if self.0 & Self::MS_MASK & !(Self::MS_BASE_MASK | Self::MS_DETECT_BIT) != 0 {
            return Err(ConfigError::InvalidArgument("MS collision flag"));
        }
        Ok(())
    }

    /// Decodes the same-section duplicate-value policy.
    pub(crate) fn mv1s(self) -> ValueMergeMode {
        Self::value_mode(self.0 & Self::MV1S_MASK)
    }

    /// Decodes the cross-section duplicate-value policy.
    pub(crate) fn mv2s(self) -> ValueMergeMode {
        Self::value_mode((self.0 & Self::MV2S_MASK) >> 4)
    }

    /// Decodes the duplicate-section policy.
    pub(crate) fn ms(self) -> SectionMergeMode {
        let base = match self.0 & Self::MS_BASE_MASK {
            0x0000 => SectionMergeBase::Merge,
            0x0100 => SectionMergeBase::Error,
            0x0200 => SectionMergeBase::Overwrite,
            _ => SectionMergeBase::Preserve,
        };

        SectionMergeMode {
            base,
            detect: self.0 & Self::MS_DETECT_BIT != 0,
        }
    }

    fn value_mode(field: u32) -> ValueMergeMode {
        match field {
            0 => ValueMergeMode::Overwrite,
            1 => ValueMergeMode::Error,
            2 => ValueMergeMode::Preserve,
            3 => ValueMergeMode::Allow,
            _ => ValueMergeMode::Detect,
        }
    }
}

impl Default for CollisionFlags {
    fn default() -> Self {
        Self::MV1S_OVERWRITE | Self::MV2S_OVERWRITE | Self::MS_MERGE
    }
}

impl BitOr for CollisionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CollisionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
