use {
    crate::{AccessCheck, ConfigError, TranscodeErrorKind},
    log::{debug, trace},
    std::{
        fs,
        io::Write,
        path::{Path, PathBuf},
    },
};

/// Source encoding of a configuration file, detected from its byte-order
/// mark. The detected encoding is recorded on the file object so a later
/// save can reproduce the same BOM and encoding; the in-memory buffer is
/// always UTF-8 without a BOM.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Encoding {
    Utf32Be,
    Utf32Le,
    Utf16Be,
    Utf16Le,
    Utf8Bom,
    /// No BOM present; the default.
    Utf8,
}

impl Encoding {
    /// Inspects the first 2-4 bytes for a byte-order mark and returns the
    /// detected encoding together with the BOM length to skip.
    pub(crate) fn detect(bytes: &[u8]) -> (Encoding, usize) {
        if bytes.len() >= 4 {
            if bytes[..4] == [0x00, 0x00, 0xFE, 0xFF] {
                return (Encoding::Utf32Be, 4);
            }
            if bytes[..4] == [0xFF, 0xFE, 0x00, 0x00] {
                return (Encoding::Utf32Le, 4);
            }
        }
        if bytes.len() >= 3 && bytes[..3] == [0xEF, 0xBB, 0xBF] {
            return (Encoding::Utf8Bom, 3);
        }
        if bytes.len() >= 2 {
            if bytes[..2] == [0xFE, 0xFF] {
                return (Encoding::Utf16Be, 2);
            }
            if bytes[..2] == [0xFF, 0xFE] {
                return (Encoding::Utf16Le, 2);
            }
        }
        (Encoding::Utf8, 0)
    }

    /// The byte-order mark this encoding writes in front of saved output.
    pub fn bom(self) -> &'static [u8] {
        match self {
            Encoding::Utf32Be => &[0x00, 0x00, 0xFE, 0xFF],
            Encoding::Utf32Le => &[0xFF, 0xFE, 0x00, 0x00],
            Encoding::Utf16Be => &[0xFE, 0xFF],
            Encoding::Utf16Le => &[0xFF, 0xFE],
            Encoding::Utf8Bom => &[0xEF, 0xBB, 0xBF],
            Encoding::Utf8 => &[],
        }
    }

    /// Decodes the payload (BOM already stripped) to UTF-8.
    pub(crate) fn decode(self, bytes: &[u8]) -> Result<String, ConfigError> {
        match self {
            Encoding::Utf8 | Encoding::Utf8Bom => std::str::from_utf8(bytes)
                .map(|s| s.to_owned())
                .map_err(|err| {
                    if err.error_len().is_none() {
                        ConfigError::Transcode(TranscodeErrorKind::IncompleteSequence)
                    } else {
                        ConfigError::Transcode(TranscodeErrorKind::InvalidSequence)
                    }
                }),
            Encoding::Utf16Be => decode_utf16(bytes, encoding_rs::UTF_16BE),
            Encoding::Utf16Le => decode_utf16(bytes, encoding_rs::UTF_16LE),
            Encoding::Utf32Be => decode_utf32(bytes, u32::from_be_bytes),
            Encoding::Utf32Le => decode_utf32(bytes, u32::from_le_bytes),
        }
    }

    /// Encodes UTF-8 text back into this encoding, BOM included.
    pub(crate) fn encode(self, text: &str) -> Vec<u8> {
        let mut out = self.bom().to_vec();

        match self {
            Encoding::Utf8 | Encoding::Utf8Bom => out.extend_from_slice(text.as_bytes()),
            Encoding::Utf16Be => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            Encoding::Utf16Le => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            Encoding::Utf32Be => {
                for c in text.chars() {
                    out.extend_from_slice(&(c as u32).to_be_bytes());
                }
            }
            Encoding::Utf32Le => {
                for c in text.chars() {
                    out.extend_from_slice(&(c as u32).to_le_bytes());
                }
            }
        }

        out
    }
}

/// Decoding UTF-16 goes through `encoding_rs`; a malformed sequence is
/// fatal rather than replaced.
fn decode_utf16(bytes: &[u8], encoding: &'static encoding_rs::Encoding) -> Result<String, ConfigError> {
    if bytes.len() % 2 != 0 {
        return Err(ConfigError::Transcode(TranscodeErrorKind::IncompleteSequence));
    }

    let (decoded, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(ConfigError::Transcode(TranscodeErrorKind::InvalidSequence));
    }

    Ok(decoded.into_owned())
}

/// `encoding_rs` deliberately leaves out UTF-32, so the code-point-per-word
/// decode is done here.
fn decode_utf32(bytes: &[u8], word: fn([u8; 4]) -> u32) -> Result<String, ConfigError> {
    if bytes.len() % 4 != 0 {
        return Err(ConfigError::Transcode(TranscodeErrorKind::IncompleteSequence));
    }

    let mut out = String::with_capacity(bytes.len() / 4);
    for quad in bytes.chunks_exact(4) {
        let code = word([quad[0], quad[1], quad[2], quad[3]]);
        let c = char::from_u32(code)
            .ok_or(ConfigError::Transcode(TranscodeErrorKind::InvalidSequence))?;
        out.push(c);
    }

    Ok(out)
}

/// A configuration file object: the source bytes transcoded to UTF-8,
/// the detected encoding, and the file metadata for access checks and
/// change detection.
///
/// Distinct from the configuration object itself, which holds the parsed
/// data; the file object can be reopened and re-parsed.
#[derive(Debug)]
pub struct IniFile {
    filename: PathBuf,
    encoding: Encoding,
    content: String,
    metadata: Option<fs::Metadata>,
}

impl IniFile {
    /// Opens and transcodes a configuration file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let metadata = fs::metadata(path)?;

        let (encoding, bom_len) = Encoding::detect(&bytes);
        debug!(
            "opened {} ({} bytes, {:?})",
            path.display(),
            bytes.len(),
            encoding
        );
        let content = encoding.decode(&bytes[bom_len..])?;

        Ok(Self {
            filename: path.to_path_buf(),
            encoding,
            content,
            metadata: Some(metadata),
        })
    }

    /// Creates a file object from an in-memory buffer, with BOM detection
    /// and transcoding applied as for a file.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let (encoding, bom_len) = Encoding::detect(bytes);
        trace!("memory buffer of {} bytes, {:?}", bytes.len(), encoding);
        let content = encoding.decode(&bytes[bom_len..])?;

        Ok(Self {
            filename: PathBuf::new(),
            encoding,
            content,
            metadata: None,
        })
    }

    /// Creates a file object from a UTF-8 string.
    pub fn from_str(text: &str) -> Self {
        Self {
            filename: PathBuf::new(),
            encoding: Encoding::Utf8,
            content: text.to_owned(),
            metadata: None,
        }
    }

    /// Re-reads the file this object was opened from, producing a fresh
    /// object whose metadata can be compared with [`changed`](#method.changed).
    pub fn reopen(&self) -> Result<Self, ConfigError> {
        if self.filename.as_os_str().is_empty() {
            return Err(ConfigError::InvalidArgument("memory-backed file"));
        }
        Self::open(&self.filename)
    }

    /// The path this object was opened from; empty for memory buffers.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// The encoding detected at load time.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The transcoded UTF-8 contents.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Runs the access check against the file metadata.
    pub fn access_check(&self, check: &AccessCheck) -> Result<(), ConfigError> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or(ConfigError::InvalidArgument("memory-backed file"))?;
        check.check(metadata)
    }

    /// Compares identity with another file object: device, inode and
    /// modification time. Returns `true` when they differ.
    #[cfg(unix)]
    pub fn changed(&self, other: &IniFile) -> Result<bool, ConfigError> {
        use std::os::unix::fs::MetadataExt;

        let first = self
            .metadata
            .as_ref()
            .ok_or(ConfigError::InvalidArgument("memory-backed file"))?;
        let second = other
            .metadata
            .as_ref()
            .ok_or(ConfigError::InvalidArgument("memory-backed file"))?;

        Ok(first.dev() != second.dev()
            || first.ino() != second.ino()
            || first.mtime() != second.mtime())
    }

    #[cfg(not(unix))]
    pub fn changed(&self, _other: &IniFile) -> Result<bool, ConfigError> {
        Err(ConfigError::NotSupported)
    }

    /// Writes `text` to `path` re-encoded with the encoding recorded at
    /// load time, BOM included.
    pub fn save_as<P: AsRef<Path>>(&self, path: P, text: &str) -> Result<(), ConfigError> {
        let bytes = self.encoding.encode(text);
        let mut file = fs::File::create(path.as_ref())?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Yields successive lines with `\n`, `\r\n` and `\r` terminators
    /// stripped.
    pub(crate) fn lines(&self) -> LineIter<'_> {
        LineIter {
            rest: &self.content,
        }
    }
}

/// Line iterator over the transcoded buffer. Unlike `str::lines` it also
/// honors a lone `\r` terminator.
pub(crate) struct LineIter<'s> {
    rest: &'s str,
}

impl<'s> Iterator for LineIter<'s> {
    type Item = &'s str;

    fn next(&mut self) -> Option<&'s str> {
        if self.rest.is_empty() {
            return None;
        }

        let bytes = self.rest.as_bytes();
        let mut end = bytes.len();
        let mut next = bytes.len();

        for (idx, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                end = idx;
                next = idx + 1;
                break;
            }
            if b == b'\r' {
                end = idx;
                next = if bytes.get(idx + 1) == Some(&b'\n') {
                    idx + 2
                } else {
                    idx + 1
                };
                break;
            }
        }

        let line = &self.rest[..end];
        self.rest = &self.rest[next..];
        Some(line)
    }
}
