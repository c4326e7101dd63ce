use {
    crate::{ConvertError, ValueObj},
    std::borrow::Cow,
};

/// Typed accessors over the canonical value string.
///
/// All accessors are read-only and compute their result on demand.
/// Integer and float accessors take a `strict` flag: when set, any
/// character after the parsed number fails the conversion; otherwise
/// trailing junk is ignored, `strtol`-style.
impl ValueObj {
    /// Returns the canonical string, borrowed when the value sits on
    /// a single raw line and needs no joining.
    pub fn get_str(&self) -> Cow<'_, str> {
        let raw = self.raw_lines();
        if raw.len() == 1 {
            let trimmed = raw[0].trim();
            if trimmed.len() == raw[0].len() {
                return Cow::Borrowed(&raw[0]);
            }
            return Cow::Owned(trimmed.to_owned());
        }
        Cow::Owned(self.string())
    }

    /// Returns an owned copy of the canonical string.
    pub fn get_string(&self) -> String {
        self.string()
    }

    pub fn get_i32(&self, strict: bool) -> Result<i32, ConvertError> {
        let wide = self.get_integer(strict)?;
        i32::try_from(wide).map_err(|_| ConvertError::OutOfRange)
    }

    pub fn get_u32(&self, strict: bool) -> Result<u32, ConvertError> {
        let wide = self.get_integer(strict)?;
        u32::try_from(wide).map_err(|_| ConvertError::OutOfRange)
    }

    pub fn get_i64(&self, strict: bool) -> Result<i64, ConvertError> {
        let wide = self.get_integer(strict)?;
        i64::try_from(wide).map_err(|_| ConvertError::OutOfRange)
    }

    pub fn get_u64(&self, strict: bool) -> Result<u64, ConvertError> {
        let wide = self.get_integer(strict)?;
        u64::try_from(wide).map_err(|_| ConvertError::OutOfRange)
    }

    pub fn get_f64(&self, strict: bool) -> Result<f64, ConvertError> {
        let value = self.string();
        let s = value.trim();
        let prefix_len = float_prefix_len(s);
        if prefix_len == 0 {
            return Err(ConvertError::Conversion);
        }
        if strict && prefix_len != s.len() {
            return Err(ConvertError::Conversion);
        }

        s[..prefix_len]
            .parse::<f64>()
            .map_err(|_| ConvertError::Conversion)
    }

    /// Interprets the value as a boolean:
    /// `true` / `yes` / `1` and `false` / `no` / `0`, case-insensitive.
    pub fn get_bool(&self) -> Result<bool, ConvertError> {
        let value = self.string();
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(ConvertError::Conversion),
        }
    }

    /// Interprets the value as a binary blob: a single-quoted string of
    /// hex digit pairs, e.g. `'0a2BFeCc'`. Case does not matter.
    pub fn get_binary(&self) -> Result<Vec<u8>, ConvertError> {
        let value = self.string();
        let s = value.trim();

        let inner = s
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
            .ok_or(ConvertError::Conversion)?;

        if inner.len() % 2 != 0 {
            return Err(ConvertError::Conversion);
        }

        let digits = inner.as_bytes();
        let mut out = Vec::with_capacity(digits.len() / 2);
        for pair in digits.chunks_exact(2) {
            let hi = hex_digit(pair[0]).ok_or(ConvertError::Conversion)?;
            let lo = hex_digit(pair[1]).ok_or(ConvertError::Conversion)?;
            out.push(hi << 4 | lo);
        }

        Ok(out)
    }

    /// Splits the canonical string by the separator set (comma if `None`),
    /// trimming spaces around separators and dropping empty tokens.
    ///
    /// `"apple, ,banana, ,orange ,"` becomes `["apple", "banana", "orange"]`.
    pub fn get_string_array(&self, separators: Option<&str>) -> Vec<String> {
        self.split_tokens(separators)
            .filter(|token| !token.is_empty())
            .collect()
    }

    /// Splits the canonical string by the separator set (comma if `None`),
    /// trimming spaces around separators but retaining empty tokens.
    ///
    /// `"apple, ,banana, ,orange ,"` becomes
    /// `["apple", "", "banana", "", "orange", ""]`.
    pub fn get_raw_string_array(&self, separators: Option<&str>) -> Vec<String> {
        self.split_tokens(separators).collect()
    }

    /// Converts every token of the value to an `i64`.
    pub fn get_i64_array(&self, separators: Option<&str>) -> Result<Vec<i64>, ConvertError> {
        self.get_string_array(separators)
            .iter()
            .map(|token| {
                let wide = parse_integer(token)?;
                i64::try_from(wide).map_err(|_| ConvertError::OutOfRange)
            })
            .collect()
    }

    /// Converts every token of the value to an `f64`.
    pub fn get_f64_array(&self, separators: Option<&str>) -> Result<Vec<f64>, ConvertError> {
        self.get_string_array(separators)
            .iter()
            .map(|token| token.parse::<f64>().map_err(|_| ConvertError::Conversion))
            .collect()
    }

    fn split_tokens<'s>(
        &'s self,
        separators: Option<&'s str>,
    ) -> impl Iterator<Item = String> + 's {
        let separators = separators.unwrap_or(",");
        let value = self.string();

        value
            .split(move |c: char| separators.contains(c))
            .map(|token| token.trim().to_owned())
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn get_integer(&self, strict: bool) -> Result<i128, ConvertError> {
        let value = self.string();
        let s = value.trim();
        let (parsed, consumed) = parse_integer_prefix(s)?;
        if strict && consumed != s.len() {
            return Err(ConvertError::Conversion);
        }
        Ok(parsed)
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parses a leading optionally-signed decimal integer, returning the value
/// and the number of bytes consumed. No digits at all is a conversion error;
/// overflow of the 128-bit accumulator is a range error.
fn parse_integer_prefix(s: &str) -> Result<(i128, usize), ConvertError> {
    let bytes = s.as_bytes();
    let mut idx = 0;
    let mut negative = false;

    match bytes.first() {
        Some(b'-') => {
            negative = true;
            idx = 1;
        }
        Some(b'+') => idx = 1,
        _ => {}
    }

    let digits_start = idx;
    let mut acc: i128 = 0;
    while let Some(&b) = bytes.get(idx) {
        if !b.is_ascii_digit() {
            break;
        }
        acc = acc
            .checked_mul(10)
            .and_then(|acc| acc.checked_add((b - b'0') as i128))
            .ok_or(ConvertError::OutOfRange)?;
        idx += 1;
    }

    if idx == digits_start {
        return Err(ConvertError::Conversion);
    }

    Ok((if negative { -acc } else { acc }, idx))
}

fn parse_integer(s: &str) -> Result<i128, ConvertError> {
    let (parsed, consumed) = parse_integer_prefix(s)?;
    if consumed != s.len() {
        return Err(ConvertError::Conversion);
    }
    Ok(parsed)
}

/// Length of the longest prefix of `s` that parses as a float:
/// optional sign, digits with an optional fraction, optional exponent.
fn float_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut idx = 0;

    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        idx = 1;
    }

    let int_start = idx;
    while bytes.get(idx).is_some_and(|b| b.is_ascii_digit()) {
        idx += 1;
    }
    let int_len = idx - int_start;

    let mut frac_len = 0;
    if bytes.get(idx) == Some(&b'.') {
        let frac_start = idx + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(|b| b.is_ascii_digit()) {
            frac_end += 1;
        }
        frac_len = frac_end - frac_start;
        if int_len > 0 || frac_len > 0 {
            idx = frac_end;
        }
    }

    if int_len == 0 && frac_len == 0 {
        return 0;
    }

    // Optional exponent.
    if matches!(bytes.get(idx), Some(b'e') | Some(b'E')) {
        let mut exp_idx = idx + 1;
        if matches!(bytes.get(exp_idx), Some(b'-') | Some(b'+')) {
            exp_idx += 1;
        }
        let exp_digits_start = exp_idx;
        while bytes.get(exp_idx).is_some_and(|b| b.is_ascii_digit()) {
            exp_idx += 1;
        }
        if exp_idx > exp_digits_start {
            idx = exp_idx;
        }
    }

    idx
}
