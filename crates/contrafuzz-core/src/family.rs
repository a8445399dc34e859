//! Response-code families — predicates over 3-digit status-code strings.

use std::fmt;

/// A named or dynamic predicate over acceptable 3-digit status codes.
///
/// `matches` is total and side-effect-free: any string is either accepted
/// or rejected, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCodeFamily {
    /// Any 2xx code.
    TwoXx,
    /// Any 4xx code.
    FourXx,
    /// Any 4xx or 2xx code.
    FourXxTwoXx,
    /// Any 4xx code, or 300 Multiple Choices.
    FourXxMultipleChoice,
    /// An explicit list of exactly-3-character code strings from
    /// configuration. Entries may use `X` as a digit wildcard ("4XX").
    Dynamic(Vec<String>),
}

impl ResponseCodeFamily {
    /// Parse a comma-separated configuration value into a dynamic family.
    ///
    /// Entries that are not exactly 3 characters are dropped.
    #[must_use]
    pub fn from_codes(list: &str) -> Self {
        let codes = list
            .split(',')
            .map(str::trim)
            .filter(|c| c.len() == 3)
            .map(str::to_string)
            .collect();
        Self::Dynamic(codes)
    }

    #[must_use]
    pub fn matches(&self, code: &str) -> bool {
        if code.len() != 3 {
            return false;
        }
        match self {
            Self::TwoXx => code.starts_with('2'),
            Self::FourXx => code.starts_with('4'),
            Self::FourXxTwoXx => code.starts_with('4') || code.starts_with('2'),
            Self::FourXxMultipleChoice => code.starts_with('4') || code == "300",
            Self::Dynamic(codes) => codes.iter().any(|c| entry_matches(c, code)),
        }
    }

    /// Short label used in expected-result prose.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::TwoXx => "2XX".to_string(),
            Self::FourXx => "4XX".to_string(),
            Self::FourXxTwoXx => "4XX or 2XX".to_string(),
            Self::FourXxMultipleChoice => "4XX or 300".to_string(),
            Self::Dynamic(codes) => codes.join(", "),
        }
    }
}

impl fmt::Display for ResponseCodeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Match one dynamic entry against a code; `X`/`x` wildcards a digit.
fn entry_matches(entry: &str, code: &str) -> bool {
    entry.len() == code.len()
        && entry.chars().zip(code.chars()).all(|(e, c)| {
            e.eq_ignore_ascii_case(&'x') || e.eq_ignore_ascii_case(&c)
        })
}
