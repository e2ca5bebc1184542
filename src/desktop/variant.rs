// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! GVariant string array text format.
//!
//! `dconf read` prints string arrays in GVariant text format, e.g.
//! `['a@b.org', 'c@d.org']`, or `@as []` for an empty array. Only the subset
//! needed for string arrays is handled here.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// GVariant array of strings (`as`).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StringArray(Vec<String>);

impl StringArray {
    pub fn new(items: Vec<String>) -> Self {
        Self(items)
    }

    pub fn contains(&self, item: &str) -> bool {
        self.0.iter().any(|entry| entry == item)
    }

    /// Append item unless already present.
    ///
    /// Returns whether the array changed.
    pub fn insert(&mut self, item: impl Into<String>) -> bool {
        let item = item.into();
        if self.contains(&item) {
            return false;
        }

        self.0.push(item);
        true
    }

    pub fn items(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for StringArray {
    type Err = VariantError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let data = data.trim();

        // INVARIANT: Unset dconf keys print nothing at all.
        if data.is_empty() {
            return Ok(Self::default());
        }

        let data = data.strip_prefix("@as").map(str::trim_start).unwrap_or(data);
        let inner = data
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| VariantError::NotAnArray(data.into()))?;

        let mut items = Vec::new();
        let mut chars = inner.chars().peekable();
        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            let Some(quote) = chars.next() else {
                break;
            };
            if quote != '\'' && quote != '"' {
                return Err(VariantError::Unexpected(quote));
            }

            let mut item = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped) => item.push(escaped),
                        None => return Err(VariantError::Unterminated),
                    },
                    c if c == quote => {
                        closed = true;
                        break;
                    }
                    c => item.push(c),
                }
            }
            if !closed {
                return Err(VariantError::Unterminated);
            }
            items.push(item);

            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.next() {
                Some(',') => continue,
                Some(c) => return Err(VariantError::Unexpected(c)),
                None => break,
            }
        }

        Ok(Self(items))
    }
}

impl Display for StringArray {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.0.is_empty() {
            return fmt.write_str("@as []");
        }

        let items = self
            .0
            .iter()
            .map(|item| format!("'{}'", item.replace('\\', r"\\").replace('\'', r"\'")))
            .collect::<Vec<_>>();
        write!(fmt, "[{}]", items.join(", "))
    }
}

/// GVariant parsing error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariantError {
    #[error("expected GVariant string array, got {0:?}")]
    NotAnArray(String),

    #[error("unexpected character {0:?} in GVariant string array")]
    Unexpected(char),

    #[error("unterminated string in GVariant string array")]
    Unterminated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("", vec![]; "unset key")]
    #[test_case("@as []", vec![]; "typed empty array")]
    #[test_case("[]", vec![]; "empty array")]
    #[test_case("['dash-to-dock@micxgx.gmail.com']", vec!["dash-to-dock@micxgx.gmail.com"]; "single item")]
    #[test_case("['a@b', \"c@d\"]\n", vec!["a@b", "c@d"]; "mixed quotes")]
    #[test_case(r"['it\'s']", vec!["it's"]; "escaped quote")]
    #[test]
    fn parse_string_array(data: &str, expect: Vec<&str>) {
        let result: StringArray = data.parse().unwrap();
        pretty_assertions::assert_eq!(result.items(), expect.as_slice());
    }

    #[test_case("'a'"; "missing brackets")]
    #[test_case("['a'"; "missing closing bracket")]
    #[test_case("['a' 'b']"; "missing comma")]
    #[test_case("['a]"; "unterminated string")]
    #[test]
    fn reject_malformed_array(data: &str) {
        assert!(data.parse::<StringArray>().is_err());
    }

    #[test]
    fn insert_keeps_items_unique() {
        let mut array: StringArray = "['a@b']".parse().unwrap();
        assert!(!array.insert("a@b"));
        assert!(array.insert("it's@c"));
        pretty_assertions::assert_eq!(array.to_string(), r"['a@b', 'it\'s@c']");
        pretty_assertions::assert_eq!(StringArray::default().to_string(), "@as []");
    }
}
