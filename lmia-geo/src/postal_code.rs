//! Canadian postal codes
//!
//! A postal code is six characters, letter-digit-letter (FSA) then
//! digit-letter-digit (LDU). The canonical key form has no space ("A1C6C9");
//! the display form puts one between the halves ("A1C 6C9").

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// First `A1A 1A1` / `A1A1A1` token in free text, either case
static POSTAL_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z][0-9][A-Za-z]) ?([0-9][A-Za-z][0-9])").expect("valid regex"));

/// Canonical (uppercase, no space) postal code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Normalize and validate a postal code given on its own
    ///
    /// Whitespace anywhere is dropped and letters are uppercased, so
    /// `"a1c 6c9"`, `"A1C6C9"` and `" A1C  6C9 "` all yield `A1C6C9`.
    pub fn parse(raw: &str) -> Option<Self> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if is_canonical(&compact) {
            Some(Self(compact))
        } else {
            None
        }
    }

    /// Canonical key form, e.g. `A1C6C9`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Forward Sortation Area, e.g. `A1C`
    pub fn fsa(&self) -> &str {
        &self.0[..3]
    }

    /// Local Delivery Unit, e.g. `6C9`
    pub fn ldu(&self) -> &str {
        &self.0[3..]
    }

    /// Display form, e.g. `A1C 6C9`
    pub fn display_form(&self) -> String {
        format!("{} {}", self.fsa(), self.ldu())
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PostalCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PostalCode::parse(&value).ok_or_else(|| format!("invalid postal code: {:?}", value))
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.0
    }
}

fn is_canonical(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 6
        && b[0].is_ascii_uppercase()
        && b[1].is_ascii_digit()
        && b[2].is_ascii_uppercase()
        && b[3].is_ascii_digit()
        && b[4].is_ascii_uppercase()
        && b[5].is_ascii_digit()
}

/// Extract the first postal code from a free-text address
///
/// Returns `None` when the address has no `A1A 1A1` / `A1A1A1` token; that is
/// the normal "no postal code for this record" outcome, not an error. The
/// token is not checked against real FSAs, so an incidental match in a
/// unit number or product code is accepted.
pub fn extract(address: &str) -> Option<PostalCode> {
    let caps = POSTAL_CODE_RE.captures(address)?;
    let code = format!("{}{}", &caps[1], &caps[2]).to_ascii_uppercase();
    Some(PostalCode(code))
}
