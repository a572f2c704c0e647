//! Tradable pair identifiers.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-native identifier of a tradable pair (e.g. "PORT3-USD", "BTCUSDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(CompactString);

impl Symbol {
    pub fn new(symbol: &str) -> Self {
        Self(CompactString::new(symbol.trim()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Base asset for display, with the quote suffix removed.
    ///
    /// Dash-separated products ("PORT3-USD") split on the dash; concatenated
    /// symbols ("BTCUSDT") drop a trailing `quote`. Anything else is returned
    /// unchanged.
    pub fn base<'a>(&'a self, quote: &str) -> &'a str {
        let s = self.as_str();
        if let Some((base, _)) = s.split_once('-') {
            return base;
        }
        if !quote.is_empty() && s.len() > quote.len() {
            let (head, tail) = s.split_at(s.len() - quote.len());
            if tail.eq_ignore_ascii_case(quote) {
                return head;
            }
        }
        s
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Parse a comma-separated symbol list, skipping blanks.
pub fn parse_symbol_list(raw: &str) -> Vec<Symbol> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Symbol::new(&s.to_uppercase()))
        .collect()
}
