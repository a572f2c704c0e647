//! Which symbols a single scan covers.

use pumpwatch_core::Symbol;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Subset of the cached symbol list scanned per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanScope {
    /// Every symbol, every scan.
    #[default]
    All,
    /// A moving window of `per_scan` symbols; the whole list is covered
    /// every `ceil(len / per_scan)` scans.
    Rotating { per_scan: usize },
    /// `per_scan` symbols drawn at random each scan.
    Sampled { per_scan: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid scan scope '{0}' (expected 'all', 'rotating:N' or 'sampled:N' with N > 0)")]
pub struct InvalidScope(pub String);

impl FromStr for ScanScope {
    type Err = InvalidScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        if raw == "all" {
            return Ok(ScanScope::All);
        }
        let (mode, count) = raw.split_once(':').ok_or_else(|| InvalidScope(s.to_string()))?;
        let per_scan = count
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| InvalidScope(s.to_string()))?;
        match mode.trim() {
            "rotating" | "rotate" => Ok(ScanScope::Rotating { per_scan }),
            "sampled" | "sample" | "random" => Ok(ScanScope::Sampled { per_scan }),
            _ => Err(InvalidScope(s.to_string())),
        }
    }
}

impl fmt::Display for ScanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanScope::All => f.write_str("all"),
            ScanScope::Rotating { per_scan } => write!(f, "rotating:{}", per_scan),
            ScanScope::Sampled { per_scan } => write!(f, "sampled:{}", per_scan),
        }
    }
}

impl ScanScope {
    /// Pick this scan's symbols. `cursor` carries the rotation offset between scans.
    pub fn select(&self, symbols: &[Symbol], cursor: &mut usize) -> Vec<Symbol> {
        self.select_with(symbols, cursor, &mut rand::thread_rng())
    }

    pub fn select_with<R: Rng + ?Sized>(
        &self,
        symbols: &[Symbol],
        cursor: &mut usize,
        rng: &mut R,
    ) -> Vec<Symbol> {
        match *self {
            ScanScope::All => symbols.to_vec(),
            ScanScope::Rotating { per_scan } if per_scan >= symbols.len() => symbols.to_vec(),
            ScanScope::Rotating { per_scan } => {
                let start = *cursor % symbols.len();
                *cursor = (start + per_scan) % symbols.len();
                symbols.iter().cycle().skip(start).take(per_scan).cloned().collect()
            }
            ScanScope::Sampled { per_scan } => {
                let mut picked: Vec<Symbol> =
                    symbols.choose_multiple(rng, per_scan).cloned().collect();
                picked.sort();
                picked
            }
        }
    }
}
