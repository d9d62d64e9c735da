//! Index exclusion rules.
//!
//! Rules are regular expressions with search semantics: a rule matches when
//! it matches anywhere in the index name, so anchors must be spelled out
//! (`^\.` for hidden/system indices).

use anyhow::{Context, Result};
use regex::Regex;

/// Ordered set of exclusion rules. An index matching any rule is skipped.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    rules: Vec<Regex>,
}

impl ExclusionFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let rules = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p).with_context(|| format!("invalid exclusion pattern: '{}'", p))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_excluded(&self, index_name: &str) -> bool {
        self.rules.iter().any(|rx| rx.is_match(index_name))
    }
}
