use crate::compliance::domain::ControlSet;
use crate::shared::Result;

/// Maximum number of include plus exclude patterns
const MAX_PATTERNS: usize = 128;

/// Maximum length of a single pattern
const MAX_PATTERN_LENGTH: usize = 64;

/// Result of narrowing a control set
#[derive(Debug)]
pub struct FilterOutcome {
    pub controls: ControlSet,
    /// Patterns that selected or excluded nothing, in the order given
    pub unmatched_patterns: Vec<String>,
}

/// ControlFilter narrows a control set by id patterns
///
/// `*` matches any run of characters and `?` a single one. Patterns are
/// anchored at both ends and case-sensitive, so `V-677*` selects `V-67757`
/// but not `XV-67757`. With no include patterns every control is included;
/// an exclude always wins over an include.
#[derive(Debug, Default)]
pub struct ControlFilter {
    include: Vec<IdPattern>,
    exclude: Vec<IdPattern>,
}

impl ControlFilter {
    /// # Errors
    /// Too many patterns, or a pattern that is empty, too long or contains
    /// characters a control id never has
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Result<Self> {
        if include.len() + exclude.len() > MAX_PATTERNS {
            anyhow::bail!(
                "Too many control filter patterns: {} (maximum: {})",
                include.len() + exclude.len(),
                MAX_PATTERNS
            );
        }

        Ok(Self {
            include: include.into_iter().map(IdPattern::new).collect::<Result<_>>()?,
            exclude: exclude.into_iter().map(IdPattern::new).collect::<Result<_>>()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Applies the filter, preserving the order of the remaining controls
    ///
    /// # Errors
    /// Returns an error when the patterns leave no control to run
    pub fn apply(&self, controls: ControlSet) -> Result<FilterOutcome> {
        let mut include_hits = vec![false; self.include.len()];
        let mut exclude_hits = vec![false; self.exclude.len()];
        let before = controls.len();

        let kept = controls.retain(|control| {
            let id = control.id().as_str();
            let included = self.include.is_empty()
                || mark_matches(&self.include, &mut include_hits, id);
            let excluded = mark_matches(&self.exclude, &mut exclude_hits, id);
            included && !excluded
        });

        if before > 0 && kept.is_empty() {
            anyhow::bail!(
                "The include/exclude patterns removed all {} controls; nothing would be evaluated",
                before
            );
        }

        let unmatched_patterns = self
            .include
            .iter()
            .zip(&include_hits)
            .chain(self.exclude.iter().zip(&exclude_hits))
            .filter(|(_, hit)| !**hit)
            .map(|(pattern, _)| pattern.original.clone())
            .collect();

        Ok(FilterOutcome {
            controls: kept,
            unmatched_patterns,
        })
    }
}

/// Evaluates every pattern so that each one's hit flag is accurate
fn mark_matches(patterns: &[IdPattern], hits: &mut [bool], id: &str) -> bool {
    let mut any = false;
    for (pattern, hit) in patterns.iter().zip(hits.iter_mut()) {
        if pattern.matches(id) {
            *hit = true;
            any = true;
        }
    }
    any
}

#[derive(Debug)]
struct IdPattern {
    original: String,
    chars: Vec<char>,
}

impl IdPattern {
    fn new(pattern: String) -> Result<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            anyhow::bail!("Control filter pattern cannot be empty");
        }
        if trimmed.len() > MAX_PATTERN_LENGTH {
            anyhow::bail!(
                "Control filter pattern is too long: {} characters (maximum: {})",
                trimmed.len(),
                MAX_PATTERN_LENGTH
            );
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '*' | '?')))
        {
            anyhow::bail!(
                "Control filter pattern '{}' contains invalid character '{}'",
                trimmed,
                bad
            );
        }

        Ok(Self {
            chars: trimmed.chars().collect(),
            original: trimmed.to_string(),
        })
    }

    /// Anchored wildcard match with single-star backtracking
    fn matches(&self, id: &str) -> bool {
        let text: Vec<char> = id.chars().collect();
        let (mut p, mut t) = (0usize, 0usize);
        let mut star: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.chars.get(p) {
                Some('*') => {
                    star = Some((p, t));
                    p += 1;
                }
                Some(&c) if c == '?' || c == text[t] => {
                    p += 1;
                    t += 1;
                }
                _ => match star {
                    Some((sp, st)) => {
                        p = sp + 1;
                        t = st + 1;
                        star = Some((sp, st + 1));
                    }
                    None => return false,
                },
            }
        }

        self.chars[p..].iter().all(|c| *c == '*')
    }
}
