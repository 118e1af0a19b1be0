use super::procedure::VerificationProcedure;
use crate::shared::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Maximum length for control identifiers (security limit)
const MAX_CONTROL_ID_LENGTH: usize = 64;

/// NewType wrapper for a control identifier (e.g. "V-67767")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(String);

impl ControlId {
    pub fn new(id: String) -> Result<Self> {
        let id = id.trim().to_string();
        if id.is_empty() {
            anyhow::bail!("Control id cannot be empty");
        }

        if id.len() > MAX_CONTROL_ID_LENGTH {
            anyhow::bail!(
                "Control id is too long ({} bytes). Maximum allowed: {} bytes",
                id.len(),
                MAX_CONTROL_ID_LENGTH
            );
        }

        // Ids end up in file names and report anchors
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            anyhow::bail!(
                "Control id '{}' contains invalid characters. Only ASCII alphanumerics, hyphens, underscores and dots are allowed.",
                id
            );
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Control severity on the closed range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Impact(f64);

impl Impact {
    pub fn new(value: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("impact {} is outside the range 0.0..=1.0", value);
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn category(&self) -> SeverityCategory {
        SeverityCategory::from_impact(self.0)
    }
}

/// DISA severity category derived from the impact score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityCategory {
    Informational,
    CatIII,
    CatII,
    CatI,
}

impl SeverityCategory {
    pub fn from_impact(impact: f64) -> Self {
        if impact >= 0.7 {
            SeverityCategory::CatI
        } else if impact >= 0.4 {
            SeverityCategory::CatII
        } else if impact > 0.0 {
            SeverityCategory::CatIII
        } else {
            SeverityCategory::Informational
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityCategory::CatI => "CAT I",
            SeverityCategory::CatII => "CAT II",
            SeverityCategory::CatIII => "CAT III",
            SeverityCategory::Informational => "INFO",
        }
    }
}

impl fmt::Display for SeverityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Taxonomy name to identifiers, e.g. `nist -> {AU-12 b}`, `cci -> {CCI-000171}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References(BTreeMap<String, BTreeSet<String>>);

impl References {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, taxonomy: &str, identifier: &str) {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return;
        }
        self.0
            .entry(taxonomy.trim().to_lowercase())
            .or_default()
            .insert(identifier.to_string());
    }

    pub fn get(&self, taxonomy: &str) -> Option<&BTreeSet<String>> {
        self.0.get(&taxonomy.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Narrative fields of a control. Opaque to evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub title: String,
    pub description: String,
    pub check_text: String,
    pub fix_text: String,
}

/// One compliance rule: identity, narrative, severity and how to verify it
#[derive(Debug, Clone, PartialEq)]
pub struct ControlDefinition {
    id: ControlId,
    narrative: Narrative,
    impact: Impact,
    references: References,
    procedure: VerificationProcedure,
    follow_up: Option<String>,
}

impl ControlDefinition {
    pub fn new(
        id: ControlId,
        narrative: Narrative,
        impact: Impact,
        references: References,
        procedure: VerificationProcedure,
    ) -> Self {
        Self {
            id,
            narrative,
            impact,
            references,
            procedure,
            follow_up: None,
        }
    }

    /// Attaches the note a reviewer must act on even after an automated verdict
    pub fn with_follow_up(mut self, follow_up: Option<String>) -> Self {
        self.follow_up = follow_up.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn id(&self) -> &ControlId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.narrative.title
    }

    pub fn narrative(&self) -> &Narrative {
        &self.narrative
    }

    pub fn impact(&self) -> Impact {
        self.impact
    }

    pub fn references(&self) -> &References {
        &self.references
    }

    pub fn procedure(&self) -> &VerificationProcedure {
        &self.procedure
    }

    pub fn follow_up(&self) -> Option<&str> {
        self.follow_up.as_deref()
    }

    /// False exactly when the control can only be reviewed by a human
    pub fn is_automatable(&self) -> bool {
        self.procedure.is_automated()
    }
}

/// Ordered set of controls with unique ids, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlSet {
    controls: Vec<ControlDefinition>,
}

impl ControlSet {
    /// Builds a set, rejecting duplicate ids
    pub fn new(controls: Vec<ControlDefinition>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for control in &controls {
            if !seen.insert(control.id().clone()) {
                anyhow::bail!("duplicate control id '{}'", control.id());
            }
        }
        Ok(Self { controls })
    }

    pub fn controls(&self) -> &[ControlDefinition] {
        &self.controls
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn ids(&self) -> Vec<ControlId> {
        self.controls.iter().map(|c| c.id().clone()).collect()
    }

    pub fn any_automatable(&self) -> bool {
        self.controls.iter().any(|c| c.is_automatable())
    }

    /// Keeps only the controls for which `keep` returns true, preserving order
    pub fn retain(self, mut keep: impl FnMut(&ControlDefinition) -> bool) -> Self {
        Self {
            controls: self.controls.into_iter().filter(|c| keep(c)).collect(),
        }
    }
}
