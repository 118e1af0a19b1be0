use super::control::ControlId;
use super::outcome::{Outcome, Status};
use crate::shared::Result;
use std::collections::BTreeMap;

/// RunMetadata value object describing one audit run
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    run_id: String,
    tool_name: String,
    tool_version: String,
    target: String,
    started_at: String,
}

impl RunMetadata {
    pub fn new(
        run_id: String,
        tool_name: String,
        tool_version: String,
        target: String,
        started_at: String,
    ) -> Self {
        Self {
            run_id,
            tool_name,
            tool_version,
            target,
            started_at,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn started_at(&self) -> &str {
        &self.started_at
    }
}

/// Per-control lifecycle inside a run: `pending -> running -> terminal`
#[derive(Debug, Clone, PartialEq)]
enum ControlState {
    Pending,
    Running,
    Done(Outcome),
}

/// One finalized report line
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub id: ControlId,
    pub outcome: Outcome,
}

/// Mutable report under construction; the only way to obtain a `RunReport`
#[derive(Debug)]
pub struct RunReportBuilder {
    metadata: RunMetadata,
    slots: Vec<(ControlId, ControlState)>,
}

impl RunReportBuilder {
    /// Creates a builder with every control pending, in run order
    pub fn new(metadata: RunMetadata, ids: Vec<ControlId>) -> Self {
        Self {
            metadata,
            slots: ids.into_iter().map(|id| (id, ControlState::Pending)).collect(),
        }
    }

    /// Marks control `index` as running
    ///
    /// # Errors
    /// Returns an error if the index is unknown or the control already left `pending`
    pub fn start(&mut self, index: usize) -> Result<()> {
        let (id, state) = self.slot(index)?;
        match state {
            ControlState::Pending => {
                *state = ControlState::Running;
                Ok(())
            }
            _ => anyhow::bail!("control '{}' was already started", id),
        }
    }

    /// Records the terminal outcome of a running control
    ///
    /// # Errors
    /// Returns an error if the control is not currently running
    pub fn record(&mut self, index: usize, outcome: Outcome) -> Result<()> {
        let (id, state) = self.slot(index)?;
        match state {
            ControlState::Running => {
                *state = ControlState::Done(outcome);
                Ok(())
            }
            ControlState::Pending => anyhow::bail!("control '{}' was never started", id),
            ControlState::Done(_) => anyhow::bail!("control '{}' already has a result", id),
        }
    }

    pub fn completed(&self) -> usize {
        self.slots
            .iter()
            .filter(|(_, state)| matches!(state, ControlState::Done(_)))
            .count()
    }

    fn slot(&mut self, index: usize) -> Result<(&ControlId, &mut ControlState)> {
        let total = self.slots.len();
        let (id, state) = self
            .slots
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("control index {} out of range ({})", index, total))?;
        Ok((&*id, state))
    }

    /// Freezes the report. Controls that never reached a terminal state are
    /// recorded as `cancelled`.
    pub fn finalize(self, finished_at: String) -> RunReport {
        let entries = self
            .slots
            .into_iter()
            .map(|(id, state)| {
                let outcome = match state {
                    ControlState::Done(outcome) => outcome,
                    ControlState::Pending | ControlState::Running => Outcome::cancelled(),
                };
                ReportEntry { id, outcome }
            })
            .collect();

        RunReport {
            metadata: self.metadata,
            finished_at,
            entries,
        }
    }
}

/// Immutable outcome of a run, ordered like the input controls
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    metadata: RunMetadata,
    finished_at: String,
    entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn finished_at(&self) -> &str {
        &self.finished_at
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|entry| entry.id.as_str() == id)
            .map(|entry| &entry.outcome)
    }

    /// Number of entries per status; every status is present, possibly zero
    pub fn status_counts(&self) -> BTreeMap<Status, usize> {
        let mut counts: BTreeMap<Status, usize> = Status::ALL.iter().map(|s| (*s, 0)).collect();
        for entry in &self.entries {
            *counts.entry(entry.outcome.status()).or_insert(0) += 1;
        }
        counts
    }

    /// True when any control failed or could not be evaluated
    pub fn has_blocking_results(&self) -> bool {
        self.entries.iter().any(|e| e.outcome.status().is_blocking())
    }

    pub fn was_cancelled(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.outcome.status() == Status::Cancelled)
    }
}
