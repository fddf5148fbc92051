//! Per-occurrence exceptions: cancel or move a single instance of a series.
//!
//! An [`OverrideSet`] belongs to one event and is keyed by the start the
//! generator produced for the affected occurrence. Overrides are applied after
//! generation, so the generator itself stays a pure function of the pattern.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{RecurrenceError, Result};
use crate::event::{intervals_overlap, Occurrence};
use crate::generator::OccurrenceGenerator;

/// What happens to one occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OccurrenceOverride {
    Cancelled,
    Rescheduled {
        start: NaiveDateTime,
        end: NaiveDateTime,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OverrideEntry {
    original_start: NaiveDateTime,
    #[serde(flatten)]
    action: OccurrenceOverride,
}

/// Sparse map from original occurrence start to its override.
///
/// Serializes as a list of `{ "original_start": ..., "kind": ... }` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<OverrideEntry>", into = "Vec<OverrideEntry>")]
pub struct OverrideSet {
    entries: BTreeMap<NaiveDateTime, OccurrenceOverride>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, original_start: NaiveDateTime) -> Option<&OccurrenceOverride> {
        self.entries.get(&original_start)
    }

    /// Drop the occurrence originally starting at `original_start`.
    pub fn cancel(&mut self, original_start: NaiveDateTime) {
        self.entries
            .insert(original_start, OccurrenceOverride::Cancelled);
    }

    /// Move the occurrence originally starting at `original_start`.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidEvent`] if `end < start`.
    pub fn reschedule(
        &mut self,
        original_start: NaiveDateTime,
        start: NaiveDateTime,
        end: NaiveDateTime,
        title: Option<String>,
    ) -> Result<()> {
        self.insert(
            original_start,
            OccurrenceOverride::Rescheduled { start, end, title },
        )
    }

    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidEvent`] for a reschedule ending
    /// before it starts.
    pub fn insert(
        &mut self,
        original_start: NaiveDateTime,
        action: OccurrenceOverride,
    ) -> Result<()> {
        if let OccurrenceOverride::Rescheduled { start, end, .. } = &action {
            if end < start {
                return Err(RecurrenceError::InvalidEvent(format!(
                    "override for {original_start} ends ({end}) before it starts ({start})"
                )));
            }
        }
        self.entries.insert(original_start, action);
        Ok(())
    }

    /// Rewrite a window's generated occurrences.
    ///
    /// Cancelled occurrences are dropped. Rescheduled ones are moved and kept
    /// only if they still overlap the window. Rescheduled occurrences whose
    /// original slot lies outside the window are pulled in when their new
    /// interval overlaps it, provided the original start really is a member
    /// of the series; overrides keyed by anything else are ignored.
    pub(crate) fn apply(
        &self,
        generator: &OccurrenceGenerator,
        generated: Vec<Occurrence>,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    ) -> Vec<Occurrence> {
        if self.is_empty() {
            return generated;
        }

        let seen: HashSet<NaiveDateTime> = generated.iter().map(|o| o.start).collect();
        let mut result = Vec::with_capacity(generated.len());

        for occurrence in generated {
            match self.entries.get(&occurrence.start) {
                None => result.push(occurrence),
                Some(OccurrenceOverride::Cancelled) => {
                    tracing::trace!(start = %occurrence.start, "Dropping cancelled occurrence");
                }
                Some(OccurrenceOverride::Rescheduled { start, end, title }) => {
                    let moved = reschedule(occurrence, *start, *end, title.clone());
                    if moved.overlaps(window_start, window_end) {
                        result.push(moved);
                    }
                }
            }
        }

        for (original_start, action) in &self.entries {
            let OccurrenceOverride::Rescheduled { start, end, title } = action else {
                continue;
            };
            if seen.contains(original_start)
                || !intervals_overlap(*start, *end, window_start, window_end)
            {
                continue;
            }
            match generator.occurrence_at_start(*original_start) {
                Some(occurrence) => {
                    result.push(reschedule(occurrence, *start, *end, title.clone()));
                }
                None => {
                    tracing::debug!(
                        original_start = %original_start,
                        "Ignoring override for a start outside the series"
                    );
                }
            }
        }

        result
    }
}

fn reschedule(
    mut occurrence: Occurrence,
    start: NaiveDateTime,
    end: NaiveDateTime,
    title: Option<String>,
) -> Occurrence {
    occurrence.rescheduled_from = Some(occurrence.start);
    occurrence.start = start;
    occurrence.end = end;
    occurrence.title_override = title;
    occurrence
}

impl TryFrom<Vec<OverrideEntry>> for OverrideSet {
    type Error = RecurrenceError;

    fn try_from(entries: Vec<OverrideEntry>) -> Result<Self> {
        let mut set = OverrideSet::new();
        for entry in entries {
            set.insert(entry.original_start, entry.action)?;
        }
        Ok(set)
    }
}

impl From<OverrideSet> for Vec<OverrideEntry> {
    fn from(set: OverrideSet) -> Self {
        set.entries
            .into_iter()
            .map(|(original_start, action)| OverrideEntry {
                original_start,
                action,
            })
            .collect()
    }
}
