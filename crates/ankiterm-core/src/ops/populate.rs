//! Field population through a populator.

use std::time::Duration;

use log::info;

use super::{ChangeKind, Operation, OperationReport};
use crate::error::{AnkiError, Result};
use crate::model::Collection;
use crate::populators::{
    run_batch, run_blocking, BatchSettings, CancelFlag, NoteInput, NoteOutcome, Populator,
};

/// Run a populator over every note of a model.
///
/// Unlike structural operations this commits partial results: notes the
/// populator fails on are reported and left as they were, and the rest
/// are written. Drives its own single-threaded runtime, so it must not be
/// executed from inside an async context.
pub struct PopulateFields {
    pub model: String,
    populator: Box<dyn Populator>,
    pub settings: BatchSettings,
    pub cancel: CancelFlag,
    /// Trip `cancel` on Ctrl-C while the batch runs
    pub listen_for_interrupt: bool,
}

impl PopulateFields {
    pub fn new(model: impl Into<String>, populator: Box<dyn Populator>) -> Self {
        let settings = BatchSettings::for_populator(populator.as_ref(), Duration::from_secs(30));
        Self {
            model: model.into(),
            populator,
            settings,
            cancel: CancelFlag::new(),
            listen_for_interrupt: false,
        }
    }

    pub fn with_settings(mut self, settings: BatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn populator(&self) -> &dyn Populator {
        self.populator.as_ref()
    }
}

impl Operation for PopulateFields {
    fn name(&self) -> &'static str {
        "populate-fields"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        let model = collection.lookup_model(&self.model)?;
        self.populator.validate(model)?;
        if collection.notes_of(model.id).next().is_none() {
            return Err(AnkiError::Validation(format!(
                "model '{}' has no notes",
                model.name
            )));
        }
        Ok(())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let model = collection.lookup_model(&self.model)?;
        let (model_id, model_name) = (model.id, model.name.clone());
        let inputs: Vec<NoteInput> = collection
            .notes_of(model_id)
            .map(|note| NoteInput::from_note(model, note))
            .collect();
        let total = inputs.len();

        let outcomes = run_blocking(
            run_batch(self.populator.as_ref(), inputs, &self.settings, &self.cancel),
            &self.cancel,
            self.listen_for_interrupt,
        )?;

        let model = collection.model(model_id)?;
        let positions: Vec<(String, usize)> = self
            .populator
            .target_fields()
            .into_iter()
            .filter_map(|name| model.field_index(&name).map(|i| (name, i)))
            .collect();

        let mut report = OperationReport::new(self.name());
        let mut updated = 0;
        for (note_id, outcome) in outcomes {
            match outcome {
                NoteOutcome::Updated(updates) => {
                    if let Some(note) = collection.notes.get_mut(&note_id) {
                        for (name, position) in &positions {
                            if let Some(value) = updates.get(name) {
                                note.fields[*position] = value.clone();
                            }
                        }
                    }
                    collection.touch_note(note_id);
                    report.record(ChangeKind::Modified, format!("/notes/{}", note_id));
                    updated += 1;
                }
                NoteOutcome::Unchanged => {}
                NoteOutcome::Failed(reason) => report.fail(note_id, reason),
                NoteOutcome::Skipped => report.skipped.push(note_id),
            }
        }
        info!(
            "{} on {}: {} updated, {} failed, {} skipped",
            self.populator.name(),
            model_name,
            updated,
            report.failures.len(),
            report.skipped.len()
        );

        let mut message = format!(
            "{}: updated {} of {} note(s) in model '{}'",
            self.populator.name(),
            updated,
            total,
            model_name
        );
        if !report.failures.is_empty() {
            message.push_str(&format!(", {} failed", report.failures.len()));
        }
        if !report.skipped.is_empty() {
            message.push_str(&format!(", {} skipped after cancel", report.skipped.len()));
        }
        Ok(report.with_message(message))
    }
}
