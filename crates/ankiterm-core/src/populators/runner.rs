//! Drives a populator over many notes with bounded concurrency.

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use tokio::runtime::Builder;
use tokio::time::timeout;

use super::{CancelFlag, FieldUpdates, NoteInput, Populator};
use crate::error::{AnkiError, Result};
use crate::model::NoteId;

/// Limits applied to one populate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout: Duration::from_secs(60),
        }
    }
}

impl BatchSettings {
    /// Settings for `populator`: its own concurrency and timeout, where it declares them.
    pub fn for_populator(populator: &dyn Populator, default_timeout: Duration) -> Self {
        Self {
            concurrency: populator.concurrency().max(1),
            timeout: populator.timeout().unwrap_or(default_timeout),
        }
    }
}

/// What happened to one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteOutcome {
    Updated(FieldUpdates),
    Unchanged,
    Failed(String),
    /// Not started because the run was cancelled.
    Skipped,
}

/// Populate every input, returning outcomes in input order.
///
/// Per-note failures and timeouts are recorded as [`NoteOutcome::Failed`];
/// any other error stops the run and is returned.
pub async fn run_batch(
    populator: &dyn Populator,
    inputs: Vec<NoteInput>,
    settings: &BatchSettings,
    cancel: &CancelFlag,
) -> Result<Vec<(NoteId, NoteOutcome)>> {
    let total = inputs.len();
    let limit = settings.timeout;
    debug!(
        "Running {} over {} notes ({} at a time, {:?} timeout)",
        populator.name(),
        total,
        settings.concurrency,
        limit
    );

    let mut results = stream::iter(inputs)
        .map(|input| async move {
            if cancel.is_cancelled() {
                return (input.note_id, Ok(NoteOutcome::Skipped));
            }
            let outcome = match timeout(limit, populator.populate(&input)).await {
                Ok(Ok(updates)) if updates.is_empty() => Ok(NoteOutcome::Unchanged),
                Ok(Ok(updates)) => Ok(NoteOutcome::Updated(updates)),
                Ok(Err(e)) if e.is_per_note() => {
                    warn!("Note {}: {}", input.note_id, e);
                    Ok(NoteOutcome::Failed(e.to_string()))
                }
                Ok(Err(e)) => Err(e),
                Err(_) => {
                    let e = AnkiError::ExternalService(format!("timed out after {:?}", limit));
                    warn!("Note {}: {}", input.note_id, e);
                    Ok(NoteOutcome::Failed(e.to_string()))
                }
            };
            (input.note_id, outcome)
        })
        .buffered(settings.concurrency.max(1));

    let mut outcomes = Vec::with_capacity(total);
    while let Some((note_id, outcome)) = results.next().await {
        outcomes.push((note_id, outcome?));
    }

    let failed = outcomes
        .iter()
        .filter(|(_, o)| matches!(o, NoteOutcome::Failed(_)))
        .count();
    info!(
        "{}: {} notes processed, {} failed",
        populator.name(),
        outcomes.len(),
        failed
    );
    Ok(outcomes)
}

/// Run `future` to completion on a fresh single-threaded runtime.
///
/// With `listen_for_interrupt`, Ctrl-C trips `cancel` instead of killing the
/// process, so notes already in flight still finish.
pub fn run_blocking<F, T>(future: F, cancel: &CancelFlag, listen_for_interrupt: bool) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async {
        if listen_for_interrupt {
            let flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted; finishing notes in flight");
                    flag.cancel();
                }
            });
        }
        future.await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populators::PopulatorConfig;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct Slow {
        stall_on: NoteId,
        fail_on: Option<NoteId>,
        fatal_on: Option<NoteId>,
    }

    #[async_trait]
    impl Populator for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn configure(&mut self, _config: &PopulatorConfig) -> Result<()> {
            Ok(())
        }

        fn source_fields(&self) -> Vec<String> {
            vec!["Front".to_string()]
        }

        fn target_fields(&self) -> Vec<String> {
            vec!["Back".to_string()]
        }

        async fn populate(&self, note: &NoteInput) -> Result<FieldUpdates> {
            if note.note_id == self.stall_on {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if Some(note.note_id) == self.fail_on {
                return Err(AnkiError::InvalidInput("bad note".to_string()));
            }
            if Some(note.note_id) == self.fatal_on {
                return Err(AnkiError::Storage("disk gone".to_string()));
            }
            let mut updates = FieldUpdates::new();
            updates.insert("Back".to_string(), format!("value {}", note.note_id));
            Ok(updates)
        }
    }

    fn inputs(count: i64) -> Vec<NoteInput> {
        (1..=count)
            .map(|id| NoteInput {
                note_id: id,
                fields: BTreeMap::new(),
                tags: Vec::new(),
            })
            .collect()
    }

    fn settings() -> BatchSettings {
        BatchSettings {
            concurrency: 3,
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_note() {
        let _ = env_logger::builder().is_test(true).try_init();
        let populator = Slow {
            stall_on: 5,
            fail_on: None,
            fatal_on: None,
        };
        let outcomes = run_batch(&populator, inputs(10), &settings(), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 10);
        let ids: Vec<NoteId> = outcomes.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
        let updated = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, NoteOutcome::Updated(_)))
            .count();
        assert_eq!(updated, 9);
        assert!(matches!(outcomes[4].1, NoteOutcome::Failed(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_per_note_error_is_recorded() {
        let populator = Slow {
            stall_on: 0,
            fail_on: Some(2),
            fatal_on: None,
        };
        let outcomes = run_batch(&populator, inputs(3), &settings(), &CancelFlag::new())
            .await
            .unwrap();
        assert!(matches!(outcomes[1].1, NoteOutcome::Failed(_)));
        assert!(matches!(outcomes[2].1, NoteOutcome::Updated(_)));
    }

    #[tokio::test]
    async fn test_other_errors_abort() {
        let populator = Slow {
            stall_on: 0,
            fail_on: None,
            fatal_on: Some(2),
        };
        let err = run_batch(&populator, inputs(3), &settings(), &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AnkiError::Storage(_)));
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_notes() {
        let populator = Slow {
            stall_on: 0,
            fail_on: None,
            fatal_on: None,
        };
        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcomes = run_batch(&populator, inputs(4), &settings(), &cancel)
            .await
            .unwrap();
        assert!(outcomes.iter().all(|(_, o)| *o == NoteOutcome::Skipped));
    }

    /// Every note in the first window waits for the others to start, then
    /// `trip_on` cancels while the rest are still working.
    struct Tripwire {
        trip_on: NoteId,
        gate: tokio::sync::Barrier,
        cancel: CancelFlag,
    }

    #[async_trait]
    impl Populator for Tripwire {
        fn name(&self) -> &'static str {
            "tripwire"
        }

        fn configure(&mut self, _config: &PopulatorConfig) -> Result<()> {
            Ok(())
        }

        fn source_fields(&self) -> Vec<String> {
            Vec::new()
        }

        fn target_fields(&self) -> Vec<String> {
            vec!["Back".to_string()]
        }

        async fn populate(&self, note: &NoteInput) -> Result<FieldUpdates> {
            if note.note_id <= 3 {
                self.gate.wait().await;
            }
            if note.note_id == self.trip_on {
                self.cancel.cancel();
            } else {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let mut updates = FieldUpdates::new();
            updates.insert("Back".to_string(), format!("value {}", note.note_id));
            Ok(updates)
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_run_lets_in_flight_notes_finish() {
        let cancel = CancelFlag::new();
        let populator = Tripwire {
            trip_on: 2,
            gate: tokio::sync::Barrier::new(3),
            cancel: cancel.clone(),
        };
        let settings = BatchSettings {
            concurrency: 3,
            timeout: Duration::from_secs(5),
        };
        let outcomes = run_batch(&populator, inputs(6), &settings, &cancel)
            .await
            .unwrap();

        let ids: Vec<NoteId> = outcomes.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, (1..=6).collect::<Vec<_>>());
        for (id, outcome) in &outcomes {
            if *id <= 3 {
                assert!(matches!(outcome, NoteOutcome::Updated(_)), "note {}", id);
            } else {
                assert_eq!(*outcome, NoteOutcome::Skipped, "note {}", id);
            }
        }
    }

    #[test]
    fn test_run_blocking() {
        let populator = Slow {
            stall_on: 0,
            fail_on: None,
            fatal_on: None,
        };
        let cancel = CancelFlag::new();
        let outcomes = run_blocking(
            run_batch(&populator, inputs(2), &settings(), &cancel),
            &cancel,
            false,
        )
        .unwrap();
        assert_eq!(outcomes.len(), 2);
    }
}
