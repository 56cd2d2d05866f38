//! Background scan for tasks coming due.
//!
//! Runs once at process start and then on a fixed interval. For every task
//! with `is_done == false`, `notified == false`, and a due time within the
//! lookahead window, it fires one notification and persists the `notified`
//! flag back through the store. Once the flag is persisted, later scans are
//! idempotent for that task.
//!
//! Delivery order is send-then-persist: if the flag write fails after a
//! successful send, the task is retried on the next pass (at-least-once).
//! The alternative — persist-before-send — would trade the duplicate for a
//! possibly missed notification; this design prefers the duplicate.

use super::notifier::{DueTaskNotice, Notifier};
use crate::board::{ProjectType, ScreenElement};
use crate::error::StoreError;
use crate::store::DocumentStore;
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counters from one scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanOutcome {
    /// Notifications sent and flagged in memory.
    pub notified: usize,
    /// Projects skipped because they failed to load.
    pub skipped_projects: usize,
    /// Projects whose flag write failed after a send (retried next pass).
    pub persist_failures: usize,
}

/// Periodically scans the store and fires due-task notifications.
pub struct NotificationScheduler {
    store: Arc<DocumentStore>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    lookahead: TimeDelta,
}

impl NotificationScheduler {
    pub fn new(
        store: Arc<DocumentStore>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
        lookahead_hours: i64,
    ) -> Self {
        Self {
            store,
            notifier,
            interval,
            lookahead: TimeDelta::hours(lookahead_hours),
        }
    }

    /// Spawn the background loop: one scan immediately, then one per
    /// interval. Failures are logged; the loop never stops.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                match self.scan().await {
                    Ok(outcome) => {
                        if outcome != ScanOutcome::default() {
                            info!(
                                notified = outcome.notified,
                                skipped = outcome.skipped_projects,
                                persist_failures = outcome.persist_failures,
                                "notification scan complete"
                            );
                        }
                    }
                    Err(e) => warn!("notification scan failed: {e}"),
                }
            }
        })
    }

    /// Run one scan over every persisted project.
    ///
    /// Per-project failures are logged and skipped — one corrupt document
    /// never halts the pass.
    pub async fn scan(&self) -> Result<ScanOutcome, StoreError> {
        let now = Utc::now();
        let mut outcome = ScanOutcome::default();

        for project_type in ProjectType::ALL {
            let summaries = self.store.list(project_type).await?;
            for summary in summaries {
                let mut project = match self.store.load(&summary.name, project_type).await {
                    Ok(project) => project,
                    Err(e) => {
                        warn!(name = %summary.name, %project_type, "skipping project in notification scan: {e}");
                        outcome.skipped_projects += 1;
                        continue;
                    }
                };

                let owner_name = project.owner_name.clone();
                let project_name = project.name.clone();
                let mut sent_here = 0usize;

                for grid in &mut project.grids {
                    for element in &mut grid.elements {
                        let ScreenElement::ToDoList(list) = element else {
                            continue;
                        };
                        for task in &mut list.scheduled_tasks {
                            if task.is_done || task.notified {
                                continue;
                            }
                            let Some(due) = task.parse_due_time() else {
                                continue;
                            };
                            let remaining = due - now;
                            if remaining <= TimeDelta::zero() || remaining > self.lookahead {
                                continue;
                            }

                            let notice = DueTaskNotice {
                                owner_name: owner_name.clone(),
                                project_name: project_name.clone(),
                                task_name: task.task_name.clone(),
                                due_time: task.due_time.clone(),
                            };
                            match self.notifier.notify(&notice).await {
                                Ok(()) => {
                                    task.notified = true;
                                    sent_here += 1;
                                    debug!(task = %task.task_name, project = %project_name, "notification sent");
                                }
                                Err(e) => {
                                    // Flag stays clear so the next pass retries.
                                    warn!(task = %task.task_name, project = %project_name, "notification failed: {e}");
                                }
                            }
                        }
                    }
                }

                if sent_here > 0 {
                    match self.store.save(&project).await {
                        Ok(_) => outcome.notified += sent_here,
                        Err(e) => {
                            // The sends happened; the flags did not stick.
                            // Known at-least-once risk: these tasks will
                            // re-notify on the next pass.
                            warn!(project = %project_name, "failed to persist notified flags: {e}");
                            outcome.notified += sent_here;
                            outcome.persist_failures += 1;
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }
}
