//! Analytics aggregation over the document store.
//!
//! Scans every persisted project, buckets completed tasks by tag and day,
//! and computes on-time completion rates. Results are memoized in an
//! explicit TTL cache owned by the aggregator — created at process start,
//! gone on restart, never ambient global state.

use crate::board::ProjectType;
use crate::error::StoreError;
use crate::store::DocumentStore;
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Reserved tag for tasks on a to-do list with no tags, so they are never
/// silently dropped from aggregates.
pub const UNTAGGED: &str = "__untagged__";

// ============================================================================
// Report types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSeries {
    pub tag: String,
    /// One count per label date, aligned with `CompletedPerDay::labels`.
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedPerDay {
    /// Oldest to today, `window_days` entries.
    pub labels: Vec<NaiveDate>,
    pub series: Vec<TagSeries>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagCounts {
    pub total: u64,
    pub on_time: u64,
    pub late: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRateByTag {
    /// Ranked by total completions, descending; ties keep first-encountered
    /// order.
    pub labels: Vec<String>,
    /// `on_time / total` per label, aligned with `labels`.
    pub rates: Vec<f64>,
    pub raw_counts: BTreeMap<String, TagCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub completed_per_day: CompletedPerDay,
    pub completion_rate_by_tag: CompletionRateByTag,
}

// ============================================================================
// Aggregator
// ============================================================================

struct CacheEntry {
    window_days: u32,
    computed_at: Instant,
    report: AnalyticsReport,
}

/// Scans the store and aggregates task-completion analytics, cached with a
/// time-to-live.
pub struct Aggregator {
    store: Arc<DocumentStore>,
    ttl: Duration,
    cache: Mutex<Option<CacheEntry>>,
}

impl Aggregator {
    pub fn new(store: Arc<DocumentStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Aggregate completions over the trailing `window_days` (inclusive of
    /// today).
    ///
    /// A cache hit returns the identical cached report for the same
    /// `window_days` within the TTL without touching the store; a miss fully
    /// recomputes. Per-document load failures are logged and skipped — one
    /// corrupt file never halts the whole scan.
    pub async fn aggregate(&self, window_days: u32) -> Result<AnalyticsReport, StoreError> {
        if window_days == 0 {
            return Err(StoreError::Validation("window_days must be at least 1".into()));
        }

        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.as_ref() {
            if entry.window_days == window_days && entry.computed_at.elapsed() < self.ttl {
                debug!(window_days, "analytics cache hit");
                return Ok(entry.report.clone());
            }
        }

        let report = self.compute(window_days).await?;
        *cache = Some(CacheEntry {
            window_days,
            computed_at: Instant::now(),
            report: report.clone(),
        });
        Ok(report)
    }

    async fn compute(&self, window_days: u32) -> Result<AnalyticsReport, StoreError> {
        let today = Utc::now().date_naive();
        let start = today
            .checked_sub_days(Days::new(u64::from(window_days) - 1))
            .ok_or_else(|| StoreError::Validation("window_days out of range".into()))?;

        struct TagAgg {
            per_day: Vec<u64>,
            counts: TagCounts,
        }

        let mut tag_order: Vec<String> = Vec::new();
        let mut per_tag: HashMap<String, TagAgg> = HashMap::new();

        for project_type in ProjectType::ALL {
            let summaries = self.store.list(project_type).await?;
            for summary in summaries {
                let project = match self.store.load(&summary.name, project_type).await {
                    Ok(project) => project,
                    Err(e) => {
                        warn!(name = %summary.name, %project_type, "skipping project in analytics scan: {e}");
                        continue;
                    }
                };

                for (_, list) in project.todo_lists() {
                    let tags: Vec<String> = if list.tags.is_empty() {
                        vec![UNTAGGED.to_string()]
                    } else {
                        list.tags.iter().cloned().collect()
                    };

                    for task in &list.scheduled_tasks {
                        if !task.is_done {
                            continue;
                        }
                        let Some(completed) = task.parse_completion_time() else {
                            continue;
                        };
                        let day = completed.date_naive();
                        if day < start || day > today {
                            continue;
                        }
                        // No parseable due time counts as not on time.
                        let on_time = task
                            .parse_due_time()
                            .is_some_and(|due| completed <= due);
                        let day_index = (day - start).num_days() as usize;

                        for tag in &tags {
                            let agg = per_tag.entry(tag.clone()).or_insert_with(|| {
                                tag_order.push(tag.clone());
                                TagAgg {
                                    per_day: vec![0; window_days as usize],
                                    counts: TagCounts::default(),
                                }
                            });
                            agg.per_day[day_index] += 1;
                            agg.counts.total += 1;
                            if on_time {
                                agg.counts.on_time += 1;
                            } else {
                                agg.counts.late += 1;
                            }
                        }
                    }
                }
            }
        }

        // Rank by total completions desc; stable sort keeps ties in
        // first-encountered order.
        let mut ranked = tag_order;
        ranked.sort_by(|a, b| per_tag[b].counts.total.cmp(&per_tag[a].counts.total));

        let labels: Vec<NaiveDate> = (0..u64::from(window_days))
            .map(|i| start.checked_add_days(Days::new(i)).unwrap_or(start))
            .collect();

        let series: Vec<TagSeries> = ranked
            .iter()
            .map(|tag| TagSeries {
                tag: tag.clone(),
                counts: per_tag[tag].per_day.clone(),
            })
            .collect();

        let rates: Vec<f64> = ranked
            .iter()
            .map(|tag| {
                let counts = per_tag[tag].counts;
                counts.on_time as f64 / counts.total as f64
            })
            .collect();

        let raw_counts: BTreeMap<String, TagCounts> = per_tag
            .iter()
            .map(|(tag, agg)| (tag.clone(), agg.counts))
            .collect();

        Ok(AnalyticsReport {
            completed_per_day: CompletedPerDay {
                labels,
                series,
            },
            completion_rate_by_tag: CompletionRateByTag {
                labels: ranked,
                rates,
                raw_counts,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Grid, Priority, Project, ScheduledTask, ScreenElement, ToDoList};
    use chrono::{TimeDelta, Utc};

    fn tagged_list(tags: &[&str], tasks: Vec<ScheduledTask>) -> ScreenElement {
        ScreenElement::ToDoList(ToDoList {
            scheduled_tasks: tasks,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        })
    }

    fn done_task(name: &str, completed_offset: TimeDelta, due_offset: TimeDelta) -> ScheduledTask {
        let completed_at = Utc::now() + completed_offset;
        let mut task = ScheduledTask::new(name, Priority::Medium, completed_at + due_offset);
        task.mark_done("tester", completed_at);
        task
    }

    async fn fixture(elements: Vec<ScreenElement>) -> (tempfile::TempDir, Arc<DocumentStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::new(dir.path()).unwrap());
        let mut project = Project::new("Stats", ProjectType::Local, "owner");
        let mut grid = Grid::new("Main");
        grid.elements = elements;
        project.grids.push(grid);
        store.save(&project).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_window_days_zero_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::new(dir.path()).unwrap());
        let agg = Aggregator::new(store, Duration::from_secs(30));
        assert!(matches!(
            agg.aggregate(0).await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_on_time_and_late_split() {
        // One task completed before its due time, one after.
        let elements = vec![tagged_list(
            &["urgent"],
            vec![
                done_task("early", TimeDelta::hours(-2), TimeDelta::hours(1)),
                done_task("late", TimeDelta::hours(-2), TimeDelta::hours(-1)),
            ],
        )];
        let (_dir, store) = fixture(elements).await;
        let agg = Aggregator::new(store, Duration::from_secs(30));

        let report = agg.aggregate(30).await.unwrap();
        assert_eq!(report.completion_rate_by_tag.labels, vec!["urgent"]);
        assert_eq!(report.completion_rate_by_tag.rates, vec![0.5]);
        let counts = report.completion_rate_by_tag.raw_counts["urgent"];
        assert_eq!(counts, TagCounts { total: 2, on_time: 1, late: 1 });
    }

    #[tokio::test]
    async fn test_untagged_lists_use_reserved_tag() {
        let elements = vec![tagged_list(
            &[],
            vec![done_task("t", TimeDelta::hours(-1), TimeDelta::hours(2))],
        )];
        let (_dir, store) = fixture(elements).await;
        let agg = Aggregator::new(store, Duration::from_secs(30));

        let report = agg.aggregate(7).await.unwrap();
        assert_eq!(report.completion_rate_by_tag.labels, vec![UNTAGGED]);
        assert_eq!(report.completion_rate_by_tag.raw_counts[UNTAGGED].total, 1);
    }

    #[tokio::test]
    async fn test_unparseable_due_time_counts_late() {
        let completed_at = Utc::now() - TimeDelta::hours(1);
        let mut task = ScheduledTask::new("fuzzy", Priority::Low, Utc::now());
        task.due_time = "someday".into();
        task.mark_done("tester", completed_at);

        let (_dir, store) = fixture(vec![tagged_list(&["ops"], vec![task])]).await;
        let agg = Aggregator::new(store, Duration::from_secs(30));

        let report = agg.aggregate(7).await.unwrap();
        let counts = report.completion_rate_by_tag.raw_counts["ops"];
        assert_eq!(counts.late, 1);
        assert_eq!(counts.on_time, 0);
    }

    #[tokio::test]
    async fn test_incomplete_and_out_of_window_excluded() {
        let pending = ScheduledTask::new("open", Priority::High, Utc::now());
        let ancient = done_task("old", TimeDelta::days(-400), TimeDelta::hours(1));
        let (_dir, store) =
            fixture(vec![tagged_list(&["misc"], vec![pending, ancient])]).await;
        let agg = Aggregator::new(store, Duration::from_secs(30));

        let report = agg.aggregate(30).await.unwrap();
        assert!(report.completion_rate_by_tag.labels.is_empty());
        assert!(report.completed_per_day.series.is_empty());
        assert_eq!(report.completed_per_day.labels.len(), 30);
    }

    #[tokio::test]
    async fn test_task_attributed_to_every_tag() {
        let elements = vec![tagged_list(
            &["a", "b"],
            vec![done_task("shared", TimeDelta::hours(-1), TimeDelta::hours(1))],
        )];
        let (_dir, store) = fixture(elements).await;
        let agg = Aggregator::new(store, Duration::from_secs(30));

        let report = agg.aggregate(7).await.unwrap();
        assert_eq!(report.completion_rate_by_tag.raw_counts["a"].total, 1);
        assert_eq!(report.completion_rate_by_tag.raw_counts["b"].total, 1);
    }

    #[tokio::test]
    async fn test_ranking_by_total_desc() {
        let elements = vec![
            tagged_list(
                &["quiet"],
                vec![done_task("one", TimeDelta::hours(-1), TimeDelta::hours(1))],
            ),
            tagged_list(
                &["busy"],
                vec![
                    done_task("x", TimeDelta::hours(-1), TimeDelta::hours(1)),
                    done_task("y", TimeDelta::hours(-2), TimeDelta::hours(1)),
                ],
            ),
        ];
        let (_dir, store) = fixture(elements).await;
        let agg = Aggregator::new(store, Duration::from_secs(30));

        let report = agg.aggregate(7).await.unwrap();
        assert_eq!(report.completion_rate_by_tag.labels, vec!["busy", "quiet"]);
        assert_eq!(report.completed_per_day.series[0].tag, "busy");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let elements = vec![tagged_list(
            &["t"],
            vec![done_task("x", TimeDelta::hours(-1), TimeDelta::hours(1))],
        )];
        let (_dir, store) = fixture(elements).await;
        let agg = Aggregator::new(Arc::clone(&store), Duration::from_secs(300));

        let first = agg.aggregate(30).await.unwrap();
        let ops_after_first = store.read_ops();

        let second = agg.aggregate(30).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.read_ops(), ops_after_first, "cache hit must not re-scan");
    }

    #[tokio::test]
    async fn test_different_window_is_cache_miss() {
        let (_dir, store) = fixture(vec![]).await;
        let agg = Aggregator::new(Arc::clone(&store), Duration::from_secs(300));

        agg.aggregate(30).await.unwrap();
        let ops = store.read_ops();
        agg.aggregate(7).await.unwrap();
        assert!(store.read_ops() > ops, "different window must recompute");
    }

    #[tokio::test]
    async fn test_expired_ttl_recomputes() {
        let (_dir, store) = fixture(vec![]).await;
        let agg = Aggregator::new(Arc::clone(&store), Duration::from_millis(10));

        agg.aggregate(30).await.unwrap();
        let ops = store.read_ops();
        tokio::time::sleep(Duration::from_millis(30)).await;
        agg.aggregate(30).await.unwrap();
        assert!(store.read_ops() > ops, "expired TTL must recompute");
    }

    #[tokio::test]
    async fn test_labels_span_window() {
        let (_dir, store) = fixture(vec![]).await;
        let agg = Aggregator::new(store, Duration::from_secs(30));
        let report = agg.aggregate(7).await.unwrap();

        assert_eq!(report.completed_per_day.labels.len(), 7);
        let first = report.completed_per_day.labels[0];
        let last = *report.completed_per_day.labels.last().unwrap();
        assert_eq!((last - first).num_days(), 6);
        assert_eq!(last, Utc::now().date_naive());
    }
}
