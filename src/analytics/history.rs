//! In-process query history.
//!
//! Keeps the most recent results in a bounded ring buffer. Nothing is
//! persisted across restarts.

use std::collections::VecDeque;
use tokio::sync::RwLock;

use super::models::AnalyticsResult;

/// Default number of retained results.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct HistoryState {
    entries: VecDeque<AnalyticsResult>,
    total_recorded: u64,
}

/// Bounded history of analytics results, oldest first.
#[derive(Debug)]
pub struct QueryHistory {
    capacity: usize,
    state: RwLock<HistoryState>,
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl QueryHistory {
    /// Creates a history retaining at most `capacity` results.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: RwLock::new(HistoryState::default()),
        }
    }

    /// Maximum number of retained results.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records a result, evicting the oldest when full.
    pub async fn record(&self, result: AnalyticsResult) {
        let mut state = self.state.write().await;
        state.total_recorded += 1;
        if self.capacity == 0 {
            return;
        }
        while state.entries.len() >= self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(result);
    }

    /// Returns the last `limit` results in chronological order.
    ///
    /// A `limit` of zero returns every retained result.
    pub async fn recent(&self, limit: usize) -> Vec<AnalyticsResult> {
        let state = self.state.read().await;
        let skip = match limit {
            0 => 0,
            n => state.entries.len().saturating_sub(n),
        };
        state.entries.iter().skip(skip).cloned().collect()
    }

    /// Number of retained results.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Returns true if nothing is retained.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Number of results ever recorded, including evicted ones.
    pub async fn total_recorded(&self) -> u64 {
        self.state.read().await.total_recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn result(n: usize) -> AnalyticsResult {
        AnalyticsResult {
            query_id: format!("q{n}"),
            query: format!("Question number {n}"),
            insights: String::new(),
            data_points: None,
            execution_time: 0.0,
            timestamp: Utc::now(),
        }
    }

    fn ids(results: &[AnalyticsResult]) -> Vec<&str> {
        results.iter().map(|r| r.query_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_recent_is_chronological() {
        let history = QueryHistory::new(10);
        for n in 0..4 {
            history.record(result(n)).await;
        }

        assert_eq!(ids(&history.recent(2).await), vec!["q2", "q3"]);
        assert_eq!(ids(&history.recent(10).await), vec!["q0", "q1", "q2", "q3"]);
    }

    #[tokio::test]
    async fn test_zero_limit_returns_everything() {
        let history = QueryHistory::new(10);
        for n in 0..3 {
            history.record(result(n)).await;
        }

        assert_eq!(ids(&history.recent(0).await), vec!["q0", "q1", "q2"]);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let history = QueryHistory::new(3);
        for n in 0..5 {
            history.record(result(n)).await;
        }

        assert_eq!(history.len().await, 3);
        assert_eq!(history.total_recorded().await, 5);
        assert_eq!(ids(&history.recent(10).await), vec!["q2", "q3", "q4"]);
    }

    #[tokio::test]
    async fn test_zero_capacity_retains_nothing() {
        let history = QueryHistory::new(0);
        history.record(result(1)).await;

        assert!(history.is_empty().await);
        assert_eq!(history.total_recorded().await, 1);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(QueryHistory::default().capacity(), DEFAULT_HISTORY_CAPACITY);
    }
}
