//! In-memory implementations of the list traits, for tests and demos.

use crate::api::{ListQuery, RecordPage, RecordSource};
use crate::auth::CredentialStore;
use crate::error::{CredentialError, FetchError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Credential store backed by a shared map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    read_failure: Arc<Mutex<Option<String>>>,
}

impl MemoryCredentialStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `entries`.
    #[must_use]
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.entries.lock() {
            map.extend(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value.to_string())),
            );
        }
        store
    }

    /// Make every subsequent read fail with `reason`.
    pub fn fail_reads(&self, reason: &str) {
        if let Ok(mut failure) = self.read_failure.lock() {
            *failure = Some(reason.to_string());
        }
    }

    fn failure(&self) -> Option<String> {
        self.read_failure.lock().ok().and_then(|failure| failure.clone())
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        if let Some(reason) = self.failure() {
            return Err(CredentialError::Unavailable(reason));
        }
        let entries = self
            .entries
            .lock()
            .map_err(|_| CredentialError::Unavailable("lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CredentialError::Unavailable("lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A canned answer with an optional latency.
#[derive(Debug, Clone)]
struct Scripted {
    latency: Duration,
    outcome: Result<RecordPage, FetchError>,
}

/// Record source replaying scripted answers in order.
///
/// Every query is recorded. Once the script runs out, the fallback answer
/// (an empty page unless set) is returned.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRecordSource {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: Arc<Mutex<Option<Result<RecordPage, FetchError>>>>,
    queries: Arc<Mutex<Vec<ListQuery>>>,
}

impl ScriptedRecordSource {
    /// Source with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer.
    #[must_use]
    pub fn then_page(self, page: RecordPage) -> Self {
        self.push(Duration::ZERO, Ok(page));
        self
    }

    /// Queue a successful answer delivered after `latency`.
    #[must_use]
    pub fn then_page_after(self, latency: Duration, page: RecordPage) -> Self {
        self.push(latency, Ok(page));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn then_error(self, error: FetchError) -> Self {
        self.push(Duration::ZERO, Err(error));
        self
    }

    /// Answer returned once the script is exhausted.
    #[must_use]
    pub fn otherwise(self, outcome: Result<RecordPage, FetchError>) -> Self {
        if let Ok(mut fallback) = self.fallback.lock() {
            *fallback = Some(outcome);
        }
        self
    }

    /// Every query received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<ListQuery> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }

    /// Number of queries received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.queries.lock().map(|queries| queries.len()).unwrap_or(0)
    }

    fn push(&self, latency: Duration, outcome: Result<RecordPage, FetchError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Scripted { latency, outcome });
        }
    }

    fn next(&self, query: &ListQuery) -> Scripted {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }

        let scripted = self.script.lock().ok().and_then(|mut script| script.pop_front());
        scripted.unwrap_or_else(|| Scripted {
            latency: Duration::ZERO,
            outcome: self
                .fallback
                .lock()
                .ok()
                .and_then(|fallback| fallback.clone())
                .unwrap_or_else(|| Ok(RecordPage::empty())),
        })
    }
}

impl RecordSource for ScriptedRecordSource {
    async fn fetch(&self, query: &ListQuery) -> Result<RecordPage, FetchError> {
        let Scripted { latency, outcome } = self.next(query);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use crate::filters::FilterState;
    use crate::types::Record;

    fn query() -> ListQuery {
        ListQuery::new(&Endpoint::orders(), &FilterState::new())
    }

    #[tokio::test]
    async fn replays_script_then_fallback() {
        let source = ScriptedRecordSource::new()
            .then_page(RecordPage::new(vec![Record::new("1", "2024-05-01")]))
            .then_error(FetchError::NetworkUnavailable("offline".into()));

        assert_eq!(source.fetch(&query()).await.unwrap().records.len(), 1);
        assert!(source.fetch(&query()).await.is_err());
        assert_eq!(source.fetch(&query()).await.unwrap(), RecordPage::empty());
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn honours_latency() {
        let source = ScriptedRecordSource::new()
            .then_page_after(Duration::from_secs(3), RecordPage::empty());

        let started = tokio::time::Instant::now();
        source.fetch(&query()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
