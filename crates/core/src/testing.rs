//! Scripted provider and completion fakes for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::Error;
use crate::cache::{BackendStats, CacheBackend, CacheEntry};
use crate::intelligence::normalize;
use crate::model::Book;
use crate::provider::{Completion, CompletionService, MetadataProvider, UpstreamError};

pub fn book(id: &str, title: &str, author: &str) -> Book {
    Book::new(id, title, "google_books")
        .with_authors([author])
        .with_cover_url(format!("https://books.example/covers/{id}.jpg"))
}

/// Answers by normalized query; unknown queries find nothing.
/// Queued failures are returned first, one per call.
#[derive(Debug, Default)]
pub struct FakeProvider {
    results: HashMap<String, Vec<Book>>,
    failures: Mutex<VecDeque<UpstreamError>>,
    queries: Mutex<Vec<(String, u32)>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, books: Vec<Book>) -> Self {
        self.results.insert(normalize(query), books);
        self
    }

    pub fn fail_next(self, err: UpstreamError) -> Self {
        self.failures.lock().push_back(err);
        self
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().iter().map(|(q, _)| q.clone()).collect()
    }

    pub fn last_limit(&self) -> Option<u32> {
        self.queries.lock().last().map(|(_, limit)| *limit)
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Book>, UpstreamError> {
        self.queries.lock().push((query.to_string(), limit));
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        let mut books = self.results.get(&normalize(query)).cloned().unwrap_or_default();
        books.truncate(limit as usize);
        Ok(books)
    }
}

/// Returns the same scripted answers on every call.
#[derive(Debug)]
pub struct FakeCompletion {
    correction: Result<Completion, UpstreamError>,
    alternatives: Result<Vec<String>, UpstreamError>,
    correct_calls: AtomicU32,
    suggest_calls: AtomicU32,
}

impl FakeCompletion {
    pub fn new(correction: Result<Completion, UpstreamError>, alternatives: Result<Vec<String>, UpstreamError>) -> Self {
        Self { correction, alternatives, correct_calls: AtomicU32::new(0), suggest_calls: AtomicU32::new(0) }
    }

    pub fn correcting(suggestion: &str, confidence: f64) -> Self {
        Self::new(Ok(Completion { suggestion: suggestion.into(), confidence }), Ok(Vec::new()))
    }

    pub fn suggesting<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let alternatives = alternatives.into_iter().map(Into::into).collect();
        Self::new(Err(UpstreamError::InvalidResponse("no correction scripted".into())), Ok(alternatives))
    }

    pub fn failing(err: UpstreamError) -> Self {
        Self::new(Err(err.clone()), Err(err))
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = Ok(alternatives.into_iter().map(Into::into).collect());
        self
    }

    pub fn correct_calls(&self) -> u32 {
        self.correct_calls.load(Ordering::SeqCst)
    }

    pub fn suggest_calls(&self) -> u32 {
        self.suggest_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn correct(&self, _query: &str) -> Result<Completion, UpstreamError> {
        self.correct_calls.fetch_add(1, Ordering::SeqCst);
        self.correction.clone()
    }

    async fn suggest_alternatives(&self, _query: &str, _count: usize) -> Result<Vec<String>, UpstreamError> {
        self.suggest_calls.fetch_add(1, Ordering::SeqCst);
        self.alternatives.clone()
    }
}

/// Backing store whose every operation fails.
#[derive(Debug)]
pub struct FailingBackend;

impl FailingBackend {
    fn err() -> Error {
        Error::Database(tokio_rusqlite::Error::ConnectionClosed)
    }
}

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn load(&self, _key: &str) -> Result<Option<CacheEntry>, Error> {
        Err(Self::err())
    }

    async fn store(&self, _entry: &CacheEntry) -> Result<(), Error> {
        Err(Self::err())
    }

    async fn remove(&self, _key: &str, _created_at: DateTime<Utc>) -> Result<bool, Error> {
        Err(Self::err())
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, Error> {
        Err(Self::err())
    }

    async fn trim_to(&self, _max_entries: usize) -> Result<u64, Error> {
        Err(Self::err())
    }

    async fn clear(&self) -> Result<u64, Error> {
        Err(Self::err())
    }

    async fn stats(&self) -> Result<BackendStats, Error> {
        Err(Self::err())
    }
}
