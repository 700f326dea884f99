//! Test/attempt store with whole-collection persistence.
//!
//! Every mutation locks the backend, reloads the collection from it, writes
//! the changed copy back, and only then replaces the in-memory state. Several
//! processes can share one store file without losing each other's writes. A
//! failed write leaves the store exactly as it was.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FeedbackError;
use crate::model::{Attempt, Subject, Test};

/// File name of the persisted collection inside the data directory.
pub const STORE_FILE: &str = "study-results.json";

/// Current on-disk format version.
pub const STORE_VERSION: u32 = 1;

/// Durable storage for the whole test collection.
pub trait StoreBackend: Send + Sync {
    /// Load every test. An absent store loads as empty.
    fn load(&self) -> Result<Vec<Test>>;

    /// Replace the stored collection.
    fn save(&self, tests: &[Test]) -> Result<()>;

    /// Block until this caller holds the collection exclusively. The lock is
    /// released when the returned guard drops.
    fn lock(&self) -> Result<StoreLock> {
        Ok(StoreLock::default())
    }
}

/// Exclusive hold on a backend, released on drop.
#[derive(Debug, Default)]
pub struct StoreLock {
    // Closing the handle releases the advisory lock.
    _file: Option<File>,
}

#[derive(Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    tests: Vec<Test>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    tests: &'a [Test],
}

/// JSON file backend. Writes go to a temp file that is renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Backend for [`STORE_FILE`] inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> Result<Vec<Test>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read store: {}", self.path.display()))?;
        let file: StoreFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse store: {}", self.path.display()))?;
        anyhow::ensure!(
            file.version <= STORE_VERSION,
            "store {} has version {}, newer than supported version {}",
            self.path.display(),
            file.version,
            STORE_VERSION
        );
        Ok(file.tests)
    }

    fn save(&self, tests: &[Test]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&StoreFileRef {
            version: STORE_VERSION,
            tests,
        })
        .context("failed to serialize store")?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to write store to {}", self.path.display()))?;
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(StoreLock { _file: Some(file) })
    }
}

/// In-memory backend for tests.
#[derive(Default)]
pub struct MemoryBackend {
    tests: Mutex<Vec<Test>>,
    save_count: AtomicU32,
    fail_saves: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tests(tests: Vec<Test>) -> Self {
        Self {
            tests: Mutex::new(tests),
            ..Self::default()
        }
    }

    /// Make every following save fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::Relaxed)
    }

    /// What was last saved.
    pub fn snapshot(&self) -> Vec<Test> {
        lock(&self.tests).clone()
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<Test>> {
        Ok(lock(&self.tests).clone())
    }

    fn save(&self, tests: &[Test]) -> Result<()> {
        anyhow::ensure!(!self.fail_saves.load(Ordering::Relaxed), "simulated write failure");
        *lock(&self.tests) = tests.to_vec();
        self.save_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl<B: StoreBackend + ?Sized> StoreBackend for Arc<B> {
    fn load(&self) -> Result<Vec<Test>> {
        (**self).load()
    }

    fn save(&self, tests: &[Test]) -> Result<()> {
        (**self).save(tests)
    }

    fn lock(&self) -> Result<StoreLock> {
        (**self).lock()
    }
}

/// An attempt found by a cross-test subject query.
#[derive(Debug, Clone)]
pub struct SubjectAttempt {
    pub test_id: Uuid,
    pub test_name: String,
    /// Position in the parent test's attempt log.
    pub index: usize,
    pub attempt: Attempt,
}

/// Owns the test collection and persists it after every change.
pub struct TestStore {
    backend: Box<dyn StoreBackend>,
    tests: Mutex<Vec<Test>>,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl TestStore {
    /// Load the collection from `backend`.
    pub fn open(backend: impl StoreBackend + 'static) -> Result<Self> {
        let tests = backend.load()?;
        tracing::debug!(tests = tests.len(), "store loaded");
        Ok(Self {
            backend: Box::new(backend),
            tests: Mutex::new(tests),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Snapshot of every test, in creation order, as of the last load or write.
    pub fn tests(&self) -> Vec<Test> {
        lock(&self.tests).clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Test> {
        lock(&self.tests).iter().find(|t| t.id == id).cloned()
    }

    /// Create an empty test.
    pub fn create_test(&self, name: &str, subject: Subject) -> Result<Test, FeedbackError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FeedbackError::MissingInput("test name".into()));
        }
        let test = Test::new(name, subject);
        let created = test.clone();
        self.transact(move |tests| {
            tests.push(test);
            Ok(())
        })?;
        tracing::info!(test_id = %created.id, name = %created.name, "test created");
        Ok(created)
    }

    /// Append a finished attempt. Returns its index.
    ///
    /// The attempt's subject is overwritten with the test's subject.
    pub fn append_attempt(&self, test_id: Uuid, mut attempt: Attempt) -> Result<usize, FeedbackError> {
        self.transact(|tests| {
            let test = find_mut(tests, test_id)?;
            attempt.subject = test.subject.clone();
            Ok(test.attempts_mut().push(attempt))
        })
    }

    /// Build an attempt from the test's current state and append it, as one
    /// transaction. The builder sees the history the attempt is appended to
    /// and may return extra data alongside the attempt.
    pub fn append_scored<T, F>(
        &self,
        test_id: Uuid,
        build: F,
    ) -> Result<(usize, Attempt, T), FeedbackError>
    where
        F: FnOnce(&Test) -> (Attempt, T),
    {
        self.transact(|tests| {
            let test = find_mut(tests, test_id)?;
            let (mut attempt, extra) = build(test);
            attempt.subject = test.subject.clone();
            let index = test.attempts_mut().push(attempt.clone());
            Ok((index, attempt, extra))
        })
    }

    /// Remove the attempt at `index`; later attempts shift down by one.
    pub fn delete_attempt(&self, test_id: Uuid, index: usize) -> Result<Attempt, FeedbackError> {
        let removed = self.transact(|tests| {
            let test = find_mut(tests, test_id)?;
            let len = test.attempts().len();
            test.attempts_mut()
                .remove(index)
                .ok_or(FeedbackError::AttemptNotFound { index, len })
        })?;
        tracing::info!(test_id = %test_id, index, "attempt deleted");
        Ok(removed)
    }

    /// Every attempt recorded for `subject`, grouped by test in creation order.
    pub fn attempts_by_subject(&self, subject: &Subject) -> Vec<SubjectAttempt> {
        lock(&self.tests)
            .iter()
            .flat_map(|test| {
                test.attempts()
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| &a.subject == subject)
                    .map(|(index, a)| SubjectAttempt {
                        test_id: test.id,
                        test_name: test.name.clone(),
                        index,
                        attempt: a.clone(),
                    })
            })
            .collect()
    }

    /// Per-test async lock serializing feedback generation for one test.
    pub fn test_lock(&self, test_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(lock(&self.locks).entry(test_id).or_default())
    }

    fn transact<T, F>(&self, mutate: F) -> Result<T, FeedbackError>
    where
        F: FnOnce(&mut Vec<Test>) -> Result<T, FeedbackError>,
    {
        let mut current = lock(&self.tests);
        let _held = self.backend.lock().map_err(FeedbackError::Storage)?;
        let mut next = self.backend.load().map_err(FeedbackError::Storage)?;
        let out = mutate(&mut next)?;
        self.backend.save(&next).map_err(FeedbackError::Storage)?;
        *current = next;
        Ok(out)
    }
}

fn find_mut(tests: &mut [Test], id: Uuid) -> Result<&mut Test, FeedbackError> {
    tests
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(FeedbackError::TestNotFound(id))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::attempt;

    fn memory_store() -> (Arc<MemoryBackend>, TestStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = TestStore::open(Arc::clone(&backend)).unwrap();
        (backend, store)
    }

    #[test]
    fn create_persists_immediately() {
        let (backend, store) = memory_store();
        let test = store.create_test("Unit 3 quiz", Subject::Math).unwrap();
        assert!(test.attempts().is_empty());
        assert_eq!(backend.save_count(), 1);
        assert_eq!(backend.snapshot()[0].id, test.id);
        assert_eq!(store.get(test.id).unwrap().name, "Unit 3 quiz");
    }

    #[test]
    fn create_requires_name() {
        let (backend, store) = memory_store();
        let err = store.create_test("  ", Subject::Math).unwrap_err();
        assert!(matches!(err, FeedbackError::MissingInput(_)));
        assert_eq!(backend.save_count(), 0);
    }

    #[test]
    fn append_copies_test_subject() {
        let (_, store) = memory_store();
        let test = store.create_test("Lab", Subject::Science).unwrap();
        let index = store.append_attempt(test.id, attempt(50, &[], &[])).unwrap();
        assert_eq!(index, 0);
        let stored = store.get(test.id).unwrap();
        assert_eq!(stored.attempts().latest().unwrap().subject, Subject::Science);
    }

    #[test]
    fn append_to_unknown_test() {
        let (_, store) = memory_store();
        let id = Uuid::new_v4();
        let err = store.append_attempt(id, attempt(50, &[], &[])).unwrap_err();
        assert!(matches!(err, FeedbackError::TestNotFound(missing) if missing == id));
    }

    #[test]
    fn append_scored_sees_history() {
        let (_, store) = memory_store();
        let test = store.create_test("Quiz", Subject::Math).unwrap();
        store.append_attempt(test.id, attempt(40, &[], &[])).unwrap();

        let (index, appended, prior) = store
            .append_scored(test.id, |t| {
                let prior = t.attempts().latest().unwrap().score;
                (attempt(prior + 1, &[], &[]), prior)
            })
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(prior, 40);
        assert_eq!(appended.score, 41);
    }

    #[test]
    fn delete_preserves_order() {
        let (_, store) = memory_store();
        let test = store.create_test("Quiz", Subject::Math).unwrap();
        for score in [10, 20, 30, 40] {
            store.append_attempt(test.id, attempt(score, &[], &[])).unwrap();
        }

        let removed = store.delete_attempt(test.id, 1).unwrap();
        assert_eq!(removed.score, 20);

        let scores: Vec<u32> = store
            .get(test.id)
            .unwrap()
            .attempts()
            .iter()
            .map(|a| a.score)
            .collect();
        assert_eq!(scores, vec![10, 30, 40]);

        let err = store.delete_attempt(test.id, 3).unwrap_err();
        assert!(matches!(err, FeedbackError::AttemptNotFound { index: 3, len: 3 }));
    }

    #[test]
    fn failed_save_leaves_state_untouched() {
        let (backend, store) = memory_store();
        let test = store.create_test("Quiz", Subject::Math).unwrap();
        backend.set_fail_saves(true);

        let err = store.append_attempt(test.id, attempt(50, &[], &[])).unwrap_err();
        assert!(matches!(err, FeedbackError::Storage(_)));
        assert!(store.get(test.id).unwrap().attempts().is_empty());
        assert!(backend.snapshot()[0].attempts().is_empty());
    }

    #[test]
    fn subject_filter_spans_tests() {
        let (_, store) = memory_store();
        let algebra = store.create_test("Algebra", Subject::Math).unwrap();
        let lab = store.create_test("Lab", Subject::Science).unwrap();
        let geometry = store.create_test("Geometry", Subject::Math).unwrap();
        store.append_attempt(algebra.id, attempt(10, &[], &[])).unwrap();
        store.append_attempt(lab.id, attempt(20, &[], &[])).unwrap();
        store.append_attempt(geometry.id, attempt(30, &[], &[])).unwrap();
        store.append_attempt(geometry.id, attempt(40, &[], &[])).unwrap();

        let math = store.attempts_by_subject(&Subject::Math);
        let scores: Vec<u32> = math.iter().map(|a| a.attempt.score).collect();
        assert_eq!(scores, vec![10, 30, 40]);
        assert_eq!(math[2].test_name, "Geometry");
        assert_eq!(math[2].index, 1);
    }

    #[test]
    fn subject_filter_matches_custom_subject_in_any_case() {
        let (_, store) = memory_store();
        let essay = store.create_test("Essay", "History".parse().unwrap()).unwrap();
        store.append_attempt(essay.id, attempt(55, &[], &[])).unwrap();

        let found = store.attempts_by_subject(&"history".parse().unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attempt.subject.to_string(), "History");
        assert!(store.attempts_by_subject(&Subject::Math).is_empty());
    }

    #[test]
    fn test_lock_is_shared_per_test() {
        let (_, store) = memory_store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(Arc::ptr_eq(&store.test_lock(a), &store.test_lock(a)));
        assert!(!Arc::ptr_eq(&store.test_lock(a), &store.test_lock(b)));
    }

    #[test]
    fn json_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path());
        assert!(backend.load().unwrap().is_empty());

        let store = TestStore::open(backend.clone()).unwrap();
        let test = store.create_test("Ledger basics", Subject::Accounting).unwrap();
        store.append_attempt(test.id, attempt(45, &["a"], &["b"])).unwrap();

        let reopened = TestStore::open(JsonFileBackend::in_dir(dir.path())).unwrap();
        let loaded = reopened.get(test.id).unwrap();
        assert_eq!(loaded.subject, Subject::Accounting);
        assert_eq!(loaded.attempts().len(), 1);
        assert_eq!(loaded.attempts().latest().unwrap().score, 45);
        assert!(!dir.path().join("study-results.json.tmp").exists());
    }

    #[test]
    fn stores_sharing_a_file_keep_each_others_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let first = TestStore::open(JsonFileBackend::in_dir(dir.path())).unwrap();
        let test = first.create_test("Shared", Subject::Math).unwrap();
        let second = TestStore::open(JsonFileBackend::in_dir(dir.path())).unwrap();

        first.append_attempt(test.id, attempt(40, &[], &[])).unwrap();
        second.append_attempt(test.id, attempt(60, &[], &[])).unwrap();

        let reopened = TestStore::open(JsonFileBackend::in_dir(dir.path())).unwrap();
        let scores: Vec<u32> = reopened
            .get(test.id)
            .unwrap()
            .attempts()
            .iter()
            .map(|a| a.score)
            .collect();
        assert_eq!(scores, vec![40, 60]);
        // The writer that went second also sees the first one's attempt.
        assert_eq!(second.get(test.id).unwrap().attempts().len(), 2);
    }

    #[test]
    fn scoring_sees_history_written_by_another_store() {
        let dir = tempfile::tempdir().unwrap();
        let first = TestStore::open(JsonFileBackend::in_dir(dir.path())).unwrap();
        let test = first.create_test("Shared", Subject::Science).unwrap();
        let second = TestStore::open(JsonFileBackend::in_dir(dir.path())).unwrap();
        first.append_attempt(test.id, attempt(70, &[], &[])).unwrap();

        let (index, _, seen) = second
            .append_scored(test.id, |t| (attempt(80, &[], &[]), t.attempts().len()))
            .unwrap();
        assert_eq!(seen, 1);
        assert_eq!(index, 1);
    }

    #[test]
    fn concurrent_writers_on_one_file_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let setup = TestStore::open(JsonFileBackend::in_dir(dir.path())).unwrap();
        let test_id = setup.create_test("Busy", Subject::Programming).unwrap().id;

        std::thread::scope(|scope| {
            for worker in 0..4u32 {
                let path = dir.path();
                scope.spawn(move || {
                    let store = TestStore::open(JsonFileBackend::in_dir(path)).unwrap();
                    for n in 0..5u32 {
                        store
                            .append_attempt(test_id, attempt(worker * 10 + n, &[], &[]))
                            .unwrap();
                    }
                });
            }
        });

        let reopened = TestStore::open(JsonFileBackend::in_dir(dir.path())).unwrap();
        assert_eq!(reopened.get(test_id).unwrap().attempts().len(), 20);
    }

    #[test]
    fn json_backend_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORE_FILE), "{not json").unwrap();
        assert!(TestStore::open(JsonFileBackend::in_dir(dir.path())).is_err());
    }

    #[test]
    fn json_backend_rejects_newer_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(STORE_FILE),
            r#"{"version": 99, "tests": []}"#,
        )
        .unwrap();
        let err = JsonFileBackend::in_dir(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("newer"));
    }
}
