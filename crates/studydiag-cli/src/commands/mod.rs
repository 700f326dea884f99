//! Subcommand implementations and the helpers they share.

pub mod analyze;
pub mod delete_attempt;
pub mod init;
pub mod show;
pub mod subject;
pub mod tests;
pub mod trend;

use std::path::PathBuf;

use anyhow::{Context, Result};
use uuid::Uuid;

use studydiag_core::model::Test;
use studydiag_core::store::{JsonFileBackend, TestStore};
use studydiag_providers::config::load_config_from;
use studydiag_providers::StudydiagConfig;

/// Global path options.
pub struct Paths {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl Paths {
    pub fn load_config(&self) -> Result<StudydiagConfig> {
        let mut config = load_config_from(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }
}

/// Open the JSON store in the configured data directory.
pub fn open_store(config: &StudydiagConfig) -> Result<TestStore> {
    let backend = JsonFileBackend::in_dir(&config.data_dir);
    let path = backend.path().display().to_string();
    tracing::debug!(path = %path, "opening store");
    TestStore::open(backend).with_context(|| format!("failed to open store at {path}"))
}

/// Find a test by full id, unique id prefix, or case-insensitive name.
pub fn find_test(store: &TestStore, query: &str) -> Result<Test> {
    let query = query.trim();
    if let Ok(id) = Uuid::parse_str(query) {
        return store
            .get(id)
            .with_context(|| format!("no test with id {id}"));
    }

    let tests = store.tests();
    let by_name: Vec<&Test> = tests
        .iter()
        .filter(|t| t.name.eq_ignore_ascii_case(query))
        .collect();
    let matches: Vec<&Test> = if by_name.is_empty() && !query.is_empty() {
        let prefix = query.to_ascii_lowercase();
        tests
            .iter()
            .filter(|t| t.id.to_string().starts_with(&prefix))
            .collect()
    } else {
        by_name
    };

    match matches.as_slice() {
        [test] => Ok((*test).clone()),
        [] => anyhow::bail!("no test matches '{query}'; run `studydiag tests` to list them"),
        many => anyhow::bail!(
            "'{query}' matches {} tests; use the full id ({})",
            many.len(),
            many.iter()
                .map(|t| t.id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Convert a 1-based attempt number to an index.
pub fn attempt_index(number: usize, len: usize) -> Result<usize> {
    anyhow::ensure!(
        (1..=len).contains(&number),
        "attempt {number} does not exist (test has {len} attempt{})",
        if len == 1 { "" } else { "s" }
    );
    Ok(number - 1)
}

/// Short id for tables.
pub fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}
