//! The `studydiag delete-attempt` command.

use anyhow::Result;

use super::{attempt_index, find_test, open_store, Paths};

pub fn execute(paths: &Paths, test: String, number: usize) -> Result<()> {
    let config = paths.load_config()?;
    let store = open_store(&config)?;
    let test = find_test(&store, &test)?;

    let index = attempt_index(number, test.attempts().len())?;
    let removed = store.delete_attempt(test.id, index)?;
    println!(
        "Deleted attempt {number} ({}, score {}%) from {}; {} attempt(s) remain",
        removed.source_name,
        removed.score,
        test.name,
        test.attempts().len() - 1
    );
    Ok(())
}
