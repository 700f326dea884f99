//! The `studydiag tests` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{open_store, short_id, Paths};

pub fn execute(paths: &Paths) -> Result<()> {
    let config = paths.load_config()?;
    let store = open_store(&config)?;
    let tests = store.tests();

    if tests.is_empty() {
        println!("No tests yet. Create one with `studydiag new-test --name <name> --subject <subject>`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Id", "Name", "Subject", "Attempts", "Latest score"]);
    for test in &tests {
        let latest = test
            .attempts()
            .latest()
            .map(|a| format!("{}%", a.score))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(short_id(&test.id)),
            Cell::new(&test.name),
            Cell::new(test.subject.to_string()),
            Cell::new(test.attempts().len()),
            Cell::new(latest),
        ]);
    }

    println!("{table}");
    Ok(())
}
