//! The `studydiag subject` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use studydiag_core::model::Subject;

use super::{open_store, Paths};

pub fn execute(paths: &Paths, subject: String) -> Result<()> {
    let subject: Subject = subject.parse().map_err(anyhow::Error::msg)?;
    let config = paths.load_config()?;
    let store = open_store(&config)?;

    let attempts = store.attempts_by_subject(&subject);
    if attempts.is_empty() {
        println!("No {subject} attempts yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Test", "Attempt", "File", "Score", "Uploaded"]);
    for found in &attempts {
        table.add_row(vec![
            Cell::new(&found.test_name),
            Cell::new(found.index + 1),
            Cell::new(&found.attempt.source_name),
            Cell::new(format!("{}%", found.attempt.score)),
            Cell::new(found.attempt.timestamp.format("%Y-%m-%d %H:%M")),
        ]);
    }

    let total: u64 = attempts.iter().map(|a| u64::from(a.attempt.score)).sum();
    println!("{subject}: {} attempt(s)", attempts.len());
    println!("{table}");
    println!(
        "Average score: {:.1}%",
        total as f64 / attempts.len() as f64
    );
    Ok(())
}
