//! The `studydiag init` command.

use anyhow::Result;

use studydiag_providers::config::{LOCAL_CONFIG_FILE, SAMPLE_CONFIG};

pub fn execute() -> Result<()> {
    if std::path::Path::new(LOCAL_CONFIG_FILE).exists() {
        println!("{LOCAL_CONFIG_FILE} already exists, skipping.");
    } else {
        std::fs::write(LOCAL_CONFIG_FILE, SAMPLE_CONFIG)?;
        println!("Created {LOCAL_CONFIG_FILE}");
    }

    println!("\nNext steps:");
    println!("  1. Export GEMINI_API_KEY (or edit {LOCAL_CONFIG_FILE})");
    println!("  2. Run: studydiag new-test --name \"Algebra midterm\" --subject Math");
    println!("  3. Run: studydiag analyze --test \"Algebra midterm\" --attempt-file answers.pdf");

    Ok(())
}
