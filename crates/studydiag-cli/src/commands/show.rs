//! The `studydiag show` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use studydiag_core::mistakes::repeated_mistakes;
use studydiag_core::model::Test;
use studydiag_core::trend::{ImprovementSummary, Progress};

use super::{attempt_index, find_test, open_store, Paths};

pub fn execute(paths: &Paths, test: String, number: Option<usize>) -> Result<()> {
    let config = paths.load_config()?;
    let store = open_store(&config)?;
    let test = find_test(&store, &test)?;

    if test.attempts().is_empty() {
        println!(
            "{} ({}) has no attempts yet. Add one with `studydiag analyze`.",
            test.name, test.subject
        );
        return Ok(());
    }

    let selected = number
        .map(|n| attempt_index(n, test.attempts().len()))
        .transpose()?;
    let (index, _) = test
        .resolve_selection(selected)
        .ok_or_else(|| anyhow::anyhow!("{} has no attempts", test.name))?;
    print_attempt(&test, index);
    Ok(())
}

/// Print the attempt at `index` with the test-wide progress sections.
pub fn print_attempt(test: &Test, index: usize) {
    let attempts = test.attempts();
    let Some(attempt) = attempts.get(index) else {
        return;
    };
    let feedback = &attempt.feedback;

    println!(
        "{} ({}): attempt {} of {}, {}",
        test.name,
        test.subject,
        index + 1,
        attempts.len(),
        attempt.source_name
    );
    println!("\nScore: {}%", attempt.score);

    match Progress::for_test(test) {
        Some(Progress::Improved(points)) => println!("Improved by {points}% since the previous attempt"),
        Some(Progress::Dropped(points)) => println!("Dropped by {points}% since the previous attempt"),
        Some(Progress::Unchanged) => println!("No change since last attempt"),
        None => {}
    }

    println!("\nDiagnosis");
    println!("  {}", feedback.diagnosis);

    println!("\nMistakes");
    if feedback.quoted_mistakes.is_empty() {
        println!("  none");
    }
    for m in &feedback.quoted_mistakes {
        println!("  You wrote: \"{}\"", m.student_quote);
        println!("    Issue: {}", m.issue);
        println!("    Better: {}", m.better_answer);
    }

    println!("\nStrengths");
    if feedback.strengths.is_empty() {
        println!("  none");
    }
    for s in &feedback.strengths {
        println!("  \"{}\": {}", s.student_quote, s.why_its_good);
    }

    println!("\nStudy plan");
    for (i, step) in feedback.study_plan.iter().enumerate() {
        println!("  {}. {step}", i + 1);
    }

    let repeated = repeated_mistakes(attempts);
    if !repeated.is_empty() {
        println!("\nRepeated mistakes");
        for r in &repeated {
            println!("  \"{}\" repeated {} times", r.quote, r.count);
        }
    }

    if let Some(summary) = ImprovementSummary::for_test(test) {
        println!("\nImprovement summary");
        println!("  Fixed:");
        for quote in &summary.fixed {
            println!("    {quote}");
        }
        println!("  Still weak:");
        for quote in &summary.still_weak {
            println!("    {quote}");
        }
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "File", "Score", "Uploaded"]);
    for (i, a) in attempts.iter().enumerate() {
        let marker = if i == index { format!("{} *", i + 1) } else { (i + 1).to_string() };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(&a.source_name),
            Cell::new(format!("{}%", a.score)),
            Cell::new(a.timestamp.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("\nUpload history\n{table}");
}
