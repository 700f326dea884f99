//! The `studydiag trend` command.

use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Cell, Table};
use serde::Serialize;

use studydiag_core::trend::{moving_average, score_series, TrendPoint};

use super::{find_test, open_store, Paths};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TrendFormat {
    Text,
    Json,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrendOutput<'a> {
    test_id: String,
    test_name: &'a str,
    window: usize,
    points: &'a [TrendPoint],
}

pub fn execute(
    paths: &Paths,
    test: String,
    window: Option<usize>,
    format: TrendFormat,
) -> Result<()> {
    let config = paths.load_config()?;
    let store = open_store(&config)?;
    let test = find_test(&store, &test)?;

    let window = window.unwrap_or(config.trend_window).max(1);
    let points = moving_average(&score_series(&test), window);

    match format {
        TrendFormat::Json => {
            let output = TrendOutput {
                test_id: test.id.to_string(),
                test_name: &test.name,
                window,
                points: &points,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        TrendFormat::Text => {
            if points.is_empty() {
                println!("{} has no attempts yet.", test.name);
                return Ok(());
            }
            let mut table = Table::new();
            table.set_header(vec![
                "Attempt".to_string(),
                "Score".to_string(),
                format!("Trend ({window})"),
            ]);
            for p in &points {
                table.add_row(vec![
                    Cell::new(p.x),
                    Cell::new(format!("{}%", p.score)),
                    Cell::new(format!("{}%", p.trend)),
                ]);
            }
            println!("{}: score trend", test.name);
            println!("{table}");
        }
    }
    Ok(())
}
