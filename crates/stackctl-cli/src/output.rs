use serde::Serialize;
use stackctl_exec::{BatchResult, CommandStatus};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

/// One row per command: name, status, duration.
pub fn print_batch(batch: &BatchResult) {
    let rows = batch
        .results
        .iter()
        .map(|r| {
            let status = match r.status {
                CommandStatus::Succeeded => "ok".to_string(),
                CommandStatus::Failed if r.best_effort => "failed (ignored)".to_string(),
                CommandStatus::Failed => "failed".to_string(),
                CommandStatus::Skipped => "skipped".to_string(),
            };
            vec![r.name.clone(), status, format!("{} ms", r.duration_ms)]
        })
        .collect();
    print_table(&["STEP", "STATUS", "TIME"], rows);
}

/// Consolidated warning block, printed once at the end of a run.
pub fn print_warnings(lines: &[String], hint: Option<&str>) {
    if lines.is_empty() {
        return;
    }
    eprintln!();
    eprintln!("warnings:");
    for line in lines {
        eprintln!("  - {line}");
    }
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
}
