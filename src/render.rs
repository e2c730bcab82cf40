use crate::models::{Record, StoreStats};

const HEADERS: [&str; 7] = ["#", "Name", "Dosage", "Frequency", "Taken", "Last taken", "Notes"];

/// Plain-text table of `(index, record)` rows; positions are shown 1-based.
pub fn records_table(rows: &[(usize, &Record)]) -> String {
    if rows.is_empty() {
        return "No medications.".to_string();
    }

    let cells: Vec<[String; 7]> = rows
        .iter()
        .map(|(index, record)| {
            [
                (index + 1).to_string(),
                record.name.clone(),
                record.dosage.clone(),
                record.frequency.clone(),
                if record.taken { "yes" } else { "no" }.to_string(),
                record.last_taken_at.clone().unwrap_or_default(),
                record.notes.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(format_row(HEADERS.iter().copied(), &widths));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &cells {
        lines.push(format_row(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

pub fn stats(stats: &StoreStats) -> String {
    format!(
        "Total medications: {}\nTaken: {}\nPending: {}\nCompletion rate: {:.1}%",
        stats.total,
        stats.taken,
        stats.pending,
        stats.completion_rate()
    )
}

pub fn taken_list(records: &[&Record]) -> String {
    if records.is_empty() {
        return "No medications taken yet.".to_string();
    }
    records
        .iter()
        .map(|record| record.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
