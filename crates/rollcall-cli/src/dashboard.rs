//! Read-only attendance dashboard rendered as a text table.

use std::path::Path;

/// Render the ledger as a two-column table.
///
/// A missing or malformed ledger renders as an empty table — header and
/// rule only, never an error.
pub fn render(ledger_path: &Path) -> String {
    let rows = rollcall_ledger::read_for_display(ledger_path);

    let name_width = rows
        .iter()
        .map(|(name, _)| name.len())
        .chain(std::iter::once("Name".len()))
        .max()
        .unwrap_or(4);

    let mut out = format!("{:<name_width$}  Time\n", "Name");
    out.push_str(&format!("{}  {}\n", "-".repeat(name_width), "-".repeat(19)));
    for (name, time) in &rows {
        out.push_str(&format!("{name:<name_width$}  {time}\n"));
    }
    out
}

/// Render the ledger rows as JSON for machine consumers.
pub fn render_json(ledger_path: &Path) -> String {
    let rows: Vec<_> = rollcall_ledger::read_for_display(ledger_path)
        .into_iter()
        .map(|(name, time)| serde_json::json!({ "name": name, "time": time }))
        .collect();
    serde_json::Value::Array(rows).to_string()
}
