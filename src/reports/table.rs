//! Plain-text rendering of aggregated reports

use std::fmt::Display;

/// Formats report rows as an aligned two-column table
///
/// # Arguments
///
/// * `name` - Report name, used as the heading
/// * `rows` - Key/value pairs in display order
///
/// # Returns
///
/// The formatted table, ending with a total row count
pub fn format_report<K: Display, V: Display>(name: &str, rows: &[(K, V)]) -> String {
    let keys: Vec<String> = rows.iter().map(|(k, _)| k.to_string()).collect();
    let width = keys.iter().map(String::len).max().unwrap_or(0);

    let mut out = format!("=== {} ===\n\n", name);
    for (key, (_, value)) in keys.iter().zip(rows) {
        out.push_str(&format!("  {:<width$}  {}\n", key, value, width = width));
    }
    out.push_str(&format!("\n{} rows\n", rows.len()));
    out
}

/// Prints report rows to stdout
pub fn print_report<K: Display, V: Display>(name: &str, rows: &[(K, V)]) {
    print!("{}", format_report(name, rows));
}
