// Cell coercion for stats tables. The source prints "-" or leaves a cell
// blank when a metric has no value; both count as zero.

/// Leading integer of a cell. `"1,204"` -> 1204, `"12/30"` -> 12, `"-"` -> 0.
pub fn count(cell: &str) -> u32 {
    let digits: String = cell
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// `landed/attempted` cell split into its two halves. A bare number is
/// landed with nothing attempted recorded.
pub fn pair(cell: &str) -> (u32, u32) {
    match cell.split_once('/') {
        Some((landed, attempted)) => (count(landed), count(attempted)),
        None => (count(cell), 0),
    }
}

/// Percentage-like and free-form cells are kept as printed.
pub fn text(cell: &str) -> String {
    cell.trim().to_string()
}

/// Leading number of each `-` separated part, e.g. a `W-L-D` record.
pub fn dashed(value: &str) -> Vec<Option<u32>> {
    value
        .split('-')
        .map(|part| part.trim().parse::<u32>().ok())
        .collect()
}
