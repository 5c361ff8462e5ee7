//! Small formatting helpers shared by events and progress lines.

/// Integer percentage of `done` out of `total`, rounded and clamped to 0–100.
///
/// A zero total reports 0 rather than dividing by zero.
pub fn percentage(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (done as f64 * 100.0 / total as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

/// `"downloading 12 B of 20 B (60%)"`
pub fn byte_progress(status: &str, done: u64, total: u64) -> String {
    format!(
        "{status} {done} B of {total} B ({}%)",
        percentage(done, total)
    )
}

/// Join items the way an English sentence would: `"A, B and C"`.
pub fn human_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

/// `word` when there is exactly one thing, `plural` otherwise.
pub fn pluralize<'a>(count: usize, word: &'a str, plural: &'a str) -> &'a str {
    if count == 1 { word } else { plural }
}
