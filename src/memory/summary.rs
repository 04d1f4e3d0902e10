use super::log::InteractionEntry;

/// How many of the most recent reflections a summary mentions.
pub const SUMMARY_WINDOW: usize = 3;

/// One-line digest of the latest reflections, oldest of the window first.
pub fn summarize_reflections(entries: &[InteractionEntry]) -> String {
    if entries.is_empty() {
        return "No prior reflections recorded.".to_string();
    }
    let start = entries.len().saturating_sub(SUMMARY_WINDOW);
    let recent: Vec<&str> = entries[start..]
        .iter()
        .map(|e| e.reflection.trim())
        .filter(|r| !r.is_empty())
        .collect();
    if recent.is_empty() {
        return "Reflections captured without content.".to_string();
    }
    format!("Recent reflections: {}", recent.join(" | "))
}
