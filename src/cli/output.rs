//! CLI output formatting utilities.

use crate::rag::RetrievedChapter;
use crate::segmentation::Chapter;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one chapter with its summary and keywords.
    pub fn chapter(index: usize, chapter: &Chapter) {
        println!(
            "\n{} {} {}",
            style(format!("{:>2}.", index + 1)).dim(),
            style(&chapter.title).bold(),
            style(chapter.time_range()).cyan()
        );
        println!("    {}", chapter.summary);
        if !chapter.keywords.is_empty() {
            println!("    {}", style(chapter.keywords.join(", ")).dim());
        }
    }

    /// Print a retrieved chapter with a preview of its transcript text.
    pub fn search_result(rank: usize, hit: &RetrievedChapter) {
        println!(
            "\n{} {} @ {} ({}, score: {:.2})",
            style(format!("[{}]", rank + 1)).green(),
            style(&hit.chapter.title).bold(),
            style(hit.chapter.time_range()).cyan(),
            style(&hit.chapter.video_id).dim(),
            hit.score
        );
        println!("   {}", content_preview(&hit.text, 300));
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format duration in seconds to a human-readable string.
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Flatten newlines and truncate on a character boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42.9), "42s");
        assert_eq!(format_duration(1500.0), "25m 0s");
        assert_eq!(format_duration(3723.0), "1h 2m 3s");
    }

    #[test]
    fn test_content_preview_respects_char_boundaries() {
        assert_eq!(content_preview("kort\ntekst", 20), "kort tekst");
        assert_eq!(content_preview("blåbærsyltetøy", 5), "blåbæ...");
    }
}
