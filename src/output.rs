//! Output formatting and styling module.
//!
//! Provides the interactive mode's terminal output: coloured status lines,
//! the "watching" spinner and the end-of-session summary table.

use crate::file_category::Category;
use crate::listener::MoveEvent;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// OutputFormatter::error("Please select a downloads folder.");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates the spinner shown while the engine is watching.
    ///
    /// Lines printed through [`ProgressBar::println`] appear above it.
    pub fn watch_spinner(message: String) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    /// Formats the status line for one sorted file.
    pub fn moved_line(event: &MoveEvent) -> String {
        let name = event
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| event.source.display().to_string());
        format!(
            "{} {} {} File moved to {} folder",
            "✓".green(),
            event.at.format("%H:%M:%S").to_string().dimmed(),
            name,
            event.category.dir_name().bold()
        )
    }

    /// Prints a summary table with sorted-file counts by category.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::file_category::Category;
    /// use dirsort::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert(Category::Pdfs, 3);
    /// counts.insert(Category::Images, 8);
    /// OutputFormatter::summary_table(&counts);
    /// ```
    pub fn summary_table(category_counts: &BTreeMap<Category, usize>) {
        Self::header("SUMMARY");

        let total_files: usize = category_counts.values().sum();
        let width = category_counts
            .keys()
            .map(|category| category.dir_name().len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category.dir_name(),
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::MoveOutcome;
    use std::path::PathBuf;

    #[test]
    fn test_moved_line_mentions_file_and_folder() {
        colored::control::set_override(false);
        let event = MoveEvent::new(
            PathBuf::from("/dl/report.PDF"),
            Category::Pdfs,
            MoveOutcome::Moved(PathBuf::from("/dl/PDFs/report.PDF")),
        );

        let line = OutputFormatter::moved_line(&event);
        assert!(line.contains("report.PDF"));
        assert!(line.ends_with("File moved to PDFs folder"));
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1), "file");
        assert_eq!(plural(0), "files");
        assert_eq!(plural(2), "files");
    }
}
