//! Console output for the datetidy CLI.
//!
//! Status lines are colored by kind; moves get a progress bar and a
//! per-extension summary once a run is done. Diagnostics go through
//! `tracing` instead, see [`crate::logging`].

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Kind of a one-line status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Done,
    Failed,
    Caution,
}

impl Status {
    fn mark(self) -> ColoredString {
        match self {
            Status::Done => "✓".green(),
            Status::Failed => "✗".red(),
            Status::Caution => "!".yellow().bold(),
        }
    }
}

/// Prints everything the CLI shows to the user.
pub struct OutputFormatter;

impl OutputFormatter {
    /// A completed step, e.g. a saved manifest.
    ///
    /// ```no_run
    /// use datetidy::output::OutputFormatter;
    /// OutputFormatter::success("Manifest saved");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", Status::Done.mark(), message);
    }

    /// Goes to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", Status::Failed.mark(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", Status::Caution.mark(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(title: &str) {
        println!("\n{}", title.bold().underline());
    }

    /// Progress bar sized to the number of planned moves.
    ///
    /// The message slot shows the file currently being moved.
    pub fn create_progress_bar(planned_moves: u64) -> ProgressBar {
        let style = ProgressStyle::with_template("{prefix} {wide_bar:.green/white} {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let pb = ProgressBar::new(planned_moves).with_style(style);
        pb.set_prefix("moving");
        pb
    }

    /// Prints how many files went into each extension folder.
    ///
    /// ```no_run
    /// use datetidy::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let counts = BTreeMap::from([("jpg".to_string(), 15), ("pdf".to_string(), 8)]);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(bucket_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("Moved by extension");
        for line in summary_lines(bucket_counts, total_files) {
            println!("{}", line);
        }
    }

    pub fn dry_run_notice(message: &str) {
        println!("{} {}", "(dry run)".yellow().bold(), message.yellow());
    }
}

/// Plain-text rows of the extension summary, aligned on the count column.
fn summary_lines(bucket_counts: &BTreeMap<String, usize>, total_files: usize) -> Vec<String> {
    const TOTAL: &str = "total";

    let label_width = bucket_counts
        .keys()
        .map(String::len)
        .chain(std::iter::once(TOTAL.len()))
        .max()
        .unwrap_or_default();
    let count_width = total_files.to_string().len();

    let row = |label: &str, count: usize| {
        format!(
            "  {:<label_width$}  {:>count_width$} {}",
            label,
            count,
            file_word(count)
        )
    };

    let mut lines: Vec<String> = bucket_counts
        .iter()
        .map(|(bucket, count)| row(bucket, *count))
        .collect();
    lines.push(row(TOTAL, total_files));
    lines
}

fn file_word(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
