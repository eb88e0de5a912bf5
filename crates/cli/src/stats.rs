//! Summaries printed after an apply

use hearth_engine::ApplyReport;
use owo_colors::OwoColorize;

/// One-line summary of an apply, plus one line per failure
pub fn print_summary(report: &ApplyReport, dry_run: bool) {
    let applied = report.applied.len();
    let failed = report.errors.len();

    if dry_run {
        println!(
            "{} {} would be applied",
            "●".bright_green(),
            applied.to_string().bright_white().bold()
        );
    } else if failed > 0 {
        println!(
            "{} {} applied | {} {} failed",
            "●".bright_green(),
            applied.to_string().bright_green().bold(),
            "●".bright_red(),
            failed.to_string().bright_red().bold(),
        );
    } else {
        println!(
            "{} {} applied",
            "●".bright_green(),
            applied.to_string().bright_green().bold()
        );
    }

    if !report.skipped.is_empty() {
        println!("  {}", format!("{} skipped", report.skipped.len()).dimmed());
    }
    for (target, err) in &report.errors {
        println!("  {} {target}: {err}", "✗".bright_red());
    }
}
