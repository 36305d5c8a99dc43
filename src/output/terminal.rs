// Colored terminal output for reports, verdicts and the allow-list.

use colored::Colorize;

use super::truncate_chars;
use crate::classify::Verdict;
use crate::evaluator::{Evaluation, ItemOutcome};
use crate::scope::Scope;
use crate::stats::Report;

/// Widest URL shown before truncation.
const URL_WIDTH: usize = 60;

/// Display a scope's stats report.
pub fn display_report(scope: &Scope, report: &Report) {
    println!("\n{}", format!("=== Recycler Stats (scope {scope}) ===").bold());
    // Only meaningful when reported by a running bot
    if !report.uptime.is_empty() {
        println!("  {:<26} {}", "Uptime".dimmed(), report.uptime);
    }
    println!("  {:<26} {}", "Messages Recycled".dimmed(), report.recycles.to_string().bold());
    println!("  {:<26} {}", "Links in Database".dimmed(), report.links);
    println!("  {:<26} {}", "Image Hashes in Database".dimmed(), report.images);
    println!();
}

/// Display per-item verdicts for an evaluated message.
pub fn display_evaluation(evaluation: &Evaluation) {
    if evaluation.items.is_empty() {
        println!("No links found.");
        return;
    }

    for item in &evaluation.items {
        let url = truncate_chars(&item.url, URL_WIDTH);
        match &item.outcome {
            ItemOutcome::Classified {
                verdict,
                fingerprint,
                ..
            } => {
                let label = colorize_verdict(*verdict);
                match fingerprint {
                    Some(fp) => println!("  {label:<10} {url} {}", format!("[{fp}]").dimmed()),
                    None => println!("  {label:<10} {url}"),
                }
            }
            ItemOutcome::Dropped(reason) => {
                println!("  {:<10} {url} {}", "dropped".dimmed(), format!("({reason:?})").dimmed());
            }
        }
    }

    println!();
    if evaluation.flagged {
        println!("{}", "♻️  Repost: message would be recycled.".bright_red().bold());
    } else {
        println!("{}", "Nothing recycled.".green());
    }
}

/// Display the persisted allow-list.
pub fn display_allow_list(hosts: &[String]) {
    if hosts.is_empty() {
        println!("Allow-list is empty.");
        return;
    }
    println!("{}", format!("Allow-listed hosts ({}):", hosts.len()).bold());
    for host in hosts {
        println!("  {host}");
    }
}

fn colorize_verdict(verdict: Verdict) -> colored::ColoredString {
    match verdict {
        Verdict::Duplicate => "duplicate".bright_red(),
        Verdict::Fresh => "fresh".green(),
        Verdict::Exempt => "exempt".bright_blue(),
    }
}
