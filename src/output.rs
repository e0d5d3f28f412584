use clap::ValueEnum;
use colored::Colorize;

use crate::error::Result;
use crate::remap::{Policy, RemapReport, RemapStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

/// Progress line printed before each directory move. JSON output stays a
/// single document, so it prints nothing here.
pub fn print_step(step: RemapStep<'_>, format: Format) {
    match format {
        Format::Json => {}
        Format::Pretty | Format::Minimal => match step.policy {
            Policy::Scramble => println!("Scrambling {}", step.old_id),
            Policy::Downgrade => println!("Downgrading {} -> {}", step.old_id, step.new_id),
        },
    }
}

pub fn print_report(report: &RemapReport, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(report)?),
        Format::Pretty => {
            let mode = if report.dry_run { "dry-run" } else { "apply" };
            println!(
                "{} {}",
                report.policy.as_str().bold(),
                format!("({mode})").dimmed()
            );
            println!(
                "  {} {} scanned, {} eligible, {} ignored, {} missing cache, {} unmigrated",
                "entries:".dimmed(),
                report.scan.scanned,
                report.eligible,
                report.scan.ignored,
                report.scan.missing_cache,
                report.scan.unmigrated
            );
            println!("  {} {}", "remapped:".dimmed(), report.remapped.len());
            if report.policy == Policy::Downgrade {
                println!("  {} {}", "already matching:".dimmed(), report.unchanged);
            }
            println!(
                "  {} {} substitutions in {} files",
                "references:".dimmed(),
                report.substitutions(),
                report.files_written()
            );
            println!("  {} {}ms", "elapsed:".dimmed(), report.elapsed_ms);

            if !report.rename_failures.is_empty() {
                println!("\n{}", "Rename failures".red().bold());
                for failure in &report.rename_failures {
                    println!(
                        "  - {}",
                        format!("{} -> {}: {}", failure.old_id, failure.new_id, failure.error)
                            .red()
                    );
                }
            }

            if !report.anomalies.is_empty() {
                println!("\n{}", "Anomalies".yellow().bold());
                for anomaly in &report.anomalies {
                    println!("  - {}", anomaly.yellow());
                }
            }

            if report.dry_run {
                println!("\n{}", "Dry run made no changes.".green());
            } else if report.rename_failures.is_empty() && report.anomalies.is_empty() {
                println!("\n{}", format!("{} complete", report.policy.as_str()).green());
            }
        }
        Format::Minimal => {
            println!(
                "policy={} dry_run={} scanned={} eligible={} remapped={} unchanged={} rename_failures={} anomalies={} substitutions={} files_written={}",
                report.policy.as_str(),
                report.dry_run,
                report.scan.scanned,
                report.eligible,
                report.remapped.len(),
                report.unchanged,
                report.rename_failures.len(),
                report.anomalies.len(),
                report.substitutions(),
                report.files_written()
            );
        }
    }

    Ok(())
}
