//! Output formatters for test-run reports
//!
//! Provides Table, JSON, CSV, and summary output formats.

use std::io::Write;

use crate::models::{BinaryEntry, BinaryOutcome, BinaryStatus, RunReport};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Report formatter
pub struct ReportFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ReportFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn format_outcome_row(&self, outcome: &BinaryOutcome) -> String {
        let status_str = match (outcome.status, self.colorize) {
            (BinaryStatus::Passed, true) => "\x1b[32m✓ PASS\x1b[0m",
            (BinaryStatus::Failed, true) => "\x1b[31m✗ FAIL\x1b[0m",
            (BinaryStatus::Passed, false) => "✓ PASS",
            (BinaryStatus::Failed, false) => "✗ FAIL",
        };

        let mut row = format!(
            "{:32} {:16} {:14} {} [{:>8}ms]",
            truncate(&outcome.name(), 32),
            outcome.kind.as_str(),
            outcome.branch.as_deref().unwrap_or("-"),
            status_str,
            outcome.duration_ms
        );
        if let (Some(stage), Some(msg)) = (outcome.stage, &outcome.message) {
            row.push_str(&format!("\n    {}: {}", stage, msg));
        }
        row
    }

    /// Format a whole test-run report
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_report_table(report),
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Csv => outcomes_csv(&report.outcomes).unwrap_or_default(),
            OutputFormat::Summary => self.format_report_brief(report),
        }
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  Test-run ({:8}) {:52} ║\n",
            report.mode,
            truncate(&report.repository_url, 52)
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════════════════╝\n");

        for outcome in &report.outcomes {
            output.push_str(&format!("  {}\n", self.format_outcome_row(outcome)));
        }

        output.push_str(" ──────────────────────────────────────────────────────────────────────────\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", report.passed)
        } else {
            report.passed.to_string()
        };
        let fail_str = if self.colorize && report.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", report.failed)
        } else {
            report.failed.to_string()
        };

        output.push_str(&format!(
            "  Total: {} | Pass: {} | Fail: {} | Pass Rate: {:.1}% | Duration: {}ms\n",
            report.total,
            pass_str,
            fail_str,
            report.pass_rate(),
            report.total_duration_ms
        ));

        output
    }

    fn format_report_brief(&self, report: &RunReport) -> String {
        let mut output = format!(
            "{}/{} binaries passed ({:.1}%) in {}ms",
            report.passed,
            report.total,
            report.pass_rate(),
            report.total_duration_ms
        );
        for failure in report.failures() {
            output.push_str(&format!("\n  {failure}"));
        }
        output
    }

    /// Format the binaries a test-run would cover
    pub fn format_binaries(&self, entries: &[BinaryEntry]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(entries).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(entries).unwrap_or_default(),
            OutputFormat::Csv => binaries_csv(entries).unwrap_or_default(),
            OutputFormat::Table | OutputFormat::Summary => {
                let mut output = String::new();
                for (index, entry) in entries.iter().enumerate() {
                    output.push_str(&format!(
                        "{:3}. {:16} {}\n",
                        index + 1,
                        entry.kind().as_str(),
                        entry.path().display()
                    ));
                }
                output.push_str(&format!("{} binaries", entries.len()));
                output
            }
        }
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Write a report to a file
pub fn write_report_to_file(
    path: &str,
    report: &RunReport,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let formatter = ReportFormatter::new(format).no_color();
    let content = formatter.format_report(report);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

/// Outcomes as CSV with a header row
fn outcomes_csv(outcomes: &[BinaryOutcome]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        "binary",
        "kind",
        "status",
        "stage",
        "branch",
        "exit_code",
        "duration_ms",
        "message",
    ])?;

    for outcome in outcomes {
        wtr.write_record([
            outcome.binary.display().to_string(),
            outcome.kind.to_string(),
            outcome.status.to_string(),
            outcome.stage.map(|s| s.to_string()).unwrap_or_default(),
            outcome.branch.clone().unwrap_or_default(),
            outcome.exit_code.map(|c| c.to_string()).unwrap_or_default(),
            outcome.duration_ms.to_string(),
            outcome.message.clone().unwrap_or_default(),
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn binaries_csv(entries: &[BinaryEntry]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["path", "kind"])?;
    for entry in entries {
        wtr.write_record([entry.path().display().to_string(), entry.kind().to_string()])?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
