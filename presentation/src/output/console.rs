//! Console output for the `tools` and `config` subcommands

use colored::Colorize;
use suna_infrastructure::config::{ConfigIssue, Severity};
use suna_infrastructure::tools::RegisteredTool;

/// Formats registry and configuration details for a terminal
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// One block per tool: name, version, description, then its operations.
    pub fn format_tools(tools: &[std::sync::Arc<RegisteredTool>]) -> String {
        if tools.is_empty() {
            return format!("{}\n", "No tools registered.".yellow());
        }

        let mut output = Self::header("Registered Tools");
        for tool in tools {
            output.push_str(&format!(
                "\n{} {}\n  {}\n",
                tool.name.cyan().bold(),
                format!("v{}", tool.version).dimmed(),
                tool.description
            ));
            for op in &tool.operations {
                let tag = op
                    .tag_name()
                    .map(|t| format!(" <{t}>"))
                    .unwrap_or_default();
                output.push_str(&format!(
                    "    {}{} - {}\n",
                    op.name.green(),
                    tag.dimmed(),
                    op.description
                ));
            }
        }
        output
    }

    pub fn format_issues(issues: &[ConfigIssue]) -> String {
        if issues.is_empty() {
            return format!("{}\n", "Configuration OK".green());
        }
        issues
            .iter()
            .map(|issue| {
                let label = match issue.severity {
                    Severity::Error => "error".red().bold(),
                    Severity::Warning => "warning".yellow().bold(),
                };
                format!("{label}: {} {}\n", issue.field.cyan(), issue.message)
            })
            .collect()
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{line}\n  {}\n{line}\n", title.bold())
    }
}
