use console::style;

use crate::models::ExploitStatus;
use crate::pipeline::{display_name, Stage, WorkflowEvent, WorkflowStatus, WorkflowSummary};

/// Render a workflow event as styled terminal output, returning the formatted line.
pub fn render_event(event: &WorkflowEvent) -> String {
    match event {
        WorkflowEvent::RunStarted { challenge_id, url } => {
            format!(
                "\n{} Starting run {} against {}",
                style("▶").green().bold(),
                style(challenge_id).cyan(),
                style(url).white().bold(),
            )
        }
        WorkflowEvent::StageStarted { stage, iteration } => {
            let pass = if *iteration > 1 { format!(" (pass {})", iteration) } else { String::new() };
            format!(
                "\n{} {}{} {}",
                style("---").cyan().bold(),
                style(display_name(*stage)).cyan().bold(),
                style(pass).dim(),
                style("---").cyan().bold(),
            )
        }
        WorkflowEvent::StageCompleted { stage, progress } => {
            format!(
                "  {} {} {}",
                style("✓").green(),
                style(display_name(*stage)).green(),
                style(format!("{:.0}%", progress * 100.0)).dim(),
            )
        }
        WorkflowEvent::StageFailed { stage, error } => {
            format!(
                "  {} {}: {}",
                style("✗").red(),
                style(display_name(*stage)).red(),
                style(error).red().dim(),
            )
        }
        WorkflowEvent::Transition { from, to } => {
            let target = match to {
                Stage::Run(next) => display_name(*next).to_string(),
                Stage::End(_) => to.to_string(),
            };
            format!("  {} {} -> {}", style("→").dim(), style(display_name(*from)).dim(), style(target).dim())
        }
        WorkflowEvent::ToolInvoked { name } => {
            format!("  {} {}", style("⏳").yellow(), style(name).yellow())
        }
        WorkflowEvent::ExploitAttempted { task, status, indicator_hit } => {
            let marker = match status {
                ExploitStatus::Success => style("✓").green().bold(),
                ExploitStatus::Timeout => style("⌛").yellow(),
                _ if *indicator_hit => style("~").yellow(),
                _ => style("·").dim(),
            };
            format!("  {} {}", marker, style(task).dim())
        }
        WorkflowEvent::FlagFound { flag } => {
            format!("\n{} {}", style("⚑ FLAG FOUND:").green().bold(), style(flag).white().bold())
        }
        WorkflowEvent::Message { text } => {
            format!("  {}", style(text).dim())
        }
        WorkflowEvent::RunFinished { status, flags } => match status {
            WorkflowStatus::Completed if !flags.is_empty() => format!(
                "\n{} {}",
                style("✓ Run complete:").green().bold(),
                style(flags.join(", ")).white().bold(),
            ),
            _ => format!("\n{} {}", style("✗ Run finished without a flag:").red().bold(), style(status).red()),
        },
    }
}

/// Multi-line plain summary printed after a workflow run.
pub fn render_summary(summary: &WorkflowSummary) -> String {
    let stages: Vec<&str> = summary.completed_stages.iter().map(|s| s.as_str()).collect();
    let mut out = format!(
        "{}\n  status: {}\n  stages: {}\n  pages crawled: {}\n  vulnerabilities: {}\n  exploit attempts: {}\n  elapsed: {:.1}s",
        style("Summary").bold(),
        summary.status,
        stages.join(", "),
        summary.pages_crawled,
        summary.vulnerabilities_found,
        summary.exploit_attempts,
        summary.elapsed_secs,
    );
    for flag in &summary.flags_found {
        out.push_str(&format!("\n  flag: {}", style(flag).green().bold()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Outcome, StageName};

    #[test]
    fn test_render_plain_text() {
        console::set_colors_enabled(false);
        let line = render_event(&WorkflowEvent::FlagFound { flag: "flag{x}".into() });
        assert!(line.contains("FLAG FOUND: flag{x}"));

        let line = render_event(&WorkflowEvent::Transition {
            from: StageName::Fuzz,
            to: Stage::End(Outcome::Completed),
        });
        assert!(line.contains("end(completed)"));

        let line = render_event(&WorkflowEvent::RunFinished { status: WorkflowStatus::Failed, flags: vec![] });
        assert!(line.contains("without a flag"));
    }
}
