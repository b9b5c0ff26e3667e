use crate::model::{Workflow, WorkflowState};
use crate::ui::{theme, Icons};
use indicatif::HumanDuration;
use owo_colors::OwoColorize;
use std::time::Duration;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn state_label(state: WorkflowState) -> String {
    let icon = match state {
        WorkflowState::Active => Icons::ACTIVE,
        WorkflowState::Disabled => Icons::DISABLED,
    };
    format!("{} {}", icon, state.as_str().style(theme().state(state)))
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// Every field of one workflow, one per line
pub fn workflow_details(workflow: &Workflow) {
    section(&format!(" {} ", workflow.name));
    summary_row("id        ", &workflow.id);
    summary_row("node id   ", &workflow.node_id);
    summary_row("state     ", &state_label(workflow.state));
    summary_row("path      ", &workflow.path);
    summary_row("created   ", &workflow.created_at);
    summary_row("updated   ", &workflow.updated_at);
    summary_row("api       ", &workflow.url);
    summary_row("html      ", &workflow.html_url);
    summary_row("badge     ", &workflow.badge_url);
}

pub fn sync_summary(duration: Duration, repos: usize, workflows: usize, failed: usize) {
    println!();
    println!(
        "{} {}",
        Icons::CHECK.style(theme().success.clone()),
        format!("Sync finished in {}", HumanDuration(duration)).style(theme().success.clone())
    );
    println!(
        "  {} {} repos  {} {} workflows  {} {} failed",
        Icons::DATABASE.style(theme().info.clone()),
        repos,
        Icons::PACKAGE.style(theme().info.clone()),
        workflows,
        Icons::CROSS.style(theme().info.clone()),
        failed
    );
}
