use tabled::{settings::Style, Table, Tabled};
use crate::model::{Repository, Workflow};

#[derive(Tabled)]
pub struct WorkflowRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Updated")]
    pub updated_at: String,
}

impl From<&Workflow> for WorkflowRow {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id.clone(),
            name: workflow.name.clone(),
            state: workflow.state.to_string(),
            path: workflow.path.clone(),
            updated_at: workflow.updated_at.clone(),
        }
    }
}

#[derive(Tabled)]
pub struct RepositoryRow {
    #[tabled(rename = "Repository")]
    pub name: String,
    #[tabled(rename = "Owner")]
    pub owner: String,
    #[tabled(rename = "Token")]
    pub token: String,
}

impl From<&Repository> for RepositoryRow {
    fn from(repo: &Repository) -> Self {
        Self {
            name: repo.name.clone(),
            owner: repo.owner.clone(),
            token: mask_token(&repo.token),
        }
    }
}

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

fn render<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn workflow_table(workflows: &[Workflow]) -> String {
    let rows: Vec<WorkflowRow> = workflows.iter().map(WorkflowRow::from).collect();
    render(&rows)
}

pub fn repository_table(repos: &[Repository]) -> String {
    let rows: Vec<RepositoryRow> = repos.iter().map(RepositoryRow::from).collect();
    render(&rows)
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    let rows: Vec<TableRow> = stats
        .iter()
        .map(|(label, value)| TableRow {
            metric: label.to_string(),
            value: value.clone(),
        })
        .collect();
    render(&rows)
}

/// Keep the last four characters of a token, enough to tell tokens apart
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
