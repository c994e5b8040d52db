//! Run table rendering

use colored::{ColoredString, Colorize};
use rollout_core::{BatchState, RepoState, Status};

const HEADERS: [&str; 9] = [
    "Repo",
    "PR opened",
    "Checks",
    "PR approved",
    "Atlantis apply",
    "PR merged",
    "PR number",
    "PR URL",
    "Branch",
];

#[derive(Clone, Copy)]
enum Tone {
    Plain,
    Pending,
    Good,
    Bad,
}

struct Cell {
    text: String,
    tone: Tone,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Plain,
        }
    }

    fn status(status: Status) -> Self {
        let tone = match status {
            Status::NotStarted | Status::Started => Tone::Pending,
            Status::Success => Tone::Good,
            Status::Fail => Tone::Bad,
        };
        Self {
            text: status.as_tag().to_string(),
            tone,
        }
    }

    fn optional(value: Option<String>) -> Self {
        match value {
            Some(text) => Self::plain(text),
            None => Self {
                text: "None".to_string(),
                tone: Tone::Pending,
            },
        }
    }

    fn paint(&self, width: usize) -> ColoredString {
        let padded = format!("{:<width$}", self.text, width = width);
        match self.tone {
            Tone::Plain => padded.normal(),
            Tone::Pending => padded.yellow(),
            Tone::Good => padded.green(),
            Tone::Bad => padded.red(),
        }
    }
}

fn row(repo: &RepoState) -> Vec<Cell> {
    let workflow = &repo.workflow;
    vec![
        Cell::plain(repo.name.as_str()),
        Cell::status(workflow.opened),
        Cell::status(workflow.checks),
        Cell::status(workflow.approved),
        Cell::status(workflow.atlantis_apply),
        Cell::status(workflow.merged),
        Cell::optional(repo.pr.number.map(|n| n.to_string())),
        Cell::optional(repo.pr.url.clone()),
        Cell::optional(repo.pr.branch_name.clone()),
    ]
}

/// Render `state` as an aligned table; `repo` limits it to one row
pub fn render(state: &BatchState, repo: Option<&str>) -> String {
    let rows: Vec<Vec<Cell>> = state
        .repos
        .values()
        .filter(|r| repo.is_none_or(|name| r.name == name))
        .map(row)
        .collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.text.chars().count());
        }
    }

    let mut out = String::new();
    out.push_str(&format!("{}\n", state.name.bold()));

    let header: Vec<String> = HEADERS
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{}", format!("{:<w$}", h, w = *w).bold()))
        .collect();
    out.push_str(header.join(" | ").trim_end());
    out.push('\n');

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');

    for cells in &rows {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| cell.paint(*w).to_string())
            .collect();
        out.push_str(line.join(" | ").trim_end());
        out.push('\n');
    }
    out
}
