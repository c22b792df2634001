use std::fmt;

use console::{measure_text_width, strip_ansi_codes, style, truncate_str};
use itertools::Itertools;

use crate::{
    curriculum::{ProgressSnapshot, TierChange},
    ladder::Ladder,
    trainer::TrainingStats,
    window::WindowEvaluation,
};

const PANE_WIDTH: usize = 66;

/// Fixed-width block of lines under a title, boxed by horizontal rules.
struct Pane {
    name: String,
    width: usize,
    content: Vec<String>,
}

impl fmt::Debug for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {:?}", self.name, self.width, self.content)
    }
}

impl fmt::Display for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "═".repeat(self.width + 4);
        let body = std::iter::once(&self.name)
            .chain(self.content.iter())
            .map(|line| format!("║ {} ║", self.correct_length(line)))
            .join("\n");
        write!(f, "{rule}\n{body}\n{rule}")
    }
}

impl Pane {
    fn new(width: usize, name: String) -> Self {
        Self {
            name,
            width,
            content: Vec::new(),
        }
    }

    fn add_line(&mut self, message: String) {
        self.content.push(message);
    }

    fn add_row(&mut self, key: &str, value: impl fmt::Display) {
        self.add_line(format!("{key:<24}{value}"));
    }

    fn correct_length(&self, message: &str) -> String {
        let truncated = truncate_str(message, self.width, "...").to_string();
        let too_short_by = self.width.saturating_sub(measure_text_width(&truncated));
        format!("{}{}", truncated, " ".repeat(too_short_by))
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

#[must_use]
pub fn render_progress(snapshot: &ProgressSnapshot, stats: Option<&TrainingStats>) -> String {
    let mut pane = Pane::new(PANE_WIDTH, style("Curriculum").bold().to_string());
    pane.add_row(
        "Stage",
        format!(
            "{} - {} (level {}/{})",
            snapshot.current_difficulty,
            snapshot.level_name,
            snapshot.current_level,
            snapshot.total_levels
        ),
    );
    pane.add_row(
        "Games at level",
        format!(
            "{}/{}",
            snapshot.games_at_current_level, snapshot.min_games_required
        ),
    );
    pane.add_row(
        "Promote / demote at",
        format!(
            "{} / {}",
            percent(snapshot.promotion_threshold),
            percent(snapshot.demotion_threshold)
        ),
    );
    if let Some(stats) = stats {
        pane.add_row(
            "Record",
            format!(
                "{}W / {}L / {}D ({:.1}%)",
                stats.win_count, stats.loss_count, stats.draw_count, stats.win_rate
            ),
        );
    }
    pane.to_string()
}

#[must_use]
pub fn render_transition(
    change: TierChange,
    ladder: &Ladder,
    evaluation: Option<WindowEvaluation>,
) -> String {
    let (title, from, to) = match change {
        TierChange::Unchanged => return String::new(),
        TierChange::Promoted { from, to } => (style("CURRICULUM LEVEL UP").green(), from, to),
        TierChange::Demoted { from, to } => (style("CURRICULUM LEVEL DOWN").red(), from, to),
    };
    let mut pane = Pane::new(PANE_WIDTH, title.bold().to_string());
    for (key, index) in [("Previous stage", from), ("New stage", to)] {
        let tier = ladder.tier_or_bottom(index);
        pane.add_row(key, format!("{} ({})", tier.name, tier.label));
    }
    if let Some(eval) = evaluation {
        pane.add_row(
            "Recent win rate",
            format!("{:.1}% over {} games", eval.win_rate * 100.0, eval.sample_size),
        );
    }
    pane.to_string()
}

/// Same text without styling, for log files.
#[must_use]
pub fn plain(rendered: &str) -> String {
    strip_ansi_codes(rendered).to_string()
}
