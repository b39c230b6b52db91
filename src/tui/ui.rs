//! UI rendering for the interactive view.
//!
//! One screen: scenario title, a paginator with one dot per block, the
//! current step with its description and command, the block's output, and
//! a help line. Hosted environments get the plain command log instead.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph, Wrap},
    Frame,
};

use super::input::Keymap;
use super::theme::Theme;
use crate::engine::{BlockStatus, InteractiveModel};

const SPINNER_FRAMES: [&str; 4] = ["-", "\\", "|", "/"];

/// Everything a frame is drawn from.
pub struct View<'a> {
    pub model: &'a InteractiveModel,
    pub theme: &'a Theme,
    pub keymap: &'a Keymap,
    /// Tick counter driving the spinner
    pub tick: usize,
}

/// Draw the interactive view.
pub fn draw(frame: &mut Frame, view: &View<'_>) {
    if view.model.environment().is_hosted() {
        draw_command_log(frame, view);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),      // Title
            Constraint::Length(1),      // Paginator
            Constraint::Min(6),         // Current step
            Constraint::Percentage(35), // Output
            Constraint::Length(1),      // Help
        ])
        .split(frame.area());

    draw_title(frame, view, chunks[0]);
    draw_paginator(frame, view, chunks[1]);
    draw_step(frame, view, chunks[2]);
    draw_output(frame, view, chunks[3]);
    draw_help(frame, view, chunks[4]);
}

fn draw_title(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let theme = view.theme;
    let title = Paragraph::new(Line::from(Span::styled(
        format!(" {} ", view.model.title()),
        Style::default().fg(theme.primary).add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(title, area);
}

fn draw_paginator(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let theme = view.theme;
    let current = view.model.current();
    let mut spans = vec![Span::raw(" ")];
    for (index, block) in view.model.blocks().iter().enumerate() {
        let color = match block.status() {
            BlockStatus::Success => theme.success,
            BlockStatus::Failure => theme.error,
            BlockStatus::Pending if index == current => theme.primary,
            BlockStatus::Pending => theme.text_muted,
        };
        let dot = if index == current { "●" } else { "•" };
        spans.push(Span::styled(format!("{dot} "), Style::default().fg(color)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_step(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let theme = view.theme;
    let Some(block) = view.model.block(view.model.current()) else {
        let done = Paragraph::new(Span::styled("All steps completed.", Style::default().fg(theme.success)));
        frame.render_widget(done, area);
        return;
    };

    let mut lines = Vec::new();
    if !block.code_block.description.is_empty() {
        for line in block.code_block.description.lines() {
            lines.push(Line::from(Span::styled(line, Style::default().fg(theme.text_dim))));
        }
        lines.push(Line::default());
    }
    for line in block.code_block.content.lines() {
        lines.push(Line::from(vec![
            Span::styled("  $ ", Style::default().fg(theme.text_muted)),
            Span::styled(line, Style::default().fg(theme.secondary)),
        ]));
    }

    let title = if block.step_name.is_empty() {
        format!(" Step {} ", block.step_number + 1)
    } else {
        format!(" Step {} - {} ", block.step_number + 1, block.step_name)
    };
    let step = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .title(title)
            .title_style(Style::default().fg(theme.primary).add_modifier(Modifier::BOLD))
            .padding(Padding::horizontal(1)),
    );
    frame.render_widget(step, area);
}

fn draw_output(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let theme = view.theme;
    let model = view.model;

    let (title, content, color) = if model.is_executing() {
        let spinner = SPINNER_FRAMES[view.tick % SPINNER_FRAMES.len()];
        (" Output ", format!("{spinner} executing..."), theme.warning)
    } else {
        match model.block(model.current()) {
            Some(block) if block.succeeded() => (" Output ", block.stdout.clone(), theme.text),
            Some(block) if block.failed() => {
                let mut content = block.stderr.clone();
                if let Some(ref error) = block.error {
                    if !content.is_empty() && !content.ends_with('\n') {
                        content.push('\n');
                    }
                    content.push_str(&error.to_string());
                }
                (" Error ", content, theme.error)
            }
            _ => (" Output ", String::new(), theme.text),
        }
    };

    let lines: Vec<Line> =
        content.lines().map(|line| Line::from(Span::styled(line.to_string(), Style::default().fg(color)))).collect();

    let output = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .title(title)
            .title_style(Style::default().fg(theme.secondary))
            .padding(Padding::horizontal(1)),
    );
    frame.render_widget(output, area);
}

fn draw_help(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let theme = view.theme;
    let keymap = view.keymap;

    if let Some(digits) = view.model.recording() {
        let prompt = Paragraph::new(Line::from(vec![
            Span::styled(" run next: ", Style::default().fg(theme.accent)),
            Span::styled(format!("{digits}_"), Style::default().fg(theme.text)),
        ]));
        frame.render_widget(prompt, area);
        return;
    }

    let mut spans = Vec::new();
    let execute_many = format!("{}<n>", keymap.execute_many);
    let entries = [
        (keymap.execute.to_string(), "execute"),
        (keymap.execute_all.to_string(), "execute all"),
        (execute_many, "execute n"),
        ("←/→".to_string(), "navigate"),
        (keymap.pause.to_string(), "pause"),
        (keymap.quit.to_string(), "quit"),
    ];
    for (key, description) in entries {
        spans.push(Span::styled(format!(" {key}"), Style::default().fg(theme.secondary).add_modifier(Modifier::BOLD)));
        spans.push(Span::styled(format!(" {description} "), Style::default().fg(theme.text_muted)));
    }
    if view.model.remaining() > 0 {
        spans.push(Span::styled(
            format!("│ {} queued", view.model.remaining()),
            Style::default().fg(theme.accent),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_command_log(frame: &mut Frame, view: &View<'_>) {
    let theme = view.theme;
    let lines: Vec<Line> = view
        .model
        .command_lines()
        .iter()
        .flat_map(|entry| entry.lines())
        .map(|line| Line::from(Span::styled(line.to_string(), Style::default().fg(theme.text))))
        .collect();

    let visible = frame.area().height as usize;
    let skip = lines.len().saturating_sub(visible);
    let log = Paragraph::new(lines.into_iter().skip(skip).collect::<Vec<_>>());
    frame.render_widget(log, frame.area());
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use ratatui::{backend::TestBackend, Terminal};

    use super::*;
    use crate::azure::NoResources;
    use crate::core::EnvState;
    use crate::document::CodeBlock;
    use crate::engine::{InteractiveContext, Policies};
    use crate::environment::Environment;
    use crate::scenario::{group_into_steps, Scenario};

    fn model(environment: Environment) -> InteractiveModel {
        let mut block = CodeBlock::new("bash", "echo hello", "Say hello");
        block.description = "Greets the reader.".to_string();
        let scenario = Scenario {
            name: "Greeting".into(),
            steps: group_into_steps(vec![block, CodeBlock::new("bash", "echo bye", "Say bye")]),
            environment: BTreeMap::new(),
            markdown: String::new(),
            properties: BTreeMap::new(),
        };
        InteractiveModel::new(
            &scenario,
            InteractiveContext {
                environment,
                subscription: String::new(),
                policies: Policies::default(),
                state: EnvState::new("/nonexistent/execdoc-ui-state"),
                resources: Arc::new(NoResources),
            },
        )
    }

    fn render(model: &InteractiveModel) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let theme = Theme::default();
        let keymap = Keymap::default();
        let view = View { model, theme: &theme, keymap: &keymap, tick: 0 };
        terminal.draw(|frame| draw(frame, &view)).unwrap();
        terminal.backend().buffer().content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_renders_current_step() {
        let screen = render(&model(Environment::Local));
        assert!(screen.contains("Greeting"));
        assert!(screen.contains("Step 1 - Say hello"));
        assert!(screen.contains("Greets the reader."));
        assert!(screen.contains("echo hello"));
        assert!(screen.contains("execute all"));
    }

    #[test]
    fn test_hosted_renders_command_log() {
        let screen = render(&model(Environment::Azure));
        assert!(screen.contains("$ echo hello"));
        assert!(!screen.contains("Step 1"));
    }
}
