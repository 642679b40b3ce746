use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::{App, PromptKind};
use crate::theme::Theme;

pub mod analysis;
pub mod detail;
pub mod help;
pub mod library;
pub mod paper;
pub mod visualize;

/// Spinner frames for animated progress indication.
const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Get the current spinner character based on a tick counter.
pub fn spinner_char(tick: usize) -> char {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

/// Truncate a string to fit in `max_width` columns, appending "…" if truncated.
pub fn truncate(s: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if s.chars().count() <= max_width {
        return s.to_string();
    }
    let mut truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// " PAPERSCOPE  > a > b" breadcrumb line.
pub fn breadcrumb<'a>(crumbs: &[&'a str], theme: &Theme) -> Line<'a> {
    let mut spans = vec![Span::styled(" PAPERSCOPE ", theme.header_style())];
    for (i, crumb) in crumbs.iter().enumerate() {
        spans.push(Span::styled(" > ", Style::default().fg(theme.dim)));
        let style = if i + 1 == crumbs.len() {
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text)
        };
        spans.push(Span::styled(*crumb, style));
    }
    Line::from(spans)
}

/// Footer line: the open prompt if any, otherwise the status message and key hints.
pub fn render_footer(f: &mut Frame, area: Rect, app: &App, hints: &str) {
    let theme = &app.theme;
    let line = if let Some(prompt) = &app.prompt {
        let label = match prompt.kind {
            PromptKind::Query => " Query: ",
            PromptKind::UploadPath => " Upload PDF: ",
            PromptKind::Question => " Ask: ",
        };
        Line::from(vec![
            Span::styled(label, Style::default().fg(theme.active).add_modifier(Modifier::BOLD)),
            Span::styled(format!("{}_", prompt.buffer), Style::default().fg(theme.text)),
            Span::styled("  Enter:submit  Esc:cancel", theme.footer_style()),
        ])
    } else {
        let mut spans = Vec::new();
        if let Some(status) = &app.status {
            spans.push(Span::styled(
                format!(" {} ", truncate(status, area.width as usize / 2)),
                Style::default().fg(theme.text),
            ));
            spans.push(Span::styled("|", theme.footer_style()));
        }
        spans.push(Span::styled(format!(" {hints}"), theme.footer_style()));
        Line::from(spans)
    };
    f.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("héllo", 5), "héllo");
        assert_eq!(truncate("héllo world", 5), "héll…");
        assert_eq!(truncate("abc", 0), "");
    }
}
