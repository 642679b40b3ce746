use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::theme::Theme;

/// Render the help overlay as a centered popup.
pub fn render(f: &mut Frame, theme: &Theme) {
    let area = f.area();
    let popup = centered_rect(64, 48, area);

    let lines = vec![
        Line::from(Span::styled(
            " Keyboard Shortcuts ",
            Style::default()
                .fg(theme.header_fg)
                .bg(theme.header_bg)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        section_header("Navigation", theme),
        key_line("j / ↓", "Move down", theme),
        key_line("k / ↑", "Move up", theme),
        key_line("Ctrl+d / PgDn", "Page down", theme),
        key_line("Ctrl+u / PgUp", "Page up", theme),
        key_line("g / G", "Go to top / bottom", theme),
        key_line("Enter", "Open paper / item", theme),
        key_line("Esc", "Go back", theme),
        Line::from(""),
        section_header("Library", theme),
        key_line("space", "Mark paper for visualization", theme),
        key_line("u", "Upload a PDF", theme),
        key_line("d", "Remove paper / dismiss failed upload", theme),
        key_line("s", "Cycle sort order", theme),
        key_line("r", "Reload papers from the server", theme),
        Line::from(""),
        section_header("Paper", theme),
        key_line("h / l / Tab", "Previous / next extraction", theme),
        key_line("r", "Re-run the current extraction", theme),
        key_line("e", "Export (JSON, or report as Markdown)", theme),
        key_line("c", "Export as CSV", theme),
        key_line("a", "Ask a question about the paper", theme),
        Line::from(""),
        section_header("Analysis", theme),
        key_line("A", "Analyze the marked papers", theme),
        key_line("h / l / Tab", "Previous / next analysis", theme),
        key_line("r", "Run the analysis again", theme),
        Line::from(""),
        section_header("Visualize", theme),
        key_line("v", "Open the visualize screen", theme),
        key_line("/ or i", "Edit the query", theme),
        key_line("n", "Next example query", theme),
        key_line("Enter", "Generate", theme),
        key_line("r", "Regenerate the last visualization", theme),
        key_line("t", "Show source data", theme),
        key_line("f", "Fullscreen preview", theme),
        key_line("w", "Save as a sandboxed HTML page", theme),
        Line::from(""),
        section_header("Global", theme),
        key_line("?", "Toggle this help", theme),
        key_line("q", "Quit", theme),
        key_line("Ctrl+c", "Force quit", theme),
    ];

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.active))
                .title(" Help "),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup);
    f.render_widget(paragraph, popup);
}

fn section_header<'a>(title: &'a str, theme: &Theme) -> Line<'a> {
    Line::from(Span::styled(
        format!("  {title}"),
        Style::default()
            .fg(theme.active)
            .add_modifier(Modifier::BOLD),
    ))
}

fn key_line<'a>(key: &'a str, desc: &'a str, theme: &Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("    {key:<16}"), Style::default().fg(theme.text)),
        Span::styled(desc, Style::default().fg(theme.dim)),
    ])
}

/// Create a centered rectangle of the given width (columns) and height (rows).
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .split(area);
    Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .split(vertical[0])[0]
}
