use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use paperscope_core::{ExtractionKind, PaperId};

use crate::app::App;
use crate::model::paper::{item_fields, item_summary};
use crate::theme::Theme;
use crate::view::{breadcrumb, render_footer, truncate};

/// Render one extracted item with every field it carries.
pub fn render(f: &mut Frame, app: &App, paper_id: &PaperId, kind: ExtractionKind, index: usize) {
    let theme = &app.theme;
    let area = f.area();

    let chunks = Layout::vertical([
        Constraint::Length(1), // breadcrumb
        Constraint::Min(5),    // scrollable content
        Constraint::Length(1), // footer
    ])
    .split(area);

    let paper_title = app
        .session
        .registry()
        .title_of(paper_id)
        .map(|t| truncate(t, 40))
        .unwrap_or_else(|| paper_id.to_string());
    let item_label = format!("#{}", index + 1);
    f.render_widget(
        Paragraph::new(breadcrumb(
            &[paper_title.as_str(), kind.label(), item_label.as_str()],
            theme,
        )),
        chunks[0],
    );

    let state = app.session.extraction_state(kind);
    let item = state.payload().and_then(|p| p.items.get(index));

    let mut lines: Vec<Line> = Vec::new();
    match item {
        Some(item) => {
            lines.push(Line::from(Span::styled(
                format!("  {}", item_summary(item)),
                Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            for (name, value) in item_fields(item) {
                labeled_line(&mut lines, name, value, theme);
            }
        }
        None => lines.push(Line::from(Span::styled(
            format!("  Item no longer available ({})", state.label()),
            Style::default().fg(theme.dim),
        ))),
    }

    let content = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style()),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));
    f.render_widget(content, chunks[1]);

    render_footer(f, chunks[2], app, "j/k:scroll  e:export  Esc:back  ?:help  q:quit");
}

fn labeled_line(lines: &mut Vec<Line<'_>>, label: String, value: String, theme: &Theme) {
    lines.push(Line::from(vec![
        Span::styled(format!("  {label:<22}"), Style::default().fg(theme.dim)),
        Span::styled(value, Style::default().fg(theme.text)),
    ]));
}
