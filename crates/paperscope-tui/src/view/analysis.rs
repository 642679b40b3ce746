use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Frame;

use paperscope_core::AnalysisKind;

use crate::app::App;
use crate::view::{breadcrumb, render_footer, spinner_char, truncate};

/// Render the analysis screen: kind strip, headline and report rows.
pub fn render(f: &mut Frame, app: &App) {
    let theme = &app.theme;
    let area = f.area();

    let chunks = Layout::vertical([
        Constraint::Length(1), // breadcrumb
        Constraint::Length(1), // kinds
        Constraint::Length(3), // headline
        Constraint::Min(3),    // rows
        Constraint::Length(1), // footer
    ])
    .split(area);

    f.render_widget(Paragraph::new(breadcrumb(&["Analysis"], theme)), chunks[0]);
    render_kinds(f, chunks[1], app);
    render_headline(f, chunks[2], app);
    render_rows(f, chunks[3], app);
    render_footer(f, chunks[4], app, "h/l:analysis  j/k:scroll  r:rerun  Esc:back  ?:help");
}

fn render_kinds(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let spans: Vec<Span> = AnalysisKind::ALL
        .iter()
        .flat_map(|kind| {
            let style = if *kind == app.analysis.kind {
                theme.header_style()
            } else {
                Style::default().fg(theme.text)
            };
            [Span::styled(format!(" {} ", kind.label()), style), Span::raw(" ")]
        })
        .collect();
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_headline(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let state = &app.analysis;

    let line = if state.pending {
        Line::from(Span::styled(
            format!(" {} Analyzing {} papers...", spinner_char(app.tick), state.paper_ids.len()),
            Style::default().fg(theme.spinner).add_modifier(Modifier::BOLD),
        ))
    } else if let Some(error) = &state.error {
        Line::from(Span::styled(format!(" {error}"), Style::default().fg(theme.failed)))
    } else if let Some(report) = &state.report {
        Line::from(Span::styled(
            format!(" {}", report.headline()),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from(Span::styled(
            " Mark papers in the library with space, then press A",
            Style::default().fg(theme.dim),
        ))
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_style())
        .title(format!(" {} marked papers ", app.marked.len()));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_rows(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let rows = app
        .analysis
        .report
        .as_ref()
        .map(|r| r.rows())
        .unwrap_or_default();

    let label_width = (area.width as usize / 3).max(12);
    let detail_width = (area.width as usize).saturating_sub(label_width + 4);
    let table_rows: Vec<Row> = rows
        .into_iter()
        .skip(app.analysis.scroll)
        .map(|(label, detail)| {
            Row::new(vec![
                Cell::from(truncate(&label, label_width)).style(Style::default().fg(theme.active)),
                Cell::from(truncate(&detail, detail_width)).style(Style::default().fg(theme.text)),
            ])
        })
        .collect();

    let table = Table::new(
        table_rows,
        [Constraint::Length(label_width as u16), Constraint::Min(10)],
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_style())
            .title(format!(" {} ", app.analysis.kind.label())),
    );
    f.render_widget(table, area);
}
