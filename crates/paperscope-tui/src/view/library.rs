use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;

use crate::app::App;
use crate::model::library::UploadPhase;
use crate::view::{render_footer, spinner_char, truncate};

/// Render the Library screen.
pub fn render(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::vertical([
        Constraint::Length(1), // header
        Constraint::Min(5),    // table
        Constraint::Length(1), // footer
    ])
    .split(area);

    render_header(f, chunks[0], app);
    render_table(f, chunks[1], app);
    render_footer(
        f,
        chunks[2],
        app,
        "j/k:nav  Enter:open  space:mark  u:upload  d:remove  v:visualize  s:sort  ?:help  q:quit",
    );
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let mut spans = vec![
        Span::styled(" PAPERSCOPE ", theme.header_style()),
        Span::styled(" Library", Style::default().fg(theme.text).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!("  {} papers, {} marked", app.session.registry().len(), app.marked.len()),
            Style::default().fg(theme.dim),
        ),
    ];
    match &app.health {
        Some(Ok(health)) => {
            let healthy = health.status == "healthy" || health.status == "ok";
            let mut label = format!("  backend {}", health.status);
            if !health.llm.is_empty() {
                label.push_str(&format!(" · llm {}", health.llm));
            }
            if let Some(provider) = &health.provider {
                label.push_str(&format!(" ({provider})"));
            }
            spans.push(Span::styled(label, Style::default().fg(theme.health_color(healthy))));
        }
        Some(Err(error)) => spans.push(Span::styled(
            format!("  backend unreachable: {}", truncate(error, 40)),
            Style::default().fg(theme.failed),
        )),
        None => spans.push(Span::styled(
            format!("  {} checking backend", spinner_char(app.tick)),
            Style::default().fg(theme.dim),
        )),
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_table(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let wide = area.width >= 100;

    let header_cells = if wide {
        vec!["", "#", "Title", "Authors", "Pages", "Status"]
    } else {
        vec!["", "#", "Title", "Pages"]
    };
    let header = Row::new(
        header_cells
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(theme.text).add_modifier(Modifier::BOLD))),
    )
    .height(1);

    let papers = app.session.registry().papers();
    let selected = app.session.selected_paper();
    let title_width = if wide {
        (area.width as usize).saturating_sub(60)
    } else {
        (area.width as usize).saturating_sub(20)
    };

    let mut rows: Vec<Row> = app
        .library_sorted
        .iter()
        .enumerate()
        .map(|(display_idx, &paper_idx)| {
            let paper = &papers[paper_idx];
            let mark = if app.marked.contains(&paper.paper_id) { "*" } else { "" };
            let title_style = if selected == Some(&paper.paper_id) {
                Style::default().fg(theme.active)
            } else {
                Style::default().fg(theme.text)
            };
            let mut cells = vec![
                Cell::from(mark).style(Style::default().fg(theme.marked).add_modifier(Modifier::BOLD)),
                Cell::from(format!("{}", display_idx + 1)),
                Cell::from(truncate(&paper.title, title_width)).style(title_style),
            ];
            if wide {
                cells.push(
                    Cell::from(truncate(&paper.author_line(2), 28)).style(Style::default().fg(theme.dim)),
                );
            }
            cells.push(Cell::from(if paper.num_pages > 0 {
                format!("{}", paper.num_pages)
            } else {
                "—".to_string()
            }));
            if wide {
                let status = if paper.status.is_empty() { "—" } else { paper.status.as_str() };
                cells.push(Cell::from(status.to_string()).style(Style::default().fg(theme.ready)));
            }
            Row::new(cells)
        })
        .collect();

    rows.extend(app.pending_uploads.iter().map(|upload| {
        let style = theme.upload_phase_style(&upload.phase);
        let status = match &upload.phase {
            UploadPhase::Uploading => format!("{} {}", spinner_char(app.tick), upload.phase.label()),
            UploadPhase::Failed(error) => format!("{}: {error}", upload.phase.label()),
        };
        let mut cells = vec![
            Cell::from(""),
            Cell::from("↑"),
            Cell::from(truncate(&upload.filename, title_width)).style(style),
        ];
        if wide {
            cells.push(Cell::from(""));
            cells.push(Cell::from(""));
            cells.push(Cell::from(status).style(style));
        } else {
            cells.push(Cell::from(truncate(&status, 12)).style(style));
        }
        Row::new(cells)
    }));

    let widths = if wide {
        vec![
            Constraint::Length(1),
            Constraint::Length(4),
            Constraint::Min(20),
            Constraint::Length(30),
            Constraint::Length(6),
            Constraint::Length(16),
        ]
    } else {
        vec![
            Constraint::Length(1),
            Constraint::Length(4),
            Constraint::Min(15),
            Constraint::Length(12),
        ]
    };

    let title = if rows.is_empty() {
        " No papers yet: press u to upload a PDF ".to_string()
    } else {
        format!(" Sort: {} (s) ", app.sort_order.label())
    };

    let table = Table::new(rows, &widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style())
                .title(title),
        )
        .row_highlight_style(theme.highlight_style());

    let mut state = TableState::default();
    state.select(Some(app.library_cursor));
    f.render_stateful_widget(table, area, &mut state);
}
