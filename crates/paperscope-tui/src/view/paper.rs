use std::ops::Range;

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;

use paperscope_core::{CacheState, ExtractionKind, ExtractionPayload, Paper, PaperId, RenderMode};

use crate::app::App;
use crate::model::paper::{PaperTab, item_summary};
use crate::theme::Theme;
use crate::view::{breadcrumb, render_footer, spinner_char, truncate};

/// Render the Paper screen: tab strip plus the active tab's body.
pub fn render(f: &mut Frame, app: &App, paper_id: &PaperId) {
    let theme = &app.theme;
    let area = f.area();

    let chunks = Layout::vertical([
        Constraint::Length(1), // breadcrumb
        Constraint::Length(1), // tabs
        Constraint::Min(5),    // body
        Constraint::Length(1), // footer
    ])
    .split(area);

    let Some(paper) = app.session.registry().get(paper_id) else {
        f.render_widget(Paragraph::new(breadcrumb(&["(removed)"], theme)), chunks[0]);
        render_footer(f, chunks[3], app, "Esc:back  q:quit");
        return;
    };

    let title = truncate(&paper.title, 60);
    f.render_widget(Paragraph::new(breadcrumb(&[title.as_str()], theme)), chunks[0]);
    render_tabs(f, chunks[1], app);

    match app.tab.kind() {
        None => render_info(f, chunks[2], app, paper),
        Some(kind) => render_extraction(f, chunks[2], app, kind),
    }

    let hints = match app.tab.kind() {
        None => "h/l:tab  a:ask  e:export report  Esc:back  ?:help  q:quit",
        Some(ExtractionKind::Contributions | ExtractionKind::Experiments) => {
            "h/l:tab  j/k:nav  Enter:detail  r:re-extract  e:json  c:csv  Esc:back"
        }
        Some(_) => "h/l:tab  j/k:nav  Enter:detail  r:re-extract  e:export report  Esc:back",
    };
    render_footer(f, chunks[3], app, hints);
}

/// Range of tabs that fits in `width` columns and contains `selected`.
fn tab_window(widths: &[usize], selected: usize, width: usize) -> Range<usize> {
    let mut start = selected;
    let mut end = selected + 1;
    let mut used = widths.get(selected).copied().unwrap_or(0);
    loop {
        let mut grew = false;
        if end < widths.len() && used + widths[end] <= width {
            used += widths[end];
            end += 1;
            grew = true;
        }
        if start > 0 && used + widths[start - 1] <= width {
            start -= 1;
            used += widths[start];
            grew = true;
        }
        if !grew {
            return start..end;
        }
    }
}

fn render_tabs(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let labels: Vec<String> = (0..PaperTab::COUNT)
        .map(|i| format!(" {} ", PaperTab::from_index(i).label()))
        .collect();
    let widths: Vec<usize> = labels.iter().map(|l| l.chars().count() + 1).collect();
    let selected = app.tab.index();
    let window = tab_window(&widths, selected, (area.width as usize).saturating_sub(4));

    let mut spans = Vec::new();
    if window.start > 0 {
        spans.push(Span::styled("‹ ", Style::default().fg(theme.dim)));
    }
    for i in window.clone() {
        let tab = PaperTab::from_index(i);
        let mut style = match tab.kind() {
            Some(kind) => Style::default().fg(theme.cache_state_color(&app.session.extraction_state(kind))),
            None => Style::default().fg(theme.text),
        };
        if i == selected {
            style = theme.header_style();
        }
        spans.push(Span::styled(labels[i].clone(), style));
        spans.push(Span::raw(" "));
    }
    if window.end < labels.len() {
        spans.push(Span::styled("›", Style::default().fg(theme.dim)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_info(f: &mut Frame, area: Rect, app: &App, paper: &Paper) {
    let theme = &app.theme;
    let label = |name: &'static str| Span::styled(format!("  {name:<10}"), Style::default().fg(theme.dim));
    let value = |v: String| Span::styled(v, Style::default().fg(theme.text));

    let mut lines = vec![
        Line::from(Span::styled(
            format!("  {}", paper.title),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![label("Authors"), value(paper.author_line(8))]),
        Line::from(vec![label("Pages"), value(paper.num_pages.to_string())]),
        Line::from(vec![label("Status"), value(paper.status.clone())]),
        Line::from(vec![label("Id"), value(paper.paper_id.to_string())]),
        Line::from(""),
    ];
    if paper.abstract_text.is_empty() {
        lines.push(Line::from(Span::styled("  No abstract available", Style::default().fg(theme.dim))));
    } else {
        lines.push(Line::from(Span::styled(
            "  ABSTRACT",
            Style::default().fg(theme.active).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("  {}", paper.abstract_text),
            Style::default().fg(theme.text),
        )));
    }
    lines.extend(answer_lines(app, &paper.paper_id));

    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).border_style(theme.border_style()))
        .wrap(Wrap { trim: false });
    f.render_widget(body, area);
}

/// The last question asked about `paper_id` and its answer, if any.
fn answer_lines<'a>(app: &App, paper_id: &PaperId) -> Vec<Line<'a>> {
    let theme = &app.theme;
    let heading = |text: String| {
        Line::from(Span::styled(
            text,
            Style::default().fg(theme.active).add_modifier(Modifier::BOLD),
        ))
    };
    let mut lines = Vec::new();
    if app.ask.is_pending(paper_id) {
        lines.push(Line::from(""));
        lines.push(heading(format!("  {} Waiting for an answer", spinner_char(app.tick))));
        return lines;
    }
    match app.ask.outcome(paper_id) {
        Some(Ok(answer)) => {
            lines.push(Line::from(""));
            lines.push(heading(format!("  Q: {}", answer.query)));
            for para in answer.result.lines() {
                lines.push(Line::from(Span::styled(
                    format!("  {para}"),
                    Style::default().fg(theme.text),
                )));
            }
        }
        Some(Err(error)) => {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("  Question failed: {error}"),
                Style::default().fg(theme.failed),
            )));
        }
        None => {}
    }
    lines
}

fn render_extraction(f: &mut Frame, area: Rect, app: &App, kind: ExtractionKind) {
    let theme = &app.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_style())
        .title(format!(" {} ", kind.label()));

    let message = |text: String, style: Style| {
        Paragraph::new(Line::from(Span::styled(text, style)))
            .block(block.clone())
            .wrap(Wrap { trim: true })
    };

    match app.session.extraction_state(kind) {
        CacheState::Absent => f.render_widget(
            message("  Not extracted yet".into(), Style::default().fg(theme.dim)),
            area,
        ),
        CacheState::Loading => f.render_widget(
            message(
                format!("  {} Extracting {}...", spinner_char(app.tick), kind.label().to_lowercase()),
                Style::default().fg(theme.spinner).add_modifier(Modifier::BOLD),
            ),
            area,
        ),
        CacheState::Error(error) => f.render_widget(
            message(format!("  {error}  (r to retry)"), Style::default().fg(theme.failed)),
            area,
        ),
        CacheState::Ready(payload) if payload.is_empty() => f.render_widget(
            message(
                format!("  No {} found", kind.label().to_lowercase()),
                Style::default().fg(theme.dim),
            ),
            area,
        ),
        CacheState::Ready(payload) => {
            let title = if payload.cached {
                format!(" {} · {} items (cached) ", kind.label(), payload.len())
            } else {
                format!(" {} · {} items ", kind.label(), payload.len())
            };
            let block = block.title(title);
            let table = match kind.render_mode() {
                RenderMode::ContributionGrid => contribution_table(&payload, area, theme),
                RenderMode::ExperimentTable => experiment_table(&payload, area, theme),
                RenderMode::Generic => generic_table(&payload, area, theme),
            };
            let mut state = TableState::default();
            state.select(Some(app.item_cursor));
            f.render_stateful_widget(
                table.block(block).row_highlight_style(theme.highlight_style()),
                area,
                &mut state,
            );
        }
    }
}

fn header_row<'a>(cells: &[&'a str], theme: &Theme) -> Row<'a> {
    Row::new(
        cells
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(theme.text).add_modifier(Modifier::BOLD))),
    )
    .height(1)
}

fn contribution_table<'a>(payload: &ExtractionPayload, area: Rect, theme: &Theme) -> Table<'a> {
    let col = (area.width as usize).saturating_sub(20) / 2;
    let rows: Vec<Row> = payload
        .contributions()
        .into_iter()
        .map(|c| {
            Row::new(vec![
                Cell::from(truncate(&c.contribution_type, 14)).style(Style::default().fg(theme.active)),
                Cell::from(truncate(&c.specific_innovation, col)),
                Cell::from(truncate(&c.problem_addressed, col)).style(Style::default().fg(theme.dim)),
            ])
        })
        .collect();
    Table::new(
        rows,
        [Constraint::Length(15), Constraint::Percentage(50), Constraint::Percentage(50)],
    )
    .header(header_row(&["Type", "Innovation", "Problem"], theme))
}

fn experiment_table<'a>(payload: &ExtractionPayload, area: Rect, theme: &Theme) -> Table<'a> {
    let wide = area.width >= 100;
    let rows: Vec<Row> = payload
        .experiments()
        .into_iter()
        .map(|e| {
            let name = if e.name.is_empty() { e.experiment_id.clone() } else { e.name.clone() };
            let mut cells = vec![
                Cell::from(truncate(&name, 30)).style(Style::default().fg(theme.active)),
                Cell::from(truncate(&e.task, 24)),
                Cell::from(truncate(&e.dataset_names().join(", "), 30)),
            ];
            if wide {
                cells.push(
                    Cell::from(format!("{}", e.results.len())).style(Style::default().fg(theme.dim)),
                );
            }
            Row::new(cells)
        })
        .collect();
    if wide {
        Table::new(
            rows,
            [
                Constraint::Percentage(35),
                Constraint::Percentage(25),
                Constraint::Percentage(30),
                Constraint::Length(8),
            ],
        )
        .header(header_row(&["Experiment", "Task", "Datasets", "Results"], theme))
    } else {
        Table::new(
            rows,
            [Constraint::Percentage(40), Constraint::Percentage(25), Constraint::Percentage(35)],
        )
        .header(header_row(&["Experiment", "Task", "Datasets"], theme))
    }
}

fn generic_table<'a>(payload: &ExtractionPayload, area: Rect, theme: &Theme) -> Table<'a> {
    let width = (area.width as usize).saturating_sub(10);
    let rows: Vec<Row> = payload
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            Row::new(vec![
                Cell::from(format!("{}", i + 1)).style(Style::default().fg(theme.dim)),
                Cell::from(truncate(&item_summary(item), width)),
            ])
        })
        .collect();
    Table::new(rows, [Constraint::Length(4), Constraint::Min(10)])
        .header(header_row(&["#", "Item"], theme))
}
