use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use paperscope_core::HeightSource;

use crate::app::{App, PromptKind};
use crate::view::{breadcrumb, render_footer, spinner_char, truncate};

/// Render the visualize screen: query, status, preview and the verification pane.
pub fn render(f: &mut Frame, app: &App) {
    let theme = &app.theme;
    let state = &app.visualize;
    let area = f.area();

    let chunks = if state.fullscreen {
        Layout::vertical([
            Constraint::Length(0),
            Constraint::Length(0),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area)
    } else {
        Layout::vertical([
            Constraint::Length(1), // breadcrumb
            Constraint::Length(4), // query + status
            Constraint::Min(5),    // preview
            Constraint::Length(1), // footer
        ])
        .split(area)
    };

    if !state.fullscreen {
        f.render_widget(Paragraph::new(breadcrumb(&["Visualize"], theme)), chunks[0]);
        render_query(f, chunks[1], app);
    }

    let body = if state.show_verification && !state.fullscreen {
        let cols = Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[2]);
        render_verification(f, cols[1], app);
        cols[0]
    } else {
        chunks[2]
    };
    render_preview(f, body, app);

    render_footer(
        f,
        chunks[3],
        app,
        "/:query  n:example  Enter:generate  r:regenerate  t:verify  f:fullscreen  w:save  Esc:back",
    );
}

fn render_query(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let state = &app.visualize;
    let editing = matches!(&app.prompt, Some(p) if p.kind == PromptKind::Query);

    let query_line = if editing {
        let buffer = app.prompt.as_ref().map(|p| p.buffer.as_str()).unwrap_or("");
        Line::from(Span::styled(
            format!(" {buffer}_"),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        ))
    } else if state.query.is_empty() {
        Line::from(Span::styled(
            " Press / to describe a visualization, or n for an example",
            Style::default().fg(theme.dim),
        ))
    } else {
        Line::from(Span::styled(format!(" {}", state.query), Style::default().fg(theme.text)))
    };

    let status_line = if state.pending {
        Line::from(Span::styled(
            format!(" {} Generating...", spinner_char(app.tick)),
            Style::default().fg(theme.spinner).add_modifier(Modifier::BOLD),
        ))
    } else if let Some(error) = &state.error {
        Line::from(Span::styled(format!(" {error}"), Style::default().fg(theme.failed)))
    } else if let Some(path) = &state.saved {
        Line::from(Span::styled(
            format!(" Saved {}", path.display()),
            Style::default().fg(theme.ready),
        ))
    } else {
        let marked = app.marked_ids().len();
        Line::from(Span::styled(
            format!(" {marked} papers marked for visualization"),
            Style::default().fg(theme.dim),
        ))
    };

    let border = if editing { theme.active } else { theme.border };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(" Query ");
    f.render_widget(Paragraph::new(vec![query_line, status_line]).block(block), area);
}

fn render_preview(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let state = &app.visualize;

    let Some(result) = &state.result else {
        let hint = Paragraph::new(Line::from(Span::styled(
            "  Mark papers in the library with space, then generate a visualization here",
            Style::default().fg(theme.dim),
        )))
        .block(Block::default().borders(Borders::ALL).border_style(theme.border_style()));
        f.render_widget(hint, area);
        return;
    };

    let mut title = format!(
        " {} · {} papers · {} ",
        truncate(&result.query, 40),
        result.paper_ids.len(),
        result.generated_at.format("%H:%M:%S"),
    );
    if let Some(frame) = state.frame {
        let source = match frame.source {
            HeightSource::Measured => "fit",
            HeightSource::Capped => "capped",
            HeightSource::Minimum => "min",
            HeightSource::Fallback => "fallback",
        };
        title.push_str(&format!("frame {}px ({source}) ", frame.height));
    }

    let lines: Vec<Line> = state
        .preview
        .iter()
        .skip(state.scroll)
        .map(|text| Line::from(Span::styled(format!(" {text}"), Style::default().fg(theme.text))))
        .collect();

    let preview = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style())
                .title(title),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(preview, area);
}

fn render_verification(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let state = &app.visualize;

    let (text, style) = match (&state.verification, &state.result) {
        (Some(sample), _) if sample.is_empty() => (
            "No contributions could be sampled for these papers".to_string(),
            Style::default().fg(theme.dim),
        ),
        (Some(sample), _) => (sample.to_pretty_json(), Style::default().fg(theme.text)),
        (None, Some(_)) => (
            format!("{} Sampling extracted data...", spinner_char(app.tick)),
            Style::default().fg(theme.spinner),
        ),
        (None, None) => (String::new(), Style::default()),
    };

    let pane = Paragraph::new(text)
        .style(style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style())
                .title(" Source data "),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(pane, area);
}
