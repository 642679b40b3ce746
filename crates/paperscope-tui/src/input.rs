use ratatui::crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::action::Action;

/// Map a crossterm terminal event to a TUI action.
///
/// While a text prompt is open, printable keys go to the prompt instead of
/// being interpreted as shortcuts.
pub fn map_event(event: &Event, editing: bool) -> Action {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            if editing {
                map_prompt_key(key)
            } else {
                map_key(key)
            }
        }
        Event::Resize(w, h) => Action::Resize(*w, *h),
        _ => Action::None,
    }
}

fn map_prompt_key(key: &KeyEvent) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }
    match key.code {
        KeyCode::Char(c) => Action::InputChar(c),
        KeyCode::Backspace => Action::InputBackspace,
        KeyCode::Enter => Action::InputSubmit,
        KeyCode::Esc => Action::InputCancel,
        _ => Action::None,
    }
}

fn map_key(key: &KeyEvent) -> Action {
    // Ctrl+C always quits
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Char('j') | KeyCode::Down => Action::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => Action::MoveUp,
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => Action::NextTab,
        KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => Action::PrevTab,
        KeyCode::Enter => Action::DrillIn,
        KeyCode::Esc => Action::NavigateBack,
        KeyCode::Char('g') => Action::GoTop,
        KeyCode::Char('G') => Action::GoBottom,
        KeyCode::Char('r') => Action::Refresh,
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::PageDown,
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::PageUp,
        KeyCode::Char('d') => Action::RemovePaper,
        KeyCode::Char(' ') => Action::ToggleMark,
        KeyCode::Char('u') => Action::StartUpload,
        KeyCode::Char('a') => Action::Ask,
        KeyCode::Char('A') => Action::OpenAnalysis,
        KeyCode::Char('v') => Action::OpenVisualize,
        KeyCode::Char('/') | KeyCode::Char('i') => Action::EditQuery,
        KeyCode::Char('n') => Action::NextExample,
        KeyCode::Char('f') => Action::ToggleFullscreen,
        KeyCode::Char('t') => Action::ToggleVerification,
        KeyCode::Char('w') => Action::SaveVisualization,
        KeyCode::Char('e') => Action::Export,
        KeyCode::Char('c') => Action::ExportCsv,
        KeyCode::Char('s') => Action::CycleSort,
        KeyCode::Char('?') => Action::ToggleHelp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::Home => Action::GoTop,
        KeyCode::End => Action::GoBottom,
        _ => Action::None,
    }
}
