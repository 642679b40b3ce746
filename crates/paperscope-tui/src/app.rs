use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use paperscope_core::{
    AnalysisKind, AnalysisRequest, ApiClient, CacheKey, CacheState, ExportFormat, ExportRequest, ExportTarget, ExtractionKind,
    GuestFrame, Health, LayoutEstimateFrame, PaperId, PaperQuestion, SandboxedDocument, Session,
    SettleHook,
    ValidationError, View, VisualizationRequest, sandbox::readable_text,
};

use crate::action::Action;
use crate::backend::{self, EventTx};
use crate::model::analysis::AnalysisState;
use crate::model::ask::AskState;
use crate::model::library::{PendingUpload, SortOrder, UploadPhase, sorted_indices};
use crate::model::paper::PaperTab;
use crate::model::visualize::VisualizeState;
use crate::theme::Theme;
use crate::tui_event::BackendEvent;

/// Which screen is currently displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Library,
    Paper(PaperId),
    /// (paper, kind, item index)
    ItemDetail(PaperId, ExtractionKind, usize),
    Visualize,
    Analysis,
}

/// What an open text prompt feeds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Query,
    UploadPath,
    /// Question about the paper on screen.
    Question,
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub buffer: String,
}

/// Forward every settled extraction to the event loop.
pub fn settle_hook(tx: EventTx) -> SettleHook {
    Arc::new(move |key: &CacheKey, state: &CacheState| {
        let _ = tx.send(BackendEvent::ExtractionSettled {
            key: key.clone(),
            state: state.clone(),
        });
    })
}

/// Main application state.
pub struct App {
    pub session: Session<ApiClient>,
    tx: EventTx,
    cancel: CancellationToken,
    pub screen: Screen,
    pub library_cursor: usize,
    pub sort_order: SortOrder,
    /// Maps visual row index → index into the registry (recomputed on change).
    pub library_sorted: Vec<usize>,
    pub pending_uploads: Vec<PendingUpload>,
    /// Papers picked for the next visualization.
    pub marked: BTreeSet<PaperId>,
    pub tab: PaperTab,
    pub item_cursor: usize,
    pub detail_scroll: u16,
    pub visualize: VisualizeState,
    pub ask: AskState,
    pub analysis: AnalysisState,
    pub prompt: Option<Prompt>,
    pub health: Option<Result<Health, String>>,
    pub status: Option<String>,
    pub export_dir: PathBuf,
    pub tick: usize,
    pub theme: Theme,
    pub should_quit: bool,
    pub show_help: bool,
    /// Height of the visible table area (set on resize, used for page up/down).
    pub visible_rows: usize,
}

impl App {
    pub fn new(
        session: Session<ApiClient>,
        tx: EventTx,
        cancel: CancellationToken,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            session,
            tx,
            cancel,
            screen: Screen::Library,
            library_cursor: 0,
            sort_order: SortOrder::Added,
            library_sorted: Vec::new(),
            pending_uploads: Vec::new(),
            marked: BTreeSet::new(),
            tab: PaperTab::Info,
            item_cursor: 0,
            detail_scroll: 0,
            visualize: VisualizeState::default(),
            ask: AskState::default(),
            analysis: AnalysisState::default(),
            prompt: None,
            health: None,
            status: None,
            export_dir,
            tick: 0,
            theme: Theme::lab(),
            should_quit: false,
            show_help: false,
            visible_rows: 20,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.prompt.is_some()
    }

    /// Recompute `library_sorted` based on the current `sort_order`.
    pub fn recompute_sorted_indices(&mut self) {
        self.library_sorted = sorted_indices(self.session.registry().papers(), self.sort_order);
        let rows = self.library_rows();
        if self.library_cursor >= rows {
            self.library_cursor = rows.saturating_sub(1);
        }
    }

    /// Papers first, then uploads still in flight or failed.
    pub fn library_rows(&self) -> usize {
        self.library_sorted.len() + self.pending_uploads.len()
    }

    /// Paper under the library cursor, if the cursor is on a paper row.
    pub fn cursor_paper(&self) -> Option<PaperId> {
        let idx = *self.library_sorted.get(self.library_cursor)?;
        self.session
            .registry()
            .papers()
            .get(idx)
            .map(|p| p.paper_id.clone())
    }

    /// The marked papers in library order.
    pub fn marked_ids(&self) -> Vec<PaperId> {
        self.session
            .registry()
            .ids()
            .into_iter()
            .filter(|id| self.marked.contains(id))
            .collect()
    }

    /// Items of the current extraction tab, if loaded.
    pub fn item_count(&self) -> usize {
        self.tab
            .kind()
            .and_then(|kind| self.session.extraction_state(kind).payload().map(|p| p.len()))
            .unwrap_or(0)
    }

    fn view_for_screen(&self) -> View {
        match &self.screen {
            Screen::Library | Screen::Analysis => View::Library,
            Screen::Paper(_) => self.tab.view(),
            Screen::ItemDetail(_, kind, _) => View::Extraction(*kind),
            Screen::Visualize => View::Visualize,
        }
    }

    /// Tell the session which view is showing; extraction tabs fetch on demand.
    fn sync_view(&mut self) {
        let view = self.view_for_screen();
        self.session.activate(view);
    }

    pub fn start_uploads(&mut self, paths: Vec<PathBuf>) {
        for path in paths {
            self.pending_uploads
                .push(PendingUpload::new(backend::display_name(&path)));
            backend::spawn_upload(
                self.session.uploader(),
                path,
                self.tx.clone(),
                self.cancel.clone(),
            );
        }
    }

    pub fn start_sync(&mut self) {
        backend::spawn_sync(self.session.backend().clone(), self.tx.clone());
    }

    pub fn check_health(&mut self) {
        backend::spawn_health(self.session.backend().clone(), self.tx.clone());
    }

    /// Process a user action and update state. Returns true if the app should quit.
    pub fn update(&mut self, action: Action) -> bool {
        if self.prompt.is_some() {
            return self.update_prompt(action);
        }

        // When help overlay is shown, only allow a few actions through
        if self.show_help {
            match action {
                Action::Quit => {
                    self.should_quit = true;
                    return true;
                }
                Action::ToggleHelp | Action::NavigateBack => {
                    self.show_help = false;
                }
                Action::Tick => {
                    self.tick = self.tick.wrapping_add(1);
                }
                Action::Resize(_w, h) => {
                    self.visible_rows = (h as usize).saturating_sub(6);
                }
                _ => {}
            }
            return false;
        }

        match action {
            Action::Quit => {
                self.should_quit = true;
                return true;
            }
            Action::ToggleHelp => {
                self.show_help = true;
            }
            Action::NavigateBack => self.navigate_back(),
            Action::DrillIn => self.drill_in(),
            Action::MoveDown => self.move_by(1),
            Action::MoveUp => self.move_by(-1),
            Action::PageDown => self.move_by(self.visible_rows.max(1) as isize),
            Action::PageUp => self.move_by(-(self.visible_rows.max(1) as isize)),
            Action::GoTop => self.move_by(isize::MIN),
            Action::GoBottom => self.move_by(isize::MAX),
            Action::NextTab | Action::PrevTab if self.screen == Screen::Analysis => {
                let kind = if action == Action::NextTab {
                    self.analysis.kind.next()
                } else {
                    self.analysis.kind.prev()
                };
                self.run_analysis(kind);
            }
            Action::NextTab | Action::PrevTab => {
                if let Screen::Paper(_) = self.screen {
                    self.tab = if action == Action::NextTab {
                        self.tab.next()
                    } else {
                        self.tab.prev()
                    };
                    self.item_cursor = 0;
                    self.sync_view();
                }
            }
            Action::Refresh => self.refresh(),
            Action::RemovePaper => self.remove_under_cursor(),
            Action::ToggleMark => {
                if self.screen == Screen::Library {
                    if let Some(id) = self.cursor_paper() {
                        if !self.marked.remove(&id) {
                            self.marked.insert(id);
                        }
                    }
                }
            }
            Action::StartUpload => {
                if self.screen == Screen::Library {
                    self.prompt = Some(Prompt {
                        kind: PromptKind::UploadPath,
                        buffer: String::new(),
                    });
                }
            }
            Action::Ask => {
                if let Screen::Paper(_) = self.screen {
                    self.prompt = Some(Prompt {
                        kind: PromptKind::Question,
                        buffer: String::new(),
                    });
                }
            }
            Action::OpenAnalysis => {
                self.screen = Screen::Analysis;
                self.sync_view();
                self.run_analysis(self.analysis.kind);
            }
            Action::OpenVisualize => {
                self.screen = Screen::Visualize;
                self.sync_view();
            }
            Action::EditQuery => {
                if self.screen == Screen::Visualize {
                    self.prompt = Some(Prompt {
                        kind: PromptKind::Query,
                        buffer: self.visualize.query.clone(),
                    });
                }
            }
            Action::NextExample => {
                if self.screen == Screen::Visualize {
                    self.visualize.next_example();
                }
            }
            Action::ToggleFullscreen => {
                if self.screen == Screen::Visualize {
                    self.visualize.fullscreen = !self.visualize.fullscreen;
                }
            }
            Action::ToggleVerification => {
                if self.screen == Screen::Visualize {
                    self.visualize.show_verification = !self.visualize.show_verification;
                }
            }
            Action::SaveVisualization => {
                if self.screen == Screen::Visualize {
                    self.save_visualization();
                }
            }
            Action::Export => self.export(false),
            Action::ExportCsv => self.export(true),
            Action::CycleSort => {
                if self.screen == Screen::Library {
                    self.sort_order = self.sort_order.next();
                    self.recompute_sorted_indices();
                }
            }
            Action::Tick => {
                self.tick = self.tick.wrapping_add(1);
            }
            Action::Resize(_w, h) => {
                // Rough estimate: total height minus header/footer/borders
                self.visible_rows = (h as usize).saturating_sub(6);
            }
            Action::InputChar(_)
            | Action::InputBackspace
            | Action::InputSubmit
            | Action::InputCancel
            | Action::None => {}
        }
        false
    }

    fn update_prompt(&mut self, action: Action) -> bool {
        let Some(prompt) = self.prompt.as_mut() else {
            return false;
        };
        match action {
            Action::Quit => {
                self.should_quit = true;
                return true;
            }
            Action::InputChar(c) => prompt.buffer.push(c),
            Action::InputBackspace => {
                prompt.buffer.pop();
            }
            Action::InputCancel => self.prompt = None,
            Action::InputSubmit => {
                if let Some(prompt) = self.prompt.take() {
                    self.submit_prompt(prompt);
                }
            }
            Action::Tick => self.tick = self.tick.wrapping_add(1),
            Action::Resize(_w, h) => self.visible_rows = (h as usize).saturating_sub(6),
            _ => {}
        }
        false
    }

    fn submit_prompt(&mut self, prompt: Prompt) {
        match prompt.kind {
            PromptKind::Query => {
                self.visualize.query = prompt.buffer;
                self.generate();
            }
            PromptKind::Question => {
                if let Screen::Paper(paper_id) = &self.screen {
                    let paper_id = paper_id.clone();
                    self.ask_question(paper_id, &prompt.buffer);
                }
            }
            PromptKind::UploadPath => {
                let path = prompt.buffer.trim();
                if !path.is_empty() {
                    self.start_uploads(vec![PathBuf::from(path)]);
                }
            }
        }
    }

    fn navigate_back(&mut self) {
        match &self.screen {
            Screen::ItemDetail(paper_id, _, _) => {
                // item_cursor is preserved (not reset)
                self.screen = Screen::Paper(paper_id.clone());
            }
            Screen::Paper(_) | Screen::Visualize | Screen::Analysis | Screen::Library => {
                self.screen = Screen::Library;
                self.visualize.fullscreen = false;
            }
        }
        self.sync_view();
    }

    fn drill_in(&mut self) {
        match &self.screen {
            Screen::Library => {
                if let Some(paper_id) = self.cursor_paper() {
                    self.session.select_paper(Some(paper_id.clone()));
                    self.screen = Screen::Paper(paper_id);
                    self.item_cursor = 0;
                    self.sync_view();
                }
            }
            Screen::Paper(paper_id) => {
                if let Some(kind) = self.tab.kind() {
                    if self.item_cursor < self.item_count() {
                        self.detail_scroll = 0;
                        self.screen =
                            Screen::ItemDetail(paper_id.clone(), kind, self.item_cursor);
                    }
                }
            }
            Screen::Visualize => self.generate(),
            Screen::ItemDetail(..) | Screen::Analysis => {}
        }
    }

    /// Move the cursor (or scroll) of the current screen, clamped to its content.
    fn move_by(&mut self, delta: isize) {
        fn step(current: usize, delta: isize, max: usize) -> usize {
            let next = if delta < 0 {
                current.saturating_sub(delta.unsigned_abs())
            } else {
                current.saturating_add(delta as usize)
            };
            next.min(max)
        }

        match &self.screen {
            Screen::Library => {
                let max = self.library_rows().saturating_sub(1);
                self.library_cursor = step(self.library_cursor, delta, max);
            }
            Screen::Paper(_) => {
                let max = self.item_count().saturating_sub(1);
                self.item_cursor = step(self.item_cursor, delta, max);
            }
            Screen::ItemDetail(..) => {
                // clamped by Paragraph rendering
                self.detail_scroll = step(self.detail_scroll as usize, delta, u16::MAX as usize) as u16;
            }
            Screen::Visualize => {
                let max = self.visualize.preview.len().saturating_sub(1);
                self.visualize.scroll = step(self.visualize.scroll, delta, max);
            }
            Screen::Analysis => {
                let max = self.analysis.row_count().saturating_sub(1);
                self.analysis.scroll = step(self.analysis.scroll, delta, max);
            }
        }
    }

    fn refresh(&mut self) {
        match &self.screen {
            Screen::Library => {
                self.start_sync();
                self.check_health();
            }
            Screen::Paper(_) => match self.tab.kind() {
                Some(kind) => {
                    self.item_cursor = 0;
                    self.session.invalidate(kind);
                }
                None => self.start_sync(),
            },
            Screen::ItemDetail(..) => {}
            Screen::Visualize => self.regenerate(),
            Screen::Analysis => self.run_analysis(self.analysis.kind),
        }
    }

    fn remove_under_cursor(&mut self) {
        if self.screen != Screen::Library {
            return;
        }
        if let Some(paper_id) = self.cursor_paper() {
            if let Some(paper) = self.session.remove_paper(&paper_id) {
                self.marked.remove(&paper_id);
                self.ask.forget(&paper_id);
                self.status = Some(format!("Removed {}", paper.title));
            }
        } else {
            // Cursor sits on an upload row; only failed ones can be dismissed.
            let idx = self.library_cursor.saturating_sub(self.library_sorted.len());
            if matches!(
                self.pending_uploads.get(idx).map(|u| &u.phase),
                Some(UploadPhase::Failed(_))
            ) {
                self.pending_uploads.remove(idx);
            }
        }
        self.recompute_sorted_indices();
    }

    // --- questions and analyses ---

    fn ask_question(&mut self, paper_id: PaperId, query: &str) {
        let question = match PaperQuestion::new(paper_id, query) {
            Ok(question) => question,
            Err(e) => {
                self.status = Some(e.to_string());
                return;
            }
        };
        if !self.ask.begin(&question.paper_id) {
            self.status = Some("Still waiting for the previous answer".into());
            return;
        }
        self.status = Some(format!("Asking: {}", question.query));
        backend::spawn_ask(self.session.backend().clone(), question, self.tx.clone());
    }

    /// Request `kind` over the marked papers; an empty set is rejected here.
    fn run_analysis(&mut self, kind: AnalysisKind) {
        let paper_ids = self.marked_ids();
        match AnalysisRequest::new(kind, &paper_ids) {
            Ok(request) => {
                let seq = self.analysis.begin(kind, paper_ids);
                backend::spawn_analysis(self.session.backend().clone(), request, seq, self.tx.clone());
            }
            Err(e) => self.analysis.reject(kind, e.to_string()),
        }
    }

    // --- visualization ---

    fn generate(&mut self) {
        if self.visualize.pending || self.session.pipeline().is_busy() {
            self.status = Some("A visualization is already being generated".into());
            return;
        }
        let paper_ids = self.marked_ids();
        if let Err(e) = VisualizationRequest::new(&self.visualize.query, &paper_ids) {
            self.visualize.fail(e.to_string());
            return;
        }
        self.visualize.begin();
        let targets = self.session.verification_targets(&paper_ids);
        backend::spawn_generate(
            self.session.visualizer(),
            Some((self.visualize.query.clone(), paper_ids)),
            targets,
            self.tx.clone(),
        );
    }

    fn regenerate(&mut self) {
        if self.visualize.pending || self.session.pipeline().is_busy() {
            return;
        }
        let Some(current) = self.session.pipeline().current() else {
            self.visualize
                .fail(ValidationError::NothingToRegenerate.to_string());
            return;
        };
        self.visualize.begin();
        let targets = self.session.verification_targets(&current.paper_ids);
        backend::spawn_generate(self.session.visualizer(), None, targets, self.tx.clone());
    }

    fn save_visualization(&mut self) {
        let Some(result) = &self.visualize.result else {
            self.status = Some("Nothing to save yet".into());
            return;
        };
        let height = self
            .visualize
            .frame
            .map(|f| f.height)
            .unwrap_or(self.session.renderer().policy().min);
        let page = SandboxedDocument::new(result.markup.clone()).host_page(&result.query, height);
        let path = self.export_dir.join(format!(
            "visualization-{}.html",
            result.generated_at.format("%Y%m%d-%H%M%S")
        ));
        match std::fs::write(&path, page) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "visualization saved");
                self.visualize.saved = Some(path);
            }
            Err(e) => self.status = Some(format!("{}: {e}", path.display())),
        }
    }

    // --- export ---

    fn export(&mut self, csv: bool) {
        let paper_id = match &self.screen {
            Screen::Paper(id) | Screen::ItemDetail(id, _, _) => id.clone(),
            _ => return,
        };
        let target = match self.tab.kind() {
            Some(ExtractionKind::Contributions) => ExportTarget::Contributions,
            Some(ExtractionKind::Experiments) => ExportTarget::Experiments,
            _ => ExportTarget::All,
        };
        let format = match (csv, target) {
            (true, _) => ExportFormat::Csv,
            (false, ExportTarget::All) => ExportFormat::Markdown,
            (false, _) => ExportFormat::Json,
        };
        match ExportRequest::new(paper_id, target, format) {
            Ok(request) => {
                self.status = Some(format!("Exporting {target} as {format}..."));
                backend::spawn_export(
                    self.session.backend().clone(),
                    request,
                    self.export_dir.clone(),
                    self.tx.clone(),
                );
            }
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    /// Process a backend event and update model state.
    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Uploaded { filename, paper } => {
                if let Some(pos) = self
                    .pending_uploads
                    .iter()
                    .position(|u| u.filename == filename && u.phase == UploadPhase::Uploading)
                {
                    self.pending_uploads.remove(pos);
                }
                let title = paper.title.clone();
                if self.session.register(paper) {
                    self.status = Some(format!("Uploaded {title}"));
                }
                self.recompute_sorted_indices();
            }
            BackendEvent::UploadFailed { filename, error } => {
                match self
                    .pending_uploads
                    .iter_mut()
                    .find(|u| u.filename == filename && u.phase == UploadPhase::Uploading)
                {
                    Some(upload) => upload.phase = UploadPhase::Failed(error.clone()),
                    None => self.pending_uploads.push(PendingUpload {
                        filename: filename.clone(),
                        phase: UploadPhase::Failed(error.clone()),
                    }),
                }
                self.status = Some(format!("{filename}: {error}"));
            }
            BackendEvent::Synced { listing } => {
                let added = self.session.merge_listing(listing);
                self.recompute_sorted_indices();
                if self.session.selected_paper().is_none() {
                    let first = self.session.registry().papers().first();
                    if let Some(id) = first.map(|p| p.paper_id.clone()) {
                        self.session.select_paper(Some(id));
                    }
                }
                if added > 0 {
                    self.status = Some(format!("Loaded {added} papers from the server"));
                }
            }
            BackendEvent::SyncFailed { error } => {
                self.status = Some(format!("Could not list papers: {error}"));
            }
            BackendEvent::ExtractionSettled { key, state } => {
                if matches!(state, CacheState::Error(_))
                    && matches!(&self.screen, Screen::Paper(id) if *id == key.paper_id)
                    && self.tab.kind() == Some(key.kind)
                {
                    self.status = Some(format!("{} extraction failed (r to retry)", key.kind.label()));
                }
                let max = self.item_count().saturating_sub(1);
                self.item_cursor = self.item_cursor.min(max);
            }
            BackendEvent::VisualizationReady { result } => {
                let mut frame = LayoutEstimateFrame::new();
                let size = self.session.renderer().render(&mut frame, &result);
                let measured = frame.content_height().ok();
                tracing::debug!(?measured, height = size.height, "visualization laid out");
                let preview = readable_text(&result.markup);
                self.visualize.finish(result, Some(size), preview);
            }
            BackendEvent::VisualizationFailed { error } => {
                self.visualize.fail(error);
            }
            BackendEvent::VerificationReady { sample } => {
                self.visualize.accept_verification(sample);
            }
            BackendEvent::Answered { paper_id, outcome } => {
                if let Err(error) = &outcome {
                    self.status = Some(format!("Question failed: {error}"));
                } else if self.screen == Screen::Paper(paper_id.clone()) {
                    self.status = None;
                }
                self.ask.finish(paper_id, outcome);
            }
            BackendEvent::Analyzed { seq, outcome } => {
                if !self.analysis.settle(seq, outcome) {
                    tracing::debug!(seq, "dropping superseded analysis");
                }
            }
            BackendEvent::Exported { path } => {
                self.status = Some(format!("Saved {}", path.display()));
            }
            BackendEvent::ExportFailed { error } => {
                self.status = Some(format!("Export failed: {error}"));
            }
            BackendEvent::Health { health } => {
                self.health = Some(health);
            }
        }
    }

    /// Render the current screen.
    pub fn view(&self, f: &mut ratatui::Frame) {
        match &self.screen {
            Screen::Library => crate::view::library::render(f, self),
            Screen::Paper(paper_id) => crate::view::paper::render(f, self, paper_id),
            Screen::ItemDetail(paper_id, kind, idx) => {
                crate::view::detail::render(f, self, paper_id, *kind, *idx)
            }
            Screen::Visualize => crate::view::visualize::render(f, self),
            Screen::Analysis => crate::view::analysis::render(f, self),
        }

        if self.show_help {
            crate::view::help::render(f, &self.theme);
        }
    }
}
