/// Actions that the TUI can process, mapped from keyboard input or internal events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    NavigateBack,
    DrillIn,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    GoTop,
    GoBottom,
    NextTab,
    PrevTab,
    /// Re-extract on a paper tab, re-sync on the library, regenerate on the visualize screen.
    Refresh,
    RemovePaper,
    /// Add or drop the paper under the cursor from the visualization set.
    ToggleMark,
    StartUpload,
    /// Ask a free-form question about the open paper.
    Ask,
    /// Aggregate analysis over the marked papers.
    OpenAnalysis,
    OpenVisualize,
    EditQuery,
    NextExample,
    ToggleFullscreen,
    ToggleVerification,
    SaveVisualization,
    Export,
    ExportCsv,
    CycleSort,
    ToggleHelp,
    InputChar(char),
    InputBackspace,
    InputSubmit,
    InputCancel,
    Tick,
    Resize(u16, u16),
    None,
}
