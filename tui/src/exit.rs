/// Summary information produced when an Image Studio session exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppExitInfo {
    /// Transcript entries produced during the session.
    pub transcript_entries: usize,
    /// Generate requests that were submitted.
    pub generate_requests: usize,
    /// Why the session ended.
    pub exit_reason: ExitReason,
}

/// Reason why the Image Studio session terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The user interrupted or requested exit.
    UserRequested,
    /// The terminal event stream closed.
    InputClosed,
    /// A fatal error occurred and the session cannot continue.
    Fatal(String),
}
