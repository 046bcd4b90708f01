/// Enablement of the send and optimize controls.
///
/// Both controls are usable exactly when the trimmed prompt is non-empty. Attachments do not
/// matter. Busy flags are applied on top of this by the session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControlGate {
    pub send_enabled: bool,
    pub optimize_enabled: bool,
}

impl ControlGate {
    pub fn evaluate(prompt: &str) -> Self {
        let has_text = !prompt.trim().is_empty();
        Self {
            send_enabled: has_text,
            optimize_enabled: has_text,
        }
    }
}
