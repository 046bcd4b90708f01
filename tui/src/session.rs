//! The interaction state machine of one client session.
//!
//! `Session` owns every piece of mutable UI state: the prompt, the attachment store, the
//! drop-zone highlight, the request busy flags, the transcript and the notification stack. It
//! performs no I/O. The runtime feeds it user intents and request completions, and dispatches the
//! requests it hands back.

use std::sync::Arc;
use std::time::Instant;

use studio_protocol::OptimizePromptRequest;

use crate::action_gate::ControlGate;
use crate::attachments::Attachment;
use crate::attachments::AttachmentStore;
use crate::attachments::GenerateForm;
use crate::attachments::ImageCandidate;
use crate::attachments::Preview;
use crate::backend::HttpOutcome;
use crate::backend::OptimizeResult;
use crate::input_channels::DropZone;
use crate::input_channels::InputChannel;
use crate::input_channels::filter_for_channel;
use crate::notifications::NotificationCenter;
use crate::notifications::NotificationKind;
use crate::prompt_input::PromptEditor;
use crate::transcript::OPTIMIZATION_FAILED;
use crate::transcript::GenerateCompletion;
use crate::transcript::REQUEST_FAILED;
use crate::transcript::Transcript;
use crate::transcript::TranscriptEntry;
use crate::transcript::network_error_message;

pub const SEND_LABEL: &str = "Send";
pub const SENDING_LABEL: &str = "Sending…";
pub const OPTIMIZE_LABEL: &str = "Optimize";
pub const OPTIMIZING_LABEL: &str = "Optimizing…";

pub const PROMPT_OPTIMIZED: &str = "Prompt optimized";
pub const PROMPT_OPTIMIZATION_FAILED: &str = "Prompt optimization failed";
pub const NETWORK_ERROR_RETRY: &str = "Network error, please retry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Offer the optimize control.
    pub include_optimization: bool,
    /// Render the original-prompt and uploaded-image echoes of a response.
    pub include_echo_sections: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            include_optimization: true,
            include_echo_sections: true,
        }
    }
}

/// What the control row shows for one button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlView {
    pub label: &'static str,
    pub enabled: bool,
    pub busy: bool,
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    prompt: PromptEditor,
    attachments: AttachmentStore,
    drop_zone: DropZone,
    gate: ControlGate,
    generate_busy: bool,
    optimize_busy: bool,
    transcript: Transcript,
    notifications: NotificationCenter,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let mut session = Self {
            config,
            prompt: PromptEditor::new(),
            attachments: AttachmentStore::new(),
            drop_zone: DropZone::default(),
            gate: ControlGate::default(),
            generate_busy: false,
            optimize_busy: false,
            transcript: Transcript::new(),
            notifications: NotificationCenter::new(),
        };
        session.refresh_gate();
        session
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn prompt(&self) -> &PromptEditor {
        &self.prompt
    }

    /// Mutate the prompt; the control gate is re-evaluated afterwards.
    pub fn edit_prompt<R>(&mut self, edit: impl FnOnce(&mut PromptEditor) -> R) -> R {
        let result = edit(&mut self.prompt);
        self.refresh_gate();
        result
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    pub fn drop_zone(&self) -> DropZone {
        self.drop_zone
    }

    pub fn drop_zone_mut(&mut self) -> &mut DropZone {
        &mut self.drop_zone
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    pub fn is_generate_busy(&self) -> bool {
        self.generate_busy
    }

    pub fn is_optimize_busy(&self) -> bool {
        self.optimize_busy
    }

    fn refresh_gate(&mut self) {
        self.gate = ControlGate::evaluate(self.prompt.text());
    }

    pub fn send_control(&self) -> ControlView {
        ControlView {
            label: if self.generate_busy {
                SENDING_LABEL
            } else {
                SEND_LABEL
            },
            enabled: self.gate.send_enabled && !self.generate_busy,
            busy: self.generate_busy,
        }
    }

    /// `None` when optimization is turned off.
    pub fn optimize_control(&self) -> Option<ControlView> {
        self.config.include_optimization.then(|| ControlView {
            label: if self.optimize_busy {
                OPTIMIZING_LABEL
            } else {
                OPTIMIZE_LABEL
            },
            enabled: self.gate.optimize_enabled && !self.optimize_busy,
            busy: self.optimize_busy,
        })
    }

    /// Forward candidates from an input channel to the store.
    ///
    /// Returns the accepted attachments; each needs a preview.
    pub fn add_candidates(
        &mut self,
        channel: InputChannel,
        candidates: Vec<ImageCandidate>,
    ) -> Vec<Arc<Attachment>> {
        let offered = candidates.len();
        let accepted = self
            .attachments
            .add_images(filter_for_channel(channel, candidates));
        tracing::debug!(
            "{channel:?}: accepted {} of {offered} candidate(s)",
            accepted.len()
        );
        accepted
    }

    pub fn attach_preview(&mut self, attachment: &Arc<Attachment>, preview: Preview) {
        if !self.attachments.attach_preview(attachment, preview) {
            tracing::debug!("discarding preview of removed attachment {}", attachment.name());
        }
    }

    pub fn remove_attachment(&mut self, attachment: &Arc<Attachment>) -> bool {
        self.attachments.remove(attachment)
    }

    pub fn remove_attachment_at(&mut self, index: usize) -> Option<Arc<Attachment>> {
        self.attachments.remove_at(index)
    }

    pub fn notify(&mut self, kind: NotificationKind, message: impl Into<String>, now: Instant) {
        self.notifications.push(kind, message, now);
    }

    /// Start a generate request.
    ///
    /// Returns `None` (and changes nothing) when the prompt is blank or a generate is already in
    /// flight. Otherwise records the user message, marks the flow busy and returns the
    /// submission to dispatch.
    pub fn begin_generate(&mut self) -> Option<GenerateForm> {
        if !self.gate.send_enabled || self.generate_busy {
            return None;
        }
        let prompt = self.prompt.text().trim();
        self.transcript.append(TranscriptEntry::user_message(
            prompt,
            self.attachments.len(),
        ));
        let form = self.attachments.as_form_parts(prompt);
        self.generate_busy = true;
        tracing::info!("generate started with {} image(s)", form.images.len());
        Some(form)
    }

    /// Apply a finished generate. The response arrives already built, see
    /// [`crate::transcript::prepare_generate_result`].
    pub fn finish_generate(&mut self, result: GenerateCompletion) {
        match result {
            Ok(HttpOutcome::Success(response)) => {
                self.transcript.append(TranscriptEntry::AiResponse(response));
                self.prompt.clear();
                self.attachments.clear();
            }
            Ok(HttpOutcome::Failed { status, message }) => {
                tracing::warn!("generate failed with status {status}");
                self.transcript.append(TranscriptEntry::error(
                    message.unwrap_or_else(|| REQUEST_FAILED.to_string()),
                ));
            }
            Err(err) => {
                tracing::warn!("generate request failed: {err}");
                self.transcript
                    .append(TranscriptEntry::error(network_error_message(&err)));
            }
        }
        self.generate_busy = false;
        self.refresh_gate();
    }

    /// Start an optimize request. `None` when blank, busy, or turned off.
    pub fn begin_optimize(&mut self) -> Option<OptimizePromptRequest> {
        if !self.config.include_optimization || !self.gate.optimize_enabled || self.optimize_busy
        {
            return None;
        }
        self.optimize_busy = true;
        tracing::info!("prompt optimization started");
        Some(OptimizePromptRequest {
            prompt: self.prompt.text().trim().to_string(),
        })
    }

    pub fn finish_optimize(&mut self, result: OptimizeResult, now: Instant) {
        match result {
            Ok(HttpOutcome::Success(response)) => {
                self.prompt.set_text(response.optimized_prompt.clone());
                self.transcript.append(TranscriptEntry::OptimizationResult {
                    original_prompt: response.original_prompt,
                    optimized_prompt: response.optimized_prompt,
                });
                self.notify(NotificationKind::Success, PROMPT_OPTIMIZED, now);
            }
            Ok(HttpOutcome::Failed { status, message }) => {
                tracing::warn!("prompt optimization failed with status {status}");
                self.transcript.append(TranscriptEntry::error(
                    message.unwrap_or_else(|| OPTIMIZATION_FAILED.to_string()),
                ));
                self.notify(NotificationKind::Failure, PROMPT_OPTIMIZATION_FAILED, now);
            }
            Err(err) => {
                tracing::warn!("prompt optimization request failed: {err}");
                self.transcript
                    .append(TranscriptEntry::error(network_error_message(&err)));
                self.notify(NotificationKind::Failure, NETWORK_ERROR_RETRY, now);
            }
        }
        self.optimize_busy = false;
        self.refresh_gate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::tests::PNG_1X1;
    use crate::attachments::tests::png;
    use crate::attachments::tests::text_file;
    use crate::backend::BackendError;
    use crate::backend::GenerateResult;
    use crate::notifications::Phase;
    use crate::transcript::AiResponse;
    use crate::transcript::ResponseSection;
    use crate::transcript::prepare_generate_result;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use studio_protocol::GenerateResponse;
    use studio_protocol::ImagePayload;
    use studio_protocol::OptimizePromptResponse;

    fn session_with_prompt(prompt: &str) -> Session {
        let mut session = Session::new(SessionConfig::default());
        session.edit_prompt(|editor| editor.set_text(prompt));
        session
    }

    /// Finish a generate the way the runtime does, building the response first.
    fn finish(session: &mut Session, result: GenerateResult) {
        let include_echo_sections = session.config().include_echo_sections;
        session.finish_generate(prepare_generate_result(result, include_echo_sections));
    }

    fn decode_error() -> BackendError {
        match serde_json::from_str::<GenerateResponse>("<html>") {
            Err(err) => BackendError::Decode(err),
            Ok(_) => unreachable!("invalid JSON must not decode"),
        }
    }

    #[test]
    fn initial_state_has_disabled_controls() {
        let session = Session::new(SessionConfig::default());
        assert_eq!(
            session.send_control(),
            ControlView {
                label: SEND_LABEL,
                enabled: false,
                busy: false,
            }
        );
        assert_eq!(
            session.optimize_control().map(|control| control.enabled),
            Some(false)
        );
    }

    #[test]
    fn blank_prompt_refuses_both_flows() {
        let mut session = session_with_prompt("   ");
        session.add_candidates(InputChannel::ExplicitSelection, vec![png("a.png")]);

        assert_eq!(session.begin_generate(), None);
        assert_eq!(session.begin_optimize(), None);
        assert!(session.transcript().entries().is_empty());
        assert!(!session.is_generate_busy());
    }

    #[test]
    fn successful_generate_clears_prompt_and_store() {
        let mut session = session_with_prompt("  a cat ");
        session.add_candidates(
            InputChannel::ExplicitSelection,
            vec![png("cat.png"), text_file("notes.txt")],
        );

        let Some(form) = session.begin_generate() else {
            panic!("generate should start");
        };
        assert_eq!(form.prompt, "a cat");
        assert_eq!(form.images.len(), 1);
        assert!(session.is_generate_busy());
        assert_eq!(
            session.send_control(),
            ControlView {
                label: SENDING_LABEL,
                enabled: false,
                busy: true,
            }
        );
        assert_eq!(
            session.transcript().entries(),
            &[TranscriptEntry::user_message("a cat", 1)]
        );

        // A second submit while in flight is ignored.
        assert_eq!(session.begin_generate(), None);

        finish(&mut session, Ok(HttpOutcome::Success(GenerateResponse {
            generated_text: Some("A fluffy cat.".to_string()),
            generated_images: Some(Vec::new()),
            ..Default::default()
        })));

        assert_eq!(
            session.transcript().entries()[1],
            TranscriptEntry::AiResponse(AiResponse {
                sections: vec![ResponseSection::GeneratedText("A fluffy cat.".to_string())],
            })
        );
        assert_eq!(session.prompt().text(), "");
        assert!(session.attachments().is_empty());
        assert!(!session.is_generate_busy());
        assert!(!session.send_control().enabled);
        assert_eq!(session.send_control().label, SEND_LABEL);
    }

    #[test]
    fn server_failure_keeps_prompt_and_attachments() {
        let mut session = session_with_prompt("y");
        session.add_candidates(InputChannel::Drop, vec![png("a.png")]);
        session.begin_generate();

        finish(&mut session, Ok(HttpOutcome::Failed {
            status: 500,
            message: Some("quota exceeded".to_string()),
        }));

        assert_eq!(
            session.transcript().entries().last(),
            Some(&TranscriptEntry::error("quota exceeded"))
        );
        assert_eq!(session.prompt().text(), "y");
        assert_eq!(session.attachments().len(), 1);
        assert!(!session.is_generate_busy());
        assert!(session.send_control().enabled);
    }

    #[test]
    fn failure_without_message_uses_fallback() {
        let mut session = session_with_prompt("y");
        session.begin_generate();
        finish(&mut session, Ok(HttpOutcome::Failed {
            status: 502,
            message: None,
        }));
        assert_eq!(
            session.transcript().entries().last(),
            Some(&TranscriptEntry::error(REQUEST_FAILED))
        );
    }

    #[test]
    fn undecodable_success_body_is_a_network_error() {
        let mut session = session_with_prompt("y");
        session.begin_generate();
        finish(&mut session, Err(decode_error()));

        let Some(TranscriptEntry::Error { message }) = session.transcript().entries().last()
        else {
            panic!("expected an error entry");
        };
        assert!(message.starts_with("Network error: invalid response body: "));
        assert!(!session.is_generate_busy());
        assert_eq!(session.prompt().text(), "y");
    }

    #[test]
    fn optimize_success_replaces_prompt_and_notifies() {
        let start = Instant::now();
        let mut session = session_with_prompt("x");

        let request = session.begin_optimize();
        assert_eq!(
            request,
            Some(OptimizePromptRequest {
                prompt: "x".to_string(),
            })
        );
        assert_eq!(
            session.optimize_control().map(|control| control.label),
            Some(OPTIMIZING_LABEL)
        );
        // Generate stays available while optimizing.
        assert!(session.send_control().enabled);

        session.finish_optimize(
            Ok(HttpOutcome::Success(OptimizePromptResponse {
                original_prompt: "x".to_string(),
                optimized_prompt: "a detailed prompt about x".to_string(),
            })),
            start,
        );

        assert_eq!(session.prompt().text(), "a detailed prompt about x");
        assert_eq!(
            session.transcript().entries(),
            &[TranscriptEntry::OptimizationResult {
                original_prompt: "x".to_string(),
                optimized_prompt: "a detailed prompt about x".to_string(),
            }]
        );
        assert!(!session.is_optimize_busy());

        let shown = session
            .notifications()
            .visible(start + Duration::from_millis(1000));
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0.kind, NotificationKind::Success);
        assert_eq!(shown[0].0.message, PROMPT_OPTIMIZED);
        assert_eq!(shown[0].1, Phase::Shown);

        session
            .notifications_mut()
            .prune(start + Duration::from_millis(3300));
        assert!(session.notifications().is_empty());
    }

    #[test]
    fn optimize_failures_notify_and_restore_state() {
        let now = Instant::now();
        let mut session = session_with_prompt("x");

        session.begin_optimize();
        session.finish_optimize(
            Ok(HttpOutcome::Failed {
                status: 500,
                message: None,
            }),
            now,
        );
        session.begin_optimize();
        session.finish_optimize(Err(decode_error()), now);

        let entries = session.transcript().entries();
        assert_eq!(entries[0], TranscriptEntry::error(OPTIMIZATION_FAILED));
        assert!(entries[1].is_error());

        let messages: Vec<&str> = session
            .notifications()
            .visible(now + Duration::from_millis(500))
            .into_iter()
            .map(|(notification, _)| notification.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![PROMPT_OPTIMIZATION_FAILED, NETWORK_ERROR_RETRY]
        );
        assert_eq!(session.prompt().text(), "x");
        assert_eq!(
            session.optimize_control().map(|control| control.label),
            Some(OPTIMIZE_LABEL)
        );
    }

    #[test]
    fn optimization_can_be_turned_off() {
        let mut session = Session::new(SessionConfig {
            include_optimization: false,
            include_echo_sections: true,
        });
        session.edit_prompt(|editor| editor.set_text("x"));
        assert_eq!(session.optimize_control(), None);
        assert_eq!(session.begin_optimize(), None);
    }

    #[test]
    fn reduced_variant_drops_echoes_from_responses() {
        let mut session = Session::new(SessionConfig {
            include_optimization: true,
            include_echo_sections: false,
        });
        session.edit_prompt(|editor| editor.set_text("a cat"));
        session.begin_generate();
        finish(&mut session, Ok(HttpOutcome::Success(GenerateResponse {
            original_prompt: Some("a cat".to_string()),
            generated_images: Some(vec![ImagePayload::from_bytes(PNG_1X1, "image/png")]),
            ..Default::default()
        })));

        let Some(TranscriptEntry::AiResponse(response)) = session.transcript().entries().last()
        else {
            panic!("expected a response entry");
        };
        assert_eq!(response.sections.len(), 1);
        assert!(matches!(
            response.sections[0],
            ResponseSection::GeneratedImages(_)
        ));
    }

    #[test]
    fn stale_preview_is_discarded() {
        let mut session = Session::new(SessionConfig::default());
        let accepted = session.add_candidates(InputChannel::ClipboardPaste, vec![png("p.png")]);
        session.remove_attachment(&accepted[0]);
        session.attach_preview(
            &accepted[0],
            Preview {
                data_uri: String::new(),
                dimensions: None,
            },
        );
        assert!(session.attachments().is_empty());
    }
}
