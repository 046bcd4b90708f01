//! Continuation events delivered to the UI loop by background tasks.

use std::sync::Arc;

use tempfile::TempPath;

use crate::attachments::Attachment;
use crate::attachments::Preview;
use crate::backend::OptimizeResult;
use crate::input_channels::ClipboardPaste;
use crate::input_channels::InputChannel;
use crate::input_channels::LoadedCandidates;
use crate::notifications::NotificationKind;
use crate::transcript::GenerateCompletion;

#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
pub enum AppEvent {
    /// Files named by an input channel finished loading.
    CandidatesLoaded {
        channel: InputChannel,
        loaded: LoadedCandidates,
    },

    /// The clipboard was read after a paste request.
    ClipboardRead(ClipboardPaste),

    /// A preview finished for an attachment that may since have been removed.
    PreviewReady {
        attachment: Arc<Attachment>,
        preview: Preview,
    },

    GenerateFinished(GenerateCompletion),
    OptimizeFinished(OptimizeResult),

    /// Show a toast; used by post-result actions.
    Notify {
        kind: NotificationKind,
        message: String,
    },

    /// An enlarged image was handed to the viewer; its page lives until the session ends.
    ViewerPageOpened(TempPath),
}
