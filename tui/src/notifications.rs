//! Transient toasts shown over the top-right corner of the screen.
//!
//! Each notification follows a fixed timeline measured from the moment it is pushed:
//! hidden, fading in, shown, fading out, then removed.

use std::time::Duration;
use std::time::Instant;

pub const FADE_IN_DELAY: Duration = Duration::from_millis(100);
pub const FADE_DURATION: Duration = Duration::from_millis(300);
/// Age at which the fade-in completes.
pub const FADE_IN_END: Duration = FADE_IN_DELAY.saturating_add(FADE_DURATION);
/// Age at which the fade-out starts.
pub const DISPLAY_DURATION: Duration = Duration::from_millis(3000);
pub const LIFETIME: Duration = DISPLAY_DURATION.saturating_add(FADE_DURATION);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Hidden,
    FadingIn,
    Shown,
    FadingOut,
    Expired,
}

impl Phase {
    fn at(age: Duration) -> Self {
        if age < FADE_IN_DELAY {
            Phase::Hidden
        } else if age < FADE_IN_END {
            Phase::FadingIn
        } else if age < DISPLAY_DURATION {
            Phase::Shown
        } else if age < LIFETIME {
            Phase::FadingOut
        } else {
            Phase::Expired
        }
    }

    pub fn is_visible(self) -> bool {
        matches!(self, Phase::FadingIn | Phase::Shown | Phase::FadingOut)
    }
}

/// Age thresholds at which a notification changes phase.
const PHASE_BOUNDARIES: [Duration; 4] = [FADE_IN_DELAY, FADE_IN_END, DISPLAY_DURATION, LIFETIME];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    created_at: Instant,
}

impl Notification {
    pub fn phase(&self, now: Instant) -> Phase {
        Phase::at(now.saturating_duration_since(self.created_at))
    }
}

/// Stack of live notifications, oldest first. Duplicates are kept.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    items: Vec<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NotificationKind, message: impl Into<String>, now: Instant) {
        let message = message.into();
        tracing::debug!("notification ({kind:?}): {message}");
        self.items.push(Notification {
            kind,
            message,
            created_at: now,
        });
    }

    /// Drop expired notifications.
    pub fn prune(&mut self, now: Instant) {
        self.items
            .retain(|notification| notification.phase(now) != Phase::Expired);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Notifications currently on screen with their phase, newest last.
    pub fn visible(&self, now: Instant) -> Vec<(&Notification, Phase)> {
        self.items
            .iter()
            .map(|notification| (notification, notification.phase(now)))
            .filter(|(_, phase)| phase.is_visible())
            .collect()
    }

    /// The earliest future instant at which some notification changes phase.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.items
            .iter()
            .flat_map(|notification| {
                PHASE_BOUNDARIES
                    .iter()
                    .map(move |boundary| notification.created_at + *boundary)
            })
            .filter(|deadline| *deadline > now)
            .min()
    }
}
