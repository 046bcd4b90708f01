//! The control row and key hints under the prompt.
//!
//! Pure rendering: `FooterProps` is built from session state by the caller.

use ratatui::style::Style;
use ratatui::style::Styled;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;

use super::Focus;
use crate::session::ControlView;
use crate::ui_colors::info_color;

#[derive(Clone, Copy, Debug)]
pub struct FooterProps {
    pub send: ControlView,
    /// `None` when optimization is turned off.
    pub optimize: Option<ControlView>,
    pub focus: Focus,
}

pub fn footer_lines(props: FooterProps) -> Vec<Line<'static>> {
    let mut controls: Vec<Span<'static>> = vec![" ".into()];
    controls.push(control_span(props.send, "⏎"));
    if let Some(optimize) = props.optimize {
        controls.push("  ".into());
        controls.push(control_span(optimize, "ctrl+p"));
    }
    vec![Line::from(controls), hint_line(props)]
}

fn control_span(control: ControlView, key: &str) -> Span<'static> {
    let text = format!("[ {} ] {key}", control.label);
    if control.busy {
        text.set_style(Style::default().fg(info_color()).italic())
    } else if control.enabled {
        text.bold()
    } else {
        text.dim()
    }
}

fn hint_line(props: FooterProps) -> Line<'static> {
    let hints: &[(&str, &str)] = match props.focus {
        Focus::Prompt => &[
            ("ctrl+o", "add images"),
            ("ctrl+v", "paste image"),
            ("shift+⏎", "newline"),
            ("tab", "attachments/results"),
            ("ctrl+c", "quit"),
        ],
        Focus::Attachments => &[
            ("←/→", "select"),
            ("del", "remove"),
            ("tab", "results"),
            ("esc", "back"),
        ],
        Focus::Transcript => &[
            ("←/→", "pick image"),
            ("⏎", "enlarge"),
            ("c", "copy"),
            ("d", "download"),
            ("pgup/pgdn", "scroll"),
            ("esc", "back"),
        ],
        Focus::SelectionPrompt => &[("⏎", "add files"), ("esc", "cancel")],
    };
    let mut spans: Vec<Span<'static>> = vec![" ".into()];
    for (idx, (key, action)) in hints.iter().enumerate() {
        if idx > 0 {
            spans.push(" · ".dim());
        }
        spans.push(key.to_string().bold().dim());
        spans.push(format!(" {action}").dim());
    }
    Line::from(spans)
}
