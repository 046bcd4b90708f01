use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use ratatui::widgets::WidgetRef;

/// A piece of the screen that knows its own height for a given width.
pub trait Renderable {
    fn render(&self, area: Rect, buf: &mut Buffer);
    fn desired_height(&self, width: u16) -> u16;
    fn cursor_pos(&self, _area: Rect) -> Option<(u16, u16)> {
        None
    }
}

impl<'a> Renderable for Line<'a> {
    fn render(&self, area: Rect, buf: &mut Buffer) {
        WidgetRef::render_ref(self, area, buf);
    }
    fn desired_height(&self, _width: u16) -> u16 {
        1
    }
}

impl<'a> Renderable for Paragraph<'a> {
    fn render(&self, area: Rect, buf: &mut Buffer) {
        self.render_ref(area, buf);
    }
    fn desired_height(&self, width: u16) -> u16 {
        u16::try_from(self.line_count(width)).unwrap_or(u16::MAX)
    }
}

/// Stacks children top to bottom, each at its desired height.
pub struct ColumnRenderable<'a> {
    children: Vec<Box<dyn Renderable + 'a>>,
}

impl<'a> ColumnRenderable<'a> {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
        }
    }

    pub fn push(&mut self, child: impl Renderable + 'a) {
        self.children.push(Box::new(child));
    }

    fn child_areas(&self, area: Rect) -> Vec<Rect> {
        let mut y = area.y;
        self.children
            .iter()
            .map(|child| {
                let child_area = Rect::new(area.x, y, area.width, child.desired_height(area.width))
                    .intersection(area);
                y = y.saturating_add(child_area.height);
                child_area
            })
            .collect()
    }
}

impl Renderable for ColumnRenderable<'_> {
    fn render(&self, area: Rect, buf: &mut Buffer) {
        for (child, child_area) in self.children.iter().zip(self.child_areas(area)) {
            if !child_area.is_empty() {
                child.render(child_area, buf);
            }
        }
    }

    fn desired_height(&self, width: u16) -> u16 {
        self.children
            .iter()
            .map(|child| child.desired_height(width))
            .fold(0, u16::saturating_add)
    }

    fn cursor_pos(&self, area: Rect) -> Option<(u16, u16)> {
        self.children
            .iter()
            .zip(self.child_areas(area))
            .find_map(|(child, child_area)| child.cursor_pos(child_area))
    }
}
