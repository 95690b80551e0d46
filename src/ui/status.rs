/// Crowd status indicator
/// A filled dot in the status colour
use iced::widget::canvas::{self, Path};
use iced::{Color, Rectangle};

use crate::state::data::CrowdStatus;
use crate::Message;

/// Colour used for a status wherever it is shown
pub fn status_color(status: CrowdStatus) -> Color {
    match status {
        CrowdStatus::Empty => Color::from_rgb8(0x22, 0xc5, 0x5e),
        CrowdStatus::NotCrowded => Color::from_rgb8(0xf5, 0x9e, 0x0b),
        CrowdStatus::VeryBusy => Color::from_rgb8(0xef, 0x44, 0x44),
        CrowdStatus::Unknown => Color::from_rgb8(0x9c, 0xa3, 0xaf),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatusDot {
    pub status: CrowdStatus,
}

impl canvas::Program<Message> for StatusDot {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &iced::Theme,
        bounds: Rectangle,
        _cursor: iced::mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let radius = (bounds.width.min(bounds.height) / 2.0 - 1.0).max(1.0);
        let dot = Path::circle(frame.center(), radius);
        frame.fill(&dot, status_color(self.status));

        vec![frame.into_geometry()]
    }
}
