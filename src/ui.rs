pub mod assessment;
pub mod charting;
pub mod dashboard;
pub mod login;
pub mod screen;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
};

pub const HORIZONTAL_MARGIN: u16 = 5;
pub const VERTICAL_MARGIN: u16 = 2;

pub fn bold_style() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

pub fn title_style() -> Style {
    bold_style().fg(Color::Blue)
}

pub fn dim_style() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

pub fn italic_style() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

pub fn error_style() -> Style {
    Style::default().fg(Color::Red)
}

pub fn ok_style() -> Style {
    Style::default().fg(Color::Green)
}

/// `M:SS`
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// A `width` x `height` rect centered in `area`, shrunk to fit
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(90), "1:30");
        assert_eq!(format_time(61), "1:01");
        assert_eq!(format_time(9), "0:09");
        assert_eq!(format_time(0), "0:00");
    }

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(centered_rect(50, 10, area), Rect::new(25, 15, 50, 10));
        // never larger than the area
        assert_eq!(centered_rect(200, 80, area), area);
    }
}
