use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::{
    ui::{bold_style, centered_rect, error_style, italic_style, title_style},
    App, LoginField,
};

const FORM_WIDTH: u16 = 52;
const FORM_HEIGHT: u16 = 11;

pub fn render(app: &App, f: &mut Frame) {
    let form = &app.login;
    let area = centered_rect(FORM_WIDTH, FORM_HEIGHT, f.area());

    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(" DSST Login ", title_style()))
        .title_alignment(Alignment::Center);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(2)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(2), // username
            Constraint::Length(2), // password
            Constraint::Length(2), // error
            Constraint::Min(1),    // legend
        ])
        .split(inner);

    let masked = "*".repeat(form.password.chars().count());
    f.render_widget(
        field_line("Username", &form.username, form.field == LoginField::Username),
        chunks[0],
    );
    f.render_widget(
        field_line("Password", &masked, form.field == LoginField::Password),
        chunks[1],
    );

    if let Some(error) = &form.error {
        f.render_widget(
            Paragraph::new(Span::styled(error.as_str(), error_style())),
            chunks[2],
        );
    }

    f.render_widget(
        Paragraph::new(Span::styled(
            "(tab) switch field / (enter) sign in / (esc)ape",
            italic_style(),
        )),
        chunks[3],
    );
}

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool) -> Paragraph<'a> {
    let marker = if focused { "> " } else { "  " };
    let value_style = if focused {
        Style::default().add_modifier(Modifier::UNDERLINED)
    } else {
        Style::default()
    };
    Paragraph::new(Line::from(vec![
        Span::styled(marker, bold_style()),
        Span::styled(format!("{label}: "), bold_style()),
        Span::styled(value, value_style),
        Span::styled(if focused { "_" } else { "" }, value_style),
    ]))
}
