use std::time::Instant;

use dsst::{
    assessment::RunStatus,
    grid::{GridState, ROW_WIDTH},
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{
    ui::{
        bold_style, centered_rect, dim_style, error_style, format_time, italic_style, title_style,
        HORIZONTAL_MARGIN, VERTICAL_MARGIN,
    },
    App, SaveStatus,
};

/// Terminal lines used by one row of boxes, including the gap below it
const LINES_PER_ROW: usize = 2;

const KEY_COLUMN: usize = 5;

pub fn render(app: &App, f: &mut Frame) {
    let area = f.area();
    if app.show_thank_you {
        render_thank_you(app, f, area);
        return;
    }
    if app.gate.is_blocked() {
        render_blocked(app, f, area);
        return;
    }
    match app.assessment.status() {
        RunStatus::Idle => render_intro(app, f, area),
        RunStatus::Running => render_running(app, f, area),
        RunStatus::Completed => render_completed(app, f, area),
    }
}

fn render_intro(app: &App, f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(Span::styled("DSST Assessment", title_style())),
        Line::default(),
        Line::from(Span::styled("Digit Symbol Substitution Test", bold_style())),
        Line::default(),
        Line::from(
            "This test measures your processing speed and attention. You will see a key of \
             symbols associated with digits 1-9. Below it you will be shown symbols and need to \
             enter the corresponding digits as quickly and accurately as possible.",
        ),
        Line::default(),
        Line::from(
            "New symbol boxes will keep appearing as you fill in answers. Try to complete as \
             many as you can within the time limit.",
        ),
        Line::default(),
        Line::from(Span::styled(
            format!(
                "You will have {} seconds to complete the test.",
                app.assessment.duration_secs()
            ),
            bold_style(),
        )),
        Line::default(),
        Line::from(Span::styled(
            "(enter) start test / (esc)ape",
            italic_style(),
        )),
    ];

    let widget = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(widget, padded(area));
}

fn render_running(app: &App, f: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Length(1), // padding
            Constraint::Length(4), // symbol key
            Constraint::Length(1), // growth banner
            Constraint::Min(2),    // grid
            Constraint::Length(1), // legend
        ])
        .split(area);

    render_header(app, f, chunks[0]);
    render_key(app, f, chunks[2]);

    if app.banner_visible(Instant::now()) {
        let banner = Paragraph::new(Span::styled(
            "More symbol boxes have been added!",
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center);
        f.render_widget(banner, chunks[3]);
    }

    let grid = app.assessment.grid();
    let visible_rows = (chunks[4].height as usize).div_ceil(LINES_PER_ROW);
    let first_row = scroll_top(grid.focus() / ROW_WIDTH, visible_rows);
    f.render_widget(
        Paragraph::new(grid_lines(grid, first_row, visible_rows)).alignment(Alignment::Center),
        chunks[4],
    );

    f.render_widget(
        Paragraph::new(Span::styled(
            "(←↑→↓) move / (1-9) answer / (backspace) clear / (enter) submit / (esc)ape",
            italic_style(),
        ))
        .alignment(Alignment::Center),
        chunks[5],
    );

    if app.show_nav_help {
        render_nav_help(f, area);
    }
}

fn render_header(app: &App, f: &mut Frame, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    f.render_widget(
        Paragraph::new(Span::styled(
            format!("Time Left: {}", format_time(app.assessment.time_left())),
            bold_style(),
        )),
        halves[0],
    );
    f.render_widget(
        Paragraph::new(Span::styled(
            format!("Completed: {}", app.assessment.grid().committed().len()),
            title_style(),
        ))
        .alignment(Alignment::Right),
        halves[1],
    );
}

fn render_key(app: &App, f: &mut Frame, area: Rect) {
    let entries = app.assessment.key().entries();
    let digits: Vec<Span> = entries
        .iter()
        .map(|(digit, _)| Span::styled(center(&digit.to_string(), KEY_COLUMN), bold_style()))
        .collect();
    let glyphs: Vec<Span> = entries
        .iter()
        .map(|(_, symbol)| Span::raw(center(&symbol.to_string(), KEY_COLUMN)))
        .collect();

    let key = Paragraph::new(vec![Line::from(digits), Line::from(glyphs)])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(" Symbol Key ", title_style())),
        );
    f.render_widget(key, area);
}

/// Center `text` in `width` terminal columns
fn center(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.width());
    let left = pad / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(pad - left))
}

/// First grid row to draw so `focus_row` stays on screen
pub fn scroll_top(focus_row: usize, visible_rows: usize) -> usize {
    (focus_row + 1).saturating_sub(visible_rows.max(1))
}

/// Rows `first_row..first_row + rows` of the active window, one text line
/// per row followed by a blank line
pub fn grid_lines(grid: &GridState, first_row: usize, rows: usize) -> Vec<Line<'static>> {
    let focused_style = Style::default()
        .add_modifier(Modifier::REVERSED)
        .add_modifier(Modifier::BOLD);
    let filled_style = bold_style().fg(Color::Blue);
    let frozen = grid.is_frozen();

    grid.active()
        .chunks(ROW_WIDTH)
        .enumerate()
        .skip(first_row)
        .take(rows)
        .flat_map(|(row, cells)| {
            let spans: Vec<Span<'static>> = cells
                .iter()
                .enumerate()
                .map(|(col, cell)| {
                    let index = row * ROW_WIDTH + col;
                    let answer = cell
                        .answer
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| " ".to_string());
                    let text = format!(" {} [{}] ", cell.symbol, answer);
                    let style = if !frozen && index == grid.focus() {
                        focused_style
                    } else if frozen {
                        dim_style()
                    } else if cell.is_filled() {
                        filled_style
                    } else {
                        Style::default()
                    };
                    Span::styled(text, style)
                })
                .collect();
            [Line::from(spans), Line::default()]
        })
        .collect()
}

fn render_nav_help(f: &mut Frame, area: Rect) {
    let popup = centered_rect(46, 12, area);
    let text = vec![
        Line::from("Use the keyboard to navigate between boxes:"),
        Line::default(),
        Line::from(vec![Span::styled(" ← ", bold_style()), Span::raw(" Move to previous box")]),
        Line::from(vec![Span::styled(" → ", bold_style()), Span::raw(" Move to next box")]),
        Line::from(vec![Span::styled(" ↑ ", bold_style()), Span::raw(" Move to box above")]),
        Line::from(vec![Span::styled(" ↓ ", bold_style()), Span::raw(" Move to box below")]),
        Line::default(),
        Line::from(Span::styled("Type 1-9 to answer the highlighted box", dim_style())),
        Line::from(Span::styled("Press any key to begin", italic_style())),
    ];

    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title(Span::styled(" Keyboard Navigation ", title_style())),
        ),
        popup,
    );
}

fn render_completed(app: &App, f: &mut Frame, area: Rect) {
    let mut text = vec![
        Line::from(Span::styled("Test Completed!", title_style())),
        Line::default(),
    ];

    if let Some(completion) = app.assessment.completion() {
        text.push(Line::from(vec![
            Span::styled("Score: ", bold_style()),
            Span::raw(completion.score.to_string()),
        ]));
        text.push(Line::from(vec![
            Span::styled("Total attempted: ", bold_style()),
            Span::raw(completion.total_attempted.to_string()),
        ]));
        text.push(Line::from(vec![
            Span::styled("Time spent: ", bold_style()),
            Span::raw(format!("{}s", completion.time_spent_secs)),
        ]));
        text.push(Line::default());
    }

    match &app.save_status {
        SaveStatus::Saving => text.push(Line::from(Span::styled("Submitting...", dim_style()))),
        SaveStatus::Failed(e) => {
            text.push(Line::from(Span::styled(
                format!("Result could not be saved: {e}"),
                error_style(),
            )));
            text.push(Line::from(Span::styled("(r)etry / (esc)ape", italic_style())));
        }
        SaveStatus::Saved(_) | SaveStatus::Idle => {
            text.push(Line::from(Span::styled("(esc)ape", italic_style())))
        }
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(text.len() as u16 + 2), // results panel
            Constraint::Min(2),                        // frozen grid
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL)),
        chunks[0],
    );

    // boxes left blank stay on screen, dimmed and no longer editable
    let grid = app.assessment.grid();
    let visible_rows = (chunks[1].height as usize).div_ceil(LINES_PER_ROW);
    let last = grid.active().len().saturating_sub(1);
    let first_row = scroll_top(grid.focus().min(last) / ROW_WIDTH, visible_rows);
    f.render_widget(
        Paragraph::new(grid_lines(grid, first_row, visible_rows)).alignment(Alignment::Center),
        chunks[1],
    );
}

fn render_thank_you(app: &App, f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(Span::styled("Thank You!", title_style())),
        Line::default(),
        Line::from("Please continue to complete your questions for today's visit:"),
        Line::default(),
        Line::from(Span::styled(
            app.settings.redirect_url().to_string(),
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::default(),
        Line::from(Span::styled(
            "(o)pen questionnaire / (q)uit",
            italic_style(),
        )),
    ];

    f.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        padded(area),
    );
}

fn render_blocked(app: &App, f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(Span::styled("Assessment Unavailable", title_style())),
        Line::default(),
        Line::from("The assessment is not available after the daily cutoff time."),
        Line::default(),
        Line::from(Span::styled(
            format!(
                "The assessment will be available again tomorrow before {}.",
                app.gate.cutoff()
            ),
            dim_style(),
        )),
        Line::default(),
        Line::from(Span::styled("(esc)ape", italic_style())),
    ];

    f.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        padded(area),
    );
}

fn padded(area: Rect) -> Rect {
    Layout::default()
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(1)])
        .split(area)[0]
}
