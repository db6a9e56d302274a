use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table},
    Frame,
};

use dsst::results::{summary, TestResult, HIGH_SCORE_THRESHOLD};

use crate::{
    ui::{
        bold_style, charting, dim_style, error_style, italic_style, ok_style, title_style,
        HORIZONTAL_MARGIN,
    },
    App, DashboardField, Notice,
};

pub fn render(app: &App, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(1),      // title
            Constraint::Length(4),      // settings
            Constraint::Length(1),      // filter
            Constraint::Percentage(35), // chart
            Constraint::Min(5),         // table
            Constraint::Length(3),      // summary
            Constraint::Length(1),      // notice
            Constraint::Length(1),      // legend
        ])
        .split(f.area());

    f.render_widget(
        Paragraph::new(Span::styled("DSST Results Dashboard", title_style()))
            .alignment(Alignment::Center),
        chunks[0],
    );

    render_settings(app, f, chunks[1]);
    render_filter(app, f, chunks[2]);

    let rows = app.dashboard.visible();
    let scores: Vec<u32> = rows.iter().map(|r| r.score).collect();
    render_chart(&scores, f, chunks[3]);
    render_table(app, f, chunks[4]);
    render_summary(&rows, f, chunks[5]);

    if let Some(notice) = &app.dashboard.notice {
        let (text, style) = match notice {
            Notice::Info(msg) => (msg.as_str(), ok_style()),
            Notice::Error(msg) => (msg.as_str(), error_style()),
        };
        f.render_widget(Paragraph::new(Span::styled(text, style)), chunks[6]);
    }

    let legend = if app.dashboard.editing.is_some() {
        "(enter) save / (esc) cancel"
    } else {
        "(f)ilter / (c)lear / (e)xport csv / (u)rl / cu(t)off / re(l)oad / (↑↓) scroll / (q) sign out"
    };
    f.render_widget(
        Paragraph::new(Span::styled(legend, italic_style())),
        chunks[7],
    );
}

/// `label: value`, or the edit buffer with a cursor while editing
fn setting_line<'a>(app: &'a App, field: DashboardField, label: &'a str, value: &'a str) -> Line<'a> {
    if app.dashboard.editing == Some(field) {
        Line::from(vec![
            Span::styled(format!("{label}: "), bold_style()),
            Span::styled(
                format!("{}_", app.dashboard.input),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::UNDERLINED),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled(format!("{label}: "), bold_style()),
            Span::raw(value),
        ])
    }
}

fn render_settings(app: &App, f: &mut Frame, area: Rect) {
    let text = vec![
        setting_line(
            app,
            DashboardField::RedirectUrl,
            "Redirect URL",
            app.settings.redirect_url(),
        ),
        setting_line(
            app,
            DashboardField::CutoffTime,
            "Daily Cutoff Time",
            app.settings.cutoff_time_str(),
        ),
    ];
    f.render_widget(
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(" Settings ")),
        area,
    );
}

fn render_filter(app: &App, f: &mut Frame, area: Rect) {
    let dashboard = &app.dashboard;
    let current = dashboard
        .date_filter
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "all dates".to_string());

    let mut line = setting_line(app, DashboardField::DateFilter, "Date", &current);
    let count = dashboard.visible().len();
    line.spans.push(Span::styled(
        if dashboard.loading {
            "   loading...".to_string()
        } else {
            format!("   {count} results")
        },
        dim_style(),
    ));
    f.render_widget(Paragraph::new(line), area);
}

fn render_chart(scores: &[u32], f: &mut Frame, area: Rect) {
    let coords = charting::score_coords(scores);
    let (overall_count, highest_score) = charting::compute_chart_params(&coords);

    let datasets = vec![Dataset::default()
        .marker(Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&coords)];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(" Scores "))
        .x_axis(
            Axis::default()
                .title("result")
                .bounds([1.0, overall_count])
                .labels(vec![
                    Span::styled("1", bold_style()),
                    Span::styled(charting::format_label(overall_count), bold_style()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("score")
                .bounds([0.0, highest_score])
                .labels(vec![
                    Span::styled("0", bold_style()),
                    Span::styled(charting::format_label(highest_score), bold_style()),
                ]),
        );
    f.render_widget(chart, area);
}

fn score_style(score: u32) -> Style {
    if score >= HIGH_SCORE_THRESHOLD {
        ok_style().add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    }
}

fn render_summary(results: &[TestResult], f: &mut Frame, area: Rect) {
    let stats = summary(results);
    let line = Line::from(vec![
        Span::styled("Average Score: ", bold_style()),
        Span::raw(format!("{:.1}", stats.average_score)),
        Span::raw("   "),
        Span::styled("Average Time (sec): ", bold_style()),
        Span::raw(format!("{:.1}", stats.average_time_secs)),
        Span::raw("   "),
        Span::styled("Total Tests: ", bold_style()),
        Span::raw(stats.total.to_string()),
    ]);
    f.render_widget(
        Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Summary Statistics "),
        ),
        area,
    );
}

fn render_table(app: &App, f: &mut Frame, area: Rect) {
    let results = app.dashboard.visible();
    if results.is_empty() {
        let message = if app.dashboard.loading {
            "Loading results..."
        } else {
            "No results found."
        };
        f.render_widget(
            Paragraph::new(message)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL).title(" Results ")),
            area,
        );
        return;
    }

    let header = Row::new(
        dsst::results::CSV_HEADERS
            .iter()
            .map(|h| Cell::from(*h).style(bold_style())),
    );
    let offset = app.dashboard.scroll_offset.min(results.len() - 1);
    let rows: Vec<Row> = results[offset..]
        .iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(r.id.to_string()),
                Cell::from(r.user_id.clone()),
                Cell::from(r.date.format("%Y-%m-%d").to_string()),
                Cell::from(r.score.to_string()).style(score_style(r.score)),
                Cell::from(r.time_spent_secs.to_string()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(6),  // ID
        Constraint::Length(12), // User ID
        Constraint::Length(12), // Date
        Constraint::Length(8),  // Score
        Constraint::Min(16),    // Time Spent
    ];

    let title = if offset > 0 {
        format!(" Results ({}/{}) ", offset + 1, results.len())
    } else {
        " Results ".to_string()
    };
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(2);
    f.render_widget(table, area);
}
