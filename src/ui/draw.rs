use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::line::NORMAL as LINE;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use ratatui::{Frame, Terminal};

use crate::config::RgbColor;
use crate::contact::FormField;
use crate::render::{self, Listing};
use crate::session::{FormState, Notice, Overlay, Screen};

use super::app::App;

const LISTING_HELP: &str =
    "/: search  s: sort  n: new  Enter: show  e: edit  d: delete  r: refresh  q: quit";
const SEARCH_HELP: &str = "Type to filter  Enter/Esc: back to results";
const DETAIL_HELP: &str = "e: edit  Esc/q: close";
const FORM_HELP: &str = "Tab/Shift+Tab: next/prev field  Enter: save  Esc: cancel";
const CONFIRM_HELP: &str = "Y/Enter: confirm  N/Esc: cancel";
const NOTICE_HELP: &str = "Enter/Esc: dismiss";
const CONFIRM_DELETE: &str = "Are you sure you want to delete this contact?";
const EMPTY_STATE: &str = "No contacts found.";
const LOADING_STATE: &str = "Loading contacts...";

pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, app: &mut App) {
    let size = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(frame, layout[0], app);
    match app.session().screen().clone() {
        Screen::Listing => draw_listing_pane(frame, layout[1], app),
        Screen::NewContact(state) => {
            let overlay_open = *app.session().overlay() != Overlay::None;
            draw_form(frame, layout[1], app, "NEW CONTACT", &state, !overlay_open);
        }
    }
    draw_status(frame, layout[2], app);
    draw_footer(frame, layout[3], app);

    draw_overlay(frame, size, app);
    draw_notice(frame, size, app);
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let session = app.session();
    let style = header_text_style(app);

    let mut right = format!(
        "SORT: {}  {}/{}",
        session.query().sort.title(),
        session.store().view().len(),
        session.store().all().len()
    );
    if session.is_busy() {
        right.push_str("  LOADING");
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(right.len() as u16 + 1)])
        .split(area);

    let left = Line::from(Span::styled(
        format!("CONTACTS://{}", strip_scheme(app.api_url())),
        style,
    ));
    frame.render_widget(Paragraph::new(left), chunks[0]);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(right, style))).alignment(Alignment::Right),
        chunks[1],
    );
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

fn draw_listing_pane(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    draw_search_header(frame, layout[0], app, area.width);

    let listing = app.listing();
    match &listing {
        Listing::Empty if !app.session().is_bootstrapped() => {
            render_centered_words(frame, layout[1], LOADING_STATE)
        }
        Listing::Empty => render_centered_words(frame, layout[1], EMPTY_STATE),
        Listing::Rows(_) => draw_table(frame, layout[1], app, &listing),
    }
}

fn draw_search_header(frame: &mut Frame<'_>, area: Rect, app: &App, outer_width: u16) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let active = app.search_active;
    let label = "SEARCH: ";
    let value_style = if active {
        selection_style(app)
    } else {
        Style::default()
    };
    let (text, column) = sanitized_input(app.search_input.value(), app.search_input.cursor());
    let line = Line::from(vec![
        Span::styled(label, header_text_style(app)),
        Span::styled(text, value_style),
    ]);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    frame.render_widget(Paragraph::new(line), parts[0]);

    if active {
        let x = parts[0]
            .x
            .saturating_add((Span::raw(label).width() + column) as u16);
        frame.set_cursor_position((x, parts[0].y));
    }

    if area.height < 2 {
        return;
    }

    // Separator joined to the side borders: ├───┤
    let inner_width = outer_width.saturating_sub(2) as usize;
    let separator = format!(
        "{}{}{}",
        LINE.vertical_right,
        LINE.horizontal.repeat(inner_width),
        LINE.vertical_left
    );
    let separator_area = Rect {
        x: parts[1].x.saturating_sub(1),
        y: parts[1].y,
        width: outer_width,
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(separator, separator_style(app)))),
        separator_area,
    );
}

fn draw_table(frame: &mut Frame<'_>, area: Rect, app: &mut App, listing: &Listing) {
    // Header row takes one line
    app.page_size = area.height.saturating_sub(1) as usize;

    let header = Row::new(
        ["#", "FIRST NAME", "LAST NAME", "EMAIL", "PHONE", "ACTIONS"]
            .into_iter()
            .map(Cell::from),
    )
    .style(header_text_style(app).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = listing
        .rows()
        .iter()
        .map(|row| {
            let actions = row
                .actions
                .iter()
                .map(|action| action.kind.label())
                .collect::<Vec<_>>()
                .join(" ");
            Row::new(vec![
                Cell::from(row.index.to_string()),
                Cell::from(render::sanitize_terminal(&row.fname)),
                Cell::from(render::sanitize_terminal(&row.lname)),
                Cell::from(render::sanitize_terminal(&row.email)),
                Cell::from(render::sanitize_terminal(&row.phone)),
                Cell::from(Span::styled(actions, separator_style(app))),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Percentage(18),
        Constraint::Percentage(18),
        Constraint::Percentage(28),
        Constraint::Percentage(16),
        Constraint::Min(18),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .highlight_style(selection_style(app));

    frame.render_stateful_widget(table, area, &mut app.table_state);
}

fn draw_form(
    frame: &mut Frame<'_>,
    area: Rect,
    app: &App,
    title: &str,
    state: &FormState,
    show_cursor: bool,
) {
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app))
        .title(Span::styled(title.to_string(), header_text_style(app)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let label_width = FormField::ALL
        .iter()
        .map(|field| field.label().len())
        .max()
        .unwrap_or(0)
        + 2;

    let (editor_text, editor_column) = sanitized_input(app.editor.value(), app.editor.cursor());
    let lines: Vec<Line> = FormField::ALL
        .iter()
        .map(|field| {
            let value = if state.focus == *field {
                Span::styled(editor_text.clone(), selection_style(app))
            } else {
                Span::raw(render::sanitize_terminal(state.form.get(*field)))
            };
            form_line(app, *field, value, label_width)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);

    if !show_cursor || !app.editor.is_active() {
        return;
    }
    if let Some(row) = FormField::ALL.iter().position(|field| *field == state.focus) {
        if (row as u16) < inner.height {
            let x = inner.x.saturating_add((label_width + editor_column) as u16);
            frame.set_cursor_position((x, inner.y + row as u16));
        }
    }
}

fn form_line(app: &App, field: FormField, value: Span<'static>, label_width: usize) -> Line<'static> {
    let label = format!("{:<width$}", format!("{}:", field.label()), width = label_width);
    Line::from(vec![Span::styled(label, header_text_style(app)), value])
}

/// Input text made safe to paint, with the display column of the cursor
/// given as a char index into the raw text.
fn sanitized_input(value: &str, cursor: usize) -> (String, usize) {
    let split = value
        .char_indices()
        .nth(cursor)
        .map_or(value.len(), |(at, _)| at);
    let column = Span::raw(render::sanitize_terminal(&value[..split])).width();
    (render::sanitize_terminal(value), column)
}

fn draw_overlay(frame: &mut Frame<'_>, area: Rect, app: &App) {
    match app.session().overlay() {
        Overlay::None => {}
        Overlay::Viewing(contact) => {
            let label_width = 12;
            let lines: Vec<Line> = render::detail_fields(contact)
                .into_iter()
                .map(|(label, value)| {
                    Line::from(vec![
                        Span::styled(
                            format!("{:<width$}", format!("{}:", label), width = label_width),
                            header_text_style(app),
                        ),
                        Span::raw(render::sanitize_terminal(value)),
                    ])
                })
                .collect();
            let popup = centered_rect(area, 60, lines.len() as u16 + 2);
            draw_popup(frame, popup, app, "CONTACT", lines);
        }
        Overlay::Editing(state) => {
            let popup = centered_rect(area, 60, FormField::ALL.len() as u16 + 2);
            draw_form(frame, popup, app, "EDIT CONTACT", state, app.session().notice().is_none());
        }
        Overlay::ConfirmDelete(contact) => {
            let lines = vec![
                Line::from(CONFIRM_DELETE),
                Line::from(render::sanitize_terminal(&contact.display_name())),
                Line::from(""),
                Line::from(CONFIRM_HELP),
            ];
            let popup = centered_rect(area, 50, lines.len() as u16 + 2);
            draw_popup(frame, popup, app, "DELETE CONTACT", lines);
        }
    }
}

fn draw_notice(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(notice) = app.session().notice() else {
        return;
    };
    let lines = vec![
        Line::from(render::sanitize_terminal(&notice.message)),
        Line::from(""),
        Line::from(NOTICE_HELP),
    ];
    let popup = centered_rect(area, 60, lines.len() as u16 + 4);
    let title_style = notice_title_style(app, notice);

    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(title_style)
        .title(Span::styled(notice.title.clone(), title_style));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        popup,
    );
}

fn draw_popup(frame: &mut Frame<'_>, area: Rect, app: &App, title: &str, lines: Vec<Line>) {
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app))
        .title(Span::styled(title.to_string(), header_text_style(app)));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(status) = app.session().status() else {
        return;
    };
    let style = if status.is_error {
        Style::default().fg(color(app.ui_colors().error))
    } else {
        header_text_style(app)
    };
    frame.render_widget(
        Paragraph::new(render::sanitize_terminal(&status.text)).style(style),
        area,
    );
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let session = app.session();
    let message = if session.notice().is_some() {
        NOTICE_HELP
    } else {
        match session.overlay() {
            Overlay::Viewing(_) => DETAIL_HELP,
            Overlay::ConfirmDelete(_) => CONFIRM_HELP,
            Overlay::Editing(_) => FORM_HELP,
            Overlay::None => match session.screen() {
                Screen::NewContact(_) => FORM_HELP,
                Screen::Listing if app.search_active => SEARCH_HELP,
                Screen::Listing => LISTING_HELP,
            },
        }
    };

    let colors = app.ui_colors();
    let style = Style::default()
        .fg(color(colors.status_fg))
        .bg(color(colors.status_bg));

    let background = Block::default().style(Style::default().bg(color(colors.status_bg)));
    frame.render_widget(background, area);
    frame.render_widget(Paragraph::new(message).style(style), area);
}

/// A rect of `percent_x` of the width and `height` rows, centered in `area`.
fn centered_rect(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = (area.width.saturating_mul(percent_x) / 100)
        .max(area.width.min(30))
        .min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_centered_words(frame: &mut Frame<'_>, area: Rect, text: &str) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let target = Rect {
        x: area.x,
        y: area.y + area.height / 2,
        width: area.width,
        height: 1,
    };
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), target);
}

fn selection_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
}

fn border_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().border))
}

fn header_text_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().separator))
}

fn separator_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().separator))
}

fn notice_title_style(app: &App, notice: &Notice) -> Style {
    if notice.is_error() {
        Style::default()
            .fg(color(app.ui_colors().error))
            .add_modifier(Modifier::BOLD)
    } else {
        header_text_style(app).add_modifier(Modifier::BOLD)
    }
}

fn color(rgb: RgbColor) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::layout::Position;
    use tui_input::Input;

    use crate::config::Config;
    use crate::contact::{Contact, ContactId};
    use crate::mutation::fake::FakeRepository;

    const HOSTILE_NAME: &str = "\u{1b}]0;pwned\u{7}Bob\u{1b}[2J";

    fn test_app(config: &Config) -> App<'_> {
        App::new(config, Arc::new(FakeRepository::with(Vec::new()))).unwrap()
    }

    fn row_text(buffer: &Buffer, y: u16) -> String {
        let width = buffer.area.width as usize;
        buffer.content[y as usize * width..(y as usize + 1) * width]
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn has_control_chars(buffer: &Buffer) -> bool {
        buffer
            .content
            .iter()
            .any(|cell| cell.symbol().chars().any(char::is_control))
    }

    #[test]
    fn test_focused_form_field_is_sanitized() {
        let config = Config::default();
        let mut app = test_app(&config);
        let contact = Contact {
            id: ContactId(1),
            fname: HOSTILE_NAME.into(),
            lname: "Stone".into(),
            email: "bob@example.com".into(),
            phone: "1".into(),
            created_at: None,
        };
        let state = FormState::for_contact(&contact);
        app.editor.start(HOSTILE_NAME, FormField::FirstName);

        let mut terminal = Terminal::new(TestBackend::new(50, 6)).unwrap();
        terminal
            .draw(|frame| draw_form(frame, frame.area(), &app, "EDIT CONTACT", &state, true))
            .unwrap();

        let buffer = terminal.backend().buffer();
        assert!(!has_control_chars(buffer));
        let first = row_text(buffer, 1);
        assert!(first.contains("First Name:"));
        assert!(first.contains("Bob"));
        assert!(!first.contains("pwned"));
        // Cursor sits after the visible text, not after the raw escapes
        assert_eq!(terminal.get_cursor_position().unwrap(), Position::new(1 + 12 + 3, 1));
    }

    #[test]
    fn test_search_text_is_sanitized() {
        let config = Config::default();
        let mut app = test_app(&config);
        app.search_input = Input::new("\u{1b}[31mred".to_string());
        app.search_active = true;

        let mut terminal = Terminal::new(TestBackend::new(40, 2)).unwrap();
        terminal
            .draw(|frame| draw_search_header(frame, frame.area(), &app, 40))
            .unwrap();

        let buffer = terminal.backend().buffer();
        assert!(!has_control_chars(buffer));
        assert!(row_text(buffer, 0).starts_with("SEARCH: red "));
        assert_eq!(terminal.get_cursor_position().unwrap(), Position::new(11, 0));
    }

    #[test]
    fn test_sanitized_input_cursor_column() {
        assert_eq!(sanitized_input("abc", 1), ("abc".to_string(), 1));
        assert_eq!(sanitized_input("\u{7}ab", 3), ("ab".to_string(), 2));
        assert_eq!(sanitized_input("ab", 9), ("ab".to_string(), 2));
    }

    #[test]
    fn test_centered_rect_fits_area() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(area, 60, 6);
        assert_eq!(rect, Rect::new(20, 17, 60, 6));

        let tiny = Rect::new(0, 0, 20, 3);
        let rect = centered_rect(tiny, 60, 6);
        assert_eq!(rect, Rect::new(0, 0, 20, 3));
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("http://localhost:3000/contacts"), "localhost:3000/contacts");
        assert_eq!(strip_scheme("contacts"), "contacts");
    }
}
