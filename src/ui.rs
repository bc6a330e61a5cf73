use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, InputMode};
use crate::chat::{ChatRole, Language, CATEGORIES};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, category bar, input, footer
    let [header_area, chat_area, category_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_categories(frame, category_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_reset_confirm {
        render_reset_confirm(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let language = app.conversation.language();

    let title = Line::from(vec![
        Span::styled(" Pagume AI Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}]", language.display_name()),
            Style::default().fg(Color::Green),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let language = app.conversation.language();

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Pagume AI ");

    let empty = app.conversation.messages().is_empty() && !app.is_thinking();
    let chat_text = if empty {
        let hint = match language {
            Language::English => "Ask Pagume AI anything, in English or Amharic...",
            Language::Amharic => "ጥያቄህን በአማርኛ ወይም በእንግሊዝኛ ጠይቅ...",
        };
        Text::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.conversation.messages() {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                }
            }
            for line in msg.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::default());
        }

        if app.is_thinking() {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("{}{}", language.thinking_label(), dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    // Remember the wrapped line count so manual scrolling can be clamped
    app.total_chat_lines = count_wrapped_lines(&chat_text, app.chat_width);

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn count_wrapped_lines(text: &Text, width: u16) -> u16 {
    let wrap_width = if width > 0 { width as usize } else { 50 };
    let mut total: u16 = 0;
    for line in &text.lines {
        let char_count: usize = line.spans.iter().map(|s| s.content.chars().count()).sum();
        if char_count == 0 {
            total += 1;
        } else {
            total += ((char_count / wrap_width) + 1) as u16;
        }
    }
    total
}

fn render_categories(frame: &mut Frame, area: Rect) {
    let mut spans: Vec<Span> = vec![Span::raw(" ")];
    for (i, label) in CATEGORIES.iter().enumerate() {
        spans.push(Span::styled(
            format!("{}", i + 1),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!(" {}  ", label),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let bar = Paragraph::new(Line::from(spans));
    frame.render_widget(bar, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let language = app.conversation.language();

    let input_border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(" Message ");

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input.is_empty() && app.input_mode != InputMode::Editing {
        Paragraph::new(language.input_placeholder())
            .style(Style::default().fg(Color::DarkGray))
            .block(input_block)
    } else {
        // Get the visible slice of the input
        let visible_text: String = app
            .input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();

        Paragraph::new(visible_text)
            .style(Style::default().fg(Color::Cyan))
            .block(input_block)
    };

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints = match app.input_mode {
        InputMode::Editing => " Enter send | Esc keys",
        InputMode::Normal => " i type | j/k scroll | 1-4 topics | l language | r reset | q quit",
    };

    let mut spans = vec![Span::styled(hints, Style::default().fg(Color::DarkGray))];
    if app.conversation.is_pending() {
        spans.push(Span::styled(
            "  [waiting for reply]",
            Style::default().fg(Color::Yellow),
        ));
    }

    let footer = Paragraph::new(Line::from(spans));
    frame.render_widget(footer, area);
}

fn render_reset_confirm(frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = 4.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Clear conversation ");

    let body = Text::from(vec![
        Line::from("Delete all messages and saved history?"),
        Line::from(Span::styled(
            "y to confirm, n to cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let popup = Paragraph::new(body).block(block).wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}
