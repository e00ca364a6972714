use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use ratcompose_content::encoded_size;
use ratcompose_engine::{
    AttachmentNode, ComposeView, HeaderField, USER_HEADER_OVERFLOW, Wrap, format_size, more_marker,
    wrap_user_headers,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::keymap_mod::help_lines;
use crate::prompt_mod::{LineInput, SelectState};
use crate::ui_theme_mod::ComposeTheme;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderRow {
    pub(crate) label: String,
    pub(crate) value: String,
    pub(crate) more: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartRow {
    pub(crate) text: String,
    pub(crate) tagged: bool,
}

/// Owned copy of one compose view, kept so prompts can repaint between
/// controller iterations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Screen {
    pub(crate) header: Vec<HeaderRow>,
    pub(crate) parts: Vec<PartRow>,
    pub(crate) cursor: usize,
    pub(crate) status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum Footer {
    #[default]
    Empty,
    Message(String),
    Error(String),
    Prompt { prompt: String, input: LineInput },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Overlay {
    Help,
    Select {
        title: String,
        items: Vec<String>,
        state: SelectState,
    },
}

fn truncate_to_width(text: &str, max: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Lays out the addresses the wrap measurement placed, one string per row.
pub(crate) fn pack_addresses(items: &[String], wrap: Wrap, budget: usize) -> Vec<String> {
    let placed = items.len().saturating_sub(wrap.overflow);
    let max_rows = wrap.rows.max(1);
    let marker = if wrap.overflow > 0 {
        more_marker(wrap.overflow).width()
    } else {
        0
    };
    let mut rows = vec![String::new()];
    let mut left = budget;
    for (idx, item) in items.iter().take(placed).enumerate() {
        let piece = if idx + 1 < items.len() {
            format!("{}, ", item)
        } else {
            item.clone()
        };
        let width = piece.width();
        if width > left && left != budget && rows.len() < max_rows {
            rows.push(String::new());
            left = budget;
        }
        let reserve = if rows.len() == max_rows { marker } else { 0 };
        let Some(row) = rows.last_mut() else {
            break;
        };
        // Last placed item; nothing after it is drawn.
        if width > left.saturating_sub(reserve) {
            row.push_str(&truncate_to_width(item, left.saturating_sub(marker)));
            break;
        }
        row.push_str(&piece);
        left -= width;
    }
    if wrap.overflow > 0 {
        if let Some(row) = rows.last_mut() {
            row.push_str(&more_marker(wrap.overflow));
        }
    }
    rows
}

fn pad_label(field: HeaderField, width: usize) -> String {
    format!("{:>width$}", field.label(), width = width)
}

fn push_field(header: &mut Vec<HeaderRow>, field: HeaderField, width: usize, value: &str) {
    header.push(HeaderRow {
        label: pad_label(field, width),
        value: value.to_string(),
        more: None,
    });
}

fn push_addresses(
    header: &mut Vec<HeaderRow>,
    field: HeaderField,
    width: usize,
    items: &[String],
    wrap: Wrap,
    budget: usize,
) {
    let rows = pack_addresses(items, wrap, budget);
    let last = rows.len().saturating_sub(1);
    for (idx, mut value) in rows.into_iter().enumerate() {
        let mut more = None;
        if idx == last && wrap.overflow > 0 {
            let marker = more_marker(wrap.overflow);
            if let Some(stripped) = value.strip_suffix(marker.as_str()) {
                value = stripped.to_string();
                more = Some(marker);
            }
        }
        header.push(HeaderRow {
            label: if idx == 0 {
                pad_label(field, width)
            } else {
                " ".repeat(width)
            },
            value,
            more,
        });
    }
}

fn part_line(node: &AttachmentNode) -> String {
    let body = &node.body;
    let tag = if node.tagged { '*' } else { ' ' };
    let unlink = if body.unlink { 'D' } else { '-' };
    let fold = if node.collapsed { "+" } else { "" };
    let name = body
        .description
        .clone()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| body.label());
    format!(
        "{}{}{:>3} {}{}[{}, {}, {}] {}",
        tag,
        unlink,
        node.num + 1,
        "  ".repeat(node.level),
        fold,
        body.mime_type(),
        body.encoding.as_str(),
        format_size(encoded_size(body)),
        name
    )
}

pub(crate) fn snapshot(view: &ComposeView<'_>, columns: usize) -> Screen {
    let width = view.padding.max_width();
    let budget = view.padding.value_columns(columns);
    let envelope = view.envelope;
    let mut header = Vec::new();

    push_field(&mut header, HeaderField::From, width, &envelope.from.join(", "));
    if view.news {
        let groups = envelope.newsgroups.as_deref().unwrap_or("");
        push_field(&mut header, HeaderField::Newsgroups, width, groups);
        let followup = envelope.followup_to.as_deref().unwrap_or("");
        push_field(&mut header, HeaderField::FollowupTo, width, followup);
        if view.x_comment_to {
            let comment = envelope.x_comment_to.as_deref().unwrap_or("");
            push_field(&mut header, HeaderField::XCommentTo, width, comment);
        }
    } else {
        let lists = [
            (HeaderField::To, &envelope.to, view.rows.to),
            (HeaderField::Cc, &envelope.cc, view.rows.cc),
            (HeaderField::Bcc, &envelope.bcc, view.rows.bcc),
        ];
        for (field, items, wrap) in lists {
            push_addresses(&mut header, field, width, items, wrap, budget);
        }
    }
    let subject = envelope.subject.as_deref().unwrap_or("");
    push_field(&mut header, HeaderField::Subject, width, subject);
    push_field(&mut header, HeaderField::ReplyTo, width, &envelope.reply_to.join(", "));
    push_field(&mut header, HeaderField::Fcc, width, view.fcc);

    if view.rows.security > 0 {
        let lines = view.security_lines;
        push_field(&mut header, HeaderField::Security, width, &lines.main);
        if let Some(sign_as) = lines.sign_as.as_deref() {
            push_field(&mut header, HeaderField::SignAs, width, sign_as);
        }
        if let Some(autocrypt) = lines.autocrypt.as_deref() {
            push_field(&mut header, HeaderField::Autocrypt, width, autocrypt);
        }
    }

    if view.show_user_headers {
        let wrap = wrap_user_headers(&envelope.user_headers);
        let shown = if wrap.overflow > 0 {
            wrap.rows.saturating_sub(1)
        } else {
            wrap.rows
        };
        for (idx, h) in envelope.user_headers.iter().take(shown).enumerate() {
            let label = if idx == 0 {
                pad_label(HeaderField::CustomHeaders, width)
            } else {
                " ".repeat(width)
            };
            header.push(HeaderRow {
                label,
                value: format!("{}: {}", h.name, h.value),
                more: None,
            });
        }
        if wrap.overflow > 0 {
            header.push(HeaderRow {
                label: " ".repeat(width),
                value: USER_HEADER_OVERFLOW.to_string(),
                more: None,
            });
        }
    }

    let tree = view.tree;
    let parts = (0..tree.visible_len())
        .filter_map(|visible| tree.visible_to_index(visible))
        .filter_map(|idx| tree.get(idx))
        .map(|node| PartRow {
            text: part_line(node),
            tagged: node.tagged,
        })
        .collect();

    Screen {
        header,
        parts,
        cursor: view.cursor,
        status: view.status.clone(),
    }
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

pub(crate) fn draw_compose(
    frame: &mut ratatui::Frame,
    screen: &Screen,
    footer: &Footer,
    overlay: Option<&Overlay>,
    theme: &ComposeTheme,
) {
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(screen.header.len() as u16),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let header: Vec<Line> = screen
        .header
        .iter()
        .map(|row| {
            let mut spans = vec![
                Span::styled(row.label.clone(), theme.label),
                Span::styled(row.value.clone(), theme.value),
            ];
            if let Some(more) = row.more.as_deref() {
                spans.push(Span::styled(more.to_string(), theme.more));
            }
            Line::from(spans)
        })
        .collect();
    frame.render_widget(Paragraph::new(header).style(theme.base), chunks[0]);

    frame.render_widget(
        Paragraph::new("-- Attachments").style(theme.border),
        chunks[1],
    );

    let items: Vec<ListItem> = screen
        .parts
        .iter()
        .map(|row| {
            let style = if row.tagged { theme.tagged } else { theme.base };
            ListItem::new(row.text.clone()).style(style)
        })
        .collect();
    let mut state = ListState::default();
    if !screen.parts.is_empty() {
        state.select(Some(screen.cursor.min(screen.parts.len() - 1)));
    }
    frame.render_stateful_widget(
        List::new(items).highlight_style(theme.cursor),
        chunks[2],
        &mut state,
    );

    frame.render_widget(
        Paragraph::new(screen.status.clone()).style(theme.status),
        chunks[3],
    );
    draw_footer(frame, chunks[4], footer, theme);

    match overlay {
        Some(Overlay::Help) => draw_help(frame, area, theme),
        Some(Overlay::Select {
            title,
            items,
            state,
        }) => draw_select(frame, area, title, items, state, theme),
        None => {}
    }
}

fn draw_footer(frame: &mut ratatui::Frame, area: Rect, footer: &Footer, theme: &ComposeTheme) {
    match footer {
        Footer::Empty => {}
        Footer::Message(text) => {
            frame.render_widget(Paragraph::new(text.clone()).style(theme.footer), area);
        }
        Footer::Error(text) => {
            frame.render_widget(Paragraph::new(text.clone()).style(theme.error), area);
        }
        Footer::Prompt { prompt, input } => {
            let line = Line::from(vec![
                Span::styled(prompt.clone(), theme.label),
                Span::raw(input.text.clone()),
            ]);
            frame.render_widget(Paragraph::new(line).style(theme.footer), area);
            let before: String = input.text.chars().take(input.cursor).collect();
            let col = prompt.width() + before.width();
            let x = area.x + (col as u16).min(area.width.saturating_sub(1));
            frame.set_cursor_position((x, area.y));
        }
    }
}

fn draw_help(frame: &mut ratatui::Frame, area: Rect, theme: &ComposeTheme) {
    let popup = centered_rect(70, 80, area);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("HELP")
        .style(theme.base)
        .border_style(theme.border);
    let lines: Vec<Line> = help_lines()
        .into_iter()
        .map(|(key, help)| {
            Line::from(vec![
                Span::styled(format!("{:<8}", key), theme.label),
                Span::raw(help),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

fn draw_select(
    frame: &mut ratatui::Frame,
    area: Rect,
    title: &str,
    items: &[String],
    state: &SelectState,
    theme: &ComposeTheme,
) {
    let popup = centered_rect(80, 60, area);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .style(theme.base)
        .border_style(theme.border);
    let rows: Vec<ListItem> = items
        .iter()
        .zip(state.marked.iter())
        .map(|(item, marked)| {
            let mark = if *marked { "[x] " } else { "[ ] " };
            ListItem::new(format!("{}{}", mark, item))
        })
        .collect();
    let mut list_state = ListState::default();
    if !items.is_empty() {
        list_state.select(Some(state.cursor));
    }
    frame.render_stateful_widget(
        List::new(rows)
            .block(block)
            .highlight_style(theme.overlay_select),
        popup,
        &mut list_state,
    );
}
