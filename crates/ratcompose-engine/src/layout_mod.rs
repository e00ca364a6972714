use ratcompose_core::{Envelope, SecurityFlags, UserHeader};
use unicode_width::UnicodeWidthStr;

pub const MAX_ADDR_ROWS: usize = 5;
pub const MAX_USER_HEADER_ROWS: usize = 5;
pub const USER_HEADER_OVERFLOW: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    From,
    To,
    Cc,
    Bcc,
    Subject,
    ReplyTo,
    Fcc,
    Security,
    SignAs,
    Autocrypt,
    Newsgroups,
    FollowupTo,
    XCommentTo,
    CustomHeaders,
}

impl HeaderField {
    pub const ALL: [HeaderField; 14] = [
        HeaderField::From,
        HeaderField::To,
        HeaderField::Cc,
        HeaderField::Bcc,
        HeaderField::Subject,
        HeaderField::ReplyTo,
        HeaderField::Fcc,
        HeaderField::Security,
        HeaderField::SignAs,
        HeaderField::Autocrypt,
        HeaderField::Newsgroups,
        HeaderField::FollowupTo,
        HeaderField::XCommentTo,
        HeaderField::CustomHeaders,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HeaderField::From => "From: ",
            HeaderField::To => "To: ",
            HeaderField::Cc => "Cc: ",
            HeaderField::Bcc => "Bcc: ",
            HeaderField::Subject => "Subject: ",
            HeaderField::ReplyTo => "Reply-To: ",
            HeaderField::Fcc => "Fcc: ",
            HeaderField::Security => "Security: ",
            HeaderField::SignAs => "Sign as: ",
            HeaderField::Autocrypt => "Autocrypt: ",
            HeaderField::Newsgroups => "Newsgroups: ",
            HeaderField::FollowupTo => "Followup-To: ",
            HeaderField::XCommentTo => "X-Comment-To: ",
            HeaderField::CustomHeaders => "Headers: ",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Label widths for the envelope column, computed once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPadding {
    widths: [usize; 14],
    max_width: usize,
}

impl HeaderPadding {
    pub fn new() -> Self {
        let mut widths = [0usize; 14];
        let mut max_width = 0usize;
        for field in HeaderField::ALL {
            let width = field.label().width();
            widths[field.slot()] = width;
            // "Sign as:" sits under "Security:" and is indented separately
            if field != HeaderField::SignAs {
                max_width = max_width.max(width);
            }
        }
        Self { widths, max_width }
    }

    pub fn width(&self, field: HeaderField) -> usize {
        self.widths[field.slot()]
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Columns left for field values in a window `columns` wide.
    pub fn value_columns(&self, columns: usize) -> usize {
        columns.saturating_sub(self.max_width)
    }
}

impl Default for HeaderPadding {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wrap {
    pub rows: usize,
    pub overflow: usize,
}

pub fn more_marker(count: usize) -> String {
    format!("(+{} more)", count)
}

/// Greedy row packing for an address list. Every item but the last is
/// charged two extra columns for its `", "` separator.
pub fn wrap_address_list(items: &[String], budget: usize, max_rows: usize) -> Wrap {
    if items.is_empty() {
        return Wrap {
            rows: 1,
            overflow: 0,
        };
    }
    let max_rows = max_rows.max(1);
    let widths: Vec<usize> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| item.width() + if idx + 1 < items.len() { 2 } else { 0 })
        .collect();
    let mut suffix = vec![0usize; widths.len() + 1];
    for idx in (0..widths.len()).rev() {
        suffix[idx] = suffix[idx + 1] + widths[idx];
    }

    let mut rows = 1usize;
    let mut left = budget;
    let mut idx = 0usize;
    while idx < items.len() {
        let mut avail = left;
        let remaining_after = items.len() - idx - 1;
        if rows == max_rows && remaining_after > 0 && suffix[idx] > left {
            avail = left.saturating_sub(more_marker(remaining_after).width());
        }
        if widths[idx] <= avail {
            left -= widths[idx];
            idx += 1;
            continue;
        }
        // The item that can't fit is still shown, cut to the row.
        if rows == max_rows || left == budget {
            return Wrap {
                rows,
                overflow: items.len() - idx - 1,
            };
        }
        rows += 1;
        left = budget;
    }
    Wrap { rows, overflow: 0 }
}

/// Custom headers take one row each up to the cap; past it the last row
/// becomes an ellipsis standing in for the rest.
pub fn wrap_user_headers(headers: &[UserHeader]) -> Wrap {
    let count = headers.len();
    if count > MAX_USER_HEADER_ROWS {
        Wrap {
            rows: MAX_USER_HEADER_ROWS,
            overflow: count - (MAX_USER_HEADER_ROWS - 1),
        }
    } else {
        Wrap {
            rows: count,
            overflow: 0,
        }
    }
}

pub fn measure_user_header_rows(headers: &[UserHeader]) -> usize {
    wrap_user_headers(headers).rows
}

pub fn measure_security_rows(flags: SecurityFlags, has_crypto: bool, autocrypt: bool) -> usize {
    if !has_crypto {
        return 0;
    }
    let mut rows = if flags.intersects(SecurityFlags::ENCRYPT | SecurityFlags::SIGN) {
        2
    } else {
        1
    };
    if autocrypt {
        rows += 1;
    }
    rows
}

/// Settings that shape the envelope area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutInputs {
    pub columns: usize,
    pub news: bool,
    pub x_comment_to: bool,
    pub has_crypto: bool,
    pub autocrypt: bool,
    pub show_user_headers: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeRows {
    pub to: Wrap,
    pub cc: Wrap,
    pub bcc: Wrap,
    pub security: usize,
    pub user_headers: usize,
    pub total: usize,
}

pub fn measure_envelope_rows(
    envelope: &Envelope,
    flags: SecurityFlags,
    padding: &HeaderPadding,
    inputs: LayoutInputs,
) -> EnvelopeRows {
    let mut out = EnvelopeRows::default();
    // From, Subject, Reply-To, Fcc
    let mut total = 4usize;
    if inputs.news {
        total += 2;
        if inputs.x_comment_to {
            total += 1;
        }
    } else {
        let budget = padding.value_columns(inputs.columns);
        out.to = wrap_address_list(&envelope.to, budget, MAX_ADDR_ROWS);
        out.cc = wrap_address_list(&envelope.cc, budget, MAX_ADDR_ROWS);
        out.bcc = wrap_address_list(&envelope.bcc, budget, MAX_ADDR_ROWS);
        total += out.to.rows + out.cc.rows + out.bcc.rows;
    }
    out.security = measure_security_rows(flags, inputs.has_crypto, inputs.autocrypt);
    total += out.security;
    if inputs.show_user_headers {
        out.user_headers = measure_user_header_rows(&envelope.user_headers);
        total += out.user_headers;
    }
    out.total = total;
    out
}

pub fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1}M", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 10 * 1024 {
        format!("{}K", (bytes as f64 / 1024.0).round() as u64)
    } else if bytes >= 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{}", bytes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusInfo {
    pub attachments: usize,
    pub size: u64,
    pub hostname: String,
    pub version: String,
}

fn expand_status(fmt: &str, info: &StatusInfo) -> String {
    let mut out = String::new();
    let mut chars = fmt.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('a') => out.push_str(&info.attachments.to_string()),
            Some('l') => out.push_str(&format_size(info.size)),
            Some('h') => out.push_str(&info.hostname),
            Some('v') => out.push_str(&info.version),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Expands the compose status format. `%>X` fills the gap up to `columns`
/// with the character X, pushing the rest of the line to the right edge.
pub fn format_status(fmt: &str, info: &StatusInfo, columns: usize) -> String {
    let Some(pos) = fmt.find("%>") else {
        return expand_status(fmt, info);
    };
    let left = expand_status(&fmt[..pos], info);
    let mut rest = fmt[pos + 2..].chars();
    let fill = rest.next().unwrap_or(' ');
    let right = expand_status(rest.as_str(), info);
    let used = left.width() + right.width();
    let pad = columns.saturating_sub(used);
    let mut out = left;
    out.extend(std::iter::repeat_n(fill, pad));
    out.push_str(&right);
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use ratcompose_core::{Envelope, SecurityFlags, UserHeader};

    use crate::layout_mod::{
        HeaderField, HeaderPadding, LayoutInputs, StatusInfo, Wrap, format_size, format_status,
        measure_envelope_rows, measure_security_rows, wrap_address_list, wrap_user_headers,
    };

    fn addrs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_list_still_takes_one_row() {
        assert_eq!(
            wrap_address_list(&[], 40, 5),
            Wrap {
                rows: 1,
                overflow: 0
            }
        );
    }

    #[test]
    fn three_addresses_in_twenty_columns_wrap_after_each_overflow() {
        let items = addrs(&["alice@x.com", "bob@y.com", "carol@z.com"]);
        // 13 + 11 > 20, then 11 + 11 > 20
        assert_eq!(
            wrap_address_list(&items, 20, 5),
            Wrap {
                rows: 3,
                overflow: 0
            }
        );
        assert_eq!(wrap_address_list(&items, 24, 5).rows, 2);
        assert_eq!(wrap_address_list(&items, 35, 5).rows, 1);
    }

    #[test]
    fn item_wider_than_a_fresh_row_stops_wrapping() {
        let items = addrs(&["a@b.c", "someone-with-a-very-long-name@example.org", "z@y.x"]);
        let wrap = wrap_address_list(&items, 20, 5);
        // the long address is drawn truncated; only z@y.x is hidden
        assert_eq!(wrap.rows, 2);
        assert_eq!(wrap.overflow, 1);
    }

    #[test]
    fn lone_long_address_is_truncated_not_hidden() {
        let items = addrs(&["someone-with-a-very-long-name@example.org"]);
        assert_eq!(
            wrap_address_list(&items, 20, 5),
            Wrap {
                rows: 1,
                overflow: 0
            }
        );
    }

    #[test]
    fn capped_rows_report_hidden_items() {
        let items: Vec<String> = (0..20).map(|i| format!("user{:02}@example.com", i)).collect();
        let wrap = wrap_address_list(&items, 30, 5);
        assert_eq!(wrap.rows, 5);
        assert!(wrap.overflow > 0);
        assert!(wrap.overflow < 20);
    }

    #[test]
    fn user_headers_cap_at_five_with_ellipsis() {
        let headers: Vec<UserHeader> = (0..7)
            .map(|i| UserHeader {
                name: format!("X-H{}", i),
                value: "v".to_string(),
            })
            .collect();
        assert_eq!(
            wrap_user_headers(&headers),
            Wrap {
                rows: 5,
                overflow: 3
            }
        );
        assert_eq!(wrap_user_headers(&headers[..5]).rows, 5);
        assert_eq!(wrap_user_headers(&headers[..5]).overflow, 0);
        assert_eq!(wrap_user_headers(&[]).rows, 0);
    }

    #[test]
    fn security_rows_follow_backend_flags_and_autocrypt() {
        assert_eq!(measure_security_rows(SecurityFlags::SIGN, false, true), 0);
        assert_eq!(measure_security_rows(SecurityFlags::PGP, true, false), 1);
        assert_eq!(
            measure_security_rows(SecurityFlags::PGP | SecurityFlags::SIGN, true, false),
            2
        );
        assert_eq!(
            measure_security_rows(SecurityFlags::ENCRYPT | SecurityFlags::SIGN, true, true),
            3
        );
    }

    #[test]
    fn padding_excludes_sign_as_from_max_width() {
        let padding = HeaderPadding::new();
        assert_eq!(padding.width(HeaderField::To), 4);
        assert_eq!(padding.width(HeaderField::SignAs), 9);
        assert_eq!(padding.max_width(), "X-Comment-To: ".len());
        assert_eq!(padding.value_columns(80), 80 - 14);
        assert_eq!(padding.value_columns(5), 0);
    }

    #[test]
    fn envelope_rows_sum_fixed_fields_and_wraps() {
        let padding = HeaderPadding::new();
        let envelope = Envelope {
            to: addrs(&["a@b.c"]),
            user_headers: vec![UserHeader {
                name: "X-A".to_string(),
                value: "1".to_string(),
            }],
            ..Envelope::default()
        };
        let inputs = LayoutInputs {
            columns: 80,
            has_crypto: true,
            autocrypt: true,
            show_user_headers: true,
            ..LayoutInputs::default()
        };
        let rows = measure_envelope_rows(&envelope, SecurityFlags::empty(), &padding, inputs);
        // 4 fixed + to/cc/bcc + security + autocrypt + one header
        assert_eq!(rows.total, 4 + 3 + 2 + 1);

        let news = LayoutInputs {
            news: true,
            x_comment_to: true,
            has_crypto: false,
            show_user_headers: false,
            ..inputs
        };
        assert_eq!(
            measure_envelope_rows(&envelope, SecurityFlags::empty(), &padding, news).total,
            7
        );
    }

    #[test]
    fn status_line_expands_and_pads_to_width() {
        let info = StatusInfo {
            attachments: 3,
            size: 2048,
            hostname: "box".to_string(),
            version: "0.1.0".to_string(),
        };
        let line = format_status("-- %h [%l, Atts: %a]%>-|", &info, 30);
        assert!(line.starts_with("-- box [2.0K, Atts: 3]"));
        assert!(line.ends_with("-|"));
        assert_eq!(line.chars().count(), 30);
        assert_eq!(format_status("v%v 100%%", &info, 10), "v0.1.0 100%");
    }

    #[test]
    fn sizes_use_short_units() {
        assert_eq!(format_size(512), "512");
        assert_eq!(format_size(1536), "1.5K");
        assert_eq!(format_size(20 * 1024), "20K");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0M");
    }

    fn address() -> impl Strategy<Value = String> {
        "[a-z]{1,12}@[a-z]{1,8}\\.(com|org|de)"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn wrap_is_deterministic_and_bounded(
            items in proptest::collection::vec(address(), 0..12),
            budget in 0usize..80,
            max_rows in 1usize..6,
        ) {
            let first = wrap_address_list(&items, budget, max_rows);
            let second = wrap_address_list(&items, budget, max_rows);
            prop_assert_eq!(first, second);
            prop_assert!(first.rows >= 1);
            prop_assert!(first.rows <= max_rows);
            prop_assert!(first.overflow <= items.len());

            let joined = items.join(", ");
            if joined.len() <= budget {
                prop_assert_eq!(first, Wrap { rows: 1, overflow: 0 });
            }
        }
    }
}
