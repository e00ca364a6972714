use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STD;
use mailparse::{MailAddr, MailHeader, MailHeaderMap, ParsedMail, SingleInfo};

use ratcompose_core::{
    AttachedMessage, BodyNode, BodyPart, ContentInfo, ContentKind, Disposition, Envelope,
    TransferEncoding, UserHeader, now_ts,
};

const MAX_LINE_7BIT: u64 = 990;
static UNIQUE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Headers that map onto envelope fields or MIME structure and never become
/// user headers when a draft is resumed.
const MANAGED_HEADERS: [&str; 20] = [
    "from",
    "to",
    "cc",
    "bcc",
    "reply-to",
    "subject",
    "fcc",
    "newsgroups",
    "followup-to",
    "x-comment-to",
    "date",
    "message-id",
    "mime-version",
    "content-type",
    "content-transfer-encoding",
    "content-disposition",
    "content-description",
    "content-language",
    "received",
    "return-path",
];

/// Result of a header-and-body edit session.
#[derive(Debug, Clone)]
pub struct HeaderEdit {
    pub envelope: Envelope,
    pub attach: Vec<PathBuf>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ParsedDraft {
    pub envelope: Envelope,
    pub body: Vec<BodyNode>,
}

pub fn scan_content(bytes: &[u8]) -> ContentInfo {
    let mut info = ContentInfo::default();
    let mut line_len = 0u64;
    let mut iter = bytes.iter().peekable();
    while let Some(&b) = iter.next() {
        match b {
            b'\n' => {
                info.crlf += 1;
                info.linemax = info.linemax.max(line_len);
                line_len = 0;
                continue;
            }
            b'\r' if iter.peek() == Some(&&b'\n') => {
                continue;
            }
            0 => {
                info.nulbin += 1;
                info.lobin += 1;
            }
            b'\t' | 0x0c => info.ascii += 1,
            0x01..=0x1f | 0x7f => info.lobin += 1,
            0x80..=0xff => info.hibin += 1,
            _ => info.ascii += 1,
        }
        line_len += 1;
    }
    info.linemax = info.linemax.max(line_len);
    info
}

pub fn choose_encoding(kind: ContentKind, info: &ContentInfo) -> TransferEncoding {
    match kind {
        ContentKind::Multipart => TransferEncoding::SevenBit,
        ContentKind::Message => {
            if info.hibin > 0 || info.lobin > 0 {
                TransferEncoding::EightBit
            } else {
                TransferEncoding::SevenBit
            }
        }
        ContentKind::Text => {
            if info.nulbin > 0 {
                TransferEncoding::Base64
            } else if info.hibin == 0 && info.lobin == 0 && info.linemax <= MAX_LINE_7BIT {
                TransferEncoding::SevenBit
            } else if (info.hibin + info.lobin) * 5 > info.total() {
                TransferEncoding::Base64
            } else {
                TransferEncoding::QuotedPrintable
            }
        }
        _ => {
            if info.hibin > 0 || info.lobin > 0 || info.linemax > MAX_LINE_7BIT {
                TransferEncoding::Base64
            } else {
                TransferEncoding::SevenBit
            }
        }
    }
}

/// Rescans a part's content, picks a transfer encoding and restamps it.
pub fn update_encoding(part: &mut BodyPart) -> Result<()> {
    if part.is_container() {
        return Ok(());
    }
    let info = if let Some(message) = part.message.as_ref() {
        scan_content(&message.raw)
    } else if let Some(path) = part.filename.as_ref() {
        let bytes = std::fs::read(path)
            .map_err(|err| anyhow!("Can't read {}: {}", path.display(), err))?;
        scan_content(&bytes)
    } else {
        return Ok(());
    };
    part.encoding = choose_encoding(part.kind, &info);
    let ascii_charset = matches!(part.charset.as_deref(), None | Some("us-ascii"));
    if part.is_text() && ascii_charset {
        part.charset = Some(if info.hibin == 0 { "us-ascii" } else { "utf-8" }.to_string());
    }
    part.info = Some(info);
    part.stamp = now_ts();
    Ok(())
}

/// Size of a part after its transfer encoding is applied.
pub fn encoded_size(part: &BodyPart) -> u64 {
    let Some(info) = part.info.as_ref() else {
        return 0;
    };
    match part.encoding {
        TransferEncoding::QuotedPrintable => {
            3 * (info.lobin + info.hibin) + info.ascii + info.crlf
        }
        TransferEncoding::Base64 => (4 * info.total()) / 3,
        _ => info.total(),
    }
}

pub fn make_file_attach(path: &Path) -> Result<BodyPart> {
    let meta = std::fs::metadata(path).map_err(|err| anyhow!("{}: {}", path.display(), err))?;
    if !meta.is_file() {
        return Err(anyhow!("{} is not a regular file", path.display()));
    }
    let guess = mime_guess::from_path(path).first_or_octet_stream();
    let mut part = BodyPart::new(
        ContentKind::from_name(guess.type_().as_str()),
        guess.subtype().as_str(),
    );
    part.filename = Some(path.to_path_buf());
    update_encoding(&mut part)?;
    let sniffed_text = part
        .info
        .as_ref()
        .map(|info| info.lobin == 0 && info.nulbin == 0)
        .unwrap_or(false);
    if part.mime_type() == "application/octet-stream" && sniffed_text {
        part.kind = ContentKind::Text;
        part.subtype = "plain".to_string();
        part.charset = None;
        update_encoding(&mut part)?;
    }
    Ok(part)
}

/// Writes `text` to a fresh spool file and wraps it as the primary text part.
pub fn write_body_file(dir: &Path, text: &str) -> Result<BodyPart> {
    let path = spool_path(dir, "body.txt");
    std::fs::write(&path, text.as_bytes())
        .map_err(|err| anyhow!("Can't create file {}: {}", path.display(), err))?;
    let mut part = BodyPart::new(ContentKind::Text, "plain");
    part.filename = Some(path);
    part.disposition = Disposition::Inline;
    part.unlink = true;
    update_encoding(&mut part)?;
    Ok(part)
}

pub fn spool_path(dir: &Path, name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        "ratcompose-{}-{}-{}-{}",
        std::process::id(),
        stamp,
        seq,
        safe_filename(name)
    ))
}

/// Twelve random bytes, base64 encoded into a 16 character MIME boundary.
pub fn generate_boundary() -> Result<String> {
    let mut bytes = [0u8; 12];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow!("No random source for boundary: {}", e))?;
    Ok(BASE64_STD.encode(bytes))
}

pub fn format_address(info: &SingleInfo) -> String {
    match info.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => format!("{} <{}>", name, info.addr.trim()),
        _ => info.addr.trim().to_string(),
    }
}

pub fn mailaddrs_to_strings(addrs: &[MailAddr]) -> Vec<String> {
    let mut out = Vec::new();
    for addr in addrs {
        match addr {
            MailAddr::Single(info) => {
                if !info.addr.trim().is_empty() {
                    out.push(format_address(info));
                }
            }
            MailAddr::Group(group) => {
                for info in &group.addrs {
                    if !info.addr.trim().is_empty() {
                        out.push(format_address(info));
                    }
                }
            }
        }
    }
    out
}

pub fn parse_address_list(text: &str) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list = mailparse::addrparse(text).map_err(|err| anyhow!("Bad address: {}", err))?;
    Ok(mailaddrs_to_strings(&list))
}

/// Bare mailbox part of a formatted address.
pub fn address_mailbox(addr: &str) -> &str {
    match (addr.rfind('<'), addr.rfind('>')) {
        (Some(start), Some(end)) if start < end => addr[start + 1..end].trim(),
        _ => addr.trim(),
    }
}

pub fn parse_draft(raw: &[u8], spool_dir: &Path) -> Result<ParsedDraft> {
    let parsed = mailparse::parse_mail(raw)?;
    let envelope = envelope_from_headers(&parsed.headers)?;
    let root = body_node_from(&parsed, spool_dir)?;
    Ok(ParsedDraft {
        envelope,
        body: vec![root],
    })
}

fn envelope_from_headers(headers: &[MailHeader]) -> Result<Envelope> {
    let list = |name: &str| -> Result<Vec<String>> {
        match headers.get_first_value(name) {
            Some(value) => parse_address_list(&value),
            None => Ok(Vec::new()),
        }
    };
    let text = |name: &str| headers.get_first_value(name).filter(|v| !v.trim().is_empty());
    let mut envelope = Envelope {
        from: list("From")?,
        to: list("To")?,
        cc: list("Cc")?,
        bcc: list("Bcc")?,
        reply_to: list("Reply-To")?,
        subject: text("Subject"),
        fcc: text("Fcc"),
        user_headers: Vec::new(),
        newsgroups: text("Newsgroups"),
        followup_to: text("Followup-To"),
        x_comment_to: text("X-Comment-To"),
    };
    for header in headers {
        let key = header.get_key();
        if MANAGED_HEADERS.contains(&key.to_ascii_lowercase().as_str()) {
            continue;
        }
        envelope.user_headers.push(UserHeader {
            name: key,
            value: header.get_value(),
        });
    }
    Ok(envelope)
}

fn body_node_from(parsed: &ParsedMail, spool_dir: &Path) -> Result<BodyNode> {
    let mimetype = parsed.ctype.mimetype.to_lowercase();
    let (base, sub) = mimetype.split_once('/').unwrap_or(("text", "plain"));
    let kind = ContentKind::from_name(base);
    let headers = &parsed.headers;

    if kind == ContentKind::Multipart && !parsed.subparts.is_empty() {
        let mut part = BodyPart::container(sub);
        part.boundary = parsed.ctype.params.get("boundary").cloned();
        let mut parts = Vec::with_capacity(parsed.subparts.len());
        for sub_part in &parsed.subparts {
            parts.push(body_node_from(sub_part, spool_dir)?);
        }
        return Ok(BodyNode { part, parts });
    }

    let data = parsed.get_body_raw()?;
    let disposition = parsed.get_content_disposition();
    let name = disposition
        .params
        .get("filename")
        .cloned()
        .or_else(|| parsed.ctype.params.get("name").cloned());

    let mut part = if kind == ContentKind::Message && sub == "rfc822" {
        let inner = mailparse::parse_mail(&data)?;
        let message = AttachedMessage {
            subject: inner.headers.get_first_value("Subject").unwrap_or_default(),
            from: inner.headers.get_first_value("From").unwrap_or_default(),
            raw: data,
        };
        BodyPart::message(Arc::new(message))
    } else {
        let path = spool_path(spool_dir, name.as_deref().unwrap_or("part"));
        std::fs::write(&path, &data)
            .map_err(|err| anyhow!("Can't create file {}: {}", path.display(), err))?;
        let mut part = BodyPart::new(kind, sub);
        part.filename = Some(path);
        part.unlink = true;
        part
    };
    if kind == ContentKind::Text {
        part.charset = Some(parsed.ctype.charset.to_lowercase());
    }
    part.display_name = name;
    part.description = headers.get_first_value("Content-Description");
    part.language = headers.get_first_value("Content-Language");
    part.disposition = match disposition.disposition {
        mailparse::DispositionType::Attachment => Disposition::Attachment,
        _ => Disposition::Inline,
    };
    update_encoding(&mut part)?;
    Ok(BodyNode::leaf(part))
}

/// Renders the editable headers followed by a blank line and the body.
pub fn write_header_file(envelope: &Envelope, body: &str) -> String {
    let mut out = String::new();
    let mut line = |name: &str, value: &str| {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    };
    line("From", &envelope.from.join(", "));
    if envelope.newsgroups.is_some() {
        line("Newsgroups", envelope.newsgroups.as_deref().unwrap_or(""));
        line("Followup-To", envelope.followup_to.as_deref().unwrap_or(""));
        if let Some(comment) = envelope.x_comment_to.as_deref() {
            line("X-Comment-To", comment);
        }
    } else {
        line("To", &envelope.to.join(", "));
        line("Cc", &envelope.cc.join(", "));
        line("Bcc", &envelope.bcc.join(", "));
    }
    line("Subject", envelope.subject.as_deref().unwrap_or(""));
    line("Reply-To", &envelope.reply_to.join(", "));
    line("Fcc", envelope.fcc.as_deref().unwrap_or(""));
    for header in &envelope.user_headers {
        line(&header.name, &header.value);
    }
    out.push('\n');
    out.push_str(body);
    out
}

/// Parses a file written by [`write_header_file`] after the user edited it.
/// `Attach:` lines name files to add and never become headers.
pub fn read_header_file(raw: &[u8]) -> Result<HeaderEdit> {
    let (headers, offset) = mailparse::parse_headers(raw)?;
    let mut envelope = envelope_from_headers(&headers)?;
    let attach: Vec<PathBuf> = headers
        .get_all_values("Attach")
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .collect();
    envelope
        .user_headers
        .retain(|hdr| !hdr.name.eq_ignore_ascii_case("attach"));
    let body = String::from_utf8_lossy(&raw[offset.min(raw.len())..]).into_owned();
    Ok(HeaderEdit {
        envelope,
        attach,
        body,
    })
}

fn safe_filename(input: &str) -> String {
    let name = Path::new(input)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("part");
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use base64::Engine;
    use ratcompose_core::{ContentKind, Disposition, TransferEncoding};

    use super::{BASE64_STD, 
        address_mailbox, choose_encoding, encoded_size, generate_boundary, make_file_attach,
        parse_address_list, parse_draft, read_header_file, scan_content, update_encoding,
        write_body_file, write_header_file,
    };

    #[test]
    fn scan_counts_byte_classes_and_lines() {
        let info = scan_content(b"ab\r\nc\x01\xc3\xa9\n");
        assert_eq!(info.ascii, 3);
        assert_eq!(info.lobin, 1);
        assert_eq!(info.hibin, 2);
        assert_eq!(info.crlf, 2);
        assert_eq!(info.linemax, 4);
    }

    #[test]
    fn text_encoding_follows_content() {
        let plain = scan_content(b"hello\nworld\n");
        assert_eq!(
            choose_encoding(ContentKind::Text, &plain),
            TransferEncoding::SevenBit
        );
        let accented = scan_content("caf\u{e9} ordering for twelve people\n".as_bytes());
        assert_eq!(
            choose_encoding(ContentKind::Text, &accented),
            TransferEncoding::QuotedPrintable
        );
        let cyrillic = scan_content("\u{43f}\u{440}\u{438}\u{432}\u{435}\u{442}\n".as_bytes());
        assert_eq!(
            choose_encoding(ContentKind::Text, &cyrillic),
            TransferEncoding::Base64
        );
        let binary = scan_content(&[0x89, b'P', b'N', b'G', 0, 1]);
        assert_eq!(
            choose_encoding(ContentKind::Image, &binary),
            TransferEncoding::Base64
        );
    }

    #[test]
    fn encoded_size_applies_encoding_overhead() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut part = write_body_file(dir.path(), "abc\n")?;
        assert_eq!(encoded_size(&part), 4);
        part.encoding = TransferEncoding::Base64;
        assert_eq!(encoded_size(&part), 5);
        part.encoding = TransferEncoding::QuotedPrintable;
        assert_eq!(encoded_size(&part), 4);
        Ok(())
    }

    #[test]
    fn make_file_attach_guesses_type_and_sniffs_text() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let png = dir.path().join("logo.png");
        std::fs::write(&png, [0x89, b'P', b'N', b'G', 0, 0, 1])?;
        let part = make_file_attach(&png)?;
        assert_eq!(part.mime_type(), "image/png");
        assert_eq!(part.encoding, TransferEncoding::Base64);
        assert_eq!(part.disposition, Disposition::Attachment);
        assert!(part.stamp > 0);

        let notes = dir.path().join("NOTES");
        let mut file = std::fs::File::create(&notes)?;
        writeln!(file, "plain words")?;
        let part = make_file_attach(&notes)?;
        assert_eq!(part.mime_type(), "text/plain");
        assert_eq!(part.charset.as_deref(), Some("us-ascii"));
        Ok(())
    }

    #[test]
    fn make_file_attach_rejects_missing_and_directories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(make_file_attach(&dir.path().join("missing.txt")).is_err());
        assert!(make_file_attach(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn update_encoding_restamps_after_rewrite() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut part = write_body_file(dir.path(), "short\n")?;
        part.stamp = 0;
        if let Some(path) = part.filename.clone() {
            std::fs::write(path, "now with \u{fc}mlaut\n")?;
        }
        update_encoding(&mut part)?;
        assert!(part.stamp > 0);
        assert_eq!(part.encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(part.charset.as_deref(), Some("utf-8"));
        Ok(())
    }

    #[test]
    fn address_list_keeps_names_and_expands_groups() -> anyhow::Result<()> {
        let list = parse_address_list("Alice <alice@x.com>, team: bob@y.com, carol@z.com;")?;
        assert_eq!(
            list,
            vec![
                "Alice <alice@x.com>".to_string(),
                "bob@y.com".to_string(),
                "carol@z.com".to_string()
            ]
        );
        assert!(parse_address_list("   ")?.is_empty());
        assert_eq!(address_mailbox("Alice <alice@x.com>"), "alice@x.com");
        assert_eq!(address_mailbox("bob@y.com"), "bob@y.com");
        Ok(())
    }

    #[test]
    fn boundaries_are_random_base64() -> anyhow::Result<()> {
        let a = generate_boundary()?;
        let b = generate_boundary()?;
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
        assert_eq!(BASE64_STD.decode(&a)?.len(), 12);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
        );
        Ok(())
    }

    #[test]
    fn parse_draft_builds_envelope_and_spools_parts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let raw = concat!(
            "From: Me <me@example.com>\r\n",
            "To: alice@x.com, bob@y.com\r\n",
            "Subject: Report\r\n",
            "X-Priority: 1\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"zz\"\r\n",
            "\r\n",
            "--zz\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Body text\r\n",
            "--zz\r\n",
            "Content-Type: application/pdf; name=\"r.pdf\"\r\n",
            "Content-Disposition: attachment; filename=\"r.pdf\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "JVBERi0=\r\n",
            "--zz--\r\n"
        );
        let draft = parse_draft(raw.as_bytes(), dir.path())?;
        assert_eq!(draft.envelope.from, vec!["Me <me@example.com>".to_string()]);
        assert_eq!(draft.envelope.to.len(), 2);
        assert_eq!(draft.envelope.subject.as_deref(), Some("Report"));
        assert_eq!(draft.envelope.user_headers.len(), 1);
        assert_eq!(draft.envelope.user_headers[0].name, "X-Priority");

        let root = &draft.body[0];
        assert!(root.part.is_container());
        assert_eq!(root.part.boundary.as_deref(), Some("zz"));
        assert_eq!(root.parts.len(), 2);
        let pdf = &root.parts[1].part;
        assert_eq!(pdf.mime_type(), "application/pdf");
        assert_eq!(pdf.display_name.as_deref(), Some("r.pdf"));
        assert!(pdf.unlink);
        let spooled = pdf.filename.clone().unwrap_or_default();
        assert_eq!(std::fs::read(spooled)?, b"%PDF-".to_vec());
        Ok(())
    }

    #[test]
    fn header_file_edits_come_back_with_attach_lines() -> anyhow::Result<()> {
        let envelope = ratcompose_core::Envelope {
            from: vec!["Me <me@example.com>".to_string()],
            to: vec!["alice@x.com".to_string()],
            subject: Some("Draft".to_string()),
            user_headers: vec![ratcompose_core::UserHeader {
                name: "X-Mood".to_string(),
                value: "calm".to_string(),
            }],
            ..ratcompose_core::Envelope::default()
        };
        let text = write_header_file(&envelope, "hello\n");
        assert!(text.starts_with("From: Me <me@example.com>\nTo: alice@x.com\nCc: \n"));
        assert!(text.ends_with("X-Mood: calm\n\nhello\n"));

        let edited = text
            .replace("Cc: \n", "Cc: bob@y.com\nAttach: /tmp/report.pdf\n")
            .replace("hello", "hello again");
        let parsed = read_header_file(edited.as_bytes())?;
        assert_eq!(parsed.envelope.cc, vec!["bob@y.com".to_string()]);
        assert_eq!(parsed.envelope.subject.as_deref(), Some("Draft"));
        assert_eq!(parsed.envelope.fcc, None);
        assert_eq!(parsed.attach, vec![std::path::PathBuf::from("/tmp/report.pdf")]);
        assert_eq!(parsed.envelope.user_headers.len(), 1);
        assert_eq!(parsed.body, "hello again\n");
        Ok(())
    }
}
