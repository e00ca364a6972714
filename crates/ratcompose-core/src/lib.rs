use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Vec<String>,
    pub subject: Option<String>,
    pub fcc: Option<String>,
    pub user_headers: Vec<UserHeader>,
    pub newsgroups: Option<String>,
    pub followup_to: Option<String>,
    pub x_comment_to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressField {
    From,
    To,
    Cc,
    Bcc,
    ReplyTo,
}

impl AddressField {
    pub fn label(self) -> &'static str {
        match self {
            AddressField::From => "From",
            AddressField::To => "To",
            AddressField::Cc => "Cc",
            AddressField::Bcc => "Bcc",
            AddressField::ReplyTo => "Reply-To",
        }
    }

    /// Fields whose contents feed recipient-based security decisions.
    pub fn affects_recipients(self) -> bool {
        matches!(
            self,
            AddressField::To | AddressField::Cc | AddressField::Bcc | AddressField::From
        )
    }
}

impl Envelope {
    pub fn addresses(&self, field: AddressField) -> &[String] {
        match field {
            AddressField::From => &self.from,
            AddressField::To => &self.to,
            AddressField::Cc => &self.cc,
            AddressField::Bcc => &self.bcc,
            AddressField::ReplyTo => &self.reply_to,
        }
    }

    pub fn addresses_mut(&mut self, field: AddressField) -> &mut Vec<String> {
        match field {
            AddressField::From => &mut self.from,
            AddressField::To => &mut self.to,
            AddressField::Cc => &mut self.cc,
            AddressField::Bcc => &mut self.bcc,
            AddressField::ReplyTo => &mut self.reply_to,
        }
    }

    pub fn recipients(&self) -> impl Iterator<Item = &String> {
        self.to.iter().chain(self.cc.iter()).chain(self.bcc.iter())
    }

    pub fn header(&self, name: &str) -> Option<&UserHeader> {
        self.user_headers
            .iter()
            .find(|hdr| hdr.name.eq_ignore_ascii_case(name))
    }

    /// Replaces a header with the same name or appends a new one.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        if let Some(existing) = self
            .user_headers
            .iter_mut()
            .find(|hdr| hdr.name.eq_ignore_ascii_case(name))
        {
            if existing.value == value {
                return false;
            }
            existing.value = value.to_string();
            return true;
        }
        self.user_headers.push(UserHeader {
            name: name.to_string(),
            value: value.to_string(),
        });
        true
    }

    pub fn remove_header(&mut self, name: &str) -> bool {
        let before = self.user_headers.len();
        self.user_headers
            .retain(|hdr| !hdr.name.eq_ignore_ascii_case(name));
        before != self.user_headers.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Text,
    Image,
    Audio,
    Video,
    Application,
    Message,
    Multipart,
    Model,
    Other,
}

impl ContentKind {
    pub fn from_name(name: &str) -> ContentKind {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" => ContentKind::Text,
            "image" => ContentKind::Image,
            "audio" => ContentKind::Audio,
            "video" => ContentKind::Video,
            "application" => ContentKind::Application,
            "message" => ContentKind::Message,
            "multipart" => ContentKind::Multipart,
            "model" => ContentKind::Model,
            _ => ContentKind::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Audio => "audio",
            ContentKind::Video => "video",
            ContentKind::Application => "application",
            ContentKind::Message => "message",
            ContentKind::Multipart => "multipart",
            ContentKind::Model => "model",
            ContentKind::Other => "x-unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
    UuEncoded,
}

impl TransferEncoding {
    pub fn from_name(name: &str) -> Option<TransferEncoding> {
        match name.trim().to_ascii_lowercase().as_str() {
            "7bit" => Some(TransferEncoding::SevenBit),
            "8bit" => Some(TransferEncoding::EightBit),
            "binary" => Some(TransferEncoding::Binary),
            "quoted-printable" => Some(TransferEncoding::QuotedPrintable),
            "base64" => Some(TransferEncoding::Base64),
            "x-uuencode" | "x-uue" => Some(TransferEncoding::UuEncoded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::Binary => "binary",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::UuEncoded => "x-uuencode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Inline,
    Attachment,
}

/// Byte statistics gathered from a part's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub ascii: u64,
    pub hibin: u64,
    pub lobin: u64,
    pub nulbin: u64,
    pub crlf: u64,
    pub linemax: u64,
}

impl ContentInfo {
    pub fn total(&self) -> u64 {
        self.ascii + self.hibin + self.lobin + self.crlf
    }
}

/// A message pulled in from a mailbox. Shared with whoever handed it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedMessage {
    pub subject: String,
    pub from: String,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyPart {
    pub kind: ContentKind,
    pub subtype: String,
    pub charset: Option<String>,
    pub filename: Option<PathBuf>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub disposition: Disposition,
    pub encoding: TransferEncoding,
    pub boundary: Option<String>,
    /// Skip charset conversion when sending.
    pub noconv: bool,
    /// Delete the backing file when this part is released.
    pub unlink: bool,
    /// Unix seconds of the last encoding pass.
    pub stamp: i64,
    pub info: Option<ContentInfo>,
    #[serde(skip)]
    pub message: Option<Arc<AttachedMessage>>,
}

impl BodyPart {
    pub fn new(kind: ContentKind, subtype: &str) -> Self {
        Self {
            kind,
            subtype: subtype.to_ascii_lowercase(),
            charset: None,
            filename: None,
            display_name: None,
            description: None,
            language: None,
            disposition: Disposition::Attachment,
            encoding: TransferEncoding::SevenBit,
            boundary: None,
            noconv: false,
            unlink: false,
            stamp: 0,
            info: None,
            message: None,
        }
    }

    pub fn container(subtype: &str) -> Self {
        let mut part = Self::new(ContentKind::Multipart, subtype);
        part.disposition = Disposition::Inline;
        part
    }

    pub fn message(message: Arc<AttachedMessage>) -> Self {
        let mut part = Self::new(ContentKind::Message, "rfc822");
        part.description = Some(message.subject.clone()).filter(|s| !s.is_empty());
        part.disposition = Disposition::Inline;
        part.message = Some(message);
        part
    }

    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.kind.as_str(), self.subtype)
    }

    pub fn is_container(&self) -> bool {
        self.kind == ContentKind::Multipart
    }

    pub fn is_text(&self) -> bool {
        self.kind == ContentKind::Text
    }

    /// Name shown to the user and offered to recipients.
    pub fn label(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.filename
            .as_deref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .unwrap_or_default()
    }
}

/// A nested body as stored in a message, before it is flattened for editing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyNode {
    pub part: BodyPart,
    pub parts: Vec<BodyNode>,
}

impl BodyNode {
    pub fn leaf(part: BodyPart) -> Self {
        Self {
            part,
            parts: Vec::new(),
        }
    }
}

bitflags! {
    /// Security state of the message being composed.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SecurityFlags: u16 {
        const ENCRYPT = 1 << 0;
        const SIGN = 1 << 1;
        const OPPENCRYPT = 1 << 2;
        const AUTOCRYPT = 1 << 3;
        const AUTOCRYPT_OVERRIDE = 1 << 4;
        const INLINE = 1 << 5;
        const PGP = 1 << 6;
        const SMIME = 1 << 7;
    }
}

impl fmt::Display for SecurityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(SecurityFlags, &str); 8] = [
            (SecurityFlags::ENCRYPT, "encrypt"),
            (SecurityFlags::SIGN, "sign"),
            (SecurityFlags::OPPENCRYPT, "oppenc"),
            (SecurityFlags::AUTOCRYPT, "autocrypt"),
            (SecurityFlags::AUTOCRYPT_OVERRIDE, "override"),
            (SecurityFlags::INLINE, "inline"),
            (SecurityFlags::PGP, "pgp"),
            (SecurityFlags::SMIME, "smime"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[default]
    Off,
    No,
    Discouraged,
    Available,
    Yes,
}

impl Recommendation {
    pub fn label(self) -> &'static str {
        match self {
            Recommendation::Off => "Off",
            Recommendation::No => "No",
            Recommendation::Discouraged => "Discouraged",
            Recommendation::Available => "Available",
            Recommendation::Yes => "Yes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuadOption {
    Yes,
    No,
    AskYes,
    AskNo,
}

impl QuadOption {
    pub fn parse(raw: &str) -> Option<QuadOption> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(QuadOption::Yes),
            "no" => Some(QuadOption::No),
            "ask-yes" => Some(QuadOption::AskYes),
            "ask-no" => Some(QuadOption::AskNo),
            _ => None,
        }
    }
}

static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();

pub fn xdg_state_dir() -> PathBuf {
    std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

pub fn xdg_config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

pub fn log_debug(msg: &str) {
    if std::env::var("RATCOMPOSE_LOG").is_err() {
        return;
    }
    let path = xdg_state_dir().join("ratcompose").join("ratcompose.log");
    let lock = LOG_FILE.get_or_init(|| {
        let _ = std::fs::create_dir_all(path.parent().unwrap_or_else(|| Path::new("/tmp")));
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok();
        Mutex::new(file)
    });
    if let Ok(mut guard) = lock.lock() {
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "[{}] {}", now_ts(), msg);
        }
    }
}

pub fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn file_mtime(path: &Path) -> Result<i64> {
    let meta = std::fs::metadata(path)
        .map_err(|err| anyhow!("Can't stat {}: {}", path.display(), err))?;
    let modified = meta.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0))
}
