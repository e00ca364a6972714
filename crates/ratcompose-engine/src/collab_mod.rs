use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitflags::bitflags;
use ratcompose_core::{
    AttachedMessage, BodyPart, Envelope, QuadOption, Recommendation, SecurityFlags,
};

use crate::attach_tree_mod::AttachmentTree;
use crate::controller_mod::Op;
use crate::layout_mod::{EnvelopeRows, HeaderPadding};
use crate::security_mod::SecurityDisplay;

pub const DEFAULT_STATUS_FORMAT: &str =
    "-- ratcompose: Compose  [Approx. msg size: %l   Atts: %a]%>-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoApp {
    Pgp,
    Smime,
}

impl CryptoApp {
    pub fn name(self) -> &'static str {
        match self {
            CryptoApp::Pgp => "PGP",
            CryptoApp::Smime => "S/MIME",
        }
    }

    pub fn flag(self) -> SecurityFlags {
        match self {
            CryptoApp::Pgp => SecurityFlags::PGP,
            CryptoApp::Smime => SecurityFlags::SMIME,
        }
    }

    pub fn other(self) -> CryptoApp {
        match self {
            CryptoApp::Pgp => CryptoApp::Smime,
            CryptoApp::Smime => CryptoApp::Pgp,
        }
    }
}

bitflags! {
    /// Screen regions that went stale during one loop iteration.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Redraw: u8 {
        const FULL = 1 << 0;
        const STATUS = 1 << 1;
        const INDEX = 1 << 2;
        const CURRENT = 1 << 3;
        const MOTION = 1 << 4;
        /// Envelope rows must be measured again before painting.
        const FLOW = 1 << 5;
    }
}

impl Redraw {
    pub fn take(&mut self) -> Redraw {
        std::mem::take(self)
    }
}

/// Input side of the terminal. Every call blocks until the user answers;
/// `None` means the prompt was cancelled.
pub trait Prompter {
    fn next_op(&mut self) -> Option<Op>;
    fn line(&mut self, prompt: &str, initial: &str) -> Option<String>;
    fn confirm(&mut self, prompt: &str, default: Answer) -> Answer;
    /// Index into `letters` of the chosen option.
    fn choose(&mut self, prompt: &str, letters: &str) -> Option<usize>;
    fn pick_files(&mut self, prompt: &str) -> Option<Vec<PathBuf>>;
    fn select(&mut self, prompt: &str, items: &[String]) -> Option<Vec<usize>>;
    fn message(&mut self, text: &str);
    fn error(&mut self, text: &str);
}

pub trait Presenter {
    fn render(&mut self, view: &ComposeView<'_>, redraw: Redraw);
    fn columns(&self) -> usize;
}

pub trait Frontend: Prompter + Presenter {}

impl<T: Prompter + Presenter> Frontend for T {}

/// Settings read on every use, so a reloaded config takes effect mid-session.
pub trait ComposeOptions {
    fn opportunistic_encrypt(&self) -> bool;
    fn autocrypt(&self) -> bool;
    fn show_user_headers(&self) -> bool;
    fn edit_headers(&self) -> bool;
    fn x_comment_to(&self) -> bool;
    fn postpone(&self) -> QuadOption;
    fn copy(&self) -> QuadOption;
    fn pgp_sign_as(&self) -> Option<String>;
    fn smime_sign_as(&self) -> Option<String>;
    fn smime_encrypt_with(&self) -> Option<String>;
    fn status_format(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeSettings {
    pub opportunistic_encrypt: bool,
    pub autocrypt: bool,
    pub show_user_headers: bool,
    pub edit_headers: bool,
    pub x_comment_to: bool,
    pub postpone: QuadOption,
    pub copy: QuadOption,
    pub pgp_sign_as: Option<String>,
    pub smime_sign_as: Option<String>,
    pub smime_encrypt_with: Option<String>,
    pub status_format: String,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            opportunistic_encrypt: false,
            autocrypt: false,
            show_user_headers: true,
            edit_headers: false,
            x_comment_to: false,
            postpone: QuadOption::AskYes,
            copy: QuadOption::Yes,
            pgp_sign_as: None,
            smime_sign_as: None,
            smime_encrypt_with: None,
            status_format: DEFAULT_STATUS_FORMAT.to_string(),
        }
    }
}

impl ComposeOptions for ComposeSettings {
    fn opportunistic_encrypt(&self) -> bool {
        self.opportunistic_encrypt
    }

    fn autocrypt(&self) -> bool {
        self.autocrypt
    }

    fn show_user_headers(&self) -> bool {
        self.show_user_headers
    }

    fn edit_headers(&self) -> bool {
        self.edit_headers
    }

    fn x_comment_to(&self) -> bool {
        self.x_comment_to
    }

    fn postpone(&self) -> QuadOption {
        self.postpone
    }

    fn copy(&self) -> QuadOption {
        self.copy
    }

    fn pgp_sign_as(&self) -> Option<String> {
        self.pgp_sign_as.clone()
    }

    fn smime_sign_as(&self) -> Option<String> {
        self.smime_sign_as.clone()
    }

    fn smime_encrypt_with(&self) -> Option<String> {
        self.smime_encrypt_with.clone()
    }

    fn status_format(&self) -> String {
        self.status_format.clone()
    }
}

pub trait CryptoBackend {
    fn has_application(&self, app: CryptoApp) -> bool;
    fn opportunistic_encrypt(&mut self, flags: SecurityFlags, envelope: &Envelope) -> SecurityFlags;
    fn autocrypt_recommendation(&mut self, envelope: &Envelope) -> Recommendation;
    /// Runs the backend's own sign/encrypt menu and returns the flags it chose.
    fn security_menu(
        &mut self,
        app: CryptoApp,
        flags: SecurityFlags,
        envelope: &Envelope,
        prompter: &mut dyn Prompter,
    ) -> SecurityFlags;
    fn make_key_attachment(
        &mut self,
        prompter: &mut dyn Prompter,
    ) -> anyhow::Result<Option<BodyPart>>;
    fn forget_passphrase(&mut self);
}

/// Backend for builds without PGP or S/MIME support.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCrypto;

impl CryptoBackend for NullCrypto {
    fn has_application(&self, _app: CryptoApp) -> bool {
        false
    }

    fn opportunistic_encrypt(&mut self, flags: SecurityFlags, _envelope: &Envelope) -> SecurityFlags {
        flags
    }

    fn autocrypt_recommendation(&mut self, _envelope: &Envelope) -> Recommendation {
        Recommendation::Off
    }

    fn security_menu(
        &mut self,
        _app: CryptoApp,
        flags: SecurityFlags,
        _envelope: &Envelope,
        _prompter: &mut dyn Prompter,
    ) -> SecurityFlags {
        flags
    }

    fn make_key_attachment(
        &mut self,
        _prompter: &mut dyn Prompter,
    ) -> anyhow::Result<Option<BodyPart>> {
        Ok(None)
    }

    fn forget_passphrase(&mut self) {}
}

/// Fired after every change to the message content.
pub trait MessageHook {
    fn message_changed(&mut self, envelope: &Envelope, tree: &AttachmentTree);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHook;

impl MessageHook for NoHook {
    fn message_changed(&mut self, _envelope: &Envelope, _tree: &AttachmentTree) {}
}

/// Read-only access to a mail folder. The messages handed back stay shared
/// with the browser until the compose session drops them.
pub trait MailboxBrowser {
    fn open(&mut self, path: &Path) -> anyhow::Result<Vec<Arc<AttachedMessage>>>;
}

pub trait Editor {
    fn edit_file(&mut self, path: &Path) -> anyhow::Result<()>;
}

/// Snapshot handed to the presenter each iteration.
pub struct ComposeView<'v> {
    pub envelope: &'v Envelope,
    pub tree: &'v AttachmentTree,
    pub security: SecurityFlags,
    pub recommendation: Recommendation,
    pub rows: &'v EnvelopeRows,
    pub padding: &'v HeaderPadding,
    pub cursor: usize,
    pub news: bool,
    pub x_comment_to: bool,
    pub show_user_headers: bool,
    pub fcc: &'v str,
    pub status: String,
    pub security_lines: &'v SecurityDisplay,
}
