//! Compose-screen state for ratcompose: the attachment tree, envelope row
//! layout, security flag reconciliation and the opcode loop that drives them.

mod attach_ops_mod;
mod attach_tree_mod;
mod collab_mod;
mod controller_mod;
mod envelope_ops_mod;
mod error_mod;
mod layout_mod;
mod security_mod;

pub use attach_tree_mod::{AttachmentNode, AttachmentTree, GroupKind};
pub use collab_mod::{
    Answer, ComposeOptions, ComposeSettings, ComposeView, CryptoApp, CryptoBackend,
    DEFAULT_STATUS_FORMAT, Editor, Frontend, MailboxBrowser, MessageHook, NoHook, NullCrypto,
    Presenter, Prompter, Redraw,
};
pub use controller_mod::{
    Collaborators, ComposeController, ComposeFlags, ComposeOutcome, ComposeResult,
    ComposeSession, Guard, Op,
};
pub use envelope_ops_mod::check_idn;
pub use error_mod::ComposeError;
pub use layout_mod::{
    EnvelopeRows, HeaderField, HeaderPadding, LayoutInputs, MAX_ADDR_ROWS,
    MAX_USER_HEADER_ROWS, StatusInfo, USER_HEADER_OVERFLOW, Wrap, format_size, format_status,
    measure_envelope_rows, measure_security_rows, measure_user_header_rows, more_marker,
    wrap_address_list, wrap_user_headers,
};
pub use security_mod::{SecurityDisplay, SecurityEngine, enforce_exclusivity};
