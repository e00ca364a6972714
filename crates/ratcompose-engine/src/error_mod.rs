use thiserror::Error;

use crate::attach_tree_mod::GroupKind;

/// Failures reported to the user by compose operations. None of them end the
/// session; the dispatcher shows the message and keeps editing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComposeError {
    // Preconditions
    #[error("There are no attachments")]
    NoAttachments,

    #[error("Grouping '{kind}' requires at least 2 tagged messages")]
    InsufficientTaggedItems { kind: GroupKind },

    #[error("You may not delete the only attachment")]
    CannotDeleteLastAttachment,

    #[error("The fundamental part can't be moved")]
    AttachmentPinned,

    #[error("Attachment is already at top")]
    AlreadyAtTop,

    #[error("Attachment is already at bottom")]
    AlreadyAtBottom,

    #[error("Tagged attachments must share the same parent")]
    MixedGroupParents,

    #[error("Recoding only affects text attachments")]
    RecodeNonText,

    #[error("No {0} backend configured")]
    NoBackend(&'static str),

    // Validation
    #[error("Bad IDN: '{0}'")]
    BadIdn(String),

    #[error("Bad IDN in \"{field}\": '{addr}'")]
    BadIdnInField { field: String, addr: String },

    #[error("{0}")]
    BadAddress(String),

    #[error("Content-Type is of the form base/sub")]
    InvalidContentType,

    #[error("Unknown Content-Type {0}")]
    UnknownContentType(String),

    #[error("Invalid encoding")]
    InvalidEncoding,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    // External resources
    #[error("Attachment #{num} no longer exists: {path}")]
    MissingAttachment { num: usize, path: String },

    #[error("Unable to attach {0}")]
    AttachFailed(String),

    #[error("Unable to open mailbox {0}")]
    MailboxUnavailable(String),

    #[error("No messages in that folder")]
    EmptyMailbox,

    #[error("{message}")]
    Io { path: String, message: String },
}

impl ComposeError {
    pub(crate) fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        ComposeError::Io {
            path: path.into(),
            message: message.into(),
        }
    }
}
