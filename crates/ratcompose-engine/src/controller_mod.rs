use std::path::PathBuf;

use ratcompose_content::{encoded_size, update_encoding};
use ratcompose_core::{Envelope, QuadOption, SecurityFlags, file_mtime, log_debug};

use crate::attach_tree_mod::{AttachmentNode, AttachmentTree, GroupKind};
use crate::collab_mod::{
    Answer, ComposeOptions, ComposeView, CryptoApp, CryptoBackend, Editor, Frontend,
    MailboxBrowser, MessageHook, Redraw,
};
use crate::error_mod::ComposeError;
use crate::layout_mod::{
    EnvelopeRows, HeaderPadding, LayoutInputs, StatusInfo, format_status, measure_envelope_rows,
};
use crate::security_mod::{SecurityDisplay, SecurityEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Next,
    Prev,
    First,
    Last,
    Tag,
    TagPrefix,
    ToggleCollapse,
    EditFrom,
    EditTo,
    EditCc,
    EditBcc,
    EditSubject,
    EditReplyTo,
    EditFcc,
    EditNewsgroups,
    EditFollowupTo,
    EditXCommentTo,
    AddHeader,
    RemoveHeader,
    EditMessage,
    EditHeaders,
    AttachFile,
    AttachMessage,
    AttachKey,
    NewMime,
    Delete,
    MoveUp,
    MoveDown,
    GroupAlternatives,
    GroupMultilingual,
    ToggleDisposition,
    ToggleRecode,
    ToggleUnlink,
    EditDescription,
    EditLanguage,
    EditContentType,
    EditEncoding,
    UpdateEncoding,
    RenameAttachment,
    RenameFile,
    EditFile,
    PgpMenu,
    SmimeMenu,
    AutocryptMenu,
    ForgetPassphrase,
    Send,
    Postpone,
    Exit,
}

/// Precondition checked before an opcode's handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    None,
    RequireAttachments,
    RequireTwoTagged(GroupKind),
}

impl Op {
    pub fn guard(self) -> Guard {
        match self {
            Op::Tag
            | Op::ToggleCollapse
            | Op::Delete
            | Op::MoveUp
            | Op::MoveDown
            | Op::ToggleDisposition
            | Op::ToggleRecode
            | Op::ToggleUnlink
            | Op::EditDescription
            | Op::EditLanguage
            | Op::EditContentType
            | Op::EditEncoding
            | Op::UpdateEncoding
            | Op::RenameAttachment
            | Op::RenameFile
            | Op::EditFile => Guard::RequireAttachments,
            Op::GroupAlternatives => Guard::RequireTwoTagged(GroupKind::Alternative),
            Op::GroupMultilingual => Guard::RequireTwoTagged(GroupKind::Multilingual),
            _ => Guard::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeOutcome {
    Send,
    Abort,
    Postpone,
}

impl ComposeOutcome {
    pub fn code(self) -> i32 {
        match self {
            ComposeOutcome::Send => 0,
            ComposeOutcome::Abort => -1,
            ComposeOutcome::Postpone => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Exit(ComposeOutcome),
}

type Handler<'a, F> = fn(&mut ComposeController<'a, F>) -> Result<Flow, ComposeError>;

/// Everything the user is editing. Handed back when the loop ends.
#[derive(Debug, Clone, Default)]
pub struct ComposeSession {
    pub envelope: Envelope,
    pub tree: AttachmentTree,
    pub security: SecurityFlags,
    pub news: bool,
}

pub struct Collaborators<'a, F: Frontend> {
    pub frontend: &'a mut F,
    pub options: &'a dyn ComposeOptions,
    pub crypto: &'a mut dyn CryptoBackend,
    pub hook: &'a mut dyn MessageHook,
    pub browser: &'a mut dyn MailboxBrowser,
    pub editor: &'a mut dyn Editor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeFlags {
    /// Keep the attachment nodes alive on abort; the caller frees them.
    pub no_free_headers: bool,
}

#[derive(Debug)]
pub struct ComposeResult {
    pub outcome: ComposeOutcome,
    pub session: ComposeSession,
}

pub struct ComposeController<'a, F: Frontend> {
    pub(crate) session: ComposeSession,
    pub(crate) io: Collaborators<'a, F>,
    pub(crate) padding: HeaderPadding,
    pub(crate) rows: EnvelopeRows,
    pub(crate) security: SecurityEngine,
    pub(crate) security_lines: SecurityDisplay,
    pub(crate) cursor: usize,
    pub(crate) fcc_set: bool,
    pub(crate) tag_prefix: bool,
    pub(crate) redraw: Redraw,
    pub(crate) flags: ComposeFlags,
    pub(crate) spool_dir: PathBuf,
    hostname: String,
}

impl<'a, F: Frontend> ComposeController<'a, F> {
    pub fn new(
        session: ComposeSession,
        io: Collaborators<'a, F>,
        padding: HeaderPadding,
        spool_dir: PathBuf,
    ) -> Self {
        Self {
            session,
            io,
            padding,
            rows: EnvelopeRows::default(),
            security: SecurityEngine::new(),
            security_lines: SecurityDisplay::default(),
            cursor: 0,
            fcc_set: false,
            tag_prefix: false,
            redraw: Redraw::FULL | Redraw::FLOW,
            flags: ComposeFlags::default(),
            spool_dir,
            hostname: short_hostname(),
        }
    }

    pub fn with_flags(mut self, flags: ComposeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn run(mut self) -> ComposeResult {
        self.recompute_security();
        let outcome = loop {
            self.paint();
            let Some(op) = self.io.frontend.next_op() else {
                log_debug("compose: input closed, aborting");
                self.release_session();
                break ComposeOutcome::Abort;
            };
            if let Flow::Exit(outcome) = self.dispatch(op) {
                break outcome;
            }
        };
        self.security
            .finalize(&mut self.session.security, self.io.options);
        log_debug(&format!(
            "compose: outcome {:?} ({}) security {}",
            outcome,
            outcome.code(),
            self.session.security
        ));
        ComposeResult {
            outcome,
            session: self.session,
        }
    }

    pub(crate) fn dispatch(&mut self, op: Op) -> Flow {
        log_debug(&format!("compose: op {:?}", op));
        let keep_prefix = op == Op::TagPrefix;
        let result = match self.check_guard(op.guard()) {
            Ok(()) => Self::handler(op)(self),
            Err(err) => Err(err),
        };
        if !keep_prefix {
            self.tag_prefix = false;
        }
        match result {
            Ok(flow) => flow,
            Err(err) => {
                log_debug(&format!("compose: {:?} failed: {}", op, err));
                self.io.frontend.error(&err.to_string());
                Flow::Continue
            }
        }
    }

    fn handler(op: Op) -> Handler<'a, F> {
        match op {
            Op::Next => Self::op_next,
            Op::Prev => Self::op_prev,
            Op::First => Self::op_first,
            Op::Last => Self::op_last,
            Op::Tag => Self::op_tag,
            Op::TagPrefix => Self::op_tag_prefix,
            Op::ToggleCollapse => Self::op_toggle_collapse,
            Op::EditFrom => Self::op_edit_from,
            Op::EditTo => Self::op_edit_to,
            Op::EditCc => Self::op_edit_cc,
            Op::EditBcc => Self::op_edit_bcc,
            Op::EditSubject => Self::op_edit_subject,
            Op::EditReplyTo => Self::op_edit_reply_to,
            Op::EditFcc => Self::op_edit_fcc,
            Op::EditNewsgroups => Self::op_edit_newsgroups,
            Op::EditFollowupTo => Self::op_edit_followup_to,
            Op::EditXCommentTo => Self::op_edit_x_comment_to,
            Op::AddHeader => Self::op_add_header,
            Op::RemoveHeader => Self::op_remove_header,
            Op::EditMessage => Self::op_edit_message,
            Op::EditHeaders => Self::op_edit_headers,
            Op::AttachFile => Self::op_attach_file,
            Op::AttachMessage => Self::op_attach_message,
            Op::AttachKey => Self::op_attach_key,
            Op::NewMime => Self::op_new_mime,
            Op::Delete => Self::op_delete,
            Op::MoveUp => Self::op_move_up,
            Op::MoveDown => Self::op_move_down,
            Op::GroupAlternatives => Self::op_group_alternatives,
            Op::GroupMultilingual => Self::op_group_multilingual,
            Op::ToggleDisposition => Self::op_toggle_disposition,
            Op::ToggleRecode => Self::op_toggle_recode,
            Op::ToggleUnlink => Self::op_toggle_unlink,
            Op::EditDescription => Self::op_edit_description,
            Op::EditLanguage => Self::op_edit_language,
            Op::EditContentType => Self::op_edit_content_type,
            Op::EditEncoding => Self::op_edit_encoding,
            Op::UpdateEncoding => Self::op_update_encoding,
            Op::RenameAttachment => Self::op_rename_attachment,
            Op::RenameFile => Self::op_rename_file,
            Op::EditFile => Self::op_edit_file,
            Op::PgpMenu => Self::op_pgp_menu,
            Op::SmimeMenu => Self::op_smime_menu,
            Op::AutocryptMenu => Self::op_autocrypt_menu,
            Op::ForgetPassphrase => Self::op_forget_passphrase,
            Op::Send => Self::op_send,
            Op::Postpone => Self::op_postpone,
            Op::Exit => Self::op_exit,
        }
    }

    fn check_guard(&self, guard: Guard) -> Result<(), ComposeError> {
        match guard {
            Guard::None => Ok(()),
            Guard::RequireAttachments if self.session.tree.is_empty() => {
                Err(ComposeError::NoAttachments)
            }
            Guard::RequireAttachments => Ok(()),
            Guard::RequireTwoTagged(kind) if self.session.tree.tagged().len() < 2 => {
                Err(ComposeError::InsufficientTaggedItems { kind })
            }
            Guard::RequireTwoTagged(_) => Ok(()),
        }
    }

    fn paint(&mut self) {
        let redraw = self.redraw.take();
        let options = self.io.options;
        let has_crypto = self.has_crypto();
        if redraw.contains(Redraw::FLOW) {
            let inputs = LayoutInputs {
                columns: self.io.frontend.columns(),
                news: self.session.news,
                x_comment_to: options.x_comment_to(),
                has_crypto,
                autocrypt: options.autocrypt(),
                show_user_headers: options.show_user_headers(),
            };
            self.rows = measure_envelope_rows(
                &self.session.envelope,
                self.session.security,
                &self.padding,
                inputs,
            );
        }
        self.security_lines = self
            .security
            .display(self.session.security, options, has_crypto);
        let status = format_status(
            &options.status_format(),
            &StatusInfo {
                attachments: self.session.tree.len(),
                size: self.session.tree.iter().map(|n| encoded_size(&n.body)).sum(),
                hostname: self.hostname.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            self.io.frontend.columns(),
        );
        let view = ComposeView {
            envelope: &self.session.envelope,
            tree: &self.session.tree,
            security: self.session.security,
            recommendation: self.security.recommendation(),
            rows: &self.rows,
            padding: &self.padding,
            cursor: self.cursor,
            news: self.session.news,
            x_comment_to: options.x_comment_to(),
            show_user_headers: options.show_user_headers(),
            fcc: self.session.envelope.fcc.as_deref().unwrap_or(""),
            status,
            security_lines: &self.security_lines,
        };
        self.io.frontend.render(&view, redraw);
    }

    pub(crate) fn has_crypto(&self) -> bool {
        self.io.crypto.has_application(CryptoApp::Pgp)
            || self.io.crypto.has_application(CryptoApp::Smime)
    }

    pub(crate) fn mark(&mut self, redraw: Redraw) {
        self.redraw.insert(redraw);
    }

    pub(crate) fn fire_hook(&mut self) {
        self.io
            .hook
            .message_changed(&self.session.envelope, &self.session.tree);
    }

    pub(crate) fn recompute_security(&mut self) {
        self.security.recompute(
            &mut self.session.security,
            &self.session.envelope,
            self.io.options,
            &mut *self.io.crypto,
        );
    }

    /// Node under the cursor.
    pub(crate) fn current_index(&self) -> Result<usize, ComposeError> {
        self.session
            .tree
            .visible_to_index(self.cursor)
            .ok_or(ComposeError::NoAttachments)
    }

    pub(crate) fn focus(&mut self, index: usize) {
        if let Some(visible) = self.session.tree.index_to_visible(index) {
            self.cursor = visible;
        }
        self.clamp_cursor();
    }

    pub(crate) fn clamp_cursor(&mut self) {
        let len = self.session.tree.visible_len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
    }

    pub(crate) fn query_quad(&mut self, option: QuadOption, prompt: &str) -> Answer {
        match option {
            QuadOption::Yes => Answer::Yes,
            QuadOption::No => Answer::No,
            QuadOption::AskYes => self.io.frontend.confirm(prompt, Answer::Yes),
            QuadOption::AskNo => self.io.frontend.confirm(prompt, Answer::No),
        }
    }

    /// Deletes a released node's backing file when the session owns it.
    pub(crate) fn release_node(node: AttachmentNode) {
        if !node.body.unlink || node.unowned {
            return;
        }
        if let Some(path) = node.body.filename.as_ref() {
            if let Err(err) = std::fs::remove_file(path) {
                log_debug(&format!("compose: remove {} failed: {}", path.display(), err));
            }
        }
    }

    fn release_session(&mut self) {
        for node in self.session.tree.iter_mut() {
            if node.unowned {
                node.body.unlink = false;
            }
        }
        if !self.flags.no_free_headers {
            for node in self.session.tree.clear() {
                Self::release_node(node);
            }
        }
    }

    /// Stale-file pre-flight run before Send and Postpone. `Ok(false)` means
    /// the user aborted at a re-encode prompt.
    pub(crate) fn check_attachments(&mut self) -> Result<bool, ComposeError> {
        for idx in 0..self.session.tree.len() {
            let Some(node) = self.session.tree.get(idx) else {
                break;
            };
            if node.body.is_container() {
                continue;
            }
            let Some(path) = node.body.filename.clone() else {
                continue;
            };
            let stamp = node.body.stamp;
            let shown = path.display().to_string();
            let mtime = file_mtime(&path).map_err(|_| ComposeError::MissingAttachment {
                num: idx + 1,
                path: shown.clone(),
            })?;
            if stamp >= mtime {
                continue;
            }
            let prompt = format!(
                "Attachment #{} modified. Update encoding for {}?",
                idx + 1,
                shown
            );
            match self.io.frontend.confirm(&prompt, Answer::Yes) {
                Answer::Yes => {
                    if let Some(node) = self.session.tree.get_mut(idx) {
                        update_encoding(&mut node.body)
                            .map_err(|err| ComposeError::io(shown.clone(), err.to_string()))?;
                    }
                }
                Answer::No => {}
                Answer::Abort => return Ok(false),
            }
        }
        Ok(true)
    }

    fn op_next(&mut self) -> Result<Flow, ComposeError> {
        if self.cursor + 1 >= self.session.tree.visible_len() {
            self.io.frontend.message("You are on the last entry.");
        } else {
            self.cursor += 1;
            self.mark(Redraw::MOTION);
        }
        Ok(Flow::Continue)
    }

    fn op_prev(&mut self) -> Result<Flow, ComposeError> {
        if self.cursor == 0 {
            self.io.frontend.message("You are on the first entry.");
        } else {
            self.cursor -= 1;
            self.mark(Redraw::MOTION);
        }
        Ok(Flow::Continue)
    }

    fn op_first(&mut self) -> Result<Flow, ComposeError> {
        self.cursor = 0;
        self.mark(Redraw::MOTION);
        Ok(Flow::Continue)
    }

    fn op_last(&mut self) -> Result<Flow, ComposeError> {
        self.cursor = self.session.tree.visible_len().saturating_sub(1);
        self.mark(Redraw::MOTION);
        Ok(Flow::Continue)
    }

    fn op_tag(&mut self) -> Result<Flow, ComposeError> {
        let index = self.current_index()?;
        if let Some(node) = self.session.tree.get_mut(index) {
            node.tagged = !node.tagged;
        }
        if self.cursor + 1 < self.session.tree.visible_len() {
            self.cursor += 1;
        }
        self.mark(Redraw::CURRENT | Redraw::MOTION);
        Ok(Flow::Continue)
    }

    fn op_tag_prefix(&mut self) -> Result<Flow, ComposeError> {
        self.tag_prefix = true;
        Ok(Flow::Continue)
    }

    fn op_toggle_collapse(&mut self) -> Result<Flow, ComposeError> {
        let index = self.current_index()?;
        if self.session.tree.toggle_collapse(index) {
            self.focus(index);
            self.mark(Redraw::INDEX);
        }
        Ok(Flow::Continue)
    }

    fn security_changed(&mut self, changed: bool) {
        if changed {
            self.fire_hook();
            self.mark(Redraw::FULL | Redraw::FLOW);
        }
    }

    fn op_pgp_menu(&mut self) -> Result<Flow, ComposeError> {
        let changed = self.security.pgp_menu(
            &mut self.session.security,
            &self.session.envelope,
            self.io.options,
            &mut *self.io.crypto,
            &mut *self.io.frontend,
        )?;
        self.security_changed(changed);
        Ok(Flow::Continue)
    }

    fn op_smime_menu(&mut self) -> Result<Flow, ComposeError> {
        let changed = self.security.smime_menu(
            &mut self.session.security,
            &self.session.envelope,
            self.io.options,
            &mut *self.io.crypto,
            &mut *self.io.frontend,
        )?;
        self.security_changed(changed);
        Ok(Flow::Continue)
    }

    fn op_autocrypt_menu(&mut self) -> Result<Flow, ComposeError> {
        let changed = self.security.autocrypt_menu(
            &mut self.session.security,
            &self.session.envelope,
            self.io.options,
            &mut *self.io.crypto,
            &mut *self.io.frontend,
        );
        self.security_changed(changed);
        Ok(Flow::Continue)
    }

    fn op_forget_passphrase(&mut self) -> Result<Flow, ComposeError> {
        self.io.crypto.forget_passphrase();
        self.io.frontend.message("Passphrase(s) forgotten.");
        Ok(Flow::Continue)
    }

    fn op_send(&mut self) -> Result<Flow, ComposeError> {
        if !self.check_attachments()? {
            self.mark(Redraw::FULL);
            return Ok(Flow::Continue);
        }
        let has_fcc = self
            .session
            .envelope
            .fcc
            .as_deref()
            .map(|fcc| !fcc.is_empty())
            .unwrap_or(false);
        if !self.fcc_set && has_fcc {
            let copy = self.io.options.copy();
            match self.query_quad(copy, "Save a copy of this message?") {
                Answer::Abort => return Ok(Flow::Continue),
                Answer::No => self.session.envelope.fcc = None,
                Answer::Yes => {}
            }
        }
        Ok(Flow::Exit(ComposeOutcome::Send))
    }

    fn op_postpone(&mut self) -> Result<Flow, ComposeError> {
        if !self.check_attachments()? {
            self.mark(Redraw::FULL);
            return Ok(Flow::Continue);
        }
        Ok(Flow::Exit(ComposeOutcome::Postpone))
    }

    fn op_exit(&mut self) -> Result<Flow, ComposeError> {
        let postpone = self.io.options.postpone();
        match self.query_quad(postpone, "Save (postpone) draft message?") {
            Answer::No => {
                self.release_session();
                Ok(Flow::Exit(ComposeOutcome::Abort))
            }
            Answer::Abort => Ok(Flow::Continue),
            Answer::Yes => self.op_postpone(),
        }
    }
}

fn short_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().split('.').next().unwrap_or("").to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
