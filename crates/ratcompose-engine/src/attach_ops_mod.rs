use std::path::{Path, PathBuf};
use std::sync::Arc;

use ratcompose_content::{make_file_attach, update_encoding};
use ratcompose_core::{
    BodyPart, ContentKind, Disposition, TransferEncoding, file_mtime, log_debug, now_ts,
};

use crate::attach_tree_mod::{AttachmentNode, GroupKind};
use crate::collab_mod::{Answer, CryptoApp, Frontend, Redraw};
use crate::controller_mod::{ComposeController, Flow};
use crate::error_mod::ComposeError;

fn reencode(part: &mut BodyPart) -> Result<(), ComposeError> {
    update_encoding(part).map_err(|err| ComposeError::io(part.label(), err.to_string()))
}

fn backing_file(part: &BodyPart) -> Result<PathBuf, ComposeError> {
    part.filename
        .clone()
        .ok_or_else(|| ComposeError::io(part.label(), "This attachment has no backing file"))
}

impl<'a, F: Frontend> ComposeController<'a, F> {
    fn current_part(&mut self) -> Result<&mut BodyPart, ComposeError> {
        let index = self.current_index()?;
        self.session
            .tree
            .get_mut(index)
            .map(|node| &mut node.body)
            .ok_or(ComposeError::NoAttachments)
    }

    fn push_attachment(&mut self, node: AttachmentNode) {
        self.session.tree.add(node);
        let last = self.session.tree.len().saturating_sub(1);
        self.focus(last);
    }

    pub(crate) fn op_attach_file(&mut self) -> Result<Flow, ComposeError> {
        let Some(files) = self.io.frontend.pick_files("Attach file") else {
            return Ok(Flow::Continue);
        };
        if files.len() > 1 {
            self.io.frontend.message("Attaching selected files...");
        }
        let mut added = false;
        for path in files {
            match make_file_attach(&path) {
                Ok(part) => {
                    let mut node = AttachmentNode::new(part);
                    node.unowned = true;
                    self.push_attachment(node);
                    added = true;
                }
                Err(err) => {
                    log_debug(&format!("compose: attach {} failed: {}", path.display(), err));
                    let failed = ComposeError::AttachFailed(path.display().to_string());
                    self.io.frontend.error(&failed.to_string());
                }
            }
        }
        self.mark(Redraw::INDEX | Redraw::STATUS);
        if added {
            self.fire_hook();
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_attach_message(&mut self) -> Result<Flow, ComposeError> {
        let Some(text) = self
            .io
            .frontend
            .line("Open mailbox to attach message from", "")
        else {
            return Ok(Flow::Continue);
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            return Ok(Flow::Continue);
        }
        let path = Path::new(&text);
        if std::fs::metadata(path).is_err() {
            return Err(ComposeError::MailboxUnavailable(text.clone()));
        }
        let messages = self.io.browser.open(path).map_err(|err| {
            log_debug(&format!("compose: open mailbox {} failed: {}", text, err));
            ComposeError::MailboxUnavailable(text.clone())
        })?;
        if messages.is_empty() {
            return Err(ComposeError::EmptyMailbox);
        }
        self.mark(Redraw::FULL);
        self.io.frontend.message("Tag the messages you want to attach");
        let labels: Vec<String> = messages
            .iter()
            .map(|msg| format!("{}  {}", msg.from, msg.subject))
            .collect();
        let Some(picked) = self.io.frontend.select("Attach messages", &labels) else {
            return Ok(Flow::Continue);
        };
        let mut added = false;
        for idx in picked {
            let Some(message) = messages.get(idx) else {
                continue;
            };
            let mut part = BodyPart::message(Arc::clone(message));
            reencode(&mut part)?;
            self.push_attachment(AttachmentNode::new(part));
            added = true;
        }
        if added {
            self.fire_hook();
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_attach_key(&mut self) -> Result<Flow, ComposeError> {
        if !self.io.crypto.has_application(CryptoApp::Pgp) {
            return Err(ComposeError::NoBackend(CryptoApp::Pgp.name()));
        }
        let made = self
            .io
            .crypto
            .make_key_attachment(&mut *self.io.frontend)
            .map_err(|err| ComposeError::io("", err.to_string()))?;
        if let Some(part) = made {
            self.push_attachment(AttachmentNode::new(part));
            self.mark(Redraw::INDEX);
            self.fire_hook();
        }
        self.mark(Redraw::STATUS);
        Ok(Flow::Continue)
    }

    pub(crate) fn op_new_mime(&mut self) -> Result<Flow, ComposeError> {
        let Some(name) = self.io.frontend.line("New file: ", "") else {
            return Ok(Flow::Continue);
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            return Ok(Flow::Continue);
        }
        let Some(ctype) = self.io.frontend.line("Content-Type: ", "") else {
            return Ok(Flow::Continue);
        };
        let ctype = ctype.trim().to_string();
        if ctype.is_empty() {
            return Ok(Flow::Continue);
        }
        let Some((base, sub)) = ctype.split_once('/') else {
            return Err(ComposeError::InvalidContentType);
        };
        let kind = ContentKind::from_name(base);
        if kind == ContentKind::Other {
            return Err(ComposeError::UnknownContentType(base.to_string()));
        }

        let path = PathBuf::from(&name);
        std::fs::File::create(&path)
            .map_err(|_| ComposeError::io(name.clone(), format!("Can't create file {}", name)))?;
        let mut part = make_file_attach(&path).map_err(|err| {
            ComposeError::io(
                name.clone(),
                format!("What we have here is a failure to make an attachment: {}", err),
            )
        })?;
        part.kind = kind;
        part.subtype = sub.trim().to_ascii_lowercase();
        part.unlink = true;
        self.push_attachment(AttachmentNode::new(part));
        self.mark(Redraw::INDEX | Redraw::STATUS);

        match self.io.editor.edit_file(&path) {
            Ok(()) => {
                reencode(self.current_part()?)?;
                self.mark(Redraw::FULL);
            }
            Err(err) => self.io.frontend.error(&err.to_string()),
        }
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_delete(&mut self) -> Result<Flow, ComposeError> {
        let index = self.current_index()?;
        if let Some(node) = self.session.tree.get_mut(index) {
            if node.unowned {
                node.body.unlink = false;
            }
        }
        let removed = match self.session.tree.delete(index) {
            Ok(removed) => removed,
            Err(err) => {
                if let Some(node) = self.session.tree.get_mut(index) {
                    node.tagged = false;
                }
                return Err(err);
            }
        };
        for node in removed {
            Self::release_node(node);
        }
        self.clamp_cursor();
        self.mark(Redraw::INDEX | Redraw::STATUS);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_move_up(&mut self) -> Result<Flow, ComposeError> {
        let index = self.current_index()?;
        let moved = self.session.tree.move_up(index)?;
        self.focus(moved);
        self.mark(Redraw::INDEX);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_move_down(&mut self) -> Result<Flow, ComposeError> {
        let index = self.current_index()?;
        let moved = self.session.tree.move_down(index)?;
        self.focus(moved);
        self.mark(Redraw::INDEX);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    fn group_tagged(&mut self, kind: GroupKind) -> Result<Flow, ComposeError> {
        let tagged = self.session.tree.tagged();
        let index = self.session.tree.group(kind, &tagged)?;
        self.focus(index);
        self.mark(Redraw::INDEX);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_group_alternatives(&mut self) -> Result<Flow, ComposeError> {
        self.group_tagged(GroupKind::Alternative)
    }

    pub(crate) fn op_group_multilingual(&mut self) -> Result<Flow, ComposeError> {
        let missing_language = self
            .session
            .tree
            .iter()
            .filter(|node| node.tagged)
            .any(|node| node.body.language.as_deref().unwrap_or("").is_empty());
        if missing_language {
            let answer = self.io.frontend.confirm(
                "Not all parts have 'Content-Language' set, continue?",
                Answer::Yes,
            );
            if answer != Answer::Yes {
                self.io.frontend.message("Not sending this message.");
                return Ok(Flow::Continue);
            }
        }
        self.group_tagged(GroupKind::Multilingual)
    }

    pub(crate) fn op_toggle_disposition(&mut self) -> Result<Flow, ComposeError> {
        let part = self.current_part()?;
        part.disposition = match part.disposition {
            Disposition::Inline => Disposition::Attachment,
            Disposition::Attachment => Disposition::Inline,
        };
        self.mark(Redraw::CURRENT);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_toggle_recode(&mut self) -> Result<Flow, ComposeError> {
        let part = self.current_part()?;
        if !part.is_text() {
            return Err(ComposeError::RecodeNonText);
        }
        part.noconv = !part.noconv;
        let text = if part.noconv {
            "The current attachment won't be converted."
        } else {
            "The current attachment will be converted."
        };
        self.io.frontend.message(text);
        self.mark(Redraw::CURRENT);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_toggle_unlink(&mut self) -> Result<Flow, ComposeError> {
        let part = self.current_part()?;
        part.unlink = !part.unlink;
        self.mark(Redraw::INDEX);
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_description(&mut self) -> Result<Flow, ComposeError> {
        let current = self.current_part()?.description.clone().unwrap_or_default();
        let Some(text) = self.io.frontend.line("Description: ", &current) else {
            return Ok(Flow::Continue);
        };
        if text == current {
            return Ok(Flow::Continue);
        }
        self.current_part()?.description = Some(text).filter(|t| !t.is_empty());
        self.mark(Redraw::CURRENT);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_language(&mut self) -> Result<Flow, ComposeError> {
        let current = self.current_part()?.language.clone().unwrap_or_default();
        let Some(text) = self.io.frontend.line("Content-Language: ", &current) else {
            self.io.frontend.message("Empty 'Content-Language'");
            return Ok(Flow::Continue);
        };
        if text == current {
            return Ok(Flow::Continue);
        }
        self.current_part()?.language = Some(text).filter(|t| !t.is_empty());
        self.mark(Redraw::CURRENT | Redraw::STATUS);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_content_type(&mut self) -> Result<Flow, ComposeError> {
        let part = self.current_part()?;
        let mut current = part.mime_type();
        if let Some(charset) = part.charset.as_deref() {
            current.push_str("; charset=");
            current.push_str(charset);
        }
        let Some(text) = self.io.frontend.line("Content-Type: ", &current) else {
            return Ok(Flow::Continue);
        };
        if text.trim() == current {
            return Ok(Flow::Continue);
        }
        let parsed: mime::Mime = text
            .trim()
            .parse()
            .map_err(|_| ComposeError::InvalidContentType)?;
        let base = parsed.type_().as_str().to_ascii_lowercase();
        let kind = ContentKind::from_name(&base);
        if kind == ContentKind::Other {
            return Err(ComposeError::UnknownContentType(base));
        }
        let essence = parsed.essence_str().to_ascii_lowercase();
        let subtype = essence
            .split_once('/')
            .map(|(_, sub)| sub.to_string())
            .unwrap_or_default();
        let charset = parsed
            .get_param(mime::CHARSET)
            .map(|value| value.as_str().to_ascii_lowercase());

        let part = self.current_part()?;
        let changed = part.kind != kind || part.subtype != subtype || part.charset != charset;
        if !changed {
            return Ok(Flow::Continue);
        }
        part.kind = kind;
        part.subtype = subtype;
        part.charset = charset;
        reencode(part)?;
        self.mark(Redraw::CURRENT);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_encoding(&mut self) -> Result<Flow, ComposeError> {
        let current = self.current_part()?.encoding;
        let Some(text) = self
            .io
            .frontend
            .line("Content-Transfer-Encoding: ", current.as_str())
        else {
            return Ok(Flow::Continue);
        };
        if text.trim().is_empty() {
            return Ok(Flow::Continue);
        }
        let encoding = match TransferEncoding::from_name(&text) {
            Some(TransferEncoding::UuEncoded) | None => return Err(ComposeError::InvalidEncoding),
            Some(encoding) => encoding,
        };
        if encoding == current {
            return Ok(Flow::Continue);
        }
        self.current_part()?.encoding = encoding;
        self.mark(Redraw::CURRENT | Redraw::STATUS);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_update_encoding(&mut self) -> Result<Flow, ComposeError> {
        let targets = if self.tag_prefix {
            self.session.tree.tagged()
        } else {
            vec![self.current_index()?]
        };
        let mut updated = false;
        let mut first_error = None;
        for index in targets {
            let Some(node) = self.session.tree.get_mut(index) else {
                continue;
            };
            match reencode(&mut node.body) {
                Ok(()) => updated = true,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        self.mark(Redraw::CURRENT | Redraw::STATUS);
        if updated {
            self.fire_hook();
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(Flow::Continue),
        }
    }

    pub(crate) fn op_rename_attachment(&mut self) -> Result<Flow, ComposeError> {
        let part = self.current_part()?;
        let current = part.label();
        let before = part.display_name.clone();
        let Some(text) = self
            .io
            .frontend
            .line("Send attachment with name: ", &current)
        else {
            return Ok(Flow::Continue);
        };
        let name = Some(text.trim().to_string()).filter(|t| !t.is_empty());
        if name == before {
            return Ok(Flow::Continue);
        }
        self.current_part()?.display_name = name;
        self.mark(Redraw::CURRENT);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_rename_file(&mut self) -> Result<Flow, ComposeError> {
        let old = backing_file(self.current_part()?)?;
        let Some(text) = self
            .io
            .frontend
            .line("Rename to: ", &old.display().to_string())
        else {
            return Ok(Flow::Continue);
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            return Ok(Flow::Continue);
        }
        let mtime = file_mtime(&old).map_err(|err| ComposeError::io(text.clone(), err.to_string()))?;
        let new = PathBuf::from(&text);
        std::fs::rename(&old, &new).map_err(|err| {
            ComposeError::io(
                text.clone(),
                format!("Can't rename {} to {}: {}", old.display(), text, err),
            )
        })?;
        let part = self.current_part()?;
        part.filename = Some(new);
        if part.stamp >= mtime {
            part.stamp = now_ts();
        }
        self.mark(Redraw::CURRENT);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_file(&mut self) -> Result<Flow, ComposeError> {
        let path = backing_file(self.current_part()?)?;
        self.io
            .editor
            .edit_file(&path)
            .map_err(|err| ComposeError::io(path.display().to_string(), err.to_string()))?;
        reencode(self.current_part()?)?;
        self.mark(Redraw::CURRENT | Redraw::STATUS);
        self.fire_hook();
        Ok(Flow::Continue)
    }
}
