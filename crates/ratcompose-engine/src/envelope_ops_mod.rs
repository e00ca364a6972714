use ratcompose_content::{
    HeaderEdit, address_mailbox, make_file_attach, parse_address_list, read_header_file,
    spool_path, update_encoding, write_header_file,
};
use ratcompose_core::{AddressField, Envelope, log_debug};

use crate::attach_tree_mod::AttachmentNode;
use crate::collab_mod::{Frontend, Redraw};
use crate::controller_mod::{ComposeController, Flow};
use crate::error_mod::ComposeError;

/// Checks the domain of an address for IDN validity.
pub fn check_idn(addr: &str) -> Result<(), ComposeError> {
    let mailbox = address_mailbox(addr);
    let Some((_, domain)) = mailbox.rsplit_once('@') else {
        return Ok(());
    };
    let bad = || ComposeError::BadIdn(mailbox.to_string());
    if domain.is_empty() {
        return Err(bad());
    }
    for label in domain.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(bad());
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(bad());
        }
        if label.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(bad());
        }
    }
    Ok(())
}

fn check_idn_list(field: &str, addrs: &[String]) -> Result<(), ComposeError> {
    for addr in addrs {
        if check_idn(addr).is_err() {
            return Err(ComposeError::BadIdnInField {
                field: field.to_string(),
                addr: address_mailbox(addr).to_string(),
            });
        }
    }
    Ok(())
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

impl<'a, F: Frontend> ComposeController<'a, F> {
    fn edit_address(&mut self, field: AddressField) -> Result<Flow, ComposeError> {
        let prompt = format!("{}: ", field.label());
        let current = self.session.envelope.addresses(field).join(", ");
        let Some(text) = self.io.frontend.line(&prompt, &current) else {
            return Ok(Flow::Continue);
        };
        let parsed =
            parse_address_list(&text).map_err(|err| ComposeError::BadAddress(err.to_string()))?;
        for addr in &parsed {
            check_idn(addr)?;
        }
        if parsed.as_slice() == self.session.envelope.addresses(field) {
            return Ok(Flow::Continue);
        }
        *self.session.envelope.addresses_mut(field) = parsed;
        if field.affects_recipients() {
            self.recompute_security();
        }
        self.mark(Redraw::FULL | Redraw::FLOW);
        self.fire_hook();
        Ok(Flow::Continue)
    }

    /// Prompts for a single-line field. Returns the new value when it differs.
    fn edit_text(
        &mut self,
        prompt: &str,
        current: Option<&str>,
    ) -> Option<Option<String>> {
        let before = current.unwrap_or("").to_string();
        let text = self.io.frontend.line(prompt, &before)?;
        if text == before {
            return None;
        }
        Some(non_empty(text))
    }

    pub(crate) fn op_edit_from(&mut self) -> Result<Flow, ComposeError> {
        self.edit_address(AddressField::From)
    }

    pub(crate) fn op_edit_to(&mut self) -> Result<Flow, ComposeError> {
        if self.session.news {
            return Ok(Flow::Continue);
        }
        self.edit_address(AddressField::To)
    }

    pub(crate) fn op_edit_cc(&mut self) -> Result<Flow, ComposeError> {
        if self.session.news {
            return Ok(Flow::Continue);
        }
        self.edit_address(AddressField::Cc)
    }

    pub(crate) fn op_edit_bcc(&mut self) -> Result<Flow, ComposeError> {
        if self.session.news {
            return Ok(Flow::Continue);
        }
        self.edit_address(AddressField::Bcc)
    }

    pub(crate) fn op_edit_reply_to(&mut self) -> Result<Flow, ComposeError> {
        self.edit_address(AddressField::ReplyTo)
    }

    pub(crate) fn op_edit_subject(&mut self) -> Result<Flow, ComposeError> {
        let current = self.session.envelope.subject.clone();
        if let Some(subject) = self.edit_text("Subject: ", current.as_deref()) {
            self.session.envelope.subject = subject;
            self.mark(Redraw::FULL);
            self.fire_hook();
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_fcc(&mut self) -> Result<Flow, ComposeError> {
        let current = self.session.envelope.fcc.clone();
        if let Some(fcc) = self.edit_text("Fcc: ", current.as_deref()) {
            self.session.envelope.fcc = fcc;
            self.fcc_set = true;
            self.mark(Redraw::FULL);
            self.fire_hook();
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_newsgroups(&mut self) -> Result<Flow, ComposeError> {
        if !self.session.news {
            return Ok(Flow::Continue);
        }
        let current = self.session.envelope.newsgroups.clone();
        if let Some(groups) = self.edit_text("Newsgroups: ", current.as_deref()) {
            self.session.envelope.newsgroups = groups;
            self.mark(Redraw::FULL);
            self.fire_hook();
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_followup_to(&mut self) -> Result<Flow, ComposeError> {
        if !self.session.news {
            return Ok(Flow::Continue);
        }
        let current = self.session.envelope.followup_to.clone();
        if let Some(followup) = self.edit_text("Followup-To: ", current.as_deref()) {
            self.session.envelope.followup_to = followup;
            self.mark(Redraw::FULL);
            self.fire_hook();
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_x_comment_to(&mut self) -> Result<Flow, ComposeError> {
        if !(self.session.news && self.io.options.x_comment_to()) {
            return Ok(Flow::Continue);
        }
        let current = self.session.envelope.x_comment_to.clone();
        if let Some(comment) = self.edit_text("X-Comment-To: ", current.as_deref()) {
            self.session.envelope.x_comment_to = comment;
            self.mark(Redraw::FULL);
            self.fire_hook();
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_add_header(&mut self) -> Result<Flow, ComposeError> {
        let Some(text) = self.io.frontend.line("Header: ", "") else {
            return Ok(Flow::Continue);
        };
        if text.trim().is_empty() {
            return Ok(Flow::Continue);
        }
        let Some((name, value)) = text.split_once(':') else {
            return Err(ComposeError::InvalidHeader(text.clone()));
        };
        let name = name.trim();
        let valid_name = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_graphic() && b != b':');
        if !valid_name {
            return Err(ComposeError::InvalidHeader(text.clone()));
        }
        if self.session.envelope.set_header(name, value.trim()) {
            self.mark(Redraw::FULL | Redraw::FLOW);
            self.fire_hook();
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_remove_header(&mut self) -> Result<Flow, ComposeError> {
        let Some(name) = self.io.frontend.line("Remove header: ", "") else {
            return Ok(Flow::Continue);
        };
        if self.session.envelope.remove_header(name.trim()) {
            self.mark(Redraw::FULL | Redraw::FLOW);
            self.fire_hook();
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_message(&mut self) -> Result<Flow, ComposeError> {
        if self.io.options.edit_headers() {
            self.edit_headers_and_body()?;
        } else {
            self.edit_body_only()?;
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn op_edit_headers(&mut self) -> Result<Flow, ComposeError> {
        self.edit_headers_and_body()?;
        Ok(Flow::Continue)
    }

    fn body_path(&self) -> Result<std::path::PathBuf, ComposeError> {
        let node = self.session.tree.get(0).ok_or(ComposeError::NoAttachments)?;
        node.body
            .filename
            .clone()
            .ok_or_else(|| ComposeError::io("", "The message body has no file to edit"))
    }

    fn edit_body_only(&mut self) -> Result<(), ComposeError> {
        let path = self.body_path()?;
        let shown = path.display().to_string();
        self.io
            .editor
            .edit_file(&path)
            .map_err(|err| ComposeError::io(shown.clone(), err.to_string()))?;
        self.reencode_body(&shown)?;
        self.mark(Redraw::FULL);
        self.fire_hook();
        Ok(())
    }

    fn reencode_body(&mut self, shown: &str) -> Result<(), ComposeError> {
        if let Some(node) = self.session.tree.get_mut(0) {
            update_encoding(&mut node.body)
                .map_err(|err| ComposeError::io(shown, err.to_string()))?;
        }
        Ok(())
    }

    /// Puts the envelope and body into one file for the editor, then reads
    /// both back.
    fn edit_headers_and_body(&mut self) -> Result<(), ComposeError> {
        let body_path = self.body_path()?;
        let shown = body_path.display().to_string();
        let body = std::fs::read(&body_path)
            .map_err(|err| ComposeError::io(shown.clone(), format!("{}: {}", shown, err)))?;
        let mut editable = self.session.envelope.clone();
        if self.session.news {
            editable.newsgroups.get_or_insert_with(String::new);
        } else {
            editable.newsgroups = None;
        }
        let text = write_header_file(&editable, &String::from_utf8_lossy(&body));

        let temp = spool_path(&self.spool_dir, "headers.eml");
        let temp_shown = temp.display().to_string();
        std::fs::write(&temp, text.as_bytes()).map_err(|err| {
            ComposeError::io(temp_shown.clone(), format!("Can't create file {}: {}", temp_shown, err))
        })?;
        let edited = self
            .io
            .editor
            .edit_file(&temp)
            .map_err(|err| ComposeError::io(temp_shown.clone(), err.to_string()))
            .and_then(|_| {
                let raw = std::fs::read(&temp)
                    .map_err(|err| ComposeError::io(temp_shown.clone(), err.to_string()))?;
                read_header_file(&raw).map_err(|err| ComposeError::BadAddress(err.to_string()))
            });
        if let Err(err) = std::fs::remove_file(&temp) {
            log_debug(&format!("compose: remove {} failed: {}", temp_shown, err));
        }
        let HeaderEdit {
            envelope,
            attach,
            body,
        } = edited?;

        for field in [
            AddressField::From,
            AddressField::To,
            AddressField::Cc,
            AddressField::Bcc,
            AddressField::ReplyTo,
        ] {
            if let Err(err) = check_idn_list(field.label(), envelope.addresses(field)) {
                self.io.frontend.error(&err.to_string());
            }
        }
        self.apply_edited_envelope(envelope);

        std::fs::write(&body_path, body.as_bytes())
            .map_err(|err| ComposeError::io(shown.clone(), format!("{}: {}", shown, err)))?;
        self.reencode_body(&shown)?;

        for path in attach {
            match make_file_attach(&path) {
                Ok(part) => {
                    let mut node = AttachmentNode::new(part);
                    node.unowned = true;
                    self.session.tree.add(node);
                }
                Err(err) => {
                    log_debug(&format!("compose: attach {} failed: {}", path.display(), err));
                    let failed = ComposeError::AttachFailed(path.display().to_string());
                    self.io.frontend.error(&failed.to_string());
                }
            }
        }

        self.recompute_security();
        self.clamp_cursor();
        self.mark(Redraw::FULL | Redraw::FLOW);
        self.fire_hook();
        Ok(())
    }

    fn apply_edited_envelope(&mut self, mut edited: Envelope) {
        let current = &self.session.envelope;
        if edited.fcc != current.fcc {
            self.fcc_set = true;
        }
        if !self.session.news {
            edited.newsgroups = current.newsgroups.clone();
            edited.followup_to = current.followup_to.clone();
            edited.x_comment_to = current.x_comment_to.clone();
        }
        self.session.envelope = edited;
    }
}

#[cfg(test)]
mod tests {
    use crate::envelope_ops_mod::check_idn;
    use crate::error_mod::ComposeError;

    #[test]
    fn idn_accepts_unicode_domains() {
        assert!(check_idn("Jo <jo@b\u{fc}cher.example>").is_ok());
        assert!(check_idn("local-only").is_ok());
        assert!(check_idn("a@sub.example.org").is_ok());
    }

    #[test]
    fn idn_rejects_bad_labels() {
        assert_eq!(
            check_idn("a@-bad.org"),
            Err(ComposeError::BadIdn("a@-bad.org".to_string()))
        );
        assert!(check_idn("a@double..dot").is_err());
        assert!(check_idn("a@").is_err());
        let long = format!("a@{}.com", "x".repeat(64));
        assert!(check_idn(&long).is_err());
        assert_eq!(
            ComposeError::BadIdn("a@-bad.org".to_string()).to_string(),
            "Bad IDN: 'a@-bad.org'"
        );
    }
}
