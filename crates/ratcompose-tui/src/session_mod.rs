use std::path::Path;

use anyhow::{Result, anyhow};
use ratcompose_content::{make_file_attach, parse_address_list, write_body_file};
use ratcompose_core::{Envelope, SecurityFlags, log_debug};
use ratcompose_engine::{AttachmentNode, AttachmentTree, ComposeSession};

use crate::cli::Cli;
use crate::handoff_mod::load_draft;

fn addresses(values: &[String]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for value in values {
        out.extend(parse_address_list(value)?);
    }
    Ok(out)
}

/// Starting session: a resumed draft, or a fresh message from the command line.
pub(crate) fn build_session(cli: &Cli, spool: &Path) -> Result<ComposeSession> {
    if let Some(draft) = cli.draft.as_deref() {
        let session = load_draft(draft, spool)?;
        log_debug(&format!(
            "session resumed from {} ({} parts)",
            draft.display(),
            session.tree.len()
        ));
        return Ok(session);
    }

    let envelope = Envelope {
        from: match cli.from.as_deref() {
            Some(from) => parse_address_list(from)?,
            None => Vec::new(),
        },
        to: addresses(&cli.to)?,
        cc: addresses(&cli.cc)?,
        bcc: addresses(&cli.bcc)?,
        subject: cli.subject.clone(),
        fcc: cli.fcc.clone(),
        newsgroups: cli.news.clone(),
        ..Envelope::default()
    };

    let text = match cli.body.as_deref() {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Can't read {}: {}", path.display(), e))?,
        None => String::new(),
    };
    let mut tree = AttachmentTree::new();
    tree.add(AttachmentNode::new(write_body_file(spool, &text)?));
    for path in &cli.attach {
        let part = make_file_attach(path)
            .map_err(|e| anyhow!("Unable to attach {}: {}", path.display(), e))?;
        let mut node = AttachmentNode::new(part);
        node.unowned = true;
        tree.add(node);
    }

    Ok(ComposeSession {
        envelope,
        tree,
        security: SecurityFlags::empty(),
        news: cli.news.is_some(),
    })
}
