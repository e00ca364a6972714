use std::cell::Cell;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use mailparse::MailHeaderMap;
use ratcompose_core::{AttachedMessage, Envelope, log_debug};
use ratcompose_engine::{AttachmentTree, Editor, MailboxBrowser, MessageHook};

/// Resolves the editor argv: config first, then `$VISUAL`, then `$EDITOR`.
pub(crate) fn editor_command(
    configured: Option<&str>,
    visual: Option<String>,
    editor: Option<String>,
) -> Result<Vec<String>> {
    let raw = configured
        .map(str::to_string)
        .into_iter()
        .chain(visual)
        .chain(editor)
        .find(|cmd| !cmd.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string());
    let parts = shell_words::split(&raw).map_err(|e| anyhow!("Bad editor command {}: {}", raw, e))?;
    if parts.is_empty() {
        return Ok(vec!["vi".to_string()]);
    }
    Ok(parts)
}

/// Runs the user's editor on the real terminal, then flags the screen for a
/// full repaint.
pub(crate) struct ExternalEditor {
    argv: Vec<String>,
    suspended: Rc<Cell<bool>>,
}

impl ExternalEditor {
    pub(crate) fn new(configured: Option<&str>, suspended: Rc<Cell<bool>>) -> Result<Self> {
        let argv = editor_command(
            configured,
            std::env::var("VISUAL").ok(),
            std::env::var("EDITOR").ok(),
        )?;
        Ok(Self { argv, suspended })
    }
}

impl Editor for ExternalEditor {
    fn edit_file(&mut self, path: &Path) -> Result<()> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(anyhow!("No editor configured"));
        };
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        let status = Command::new(program).args(args).arg(path).status();
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        self.suspended.set(true);
        let status = status.map_err(|err| {
            log_debug(&format!("editor spawn failed {}: {}", program, err));
            anyhow!("Can't run {}: {}", program, err)
        })?;
        if !status.success() {
            return Err(anyhow!("Error running \"{}\"", program));
        }
        Ok(())
    }
}

fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            out.push(path);
        }
    }
    Ok(out)
}

fn message_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let maildir: Vec<PathBuf> = ["cur", "new"]
        .iter()
        .map(|sub| path.join(sub))
        .filter(|sub| sub.is_dir())
        .collect();
    let mut files = Vec::new();
    if maildir.is_empty() {
        files = files_in(path)?;
    } else {
        for sub in &maildir {
            files.extend(files_in(sub)?);
        }
    }
    files.sort();
    Ok(files)
}

fn read_message(path: &Path) -> Result<AttachedMessage> {
    let raw = std::fs::read(path)?;
    let (headers, _) = mailparse::parse_headers(&raw)?;
    Ok(AttachedMessage {
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        from: headers.get_first_value("From").unwrap_or_default(),
        raw,
    })
}

/// Reads a maildir (or a directory of message files, or a single file).
/// The last folder opened stays loaded so attached messages share it.
#[derive(Default)]
pub(crate) struct MaildirBrowser {
    loaded: Vec<Arc<AttachedMessage>>,
}

impl MailboxBrowser for MaildirBrowser {
    fn open(&mut self, path: &Path) -> Result<Vec<Arc<AttachedMessage>>> {
        let mut messages = Vec::new();
        for file in message_files(path)? {
            match read_message(&file) {
                Ok(message) => messages.push(Arc::new(message)),
                Err(err) => log_debug(&format!("mailbox skip {}: {}", file.display(), err)),
            }
        }
        log_debug(&format!(
            "mailbox {}: {} messages",
            path.display(),
            messages.len()
        ));
        self.loaded = messages;
        Ok(self.loaded.clone())
    }
}

#[derive(Debug, Default)]
pub(crate) struct LogHook {
    pub(crate) fired: usize,
}

impl MessageHook for LogHook {
    fn message_changed(&mut self, envelope: &Envelope, tree: &AttachmentTree) {
        self.fired += 1;
        log_debug(&format!(
            "hook: message changed ({} parts, {} recipients)",
            tree.len(),
            envelope.recipients().count()
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use ratcompose_core::Envelope;
    use ratcompose_engine::{AttachmentTree, MailboxBrowser, MessageHook};
    use tempfile::TempDir;

    use super::{LogHook, MaildirBrowser, editor_command};

    #[test]
    fn editor_command_prefers_config_then_visual() -> Result<()> {
        let argv = editor_command(
            Some("nvim -c 'set tw=72'"),
            Some("emacs".to_string()),
            None,
        )?;
        assert_eq!(argv, vec!["nvim", "-c", "set tw=72"]);
        let argv = editor_command(None, Some("  ".to_string()), Some("nano".to_string()))?;
        assert_eq!(argv, vec!["nano"]);
        assert_eq!(editor_command(None, None, None)?, vec!["vi"]);
        assert!(editor_command(Some("vim 'unterminated"), None, None).is_err());
        Ok(())
    }

    #[test]
    fn maildir_reads_cur_and_new_in_order() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir(dir.path().join("cur"))?;
        std::fs::create_dir(dir.path().join("new"))?;
        std::fs::create_dir(dir.path().join("tmp"))?;
        std::fs::write(
            dir.path().join("cur").join("1:2,S"),
            "From: Alice <alice@x.com>\r\nSubject: Hello\r\n\r\nbody\r\n",
        )?;
        std::fs::write(
            dir.path().join("new").join("2"),
            "From: bob@y.com\r\nSubject: Re: Hello\r\n\r\nreply\r\n",
        )?;
        std::fs::write(dir.path().join("tmp").join("3"), "Subject: partial\r\n\r\n")?;

        let mut browser = MaildirBrowser::default();
        let messages = browser.open(dir.path())?;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].subject, "Hello");
        assert_eq!(messages[0].from, "Alice <alice@x.com>");
        assert_eq!(messages[1].subject, "Re: Hello");
        assert_eq!(Arc::strong_count(&messages[0]), 2);
        Ok(())
    }

    #[test]
    fn single_file_and_plain_directory() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("saved.eml");
        std::fs::write(&file, "Subject: Saved\r\n\r\nx\r\n")?;
        let mut browser = MaildirBrowser::default();
        let one = browser.open(&file)?;
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].from, "");
        let all = browser.open(dir.path())?;
        assert_eq!(all.len(), 1);
        assert!(browser.open(&dir.path().join("missing")).is_err());
        Ok(())
    }

    #[test]
    fn log_hook_counts_changes() {
        let mut hook = LogHook::default();
        hook.message_changed(&Envelope::default(), &AttachmentTree::new());
        hook.message_changed(&Envelope::default(), &AttachmentTree::new());
        assert_eq!(hook.fired, 2);
    }
}
