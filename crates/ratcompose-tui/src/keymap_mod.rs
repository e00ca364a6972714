use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratcompose_engine::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Char(char),
    Ctrl(char),
    Code(KeyCode),
}

struct Binding {
    key: Key,
    op: Op,
    help: &'static str,
}

const fn bind(key: Key, op: Op, help: &'static str) -> Binding {
    Binding { key, op, help }
}

const BINDINGS: &[Binding] = &[
    bind(Key::Char('j'), Op::Next, "next entry"),
    bind(Key::Code(KeyCode::Down), Op::Next, ""),
    bind(Key::Char('k'), Op::Prev, "previous entry"),
    bind(Key::Code(KeyCode::Up), Op::Prev, ""),
    bind(Key::Char('='), Op::First, "first entry"),
    bind(Key::Code(KeyCode::Home), Op::First, ""),
    bind(Key::Char('*'), Op::Last, "last entry"),
    bind(Key::Code(KeyCode::End), Op::Last, ""),
    bind(Key::Char('T'), Op::Tag, "tag the current entry"),
    bind(Key::Char(';'), Op::TagPrefix, "apply next function to tagged entries"),
    bind(Key::Char('v'), Op::ToggleCollapse, "collapse or expand a group"),
    bind(Key::Char('F'), Op::EditFrom, "edit the From field"),
    bind(Key::Char('t'), Op::EditTo, "edit the To list"),
    bind(Key::Char('c'), Op::EditCc, "edit the Cc list"),
    bind(Key::Char('b'), Op::EditBcc, "edit the Bcc list"),
    bind(Key::Char('s'), Op::EditSubject, "edit the subject"),
    bind(Key::Char('r'), Op::EditReplyTo, "edit the Reply-To field"),
    bind(Key::Char('f'), Op::EditFcc, "enter a file to save a copy to"),
    bind(Key::Char('N'), Op::EditNewsgroups, "edit the newsgroups list"),
    bind(Key::Char('x'), Op::EditFollowupTo, "edit the Followup-To field"),
    bind(Key::Char('X'), Op::EditXCommentTo, "edit the X-Comment-To field"),
    bind(Key::Char('h'), Op::AddHeader, "add or replace a custom header"),
    bind(Key::Char('H'), Op::RemoveHeader, "remove a custom header"),
    bind(Key::Char('e'), Op::EditMessage, "edit the message"),
    bind(Key::Char('E'), Op::EditHeaders, "edit the message with headers"),
    bind(Key::Char('a'), Op::AttachFile, "attach files"),
    bind(Key::Char('A'), Op::AttachMessage, "attach messages"),
    bind(Key::Char('K'), Op::AttachKey, "attach a PGP public key"),
    bind(Key::Char('n'), Op::NewMime, "compose a new attachment"),
    bind(Key::Char('D'), Op::Delete, "delete the current entry"),
    bind(Key::Char('-'), Op::MoveUp, "move the attachment up"),
    bind(Key::Char('+'), Op::MoveDown, "move the attachment down"),
    bind(Key::Char('&'), Op::GroupAlternatives, "group tagged parts as alternatives"),
    bind(Key::Char('^'), Op::GroupMultilingual, "group tagged parts as multilingual"),
    bind(Key::Ctrl('d'), Op::ToggleDisposition, "toggle inline or attachment"),
    bind(Key::Char('m'), Op::ToggleRecode, "toggle recoding of this part"),
    bind(Key::Char('u'), Op::ToggleUnlink, "toggle deleting the file after send"),
    bind(Key::Char('d'), Op::EditDescription, "edit the description"),
    bind(Key::Ctrl('l'), Op::EditLanguage, "edit the Content-Language"),
    bind(Key::Ctrl('t'), Op::EditContentType, "edit the content type"),
    bind(Key::Ctrl('e'), Op::EditEncoding, "edit the transfer encoding"),
    bind(Key::Char('U'), Op::UpdateEncoding, "update encoding info"),
    bind(Key::Ctrl('o'), Op::RenameAttachment, "send the attachment with another name"),
    bind(Key::Char('R'), Op::RenameFile, "rename the attached file"),
    bind(Key::Ctrl('x'), Op::EditFile, "edit the attachment file"),
    bind(Key::Char('p'), Op::PgpMenu, "PGP options"),
    bind(Key::Char('S'), Op::SmimeMenu, "S/MIME options"),
    bind(Key::Char('o'), Op::AutocryptMenu, "Autocrypt options"),
    bind(Key::Ctrl('f'), Op::ForgetPassphrase, "wipe passphrases from memory"),
    bind(Key::Char('y'), Op::Send, "send the message"),
    bind(Key::Char('P'), Op::Postpone, "postpone the message"),
    bind(Key::Char('q'), Op::Exit, "abandon the message"),
];

fn key_of(event: &KeyEvent) -> Key {
    match event.code {
        KeyCode::Char(c) if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Key::Ctrl(c.to_ascii_lowercase())
        }
        KeyCode::Char(c) => Key::Char(c),
        code => Key::Code(code),
    }
}

pub(crate) fn lookup(event: &KeyEvent) -> Option<Op> {
    let key = key_of(event);
    BINDINGS.iter().find(|b| b.key == key).map(|b| b.op)
}

pub(crate) fn is_help(event: &KeyEvent) -> bool {
    key_of(event) == Key::Char('?')
}

fn key_label(key: Key) -> String {
    match key {
        Key::Char(c) => c.to_string(),
        Key::Ctrl(c) => format!("^{}", c.to_ascii_uppercase()),
        Key::Code(KeyCode::Down) => "<Down>".to_string(),
        Key::Code(KeyCode::Up) => "<Up>".to_string(),
        Key::Code(KeyCode::Home) => "<Home>".to_string(),
        Key::Code(KeyCode::End) => "<End>".to_string(),
        Key::Code(code) => format!("{:?}", code),
    }
}

/// `(key, description)` rows for the help overlay, one per documented binding.
pub(crate) fn help_lines() -> Vec<(String, &'static str)> {
    BINDINGS
        .iter()
        .filter(|b| !b.help.is_empty())
        .map(|b| (key_label(b.key), b.help))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratcompose_engine::Op;

    use super::{BINDINGS, help_lines, is_help, lookup};

    #[test]
    fn plain_and_control_keys_resolve() {
        let plain = KeyEvent::new(KeyCode::Char('y'), KeyModifiers::NONE);
        assert_eq!(lookup(&plain), Some(Op::Send));
        let ctrl = KeyEvent::new(KeyCode::Char('t'), KeyModifiers::CONTROL);
        assert_eq!(lookup(&ctrl), Some(Op::EditContentType));
        let shifted = KeyEvent::new(KeyCode::Char('T'), KeyModifiers::SHIFT);
        assert_eq!(lookup(&shifted), Some(Op::Tag));
        let arrow = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(lookup(&arrow), Some(Op::Next));
    }

    #[test]
    fn unbound_keys_and_help() {
        let key = KeyEvent::new(KeyCode::Char('Z'), KeyModifiers::NONE);
        assert_eq!(lookup(&key), None);
        let help = KeyEvent::new(KeyCode::Char('?'), KeyModifiers::NONE);
        assert!(is_help(&help));
        assert_eq!(lookup(&help), None);
    }

    #[test]
    fn no_key_is_bound_twice() {
        let mut seen = HashSet::new();
        for binding in BINDINGS {
            assert!(seen.insert(binding.key), "duplicate {:?}", binding.key);
        }
        assert!(help_lines().iter().any(|(key, _)| key == "^D"));
    }
}
