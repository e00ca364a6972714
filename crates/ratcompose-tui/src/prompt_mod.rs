use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratcompose_engine::Answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromptStep {
    Pending,
    Submit,
    Cancel,
}

fn is_cancel(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('g') | KeyCode::Char('c')))
}

fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Single-line editor used by the footer prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LineInput {
    pub(crate) text: String,
    pub(crate) cursor: usize,
}

impl LineInput {
    pub(crate) fn new(initial: &str) -> Self {
        Self {
            text: initial.to_string(),
            cursor: initial.chars().count(),
        }
    }

    fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub(crate) fn apply_key(&mut self, key: KeyEvent) -> PromptStep {
        if is_cancel(&key) {
            return PromptStep::Cancel;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => return PromptStep::Submit,
            KeyCode::Char('a') if ctrl => self.cursor = 0,
            KeyCode::Char('e') if ctrl => self.cursor = self.len(),
            KeyCode::Char('u') if ctrl => {
                let idx = char_to_byte_idx(&self.text, self.cursor);
                self.text.replace_range(..idx, "");
                self.cursor = 0;
            }
            KeyCode::Char('k') if ctrl => {
                let idx = char_to_byte_idx(&self.text, self.cursor);
                self.text.truncate(idx);
            }
            KeyCode::Char(_) if ctrl => {}
            KeyCode::Char(c) => {
                let idx = char_to_byte_idx(&self.text, self.cursor);
                self.text.insert(idx, c);
                self.cursor += 1;
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    let idx = char_to_byte_idx(&self.text, self.cursor - 1);
                    self.text.remove(idx);
                    self.cursor -= 1;
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.len() {
                    let idx = char_to_byte_idx(&self.text, self.cursor);
                    self.text.remove(idx);
                }
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.len(),
            _ => {}
        }
        PromptStep::Pending
    }
}

/// Answer for a yes/no key; `None` keeps the prompt open.
pub(crate) fn confirm_key(key: KeyEvent, default: Answer) -> Option<Answer> {
    if is_cancel(&key) {
        return Some(Answer::Abort);
    }
    match key.code {
        KeyCode::Enter => Some(default),
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(Answer::Yes),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Answer::No),
        _ => None,
    }
}

pub(crate) fn confirm_prompt(prompt: &str, default: Answer) -> String {
    match default {
        Answer::No => format!("{} (yes/[no]): ", prompt),
        _ => format!("{} ([yes]/no): ", prompt),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChoiceStep {
    Pending,
    Chosen(usize),
    Cancel,
}

pub(crate) fn choose_key(key: KeyEvent, letters: &str) -> ChoiceStep {
    if is_cancel(&key) {
        return ChoiceStep::Cancel;
    }
    let KeyCode::Char(c) = key.code else {
        return ChoiceStep::Pending;
    };
    let c = c.to_ascii_lowercase();
    match letters.chars().position(|l| l.to_ascii_lowercase() == c) {
        Some(idx) => ChoiceStep::Chosen(idx),
        None => ChoiceStep::Pending,
    }
}

/// Multi-select list: space or `t` marks, Enter returns the marks or the
/// highlighted row when nothing is marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectState {
    pub(crate) cursor: usize,
    pub(crate) marked: Vec<bool>,
}

impl SelectState {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            cursor: 0,
            marked: vec![false; len],
        }
    }

    pub(crate) fn apply_key(&mut self, key: KeyEvent) -> PromptStep {
        if is_cancel(&key) || key.code == KeyCode::Char('q') {
            return PromptStep::Cancel;
        }
        let len = self.marked.len();
        match key.code {
            KeyCode::Enter => return PromptStep::Submit,
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < len {
                    self.cursor += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Char(' ') | KeyCode::Char('t') => {
                if let Some(mark) = self.marked.get_mut(self.cursor) {
                    *mark = !*mark;
                }
                if self.cursor + 1 < len {
                    self.cursor += 1;
                }
            }
            _ => {}
        }
        PromptStep::Pending
    }

    pub(crate) fn selection(&self) -> Vec<usize> {
        let marked: Vec<usize> = self
            .marked
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .map(|(idx, _)| idx)
            .collect();
        if marked.is_empty() && self.cursor < self.marked.len() {
            return vec![self.cursor];
        }
        marked
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratcompose_engine::Answer;

    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn line_input_edits_at_cursor() {
        let mut input = LineInput::new("héllo");
        assert_eq!(input.cursor, 5);
        input.apply_key(key(KeyCode::Left));
        input.apply_key(key(KeyCode::Left));
        input.apply_key(key(KeyCode::Backspace));
        assert_eq!(input.text, "hélo");
        input.apply_key(key(KeyCode::Char('L')));
        assert_eq!(input.text, "héLlo");
        input.apply_key(ctrl('k'));
        assert_eq!(input.text, "héL");
        input.apply_key(ctrl('u'));
        assert_eq!(input.text, "");
        assert_eq!(input.apply_key(key(KeyCode::Enter)), PromptStep::Submit);
    }

    #[test]
    fn escape_and_ctrl_g_cancel() {
        let mut input = LineInput::new("x");
        assert_eq!(input.apply_key(key(KeyCode::Esc)), PromptStep::Cancel);
        assert_eq!(input.apply_key(ctrl('g')), PromptStep::Cancel);
        assert_eq!(confirm_key(ctrl('g'), Answer::Yes), Some(Answer::Abort));
    }

    #[test]
    fn confirm_enter_takes_default() {
        assert_eq!(confirm_key(key(KeyCode::Enter), Answer::No), Some(Answer::No));
        assert_eq!(confirm_key(key(KeyCode::Char('Y')), Answer::No), Some(Answer::Yes));
        assert_eq!(confirm_key(key(KeyCode::Char('x')), Answer::No), None);
        assert_eq!(confirm_prompt("Send?", Answer::Yes), "Send? ([yes]/no): ");
        assert_eq!(confirm_prompt("Send?", Answer::No), "Send? (yes/[no]): ");
    }

    #[test]
    fn choose_matches_letters_case_insensitively() {
        assert_eq!(choose_key(key(KeyCode::Char('E')), "esc"), ChoiceStep::Chosen(0));
        assert_eq!(choose_key(key(KeyCode::Char('c')), "esc"), ChoiceStep::Chosen(2));
        assert_eq!(choose_key(key(KeyCode::Char('z')), "esc"), ChoiceStep::Pending);
        assert_eq!(choose_key(key(KeyCode::Esc), "esc"), ChoiceStep::Cancel);
    }

    #[test]
    fn select_returns_marks_or_cursor() {
        let mut state = SelectState::new(3);
        state.apply_key(key(KeyCode::Down));
        assert_eq!(state.selection(), vec![1]);
        state.apply_key(key(KeyCode::Char(' ')));
        state.apply_key(key(KeyCode::Char(' ')));
        assert_eq!(state.cursor, 2);
        assert_eq!(state.selection(), vec![1, 2]);
        state.apply_key(key(KeyCode::Char('k')));
        state.apply_key(key(KeyCode::Char('t')));
        assert_eq!(state.selection(), vec![2]);
    }
}
