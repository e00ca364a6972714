use std::cell::Cell;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use ratcompose_core::log_debug;
use ratcompose_engine::{Answer, ComposeView, Op, Presenter, Prompter, Redraw};

use crate::keymap_mod::{is_help, lookup};
use crate::prompt_mod::{
    ChoiceStep, LineInput, PromptStep, SelectState, choose_key, confirm_key, confirm_prompt,
};
use crate::render_mod::{Footer, Overlay, Screen, draw_compose, snapshot};
use crate::ui_theme_mod::ComposeTheme;

const UNBOUND_KEY: &str = "Key is not bound.  Press '?' for help.";

fn expand_home(raw: &str) -> PathBuf {
    match (raw.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(raw),
    }
}

/// ratatui screen plus a blocking crossterm key reader.
pub(crate) struct TermFrontend {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    theme: ComposeTheme,
    screen: Screen,
    footer: Footer,
    overlay: Option<Overlay>,
    /// Set by the editor after it gave the terminal back.
    suspended: Rc<Cell<bool>>,
}

impl TermFrontend {
    pub(crate) fn enter(theme: ComposeTheme, suspended: Rc<Cell<bool>>) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self {
            terminal,
            theme,
            screen: Screen::default(),
            footer: Footer::Empty,
            overlay: None,
            suspended,
        })
    }

    pub(crate) fn restore(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    fn draw(&mut self) {
        if self.suspended.replace(false) {
            if let Err(err) = self.terminal.clear() {
                log_debug(&format!("terminal clear failed: {}", err));
            }
        }
        let Self {
            terminal,
            theme,
            screen,
            footer,
            overlay,
            ..
        } = self;
        if let Err(err) =
            terminal.draw(|frame| draw_compose(frame, screen, footer, overlay.as_ref(), theme))
        {
            log_debug(&format!("draw failed: {}", err));
        }
    }

    /// Next key press; `None` once input is gone.
    fn read_key(&mut self) -> Option<KeyEvent> {
        loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => return Some(key),
                Ok(Event::Resize(_, _)) => self.draw(),
                Ok(_) => {}
                Err(err) => {
                    log_debug(&format!("input closed: {}", err));
                    return None;
                }
            }
        }
    }
}

impl Prompter for TermFrontend {
    fn next_op(&mut self) -> Option<Op> {
        loop {
            self.draw();
            let key = self.read_key()?;
            self.footer = Footer::Empty;
            if self.overlay.take().is_some() {
                continue;
            }
            if is_help(&key) {
                self.overlay = Some(Overlay::Help);
                continue;
            }
            match lookup(&key) {
                Some(op) => return Some(op),
                None => self.footer = Footer::Error(UNBOUND_KEY.to_string()),
            }
        }
    }

    fn line(&mut self, prompt: &str, initial: &str) -> Option<String> {
        let mut input = LineInput::new(initial);
        loop {
            self.footer = Footer::Prompt {
                prompt: prompt.to_string(),
                input: input.clone(),
            };
            self.draw();
            let Some(key) = self.read_key() else {
                self.footer = Footer::Empty;
                return None;
            };
            match input.apply_key(key) {
                PromptStep::Pending => {}
                PromptStep::Submit => {
                    self.footer = Footer::Empty;
                    return Some(input.text);
                }
                PromptStep::Cancel => {
                    self.footer = Footer::Empty;
                    return None;
                }
            }
        }
    }

    fn confirm(&mut self, prompt: &str, default: Answer) -> Answer {
        self.footer = Footer::Prompt {
            prompt: confirm_prompt(prompt, default),
            input: LineInput::default(),
        };
        loop {
            self.draw();
            let Some(key) = self.read_key() else {
                self.footer = Footer::Empty;
                return Answer::Abort;
            };
            if let Some(answer) = confirm_key(key, default) {
                self.footer = Footer::Empty;
                return answer;
            }
        }
    }

    fn choose(&mut self, prompt: &str, letters: &str) -> Option<usize> {
        self.footer = Footer::Message(prompt.to_string());
        loop {
            self.draw();
            let key = self.read_key()?;
            match choose_key(key, letters) {
                ChoiceStep::Pending => {}
                ChoiceStep::Chosen(idx) => {
                    self.footer = Footer::Empty;
                    return Some(idx);
                }
                ChoiceStep::Cancel => {
                    self.footer = Footer::Empty;
                    return None;
                }
            }
        }
    }

    fn pick_files(&mut self, prompt: &str) -> Option<Vec<PathBuf>> {
        let raw = self.line(&format!("{}: ", prompt), "")?;
        let words = match shell_words::split(&raw) {
            Ok(words) => words,
            Err(err) => {
                self.error(&format!("Bad file list: {}", err));
                return None;
            }
        };
        let paths: Vec<PathBuf> = words.iter().map(|w| expand_home(w)).collect();
        if paths.is_empty() { None } else { Some(paths) }
    }

    fn select(&mut self, prompt: &str, items: &[String]) -> Option<Vec<usize>> {
        self.overlay = Some(Overlay::Select {
            title: prompt.to_string(),
            items: items.to_vec(),
            state: SelectState::new(items.len()),
        });
        loop {
            self.draw();
            let Some(key) = self.read_key() else {
                self.overlay = None;
                return None;
            };
            let step = match self.overlay.as_mut() {
                Some(Overlay::Select { state, .. }) => state.apply_key(key),
                _ => PromptStep::Cancel,
            };
            match step {
                PromptStep::Pending => {}
                PromptStep::Submit => {
                    return match self.overlay.take() {
                        Some(Overlay::Select { state, .. }) => Some(state.selection()),
                        _ => None,
                    };
                }
                PromptStep::Cancel => {
                    self.overlay = None;
                    return None;
                }
            }
        }
    }

    fn message(&mut self, text: &str) {
        self.footer = Footer::Message(text.to_string());
        self.draw();
    }

    fn error(&mut self, text: &str) {
        self.footer = Footer::Error(text.to_string());
        self.draw();
    }
}

impl Presenter for TermFrontend {
    fn render(&mut self, view: &ComposeView<'_>, redraw: Redraw) {
        if redraw.contains(Redraw::FULL) {
            self.suspended.set(true);
        }
        self.screen = snapshot(view, self.columns());
        self.draw();
    }

    fn columns(&self) -> usize {
        self.terminal
            .size()
            .map(|size| size.width as usize)
            .unwrap_or(80)
    }
}
