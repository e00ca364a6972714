use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use clap::Parser;
use ratcompose_core::{log_debug, xdg_state_dir};
use ratcompose_engine::{Collaborators, ComposeController, ComposeFlags, HeaderPadding, NullCrypto};

mod cli;
mod cli_config;
mod collab_mod;
mod handoff_mod;
mod keymap_mod;
mod prompt_mod;
mod render_mod;
mod session_mod;
mod terminal_mod;
mod ui_theme_mod;

use cli::Cli;
use cli_config::load_compose_config;
use collab_mod::{ExternalEditor, LogHook, MaildirBrowser};
use handoff_mod::{drafts_dir, finish};
use session_mod::build_session;
use terminal_mod::TermFrontend;
use ui_theme_mod::ComposeTheme;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_compose_config();

    let spool = xdg_state_dir().join("ratcompose").join("spool");
    std::fs::create_dir_all(&spool)
        .map_err(|e| anyhow!("Can't create {}: {}", spool.display(), e))?;
    let session = build_session(&cli, &spool)?;

    let suspended = Rc::new(Cell::new(false));
    let mut editor = ExternalEditor::new(config.editor.as_deref(), Rc::clone(&suspended))?;
    let mut browser = MaildirBrowser::default();
    let mut crypto = NullCrypto;
    let mut hook = LogHook::default();
    let theme = ComposeTheme::from_name(config.theme.as_deref().unwrap_or("default"));

    let mut frontend = TermFrontend::enter(theme, Rc::clone(&suspended))?;
    let result = {
        let io = Collaborators {
            frontend: &mut frontend,
            options: &config.settings,
            crypto: &mut crypto,
            hook: &mut hook,
            browser: &mut browser,
            editor: &mut editor,
        };
        ComposeController::new(session, io, HeaderPadding::new(), spool.clone())
            .with_flags(ComposeFlags {
                no_free_headers: cli.keep_files,
            })
            .run()
    };
    frontend.restore()?;
    log_debug(&format!(
        "compose finished: {:?}, hook fired {} times",
        result.outcome, hook.fired
    ));

    let code = finish(&result, cli.out.as_deref(), &drafts_dir())?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
