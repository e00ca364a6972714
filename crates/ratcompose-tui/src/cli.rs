use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ratcompose", version, about = "Terminal mail compose screen")]
pub(crate) struct Cli {
    /// Resume a postponed JSON draft or a raw RFC 5322 message.
    #[arg(long)]
    pub(crate) draft: Option<PathBuf>,
    #[arg(long)]
    pub(crate) from: Option<String>,
    #[arg(long)]
    pub(crate) to: Vec<String>,
    #[arg(long)]
    pub(crate) cc: Vec<String>,
    #[arg(long)]
    pub(crate) bcc: Vec<String>,
    #[arg(short, long)]
    pub(crate) subject: Option<String>,
    #[arg(long)]
    pub(crate) fcc: Option<String>,
    /// Compose a news article for these newsgroups instead of a mail.
    #[arg(long)]
    pub(crate) news: Option<String>,
    #[arg(short, long)]
    pub(crate) attach: Vec<PathBuf>,
    /// File holding the initial body text.
    #[arg(long)]
    pub(crate) body: Option<PathBuf>,
    /// Where the finished message goes on send. Defaults to stdout.
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,
    /// Leave spooled files in place on abort.
    #[arg(long)]
    pub(crate) keep_files: bool,
}
