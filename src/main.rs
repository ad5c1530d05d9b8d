use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod dates;
mod emoji;
mod error;
mod formatting;
mod history;
mod persistence;
mod resolver;
mod slack;
mod thread;

use commands::{resolve_limit, CommandHandler, ShowOptions, EXAMPLES};
use config::{get_config_dir, Config, ConfigLoad};
use emoji::EmojiTable;
use slack::SlackClient;

#[derive(Parser)]
#[command(name = "slack", version, about = "Read and post to a Slack channel from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, value_name = "DIR", help = "Directory holding slack.config.json and slack.emoji.json")]
    config_dir: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Log debug output to stderr")]
    verbose: bool,

    #[arg(long, global = true, help = "Disable ANSI colors")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Send a message to Slack")]
    Send {
        message: String,
        #[arg(long, help = "Thread timestamp to reply to")]
        ts: Option<String>,
    },
    #[command(about = "Get messages from Slack")]
    Show {
        limit: Option<String>,
        #[arg(long, help = "Date or date range (YYYY-MM-DD or YYYY-MM-DD:YYYY-MM-DD)")]
        date: Option<String>,
        #[arg(long, help = "Keyword to highlight in messages")]
        search: Option<String>,
        #[arg(long, help = "Keyword to filter messages")]
        filter: Option<String>,
        #[arg(long = "limit", value_name = "N", help = "Number of messages to show")]
        limit_flag: Option<usize>,
        #[arg(long, help = "Show only messages with files")]
        files: bool,
        #[arg(long, value_name = "COLS", help = "Wrap long lines at this width")]
        width: Option<usize>,
    },
    #[command(about = "Upload a file to Slack")]
    Upload { path: PathBuf },
    #[command(about = "Download a file from Slack")]
    Download { url: String },
    #[command(about = "Add or remove a reaction, or list known emoji")]
    Emoji {
        ts: Option<String>,
        emoji: Option<String>,
        #[arg(long, value_name = "NAME", help = "Add this reaction")]
        add: Option<String>,
        #[arg(long, value_name = "NAME", help = "Remove this reaction")]
        del: Option<String>,
    },
    #[command(about = "Update a Slack message")]
    Edit {
        ts: Option<String>,
        message: Option<String>,
        #[arg(long = "ts", value_name = "TS")]
        ts_flag: Option<String>,
        #[arg(long = "msg", value_name = "TEXT")]
        msg_flag: Option<String>,
    },
    #[command(about = "Delete a Slack message")]
    Delete {
        ts: Option<String>,
        #[arg(long = "ts", value_name = "TS")]
        ts_flag: Option<String>,
    },
    #[command(about = "Show examples for all commands")]
    Examples,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Examples = cli.command {
        println!("{EXAMPLES}");
        return Ok(());
    }

    let dir = get_config_dir(cli.config_dir);
    let mut config = match Config::load_or_create(&dir).context("loading config")? {
        ConfigLoad::Loaded(config) => config,
        ConfigLoad::Created(path) => {
            println!("Config file not found, creating a new one with template.");
            println!("Please edit {} with your configuration.", path.display());
            return Ok(());
        }
    };
    let emoji = EmojiTable::load(&config.emoji_path()).context("loading emoji table")?;
    let slack = SlackClient::new(&config).context("building http client")?;
    let color = !cli.no_color;

    let mut handler = CommandHandler::new(&mut config, &slack, &emoji);
    match cli.command {
        Command::Send { message, ts } => handler.handle_send(&message, ts.as_deref()).await?,
        Command::Show {
            limit,
            date,
            search,
            filter,
            limit_flag,
            files,
            width,
        } => {
            let (limit, invalid) =
                resolve_limit(limit.as_deref(), limit_flag, handler.default_show_limit());
            if invalid {
                println!("Invalid limit value, using default value.");
            }
            let options = ShowOptions {
                limit,
                date,
                search,
                filter,
                files_only: files,
                width,
                color,
            };
            handler.handle_show(options).await?
        }
        Command::Upload { path } => handler.handle_upload(&path).await?,
        Command::Download { url } => handler.handle_download(&url).await?,
        Command::Emoji { ts, emoji, add, del } => {
            handler
                .handle_emoji(ts.as_deref(), emoji.as_deref(), add.as_deref(), del.as_deref())
                .await?
        }
        Command::Edit {
            ts,
            message,
            ts_flag,
            msg_flag,
        } => {
            handler
                .handle_edit(ts.or(ts_flag).as_deref(), message.or(msg_flag).as_deref())
                .await?
        }
        Command::Delete { ts, ts_flag } => handler.handle_delete(ts.or(ts_flag).as_deref()).await?,
        Command::Examples => println!("{EXAMPLES}"),
    }
    Ok(())
}
