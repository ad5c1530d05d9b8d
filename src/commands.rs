use std::fmt::Display;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::TimeZone;
use futures::{pin_mut, Stream, StreamExt};
use percent_encoding::percent_decode_str;
use reqwest::Url;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dates::parse_date_range;
use crate::emoji::{decode_code_point, EmojiTable};
use crate::error::{Result, SlackError};
use crate::formatting::{MessageFormatter, RenderOptions};
use crate::history::{build_entries, HistoryQuery, Paginator};
use crate::persistence::UserNameStore;
use crate::resolver::NameResolver;
use crate::slack::{ChatApi, SlackClient};

const FALLBACK_REACTION: &str = "white_check_mark";
const FALLBACK_DOWNLOAD_NAME: &str = "download";

pub const EXAMPLES: &str = "Examples:
   slack show
   slack show 100
   slack show --date 2023-12-31
   slack show --date 2023-12-29:2023-12-31
   slack show --search keyword
   slack show 500 --search keyword
   slack show --filter keyword
   slack show 500 --filter keyword
   slack show --files
   slack show --width 100 --no-color
   slack send \"Hello, Slack!\"
   slack send \"Hello, Slack!\" --ts 1234567890.123456 (reply)
   slack edit --ts 1234567890.123456 --msg \"Updated message\"
   slack edit 1234567890.123456 \"Updated message\"
   slack delete --ts 1234567890.123456
   slack delete 1234567890.123456
   slack upload path/to/your/file.txt
   slack download https://file.url
   slack emoji
   slack emoji 1234567890.123456
   slack emoji 1234567890.123456 white-check-mark
   slack emoji 1234567890.123456 --add thumbsup
   slack emoji 1234567890.123456 --del white-check-mark";

/// Everything `show` needs after argument parsing.
#[derive(Debug, Clone, Default)]
pub struct ShowOptions {
    pub limit: usize,
    pub date: Option<String>,
    pub search: Option<String>,
    pub filter: Option<String>,
    pub files_only: bool,
    pub width: Option<usize>,
    pub color: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionAction {
    List,
    Add { ts: String, name: String },
    Remove { ts: String, name: String },
}

pub struct CommandHandler<'a> {
    config: &'a mut Config,
    slack: &'a SlackClient,
    emoji: &'a EmojiTable,
}

impl<'a> CommandHandler<'a> {
    pub fn new(config: &'a mut Config, slack: &'a SlackClient, emoji: &'a EmojiTable) -> Self {
        Self {
            config,
            slack,
            emoji,
        }
    }

    pub fn default_show_limit(&self) -> usize {
        self.config.default_show_limit
    }

    pub async fn handle_show(&mut self, options: ShowOptions) -> Result<()> {
        let range = match options.date.as_deref() {
            Some(date) => parse_date_range(date)?,
            None => None,
        };
        let query = HistoryQuery {
            limit: options.limit,
            range,
            filter: options.filter.clone().filter(|f| !f.is_empty()),
            files_only: options.files_only,
        };
        let render = RenderOptions::new(options.search, options.filter, options.color)
            .with_wrap_width(options.width);
        let formatter = MessageFormatter::new(self.emoji, render);
        let channel = self.config.channel_id.clone();

        let mut out = io::stdout();
        let shown = show_history(
            self.slack,
            &mut *self.config,
            &channel,
            query,
            &formatter,
            &mut out,
        )
        .await?;
        debug!(shown, "show finished");
        Ok(())
    }

    pub async fn handle_send(&self, message: &str, thread_ts: Option<&str>) -> Result<()> {
        self.slack
            .send_message(&self.config.channel_id, message, thread_ts)
            .await?;
        println!("Message sent successfully");
        Ok(())
    }

    pub async fn handle_edit(&self, ts: Option<&str>, message: Option<&str>) -> Result<()> {
        let (ts, message) = match (non_empty(ts), message) {
            (Some(ts), Some(message)) => (ts, message),
            _ => {
                return Err(SlackError::Usage(
                    "ts (timestamp) and message are required".to_string(),
                ))
            }
        };
        self.slack
            .update_message(&self.config.channel_id, ts, message)
            .await?;
        println!("Message updated successfully");
        Ok(())
    }

    pub async fn handle_delete(&self, ts: Option<&str>) -> Result<()> {
        let ts = non_empty(ts)
            .ok_or_else(|| SlackError::Usage("ts (timestamp) is required".to_string()))?;
        self.slack.delete_message(&self.config.channel_id, ts).await?;
        println!("Message deleted successfully");
        Ok(())
    }

    pub async fn handle_emoji(
        &self,
        ts: Option<&str>,
        emoji: Option<&str>,
        add: Option<&str>,
        del: Option<&str>,
    ) -> Result<()> {
        match plan_reaction(ts, emoji, add, del, &self.config.default_emoji)? {
            ReactionAction::List => write_emoji_list(self.emoji, &mut io::stdout())?,
            ReactionAction::Add { ts, name } => {
                self.slack
                    .add_reaction(&self.config.channel_id, &ts, &name)
                    .await?;
                println!("Reaction added successfully");
            }
            ReactionAction::Remove { ts, name } => {
                self.slack
                    .remove_reaction(&self.config.channel_id, &ts, &name)
                    .await?;
                println!("Reaction removed successfully");
            }
        }
        Ok(())
    }

    pub async fn handle_upload(&self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            SlackError::Upload(format!("could not read {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| SlackError::Usage(format!("not a file path: {}", path.display())))?;

        let ticket = self
            .slack
            .get_upload_url(&file_name, bytes.len() as u64)
            .await?;
        self.slack
            .upload_bytes(&ticket.upload_url, &file_name, bytes)
            .await?;
        let uploaded = self
            .slack
            .complete_upload(&ticket.file_id, &file_name, &self.config.channel_id)
            .await?;

        info!(file_id = %ticket.file_id, url = %uploaded.url_private, "upload complete");
        println!("File uploaded and shared to Slack: {}", uploaded.permalink);
        Ok(())
    }

    pub async fn handle_download(&self, url: &str) -> Result<()> {
        let target = self.download_into(url, Path::new(".")).await?;
        let name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("File downloaded successfully: {name}");
        Ok(())
    }

    /// Download `url` into `dir` under a free name and return the saved path.
    pub async fn download_into(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let target = unique_path(dir, &download_file_name(url));
        let response = self.slack.download(url).await?;
        save_stream(response.bytes_stream(), &target).await?;
        Ok(target)
    }
}

/// Write a byte stream to `target` through a `.part` file, so a failed
/// transfer never leaves a truncated file under the final name.
pub async fn save_stream<S, B, E>(stream: S, target: &Path) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    SlackError: From<E>,
{
    let partial = partial_path(target);
    match write_chunks(stream, &partial).await {
        Ok(()) => {
            tokio::fs::rename(&partial, target).await?;
            Ok(())
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!(path = %partial.display(), error = %cleanup, "could not remove partial download");
            }
            Err(e)
        }
    }
}

async fn write_chunks<S, B, E>(stream: S, path: &Path) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    SlackError: From<E>,
{
    pin_mut!(stream);
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = stream.next().await {
        file.write_all(chunk?.as_ref()).await?;
    }
    file.flush().await?;
    Ok(())
}

fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_DOWNLOAD_NAME.to_string());
    target.with_file_name(format!(".{name}.part"))
}

/// Page through history, printing each page as soon as its authors and
/// threads are resolved. Returns the number of messages shown.
pub async fn show_history<A, S, Tz, W>(
    api: &A,
    store: &mut S,
    channel: &str,
    query: HistoryQuery,
    formatter: &MessageFormatter<'_, Tz>,
    out: &mut W,
) -> Result<usize>
where
    A: ChatApi,
    S: UserNameStore,
    Tz: TimeZone,
    Tz::Offset: Display,
    W: Write,
{
    let filter = query.filter.clone();
    let mut paginator = Paginator::new(channel, query);
    let mut resolver = NameResolver::new(store);

    while let Some(messages) = paginator.next_page(api).await? {
        let entries =
            build_entries(api, channel, filter.as_deref(), &mut resolver, messages).await;
        for entry in &entries {
            for line in formatter.format_entry(entry) {
                writeln!(out, "{line}")?;
            }
        }
        out.flush()?;
    }
    Ok(paginator.accepted())
}

/// Pick the `show` limit. A positional value wins over `--limit`; an unparsable one
/// falls back to the configured default and reports `true`.
pub fn resolve_limit(positional: Option<&str>, flag: Option<usize>, default: usize) -> (usize, bool) {
    match positional {
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(n) => (usize::try_from(n).unwrap_or(0), false),
            Err(_) => (default, true),
        },
        None => (flag.unwrap_or(default), false),
    }
}

/// `--add` beats `--del`; with neither, a bare emoji name adds and nothing lists.
pub fn plan_reaction(
    ts: Option<&str>,
    emoji: Option<&str>,
    add: Option<&str>,
    del: Option<&str>,
    default_emoji: &str,
) -> Result<ReactionAction> {
    let require_ts = || {
        non_empty(ts)
            .map(str::to_string)
            .ok_or_else(|| SlackError::Usage("ts (timestamp) is required".to_string()))
    };

    if let Some(name) = add {
        let name = non_empty(Some(name))
            .or_else(|| non_empty(Some(default_emoji)))
            .unwrap_or(FALLBACK_REACTION);
        return Ok(ReactionAction::Add {
            ts: require_ts()?,
            name: name.to_string(),
        });
    }
    if let Some(name) = del {
        let name = non_empty(Some(name)).unwrap_or(FALLBACK_REACTION);
        return Ok(ReactionAction::Remove {
            ts: require_ts()?,
            name: name.to_string(),
        });
    }
    match non_empty(emoji) {
        Some(name) => Ok(ReactionAction::Add {
            ts: require_ts()?,
            name: name.to_string(),
        }),
        None => Ok(ReactionAction::List),
    }
}

pub fn write_emoji_list<W: Write>(emoji: &EmojiTable, out: &mut W) -> Result<()> {
    writeln!(out, "Emoji List:")?;
    for (name, code) in emoji.entries() {
        match decode_code_point(code) {
            Ok(glyph) => writeln!(out, "{name}: {glyph}")?,
            Err(_) => writeln!(out, "{name}: {code} (failed to convert)")?,
        }
    }
    Ok(())
}

/// Last path segment of a download URL, percent-decoded. Anything that could
/// escape the target directory falls back to `download`.
pub fn download_file_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .map(|segment| {
            let decoded = percent_decode_str(&segment)
                .decode_utf8()
                .ok()
                .map(|name| name.into_owned());
            decoded.unwrap_or(segment)
        })
        .filter(|name| {
            !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
        })
        .unwrap_or_else(|| FALLBACK_DOWNLOAD_NAME.to_string())
}

/// `dir/name`, or the first free `stem(N).ext` when that already exists.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem}({n}).{ext}")),
            None => dir.join(format!("{stem}({n})")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
