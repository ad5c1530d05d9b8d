use chrono::{Local, TimeZone};
use std::fmt::Display;
use unicode_width::UnicodeWidthStr;

use crate::emoji::EmojiTable;
use crate::history::MessageEntry;
use crate::slack::{SlackFile, SlackMessage};

const REPLY_PREFIX: &str = "  \u{21B3} ";
const EDITED_MARKER: &str = " (edited)";

/// Color strategy for one part of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Ansi,
    Plain,
}

impl Palette {
    fn text(self) -> &'static str {
        match self {
            Palette::Ansi => "\x1b[39m",
            Palette::Plain => "",
        }
    }

    fn highlight(self) -> &'static str {
        match self {
            Palette::Ansi => "\x1b[91m",
            Palette::Plain => "",
        }
    }

    fn reset(self) -> &'static str {
        match self {
            Palette::Ansi => "\x1b[0m",
            Palette::Plain => "",
        }
    }

    fn file_name(self, is_image: bool) -> &'static str {
        match (self, is_image) {
            (Palette::Ansi, true) => "\x1b[91m",
            (Palette::Ansi, false) => "\x1b[94m",
            (Palette::Plain, _) => "",
        }
    }

    fn url(self) -> &'static str {
        match self {
            Palette::Ansi => "\x1b[36m",
            Palette::Plain => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub search: Option<String>,
    pub filter: Option<String>,
    pub text_palette: Palette,
    /// Plain while searching so file names and URLs stay greppable.
    pub file_palette: Palette,
    pub wrap_width: Option<usize>,
}

impl RenderOptions {
    pub fn new(search: Option<String>, filter: Option<String>, color: bool) -> Self {
        let search = search.filter(|s| !s.is_empty());
        let filter = filter.filter(|s| !s.is_empty());
        let text_palette = if color { Palette::Ansi } else { Palette::Plain };
        let file_palette = if search.is_some() { Palette::Plain } else { text_palette };
        Self {
            search,
            filter,
            text_palette,
            file_palette,
            wrap_width: None,
        }
    }

    pub fn with_wrap_width(mut self, width: Option<usize>) -> Self {
        self.wrap_width = width.filter(|w| *w > 0);
        self
    }

    /// Search wins over filter; only one of them is ever highlighted.
    pub fn highlight_term(&self) -> Option<&str> {
        self.search.as_deref().or(self.filter.as_deref())
    }
}

pub struct MessageFormatter<'a, Tz: TimeZone = Local> {
    emoji: &'a EmojiTable,
    options: RenderOptions,
    tz: Tz,
}

impl<'a> MessageFormatter<'a, Local> {
    pub fn new(emoji: &'a EmojiTable, options: RenderOptions) -> Self {
        Self::with_timezone(emoji, options, Local)
    }
}

impl<'a, Tz> MessageFormatter<'a, Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    pub fn with_timezone(emoji: &'a EmojiTable, options: RenderOptions, tz: Tz) -> Self {
        Self { emoji, options, tz }
    }

    /// Lines for a message followed by its replies.
    pub fn format_entry(&self, entry: &MessageEntry) -> Vec<String> {
        let mut lines = self.format_message("", &entry.message, &entry.author, "  ");
        for reply in &entry.replies {
            lines.extend(self.format_message(REPLY_PREFIX, &reply.message, &reply.author, "    "));
        }
        lines
    }

    fn format_message(
        &self,
        prefix: &str,
        message: &SlackMessage,
        author: &str,
        file_indent: &str,
    ) -> Vec<String> {
        let text = self.options.text_palette.text();
        let header = format!(
            "{prefix}{} ({}) {author}: ",
            message.ts,
            self.format_timestamp(&message.ts)
        );
        let indent = " ".repeat(UnicodeWidthStr::width(header.as_str()));
        let available = self
            .options
            .wrap_width
            .map(|width| width.saturating_sub(indent.len()).max(1));

        let edited = if message.is_edited() { EDITED_MARKER } else { "" };
        let reactions = self.emoji.render_reactions(&message.reactions);

        let mut lines = Vec::new();
        for (i, raw_line) in message.text.split('\n').enumerate() {
            let highlighted = self.highlight(raw_line);
            let segments = match available {
                Some(width) => wrap_visible(&highlighted, width),
                None => vec![highlighted],
            };
            for (j, segment) in segments.into_iter().enumerate() {
                if i == 0 && j == 0 {
                    lines.push(format!("{header}{text}{segment}{edited}{reactions}"));
                } else {
                    lines.push(format!("{indent}{text}{segment}"));
                }
            }
        }

        for file in &message.files {
            lines.push(self.format_file(file_indent, file));
        }
        lines
    }

    fn format_file(&self, indent: &str, file: &SlackFile) -> String {
        let palette = self.options.file_palette;
        if palette == Palette::Plain {
            return format!("{indent}- File: {} ({})", file.name, file.url_private);
        }
        format!(
            "{indent}- File: {}{}{} ({}{}{})",
            palette.file_name(file.is_image()),
            file.name,
            palette.reset(),
            palette.url(),
            file.url_private,
            palette.reset()
        )
    }

    fn highlight(&self, line: &str) -> String {
        let palette = self.options.text_palette;
        match self.options.highlight_term() {
            Some(term) if palette == Palette::Ansi => line.replace(
                term,
                &format!(
                    "{}{term}{}{}",
                    palette.highlight(),
                    palette.reset(),
                    palette.text()
                ),
            ),
            _ => line.to_string(),
        }
    }

    /// The seconds part of a message ts as `YYYY-MM-DD HH:MM:SS`.
    pub fn format_timestamp(&self, ts: &str) -> String {
        let secs = ts.parse::<f64>().map(|f| f.trunc() as i64).unwrap_or(0);
        self.tz
            .timestamp_opt(secs, 0)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| ts.to_string())
    }
}

/// Terminal width of `s`, ignoring ANSI escape sequences.
pub fn visible_width(s: &str) -> usize {
    units(s)
        .into_iter()
        .map(unit_width)
        .sum()
}

fn unit_width(unit: &str) -> usize {
    if unit.starts_with('\x1b') {
        0
    } else {
        UnicodeWidthStr::width(unit)
    }
}

/// Split into single chars, keeping each escape sequence whole.
fn units(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = s.char_indices().peekable();
    while let Some((start, ch)) = iter.next() {
        let mut end = start + ch.len_utf8();
        if ch == '\x1b' && matches!(iter.peek(), Some((_, '['))) {
            while let Some((idx, next)) = iter.next() {
                end = idx + next.len_utf8();
                if idx > start + 1 && ('@'..='~').contains(&next) {
                    break;
                }
            }
        }
        out.push(&s[start..end]);
    }
    out
}

/// Word-wrap one line to `width` columns. Long words are split by character;
/// escape sequences are zero-width and never split.
pub fn wrap_visible(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);

    // (token, is_space); escape sequences always ride on a word token
    let mut tokens: Vec<(String, bool)> = Vec::new();
    let mut buf = String::new();
    let mut buf_is_space: Option<bool> = None;
    for unit in units(line) {
        let is_space = !unit.starts_with('\x1b') && unit.chars().all(char::is_whitespace);
        if buf_is_space.is_some() && buf_is_space != Some(is_space) {
            tokens.push((std::mem::take(&mut buf), buf_is_space.unwrap_or(false)));
        }
        buf.push_str(unit);
        buf_is_space = Some(is_space);
    }
    if let Some(is_space) = buf_is_space {
        tokens.push((buf, is_space));
    }

    let mut out = LineBuilder::new(width);
    for (token, is_space) in tokens {
        let token_width = visible_width(&token);
        if is_space {
            if out.has_content && token_width <= out.remaining {
                out.push(&token, token_width);
            }
            continue;
        }

        if token_width <= out.remaining {
            out.push(&token, token_width);
            continue;
        }

        if out.has_content {
            out.break_line();
        }

        if token_width <= out.remaining {
            out.push(&token, token_width);
            continue;
        }

        for unit in units(&token) {
            let w = unit_width(unit);
            if w > out.remaining && out.has_content {
                out.break_line();
            }
            out.push(unit, w);
        }
    }
    out.finish()
}

/// Accumulates wrapped lines. A color still active at a break is closed at
/// the end of the line and reopened at the start of the next.
struct LineBuilder {
    width: usize,
    lines: Vec<String>,
    current: String,
    remaining: usize,
    has_content: bool,
    active: Option<String>,
}

impl LineBuilder {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            current: String::new(),
            remaining: width,
            has_content: false,
            active: None,
        }
    }

    fn push(&mut self, text: &str, width: usize) {
        for unit in units(text) {
            if let Some(params) = sgr_params(unit) {
                self.active = match params {
                    "" | "0" | "39" => None,
                    _ => Some(unit.to_string()),
                };
            }
        }
        self.current.push_str(text);
        self.remaining = self.remaining.saturating_sub(width);
        self.has_content |= width > 0;
    }

    fn break_line(&mut self) {
        if self.active.is_some() {
            self.current.push_str(SGR_RESET);
        }
        self.lines.push(std::mem::take(&mut self.current));
        if let Some(active) = &self.active {
            self.current.push_str(active);
        }
        self.remaining = self.width;
        self.has_content = false;
    }

    fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() || self.lines.is_empty() {
            self.lines.push(self.current);
        }
        self.lines
    }
}

const SGR_RESET: &str = "\x1b[0m";

/// Parameters of an SGR (`ESC [ ... m`) sequence.
fn sgr_params(unit: &str) -> Option<&str> {
    unit.strip_prefix("\x1b[")?.strip_suffix('m')
}
