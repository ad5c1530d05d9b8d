use tracing::debug;

use crate::dates::TimeRange;
use crate::error::Result;
use crate::persistence::UserNameStore;
use crate::resolver::NameResolver;
use crate::slack::{ChatApi, HistoryRequest, SlackMessage};
use crate::thread::expand_thread;

/// Selection constraints for `show`. Search only affects rendering, so it is not here.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Count of messages that pass the filters, not the raw page size.
    pub limit: usize,
    pub range: Option<TimeRange>,
    pub filter: Option<String>,
    pub files_only: bool,
}

impl HistoryQuery {
    pub fn matches(&self, message: &SlackMessage) -> bool {
        if !text_matches(&message.text, self.filter.as_deref()) {
            return false;
        }
        !(self.files_only && message.files.is_empty())
    }
}

/// Substring filter shared by parents and thread replies.
pub fn text_matches(text: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(term) if !term.is_empty() => text.contains(term),
        _ => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaginatorState {
    Fetching,
    Done,
}

/// Cursor-driven walk over `conversations.history`, yielding accepted messages
/// page by page in chronological order.
pub struct Paginator {
    channel: String,
    query: HistoryQuery,
    cursor: Option<String>,
    accepted: usize,
    state: PaginatorState,
}

impl Paginator {
    pub fn new(channel: &str, query: HistoryQuery) -> Self {
        let state = if query.limit == 0 {
            PaginatorState::Done
        } else {
            PaginatorState::Fetching
        };
        Self {
            channel: channel.to_string(),
            query,
            cursor: None,
            accepted: 0,
            state,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == PaginatorState::Done
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Fetch and filter the next page. `Ok(None)` once the walk is over.
    pub async fn next_page<A: ChatApi>(&mut self, api: &A) -> Result<Option<Vec<SlackMessage>>> {
        if self.is_done() {
            return Ok(None);
        }

        let request = HistoryRequest {
            channel: self.channel.clone(),
            limit: self.query.limit,
            oldest: self.query.range.map(|r| r.oldest),
            latest: self.query.range.map(|r| r.latest),
            cursor: self.cursor.take(),
        };
        let page = match api.history(&request).await {
            Ok(page) => page,
            Err(e) => {
                self.state = PaginatorState::Done;
                return Err(e);
            }
        };

        let mut messages = page.messages;
        messages.reverse();

        let mut accepted = Vec::new();
        for message in messages {
            if self.accepted >= self.query.limit {
                break;
            }
            if !self.query.matches(&message) {
                continue;
            }
            accepted.push(message);
            self.accepted += 1;
        }

        // Without a time range the result is a single page, whatever has_more says.
        let continues = self.accepted < self.query.limit
            && page.has_more
            && page.next_cursor.is_some()
            && self.query.range.is_some();
        if continues {
            self.cursor = page.next_cursor;
        } else {
            self.state = PaginatorState::Done;
        }
        debug!(
            accepted = accepted.len(),
            total = self.accepted,
            continues,
            "history page processed"
        );

        Ok(Some(accepted))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub message: SlackMessage,
    pub author: String,
}

/// An accepted message with its resolved author and expanded thread.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEntry {
    pub message: SlackMessage,
    pub author: String,
    pub replies: Vec<Reply>,
}

/// Resolve authors and expand threads for one page of accepted messages.
pub async fn build_entries<A: ChatApi, S: UserNameStore>(
    api: &A,
    channel: &str,
    filter: Option<&str>,
    resolver: &mut NameResolver<'_, S>,
    messages: Vec<SlackMessage>,
) -> Vec<MessageEntry> {
    let mut entries = Vec::with_capacity(messages.len());
    for message in messages {
        let author = resolver.resolve(api, message.author_id()).await;
        let replies = match message.thread_id() {
            Some(thread_ts) => expand_thread(api, channel, thread_ts, filter, resolver).await,
            None => Vec::new(),
        };
        entries.push(MessageEntry {
            message,
            author,
            replies,
        });
    }
    entries
}
