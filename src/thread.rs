use tracing::warn;

use crate::history::{text_matches, Reply};
use crate::persistence::UserNameStore;
use crate::resolver::NameResolver;
use crate::slack::ChatApi;

/// Fetch the replies under `thread_ts`, dropping the parent and anything the filter
/// rejects. Best effort: a failed fetch yields no replies.
pub async fn expand_thread<A: ChatApi, S: UserNameStore>(
    api: &A,
    channel: &str,
    thread_ts: &str,
    filter: Option<&str>,
    resolver: &mut NameResolver<'_, S>,
) -> Vec<Reply> {
    let messages = match api.replies(channel, thread_ts).await {
        Ok(messages) => messages,
        Err(e) => {
            warn!(thread_ts, error = %e, "failed to load thread replies");
            return Vec::new();
        }
    };

    let mut replies = Vec::new();
    for message in messages {
        if message.ts == thread_ts || !text_matches(&message.text, filter) {
            continue;
        }
        let author = resolver.resolve(api, message.author_id()).await;
        replies.push(Reply { message, author });
    }
    replies
}
