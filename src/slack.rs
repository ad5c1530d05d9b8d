use reqwest::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, SlackError};

/// Slack caps `conversations.history` pages at 999 messages.
pub const MAX_PAGE_SIZE: usize = 999;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SlackReaction {
    pub name: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SlackFile {
    #[serde(default)]
    pub url_private: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mimetype: String,
}

impl SlackFile {
    pub fn is_image(&self) -> bool {
        self.mimetype.starts_with("image/")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct EditedMarker {
    #[serde(default)]
    pub user: String,
}

/// A channel message or thread reply as returned by the history endpoints.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SlackMessage {
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Present on thread parents (and on the replies themselves).
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reactions: Vec<SlackReaction>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
    #[serde(default)]
    pub edited: Option<EditedMarker>,
}

impl SlackMessage {
    pub fn author_id(&self) -> &str {
        self.user.as_deref().unwrap_or("")
    }

    pub fn is_edited(&self) -> bool {
        self.edited
            .as_ref()
            .map_or(false, |edited| !edited.user.is_empty())
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_ts.as_deref().filter(|ts| !ts.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryRequest {
    pub channel: String,
    pub limit: usize,
    pub oldest: Option<i64>,
    pub latest: Option<i64>,
    pub cursor: Option<String>,
}

impl HistoryRequest {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("channel", self.channel.clone()),
            ("limit", self.limit.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        if let (Some(oldest), Some(latest)) = (self.oldest, self.latest) {
            query.push(("oldest", oldest.to_string()));
            query.push(("latest", latest.to_string()));
        }
        if let Some(cursor) = self.cursor.as_ref().filter(|c| !c.is_empty()) {
            query.push(("cursor", cursor.clone()));
        }
        query
    }
}

/// One page of `conversations.history`, newest message first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    pub messages: Vec<SlackMessage>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ConversationHistoryResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

impl ConversationHistoryResponse {
    fn into_page(self) -> Result<HistoryPage> {
        if !self.ok {
            return Err(SlackError::Api(
                self.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        let next_cursor = self
            .response_metadata
            .map(|m| m.next_cursor)
            .filter(|c| !c.trim().is_empty());
        Ok(HistoryPage {
            messages: self.messages,
            has_more: self.has_more,
            next_cursor,
        })
    }
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    ok: bool,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Deserialize, Default)]
struct UserProfile {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct User {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<UserProfile>,
}

impl User {
    fn display_name(self) -> Option<String> {
        let non_empty = |s: Option<String>| s.filter(|n| !n.trim().is_empty());
        non_empty(self.real_name)
            .or_else(|| non_empty(self.profile.and_then(|p| p.display_name)))
            .or_else(|| non_empty(self.name))
    }
}

#[derive(Deserialize)]
struct UploadUrlResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    upload_url: String,
    #[serde(default)]
    file_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadTicket {
    pub upload_url: String,
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub permalink: String,
    pub url_private: String,
}

/// The read side of the Slack API the history pipeline depends on.
#[allow(async_fn_in_trait)]
pub trait ChatApi {
    async fn history(&self, request: &HistoryRequest) -> Result<HistoryPage>;

    /// Every message of a thread, the parent included.
    async fn replies(&self, channel: &str, thread_ts: &str) -> Result<Vec<SlackMessage>>;

    /// `Ok(None)` when Slack answers but has no usable name for the user.
    async fn user_name(&self, user_id: &str) -> Result<Option<String>>;
}

#[derive(Clone)]
pub struct SlackClient {
    http: HttpClient,
    base_url: String,
    bot_token: String,
    user_token: String,
}

impl SlackClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.slack_bot_token.clone(),
            user_token: config.slack_user_token.clone(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn fetch<T: DeserializeOwned>(&self, method: &str, request: RequestBuilder) -> Result<T> {
        debug!(method, "calling slack api");
        let body = request.send().await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_json(&self, method: &str, payload: Value) -> Result<Value> {
        let request = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.bot_token)
            .json(&payload);
        let response: Value = self.fetch(method, request).await?;
        check_ok(response)
    }

    pub async fn send_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Result<()> {
        let mut payload = serde_json::json!({
            "channel": channel,
            "text": text,
        });
        if let Some(ts) = thread_ts.filter(|ts| !ts.is_empty()) {
            payload["thread_ts"] = Value::String(ts.to_string());
        }
        self.post_json("chat.postMessage", payload).await?;
        Ok(())
    }

    pub async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<()> {
        let payload = serde_json::json!({
            "channel": channel,
            "ts": ts,
            "text": text,
        });
        self.post_json("chat.update", payload).await?;
        Ok(())
    }

    pub async fn delete_message(&self, channel: &str, ts: &str) -> Result<()> {
        let payload = serde_json::json!({
            "channel": channel,
            "ts": ts,
        });
        self.post_json("chat.delete", payload).await?;
        Ok(())
    }

    pub async fn add_reaction(&self, channel: &str, timestamp: &str, emoji: &str) -> Result<()> {
        let payload = serde_json::json!({
            "channel": channel,
            "timestamp": timestamp,
            "name": emoji,
        });
        self.post_json("reactions.add", payload).await?;
        Ok(())
    }

    pub async fn remove_reaction(&self, channel: &str, timestamp: &str, emoji: &str) -> Result<()> {
        let payload = serde_json::json!({
            "channel": channel,
            "timestamp": timestamp,
            "name": emoji,
        });
        self.post_json("reactions.remove", payload).await?;
        Ok(())
    }

    /// First upload step: reserve a file id and an upload URL.
    pub async fn get_upload_url(&self, file_name: &str, length: u64) -> Result<UploadTicket> {
        let method = "files.getUploadURLExternal";
        let request = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.bot_token)
            .form(&[("filename", file_name.to_string()), ("length", length.to_string())]);
        let response: UploadUrlResponse = self.fetch(method, request).await?;
        if !response.ok {
            return Err(SlackError::Api(
                response.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        if response.upload_url.is_empty() || response.file_id.is_empty() {
            return Err(SlackError::Upload("upload URL not found in response".to_string()));
        }
        Ok(UploadTicket {
            upload_url: response.upload_url,
            file_id: response.file_id,
        })
    }

    /// Second upload step: push the bytes to the reserved URL.
    pub async fn upload_bytes(&self, upload_url: &str, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        debug!(upload_url, "uploading file bytes");
        let response = self.http.post(upload_url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SlackError::Upload(format!("upload returned status {}", status.as_u16())));
        }
        Ok(())
    }

    /// Third upload step: share the uploaded file into the channel.
    pub async fn complete_upload(&self, file_id: &str, title: &str, channel: &str) -> Result<UploadedFile> {
        let payload = serde_json::json!({
            "files": [{ "id": file_id, "title": title }],
            "channel_id": channel,
        });
        let response = self.post_json("files.completeUploadExternal", payload).await?;
        parse_uploaded_file(&response)
    }

    /// Start a download of a private file URL with the user token.
    pub async fn download(&self, file_url: &str) -> Result<reqwest::Response> {
        debug!(file_url, "downloading file");
        let response = self
            .http
            .get(file_url)
            .bearer_auth(&self.user_token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }
}

impl ChatApi for SlackClient {
    async fn history(&self, request: &HistoryRequest) -> Result<HistoryPage> {
        let method = "conversations.history";
        let builder = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.bot_token)
            .query(&request.query());
        let response: ConversationHistoryResponse = self.fetch(method, builder).await?;
        response.into_page()
    }

    async fn replies(&self, channel: &str, thread_ts: &str) -> Result<Vec<SlackMessage>> {
        let method = "conversations.replies";
        let mut all_messages: Vec<SlackMessage> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("channel", channel.to_string()), ("ts", thread_ts.to_string())];
            if let Some(ref c) = cursor {
                query.push(("cursor", c.clone()));
            }
            let builder = self
                .http
                .get(self.url(method))
                .bearer_auth(&self.bot_token)
                .query(&query);
            let response: ConversationHistoryResponse = self.fetch(method, builder).await?;
            let page = response.into_page()?;
            all_messages.extend(page.messages);

            match page.next_cursor {
                Some(c) if page.has_more => cursor = Some(c),
                _ => break,
            }
        }

        Ok(all_messages)
    }

    async fn user_name(&self, user_id: &str) -> Result<Option<String>> {
        let method = "users.info";
        let builder = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.bot_token)
            .query(&[("user", user_id)]);
        let response: UserInfoResponse = self.fetch(method, builder).await?;
        if !response.ok {
            return Ok(None);
        }
        Ok(response.user.and_then(User::display_name))
    }
}

fn check_ok(response: Value) -> Result<Value> {
    if response.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
        return Ok(response);
    }
    let error = response
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown_error")
        .to_string();
    Err(SlackError::Api(error))
}

fn parse_uploaded_file(response: &Value) -> Result<UploadedFile> {
    let file = response
        .get("files")
        .and_then(|files| files.as_array())
        .and_then(|files| files.first())
        .ok_or_else(|| SlackError::Upload("file information not found in response".to_string()))?;
    let field = |name: &str| file.get(name).and_then(|v| v.as_str()).map(str::to_string);
    match (field("permalink"), field("url_private")) {
        (Some(permalink), Some(url_private)) => Ok(UploadedFile {
            permalink,
            url_private,
        }),
        _ => Err(SlackError::Upload("file URLs not found in response".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_query_includes_bounds_and_cursor() {
        let request = HistoryRequest {
            channel: "C1".into(),
            limit: 5000,
            oldest: Some(1_704_067_200),
            latest: Some(1_704_153_599),
            cursor: Some("bmV4dA==".into()),
        };
        assert_eq!(
            request.query(),
            vec![
                ("channel", "C1".to_string()),
                ("limit", "999".to_string()),
                ("oldest", "1704067200".to_string()),
                ("latest", "1704153599".to_string()),
                ("cursor", "bmV4dA==".to_string()),
            ]
        );
    }

    #[test]
    fn history_query_without_range_or_cursor() {
        let request = HistoryRequest {
            channel: "C1".into(),
            limit: 0,
            ..Default::default()
        };
        assert_eq!(
            request.query(),
            vec![("channel", "C1".to_string()), ("limit", "1".to_string())]
        );
    }

    #[test]
    fn history_response_decodes_messages_and_cursor() {
        let body = r#"{
            "ok": true,
            "has_more": true,
            "messages": [
                {
                    "ts": "1704067300.000200",
                    "user": "U1",
                    "text": "second",
                    "thread_ts": "1704067300.000200",
                    "reactions": [{"name": "eyes", "count": 2, "users": ["U1", "U2"]}],
                    "files": [{"url_private": "https://files/x.png", "name": "x.png", "mimetype": "image/png"}],
                    "edited": {"user": "U1", "ts": "1704067400.000000"}
                },
                {"ts": "1704067200.000100", "text": "first", "bot_id": "B1"}
            ],
            "response_metadata": {"next_cursor": "abc"}
        }"#;
        let response: ConversationHistoryResponse = serde_json::from_str(body).expect("decode");
        let page = response.into_page().expect("ok page");
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
        assert_eq!(page.messages.len(), 2);

        let first = &page.messages[0];
        assert_eq!(first.author_id(), "U1");
        assert!(first.is_edited());
        assert_eq!(first.thread_id(), Some("1704067300.000200"));
        assert!(first.files[0].is_image());
        assert_eq!(first.reactions[0].users, vec!["U1", "U2"]);

        let second = &page.messages[1];
        assert_eq!(second.author_id(), "");
        assert!(!second.is_edited());
        assert_eq!(second.thread_id(), None);
    }

    #[test]
    fn history_error_payload_is_an_api_error() {
        let response: ConversationHistoryResponse =
            serde_json::from_str(r#"{"ok": false, "error": "channel_not_found"}"#).expect("decode");
        match response.into_page() {
            Err(SlackError::Api(error)) => assert_eq!(error, "channel_not_found"),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn blank_cursor_means_no_next_page() {
        let response: ConversationHistoryResponse = serde_json::from_str(
            r#"{"ok": true, "messages": [], "response_metadata": {"next_cursor": ""}}"#,
        )
        .expect("decode");
        assert_eq!(response.into_page().expect("page").next_cursor, None);
    }

    #[test]
    fn user_display_name_preference() {
        let user: User = serde_json::from_str(
            r#"{"name": "ghopper", "real_name": "Grace Hopper", "profile": {"display_name": "grace"}}"#,
        )
        .expect("decode");
        assert_eq!(user.display_name().as_deref(), Some("Grace Hopper"));

        let user: User = serde_json::from_str(
            r#"{"name": "ghopper", "real_name": "", "profile": {"display_name": "grace"}}"#,
        )
        .expect("decode");
        assert_eq!(user.display_name().as_deref(), Some("grace"));

        let user: User = serde_json::from_str(r#"{"real_name": " "}"#).expect("decode");
        assert_eq!(user.display_name(), None);
    }

    #[test]
    fn check_ok_surfaces_slack_error() {
        let err = check_ok(serde_json::json!({"ok": false, "error": "message_not_found"}))
            .expect_err("not ok");
        assert_eq!(err.to_string(), "api error: message_not_found");
        assert!(check_ok(serde_json::json!({"ok": true})).is_ok());
    }

    #[test]
    fn uploaded_file_requires_both_urls() {
        let complete = serde_json::json!({
            "ok": true,
            "files": [{"id": "F1", "permalink": "https://team/p/F1", "url_private": "https://files/F1"}]
        });
        let file = parse_uploaded_file(&complete).expect("file");
        assert_eq!(file.permalink, "https://team/p/F1");

        let missing = serde_json::json!({"ok": true, "files": [{"id": "F1", "permalink": "p"}]});
        assert!(matches!(parse_uploaded_file(&missing), Err(SlackError::Upload(_))));

        let empty = serde_json::json!({"ok": true, "files": []});
        assert!(matches!(parse_uploaded_file(&empty), Err(SlackError::Upload(_))));
    }

    mod http {
        use super::super::*;
        use crate::config::test_config;
        use httpmock::prelude::*;
        use serde_json::json;

        const BOT_AUTH: &str = "Bearer xoxb-test";
        const USER_AUTH: &str = "Bearer xoxp-test";

        fn client(server: &MockServer) -> SlackClient {
            SlackClient::new(&test_config(&server.base_url())).expect("client")
        }

        fn without_cursor(req: &HttpMockRequest) -> bool {
            !req
                .query_params
                .as_ref()
                .map_or(false, |params| params.iter().any(|(key, _)| key == "cursor"))
        }

        #[tokio::test]
        async fn history_sends_bot_token_bounds_and_cursor() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(GET)
                    .path("/conversations.history")
                    .header("authorization", BOT_AUTH)
                    .query_param("channel", "C1")
                    .query_param("limit", "2")
                    .query_param("oldest", "1704067200")
                    .query_param("latest", "1704153599")
                    .query_param("cursor", "c1");
                then.status(200).json_body(json!({
                    "ok": true,
                    "has_more": true,
                    "messages": [{"ts": "1704067201.000100", "user": "U1", "text": "hi"}],
                    "response_metadata": {"next_cursor": "c2"}
                }));
            });

            let page = client(&server)
                .history(&HistoryRequest {
                    channel: "C1".into(),
                    limit: 2,
                    oldest: Some(1_704_067_200),
                    latest: Some(1_704_153_599),
                    cursor: Some("c1".into()),
                })
                .await
                .expect("history");

            mock.assert();
            assert_eq!(page.messages.len(), 1);
            assert_eq!(page.messages[0].text, "hi");
            assert!(page.has_more);
            assert_eq!(page.next_cursor.as_deref(), Some("c2"));
        }

        #[tokio::test]
        async fn history_not_ok_is_api_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/conversations.history");
                then.status(200)
                    .json_body(json!({"ok": false, "error": "channel_not_found"}));
            });

            let result = client(&server)
                .history(&HistoryRequest {
                    channel: "C1".into(),
                    limit: 20,
                    ..Default::default()
                })
                .await;
            assert!(matches!(result, Err(SlackError::Api(e)) if e == "channel_not_found"));
        }

        #[tokio::test]
        async fn replies_follow_cursor_until_exhausted() {
            let server = MockServer::start();
            let first = server.mock(|when, then| {
                when.method(GET)
                    .path("/conversations.replies")
                    .header("authorization", BOT_AUTH)
                    .query_param("channel", "C1")
                    .query_param("ts", "100.000001")
                    .matches(without_cursor);
                then.status(200).json_body(json!({
                    "ok": true,
                    "has_more": true,
                    "messages": [
                        {"ts": "100.000001", "user": "U1", "text": "parent"},
                        {"ts": "101.000001", "user": "U2", "text": "one"}
                    ],
                    "response_metadata": {"next_cursor": "page2"}
                }));
            });
            let second = server.mock(|when, then| {
                when.method(GET)
                    .path("/conversations.replies")
                    .query_param("ts", "100.000001")
                    .query_param("cursor", "page2");
                then.status(200).json_body(json!({
                    "ok": true,
                    "has_more": false,
                    "messages": [{"ts": "102.000001", "user": "U1", "text": "two"}]
                }));
            });

            let replies = client(&server)
                .replies("C1", "100.000001")
                .await
                .expect("replies");

            first.assert();
            second.assert();
            let texts: Vec<&str> = replies.iter().map(|m| m.text.as_str()).collect();
            assert_eq!(texts, vec!["parent", "one", "two"]);
        }

        #[tokio::test]
        async fn user_name_prefers_real_name() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(GET)
                    .path("/users.info")
                    .header("authorization", BOT_AUTH)
                    .query_param("user", "U1");
                then.status(200).json_body(json!({
                    "ok": true,
                    "user": {"name": "ghopper", "real_name": "Grace Hopper"}
                }));
            });

            let name = client(&server).user_name("U1").await.expect("lookup");
            mock.assert();
            assert_eq!(name.as_deref(), Some("Grace Hopper"));
        }

        #[tokio::test]
        async fn user_lookup_not_ok_is_no_name() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/users.info").query_param("user", "U404");
                then.status(200)
                    .json_body(json!({"ok": false, "error": "user_not_found"}));
            });

            let name = client(&server).user_name("U404").await.expect("answered");
            assert_eq!(name, None);
        }

        #[tokio::test]
        async fn send_message_posts_thread_reply() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(POST)
                    .path("/chat.postMessage")
                    .header("authorization", BOT_AUTH)
                    .json_body(json!({"channel": "C1", "text": "hello", "thread_ts": "1.2"}));
                then.status(200)
                    .json_body(json!({"ok": true, "channel": "C1", "ts": "1.3"}));
            });

            client(&server)
                .send_message("C1", "hello", Some("1.2"))
                .await
                .expect("send");
            mock.assert();
        }

        #[tokio::test]
        async fn reaction_failure_surfaces_slack_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST)
                    .path("/reactions.add")
                    .json_body(json!({"channel": "C1", "timestamp": "1.2", "name": "eyes"}));
                then.status(200)
                    .json_body(json!({"ok": false, "error": "already_reacted"}));
            });

            let result = client(&server).add_reaction("C1", "1.2", "eyes").await;
            assert!(matches!(result, Err(SlackError::Api(e)) if e == "already_reacted"));
        }

        #[tokio::test]
        async fn upload_runs_three_steps() {
            let server = MockServer::start();
            let upload_url = server.url("/upload/F1");
            let reserve = server.mock(|when, then| {
                when.method(POST)
                    .path("/files.getUploadURLExternal")
                    .header("authorization", BOT_AUTH)
                    .x_www_form_urlencoded_tuple("filename", "notes.txt")
                    .x_www_form_urlencoded_tuple("length", "11");
                then.status(200).json_body(json!({
                    "ok": true,
                    "upload_url": &upload_url,
                    "file_id": "F1"
                }));
            });
            let push = server.mock(|when, then| {
                when.method(POST).path("/upload/F1").body_contains("hello world");
                then.status(200).body("OK - 11");
            });
            let complete = server.mock(|when, then| {
                when.method(POST)
                    .path("/files.completeUploadExternal")
                    .header("authorization", BOT_AUTH)
                    .json_body(json!({
                        "files": [{"id": "F1", "title": "notes.txt"}],
                        "channel_id": "C1"
                    }));
                then.status(200).json_body(json!({
                    "ok": true,
                    "files": [{
                        "id": "F1",
                        "permalink": "https://team.slack.com/files/U1/F1/notes.txt",
                        "url_private": "https://files.slack.com/files-pri/T1-F1/notes.txt"
                    }]
                }));
            });

            let slack = client(&server);
            let ticket = slack.get_upload_url("notes.txt", 11).await.expect("reserve");
            assert_eq!(ticket.file_id, "F1");
            slack
                .upload_bytes(&ticket.upload_url, "notes.txt", b"hello world".to_vec())
                .await
                .expect("push bytes");
            let uploaded = slack
                .complete_upload(&ticket.file_id, "notes.txt", "C1")
                .await
                .expect("complete");

            reserve.assert();
            push.assert();
            complete.assert();
            assert_eq!(
                uploaded.permalink,
                "https://team.slack.com/files/U1/F1/notes.txt"
            );
        }

        #[tokio::test]
        async fn rejected_upload_bytes_is_upload_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/upload/F1");
                then.status(500);
            });

            let result = client(&server)
                .upload_bytes(&server.url("/upload/F1"), "notes.txt", b"x".to_vec())
                .await;
            assert!(matches!(result, Err(SlackError::Upload(_))));
        }

        #[tokio::test]
        async fn download_authenticates_with_user_token() {
            let server = MockServer::start();
            let user = server.mock(|when, then| {
                when.method(GET)
                    .path("/files-pri/T1-F1/report.pdf")
                    .header("authorization", USER_AUTH);
                then.status(200).body("%PDF-1.7");
            });
            let bot = server.mock(|when, then| {
                when.method(GET)
                    .path("/files-pri/T1-F1/report.pdf")
                    .header("authorization", BOT_AUTH);
                then.status(200).body("wrong token");
            });

            let response = client(&server)
                .download(&server.url("/files-pri/T1-F1/report.pdf"))
                .await
                .expect("download");
            assert_eq!(response.text().await.expect("body"), "%PDF-1.7");
            user.assert();
            assert_eq!(bot.hits(), 0);
        }

        #[tokio::test]
        async fn download_error_status_is_http_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/files-pri/T1-F1/missing.pdf");
                then.status(404);
            });

            let result = client(&server)
                .download(&server.url("/files-pri/T1-F1/missing.pdf"))
                .await;
            assert!(matches!(result, Err(SlackError::Http(_))));
        }
    }
}
