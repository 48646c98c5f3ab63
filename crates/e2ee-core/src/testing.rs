//! Test doubles for the store and host interfaces.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::sleep;

use crate::host::{
    BotSpec, Broadcast, ChannelMember, HostApi, HostError, Post, SlashCommand, User,
};
use crate::store::{KvStore, MemoryKvStore, StoreError};

/// Store with injectable failures, latency and write counting.
pub struct ScriptedStore {
    inner: MemoryKvStore,
    compare_and_set: bool,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_delete: AtomicBool,
    latency: Mutex<Duration>,
    interference: Mutex<Option<(String, Vec<u8>)>>,
    gets: AtomicUsize,
    writes: AtomicUsize,
}

impl ScriptedStore {
    /// Plain get/set store without compare-and-set.
    pub fn new() -> Self {
        Self {
            inner: MemoryKvStore::new(),
            compare_and_set: false,
            fail_get: AtomicBool::new(false),
            fail_set: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            interference: Mutex::new(None),
            gets: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn with_compare_and_set() -> Self {
        Self {
            compare_and_set: true,
            ..Self::new()
        }
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Simulate another process writing `value` just before the next write.
    pub fn interfere_once(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        *self.interference.lock() = Some((key.into(), value.into()));
    }

    /// Write directly, bypassing failures and counters.
    pub async fn seed(&self, key: &str, value: &[u8]) {
        // The in-memory store cannot fail.
        let _ = self.inner.set(key, value).await;
    }

    pub async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await.ok().flatten()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Writes attempted through `set` or `compare_and_set`.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            sleep(latency).await;
        }
    }

    async fn apply_interference(&self) {
        let pending = self.interference.lock().take();
        if let Some((key, value)) = pending {
            let _ = self.inner.set(&key, &value).await;
        }
    }
}

impl Default for ScriptedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for ScriptedStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.delay().await;
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected get failure".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.delay().await;
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected set failure".into()));
        }
        self.apply_interference().await;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.delay().await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected delete failure".into()));
        }
        self.inner.delete(key).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StoreError> {
        if !self.compare_and_set {
            return Err(StoreError::Unsupported("compare_and_set"));
        }
        self.delay().await;
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected set failure".into()));
        }
        self.apply_interference().await;
        self.inner.compare_and_set(key, expected, new).await
    }

    fn supports_compare_and_set(&self) -> bool {
        self.compare_and_set
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub event: String,
    pub payload: serde_json::Value,
    pub broadcast: Broadcast,
}

/// In-process host recording every outbound call.
pub struct MockHost {
    users: DashMap<String, User>,
    members: DashMap<String, Vec<String>>,
    max_users_per_team: AtomicUsize,
    fail_mail: AtomicBool,
    fail_posts: AtomicBool,
    next_post_id: AtomicUsize,
    mails: Mutex<Vec<SentMail>>,
    posts: Mutex<Vec<Post>>,
    ephemeral: Mutex<Vec<(String, Post)>>,
    events: Mutex<Vec<PublishedEvent>>,
    commands: Mutex<Vec<SlashCommand>>,
    bots: Mutex<Vec<BotSpec>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            members: DashMap::new(),
            max_users_per_team: AtomicUsize::new(50),
            fail_mail: AtomicBool::new(false),
            fail_posts: AtomicBool::new(false),
            next_post_id: AtomicUsize::new(1),
            mails: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            ephemeral: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            bots: Mutex::new(Vec::new()),
        }
    }

    /// Register a user; the email defaults to `<username>@example.com`.
    pub fn add_user(&self, id: &str, username: &str) -> User {
        let user = User {
            id: id.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            is_bot: false,
        };
        self.users.insert(id.to_string(), user.clone());
        user
    }

    pub fn add_member(&self, channel_id: &str, user_id: &str) {
        self.members
            .entry(channel_id.to_string())
            .or_default()
            .push(user_id.to_string());
    }

    pub fn set_max_users_per_team(&self, max: usize) {
        self.max_users_per_team.store(max, Ordering::SeqCst);
    }

    pub fn fail_mail(&self, fail: bool) {
        self.fail_mail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_posts(&self, fail: bool) {
        self.fail_posts.store(fail, Ordering::SeqCst);
    }

    pub fn mails(&self) -> Vec<SentMail> {
        self.mails.lock().clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().clone()
    }

    pub fn ephemeral_posts(&self) -> Vec<(String, Post)> {
        self.ephemeral.lock().clone()
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().clone()
    }

    pub fn commands(&self) -> Vec<SlashCommand> {
        self.commands.lock().clone()
    }

    pub fn bots(&self) -> Vec<BotSpec> {
        self.bots.lock().clone()
    }

    fn assign_id(&self, mut post: Post) -> Post {
        let id = self.next_post_id.fetch_add(1, Ordering::SeqCst);
        post.id = format!("post{id}");
        post
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostApi for MockHost {
    async fn get_user(&self, user_id: &str) -> Result<User, HostError> {
        self.users
            .get(user_id)
            .map(|user| user.clone())
            .ok_or_else(|| HostError::NotFound(format!("user {user_id}")))
    }

    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<ChannelMember, HostError> {
        let is_member = self
            .members
            .get(channel_id)
            .is_some_and(|members| members.iter().any(|m| m == user_id));
        if !is_member {
            return Err(HostError::NotFound(format!(
                "member {user_id} of channel {channel_id}"
            )));
        }
        Ok(ChannelMember {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
        })
    }

    async fn get_channel_members(
        &self,
        channel_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<ChannelMember>, HostError> {
        let members = self
            .members
            .get(channel_id)
            .map(|members| members.clone())
            .unwrap_or_default();
        Ok(members
            .into_iter()
            .skip(page * per_page)
            .take(per_page)
            .map(|user_id| ChannelMember {
                channel_id: channel_id.to_string(),
                user_id,
            })
            .collect())
    }

    async fn max_users_per_team(&self) -> Result<usize, HostError> {
        Ok(self.max_users_per_team.load(Ordering::SeqCst))
    }

    async fn send_mail(&self, to: &str, subject: &str, html_body: &str) -> Result<(), HostError> {
        if self.fail_mail.load(Ordering::SeqCst) {
            return Err(HostError::Failed("mail delivery failed".into()));
        }
        self.mails.lock().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }

    async fn create_post(&self, post: Post) -> Result<Post, HostError> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(HostError::Failed("post creation failed".into()));
        }
        let post = self.assign_id(post);
        self.posts.lock().push(post.clone());
        Ok(post)
    }

    async fn send_ephemeral_post(&self, user_id: &str, post: Post) -> Result<Post, HostError> {
        let post = self.assign_id(post);
        self.ephemeral.lock().push((user_id.to_string(), post.clone()));
        Ok(post)
    }

    async fn publish_event(
        &self,
        event: &str,
        payload: serde_json::Value,
        broadcast: Broadcast,
    ) -> Result<(), HostError> {
        self.events.lock().push(PublishedEvent {
            event: event.to_string(),
            payload,
            broadcast,
        });
        Ok(())
    }

    async fn register_command(&self, command: SlashCommand) -> Result<(), HostError> {
        self.commands.lock().push(command);
        Ok(())
    }

    async fn ensure_bot(&self, bot: BotSpec) -> Result<String, HostError> {
        let id = format!("bot-{}", bot.username);
        self.users.entry(id.clone()).or_insert_with(|| User {
            id: id.clone(),
            username: bot.username.clone(),
            email: String::new(),
            is_bot: true,
        });
        self.bots.lock().push(bot);
        Ok(id)
    }
}
