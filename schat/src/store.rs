//! Per-user conversation memory bounded by a sliding window.
//!
//! Every conversation starts with the persona system message at index 0. After
//! each append, the oldest messages after it are evicted until the
//! conversation fits the window again, so the system message is never lost.
//!
//! ```rust
//! use schat::ConversationStore;
//! use scommon::UserId;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = ConversationStore::new("Be kind.", 3);
//! let user = UserId::from("ada");
//!
//! store.append_user(&user, "hi").await?;
//! store.append_assistant(&user, "hello!").await?;
//! store.append_user(&user, "how are you?").await?;
//!
//! let messages = store.snapshot(&user).await?;
//! assert_eq!(messages.len(), 3);
//! assert_eq!(messages[0].content, "Be kind.");
//! assert_eq!(messages[1].content, "hello!");
//! # Ok::<(), schat::ChatError>(())
//! # }).unwrap();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use scommon::UserId;
use sprovider::{Message, Role};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ChatError;

/// Smallest window that still holds the system message and one turn.
pub const MIN_WINDOW: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    user_id: UserId,
    messages: Vec<Message>,
    window: usize,
}

impl Conversation {
    fn new(user_id: UserId, system_prompt: &str, window: usize) -> Self {
        Self {
            user_id,
            messages: vec![Message::system(system_prompt)],
            window,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
        if self.messages.len() > self.window {
            let excess = self.messages.len() - self.window;
            self.messages.drain(1..=excess);
        }
    }
}

/// Exclusive access to one user's conversation for the lifetime of a turn.
///
/// Other turns for the same user wait in [`ConversationStore::lock`] until the
/// lease is dropped; different users never contend.
#[derive(Debug)]
pub struct ConversationLease {
    guard: OwnedMutexGuard<Conversation>,
}

impl ConversationLease {
    pub fn user_id(&self) -> &UserId {
        self.guard.user_id()
    }

    pub fn messages(&self) -> &[Message] {
        self.guard.messages()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.guard.messages().to_vec()
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.guard.push(Message::new(Role::User, text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.guard.push(Message::new(Role::Assistant, text));
    }
}

type SharedConversation = Arc<AsyncMutex<Conversation>>;

#[derive(Debug)]
pub struct ConversationStore {
    system_prompt: String,
    window: usize,
    conversations: Mutex<HashMap<UserId, SharedConversation>>,
}

impl ConversationStore {
    /// `window` is clamped to [`MIN_WINDOW`].
    pub fn new(system_prompt: impl Into<String>, window: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            window: window.max(MIN_WINDOW),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of users with a conversation.
    pub fn len(&self) -> Result<usize, ChatError> {
        Ok(self.index()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ChatError> {
        Ok(self.index()?.is_empty())
    }

    pub async fn lock(&self, user_id: &UserId) -> Result<ConversationLease, ChatError> {
        let conversation = self.entry(user_id)?;
        Ok(ConversationLease {
            guard: conversation.lock_owned().await,
        })
    }

    pub async fn get_or_create(&self, user_id: &UserId) -> Result<Vec<Message>, ChatError> {
        Ok(self.lock(user_id).await?.snapshot())
    }

    pub async fn append_user(
        &self,
        user_id: &UserId,
        text: impl Into<String>,
    ) -> Result<(), ChatError> {
        self.lock(user_id).await?.append_user(text);
        Ok(())
    }

    pub async fn append_assistant(
        &self,
        user_id: &UserId,
        text: impl Into<String>,
    ) -> Result<(), ChatError> {
        self.lock(user_id).await?.append_assistant(text);
        Ok(())
    }

    /// Current messages for `user_id`, or an empty list for an unknown user.
    /// Unlike [`get_or_create`](Self::get_or_create) this never creates a
    /// conversation.
    pub async fn snapshot(&self, user_id: &UserId) -> Result<Vec<Message>, ChatError> {
        let existing = self.index()?.get(user_id).cloned();
        match existing {
            Some(conversation) => Ok(conversation.lock().await.messages().to_vec()),
            None => Ok(Vec::new()),
        }
    }

    fn entry(&self, user_id: &UserId) -> Result<SharedConversation, ChatError> {
        let mut conversations = self.index()?;
        let conversation = conversations.entry(user_id.clone()).or_insert_with(|| {
            Arc::new(AsyncMutex::new(Conversation::new(
                user_id.clone(),
                &self.system_prompt,
                self.window,
            )))
        });

        Ok(Arc::clone(conversation))
    }

    fn index(&self) -> Result<MutexGuard<'_, HashMap<UserId, SharedConversation>>, ChatError> {
        self.conversations
            .lock()
            .map_err(|_| ChatError::store("conversation store lock poisoned"))
    }
}
