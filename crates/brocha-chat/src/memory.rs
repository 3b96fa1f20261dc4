//! Bounded per-user conversation history with idle eviction.
//!
//! Each user keeps at most `history_limit` messages, oldest dropped first.
//! A background task wakes every `cleanup_interval` and evicts conversations
//! that have been idle for longer than that interval.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

use brocha_core::types::Message;

use crate::error::ChatError;

/// Pause after a failed eviction pass before trying again.
const FAILURE_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Conversation {
    messages: Vec<Message>,
    last_activity: Instant,
}

impl Conversation {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            last_activity: Instant::now(),
        }
    }
}

struct CleanupTask {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

pub struct ConversationMemory {
    conversations: Arc<Mutex<HashMap<String, Conversation>>>,
    history_limit: usize,
    cleanup_interval: Duration,
    cleanup: Mutex<Option<CleanupTask>>,
}

impl ConversationMemory {
    pub fn new(history_limit: usize, cleanup_interval: Duration) -> Self {
        Self {
            conversations: Arc::new(Mutex::new(HashMap::new())),
            history_limit: history_limit.max(1),
            cleanup_interval,
            cleanup: Mutex::new(None),
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Append a message, creating the conversation on first use and keeping
    /// only the most recent `history_limit` messages.
    pub fn add_message(&self, user_id: &str, message: Message) -> Result<(), ChatError> {
        let mut conversations = lock(&self.conversations)?;
        let conversation = conversations
            .entry(user_id.to_string())
            .or_insert_with(Conversation::new);
        conversation.messages.push(message);
        if conversation.messages.len() > self.history_limit {
            let excess = conversation.messages.len() - self.history_limit;
            conversation.messages.drain(..excess);
        }
        conversation.last_activity = Instant::now();
        Ok(())
    }

    /// A copy of the user's messages, oldest first. Empty for unknown users.
    pub fn get_messages(&self, user_id: &str) -> Result<Vec<Message>, ChatError> {
        let conversations = lock(&self.conversations)?;
        Ok(conversations
            .get(user_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default())
    }

    /// Whether `user_id` has a live conversation, even an empty one.
    pub fn contains(&self, user_id: &str) -> bool {
        self.conversations
            .lock()
            .map(|c| c.contains_key(user_id))
            .unwrap_or(false)
    }

    /// Reset a user's conversation to empty. The user stays known.
    pub fn clear_messages(&self, user_id: &str) -> Result<(), ChatError> {
        let mut conversations = lock(&self.conversations)?;
        if let Some(conversation) = conversations.get_mut(user_id) {
            *conversation = Conversation::new();
        }
        Ok(())
    }

    /// Run one eviction pass now. Returns how many conversations were removed.
    pub fn cleanup_expired(&self) -> Result<usize, ChatError> {
        evict_idle(&self.conversations, self.cleanup_interval)
    }

    /// Number of live conversations.
    pub fn len(&self) -> usize {
        self.conversations.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the background eviction loop. Calling it while the loop is
    /// already running does nothing. Must be called inside a tokio runtime.
    pub fn start(&self) -> Result<(), ChatError> {
        let mut cleanup = lock(&self.cleanup)?;
        if let Some(task) = cleanup.as_ref() {
            if !task.handle.is_finished() {
                return Ok(());
            }
        }

        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(cleanup_loop(
            Arc::clone(&self.conversations),
            self.cleanup_interval,
            Arc::clone(&shutdown),
        ));
        *cleanup = Some(CleanupTask { shutdown, handle });
        info!(
            interval_secs = self.cleanup_interval.as_secs(),
            "Conversation cleanup task started"
        );
        Ok(())
    }

    /// Stop the eviction loop and wait for it to exit. `start` may be called
    /// again afterwards.
    pub async fn stop(&self) -> Result<(), ChatError> {
        let task = lock(&self.cleanup)?.take();
        if let Some(CleanupTask { shutdown, handle }) = task {
            shutdown.notify_one();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Conversation cleanup task ended abnormally");
                }
            }
            info!("Conversation cleanup task stopped");
        }
        Ok(())
    }

    /// Whether the eviction loop is currently running.
    pub fn is_running(&self) -> bool {
        self.cleanup
            .lock()
            .map(|c| c.as_ref().is_some_and(|t| !t.handle.is_finished()))
            .unwrap_or(false)
    }
}

async fn cleanup_loop(
    conversations: Arc<Mutex<HashMap<String, Conversation>>>,
    interval: Duration,
    shutdown: Arc<Notify>,
) {
    loop {
        let pause = match evict_idle(&conversations, interval) {
            Ok(_) => interval,
            Err(e) => {
                error!(error = %e, "Conversation cleanup pass failed");
                FAILURE_BACKOFF
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown.notified() => return,
        }
    }
}

fn evict_idle(
    conversations: &Mutex<HashMap<String, Conversation>>,
    max_idle: Duration,
) -> Result<usize, ChatError> {
    let now = Instant::now();
    let mut conversations = lock(conversations)?;
    let expired: Vec<String> = conversations
        .iter()
        .filter(|(_, c)| now.saturating_duration_since(c.last_activity) > max_idle)
        .map(|(user_id, _)| user_id.clone())
        .collect();

    for user_id in &expired {
        conversations.remove(user_id);
        info!(user_id = %user_id, "Evicted idle conversation");
    }
    Ok(expired.len())
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ChatError> {
    mutex
        .lock()
        .map_err(|e| ChatError::Memory(format!("lock poisoned: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(limit: usize, interval_secs: u64) -> ConversationMemory {
        ConversationMemory::new(limit, Duration::from_secs(interval_secs))
    }

    #[tokio::test]
    async fn test_history_bounded_keeps_latest_in_order() {
        let memory = memory(5, 3600);
        for i in 0..8 {
            memory
                .add_message("5491122334455", Message::user(format!("m{}", i)))
                .unwrap();
        }

        let contents: Vec<String> = memory
            .get_messages("5491122334455")
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["m3", "m4", "m5", "m6", "m7"]);
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_history() {
        let memory = memory(5, 3600);
        assert!(memory.get_messages("nadie").unwrap().is_empty());
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_clear_preserves_key() {
        let memory = memory(5, 3600);
        memory.add_message("u1", Message::user("Hola")).unwrap();
        memory.clear_messages("u1").unwrap();

        assert!(memory.get_messages("u1").unwrap().is_empty());
        assert!(memory.contains("u1"));
        assert_eq!(memory.len(), 1);

        memory.clear_messages("desconocido").unwrap();
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let memory = memory(5, 3600);
        memory.add_message("a", Message::user("hola")).unwrap();
        memory.add_message("b", Message::user("buenas")).unwrap();
        assert_eq!(memory.get_messages("a").unwrap()[0].content, "hola");
        assert_eq!(memory.get_messages("b").unwrap()[0].content, "buenas");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_conversation_evicted_active_survives() {
        let memory = memory(5, 60);
        memory.add_message("idle", Message::user("hola")).unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        memory.add_message("active", Message::user("hola")).unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(memory.cleanup_expired().unwrap(), 1);

        assert!(memory.get_messages("idle").unwrap().is_empty());
        assert_eq!(memory.get_messages("active").unwrap().len(), 1);
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_loop_evicts() {
        let memory = memory(5, 10);
        memory.start().unwrap();
        memory.add_message("u1", Message::user("hola")).unwrap();

        // First pass runs at start; the next one after 10s still sees the
        // conversation as fresh enough, the one after 20s evicts it.
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(memory.is_empty());

        memory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_allows_restart() {
        let memory = memory(5, 3600);
        memory.start().unwrap();
        memory.start().unwrap();
        assert!(memory.is_running());

        tokio::time::timeout(Duration::from_secs(2), memory.stop())
            .await
            .expect("stop should finish promptly")
            .unwrap();
        assert!(!memory.is_running());

        memory.start().unwrap();
        assert!(memory.is_running());
        memory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let memory = memory(5, 3600);
        memory.stop().await.unwrap();
        assert!(!memory.is_running());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let memory = Arc::new(memory(1000, 3600));
        let mut handles = Vec::new();
        for i in 0..50 {
            let memory = Arc::clone(&memory);
            handles.push(tokio::spawn(async move {
                memory
                    .add_message("same-user", Message::user(format!("m{}", i)))
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(memory.get_messages("same-user").unwrap().len(), 50);
    }
}
