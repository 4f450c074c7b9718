//! LlmClient trait definition

use async_trait::async_trait;

use super::{ChatMessage, ChatResponse, LlmError};

/// Stateless LLM client - each call is independent (fresh context)
///
/// This is the only abstraction the review gate and coder workers use.
/// No conversation state is maintained between calls; freshness is a
/// property the context manager enforces, and a stateful client would
/// defeat it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one conversation and await the full reply.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::llm::TokenUsage;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Mock LLM client for unit tests
    ///
    /// Replies with canned responses in order and records every request for
    /// assertion.
    pub struct MockLlmClient {
        responses: Vec<String>,
        call_count: AtomicUsize,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<String>) -> Self {
            debug!(response_count = responses.len(), "MockLlmClient::new: called");
            Self {
                responses,
                call_count: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Messages of the nth request, for asserting prompt contents.
        pub fn request(&self, n: usize) -> Option<Vec<ChatMessage>> {
            self.requests.lock().unwrap().get(n).cloned()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, LlmError> {
            debug!(messages = messages.len(), "MockLlmClient::chat: called");
            self.requests.lock().unwrap().push(messages.to_vec());
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(idx)
                .map(|content| ChatResponse {
                    content: content.clone(),
                    usage: TokenUsage::default(),
                })
                .ok_or_else(|| LlmError::InvalidResponse("No more mock responses".to_string()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::llm::Role;

        #[tokio::test]
        async fn test_mock_replies_in_order() {
            let client = MockLlmClient::new(vec!["one".to_string(), "two".to_string()]);

            let r1 = client.chat(&[ChatMessage::user("a")]).await.unwrap();
            assert_eq!(r1.content, "one");

            let r2 = client.chat(&[ChatMessage::user("b")]).await.unwrap();
            assert_eq!(r2.content, "two");
            assert_eq!(client.call_count(), 2);
        }

        #[tokio::test]
        async fn test_mock_errors_when_exhausted() {
            let client = MockLlmClient::new(vec![]);
            assert!(client.chat(&[ChatMessage::user("a")]).await.is_err());
        }

        #[tokio::test]
        async fn test_mock_records_requests() {
            let client = MockLlmClient::new(vec!["ok".to_string()]);
            client
                .chat(&[ChatMessage::system("sys"), ChatMessage::user("usr")])
                .await
                .unwrap();
            let recorded = client.request(0).unwrap();
            assert_eq!(recorded[0].role, Role::System);
            assert_eq!(recorded[1].content, "usr");
        }
    }
}
