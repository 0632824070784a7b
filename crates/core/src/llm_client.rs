use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Who authored a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single conversation turn handed to the text generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    fn into_request(self) -> Result<ChatCompletionRequestMessage, OpenAIError> {
        Ok(match self.role {
            ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(self.content)
                .build()?
                .into(),
            ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                .content(self.content)
                .build()?
                .into(),
            ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(self.content)
                .build()?
                .into(),
        })
    }
}

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the LLM.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent, OpenAIError>> + Send>>;

/// The external text-generation service, treated as an opaque function from a
/// conversation to free-form text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming call and returns the full reply.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String>;

    /// Makes a streaming call, yielding the reply as it is produced.
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<LLMStream>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    fn to_request_messages(
        messages: Vec<ChatMessage>,
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        messages.into_iter().map(ChatMessage::into_request).collect()
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_request_messages(messages)?)
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .context("No content in LLM response")?;
        Ok(content)
    }

    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<LLMStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_request_messages(messages)?)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async move {
            match result {
                Ok(response) => {
                    let choice = response.choices.first()?;
                    if let Some(content) = &choice.delta.content {
                        if !content.is_empty() {
                            return Some(Ok(LLMStreamEvent::TextChunk(content.clone())));
                        }
                    }
                    None
                }
                Err(e) => Some(Err(e)),
            }
        })))
    }
}

/// Drains a stream into a single string, handing each chunk to `on_chunk`.
pub async fn collect_stream(
    mut stream: LLMStream,
    mut on_chunk: impl FnMut(&str),
) -> Result<String> {
    let mut full = String::new();
    while let Some(event) = stream.next().await {
        let LLMStreamEvent::TextChunk(chunk) = event?;
        on_chunk(&chunk);
        full.push_str(&chunk);
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, ChatRole::System);
        assert_eq!(ChatMessage::user("u").role, ChatRole::User);
        assert_eq!(ChatMessage::assistant("a").content, "a");
    }

    #[test]
    fn test_messages_convert_to_requests() {
        let messages = vec![
            ChatMessage::system("be kind"),
            ChatMessage::user("what is fork?"),
            ChatMessage::assistant("it clones a process"),
        ];
        let requests = OpenAICompatibleClient::to_request_messages(messages).unwrap();
        assert!(matches!(requests[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(requests[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(requests[2], ChatCompletionRequestMessage::Assistant(_)));
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let chunks: Vec<Result<LLMStreamEvent, OpenAIError>> = vec![
            Ok(LLMStreamEvent::TextChunk("Hello".to_string())),
            Ok(LLMStreamEvent::TextChunk(", world".to_string())),
        ];
        let stream: LLMStream = Box::pin(stream::iter(chunks));
        let mut seen = Vec::new();
        let full = collect_stream(stream, |c| seen.push(c.to_string()))
            .await
            .unwrap();
        assert_eq!(full, "Hello, world");
        assert_eq!(seen, vec!["Hello", ", world"]);
    }

    #[tokio::test]
    async fn test_mock_client_complete() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .returning(|messages| Ok(format!("{} messages", messages.len())));
        let reply = mock.complete(vec![ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(reply, "1 messages");
    }
}
