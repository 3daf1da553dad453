// Conversational QA chain
// Combines retrieval, conversation history, and a fixed prompt template into
// a single answer call against the Groq chat-completions API.

pub mod memory;


use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{self, Config};
use crate::retriever::Retriever;
use crate::{BotError, Result};

pub use memory::{ConversationMemory, Turn};

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Prompt for the answer call. The grounding, admit-unknown, and
/// three-sentence rules are model instructions only; the service does not
/// post-process or truncate the answer.
const QA_TEMPLATE: &str = "\
You are a helpful medical assistant.
Use the following context to answer the user's question.
If you do not know the answer, say that you do not know.
Use a maximum of three sentences, and keep the answer medically accurate, clear, and concise.

Context:
{context}

Question: {question}
Answer:
";

/// Prompt that rewrites a follow-up question into a standalone one, so
/// pronouns and references resolve against prior turns before retrieval.
const CONDENSE_TEMPLATE: &str = "\
Given the following conversation and a follow up question, rephrase the \
follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}

Follow Up Input: {question}
Standalone question:";

/// Client for the Groq OpenAI-compatible chat-completions API.
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl GroqClient {
    /// Build a client from config. Fails immediately when the API key is
    /// absent from the environment.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config::groq_api_key().map_err(|e| BotError::Config(e.to_string()))?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &Config, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| BotError::Model(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.groq.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.groq.model.clone(),
            temperature: config.groq.temperature,
        })
    }

    /// One chat-completions call. No retry logic; failures propagate.
    #[inline]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!("Calling {} with {} messages", self.model, messages.len());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
            })
            .send()
            .await
            .map_err(|e| BotError::Model(format!("Chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Model(format!("Chat returned {status}: {body}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BotError::Model(format!("Invalid chat response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| BotError::Model("Chat response contained no choices".to_string()))
    }
}

/// Retrieval chain with history-aware question condensing.
#[derive(Debug, Clone)]
pub struct QaChain {
    llm: GroqClient,
    retriever: Retriever,
}

impl QaChain {
    #[inline]
    pub fn new(llm: GroqClient, retriever: Retriever) -> Self {
        Self { llm, retriever }
    }

    /// Answer a question against the current conversation history.
    ///
    /// With history present, the question is first condensed into a
    /// standalone form so retrieval sees resolved references; the condensed
    /// question also fills the answer prompt's `{question}` slot. Zero
    /// retrieved chunks is not an error: the prompt's own instruction covers
    /// the empty-context case.
    #[inline]
    pub async fn answer(&self, question: &str, memory: &ConversationMemory) -> Result<String> {
        let standalone = if memory.is_empty() {
            question.to_string()
        } else {
            self.condense(question, memory).await?
        };

        let chunks = self.retriever.retrieve(&standalone).await?;
        let context = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = render_qa_prompt(&context, &standalone);
        self.llm.chat(&[ChatMessage::user(prompt)]).await
    }

    async fn condense(&self, question: &str, memory: &ConversationMemory) -> Result<String> {
        let prompt = render_condense_prompt(&format_history(memory), question);
        let standalone = self.llm.chat(&[ChatMessage::user(prompt)]).await?;
        let standalone = standalone.trim();

        debug!("Condensed follow-up into: {standalone}");

        if standalone.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(standalone.to_string())
        }
    }
}

/// The per-process chat session: one chain, one memory.
#[derive(Debug, Clone)]
pub struct ChatSession {
    chain: QaChain,
    memory: ConversationMemory,
}

impl ChatSession {
    #[inline]
    pub fn new(chain: QaChain, max_history_turns: usize) -> Self {
        Self {
            chain,
            memory: ConversationMemory::new(max_history_turns),
        }
    }

    /// Answer the question and record the turn. The turn is only recorded
    /// after a successful answer, so a failed call leaves history untouched.
    #[inline]
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        let answer = self.chain.answer(question, &self.memory).await?;
        self.memory.push(question, &answer);
        info!("Answered question ({} turns in memory)", self.memory.len());
        Ok(answer)
    }

    #[inline]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }
}

pub(crate) fn render_qa_prompt(context: &str, question: &str) -> String {
    QA_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

pub(crate) fn render_condense_prompt(chat_history: &str, question: &str) -> String {
    CONDENSE_TEMPLATE
        .replace("{chat_history}", chat_history)
        .replace("{question}", question)
}

pub(crate) fn format_history(memory: &ConversationMemory) -> String {
    let mut history = String::new();
    for turn in memory.turns() {
        history.push_str("Human: ");
        history.push_str(&turn.question);
        history.push_str("\nAssistant: ");
        history.push_str(&turn.answer);
        history.push('\n');
    }
    history
}
