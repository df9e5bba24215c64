use crate::config::DEFAULT_MODEL;
use crate::error::{ChatError, Result};
use crate::history::History;
use crate::persona::Persona;
use crate::sink::{FragmentSink, NullSink, WriterSink};
use crate::streaming::{StreamAccumulator, StreamStats};
use crate::traits::{ChatClient, ChatOptions, ChatRequest};
use crate::types::{Message, Role};
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

/// What happens to the user turn when a call fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The user message stays in the log, without an answer
    #[default]
    KeepUserTurn,
    /// The user message is removed, so the log only holds completed exchanges
    RollbackUserTurn,
}

/// A conversation with a chat-completions API.
///
/// Every `ask` replays the whole log plus the new question. Methods take
/// `&mut self`; share a session across tasks only behind a lock.
pub struct ChatSession {
    id: Uuid,
    client: Arc<dyn ChatClient>,
    model: String,
    options: ChatOptions,
    history: History,
    sink: Box<dyn FragmentSink>,
    persona: Option<Persona>,
    failure_policy: FailurePolicy,
    last_stream_stats: Option<StreamStats>,
}

impl ChatSession {
    pub fn new(client: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self::builder(client).model(model).build()
    }

    pub fn builder(client: Arc<dyn ChatClient>) -> ChatSessionBuilder {
        ChatSessionBuilder::new(client)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[Message] {
        self.history.messages()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Counters from the most recent successful streamed call
    pub fn last_stream_stats(&self) -> Option<&StreamStats> {
        self.last_stream_stats.as_ref()
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.history.add_message(role, content);
    }

    /// Empty the log completely
    pub fn clear(&mut self) {
        self.history.clear();
        self.last_stream_stats = None;
    }

    /// Empty the log, then restore the persona's system prompt if there is one
    pub fn reset(&mut self) {
        self.clear();
        self.seed_system_prompt();
    }

    fn seed_system_prompt(&mut self) {
        if let Some(persona) = &self.persona {
            let prompt = persona.render_system_prompt();
            self.history.add_message(Role::System, prompt);
        }
    }

    /// Ask a question and return the answer.
    ///
    /// With `stream` set, fragments go to the session's sink as they arrive.
    pub async fn ask(&mut self, question: &str, stream: bool) -> Result<String> {
        if !stream {
            return self.ask_buffered(question).await;
        }

        let mut sink = std::mem::replace(&mut self.sink, Box::new(NullSink));
        let result = self.ask_with_sink(question, sink.as_mut()).await;
        self.sink = sink;
        result
    }

    async fn ask_buffered(&mut self, question: &str) -> Result<String> {
        if let Some(reply) = self.begin_turn(question) {
            return Ok(reply);
        }

        let request = self.request();
        match self.client.chat(request).await {
            Ok(response) => Ok(self.complete_turn(response.content)),
            Err(e) => Err(self.fail_turn(e)),
        }
    }

    /// Streaming ask with a caller-supplied sink
    pub async fn ask_with_sink(
        &mut self,
        question: &str,
        sink: &mut dyn FragmentSink,
    ) -> Result<String> {
        self.last_stream_stats = None;

        if let Some(reply) = self.begin_turn(question) {
            sink.on_fragment(&reply, &reply);
            sink.on_finish(&reply);
            return Ok(reply);
        }

        let request = self.request();
        match stream_answer(self.client.as_ref(), request, sink).await {
            Ok((answer, stats)) => {
                tracing::debug!(
                    "Stream finished: session={}, fragments={}, skipped={}, done={}",
                    self.id,
                    stats.fragments,
                    stats.skipped_frames,
                    stats.done_received
                );
                self.last_stream_stats = Some(stats);
                Ok(self.complete_turn(answer))
            }
            Err(e) => {
                sink.on_abort();
                Err(self.fail_turn(e))
            }
        }
    }

    /// Append the user turn. Returns the local reply when the persona answers it.
    fn begin_turn(&mut self, question: &str) -> Option<String> {
        let prior_turns = self
            .history
            .messages()
            .iter()
            .filter(|m| m.role() != Role::System)
            .count();

        self.history.add_message(Role::User, question);

        let reply = self
            .persona
            .as_ref()
            .and_then(|persona| persona.canned_reply(question, prior_turns))?;

        tracing::debug!("Answering locally from persona: session={}", self.id);
        Some(self.complete_turn(reply))
    }

    fn request(&self) -> ChatRequest {
        tracing::info!(
            "Asking: session={}, model={}, messages={}",
            self.id,
            self.model,
            self.history.len()
        );
        ChatRequest::new(self.model.clone(), self.history.messages().to_vec())
            .with_options(self.options.clone())
    }

    fn complete_turn(&mut self, answer: String) -> String {
        self.history.add_message(Role::Assistant, answer.clone());
        answer
    }

    fn fail_turn(&mut self, error: ChatError) -> ChatError {
        tracing::warn!("Chat request failed: session={}, error={}", self.id, error);
        if self.failure_policy == FailurePolicy::RollbackUserTurn {
            self.history.pop_user_turn();
        }
        error
    }
}

async fn stream_answer(
    client: &dyn ChatClient,
    request: ChatRequest,
    sink: &mut dyn FragmentSink,
) -> Result<(String, StreamStats)> {
    let mut events = client.chat_stream(request).await?;
    let mut accumulator = StreamAccumulator::new();

    while let Some(event) = events.next().await {
        accumulator.apply(event?, sink);
    }

    Ok(accumulator.finish(sink))
}

pub struct ChatSessionBuilder {
    client: Arc<dyn ChatClient>,
    model: String,
    options: ChatOptions,
    sink: Option<Box<dyn FragmentSink>>,
    persona: Option<Persona>,
    failure_policy: FailurePolicy,
}

impl ChatSessionBuilder {
    fn new(client: Arc<dyn ChatClient>) -> Self {
        Self {
            client,
            model: DEFAULT_MODEL.to_string(),
            options: ChatOptions::default(),
            sink: None,
            persona: None,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Where streamed fragments go. Defaults to stdout.
    pub fn sink(mut self, sink: impl FragmentSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn persona(mut self, persona: Option<Persona>) -> Self {
        self.persona = persona;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn build(self) -> ChatSession {
        let mut session = ChatSession {
            id: Uuid::new_v4(),
            client: self.client,
            model: self.model,
            options: self.options,
            history: History::new(),
            sink: self
                .sink
                .unwrap_or_else(|| Box::new(WriterSink::stdout())),
            persona: self.persona,
            failure_policy: self.failure_policy,
            last_stream_stats: None,
        };
        session.seed_system_prompt();
        session
    }
}
