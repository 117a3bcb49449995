// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Dialogue orchestrator: owns sessions and implements the request/response
//! and streaming chat protocols (spec §4.3, §4.3.1, §4.8).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;
use wisp_bus::EventBus;
use wisp_config::{SessionConfig, ToolsConfig};
use wisp_emotion::EmotionService;
use wisp_model::{CompletionRequest, ModelProvider};
use wisp_tools::{AbilityCall, AbilityContext, CapabilityScheduler};

use crate::events::{assistant_response_event, user_message_event};
use crate::session::{Message, Role, Session, ToolCallRecord};

/// Pre-rendered memory-recall context block, or `None` if nothing relevant
/// was found. Returning an already-rendered string (rather than raw
/// records) keeps the orchestrator decoupled from the memory pipeline's
/// internal record/result types (spec §9 "duck-typed ports" redesign note).
#[async_trait]
pub trait MemoryRecall: Send + Sync {
    async fn recall_block(&self, query: &str, session_id: &str, top_k: usize) -> Option<String>;
}

/// Pre-rendered skill-recall context block, or `None` if no skill matched.
#[async_trait]
pub trait SkillRecall: Send + Sync {
    async fn search_block(&self, query: &str, top_k: usize) -> Option<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    #[error("unknown session: {0}")]
    SessionNotFound(String),
    #[error("unknown provider: {0}")]
    ProviderNotFound(String),
    #[error("provider call failed: {0}")]
    Provider(String),
}

/// Per-call overrides layered over the provider's own defaults (spec §4.2
/// `ChatOptions`).
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
    /// Attach tool schemas from the capability scheduler and allow the tool
    /// loop to run. `false` disables tool calling entirely for this call.
    pub use_tools: bool,
    /// Forwarded into every [`AbilityContext`] built for this call's tool
    /// invocations.
    pub permissions: Vec<String>,
}

/// Result of one non-streaming or streaming chat turn.
pub struct DialogueOrchestrator {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    providers: HashMap<String, Arc<dyn ModelProvider>>,
    default_provider: String,
    scheduler: Arc<CapabilityScheduler>,
    bus: Arc<EventBus>,
    tools_config: ToolsConfig,
    session_config: SessionConfig,
    memory: Option<Arc<dyn MemoryRecall>>,
    skills: Option<Arc<dyn SkillRecall>>,
    emotion: Option<Arc<EmotionService>>,
}

impl DialogueOrchestrator {
    pub fn new(
        providers: HashMap<String, Arc<dyn ModelProvider>>,
        default_provider: impl Into<String>,
        scheduler: Arc<CapabilityScheduler>,
        bus: Arc<EventBus>,
        tools_config: ToolsConfig,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            providers,
            default_provider: default_provider.into(),
            scheduler,
            bus,
            tools_config,
            session_config,
            memory: None,
            skills: None,
            emotion: None,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryRecall>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_skills(mut self, skills: Arc<dyn SkillRecall>) -> Self {
        self.skills = Some(skills);
        self
    }

    pub fn with_emotion(mut self, emotion: Arc<EmotionService>) -> Self {
        self.emotion = Some(emotion);
        self
    }

    /// Runs the emotion pipeline over the assistant's reply, using the
    /// session id as the per-character emotion-state key (spec §2 data
    /// flow: "...provider call → (optional tool loop) → emotion analysis →
    /// event emission"). Failures are logged and otherwise ignored — a
    /// broken emotion config must never fail a chat turn.
    fn analyze_emotion(&self, session_id: &str, text: &str) {
        if let Some(emotion) = &self.emotion {
            if let Err(e) = emotion.analyze(session_id, text) {
                warn!(session_id, error = %e, "emotion analysis failed for chat turn");
            }
        }
    }

    // ── Session Service (spec §4.8) ───────────────────────────────────────────

    pub async fn create_session(
        &self,
        owner_id: impl Into<String>,
        system_prompt: Option<String>,
    ) -> String {
        let mut session = Session::new(owner_id, self.session_config.max_history);
        if let Some(prompt) = system_prompt.clone() {
            session = session.with_system_prompt(prompt);
            session.add_message(Message::system(prompt));
        }
        let id = session.id.clone();
        self.sessions.lock().await.insert(id.clone(), session);
        id
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    pub async fn list_sessions(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    fn provider_for(&self, opts: &ChatOptions) -> Result<Arc<dyn ModelProvider>, DialogueError> {
        let id = opts.provider.as_deref().unwrap_or(&self.default_provider);
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| DialogueError::ProviderNotFound(id.to_string()))
    }

    // ── Context assembly (spec §4.3 "Context assembly") ───────────────────────

    async fn build_context(
        &self,
        session: &Session,
        user_text: &str,
    ) -> Vec<wisp_model::Message> {
        let mut blocks: Vec<String> = Vec::new();

        if let Some(memory) = &self.memory {
            if let Some(block) = memory.recall_block(user_text, &session.id, 5).await {
                blocks.push(block);
            }
        }
        if let Some(skills) = &self.skills {
            if let Some(block) = skills
                .search_block(user_text, wisp_config::DEFAULT_SKILL_TOP_K)
                .await
            {
                blocks.push(block);
            }
        }

        let mut out = Vec::new();
        if let Some(prompt) = &session.system_prompt {
            out.push(wisp_model::Message::system(prompt));
        }
        for block in blocks {
            out.push(wisp_model::Message::system(block));
        }
        out.extend(to_wire_messages(session.non_system_messages()));
        out
    }

    fn completion_request(&self, opts: &ChatOptions, context: Vec<wisp_model::Message>) -> CompletionRequest {
        let tools = if opts.use_tools {
            self.scheduler.get_tool_schemas(&self.tools_config)
                .into_iter()
                .map(|t| wisp_model::ToolSchema {
                    name: t.name,
                    description: t.description,
                    parameters: t.parameters,
                })
                .collect()
        } else {
            Vec::new()
        };
        CompletionRequest {
            messages: context,
            tools,
            model: opts.model.clone(),
            temperature: opts.temperature,
            top_p: opts.top_p,
            max_tokens: opts.max_tokens,
            stop: opts.stop.clone(),
            ..Default::default()
        }
    }

    // ── Non-streaming chat protocol (spec §4.3) ───────────────────────────────

    pub async fn chat(
        &self,
        session_id: &str,
        user_text: &str,
        opts: ChatOptions,
    ) -> Result<String, DialogueError> {
        let provider = self.provider_for(&opts)?;

        {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| DialogueError::SessionNotFound(session_id.to_string()))?;
            session.add_message(Message::user(user_text));
        }
        self.bus
            .publish(user_message_event(session_id, user_text))
            .await;

        let context = {
            let sessions = self.sessions.lock().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| DialogueError::SessionNotFound(session_id.to_string()))?;
            self.build_context(session, user_text).await
        };

        let req = self.completion_request(&opts, context);
        let reply = provider
            .chat(req)
            .await
            .map_err(|e| DialogueError::Provider(e.to_string()))?;

        let final_text = if !reply.tool_calls.is_empty() && opts.use_tools {
            self.run_tool_loop(session_id, &provider, &opts, reply).await?
        } else {
            reply.text
        };

        {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| DialogueError::SessionNotFound(session_id.to_string()))?;
            session.add_message(Message::assistant(final_text.clone()));
        }
        self.analyze_emotion(session_id, &final_text);
        self.bus
            .publish(assistant_response_event(
                session_id,
                final_text.clone(),
                provider.model_name(),
            ))
            .await;

        Ok(final_text)
    }

    // ── Tool-call loop (spec §4.3.1) ──────────────────────────────────────────

    async fn run_tool_loop(
        &self,
        session_id: &str,
        provider: &Arc<dyn ModelProvider>,
        opts: &ChatOptions,
        reply: wisp_model::ChatReply,
    ) -> Result<String, DialogueError> {
        let ctx = AbilityContext {
            user_id: String::new(),
            session_id: session_id.to_string(),
            permissions: opts.permissions.clone(),
        };

        let tool_calls: Vec<ToolCallRecord> = reply
            .tool_calls
            .iter()
            .map(|tc| ToolCallRecord {
                id: tc.id.clone(),
                name: tc.name.clone(),
                arguments: decode_arguments(&tc.arguments),
            })
            .collect();

        let mut tool_messages = Vec::with_capacity(tool_calls.len());
        for (tc, record) in reply.tool_calls.iter().zip(tool_calls.iter()) {
            let call = AbilityCall {
                id: tc.id.clone(),
                name: tc.name.clone(),
                args: record.arguments.clone(),
            };
            let result = self.scheduler.execute(&call, &ctx, &self.tools_config).await;
            let content = truncate(&result.content, self.tools_config.max_result_chars);
            tool_messages.push(Message::tool(tc.id.clone(), content));
        }

        {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| DialogueError::SessionNotFound(session_id.to_string()))?;
            session.add_message(Message::assistant_with_tool_calls(reply.text.clone(), tool_calls));
            for msg in tool_messages {
                session.add_message(msg);
            }
        }

        // Re-invoke with no tools, to prevent a recursive tool loop.
        let context = {
            let sessions = self.sessions.lock().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| DialogueError::SessionNotFound(session_id.to_string()))?;
            to_wire_messages(session.non_system_messages())
        };
        let mut no_tools_opts = opts.clone();
        no_tools_opts.use_tools = false;
        let req = self.completion_request(&no_tools_opts, {
            let mut out = context;
            if let Some(prompt) = self.system_prompt_for(session_id).await {
                out.insert(0, wisp_model::Message::system(prompt));
            }
            out
        });
        let final_reply = provider
            .chat(req)
            .await
            .map_err(|e| DialogueError::Provider(e.to_string()))?;
        Ok(final_reply.text)
    }

    async fn system_prompt_for(&self, session_id: &str) -> Option<String> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .and_then(|s| s.system_prompt.clone())
    }

    // ── Streaming chat (spec §4.3 "Streaming chat") ───────────────────────────

    /// Streams text chunks, accumulating them into the session as a single
    /// assistant message once the stream ends. Tool calls are never
    /// re-entered in this path; on cancel (the returned stream is dropped
    /// before completion) the accumulated partial text is **not** committed.
    pub async fn stream_chat(
        &self,
        session_id: &str,
        user_text: &str,
        opts: ChatOptions,
    ) -> Result<impl Stream<Item = Result<String, DialogueError>> + Send, DialogueError> {
        let provider = self.provider_for(&opts)?;

        {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| DialogueError::SessionNotFound(session_id.to_string()))?;
            session.add_message(Message::user(user_text));
        }
        self.bus
            .publish(user_message_event(session_id, user_text))
            .await;

        let context = {
            let sessions = self.sessions.lock().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| DialogueError::SessionNotFound(session_id.to_string()))?;
            self.build_context(session, user_text).await
        };
        let req = self.completion_request(&opts, context);
        let chunks = provider
            .stream_chat(req)
            .await
            .map_err(|e| DialogueError::Provider(e.to_string()))?;

        let bus = Arc::clone(&self.bus);
        let sessions = Arc::clone(&self.sessions);
        let emotion = self.emotion.clone();
        let session_id_owned = session_id.to_string();
        let model = provider.model_name().to_string();

        // State threaded through `unfold`: the upstream chunk stream plus the
        // text accumulated so far. The commit-to-session closure below only
        // runs when `chunks` yields `None` (the provider signalled done); if
        // the caller drops the returned stream early (cancellation), that
        // branch never executes and nothing is committed (spec §5
        // Cancellation: "any partial assistant message is not committed").
        let state = StreamState {
            chunks: Box::pin(chunks),
            accumulated: String::new(),
        };

        let out = futures::stream::unfold(state, move |mut st| {
            let bus = Arc::clone(&bus);
            let sessions = Arc::clone(&sessions);
            let emotion = emotion.clone();
            let session_id = session_id_owned.clone();
            let model = model.clone();
            async move {
                match st.chunks.next().await {
                    Some(Ok(text)) => {
                        st.accumulated.push_str(&text);
                        Some((Ok(text), st))
                    }
                    Some(Err(e)) => Some((Err(DialogueError::Provider(e.to_string())), st)),
                    None => {
                        if !st.accumulated.is_empty() {
                            {
                                let mut sessions = sessions.lock().await;
                                if let Some(session) = sessions.get_mut(&session_id) {
                                    session.add_message(Message::assistant(st.accumulated.clone()));
                                }
                            }
                            if let Some(emotion) = &emotion {
                                if let Err(e) = emotion.analyze(&session_id, &st.accumulated) {
                                    warn!(session_id = %session_id, error = %e, "emotion analysis failed for streamed chat turn");
                                }
                            }
                            bus.publish(assistant_response_event(
                                &session_id,
                                st.accumulated.clone(),
                                model,
                            ))
                            .await;
                        }
                        None
                    }
                }
            }
        });

        Ok(out)
    }
}

struct StreamState {
    chunks: std::pin::Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>,
    accumulated: String,
}

fn decode_arguments(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}

/// Head/tail truncation for tool results exceeding `max_chars` (spec §4.3.1
/// "tool results are truncated to max_result_chars before insertion into
/// context").
fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let half = max_chars / 2;
    let chars: Vec<char> = content.chars().collect();
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len().saturating_sub(half)..].iter().collect();
    format!("{head}\n… [truncated {} chars] …\n{tail}", chars.len() - max_chars)
}

fn to_wire_messages<'a>(messages: impl Iterator<Item = &'a Message>) -> Vec<wisp_model::Message> {
    let mut out = Vec::new();
    for m in messages {
        match m.role {
            Role::System => {}
            Role::User => out.push(wisp_model::Message::user(m.content.clone())),
            Role::Assistant => {
                if !m.content.is_empty() {
                    out.push(wisp_model::Message::assistant(m.content.clone()));
                }
                for tc in &m.tool_calls {
                    out.push(wisp_model::Message {
                        role: wisp_model::Role::Assistant,
                        content: wisp_model::MessageContent::ToolCall {
                            tool_call_id: tc.id.clone(),
                            function: wisp_model::FunctionCall {
                                name: tc.name.clone(),
                                arguments: serde_json::to_string(&tc.arguments)
                                    .unwrap_or_else(|_| "{}".to_string()),
                            },
                        },
                    });
                }
            }
            Role::Tool => {
                let id = m.tool_call_id.clone().unwrap_or_default();
                if id.is_empty() {
                    warn!("tool message missing tool_call_id; dropping from wire context");
                    continue;
                }
                out.push(wisp_model::Message::tool_result(id, m.content.clone()));
            }
        }
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_config::{SessionConfig, ToolsConfig};
    use wisp_model::MockProvider;

    fn make_orchestrator() -> DialogueOrchestrator {
        let mut providers: HashMap<String, Arc<dyn ModelProvider>> = HashMap::new();
        providers.insert("mock".into(), Arc::new(MockProvider));
        DialogueOrchestrator::new(
            providers,
            "mock",
            Arc::new(CapabilityScheduler::new()),
            Arc::new(EventBus::new(16)),
            ToolsConfig::default(),
            SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn create_session_seeds_system_prompt() {
        let orch = make_orchestrator();
        let id = orch.create_session("user-1", Some("You are X".into())).await;
        let session = orch.get_session(&id).await.unwrap();
        assert_eq!(session.messages.len(), 1);
        assert!(session.messages[0].is_system());
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let orch = make_orchestrator();
        let id = orch.create_session("user-1", None).await;
        let mut opts = ChatOptions::default();
        opts.provider = Some("nope".into());
        let err = orch.chat(&id, "hi", opts).await.unwrap_err();
        assert!(matches!(err, DialogueError::ProviderNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let orch = make_orchestrator();
        let err = orch.chat("missing", "hi", ChatOptions::default()).await.unwrap_err();
        assert!(matches!(err, DialogueError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn happy_path_chat_ends_with_three_messages() {
        let orch = make_orchestrator();
        let id = orch.create_session("user-1", Some("You are X".into())).await;
        let reply = orch.chat(&id, "hi", ChatOptions::default()).await.unwrap();
        assert!(!reply.is_empty());
        let session = orch.get_session(&id).await.unwrap();
        assert_eq!(session.messages.len(), 3);
    }

    #[test]
    fn truncate_short_content_is_unchanged() {
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn truncate_long_content_keeps_head_and_tail() {
        let content = "a".repeat(20);
        let out = truncate(&content, 10);
        assert!(out.contains("truncated"));
        assert!(out.starts_with("aaaaa"));
    }

    #[test]
    fn decode_arguments_parses_json_encoded_string() {
        let decoded = decode_arguments(r#"{"text":"hi"}"#);
        assert_eq!(decoded, serde_json::json!({"text": "hi"}));
    }

    #[test]
    fn decode_arguments_falls_back_to_null_on_malformed_json() {
        assert_eq!(decode_arguments("not json"), Value::Null);
    }

    #[test]
    fn to_wire_messages_excludes_system_role() {
        let messages = vec![Message::system("s"), Message::user("u")];
        let wire = to_wire_messages(messages.iter());
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].as_text(), Some("u"));
    }

    struct EchoAbility;

    #[async_trait]
    impl wisp_tools::Ability for EchoAbility {
        fn name(&self) -> &str {
            "echo_python"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(
            &self,
            call: &AbilityCall,
            _ctx: &AbilityContext,
        ) -> wisp_tools::AbilityResult {
            wisp_tools::AbilityResult::ok(&call.id, call.args.to_string())
        }
    }

    #[tokio::test]
    async fn tool_call_round_trip_answers_with_matching_id_and_reaches_final_text() {
        let mut providers: HashMap<String, Arc<dyn ModelProvider>> = HashMap::new();
        providers.insert(
            "mock".into(),
            Arc::new(wisp_model::ScriptedMockProvider::tool_then_text(
                "t1",
                "echo_python",
                r#"{"text":"hi"}"#,
                "final reply",
            )),
        );
        let mut scheduler = CapabilityScheduler::new();
        scheduler.register_builtin(EchoAbility);
        let orch = DialogueOrchestrator::new(
            providers,
            "mock",
            Arc::new(scheduler),
            Arc::new(EventBus::new(16)),
            ToolsConfig::default(),
            SessionConfig::default(),
        );
        let id = orch.create_session("user-1", None).await;
        let mut opts = ChatOptions::default();
        opts.use_tools = true;
        let reply = orch.chat(&id, "please echo", opts).await.unwrap();
        assert_eq!(reply, "final reply");

        let session = orch.get_session(&id).await.unwrap();
        let tool_msgs: Vec<_> = session
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_msgs.len(), 1);
        assert_eq!(tool_msgs[0].tool_call_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn unknown_ability_reports_not_found_without_aborting() {
        let mut providers: HashMap<String, Arc<dyn ModelProvider>> = HashMap::new();
        providers.insert(
            "mock".into(),
            Arc::new(wisp_model::ScriptedMockProvider::tool_then_text(
                "t1",
                "does_not_exist",
                "{}",
                "final reply",
            )),
        );
        let orch = DialogueOrchestrator::new(
            providers,
            "mock",
            Arc::new(CapabilityScheduler::new()),
            Arc::new(EventBus::new(16)),
            ToolsConfig::default(),
            SessionConfig::default(),
        );
        let id = orch.create_session("user-1", None).await;
        let mut opts = ChatOptions::default();
        opts.use_tools = true;
        let reply = orch.chat(&id, "go", opts).await.unwrap();
        assert_eq!(reply, "final reply");

        let session = orch.get_session(&id).await.unwrap();
        let tool_msg = session
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.content.contains("not found"));
    }

    #[tokio::test]
    async fn stream_chat_accumulates_and_commits_on_completion() {
        let mut providers: HashMap<String, Arc<dyn ModelProvider>> = HashMap::new();
        providers.insert(
            "mock".into(),
            Arc::new(wisp_model::ScriptedMockProvider::always_text("streamed reply")),
        );
        let orch = DialogueOrchestrator::new(
            providers,
            "mock",
            Arc::new(CapabilityScheduler::new()),
            Arc::new(EventBus::new(16)),
            ToolsConfig::default(),
            SessionConfig::default(),
        );
        let id = orch.create_session("user-1", None).await;
        let mut stream = orch
            .stream_chat(&id, "hi", ChatOptions::default())
            .await
            .unwrap();
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            out.push_str(&chunk.unwrap());
        }
        assert_eq!(out, "streamed reply");

        let session = orch.get_session(&id).await.unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "streamed reply");
    }

    #[tokio::test]
    async fn chat_runs_emotion_analysis_on_assistant_reply() {
        let mut providers: HashMap<String, Arc<dyn ModelProvider>> = HashMap::new();
        providers.insert(
            "mock".into(),
            Arc::new(wisp_model::ScriptedMockProvider::always_text("great news!")),
        );
        let bus = Arc::new(EventBus::new(16));
        let dir = tempfile::tempdir().unwrap();
        let emotion = Arc::new(EmotionService::new(
            dir.path(),
            wisp_config::EmotionFilesConfig::default(),
            Arc::clone(&bus),
        ));
        let orch = DialogueOrchestrator::new(
            providers,
            "mock",
            Arc::new(CapabilityScheduler::new()),
            bus,
            ToolsConfig::default(),
            SessionConfig::default(),
        )
        .with_emotion(emotion);
        let id = orch.create_session("user-1", None).await;
        let reply = orch.chat(&id, "hi", ChatOptions::default()).await.unwrap();
        assert_eq!(reply, "great news!");
    }

    #[test]
    fn to_wire_messages_expands_assistant_tool_calls() {
        let tc = ToolCallRecord {
            id: "call-1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({"x": 1}),
        };
        let messages = vec![Message::assistant_with_tool_calls("", vec![tc])];
        let wire = to_wire_messages(messages.iter());
        assert_eq!(wire.len(), 1);
        match &wire[0].content {
            wisp_model::MessageContent::ToolCall { tool_call_id, function } => {
                assert_eq!(tool_call_id, "call-1");
                assert_eq!(function.name, "echo");
            }
            _ => panic!("expected a ToolCall wire message"),
        }
    }
}
