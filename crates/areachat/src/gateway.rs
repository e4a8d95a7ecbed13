//! Chat gateway: one request, at most two model passes and one area lookup
use serde_json::json;
use std::sync::Arc;

use crate::errors::{ChatError, ChatResult};
use crate::formatter::DEFAULT_DESCRIPTION_CHARS;
use crate::functions::{declarations, DispatchLimits, Dispatcher};
use crate::models::message::{ChatMessage, Message, ToolRequest};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolError};
use crate::prompt_template::load_prompt_file;
use crate::providers::base::{Provider, Usage};
use crate::store::AreaStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    pub limits: DispatchLimits,
    pub description_chars: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            limits: DispatchLimits::default(),
            description_chars: DEFAULT_DESCRIPTION_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub message: String,
    pub model: String,
    pub tokens_used: i64,
}

enum Turn {
    AwaitingDecision,
    AwaitingAnswer,
    Answered(Message),
}

/// Accumulates usage across passes
struct Tally {
    model: String,
    tokens: i64,
}

impl Tally {
    fn add(&mut self, usage: &Usage) {
        self.tokens += usage.total();
        if let Some(model) = &usage.model {
            self.model = model.clone();
        }
    }
}

pub struct ChatGateway {
    provider: Box<dyn Provider>,
    dispatcher: Dispatcher,
    config: GatewayConfig,
}

impl ChatGateway {
    pub fn new(provider: Box<dyn Provider>, store: Arc<dyn AreaStore>, config: GatewayConfig) -> Self {
        Self {
            provider,
            dispatcher: Dispatcher::new(store, config.limits, config.description_chars),
            config,
        }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Answer the last turn of `messages`
    pub async fn reply(&self, messages: &[ChatMessage]) -> ChatResult<ChatReply> {
        validate_conversation(messages)?;

        let tools = declarations();
        let system = self.system_prompt(&tools)?;
        let mut history: Vec<Message> = messages.iter().map(Message::from).collect();
        let mut tally = Tally {
            model: self.provider.model().to_string(),
            tokens: 0,
        };

        let mut turn = Turn::AwaitingDecision;
        let answer = loop {
            turn = match turn {
                Turn::AwaitingDecision => {
                    let (response, usage) = self.provider.complete(&system, &history, &tools).await?;
                    tally.add(&usage);
                    if response.has_tool_request() {
                        let (request, results) = self.answer_tool_requests(&response).await?;
                        history.push(request);
                        history.push(results);
                        Turn::AwaitingAnswer
                    } else {
                        Turn::Answered(response)
                    }
                }
                Turn::AwaitingAnswer => {
                    let (response, usage) = self.provider.complete(&system, &history, &[]).await?;
                    tally.add(&usage);
                    Turn::Answered(response)
                }
                Turn::Answered(response) => break response.text(),
            };
        };

        if answer.trim().is_empty() {
            return Err(ChatError::EmptyAnswer);
        }

        Ok(ChatReply {
            message: answer,
            model: tally.model,
            tokens_used: tally.tokens,
        })
    }

    fn system_prompt(&self, tools: &[Tool]) -> ChatResult<String> {
        let context = json!({
            "date": chrono::Local::now().format("%Y-%m-%d").to_string(),
            "max_results": self.config.limits.max_results,
            "tools": tools,
        });
        load_prompt_file("system.md", &context).map_err(|e| ChatError::Prompt(e.to_string()))
    }

    /// Run the first requested lookup. Any further request in the same turn is answered with an
    /// error so the dispatcher runs at most once per model turn.
    ///
    /// Returns the assistant message to keep in history and the message holding the results.
    async fn answer_tool_requests(&self, response: &Message) -> ChatResult<(Message, Message)> {
        let mut requests = response.tool_requests();
        let first: &ToolRequest = requests
            .next()
            .ok_or(ChatError::EmptyAnswer)?;

        let call = match &first.tool_call {
            Ok(call) => call,
            Err(ToolError::NotFound(reason)) => return Err(ChatError::UnknownFunction(reason.clone())),
            Err(other) => return Err(ChatError::invalid_arguments("unknown", other.to_string())),
        };

        tracing::debug!(function = %call.name, arguments = %call.arguments, "model requested a lookup");
        let output = self.dispatcher.run(call).await?.to_tool_output();

        let mut assistant = Message::assistant()
            .with_text(response.text())
            .with_tool_request(first.id.clone(), Ok(call.clone()));
        let mut results = Message::user().with_tool_response(first.id.clone(), Ok(output));

        for extra in requests {
            // Requests the model could not express are dropped from history entirely
            if let Ok(call) = &extra.tool_call {
                tracing::warn!(function = %call.name, "ignoring additional lookup in the same turn");
                assistant = assistant.with_tool_request(extra.id.clone(), Ok(call.clone()));
                results = results.with_tool_response(
                    extra.id.clone(),
                    Err(ToolError::Execution(
                        "Only one lookup can run per message; use the results already returned."
                            .to_string(),
                    )),
                );
            }
        }

        Ok((assistant, results))
    }
}

/// Reject conversations the model cannot meaningfully answer
pub fn validate_conversation(messages: &[ChatMessage]) -> ChatResult<()> {
    if messages.is_empty() {
        return Err(ChatError::InvalidRequest(
            "La lista de mensajes no puede estar vacía".to_string(),
        ));
    }
    if let Some(index) = messages.iter().position(|m| m.content.trim().is_empty()) {
        return Err(ChatError::InvalidRequest(format!(
            "El mensaje {} no tiene contenido",
            index
        )));
    }
    if !messages.iter().any(|m| m.role == Role::User) {
        return Err(ChatError::InvalidRequest(
            "Se necesita al menos un mensaje del usuario".to_string(),
        ));
    }
    Ok(())
}
