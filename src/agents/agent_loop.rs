use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::conversation::{ConversationManager, ProviderTokenCounter};
use crate::errors::FlaghuntError;
use crate::llm::Message;
use crate::tools::{ToolExecutor, Toolbox};
use super::prompts;

/// Upper-cased markers that end the loop when they appear in a reply
/// without tool calls.
pub const SOLVED_MARKERS: [&str; 3] = ["CHALLENGE SOLVED", "FLAG{", "CTF{"];

pub fn is_solved(content: &str) -> bool {
    let upper = content.to_uppercase();
    SOLVED_MARKERS.iter().any(|m| upper.contains(m))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Solved,
    MessageLimit,
    NoToolCalls,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Content of the last assistant message.
    pub final_answer: String,
    pub history: Vec<Message>,
    pub tool_calls: usize,
    pub stop: StopReason,
}

/// Model/tool alternation over one growing history.
pub struct AgentLoop<'a> {
    ctx: &'a RunContext,
    tools: &'a dyn ToolExecutor,
    max_messages: usize,
}

impl<'a> AgentLoop<'a> {
    pub fn new(ctx: &'a RunContext, tools: &'a dyn ToolExecutor) -> Self {
        Self { ctx, tools, max_messages: ctx.config().agent.max_messages }
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub async fn run(&self, system: &str, input: &str) -> Result<AgentOutcome, FlaghuntError> {
        self.run_history(vec![Message::system(system), Message::user(input)]).await
    }

    pub async fn run_history(&self, mut history: Vec<Message>) -> Result<AgentOutcome, FlaghuntError> {
        let manager = ConversationManager::new(
            self.ctx.config().llm.token_ceiling,
            ProviderTokenCounter::new(self.ctx.llm()),
        );
        let definitions = self.tools.definitions();
        let mut tool_calls = 0usize;

        let stop = loop {
            let trimmed = manager.trim(&history)?;
            debug!(history = history.len(), sent = trimmed.len(), "Invoking model");
            let reply = self.ctx.invoke(&trimmed, &definitions).await?.into_message();
            let calls = reply.tool_calls.clone();
            let solved = calls.is_empty() && is_solved(&reply.content);
            history.push(reply);

            if solved {
                info!("Model reported the challenge solved");
                break StopReason::Solved;
            }
            if calls.is_empty() {
                break StopReason::NoToolCalls;
            }

            // strictly sequential, one result per call
            for call in &calls {
                debug!(tool = %call.name, id = %call.id, "Executing tool call");
                let output = match self.tools.execute(call).await {
                    Ok(text) => text,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool call failed");
                        format!("Error: {}", e)
                    }
                };
                history.push(Message::tool_result(call, &output));
                tool_calls += 1;
            }

            // checked after the results so every call stays answered
            if history.len() > self.max_messages {
                warn!(max_messages = self.max_messages, "Message limit reached");
                break StopReason::MessageLimit;
            }
        };

        let final_answer = history
            .iter()
            .rev()
            .find(|m| m.role == crate::llm::Role::Assistant)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(AgentOutcome { final_answer, history, tool_calls, stop })
    }
}

/// One loop over the run's toolbox for a workflow stage. Stage-local
/// failures come back as `Err(message)`; fatal ones propagate.
pub async fn agent_pass(ctx: &RunContext, system: &str, input: &str) -> Result<Result<String, String>, FlaghuntError> {
    let toolbox = Toolbox::new(ctx);
    match AgentLoop::new(ctx, &toolbox).run(system, input).await {
        Ok(outcome) => Ok(Ok(outcome.final_answer)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(error = %e, "Agent pass failed");
            Ok(Err(e.to_string()))
        }
    }
}

/// Direct solve mode: one agent loop with every tool bound.
pub struct Solver {
    ctx: RunContext,
    tools: Option<Box<dyn ToolExecutor>>,
}

impl Solver {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx, tools: None }
    }

    /// Replace the toolbox built over the run context.
    pub fn with_tools(mut self, tools: Box<dyn ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Run the loop for `challenge_input` and return the last assistant
    /// message. The run context is released on every path.
    pub async fn solve(&self, challenge_input: &str) -> Result<String, FlaghuntError> {
        let input = prompts::render(prompts::CHALLENGE_INPUT, &[("INPUT", challenge_input)]);
        let result = match &self.tools {
            Some(tools) => AgentLoop::new(&self.ctx, tools.as_ref()).run(prompts::SOLVER_SYSTEM, &input).await,
            None => {
                let toolbox = Toolbox::new(&self.ctx);
                AgentLoop::new(&self.ctx, &toolbox).run(prompts::SOLVER_SYSTEM, &input).await
            }
        };
        self.ctx.close().await;

        let outcome = result?;
        info!(
            stop = ?outcome.stop,
            tool_calls = outcome.tool_calls,
            messages = outcome.history.len(),
            "Solve finished"
        );
        Ok(outcome.final_answer)
    }
}
