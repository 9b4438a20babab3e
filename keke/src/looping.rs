//! Conversation/action loop shared by `keke ask`, `keke research` and `keke code`.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::action::ToolResult;
use crate::core::tier::{Mode, ModelTier};
use crate::core::transcript::Conversation;
use crate::dispatch::{Dispatcher, describe_record, describe_tool_call, outcome_text};
use crate::io::prompter::Prompter;
use crate::io::remote::{RemoteAgent, RemoteReply, RoundPayload, RoundRequest};

/// Message sent in session mode when a round produced nothing to report.
const CONTINUE_MESSAGE: &str = "continue";

/// One user request and the selectors that travel with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub prompt: String,
    pub tier: ModelTier,
    pub mode: Mode,
    pub provider: Option<String>,
    pub max_iterations: u32,
}

/// Reason why `run_conversation` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The remote set `done`.
    Done,
    /// The remote requested no actions.
    NoActions,
    /// `max_iterations` rounds ran without the remote finishing.
    IterationLimit { max_iterations: u32 },
}

/// Summary of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub rounds: u32,
    pub credits: u64,
    /// Message of the last remote reply.
    pub final_message: String,
    pub stop: LoopStop,
}

/// Progress reported while the loop runs.
#[derive(Debug)]
pub enum LoopEvent<'a> {
    Reply {
        round: u32,
        reply: &'a RemoteReply,
    },
    ActionStarted {
        index: usize,
        total: usize,
        description: String,
    },
    ActionFinished {
        output: &'a str,
        error: Option<&'a str>,
    },
}

/// Drive remote rounds until the remote is done, requests nothing, or the
/// round cap is hit.
///
/// Actions run strictly in the order received; their outcomes are folded back
/// into the next round. Any remote failure aborts immediately.
pub fn run_conversation<R, P, F>(
    remote: &R,
    dispatcher: &Dispatcher<'_, P>,
    request: &AgentRequest,
    mut on_event: F,
) -> Result<LoopOutcome>
where
    R: RemoteAgent,
    P: Prompter,
    F: FnMut(LoopEvent<'_>),
{
    let mut convo = Conversation::new(request.prompt.as_str());
    let mut payload = if request.mode.uses_session() {
        RoundPayload::Message {
            text: request.prompt.clone(),
            session: None,
        }
    } else {
        RoundPayload::Transcript(convo.turns().to_vec())
    };
    let mut final_message = String::new();

    loop {
        if convo.rounds() >= request.max_iterations {
            warn!(max_iterations = request.max_iterations, "iteration cap reached");
            return Ok(LoopOutcome {
                rounds: convo.rounds(),
                credits: convo.credits(),
                final_message,
                stop: LoopStop::IterationLimit {
                    max_iterations: request.max_iterations,
                },
            });
        }

        let round_request = RoundRequest {
            tier: request.tier,
            mode: request.mode,
            provider: request.provider.clone(),
            payload,
        };
        let reply = remote.exchange(&round_request)?;
        convo.record_round(reply.credits_used, reply.session_id.clone());
        debug!(
            round = convo.rounds(),
            actions = reply.action_count(),
            credits = reply.credits_used,
            done = reply.done,
            "remote round"
        );
        on_event(LoopEvent::Reply {
            round: convo.rounds(),
            reply: &reply,
        });
        convo.push_assistant(reply.message.as_str());
        final_message.clone_from(&reply.message);

        if reply.action_count() == 0 {
            let stop = if reply.done {
                LoopStop::Done
            } else {
                LoopStop::NoActions
            };
            info!(rounds = convo.rounds(), credits = convo.credits(), "conversation finished");
            return Ok(LoopOutcome {
                rounds: convo.rounds(),
                credits: convo.credits(),
                final_message,
                stop,
            });
        }

        let results = dispatch_round(dispatcher, &reply, &mut on_event);

        if reply.done {
            info!(rounds = convo.rounds(), credits = convo.credits(), "conversation finished");
            return Ok(LoopOutcome {
                rounds: convo.rounds(),
                credits: convo.credits(),
                final_message,
                stop: LoopStop::Done,
            });
        }

        payload = next_payload(request.mode, &mut convo, results);
    }
}

/// Outcomes of one round, split by how they must travel back.
struct RoundResults {
    /// `Action result: …` lines for flat records.
    record_lines: Vec<String>,
    tool_results: Vec<ToolResult>,
}

fn dispatch_round<P, F>(
    dispatcher: &Dispatcher<'_, P>,
    reply: &RemoteReply,
    on_event: &mut F,
) -> RoundResults
where
    P: Prompter,
    F: FnMut(LoopEvent<'_>),
{
    let total = reply.action_count();
    let mut results = RoundResults {
        record_lines: Vec::with_capacity(reply.actions.len()),
        tool_results: Vec::with_capacity(reply.tool_calls.len()),
    };

    for (offset, record) in reply.actions.iter().enumerate() {
        on_event(LoopEvent::ActionStarted {
            index: offset + 1,
            total,
            description: describe_record(record),
        });
        let outcome = dispatcher.dispatch_record(record.clone());
        let text = outcome_text(&outcome);
        match &outcome {
            Ok(output) => on_event(LoopEvent::ActionFinished {
                output: output.as_str(),
                error: None,
            }),
            Err(_) => on_event(LoopEvent::ActionFinished {
                output: "",
                error: Some(text.as_str()),
            }),
        }
        results.record_lines.push(format!("Action result: {text}"));
    }

    for (offset, call) in reply.tool_calls.iter().enumerate() {
        on_event(LoopEvent::ActionStarted {
            index: reply.actions.len() + offset + 1,
            total,
            description: describe_tool_call(call),
        });
        let result = dispatcher.dispatch_tool_call(call);
        on_event(LoopEvent::ActionFinished {
            output: &result.output,
            error: result.error.as_deref(),
        });
        results.tool_results.push(result);
    }

    results
}

fn next_payload(mode: Mode, convo: &mut Conversation, results: RoundResults) -> RoundPayload {
    let RoundResults {
        record_lines,
        tool_results,
    } = results;

    if !mode.uses_session() {
        for line in record_lines {
            convo.push_user(line);
        }
        for result in tool_results {
            convo.push_user(format!("Action result: {}", tool_result_text(&result)));
        }
        return RoundPayload::Transcript(convo.turns().to_vec());
    }

    let session = convo.session().map(str::to_string);
    if !tool_results.is_empty() {
        return RoundPayload::ToolResults {
            results: tool_results,
            session,
        };
    }
    let text = if record_lines.is_empty() {
        CONTINUE_MESSAGE.to_string()
    } else {
        record_lines.join("\n")
    };
    convo.push_user(text.as_str());
    RoundPayload::Message { text, session }
}

fn tool_result_text(result: &ToolResult) -> String {
    match &result.error {
        Some(error) if result.output.is_empty() => error.clone(),
        Some(error) => format!("{error}\nOutput: {}", result.output),
        None => result.output.clone(),
    }
}
