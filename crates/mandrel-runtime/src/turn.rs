//! Turn history: the canonical record, message conversion, fidelity
//! reduction, and tool-call loop detection (C5, §4.5).

use chrono::{DateTime, Utc};
use mandrel_llm::{Message, ToolCall, ToolCallResult, Usage};
use sha2::{Digest, Sha256};

/// One entry in a session's append-only history (§3).
#[derive(Debug, Clone)]
pub enum Turn {
    /// A message from the user.
    User {
        /// Turn content.
        content: String,
        /// When the turn was recorded.
        created_at: DateTime<Utc>,
    },
    /// A response from the model.
    Assistant {
        /// Text content, if any.
        content: String,
        /// Tool calls the model requested, in order.
        tool_calls: Vec<ToolCall>,
        /// Reasoning/chain-of-thought text, if the provider surfaced any.
        reasoning: Option<String>,
        /// Token usage for this turn.
        usage: Usage,
        /// Provider-assigned response id, if any.
        response_id: Option<String>,
        /// When the turn was recorded.
        created_at: DateTime<Utc>,
    },
    /// Results of dispatching an assistant turn's tool calls.
    ToolResults {
        /// One result per preceding tool call, same id order.
        results: Vec<ToolCallResult>,
        /// When the turn was recorded.
        created_at: DateTime<Utc>,
    },
    /// A system instruction turn (e.g. a synthesized context summary).
    System {
        /// Turn content.
        content: String,
        /// When the turn was recorded.
        created_at: DateTime<Utc>,
    },
    /// Operator-injected mid-loop guidance; surfaces to the model as a user
    /// message.
    Steering {
        /// Turn content.
        content: String,
        /// When the turn was recorded.
        created_at: DateTime<Utc>,
    },
}

impl Turn {
    /// Discriminator tag matching §3's literal kind names.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::ToolResults { .. } => "tool_results",
            Self::System { .. } => "system",
            Self::Steering { .. } => "steering",
        }
    }

    /// Creation timestamp, common to every variant.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::User { created_at, .. }
            | Self::Assistant { created_at, .. }
            | Self::ToolResults { created_at, .. }
            | Self::System { created_at, .. }
            | Self::Steering { created_at, .. } => *created_at,
        }
    }

    /// Build a user turn stamped with the current time.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Build a steering turn stamped with the current time.
    #[must_use]
    pub fn steering(content: impl Into<String>) -> Self {
        Self::Steering {
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Build a system turn stamped with the current time.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Convert a turn history into the message list a language-model request
/// carries (§4.5).
#[must_use]
pub fn to_messages(history: &[Turn]) -> Vec<Message> {
    let mut messages = Vec::new();
    for turn in history {
        match turn {
            Turn::System { content, .. } => messages.push(Message::system(content.clone())),
            Turn::User { content, .. } | Turn::Steering { content, .. } => {
                messages.push(Message::user(content.clone()));
            }
            Turn::Assistant {
                content,
                tool_calls,
                ..
            } => {
                if !content.is_empty() {
                    messages.push(Message::assistant(content.clone()));
                }
                if !tool_calls.is_empty() {
                    messages.push(Message::assistant_with_tools(tool_calls.clone()));
                }
            }
            Turn::ToolResults { results, .. } => {
                for result in results {
                    messages.push(Message::tool_result(result.clone()));
                }
            }
        }
    }
    messages
}

fn ceil_div(a: usize, b: usize) -> usize {
    a.div_ceil(b)
}

/// Reduce `history` to fit a context budget, per the mode string described
/// in §4.5. Histories shorter than 10 turns are always returned unchanged,
/// regardless of mode.
#[must_use]
pub fn apply_fidelity(history: &[Turn], mode: &str, _context_window_hint: usize) -> Vec<Turn> {
    let n = history.len();
    if n < 10 {
        return history.to_vec();
    }

    match mode {
        "" | "full" => history.to_vec(),
        "truncate" => {
            let head = leading_system_and_first_pair(history);
            let tail_len = ceil_div(2 * n, 3).max(6).min(n);
            let tail_start = (n - tail_len).max(head.len());
            let mut result = head;
            result.extend(history[tail_start..].iter().cloned());
            result
        }
        "compact" => {
            let keep_len = ceil_div(n, 4).max(4).min(n);
            let keep_start = n - keep_len;
            let mut result: Vec<Turn> = history
                .iter()
                .take(keep_start)
                .filter(|t| matches!(t, Turn::System { .. }))
                .cloned()
                .collect();
            result.extend(history[keep_start..].iter().cloned());
            result
        }
        _ if mode.starts_with("summary:") => {
            let level = mode.trim_start_matches("summary:");
            let k = match level {
                "low" => 4,
                "medium" => 3,
                "high" => 2,
                _ => return history.to_vec(),
            };
            let keep_len = ceil_div(n, k).max(4).min(n);
            let keep_start = n - keep_len;
            let summary = synthesize_summary(&history[..keep_start]);
            let mut result = vec![summary];
            result.extend(history[keep_start..].iter().cloned());
            result
        }
        _ => history.to_vec(),
    }
}

fn leading_system_and_first_pair(history: &[Turn]) -> Vec<Turn> {
    let mut head = Vec::new();
    let mut idx = 0;
    while idx < history.len() && matches!(history[idx], Turn::System { .. }) {
        head.push(history[idx].clone());
        idx += 1;
    }
    if let Some(user_idx) = (idx..history.len()).find(|&i| matches!(history[i], Turn::User { .. }))
    {
        head.push(history[user_idx].clone());
        if let Some(assistant) = history[user_idx + 1..]
            .iter()
            .find(|t| matches!(t, Turn::Assistant { .. }))
        {
            head.push(assistant.clone());
        }
    }
    head
}

fn synthesize_summary(older: &[Turn]) -> Turn {
    let mut user_count = 0;
    let mut assistant_count = 0;
    let mut tool_call_count = 0;
    let mut tool_names: Vec<String> = Vec::new();
    let mut last_user_request = String::new();

    for turn in older {
        match turn {
            Turn::User { content, .. } => {
                user_count += 1;
                last_user_request = content.clone();
            }
            Turn::Assistant { tool_calls, .. } => {
                assistant_count += 1;
                tool_call_count += tool_calls.len();
                for call in tool_calls {
                    if !tool_names.contains(&call.name) {
                        tool_names.push(call.name.clone());
                    }
                }
            }
            _ => {}
        }
    }

    let truncated_request: String = last_user_request.chars().take(200).collect();
    let content = format!(
        "[Context Summary] {user_count} user turns, {assistant_count} assistant turns, \
         {tool_call_count} tool calls (tools used: {}). Last user request: {truncated_request}",
        tool_names.join(", "),
    );
    Turn::system(content)
}

/// Length-1/2/3-periodic tool-call loop detector (§4.5).
///
/// Collects up to the last `window` tool-call signatures
/// (`name:hex(sha256(arguments)[:8])`) from assistant turns in
/// chronological order. Returns `false` if fewer than `window` signatures
/// are available.
#[must_use]
pub fn detect_loop(history: &[Turn], window: usize) -> bool {
    if window == 0 {
        return false;
    }

    let signatures: Vec<String> = history
        .iter()
        .filter_map(|t| match t {
            Turn::Assistant { tool_calls, .. } => Some(tool_calls),
            _ => None,
        })
        .flatten()
        .map(signature)
        .collect();

    if signatures.len() < window {
        return false;
    }

    let tail = &signatures[signatures.len() - window..];

    for p in [1usize, 2, 3] {
        if window % p != 0 {
            continue;
        }
        let first = &tail[..p];
        if tail.chunks(p).all(|chunk| chunk == first) {
            return true;
        }
    }
    false
}

fn signature(call: &ToolCall) -> String {
    let args_bytes = serde_json::to_vec(&call.arguments).unwrap_or_default();
    let digest = Sha256::digest(&args_bytes);
    format!("{}:{}", call.name, hex::encode(&digest[..4]))
}
