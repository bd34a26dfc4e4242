//! Provider profiles: per-vendor capability flags and tool roster (C11,
//! §4.11).

use std::sync::Arc;

use mandrel_tools::{ProviderDocFilter, ToolRegistry};

/// Capability and prompt-assembly surface a conversation loop needs from
/// whichever vendor it is talking to.
///
/// Concrete profiles share the same core tool registry (direct editor plus
/// v4a patch tool) and differ mainly in their concurrency/reasoning/context
/// flags and doc filter; the conversation loop itself is vendor-agnostic.
pub trait ProviderProfile: Send + Sync {
    /// Stable identifier stamped onto outgoing requests.
    fn id(&self) -> &str;

    /// Model identifier to request when a session doesn't override it.
    fn default_model(&self) -> &str;

    /// Opening system-prompt text, before the environment/tool/doc blocks.
    fn base_prompt(&self) -> &str;

    /// This profile's tool registry.
    fn tools(&self) -> &ToolRegistry;

    /// Provider-specific project-doc filter for system prompt assembly.
    fn doc_filter(&self) -> ProviderDocFilter;

    /// Free-form provider options merged into every request.
    fn provider_options(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Whether this provider can execute multiple tool calls from one
    /// assistant turn concurrently.
    fn parallel_tool_calls(&self) -> bool;

    /// Whether this provider surfaces reasoning/chain-of-thought text.
    fn reasoning(&self) -> bool;

    /// Whether this provider supports streaming responses.
    fn streaming(&self) -> bool;

    /// Context window size, in tokens, this provider advertises.
    fn context_window_size(&self) -> usize;
}

/// The shared core tool set every provider profile builds from: the
/// built-in registry defaults (including the direct `edit_file` editor)
/// plus the v4a `apply_patch` tool. `mandrel-tools` can't register
/// `apply_patch` itself — `mandrel-patch` depends on `mandrel-tools` for
/// [`mandrel_tools::ExecutionEnvironment`], so the reverse dependency would
/// cycle — so this crate, which depends on both, is where the union lives.
fn core_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::with_defaults();
    registry
        .register(Box::new(mandrel_patch::ApplyPatchTool))
        .expect("apply_patch is a non-empty tool name");
    registry
}

/// Anthropic-style profile: direct file-editing tool plus the v4a patch
/// tool, parallel tool calls, streaming, reasoning, and a 200k-token
/// window.
pub struct AnthropicProfile {
    tools: ToolRegistry,
}

impl AnthropicProfile {
    /// Build the profile with its default tool roster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: core_registry(),
        }
    }
}

impl Default for AnthropicProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderProfile for AnthropicProfile {
    fn id(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        "claude-opus-4"
    }

    fn base_prompt(&self) -> &str {
        "You are a careful, autonomous coding agent."
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn doc_filter(&self) -> ProviderDocFilter {
        ProviderDocFilter::Anthropic
    }

    fn parallel_tool_calls(&self) -> bool {
        true
    }

    fn reasoning(&self) -> bool {
        true
    }

    fn streaming(&self) -> bool {
        true
    }

    fn context_window_size(&self) -> usize {
        200_000
    }
}

/// OpenAI-style profile: same shared core tool set as [`AnthropicProfile`],
/// same concurrency/reasoning/streaming flags.
pub struct OpenAiProfile {
    tools: ToolRegistry,
}

impl OpenAiProfile {
    /// Build the profile with its default tool roster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: core_registry(),
        }
    }
}

impl Default for OpenAiProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderProfile for OpenAiProfile {
    fn id(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        "gpt-5"
    }

    fn base_prompt(&self) -> &str {
        "You are a careful, autonomous coding agent."
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn doc_filter(&self) -> ProviderDocFilter {
        ProviderDocFilter::OpenAi
    }

    fn parallel_tool_calls(&self) -> bool {
        true
    }

    fn reasoning(&self) -> bool {
        true
    }

    fn streaming(&self) -> bool {
        true
    }

    fn context_window_size(&self) -> usize {
        200_000
    }
}

/// Gemini-style profile: direct editor, no parallel tool calls, a
/// 1M-token window.
pub struct GeminiProfile {
    tools: ToolRegistry,
}

impl GeminiProfile {
    /// Build the profile with its default tool roster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: core_registry(),
        }
    }
}

impl Default for GeminiProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderProfile for GeminiProfile {
    fn id(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        "gemini-2.5-pro"
    }

    fn base_prompt(&self) -> &str {
        "You are a careful, autonomous coding agent."
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn doc_filter(&self) -> ProviderDocFilter {
        ProviderDocFilter::Gemini
    }

    fn parallel_tool_calls(&self) -> bool {
        false
    }

    fn reasoning(&self) -> bool {
        true
    }

    fn streaming(&self) -> bool {
        true
    }

    fn context_window_size(&self) -> usize {
        1_000_000
    }
}

/// Convenience alias for a profile stored behind an `Arc` for sharing
/// across a session and its subagents.
pub type SharedProfile = Arc<dyn ProviderProfile>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_profile_registers_direct_editor_and_patch_tool() {
        let profile = AnthropicProfile::new();
        assert!(profile.tools().has("edit_file"));
        assert!(profile.tools().has("apply_patch"));
        assert!(profile.parallel_tool_calls());
    }

    #[test]
    fn openai_profile_registers_patch_tool() {
        let profile = OpenAiProfile::new();
        assert!(profile.tools().has("apply_patch"));
    }

    #[test]
    fn gemini_profile_disables_parallel_tool_calls() {
        let profile = GeminiProfile::new();
        assert!(!profile.parallel_tool_calls());
        assert_eq!(profile.context_window_size(), 1_000_000);
    }
}
