//! Server configuration (spec §6 "Configuration"), via `clap` the way the
//! teacher's `main.rs` already parsed CLI flags — generalized from the
//! file-scanning subcommands to the gateway's server flags.

use clap::Parser;

/// Server-level sampling defaults, overridable per-request (spec §4.7).
#[derive(Debug, Clone, Default)]
pub struct ServerDefaults {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub min_p: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub repetition_penalty: Option<f32>,
    pub seed: Option<i64>,
    pub max_tokens: Option<u32>,
    pub max_logprobs: u32,
}

impl ServerDefaults {
    fn default_max_logprobs() -> u32 {
        20
    }
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "gateway",
    about = "OpenAI-compatible chat-completions gateway for local on-device model backends"
)]
pub struct Config {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "GATEWAY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP server to.
    #[arg(long, env = "GATEWAY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Disables SSE streaming; `stream: true` requests are served as if
    /// `stream: false`.
    #[arg(long, env = "GATEWAY_STREAMING_ENABLED", default_value_t = true)]
    pub streaming_enabled: bool,

    #[arg(long, env = "GATEWAY_TEMPERATURE")]
    pub temperature: Option<f32>,
    #[arg(long = "top-p", env = "GATEWAY_TOP_P")]
    pub top_p: Option<f32>,
    #[arg(long = "top-k", env = "GATEWAY_TOP_K")]
    pub top_k: Option<u32>,
    #[arg(long = "min-p", env = "GATEWAY_MIN_P")]
    pub min_p: Option<f32>,
    #[arg(long = "presence-penalty", env = "GATEWAY_PRESENCE_PENALTY")]
    pub presence_penalty: Option<f32>,
    #[arg(long = "repetition-penalty", env = "GATEWAY_REPETITION_PENALTY")]
    pub repetition_penalty: Option<f32>,
    #[arg(long, env = "GATEWAY_SEED")]
    pub seed: Option<i64>,
    #[arg(long = "max-tokens", env = "GATEWAY_MAX_TOKENS")]
    pub max_tokens: Option<u32>,
    #[arg(long = "max-logprobs", env = "GATEWAY_MAX_LOGPROBS", default_value_t = ServerDefaults::default_max_logprobs())]
    pub max_logprobs: u32,

    /// Diagnostic logging of every request/response/delta.
    #[arg(long = "very-verbose", env = "GATEWAY_VERY_VERBOSE", default_value_t = false)]
    pub very_verbose: bool,

    /// Suppress think-tag extraction for non-browser clients: `content`
    /// carries the raw, unsplit generator text instead of `reasoning_content`.
    #[arg(long = "raw-output", env = "GATEWAY_RAW_OUTPUT", default_value_t = false)]
    pub raw_output: bool,

    /// Enable the heuristic argument-key remap fallback (spec §4.3).
    #[arg(long = "fix-tool-args", env = "GATEWAY_FIX_TOOL_ARGS", default_value_t = false)]
    pub fix_tool_args: bool,

    /// Base URL of the platform foundation-model service. Requests for
    /// `model: "foundation"` are forwarded here verbatim with no protocol
    /// translation; unset means the foundation backend isn't registered.
    #[arg(long = "foundation-url", env = "GATEWAY_FOUNDATION_URL")]
    pub foundation_url: Option<String>,
}

impl Config {
    pub fn server_defaults(&self) -> ServerDefaults {
        ServerDefaults {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            min_p: self.min_p,
            presence_penalty: self.presence_penalty,
            repetition_penalty: self.repetition_penalty,
            seed: self.seed,
            max_tokens: self.max_tokens,
            max_logprobs: self.max_logprobs,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Config::command().debug_assert();
    }

    #[test]
    fn default_max_logprobs_matches_spec() {
        let config = Config::parse_from(["gateway"]);
        assert_eq!(config.max_logprobs, 20);
        assert!(config.streaming_enabled);
    }
}
