use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, maps to `aria.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AriaConfig {
    pub agent: AgentConfig,
    pub services: ServicesConfig,
    pub automation: AutomationConfig,
    pub api: ApiConfig,
    pub bridge: BridgeConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier sent to the provider, e.g. "claude-opus-4-6".
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Maximum model calls per user message before the loop gives up.
    pub max_iterations: u32,
    /// System prompt override. `None` uses the built-in operator prompt.
    pub system_prompt: Option<String>,
    /// Path to a file containing the system prompt (overrides `system_prompt`).
    pub system_prompt_file: Option<PathBuf>,
    /// Maximum characters per tool result. Longer results are truncated with a note.
    /// Set to 0 to disable truncation.
    pub tool_result_max_chars: usize,
    /// Maximum turns kept in a session's history window.
    pub history_max_turns: usize,
    /// Maximum estimated tokens kept in a session's history window.
    pub history_max_tokens: usize,
    /// Read timeout for a single LLM HTTP request.
    pub request_timeout_secs: u64,
    /// Connect timeout for the LLM HTTP client.
    pub connect_timeout_secs: u64,
    /// Calls allowed per tool in any 60-second window. 0 disables the limit.
    pub tool_rate_limit_per_minute: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-opus-4-6".into(),
            max_tokens: 4096,
            max_iterations: 5,
            system_prompt: None,
            system_prompt_file: None,
            tool_result_max_chars: 12_000,
            history_max_turns: 40,
            history_max_tokens: 180_000,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            tool_rate_limit_per_minute: 30,
        }
    }
}

// ── Services ───────────────────────────────────────────────────

/// Third-party service credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Anthropic API key. Falls back to `ANTHROPIC_API_KEY`.
    pub anthropic_api_key: Option<String>,
    /// Base URL of the messages API, without the `/messages` suffix.
    pub anthropic_base_url: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            anthropic_base_url: "https://api.anthropic.com/v1".into(),
        }
    }
}

// ── Automation server ──────────────────────────────────────────

/// The line-delimited JSON automation server (`aria serve`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Address to bind, e.g. "127.0.0.1:7765".
    pub listen: String,
    /// Per-command timeout in milliseconds.
    pub command_timeout_ms: u64,
    /// Name reported by `ping`.
    pub service_name: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7765".into(),
            command_timeout_ms: 10_000,
            service_name: "aria-accessibility".into(),
        }
    }
}

// ── HTTP API ───────────────────────────────────────────────────

/// The JSON-over-HTTP chat API (`aria serve-api`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen: String,
    /// Answer CORS preflights from any origin, for browser front ends.
    pub cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8765".into(),
            cors: false,
        }
    }
}

// ── Bridge (automation client) ─────────────────────────────────

/// Where the host-side tools reach the automation server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    /// Run `adb forward tcp:<port> tcp:<port>` before the first connection.
    pub adb_forward: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7765,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 10_000,
            adb_forward: false,
        }
    }
}

impl BridgeConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Device ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Path to the `adb` executable.
    pub adb_path: String,
    /// Device serial. `None` lets adb pick the only attached device.
    pub serial: Option<String>,
    /// Timeout for a single adb invocation.
    pub command_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".into(),
            serial: None,
            command_timeout_secs: 30,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
        };
        write!(f, "{} {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl AriaConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Agent ───
        if self.agent.model.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "agent.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'claude-opus-4-6'".into()),
            });
        }

        if self.agent.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "agent.max_tokens".into(),
                message: "max_tokens is 0, the model cannot produce output".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 4096".into()),
            });
        }

        if self.agent.max_iterations == 0 {
            warnings.push(ConfigWarning {
                field: "agent.max_iterations".into(),
                message: "max_iterations is 0, no model call would ever be made".into(),
                severity: WarningSeverity::Error,
                hint: Some("The default is 5".into()),
            });
        } else if self.agent.max_iterations > 25 {
            warnings.push(ConfigWarning {
                field: "agent.max_iterations".into(),
                message: format!("max_iterations {} is very high", self.agent.max_iterations),
                severity: WarningSeverity::Warning,
                hint: Some("Each iteration is a paid model call".into()),
            });
        }

        if self.agent.history_max_turns < 4 {
            warnings.push(ConfigWarning {
                field: "agent.history_max_turns".into(),
                message: format!(
                    "history window of {} turns cannot hold a single tool exchange",
                    self.agent.history_max_turns
                ),
                severity: WarningSeverity::Warning,
                hint: Some("The current exchange is always kept regardless".into()),
            });
        }

        // ── Services ───
        if self.services.anthropic_api_key.as_deref().is_none_or(str::is_empty) {
            warnings.push(ConfigWarning {
                field: "services.anthropic_api_key".into(),
                message: "no Anthropic API key configured, LLM calls will fail".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set services.anthropic_api_key or ANTHROPIC_API_KEY".into()),
            });
        }

        // ── Automation server ───
        if self.automation.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "automation.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:7765'".into()),
            });
        } else if self.automation.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "automation.listen".into(),
                message: "binding to 0.0.0.0, anyone on the network can drive the UI".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use '127.0.0.1:7765' and reach it through adb forward".into()),
            });
        }

        if self.automation.command_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                field: "automation.command_timeout_ms".into(),
                message: "command timeout is 0, every command would time out".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 10000".into()),
            });
        }

        // ── HTTP API ───
        if self.api.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "api.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:8765'".into()),
            });
        } else if self.api.listen == self.automation.listen {
            warnings.push(ConfigWarning {
                field: "api.listen".into(),
                message: "HTTP API and automation server share one address".into(),
                severity: WarningSeverity::Error,
                hint: Some("Give them different ports".into()),
            });
        }

        // ── Bridge ───
        if self.bridge.port == 0 {
            warnings.push(ConfigWarning {
                field: "bridge.port".into(),
                message: "bridge port is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("The automation service listens on 7765 by default".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
