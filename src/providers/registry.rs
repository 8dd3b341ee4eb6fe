//! Per-kind provider policy.
//!
//! Each supported provider kind is described by a static [`ProviderDescriptor`]
//! that the configuration layer uses for validation and the routing layer uses
//! to pick an upstream adapter. Every lookup here is total over [`ProviderKind`];
//! unrecognized kind strings are rejected when parsed, not here.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Anthropic API version sent in the `anthropic-version` header.
pub const ANTHROPIC_DEFAULT_VERSION: &str = "2023-06-01";

/// Azure OpenAI API version sent as the `api-version` query parameter.
pub const AZURE_DEFAULT_VERSION: &str = "2024-02-15-preview";

/// Closed set of upstream provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
pub enum ProviderKind {
    /// OpenAI chat completions API (and OpenAI-compatible endpoints).
    #[serde(rename = "openai")]
    OpenAi,
    /// OpenAI Responses API.
    #[serde(rename = "openai-responses")]
    OpenAiResponses,
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Azure OpenAI deployments.
    #[serde(rename = "azure")]
    Azure,
    #[serde(rename = "ollama")]
    Ollama,
}

impl ProviderKind {
    /// Returns the string representation used in storage and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::OpenAiResponses => "openai-responses",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Azure => "azure",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Returns all supported kinds.
    pub fn all_values() -> &'static [ProviderKind] {
        &[
            ProviderKind::OpenAi,
            ProviderKind::OpenAiResponses,
            ProviderKind::Anthropic,
            ProviderKind::Azure,
            ProviderKind::Ollama,
        ]
    }

    /// Returns all supported kind names as strings.
    pub fn all_names() -> Vec<&'static str> {
        Self::all_values().iter().map(|k| k.as_str()).collect()
    }

    /// Describe the policy for this kind.
    pub fn describe(self) -> ProviderDescriptor {
        match self {
            ProviderKind::OpenAi => ProviderDescriptor {
                kind: self,
                requires_api_version: false,
                default_version_hint: "",
                version_transport: None,
                auth_scheme: AuthScheme::Bearer,
                default_base_url: Some("https://api.openai.com/v1"),
                capabilities: ProviderCapabilities {
                    chat_completions: true,
                    responses: false,
                    messages: false,
                    embeddings: true,
                },
            },
            ProviderKind::OpenAiResponses => ProviderDescriptor {
                kind: self,
                requires_api_version: false,
                default_version_hint: "",
                version_transport: None,
                auth_scheme: AuthScheme::Bearer,
                default_base_url: Some("https://api.openai.com/v1"),
                capabilities: ProviderCapabilities {
                    chat_completions: false,
                    responses: true,
                    messages: false,
                    embeddings: false,
                },
            },
            ProviderKind::Anthropic => ProviderDescriptor {
                kind: self,
                requires_api_version: true,
                default_version_hint: ANTHROPIC_DEFAULT_VERSION,
                version_transport: Some(VersionTransport::Header("anthropic-version")),
                auth_scheme: AuthScheme::XApiKey,
                default_base_url: Some("https://api.anthropic.com/v1"),
                capabilities: ProviderCapabilities {
                    chat_completions: false,
                    responses: false,
                    messages: true,
                    embeddings: false,
                },
            },
            ProviderKind::Azure => ProviderDescriptor {
                kind: self,
                requires_api_version: true,
                default_version_hint: AZURE_DEFAULT_VERSION,
                version_transport: Some(VersionTransport::Query("api-version")),
                auth_scheme: AuthScheme::ApiKeyHeader,
                // Azure endpoints are per-resource; there is no global default.
                default_base_url: None,
                capabilities: ProviderCapabilities {
                    chat_completions: true,
                    responses: false,
                    messages: false,
                    embeddings: true,
                },
            },
            ProviderKind::Ollama => ProviderDescriptor {
                kind: self,
                requires_api_version: false,
                default_version_hint: "",
                version_transport: None,
                auth_scheme: AuthScheme::None,
                default_base_url: Some("http://localhost:11434"),
                capabilities: ProviderCapabilities {
                    chat_completions: true,
                    responses: false,
                    messages: false,
                    embeddings: true,
                },
            },
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderKind::OpenAi),
            "openai-responses" => Ok(ProviderKind::OpenAiResponses),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "azure" => Ok(ProviderKind::Azure),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(format!(
                "Unsupported provider kind '{}'. Supported kinds: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// How a provider authenticates outbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>`
    XApiKey,
    /// `api-key: <key>`
    ApiKeyHeader,
    /// No credentials (local servers).
    None,
}

/// Where the API version travels on outbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "in", content = "name", rename_all = "snake_case")]
pub enum VersionTransport {
    Header(&'static str),
    Query(&'static str),
}

/// Endpoint families an upstream can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderCapabilities {
    pub chat_completions: bool,
    pub responses: bool,
    pub messages: bool,
    pub embeddings: bool,
}

/// Uniform description of a provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    /// Whether a non-empty API version must be configured.
    pub requires_api_version: bool,
    /// Recommended API version literal. Only a configuration hint, never enforced.
    pub default_version_hint: &'static str,
    pub version_transport: Option<VersionTransport>,
    pub auth_scheme: AuthScheme,
    pub default_base_url: Option<&'static str>,
    pub capabilities: ProviderCapabilities,
}

/// Whether `kind` needs an API version. An absent kind never does.
pub fn requires_api_version(kind: Option<ProviderKind>) -> bool {
    kind.is_some_and(|k| k.describe().requires_api_version)
}

/// Recommended API version for `kind`, or `""` when not applicable.
pub fn default_version_hint(kind: Option<ProviderKind>) -> &'static str {
    kind.map_or("", |k| k.describe().default_version_hint)
}
