// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

// Runtime configuration.
//
// Everything is sourced from the environment with named defaults; there
// is no config file. Production mode refuses to start without a real
// SECRET_KEY.

mod error;

pub use error::ConfigError;

use std::fmt;
use std::str::FromStr;

/// Fallback secret for dev and test runs. Never valid in production.
pub const DEFAULT_SECRET_KEY: &str = "dev-key-for-development-only";

/// Run mode, selected by `RAGRELAY_ENV` / `--env`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Environment {
    pub fn is_debug(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Testing),
            "prod" => Ok(Environment::Production),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Development => "dev",
            Environment::Testing => "test",
            Environment::Production => "prod",
        };
        f.write_str(s)
    }
}

/// Where the upstream RAG provider lives and how to authenticate.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: String,
    pub api_key: String,
    pub agent_id: String,
}

impl UpstreamConfig {
    /// Origin used for both API calls and document-viewer links,
    /// e.g. `http://10.80.5.197:80`.
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Full relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub secret_key: String,
    pub upstream: UpstreamConfig,
    /// Language hint forwarded to the upstream completions call.
    pub lang: String,
    /// Example questions shown on the landing page.
    pub preset_questions: Vec<String>,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Load configuration from the environment for the given run mode.
///
/// Production fails fast when `SECRET_KEY` is unset or empty; dev and
/// test fall back to the development default.
pub fn load_config(environment: Environment) -> Result<Config, ConfigError> {
    let secret_key = match std::env::var("SECRET_KEY") {
        Ok(v) if !v.is_empty() => v,
        _ if environment == Environment::Production => {
            return Err(ConfigError::Validation(
                "no SECRET_KEY set for production environment".to_string(),
            ));
        }
        _ => DEFAULT_SECRET_KEY.to_string(),
    };

    Ok(Config {
        environment,
        secret_key,
        upstream: UpstreamConfig {
            host: env_or("RAGFLOW_HOST", "http://127.0.0.1"),
            port: env_or("RAGFLOW_PORT", "80"),
            api_key: env_or("RAGFLOW_API_KEY", ""),
            agent_id: env_or("RAGFLOW_AGENT_ID", ""),
        },
        lang: env_or("RAGRELAY_LANG", "Chinese"),
        preset_questions: default_preset_questions(),
    })
}

/// Compiled-in landing page questions. Static configuration, not part
/// of the relay core.
pub fn default_preset_questions() -> Vec<String> {
    [
        "What can I ask this assistant?",
        "Summarize this semester's average evaluation scores",
        "How do I export the evaluation data?",
        "Compare the score trends over the last three years",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
