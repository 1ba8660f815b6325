// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

/// All errors that can occur during config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown run mode \"{0}\" (expected dev, test, or prod)")]
    UnknownMode(String),
}
