// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

pub mod config;
pub mod relay;
pub mod sanitize;
pub mod server;
pub mod session;
pub mod upstream;
