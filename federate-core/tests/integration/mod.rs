// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integration Tests for Federate Core
//!
//! Full pulls between in-process nodes: reconciliation, pagination, cursor
//! handling, inbound authentication and the cache mirror.
//!
//! Run with: cargo test --test integration

#[path = "../common/mod.rs"]
mod common;

mod auth_workflow_test;
mod cursor_workflow_test;
mod pagination_workflow_test;
mod replication_workflow_test;
