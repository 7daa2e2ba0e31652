// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared fixtures and a loopback transport that serves pages straight from
//! another node's store.

#![allow(dead_code)]

pub mod fixtures;
pub mod loopback;
