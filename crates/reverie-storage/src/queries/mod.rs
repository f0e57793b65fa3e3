// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per keyspace.

pub mod blobs;
pub mod dimensions;
pub mod records;
