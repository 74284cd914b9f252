// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Module handling.
//!
//! A __module__ is a file that contributes to the user's shell environment.
//! Bash-bootstrap knows two kinds of modules:
//!
//! 1. __Sourced modules__ live in the module payload that gets copied into a
//!    version directory. The startup file sources each of them in priority
//!    order, see [`list`].
//! 2. __Download modules__ are one-shot executables that perform setup which
//!    cannot be expressed as a sourced shell snippet, e.g., fetching a tool.
//!    They run once per convergence, see [`activate`].
//!
//! Neither kind has a prescribed internal format. Bash-bootstrap treats their
//! content as opaque.

pub mod activate;
pub mod list;
