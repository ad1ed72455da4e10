//! Webchef: declarative recipe runner for browser sessions.
//!
//! A recipe names a URL and an ordered list of tasks. Each step dispatches to
//! a plugin command, optionally gated by `when`, capturing its result with
//! `register`, and tolerating failure with `ignore_errors`.

pub mod cli;
pub mod core;
pub mod journal;
pub mod logging;
pub mod plugins;
pub mod session;
