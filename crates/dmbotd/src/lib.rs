#![cfg_attr(docsrs, feature(doc_cfg))]

//! Library components for the dmbot daemon.
//!
//! # Overview
//! This crate exposes:
//! - [`config::Config`]: daemon configuration loaded from
//!   `/etc/dmbotd/config.toml` with environment and CLI overrides.
//! - [`router::Router`]: the single entry point turning command envelopes
//!   into responses.
//! - [`lifecycle::Lifecycle`]: start, stop and hot reload of the one
//!   [`bot::Bot`] instance.
//! - [`store::ConfigStore`] and [`validation`]: the bot settings and the
//!   form pipeline that edits them.
//! - [`supervisor::run`]: the daemon itself, serving the router over a Unix
//!   socket.
//!
//! # Examples
//! ```rust,no_run
//! use dmbotd::config::Config;
//!
//! let cfg = Config::load().expect("configuration must be valid");
//! println!("socket: {}", cfg.socket_path.display());
//! ```
pub mod bot;
pub mod config;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod logs;
pub mod router;
pub mod settings;
pub mod store;
pub mod supervisor;
pub mod validation;

#[cfg(test)]
mod testing;
