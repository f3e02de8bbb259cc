//! Descent — chat-bot front end for the Eternity's Descent dungeon crawler.
//!
//! The game itself (combat math, loot tables, economy, narrative) lives in
//! an external HTTP service. This crate turns chat commands into service
//! calls, renders the results, and runs the interactive sessions — the
//! time-boxed, single-owner button exchanges bound to one message — that
//! every multi-step command is built on.
//!
//! Module map:
//! - [`session`] — the interaction session engine (the core)
//! - [`chat`] — gateway management and the outbound rendering port
//! - [`client`] — HTTP client for the game service
//! - [`commands`] — the command handlers wiring the two together
//! - [`config`] — YAML configuration with env expansion

pub mod chat;
pub mod client;
pub mod commands;
pub mod config;
pub mod session;
