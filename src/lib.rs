//! StickySync engine library
//!
//! Local-first sync and alarm engine for a shared sticky-notes pool:
//! an embedded SQLite store, a cursor-based pull/ack sync engine and a
//! due-scan alarm scheduler. UI collaborators subscribe to the event bus
//! and implement the alert-sink contract.

pub mod alarm;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod events;
pub mod services;
pub mod session;
pub mod sync;
