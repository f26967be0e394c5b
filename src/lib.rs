//! LegalCity enterprise case core.
//!
//! Secure case identifiers, legacy case migration, a tamper-evident audit
//! ledger, the phased case-association rollout and role-based access
//! policy, over an embedded libSQL store. An admin HTTP gateway and an
//! operator CLI sit on top.

pub mod app;
pub mod config;
pub mod db;
pub mod enterprise;
pub mod error;
pub mod settings;
pub mod web;
