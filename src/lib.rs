//! Transaction history core for a Solana lending program.
//!
//! The ledger only carries generic settled-transaction records; this crate
//! turns that feed into a domain-meaningful activity history for one
//! account: signature summaries first, then lazily decoded details with a
//! classified operation and a signed token-amount delta, served through a
//! throttled, TTL-cached, backoff-protected query surface.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod service;
