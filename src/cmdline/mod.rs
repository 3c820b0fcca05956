// src/cmdline/mod.rs

//! Command-line string handling.
//!
//! Two inverse concerns live here:
//!
//! - [`tokenize`] splits a raw shell-like command string into an argv,
//!   honouring quoting and escaping rules.
//! - [`quote`] renders a single argument back into a platform-correct
//!   command-line token for one of the supported [`QuoteDialect`]s.
//!
//! Raw command strings and argv forms are only ever converted through these
//! two functions; nothing else in the crate splits or joins command lines
//! ad hoc.

pub mod quote;
pub mod tokenize;

pub use quote::{join, quote, QuoteDialect};
pub use tokenize::tokenize;
