//! Domain entities for BitTrickle.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code holds the core rules of the
//! application and never imports sockets, files, or the console, so it can be
//! tested in isolation with plain values.
//!
//! For BitTrickle the rules are:
//!
//! - who is logged in, from where, and when they were last heard from
//!   ([`session::SessionRegistry`]);
//! - which filenames each identity has announced, and how a search over the
//!   currently active identities is answered ([`catalog::FileCatalog`]);
//! - how a secret is checked ([`credentials::CredentialStore`]).
//!
//! Time is always passed in as an [`std::time::Instant`] rather than read from
//! the clock, so liveness rules can be tested without sleeping.

pub mod catalog;
pub mod credentials;
pub mod session;
