#![doc(html_root_url = "https://docs.rs/keystone-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! A keyed DOM reconciler.
//!
//! [`update`] mutates the children of a live node so they match a [`Declaration`] tree,
//! reusing existing nodes by key (or position, for keyless siblings) instead of rebuilding them.
//! [`build`] creates a new detached node from a declaration.
//!
//! Both work on any [`Dom`]: [`WebDom`](`web::WebDom`) in the browser, [`MemoryDom`](`memory::MemoryDom`) anywhere else.
//!
//! # Logging
//!
//! Everything is instrumented through [`tracing`]. Text content is redacted unless the `dangerous-logging` feature is enabled.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod build;
pub mod declaration;
pub mod diff;
pub mod dom;
mod error;
pub mod flatten;
pub mod memory;
mod options;
mod patch;
mod rc_hash_map;
pub mod value;
pub mod web;

pub use build::build;
pub use declaration::{Child, Declaration, Handler, Listener, NodeRef};
pub use diff::update;
pub use dom::Dom;
pub use error::Error;
pub use options::Options;
pub use value::Value;

/// Hides page content from logs unless the `dangerous-logging` feature is enabled.
pub(crate) fn redact(text: &str) -> &str {
	if cfg!(feature = "dangerous-logging") {
		text
	} else {
		"[redacted]"
	}
}
