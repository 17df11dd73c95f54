//! The seam between the reconciler and a concrete document.
//!
//! Implemented by [`MemoryDom`](`crate::memory::MemoryDom`) (headless) and [`WebDom`](`crate::web::WebDom`) (browser).

use crate::{declaration::Namespace, value::Value, Declaration, Error, Listener};
use core::fmt::Debug;
use futures::future::LocalBoxFuture;
use std::rc::Rc;

/// The name of the attribute that marks keyed elements, unless disabled through [`Options`](`crate::Options`).
pub const KEY_ATTRIBUTE: &str = "key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Element,
	Text,
	Fragment,
	/// Comments, processing instructions and the like. Never patched, only replaced.
	Other,
}

/// A document the reconciler can read and mutate.
///
/// Mutating methods mirror their namesakes on the web platform, including that
/// inserting a fragment moves its children instead of the fragment itself.
pub trait Dom {
	/// A handle to a live node. Clones refer to the same node.
	type Node: Clone + PartialEq + Debug + 'static;

	/// # Errors
	///
	/// Iff the platform rejects the tag name.
	fn create_element(&mut self, tag: &str, namespace: Namespace) -> Result<Self::Node, Error>;

	/// # Errors
	///
	/// Iff the platform fails to create the node.
	fn create_text(&mut self, text: &str) -> Result<Self::Node, Error>;

	/// # Errors
	///
	/// Iff the platform fails to create the node.
	fn create_fragment(&mut self) -> Result<Self::Node, Error>;

	fn kind(&self, node: &Self::Node) -> NodeKind;

	/// The element's tag name as reported by the platform (HTML tag names are upper case in browsers).
	fn tag_name(&self, node: &Self::Node) -> Option<String>;

	/// The data of a text node.
	fn text(&self, node: &Self::Node) -> Option<String>;

	/// # Errors
	///
	/// Iff `node` is not a text node.
	fn set_text(&mut self, node: &Self::Node, text: &str) -> Result<(), Error>;

	fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

	fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

	/// Moves `child` into `parent` before `reference`, or to the end if `reference` is [`None`].
	///
	/// # Errors
	///
	/// Iff `reference` is not a child of `parent` or the insertion would create a cycle.
	fn insert_before(&mut self, parent: &Self::Node, child: &Self::Node, reference: Option<&Self::Node>) -> Result<(), Error>;

	/// # Errors
	///
	/// [`Error::ParentMismatch`] iff `child` is not a child of `parent`.
	fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), Error>;

	/// Puts `new` where `old` is.
	///
	/// # Errors
	///
	/// [`Error::ParentMismatch`] iff `old` is not a child of `parent`.
	fn replace_child(&mut self, parent: &Self::Node, new: &Self::Node, old: &Self::Node) -> Result<(), Error>;

	fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

	/// # Errors
	///
	/// Iff `node` is not an element or the name is invalid.
	fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), Error>;

	/// # Errors
	///
	/// Iff `node` is not an element.
	fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), Error>;

	/// # Errors
	///
	/// Iff the platform rejects the assignment.
	fn set_property(&mut self, node: &Self::Node, name: &str, value: &Value) -> Result<(), Error>;

	/// # Errors
	///
	/// Iff `node` has no inline style.
	fn set_style(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), Error>;

	/// # Errors
	///
	/// Iff `node` has no inline style.
	fn remove_style(&mut self, node: &Self::Node, name: &str) -> Result<(), Error>;

	/// # Errors
	///
	/// Iff the platform rejects the listener.
	fn add_listener(&mut self, node: &Self::Node, listener: &Listener) -> Result<(), Error>;

	/// # Errors
	///
	/// Iff the platform rejects the removal.
	fn remove_listener(&mut self, node: &Self::Node, listener: &Listener) -> Result<(), Error>;

	/// The declaration most recently used to build or patch `node`.
	fn attached(&self, node: &Self::Node) -> Option<Rc<Declaration<Self::Node>>>;

	/// Replaces the attached declaration of `node`.
	fn attach(&mut self, node: &Self::Node, declaration: Rc<Declaration<Self::Node>>);

	/// Called once `node` has been discarded by the reconciler, which won't look at it again.
	///
	/// Drops the attached declaration and whatever else was tracked for the node.
	fn release(&mut self, node: &Self::Node);

	/// Resolves at the next frame boundary, giving the host a chance to do other work.
	fn next_frame(&self) -> LocalBoxFuture<'static, ()>;

	/// End-of-update housekeeping.
	fn settle(&mut self) {}
}
