//! A headless [`Dom`] that keeps its node tree in an arena and journals every mutation.
//!
//! Mostly useful for tests and server-side rendering:
//!
//! ```rust
//! use futures::executor::block_on;
//! use keystone_dom::{memory::MemoryDom, update, Declaration, Options};
//!
//! let mut dom = MemoryDom::new();
//! let root = dom.new_root("body");
//! block_on(update(&mut dom, &root, Declaration::element("p").child("Hello!"), &Options::new())).unwrap();
//! assert_eq!(dom.inner_html(root), "<p>Hello!</p>");
//! ```

use crate::{
	declaration::{Declaration, Listener, Namespace},
	dom::{Dom, NodeKind},
	value::Value,
	Error,
};
use core::{any::Any, cell::Cell, task::Poll};
use futures::future::{self, FutureExt, LocalBoxFuture};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{trace, warn};

/// A handle to a node in a [`MemoryDom`].
///
/// Only meaningful together with the [`MemoryDom`] that created it. Nodes are never freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One journaled change to a [`MemoryDom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	CreateElement { node: NodeId, tag: String },
	CreateText { node: NodeId },
	CreateFragment { node: NodeId },
	Insert { parent: NodeId, node: NodeId },
	Remove { parent: NodeId, node: NodeId },
	Replace { parent: NodeId, new: NodeId, old: NodeId },
	SetText { node: NodeId },
	SetAttribute { node: NodeId, name: String },
	RemoveAttribute { node: NodeId, name: String },
	SetProperty { node: NodeId, name: String },
	SetStyle { node: NodeId, name: String },
	RemoveStyle { node: NodeId, name: String },
	AddListener { node: NodeId, event: String },
	RemoveListener { node: NodeId, event: String },
}

#[derive(Debug)]
struct Element {
	tag: String,
	namespace: Namespace,
	attributes: Vec<(String, String)>,
	properties: HashMap<String, Value>,
	style: Vec<(String, String)>,
	listeners: Vec<Listener>,
}

#[derive(Debug)]
enum Payload {
	Element(Element),
	Text(String),
	Comment(String),
	Fragment,
}

#[derive(Debug)]
struct NodeData {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	payload: Payload,
	declaration: Option<Rc<Declaration<NodeId>>>,
}

#[derive(Debug, Default)]
pub struct MemoryDom {
	nodes: Vec<NodeData>,
	journal: Vec<Mutation>,
	frames: Cell<usize>,
}

fn unknown(operation: &'static str, node: NodeId) -> Error {
	Error::platform(operation, format!("unknown node {:?}", node))
}

fn parse_style(text: &str) -> Vec<(String, String)> {
	text.split(';')
		.filter_map(|declaration| declaration.split_once(':'))
		.map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
		.filter(|(name, _)| !name.is_empty())
		.collect()
}

fn serialize_style(style: &[(String, String)]) -> String {
	style.iter().map(|(name, value)| format!("{}: {};", name, value)).collect::<Vec<_>>().join(" ")
}

fn escape(text: &str, attribute: bool) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' if !attribute => escaped.push_str("&lt;"),
			'>' if !attribute => escaped.push_str("&gt;"),
			'"' if attribute => escaped.push_str("&quot;"),
			c => escaped.push(c),
		}
	}
	escaped
}

impl MemoryDom {
	/// Creates an empty document.
	///
	/// Nodes live in an arena and are never freed, not even once they are detached and released,
	/// so [`NodeId`]s stay unambiguous for the whole lifetime of the document.
	/// For long-running use (like rendering many pages on a server), create one [`MemoryDom`] per render instead.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	fn push(&mut self, payload: Payload) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(NodeData {
			parent: None,
			children: Vec::new(),
			payload,
			declaration: None,
		});
		id
	}

	/// Creates a detached HTML element to reconcile into, without journaling it.
	pub fn new_root(&mut self, tag: &str) -> NodeId {
		self.push(Payload::Element(Element {
			tag: tag.to_owned(),
			namespace: Namespace::Html,
			attributes: Vec::new(),
			properties: HashMap::new(),
			style: Vec::new(),
			listeners: Vec::new(),
		}))
	}

	/// Creates a detached comment node. Comments are [`NodeKind::Other`].
	pub fn create_comment(&mut self, text: &str) -> NodeId {
		self.push(Payload::Comment(text.to_owned()))
	}

	#[must_use]
	pub fn mutations(&self) -> &[Mutation] {
		&self.journal
	}

	/// Empties the journal and returns what it held.
	pub fn take_mutations(&mut self) -> Vec<Mutation> {
		core::mem::take(&mut self.journal)
	}

	/// How many elements were created since the journal was last emptied.
	#[must_use]
	pub fn created_elements(&self) -> usize {
		self.journal.iter().filter(|mutation| matches!(mutation, Mutation::CreateElement { .. })).count()
	}

	/// How many times [`Dom::next_frame`] was called.
	#[must_use]
	pub fn frames(&self) -> usize {
		self.frames.get()
	}

	fn data(&self, node: NodeId) -> Option<&NodeData> {
		self.nodes.get(node.0)
	}

	fn element(&self, node: NodeId) -> Option<&Element> {
		match self.data(node).map(|data| &data.payload) {
			Some(Payload::Element(element)) => Some(element),
			_ => None,
		}
	}

	fn element_mut(&mut self, node: NodeId, operation: &'static str) -> Result<&mut Element, Error> {
		match self.nodes.get_mut(node.0).map(|data| &mut data.payload) {
			Some(Payload::Element(element)) => Ok(element),
			Some(_) => Err(Error::platform(operation, format!("{:?} is not an element", node))),
			None => Err(unknown(operation, node)),
		}
	}

	#[must_use]
	pub fn property(&self, node: NodeId, name: &str) -> Option<&Value> {
		self.element(node)?.properties.get(name)
	}

	#[must_use]
	pub fn style_property(&self, node: NodeId, name: &str) -> Option<&str> {
		self.element(node)?
			.style
			.iter()
			.find(|(style_name, _)| style_name == name)
			.map(|(_, value)| value.as_str())
	}

	#[must_use]
	pub fn listener_count(&self, node: NodeId) -> usize {
		self.element(node).map_or(0, |element| element.listeners.len())
	}

	#[must_use]
	pub fn namespace(&self, node: NodeId) -> Option<Namespace> {
		self.element(node).map(|element| element.namespace)
	}

	/// The concatenated data of all descendant text nodes.
	#[must_use]
	pub fn text_content(&self, node: NodeId) -> String {
		match self.data(node) {
			Some(NodeData { payload: Payload::Text(text), .. }) => text.clone(),
			Some(NodeData { payload: Payload::Comment(_), .. }) | None => String::new(),
			Some(data) => data.children.iter().map(|&child| self.text_content(child)).collect(),
		}
	}

	/// Serializes the children of `node`. Attributes are sorted by name.
	#[must_use]
	pub fn inner_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		for &child in self.data(node).map_or(&[][..], |data| &data.children) {
			self.write_html(child, &mut html);
		}
		html
	}

	#[must_use]
	pub fn outer_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		self.write_html(node, &mut html);
		html
	}

	fn write_html(&self, node: NodeId, html: &mut String) {
		let data = match self.data(node) {
			Some(data) => data,
			None => return,
		};
		match &data.payload {
			Payload::Text(text) => html.push_str(&escape(text, false)),
			Payload::Comment(text) => {
				html.push_str("<!--");
				html.push_str(text);
				html.push_str("-->");
			}
			Payload::Fragment => {
				for &child in &data.children {
					self.write_html(child, html);
				}
			}
			Payload::Element(element) => {
				let mut attributes: Vec<(&str, String)> = element.attributes.iter().map(|(name, value)| (name.as_str(), value.clone())).collect();
				if !element.style.is_empty() {
					attributes.push(("style", serialize_style(&element.style)));
				}
				attributes.sort_by(|(a, _), (b, _)| a.cmp(b));

				html.push('<');
				html.push_str(&element.tag);
				for (name, value) in attributes {
					html.push_str(&format!(" {}=\"{}\"", name, escape(&value, true)));
				}
				html.push('>');
				for &child in &data.children {
					self.write_html(child, html);
				}
				html.push_str("</");
				html.push_str(&element.tag);
				html.push('>');
			}
		}
	}

	/// Invokes the listeners for `event` on `node` (at target only, without bubbling).
	///
	/// `once` listeners are removed after their call. Returns how many listeners ran.
	pub fn dispatch<E: Any>(&mut self, node: NodeId, event: &str, payload: &E) -> usize {
		let listeners: Vec<Listener> = match self.element(node) {
			Some(element) => element.listeners.iter().filter(|listener| listener.event == event).cloned().collect(),
			None => return 0,
		};
		for listener in &listeners {
			listener.handler.call(payload);
			if listener.options.once {
				if let Ok(element) = self.element_mut(node, "dispatchEvent") {
					element.listeners.retain(|live| live != listener);
				}
			}
		}
		listeners.len()
	}

	fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
		loop {
			if node == ancestor {
				return true;
			}
			match self.data(node).and_then(|data| data.parent) {
				Some(parent) => node = parent,
				None => return false,
			}
		}
	}

	fn detach(&mut self, node: NodeId) {
		if let Some(parent) = self.nodes.get_mut(node.0).and_then(|data| data.parent.take()) {
			if let Some(parent) = self.nodes.get_mut(parent.0) {
				parent.children.retain(|&child| child != node);
			}
		}
	}

	fn insert_one(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<(), Error> {
		if Some(child) == reference {
			return Ok(());
		}
		if self.is_inclusive_ancestor(child, parent) {
			return Err(Error::platform("insertBefore", "the insertion would create a cycle"));
		}

		self.detach(child);
		let siblings = &mut self.nodes[parent.0].children;
		let index = match reference {
			Some(reference) => siblings
				.iter()
				.position(|&sibling| sibling == reference)
				.ok_or_else(|| Error::platform("insertBefore", "the reference node is not a child of the parent"))?,
			None => siblings.len(),
		};
		siblings.insert(index, child);
		self.nodes[child.0].parent = Some(parent);
		self.journal.push(Mutation::Insert { parent, node: child });
		Ok(())
	}

	fn check_container(&self, node: NodeId, operation: &'static str) -> Result<(), Error> {
		match self.data(node).map(|data| &data.payload) {
			Some(Payload::Element(_) | Payload::Fragment) => Ok(()),
			Some(Payload::Text(_) | Payload::Comment(_)) => Err(Error::platform(operation, format!("{:?} can't have children", node))),
			None => Err(unknown(operation, node)),
		}
	}
}

impl Dom for MemoryDom {
	type Node = NodeId;

	fn create_element(&mut self, tag: &str, namespace: Namespace) -> Result<NodeId, Error> {
		if tag.is_empty() || tag.contains(char::is_whitespace) {
			return Err(Error::platform("createElement", format!("invalid tag name {:?}", tag)));
		}
		let node = self.push(Payload::Element(Element {
			tag: tag.to_owned(),
			namespace,
			attributes: Vec::new(),
			properties: HashMap::new(),
			style: Vec::new(),
			listeners: Vec::new(),
		}));
		self.journal.push(Mutation::CreateElement { node, tag: tag.to_owned() });
		Ok(node)
	}

	fn create_text(&mut self, text: &str) -> Result<NodeId, Error> {
		let node = self.push(Payload::Text(text.to_owned()));
		self.journal.push(Mutation::CreateText { node });
		Ok(node)
	}

	fn create_fragment(&mut self) -> Result<NodeId, Error> {
		let node = self.push(Payload::Fragment);
		self.journal.push(Mutation::CreateFragment { node });
		Ok(node)
	}

	fn kind(&self, node: &NodeId) -> NodeKind {
		match self.data(*node).map(|data| &data.payload) {
			Some(Payload::Element(_)) => NodeKind::Element,
			Some(Payload::Text(_)) => NodeKind::Text,
			Some(Payload::Fragment) => NodeKind::Fragment,
			Some(Payload::Comment(_)) | None => NodeKind::Other,
		}
	}

	/// Upper case for HTML elements, like in browsers.
	fn tag_name(&self, node: &NodeId) -> Option<String> {
		self.element(*node).map(|element| match element.namespace {
			Namespace::Html => element.tag.to_ascii_uppercase(),
			Namespace::Svg | Namespace::MathMl => element.tag.clone(),
		})
	}

	fn text(&self, node: &NodeId) -> Option<String> {
		match self.data(*node).map(|data| &data.payload) {
			Some(Payload::Text(text)) => Some(text.clone()),
			_ => None,
		}
	}

	fn set_text(&mut self, node: &NodeId, text: &str) -> Result<(), Error> {
		match self.nodes.get_mut(node.0).map(|data| &mut data.payload) {
			Some(Payload::Text(data)) => {
				text.clone_into(data);
				self.journal.push(Mutation::SetText { node: *node });
				Ok(())
			}
			Some(_) => Err(Error::platform("setData", format!("{:?} is not a text node", node))),
			None => Err(unknown("setData", *node)),
		}
	}

	fn parent(&self, node: &NodeId) -> Option<NodeId> {
		self.data(*node)?.parent
	}

	fn children(&self, node: &NodeId) -> Vec<NodeId> {
		self.data(*node).map(|data| data.children.clone()).unwrap_or_default()
	}

	fn insert_before(&mut self, parent: &NodeId, child: &NodeId, reference: Option<&NodeId>) -> Result<(), Error> {
		self.check_container(*parent, "insertBefore")?;
		let child_data = self.data(*child).ok_or_else(|| unknown("insertBefore", *child))?;
		if let Some(reference) = reference {
			if self.parent(reference) != Some(*parent) {
				return Err(Error::platform("insertBefore", "the reference node is not a child of the parent"));
			}
		}

		if let Payload::Fragment = child_data.payload {
			for moved in child_data.children.clone() {
				self.insert_one(*parent, moved, reference.copied())?;
			}
			Ok(())
		} else {
			self.insert_one(*parent, *child, reference.copied())
		}
	}

	fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), Error> {
		if self.parent(child) != Some(*parent) {
			return Err(Error::ParentMismatch);
		}
		self.detach(*child);
		self.journal.push(Mutation::Remove { parent: *parent, node: *child });
		Ok(())
	}

	fn replace_child(&mut self, parent: &NodeId, new: &NodeId, old: &NodeId) -> Result<(), Error> {
		let (parent, new, old) = (*parent, *new, *old);
		if self.parent(&old) != Some(parent) {
			return Err(Error::ParentMismatch);
		}
		let new_data = self.data(new).ok_or_else(|| unknown("replaceChild", new))?;
		if new == old {
			return Ok(());
		}

		if let Payload::Fragment = new_data.payload {
			for moved in new_data.children.clone() {
				self.insert_one(parent, moved, Some(old))?;
			}
			self.detach(old);
		} else {
			if self.is_inclusive_ancestor(new, parent) {
				return Err(Error::platform("replaceChild", "the replacement would create a cycle"));
			}
			self.detach(new);
			let siblings = &mut self.nodes[parent.0].children;
			let index = siblings
				.iter()
				.position(|&sibling| sibling == old)
				.ok_or(Error::ParentMismatch)?;
			siblings[index] = new;
			self.nodes[new.0].parent = Some(parent);
			self.nodes[old.0].parent = None;
		}
		self.journal.push(Mutation::Replace { parent, new, old });
		Ok(())
	}

	fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
		let element = self.element(*node)?;
		if name == "style" {
			return (!element.style.is_empty()).then(|| serialize_style(&element.style));
		}
		element
			.attributes
			.iter()
			.find(|(attribute, _)| attribute == name)
			.map(|(_, value)| value.clone())
	}

	fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), Error> {
		if name.is_empty() || name.contains(char::is_whitespace) {
			return Err(Error::platform("setAttribute", format!("invalid attribute name {:?}", name)));
		}
		let element = self.element_mut(*node, "setAttribute")?;
		if name == "style" {
			element.style = parse_style(value);
		} else {
			match element.attributes.iter_mut().find(|(attribute, _)| attribute == name) {
				Some((_, existing)) => value.clone_into(existing),
				None => element.attributes.push((name.to_owned(), value.to_owned())),
			}
		}
		self.journal.push(Mutation::SetAttribute {
			node: *node,
			name: name.to_owned(),
		});
		Ok(())
	}

	fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), Error> {
		let element = self.element_mut(*node, "removeAttribute")?;
		if name == "style" {
			element.style.clear();
		} else {
			element.attributes.retain(|(attribute, _)| attribute != name);
		}
		self.journal.push(Mutation::RemoveAttribute {
			node: *node,
			name: name.to_owned(),
		});
		Ok(())
	}

	fn set_property(&mut self, node: &NodeId, name: &str, value: &Value) -> Result<(), Error> {
		self.element_mut(*node, "setProperty")?.properties.insert(name.to_owned(), value.clone());
		self.journal.push(Mutation::SetProperty {
			node: *node,
			name: name.to_owned(),
		});
		Ok(())
	}

	fn set_style(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), Error> {
		let element = self.element_mut(*node, "style.setProperty")?;
		match element.style.iter_mut().find(|(style, _)| style == name) {
			Some((_, existing)) => value.clone_into(existing),
			None => element.style.push((name.to_owned(), value.to_owned())),
		}
		self.journal.push(Mutation::SetStyle {
			node: *node,
			name: name.to_owned(),
		});
		Ok(())
	}

	fn remove_style(&mut self, node: &NodeId, name: &str) -> Result<(), Error> {
		self.element_mut(*node, "style.removeProperty")?.style.retain(|(style, _)| style != name);
		self.journal.push(Mutation::RemoveStyle {
			node: *node,
			name: name.to_owned(),
		});
		Ok(())
	}

	fn add_listener(&mut self, node: &NodeId, listener: &Listener) -> Result<(), Error> {
		let element = self.element_mut(*node, "addEventListener")?;
		// Same event, handler and capture flag: The platform ignores the second registration.
		if element
			.listeners
			.iter()
			.any(|live| live.event == listener.event && live.handler == listener.handler && live.options.capture == listener.options.capture)
		{
			warn!(event = %listener.event, "Listener is already registered.");
			return Ok(());
		}
		element.listeners.push(listener.clone());
		self.journal.push(Mutation::AddListener {
			node: *node,
			event: listener.event.clone(),
		});
		Ok(())
	}

	fn remove_listener(&mut self, node: &NodeId, listener: &Listener) -> Result<(), Error> {
		self.element_mut(*node, "removeEventListener")?
			.listeners
			.retain(|live| !(live.event == listener.event && live.handler == listener.handler && live.options.capture == listener.options.capture));
		self.journal.push(Mutation::RemoveListener {
			node: *node,
			event: listener.event.clone(),
		});
		Ok(())
	}

	fn attached(&self, node: &NodeId) -> Option<Rc<Declaration<NodeId>>> {
		self.data(*node)?.declaration.clone()
	}

	fn attach(&mut self, node: &NodeId, declaration: Rc<Declaration<NodeId>>) {
		match self.nodes.get_mut(node.0) {
			Some(data) => data.declaration = Some(declaration),
			None => warn!(?node, "Tried to attach a declaration to an unknown node."),
		}
	}

	fn release(&mut self, node: &NodeId) {
		if let Some(data) = self.nodes.get_mut(node.0) {
			if data.declaration.take().is_some() {
				trace!(?node, "Released declaration.");
			}
		}
	}

	fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
		self.frames.set(self.frames.get() + 1);
		let mut yielded = false;
		future::poll_fn(move |context| {
			if yielded {
				Poll::Ready(())
			} else {
				yielded = true;
				context.waker().wake_by_ref();
				Poll::Pending
			}
		})
		.boxed_local()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fragment_insertion_moves_children() {
		let mut dom = MemoryDom::new();
		let root = dom.new_root("div");
		let fragment = dom.create_fragment().unwrap();
		let a = dom.create_text("a").unwrap();
		let b = dom.create_text("b").unwrap();
		dom.insert_before(&fragment, &a, None).unwrap();
		dom.insert_before(&fragment, &b, None).unwrap();

		dom.insert_before(&root, &fragment, None).unwrap();
		assert_eq!(dom.children(&root), vec![a, b]);
		assert!(dom.children(&fragment).is_empty());
		assert_eq!(dom.parent(&a), Some(root));
	}

	#[test]
	fn cycles_are_rejected() {
		let mut dom = MemoryDom::new();
		let outer = dom.new_root("div");
		let inner = dom.create_element("span", Namespace::Html).unwrap();
		dom.insert_before(&outer, &inner, None).unwrap();
		assert!(dom.insert_before(&inner, &outer, None).is_err());
	}

	#[test]
	fn removal_checks_parent() {
		let mut dom = MemoryDom::new();
		let root = dom.new_root("div");
		let stray = dom.create_text("stray").unwrap();
		assert!(matches!(dom.remove_child(&root, &stray), Err(Error::ParentMismatch)));
	}

	#[test]
	fn style_attribute_round_trips_through_properties() {
		let mut dom = MemoryDom::new();
		let root = dom.new_root("div");
		dom.set_attribute(&root, "style", "color: red;width:1px").unwrap();
		assert_eq!(dom.style_property(root, "width"), Some("1px"));
		dom.set_style(&root, "color", "blue").unwrap();
		assert_eq!(dom.attribute(&root, "style").as_deref(), Some("color: blue; width: 1px;"));
	}

	#[test]
	fn serialization_escapes() {
		let mut dom = MemoryDom::new();
		let root = dom.new_root("div");
		let p = dom.create_element("p", Namespace::Html).unwrap();
		dom.set_attribute(&p, "title", "\"quoted\" & <b>").unwrap();
		let text = dom.create_text("1 < 2 & 3").unwrap();
		dom.insert_before(&p, &text, None).unwrap();
		dom.insert_before(&root, &p, None).unwrap();
		assert_eq!(dom.inner_html(root), "<p title=\"&quot;quoted&quot; &amp; <b>\">1 &lt; 2 &amp; 3</p>");
	}
}
