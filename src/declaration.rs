//! The declarative description of a desired node tree.
//!
//! [`Declaration`]s are produced fresh on every render pass and consumed by a single
//! [`update`](`crate::update`) or [`build`](`crate::build`). They are value objects:
//! the builder methods here consume `self` and return the extended declaration.

use crate::{value::Value, Error};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
	future::Future,
};
use futures::future::{FutureExt, LocalBoxFuture};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::warn;

/// What kind of node a [`Declaration`] describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
	/// A single element with the given (local) tag name.
	Element(String),
	/// A transparent grouping. Always flattened away, so it never has a live node of its own.
	Fragment,
}

impl Tag {
	/// The element tag name, unless this is a [`Tag::Fragment`].
	#[must_use]
	pub fn name(&self) -> Option<&str> {
		match self {
			Tag::Element(name) => Some(name),
			Tag::Fragment => None,
		}
	}
}

/// Which element constructor to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
	Html,
	Svg,
	MathMl,
}

impl Namespace {
	/// The namespace URI, or [`None`] for plain HTML elements.
	#[must_use]
	pub fn uri(self) -> Option<&'static str> {
		match self {
			Namespace::Html => None,
			Namespace::Svg => Some("http://www.w3.org/2000/svg"),
			Namespace::MathMl => Some("http://www.w3.org/1998/Math/MathML"),
		}
	}
}

impl Default for Namespace {
	fn default() -> Self {
		Namespace::Html
	}
}

/// How [`Declaration::props`] are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
	/// Props are assigned as native properties.
	Property,
	/// Props are set as attributes, overlaid by [`Declaration::attributes`].
	Attribute,
}

impl Default for Kind {
	fn default() -> Self {
		Kind::Property
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
	/// Children are reconciled normally.
	Transparent,
	/// Children are built on first paint, then left alone. Something else owns them.
	Opaque,
}

impl Default for RenderMode {
	fn default() -> Self {
		RenderMode::Transparent
	}
}

/// Inline style of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Style {
	/// Replaces the whole `style` attribute.
	Text(String),
	/// Individual style properties, diffed one by one.
	Properties(HashMap<String, String>),
}

/// Identifies a listener slot on an element: The event type plus whether it listens during capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey {
	pub event: String,
	pub capture: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListenerOptions {
	pub capture: bool,
	pub once: bool,
	pub passive: bool,
}

/// An event callback.
///
/// Equality is identity: Two [`Handler`]s are equal iff they were cloned from the same one.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&dyn Any)>);

impl Handler {
	/// Creates a handler for events of type `E`.
	///
	/// Events of any other type are ignored with a warning.
	/// In the browser, `E` is [`web_sys::Event`].
	pub fn new<E: Any>(handler: impl Fn(&E) + 'static) -> Self {
		Self(Rc::new(move |event: &dyn Any| match event.downcast_ref::<E>() {
			Some(event) => handler(event),
			None => warn!("Ignored event of unexpected type (expected {}).", core::any::type_name::<E>()),
		}))
	}

	/// Creates a handler that receives the platform event untyped.
	pub fn untyped(handler: impl Fn(&dyn Any) + 'static) -> Self {
		Self(Rc::new(handler))
	}

	pub fn call(&self, event: &dyn Any) {
		(self.0)(event);
	}

	/// An address that's stable and unique for as long as any clone of this handler is alive.
	#[must_use]
	pub fn address(&self) -> usize {
		Rc::as_ptr(&self.0).cast::<()>() as usize
	}
}

impl PartialEq for Handler {
	fn eq(&self, other: &Self) -> bool {
		self.address() == other.address()
	}
}

impl Eq for Handler {}

impl Debug for Handler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Handler({:#x})", self.address())
	}
}

/// An event listener descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
	pub event: String,
	pub handler: Handler,
	pub options: ListenerOptions,
}

impl Listener {
	#[must_use]
	pub fn new(event: impl Into<String>, handler: Handler) -> Self {
		Self {
			event: event.into(),
			handler,
			options: ListenerOptions::default(),
		}
	}

	#[must_use]
	pub fn options(self, options: ListenerOptions) -> Self {
		Self { options, ..self }
	}

	#[must_use]
	pub fn key(&self) -> ListenerKey {
		ListenerKey {
			event: self.event.clone(),
			capture: self.options.capture,
		}
	}
}

/// Receives the live node built or patched from a declaration, and [`None`] once it is detached.
///
/// Equality is identity, like for [`Handler`].
pub struct NodeRef<N>(Rc<dyn Fn(Option<&N>)>);

impl<N> NodeRef<N> {
	pub fn new(callback: impl Fn(Option<&N>) + 'static) -> Self {
		Self(Rc::new(callback))
	}

	pub fn call(&self, node: Option<&N>) {
		(self.0)(node);
	}

	fn address(&self) -> usize {
		Rc::as_ptr(&self.0).cast::<()>() as usize
	}
}

impl<N> Clone for NodeRef<N> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<N> PartialEq for NodeRef<N> {
	fn eq(&self, other: &Self) -> bool {
		self.address() == other.address()
	}
}

impl<N> Eq for NodeRef<N> {}

impl<N> Debug for NodeRef<N> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "NodeRef({:#x})", self.address())
	}
}

/// A builder object whose render step resolves (possibly asynchronously) to more declarative input.
pub trait Render<N> {
	fn render(&self) -> LocalBoxFuture<'_, Result<Child<N>, Error>>;
}

impl<N, F, Fut> Render<N> for F
where
	F: Fn() -> Fut,
	Fut: Future<Output = Result<Child<N>, Error>> + 'static,
{
	fn render(&self) -> LocalBoxFuture<'_, Result<Child<N>, Error>> {
		self().boxed_local()
	}
}

/// Anything that can appear in a child list, before flattening.
pub enum Child<N> {
	/// Renders nothing.
	Empty,
	/// `false` renders nothing. `true` is not a valid child.
	Bool(bool),
	Text(String),
	/// Rendered as text, formatted like JavaScript would.
	Number(f64),
	Declaration(Declaration<N>),
	/// An already-live node, passed through verbatim. Live fragments are expanded.
	Node(N),
	Component(Rc<dyn Render<N>>),
}

impl<N> Child<N> {
	pub fn component(component: impl Render<N> + 'static) -> Self {
		Child::Component(Rc::new(component))
	}
}

impl<N: Clone> Clone for Child<N> {
	fn clone(&self) -> Self {
		match self {
			Child::Empty => Child::Empty,
			Child::Bool(bool) => Child::Bool(*bool),
			Child::Text(text) => Child::Text(text.clone()),
			Child::Number(number) => Child::Number(*number),
			Child::Declaration(declaration) => Child::Declaration(declaration.clone()),
			Child::Node(node) => Child::Node(node.clone()),
			Child::Component(component) => Child::Component(Rc::clone(component)),
		}
	}
}

impl<N: Debug> Debug for Child<N> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Child::Empty => f.write_str("Empty"),
			Child::Bool(bool) => f.debug_tuple("Bool").field(bool).finish(),
			Child::Text(text) => f.debug_tuple("Text").field(text).finish(),
			Child::Number(number) => f.debug_tuple("Number").field(number).finish(),
			Child::Declaration(declaration) => f.debug_tuple("Declaration").field(declaration).finish(),
			Child::Node(node) => f.debug_tuple("Node").field(node).finish(),
			Child::Component(component) => write!(f, "Component({:p})", Rc::as_ptr(component).cast::<()>()),
		}
	}
}

impl<N> From<&str> for Child<N> {
	fn from(text: &str) -> Self {
		Child::Text(text.to_owned())
	}
}

impl<N> From<String> for Child<N> {
	fn from(text: String) -> Self {
		Child::Text(text)
	}
}

impl<N> From<f64> for Child<N> {
	fn from(number: f64) -> Self {
		Child::Number(number)
	}
}

impl<N> From<i32> for Child<N> {
	fn from(number: i32) -> Self {
		Child::Number(number.into())
	}
}

impl<N> From<bool> for Child<N> {
	fn from(bool: bool) -> Self {
		Child::Bool(bool)
	}
}

impl<N> From<Declaration<N>> for Child<N> {
	fn from(declaration: Declaration<N>) -> Self {
		Child::Declaration(declaration)
	}
}

impl<N, T: Into<Child<N>>> From<Option<T>> for Child<N> {
	fn from(child: Option<T>) -> Self {
		child.map_or(Child::Empty, Into::into)
	}
}

/// Describes one desired node.
#[derive(Debug, Clone)]
pub struct Declaration<N> {
	pub tag: Tag,
	pub namespace: Namespace,
	pub kind: Kind,
	pub props: HashMap<String, Value>,
	/// Always set as attributes. These take precedence over [`Declaration::props`].
	pub attributes: HashMap<String, Value>,
	pub style: Option<Style>,
	/// Keyed in camelCase, like `HTMLElement.dataset`.
	pub dataset: HashMap<String, String>,
	pub children: Vec<Child<N>>,
	pub node_ref: Option<NodeRef<N>>,
	pub key: Option<String>,
	pub listeners: HashMap<ListenerKey, Listener>,
	pub render_mode: RenderMode,
}

impl<N> Declaration<N> {
	fn new(tag: Tag) -> Self {
		Self {
			tag,
			namespace: Namespace::default(),
			kind: Kind::default(),
			props: HashMap::new(),
			attributes: HashMap::new(),
			style: None,
			dataset: HashMap::new(),
			children: Vec::new(),
			node_ref: None,
			key: None,
			listeners: HashMap::new(),
			render_mode: RenderMode::default(),
		}
	}

	#[must_use]
	pub fn element(tag: impl Into<String>) -> Self {
		Self::new(Tag::Element(tag.into()))
	}

	#[must_use]
	pub fn fragment(children: impl IntoIterator<Item = Child<N>>) -> Self {
		Self::new(Tag::Fragment).children(children)
	}

	#[must_use]
	pub fn namespace(self, namespace: Namespace) -> Self {
		Self { namespace, ..self }
	}

	#[must_use]
	pub fn kind(self, kind: Kind) -> Self {
		Self { kind, ..self }
	}

	#[must_use]
	pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.props.insert(name.into(), value.into());
		self
	}

	#[must_use]
	pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.attributes.insert(name.into(), value.into());
		self
	}

	/// Replaces the inline style with the given attribute text.
	#[must_use]
	pub fn style_text(self, style: impl Into<String>) -> Self {
		Self {
			style: Some(Style::Text(style.into())),
			..self
		}
	}

	/// Sets one inline style property. Discards a previous [`Style::Text`].
	#[must_use]
	pub fn style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		let mut properties = match self.style.take() {
			Some(Style::Properties(properties)) => properties,
			Some(Style::Text(_)) | None => HashMap::new(),
		};
		properties.insert(name.into(), value.into());
		self.style = Some(Style::Properties(properties));
		self
	}

	#[must_use]
	pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.dataset.insert(key.into(), value.into());
		self
	}

	#[must_use]
	pub fn child(mut self, child: impl Into<Child<N>>) -> Self {
		self.children.push(child.into());
		self
	}

	#[must_use]
	pub fn children(mut self, children: impl IntoIterator<Item = Child<N>>) -> Self {
		self.children.extend(children);
		self
	}

	#[must_use]
	pub fn key(self, key: impl Into<String>) -> Self {
		Self {
			key: Some(key.into()),
			..self
		}
	}

	#[must_use]
	pub fn node_ref(self, node_ref: NodeRef<N>) -> Self {
		Self {
			node_ref: Some(node_ref),
			..self
		}
	}

	/// Adds a listener, replacing any other with the same [`ListenerKey`].
	#[must_use]
	pub fn listener(mut self, listener: Listener) -> Self {
		self.listeners.insert(listener.key(), listener);
		self
	}

	/// Shorthand for a bubbling-phase [`Listener`] without options.
	#[must_use]
	pub fn on(self, event: impl Into<String>, handler: Handler) -> Self {
		self.listener(Listener::new(event, handler))
	}

	#[must_use]
	pub fn opaque(self) -> Self {
		Self {
			render_mode: RenderMode::Opaque,
			..self
		}
	}

	#[must_use]
	pub fn is_fragment(&self) -> bool {
		self.tag == Tag::Fragment
	}
}
