//! Normalizes declarative input into the flat child lists the reconciler walks.

use crate::{
	declaration::{Child, Declaration},
	dom::{Dom, NodeKind},
	value::number_to_string,
	Error, Options,
};
use futures::future::{FutureExt, LocalBoxFuture};
use std::rc::Rc;
use tracing::{trace, trace_span, Instrument};

/// One paintable child.
#[derive(Debug, Clone)]
pub enum Flat<N> {
	Text(String),
	/// A live node passed through verbatim.
	Node(N),
	Element(FlatElement<N>),
}

/// A singular element declaration together with its flattened children.
///
/// The [`Declaration::children`] of `declaration` are always empty here.
/// They were moved into `children` during flattening.
#[derive(Debug, Clone)]
pub struct FlatElement<N> {
	pub declaration: Rc<Declaration<N>>,
	pub children: Vec<Flat<N>>,
}

impl<N> Flat<N> {
	/// The key the reconciler matches this child by, if it's a declared element.
	///
	/// Keys of live nodes depend on the document, so they are looked up by the reconciler instead.
	#[must_use]
	pub fn declared_key(&self) -> Option<&str> {
		match self {
			Flat::Element(element) => element.declaration.key.as_deref(),
			Flat::Text(_) | Flat::Node(_) => None,
		}
	}
}

/// Flattens `input` into an ordered list of text, live nodes and singular elements (with flattened children).
///
/// Fragments (declared or live) are spliced into their parent list.
/// Components are rendered first, and their output flattened in their place.
///
/// # Errors
///
/// - [`Error::InvalidDeclaration`] for `true` or an element with an empty tag name,
/// - [`Error::DepthExceeded`] if nesting goes past [`Options::depth_limit`],
/// - and whatever a component's render step fails with.
pub fn flatten<'a, D: Dom>(dom: &'a D, input: Child<D::Node>, options: &'a Options) -> LocalBoxFuture<'a, Result<Vec<Flat<D::Node>>, Error>> {
	async move {
		let mut flat = Vec::new();
		flatten_into(dom, input, 0, options, &mut flat).await?;
		Ok(flat)
	}
	.boxed_local()
}

fn flatten_into<'a, D: Dom>(dom: &'a D, input: Child<D::Node>, depth: usize, options: &'a Options, out: &'a mut Vec<Flat<D::Node>>) -> LocalBoxFuture<'a, Result<(), Error>> {
	async move {
		if depth > options.depth_limit {
			return Err(Error::DepthExceeded { limit: options.depth_limit });
		}

		match input {
			Child::Empty | Child::Bool(false) => trace!("Nothing to render."),
			Child::Bool(true) => return Err(Error::InvalidDeclaration("`true` is not a renderable child".to_owned())),
			Child::Text(text) => out.push(Flat::Text(text)),
			Child::Number(number) => out.push(Flat::Text(number_to_string(number))),

			Child::Node(node) => match dom.kind(&node) {
				NodeKind::Fragment => {
					let span = trace_span!("Expanding live fragment");
					let _enter = span.enter();
					for child in dom.children(&node) {
						match dom.kind(&child) {
							NodeKind::Text => match dom.text(&child) {
								Some(text) if !text.is_empty() => out.push(Flat::Text(text)),
								_ => trace!("Dropped empty text node."),
							},
							NodeKind::Element => out.push(Flat::Node(child)),
							NodeKind::Fragment | NodeKind::Other => trace!("Ignored {:?} in live fragment.", child),
						}
					}
				}
				NodeKind::Element | NodeKind::Text | NodeKind::Other => out.push(Flat::Node(node)),
			},

			Child::Declaration(mut declaration) => {
				let children = core::mem::take(&mut declaration.children);
				match declaration.tag.name().map(str::to_owned) {
					None => {
						let span = trace_span!("Flattening fragment", children = children.len());
						for child in children {
							flatten_into(dom, child, depth + 1, options, out).instrument(span.clone()).await?;
						}
					}
					Some(name) if name.is_empty() => return Err(Error::InvalidDeclaration("element declared with an empty tag name".to_owned())),
					Some(name) => {
						let span = trace_span!("Flattening element", tag = %name, key = ?declaration.key);
						let mut flat_children = Vec::with_capacity(children.len());
						for child in children {
							flatten_into(dom, child, depth + 1, options, &mut flat_children).instrument(span.clone()).await?;
						}
						out.push(Flat::Element(FlatElement {
							declaration: Rc::new(declaration),
							children: flat_children,
						}));
					}
				}
			}

			Child::Component(component) => {
				let span = trace_span!("Rendering component");
				let rendered = component.render().instrument(span.clone()).await?;
				flatten_into(dom, rendered, depth + 1, options, out).instrument(span).await?;
			}
		}
		Ok(())
	}
	.boxed_local()
}
