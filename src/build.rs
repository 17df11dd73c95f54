use crate::{
	declaration::{Declaration, RenderMode},
	diff::Reconciler,
	dom::Dom,
	flatten::{flatten, Flat, FlatElement},
	patch::patch_element,
	redact, Child, Error, Options,
};
use futures::future::{FutureExt, LocalBoxFuture};
use std::rc::Rc;
use tracing::{debug_span, error, trace, trace_span, Instrument};

/// Builds a new, detached live node from `declaration`.
///
/// Returns [`None`] iff `declaration` renders nothing.
///
/// # Errors
///
/// [`Error::InvalidDeclaration`] if `declaration` flattens to more than one node, and otherwise see [`Error`].
pub async fn build<D: Dom>(dom: &mut D, declaration: impl Into<Child<D::Node>>, options: &Options) -> Result<Option<D::Node>, Error> {
	let span = debug_span!("build");
	let declaration = declaration.into();
	async move {
		let mut flat = flatten(&*dom, declaration, options).await?;
		if flat.len() > 1 {
			return Err(Error::InvalidDeclaration(format!("expected a single node, but the declaration flattened to {}", flat.len())));
		}
		let flat = match flat.pop() {
			Some(flat) => flat,
			None => {
				trace!("Nothing to build.");
				return Ok(None);
			}
		};

		let mut reconciler = Reconciler { dom, options };
		let result = reconciler.build_flat(flat, 0).await;
		reconciler.dom.settle();
		result.map(Some)
	}
	.instrument(span)
	.await
}

fn element_tag<N>(declaration: &Declaration<N>) -> Result<&str, Error> {
	declaration
		.tag
		.name()
		.ok_or_else(|| Error::InvalidDeclaration("a fragment can't stand in for a single node".to_owned()))
}

impl<'a, D: Dom> Reconciler<'a, D> {
	pub(crate) fn build_flat<'s>(&'s mut self, flat: Flat<D::Node>, depth: usize) -> LocalBoxFuture<'s, Result<D::Node, Error>> {
		async move {
			match flat {
				Flat::Text(text) => {
					trace!(text = redact(&text), "Creating text node.");
					self.dom.create_text(&text)
				}
				Flat::Node(node) => Ok(node),
				Flat::Element(element) => self.build_element(element, depth).await,
			}
		}
		.boxed_local()
	}

	fn build_element<'s>(&'s mut self, element: FlatElement<D::Node>, depth: usize) -> LocalBoxFuture<'s, Result<D::Node, Error>> {
		let span = trace_span!("Creating element", tag = ?element.declaration.tag, key = ?element.declaration.key);
		async move {
			if depth > self.options.depth_limit {
				error!("Depth limit reached");
				return Err(Error::DepthExceeded { limit: self.options.depth_limit });
			}

			let FlatElement { declaration, children } = element;
			let node = self.dom.create_element(element_tag(&declaration)?, declaration.namespace)?;
			patch_element(self.dom, &node, None, &declaration, self.options)?;
			if !children.is_empty() {
				self.insert_all(&node, children, None, depth + 1).await?;
			}
			self.dom.attach(&node, Rc::clone(&declaration));

			if let Some(node_ref) = &declaration.node_ref {
				trace!("Binding ref.");
				node_ref.call(Some(&node));
			}
			Ok(node)
		}
		.instrument(span)
		.boxed_local()
	}

	/// Builds `children` and inserts them into `parent` before `reference` (or at the end).
	///
	/// Children are collected into a fragment per chunk of [`Options::append_chunk_size`].
	/// After each full chunk the next frame is awaited, so huge lists don't block the host for too long.
	pub(crate) fn insert_all<'s>(&'s mut self, parent: &'s D::Node, children: Vec<Flat<D::Node>>, reference: Option<D::Node>, depth: usize) -> LocalBoxFuture<'s, Result<(), Error>> {
		let span = trace_span!("Inserting children", count = children.len(), chunk_size = self.options.append_chunk_size);
		async move {
			let chunk_size = self.options.append_chunk_size.max(1);
			let mut children = children.into_iter().peekable();
			let mut chunk_count = 0_usize;

			while children.peek().is_some() {
				if chunk_count > 0 {
					trace!(chunk_count, "Yielding until the next frame.");
					self.dom.next_frame().await;
				}

				let fragment = self.dom.create_fragment()?;
				for child in children.by_ref().take(chunk_size) {
					let node = self.build_flat(child, depth).await?;
					self.dom.insert_before(&fragment, &node, None)?;
				}
				self.dom.insert_before(parent, &fragment, reference.as_ref())?;
				chunk_count += 1;
			}
			Ok(())
		}
		.instrument(span)
		.boxed_local()
	}

	fn expect_child(&self, parent: &D::Node, node: &D::Node) -> Result<(), Error> {
		if self.dom.parent(node).as_ref() == Some(parent) {
			Ok(())
		} else {
			error!(?parent, ?node, "Node to replace is not a child of the parent being reconciled.");
			Err(Error::ParentMismatch)
		}
	}

	/// Replaces `old` and its whole subtree with a node built from `next`.
	pub(crate) fn replace<'s>(&'s mut self, parent: &'s D::Node, old: &'s D::Node, next: Flat<D::Node>, depth: usize) -> LocalBoxFuture<'s, Result<D::Node, Error>> {
		let span = trace_span!("Replacing subtree", ?old);
		async move {
			self.expect_child(parent, old)?;

			if let Flat::Node(node) = next {
				// Moved in first, in case it currently sits somewhere inside `old`.
				trace!(?node, "Moving live node into place.");
				self.dom.insert_before(parent, &node, Some(old))?;
				self.remove(parent, old)?;
				return Ok(node);
			}

			let previous_ref = self.dom.attached(old).and_then(|previous| previous.node_ref.clone());
			let next_ref = match &next {
				Flat::Element(element) => element.declaration.node_ref.clone(),
				Flat::Text(_) | Flat::Node(_) => None,
			};

			self.unbind_children(old, depth)?;
			if previous_ref != next_ref {
				if let Some(previous_ref) = &previous_ref {
					trace!("Unbinding previous ref.");
					previous_ref.call(None);
				}
			}
			self.dom.release(old);

			let new = self.build_flat(next, depth).await?;
			self.dom.replace_child(parent, &new, old)?;
			Ok(new)
		}
		.instrument(span)
		.boxed_local()
	}

	/// Replaces the element `old` with one of a different tag, moving the existing children over.
	pub(crate) fn retag<'s>(
		&'s mut self,
		parent: &'s D::Node,
		old: &'s D::Node,
		previous: Option<Rc<Declaration<D::Node>>>,
		element: FlatElement<D::Node>,
		depth: usize,
	) -> LocalBoxFuture<'s, Result<D::Node, Error>> {
		let span = trace_span!(
			"Replacing element, keeping children",
			from = ?previous.as_ref().map(|previous| previous.tag.clone()),
			to = ?element.declaration.tag,
		);
		async move {
			self.expect_child(parent, old)?;
			let FlatElement { declaration, children } = element;

			let previous_ref = previous.as_ref().and_then(|previous| previous.node_ref.clone());
			if previous_ref != declaration.node_ref {
				if let Some(previous_ref) = &previous_ref {
					trace!("Unbinding previous ref.");
					previous_ref.call(None);
				}
			}

			let new = self.dom.create_element(element_tag(&declaration)?, declaration.namespace)?;
			patch_element(self.dom, &new, None, &declaration, self.options)?;
			for child in self.dom.children(old) {
				self.dom.insert_before(&new, &child, None)?;
			}
			match declaration.render_mode {
				RenderMode::Transparent => self.reconcile_children(new.clone(), children, depth + 1).await?,
				RenderMode::Opaque => trace!("Opaque element. Moved children are left alone."),
			}
			self.dom.attach(&new, Rc::clone(&declaration));

			self.dom.replace_child(parent, &new, old)?;
			self.dom.release(old);

			// The element is new, so its ref is called even if it didn't change.
			if let Some(node_ref) = &declaration.node_ref {
				trace!("Binding ref.");
				node_ref.call(Some(&new));
			}
			Ok(new)
		}
		.instrument(span)
		.boxed_local()
	}

	/// Detaches `node` from `parent` after unbinding its subtree.
	pub(crate) fn remove(&mut self, parent: &D::Node, node: &D::Node) -> Result<(), Error> {
		let span = trace_span!("Removing node", ?node);
		let _enter = span.enter();

		self.unbind(node, 0)?;
		self.dom.remove_child(parent, node)
	}

	/// Calls refs with [`None`] and releases attached declarations throughout the subtree, deepest first.
	/// Nothing is detached.
	pub(crate) fn unbind(&mut self, node: &D::Node, depth: usize) -> Result<(), Error> {
		self.unbind_children(node, depth)?;
		if let Some(declaration) = self.dom.attached(node) {
			if let Some(node_ref) = &declaration.node_ref {
				node_ref.call(None);
			}
		}
		self.dom.release(node);
		Ok(())
	}

	fn unbind_children(&mut self, node: &D::Node, depth: usize) -> Result<(), Error> {
		if depth > self.options.depth_limit {
			error!("Depth limit reached while unbinding");
			return Err(Error::DepthExceeded { limit: self.options.depth_limit });
		}
		for child in self.dom.children(node) {
			self.unbind(&child, depth + 1)?;
		}
		Ok(())
	}
}
