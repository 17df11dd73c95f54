//! The keyed list reconciler.
//!
//! Child lists are walked with two pointers from the head and the tail while keys line up.
//! Whatever remains in the middle is matched through a key lookup of the live siblings.

use crate::{
	declaration::{Declaration, RenderMode},
	dom::{Dom, NodeKind, KEY_ATTRIBUTE},
	flatten::{flatten, Flat, FlatElement},
	patch::patch_element,
	redact, Child, Error, Options,
};
use futures::future::{FutureExt, LocalBoxFuture};
use hashbrown::{hash_map::Entry, HashMap, HashSet};
use std::{collections::VecDeque, rc::Rc};
use tracing::{debug_span, error, trace, trace_span, warn, Instrument};

/// Mutates the child nodes of `parent` to match `next`.
///
/// `next` is [flattened](`flatten`) first, so a fragment describes the whole child list
/// and a single declaration makes it the only child.
///
/// Live nodes are reused wherever keys (or, for keyless siblings, positions) allow.
/// The attached declarations left behind by earlier calls are what the new declarations are diffed against.
///
/// Calls targeting overlapping subtrees must not run concurrently. Await one before starting the next.
///
/// # Errors
///
/// See [`Error`]. Mutations applied before a failure are not rolled back.
pub async fn update<D: Dom>(dom: &mut D, parent: &D::Node, next: impl Into<Child<D::Node>>, options: &Options) -> Result<(), Error> {
	let span = debug_span!("update", ?parent);
	let next = next.into();
	async move {
		let next = flatten(&*dom, next, options).await?;
		let mut reconciler = Reconciler { dom, options };
		let result = reconciler.reconcile_children(parent.clone(), next, 0).await;
		reconciler.dom.settle();
		result
	}
	.instrument(span)
	.await
}

/// The state of one [`update`] or [`build`](`crate::build`) call.
pub(crate) struct Reconciler<'a, D: Dom> {
	pub(crate) dom: &'a mut D,
	pub(crate) options: &'a Options,
}

enum Compatibility<N> {
	/// Same tag and kind: Patch in place.
	Patch(Option<Rc<Declaration<N>>>),
	/// Same key and kind but another tag: Replace the element, but keep its children.
	Retag(Option<Rc<Declaration<N>>>),
	Replace,
}

impl<'a, D: Dom> Reconciler<'a, D> {
	/// The key a live node is matched by: That of its attached declaration, or else its key attribute.
	pub(crate) fn key_of(&self, node: &D::Node) -> Option<String> {
		match self.dom.attached(node) {
			Some(declaration) => declaration.key.clone(),
			None if self.dom.kind(node) == NodeKind::Element => self.dom.attribute(node, KEY_ATTRIBUTE),
			None => None,
		}
	}

	fn keys_of_next(&self, next: &[Flat<D::Node>]) -> Result<Vec<Option<String>>, Error> {
		let mut seen = HashSet::with_capacity(next.len());
		next.iter()
			.map(|flat| {
				let key = match flat {
					Flat::Node(node) => self.key_of(node),
					Flat::Text(_) | Flat::Element(_) => flat.declared_key().map(str::to_owned),
				};
				if let Some(key) = &key {
					if !seen.insert(key.clone()) {
						return Err(Error::InvalidDeclaration(format!("duplicate sibling key {:?}", key)));
					}
				}
				Ok(key)
			})
			.collect()
	}

	/// Reconciles the child nodes of `parent` against `next`.
	#[allow(clippy::too_many_lines)]
	pub(crate) fn reconcile_children<'s>(&'s mut self, parent: D::Node, next: Vec<Flat<D::Node>>, depth: usize) -> LocalBoxFuture<'s, Result<(), Error>> {
		let span = trace_span!("Reconciling children", depth, "next.len()" = next.len());
		async move {
			if depth > self.options.depth_limit {
				error!("Depth limit reached");
				return Err(Error::DepthExceeded { limit: self.options.depth_limit });
			}

			let next_keys = self.keys_of_next(&next)?;
			let mut old = self.dom.children(&parent);

			// Live siblings that are passed through again only ever match themselves.
			// They are moved into place by whichever step handles their `Flat::Node`.
			let passed_through: Vec<D::Node> = next
				.iter()
				.filter_map(|flat| match flat {
					Flat::Node(node) if old.contains(node) => Some(node.clone()),
					_ => None,
				})
				.collect();
			if !passed_through.is_empty() {
				trace!(count = passed_through.len(), "Holding back passed-through live siblings.");
				old.retain(|node| !passed_through.contains(node));
			}

			match (old.is_empty(), next.is_empty()) {
				(true, true) => {
					trace!("Nothing to reconcile.");
					return Ok(());
				}
				(false, true) => {
					trace!("Removing all {} child node(s).", old.len());
					for node in &old {
						self.remove(&parent, node)?;
					}
					return Ok(());
				}
				(true, false) => return self.insert_all(&parent, next, None, depth).await,
				(false, false) => (),
			}

			let mut old: VecDeque<(Option<String>, D::Node)> = old.into_iter().map(|node| (self.key_of(&node), node)).collect();
			let mut next: VecDeque<(Option<String>, Flat<D::Node>)> = next_keys.into_iter().zip(next).collect();

			while matches!((old.front(), next.front()), (Some((old_key, _)), Some((next_key, _))) if old_key == next_key) {
				if let (Some((_, node)), Some((_, flat))) = (old.pop_front(), next.pop_front()) {
					self.patch_or_replace(parent.clone(), node, flat, depth).await?;
				}
			}

			// The first live node after the middle section. New nodes go before it.
			let mut anchor = None;
			while matches!((old.back(), next.back()), (Some((old_key, _)), Some((next_key, _))) if old_key == next_key) {
				if let (Some((_, node)), Some((_, flat))) = (old.pop_back(), next.pop_back()) {
					anchor = Some(self.patch_or_replace(parent.clone(), node, flat, depth).await?);
				}
			}

			if old.is_empty() {
				trace!("Old side exhausted. Inserting {} node(s).", next.len());
				self.insert_all(&parent, next.into_iter().map(|(_, flat)| flat).collect(), anchor, depth).await
			} else if next.is_empty() {
				trace!("New side exhausted. Removing {} node(s).", old.len());
				for (_, node) in old {
					self.remove(&parent, &node)?;
				}
				Ok(())
			} else {
				self.reconcile_middle(parent, old.into(), next, anchor, depth).await
			}
		}
		.instrument(span)
		.boxed_local()
	}

	/// Reconciles the overlap left between head and tail scan, before `anchor`.
	#[allow(clippy::too_many_lines)]
	fn reconcile_middle<'s>(
		&'s mut self,
		parent: D::Node,
		old: Vec<(Option<String>, D::Node)>,
		mut next: VecDeque<(Option<String>, Flat<D::Node>)>,
		anchor: Option<D::Node>,
		depth: usize,
	) -> LocalBoxFuture<'s, Result<(), Error>> {
		let span = trace_span!("Reconciling middle", "old.len()" = old.len(), "next.len()" = next.len());
		async move {
			let (old_keys, mut slots): (Vec<Option<String>>, Vec<Option<D::Node>>) = old.into_iter().map(|(key, node)| (key, Some(node))).unzip();

			let mut lookup = HashMap::<&str, usize>::with_capacity(old_keys.len());
			for (i, key) in old_keys.iter().enumerate() {
				if let Some(key) = key {
					match lookup.entry(key.as_str()) {
						Entry::Occupied(_) => warn!("Duplicate key {:?} among live siblings. Only the first of them can be reused.", key),
						Entry::Vacant(vacant) => {
							vacant.insert(i);
						}
					}
				}
			}
			let claimed: HashSet<String> = next.iter().filter_map(|(key, _)| key.clone()).collect();

			let mut i = 0;
			while let Some((key, flat)) = next.pop_front() {
				// If the following live sibling is the one wanted here, the current one was most likely just removed.
				// Only unclaimed nodes are dropped this way, so no keyed node is ever rebuilt because of it.
				loop {
					while matches!(slots.get(i), Some(None)) {
						i += 1;
					}
					let current = match slots.get(i) {
						Some(Some(current)) => current.clone(),
						_ => break,
					};
					let current_key = &old_keys[i];
					if key.is_none() || *current_key == key || current_key.as_ref().map_or(false, |current_key| claimed.contains(current_key)) {
						break;
					}
					let following = (i + 1..slots.len()).find(|&j| slots[j].is_some());
					if following.map_or(true, |j| old_keys[j] != key) {
						break;
					}
					trace!(current_key = ?current_key, "Following live sibling matches. Removing the current one in place.");
					self.remove(&parent, &current)?;
					slots[i] = None;
				}

				let current = slots.get(i).cloned().flatten();
				let reference = current.clone().or_else(|| anchor.clone());

				if let Some(current) = &current {
					if key.is_some() && old_keys[i] == key {
						self.patch_or_replace(parent.clone(), current.clone(), flat, depth).await?;
						slots[i] = None;
						i += 1;
						continue;
					}
				}

				if let Some(j) = key.as_deref().and_then(|key| lookup.get(key)).copied() {
					if let Some(moved) = slots[j].take() {
						trace!(?key, "Moving keyed node.");
						self.dom.insert_before(&parent, &moved, reference.as_ref())?;
						self.patch_or_replace(parent.clone(), moved, flat, depth).await?;
						continue;
					}
				}

				if let Some(current) = current {
					if key.is_none() && old_keys[i].is_none() {
						self.patch_or_replace(parent.clone(), current, flat, depth).await?;
						slots[i] = None;
						i += 1;
						continue;
					}
				}

				trace!(?key, "No match. Building a new node.");
				let built = self.build_flat(flat, depth).await?;
				self.dom.insert_before(&parent, &built, reference.as_ref())?;
			}

			for (node, key) in slots.into_iter().zip(&old_keys) {
				if let Some(node) = node {
					if self.dom.parent(&node).as_ref() == Some(&parent) {
						trace!(?key, "Removing unmatched node.");
						self.remove(&parent, &node)?;
					} else {
						warn!(?key, "Unmatched node was already detached by someone else. Unbinding it only.");
						self.unbind(&node, 0)?;
					}
				}
			}
			Ok(())
		}
		.instrument(span)
		.boxed_local()
	}

	fn compatibility(&self, old: &D::Node, next: &Declaration<D::Node>) -> Compatibility<D::Node> {
		if self.dom.kind(old) != NodeKind::Element {
			return Compatibility::Replace;
		}

		let previous = self.dom.attached(old);
		let (same_tag, same_kind) = match &previous {
			Some(previous) => (previous.tag == next.tag && previous.namespace == next.namespace, previous.kind == next.kind),
			// Found in the document, so the platform's casing may differ.
			None => (
				matches!((self.dom.tag_name(old), next.tag.name()), (Some(live), Some(declared)) if live.eq_ignore_ascii_case(declared)),
				true,
			),
		};

		if same_tag && same_kind {
			Compatibility::Patch(previous)
		} else if same_kind && next.key.is_some() && self.key_of(old) == next.key {
			Compatibility::Retag(previous)
		} else {
			Compatibility::Replace
		}
	}

	/// Makes `old` match `next`, in place where possible.
	///
	/// Returns the live node now standing where `old` was.
	pub(crate) fn patch_or_replace<'s>(&'s mut self, parent: D::Node, old: D::Node, next: Flat<D::Node>, depth: usize) -> LocalBoxFuture<'s, Result<D::Node, Error>> {
		async move {
			match next {
				Flat::Text(text) => {
					if self.dom.kind(&old) != NodeKind::Text {
						return self.replace(&parent, &old, Flat::Text(text), depth).await;
					}
					if self.dom.text(&old).as_deref() != Some(text.as_str()) {
						trace!(text = redact(&text), "Updating text.");
						self.dom.set_text(&old, &text)?;
					}
					Ok(old)
				}

				Flat::Node(node) if node == old => Ok(old),
				next @ Flat::Node(_) => self.replace(&parent, &old, next, depth).await,

				Flat::Element(element) => match self.compatibility(&old, &element.declaration) {
					Compatibility::Patch(previous) => {
						self.patch(old.clone(), previous, element, depth).await?;
						Ok(old)
					}
					Compatibility::Retag(previous) => self.retag(&parent, &old, previous, element, depth).await,
					Compatibility::Replace => self.replace(&parent, &old, Flat::Element(element), depth).await,
				},
			}
		}
		.boxed_local()
	}

	/// Patches a reused element and reconciles its children.
	fn patch<'s>(&'s mut self, node: D::Node, previous: Option<Rc<Declaration<D::Node>>>, element: FlatElement<D::Node>, depth: usize) -> LocalBoxFuture<'s, Result<(), Error>> {
		let span = trace_span!("Patching element", tag = ?element.declaration.tag, key = ?element.declaration.key);
		async move {
			let FlatElement { declaration, children } = element;

			let previous_ref = previous.as_ref().and_then(|previous| previous.node_ref.clone());
			let rebind = previous_ref != declaration.node_ref;
			if rebind {
				if let Some(previous_ref) = &previous_ref {
					trace!("Unbinding previous ref.");
					previous_ref.call(None);
				}
			}

			patch_element(self.dom, &node, previous.as_deref(), &declaration, self.options)?;

			match declaration.render_mode {
				RenderMode::Transparent => self.reconcile_children(node.clone(), children, depth + 1).await?,
				RenderMode::Opaque => trace!("Opaque element. Leaving its children alone."),
			}

			self.dom.attach(&node, Rc::clone(&declaration));

			if rebind {
				if let Some(node_ref) = &declaration.node_ref {
					trace!("Binding ref.");
					node_ref.call(Some(&node));
				}
			}
			Ok(())
		}
		.instrument(span)
		.boxed_local()
	}
}
