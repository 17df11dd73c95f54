//! The browser [`Dom`], backed by [`web_sys`].
//!
//! Event handlers are reference-counted per [`WebDom`] instance: Each distinct [`Handler`](`crate::Handler`)
//! gets one [`Closure`], which is freed during [`Dom::settle`] once no live listener uses it anymore.
//!
//! Listeners on nodes that outlive their [`WebDom`] start throwing into JavaScript when invoked.

use crate::{
	declaration::{Declaration, Listener, ListenerOptions, Namespace},
	dom::{Dom, NodeKind},
	rc_hash_map::RcHashMap,
	value::Value,
	Error,
};
use futures::future::{FutureExt, LocalBoxFuture};
use hashbrown::HashMap;
use js_sys::{Function, Object, Promise, Reflect, JSON};
use std::rc::Rc;
use tracing::{error, info, instrument, level_filters::STATIC_MAX_LEVEL, trace, warn, Level};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AddEventListenerOptions, CssStyleDeclaration, Document, HtmlElement, SvgElement};

/// The expando property through which live nodes find their attached declaration.
const DECLARATION_ID: &str = "__keystoneDeclarationId";

fn js_error(operation: &'static str) -> impl FnOnce(JsValue) -> Error {
	move |error| Error::platform(operation, format!("{:?}", error))
}

fn to_js(value: &Value) -> Result<JsValue, Error> {
	Ok(match value {
		Value::Undefined => JsValue::UNDEFINED,
		Value::Bool(bool) => JsValue::from_bool(*bool),
		Value::Number(number) => JsValue::from_f64(*number),
		Value::Str(string) => JsValue::from_str(string),
		Value::Json(json) => JSON::parse(&serde_json::to_string(json)?).map_err(js_error("JSON.parse"))?,
	})
}

#[derive(Debug)]
pub struct WebDom {
	document: Document,
	declarations: HashMap<u32, Rc<Declaration<web_sys::Node>>>,
	next_declaration_id: u32,
	handler_handles: RcHashMap<usize, u16, Closure<dyn Fn(web_sys::Event)>>,
	event_listener_options_cache: [Option<AddEventListenerOptions>; 8],
}

impl WebDom {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self {
			document,
			declarations: HashMap::new(),
			next_declaration_id: 0,
			handler_handles: RcHashMap::new(),
			event_listener_options_cache: [None, None, None, None, None, None, None, None],
		}
	}

	/// Uses the document of the global `window`.
	///
	/// # Errors
	///
	/// Iff there is no `window` or it has no document, e.g. in a worker.
	pub fn for_window() -> Result<Self, Error> {
		let document = web_sys::window()
			.and_then(|window| window.document())
			.ok_or_else(|| Error::platform("window.document", "no document found"))?;
		Ok(Self::new(document))
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	/// How many listener closures are currently allocated, including ones that will be freed at the end of the update.
	#[must_use]
	pub fn handler_count(&self) -> usize {
		self.handler_handles.len()
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn declaration_id(node: &web_sys::Node) -> Option<u32> {
		Reflect::get(node, &JsValue::from_str(DECLARATION_ID)).ok()?.as_f64().map(|id| id as u32)
	}

	fn get_or_create_listener<'a>(handler_handles: &'a mut RcHashMap<usize, u16, Closure<dyn Fn(web_sys::Event)>>, listener: &Listener) -> Result<&'a Function, Error> {
		let handler = listener.handler.clone();
		handler_handles
			.increment_or_insert_with(listener.handler.address(), move || {
				Closure::wrap(Box::new(move |event: web_sys::Event| {
					let span = tracing::trace_span!("Handler", event = ?event.type_());
					let _enter = span.enter();
					handler.call(&event);
				}) as Box<dyn Fn(web_sys::Event)>)
			})
			.map(|closure| {
				let closure: &Closure<_> = closure;
				closure.as_ref().unchecked_ref::<Function>()
			})
			.map_err(|_| Error::platform("addEventListener", "too many (more than 65k) live listeners with the same handler"))
	}

	fn get_cached_add_event_listener_options(event_listener_options_cache: &mut [Option<AddEventListenerOptions>; 8], options: ListenerOptions) -> &AddEventListenerOptions {
		let index = usize::from(options.capture) + usize::from(options.once) * 2 + usize::from(options.passive) * 4;
		event_listener_options_cache[index].get_or_insert_with(|| {
			let web_options = AddEventListenerOptions::new();
			web_options.set_capture(options.capture);
			web_options.set_once(options.once);
			web_options.set_passive(options.passive);
			web_options
		})
	}

	fn element<'a>(node: &'a web_sys::Node, operation: &'static str) -> Result<&'a web_sys::Element, Error> {
		node.dyn_ref::<web_sys::Element>()
			.ok_or_else(|| Error::platform(operation, format!("{:?} is not an element", node)))
	}

	fn style(node: &web_sys::Node, operation: &'static str) -> Result<CssStyleDeclaration, Error> {
		if let Some(html_element) = node.dyn_ref::<HtmlElement>() {
			Ok(html_element.style())
		} else if let Some(svg_element) = node.dyn_ref::<SvgElement>() {
			Ok(svg_element.style())
		} else {
			Err(Error::platform(operation, format!("{:?} has no inline style", node)))
		}
	}

	fn expect_child(parent: &web_sys::Node, child: &web_sys::Node) -> Result<(), Error> {
		if child.parent_node().as_ref() == Some(parent) {
			Ok(())
		} else {
			Err(Error::ParentMismatch)
		}
	}
}

impl Dom for WebDom {
	type Node = web_sys::Node;

	fn create_element(&mut self, tag: &str, namespace: Namespace) -> Result<web_sys::Node, Error> {
		match namespace.uri() {
			None => self.document.create_element(tag),
			Some(uri) => self.document.create_element_ns(Some(uri), tag),
		}
		.map(Into::into)
		.map_err(js_error("createElement"))
	}

	fn create_text(&mut self, text: &str) -> Result<web_sys::Node, Error> {
		Ok(self.document.create_text_node(text).into())
	}

	fn create_fragment(&mut self) -> Result<web_sys::Node, Error> {
		Ok(self.document.create_document_fragment().into())
	}

	fn kind(&self, node: &web_sys::Node) -> NodeKind {
		match node.node_type() {
			web_sys::Node::ELEMENT_NODE => NodeKind::Element,
			web_sys::Node::TEXT_NODE => NodeKind::Text,
			web_sys::Node::DOCUMENT_FRAGMENT_NODE => NodeKind::Fragment,
			_ => NodeKind::Other,
		}
	}

	fn tag_name(&self, node: &web_sys::Node) -> Option<String> {
		node.dyn_ref::<web_sys::Element>().map(web_sys::Element::tag_name)
	}

	fn text(&self, node: &web_sys::Node) -> Option<String> {
		node.dyn_ref::<web_sys::Text>().map(|text| text.data())
	}

	fn set_text(&mut self, node: &web_sys::Node, text: &str) -> Result<(), Error> {
		node.dyn_ref::<web_sys::Text>()
			.ok_or_else(|| Error::platform("setData", format!("{:?} is not a text node", node)))?
			.set_data(text);
		Ok(())
	}

	fn parent(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
		node.parent_node()
	}

	fn children(&self, node: &web_sys::Node) -> Vec<web_sys::Node> {
		let child_nodes = node.child_nodes();
		(0..child_nodes.length()).filter_map(|i| child_nodes.item(i)).collect()
	}

	fn insert_before(&mut self, parent: &web_sys::Node, child: &web_sys::Node, reference: Option<&web_sys::Node>) -> Result<(), Error> {
		parent.insert_before(child, reference).map(drop).map_err(js_error("insertBefore"))
	}

	fn remove_child(&mut self, parent: &web_sys::Node, child: &web_sys::Node) -> Result<(), Error> {
		Self::expect_child(parent, child)?;
		parent.remove_child(child).map(drop).map_err(js_error("removeChild"))
	}

	fn replace_child(&mut self, parent: &web_sys::Node, new: &web_sys::Node, old: &web_sys::Node) -> Result<(), Error> {
		Self::expect_child(parent, old)?;
		parent.replace_child(new, old).map(drop).map_err(js_error("replaceChild"))
	}

	fn attribute(&self, node: &web_sys::Node, name: &str) -> Option<String> {
		node.dyn_ref::<web_sys::Element>()?.get_attribute(name)
	}

	fn set_attribute(&mut self, node: &web_sys::Node, name: &str, value: &str) -> Result<(), Error> {
		Self::element(node, "setAttribute")?
			.set_attribute(name, value)
			.map_err(js_error("setAttribute"))
	}

	fn remove_attribute(&mut self, node: &web_sys::Node, name: &str) -> Result<(), Error> {
		Self::element(node, "removeAttribute")?
			.remove_attribute(name)
			.map_err(js_error("removeAttribute"))
	}

	fn set_property(&mut self, node: &web_sys::Node, name: &str, value: &Value) -> Result<(), Error> {
		if Reflect::set(node, &JsValue::from_str(name), &to_js(value)?).map_err(js_error("setProperty"))? {
			Ok(())
		} else {
			Err(Error::platform("setProperty", format!("property {:?} is read-only", name)))
		}
	}

	fn set_style(&mut self, node: &web_sys::Node, name: &str, value: &str) -> Result<(), Error> {
		Self::style(node, "style.setProperty")?
			.set_property(name, value)
			.map_err(js_error("style.setProperty"))
	}

	fn remove_style(&mut self, node: &web_sys::Node, name: &str) -> Result<(), Error> {
		Self::style(node, "style.removeProperty")?
			.remove_property(name)
			.map(drop)
			.map_err(js_error("style.removeProperty"))
	}

	#[instrument(skip(self, listener), fields(event = %listener.event))]
	fn add_listener(&mut self, node: &web_sys::Node, listener: &Listener) -> Result<(), Error> {
		let function = Self::get_or_create_listener(&mut self.handler_handles, listener)?;
		let options = Self::get_cached_add_event_listener_options(&mut self.event_listener_options_cache, listener.options);
		node.add_event_listener_with_callback_and_add_event_listener_options(&listener.event, function, options)
			.map_err(js_error("addEventListener"))
	}

	#[instrument(skip(self, listener), fields(event = %listener.event))]
	fn remove_listener(&mut self, node: &web_sys::Node, listener: &Listener) -> Result<(), Error> {
		let closure = match self.handler_handles.weak_decrement(&listener.handler.address()) {
			Ok(Some(closure)) => closure,
			Ok(None) => {
				warn!("Tried to remove a listener that was never added through this `WebDom`.");
				return Ok(());
			}
			Err(_) => return Err(Error::platform("removeEventListener", "listener handle decremented more often than added")),
		};
		node.remove_event_listener_with_callback_and_bool(&listener.event, closure.as_ref().unchecked_ref(), listener.options.capture)
			.map_err(js_error("removeEventListener"))
	}

	fn attached(&self, node: &web_sys::Node) -> Option<Rc<Declaration<web_sys::Node>>> {
		self.declarations.get(&Self::declaration_id(node)?).cloned()
	}

	fn attach(&mut self, node: &web_sys::Node, declaration: Rc<Declaration<web_sys::Node>>) {
		let id = match Self::declaration_id(node) {
			Some(id) => id,
			None => {
				let id = self.next_declaration_id;
				self.next_declaration_id = self.next_declaration_id.wrapping_add(1);
				if let Err(error) = Reflect::set(node, &JsValue::from_str(DECLARATION_ID), &JsValue::from(id)) {
					error!("Failed to tag node with its declaration: {:?}", error);
					return;
				}
				id
			}
		};
		self.declarations.insert(id, declaration);
	}

	fn release(&mut self, node: &web_sys::Node) {
		let id = match Self::declaration_id(node) {
			Some(id) => id,
			None => return,
		};
		if let Err(error) = Reflect::delete_property(node.unchecked_ref::<Object>(), &JsValue::from_str(DECLARATION_ID)) {
			warn!("Failed to untag released node: {:?}", error);
		}

		if let Some(declaration) = self.declarations.remove(&id) {
			for listener in declaration.listeners.values() {
				match self.handler_handles.weak_decrement(&listener.handler.address()) {
					Ok(Some(_)) => (),
					Ok(None) => warn!(event = %listener.event, "Released listener had no handle."),
					Err(_) => error!(event = %listener.event, "Listener handle decremented more often than added."),
				}
			}
		}
	}

	fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
		let window = self.document.default_view();
		async move {
			let promise = Promise::new(&mut |resolve, _reject| {
				let scheduled = window.as_ref().map_or(false, |window| window.request_animation_frame(&resolve).is_ok());
				if !scheduled {
					trace!("No animation frame available. Resolving immediately.");
					drop(resolve.call0(&JsValue::UNDEFINED));
				}
			});
			if let Err(error) = JsFuture::from(promise).await {
				warn!("Waiting for the next frame failed: {:?}", error);
			}
		}
		.boxed_local()
	}

	fn settle(&mut self) {
		let freed = self.handler_handles.drain_weak().count();
		trace!("Freed {} listener closure(s).", freed);
		info!("Listener closure count: {}", self.handler_handles.len());
		info!("Attached declaration count: {}", self.declarations.len());
		if STATIC_MAX_LEVEL >= Level::WARN && self.handler_handles.len() >= 10_000 {
			warn!(
				"There are many distinct live handlers ({}).\n\
				This may point to handlers being recreated on each render instead of being reused.",
				self.handler_handles.len()
			);
		}
	}
}
