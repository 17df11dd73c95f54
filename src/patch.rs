//! Per-facet appliers that bring a live element from one declaration to the next.
//!
//! Each facet is diffed against the previous declaration (if any) and only changed entries are touched.
//! Listeners go last, so they never observe a half-patched element.

use crate::{
	declaration::{Declaration, Kind, Style},
	dom::{Dom, KEY_ATTRIBUTE},
	value::Value,
	Error, Options,
};
use hashbrown::HashMap;
use tracing::{instrument, trace, trace_span};

/// Applies `next` onto `element`, assuming it currently reflects `previous` (or nothing, for fresh elements).
///
/// The caller guarantees equal tag and kind.
#[instrument(skip(dom, previous, next, options), fields(tag = ?next.tag))]
pub(crate) fn patch_element<D: Dom>(dom: &mut D, element: &D::Node, previous: Option<&Declaration<D::Node>>, next: &Declaration<D::Node>, options: &Options) -> Result<(), Error> {
	debug_assert!(previous.map_or(true, |previous| previous.tag == next.tag && previous.kind == next.kind));

	if next.kind == Kind::Property {
		patch_properties(dom, element, previous.map(|previous| &previous.props), &next.props)?;
	}
	patch_attributes(dom, element, &previous.map(effective_attributes).unwrap_or_default(), &effective_attributes(next))?;
	patch_style(dom, element, previous.and_then(|previous| previous.style.as_ref()), next.style.as_ref())?;
	patch_dataset(dom, element, previous.map(|previous| &previous.dataset), &next.dataset)?;
	if options.key_markers {
		// Adopted elements may carry a marker without any declaration behind it.
		let previous_key = match previous {
			Some(previous) => previous.key.clone(),
			None => dom.attribute(element, KEY_ATTRIBUTE),
		};
		patch_key_marker(dom, element, previous_key.as_deref(), next.key.as_deref())?;
	}
	patch_listeners(dom, element, previous, next)
}

/// Everything that's set as an attribute: [`Declaration::attributes`] over attribute-kind [`Declaration::props`].
fn effective_attributes<N>(declaration: &Declaration<N>) -> HashMap<&str, &Value> {
	let mut attributes = HashMap::with_capacity(declaration.attributes.len() + declaration.props.len());
	if declaration.kind == Kind::Attribute {
		attributes.extend(declaration.props.iter().map(|(name, value)| (name.as_str(), value)));
	}
	attributes.extend(declaration.attributes.iter().map(|(name, value)| (name.as_str(), value)));
	attributes
}

fn patch_properties<D: Dom>(dom: &mut D, element: &D::Node, previous: Option<&HashMap<String, Value>>, next: &HashMap<String, Value>) -> Result<(), Error> {
	for (name, value) in next {
		if previous.and_then(|previous| previous.get(name)) == Some(value) {
			continue;
		}
		trace!(property = %name, "Setting property.");
		dom.set_property(element, name, value)?;
	}

	for (name, previous_value) in previous.into_iter().flatten() {
		if !next.contains_key(name) {
			let reset = Value::reset_for(name, previous_value);
			trace!(property = %name, ?reset, "Resetting property.");
			dom.set_property(element, name, &reset)?;
		}
	}
	Ok(())
}

fn patch_attributes<D: Dom>(dom: &mut D, element: &D::Node, previous: &HashMap<&str, &Value>, next: &HashMap<&str, &Value>) -> Result<(), Error> {
	for (&name, &value) in next {
		if previous.get(name) == Some(&value) {
			continue;
		}
		set_attribute_value(dom, element, name, value)?;
	}

	for &name in previous.keys() {
		if !next.contains_key(name) {
			trace!(attribute = name, "Removing attribute.");
			dom.remove_attribute(element, name)?;
		}
	}
	Ok(())
}

fn set_attribute_value<D: Dom>(dom: &mut D, element: &D::Node, name: &str, value: &Value) -> Result<(), Error> {
	match value.to_attribute()? {
		Some(text) => {
			trace!(attribute = name, "Setting attribute.");
			dom.set_attribute(element, name, &text)
		}
		None => {
			trace!(attribute = name, "Removing attribute for absent value.");
			dom.remove_attribute(element, name)
		}
	}
}

fn patch_style<D: Dom>(dom: &mut D, element: &D::Node, previous: Option<&Style>, next: Option<&Style>) -> Result<(), Error> {
	let span = trace_span!("Patching style");
	let _enter = span.enter();

	match (previous, next) {
		(None, None) => Ok(()),
		(Some(_), None) => dom.remove_attribute(element, "style"),
		(previous, Some(Style::Text(text))) => {
			if previous != next {
				dom.set_attribute(element, "style", text)?;
			}
			Ok(())
		}
		(Some(Style::Properties(previous)), Some(Style::Properties(next))) => {
			for (name, value) in next {
				if previous.get(name) != Some(value) {
					dom.set_style(element, name, value)?;
				}
			}
			for name in previous.keys() {
				if !next.contains_key(name) {
					dom.remove_style(element, name)?;
				}
			}
			Ok(())
		}
		// Coming from attribute text (or nothing), so only what's declared is touched.
		(Some(Style::Text(_)) | None, Some(Style::Properties(next))) => {
			for (name, value) in next {
				dom.set_style(element, name, value)?;
			}
			Ok(())
		}
	}
}

/// `fooBar` -> `data-foo-bar`, like `HTMLElement.dataset`.
pub(crate) fn data_attribute_name(key: &str) -> String {
	let mut name = String::with_capacity(key.len() + 8);
	name.push_str("data-");
	for c in key.chars() {
		if c.is_ascii_uppercase() {
			name.push('-');
			name.push(c.to_ascii_lowercase());
		} else {
			name.push(c);
		}
	}
	name
}

fn patch_dataset<D: Dom>(dom: &mut D, element: &D::Node, previous: Option<&HashMap<String, String>>, next: &HashMap<String, String>) -> Result<(), Error> {
	for (key, value) in next {
		if previous.and_then(|previous| previous.get(key)) != Some(value) {
			dom.set_attribute(element, &data_attribute_name(key), value)?;
		}
	}
	for key in previous.into_iter().flat_map(HashMap::keys) {
		if !next.contains_key(key) {
			// Deleted rather than blanked, so `key in dataset` turns false.
			dom.remove_attribute(element, &data_attribute_name(key))?;
		}
	}
	Ok(())
}

fn patch_key_marker<D: Dom>(dom: &mut D, element: &D::Node, previous: Option<&str>, next: Option<&str>) -> Result<(), Error> {
	match (previous, next) {
		(previous, Some(next)) if previous != Some(next) => dom.set_attribute(element, KEY_ATTRIBUTE, next),
		(Some(_), None) => dom.remove_attribute(element, KEY_ATTRIBUTE),
		_ => Ok(()),
	}
}

fn patch_listeners<D: Dom>(dom: &mut D, element: &D::Node, previous: Option<&Declaration<D::Node>>, next: &Declaration<D::Node>) -> Result<(), Error> {
	let span = trace_span!("Patching listeners", count = next.listeners.len());
	let _enter = span.enter();

	for (key, listener) in &next.listeners {
		match previous.and_then(|previous| previous.listeners.get(key)) {
			Some(previous) if previous == listener => (),
			Some(previous) => {
				trace!(event = %key.event, capture = key.capture, "Replacing listener.");
				dom.remove_listener(element, previous)?;
				dom.add_listener(element, listener)?;
			}
			None => {
				trace!(event = %key.event, capture = key.capture, "Adding listener.");
				dom.add_listener(element, listener)?;
			}
		}
	}

	for (key, listener) in previous.into_iter().flat_map(|previous| &previous.listeners) {
		if !next.listeners.contains_key(key) {
			trace!(event = %key.event, capture = key.capture, "Removing listener.");
			dom.remove_listener(element, listener)?;
		}
	}
	Ok(())
}
