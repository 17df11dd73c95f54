#![cfg(not(target_arch = "wasm32"))]

use keystone_dom::{
	declaration::{Kind, ListenerOptions},
	memory::{Mutation, NodeId},
	Declaration, Dom, Handler, Listener, NodeRef, Value,
};
use std::{cell::RefCell, rc::Rc};

mod memory_setup_;
use memory_setup_::{render, setup};

#[test]
fn style_text_to_properties() {
	let (mut dom, root) = setup();
	render(&mut dom, root, Declaration::element("div").style_text("color: red; margin: 1px"));
	let div = dom.children(&root)[0];

	render(&mut dom, root, Declaration::element("div").style("color", "blue"));

	assert_eq!(dom.children(&root), vec![div]);
	assert_eq!(dom.style_property(div, "color"), Some("blue"));
	assert_eq!(dom.style_property(div, "margin"), Some("1px"));
}

#[test]
fn style_properties_are_diffed() {
	let (mut dom, root) = setup();
	render(&mut dom, root, Declaration::element("div").style("color", "red").style("width", "1px"));
	let div = dom.children(&root)[0];
	dom.take_mutations();

	render(&mut dom, root, Declaration::element("div").style("color", "red").style("height", "2px"));
	let mut mutations = dom.take_mutations();
	mutations.sort_by_key(|mutation| format!("{:?}", mutation));
	assert_eq!(
		mutations,
		vec![
			Mutation::RemoveStyle { node: div, name: "width".to_owned() },
			Mutation::SetStyle { node: div, name: "height".to_owned() },
		]
	);

	render(&mut dom, root, Declaration::element("div"));
	assert_eq!(dom.attribute(&div, "style"), None);
}

#[test]
fn listener_swap() {
	let (mut dom, root) = setup();
	let calls = Rc::new(RefCell::new(Vec::new()));
	let first = Handler::new({
		let calls = Rc::clone(&calls);
		move |_: &()| calls.borrow_mut().push("first")
	});
	let second = Handler::new({
		let calls = Rc::clone(&calls);
		move |_: &()| calls.borrow_mut().push("second")
	});

	render(&mut dom, root, Declaration::element("button").on("click", first));
	let button = dom.children(&root)[0];
	dom.take_mutations();

	render(&mut dom, root, Declaration::element("button").on("click", second));
	assert_eq!(
		dom.mutations(),
		&[
			Mutation::RemoveListener { node: button, event: "click".to_owned() },
			Mutation::AddListener { node: button, event: "click".to_owned() },
		]
	);

	assert_eq!(dom.dispatch(button, "click", &()), 1);
	assert_eq!(*calls.borrow(), vec!["second"]);
}

#[test]
fn listener_removal_and_options() {
	let (mut dom, root) = setup();
	let count = Rc::new(RefCell::new(0));
	let handler = Handler::new({
		let count = Rc::clone(&count);
		move |_: &()| *count.borrow_mut() += 1
	});
	let once = ListenerOptions {
		once: true,
		..ListenerOptions::default()
	};

	render(&mut dom, root, Declaration::element("a").listener(Listener::new("click", handler.clone()).options(once)));
	let anchor = dom.children(&root)[0];
	assert_eq!(dom.dispatch(anchor, "click", &()), 1);
	assert_eq!(dom.dispatch(anchor, "click", &()), 0);
	assert_eq!(*count.borrow(), 1);

	// Same key, other options: Swapped for a persistent listener.
	render(&mut dom, root, Declaration::element("a").on("click", handler));
	assert_eq!(dom.listener_count(anchor), 1);
	dom.dispatch(anchor, "click", &());
	dom.dispatch(anchor, "click", &());
	assert_eq!(*count.borrow(), 3);

	render(&mut dom, root, Declaration::element("a"));
	assert_eq!(dom.listener_count(anchor), 0);
}

#[test]
fn capture_and_bubble_are_separate_slots() {
	let (mut dom, root) = setup();
	let handler = Handler::new(|_: &()| ());
	let capture = ListenerOptions {
		capture: true,
		..ListenerOptions::default()
	};

	render(
		&mut dom,
		root,
		Declaration::element("div")
			.on("click", handler.clone())
			.listener(Listener::new("click", handler).options(capture)),
	);
	assert_eq!(dom.listener_count(dom.children(&root)[0]), 2);
}

#[test]
fn properties_and_attributes() {
	let (mut dom, root) = setup();
	render(
		&mut dom,
		root,
		Declaration::element("input")
			.prop("value", "typed")
			.prop("checked", true)
			.attr("placeholder", "Name")
			.attr("required", true)
			.attr("maxlength", 12),
	);
	let input = dom.children(&root)[0];

	assert_eq!(dom.property(input, "value"), Some(&Value::from("typed")));
	assert_eq!(dom.property(input, "checked"), Some(&Value::Bool(true)));
	assert_eq!(dom.attribute(&input, "value"), None);
	assert_eq!(dom.inner_html(root), r#"<input maxlength="12" placeholder="Name" required=""></input>"#);
}

#[test]
fn attribute_kind_overlays_attributes() {
	let (mut dom, root) = setup();
	render(
		&mut dom,
		root,
		Declaration::element("custom-element")
			.kind(Kind::Attribute)
			.prop("mode", "prop")
			.prop("size", 3)
			.attr("mode", "attr"),
	);
	let element = dom.children(&root)[0];

	assert_eq!(dom.attribute(&element, "mode").as_deref(), Some("attr"));
	assert_eq!(dom.attribute(&element, "size").as_deref(), Some("3"));
	assert_eq!(dom.property(element, "size"), None);

	render(&mut dom, root, Declaration::element("custom-element").kind(Kind::Attribute).prop("disabled", false));
	assert_eq!(dom.inner_html(root), "<custom-element></custom-element>");
}

#[test]
fn structured_attribute_values() {
	let (mut dom, root) = setup();
	render(&mut dom, root, Declaration::element("div").attr("data-config", serde_json::json!({ "a": [1, 2] })));
	let div = dom.children(&root)[0];
	assert_eq!(dom.attribute(&div, "data-config").as_deref(), Some(r#"{"a":[1,2]}"#));
}

#[test]
fn removed_properties_are_reset() {
	let (mut dom, root) = setup();
	render(
		&mut dom,
		root,
		Declaration::element("input")
			.prop("checked", true)
			.prop("value", "x")
			.prop("tabIndex", 3)
			.prop("customFlag", true),
	);
	let input = dom.children(&root)[0];

	render(&mut dom, root, Declaration::element("input"));

	assert_eq!(dom.property(input, "checked"), Some(&Value::Bool(false)));
	assert_eq!(dom.property(input, "value"), Some(&Value::from("")));
	assert_eq!(dom.property(input, "tabIndex"), Some(&Value::Number(0.0)));
	assert_eq!(dom.property(input, "customFlag"), Some(&Value::Bool(false)));
}

#[test]
fn dataset_entries_are_deleted() {
	let (mut dom, root) = setup();
	render(&mut dom, root, Declaration::element("div").data("userId", "7").data("role", "admin"));
	let div = dom.children(&root)[0];
	assert_eq!(dom.attribute(&div, "data-user-id").as_deref(), Some("7"));

	render(&mut dom, root, Declaration::element("div").data("role", "user"));
	assert_eq!(dom.attribute(&div, "data-user-id"), None);
	assert_eq!(dom.attribute(&div, "data-role").as_deref(), Some("user"));
}

fn recording_ref(log: &Rc<RefCell<Vec<(&'static str, Option<NodeId>)>>>, name: &'static str) -> NodeRef<NodeId> {
	let log = Rc::clone(log);
	NodeRef::new(move |node: Option<&NodeId>| log.borrow_mut().push((name, node.copied())))
}

#[test]
fn refs_follow_the_node() {
	let (mut dom, root) = setup();
	let log = Rc::new(RefCell::new(Vec::new()));
	let first = recording_ref(&log, "first");
	let second = recording_ref(&log, "second");

	render(&mut dom, root, Declaration::element("canvas").node_ref(first.clone()));
	let canvas = dom.children(&root)[0];
	assert_eq!(*log.borrow(), vec![("first", Some(canvas))]);

	render(&mut dom, root, Declaration::element("canvas").node_ref(first));
	assert_eq!(log.borrow().len(), 1);

	render(&mut dom, root, Declaration::element("canvas").node_ref(second));
	assert_eq!(log.borrow()[1..], [("first", None), ("second", Some(canvas))]);

	render(&mut dom, root, Declaration::<NodeId>::fragment([]));
	assert_eq!(log.borrow()[3..], [("second", None)]);
}

#[test]
fn refs_unbind_deepest_first() {
	let (mut dom, root) = setup();
	let log = Rc::new(RefCell::new(Vec::new()));

	render(
		&mut dom,
		root,
		Declaration::element("ul")
			.node_ref(recording_ref(&log, "outer"))
			.child(Declaration::element("li").node_ref(recording_ref(&log, "inner"))),
	);
	let names: Vec<_> = log.borrow().iter().map(|(name, _)| *name).collect();
	assert_eq!(names, vec!["inner", "outer"]);
	log.borrow_mut().clear();

	render(&mut dom, root, "gone");
	assert_eq!(log.borrow().iter().map(|(name, node)| (*name, node.is_none())).collect::<Vec<_>>(), vec![("inner", true), ("outer", true)]);
}

#[test]
fn unchanged_ref_follows_a_retag() {
	let (mut dom, root) = setup();
	let log = Rc::new(RefCell::new(Vec::new()));
	let node_ref = recording_ref(&log, "r");

	render(&mut dom, root, Declaration::element("div").key("k").node_ref(node_ref.clone()).child("kept"));
	let div = dom.children(&root)[0];
	let kept = dom.children(&div)[0];

	render(&mut dom, root, Declaration::element("section").key("k").node_ref(node_ref).child("kept"));
	let section = dom.children(&root)[0];
	assert_ne!(section, div);
	assert_eq!(dom.children(&section), vec![kept]);
	assert_eq!(*log.borrow(), vec![("r", Some(div)), ("r", Some(section))]);
}
