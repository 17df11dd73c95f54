#![cfg(not(target_arch = "wasm32"))]

use futures::executor::block_on;
use keystone_dom::{
	declaration::{Kind, Namespace},
	memory::{MemoryDom, Mutation, NodeId},
	update, Child, Declaration, Dom, Error, Options,
};

mod memory_setup_;
use memory_setup_::{li, list, render, setup};

fn keyed_list(dom: &mut MemoryDom, root: NodeId, keys: &[&str]) -> Vec<NodeId> {
	render(dom, root, list(keys.iter().map(|key| li(key, key))));
	dom.children(&root)
}

#[test]
fn reorder_reuses_nodes() {
	let (mut dom, root) = setup();
	render(&mut dom, root, list([li("1", "A"), li("2", "B"), li("3", "C")]));
	let old = dom.children(&root);
	dom.take_mutations();

	render(&mut dom, root, list([li("2", "B2"), li("1", "A2")]));

	assert_eq!(dom.children(&root), vec![old[1], old[0]]);
	assert_eq!(dom.inner_html(root), r#"<li key="2">B2</li><li key="1">A2</li>"#);
	assert_eq!(dom.created_elements(), 0);
	assert_eq!(dom.parent(&old[2]), None);
}

#[test]
fn reversal_moves_only() {
	let (mut dom, root) = setup();
	let old = keyed_list(&mut dom, root, &["1", "2", "3", "4", "5"]);
	dom.take_mutations();

	let new = keyed_list(&mut dom, root, &["5", "4", "3", "2", "1"]);

	assert_eq!(new, old.iter().rev().copied().collect::<Vec<_>>());
	assert!(dom
		.mutations()
		.iter()
		.all(|mutation| matches!(mutation, Mutation::Insert { .. })));
}

#[test]
fn shrinking_list_reuses_retained_keys() {
	let (mut dom, root) = setup();
	let old = keyed_list(&mut dom, root, &["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);
	dom.take_mutations();

	let new = keyed_list(&mut dom, root, &["7", "2", "new-a", "5", "new-b", "9"]);

	assert_eq!(new.len(), 6);
	let reused: Vec<_> = new.iter().filter(|node| old.contains(node)).collect();
	assert_eq!(reused, vec![&old[7], &old[2], &old[5], &old[9]]);
	assert_eq!(dom.created_elements(), 2);
	assert_eq!(dom.text_content(root), "72new-a5new-b9");

	for (i, node) in old.iter().enumerate() {
		if ![2, 5, 7, 9].contains(&i) {
			assert_eq!(dom.parent(node), None, "old node {} should be detached", i);
			assert!(dom.attached(node).is_none());
		}
	}
}

#[test]
fn removal_from_the_middle() {
	let (mut dom, root) = setup();
	let old = keyed_list(&mut dom, root, &["a", "b", "c", "d"]);

	let new = keyed_list(&mut dom, root, &["b", "d"]);

	assert_eq!(new, vec![old[1], old[3]]);
	assert_eq!(dom.parent(&old[0]), None);
	assert_eq!(dom.parent(&old[2]), None);
}

#[test]
fn removed_predecessor_is_dropped_in_place() {
	let (mut dom, root) = setup();
	let old = keyed_list(&mut dom, root, &["a", "b", "c"]);
	dom.take_mutations();

	keyed_list(&mut dom, root, &["b", "x"]);

	assert_eq!(dom.children(&root)[0], old[1]);
	assert_eq!(dom.text_content(root), "bx");
	assert!(
		!dom.mutations().iter().any(|mutation| matches!(mutation, Mutation::Insert { node, .. } if *node == old[1])),
		"`b` should stay where it is, {:#?}",
		dom.mutations()
	);
	assert_eq!(
		dom.mutations().iter().find(|mutation| matches!(mutation, Mutation::Remove { .. } | Mutation::Insert { .. })),
		Some(&Mutation::Remove { parent: root, node: old[0] })
	);
}

#[test]
fn duplicate_keys_are_rejected() {
	let (mut dom, root) = setup();
	let result = block_on(update(&mut dom, &root, list([li("1", "A"), li("1", "B")]), &Options::new()));
	assert!(matches!(result, Err(Error::InvalidDeclaration(_))), "{:?}", result);
	assert!(dom.children(&root).is_empty());
}

#[test]
fn key_change_on_same_tag_rebuilds() {
	let (mut dom, root) = setup();
	let old = keyed_list(&mut dom, root, &["a"]);
	dom.take_mutations();

	let new = keyed_list(&mut dom, root, &["b"]);

	assert_ne!(new, old);
	assert_eq!(dom.created_elements(), 1);
	assert_eq!(dom.parent(&old[0]), None);
}

#[test]
fn retag_keeps_children() {
	let (mut dom, root) = setup();
	render(&mut dom, root, Declaration::element("div").key("k").child(Declaration::element("span").child("hello")));
	let div = dom.children(&root)[0];
	let span = dom.children(&div)[0];

	render(&mut dom, root, Declaration::element("section").key("k").child(Declaration::element("span").child("hello")));

	let section = dom.children(&root)[0];
	assert_ne!(section, div);
	assert_eq!(dom.children(&section), vec![span]);
	assert_eq!(dom.inner_html(root), r#"<section key="k"><span>hello</span></section>"#);
	assert!(dom.attached(&div).is_none());
}

#[test]
fn adopts_keyed_markup() {
	let (mut dom, root) = setup();
	let existing = dom.create_element("li", Namespace::Html).unwrap();
	dom.set_attribute(&existing, "key", "k").unwrap();
	dom.insert_before(&root, &existing, None).unwrap();

	render(&mut dom, root, list([li("k", "adopted")]));

	assert_eq!(dom.children(&root), vec![existing]);
	assert_eq!(dom.inner_html(root), r#"<li key="k">adopted</li>"#);
}

#[test]
fn keys_without_markers() {
	let (mut dom, root) = setup();
	let options = Options::new().without_key_markers();
	block_on(update(&mut dom, &root, list([li("1", "A"), li("2", "B")]), &options)).unwrap();
	let old = dom.children(&root);
	assert_eq!(dom.inner_html(root), "<li>A</li><li>B</li>");

	block_on(update(&mut dom, &root, list([li("2", "B"), li("1", "A")]), &options)).unwrap();
	assert_eq!(dom.children(&root), vec![old[1], old[0]]);
}

#[test]
fn passed_through_live_nodes_reorder() {
	let (mut dom, root) = setup();
	let a = dom.create_text("a").unwrap();
	let b = dom.create_text("b").unwrap();
	dom.insert_before(&root, &a, None).unwrap();
	dom.insert_before(&root, &b, None).unwrap();

	render(&mut dom, root, list([Child::Node(b), Child::Node(a)]));
	assert_eq!(dom.children(&root), vec![b, a]);
	assert_eq!(dom.inner_html(root), "ba");

	render(&mut dom, root, list([Declaration::element("p").into(), Declaration::element("q").into()]));
	let elements = dom.children(&root);
	render(&mut dom, root, list([Child::Node(elements[1]), "between".into(), Child::Node(elements[0])]));
	assert_eq!(dom.children(&root)[0], elements[1]);
	assert_eq!(dom.children(&root)[2], elements[0]);
	assert_eq!(dom.inner_html(root), "<q></q>between<p></p>");
	assert!(dom.attached(&elements[0]).is_some());
	assert!(dom.attached(&elements[1]).is_some());
}

#[test]
fn live_node_lifted_out_of_replaced_parent() {
	let (mut dom, root) = setup();
	let span = dom.create_element("span", Namespace::Html).unwrap();
	render(&mut dom, root, Declaration::element("div").child(Child::Node(span)));
	let div = dom.children(&root)[0];

	render(&mut dom, root, Child::Node(span));
	assert_eq!(dom.children(&root), vec![span]);
	assert_eq!(dom.parent(&div), None);
	assert_eq!(dom.inner_html(root), "<span></span>");
}

#[test]
fn adopted_key_markers_are_diffed_against_the_document() {
	let (mut dom, root) = setup();
	let existing = dom.create_element("li", Namespace::Html).unwrap();
	dom.set_attribute(&existing, "key", "k").unwrap();
	dom.insert_before(&root, &existing, None).unwrap();
	dom.take_mutations();

	render(&mut dom, root, list([li("k", "adopted")]));
	assert_eq!(dom.children(&root), vec![existing]);
	assert!(
		!dom.mutations().iter().any(|mutation| matches!(mutation, Mutation::SetAttribute { name, .. } if name == "key")),
		"{:#?}",
		dom.mutations()
	);

	// A keyless declaration never takes over a keyed node, so no stale marker can survive.
	render(&mut dom, root, Declaration::element("li").child("keyless"));
	assert_ne!(dom.children(&root), vec![existing]);
	assert_eq!(dom.inner_html(root), "<li>keyless</li>");
}

#[test]
fn kind_change_with_same_key_replaces() {
	let (mut dom, root) = setup();
	render(&mut dom, root, Declaration::element("input").key("k").prop("value", "x"));
	let old = dom.children(&root)[0];

	render(&mut dom, root, Declaration::element("input").key("k").kind(Kind::Attribute).prop("value", "x"));
	let new = dom.children(&root)[0];
	assert_ne!(new, old);
	assert_eq!(dom.parent(&old), None);
	assert_eq!(dom.inner_html(root), r#"<input key="k" value="x"></input>"#);
}
