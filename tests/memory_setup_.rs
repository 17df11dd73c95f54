#![cfg(not(target_arch = "wasm32"))]
#![allow(dead_code)]

use futures::executor::block_on;
use keystone_dom::{
	memory::{MemoryDom, NodeId},
	update, Child, Declaration, Options,
};

pub fn init_logging() {
	drop(tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init());
}

/// A fresh document with an empty `<body>` to render into.
pub fn setup() -> (MemoryDom, NodeId) {
	init_logging();
	let mut dom = MemoryDom::new();
	let root = dom.new_root("body");
	(dom, root)
}

pub fn render(dom: &mut MemoryDom, root: NodeId, next: impl Into<Child<NodeId>>) {
	block_on(update(dom, &root, next, &Options::new())).unwrap();
}

pub fn list(items: impl IntoIterator<Item = Child<NodeId>>) -> Declaration<NodeId> {
	Declaration::fragment(items)
}

pub fn li(key: &str, text: &str) -> Child<NodeId> {
	Declaration::element("li").key(key).child(text).into()
}
