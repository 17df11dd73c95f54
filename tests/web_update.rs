#![cfg(target_arch = "wasm32")]

use keystone_dom::{declaration::Namespace, update, Child, Declaration, Dom, Options};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

use web_setup_::{setup, teardown};

fn li(key: &str, text: &str) -> Child<web_sys::Node> {
	Declaration::element("li").key(key).child(text).into()
}

#[wasm_bindgen_test]
async fn keyed_reorder() {
	let (mut dom, container) = setup().await;
	let options = Options::new();

	update(&mut dom, &container, Declaration::fragment([li("1", "A"), li("2", "B"), li("3", "C")]), &options).await.unwrap();
	let old = dom.children(&container);

	update(&mut dom, &container, Declaration::fragment([li("2", "B2"), li("1", "A2")]), &options).await.unwrap();
	let new = dom.children(&container);

	assert_eq!(new, vec![old[1].clone(), old[0].clone()]);
	assert_eq!(container.text_content().as_deref(), Some("B2A2"));
	assert!(old[2].parent_node().is_none());

	teardown(&mut dom, &container);
}

#[wasm_bindgen_test]
async fn style_properties_and_dataset() {
	let (mut dom, container) = setup().await;
	let options = Options::new();

	update(&mut dom, &container, Declaration::element("input").style_text("color: red; margin: 1px").prop("value", "typed").data("userId", "7"), &options)
		.await
		.unwrap();
	let input = dom.children(&container)[0].clone();
	let element: &web_sys::Element = input.unchecked_ref();
	assert_eq!(element.get_attribute("data-user-id").as_deref(), Some("7"));
	assert_eq!(js_sys::Reflect::get(&input, &JsValue::from_str("value")).unwrap(), JsValue::from_str("typed"));

	update(&mut dom, &container, Declaration::element("input").style("color", "blue"), &options).await.unwrap();
	let style = input.unchecked_ref::<web_sys::HtmlElement>().style();
	assert_eq!(style.get_property_value("color").unwrap(), "blue");
	assert_eq!(style.get_property_value("margin").unwrap(), "1px");
	assert_eq!(element.get_attribute("data-user-id"), None);
	assert_eq!(js_sys::Reflect::get(&input, &JsValue::from_str("value")).unwrap(), JsValue::from_str(""));

	teardown(&mut dom, &container);
}

#[wasm_bindgen_test]
async fn svg_namespace() {
	let (mut dom, container) = setup().await;

	update(
		&mut dom,
		&container,
		Declaration::element("svg").namespace(Namespace::Svg).child(Declaration::element("circle").namespace(Namespace::Svg).attr("r", 4)),
		&Options::new(),
	)
	.await
	.unwrap();

	let svg: web_sys::Element = dom.children(&container)[0].clone().dyn_into().unwrap();
	assert_eq!(svg.namespace_uri().as_deref(), Namespace::Svg.uri());
	assert_eq!(svg.inner_html(), r#"<circle r="4"></circle>"#);

	teardown(&mut dom, &container);
}

#[wasm_bindgen_test]
async fn chunked_append_waits_for_frames() {
	let (mut dom, container) = setup().await;
	let options = Options::new().append_chunk_size(2);

	let items = (0..5_i32).map(|i| Child::from(Declaration::element("i").child(i)));
	update(&mut dom, &container, Declaration::fragment(items), &options).await.unwrap();
	assert_eq!(container.text_content().as_deref(), Some("01234"));

	teardown(&mut dom, &container);
}

#[wasm_bindgen_test]
async fn adopts_server_markup() {
	let (mut dom, container) = setup().await;
	container.unchecked_ref::<web_sys::Element>().set_inner_html(r#"<li key="k">server</li>"#);
	let existing = dom.children(&container)[0].clone();

	update(&mut dom, &container, Declaration::fragment([li("k", "client")]), &Options::new()).await.unwrap();

	assert_eq!(dom.children(&container), vec![existing]);
	assert_eq!(container.text_content().as_deref(), Some("client"));

	teardown(&mut dom, &container);
}
