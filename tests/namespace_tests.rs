//! Integration tests for namespace resolution while parsing

mod common;

use common::{fixture, init_tracing};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use xmlmapper::{
    AttributeSpec, ContentSpec, ElementSpec, Instance, ParseOptions, Parsed, ScalarType, Schema,
    Value,
};

fn text<'a>(instance: &'a Instance, name: &str) -> Option<&'a str> {
    instance.get(name).and_then(Value::as_str)
}

fn strings(instance: &Instance, name: &str) -> Vec<String> {
    instance
        .get(name)
        .and_then(Value::as_list)
        .map(|items| items.iter().map(Value::to_text).collect())
        .unwrap_or_default()
}

#[test]
fn test_mixed_namespaces() {
    init_tracing();
    let mut schema = Schema::new("Address");
    schema.namespace("prefix");
    schema
        .has_many(
            ElementSpec::new("streets", ScalarType::String)
                .with_tag("street")
                .without_namespace(),
        )
        .unwrap()
        .has_one(
            ElementSpec::new("house_number", ScalarType::String)
                .with_tag("housenumber")
                .without_namespace(),
        )
        .unwrap()
        .has_one(ElementSpec::new("postcode", ScalarType::String).with_namespace("different"))
        .unwrap()
        .has_one(ElementSpec::new("city", ScalarType::String).without_namespace())
        .unwrap();

    let parsed = schema
        .build()
        .parse_with(&fixture("mixed_namespaces.xml"), &ParseOptions::new().single())
        .unwrap();
    let address = parsed.one().unwrap();

    assert_eq!(strings(address, "streets"), vec!["Milchstrasse", "Another Street"]);
    assert_eq!(text(address, "house_number"), Some("23"));
    assert_eq!(text(address, "postcode"), Some("26131"));
    assert_eq!(text(address, "city"), Some("Oldenburg"));
}

#[test]
fn test_registered_default_namespace_on_root() {
    let mut schema = Schema::new("RootCollision");
    schema
        .register_namespace("xmlns", "http://www.unicornland.com/prefix")
        .tag("address")
        .unwrap()
        .has_many(ElementSpec::new("streets", ScalarType::String).with_tag("street"))
        .unwrap();

    let parsed = schema.build().parse(&fixture("root_collision.xml")).unwrap();
    let address = parsed.one().expect("the root element is always a single result");
    assert_eq!(strings(address, "streets"), vec!["Milchstrasse", "Another Street"]);
}

fn product() -> Arc<Schema> {
    let mut schema = Schema::new("Product");
    schema
        .attribute(AttributeSpec::new("sku", ScalarType::String))
        .unwrap()
        .attribute(AttributeSpec::new("in_stock", ScalarType::Boolean).with_tag("in-stock"))
        .unwrap()
        .element(ElementSpec::new("title", ScalarType::String))
        .unwrap()
        .element(ElementSpec::new("price", ScalarType::Decimal))
        .unwrap()
        .element(ElementSpec::new("released", ScalarType::Date))
        .unwrap()
        .has_many(ElementSpec::new("tags", ScalarType::String).with_tag("tag"))
        .unwrap();
    schema.build()
}

#[test]
fn test_default_namespace_is_ambient() {
    let products = product().parse(&fixture("product_default_namespace.xml")).unwrap();
    let products = products.many();
    assert_eq!(products.len(), 2);

    let widget = &products[0];
    assert_eq!(text(widget, "sku"), Some("A-1"));
    assert_eq!(widget.get("in_stock"), Some(&Value::Boolean(true)));
    assert_eq!(text(widget, "title"), Some("Widget"));
    assert_eq!(widget.get("price").map(Value::to_text).as_deref(), Some("9.95"));
    assert_eq!(widget.get("released").map(Value::to_text).as_deref(), Some("2020-03-14"));
    assert_eq!(strings(widget, "tags"), vec!["tools", "metal"]);

    let gadget = &products[1];
    assert_eq!(gadget.get("in_stock"), Some(&Value::Boolean(false)));
    assert!(strings(gadget, "tags").is_empty());
}

#[test]
fn test_namespace_option_overrides_schema() {
    let mut schema = Schema::new("Item");
    schema.content(ContentSpec::new("label", ScalarType::String));
    let schema = schema.build();
    let xml = r#"<root xmlns:x="urn:x"><x:item>qualified</x:item><item>plain</item></root>"#;

    let plain = schema.parse(xml).unwrap();
    let labels: Vec<_> = plain.many().iter().filter_map(|i| text(i, "label")).collect();
    assert_eq!(labels, vec!["plain"]);

    let qualified = schema
        .parse_with(xml, &ParseOptions::new().with_namespace("x"))
        .unwrap();
    let labels: Vec<_> = qualified.many().iter().filter_map(|i| text(i, "label")).collect();
    assert_eq!(labels, vec!["qualified"]);
}

#[test]
fn test_unbound_prefix_matches_nothing() {
    let mut schema = Schema::new("Item");
    schema.namespace("nowhere");
    let parsed = schema.build().parse("<root><item/></root>").unwrap();
    assert_eq!(parsed, Parsed::Many(Vec::new()));
}

#[test]
fn test_prefixes_bind_by_uri() {
    let mut schema = Schema::new("Feed");
    schema
        .register_namespace("a", "http://www.w3.org/2005/Atom")
        .element(ElementSpec::new("title", ScalarType::String).with_namespace("a"))
        .unwrap();
    let xml = r#"<feed xmlns:atom="http://www.w3.org/2005/Atom"><atom:title>Bound by URI</atom:title></feed>"#;

    let parsed = schema.build().parse(xml).unwrap();
    assert_eq!(parsed.one().and_then(|feed| text(feed, "title")), Some("Bound by URI"));
}

#[test]
fn test_nested_schema_namespaces() {
    let mut city = Schema::new("City");
    city.register_namespace("c", "urn:city").namespace("c");
    city.element(ElementSpec::new("name", ScalarType::String)).unwrap();
    let city = city.build();

    let mut address = Schema::new("Address");
    address.register_namespace("a", "urn:address").namespace("a");
    address
        .element(ElementSpec::new("street", ScalarType::String))
        .unwrap()
        .has_one(ElementSpec::new("city", city))
        .unwrap();

    let xml = r#"<a:address xmlns:a="urn:address" xmlns:c="urn:city">
        <a:street>Unter den Linden</a:street>
        <c:city><c:name>Berlin</c:name></c:city>
    </a:address>"#;

    let parsed = address.build().parse(xml).unwrap();
    let address = parsed.one().unwrap();
    assert_eq!(text(address, "street"), Some("Unter den Linden"));
    let city = address.get("city").and_then(Value::as_object).unwrap();
    assert_eq!(text(city, "name"), Some("Berlin"));
}

#[test]
fn test_element_namespace_overrides_nested_schema() {
    let mut note = Schema::new("Note");
    note.namespace("n");
    note.content(ContentSpec::new("body", ScalarType::String));
    let note = note.build();

    let mut page = Schema::new("Page");
    page.has_one(ElementSpec::new("note", note).with_namespace("m")).unwrap();
    let xml = r#"<page xmlns:n="urn:n" xmlns:m="urn:m"><n:note>wrong</n:note><m:note>right</m:note></page>"#;

    let parsed = page.build().parse(xml).unwrap();
    let note = parsed
        .one()
        .and_then(|page| page.get("note"))
        .and_then(Value::as_object)
        .unwrap();
    assert_eq!(text(note, "body"), Some("right"));
}

#[test]
fn test_attributes_ignore_ambient_namespace() {
    let mut schema = Schema::new("Image");
    schema.namespace("svg");
    schema
        .attribute(AttributeSpec::new("width", ScalarType::Integer))
        .unwrap()
        .attribute(AttributeSpec::new("href", ScalarType::String).with_namespace("xlink"))
        .unwrap();
    let xml = r#"<svg:image xmlns:svg="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="40" xlink:href="pic.png"/>"#;

    let parsed = schema.build().parse(xml).unwrap();
    let image = parsed.one().unwrap();
    assert_eq!(image.get("width").and_then(Value::as_i64), Some(40));
    assert_eq!(text(image, "href"), Some("pic.png"));
}
