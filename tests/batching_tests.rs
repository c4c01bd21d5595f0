//! Integration tests for batched parsing of large collections

mod common;

use common::{fixture, init_tracing};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use xmlmapper::{parse_in_groups, AttributeSpec, Error, ParseOptions, ScalarType, Schema, Value};

fn post() -> Arc<Schema> {
    let mut schema = Schema::new("Post");
    schema
        .attribute(AttributeSpec::new("href", ScalarType::String))
        .unwrap()
        .attribute(AttributeSpec::new("hash", ScalarType::String))
        .unwrap()
        .attribute(AttributeSpec::new("description", ScalarType::String))
        .unwrap()
        .attribute(AttributeSpec::new("tag", ScalarType::String))
        .unwrap()
        .attribute(AttributeSpec::new("time", ScalarType::Timestamp))
        .unwrap()
        .attribute(AttributeSpec::new("others", ScalarType::Integer))
        .unwrap()
        .attribute(AttributeSpec::new("extended", ScalarType::String))
        .unwrap();
    schema.build()
}

fn group_sizes(size: usize) -> Vec<usize> {
    let mut sizes = Vec::new();
    let total = post()
        .parse_in_groups(&fixture("posts.xml"), &ParseOptions::new().in_groups_of(size), |group| {
            sizes.push(group.len());
            Ok(())
        })
        .unwrap();
    assert_eq!(total, sizes.iter().sum::<usize>());
    sizes
}

#[test]
fn test_posts_without_groups() {
    init_tracing();
    let posts = post().parse(&fixture("posts.xml")).unwrap();
    assert_eq!(posts.len(), 20);

    let first = &posts.many()[0];
    assert_eq!(first.get("href").and_then(Value::as_str), Some("http://example.com/posts/1"));
    assert_eq!(first.get("others").and_then(Value::as_i64), Some(3));
    assert_eq!(first.get("extended").and_then(Value::as_str), Some(""));
    assert_eq!(
        first.get("time").map(Value::to_text).as_deref(),
        Some("2008-01-01T10:00:00Z")
    );
}

#[test]
fn test_groups_of_six() {
    assert_eq!(group_sizes(6), vec![6, 6, 6, 2]);
}

#[test]
fn test_groups_of_ten() {
    assert_eq!(group_sizes(10), vec![10, 10]);
}

#[test]
fn test_group_larger_than_collection() {
    assert_eq!(group_sizes(50), vec![20]);
}

#[test]
fn test_group_of_zero_is_rejected() {
    let mut delivered = 0;
    let err = post()
        .parse_in_groups(&fixture("posts.xml"), &ParseOptions::new().in_groups_of(0), |group| {
            delivered += group.len();
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, Error::Value(_)));
    assert_eq!(delivered, 0);

    let err = post()
        .parse_with(&fixture("posts.xml"), &ParseOptions::new().in_groups_of(0))
        .unwrap_err();
    assert!(matches!(err, Error::Value(_)));
}

#[test]
fn test_groups_arrive_in_document_order() {
    let mut hrefs = Vec::new();
    post()
        .parse_in_groups(&fixture("posts.xml"), &ParseOptions::new().in_groups_of(7), |group| {
            hrefs.extend(group.iter().filter_map(|p| p.get("href").map(Value::to_text)));
            Ok(())
        })
        .unwrap();
    let expected: Vec<_> = (1..=20).map(|i| format!("http://example.com/posts/{}", i)).collect();
    assert_eq!(hrefs, expected);
}

#[test]
fn test_single_request_is_one_group_of_one() {
    let mut groups = Vec::new();
    let total = parse_in_groups(
        &post(),
        fixture("posts.xml").as_str(),
        &ParseOptions::new().single().in_groups_of(5),
        |group| {
            groups.push(group.len());
            Ok(())
        },
    )
    .unwrap();
    assert_eq!(total, 1);
    assert_eq!(groups, vec![1]);
}

#[test]
fn test_sink_errors_stop_the_run() {
    let mut delivered = 0;
    let err = post()
        .parse_in_groups(&fixture("posts.xml"), &ParseOptions::new().in_groups_of(5), |group| {
            delivered += group.len();
            if delivered >= 10 {
                return Err(Error::Resource("sink is full".to_string()));
            }
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, Error::Resource(_)));
    assert_eq!(delivered, 10);
}

fn posts_document(count: usize) -> String {
    let posts: String = (0..count)
        .map(|i| format!(r#"<post href="http://example.com/{}" others="{}"/>"#, i, i))
        .collect();
    format!("<posts>{}</posts>", posts)
}

proptest! {
    #[test]
    fn prop_groups_partition_the_collection(count in 0usize..60, size in 1usize..25) {
        let xml = posts_document(count);
        let mut sizes = Vec::new();
        let mut seen = Vec::new();
        let total = post()
            .parse_in_groups(&xml, &ParseOptions::new().in_groups_of(size), |group| {
                sizes.push(group.len());
                seen.extend(group.iter().filter_map(|p| p.get("others").and_then(Value::as_i64)));
                Ok(())
            })
            .unwrap();

        prop_assert_eq!(total, count);
        prop_assert_eq!(sizes.len(), count.div_ceil(size));
        if let Some((last, full)) = sizes.split_last() {
            prop_assert!(full.iter().all(|s| *s == size));
            prop_assert!(*last >= 1 && *last <= size);
        }
        prop_assert_eq!(seen, (0..count as i64).collect::<Vec<_>>());
    }
}
