//! Filter selection over the standard sixteen-partition table.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use metacat_catalog::{
    CatalogCapabilities, CatalogConfig, GetPartitionsRequest, SortBy, SortOrder,
};
use metacat_core::QualifiedName;
use metacat_test_utils::{
    PartitionFixtures, TestContext, assert_bad_request, assert_same_names, init_test_logging,
};

async fn select(ctx: &TestContext, table: &QualifiedName, filter: &str) -> Vec<String> {
    ctx.service
        .get_partition_keys(table, &GetPartitionsRequest::filtered(filter))
        .await
        .unwrap_or_else(|e| panic!("filter {filter:?} failed: {e}"))
}

async fn count(ctx: &TestContext, table: &QualifiedName, filter: &str) -> usize {
    select(ctx, table, filter).await.len()
}

fn names_where(keep: fn(u32) -> bool) -> Vec<String> {
    (0..16)
        .filter(|&n| keep(n))
        .map(PartitionFixtures::name)
        .collect()
}

#[tokio::test]
async fn filters_select_expected_partitions() {
    init_test_logging();
    let ctx = TestContext::new();
    let table = ctx.sixteen_partition_table().await;

    let cases: [(&str, fn(u32) -> bool); 12] = [
        (r#"pk1 = "even""#, |n| n % 2 == 0),
        ("pk3 = 1", |n| n % 2 == 1),
        (r#"pk1 = "even" and pk3 = 0"#, |n| n % 2 == 0),
        (r#"pk1 = "even" and pk3 = 1"#, |_| false),
        (r#"pk1 = "even" and pk1 = "odd""#, |_| false),
        ("pk2 between 5 and 8", |n| (5..=8).contains(&n)),
        ("pk2 > 10 or pk2 < 2", |n| n > 10 || n < 2),
        ("5 < pk2", |n| n > 5),
        ("pk2 <> 3", |n| n != 3),
        (r#"(pk1 = "odd" or pk2 = 0) and pk2 <= 3"#, |n| {
            n <= 3 && (n % 2 == 1 || n == 0)
        }),
        ("", |_| true),
        ("   ", |_| true),
    ];
    for (filter, keep) in cases {
        let selected = select(&ctx, &table, filter).await;
        assert_same_names(&selected, &names_where(keep));
    }
}

#[tokio::test]
async fn bare_words_are_rejected_by_default() {
    let ctx = TestContext::new();
    let table = ctx.sixteen_partition_table().await;

    let result = ctx
        .service
        .get_partition_keys(&table, &GetPartitionsRequest::filtered("pk1 = even"))
        .await;
    assert_bad_request(&result);
}

#[tokio::test]
async fn bare_words_match_when_allowed() {
    let ctx = TestContext::with_config(CatalogConfig::new("ignored").allow_bare_words());
    let table = ctx.sixteen_partition_table().await;

    assert_eq!(count(&ctx, &table, "pk1 = even").await, 8);
}

#[tokio::test]
async fn unknown_keys_and_syntax_errors_are_bad_requests() {
    let ctx = TestContext::new();
    let table = ctx.sixteen_partition_table().await;

    for filter in ["pk9 = 1", "pk2 = ", "pk2 between 1", "(pk2 = 1", "pk2 in (1, 2)"] {
        let result = ctx
            .service
            .get_partitions(&table, &GetPartitionsRequest::filtered(filter))
            .await;
        assert_bad_request(&result);
    }
}

#[tokio::test]
async fn pathologically_nested_filters_are_bad_requests() {
    let ctx = TestContext::new();
    let table = ctx.sixteen_partition_table().await;

    let nested = format!("{}pk2 = 1{}", "(".repeat(10_000), ")".repeat(10_000));
    let chained = vec!["pk2 = 1"; 10_000].join(" or ");
    for filter in [nested, chained] {
        let result = ctx
            .service
            .get_partition_keys(&table, &GetPartitionsRequest::filtered(filter))
            .await;
        assert_bad_request(&result);
    }

    let grouped = format!("{}pk2 = 1{}", "(".repeat(64), ")".repeat(64));
    assert_same_names(&select(&ctx, &table, &grouped).await, &[PartitionFixtures::name(1)]);
}

#[tokio::test]
async fn quoted_numbers_follow_typing_policy() {
    let lenient = TestContext::new();
    let table = lenient.sixteen_partition_table().await;
    assert_eq!(count(&lenient, &table, r#"pk2 >= "5""#).await, 11);

    let strict = TestContext::with_capabilities(CatalogCapabilities {
        strict_filter_typing: true,
        ..CatalogCapabilities::default()
    });
    let table = strict.sixteen_partition_table().await;
    let result = strict
        .service
        .get_partition_keys(&table, &GetPartitionsRequest::filtered(r#"pk2 >= "5""#))
        .await;
    assert_bad_request(&result);
}

#[tokio::test]
async fn deserialized_config_applies_strict_typing() {
    let config: CatalogConfig = serde_json::from_value(serde_json::json!({
        "name": "hive",
        "capabilities": {"strict_filter_typing": true},
    }))
    .unwrap();
    let ctx = TestContext::with_config(config);
    let table = ctx.sixteen_partition_table().await;

    let result = ctx
        .service
        .get_partition_keys(&table, &GetPartitionsRequest::filtered(r#"pk2 = "6""#))
        .await;
    assert_bad_request(&result);
    assert_same_names(&select(&ctx, &table, "pk2 = 6").await, &[PartitionFixtures::name(6)]);
}

#[tokio::test]
async fn pushdown_and_in_process_agree() {
    let in_process = TestContext::new();
    let pushdown = TestContext::with_capabilities(CatalogCapabilities::full());
    let local_table = in_process.sixteen_partition_table().await;
    let pushed_table = pushdown.sixteen_partition_table().await;

    for filter in [r#"pk1 = "odd""#, "pk2 between 3 and 12 and pk3 = 0", "pk2 > 100"] {
        let request = GetPartitionsRequest::filtered(filter);
        let local = in_process
            .service
            .get_partition_keys(&local_table, &request)
            .await
            .unwrap();
        let pushed = pushdown
            .service
            .get_partition_keys(&pushed_table, &request)
            .await
            .unwrap();
        assert_eq!(local, pushed, "filter {filter:?}");
    }

    assert_eq!(in_process.store.filtered_list_count(), 0);
    assert_eq!(pushdown.store.filtered_list_count(), 3);
}

#[tokio::test]
async fn explicit_names_are_filtered_in_process() {
    let ctx = TestContext::with_capabilities(CatalogCapabilities::full());
    let table = ctx.sixteen_partition_table().await;

    let request = GetPartitionsRequest::filtered("pk3 = 1").with_names([
        PartitionFixtures::name(1),
        PartitionFixtures::name(2),
        "pk1=odd/pk2=99/pk3=1".to_string(),
    ]);
    let names = ctx
        .service
        .get_partition_keys(&table, &request)
        .await
        .unwrap();

    assert_same_names(&names, &[PartitionFixtures::name(1)]);
    assert_eq!(ctx.store.filtered_list_count(), 0);
}

#[tokio::test]
async fn sorts_by_typed_key_and_pages() {
    let ctx = TestContext::new();
    let table = ctx.sixteen_partition_table().await;

    let ascending = ctx
        .service
        .get_partition_keys(
            &table,
            &GetPartitionsRequest::all()
                .sorted_by(SortBy::Key("pk2".into()), SortOrder::Ascending)
                .with_page(2, Some(3)),
        )
        .await
        .unwrap();
    let expected: Vec<String> = (2..5).map(PartitionFixtures::name).collect();
    assert_eq!(ascending, expected);

    let descending = ctx
        .service
        .get_partition_keys(
            &table,
            &GetPartitionsRequest::filtered(r#"pk1 = "odd""#)
                .sorted_by(SortBy::Key("PK2".into()), SortOrder::Descending)
                .with_page(0, Some(2)),
        )
        .await
        .unwrap();
    assert_eq!(
        descending,
        vec![PartitionFixtures::name(15), PartitionFixtures::name(13)]
    );

    let past_end = ctx
        .service
        .get_partition_keys(&table, &GetPartitionsRequest::all().with_page(40, None))
        .await
        .unwrap();
    assert!(past_end.is_empty());
}
