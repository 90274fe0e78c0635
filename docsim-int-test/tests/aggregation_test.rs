use docsim::common::Value;
use docsim::errors::ErrorKind;
use docsim::{doc, val};
use docsim_int_test::test_util::{cleanup, create_seeded_context, create_test_context, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn stages(stages: Vec<docsim::collection::Document>) -> Vec<Value> {
    stages.into_iter().map(Value::Document).collect()
}

#[test]
fn test_match_sort_project() {
    run_test(
        create_seeded_context,
        |ctx| {
            let pipeline = stages(vec![
                doc! { "$match": { status: "active" } },
                doc! { "$sort": { age: (-1) } },
                doc! { "$project": { _id: 0, name: 1 } },
            ]);
            let results = ctx.collection().aggregate(&pipeline)?.to_list()?;
            assert_eq!(results, vec![doc! { name: "Charlie" }, doc! { name: "Alice" }]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_empty_pipeline_returns_everything() {
    run_test(
        create_seeded_context,
        |ctx| {
            let results = ctx.collection().aggregate(&[])?.to_list()?;
            assert_eq!(results.len(), 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_group_accumulators() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            collection.insert_many(vec![
                doc! { item: "pen", qty: 2, price: 1.5 },
                doc! { item: "ink", qty: 10, price: 4 },
                doc! { item: "pen", qty: 8, price: 2.5 },
                doc! { item: "pad" },
            ])?;

            let pipeline = stages(vec![doc! {
                "$group": {
                    _id: "$item",
                    total: { "$sum": "$qty" },
                    average: { "$avg": "$price" },
                    cheapest: { "$min": "$price" },
                    dearest: { "$max": "$price" },
                    entries: { "$count": {} },
                    quantities: { "$push": "$qty" }
                }
            }]);
            let groups = collection.aggregate(&pipeline)?.to_list()?;
            assert_eq!(groups.len(), 3);

            // groups come out in first-seen order
            assert_eq!(groups[0].get("_id"), Some(&val!("pen")));
            assert_eq!(groups[0].get("total"), Some(&val!(10)));
            assert_eq!(groups[0].get("average"), Some(&Value::Float64(2.0)));
            assert_eq!(groups[0].get("cheapest"), Some(&Value::Float64(1.5)));
            assert_eq!(groups[0].get("dearest"), Some(&Value::Float64(2.5)));
            assert_eq!(groups[0].get("entries"), Some(&val!(2)));
            assert_eq!(
                groups[0].get("quantities"),
                Some(&Value::Array(vec![val!(2), val!(8)]))
            );

            assert_eq!(groups[2].get("_id"), Some(&val!("pad")));
            assert_eq!(groups[2].get("total"), Some(&val!(0)));
            assert_eq!(groups[2].get("average"), Some(&Value::Null));
            assert_eq!(groups[2].get("cheapest"), Some(&Value::Null));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_group_by_null_collapses_everything() {
    run_test(
        create_seeded_context,
        |ctx| {
            let pipeline = stages(vec![doc! {
                "$group": { _id: (Value::Null), ages: { "$sum": "$age" } }
            }]);
            let groups = ctx.collection().aggregate(&pipeline)?.to_list()?;
            assert_eq!(groups, vec![doc! { _id: (Value::Null), ages: 90 }]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_first_and_last_follow_sort() {
    run_test(
        create_seeded_context,
        |ctx| {
            let pipeline = stages(vec![
                doc! { "$sort": { age: (-1) } },
                doc! {
                    "$group": {
                        _id: "$status",
                        oldest: { "$first": "$name" },
                        youngest: { "$last": "$name" }
                    }
                },
            ]);
            let groups = ctx.collection().aggregate(&pipeline)?.to_list()?;
            assert_eq!(
                groups,
                vec![
                    doc! { _id: "active", oldest: "Charlie", youngest: "Alice" },
                    doc! { _id: "inactive", oldest: "Bob", youngest: "Bob" },
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unwind_then_group() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            collection.insert_many(vec![
                doc! { _id: 1, tags: ["a", "b"] },
                doc! { _id: 2, tags: ["b"] },
                doc! { _id: 3, tags: [] },
                doc! { _id: 4 },
            ])?;

            let pipeline = stages(vec![doc! { "$unwind": "$tags" }]);
            let unwound = collection.aggregate(&pipeline)?.to_list()?;
            assert_eq!(
                unwound,
                vec![
                    doc! { _id: 1, tags: "a" },
                    doc! { _id: 1, tags: "b" },
                    doc! { _id: 2, tags: "b" },
                ]
            );

            let pipeline = stages(vec![doc! {
                "$unwind": { path: "$tags", preserveNullAndEmptyArrays: true }
            }]);
            assert_eq!(collection.aggregate(&pipeline)?.to_list()?.len(), 5);

            let pipeline = stages(vec![
                doc! { "$unwind": "$tags" },
                doc! { "$sortByCount": "$tags" },
            ]);
            let counts = collection.aggregate(&pipeline)?.to_list()?;
            assert_eq!(
                counts,
                vec![doc! { _id: "b", count: 2 }, doc! { _id: "a", count: 1 }]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_lookup_joins_sibling_collection() {
    run_test(
        create_test_context,
        |ctx| {
            let orders = ctx.database().collection("orders")?;
            let items = ctx.database().collection("items")?;
            items.insert_many(vec![
                doc! { _id: "pen", price: 2 },
                doc! { _id: "ink", price: 7 },
            ])?;
            orders.insert_many(vec![
                doc! { _id: 1, item: "pen" },
                doc! { _id: 2, item: "paper" },
            ])?;

            let pipeline = stages(vec![doc! {
                "$lookup": { from: "items", localField: "item", foreignField: "_id", as: "detail" }
            }]);
            let joined = orders.aggregate(&pipeline)?.to_list()?;
            assert_eq!(
                joined,
                vec![
                    doc! { _id: 1, item: "pen", detail: [{ _id: "pen", price: 2 }] },
                    doc! { _id: 2, item: "paper", detail: [] },
                ]
            );

            let pipeline = stages(vec![doc! {
                "$lookup": { from: "missing", localField: "item", foreignField: "_id", as: "detail" }
            }]);
            let joined = orders.aggregate(&pipeline)?.to_list()?;
            assert!(joined
                .iter()
                .all(|d| d.get("detail") == Some(&Value::Array(vec![]))));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_count_skip_limit_stages() {
    run_test(
        create_seeded_context,
        |ctx| {
            let collection = ctx.collection();
            let pipeline = stages(vec![
                doc! { "$match": { age: { "$gt": 20 } } },
                doc! { "$count": "adults" },
            ]);
            assert_eq!(collection.aggregate(&pipeline)?.to_list()?, vec![doc! { adults: 3 }]);

            let pipeline = stages(vec![
                doc! { "$match": { age: { "$gt": 100 } } },
                doc! { "$count": "ancient" },
            ]);
            assert!(collection.aggregate(&pipeline)?.to_list()?.is_empty());

            let pipeline = stages(vec![
                doc! { "$sort": { age: 1 } },
                doc! { "$skip": 1 },
                doc! { "$limit": 1 },
                doc! { "$addFields": { next: { "$add": ["$age", 1] } } },
                doc! { "$project": { _id: 0, name: 1, next: 1 } },
            ]);
            assert_eq!(
                collection.aggregate(&pipeline)?.to_list()?,
                vec![doc! { name: "Bob", next: 31 }]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_stages() {
    run_test(
        create_seeded_context,
        |ctx| {
            let collection = ctx.collection();
            let cases = vec![
                (doc! { "$bogus": {} }, ErrorKind::UnknownOperator),
                (doc! { "$limit": 0 }, ErrorKind::InvalidArgument),
                (doc! { "$skip": (-1) }, ErrorKind::InvalidArgument),
                (doc! { "$count": "" }, ErrorKind::ValidationError),
                (doc! { "$group": { total: { "$sum": 1 } } }, ErrorKind::ValidationError),
                (doc! { "$group": { _id: 1, n: { "$median": 1 } } }, ErrorKind::UnknownOperator),
                (doc! { "$match": { a: 1 }, "$limit": 1 }, ErrorKind::ValidationError),
            ];
            for (stage, kind) in cases {
                let err = collection
                    .aggregate(&[Value::Document(stage.clone())])
                    .map(|_| ())
                    .unwrap_err();
                assert_eq!(err.kind(), &kind, "stage {}", stage);
            }

            // a failing pipeline leaves the collection untouched
            assert_eq!(collection.estimated_document_count()?, 3);
            Ok(())
        },
        cleanup,
    )
}
