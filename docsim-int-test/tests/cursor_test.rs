use docsim::collection::{Document, FindOptions};
use docsim::common::stream::CursorState;
use docsim::common::{SortOrder, SortSpec, Value};
use docsim::docsim::Docsim;
use docsim::errors::ErrorKind;
use docsim::{doc, val};
use docsim_int_test::test_util::{
    cleanup, create_seeded_context, create_test_context, names, run_test, TestContext,
};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn seed_numbers(ctx: &TestContext) -> docsim::errors::DocsimResult<()> {
    let documents: Vec<Document> = (0..40)
        .map(|i| doc! { _id: i, bucket: (i % 4), score: ((i * 7) % 11), label: (format!("n{}", i)) })
        .collect();
    ctx.collection().insert_many(documents)?;
    Ok(())
}

#[test]
fn test_sort_skip_limit_matches_sorted_slice() {
    run_test(
        create_test_context,
        |ctx| {
            seed_numbers(&ctx)?;
            let collection = ctx.collection();
            let filter = doc! { bucket: { "$in": [1, 2] } };
            let sort = doc! { score: (-1), _id: 1 };

            let mut expected = collection.find(&filter)?.to_list()?;
            let spec = SortSpec::parse(&sort)?;
            expected.sort_by(|a, b| spec.compare(a, b));

            for (skip, limit) in [(0usize, 5usize), (3, 4), (15, 10), (25, 3)] {
                let mut cursor = collection.find(&filter)?;
                cursor
                    .sort(&sort)?
                    .offset(skip as i64)?
                    .limit(limit as i64)?;
                let actual = cursor.to_list()?;
                let end = (skip + limit).min(expected.len());
                let slice = if skip < expected.len() {
                    expected[skip..end].to_vec()
                } else {
                    vec![]
                };
                assert_eq!(actual, slice, "skip {} limit {}", skip, limit);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_is_stable() {
    run_test(
        create_test_context,
        |ctx| {
            seed_numbers(&ctx)?;
            let mut cursor = ctx.collection().find(&doc! {})?;
            cursor.sort(&doc! { bucket: 1 })?;
            let sorted = cursor.to_list()?;

            let first_bucket: Vec<Value> = sorted
                .iter()
                .take(10)
                .filter_map(|d| d.id().cloned())
                .collect();
            let expected: Vec<Value> = (0..40).filter(|i| i % 4 == 0).map(|i| val!(i)).collect();
            assert_eq!(first_bucket, expected);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_across_types() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection();
            collection.insert_many(vec![
                doc! { _id: 1, v: "text" },
                doc! { _id: 2, v: 10 },
                doc! { _id: 3 },
                doc! { _id: 4, v: true },
                doc! { _id: 5, v: { a: 1 } },
                doc! { _id: 6, v: 2.5 },
            ])?;
            let mut cursor = collection.find(&doc! {})?;
            cursor.sort(&doc! { v: 1 })?;
            let ids: Vec<Value> = cursor.map(|d| d.id().cloned().unwrap_or_default()).collect();
            assert_eq!(ids, vec![val!(3), val!(6), val!(2), val!(1), val!(5), val!(4)]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_modifiers_rejected_after_iteration() {
    run_test(
        create_seeded_context,
        |ctx| {
            let mut cursor = ctx.collection().find(&doc! {})?;
            cursor.sort(&doc! { age: (-1) })?.sort(&doc! { age: 1 })?;
            assert_eq!(cursor.try_next()?.and_then(|d| d.get("name").cloned()), Some(val!("Alice")));

            let err = cursor.limit(1).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::CursorInUse);
            let err = cursor.project(&doc! { name: 1 }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::CursorInUse);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_negative_skip_and_limit_fail_immediately() {
    run_test(
        create_seeded_context,
        |ctx| {
            let mut cursor = ctx.collection().find(&doc! {})?;
            assert_eq!(cursor.offset(-1).unwrap_err().kind(), &ErrorKind::InvalidArgument);
            assert_eq!(cursor.limit(-5).unwrap_err().kind(), &ErrorKind::InvalidArgument);
            assert_eq!(cursor.to_list()?.len(), 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rewind_does_not_requery() {
    run_test(
        create_seeded_context,
        |ctx| {
            let collection = ctx.collection();
            let mut cursor = collection.find(&doc! {})?;
            let first_pass = cursor.to_list()?;
            assert_eq!(cursor.state(), CursorState::Exhausted);

            collection.insert_one(doc! { name: "Dave" })?;
            cursor.rewind()?;
            assert_eq!(cursor.state(), CursorState::Open);
            assert_eq!(cursor.to_list()?, first_pass);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_close() {
    run_test(
        create_seeded_context,
        |ctx| {
            let mut cursor = ctx.collection().find(&doc! {})?;
            cursor.try_next()?;
            cursor.close();
            assert_eq!(cursor.state(), CursorState::Closed);
            assert!(!cursor.is_alive());
            assert!(!cursor.has_next());
            assert!(cursor.try_next()?.is_none());
            assert!(cursor.to_list()?.is_empty());
            assert_eq!(cursor.rewind().unwrap_err().kind(), &ErrorKind::InvalidOperation);
            assert_eq!(cursor.offset(1).unwrap_err().kind(), &ErrorKind::CursorInUse);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_clone_has_independent_lifecycle() {
    run_test(
        create_seeded_context,
        |ctx| {
            let mut cursor = ctx.collection().find(&doc! {})?;
            cursor.sort(&doc! { age: (-1) })?.limit(2)?;
            let mut copy = cursor.clone();

            cursor.close();
            assert_eq!(names(&copy.to_list()?), vec!["Charlie", "Bob"]);
            assert_eq!(copy.state(), CursorState::Exhausted);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_batches() {
    run_test(
        || TestContext::new(Docsim::builder().default_batch_size(15).open()?),
        |ctx| {
            seed_numbers(&ctx)?;
            let mut cursor = ctx.collection().find(&doc! {})?;
            assert_eq!(cursor.next_batch()?.len(), 15);
            assert_eq!(cursor.next_batch()?.len(), 15);
            assert_eq!(cursor.next_batch()?.len(), 10);
            assert!(cursor.next_batch()?.is_empty());

            let mut cursor = ctx.collection().find(&doc! {})?;
            assert_eq!(cursor.batch_size(0).unwrap_err().kind(), &ErrorKind::InvalidArgument);
            cursor.batch_size(32)?;
            assert_eq!(cursor.next_batch()?.len(), 32);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_projection_on_cursor() {
    run_test(
        create_seeded_context,
        |ctx| {
            let collection = ctx.collection();
            let mut cursor = collection.find(&doc! { name: "Alice" })?;
            cursor.project(&doc! { _id: 0, name: 1, grown: { "$add": ["$age", 1] } })?;
            assert_eq!(cursor.to_list()?, vec![doc! { name: "Alice", grown: 26 }]);

            let mut cursor = collection.find(&doc! { name: "Alice" })?;
            cursor.project(&doc! { _id: 0, status: 0 })?;
            assert_eq!(cursor.to_list()?, vec![doc! { name: "Alice", age: 25 }]);

            let err = collection
                .find(&doc! {})?
                .project(&doc! { name: 1, age: 0 })
                .map(|_| ())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ProjectionConflict);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_options() {
    run_test(
        create_seeded_context,
        |ctx| {
            let options = FindOptions::new()
                .sort_by("age", SortOrder::Descending)
                .skip(1)
                .limit(0);
            let found = ctx
                .collection()
                .find_with_options(&doc! {}, &options)?
                .to_list()?;
            assert_eq!(names(&found), vec!["Bob", "Alice"]);
            Ok(())
        },
        cleanup,
    )
}
