use docsim::collection::UpdateOptions;
use docsim::common::Value;
use docsim::doc;
use docsim::filter::field;
use docsim_int_test::test_util::{cleanup, create_test_context, run_test};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_multi_threaded_insert() {
    run_test(
        create_test_context,
        |ctx| {
            let num_threads = 8;
            let inserts_per_thread = 50;
            let barrier = Arc::new(Barrier::new(num_threads));

            let mut handles = vec![];
            for thread_id in 0..num_threads {
                let collection = ctx.collection();
                let barrier = Arc::clone(&barrier);
                handles.push(thread::spawn(move || {
                    barrier.wait();
                    for i in 0..inserts_per_thread {
                        let document = doc! {
                            thread_id: thread_id,
                            sequence: i,
                            value: (format!("thread_{}_seq_{}", thread_id, i))
                        };
                        if let Err(e) = collection.insert_one(document) {
                            panic!("insert failed: {:?}", e);
                        }
                    }
                }));
            }
            for handle in handles {
                assert!(handle.join().is_ok());
            }

            let collection = ctx.collection();
            assert_eq!(
                collection.estimated_document_count()?,
                (num_threads * inserts_per_thread) as u64
            );

            let ids: HashSet<Value> = collection
                .find(&doc! {})?
                .filter_map(|document| document.id().cloned())
                .collect();
            assert_eq!(ids.len(), num_threads * inserts_per_thread);

            // each thread's documents keep their relative order
            let sequences: Vec<Value> = collection
                .find_matching(&field("thread_id").eq(3usize))?
                .filter_map(|document| document.get("sequence").cloned())
                .collect();
            let expected: Vec<Value> = (0..inserts_per_thread).map(Value::from).collect();
            assert_eq!(sequences, expected);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_duplicate_ids() {
    run_test(
        create_test_context,
        |ctx| {
            let num_threads = 6;
            let barrier = Arc::new(Barrier::new(num_threads));

            let mut handles = vec![];
            for thread_id in 0..num_threads {
                let collection = ctx.collection();
                let barrier = Arc::clone(&barrier);
                handles.push(thread::spawn(move || {
                    barrier.wait();
                    collection
                        .insert_one(doc! { _id: "shared", owner: thread_id })
                        .is_ok()
                }));
            }

            let mut winners = 0;
            for handle in handles {
                if let Ok(true) = handle.join() {
                    winners += 1;
                }
            }
            assert_eq!(winners, 1);
            assert_eq!(ctx.collection().estimated_document_count()?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_increments() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.collection().insert_one(doc! { _id: "counter", hits: 0 })?;

            let num_threads = 4;
            let increments_per_thread = 100;
            let barrier = Arc::new(Barrier::new(num_threads));

            let mut handles = vec![];
            for _ in 0..num_threads {
                let collection = ctx.collection();
                let barrier = Arc::clone(&barrier);
                handles.push(thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..increments_per_thread {
                        let result = collection.update_one(
                            &doc! { _id: "counter" },
                            &doc! { "$inc": { hits: 1 } },
                            &UpdateOptions::default(),
                        );
                        if let Err(e) = result {
                            panic!("update failed: {:?}", e);
                        }
                    }
                }));
            }
            for handle in handles {
                assert!(handle.join().is_ok());
            }

            let counter = ctx.collection().find_one(&doc! { _id: "counter" })?;
            assert_eq!(
                counter.and_then(|document| document.get("hits").cloned()),
                Some(Value::from(num_threads * increments_per_thread))
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_readers_alongside_writers() {
    run_test(
        create_test_context,
        |ctx| {
            let num_writers = 3;
            let num_readers = 3;
            let barrier = Arc::new(Barrier::new(num_writers + num_readers));

            let mut handles = vec![];
            for writer in 0..num_writers {
                let collection = ctx.collection();
                let barrier = Arc::clone(&barrier);
                handles.push(thread::spawn(move || {
                    barrier.wait();
                    for i in 0..20 {
                        let inserted = collection.insert_one(doc! { writer: writer, i: i });
                        assert!(inserted.is_ok());
                        if i % 5 == 0 {
                            let deleted = collection.delete_one(&doc! { writer: writer });
                            assert!(deleted.is_ok());
                        }
                    }
                }));
            }
            for _ in 0..num_readers {
                let collection = ctx.collection();
                let barrier = Arc::clone(&barrier);
                handles.push(thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..20 {
                        // every snapshot is internally consistent
                        let cursor = collection.find(&doc! {});
                        assert!(cursor.is_ok());
                        if let Ok(cursor) = cursor {
                            let ids: HashSet<Value> =
                                cursor.filter_map(|document| document.id().cloned()).collect();
                            assert!(ids.len() <= num_writers * 20);
                        }
                    }
                }));
            }
            for handle in handles {
                assert!(handle.join().is_ok());
            }

            // 20 inserts and 4 deletes per writer
            assert_eq!(
                ctx.collection().estimated_document_count()?,
                (num_writers * 16) as u64
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_shared_store_across_threads() {
    run_test(
        create_test_context,
        |ctx| {
            let num_threads = 4;
            let mut handles = vec![];
            for thread_id in 0..num_threads {
                let store = ctx.store();
                handles.push(thread::spawn(move || {
                    let name = format!("coll_{}", thread_id);
                    let result = store
                        .database("test")
                        .and_then(|database| database.collection(&name))
                        .and_then(|collection| collection.insert_one(doc! { n: thread_id }));
                    assert!(result.is_ok());
                }));
            }
            for handle in handles {
                assert!(handle.join().is_ok());
            }

            let names = ctx.database().list_collection_names()?;
            assert_eq!(names, vec!["coll_0", "coll_1", "coll_2", "coll_3", "people"]);
            Ok(())
        },
        cleanup,
    )
}
