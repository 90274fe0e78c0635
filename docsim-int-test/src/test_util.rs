use docsim::collection::{Collection, Document};
use docsim::common::Value;
use docsim::database::Database;
use docsim::doc;
use docsim::docsim::Docsim;
use docsim::errors::DocsimResult;
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

pub const TEST_DATABASE: &str = "test";
pub const TEST_COLLECTION: &str = "people";

/// Runs `test` between `before` and `after`.
///
/// `after` runs even when the test fails or panics; the failure is reported
/// afterwards with the elapsed time and a backtrace.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> DocsimResult<()>,
    B: Fn() -> DocsimResult<TestContext>,
    A: Fn(TestContext) -> DocsimResult<()>,
{
    let start_time = Instant::now();
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| test(ctx.clone())));
    let after_result = after(ctx);
    let elapsed = start_time.elapsed();

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("Test failed: {:?}", e)),
        Err(panic_err) => {
            let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            Some(format!("Panic: {}", message))
        }
    };

    if let Some(failure) = failure {
        eprintln!("\n==================== TEST FAILED ====================");
        log::error!("{} (took {:?})", failure, elapsed);
        let backtrace = Backtrace::capture().to_string();
        if !backtrace.is_empty() && !backtrace.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", backtrace);
        }
        eprintln!("=====================================================\n");
        panic!("{}", failure);
    }

    if let Err(e) = after_result {
        panic!("After run failed: {:?}", e);
    }
}

#[derive(Clone)]
pub struct TestContext {
    store: Docsim,
    database: Database,
    collection: Collection,
}

impl TestContext {
    pub fn new(store: Docsim) -> DocsimResult<Self> {
        let database = store.database(TEST_DATABASE)?;
        let collection = database.collection(TEST_COLLECTION)?;
        Ok(Self {
            store,
            database,
            collection,
        })
    }

    pub fn store(&self) -> Docsim {
        self.store.clone()
    }

    pub fn database(&self) -> Database {
        self.database.clone()
    }

    pub fn collection(&self) -> Collection {
        self.collection.clone()
    }
}

/// A fresh store with an empty `test.people` collection.
pub fn create_test_context() -> DocsimResult<TestContext> {
    TestContext::new(Docsim::builder().open()?)
}

/// A fresh store whose `test.people` collection holds Alice, Bob and Charlie.
pub fn create_seeded_context() -> DocsimResult<TestContext> {
    let ctx = create_test_context()?;
    ctx.collection().insert_many(people())?;
    Ok(ctx)
}

pub fn people() -> Vec<Document> {
    vec![
        doc! { name: "Alice", age: 25, status: "active" },
        doc! { name: "Bob", age: 30, status: "inactive" },
        doc! { name: "Charlie", age: 35, status: "active" },
    ]
}

pub fn cleanup(ctx: TestContext) -> DocsimResult<()> {
    ctx.store().drop_database(TEST_DATABASE)?;
    Ok(())
}

/// The `name` field of each document, `""` when absent.
pub fn names(documents: &[Document]) -> Vec<String> {
    documents
        .iter()
        .map(|document| match document.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => String::new(),
        })
        .collect()
}
