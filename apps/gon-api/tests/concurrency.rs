//! Two cashiers racing for the last units, against a file-backed database so
//! the pool really holds several connections.

mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::TestApp;
use gon_api::error::ServiceError;
use gon_db::{fixtures, Database, DbConfig};

struct ScratchDb(PathBuf);

impl ScratchDb {
    fn new() -> Self {
        ScratchDb(std::env::temp_dir().join(format!("gon-race-{}.db", uuid::Uuid::new_v4())))
    }
}

impl Drop for ScratchDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.0.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_for_last_units() {
    let scratch = ScratchDb::new();
    let db = Database::new(
        DbConfig::new(&scratch.0)
            .max_connections(4)
            .busy_timeout(Duration::from_secs(5)),
    )
    .await
    .unwrap();
    let world = fixtures::seed_world(&db).await.unwrap();
    let app = TestApp::from_parts(db, world);

    // 10 on hand, each cashier wants 6
    let mut handles = Vec::new();
    for _ in 0..2 {
        let sales = app.state.sales();
        let request = app.sale_request(&[(world.yerba, 6, None)]);
        let caller = app.salesperson();
        handles.push(tokio::spawn(async move { sales.create_sale(&request, &caller).await }));
    }

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(ServiceError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, 4);
                assert_eq!(requested, 6);
                rejected += 1;
            }
            Err(other) => panic!("unexpected outcome: {:?}", other),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 1);
    assert_eq!(app.quantity(world.yerba_stock).await, 4);
    app.assert_ledger_consistent().await;
    app.db().close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_never_oversell() {
    let scratch = ScratchDb::new();
    let db = Database::new(DbConfig::new(&scratch.0).max_connections(4))
        .await
        .unwrap();
    let world = fixtures::seed_world(&db).await.unwrap();
    let app = TestApp::from_parts(db, world);

    // 8 sales of 2 units against 10 on hand
    let mut handles = Vec::new();
    for _ in 0..8 {
        let sales = app.state.sales();
        let request = app.sale_request(&[(world.yerba, 2, None)]);
        let caller = app.salesperson();
        handles.push(tokio::spawn(async move { sales.create_sale(&request, &caller).await }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(ServiceError::InsufficientStock { .. }) | Err(ServiceError::Conflict(_)) => {}
            Err(other) => panic!("unexpected outcome: {:?}", other),
        }
    }

    assert!(succeeded <= 5);
    assert_eq!(app.quantity(world.yerba_stock).await, 10 - 2 * succeeded);
    app.assert_ledger_consistent().await;
    app.db().close().await;
}
