//! Concurrent writers against one on-disk database.
//!
//! Many connections race for the same products; the ledger must never
//! oversell, drive a counter negative, or deadlock.

use std::time::{Duration, Instant};

use stockledger_core::{
    Actor, CoreError, NewProduct, PaymentMethod, Role, SaleLine, TenantContext, TransactionFilter,
};
use stockledger_db::{Database, DbConfig, DbError, DbResult};
use tempfile::TempDir;

async fn open(dir: &TempDir) -> Database {
    let config = DbConfig::new(dir.path().join("ledger.db"))
        .max_connections(8)
        .lock_timeout(Duration::from_secs(15));
    Database::new(config).await.unwrap()
}

/// Retries while the error is transient, as a till client would.
async fn with_retry<T, F, Fut>(mut op: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = DbResult<T>>,
{
    loop {
        match op().await {
            Err(e) if e.is_retryable() => tokio::time::sleep(Duration::from_millis(5)).await,
            other => return other,
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_sales_never_oversell() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let tenant = db.tenants().create("Corner Shop").await.unwrap();
    let ctx = TenantContext::new(&tenant.id);
    let manager = Actor::new("m-1", Role::Manager, &tenant.id);

    let product = db
        .products()
        .create(&ctx, &manager, NewProduct::new("Lager 50cl", 800).quantity(10).returnable(200))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let ledger = db.ledger();
        let ctx = ctx.clone();
        let cashier = Actor::new(format!("c-{i}"), Role::Cashier, &tenant.id);
        let product_id = product.id.clone();
        handles.push(tokio::spawn(async move {
            with_retry(|| ledger.record_sale(&ctx, &cashier, &product_id, 1)).await
        }));
    }

    let mut sold = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(entry) => {
                assert!(entry.product.quantity >= 0);
                sold += entry.transaction.quantity;
            }
            Err(DbError::Domain(CoreError::InsufficientStock { available: 0, .. })) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    let after = db.products().get(&ctx, &manager, &product.id).await.unwrap();
    assert_eq!(sold, 10);
    assert_eq!(after.quantity, 0);
    assert_eq!(after.bottles_outstanding, 10);

    let history = db
        .transactions()
        .list(&ctx, &manager, &TransactionFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_order_checkouts_do_not_deadlock() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let tenant = db.tenants().create("Corner Shop").await.unwrap();
    let ctx = TenantContext::new(&tenant.id);
    let manager = Actor::new("m-1", Role::Manager, &tenant.id);

    let bread = db
        .products()
        .create(&ctx, &manager, NewProduct::new("Bread", 300).quantity(100))
        .await
        .unwrap();
    let milk = db
        .products()
        .create(&ctx, &manager, NewProduct::new("Milk", 120).quantity(100))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let ledger = db.ledger();
        let ctx = ctx.clone();
        let cashier = Actor::new(format!("c-{i}"), Role::Cashier, &tenant.id);
        let lines = if i % 2 == 0 {
            vec![SaleLine::new(&bread.id, 1), SaleLine::new(&milk.id, 2)]
        } else {
            vec![SaleLine::new(&milk.id, 2), SaleLine::new(&bread.id, 1)]
        };
        handles.push(tokio::spawn(async move {
            with_retry(|| ledger.checkout(&ctx, &cashier, &lines, PaymentMethod::Cash)).await
        }));
    }

    let outcome = tokio::time::timeout(Duration::from_secs(60), async {
        let mut receipts = Vec::new();
        for handle in handles {
            receipts.push(handle.await.unwrap().unwrap());
        }
        receipts
    })
    .await
    .expect("checkouts deadlocked");

    assert_eq!(outcome.len(), 16);
    assert!(outcome.iter().all(|r| r.sale.total_cents == 300 + 2 * 120));

    let bread = db.products().get(&ctx, &manager, &bread.id).await.unwrap();
    let milk = db.products().get(&ctx, &manager, &milk.id).await.unwrap();
    assert_eq!(bread.quantity, 100 - 16);
    assert_eq!(milk.quantity, 100 - 32);
    assert_eq!(db.sales().count(&ctx, &manager).await.unwrap(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lock_wait_timeout_is_retryable_contention() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let tenant = db.tenants().create("Corner Shop").await.unwrap();
    let ctx = TenantContext::new(&tenant.id);
    let manager = Actor::new("m-1", Role::Manager, &tenant.id);
    let cashier = Actor::new("c-1", Role::Cashier, &tenant.id);

    let bread = db
        .products()
        .create(&ctx, &manager, NewProduct::new("Bread", 300).quantity(5))
        .await
        .unwrap();

    // A second pool on the same file that gives up quickly.
    let impatient = Database::new(
        DbConfig::new(dir.path().join("ledger.db"))
            .lock_timeout(Duration::from_millis(200))
            .run_migrations(false),
    )
    .await
    .unwrap();

    // Hold the write lock from the first pool.
    let mut holder = db.pool().begin().await.unwrap();
    sqlx::query("UPDATE products SET last_updated = last_updated WHERE id = ?1")
        .bind(&bread.id)
        .execute(&mut *holder)
        .await
        .unwrap();

    let started = Instant::now();
    let err = impatient
        .ledger()
        .record_sale(&ctx, &cashier, &bread.id, 2)
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Contention(_)), "{err:?}");
    assert!(err.is_retryable());
    assert!(started.elapsed() >= Duration::from_millis(150));

    holder.rollback().await.unwrap();

    let stored = db.products().get(&ctx, &manager, &bread.id).await.unwrap();
    assert_eq!(stored.quantity, 5);
    assert_eq!(db.transactions().count(&ctx, &manager).await.unwrap(), 0);

    // Once the lock is released the same call goes through.
    let entry = impatient.ledger().record_sale(&ctx, &cashier, &bread.id, 2).await.unwrap();
    assert_eq!(entry.product.quantity, 3);
    impatient.close().await;
}
