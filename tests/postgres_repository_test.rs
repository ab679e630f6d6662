//! Postgres-backed store tests
//!
//! Require a database: `DATABASE_URL=postgres://... cargo test -- --ignored`

use payflow_backend::database::models::PaymentStatus;
use payflow_backend::database::repository::{
    Inserted, LedgerOutcome, NewAttempt, NewPayment, OutcomeUpdate, WebhookRecord,
};
use payflow_backend::database::{init_pool, run_migrations, Stores};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

async fn stores() -> Stores {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = init_pool(&url, None).await.expect("database reachable");
    run_migrations(&pool).await.expect("migrations apply");
    Stores::postgres(pool)
}

fn new_payment(key: &str) -> NewPayment {
    NewPayment {
        amount: Decimal::new(2500, 2),
        currency: "USD".to_string(),
        payment_method: "card".to_string(),
        customer_data: json!({"email": "buyer@example.com"}),
        idempotency_key: key.to_string(),
        description: None,
        metadata: json!({}),
    }
}

#[tokio::test]
#[ignore]
async fn test_insert_or_fetch_is_idempotent() {
    let stores = stores().await;
    let key = format!("pg-{}", Uuid::new_v4());

    let created = match stores.payments.insert_or_fetch(new_payment(&key)).await.unwrap() {
        Inserted::Created(payment) => payment,
        Inserted::Existing(_) => panic!("fresh key reported as existing"),
    };
    assert_eq!(created.status, PaymentStatus::Pending);

    match stores.payments.insert_or_fetch(new_payment(&key)).await.unwrap() {
        Inserted::Existing(existing) => assert_eq!(existing.id, created.id),
        Inserted::Created(_) => panic!("duplicate key inserted twice"),
    }
}

#[tokio::test]
#[ignore]
async fn test_duplicate_attempt_number_rejected() {
    let stores = stores().await;
    let key = format!("pg-{}", Uuid::new_v4());
    let Inserted::Created(payment) = stores.payments.insert_or_fetch(new_payment(&key)).await.unwrap()
    else {
        panic!("fresh key reported as existing");
    };

    let attempt = || NewAttempt {
        payment_id: payment.id,
        provider_name: "stripe".to_string(),
        attempt_number: 1,
        request_data: json!({}),
    };

    stores.attempts.create(attempt()).await.unwrap();
    let err = stores.attempts.create(attempt()).await.unwrap_err();
    assert!(err.is_constraint_violation());
}

#[tokio::test]
#[ignore]
async fn test_webhook_applied_once() {
    let stores = stores().await;
    let key = format!("pg-{}", Uuid::new_v4());
    let Inserted::Created(payment) = stores.payments.insert_or_fetch(new_payment(&key)).await.unwrap()
    else {
        panic!("fresh key reported as existing");
    };

    let pi = format!("pi_{}", Uuid::new_v4().simple());
    stores
        .payments
        .record_outcome(
            payment.id,
            OutcomeUpdate {
                status: PaymentStatus::Pending,
                provider_name: "stripe".to_string(),
                provider_transaction_id: Some(pi.clone()),
                attempted_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();

    let record = || WebhookRecord {
        webhook_id: format!("evt_{}", pi),
        provider: "stripe".to_string(),
        payload: json!({"type": "payment_intent.succeeded"}),
        provider_transaction_id: Some(pi.clone()),
        status: Some(PaymentStatus::Success),
    };

    let first = stores.webhooks.record_and_apply(record()).await.unwrap();
    assert_eq!(first, LedgerOutcome::Applied { payment_id: payment.id });

    let second = stores.webhooks.record_and_apply(record()).await.unwrap();
    assert_eq!(second, LedgerOutcome::Duplicate);

    let stored = stores.payments.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);
    assert_eq!(stored.webhook_history.as_array().map(Vec::len), Some(1));
}
