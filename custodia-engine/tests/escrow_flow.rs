//! End-to-end escrow flows through the gateway

use custodia_engine::error::EscrowError;
use custodia_engine::gateway::{EscrowGateway, SessionId};
use custodia_engine::models::EscrowStatus;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn logged_in(gateway: &EscrowGateway, username: &str) -> SessionId {
    gateway.register(username, b"proof").await.unwrap();
    let (session, _) = gateway.login(username, b"proof").await.unwrap();
    session
}

/// Total system value: the sum of all balances plus everything locked in
/// pending escrows
async fn total_value(gateway: &EscrowGateway, sessions: &[SessionId]) -> u64 {
    let mut total = 0u64;
    for session in sessions {
        total += gateway.user_balance(session).await.unwrap();
    }
    total + gateway.stats().await.unwrap().locked_volume
}

#[tokio::test]
async fn widget_purchase_runs_to_completion() {
    init_tracing();
    let gateway = EscrowGateway::default();
    let buyer = logged_in(&gateway, "buyer").await;
    let seller = logged_in(&gateway, "seller").await;

    gateway.add_balance(&buyer, 100).await.unwrap();

    let id = gateway
        .create_escrow(&buyer, "seller", 40, "widget".to_string())
        .await
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(gateway.user_balance(&buyer).await.unwrap(), 60);

    gateway.confirm_delivery(&buyer, id).await.unwrap();
    assert_eq!(gateway.user_balance(&seller).await.unwrap(), 40);
    assert_eq!(
        gateway.escrow(&buyer, id).await.unwrap().status,
        EscrowStatus::Completed
    );

    // The escrow is terminal; cancelling it now must fail cleanly
    let err = gateway.cancel_escrow(&buyer, id).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
    assert_eq!(gateway.user_balance(&buyer).await.unwrap(), 60);
    assert_eq!(gateway.user_balance(&seller).await.unwrap(), 40);
}

#[tokio::test]
async fn failed_create_leaves_no_trace() {
    init_tracing();
    let gateway = EscrowGateway::default();
    let buyer = logged_in(&gateway, "buyer").await;
    let _seller = logged_in(&gateway, "seller").await;

    gateway.add_balance(&buyer, 10).await.unwrap();

    let err = gateway
        .create_escrow(&buyer, "seller", 40, "x".to_string())
        .await
        .unwrap_err();
    match err {
        EscrowError::InsufficientFunds {
            available,
            required,
        } => {
            assert_eq!(available, 10);
            assert_eq!(required, 40);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    assert_eq!(gateway.user_balance(&buyer).await.unwrap(), 10);
    assert!(gateway.user_escrows(&buyer).await.unwrap().is_empty());
    assert_eq!(gateway.stats().await.unwrap().total_escrows, 0);
}

#[tokio::test]
async fn stats_track_the_live_escrow_set() {
    init_tracing();
    let gateway = EscrowGateway::default();
    let buyer = logged_in(&gateway, "buyer").await;
    let _seller = logged_in(&gateway, "seller").await;

    gateway.add_balance(&buyer, 1000).await.unwrap();

    let completed = gateway
        .create_escrow(&buyer, "seller", 40, "done".to_string())
        .await
        .unwrap();
    let cancelled = gateway
        .create_escrow(&buyer, "seller", 25, "undone".to_string())
        .await
        .unwrap();
    gateway.confirm_delivery(&buyer, completed).await.unwrap();
    gateway.cancel_escrow(&buyer, cancelled).await.unwrap();

    let stats = gateway.stats().await.unwrap();
    assert_eq!(stats.completed_count, 1);
    assert_eq!(stats.cancelled_count, 1);
    assert_eq!(stats.pending_count, 0);
    assert_eq!(stats.total_escrows, 2);
}

#[tokio::test]
async fn value_is_conserved_across_the_lifecycle() {
    init_tracing();
    let gateway = EscrowGateway::default();
    let buyer = logged_in(&gateway, "buyer").await;
    let seller = logged_in(&gateway, "seller").await;
    let sessions = [buyer, seller];

    gateway.add_balance(&buyer, 500).await.unwrap();
    gateway.add_balance(&seller, 200).await.unwrap();
    assert_eq!(total_value(&gateway, &sessions).await, 700);

    let completed = gateway
        .create_escrow(&buyer, "seller", 120, "a".to_string())
        .await
        .unwrap();
    let cancelled = gateway
        .create_escrow(&buyer, "seller", 80, "b".to_string())
        .await
        .unwrap();
    let refunded = gateway
        .create_escrow(&buyer, "seller", 50, "c".to_string())
        .await
        .unwrap();
    assert_eq!(total_value(&gateway, &sessions).await, 700);

    gateway.confirm_delivery(&buyer, completed).await.unwrap();
    gateway.cancel_escrow(&buyer, cancelled).await.unwrap();
    gateway.refund_escrow(&seller, refunded).await.unwrap();
    assert_eq!(total_value(&gateway, &sessions).await, 700);

    // Completed amount arrived exactly once at the seller
    assert_eq!(gateway.user_balance(&seller).await.unwrap(), 320);
    assert_eq!(gateway.user_balance(&buyer).await.unwrap(), 380);
}

#[tokio::test]
async fn derived_identities_are_stable_and_unlinkable() {
    init_tracing();
    let gateway = EscrowGateway::default();

    // Two usernames, same credential proof: distinct identities
    gateway.register("alice", b"shared-credential").await.unwrap();
    gateway.register("alyce", b"shared-credential").await.unwrap();

    let (first, _) = gateway.login("alice", b"shared-credential").await.unwrap();
    let (second, _) = gateway.login("alyce", b"shared-credential").await.unwrap();

    let alice_id = gateway.my_user_id(&first).await.unwrap();
    let alyce_id = gateway.my_user_id(&second).await.unwrap();
    assert_ne!(alice_id, alyce_id);

    // Re-login re-derives the same identity
    let (again, _) = gateway.login("alice", b"shared-credential").await.unwrap();
    assert_eq!(gateway.my_user_id(&again).await.unwrap(), alice_id);

    // Funds held under one username are invisible to the other
    gateway.add_balance(&first, 75).await.unwrap();
    assert_eq!(gateway.user_balance(&second).await.unwrap(), 0);
}

#[tokio::test]
async fn non_parties_cannot_move_escrowed_funds() {
    init_tracing();
    let gateway = EscrowGateway::default();
    let buyer = logged_in(&gateway, "buyer").await;
    let seller = logged_in(&gateway, "seller").await;
    let outsider = logged_in(&gateway, "outsider").await;

    gateway.add_balance(&buyer, 100).await.unwrap();
    let id = gateway
        .create_escrow(&buyer, "seller", 40, "widget".to_string())
        .await
        .unwrap();

    assert_eq!(
        gateway.confirm_delivery(&seller, id).await.unwrap_err().kind(),
        "forbidden"
    );
    assert_eq!(
        gateway.confirm_delivery(&outsider, id).await.unwrap_err().kind(),
        "forbidden"
    );
    assert_eq!(
        gateway.refund_escrow(&buyer, id).await.unwrap_err().kind(),
        "forbidden"
    );

    assert_eq!(
        gateway.escrow(&buyer, id).await.unwrap().status,
        EscrowStatus::Pending
    );
    assert_eq!(gateway.user_balance(&seller).await.unwrap(), 0);
}
