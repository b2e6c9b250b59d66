use super::*;
use shared::protocol::ContractCall;

const CONTRACT: &str = "0x0c0ffee";

fn devnet(confirmation_polls: u32) -> Arc<Devnet> {
    Devnet::new(
        ContractAddress::new(CONTRACT),
        DevnetConfig {
            confirmation_polls,
            ..DevnetConfig::default()
        },
    )
}

fn invocation(call: ContractCall) -> Invocation {
    call.into_invocation(&ContractAddress::new(CONTRACT))
}

async fn settle(net: &Devnet, hash: &TransactionHash) -> TransactionReceipt {
    for _ in 0..16 {
        if let Some(receipt) = net.receipt(hash).await.expect("receipt") {
            return receipt;
        }
    }
    panic!("transaction {hash} never settled");
}

#[tokio::test]
async fn connectors_resolve_to_distinct_deterministic_accounts() {
    let net = devnet(0);
    let argent = net.account_for(&ConnectorId::new("argentX"));
    let braavos = net.account_for(&ConnectorId::new("braavos"));
    assert_ne!(argent, braavos);
    assert_eq!(argent, net.account_for(&ConnectorId::new("argentX")));
    assert!(argent.as_str().starts_with("0x0"));
    assert_eq!(argent.as_str().len(), 66);
}

#[tokio::test]
async fn unknown_connector_is_rejected() {
    let net = devnet(0);
    let err = net
        .connect(&ConnectorId::new("metamask"))
        .await
        .expect_err("unknown connector");
    assert!(err.to_string().contains("Connector not found"));
    assert!(net.current_account().await.is_none());
}

#[tokio::test]
async fn receipt_is_revealed_after_configured_polls() {
    let net = devnet(2);
    let alice = net.connect(&ConnectorId::new("argentX")).await.expect("connect");

    let response = net
        .execute(
            &alice,
            vec![invocation(ContractCall::IncreaseValue { amount: 50 })],
        )
        .await
        .expect("execute");
    let hash = response.transaction_hash;

    assert_eq!(net.receipt(&hash).await.expect("poll 1"), None);
    assert_eq!(net.receipt(&hash).await.expect("poll 2"), None);
    assert_eq!(net.value_of(&alice).await, 0);

    let receipt = net.receipt(&hash).await.expect("poll 3").expect("receipt");
    assert_eq!(receipt.execution_status, ExecutionStatus::Succeeded);
    assert_eq!(net.value_of(&alice).await, 50);

    // Receipts are stable once revealed.
    assert_eq!(net.receipt(&hash).await.expect("poll 4"), Some(receipt));
    assert_eq!(net.value_of(&alice).await, 50);
}

#[tokio::test]
async fn transfer_beyond_balance_reverts_without_state_change() {
    let net = devnet(0);
    let alice = net.connect(&ConnectorId::new("argentX")).await.expect("connect");
    let bob = Account::new("0xb0b");
    net.set_value(&alice, 5).await;

    let response = net
        .execute(
            &alice,
            vec![invocation(ContractCall::TransferValue {
                recipient: bob.clone(),
                amount: 10,
            })],
        )
        .await
        .expect("execute");
    let receipt = settle(&net, &response.transaction_hash).await;

    assert_eq!(receipt.execution_status, ExecutionStatus::Reverted);
    assert_eq!(receipt.revert_reason.as_deref(), Some("Insufficient value"));
    assert_eq!(net.value_of(&alice).await, 5);
    assert_eq!(net.value_of(&bob).await, 0);
}

#[tokio::test]
async fn transfer_moves_value_between_accounts() {
    let net = devnet(0);
    let alice = net.connect(&ConnectorId::new("argentX")).await.expect("connect");
    let bob = Account::new("0xb0b");
    net.set_value(&alice, 25).await;

    let response = net
        .execute(
            &alice,
            vec![invocation(ContractCall::TransferValue {
                recipient: bob.clone(),
                amount: 10,
            })],
        )
        .await
        .expect("execute");
    settle(&net, &response.transaction_hash).await;

    assert_eq!(net.value_of(&alice).await, 15);
    assert_eq!(net.value_of(&bob).await, 10);
    let felts = net
        .call(&bob, &ContractAddress::new(CONTRACT), "get_value", &[])
        .await
        .expect("read");
    assert_eq!(felts, vec!["10".to_string()]);
}

#[tokio::test]
async fn increase_overflow_reverts() {
    let net = devnet(0);
    let alice = net.connect(&ConnectorId::new("braavos")).await.expect("connect");
    net.set_value(&alice, u128::MAX).await;

    let response = net
        .execute(
            &alice,
            vec![invocation(ContractCall::IncreaseValue { amount: 1 })],
        )
        .await
        .expect("execute");
    let receipt = settle(&net, &response.transaction_hash).await;
    assert_eq!(receipt.revert_reason.as_deref(), Some("u128_add Overflow"));
    assert_eq!(net.value_of(&alice).await, u128::MAX);
}

#[tokio::test]
async fn malformed_submissions_are_rejected_before_broadcast() {
    let net = devnet(0);
    let alice = net.connect(&ConnectorId::new("argentX")).await.expect("connect");

    let wrong_contract = ContractCall::IncreaseValue { amount: 1 }
        .into_invocation(&ContractAddress::new("0xdead"));
    assert!(net.execute(&alice, vec![wrong_contract]).await.is_err());

    let unknown_entrypoint = Invocation {
        contract_address: ContractAddress::new(CONTRACT),
        entrypoint: "burn_value".to_string(),
        calldata: vec!["1".to_string()],
    };
    let err = net
        .execute(&alice, vec![unknown_entrypoint])
        .await
        .expect_err("unknown entrypoint");
    assert!(err.to_string().contains("burn_value"));

    net.reject_next_submission("User abort").await;
    let err = net
        .execute(
            &alice,
            vec![invocation(ContractCall::IncreaseValue { amount: 1 })],
        )
        .await
        .expect_err("declined");
    assert_eq!(err.to_string(), "User abort");

    net.execute(
        &alice,
        vec![invocation(ContractCall::IncreaseValue { amount: 1 })],
    )
    .await
    .expect("rejection only applies once");
}

#[tokio::test]
async fn unknown_hash_is_a_status_error() {
    let net = devnet(0);
    assert!(net
        .receipt(&TransactionHash::new("0x123"))
        .await
        .is_err());
}

#[tokio::test]
async fn wallet_status_changes_are_broadcast() {
    let net = devnet(0);
    let mut rx = net.subscribe_status();

    net.connect(&ConnectorId::new("argentX")).await.expect("connect");
    net.lock_wallet().await;

    assert_eq!(rx.recv().await.expect("status"), ConnectionStatus::Connecting);
    assert_eq!(rx.recv().await.expect("status"), ConnectionStatus::Connected);
    assert_eq!(
        rx.recv().await.expect("status"),
        ConnectionStatus::Disconnected
    );
    assert!(net.current_account().await.is_none());
}
