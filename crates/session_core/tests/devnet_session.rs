use std::time::Duration;

use devnet::{Devnet, DevnetConfig};
use session_core::{
    ActionKind, FormField, SessionError, SessionEvent, SessionPhase, SessionSettings,
    TerminalOutcome,
};
use shared::domain::{Account, ConnectionStatus, ConnectorId, ContractAddress, ValueBalance};

fn settings(contract: &ContractAddress) -> SessionSettings {
    SessionSettings {
        contract_address: contract.clone(),
        poll_interval_ms: 1,
        max_poll_attempts: 10,
        ..SessionSettings::default()
    }
}

#[tokio::test]
async fn increase_then_transfer_against_devnet() {
    let contract = ContractAddress::new("0x0c0ffee");
    let net = Devnet::new(
        contract.clone(),
        DevnetConfig {
            confirmation_polls: 2,
            ..DevnetConfig::default()
        },
    );
    let manager = net.session_manager(settings(&contract));
    let mut events = manager.subscribe_events();

    let alice = manager
        .connect(&ConnectorId::new("argentX"))
        .await
        .expect("connect");
    assert_eq!(manager.current_value().await, Some(ValueBalance(0)));

    manager.update_form(FormField::IncreaseAmount, "50").await;
    let handle = manager.submit_increase_form().await.expect("increase");
    manager.track(&handle).await.expect("increase confirmed");
    assert_eq!(manager.current_value().await, Some(ValueBalance(50)));
    assert_eq!(manager.snapshot().await.forms.increase_amount, "");

    let bob = Account::new("0xb0b");
    let handle = manager
        .submit_transfer(bob.as_str(), "20")
        .await
        .expect("transfer");
    manager.track(&handle).await.expect("transfer confirmed");
    assert_eq!(manager.current_value().await, Some(ValueBalance(30)));
    assert_eq!(net.value_of(&bob).await, 20);
    assert_eq!(net.value_of(&alice).await, 30);

    let mut terminal = 0;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Terminal { outcome, .. } = event {
            assert_eq!(outcome, TerminalOutcome::Succeeded);
            terminal += 1;
        }
    }
    assert_eq!(terminal, 2);
}

#[tokio::test]
async fn overdrawn_transfer_reverts_and_keeps_value() {
    let contract = ContractAddress::new("0x0c0ffee");
    let net = Devnet::new(contract.clone(), DevnetConfig::default());
    let manager = net.session_manager(settings(&contract));
    let alice = manager
        .connect(&ConnectorId::new("braavos"))
        .await
        .expect("connect");
    net.set_value(&alice, 5).await;
    manager.refresh_value().await.expect("refresh");

    let handle = manager
        .submit_transfer("0xb0b", "6")
        .await
        .expect("submitted");
    assert_eq!(
        manager.track(&handle).await,
        Err(SessionError::Reverted("Insufficient value".to_string()))
    );

    let snapshot = manager.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert_eq!(snapshot.value, Some(ValueBalance(5)));
    assert_eq!(
        snapshot.action_label(ActionKind::Transfer),
        "Transfer Value"
    );
}

#[tokio::test]
async fn declined_submission_leaves_session_idle() {
    let contract = ContractAddress::new("0x0c0ffee");
    let net = Devnet::new(contract.clone(), DevnetConfig::default());
    let manager = net.session_manager(settings(&contract));
    manager
        .connect(&ConnectorId::new("argentX"))
        .await
        .expect("connect");

    net.reject_next_submission("User abort").await;
    assert_eq!(
        manager.submit_increase("1").await,
        Err(SessionError::Submission("User abort".to_string()))
    );
    assert!(manager.snapshot().await.can_submit());
}

#[tokio::test]
async fn locked_wallet_is_picked_up_by_the_watch() {
    let contract = ContractAddress::new("0x0c0ffee");
    let net = Devnet::new(contract.clone(), DevnetConfig::default());
    let manager = net.session_manager(settings(&contract));
    manager
        .connect(&ConnectorId::new("argentX"))
        .await
        .expect("connect");
    let watch = manager.spawn_wallet_watch();
    let mut events = manager.subscribe_events();

    net.lock_wallet().await;
    loop {
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event in time")
            .expect("event");
        if matches!(event, SessionEvent::WalletStatusChanged { account: None, .. }) {
            break;
        }
    }

    assert_eq!(manager.current_value().await, None);
    assert_eq!(
        manager.submit_increase("1").await,
        Err(SessionError::NoAccount)
    );
    watch.abort();
}

fn wallet_statuses(events: &[SessionEvent]) -> Vec<ConnectionStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::WalletStatusChanged { status, .. } => Some(*status),
            _ => None,
        })
        .collect()
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test]
async fn wallet_watch_does_not_replay_connect_and_disconnect() {
    let contract = ContractAddress::new("0x0c0ffee");
    let net = Devnet::new(contract.clone(), DevnetConfig::default());
    let manager = net.session_manager(settings(&contract));
    let watch = manager.spawn_wallet_watch();
    let mut events = manager.subscribe_events();

    manager
        .connect(&ConnectorId::new("argentX"))
        .await
        .expect("connect");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let seen = drain(&mut events);
    assert_eq!(
        wallet_statuses(&seen),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
    );
    let refreshes = seen
        .iter()
        .filter(|event| matches!(event, SessionEvent::ValueRefreshed(_)))
        .count();
    assert_eq!(refreshes, 1);
    assert_eq!(
        manager.snapshot().await.connection,
        ConnectionStatus::Connected
    );

    manager.disconnect().await.expect("disconnect");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        wallet_statuses(&drain(&mut events)),
        vec![ConnectionStatus::Disconnected]
    );
    watch.abort();
}
