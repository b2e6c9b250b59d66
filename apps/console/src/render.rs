//! Text rendering of session events and snapshots.

use session_core::{
    ActionKind, FailureReason, SessionEvent, SessionSnapshot, TerminalOutcome,
};
use shared::domain::ConnectionStatus;

pub fn event_line(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::PhaseChanged(_) | SessionEvent::FormsCleared(_) => None,
        SessionEvent::WalletStatusChanged { status, account } => Some(match (status, account) {
            (ConnectionStatus::Connected, Some(account)) => {
                format!("Connected: {}", account.short())
            }
            (ConnectionStatus::Connected, None) => "Connected: N/A".to_string(),
            (ConnectionStatus::Connecting, _) => "Connecting to wallet...".to_string(),
            (ConnectionStatus::Disconnected, _) => {
                "Please connect your wallet to manage your game value.".to_string()
            }
        }),
        SessionEvent::Submitted(tracked) => Some(format!(
            "Transaction sent: {}",
            tracked.transaction_hash.short()
        )),
        SessionEvent::Terminal { outcome, .. } => Some(outcome_line(outcome)),
        SessionEvent::TrackingStopped { transaction_hash } => Some(format!(
            "Stopped tracking {} (the transaction itself is not cancelled)",
            transaction_hash.short()
        )),
        SessionEvent::ValueRefreshed(value) => Some(format!("Your current value: {value}")),
        SessionEvent::Error(message) => Some(format!("Error: {message}")),
    }
}

pub fn outcome_line(outcome: &TerminalOutcome) -> String {
    match outcome {
        TerminalOutcome::Succeeded => "Transaction successful!".to_string(),
        TerminalOutcome::Reverted(reason) => format!("Transaction REVERTED: {reason}"),
        TerminalOutcome::Failed(FailureReason::Network(message)) => {
            format!("Network Transaction Error: {message}")
        }
        TerminalOutcome::Failed(FailureReason::Timeout { attempts }) => {
            format!("Transaction not confirmed after {attempts} status checks")
        }
    }
}

pub fn status_lines(snapshot: &SessionSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    match &snapshot.account {
        Some(account) => lines.push(format!("Connected: {}", account.short())),
        None => {
            lines.push("Wallet: disconnected".to_string());
            return lines;
        }
    }

    lines.push(format!("Your Current Value: {}", snapshot.display_value()));
    lines.push(format!(
        "[{}] [{}]{}",
        snapshot.action_label(ActionKind::Increase),
        snapshot.action_label(ActionKind::Transfer),
        if snapshot.can_submit() { "" } else { " (disabled)" }
    ));

    if let Some(hash) = &snapshot.last_transaction_hash {
        let status = match (&snapshot.pending, &snapshot.last_outcome) {
            (Some(_), _) => "Pending".to_string(),
            (None, Some(TerminalOutcome::Succeeded)) => "SUCCEEDED".to_string(),
            (None, Some(TerminalOutcome::Reverted(_))) => "REVERTED".to_string(),
            (None, Some(TerminalOutcome::Failed(_))) => "FAILED".to_string(),
            (None, None) => "Untracked".to_string(),
        };
        lines.push(format!("Last Tx Hash: {} (Status: {status})", hash.short()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_core::{FormInputs, SessionPhase};
    use shared::domain::{Account, TransactionHash, ValueBalance};

    fn snapshot(phase: SessionPhase) -> SessionSnapshot {
        SessionSnapshot {
            phase,
            connection: ConnectionStatus::Connected,
            account: Some(Account::new("0x04a1b2c3d4e5f60718293a4b5c6d7e8f")),
            value: Some(ValueBalance(30)),
            pending: None,
            last_transaction_hash: None,
            last_outcome: None,
            forms: FormInputs::default(),
        }
    }

    #[test]
    fn idle_status_shows_value_and_enabled_actions() {
        let lines = status_lines(&snapshot(SessionPhase::Idle));
        assert_eq!(
            lines,
            vec![
                "Connected: 0x04a1...7e8f".to_string(),
                "Your Current Value: 30 units".to_string(),
                "[Increase Value] [Transfer Value]".to_string(),
            ]
        );
    }

    #[test]
    fn settled_transaction_shows_its_status() {
        let mut snap = snapshot(SessionPhase::Idle);
        snap.last_transaction_hash = Some(TransactionHash::new("0x0123456789abcdef"));
        snap.last_outcome = Some(TerminalOutcome::Reverted("Insufficient value".into()));
        let lines = status_lines(&snap);
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Last Tx Hash: 0x01234567... (Status: REVERTED)")
        );
    }

    #[test]
    fn revert_line_carries_reason() {
        assert_eq!(
            outcome_line(&TerminalOutcome::Reverted("Insufficient value".into())),
            "Transaction REVERTED: Insufficient value"
        );
    }

    #[test]
    fn phase_changes_are_not_printed() {
        assert!(event_line(&SessionEvent::PhaseChanged(SessionPhase::Tracking)).is_none());
    }
}
