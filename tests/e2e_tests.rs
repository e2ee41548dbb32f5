//! End-to-end integration tests
//!
//! These tests run a complete server (four desks, dispatcher, monitor and
//! shutdown barrier) over the in-memory transport. Each test:
//! 1. Starts a server on a fresh or pre-loaded ledger
//! 2. Drives one or more client sessions line by line
//! 3. Checks the responses, the monitor report or the persisted ledger
//!
//! Covered:
//! - Happy path deposits, withdrawals, transfers and balance queries
//! - Error responses that keep the session open
//! - Busy rejection when every queue is full
//! - Persistence of exact final balances at shutdown

#[cfg(test)]
mod tests {
    use desk_bank::core::DeskBalance;
    use desk_bank::io::transport::{MemoryClient, MemoryTransport};
    use desk_bank::{load_ledger, Ledger, RunningServer, Server, ServerConfig};
    use rstest::rstest;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Start a server on `ledger` with fast idle checks
    fn start(config: ServerConfig, ledger: Ledger) -> (RunningServer, MemoryTransport) {
        let transport = MemoryTransport::new();
        let config = ServerConfig {
            idle_wait: Duration::from_millis(5),
            ..config
        };
        let server = Server::start(
            config,
            Arc::new(ledger),
            Box::new(transport.source()),
            Arc::new(transport.connector()),
        )
        .unwrap();
        (server, transport)
    }

    fn ready_client(transport: &MemoryTransport) -> MemoryClient {
        let mut client = transport.connect();
        client.wait_ready().unwrap();
        client
    }

    #[test]
    fn test_deposit_then_query() {
        let (server, transport) = start(ServerConfig::default(), Ledger::new());

        let mut client = ready_client(&transport);
        assert_eq!(
            client.request("d 5 100").unwrap(),
            "Deposited 100 to account 5, new balance 100"
        );
        assert_eq!(client.request("l 5").unwrap(), "100");
        client.quit().unwrap();

        server.shutdown().unwrap();
    }

    #[test]
    fn test_insufficient_transfer_leaves_balances() {
        let (server, transport) = start(ServerConfig::default(), Ledger::new());

        let mut client = ready_client(&transport);
        client.request("d 1 30").unwrap();
        assert_eq!(
            client.request("t 1 2 50").unwrap(),
            "Current balance 30 of account 1 is not sufficient for transfer of 50"
        );
        assert_eq!(client.request("l 1").unwrap(), "30");
        assert_eq!(client.request("l 2").unwrap(), "0");
        client.quit().unwrap();

        server.shutdown().unwrap();
    }

    // Error responses never end the session
    #[rstest]
    #[case::unknown_account("l 1000", "No account with number 1000 in record")]
    #[case::negative_account("w -1 5", "No account with number -1 in record")]
    #[case::same_account("t 3 3 5", "Account 3 cannot transfer to itself")]
    #[case::overdraft("w 4 1", "Current balance 0 of account 4 is not sufficient for withdrawal of 1")]
    #[case::negative_amount("d 4 -10", "fail: Invalid amount -10, amounts must be positive")]
    #[case::unknown_verb("x 1", "fail: Error in command 'x 1': unknown command 'x'")]
    #[case::missing_argument("d 4", "fail: Error in command 'd 4': 'd' takes 2 argument(s), got 1")]
    fn test_error_keeps_session_open(#[case] command: &str, #[case] expected: &str) {
        let (server, transport) = start(ServerConfig::default(), Ledger::new());

        let mut client = ready_client(&transport);
        assert_eq!(client.request(command).unwrap(), expected);
        assert_eq!(client.request("l 4").unwrap(), "0");
        client.quit().unwrap();

        server.shutdown().unwrap();
    }

    #[test]
    fn test_full_queues_turn_client_away() {
        let config = ServerConfig::new(1, Duration::from_millis(1), Duration::from_millis(5));
        let (server, transport) = start(config, Ledger::new());

        // Every desk busy with a customer...
        let serving: Vec<_> = (0..4).map(|_| ready_client(&transport)).collect();
        // ...and every queue holding one more.
        let queued: Vec<_> = (0..4).map(|_| transport.connect()).collect();

        let mut rejected = transport.connect();
        assert_eq!(
            rejected.read_line().unwrap(),
            Some("fail: server busy, try again later".to_string())
        );
        assert_eq!(rejected.read_line().unwrap(), None);

        for client in serving {
            client.quit().unwrap();
        }
        for mut client in queued {
            client.wait_ready().unwrap();
            client.quit().unwrap();
        }

        let report = server.shutdown().unwrap();
        assert_eq!(report.dispatch.rejected, 1);
        assert_eq!(report.dispatch.assigned, 8);
    }

    #[test]
    fn test_monitor_reports_desk_deltas() {
        let (server, transport) = start(ServerConfig::default(), Ledger::new());

        let mut client = ready_client(&transport);
        client.request("d 1 100").unwrap();
        client.request("w 1 30").unwrap();
        client.request("t 1 2 50").unwrap();
        client.quit().unwrap();

        let mut other = ready_client(&transport);
        other.request("d 9 5").unwrap();
        other.quit().unwrap();

        let report = server.monitor().query();
        assert!(report.is_complete());
        assert_eq!(report.desks.len(), 4);
        assert_eq!(report.aggregate(), 75);
        assert_eq!(server.ledger().total(), 75);

        server.shutdown().unwrap();
    }

    #[test]
    fn test_monitor_after_shutdown_reports_stopped() {
        let (server, _transport) = start(ServerConfig::default(), Ledger::new());
        let monitor = server.monitor();

        server.shutdown().unwrap();

        let report = monitor.query();
        assert!(report.desks.iter().all(|desk| *desk == DeskBalance::Stopped));
        assert_eq!(report.aggregate(), 0);
    }

    #[test]
    fn test_shutdown_persists_exact_balances() {
        let dir = tempdir().unwrap();
        let ledger_file = dir.path().join("accounts");
        let csv_file = dir.path().join("accounts.csv");
        let config = ServerConfig::default()
            .with_persistence(Some(ledger_file.clone()), Some(csv_file.clone()));
        let (server, transport) = start(config, Ledger::new());

        let mut first = ready_client(&transport);
        let mut second = ready_client(&transport);
        first.request("d 10 500").unwrap();
        second.request("d 20 70").unwrap();
        first.request("t 10 20 125").unwrap();
        second.request("w 20 45").unwrap();
        first.quit().unwrap();
        second.quit().unwrap();

        let report = server.shutdown().unwrap();
        assert_eq!(report.acks.len(), 4);
        assert_eq!(report.ledger_total, 525);

        let restored = load_ledger(&ledger_file, 1000).unwrap();
        assert_eq!(restored.read_balance(10).unwrap(), 375);
        assert_eq!(restored.read_balance(20).unwrap(), 150);
        assert_eq!(restored.total(), 525);
        assert_eq!(
            fs::read_to_string(&csv_file).unwrap(),
            "account,balance\n10,375\n20,150\n"
        );
    }

    #[test]
    fn test_restart_continues_from_persisted_ledger() {
        let dir = tempdir().unwrap();
        let ledger_file = dir.path().join("accounts");
        let config = ServerConfig::default().with_persistence(Some(ledger_file.clone()), None);

        let (server, transport) = start(config.clone(), load_ledger(&ledger_file, 1000).unwrap());
        let mut client = ready_client(&transport);
        client.request("d 7 42").unwrap();
        client.quit().unwrap();
        server.shutdown().unwrap();

        let (server, transport) = start(config, load_ledger(&ledger_file, 1000).unwrap());
        let mut client = ready_client(&transport);
        assert_eq!(client.request("l 7").unwrap(), "42");
        client.quit().unwrap();
        server.shutdown().unwrap();
    }

    #[test]
    fn test_client_waits_for_desk_to_finish() {
        let (server, transport) = start(ServerConfig::default(), Ledger::new());

        let mut clients: Vec<_> = (0..4).map(|_| ready_client(&transport)).collect();
        let mut waiting = transport.connect();

        clients[0].request("d 3 9").unwrap();
        for client in clients {
            client.quit().unwrap();
        }
        waiting.wait_ready().unwrap();
        assert_eq!(waiting.request("l 3").unwrap(), "9");
        waiting.quit().unwrap();

        server.shutdown().unwrap();
    }
}
