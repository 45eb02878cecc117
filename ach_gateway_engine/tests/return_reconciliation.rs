use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use ach_gateway_engine::{
    ach::render_file,
    db_types::{DepositoryStatus, TransferStatus},
    file_transfer::{FlushKind, Metric},
    ledger::LedgerError,
    test_utils::fixtures::{date, depositories, new_transfer, return_file, trace_number, ReturnedEntry, ODFI_ROUTING},
    traits::{DepositoryManagement, TransferManagement},
};
use support::{list_dir, MockLedger, TestGateway};

mod support;

const EFFECTIVE: (i32, u32, u32) = (2024, 3, 1);

/// Stores a pending transfer for `user` with trace number `n`, plus the user's verified depositories.
async fn setup_user(gw: &TestGateway, user: &str, n: u32, amount: u64, tx_id: Option<&str>) {
    let (y, m, d) = EFFECTIVE;
    let mut transfer = new_transfer(&format!("t-{user}"), user, &trace_number(n), amount, date(y, m, d));
    if let Some(tx_id) = tx_id {
        transfer = transfer.with_transaction_id(tx_id);
    }
    gw.db.insert_transfer(transfer).await.unwrap();
    let (origin, receiver) = depositories(user);
    gw.db.insert_depository(origin).await.unwrap();
    gw.db.insert_depository(receiver).await.unwrap();
}

fn write_return_file(gw: &TestGateway, name: &str, entries: &[ReturnedEntry<'_>]) {
    let (y, m, d) = EFFECTIVE;
    let dir = gw.remote_dir("returned");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), render_file(&return_file(date(y, m, d), entries))).unwrap();
}

async fn statuses(gw: &TestGateway, user: &str) -> (TransferStatus, DepositoryStatus, DepositoryStatus) {
    let transfer = gw.db.fetch_transfer(&format!("t-{user}")).await.unwrap().unwrap();
    let origin = gw.db.fetch_depository(&format!("{user}-origin")).await.unwrap().unwrap();
    let receiver = gw.db.fetch_depository(&format!("{user}-receiver")).await.unwrap().unwrap();
    (transfer.status, origin.status, receiver.status)
}

#[tokio::test]
async fn return_codes_drive_depository_policy() {
    let gw = TestGateway::new().await;
    setup_user(&gw, "alice", 1, 1_000, Some("tx-alice")).await;
    setup_user(&gw, "bob", 2, 2_000, None).await;
    setup_user(&gw, "carol", 3, 3_000, Some("tx-carol")).await;
    let (t1, t2, t3) = (trace_number(1), trace_number(2), trace_number(3));
    write_return_file(&gw, "returns.ach", &[
        ReturnedEntry::new(&t1, 1_000, "R02"),
        ReturnedEntry::new(&t2, 2_000, "R14"),
        ReturnedEntry::new(&t3, 3_000, "R99"),
    ]);

    let mut ledger = MockLedger::new();
    ledger
        .expect_reverse_transaction()
        .withf(|tx, user, _| tx == "tx-alice" && user == "alice")
        .times(1)
        .returning(|_, _, _| Ok(()));
    let mut controller = gw.controller(Some(ledger)).await;
    let report = controller.run_cycle(FlushKind::Incoming).await;
    assert_eq!(report.files_downloaded, 1);
    assert_eq!(report.returns_reconciled, 2);
    assert_eq!(report.returns_failed, 1);
    assert_eq!(gw.metrics.count_for(Metric::ReturnReconciled, ODFI_ROUTING), 2);
    assert_eq!(gw.metrics.count_for(Metric::ReturnFailure, ODFI_ROUTING), 1);

    use DepositoryStatus::*;
    assert_eq!(statuses(&gw, "alice").await, (TransferStatus::Reclaimed, Verified, Rejected));
    assert_eq!(statuses(&gw, "bob").await, (TransferStatus::Reclaimed, Rejected, Rejected));
    assert_eq!(statuses(&gw, "carol").await, (TransferStatus::Pending, Verified, Verified));
    let alice = gw.db.fetch_transfer("t-alice").await.unwrap().unwrap();
    assert_eq!(alice.return_code.as_deref(), Some("R02"));
    let carol = gw.db.fetch_transfer("t-carol").await.unwrap().unwrap();
    assert!(carol.return_code.is_none());

    // Remote copies are removed once saved, and the download area is cleaned up. R99 will never succeed, so the file
    // isn't kept for another attempt
    assert!(list_dir(&gw.remote_dir("returned")).is_empty());
    assert!(!gw.storage.path().join("download").exists());
    assert!(list_dir(&gw.retained_returns_dir()).is_empty());
}

#[tokio::test]
async fn failed_reversals_leave_transfers_untouched() {
    let gw = TestGateway::new().await;
    setup_user(&gw, "dave", 4, 4_000, Some("tx-dave")).await;
    let t4 = trace_number(4);
    write_return_file(&gw, "returns.ach", &[ReturnedEntry::new(&t4, 4_000, "R02")]);

    let mut ledger = MockLedger::new();
    ledger.expect_reverse_transaction().times(1).returning(|tx, _, _| {
        Err(LedgerError::ReversalRejected { transaction_id: tx.to_string(), status: 409, body: "conflict".into() })
    });
    let mut controller = gw.controller(Some(ledger)).await;
    let report = controller.run_cycle(FlushKind::Incoming).await;
    assert_eq!(report.returns_reconciled, 0);
    assert_eq!(report.returns_failed, 1);

    let transfer = gw.db.fetch_transfer("t-dave").await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Pending);
    assert!(transfer.return_code.is_none());
    assert_eq!(statuses(&gw, "dave").await.2, DepositoryStatus::Verified);
    assert_eq!(list_dir(&gw.retained_returns_dir()), vec![format!("{ODFI_ROUTING}-returns.ach")]);
}

#[tokio::test]
async fn returns_are_retried_after_a_failed_reversal() {
    let gw = TestGateway::new().await;
    setup_user(&gw, "gina", 7, 7_000, Some("tx-gina")).await;
    setup_user(&gw, "hank", 8, 8_000, None).await;
    let (t7, t8) = (trace_number(7), trace_number(8));
    write_return_file(&gw, "returns.ach", &[ReturnedEntry::new(&t7, 7_000, "R02"), ReturnedEntry::new(&t8, 8_000, "R16")]);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut ledger = MockLedger::new();
    ledger.expect_reverse_transaction().withf(|tx, user, _| tx == "tx-gina" && user == "gina").times(2).returning(
        move |_, _, _| match counter.fetch_add(1, Ordering::SeqCst) {
            0 => Err(LedgerError::Unreachable("connection refused".into())),
            _ => Ok(()),
        },
    );
    let mut controller = gw.controller(Some(ledger)).await;

    let report = controller.run_cycle(FlushKind::Incoming).await;
    assert_eq!(report.returns_reconciled, 1);
    assert_eq!(report.returns_failed, 1);
    assert_eq!(statuses(&gw, "gina").await.0, TransferStatus::Pending);
    assert_eq!(statuses(&gw, "hank").await.0, TransferStatus::Reclaimed);
    assert!(list_dir(&gw.remote_dir("returned")).is_empty());
    assert_eq!(list_dir(&gw.retained_returns_dir()), vec![format!("{ODFI_ROUTING}-returns.ach")]);

    // The kept file is processed again. Hank's entry was already reconciled and is skipped.
    let report = controller.run_cycle(FlushKind::Incoming).await;
    assert_eq!(report.files_downloaded, 0);
    assert_eq!(report.returns_reconciled, 1);
    assert_eq!(report.returns_failed, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    use DepositoryStatus::*;
    assert_eq!(statuses(&gw, "gina").await, (TransferStatus::Reclaimed, Verified, Rejected));
    assert!(list_dir(&gw.retained_returns_dir()).is_empty());

    let report = controller.run_cycle(FlushKind::Incoming).await;
    assert_eq!(report.returns_reconciled + report.returns_failed, 0);
}

#[tokio::test]
async fn unverified_receivers_fail_the_entry() {
    let gw = TestGateway::new().await;
    setup_user(&gw, "erin", 5, 5_000, None).await;
    gw.db.update_depository_status("erin-receiver", DepositoryStatus::Unverified).await.unwrap();
    let t5 = trace_number(5);
    write_return_file(&gw, "returns.ach", &[ReturnedEntry::new(&t5, 5_000, "R02")]);

    let mut controller = gw.controller(None).await;
    let report = controller.run_cycle(FlushKind::Incoming).await;
    assert_eq!(report.returns_failed, 1);
    assert_eq!(statuses(&gw, "erin").await, (TransferStatus::Pending, DepositoryStatus::Verified, DepositoryStatus::Unverified));

    // Once the receiver is verified the kept return goes through
    gw.db.update_depository_status("erin-receiver", DepositoryStatus::Verified).await.unwrap();
    let report = controller.run_cycle(FlushKind::Incoming).await;
    assert_eq!(report.returns_reconciled, 1);
    assert_eq!(statuses(&gw, "erin").await, (TransferStatus::Reclaimed, DepositoryStatus::Verified, DepositoryStatus::Rejected));
    assert!(list_dir(&gw.retained_returns_dir()).is_empty());
}

#[tokio::test]
async fn unparsable_downloads_are_skipped() {
    let gw = TestGateway::new().await;
    setup_user(&gw, "frank", 6, 6_000, None).await;
    let t6 = trace_number(6);
    write_return_file(&gw, "b-returns.ach", &[ReturnedEntry::new(&t6, 6_000, "R07")]);
    std::fs::write(gw.remote_dir("returned").join("a-garbage.ach"), "not an ach file").unwrap();
    std::fs::create_dir_all(gw.remote_dir("inbound")).unwrap();
    std::fs::write(gw.remote_dir("inbound").join("noise.txt"), "1 short line").unwrap();

    let mut controller = gw.controller(None).await;
    let report = controller.run_cycle(FlushKind::Incoming).await;
    assert_eq!(report.files_downloaded, 3);
    assert_eq!(report.returns_reconciled, 1);
    assert_eq!(report.errors, 2);
    assert_eq!(statuses(&gw, "frank").await.0, TransferStatus::Reclaimed);
}
