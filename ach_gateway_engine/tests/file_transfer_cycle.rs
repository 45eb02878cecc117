use ach_gateway_engine::{
    ach::parse_file,
    db_types::{Cents, NewMicroDeposit, NewTransfer, TransferStatus},
    file_transfer::{scan_merged_dir, FileTransferController, FileTransferError, FlushKind, MergeEngine, Metric},
    ledger::AccountsClient,
    test_utils::fixtures::{date, micro_deposit_file, new_transfer, trace_number, transfer_file, ODFI_ROUTING},
    traits::{AchFileStorage, MicroDepositManagement, TransferManagement},
};
use chrono::Utc;
use log::*;
use support::{list_dir, TestGateway};

mod support;

#[tokio::test]
async fn merged_transfers_are_uploaded_once() {
    let gw = TestGateway::new().await;
    let today = Utc::now().date_naive();
    for (i, id) in ["t-1", "t-2"].iter().enumerate() {
        let trace = trace_number(i as u32 + 1);
        let transfer = new_transfer(id, "alice", &trace, 1_000 * (i as u64 + 1), today);
        gw.store_file(&transfer.file_id, &transfer_file(ODFI_ROUTING, &trace, 1_000 * (i as u64 + 1), today)).await;
        gw.db.insert_transfer(transfer).await.expect("Could not insert transfer");
    }
    let mut controller = gw.controller(None).await;
    assert!(controller.schedule().is_near_cutoff(ODFI_ROUTING, Utc::now()));

    let report = controller.run_cycle(FlushKind::Outgoing).await;
    info!("🚀️ {report:?}");
    assert_eq!(report.transfers_merged, 2);
    assert_eq!(report.errors, 0);
    assert_eq!(report.files_uploaded.len(), 1);
    let filename = report.files_uploaded[0].clone();
    assert!(filename.starts_with(&today.format("%Y%m%d").to_string()));
    assert!(filename.contains(ODFI_ROUTING));

    // Both batches landed in the one uploaded file
    let outbound = list_dir(&gw.remote_dir("outbound"));
    assert_eq!(outbound, vec![filename.clone()]);
    let uploaded = std::fs::read_to_string(gw.remote_dir("outbound").join(&filename)).unwrap();
    let file = parse_file(&uploaded).unwrap();
    assert_eq!(file.batches.len(), 2);

    // The local copy is renamed and no longer counts as a merged file
    assert_eq!(list_dir(&gw.merged_dir()), vec![format!("{filename}.uploaded")]);
    assert!(scan_merged_dir(&gw.merged_dir()).await.unwrap().is_empty());
    assert_eq!(gw.metrics.count_for(Metric::FileUploaded, ODFI_ROUTING), 1);

    for id in ["t-1", "t-2"] {
        let transfer = gw.db.fetch_transfer(id).await.unwrap().unwrap();
        assert_eq!(transfer.merged_filename.as_deref(), Some(filename.as_str()));
    }

    // Nothing new to merge, and nothing to upload again
    let report = controller.run_cycle(FlushKind::Outgoing).await;
    assert_eq!(report.transfers_merged, 0);
    assert!(report.files_uploaded.is_empty());
    assert_eq!(list_dir(&gw.remote_dir("outbound")).len(), 1);
}

#[tokio::test]
async fn open_files_wait_for_cutoff_while_full_files_upload() {
    let gw = TestGateway::new().await;
    let today = Utc::now().date_naive();
    for n in 1..=3u32 {
        let trace = trace_number(n);
        let amount = 100 * u64::from(n);
        let transfer = new_transfer(&format!("t-{n}"), "alice", &trace, amount, today);
        gw.store_file(&transfer.file_id, &transfer_file(ODFI_ROUTING, &trace, amount, today)).await;
        gw.db.insert_transfer(transfer).await.expect("Could not insert transfer");
    }
    // Each transfer adds a 3 record batch to a file with 2 records of its own: 5, 8, then 11 rolls over
    let mut config = gw.controller_config();
    config.max_lines = 10;
    config.forced_upload_delta = chrono::Duration::zero();
    let mut controller = gw.controller_with(config, None).await;

    let report = controller.run_cycle(FlushKind::Outgoing).await;
    assert_eq!(report.transfers_merged, 3);
    assert_eq!(report.errors, 0);
    let prefix = format!("{}-{ODFI_ROUTING}", today.format("%Y%m%d"));
    assert_eq!(report.files_uploaded, vec![format!("{prefix}-1.ach")]);
    let uploaded = std::fs::read_to_string(gw.remote_dir("outbound").join(format!("{prefix}-1.ach"))).unwrap();
    assert_eq!(parse_file(&uploaded).unwrap().batches.len(), 2);

    // The open file stays local until its routing number nears cutoff
    assert_eq!(list_dir(&gw.merged_dir()), vec![format!("{prefix}-1.ach.uploaded"), format!("{prefix}-2.ach")]);
    let t3 = gw.db.fetch_transfer("t-3").await.unwrap().unwrap();
    assert_eq!(t3.merged_filename, Some(format!("{prefix}-2.ach")));
    let report = controller.run_cycle(FlushKind::Outgoing).await;
    assert!(report.files_uploaded.is_empty());
    assert_eq!(list_dir(&gw.remote_dir("outbound")).len(), 1);
}

#[tokio::test]
async fn micro_deposits_are_merged_and_uploaded() {
    let gw = TestGateway::new().await;
    let today = Utc::now().date_naive();
    gw.store_file("md-1", &micro_deposit_file(ODFI_ROUTING, 10, &[12, 34], today)).await;
    for amount in [12, 34] {
        let deposit = NewMicroDeposit::new("alice-receiver", "alice", "md-1", Cents::from(amount));
        gw.db.insert_micro_deposit(deposit).await.expect("Could not insert micro-deposit");
    }
    let mut controller = gw.controller(None).await;

    let report = controller.run_cycle(FlushKind::Outgoing).await;
    assert_eq!(report.micro_deposits_merged, 1);
    assert_eq!(report.transfers_merged, 0);
    assert_eq!(report.errors, 0);
    assert_eq!(report.files_uploaded.len(), 1);
    let filename = report.files_uploaded[0].clone();
    let uploaded = std::fs::read_to_string(gw.remote_dir("outbound").join(&filename)).unwrap();
    let file = parse_file(&uploaded).unwrap();
    assert_eq!(file.batches.len(), 1);
    let amounts = file.batches[0].entries.iter().map(|e| e.amount).collect::<Vec<_>>();
    assert_eq!(amounts, vec![12, 34]);

    let deposits = gw.db.fetch_micro_deposits_for_depository("alice-receiver").await.unwrap();
    assert_eq!(deposits.len(), 2);
    assert!(deposits.iter().all(|d| d.merged_filename.as_deref() == Some(filename.as_str())));

    // A fresh controller starts from the beginning, but merged deposits are no longer pending
    let mut controller = gw.controller(None).await;
    let report = controller.run_cycle(FlushKind::Outgoing).await;
    assert_eq!(report.micro_deposits_merged, 0);
    assert!(report.files_uploaded.is_empty());
}

#[tokio::test]
async fn micro_deposit_failures_are_labelled_with_their_routing_number() {
    let gw = TestGateway::new().await;
    let today = Utc::now().date_naive();
    // 9 entries make an 11 record batch, which can never fit in a 10 record file
    gw.store_file("md-big", &micro_deposit_file(ODFI_ROUTING, 20, &[1; 9], today)).await;
    let big = NewMicroDeposit::new("bob-receiver", "bob", "md-big", Cents::from(1));
    gw.db.insert_micro_deposit(big).await.unwrap();
    let missing = NewMicroDeposit::new("carol-receiver", "carol", "md-missing", Cents::from(1));
    gw.db.insert_micro_deposit(missing).await.unwrap();
    let mut config = gw.controller_config();
    config.max_lines = 10;
    let mut controller = gw.controller_with(config, None).await;

    let report = controller.run_cycle(FlushKind::Outgoing).await;
    assert_eq!(report.micro_deposits_merged, 0);
    assert_eq!(report.errors, 2);
    assert_eq!(gw.metrics.count_for(Metric::MergeFailure, ODFI_ROUTING), 1);
    assert_eq!(gw.metrics.count_for(Metric::MergeFailure, "unresolved"), 1);
    assert_eq!(gw.metrics.count_for(Metric::MergeFailure, ""), 0);
    let deposits = gw.db.fetch_micro_deposits_for_depository("bob-receiver").await.unwrap();
    assert!(deposits[0].merged_filename.is_none());
}

#[tokio::test]
async fn transfers_without_a_config_are_skipped() {
    let gw = TestGateway::new().await;
    let today = Utc::now().date_naive();
    let trace = trace_number(1);
    let transfer = NewTransfer::new("t-orphan", "alice", Cents::from(500), "file-orphan", "091000019")
        .with_trace("PPD", &trace, today);
    gw.store_file("file-orphan", &transfer_file("091000019", &trace, 500, today)).await;
    gw.db.insert_transfer(transfer).await.unwrap();

    let mut controller = gw.controller(None).await;
    let report = controller.run_cycle(FlushKind::Outgoing).await;
    assert_eq!(report.transfers_merged, 0);
    assert!(report.files_uploaded.is_empty());
    assert_eq!(gw.metrics.count_for(Metric::MissingConfig, "091000019"), 1);

    let transfer = gw.db.fetch_transfer("t-orphan").await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Pending);
    assert!(transfer.merged_filename.is_none());
}

#[tokio::test]
async fn unparsable_stored_files_count_as_merge_failures() {
    let gw = TestGateway::new().await;
    let today = Utc::now().date_naive();
    let transfer = new_transfer("t-bad", "alice", &trace_number(7), 700, today);
    gw.db.save_ach_file(&transfer.file_id, "this is not an ACH file").await.unwrap();
    gw.db.insert_transfer(transfer).await.unwrap();

    let mut controller = gw.controller(None).await;
    let report = controller.run_cycle(FlushKind::Outgoing).await;
    assert_eq!(report.transfers_merged, 0);
    assert_eq!(report.errors, 1);
    assert_eq!(gw.metrics.count_for(Metric::MergeFailure, ODFI_ROUTING), 1);
}

#[tokio::test]
async fn files_from_earlier_days_are_uploaded_without_waiting_for_cutoff() {
    let gw = TestGateway::new().await;
    let yesterday = date(2024, 3, 1);
    let trace = trace_number(3);
    gw.store_file("file-old", &transfer_file(ODFI_ROUTING, &trace, 300, yesterday)).await;
    let engine = MergeEngine::new(gw.storage.path(), 100);
    let stored = gw.db.fetch_ach_file("file-old").await.unwrap().unwrap();
    let file = parse_file(&stored).unwrap();
    let outcome = engine.merge(&file, yesterday).await.unwrap();
    assert_eq!(outcome.merged_filename, format!("20240301-{ODFI_ROUTING}-1.ach"));

    // A cutoff that is never near
    let mut config = gw.controller_config();
    config.forced_upload_delta = chrono::Duration::zero();
    let (mut controller, _handle) =
        FileTransferController::<_, AccountsClient>::new(gw.db.clone(), None, config).await.unwrap();
    let report = controller.run_cycle(FlushKind::Outgoing).await;
    assert_eq!(report.files_uploaded, vec![outcome.merged_filename]);
}

#[tokio::test]
async fn controller_handles_flush_and_shutdown() {
    let gw = TestGateway::new().await;
    let (controller, handle) =
        FileTransferController::<_, AccountsClient>::new(gw.db.clone(), None, gw.controller_config()).await.unwrap();
    let task = tokio::spawn(controller.run());

    let report = handle.flush(FlushKind::All).await.expect("Flush failed");
    assert_eq!(report.errors, 0);
    assert_eq!(report.files_downloaded, 0);
    handle.trigger(FlushKind::Incoming).await.expect("Trigger failed");

    handle.shutdown();
    task.await.expect("Controller panicked");
    assert!(!handle.is_running());
    assert!(matches!(handle.flush(FlushKind::Outgoing).await, Err(FileTransferError::ControllerStopped)));
}
