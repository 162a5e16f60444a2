//! End-to-end tests of the lab services against a scratch data directory.
//!
//! Verifies:
//! - Intake and approval keep the running balance
//! - Request lifecycle rules (terminal states, filtering, rejection)
//! - Concurrent intakes lose no updates
//! - Partial dual writes surface and are rolled forward by the reconciler

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Local;

    use labstock_core::RequestId;
    use labstock_inventory::{Decision, MovementDetails, MovementDraft, RequestStatus};

    use crate::config::{LockSettings, StorePaths};
    use crate::error::InventoryError;
    use crate::services::{LabServices, NewRequest, StockReceipt};
    use crate::store::{TableGuard, TableLocks};
    use crate::test_support::TestDir;

    fn setup_with(dir: &TestDir, timeout_ms: u64, materials: &[&str]) -> LabServices {
        let paths = StorePaths::under(dir.path());
        std::fs::create_dir_all(&paths.ledger_dir).unwrap();
        let locks = LockSettings { timeout_ms };
        let materials: Vec<String> = materials.iter().map(|m| m.to_string()).collect();
        LabServices::new(&paths, &locks, &materials)
    }

    /// Hold `table` through a registry of its own, as another process would.
    fn hold_elsewhere(table: &std::path::Path) -> TableGuard {
        TableLocks::new(Duration::from_secs(1)).acquire(table).unwrap()
    }

    fn setup(dir: &TestDir) -> LabServices {
        setup_with(dir, 2_000, &[])
    }

    fn receipt(material: &str, quantity: f64) -> StockReceipt {
        StockReceipt {
            material: material.to_string(),
            quantity: Some(quantity),
            unit: "MT".to_string(),
            supplier: "Air Liquide".to_string(),
            invoice_no: "INV-100".to_string(),
            received_by: "stores".to_string(),
            ..StockReceipt::default()
        }
    }

    fn borrow(material: &str, quantity: f64) -> NewRequest {
        NewRequest {
            material: material.to_string(),
            quantity: Some(quantity),
            unit: "MT".to_string(),
            purpose: "purging".to_string(),
            employee_name: "Asha".to_string(),
            employee_id: "E-17".to_string(),
            request_date: "2024-03-02".to_string(),
            request_time: "10:00".to_string(),
            ..NewRequest::default()
        }
    }

    fn arrival(tanker: &str) -> MovementDraft {
        MovementDraft {
            tanker_id: tanker.to_string(),
            material_or_product: "Caustic Soda".to_string(),
            quantity: Some(24.5),
            date: "2024-05-01".to_string(),
            time: "08:15".to_string(),
            batch: "B-7".to_string(),
            order: "PO-88".to_string(),
            counterpart: "Acme Chemicals".to_string(),
            recorded_by: "gate".to_string(),
            recorded_at: Local::now().naive_local(),
            details: MovementDetails::Arrival {
                driver_name: "Ravi".to_string(),
                sampling_date: "2024-05-01".to_string(),
                sampling_time: "08:40".to_string(),
            },
        }
    }

    fn ledger_rows_with(dir: &TestDir, table: &str, needle: &str) -> usize {
        let path = StorePaths::under(dir.path()).ledger_dir.join(format!("{table}.csv"));
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }

    fn balance(services: &LabServices, material: &str) -> f64 {
        services.overview.balance(material).unwrap().balance
    }

    #[test]
    fn worked_example_nitrogen() {
        let dir = TestDir::new();
        let services = setup(&dir);

        assert_eq!(services.intake.receive(&receipt("Nitrogen", 10.0)).unwrap().new_balance, 10.0);
        assert_eq!(services.intake.receive(&receipt("Nitrogen", 5.0)).unwrap().new_balance, 15.0);

        let request = services.requests.create(&borrow("Nitrogen", 4.0)).unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.request_id.as_str().len(), 8);

        let outcome = services
            .requests
            .decide(&request.request_id, Decision::Approve, "central")
            .unwrap();
        assert_eq!(outcome.new_balance, Some(11.0));
        assert_eq!(outcome.request.status, RequestStatus::Approved);
        assert_eq!(outcome.request.approved_by, "central");
        assert!(!outcome.request.approval_time.is_empty());

        assert_eq!(balance(&services, "Nitrogen"), 11.0);
        assert_eq!(ledger_rows_with(&dir, "nitrogen", request.request_id.as_str()), 1);

        let stored: Vec<_> = services
            .requests
            .list(None)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, RequestStatus::Approved);
    }

    #[test]
    fn approval_may_overdraw() {
        let dir = TestDir::new();
        let services = setup(&dir);
        services.intake.receive(&receipt("Argon", 1.0)).unwrap();
        let request = services.requests.create(&borrow("Argon", 3.5)).unwrap();
        let outcome = services
            .requests
            .decide(&request.request_id, Decision::Approve, "central")
            .unwrap();
        assert_eq!(outcome.new_balance, Some(-2.5));
    }

    #[test]
    fn terminal_requests_reject_a_second_decision() {
        let dir = TestDir::new();
        let services = setup(&dir);
        services.intake.receive(&receipt("Nitrogen", 10.0)).unwrap();
        let request = services.requests.create(&borrow("Nitrogen", 4.0)).unwrap();
        services
            .requests
            .decide(&request.request_id, Decision::Approve, "central")
            .unwrap();

        for decision in [Decision::Approve, Decision::Reject] {
            let err = services
                .requests
                .decide(&request.request_id, decision, "someone-else")
                .unwrap_err();
            assert!(matches!(err, InventoryError::Conflict(_)), "{err}");
        }

        assert_eq!(balance(&services, "Nitrogen"), 6.0);
        assert_eq!(ledger_rows_with(&dir, "nitrogen", request.request_id.as_str()), 1);
        let stored = services.requests.list(None).unwrap().next().unwrap().unwrap();
        assert_eq!(stored.approved_by, "central");
    }

    #[test]
    fn rejection_leaves_the_ledger_alone() {
        let dir = TestDir::new();
        let services = setup(&dir);
        services.intake.receive(&receipt("Helium", 7.0)).unwrap();
        let ledger = StorePaths::under(dir.path()).ledger_dir.join("helium.csv");
        let before = std::fs::read_to_string(&ledger).unwrap();

        let request = services.requests.create(&borrow("Helium", 2.0)).unwrap();
        let outcome = services
            .requests
            .decide(&request.request_id, Decision::Reject, "central")
            .unwrap();
        assert_eq!(outcome.request.status, RequestStatus::Rejected);
        assert_eq!(outcome.new_balance, None);

        assert_eq!(std::fs::read_to_string(&ledger).unwrap(), before);
        assert_eq!(balance(&services, "Helium"), 7.0);
    }

    #[test]
    fn unknown_request_is_not_found() {
        let dir = TestDir::new();
        let services = setup(&dir);
        let id: RequestId = "DEADBEEF".parse().unwrap();
        assert!(matches!(
            services.requests.decide(&id, Decision::Approve, "central").unwrap_err(),
            InventoryError::NotFound(_)
        ));
    }

    #[test]
    fn pending_filter_keeps_insertion_order() {
        let dir = TestDir::new();
        let services = setup(&dir);
        let a = services.requests.create(&borrow("Nitrogen", 1.0)).unwrap();
        let b = services.requests.create(&borrow("Argon", 2.0)).unwrap();
        let c = services.requests.create(&borrow("Helium", 3.0)).unwrap();
        services
            .requests
            .decide(&b.request_id, Decision::Reject, "central")
            .unwrap();

        let pending: Vec<_> = services
            .requests
            .list(Some(RequestStatus::Pending))
            .unwrap()
            .map(|r| r.unwrap().request_id)
            .collect();
        assert_eq!(pending, vec![a.request_id, c.request_id]);

        let rejected: Vec<_> = services
            .requests
            .list(Some(RequestStatus::Rejected))
            .unwrap()
            .map(|r| r.unwrap().request_id)
            .collect();
        assert_eq!(rejected, vec![b.request_id]);
    }

    #[test]
    fn invalid_input_writes_nothing() {
        let dir = TestDir::new();
        let services = setup(&dir);

        let mut no_material = receipt("", 1.0);
        no_material.material = "   ".to_string();
        assert!(matches!(
            services.intake.receive(&no_material).unwrap_err(),
            InventoryError::Validation(_)
        ));
        let mut no_quantity = receipt("Nitrogen", 1.0);
        no_quantity.quantity = None;
        assert!(matches!(
            services.intake.receive(&no_quantity).unwrap_err(),
            InventoryError::Validation(_)
        ));

        let mut anonymous = borrow("Nitrogen", 1.0);
        anonymous.employee_name = String::new();
        assert!(matches!(
            services.requests.create(&anonymous).unwrap_err(),
            InventoryError::Validation(_)
        ));

        let paths = StorePaths::under(dir.path());
        assert!(!paths.requests.exists());
        assert!(!paths.ledger_dir.join("nitrogen.csv").exists());
    }

    #[test]
    fn material_variants_share_one_ledger() {
        let dir = TestDir::new();
        let services = setup(&dir);
        services.intake.receive(&receipt("Liquid Nitrogen", 1.0)).unwrap();
        services.intake.receive(&receipt("  liquid   nitrogen ", 2.0)).unwrap();
        let last = services.intake.receive(&receipt("LIQUID-NITROGEN", 3.0)).unwrap();
        assert_eq!(last.new_balance, 6.0);

        let tables = std::fs::read_dir(StorePaths::under(dir.path()).ledger_dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .map(|e| e.path().extension().is_some_and(|x| x == "csv"))
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(tables, 1);
    }

    #[test]
    fn overview_lists_configured_and_discovered_materials() {
        let dir = TestDir::new();
        let services = setup_with(&dir, 2_000, &["Argon", "Nitrogen"]);
        services.intake.receive(&receipt("Nitrogen", 2.0)).unwrap();
        services.intake.receive(&receipt("Caustic Soda", 9.25)).unwrap();

        let balances = services.overview.balances().unwrap();
        let names: Vec<_> = balances.iter().map(|b| b.material.as_str()).collect();
        assert_eq!(names, vec!["Argon", "Caustic Soda", "Nitrogen"]);
        assert_eq!(balances[0].balance, 0.0);
        assert_eq!(balances[1].balance, 9.25);
        assert_eq!(balances[2].balance, 2.0);
    }

    #[test]
    fn concurrent_intakes_lose_no_updates() {
        const THREADS: usize = 16;
        const PER_THREAD: usize = 5;
        const QUANTITY: f64 = 0.25;

        let dir = TestDir::new();
        let services = Arc::new(setup_with(&dir, 30_000, &[]));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let services = Arc::clone(&services);
                std::thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        services.intake.receive(&receipt("Nitrogen", QUANTITY)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected = (THREADS * PER_THREAD) as f64 * QUANTITY;
        assert_eq!(balance(&services, "Nitrogen"), expected);
        assert_eq!(
            ledger_rows_with(&dir, "nitrogen", "INV-100"),
            THREADS * PER_THREAD
        );
    }

    #[test]
    fn arrival_writes_one_row_to_each_log() {
        let dir = TestDir::new();
        let services = setup(&dir);
        let movement = services.movements.record(arrival("TK-101")).unwrap();

        let paths = StorePaths::under(dir.path());
        let arrivals = std::fs::read_to_string(&paths.arrivals).unwrap();
        let rows: Vec<_> = arrivals.lines().skip(1).collect();
        assert_eq!(rows.len(), 1);
        let cells: Vec<_> = rows[0].split(',').collect();

        let history: Vec<_> = services.movements.history().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(history.len(), 1);
        let entry = &history[0];
        assert_eq!(entry.tanker_id, cells[0]);
        assert_eq!(entry.movement_type.as_str(), "ARRIVAL");
        assert_eq!(entry.quantity, cells[2]);
        assert_eq!(entry.date, cells[5]);
        assert_eq!(entry.time, cells[6]);
        assert_eq!(entry.recorded_at, movement.recorded_at);
        assert!(services.movements.verify().unwrap().is_clean());
    }

    #[test]
    fn history_failure_is_partial_and_reconciled() {
        let dir = TestDir::new();
        let services = setup_with(&dir, 100, &[]);
        let paths = StorePaths::under(dir.path());
        let foreign = hold_elsewhere(&paths.history);

        let err = services.movements.record(arrival("TK-9")).unwrap_err();
        match &err {
            InventoryError::PartialWrite { completed, failed, source, .. } => {
                assert_eq!(*completed, "arrival log");
                assert_eq!(*failed, "history log");
                assert!(source.is_retryable());
            }
            other => panic!("expected partial write, got {other}"),
        }
        assert_eq!(services.movements.verify().unwrap().missing.len(), 1);

        drop(foreign);
        let report = services.reconciler().run().unwrap();
        assert_eq!(report.repaired, 1);
        assert!(services.movements.verify().unwrap().is_clean());

        let again = services.reconciler().run().unwrap();
        assert_eq!(again, Default::default());
    }

    #[test]
    fn ledger_failure_after_approval_is_reconciled_once() {
        let dir = TestDir::new();
        let services = setup_with(&dir, 100, &[]);
        services.intake.receive(&receipt("Nitrogen", 10.0)).unwrap();
        let request = services.requests.create(&borrow("Nitrogen", 4.0)).unwrap();

        let ledger = StorePaths::under(dir.path()).ledger_dir.join("nitrogen.csv");
        let foreign = hold_elsewhere(&ledger);

        let err = services
            .requests
            .decide(&request.request_id, Decision::Approve, "central")
            .unwrap_err();
        assert_eq!(err.code(), "partial_write");
        let stored = services.requests.list(None).unwrap().next().unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);

        drop(foreign);
        assert_eq!(balance(&services, "Nitrogen"), 10.0);

        let report = services.reconciler().run().unwrap();
        assert_eq!(report.repaired, 1);
        assert_eq!(balance(&services, "Nitrogen"), 6.0);

        services.reconciler().run().unwrap();
        assert_eq!(ledger_rows_with(&dir, "nitrogen", request.request_id.as_str()), 1);
    }

    #[test]
    fn failed_first_write_abandons_the_intent() {
        let dir = TestDir::new();
        let services = setup_with(&dir, 100, &[]);
        let paths = StorePaths::under(dir.path());
        let foreign = hold_elsewhere(&paths.arrivals);

        let err = services.movements.record(arrival("TK-3")).unwrap_err();
        assert!(matches!(err, InventoryError::StoreLocked(_)));
        drop(foreign);

        let report = services.reconciler().run().unwrap();
        assert_eq!(report, Default::default());
        assert_eq!(services.movements.history().unwrap().count(), 0);
    }

    #[test]
    fn held_table_times_out() {
        let dir = TestDir::new();
        let services = setup_with(&dir, 50, &[]);
        let paths = StorePaths::under(dir.path());
        let guard = hold_elsewhere(&paths.ledger_dir.join("nitrogen.csv"));

        // The service uses its own registry, so the guard shows up as a
        // holder in another process.
        let err = services.intake.receive(&receipt("Nitrogen", 1.0)).unwrap_err();
        assert!(err.is_retryable());
        drop(guard);
        services.intake.receive(&receipt("Nitrogen", 1.0)).unwrap();
    }

    #[test]
    fn missing_data_directory_is_not_found() {
        let dir = TestDir::new();
        let paths = StorePaths::under(dir.path().join("nowhere"));
        let services = LabServices::new(&paths, &LockSettings::default(), &[]);
        assert!(matches!(
            services.intake.receive(&receipt("Nitrogen", 1.0)).unwrap_err(),
            InventoryError::NotFound(_)
        ));
        assert!(matches!(
            services.requests.create(&borrow("Nitrogen", 1.0)).unwrap_err(),
            InventoryError::NotFound(_)
        ));
    }
}
