//! Health Module Tests
//!
//! ## Test Scopes
//! - **Snapshots**: Reads return copies that do not change under later writes.
//! - **Selection**: `active_ids` ordering and `min_load_id` tie-breaking and sentinel behavior.
//! - **Concurrency**: Parallel load adjustments never lose updates.

#[cfg(test)]
mod tests {
    use crate::health::tracker::ClusterHealth;

    // ============================================================
    // STATUS TESTS
    // ============================================================

    #[test]
    fn test_new_tracker_is_all_inactive() {
        let health = ClusterHealth::new(3);

        assert_eq!(health.node_count(), 3);
        assert_eq!(health.read_status(), vec![false, false, false]);
        assert_eq!(health.active_count(), 0);
    }

    #[test]
    fn test_status_snapshot_is_a_copy() {
        let health = ClusterHealth::new(2);
        let snapshot = health.read_status();

        health.write_status(0, true);

        assert_eq!(snapshot, vec![false, false], "Snapshot must not observe later writes");
        assert_eq!(health.read_status(), vec![true, false]);
    }

    #[test]
    fn test_write_status_out_of_range_is_ignored() {
        let health = ClusterHealth::new(1);

        health.write_status(5, true);

        assert_eq!(health.read_status(), vec![false]);
        assert!(!health.is_active(5));
    }

    #[test]
    fn test_active_ids_are_ascending() {
        let health = ClusterHealth::new(4);
        health.write_status(3, true);
        health.write_status(1, true);

        assert_eq!(health.active_ids(true), vec![1, 3]);
        assert_eq!(health.active_ids(false), vec![0, 2]);
    }

    // ============================================================
    // LOAD TESTS
    // ============================================================

    #[test]
    fn test_read_write_load() {
        let health = ClusterHealth::new(2);

        health.write_load(1, 7);
        health.add_load(1, -2);

        assert_eq!(health.read_load(0), 0);
        assert_eq!(health.read_load(1), 5);
        assert_eq!(health.read_load(9), 0);
    }

    #[test]
    fn test_min_load_id_picks_least_loaded_active_node() {
        let health = ClusterHealth::new(3);
        for index in 0..3 {
            health.write_status(index, true);
        }
        health.write_load(0, 4);
        health.write_load(1, 1);
        health.write_load(2, 3);

        assert_eq!(health.min_load_id(true), Some(1));
    }

    #[test]
    fn test_min_load_id_skips_nodes_with_other_status() {
        let health = ClusterHealth::new(3);
        health.write_status(2, true);
        health.write_load(0, 0);
        health.write_load(2, 10);

        // Node 0 is idle but inactive, so node 2 wins.
        assert_eq!(health.min_load_id(true), Some(2));
        assert_eq!(health.min_load_id(false), Some(0));
    }

    #[test]
    fn test_min_load_id_ties_resolve_to_lowest_index() {
        let health = ClusterHealth::new(3);
        health.write_status(1, true);
        health.write_status(2, true);

        assert_eq!(health.min_load_id(true), Some(1));
    }

    #[test]
    fn test_min_load_id_reports_no_match() {
        let health = ClusterHealth::new(2);

        assert_eq!(health.min_load_id(true), None);
        assert_eq!(ClusterHealth::new(0).min_load_id(false), None);
    }

    // ============================================================
    // CONCURRENCY TESTS
    // ============================================================

    #[test]
    fn test_concurrent_load_updates_are_not_lost() {
        let health = ClusterHealth::new(1);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let health = health.clone();
                scope.spawn(move || {
                    for _ in 0..1000 {
                        health.add_load(0, 1);
                        health.add_load(0, -1);
                        health.add_load(0, 1);
                    }
                });
            }
        });

        assert_eq!(health.read_load(0), 8000);
    }
}
