//! Model Module Tests
//!
//! ## Test Scopes
//! - **Per-user update**: Exact SGD arithmetic, epoch counting, slice offsets.
//! - **Prediction & seeding**: Dot product and deterministic, bounded initialization.
//! - **Trainer**: RMSE improves with training; parameter export and redaction.
//! - **Dataset**: CSV loading into a dense matrix.

#[cfg(test)]
mod tests {
    use crate::model::dataset::load_ratings;
    use crate::model::factorization::{
        FactorModel, ModelParameters, dot, initialize_user_factors,
    };
    use crate::model::training::{ModelGrid, Trainer, grid_search};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Write;

    const EPS: f64 = 1e-9;

    fn identity_model(epochs: usize, regularization: f64) -> FactorModel {
        FactorModel::new(ModelParameters {
            num_features: 2,
            epochs,
            learning_rate: 0.1,
            regularization,
            r: None,
            p: None,
            q: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0], vec![2.0, 0.0]],
        })
    }

    // ============================================================
    // PER-USER UPDATE TESTS
    // ============================================================

    #[test]
    fn test_update_single_epoch_exact_values() {
        let model = identity_model(1, 0.0);
        let mut user = vec![0.0, 0.0];

        let (grad, count) = model.update_user_factors(&[2.0, 0.0], &mut user, 0, 2);

        // err = 2, step = 0.1 * 2 * q = [0.2, 0.0]; one observation.
        assert_eq!(count, 1);
        assert!((user[0] - 0.2).abs() < EPS);
        assert!(user[1].abs() < EPS);
        assert!((grad[0] - 0.2).abs() < EPS);
        assert!(grad[1].abs() < EPS);
    }

    #[test]
    fn test_update_counts_observations_per_epoch_and_scales_gradient() {
        let model = identity_model(2, 0.0);
        let mut user = vec![0.0, 0.0];

        let (grad, count) = model.update_user_factors(&[2.0, 0.0], &mut user, 0, 2);

        // Epoch 1: +0.2. Epoch 2: err = 1.8, +0.18. Sum 0.38, scaled by count 2.
        assert_eq!(count, 2);
        assert!((user[0] - 0.38).abs() < EPS);
        assert!((grad[0] - 0.76).abs() < EPS);
    }

    #[test]
    fn test_update_applies_regularization() {
        let model = identity_model(1, 0.5);
        let mut user = vec![1.0, 1.0];

        let (grad, count) = model.update_user_factors(&[1.0], &mut user, 0, 1);

        // pred = 1, err = 0; step = 0.1 * (0 - 0.5 * u) = -0.05 for both components.
        assert_eq!(count, 1);
        assert!((user[0] - 0.95).abs() < EPS);
        assert!((user[1] - 0.95).abs() < EPS);
        assert!((grad[1] + 0.05).abs() < EPS);
    }

    #[test]
    fn test_update_uses_slice_offset() {
        let model = identity_model(1, 0.0);
        let mut user = vec![0.0, 0.0];

        // ratings[0] is item 2 = [1, 1], ratings[1] is item 3 (unrated).
        let (_, count) = model.update_user_factors(&[1.0, 0.0], &mut user, 2, 4);

        assert_eq!(count, 1);
        assert!((user[0] - 0.1).abs() < EPS);
        assert!((user[1] - 0.1).abs() < EPS);
    }

    #[test]
    fn test_update_with_no_ratings_is_a_no_op() {
        let model = identity_model(5, 0.1);
        let mut user = vec![0.3, -0.2];

        let (grad, count) = model.update_user_factors(&[0.0, 0.0, 0.0, 0.0], &mut user, 0, 4);

        assert_eq!(count, 0);
        assert_eq!(grad, vec![0.0, 0.0]);
        assert_eq!(user, vec![0.3, -0.2]);
    }

    #[test]
    fn test_update_clamps_range_to_catalog() {
        let model = identity_model(1, 0.0);
        let mut user = vec![0.0, 0.0];

        // Range past the end of Q must not panic.
        let (_, count) = model.update_user_factors(&[1.0, 1.0, 1.0], &mut user, 3, 6);

        assert_eq!(count, 1);
    }

    // ============================================================
    // PREDICTION & SEED TESTS
    // ============================================================

    #[test]
    fn test_predict_user_is_dot_product() {
        let model = identity_model(1, 0.0);

        assert!((model.predict_user(&[0.5, 2.0], 2) - 2.5).abs() < EPS);
        assert!((model.predict_user(&[0.5, 2.0], 3) - 1.0).abs() < EPS);
        assert_eq!(model.predict_user(&[0.5, 2.0], 99), 0.0);
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }

    #[test]
    fn test_initialize_user_factors_is_seeded_and_bounded() {
        let a = initialize_user_factors(16, &mut StdRng::seed_from_u64(7));
        let b = initialize_user_factors(16, &mut StdRng::seed_from_u64(7));

        assert_eq!(a, b, "Same seed must give the same vector");
        assert_eq!(a.len(), 16);
        assert!(a.iter().all(|v| (-0.01..0.01).contains(v)));
    }

    // ============================================================
    // PARAMETER TESTS
    // ============================================================

    #[test]
    fn test_redacted_strips_ratings_and_user_factors() {
        let params = ModelParameters {
            num_features: 1,
            epochs: 1,
            learning_rate: 0.1,
            regularization: 0.01,
            r: Some(vec![vec![1.0]]),
            p: Some(vec![vec![0.5]]),
            q: vec![vec![0.25]],
        };

        let redacted = params.redacted();

        assert!(redacted.r.is_none());
        assert!(redacted.p.is_none());
        assert_eq!(redacted.q, params.q);

        let json = serde_json::to_value(&redacted).unwrap();
        assert!(json["R"].is_null());
        assert!(json["P"].is_null());
        assert_eq!(json["numFeatures"], 1);
    }

    #[test]
    fn test_validate_rejects_ragged_rows() {
        let mut params = identity_model(1, 0.0).params().clone();
        assert!(params.validate().is_ok());

        params.q[1] = vec![1.0];
        let error = params.validate().unwrap_err();
        assert!(error.contains("item 1"));
    }

    // ============================================================
    // TRAINER TESTS
    // ============================================================

    fn small_ratings() -> Vec<Vec<f64>> {
        vec![
            vec![5.0, 3.0, 0.0, 1.0],
            vec![4.0, 0.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0, 5.0],
            vec![0.0, 1.0, 5.0, 4.0],
        ]
    }

    #[test]
    fn test_training_reduces_rmse() {
        let mut trainer = Trainer::new(2, 300, 0.01, 0.0, small_ratings(), 1).unwrap();
        let before = trainer.rmse();

        trainer.train();
        let after = trainer.rmse();

        assert!(after < before, "RMSE should drop: {} -> {}", before, after);
    }

    #[test]
    fn test_trainer_rejects_empty_ratings() {
        assert!(Trainer::new(2, 1, 0.01, 0.0, vec![], 1).is_err());
        assert!(Trainer::new(2, 1, 0.01, 0.0, vec![vec![1.0], vec![1.0, 2.0]], 1).is_err());
    }

    #[test]
    fn test_trainer_parameters_shapes() {
        let trainer = Trainer::new(3, 1, 0.01, 0.0, small_ratings(), 1).unwrap();
        let params = trainer.parameters();

        assert_eq!(params.q.len(), 4);
        assert!(params.q.iter().all(|row| row.len() == 3));
        assert_eq!(params.p.as_ref().map(Vec::len), Some(4));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_grid_search_returns_best_rmse() {
        let grid = ModelGrid {
            num_features: vec![2],
            epochs: vec![1, 200],
            learning_rates: vec![0.01],
            regularizations: vec![0.0],
        };

        let (best, rmse) = grid_search(&grid, &small_ratings(), 3).unwrap();

        assert!((best.rmse() - rmse).abs() < EPS);
        assert_eq!(best.parameters().epochs, 200);
    }

    #[test]
    fn test_save_json_roundtrips_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let trainer = Trainer::new(2, 1, 0.01, 0.0, small_ratings(), 9).unwrap();

        trainer.save_json(&path).unwrap();

        let restored: ModelParameters =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let original = trainer.parameters();
        assert_eq!(restored.num_features, original.num_features);
        assert_eq!(restored.r, original.r);
        assert_eq!(restored.q.len(), original.q.len());
        for (restored_row, original_row) in restored.q.iter().zip(original.q.iter()) {
            for (a, b) in restored_row.iter().zip(original_row.iter()) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    // ============================================================
    // DATASET TESTS
    // ============================================================

    #[test]
    fn test_load_ratings_builds_dense_matrix() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userId;movieId;rating").unwrap();
        writeln!(file, "0;1;4.0").unwrap();
        writeln!(file, "2;0;3.5").unwrap();

        let ratings = load_ratings(file.path()).unwrap();

        assert_eq!(ratings.len(), 3);
        assert_eq!(ratings[0], vec![0.0, 4.0]);
        assert_eq!(ratings[1], vec![0.0, 0.0]);
        assert_eq!(ratings[2], vec![3.5, 0.0]);
    }

    #[test]
    fn test_load_ratings_rejects_empty_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userId;movieId;rating").unwrap();

        assert!(load_ratings(file.path()).is_err());
    }
}
