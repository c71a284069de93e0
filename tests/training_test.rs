#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use burn::backend::{Autodiff, NdArray};
    use hmlstm::config::{HiddenSizes, NetworkConfig, TaskKind};
    use hmlstm::data::{Batch, SinusoidConfig, VecBatchSource};
    use hmlstm::error::HmlstmError;
    use hmlstm::network::Prediction;
    use hmlstm::train::{
        CheckpointStore, DivergencePolicy, Init, Trainer, TrainerPhase, TrainingConfig,
        TrainingObserver, ValidationReport,
    };
    use ndarray::{array, Array2, Array3};

    type Backend = Autodiff<NdArray<f32>>;
    type InnerBackend = NdArray<f32>;

    fn regression_config() -> NetworkConfig {
        NetworkConfig::new(1, 2, HiddenSizes::PerLayer(vec![4, 4]), 1, TaskKind::Regression)
            .with_embed_size(6)
            .with_out_hidden_size(6)
            .with_learning_rate(1e-2)
    }

    fn regression_source() -> VecBatchSource {
        let batches = (0..3)
            .map(|i| {
                let input = Array3::from_shape_fn((5, 2, 1), |(t, b, _)| (t + b + i) as f32 * 0.1);
                let target = Array2::from_elem((2, 1), i as f32);
                Batch::dense(input, target).unwrap()
            })
            .collect();
        VecBatchSource::new(batches)
    }

    fn prediction_values(prediction: Prediction<InnerBackend>) -> Vec<f32> {
        prediction.flatten().into_data().to_vec::<f32>().unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        epochs: usize,
        steps: usize,
        divergences: usize,
        validations: Vec<ValidationReport>,
        checkpoints: usize,
    }

    impl TrainingObserver for Recorder {
        fn on_epoch_start(&mut self, _epoch: usize, _slope: f64) {
            self.epochs += 1;
        }

        fn on_step(&mut self, _epoch: usize, _step: usize, _loss: f64) {
            self.steps += 1;
        }

        fn on_validation(&mut self, report: &ValidationReport) {
            self.validations.push(report.clone());
        }

        fn on_divergence(&mut self, _epoch: usize, _step: usize, _loss: f64, _policy: DivergencePolicy) {
            self.divergences += 1;
        }

        fn on_checkpoint(&mut self, _epoch: usize, _path: &Path) {
            self.checkpoints += 1;
        }
    }

    #[test]
    fn test_train_before_initialize_is_configuration_error() {
        let mut trainer = Trainer::<Backend>::new(regression_config(), TrainingConfig::new(), Default::default());
        assert!(matches!(
            trainer.train(&mut regression_source(), None),
            Err(HmlstmError::Configuration(_))
        ));
        assert!(trainer.predict(&regression_source().batches()[0]).is_err());
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut trainer = Trainer::<Backend>::new(
            regression_config(),
            TrainingConfig::new().with_epochs(15),
            Default::default(),
        );
        trainer.initialize(Init::Fresh).unwrap();

        let report = trainer.train(&mut regression_source(), None).unwrap();
        let first = report.epoch_losses[0];
        let last = *report.epoch_losses.last().unwrap();
        assert!(report.epoch_losses.iter().all(|l| l.is_finite()));
        assert!(last < first, "loss went from {first} to {last}");
        assert_eq!(trainer.phase(), TrainerPhase::Ready);
    }

    #[test]
    fn test_same_initialization_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.mpk");

        let mut seed = Trainer::<Backend>::new(regression_config(), TrainingConfig::new(), Default::default());
        seed.initialize(Init::Fresh).unwrap();
        seed.save(&path).unwrap();

        let run = || {
            let mut trainer = Trainer::<Backend>::new(
                regression_config(),
                TrainingConfig::new().with_epochs(2),
                Default::default(),
            );
            trainer.initialize(Init::Resume(path.clone())).unwrap();
            trainer.train(&mut regression_source(), None).unwrap()
        };

        assert_eq!(run().epoch_losses, run().epoch_losses);
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.mpk");
        let batch = regression_source().batches()[1].clone();

        let mut trainer = Trainer::<Backend>::new(
            regression_config().with_slope(2.0),
            TrainingConfig::new().with_epochs(1),
            Default::default(),
        );
        trainer.initialize(Init::Fresh).unwrap();
        trainer.train(&mut regression_source(), None).unwrap();
        trainer.save(&path).unwrap();
        assert_eq!(trainer.phase(), TrainerPhase::Saved);

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "one checkpoint file, no temporary files");

        let device = Default::default();
        let (config, restored) = CheckpointStore::new().load::<InnerBackend>(&path, &device).unwrap();
        assert_eq!(config.slope, 2.0);
        assert_eq!(restored.slope(), 2.0);

        let expected = prediction_values(trainer.predict(&batch).unwrap());
        let actual = prediction_values(restored.predict(&batch, &device).unwrap());
        assert_eq!(expected, actual);
        assert_eq!(
            trainer.predict_boundaries(&batch).unwrap(),
            restored.predict_boundaries(&batch, &device).unwrap()
        );
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = Trainer::<Backend>::new(regression_config(), TrainingConfig::new(), Default::default());

        let result = trainer.initialize(Init::Resume(dir.path().join("absent.mpk")));
        assert!(matches!(result, Err(HmlstmError::Checkpoint { .. })));
        assert_eq!(trainer.phase(), TrainerPhase::Uninitialized);
    }

    #[test]
    fn test_divergence_abort() {
        let batch = Batch::dense(Array3::zeros((3, 1, 1)), array![[f32::NAN]]).unwrap();
        let mut source = VecBatchSource::new(vec![batch]);

        let mut trainer = Trainer::<Backend>::new(regression_config(), TrainingConfig::new(), Default::default());
        trainer.initialize(Init::Fresh).unwrap();

        assert!(matches!(
            trainer.train(&mut source, None),
            Err(HmlstmError::NumericalDivergence { epoch: 0, step: 0, .. })
        ));
    }

    #[test]
    fn test_divergence_continue_skips_update() {
        let bad = Batch::dense(Array3::zeros((3, 1, 1)), array![[f32::NAN]]).unwrap();
        let probe = Batch::dense(Array3::ones((3, 1, 1)), array![[0.0]]).unwrap();
        let mut source = VecBatchSource::new(vec![bad]);

        let mut trainer = Trainer::<Backend, _>::with_observer(
            regression_config(),
            TrainingConfig::new()
                .with_epochs(2)
                .with_divergence_policy(DivergencePolicy::Continue),
            Default::default(),
            Recorder::default(),
        );
        trainer.initialize(Init::Fresh).unwrap();
        let before = prediction_values(trainer.predict(&probe).unwrap());

        let report = trainer.train(&mut source, None).unwrap();
        assert_eq!(report.skipped_steps, 2);
        assert!(report.epoch_losses.iter().all(|l| l.is_nan()));
        assert_eq!(trainer.observer().divergences, 2);
        assert_eq!(trainer.observer().steps, 0);

        let after = prediction_values(trainer.predict(&probe).unwrap());
        assert_eq!(before, after);
    }

    #[test]
    fn test_skipped_steps_still_count_toward_validation_interval() {
        let bad = Batch::dense(Array3::zeros((5, 2, 1)), array![[f32::NAN], [f32::NAN]]).unwrap();
        let good = regression_source().batches()[0].clone();
        let mut train = VecBatchSource::new(vec![bad.clone(), good.clone(), bad, good]);
        let mut valid = regression_source();

        let mut trainer = Trainer::<Backend>::new(
            regression_config(),
            TrainingConfig::new()
                .with_epochs(1)
                .with_valid_interval(Some(2))
                .with_divergence_policy(DivergencePolicy::Continue),
            Default::default(),
        );
        trainer.initialize(Init::Fresh).unwrap();
        let report = trainer.train(&mut train, Some(&mut valid)).unwrap();

        assert_eq!(report.skipped_steps, 2);
        let steps: Vec<usize> = report.validations.iter().map(|v| v.step).collect();
        // after steps 2 and 4, then at epoch end
        assert_eq!(steps, vec![2, 4, 4]);
    }

    #[test]
    fn test_overwriting_checkpoint_with_larger_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.mpk");
        let batch = regression_source().batches()[0].clone();

        let mut small = Trainer::<Backend>::new(regression_config(), TrainingConfig::new(), Default::default());
        small.initialize(Init::Fresh).unwrap();
        small.save(&path).unwrap();

        let mut large_config = regression_config();
        large_config.hidden_sizes = HiddenSizes::PerLayer(vec![8, 8]);
        let mut large = Trainer::<Backend>::new(large_config, TrainingConfig::new(), Default::default());
        large.initialize(Init::Fresh).unwrap();
        large.save(&path).unwrap();

        let device = Default::default();
        let (config, restored) = CheckpointStore::new().load::<InnerBackend>(&path, &device).unwrap();
        assert_eq!(config.hidden_sizes, HiddenSizes::PerLayer(vec![8, 8]));
        assert_eq!(
            large.predict_boundaries(&batch).unwrap(),
            restored.predict_boundaries(&batch, &device).unwrap()
        );
    }

    #[test]
    fn test_validation_reports() {
        let mut valid = regression_source();
        let mut trainer = Trainer::<Backend, _>::with_observer(
            regression_config(),
            TrainingConfig::new().with_epochs(1).with_valid_interval(Some(2)),
            Default::default(),
            Recorder::default(),
        );
        trainer.initialize(Init::Fresh).unwrap();

        let report = trainer.train(&mut regression_source(), Some(&mut valid)).unwrap();

        // after step 2 and at epoch end
        assert_eq!(report.validations.len(), 2);
        assert_eq!(trainer.observer().validations.len(), 2);
        let last = report.last_validation().unwrap();
        assert_eq!(last.batches, 3);
        assert!(last.loss.is_finite());
        assert_eq!(last.accuracy, None);
    }

    #[test]
    fn test_answer_scoring_accuracy() {
        let config = NetworkConfig::new(4, 2, HiddenSizes::Uniform(4), 3, TaskKind::AnswerScoring)
            .with_embed_size(4)
            .with_out_hidden_size(4)
            .with_vocab_size(Some(10));
        let batch = Batch::answer_scoring(
            array![[1, 2], [3, 4], [5, 6]],
            array![[7, 8, 9], [9, 8, 7]],
            &[8, 9],
        )
        .unwrap();
        let mut train = VecBatchSource::new(vec![batch.clone()]);
        let mut valid = VecBatchSource::new(vec![batch]);

        let mut trainer = Trainer::<Backend>::new(config, TrainingConfig::new().with_epochs(2), Default::default());
        trainer.initialize(Init::Fresh).unwrap();
        let report = trainer.train(&mut train, Some(&mut valid)).unwrap();

        let accuracy = report.last_validation().unwrap().accuracy.unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
    }

    #[test]
    fn test_interval_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interval.mpk");

        let mut trainer = Trainer::<Backend, _>::with_observer(
            regression_config(),
            TrainingConfig::new()
                .with_epochs(4)
                .with_checkpoint_interval(Some(2))
                .with_checkpoint_path(Some(path.clone())),
            Default::default(),
            Recorder::default(),
        );
        trainer.initialize(Init::Fresh).unwrap();
        trainer.train(&mut regression_source(), None).unwrap();

        assert_eq!(trainer.observer().checkpoints, 2);
        assert_eq!(trainer.observer().epochs, 4);
        assert!(path.is_file());
        let (config, _) = CheckpointStore::new()
            .load::<InnerBackend>(&path, &Default::default())
            .unwrap();
        assert_eq!(config.hidden_sizes, HiddenSizes::PerLayer(vec![4, 4]));
        // interval checkpoints do not count as an explicit save
        assert_eq!(trainer.phase(), TrainerPhase::Ready);
    }

    #[test]
    fn test_sinusoid_training_smoke() {
        let mut train = SinusoidConfig::new()
            .with_num_signals(4)
            .with_signal_length(12)
            .with_batch_size(2)
            .init()
            .unwrap();
        let mut valid = train.split_off(1);

        let mut trainer = Trainer::<Backend>::new(
            regression_config(),
            TrainingConfig::new()
                .with_epochs(2)
                .with_slope_annealing_rate(Some(0.5)),
            Default::default(),
        );
        trainer.initialize(Init::Fresh).unwrap();
        let report = trainer.train(&mut train, Some(&mut valid)).unwrap();

        assert_eq!(report.steps, 2);
        assert_eq!(report.final_slope, 1.5);
        assert_eq!(report.validations.len(), 2);

        let batch = valid.batches()[0].clone();
        let trace = trainer.predict_boundaries(&batch).unwrap();
        assert_eq!(trace.as_array().dim(), (2, 2, 9));
        assert!(trace.is_binary());
    }
}
