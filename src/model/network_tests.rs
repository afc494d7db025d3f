use super::*;
use crate::config::ModelConfig;
use crate::demonstration::ActionLabel;
use crate::encoding::FeatureMode;

const VOCABULARY: usize = 27;

fn spec(mode: FeatureMode) -> ModelSpec {
    ModelSpec::new(mode, VOCABULARY, &ModelConfig::default())
}

fn initialized(mode: FeatureMode) -> FeedForwardNetwork {
    let mut net = FeedForwardNetwork::new();
    net.initialize(&spec(mode)).unwrap();
    net
}

/// Two-note toy problem: note 5 → FORWARD, note 9 → STOP
fn note_only_data() -> (Vec<FeatureVector>, Vec<[f32; ACTION_COUNT]>) {
    let mut inputs = Vec::new();
    let mut targets = Vec::new();
    for _ in 0..10 {
        inputs.push(vec![5.0]);
        targets.push(ActionLabel::Forward.one_hot());
        inputs.push(vec![9.0]);
        targets.push(ActionLabel::Stop.one_hot());
    }
    (inputs, targets)
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[test]
fn test_new_network_is_uninitialized() {
    let net = FeedForwardNetwork::new();
    assert_eq!(net.state(), ClassifierState::Uninitialized);
    assert_eq!(net.forward(&[1.0]), Err(ModelError::ModelNotInitialized));
    assert_eq!(net.snapshot_parameters(), Err(ModelError::ModelNotInitialized));
}

#[test]
fn test_initialize_builds_expected_shapes() {
    for mode in [FeatureMode::NoteOnly, FeatureMode::CaptorsAndNote] {
        let net = initialized(mode);
        assert_eq!(net.state(), ClassifierState::Initialized(mode));

        let layers = net.snapshot_parameters().unwrap();
        let expected = spec(mode).architecture.parameter_shapes();
        assert_eq!(layers.len(), expected.len());
        for (layer, (name, weight_shape, bias_shape)) in layers.iter().zip(expected) {
            assert_eq!(layer.layer, name);
            assert_eq!(layer.weight_shape(), weight_shape.as_slice());
            assert_eq!(layer.bias_shape().map(|s| s.to_vec()), bias_shape);
        }
    }
}

#[test]
fn test_forward_produces_distribution_and_activations() {
    let net = initialized(FeatureMode::CaptorsAndNote);
    let pass = net
        .forward(&[0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 14.0])
        .unwrap();

    assert_eq!(pass.probabilities.len(), ACTION_COUNT);
    assert!(pass.probabilities.iter().all(|p| *p >= 0.0));
    let sum: f32 = pass.probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-3, "sum = {}", sum);

    let names: Vec<_> = pass.activations.iter().map(|a| a.layer.as_str()).collect();
    assert_eq!(
        names,
        vec![EMBEDDING_LAYER, FLATTEN_LAYER, HIDDEN_LAYER, OUTPUT_LAYER]
    );
    assert_eq!(pass.activations[0].shape, vec![10, 4]);
    assert_eq!(pass.activations[1].values.len(), 40);
    assert!(pass.activations[2].values.iter().all(|h| *h >= 0.0));
    assert_eq!(pass.activations[3].values, pass.probabilities);
}

#[test]
fn test_forward_rejects_wrong_length() {
    let net = initialized(FeatureMode::NoteOnly);
    assert_eq!(
        net.forward(&[1.0, 2.0]),
        Err(ModelError::FeatureShapeMismatch {
            expected: 1,
            actual: 2
        })
    );
}

#[test]
fn test_forward_rejects_values_outside_vocabulary() {
    let net = initialized(FeatureMode::NoteOnly);
    for bad in [27.0, -1.0, 2.5, f32::NAN, f32::INFINITY] {
        match net.forward(&[bad]) {
            Err(ModelError::FeatureOutOfVocabulary {
                position,
                vocabulary,
                ..
            }) => {
                assert_eq!(position, 0);
                assert_eq!(vocabulary, VOCABULARY);
            }
            other => panic!("expected FeatureOutOfVocabulary for {}, got {:?}", bad, other),
        }
    }
    assert!(net.forward(&[26.0]).is_ok());
}

#[test]
fn test_fit_lowers_loss_and_separates_classes() {
    let mut net = initialized(FeatureMode::NoteOnly);
    let (inputs, targets) = note_only_data();

    let first = net.fit(&inputs, &targets).unwrap();
    let mut last = first;
    for _ in 1..50 {
        last = net.fit(&inputs, &targets).unwrap();
    }

    assert!(last < first, "loss {} did not drop below {}", last, first);
    assert_eq!(net.epochs_completed(), 50);
    assert_eq!(net.state(), ClassifierState::Trained(FeatureMode::NoteOnly));

    let forward = net.forward(&[5.0]).unwrap();
    let stop = net.forward(&[9.0]).unwrap();
    assert_eq!(argmax(&forward.probabilities), ActionLabel::Forward.index());
    assert_eq!(argmax(&stop.probabilities), ActionLabel::Stop.index());
}

#[test]
fn test_same_seed_gives_same_parameters() {
    let (inputs, targets) = note_only_data();
    let mut a = initialized(FeatureMode::NoteOnly);
    let mut b = initialized(FeatureMode::NoteOnly);
    for _ in 0..5 {
        a.fit(&inputs, &targets).unwrap();
        b.fit(&inputs, &targets).unwrap();
    }
    assert_eq!(a.snapshot_parameters(), b.snapshot_parameters());
}

#[test]
fn test_snapshot_does_not_alias_live_parameters() {
    let (inputs, targets) = note_only_data();
    let mut net = initialized(FeatureMode::NoteOnly);
    net.fit(&inputs, &targets).unwrap();

    let snapshot = net.snapshot_parameters().unwrap();
    let frozen = snapshot.clone();
    for _ in 0..5 {
        net.fit(&inputs, &targets).unwrap();
    }

    assert_eq!(snapshot, frozen);
    assert_ne!(net.snapshot_parameters().unwrap(), snapshot);
}

#[test]
fn test_fit_validates_inputs() {
    let mut net = initialized(FeatureMode::NoteOnly);
    assert_eq!(net.fit(&[], &[]), Err(ModelError::InsufficientData));
    assert!(matches!(
        net.fit(&[vec![1.0, 2.0]], &[ActionLabel::Left.one_hot()]),
        Err(ModelError::FeatureShapeMismatch { .. })
    ));
    assert_eq!(net.state(), ClassifierState::Initialized(FeatureMode::NoteOnly));
}

#[test]
fn test_non_finite_loss_fails_the_epoch() {
    let mut net = initialized(FeatureMode::NoteOnly);
    if let Some(live) = net.live.as_mut() {
        live.output.bias.data_mut()[0] = f32::NAN;
    }
    let (inputs, targets) = note_only_data();

    match net.fit(&inputs, &targets) {
        Err(ModelError::NumericDivergence { epoch, .. }) => assert_eq!(epoch, 1),
        other => panic!("expected NumericDivergence, got {:?}", other),
    }
}

#[test]
fn test_dispose_releases_model() {
    let mut net = initialized(FeatureMode::CaptorsAndNote);
    net.dispose();

    assert_eq!(net.state(), ClassifierState::Disposed);
    assert_eq!(net.forward(&[0.0; 10]), Err(ModelError::ModelNotInitialized));
    assert_eq!(
        net.fit(&[vec![0.0; 10]], &[ActionLabel::Stop.one_hot()]),
        Err(ModelError::ModelNotInitialized)
    );
    assert!(net.snapshot_parameters().is_err());
}

#[test]
fn test_reinitialize_resets_epochs_and_mode() {
    let (inputs, targets) = note_only_data();
    let mut net = initialized(FeatureMode::NoteOnly);
    net.fit(&inputs, &targets).unwrap();

    net.initialize(&spec(FeatureMode::CaptorsAndNote)).unwrap();
    assert_eq!(net.epochs_completed(), 0);
    assert_eq!(
        net.state(),
        ClassifierState::Initialized(FeatureMode::CaptorsAndNote)
    );
    assert!(net.forward(&[5.0]).is_err());
}

#[test]
fn test_softmax_is_stable_for_large_logits() {
    let probs = softmax(&[1000.0, 1000.0, -1000.0]);
    assert!((probs[0] - 0.5).abs() < 1e-6);
    assert!(probs[2] >= 0.0);
}

#[test]
fn test_hidden_layer_starts_with_positive_bias() {
    let net = initialized(FeatureMode::CaptorsAndNote);
    let layers = net.snapshot_parameters().unwrap();
    let hidden = layers.iter().find(|l| l.layer == HIDDEN_LAYER).unwrap();
    let bias = hidden.bias.as_ref().unwrap();
    assert!(bias.data().iter().all(|b| *b > 0.0));

    let output = layers.iter().find(|l| l.layer == OUTPUT_LAYER).unwrap();
    assert!(output.bias.as_ref().unwrap().data().iter().all(|b| *b == 0.0));
}

#[test]
fn test_fresh_hidden_units_are_mostly_active() {
    for mode in [FeatureMode::NoteOnly, FeatureMode::CaptorsAndNote] {
        for seed in 0..100 {
            let mut net = FeedForwardNetwork::new();
            net.initialize(&ModelSpec::new(
                mode,
                VOCABULARY,
                &ModelConfig {
                    seed,
                    ..ModelConfig::default()
                },
            ))
            .unwrap();

            for note in [5.0, 9.0] {
                let mut input = vec![0.0; mode.feature_len() - 1];
                input.push(note);
                let pass = net.forward(&input).unwrap();
                let hidden = &pass.activations[2].values;
                let active = hidden.iter().filter(|h| **h > 0.0).count();
                assert!(
                    active * 2 >= hidden.len(),
                    "seed {} {:?}: only {} of {} units active",
                    seed,
                    mode,
                    active,
                    hidden.len()
                );
            }
        }
    }
}
