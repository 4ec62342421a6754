use ndarray::Array2;
use policy::{Activation, Extractor, FeatureExtractor, PolicyArch, PolicyParameters};

#[test]
fn locomotion_policy_maps_observations_to_actions() {
    let arch = PolicyArch::locomotion(37, 6);
    let params = PolicyParameters::init(&arch, 7).unwrap();
    let extractor = Extractor::new(arch, &params).unwrap();

    let obs: Vec<f32> = (0..37).map(|i| (i as f32 * 0.1).sin()).collect();
    let action = extractor.forward(&obs).unwrap();

    assert_eq!(action.len(), 6);
    assert!(action.iter().all(|a| a.is_finite()));
    assert_eq!(action, extractor.forward(&obs).unwrap());
}

#[test]
fn shared_trunk_takes_part_in_acting() {
    let arch = PolicyArch::ActorCritic {
        obs_dim: 5,
        act_dim: 2,
        features: FeatureExtractor::Flatten,
        shared: vec![16],
        pi: vec![8, 8],
        activation: Activation::Tanh,
    };
    let mut params = PolicyParameters::init(&arch, 1).unwrap();
    let extractor = Extractor::new(arch.clone(), &params).unwrap();
    let obs = [0.3, -0.2, 1.0, 0.0, 0.5];
    let before = extractor.forward(&obs).unwrap();

    for v in params.tensors_mut()[0].data_mut() {
        *v = 0.0;
    }
    let zeroed = Extractor::new(arch, &params).unwrap();

    assert_ne!(before, zeroed.forward(&obs).unwrap());
}

#[test]
fn batch_and_single_agree() {
    let arch = PolicyArch::locomotion(4, 2);
    let params = PolicyParameters::init(&arch, 11).unwrap();
    let extractor = Extractor::new(arch, &params).unwrap();

    let batch = Array2::from_shape_fn((3, 4), |(i, j)| (i * 4 + j) as f32 / 10.0);
    let out = extractor.forward_batch(batch.view()).unwrap();

    for (row, expected) in batch.rows().into_iter().zip(out.rows()) {
        let single = extractor.forward(row.as_slice().unwrap()).unwrap();
        for (a, b) in single.iter().zip(expected) {
            assert!((a - b).abs() <= 1e-6);
        }
    }
}
