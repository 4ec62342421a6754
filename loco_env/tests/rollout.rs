use loco_env::{EPISODE_INFO, EpisodeMonitor, LocoEnv, TERMINAL_OBSERVATION, VecEnv};
use rand::{SeedableRng, rngs::StdRng};
use sim::mock;

#[test]
fn random_rollout_feeds_the_monitor() {
    let mut envs = VecEnv::new(3, |_| LocoEnv::new(mock::abi())).unwrap();
    let mut monitor = EpisodeMonitor::new(envs.num_envs());
    let mut rng = StdRng::seed_from_u64(42);

    let observations = envs.reset_all().unwrap();
    for obs in &observations {
        assert!(envs.observation_space().contains(obs));
    }

    let mut finished = 0;
    for _ in 0..(mock::MAX_EPISODE_STEPS as usize + 1) {
        let actions: Vec<Vec<f32>> = (0..envs.num_envs())
            .map(|_| envs.action_space().sample(&mut rng))
            .collect();

        let mut outputs = envs.step_all(&actions).unwrap();
        monitor.record(&mut outputs);

        for out in outputs {
            let out = out.unwrap();
            assert_eq!(out.observation.len(), mock::STATE_SIZE);
            if out.done {
                finished += 1;
                assert!(out.info.contains_key(TERMINAL_OBSERVATION));
                assert!(out.info.contains_key(EPISODE_INFO));
            }
        }
    }

    // Every worker hits the step limit at the latest.
    assert!(finished >= envs.num_envs());
    assert_eq!(monitor.episode_count(), finished as u64);
    assert!(monitor.mean_reward().is_some());
}
