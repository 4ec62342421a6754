use std::fs;

use export::{GraphArtifact, TableArtifact, max_abs_diff};
use orchestrator::{
    ExportConfig, ExportOrchestrator, ExportOutcome, OrchestratorError, load_checkpoint, share,
};
use policy::{Extractor, PolicyArch, PolicyParameters, Tensor};

fn config(dir: &std::path::Path) -> ExportConfig {
    ExportConfig {
        check_freq: 2,
        trace_freq: 1,
        log_dir: dir.join("run"),
        ..Default::default()
    }
}

#[test]
fn improvement_exports_artifacts_matching_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let arch = PolicyArch::locomotion(10, 3);
    let params = share(PolicyParameters::init(&arch, 21).unwrap());
    let mut orch = ExportOrchestrator::new(config(dir.path()), arch.clone()).unwrap();

    assert_eq!(orch.on_step(Some(5.0), &params).unwrap(), ExportOutcome::Skipped);
    let outcome = orch.on_step(Some(5.0), &params).unwrap();
    assert!(matches!(outcome, ExportOutcome::Exported { counter: 1, .. }));

    // training moves on after the snapshot
    params.write().tensors_mut()[5].data_mut()[0] += 1.0;

    let run = dir.path().join("run");
    let (saved_arch, saved) = load_checkpoint(run.join("best_model.safetensors")).unwrap();
    assert_eq!(saved_arch, arch);
    assert_ne!(saved, *params.read());

    let extractor = Extractor::new(arch.clone(), &saved).unwrap();
    let graph = GraphArtifact::from_bytes(&fs::read(run.join("policy.graph")).unwrap()).unwrap();
    let table = TableArtifact::parse(&fs::read_to_string(run.join("network.h")).unwrap()).unwrap();

    let obs: Vec<f32> = (0..10).map(|i| i as f32 / 7.0 - 0.5).collect();
    let expected = extractor.forward(&obs).unwrap();
    assert!(max_abs_diff(&expected, &graph.evaluate(&obs).unwrap()) <= 1e-5);
    assert!(max_abs_diff(&expected, &table.evaluate(&arch, &obs).unwrap()) <= 1e-5);
}

#[test]
fn failed_export_keeps_previous_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let arch = PolicyArch::locomotion(4, 2);
    let good = PolicyParameters::init(&arch, 3).unwrap();
    let orch = ExportOrchestrator::new(config(dir.path()), arch.clone()).unwrap();

    orch.export_now(&good).unwrap();
    let table_path = dir.path().join("run").join("network.h");
    let before = fs::read_to_string(&table_path).unwrap();

    let mut tensors = good.tensors().to_vec();
    let last = tensors.pop().unwrap();
    let mut bias = last.data().to_vec();
    bias[0] = f32::NAN;
    tensors.push(Tensor::new(last.name(), last.shape().to_vec(), bias).unwrap());

    let result = orch.export_now(&PolicyParameters::new(tensors));
    assert!(matches!(result, Err(OrchestratorError::Export(_))));
    assert_eq!(fs::read_to_string(&table_path).unwrap(), before);
}

#[test]
fn mismatched_parameters_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let orch = ExportOrchestrator::new(config(dir.path()), PolicyArch::locomotion(4, 2)).unwrap();
    let other = PolicyParameters::init(&PolicyArch::locomotion(5, 2), 0).unwrap();

    assert!(orch.export_now(&other).is_err());
}
