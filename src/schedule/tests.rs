use super::*;
use crate::config::target::JitTarget;
use crate::context::Context;
use crate::ir::transform::{default_pipeline, Pass};
use crate::ir::GraphBuilder;

fn optimize(src: &str) -> IRModule {
    let ast = crate::syntax::parse(src).unwrap();
    let module = GraphBuilder::new(&Context::new()).build(&ast).unwrap();
    default_pipeline().run(module).unwrap()
}

const TWO_ADD: &str = "\
def two_add(a: Tensor((2, 3), 'float32'), b: Tensor((2, 3), 'float32')):
    out = a + b
    out = out + a
    return out
";

#[test]
fn test_cpu_is_untouched() {
    let target = Target::resolve(JitTarget::Cpu, &DeviceModel::default());
    let module = apply_default_schedule(optimize(TWO_ADD), &target, None).unwrap();
    assert!(module.prim_funcs.iter().all(|p| p.schedule.is_none()));
}

#[test]
fn test_cuda_fallback() {
    let target = Target::resolve(JitTarget::Cuda, &DeviceModel::default());
    let module = apply_default_schedule(optimize(TWO_ADD), &target, None).unwrap();
    let schedule = module.prim_funcs[0].schedule.unwrap();
    assert_eq!(schedule.kind, ScheduleKind::Fallback);
    assert_eq!(schedule.threads_per_block, 32);
    assert_eq!(schedule.blocks, 1);
    assert!(module.to_string().contains("T.launch_thread(\"threadIdx.x\", 32)"));
}

#[test]
fn test_fallback_threads() {
    let model = DeviceModel::default();
    assert_eq!(fallback_threads(&model, 1), 32);
    assert_eq!(fallback_threads(&model, 33), 64);
    assert_eq!(fallback_threads(&model, 1 << 20), 1024);
}

#[test]
fn test_manual_schedule_is_kept() {
    let target = Target::resolve(JitTarget::Cuda, &DeviceModel::default());
    let mut module = optimize(TWO_ADD);
    module.set_schedule("fused_add_add", 2).unwrap();
    let module = apply_default_schedule(module, &target, None).unwrap();
    let schedule = module.prim_funcs[0].schedule.unwrap();
    assert_eq!(schedule.kind, ScheduleKind::Manual);
    assert_eq!(schedule.threads_per_block, 2);
    assert_eq!(schedule.blocks, 3);
}

#[test]
fn test_manual_schedule_over_device_limit() {
    let target = Target::resolve(JitTarget::Cuda, &DeviceModel::default());
    let mut module = optimize(TWO_ADD);
    module.set_schedule("fused_add_add", 2048).unwrap();
    assert!(apply_default_schedule(module, &target, None).is_err());
    assert!(optimize(TWO_ADD).set_schedule("missing", 32).is_err());
}

#[test]
fn test_output_beyond_launch_range_is_rejected() {
    let src = "def f(a: Tensor((131072, 65536), 'float32')):\n    return a + a\n";
    let target = Target::resolve(JitTarget::Cuda, &DeviceModel::default());
    match apply_default_schedule(optimize(src), &target, None) {
        Err(JitError::BackendCompilationFailure { stage, message }) => {
            assert_eq!(stage, "schedule");
            assert!(message.contains("8589934592 elements"), "{}", message);
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
    assert!(optimize(src).set_schedule("add", 1024).is_err());
}

#[test]
fn test_tuned_schedule_from_database() {
    let model = DeviceModel::a100();
    let target = Target::resolve(JitTarget::Cuda, &model);
    let module = optimize(TWO_ADD);
    let mut db = TuningDatabase::new();
    db.commit(TuningRecord {
        signature: module.prim_funcs[0].signature(),
        device: model.name.clone(),
        threads_per_block: 64,
        measured_ns: 1000,
    });
    let scheduled = apply_default_schedule(module.clone(), &target, Some(&db)).unwrap();
    let schedule = scheduled.prim_funcs[0].schedule.unwrap();
    assert_eq!(schedule.kind, ScheduleKind::Tuned);
    assert_eq!(schedule.threads_per_block, 64);

    // records for another device model do not apply
    let other = Target::resolve(JitTarget::Cuda, &DeviceModel::tesla_t4());
    let scheduled = apply_default_schedule(module, &other, Some(&db)).unwrap();
    assert_eq!(scheduled.prim_funcs[0].schedule.unwrap().kind, ScheduleKind::Fallback);
}

#[test]
fn test_commit_keeps_fastest() {
    let record = |threads, ns| TuningRecord {
        signature: "float32(4,)->float32(4,)#00".to_string(),
        device: "nvidia/a100".to_string(),
        threads_per_block: threads,
        measured_ns: ns,
    };
    let mut db = TuningDatabase::new();
    db.commit(record(32, 500));
    db.commit(record(64, 900));
    db.commit(record(128, 200));
    assert_eq!(db.len(), 1);
    assert_eq!(db.lookup("float32(4,)->float32(4,)#00", "nvidia/a100").unwrap().threads_per_block, 128);
}

#[test]
fn test_database_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache").join("tuning.rkyv");
    assert!(TuningDatabase::open(&path).unwrap().is_empty());

    let module = optimize(TWO_ADD);
    let model = DeviceModel::default();
    let mut db = TuningDatabase::new();
    let tuned = tune_module(&module, &model, &mut db, 1).unwrap();
    assert_eq!(tuned.len(), 1);
    assert_eq!(tuned[0].threads_per_block % model.warp_size, 0);
    db.save(&path).unwrap();

    let loaded = TuningDatabase::open(&path).unwrap();
    assert_eq!(loaded, db);

    std::fs::write(&path, b"not an archive").unwrap();
    assert!(TuningDatabase::load(&path).is_err());
}

#[test]
fn test_candidate_block_sizes() {
    let sizes = tuning::candidate_block_sizes(&DeviceModel::default());
    assert_eq!(sizes, vec![32, 64, 128, 256, 512, 1024]);
}
