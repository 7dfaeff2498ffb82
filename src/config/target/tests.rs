use super::*;

#[test]
fn test_target_tokens() {
    assert_eq!(JitTarget::parse("cpu").unwrap(), JitTarget::Cpu);
    assert_eq!(JitTarget::parse("cuda").unwrap(), JitTarget::Cuda);
    for bad in ["gpu", "CPU", "", "cuda:0"] {
        match JitTarget::parse(bad) {
            Err(JitError::InvalidTarget { token }) => assert_eq!(token, bad),
            other => panic!("{:?}: unexpected {:?}", bad, other),
        }
    }
}

#[test]
fn test_default_device_model() {
    let model = DeviceModel::default();
    assert_eq!(model.name, "nvidia/geforce-rtx-3060");
    assert_eq!(model.arch, "sm_86");
    assert_eq!(model.max_threads_per_block, 1024);
    assert_eq!(model.warp_size, 32);
}

#[test]
fn test_resolve_builtins() {
    for name in DeviceModel::BUILTIN {
        assert_eq!(DeviceModel::resolve(name).unwrap().name, name);
    }
    assert_eq!(DeviceModel::resolve("nvidia/a100").unwrap().arch, "sm_80");
}

#[test]
fn test_resolve_rejects_path_traversal() {
    assert!(DeviceModel::resolve("../etc/passwd").is_err());
    assert!(DeviceModel::resolve("./sneaky").is_err());
    assert!(DeviceModel::resolve("/abs/path").is_err());
    assert!(DeviceModel::resolve(".hidden").is_err());
    assert!(DeviceModel::resolve("nvidia\\a100").is_err());
}

#[test]
fn test_resolve_unknown_lists_builtins() {
    let err = DeviceModel::resolve("acme/unknown-9000").unwrap_err();
    assert!(matches!(err, JitError::InvalidDeviceModel { .. }));
    assert!(err.to_string().contains("nvidia/a100"));
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orin.toml");
    std::fs::write(
        &path,
        r#"
# Jetson-class module
[device]
name = "nvidia/jetson-orin"
display_name = "NVIDIA Jetson AGX Orin"
arch = "sm_87"

[limits]
max_threads_per_block = 1024
warp_size = 32
max_shared_memory_per_block = 49_152
multiprocessors = 16
"#,
    )
    .unwrap();
    let model = DeviceModel::load(&path).unwrap();
    assert_eq!(model.name, "nvidia/jetson-orin");
    assert_eq!(model.arch, "sm_87");
    assert_eq!(model.max_shared_memory_per_block, 49152);
    assert_eq!(model.multiprocessors, 16);
}

#[test]
fn test_load_validates_limits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        "[device]\nname = \"x\"\narch = \"sm_80\"\n[limits]\nmax_threads_per_block = 100\nwarp_size = 32\n",
    )
    .unwrap();
    let err = DeviceModel::load(&path).unwrap_err();
    assert!(err.to_string().contains("multiple of limits.warp_size"), "{}", err);

    std::fs::write(&path, "[device]\nname = \"x\"\narch = \"gfx90a\"\n").unwrap();
    assert!(DeviceModel::load(&path).is_err());

    assert!(matches!(
        DeviceModel::load(&dir.path().join("missing.toml")),
        Err(JitError::Io { .. })
    ));
}

#[test]
fn test_target_resolution() {
    let model = DeviceModel::a100();
    let cpu = Target::resolve(JitTarget::Cpu, &model);
    assert_eq!(cpu.target_string, "llvm");
    assert_eq!(cpu.device, Device::cpu(0));
    assert!(cpu.model.is_none());

    let cuda = Target::resolve(JitTarget::Cuda, &model);
    assert_eq!(cuda.target_string, "cuda -arch=sm_80");
    assert_eq!(cuda.device, Device::cuda(0));
    assert!(cuda.is_accelerator());
    assert_eq!(cuda.to_string(), "cuda -arch=sm_80 (NVIDIA A100, cuda(0))");
}
