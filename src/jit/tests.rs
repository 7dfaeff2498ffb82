use super::*;
use crate::tensor::{DType, Device};

fn quiet() -> JitOptions {
    JitOptions::default().with_console(Console::capture())
}

const ADD: &str = "\
@jit(\"cpu\")
def add(a: Tensor(shape=(2, 3), dtype=\"float32\"), b: Tensor(shape=(2, 3), dtype=\"float32\")) -> Tensor:
    out = a + b
    out = out + a
    return out
";

fn bound(device: Device) -> Tensor {
    let desc = TensorDescriptor::new(vec![2, 3], DType::Float32);
    Tensor::from_array(NDArray::ones(&desc, device))
}

#[test]
fn test_invalid_token_fails_at_decoration() {
    for token in ["gpu", "metal", ""] {
        assert!(matches!(jit(token), Err(JitError::InvalidTarget { .. })));
    }
    assert_eq!(jit("cuda").unwrap().target(), JitTarget::Cuda);
}

#[test]
fn test_call_inline_source() {
    let f = jit("cpu")
        .unwrap()
        .with_options(quiet())
        .wrap(FunctionSource::Inline(ADD.to_string()), Context::new());
    let a = bound(Device::cpu(0));
    let out = f.call(&[&a, &a]).unwrap().into_tensor().unwrap();
    assert_eq!(out.to_f64_vec(), vec![3.0; 6]);
    assert_eq!(f.cached_artifacts(), 0);
}

#[test]
fn test_dumps_go_to_console() {
    let console = Console::capture();
    let f = jit("cpu")
        .unwrap()
        .with_options(JitOptions::default().with_console(console.clone()))
        .wrap(FunctionSource::Inline(ADD.to_string()), Context::new());
    let a = bound(Device::cpu(0));
    f.call(&[&a, &a]).unwrap();
    let dumps = console.diagnostic_output();
    assert!(dumps.contains("FunctionDef(") && dumps.contains("name='add'"), "{}", dumps);
    assert!(dumps.contains("@I.ir_module"));
    assert!(console.program_output().is_empty());

    let silent = Console::capture();
    let g = jit("cpu")
        .unwrap()
        .with_options(JitOptions::default().with_console(silent.clone()).with_dump(false))
        .wrap(FunctionSource::Inline(ADD.to_string()), Context::new());
    g.call(&[&a, &a]).unwrap();
    assert!(silent.diagnostic_output().is_empty());
}

#[test]
fn test_file_source_is_reread_on_every_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernels.py");
    let host = |body: &str| {
        format!(
            "import tcl\n\n@tcl.jit(\"cpu\")\ndef f(a: tcl.Tensor((2, 3), \"float32\")):\n    {}\n\nprint('host code')\n",
            body
        )
    };
    std::fs::write(&path, host("return a + a")).unwrap();
    let f = jit("cpu")
        .unwrap()
        .with_options(quiet())
        .wrap(FunctionSource::file(&path, "f"), Context::new());
    let a = bound(Device::cpu(0));
    let first = f.call(&[&a]).unwrap().into_tensor().unwrap();
    assert_eq!(first.to_f64_vec(), vec![2.0; 6]);

    std::fs::write(&path, host("return a * a + a")).unwrap();
    let second = f.call(&[&a]).unwrap().into_tensor().unwrap();
    assert_eq!(second.to_f64_vec(), vec![2.0; 6]);

    std::fs::write(&path, host("return a + a + a")).unwrap();
    let third = f.call(&[&a]).unwrap().into_tensor().unwrap();
    assert_eq!(third.to_f64_vec(), vec![3.0; 6]);
}

#[test]
fn test_cache_reuses_artifacts_only_when_enabled() {
    let console = Console::capture();
    let f = jit("cuda")
        .unwrap()
        .with_options(JitOptions::default().with_console(console.clone()).with_cache(true))
        .wrap(FunctionSource::Inline(ADD.to_string()), Context::new());
    let a = bound(Device::cuda(0));
    f.call(&[&a, &a]).unwrap();
    f.call(&[&a, &a]).unwrap();
    assert_eq!(f.cached_artifacts(), 1);
    assert_eq!(console.diagnostic_output().matches("@I.ir_module").count(), 1);
}

#[test]
fn test_cache_key_covers_whole_device_model() {
    let desc = TensorDescriptor::new(vec![2, 3], DType::Float32);
    let model = DeviceModel::default();
    let key = cache::artifact_key(ADD, JitTarget::Cuda, &model, &[&desc, &desc]);
    assert_eq!(key, cache::artifact_key(ADD, JitTarget::Cuda, &model.clone(), &[&desc, &desc]));

    let mut narrower = model.clone();
    narrower.max_threads_per_block = 256;
    assert_ne!(key, cache::artifact_key(ADD, JitTarget::Cuda, &narrower, &[&desc, &desc]));

    let mut other_arch = model.clone();
    other_arch.arch = "sm_90".to_string();
    assert_ne!(key, cache::artifact_key(ADD, JitTarget::Cuda, &other_arch, &[&desc, &desc]));
}

#[test]
fn test_prepare_then_invoke() {
    let f = jit("cuda")
        .unwrap()
        .with_options(quiet().with_device_model(DeviceModel::a100()))
        .wrap(FunctionSource::Inline(ADD.to_string()), Context::new());
    let artifact = f.prepare().unwrap();
    assert_eq!(artifact.executable.target.target_string, "cuda -arch=sm_80");
    assert!(artifact.module.prim_funcs.iter().all(|p| p.schedule.is_some()));
    let a = bound(Device::cuda(0));
    for _ in 0..2 {
        let out = f.invoke(&artifact, &[&a, &a]).unwrap().into_tensor().unwrap();
        assert_eq!(out.device(), Device::cuda(0));
        assert_eq!(out.to_f64_vec(), vec![3.0; 6]);
    }
}

#[test]
fn test_unbound_tensor_is_binding_mismatch() {
    let f = jit("cpu")
        .unwrap()
        .with_options(quiet())
        .wrap(FunctionSource::Inline(ADD.to_string()), Context::new());
    let empty = Tensor::new(TensorDescriptor::new(vec![2, 3], DType::Float32));
    let a = bound(Device::cpu(0));
    assert!(matches!(f.call(&[&a, &empty]), Err(JitError::BindingMismatch { .. })));
}

#[test]
fn test_signature() {
    let f = jit("cpu").unwrap().wrap(FunctionSource::Inline(ADD.to_string()), Context::new());
    let sig = f.signature().unwrap();
    let names: Vec<&str> = sig.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(sig[0].1, TensorDescriptor::new(vec![2, 3], DType::Float32));
}

#[test]
fn test_missing_function_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k.py");
    std::fs::write(&path, "x = 1\n").unwrap();
    let f = jit("cpu").unwrap().wrap(FunctionSource::file(&path, "nope"), Context::new());
    assert!(matches!(f.prepare(), Err(JitError::UnboundName { .. })));
    let missing = jit("cpu")
        .unwrap()
        .wrap(FunctionSource::file(dir.path().join("gone.py"), "f"), Context::new());
    assert!(matches!(missing.prepare(), Err(JitError::Io { .. })));
}
