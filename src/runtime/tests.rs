use std::sync::Arc;

use super::*;
use crate::config::target::{DeviceModel, JitTarget};
use crate::context::Context;
use crate::ir::transform::{default_pipeline, Pass};
use crate::ir::GraphBuilder;
use crate::schedule::apply_default_schedule;
use crate::tensor::{DType, Device, NDArray, Scalar};

fn compile(src: &str, kind: JitTarget) -> Executable {
    let ast = crate::syntax::parse(src).unwrap();
    let module = GraphBuilder::new(&Context::new()).build(&ast).unwrap();
    let module = default_pipeline().run(module).unwrap();
    let target = Target::resolve(kind, &DeviceModel::default());
    let module = apply_default_schedule(module, &target, None).unwrap();
    build(&module, &target).unwrap()
}

fn run(exec: Executable, args: &[NDArray]) -> (Object, String) {
    let console = Console::capture();
    let device = exec.target.device;
    let vm = VirtualMachine::new(Arc::new(exec), device)
        .unwrap()
        .with_console(console.clone());
    let out = vm.function("main").unwrap().call(args).unwrap();
    (out, console.program_output())
}

const TWO_ADD: &str = "\
def main(a: Tensor((2, 3), 'float32'), b: Tensor((2, 3), 'float32')):
    out = a + b
    out = out + a
    return out
";

#[test]
fn test_two_add_on_both_targets() {
    for (kind, device) in [(JitTarget::Cpu, Device::cpu(0)), (JitTarget::Cuda, Device::cuda(0))] {
        let exec = compile(TWO_ADD, kind);
        assert_eq!(exec.kernels.len(), 1);
        let desc = TensorDescriptor::new(vec![2, 3], DType::Float32);
        let ones = NDArray::ones(&desc, device);
        let (out, printed) = run(exec, &[ones.clone(), ones]);
        let out = out.into_tensor().unwrap();
        assert_eq!(out.device(), device);
        assert!(out.allclose(&NDArray::full(&desc, 3.0, device), 0.0));
        assert!(printed.is_empty());
    }
}

#[test]
fn test_cuda_kernel_source() {
    let exec = compile(TWO_ADD, JitTarget::Cuda);
    let source = exec.source();
    assert!(source.contains("__global__"), "{}", source);
    assert!(source.contains("fused_add_add_kernel"));
    assert!(compile(TWO_ADD, JitTarget::Cpu).source().contains("void fused_add_add("));
}

#[test]
fn test_print_and_sentinel() {
    let exec = compile("def main():\n    print('Hello, World!')\n", JitTarget::Cpu);
    assert!(exec.kernels.is_empty());
    let (out, printed) = run(exec, &[]);
    assert!(out.is_sentinel());
    assert_eq!(printed, "Hello, World!\n");
}

#[test]
fn test_print_tensor_with_literal() {
    let src = "\
def main(a: Tensor((3,), 'int32')):
    x = a * 2
    print('x =', x)
    return x
";
    let a = NDArray::from_vec(vec![3], vec![1i32, 2, 3], Device::cpu(0)).unwrap();
    let (out, printed) = run(compile(src, JitTarget::Cpu), &[a]);
    assert_eq!(printed, "x = [2 4 6]\n");
    assert_eq!(out.into_tensor().unwrap().as_slice::<i32>(), Some(&[2, 4, 6][..]));
}

#[test]
fn test_tuple_result() {
    let src = "\
def main(a: Tensor((2,), 'int64'), b: Tensor((2,), 'int64')):
    return (a + b, a * b)
";
    let a = NDArray::from_vec(vec![2], vec![2i64, 3], Device::cpu(0)).unwrap();
    let b = NDArray::from_vec(vec![2], vec![5i64, 7], Device::cpu(0)).unwrap();
    let (out, _) = run(compile(src, JitTarget::Cpu), &[a, b]);
    let fields = out.fields();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].as_tensor().unwrap().as_slice::<i64>(), Some(&[7, 10][..]));
    assert_eq!(fields[1].as_tensor().unwrap().as_slice::<i64>(), Some(&[10, 21][..]));
    assert_eq!(out.to_string(), "([ 7 10], [10 21])");
}

#[test]
fn test_constant_result() {
    let (out, _) = run(compile("def main():\n    return 7\n", JitTarget::Cpu), &[]);
    assert_eq!(out.as_tensor().unwrap().item(), Some(Scalar::I64(7)));
}

#[test]
fn test_call_validates_arguments() {
    let exec = Arc::new(compile(TWO_ADD, JitTarget::Cuda));
    let vm = VirtualMachine::new(exec.clone(), Device::cuda(0)).unwrap();
    let entry = vm.function("main").unwrap();
    let desc = TensorDescriptor::new(vec![2, 3], DType::Float32);
    let on_cuda = NDArray::ones(&desc, Device::cuda(0));

    let arity = entry.call(&[on_cuda.clone()]).unwrap_err();
    assert!(matches!(arity, JitError::BindingMismatch { .. }));

    let on_cpu = NDArray::ones(&desc, Device::cpu(0));
    let device = entry.call(&[on_cpu, on_cuda.clone()]).unwrap_err();
    assert!(device.to_string().contains("cpu(0)"), "{}", device);

    let wrong = NDArray::ones(&TensorDescriptor::new(vec![3, 2], DType::Float32), Device::cuda(0));
    assert!(matches!(
        entry.call(&[on_cuda, wrong]),
        Err(JitError::BindingMismatch { .. })
    ));

    assert!(matches!(vm.function("other"), Err(JitError::UnboundName { .. })));
    assert!(VirtualMachine::new(exec, Device::cpu(0)).is_err());
}

#[test]
fn test_build_rejects_unscheduled_cuda_module() {
    let ast = crate::syntax::parse(TWO_ADD).unwrap();
    let module = GraphBuilder::new(&Context::new()).build(&ast).unwrap();
    let module = default_pipeline().run(module).unwrap();
    let target = Target::resolve(JitTarget::Cuda, &DeviceModel::default());
    match build(&module, &target) {
        Err(JitError::BackendCompilationFailure { stage, message }) => {
            assert_eq!(stage, "build");
            assert!(message.contains("no schedule"), "{}", message);
        }
        other => panic!("unexpected {:?}", other.map(|e| e.entry)),
    }
}

#[test]
fn test_build_rejects_unlowered_module() {
    let ast = crate::syntax::parse(TWO_ADD).unwrap();
    let module = GraphBuilder::new(&Context::new()).build(&ast).unwrap();
    let target = Target::resolve(JitTarget::Cpu, &DeviceModel::default());
    let err = build(&module, &target).unwrap_err();
    assert!(err.to_string().contains("not legalized"), "{}", err);
}
