//! Compilation and execution latency of the JIT pipeline.
//!
//! 1. Source -> optimized module (parse, lower, five passes)
//! 2. Module -> executable for cpu and cuda
//! 3. Kernel execution, serial vs emulated grid
//! 4. Full `call` with recompilation

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tcl::runtime::{Kernel, Launch};
use tcl::schedule::apply_default_schedule;
use tcl::{
    jit, Console, Context, DType, Device, DeviceModel, FunctionSource, JitOptions, JitTarget, NDArray, Target, Tensor,
    TensorDescriptor,
};

/// A chain of `n` alternating adds and multiplies over one input shape.
fn chain_source(n: usize, shape: &str) -> String {
    let mut src = format!(
        "def chain(a: Tensor({shape}, \"float32\"), b: Tensor({shape}, \"float32\")):\n    x = a + b\n",
        shape = shape
    );
    for i in 0..n {
        let op = if i % 2 == 0 { '*' } else { '+' };
        src.push_str(&format!("    x = x {} a\n", op));
    }
    src.push_str("    return x\n");
    src
}

fn bench_lowering(c: &mut Criterion) {
    let small = chain_source(4, "(2, 3)");
    let large = chain_source(64, "(2, 3)");

    let mut group = c.benchmark_group("lower_source");
    group.bench_function("5_ops", |b| b.iter(|| tcl::lower_source(black_box(&small))));
    group.bench_function("65_ops", |b| b.iter(|| tcl::lower_source(black_box(&large))));
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let module = tcl::lower_source(&chain_source(16, "(64, 64)")).unwrap();
    let model = DeviceModel::default();

    let mut group = c.benchmark_group("build");
    for kind in [JitTarget::Cpu, JitTarget::Cuda] {
        let target = Target::resolve(kind, &model);
        group.bench_function(kind.as_str(), |b| {
            b.iter(|| {
                let scheduled = apply_default_schedule(black_box(module.clone()), &target, None).unwrap();
                tcl::runtime::build(&scheduled, &target).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_kernel(c: &mut Criterion) {
    let module = tcl::lower_source(&chain_source(8, "(256, 256)")).unwrap();
    let prim = &module.prim_funcs[0];
    let kernel = Kernel::compile(prim).unwrap();
    let desc = TensorDescriptor::new(vec![256, 256], DType::Float32);
    let a = NDArray::ones(&desc, Device::cuda(0));
    let b = NDArray::ones(&desc, Device::cuda(0));
    let numel = desc.numel() as u32;

    let mut group = c.benchmark_group("kernel_256x256");
    group.bench_function("serial", |bench| {
        bench.iter(|| kernel.execute(black_box(&[&a, &b]), Device::cpu(0), Launch::Serial))
    });
    for threads in [128u32, 1024] {
        let launch = Launch::Grid {
            blocks: numel.div_ceil(threads),
            threads_per_block: threads,
        };
        group.bench_function(format!("grid_{}", threads), |bench| {
            bench.iter(|| kernel.execute(black_box(&[&a, &b]), Device::cuda(0), launch))
        });
    }
    group.finish();
}

fn bench_call(c: &mut Criterion) {
    let src = chain_source(4, "(2, 3)");
    let desc = TensorDescriptor::new(vec![2, 3], DType::Float32);
    let a = Tensor::from_array(NDArray::ones(&desc, Device::cpu(0)));

    let mut group = c.benchmark_group("call");
    for cache in [false, true] {
        let options = JitOptions::default()
            .with_console(Console::capture())
            .with_dump(false)
            .with_cache(cache);
        let f = jit("cpu")
            .unwrap()
            .with_options(options)
            .wrap(FunctionSource::Inline(src.clone()), Context::new());
        let name = if cache { "cached" } else { "recompile" };
        group.bench_function(name, |b| b.iter(|| f.call(black_box(&[&a, &a])).unwrap()));
    }
    group.finish();
}

criterion_group!(benches, bench_lowering, bench_build, bench_kernel, bench_call);
criterion_main!(benches);
