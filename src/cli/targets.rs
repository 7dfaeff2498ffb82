use tcl::{DeviceModel, JitTarget, Target};

pub fn cmd_targets() {
    let model = DeviceModel::default();
    println!("Targets:");
    for kind in [JitTarget::Cpu, JitTarget::Cuda] {
        println!("  {:<6} {}", kind.as_str(), Target::resolve(kind, &model));
    }
    println!();
    println!("Built-in device models:");
    for name in DeviceModel::BUILTIN {
        if let Ok(m) = DeviceModel::resolve(name) {
            let marker = if m == model { " (default)" } else { "" };
            println!(
                "  {:<26} {:<6} {} threads/block, warp {}, {} SMs{}",
                m.name, m.arch, m.max_threads_per_block, m.warp_size, m.multiprocessors, marker
            );
        }
    }
}
