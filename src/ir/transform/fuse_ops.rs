use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::Pass;
use crate::error::{JitError, Result};
use crate::ir::{Binding, Block, FuncResult, Function, IRModule, Op, Param, StructInfo, ValueId};

/// Group chains of fusable primitive calls inside each dataflow block.
///
/// A producer joins its consumer's group when both are at most
/// `Injective` and the consumer is the producer's only reader (so the
/// intermediate never escapes the block or the function). Every group of
/// two or more bindings is outlined into a primitive sub-function
/// `fused_<prim names>`, and the group's last binding calls it.
pub struct FuseOps;

impl Pass for FuseOps {
    fn name(&self) -> &'static str {
        "FuseOps"
    }

    fn run(&self, mut module: IRModule) -> Result<IRModule> {
        for fi in 0..module.functions.len() {
            if module.functions[fi].primitive {
                continue;
            }
            let mut func = module.functions[fi].clone();
            let uses = func.use_counts();
            let infos = value_infos(&func);
            for block in &mut func.blocks {
                if block.dataflow {
                    fuse_block(&mut module, block, &uses, &infos)?;
                }
            }
            module.functions[fi] = func;
        }
        Ok(module)
    }
}

/// Whether `binding` is a primitive call that may take part in fusion.
fn fusable(module: &IRModule, binding: &Binding) -> Result<bool> {
    let Op::CallPrim { func, .. } = &binding.op else {
        return Ok(false);
    };
    let prim = module
        .prim_func(func)
        .ok_or_else(|| JitError::backend("FuseOps", format!("call to unknown primitive function '{}'", func)))?;
    let pattern = prim.pattern.ok_or_else(|| {
        JitError::backend(
            "FuseOps",
            format!("primitive function '{}' has no op pattern (AnnotateOpPattern must run first)", func),
        )
    })?;
    Ok(pattern.is_fusable())
}

/// Struct info of every parameter and binding of `func`.
pub(crate) fn value_infos(func: &Function) -> HashMap<ValueId, StructInfo> {
    func.params
        .iter()
        .map(|p| (p.var, StructInfo::Tensor(p.desc.clone())))
        .chain(func.bindings().map(|b| (b.var, b.info.clone())))
        .collect()
}

fn fuse_block(
    module: &mut IRModule,
    block: &mut Block,
    uses: &HashMap<ValueId, usize>,
    infos: &HashMap<ValueId, StructInfo>,
) -> Result<()> {
    let n = block.bindings.len();
    let defined: HashMap<ValueId, usize> = block
        .bindings
        .iter()
        .enumerate()
        .map(|(i, b)| (b.var, i))
        .collect();

    // One edge per operand occurrence, producer -> consumer.
    let mut graph: DiGraph<usize, ValueId> = DiGraph::with_capacity(n, n);
    let nodes: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();
    for (i, binding) in block.bindings.iter().enumerate() {
        for v in binding.op.operands() {
            if let Some(&p) = defined.get(&v) {
                graph.add_edge(nodes[p], nodes[i], v);
            }
        }
    }

    let candidates: Vec<bool> = block
        .bindings
        .iter()
        .map(|b| fusable(module, b))
        .collect::<Result<_>>()?;

    let mut groups = UnionFind::<usize>::new(n);
    for c in 0..n {
        if !candidates[c] {
            continue;
        }
        for edge in graph.edges_directed(nodes[c], Direction::Incoming) {
            let p = graph[edge.source()];
            let var = *edge.weight();
            // `s * s` reads `s` twice but is still its only reader.
            let mut reads = 0;
            let mut foreign = false;
            for out in graph.edges_directed(nodes[p], Direction::Outgoing) {
                if out.target() == nodes[c] {
                    reads += 1;
                } else {
                    foreign = true;
                }
            }
            let single_reader = !foreign && uses.get(&var).copied().unwrap_or(0) == reads;
            if candidates[p] && single_reader {
                groups.union(p, c);
            }
        }
    }

    let labels = groups.into_labeling();
    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, root) in labels.iter().enumerate() {
        members.entry(*root).or_default().push(i);
    }
    let mut grouped: Vec<Vec<usize>> = members.into_values().filter(|g| g.len() >= 2).collect();
    grouped.sort();

    let mut removed = vec![false; n];
    for group in grouped {
        let (sink, func, args) = outline(module, block, &group, infos)?;
        module.functions.push(func.clone());
        for &i in &group[..group.len() - 1] {
            removed[i] = true;
        }
        block.bindings[sink].op = Op::CallFunc {
            func: func.name,
            args,
        };
    }
    let mut index = 0;
    block.bindings.retain(|_| {
        let keep = !removed[index];
        index += 1;
        keep
    });
    Ok(())
}

/// Build the sub-function for `group` (ascending binding indices).
/// Returns the sink index, the function, and the outer call arguments.
fn outline(
    module: &mut IRModule,
    block: &Block,
    group: &[usize],
    infos: &HashMap<ValueId, StructInfo>,
) -> Result<(usize, Function, Vec<ValueId>)> {
    let inner: Vec<&Binding> = group.iter().map(|&i| &block.bindings[i]).collect();
    let local: HashSet<ValueId> = inner.iter().map(|b| b.var).collect();

    let mut inputs: Vec<ValueId> = Vec::new();
    for binding in &inner {
        for v in binding.op.operands() {
            if !local.contains(&v) && !inputs.contains(&v) {
                inputs.push(v);
            }
        }
    }

    let prim_names: Vec<&str> = inner
        .iter()
        .filter_map(|b| match &b.op {
            Op::CallPrim { func, .. } => Some(func.as_str()),
            _ => None,
        })
        .collect();
    let name = module.unique_global_name(&format!("fused_{}", prim_names.join("_")));

    let mut remap: HashMap<ValueId, ValueId> = HashMap::new();
    let mut params = Vec::with_capacity(inputs.len());
    for &v in &inputs {
        let fresh = module.fresh_value();
        remap.insert(v, fresh);
        let desc = infos
            .get(&v)
            .and_then(|i| i.as_tensor())
            .cloned()
            .ok_or_else(|| JitError::backend("FuseOps", format!("fused input %{} is not a tensor", v.0)))?;
        params.push((fresh, desc));
    }
    for binding in &inner {
        let fresh = module.fresh_value();
        remap.insert(binding.var, fresh);
    }

    let mut func = Function {
        name,
        params: Vec::new(),
        blocks: vec![Block {
            dataflow: true,
            bindings: inner.iter().map(|b| (*b).clone()).collect(),
        }],
        result: FuncResult::Value(block.bindings[group[group.len() - 1]].var),
        primitive: true,
    };
    func.remap_values(&|v| remap.get(&v).copied().unwrap_or(v));
    func.params = params
        .into_iter()
        .map(|(var, desc)| Param {
            var,
            name: "lv".to_string(),
            desc,
        })
        .collect();
    for binding in &mut func.blocks[0].bindings {
        binding.name = None;
    }
    Ok((group[group.len() - 1], func, inputs))
}
