//! GraphBuilder unit tests.

use super::*;
use crate::ir::{HighOp, PrintArg};
use crate::tensor::{DType, Scalar};

const TWO_ADD: &str = "\
@jit(\"cpu\")
def two_add(a: Tensor(shape=(2, 3), dtype=\"float32\"), b: Tensor(shape=(2, 3), dtype=\"float32\")):
    out = a + b
    out = out + a
    return out
";

fn build(src: &str) -> Result<IRModule> {
    let module = crate::syntax::parse(src)?;
    GraphBuilder::new(&Context::new()).build(&module)
}

fn construct(err: JitError) -> String {
    match err {
        JitError::UnsupportedConstruct { construct, .. } => construct,
        other => panic!("expected UnsupportedConstruct, got {:?}", other),
    }
}

fn f32_23() -> TensorDescriptor {
    TensorDescriptor::new(vec![2, 3], DType::Float32)
}

#[test]
fn test_two_add_lowers_to_two_calls() {
    let module = build(TWO_ADD).unwrap();
    assert_eq!(module.functions.len(), 1);
    let func = &module.functions[0];
    assert_eq!(func.name, "two_add");
    assert_eq!(func.params.len(), 2);
    assert_eq!(func.params[0].desc, f32_23());

    let bindings: Vec<&Binding> = func.bindings().collect();
    assert_eq!(bindings.len(), 2);
    let (a, b) = (func.params[0].var, func.params[1].var);
    assert_eq!(
        bindings[0].op,
        Op::Call {
            op: HighOp::Add,
            args: vec![a, b]
        }
    );
    assert_eq!(
        bindings[1].op,
        Op::Call {
            op: HighOp::Add,
            args: vec![bindings[0].var, a]
        }
    );
    assert_eq!(bindings[1].info, StructInfo::Tensor(f32_23()));
    assert_eq!(bindings[0].name.as_deref(), Some("out"));
    assert_eq!(func.result, FuncResult::Value(bindings[1].var));
}

#[test]
fn test_build_is_deterministic() {
    let first = build(TWO_ADD).unwrap();
    let second = build(TWO_ADD).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn test_module_text() {
    let module = build(TWO_ADD).unwrap();
    insta::assert_snapshot!(module.to_string(), @r#"
    @I.ir_module
    class Module:
        @R.function
        def two_add(a: R.Tensor((2, 3), dtype="float32"), b: R.Tensor((2, 3), dtype="float32")) -> R.Tensor((2, 3), dtype="float32"):
            out: R.Tensor((2, 3), dtype="float32") = R.add(a, b)
            out1: R.Tensor((2, 3), dtype="float32") = R.add(out, a)
            return out1
    "#);
}

#[test]
fn test_no_return_gives_empty_result() {
    let module = build("def print_hello():\n    print(\"Hello, World!\")\n").unwrap();
    let func = module.entry().unwrap();
    assert_eq!(func.result, FuncResult::Empty);
    let print = func.bindings().next().unwrap();
    assert_eq!(
        print.op,
        Op::Print(vec![PrintArg::Literal("Hello, World!".to_string())])
    );
    assert_eq!(print.info, StructInfo::Object);
}

#[test]
fn test_bare_return_overwrites_result() {
    let src = "def f(a: Tensor((2,), 'int32')):\n    return a\n    return\n";
    assert_eq!(build(src).unwrap().entry().unwrap().result, FuncResult::Empty);
}

#[test]
fn test_missing_annotation_before_any_binding() {
    let src = "def f(a: Tensor((2,), 'int32'), b):\n    c = a + a\n    return c\n";
    match build(src).unwrap_err() {
        JitError::MissingAnnotation { param, reason, .. } => {
            assert_eq!(param, "b");
            assert_eq!(reason, "parameter has no annotation");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_bad_annotation_is_missing_annotation() {
    let src = "def f(a: Tensor((2,), 'complex64')):\n    return a\n";
    assert!(matches!(build(src), Err(JitError::MissingAnnotation { .. })));
}

#[test]
fn test_unsupported_operator_is_named() {
    let src = "def f(a: Tensor((2,), 'int32'), b: Tensor((2,), 'int32')):\n    return a - b\n";
    assert_eq!(construct(build(src).unwrap_err()), "operator Sub");
    let src = "def f(a: Tensor((2,), 'int32')):\n    return a / a\n";
    assert_eq!(construct(build(src).unwrap_err()), "operator Div");
    let src = "def f(a: Tensor((2,), 'int32')):\n    return -a\n";
    assert_eq!(construct(build(src).unwrap_err()), "operator USub");
}

#[test]
fn test_unknown_callee_is_an_error() {
    let src = "def f(a: Tensor((2,), 'int32')):\n    foo(a)\n    return a\n";
    assert_eq!(construct(build(src).unwrap_err()), "call to 'foo'");
    let src = "def f(a: Tensor((2,), 'int32')):\n    print(a, sep='')\n";
    assert!(construct(build(src).unwrap_err()).contains("keyword argument 'sep'"));
}

#[test]
fn test_assignment_forms() {
    let src = "def f(a: Tensor((2,), 'int32')):\n    x = y = a\n";
    assert_eq!(construct(build(src).unwrap_err()), "multiple assignment");
    let src = "def f(a: Tensor((2,), 'int32')):\n    x, y = a, a\n";
    assert_eq!(construct(build(src).unwrap_err()), "destructuring assignment");
    let src = "def f(a: Tensor((2,), 'int32')):\n    a += a\n";
    assert!(construct(build(src).unwrap_err()).starts_with("augmented assignment"));
}

#[test]
fn test_control_flow_rejected() {
    for body in [
        "    if a:\n        pass\n",
        "    while a:\n        pass\n",
        "    for x in a:\n        pass\n",
    ] {
        let src = format!("def f(a: Tensor((2,), 'int32')):\n{}", body);
        assert!(construct(build(&src).unwrap_err()).starts_with("control flow"));
    }
}

#[test]
fn test_unbound_name() {
    let src = "def f(a: Tensor((2,), 'int32')):\n    return a + c\n";
    match build(src).unwrap_err() {
        JitError::UnboundName { name, span } => {
            assert_eq!(name, "c");
            assert_eq!(&src[span.range()], "c");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_weak_literals_adopt_tensor_dtype() {
    let src = "def f(a: Tensor((2, 3), 'float32')):\n    return a * 2 + 1.5\n";
    let module = build(src).unwrap();
    let func = module.entry().unwrap();
    let consts: Vec<Scalar> = func
        .bindings()
        .filter_map(|b| match b.op {
            Op::Constant(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(consts, vec![Scalar::I64(2), Scalar::F32(1.5)]);
    let FuncResult::Value(out) = func.result else {
        panic!("expected a value")
    };
    assert_eq!(func.info_of(out), Some(StructInfo::Tensor(f32_23())));
    assert!(!func.binding(out).unwrap().weak);
}

#[test]
fn test_dtype_and_shape_mismatch() {
    let src = "def f(a: Tensor((2,), 'int32'), b: Tensor((2,), 'float32')):\n    return a + b\n";
    assert!(matches!(build(src), Err(JitError::TypeMismatch { .. })));
    let src = "def f(a: Tensor((2, 3), 'int32'), b: Tensor((3, 2), 'int32')):\n    return a + b\n";
    let err = build(src).unwrap_err();
    assert!(err.to_string().contains("cannot be broadcast"), "{}", err);
}

#[test]
fn test_broadcast_result_shape() {
    let src = "def f(a: Tensor((2, 1), 'int64'), b: Tensor((3,), 'int64')):\n    return a * b\n";
    let module = build(src).unwrap();
    let func = module.entry().unwrap();
    let FuncResult::Value(out) = func.result else {
        panic!("expected a value")
    };
    assert_eq!(
        func.info_of(out).unwrap().as_tensor().unwrap().shape,
        vec![2, 3]
    );
}

#[test]
fn test_tuple_result_and_alias() {
    let src = "def f(a: Tensor((2,), 'int32')):\n    b = a\n    return (a + b, b)\n";
    let module = build(src).unwrap();
    let func = module.entry().unwrap();
    let FuncResult::Value(out) = func.result else {
        panic!("expected a value")
    };
    match func.info_of(out).unwrap() {
        StructInfo::Tuple(fields) => assert_eq!(fields.len(), 2),
        other => panic!("unexpected {:?}", other),
    }
    // `b = a` is an alias, not a binding
    assert_eq!(func.bindings().count(), 2);
}

#[test]
fn test_string_outside_print_and_bool_constants() {
    let src = "def f():\n    x = 'hi'\n";
    assert_eq!(construct(build(src).unwrap_err()), "string literal outside of print");
    let src = "def f():\n    x = True\n";
    assert_eq!(construct(build(src).unwrap_err()), "constant True");
}

#[test]
fn test_module_shape_checks() {
    let src = "def f():\n    pass\ndef g():\n    pass\n";
    assert_eq!(construct(build(src).unwrap_err()), "more than one function definition");
    let src = "x = 1\n";
    assert_eq!(construct(build(src).unwrap_err()), "top-level Assign statement");
    let src = "def f():\n    \"\"\"doc\"\"\"\n    pass\n";
    assert!(build(src).is_ok());
}
