use bumpalo::Bump;
use pretty_assertions::assert_eq;

use super::{ClassBuilder, CompileError};
use crate::api::CompilationOptions;
use crate::expr::{CompareOp, ExprBuilder};
use crate::scope::CodeBlocks;
use crate::types::{TypeError, TypeRegistry};
use crate::vm::{Instruction, Loader, Value, disassemble};

#[test]
fn test_last_statement_is_returned() {
    crate::test_utils::init_test_logging();
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();

    let mut class = ClassBuilder::new("Squares");
    let square = class.declare_method("square", &[types.int()], types.int()).unwrap();
    let frame = blocks.open_frame();
    let x = blocks.declare(frame, "x", types.int()).unwrap();
    class
        .define_method(square, &blocks, frame, &[b.mul(b.read(x), b.read(x)).unwrap()])
        .unwrap();

    let file = class.assemble().unwrap();
    let method = file.method("square").unwrap();
    assert_eq!(method.descriptor, "(I)I");
    assert_eq!(method.max_locals, 1);
    assert_eq!(method.max_stack, 2);
    let code: Vec<_> = disassemble(&method.code).unwrap().into_iter().map(|(_, i)| i).collect();
    assert_eq!(code.last(), Some(&Instruction::Return(crate::types::Category::Int)));
}

#[test]
fn test_recursive_method() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();

    let mut class = ClassBuilder::new("Factorial");
    let fact = class.declare_method("fact", &[types.long()], types.long()).unwrap();
    let frame = blocks.open_frame();
    let n = blocks.declare(frame, "n", types.long()).unwrap();

    let base = b.compare(CompareOp::Le, b.read(n), b.long(1)).unwrap();
    let smaller = b.sub(b.read(n), b.long(1)).unwrap();
    let step = b.mul(b.read(n), b.invoke(fact, &[smaller]).unwrap()).unwrap();
    let body = b.if_else(base, b.long(1), step).unwrap();
    class.define_method(fact, &blocks, frame, &[body]).unwrap();

    let loaded = class.load(&Loader::default()).unwrap();
    assert_eq!(
        loaded.method("fact").unwrap().invoke(&[Value::Long(20)]).unwrap(),
        Some(Value::Long(2_432_902_008_176_640_000))
    );
}

#[test]
fn test_void_method_returns_implicitly() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();

    let mut class = ClassBuilder::new("Effects");
    let noop = class.declare_method("noop", &[types.int()], types.void()).unwrap();
    let frame = blocks.open_frame();
    let x = blocks.declare(frame, "x", types.int()).unwrap();
    class
        .define_method(noop, &blocks, frame, &[b.write(x, b.int(3)).unwrap()])
        .unwrap();

    let file = class.assemble().unwrap();
    let code: Vec<_> = disassemble(&file.methods[0].code)
        .unwrap()
        .into_iter()
        .map(|(_, i)| i)
        .collect();
    assert_eq!(
        code,
        vec![
            Instruction::IConst(3),
            Instruction::Store(crate::types::Category::Int, 0),
            Instruction::ReturnVoid
        ]
    );
}

#[test]
fn test_missing_return() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();

    let mut class = ClassBuilder::new("Missing");
    let f = class.declare_method("f", &[types.bool()], types.int()).unwrap();
    let frame = blocks.open_frame();
    let flag = blocks.declare(frame, "flag", types.bool()).unwrap();
    let early = b.if_then(b.read(flag), b.ret(Some(b.int(1))).unwrap()).unwrap();
    assert_eq!(
        class.define_method(f, &blocks, frame, &[early]),
        Err(CompileError::MissingReturn { name: "f".into() })
    );
}

#[test]
fn test_all_paths_return() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();

    let mut class = ClassBuilder::new("Sign");
    let sign = class.declare_method("sign", &[types.int()], types.int()).unwrap();
    let frame = blocks.open_frame();
    let x = blocks.declare(frame, "x", types.int()).unwrap();
    let positive = b.gt(b.read(x), b.int(0)).unwrap();
    let statements = [
        b.if_then(positive, b.ret(Some(b.int(1))).unwrap()).unwrap(),
        b.ret(Some(b.int(-1))).unwrap(),
    ];
    class.define_method(sign, &blocks, frame, &statements).unwrap();

    let loaded = class.load(&Loader::default()).unwrap();
    let sign = loaded.method("sign").unwrap();
    assert_eq!(sign.invoke(&[Value::Int(9)]).unwrap(), Some(Value::Int(1)));
    assert_eq!(sign.invoke(&[Value::Int(0)]).unwrap(), Some(Value::Int(-1)));
}

#[test]
fn test_return_type_is_checked() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();

    let mut class = ClassBuilder::new("Wrong");
    let f = class.declare_method("f", &[], types.int()).unwrap();
    let frame = blocks.open_frame();
    assert_eq!(
        class.define_method(f, &blocks, frame, &[b.ret(Some(b.long(1))).unwrap()]),
        Err(CompileError::Type(TypeError::Mismatch {
            expected: types.int(),
            found: types.long()
        }))
    );
}

#[test]
fn test_parameters_are_checked() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();

    let mut class = ClassBuilder::new("Params");
    let f = class.declare_method("f", &[types.int(), types.int()], types.void()).unwrap();

    let frame = blocks.open_frame();
    blocks.declare(frame, "a", types.int()).unwrap();
    assert_eq!(
        class.define_method(f, &blocks, frame, &[b.empty()]),
        Err(CompileError::Type(TypeError::ArgumentCount { expected: 2, found: 1 }))
    );

    let frame = blocks.open_frame();
    blocks.declare(frame, "a", types.int()).unwrap();
    blocks.declare(frame, "b", types.long()).unwrap();
    assert_eq!(
        class.define_method(f, &blocks, frame, &[b.empty()]),
        Err(CompileError::Type(TypeError::Mismatch {
            expected: types.int(),
            found: types.long()
        }))
    );
}

#[test]
fn test_method_bookkeeping() {
    let types = TypeRegistry::global();
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let mut blocks = CodeBlocks::new();

    let mut class = ClassBuilder::new("Books");
    let f = class.declare_method("f", &[], types.void()).unwrap();
    assert_eq!(
        class.declare_method("f", &[types.int()], types.int()),
        Err(CompileError::DuplicateMethod { name: "f".into() })
    );
    class.declare_method("g", &[], types.void()).unwrap();

    let frame = blocks.open_frame();
    class.define_method(f, &blocks, frame, &[b.empty()]).unwrap();
    assert_eq!(
        class.define_method(f, &blocks, frame, &[b.empty()]),
        Err(CompileError::MethodAlreadyDefined { name: "f".into() })
    );
    assert_eq!(
        class.assemble().unwrap_err(),
        CompileError::UndefinedMethod { name: "g".into() }
    );
}

#[test]
fn test_debug_info() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();

    let build = |options: CompilationOptions| {
        let mut blocks = CodeBlocks::new();
        let mut class = ClassBuilder::with_options("Debug", options);
        let f = class.declare_method("f", &[types.double()], types.double()).unwrap();
        let frame = blocks.open_frame();
        let x = blocks.declare(frame, "x", types.double()).unwrap();
        let inner = blocks.open_child(frame).unwrap();
        let y = blocks.declare(inner, "y", types.int()).unwrap();
        let body = b.block(
            Some(inner),
            &[b.write(y, b.int(1)).unwrap(), b.read(x)],
        );
        blocks.close(inner).unwrap();
        class.define_method(f, &blocks, frame, &[body]).unwrap();
        class.assemble().unwrap()
    };

    let with = build(CompilationOptions { debug_info: true });
    let method = &with.methods[0];
    assert_eq!(method.max_locals, 3);
    let names: Vec<_> = method
        .locals
        .iter()
        .map(|l| (l.name.as_str(), l.slot, l.descriptor.as_str()))
        .collect();
    assert_eq!(names, vec![("x", 0, "D"), ("y", 2, "I")]);

    let without = build(CompilationOptions { debug_info: false });
    assert!(without.methods[0].locals.is_empty());
}

#[test]
fn test_reused_slot_must_be_assigned_before_read() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();
    let mut class = ClassBuilder::new("Stale");
    let f = class.declare_method("f", &[], types.int()).unwrap();

    let frame = blocks.open_frame();
    let first = blocks.open_child(frame).unwrap();
    let x = blocks.declare(first, "x", types.int()).unwrap();
    let first_body = b.block(Some(first), &[b.write(x, b.int(5)).unwrap()]);
    blocks.close(first).unwrap();
    let second = blocks.open_child(frame).unwrap();
    let y = blocks.declare(second, "y", types.int()).unwrap();
    assert_eq!(y.slot(), x.slot());
    let second_body = b.block(Some(second), &[b.read(y)]);
    blocks.close(second).unwrap();

    assert_eq!(
        class.define_method(f, &blocks, frame, &[first_body, second_body]),
        Err(CompileError::UnassignedVariable { name: "y".into() })
    );
}

#[test]
fn test_assignment_must_hold_on_every_path() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();
    let mut class = ClassBuilder::new("Paths");
    let partial = class.declare_method("partial", &[types.bool()], types.int()).unwrap();
    let both = class.declare_method("both", &[types.bool()], types.int()).unwrap();
    let short = class.declare_method("short", &[types.bool()], types.bool()).unwrap();

    let frame = blocks.open_frame();
    let flag = blocks.declare(frame, "flag", types.bool()).unwrap();
    let out = blocks.declare(frame, "out", types.int()).unwrap();

    let one_branch = b.if_then(b.read(flag), b.write(out, b.int(1)).unwrap()).unwrap();
    assert_eq!(
        class.define_method(partial, &blocks, frame, &[one_branch, b.read(out)]),
        Err(CompileError::UnassignedVariable { name: "out".into() })
    );

    let two_branches = b
        .if_else(
            b.read(flag),
            b.write(out, b.int(1)).unwrap(),
            b.write(out, b.int(2)).unwrap(),
        )
        .unwrap();
    class.define_method(both, &blocks, frame, &[two_branches, b.read(out)]).unwrap();

    // The right operand of `and` may not run.
    let assigns = b.eq(b.write(out, b.int(1)).unwrap(), b.int(1)).unwrap();
    let guarded = b.and(b.read(flag), assigns).unwrap();
    let uses = b.eq(b.read(out), b.int(1)).unwrap();
    assert_eq!(
        class.define_method(short, &blocks, frame, &[guarded, uses]),
        Err(CompileError::UnassignedVariable { name: "out".into() })
    );
}

#[test]
fn test_loop_body_clobbering_a_slot_is_rejected() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();
    let mut class = ClassBuilder::new("Loop");
    let f = class.declare_method("f", &[types.bool()], types.void()).unwrap();

    let frame = blocks.open_frame();
    let flag = blocks.declare(frame, "flag", types.bool()).unwrap();
    let first = blocks.open_child(frame).unwrap();
    let x = blocks.declare(first, "x", types.int()).unwrap();
    blocks.close(first).unwrap();
    let second = blocks.open_child(frame).unwrap();
    let y = blocks.declare(second, "y", types.int()).unwrap();
    blocks.close(second).unwrap();

    // The first iteration reads `x` intact; the next would see `y`'s value.
    let body = b.write(y, b.add(b.read(x), b.int(1)).unwrap()).unwrap();
    let statements = [
        b.write(x, b.int(1)).unwrap(),
        b.while_loop(b.read(flag), body).unwrap(),
    ];
    assert_eq!(
        class.define_method(f, &blocks, frame, &statements),
        Err(CompileError::UnassignedVariable { name: "x".into() })
    );
}

#[test]
fn test_private_registry() {
    let arena = Bump::new();
    let registry: &'static TypeRegistry = Box::leak(Box::new(TypeRegistry::new()));
    let b = ExprBuilder::with_registry(&arena, registry);
    let text = registry.string();
    assert!(!text.same(TypeRegistry::global().string()));

    let mut blocks = CodeBlocks::new();
    let mut class = ClassBuilder::with_registry("Private", CompilationOptions::default(), registry);
    let id = class.declare_method("id", &[text], text).unwrap();
    assert!(id.params()[0].same(text));

    let frame = blocks.open_frame();
    let s = blocks.declare(frame, "s", text).unwrap();
    let is_null = b.eq(b.read(s), b.null(text).unwrap()).unwrap();
    let fallback = b.if_then(is_null, b.ret(Some(b.string("none"))).unwrap()).unwrap();
    class.define_method(id, &blocks, frame, &[fallback, b.read(s)]).unwrap();

    let loaded = class.load(&Loader::default()).unwrap();
    let id = loaded.method("id").unwrap();
    let result = id.invoke(&[Value::string("hi")]).unwrap().unwrap();
    assert_eq!(result.as_str(), Some("hi"));
    let result = id.invoke(&[Value::null()]).unwrap().unwrap();
    assert_eq!(result.as_str(), Some("none"));
}
