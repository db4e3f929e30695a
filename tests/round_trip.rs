mod common;

use codetree::{Bump, CodeBlocks, CompileError, Error, ExprBuilder, TypeRegistry, Value};
use common::run;
use pretty_assertions::assert_eq;

#[test]
fn round_trip_doubles_large_values() {
    let types = TypeRegistry::global();
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let mut blocks = CodeBlocks::new();
    let frame = blocks.open_frame();
    let n = blocks.declare(frame, "n", types.int()).unwrap();

    let statements = [
        b.write(n, b.int(10)).unwrap(),
        b.if_else(
            b.gt(b.read(n), b.int(5)).unwrap(),
            b.write(n, b.mul(b.read(n), b.int(2)).unwrap()).unwrap(),
            b.write(n, b.sub(b.read(n), b.int(1)).unwrap()).unwrap(),
        )
        .unwrap(),
        b.read(n),
    ];

    let result = run(&blocks, frame, &[], types.int(), &statements, &[]).agreed();
    assert_eq!(result, Ok(Some(Value::Int(20))));
}

#[test]
fn round_trip_takes_the_other_branch() {
    let types = TypeRegistry::global();
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let mut blocks = CodeBlocks::new();
    let frame = blocks.open_frame();
    let n = blocks.declare(frame, "n", types.int()).unwrap();

    let statements = [
        b.if_else(
            b.gt(b.read(n), b.int(5)).unwrap(),
            b.write(n, b.mul(b.read(n), b.int(2)).unwrap()).unwrap(),
            b.write(n, b.sub(b.read(n), b.int(1)).unwrap()).unwrap(),
        )
        .unwrap(),
        b.read(n),
    ];

    for (input, expected) in [(10, 20), (5, 4), (-3, -4)] {
        let result = run(&blocks, frame, &[types.int()], types.int(), &statements, &[Value::Int(input)]).agreed();
        assert_eq!(result, Ok(Some(Value::Int(expected))), "n = {}", input);
    }
}

#[test]
fn duplicate_declaration_fails_before_compilation() {
    let types = TypeRegistry::global();
    let mut blocks = CodeBlocks::new();
    let frame = blocks.open_frame();
    blocks.declare(frame, "n", types.int()).unwrap();

    let error = blocks.declare(frame, "n", types.int()).unwrap_err();
    assert_eq!(error, CompileError::DuplicateBinding { name: "n".into() });

    let error: Error = error.into();
    assert!(error.is_static());
    assert_eq!(error.to_string(), "`n` is already declared in this scope");
}
