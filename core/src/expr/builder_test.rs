use bumpalo::Bump;
use pretty_assertions::assert_eq;

use super::{BinaryOp, Callee, ExprBuilder, ExprInner};
use crate::compiler::CompileError;
use crate::scope::CodeBlocks;
use crate::types::{TypeError, TypeRegistry};

#[test]
fn test_constants_carry_their_types() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();

    assert!(b.int(1).result_type().same(types.int()));
    assert!(b.long(1).result_type().same(types.long()));
    assert!(b.float(1.0).result_type().same(types.float()));
    assert!(b.double(1.0).result_type().same(types.double()));
    assert!(b.bool(true).result_type().same(types.bool()));
    assert!(b.string("hi").result_type().same(types.string()));
}

#[test]
fn test_null_requires_reference_type() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();

    let list = types.object("List", Some(types.int())).unwrap();
    assert!(b.null(list).unwrap().result_type().same(list));
    assert_eq!(
        b.null(types.int()).unwrap_err(),
        CompileError::Type(TypeError::NotReference { ty: types.int() })
    );
}

#[test]
fn test_binary_requires_matching_numeric_operands() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();

    let sum = b.add(b.long(1), b.long(2)).unwrap();
    assert!(sum.result_type().same(types.long()));

    assert_eq!(
        b.add(b.int(1), b.long(2)).unwrap_err(),
        CompileError::Type(TypeError::Mismatch {
            expected: types.int(),
            found: types.long(),
        })
    );
    assert_eq!(
        b.mul(b.bool(true), b.bool(false)).unwrap_err(),
        CompileError::Type(TypeError::NotNumeric { found: types.bool() })
    );
}

#[test]
fn test_binary_keeps_operand_order() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);

    let left = b.int(10);
    let right = b.int(3);
    let diff = b.sub(left, right).unwrap();
    match diff.inner() {
        ExprInner::Binary { op, left: l, right: r } => {
            assert_eq!(*op, BinaryOp::Sub);
            assert!(core::ptr::eq(*l, left));
            assert!(core::ptr::eq(*r, right));
        }
        other => panic!("expected a binary node, got {:?}", other),
    }
}

#[test]
fn test_compare_rules() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();

    let lt = b.lt(b.double(1.0), b.double(2.0)).unwrap();
    assert!(lt.result_type().same(types.bool()));

    // Booleans and references only support equality.
    b.eq(b.bool(true), b.bool(false)).unwrap();
    b.eq(b.string("a"), b.string("b")).unwrap();
    assert_eq!(
        b.lt(b.bool(true), b.bool(false)).unwrap_err(),
        CompileError::Type(TypeError::UnsupportedOperator {
            op: "<",
            ty: types.bool(),
        })
    );
    assert!(b.eq(b.int(1), b.float(1.0)).is_err());
}

#[test]
fn test_logical_and_not_require_bool() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();

    b.and(b.bool(true), b.bool(false)).unwrap();
    b.not(b.bool(true)).unwrap();
    assert_eq!(
        b.or(b.bool(true), b.int(0)).unwrap_err(),
        CompileError::Type(TypeError::NotBoolean { found: types.int() })
    );
    assert!(b.not(b.int(1)).is_err());
    assert!(b.neg(b.bool(true)).is_err());
}

#[test]
fn test_convert() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();

    let widened = b.convert(b.int(3), types.double()).unwrap();
    assert!(widened.result_type().same(types.double()));

    // Identity conversions are folded away.
    let same = b.int(3);
    assert!(core::ptr::eq(b.convert(same, types.int()).unwrap(), same));

    assert_eq!(
        b.convert(b.bool(true), types.int()).unwrap_err(),
        CompileError::Type(TypeError::InvalidConversion {
            from: types.bool(),
            to: types.int(),
        })
    );
}

#[test]
fn test_write_checks_variable_type() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();
    let frame = blocks.open_frame();
    let n = blocks.declare(frame, "n", types.int()).unwrap();

    let write = b.write(n, b.int(5)).unwrap();
    assert!(write.result_type().same(types.int()));

    assert_eq!(
        b.write(n, b.long(5)).unwrap_err(),
        CompileError::Type(TypeError::Mismatch {
            expected: types.int(),
            found: types.long(),
        })
    );
    assert!(b.write(n, b.empty()).is_err());
}

#[test]
fn test_read_by_name() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let mut blocks = CodeBlocks::new();
    let frame = blocks.open_frame();
    let n = blocks.declare(frame, "n", types.int()).unwrap();
    let child = blocks.open_child(frame).unwrap();

    let read = b.read_name(&blocks, child, "n").unwrap();
    assert_eq!(read.inner(), &ExprInner::Read(n));
    assert_eq!(
        b.read_name(&blocks, child, "m").unwrap_err(),
        CompileError::UnresolvedReference { name: "m".into() }
    );
}

#[test]
fn test_if_result_type() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();

    let valued = b.if_else(b.bool(true), b.int(1), b.int(2)).unwrap();
    assert!(valued.result_type().same(types.int()));

    let mixed = b.if_else(b.bool(true), b.int(1), b.long(2)).unwrap();
    assert!(mixed.result_type().same(types.void()));

    let one_armed = b.if_then(b.bool(true), b.int(1)).unwrap();
    assert!(one_armed.result_type().same(types.void()));

    assert!(b.if_then(b.int(1), b.empty()).is_err());
}

#[test]
fn test_block_type_is_last_statement() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();

    let block = b.block(None, &[b.empty(), b.long(7)]);
    assert!(block.result_type().same(types.long()));
    assert!(b.empty().result_type().same(types.void()));

    let looped = b.while_loop(b.bool(false), b.int(1)).unwrap();
    assert!(looped.result_type().same(types.void()));
}

#[test]
fn test_invoke_native_checks_arguments() {
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let types = b.types();
    let signature = types.method(&[types.int(), types.int()], types.long()).unwrap();

    let call = b
        .invoke_native("math.mul_wide", signature, &[b.int(2), b.int(3)])
        .unwrap();
    assert!(call.result_type().same(types.long()));
    match call.inner() {
        ExprInner::Invoke {
            callee: Callee::Native { name, .. },
            args,
        } => {
            assert_eq!(*name, "math.mul_wide");
            assert_eq!(args.len(), 2);
        }
        other => panic!("expected a native call, got {:?}", other),
    }

    assert_eq!(
        b.invoke_native("math.mul_wide", signature, &[b.int(2)])
            .unwrap_err(),
        CompileError::Type(TypeError::ArgumentCount {
            expected: 2,
            found: 1
        })
    );
    assert!(
        b.invoke_native("math.mul_wide", signature, &[b.int(2), b.long(3)])
            .is_err()
    );
    assert_eq!(
        b.invoke_native("bad", types.int(), &[]).unwrap_err(),
        CompileError::Type(TypeError::NotAMethod { found: types.int() })
    );
}

#[test]
fn test_private_registry() {
    let arena = Bump::new();
    let registry: &'static TypeRegistry = Box::leak(Box::new(TypeRegistry::new()));
    let b = ExprBuilder::with_registry(&arena, registry);
    // Primitives are shared between registries.
    assert!(b.int(1).result_type().same(TypeRegistry::global().int()));
}
