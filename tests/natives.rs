mod common;

use codetree::vm::Object;
use codetree::{
    AssemblyError, Bump, CodeBlocks, Engine, EngineOptions, Error, ExecutionError, ExprBuilder, TypeRegistry, Value,
};
use common::run;
use pretty_assertions::assert_eq;

#[test]
fn natives_take_and_return_references() {
    let types = TypeRegistry::global();
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let mut blocks = CodeBlocks::new();
    let frame = blocks.open_frame();
    let name = blocks.declare(frame, "name", types.string()).unwrap();

    let concat = types.method(&[types.string(), types.string()], types.string()).unwrap();
    let len = types.method(&[types.string()], types.int()).unwrap();
    let greeting = b
        .invoke_native("concat", concat, &[b.string("hello, "), b.read(name)])
        .unwrap();
    let statements = [b.invoke_native("len", len, &[greeting]).unwrap()];

    let result = run(
        &blocks,
        frame,
        &[types.string()],
        types.int(),
        &statements,
        &[Value::string("wörld")],
    )
    .agreed();
    assert_eq!(result, Ok(Some(Value::Int(12))));

    let result = run(&blocks, frame, &[types.string()], types.int(), &statements, &[Value::null()]).agreed();
    assert_eq!(result, Err(ExecutionError::NullReference));
}

#[test]
fn unregistered_native_is_rejected_at_load() {
    let types = TypeRegistry::global();
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let mut blocks = CodeBlocks::new();
    let engine = Engine::new(EngineOptions::default(), |_, _| {});

    let mut class = engine.class_builder("Orphan");
    let f = class.declare_method("f", &[], types.int()).unwrap();
    let frame = blocks.open_frame();
    let signature = types.method(&[types.int()], types.int()).unwrap();
    let call = b.invoke_native("abs", signature, &[b.int(-3)]).unwrap();
    class.define_method(f, &blocks, frame, &[call]).unwrap();

    assert_eq!(
        engine.load(class).unwrap_err(),
        Error::Assembly(AssemblyError::UnresolvedNative {
            name: "abs".into(),
            descriptor: "(I)I".into(),
        })
    );
    assert!(engine.loader().class("Orphan").is_none());
}

#[test]
fn native_signature_must_match() {
    let types = TypeRegistry::global();
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let mut blocks = CodeBlocks::new();
    let engine = &*common::ENGINE;

    // `abs` is registered as (I)I.
    let mut class = engine.class_builder(common::class_name("WrongAbs"));
    let f = class.declare_method("f", &[], types.long()).unwrap();
    let frame = blocks.open_frame();
    let signature = types.method(&[types.long()], types.long()).unwrap();
    let call = b.invoke_native("abs", signature, &[b.long(-3)]).unwrap();
    class.define_method(f, &blocks, frame, &[call]).unwrap();

    assert!(matches!(
        engine.load(class),
        Err(Error::Assembly(AssemblyError::UnresolvedNative { .. }))
    ));
}

#[test]
fn natives_exchange_lists() {
    let engine = Engine::new(EngineOptions::default(), |types, env| {
        let list = types.object("List", Some(types.int())).unwrap();
        let range = types.method(&[types.int()], list).unwrap();
        env.register_fn("range", range, |args| {
            let n = args[0].as_int().unwrap_or(0);
            Ok(Some(Value::list((0..n).map(Value::Int).collect())))
        })
        .unwrap();
        let sum = types.method(&[list], types.long()).unwrap();
        env.register_fn("sum", sum, |args| match args[0].as_object().map(|o| &**o) {
            Some(Object::List(items)) => Ok(Some(Value::Long(
                items.iter().filter_map(Value::as_int).map(i64::from).sum(),
            ))),
            _ => Err(ExecutionError::NullReference),
        })
        .unwrap();
    });

    let types = engine.types();
    let arena = Bump::new();
    let b = ExprBuilder::new(&arena);
    let mut blocks = CodeBlocks::new();
    let list = types.object("List", Some(types.int())).unwrap();
    let range = types.method(&[types.int()], list).unwrap();
    let sum = types.method(&[list], types.long()).unwrap();

    let mut class = engine.class_builder("Lists");
    let total = class.declare_method("total", &[types.int()], types.long()).unwrap();
    let frame = blocks.open_frame();
    let n = blocks.declare(frame, "n", types.int()).unwrap();
    let items = b.invoke_native("range", range, &[b.read(n)]).unwrap();
    let statements = [b.invoke_native("sum", sum, &[items]).unwrap()];
    class.define_method(total, &blocks, frame, &statements).unwrap();

    let loaded = engine.load(class).unwrap();
    let handle = loaded.method("total").unwrap();
    assert_eq!(handle.invoke(&[Value::Int(5)]).unwrap(), Some(Value::Long(10)));

    let mut evaluator = engine.evaluator();
    evaluator.define_method(total, &blocks, frame, &statements).unwrap();
    assert_eq!(evaluator.call(total, &[Value::Int(5)]).unwrap(), Some(Value::Long(10)));
}
