//! Shared harness: compile a method body, load and invoke it, and run the
//! same body through the reference evaluator.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use codetree::{
    CodeBlocks, Engine, EngineOptions, Error, ExecutionError, Expr, ScopeId, TypeDescriptor, Value,
};
use once_cell::sync::Lazy;

pub static ENGINE: Lazy<Engine> = Lazy::new(|| {
    Engine::new(EngineOptions::default(), |types, env| {
        let int_unary = types.method(&[types.int()], types.int()).unwrap();
        env.register_fn("abs", int_unary, |args| {
            Ok(Some(Value::Int(args[0].as_int().unwrap_or(0).wrapping_abs())))
        })
        .unwrap();

        let length = types.method(&[types.string()], types.int()).unwrap();
        env.register_fn("len", length, |args| {
            let text = args[0].as_str().ok_or(ExecutionError::NullReference)?;
            Ok(Some(Value::Int(text.chars().count() as i32)))
        })
        .unwrap();

        let concat = types.method(&[types.string(), types.string()], types.string()).unwrap();
        env.register_fn("concat", concat, |args| {
            let a = args[0].as_str().ok_or(ExecutionError::NullReference)?;
            let b = args[1].as_str().ok_or(ExecutionError::NullReference)?;
            Ok(Some(Value::string(format!("{}{}", a, b))))
        })
        .unwrap();
    })
});

static NEXT_CLASS: AtomicUsize = AtomicUsize::new(0);

/// A class name no other test has used in [`ENGINE`]'s loader.
pub fn class_name(prefix: &str) -> String {
    format!("{}{}", prefix, NEXT_CLASS.fetch_add(1, Ordering::Relaxed))
}

pub struct Outcome {
    pub compiled: Result<Option<Value>, Error>,
    pub evaluated: Result<Option<Value>, ExecutionError>,
}

impl Outcome {
    /// Both paths must agree; returns the shared result.
    pub fn agreed(self) -> Result<Option<Value>, ExecutionError> {
        let compiled = self.compiled.map_err(|e| match e {
            Error::Execution(e) => e,
            other => panic!("compilation or loading failed: {}", other),
        });
        assert_eq!(compiled, self.evaluated, "compiled code and evaluator disagree");
        compiled
    }
}

/// Compile `statements` as the body of method `main(params) -> ret`, whose
/// parameters are the first variables of `frame`, and call it with `args`
/// both ways.
pub fn run<'a>(
    blocks: &CodeBlocks,
    frame: ScopeId,
    params: &[&'static TypeDescriptor],
    ret: &'static TypeDescriptor,
    statements: &[&'a Expr<'a>],
    args: &[Value],
) -> Outcome {
    let compiled = (|| {
        let mut class = ENGINE.class_builder(class_name("Main"));
        let main = class.declare_method("main", params, ret)?;
        class.define_method(main, blocks, frame, statements)?;
        let loaded = ENGINE.load(class)?;
        let handle = loaded.method("main").expect("method was just defined");
        Ok::<_, Error>(handle.invoke(args)?)
    })();

    let mut class = ENGINE.class_builder("Reference");
    let main = class
        .declare_method("main", params, ret)
        .expect("signature is valid");
    let mut evaluator = ENGINE.evaluator();
    let evaluated = match evaluator.define_method(main, blocks, frame, statements) {
        Ok(()) => evaluator.call(main, args),
        Err(e) => panic!("evaluator rejected the method: {}", e),
    };

    Outcome { compiled, evaluated }
}
