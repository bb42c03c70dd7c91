//! The native registry is process-wide and write-once, so installing a custom
//! set needs a test binary of its own where no interpreter has run yet.

use std::io;

use quill_lang::{
    natives::{NativeRegistryBuilder, RegistryError},
    Config, Interpreter, Value,
};

#[test]
fn installed_natives_are_callable_from_scripts() {
    let registry = NativeRegistryBuilder::with_defaults()
        .register("double", |args, _env, _out| match args.first() {
            Some(Value::Number(n)) => Ok(Value::Number(n * 2.0)),
            _ => Ok(Value::Null),
        })
        .install()
        .expect("no registry is installed before this test");
    assert!(registry.get("double").is_some());
    assert!(registry.get("print").is_some());

    let interpreter = Interpreter::with_output(Config::default(), Box::new(io::sink()));
    assert_eq!(
        interpreter.run("double(21)").expect("script should run"),
        Value::Number(42.0)
    );
    assert_eq!(
        interpreter
            .run("len(str(double(50)))")
            .expect("defaults stay available"),
        Value::Number(3.0)
    );

    let second = NativeRegistryBuilder::empty().install();
    assert!(matches!(second, Err(RegistryError::AlreadyInitialized)));
}
