//! Host-implemented functions exposed to scripts.
//!
//! The process-wide registry is written once, either explicitly through
//! [`NativeRegistryBuilder::install`] or lazily with the default set on the
//! first call to [`registry`], and is read-only afterwards.

use std::{
    collections::BTreeMap,
    fmt,
    io::Write,
    rc::Rc,
    sync::{Arc, OnceLock},
    time::{SystemTime, UNIX_EPOCH},
};

use log::debug;
use thiserror::Error;

use crate::{
    environment::Environment,
    error::{EvalResult, RuntimeError},
    value::Value,
};

/// Receives the evaluated arguments, the calling environment and the output sink.
pub type NativeCallback =
    dyn Fn(&[Value], &Rc<Environment>, &mut dyn Write) -> EvalResult<Value> + Send + Sync;

pub struct NativeFunction {
    pub name: String,
    func: Box<NativeCallback>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value], &Rc<Environment>, &mut dyn Write) -> EvalResult<Value>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn call(
        &self,
        args: &[Value],
        env: &Rc<Environment>,
        out: &mut dyn Write,
    ) -> EvalResult<Value> {
        (self.func)(args, env, out)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("native function registry is already initialized")]
    AlreadyInitialized,
}

static REGISTRY: OnceLock<NativeRegistry> = OnceLock::new();

/// The registry in effect for this process, initialized with the defaults on first use.
pub fn registry() -> &'static NativeRegistry {
    REGISTRY.get_or_init(|| NativeRegistryBuilder::with_defaults().build())
}

#[derive(Debug)]
pub struct NativeRegistry {
    functions: BTreeMap<String, Arc<NativeFunction>>,
}

impl NativeRegistry {
    pub fn builder() -> NativeRegistryBuilder {
        NativeRegistryBuilder::with_defaults()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<NativeFunction>> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Arc<NativeFunction>> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

pub struct NativeRegistryBuilder {
    functions: BTreeMap<String, Arc<NativeFunction>>,
}

impl NativeRegistryBuilder {
    pub fn empty() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::empty()
            .register("print", print)
            .register("time", time)
            .register("len", len)
            .register("str", str)
            .register("num", num)
    }

    /// Adds or replaces the function registered under `name`.
    pub fn register<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&[Value], &Rc<Environment>, &mut dyn Write) -> EvalResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.functions
            .insert(name.to_string(), Arc::new(NativeFunction::new(name, func)));
        self
    }

    pub fn build(self) -> NativeRegistry {
        NativeRegistry {
            functions: self.functions,
        }
    }

    /// Makes this the process-wide registry. Fails once the registry has been
    /// installed or read.
    pub fn install(self) -> Result<&'static NativeRegistry, RegistryError> {
        let names: Vec<String> = self.functions.keys().cloned().collect();
        REGISTRY
            .set(self.build())
            .map_err(|_| RegistryError::AlreadyInitialized)?;
        debug!("installed native functions: {}", names.join(", "));
        Ok(registry())
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> EvalResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RuntimeError::NativeArity {
            name: name.to_string(),
            expected,
            found: args.len(),
        })
    }
}

fn print(args: &[Value], _env: &Rc<Environment>, out: &mut dyn Write) -> EvalResult<Value> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{}", line).map_err(|err| RuntimeError::Native {
        name: "print".to_string(),
        message: err.to_string(),
    })?;
    Ok(Value::Null)
}

fn time(args: &[Value], _env: &Rc<Environment>, _out: &mut dyn Write) -> EvalResult<Value> {
    expect_arity("time", args, 0)?;
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| RuntimeError::Native {
            name: "time".to_string(),
            message: err.to_string(),
        })?;
    Ok(Value::Number(elapsed.as_millis() as f64))
}

fn len(args: &[Value], _env: &Rc<Environment>, _out: &mut dyn Write) -> EvalResult<Value> {
    expect_arity("len", args, 1)?;
    Ok(match &args[0] {
        Value::String(s) => Value::Number(s.chars().count() as f64),
        Value::Object(fields) => Value::Number(fields.len() as f64),
        _ => Value::Null,
    })
}

fn str(args: &[Value], _env: &Rc<Environment>, _out: &mut dyn Write) -> EvalResult<Value> {
    expect_arity("str", args, 1)?;
    Ok(Value::String(args[0].to_string()))
}

fn num(args: &[Value], _env: &Rc<Environment>, _out: &mut dyn Write) -> EvalResult<Value> {
    expect_arity("num", args, 1)?;
    Ok(match &args[0] {
        Value::Number(n) => Value::Number(*n),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map_or(Value::Null, Value::Number),
        _ => Value::Null,
    })
}
