//! Seed-script evaluator
//!
//! Runs inside the isolated worker with a restricted builtin set: no
//! filesystem, no network, no process primitives. Imports resolve only to
//! the in-process module table; anything else is a runtime error.

use std::collections::BTreeMap;

use crate::ast::{BinOp, Expr, Module, Stmt};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<ScriptValue>),
    ModuleRef(String),
    Builtin(&'static str),
    None,
}

impl ScriptValue {
    fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Int(_) => "int",
            ScriptValue::Float(_) => "float",
            ScriptValue::Str(_) => "str",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::List(_) => "list",
            ScriptValue::ModuleRef(_) => "module",
            ScriptValue::Builtin(_) => "builtin",
            ScriptValue::None => "none",
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Int(value) => Some(*value as f64),
            ScriptValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            ScriptValue::Int(value) => *value != 0,
            ScriptValue::Float(value) => *value != 0.0,
            ScriptValue::Str(value) => !value.is_empty(),
            ScriptValue::Bool(value) => *value,
            ScriptValue::List(items) => !items.is_empty(),
            ScriptValue::ModuleRef(_) | ScriptValue::Builtin(_) => true,
            ScriptValue::None => false,
        }
    }
}

const BUILTIN_NAMES: [&str; 8] = ["abs", "min", "max", "len", "str", "int", "float", "sum"];

struct Interp {
    names: BTreeMap<String, ScriptValue>,
}

type EvalResult = Result<ScriptValue, String>;

impl Interp {
    fn new() -> Self {
        let mut names = BTreeMap::new();
        for builtin in BUILTIN_NAMES {
            names.insert(builtin.to_string(), ScriptValue::Builtin(builtin));
        }
        Self { names }
    }

    fn exec_block(&mut self, body: &[Stmt]) -> Result<(), String> {
        for stmt in body {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), String> {
        match stmt {
            Stmt::Import(name) => {
                self.names
                    .insert(name.clone(), ScriptValue::ModuleRef(name.clone()));
                Ok(())
            }
            Stmt::Assign(name, value) => {
                let value = self.eval(value)?;
                self.names.insert(name.clone(), value);
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(())
            }
            Stmt::While(condition, body) => {
                while self.eval(condition)?.truthy() {
                    self.exec_block(body)?;
                }
                Ok(())
            }
            Stmt::Pass => Ok(()),
        }
    }

    fn eval(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Int(value) => Ok(ScriptValue::Int(*value)),
            Expr::Float(value) => Ok(ScriptValue::Float(*value)),
            Expr::Str(value) => Ok(ScriptValue::Str(value.clone())),
            Expr::Bool(value) => Ok(ScriptValue::Bool(*value)),
            Expr::Name(name) => self
                .names
                .get(name)
                .cloned()
                .ok_or_else(|| format!("undefined name: {name}")),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(ScriptValue::List(values))
            }
            Expr::Neg(inner) => match self.eval(inner)? {
                ScriptValue::Int(value) => Ok(ScriptValue::Int(-value)),
                ScriptValue::Float(value) => Ok(ScriptValue::Float(-value)),
                other => Err(format!("cannot negate {}", other.type_name())),
            },
            Expr::Attr(base, attr) => {
                let base = self.eval(base)?;
                match base {
                    ScriptValue::ModuleRef(module) => module_attr(&module, attr),
                    other => Err(format!(
                        "{} has no attribute {attr}",
                        other.type_name()
                    )),
                }
            }
            Expr::Call(callee, args) => {
                let callee = self.eval(callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                match callee {
                    ScriptValue::Builtin(name) => call_builtin(name, &values),
                    other => Err(format!("{} is not callable", other.type_name())),
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
        }
    }
}

fn numeric_pair(left: &ScriptValue, right: &ScriptValue) -> Option<(f64, f64, bool)> {
    let both_int = matches!(
        (left, right),
        (ScriptValue::Int(_), ScriptValue::Int(_))
    );
    Some((left.as_number()?, right.as_number()?, both_int))
}

fn binary(op: BinOp, left: &ScriptValue, right: &ScriptValue) -> EvalResult {
    if let BinOp::Add = op {
        if let (ScriptValue::Str(a), ScriptValue::Str(b)) = (left, right) {
            return Ok(ScriptValue::Str(format!("{a}{b}")));
        }
    }
    match op {
        BinOp::Eq => return Ok(ScriptValue::Bool(left == right)),
        BinOp::Ne => return Ok(ScriptValue::Bool(left != right)),
        _ => {}
    }

    let Some((a, b, both_int)) = numeric_pair(left, right) else {
        return Err(format!(
            "unsupported operands: {} and {}",
            left.type_name(),
            right.type_name()
        ));
    };
    let numeric = |value: f64| {
        if both_int && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            ScriptValue::Int(value as i64)
        } else {
            ScriptValue::Float(value)
        }
    };
    match op {
        BinOp::Add => Ok(numeric(a + b)),
        BinOp::Sub => Ok(numeric(a - b)),
        BinOp::Mul => Ok(numeric(a * b)),
        BinOp::Div => {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                Ok(ScriptValue::Float(a / b))
            }
        }
        BinOp::Rem => {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                Ok(numeric(a % b))
            }
        }
        BinOp::Lt => Ok(ScriptValue::Bool(a < b)),
        BinOp::Le => Ok(ScriptValue::Bool(a <= b)),
        BinOp::Gt => Ok(ScriptValue::Bool(a > b)),
        BinOp::Ge => Ok(ScriptValue::Bool(a >= b)),
        BinOp::Eq | BinOp::Ne => unreachable!("handled above"),
    }
}

fn module_attr(module: &str, attr: &str) -> EvalResult {
    match (module, attr) {
        ("math", "pi") => Ok(ScriptValue::Float(std::f64::consts::PI)),
        ("math", "e") => Ok(ScriptValue::Float(std::f64::consts::E)),
        ("math", "sqrt") => Ok(ScriptValue::Builtin("math.sqrt")),
        ("math", "floor") => Ok(ScriptValue::Builtin("math.floor")),
        ("math", "ceil") => Ok(ScriptValue::Builtin("math.ceil")),
        ("math", "pow") => Ok(ScriptValue::Builtin("math.pow")),
        _ => Err(format!("module {module} has no attribute {attr}")),
    }
}

fn arity(name: &str, args: &[ScriptValue], expected: usize) -> Result<(), String> {
    if args.len() != expected {
        Err(format!("{name} expects {expected} argument(s), got {}", args.len()))
    } else {
        Ok(())
    }
}

fn number_arg(name: &str, value: &ScriptValue) -> Result<f64, String> {
    value
        .as_number()
        .ok_or_else(|| format!("{name} expects a number, got {}", value.type_name()))
}

fn call_builtin(name: &str, args: &[ScriptValue]) -> EvalResult {
    match name {
        "abs" => {
            arity(name, args, 1)?;
            match &args[0] {
                ScriptValue::Int(value) => Ok(ScriptValue::Int(value.abs())),
                ScriptValue::Float(value) => Ok(ScriptValue::Float(value.abs())),
                other => Err(format!("abs expects a number, got {}", other.type_name())),
            }
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(format!("{name} expects at least 1 argument"));
            }
            let mut best = number_arg(name, &args[0])?;
            for arg in &args[1..] {
                let value = number_arg(name, arg)?;
                best = if name == "min" {
                    best.min(value)
                } else {
                    best.max(value)
                };
            }
            Ok(ScriptValue::Float(best))
        }
        "len" => {
            arity(name, args, 1)?;
            match &args[0] {
                ScriptValue::Str(value) => Ok(ScriptValue::Int(value.chars().count() as i64)),
                ScriptValue::List(items) => Ok(ScriptValue::Int(items.len() as i64)),
                other => Err(format!("len expects str or list, got {}", other.type_name())),
            }
        }
        "str" => {
            arity(name, args, 1)?;
            let rendered = match &args[0] {
                ScriptValue::Int(value) => value.to_string(),
                ScriptValue::Float(value) => value.to_string(),
                ScriptValue::Str(value) => value.clone(),
                ScriptValue::Bool(value) => value.to_string(),
                other => format!("<{}>", other.type_name()),
            };
            Ok(ScriptValue::Str(rendered))
        }
        "int" => {
            arity(name, args, 1)?;
            match &args[0] {
                ScriptValue::Int(value) => Ok(ScriptValue::Int(*value)),
                ScriptValue::Float(value) => Ok(ScriptValue::Int(*value as i64)),
                ScriptValue::Str(value) => value
                    .trim()
                    .parse()
                    .map(ScriptValue::Int)
                    .map_err(|_| format!("cannot parse {value:?} as int")),
                other => Err(format!("int expects a number or str, got {}", other.type_name())),
            }
        }
        "float" => {
            arity(name, args, 1)?;
            match &args[0] {
                ScriptValue::Int(value) => Ok(ScriptValue::Float(*value as f64)),
                ScriptValue::Float(value) => Ok(ScriptValue::Float(*value)),
                ScriptValue::Str(value) => value
                    .trim()
                    .parse()
                    .map(ScriptValue::Float)
                    .map_err(|_| format!("cannot parse {value:?} as float")),
                other => Err(format!("float expects a number or str, got {}", other.type_name())),
            }
        }
        "sum" => {
            arity(name, args, 1)?;
            match &args[0] {
                ScriptValue::List(items) => {
                    let mut total = 0.0;
                    for item in items {
                        total += number_arg(name, item)?;
                    }
                    Ok(ScriptValue::Float(total))
                }
                other => Err(format!("sum expects a list, got {}", other.type_name())),
            }
        }
        "math.sqrt" => {
            arity(name, args, 1)?;
            let value = number_arg(name, &args[0])?;
            if value < 0.0 {
                Err("math.sqrt of a negative number".to_string())
            } else {
                Ok(ScriptValue::Float(value.sqrt()))
            }
        }
        "math.floor" => {
            arity(name, args, 1)?;
            Ok(ScriptValue::Int(number_arg(name, &args[0])?.floor() as i64))
        }
        "math.ceil" => {
            arity(name, args, 1)?;
            Ok(ScriptValue::Int(number_arg(name, &args[0])?.ceil() as i64))
        }
        "math.pow" => {
            arity(name, args, 2)?;
            let base = number_arg(name, &args[0])?;
            let exponent = number_arg(name, &args[1])?;
            Ok(ScriptValue::Float(base.powf(exponent)))
        }
        other => Err(format!("unknown builtin: {other}")),
    }
}

/// Execute a parsed module to completion.
pub fn run_module(module: &Module) -> Result<(), String> {
    Interp::new().exec_block(&module.body)
}
