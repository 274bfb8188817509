use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use lazy_static::lazy_static;

use crate::env::Env;
use crate::eval::{eval, eval_sexpr};
use crate::parser;
use crate::reader;
use crate::value::{BuiltinFn, Value};

// Every builtin reports argument violations through these helpers, so
// all messages carry the function name and zero-based argument index in
// the same shape.

fn type_mismatch(func: &str, index: usize, got: &str, expected: &str) -> String {
    format!(
        "Function '{}' passed incorrect type for argument {}. Got {}, expected {}.",
        func, index, got, expected
    )
}

macro_rules! ensure {
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Value::err(format!($($msg)+));
        }
    };
}

macro_rules! ensure_arity {
    ($name:expr, $args:expr, $count:expr) => {
        ensure!(
            $args.len() == $count,
            "Function '{}' passed incorrect num of args. Got {}, expected {}.",
            $name,
            $args.len(),
            $count
        );
    };
}

// Detach the next argument, requiring a particular variant. `$index` is
// the zero-based position reported on a mismatch.
macro_rules! next_num {
    ($name:expr, $args:expr, $index:expr) => {
        match $args.remove(0) {
            Value::Num(n) => n,
            other => return Value::err(type_mismatch($name, $index, other.type_name(), "Number")),
        }
    };
}

macro_rules! next_qexpr {
    ($name:expr, $args:expr, $index:expr) => {
        match $args.remove(0) {
            Value::Qexpr(children) => children,
            other => {
                return Value::err(type_mismatch($name, $index, other.type_name(), "Q-Expression"));
            }
        }
    };
}

macro_rules! next_string {
    ($name:expr, $args:expr, $index:expr) => {
        match $args.remove(0) {
            Value::Str(s) => s,
            other => return Value::err(type_mismatch($name, $index, other.type_name(), "String")),
        }
    };
}

// --- List operations ---

fn list(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    Value::Qexpr(args)
}

fn head(_env: Rc<RefCell<Env>>, mut args: Vec<Value>) -> Value {
    ensure_arity!("head", args, 1);
    let mut children = next_qexpr!("head", args, 0);
    ensure!(!children.is_empty(), "Function 'head' passed {{}} for argument 0");
    children.truncate(1);
    Value::Qexpr(children)
}

fn tail(_env: Rc<RefCell<Env>>, mut args: Vec<Value>) -> Value {
    ensure_arity!("tail", args, 1);
    let mut children = next_qexpr!("tail", args, 0);
    ensure!(!children.is_empty(), "Function 'tail' passed {{}} for argument 0");
    children.remove(0);
    Value::Qexpr(children)
}

fn join(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    ensure!(
        !args.is_empty(),
        "Function 'join' passed incorrect num of args. Got 0, expected at least 1."
    );
    let mut joined = Vec::new();
    for (index, arg) in args.into_iter().enumerate() {
        match arg {
            Value::Qexpr(mut children) => joined.append(&mut children),
            other => {
                return Value::err(type_mismatch("join", index, other.type_name(), "Q-Expression"));
            }
        }
    }
    Value::Qexpr(joined)
}

fn builtin_eval(env: Rc<RefCell<Env>>, mut args: Vec<Value>) -> Value {
    ensure_arity!("eval", args, 1);
    let children = next_qexpr!("eval", args, 0);
    eval_sexpr(&env, children)
}

// --- Arithmetic ---

// Left fold over the operands; wraps on overflow.
fn arithmetic(name: &'static str, args: Vec<Value>) -> Value {
    let mut nums: Vec<i64> = Vec::with_capacity(args.len());
    for (index, arg) in args.into_iter().enumerate() {
        match arg {
            Value::Num(n) => nums.push(n),
            other => return Value::err(type_mismatch(name, index, other.type_name(), "Number")),
        }
    }

    let Some((&first, rest)) = nums.split_first() else {
        return Value::err(format!(
            "Function '{}' passed incorrect num of args. Got 0, expected at least 1.",
            name
        ));
    };
    if rest.is_empty() && name == "-" {
        return Value::Num(first.wrapping_neg());
    }

    let mut acc = first;
    for &n in rest {
        match name {
            "+" => acc = acc.wrapping_add(n),
            "-" => acc = acc.wrapping_sub(n),
            "*" => acc = acc.wrapping_mul(n),
            _ => {
                if n == 0 {
                    return Value::err("Division by Zero!");
                }
                acc = acc.wrapping_div(n);
            }
        }
    }
    Value::Num(acc)
}

fn add(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    arithmetic("+", args)
}

fn subtract(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    arithmetic("-", args)
}

fn multiply(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    arithmetic("*", args)
}

fn divide(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    arithmetic("/", args)
}

// --- Comparison ---

fn ordering(name: &'static str, mut args: Vec<Value>) -> Value {
    ensure_arity!(name, args, 2);
    let x = next_num!(name, args, 0);
    let y = next_num!(name, args, 1);
    let truth = match name {
        "<" => x < y,
        ">" => x > y,
        "<=" => x <= y,
        _ => x >= y,
    };
    Value::Num(truth as i64)
}

fn less_than(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    ordering("<", args)
}

fn greater_than(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    ordering(">", args)
}

fn less_or_equal(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    ordering("<=", args)
}

fn greater_or_equal(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    ordering(">=", args)
}

fn equality(name: &'static str, mut args: Vec<Value>, want: bool) -> Value {
    ensure_arity!(name, args, 2);
    let rhs = args.remove(1);
    let lhs = args.remove(0);
    Value::Num(((lhs == rhs) == want) as i64)
}

fn equal(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    equality("==", args, true)
}

fn not_equal(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    equality("!=", args, false)
}

// --- Control and definition ---

fn builtin_if(env: Rc<RefCell<Env>>, mut args: Vec<Value>) -> Value {
    ensure_arity!("if", args, 3);
    let cond = next_num!("if", args, 0);
    let consequent = next_qexpr!("if", args, 1);
    let alternative = next_qexpr!("if", args, 2);
    let branch = if cond != 0 { consequent } else { alternative };
    eval_sexpr(&env, branch)
}

fn lambda(_env: Rc<RefCell<Env>>, mut args: Vec<Value>) -> Value {
    ensure_arity!("\\", args, 2);
    let formals = next_qexpr!("\\", args, 0);
    let body = next_qexpr!("\\", args, 1);

    let mut names = Vec::with_capacity(formals.len());
    for formal in formals {
        match formal {
            Value::Sym(name) => names.push(name),
            other => {
                return Value::err(format!(
                    "Cannot define non-symbol. Got {}, expected Symbol.",
                    other.type_name()
                ));
            }
        }
    }
    Value::lambda(names, body)
}

fn define(env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    bind_symbols("def", env, args)
}

fn assign(env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    bind_symbols("=", env, args)
}

// Shared body of `def` (root frame) and `=` (current frame).
fn bind_symbols(name: &'static str, env: Rc<RefCell<Env>>, mut args: Vec<Value>) -> Value {
    ensure!(
        !args.is_empty(),
        "Function '{}' passed incorrect num of args. Got 0, expected at least 1.",
        name
    );
    let symbols = next_qexpr!(name, args, 0);

    let mut names = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match symbol {
            Value::Sym(s) => names.push(s),
            other => {
                return Value::err(format!(
                    "Function '{}' cannot define non-symbol. Got {}, expected Symbol.",
                    name,
                    other.type_name()
                ));
            }
        }
    }
    ensure!(
        names.len() == args.len(),
        "Function '{}' passed too many arguments for symbols. Got {}, expected {}.",
        name,
        args.len(),
        names.len()
    );

    for (sym, val) in names.into_iter().zip(args) {
        if name == "def" {
            env.borrow_mut().def(&sym, val);
        } else {
            env.borrow_mut().put(&sym, val);
        }
    }
    Value::empty()
}

// --- I/O ---

fn load(env: Rc<RefCell<Env>>, mut args: Vec<Value>) -> Value {
    ensure_arity!("load", args, 1);
    let path = next_string!("load", args, 0);

    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) => return Value::err(format!("Could not load Library {}", err)),
    };
    let ast = match parser::parse(&source) {
        Ok(ast) => ast,
        Err(err) => return Value::err(format!("Could not load Library {}", err)),
    };

    // Top-level errors are printed and evaluation of the rest continues.
    for expr in reader::read_program(&ast) {
        let result = eval(&env, expr);
        if result.is_err() {
            println!("{}", result);
        }
    }
    Value::empty()
}

fn print(_env: Rc<RefCell<Env>>, args: Vec<Value>) -> Value {
    let parts: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    println!("{}", parts.join(" "));
    Value::empty()
}

fn error(_env: Rc<RefCell<Env>>, mut args: Vec<Value>) -> Value {
    ensure_arity!("error", args, 1);
    let msg = next_string!("error", args, 0);
    Value::Err(msg)
}

lazy_static! {
    static ref BUILTINS: Vec<(&'static str, BuiltinFn)> = vec![
        // Lists
        ("list", list as BuiltinFn),
        ("head", head),
        ("tail", tail),
        ("join", join),
        ("eval", builtin_eval),
        // Arithmetic
        ("+", add),
        ("-", subtract),
        ("*", multiply),
        ("/", divide),
        // Comparison
        ("<", less_than),
        (">", greater_than),
        ("<=", less_or_equal),
        (">=", greater_or_equal),
        ("==", equal),
        ("!=", not_equal),
        // Control and definition
        ("if", builtin_if),
        ("\\", lambda),
        ("def", define),
        ("=", assign),
        // I/O
        ("load", load),
        ("print", print),
        ("error", error),
    ];
}

/// Install every native operation into the given (root) frame.
pub fn populate_environment(env: &mut Env) {
    for &(name, func) in BUILTINS.iter() {
        env.put(name, Value::Builtin(func));
    }
}
