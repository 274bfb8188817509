use std::cell::RefCell;
use std::rc::Rc;

use crate::env::Env;
use crate::value::{Lambda, Value};

/// Reduce a value in the given scope. Symbols resolve through the
/// environment, S-expressions apply their head, everything else is
/// self-evaluating.
pub fn eval(env: &Rc<RefCell<Env>>, v: Value) -> Value {
    match v {
        Value::Sym(name) => env.borrow().get(&name),
        Value::Sexpr(children) => eval_sexpr(env, children),
        other => other,
    }
}

pub fn eval_sexpr(env: &Rc<RefCell<Env>>, children: Vec<Value>) -> Value {
    let mut children: Vec<Value> = children.into_iter().map(|child| eval(env, child)).collect();

    // First error wins, in index order.
    if let Some(pos) = children.iter().position(Value::is_err) {
        return children.swap_remove(pos);
    }

    match children.len() {
        0 => Value::Sexpr(children),
        1 => children.remove(0),
        _ => {
            let head = children.remove(0);
            match head {
                Value::Builtin(_) | Value::Lambda(_) => call(env, head, children),
                other => Value::err(format!(
                    "S-Expression starts with incorrect type. Got {}, expected Function.",
                    other.type_name()
                )),
            }
        }
    }
}

/// Apply a function value to an argument list.
///
/// Lambdas bind arguments to formals one at a time: a `&` formal wraps
/// the remaining arguments into a Q-expression bound to the rest name,
/// leftover formals produce a partial application, and a fully applied
/// lambda evaluates its body in the captured frame chained below the
/// caller's environment.
pub fn call(env: &Rc<RefCell<Env>>, f: Value, mut args: Vec<Value>) -> Value {
    let mut lam = match f {
        Value::Builtin(func) => return func(Rc::clone(env), args),
        Value::Lambda(lam) => lam,
        other => {
            return Value::err(format!(
                "S-Expression starts with incorrect type. Got {}, expected Function.",
                other.type_name()
            ));
        }
    };

    let given = args.len();
    let total = lam.formals.len();

    while !args.is_empty() {
        if lam.formals.is_empty() {
            return Value::err(format!(
                "Function passed too many args. Got {}, expected {}.",
                given, total
            ));
        }
        let formal = lam.formals.remove(0);
        if formal == "&" {
            if lam.formals.len() != 1 {
                return Value::err(
                    "Function format invalid. Symbol '&' not followed by single symbol.",
                );
            }
            let rest = lam.formals.remove(0);
            lam.env.put(&rest, Value::Qexpr(std::mem::take(&mut args)));
            break;
        }
        let arg = args.remove(0);
        lam.env.put(&formal, arg);
    }

    // A variadic lambda called with no leftover arguments still binds its
    // rest name, to the empty Q-expression.
    if lam.formals.first().is_some_and(|name| name == "&") {
        if lam.formals.len() != 2 {
            return Value::err(
                "Function format invalid. Symbol '&' not followed by single symbol.",
            );
        }
        lam.formals.remove(0);
        let rest = lam.formals.remove(0);
        lam.env.put(&rest, Value::Qexpr(Vec::new()));
    }

    if !lam.formals.is_empty() {
        return Value::Lambda(lam);
    }

    let Lambda { body, env: mut frame, .. } = *lam;
    frame.set_parent(Rc::clone(env));
    eval_sexpr(&Rc::new(RefCell::new(frame)), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::parser;
    use crate::reader;

    fn root() -> Rc<RefCell<Env>> {
        let mut env = Env::new();
        builtins::populate_environment(&mut env);
        Rc::new(RefCell::new(env))
    }

    fn run(env: &Rc<RefCell<Env>>, source: &str) -> Value {
        let ast = parser::parse(source).expect("parse");
        eval(env, Value::Sexpr(reader::read_program(&ast)))
    }

    #[test]
    fn self_evaluating_values() {
        let env = root();
        assert_eq!(eval(&env, Value::Num(9)), Value::Num(9));
        assert_eq!(eval(&env, Value::Str("s".to_string())), Value::Str("s".to_string()));
        let q = Value::Qexpr(vec![Value::Sym("x".to_string())]);
        assert_eq!(eval(&env, q.clone()), q);
    }

    #[test]
    fn symbols_resolve_through_the_environment() {
        let env = root();
        env.borrow_mut().put("x", Value::Num(3));
        assert_eq!(eval(&env, Value::Sym("x".to_string())), Value::Num(3));
        assert_eq!(
            eval(&env, Value::Sym("y".to_string())),
            Value::err("Unbound symbol 'y'")
        );
    }

    #[test]
    fn empty_and_singleton_sexprs() {
        let env = root();
        assert_eq!(run(&env, "()"), Value::empty());
        assert_eq!(run(&env, "(5)"), Value::Num(5));
    }

    #[test]
    fn first_child_error_propagates() {
        let env = root();
        assert_eq!(
            run(&env, "+ 1 nope 2"),
            Value::err("Unbound symbol 'nope'")
        );
    }

    #[test]
    fn non_function_head_is_rejected() {
        let env = root();
        assert_eq!(
            run(&env, "1 2 3"),
            Value::err("S-Expression starts with incorrect type. Got Number, expected Function.")
        );
    }

    #[test]
    fn lambda_application() {
        let env = root();
        assert_eq!(run(&env, r"(\ {x y} {+ x y}) 3 4"), Value::Num(7));
    }

    #[test]
    fn partial_application_keeps_leftover_formals() {
        let env = root();
        run(&env, r"def {add3} (\ {a b c} {+ a b c})");
        let partial = run(&env, "add3 1 2");
        match &partial {
            Value::Lambda(lam) => assert_eq!(lam.formals, vec!["c".to_string()]),
            other => panic!("expected a lambda, got {}", other),
        }
        run(&env, "def {add12} (add3 1 2)");
        assert_eq!(run(&env, "add12 30"), Value::Num(33));
        assert_eq!(run(&env, "((add3 1) 2 3)"), Value::Num(6));
    }

    #[test]
    fn too_many_arguments() {
        let env = root();
        assert_eq!(
            run(&env, r"(\ {x} {x}) 1 2"),
            Value::err("Function passed too many args. Got 2, expected 1.")
        );
    }

    #[test]
    fn rest_parameter_collects_the_tail() {
        let env = root();
        run(&env, r"def {pack-all} (\ {& xs} {xs})");
        assert_eq!(
            run(&env, "pack-all 1 2 3"),
            Value::Qexpr(vec![Value::Num(1), Value::Num(2), Value::Num(3)])
        );
    }

    #[test]
    fn rest_parameter_defaults_to_empty() {
        let env = root();
        run(&env, r"def {first-only} (\ {x & xs} {xs})");
        assert_eq!(run(&env, "first-only 7"), Value::Qexpr(Vec::new()));
    }

    #[test]
    fn malformed_rest_formals() {
        let env = root();
        let expected =
            Value::err("Function format invalid. Symbol '&' not followed by single symbol.");
        assert_eq!(run(&env, r"(\ {&} {1}) 5"), expected);
        assert_eq!(run(&env, r"(\ {& a b} {1}) 5"), expected);
        assert_eq!(run(&env, r"(\ {x & a b} {1}) 5"), expected);
    }

    #[test]
    fn ampersand_alone_is_just_unbound() {
        let env = root();
        assert_eq!(run(&env, "(& 1)"), Value::err("Unbound symbol '&'"));
    }

    #[test]
    fn body_sees_formals_then_callers_chain() {
        let env = root();
        run(&env, "def {x} 10");
        run(&env, r"def {f} (\ {y} {+ x y})");
        assert_eq!(run(&env, "f 1"), Value::Num(11));
        // Rebinding at the root is visible to later calls.
        run(&env, "def {x} 99");
        assert_eq!(run(&env, "f 1"), Value::Num(100));
    }
}
