use std::cell::RefCell;
use std::rc::Rc;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use lispy::builtins;
use lispy::env::Env;
use lispy::eval;
use lispy::parser;
use lispy::reader;
use lispy::value::Value;

fn main() {
    let mut root = Env::new();
    builtins::populate_environment(&mut root);
    let root = Rc::new(RefCell::new(root));

    let files: Vec<String> = std::env::args().skip(1).collect();
    if files.is_empty() {
        repl(&root);
    } else {
        for file in files {
            let expr = Value::Sexpr(vec![Value::Sym("load".to_string()), Value::Str(file)]);
            let result = eval::eval(&root, expr);
            if result.is_err() {
                println!("{}", result);
            }
        }
    }
}

fn repl(env: &Rc<RefCell<Env>>) {
    println!("Lispy Version 0.1.0");
    println!("Type 'exit' or press Ctrl+D to quit");

    let mut rl = DefaultEditor::new().expect("line editor");
    loop {
        match rl.readline("lispy> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                let _ = rl.add_history_entry(line);

                match parser::parse(line) {
                    Ok(ast) => {
                        let expr = Value::Sexpr(reader::read_program(&ast));
                        let result = eval::eval(env, expr);
                        println!("{}", result);
                    }
                    Err(err) => println!("Parse Error: {}", err),
                }
            }
            // Ctrl+C abandons the current line, not the session.
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
}
