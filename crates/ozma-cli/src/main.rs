use std::{env, fs, process::ExitCode};

use ozma::{Store, compile_unit};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = if args.len() > 1 { &args[1] } else { "example.oz" };
    let code = match read_file(file_path) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut store = Store::new();
    let compilation = match compile_unit(&code, &mut store) {
        Ok(compilation) => compilation,
        Err(err) => {
            eprintln!("error:\n{err}");
            return ExitCode::FAILURE;
        }
    };

    if !compilation.segment.is_empty() {
        println!("top level:");
        print!("{}", compilation.segment.disassemble(&store));
    }
    if let Some(closure) = store.as_closure(compilation.value) {
        println!(
            "closure: params={} locals={} closures={}",
            closure.nparams, closure.nlocals, closure.nclosures
        );
        print!("{}", closure.segment.disassemble(&store));
    }
    println!("result: {}", store.render(compilation.value));
    ExitCode::SUCCESS
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("cannot read {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("cannot read {file_path}: {err}"))
}
