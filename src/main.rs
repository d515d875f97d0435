use clap::{Arg, Command as ClapCommand};
use std::fs;

use grimoire::{CompileError, Compiler, ContextTypes};

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), CompileError> {
    let matches = ClapCommand::new("grimoire")
        .version("0.1.0")
        .about("Grimoire scripting language compiler")
        .arg(
            Arg::new("input")
                .help("Input script file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Write the emitted code to this file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the compile result as a JSON object")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("return-type-only")
                .long("return-type-only")
                .help("Print only the inferred return type")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let input_file = matches.get_one::<String>("input").unwrap();
    let as_json = matches.get_flag("json");
    let type_only = matches.get_flag("return-type-only");

    let source = fs::read_to_string(input_file)?;

    // standalone invocations compile against an empty host context;
    // embedders construct their own Compiler with real bindings
    let mut compiler = Compiler::new(ContextTypes::new());

    match compiler.compile(&source) {
        Ok(output) => {
            if as_json {
                println!(
                    "{}",
                    serde_json::json!({
                        "ok": true,
                        "returnType": output.return_type,
                        "code": output.code,
                    })
                );
            } else if type_only {
                println!("{}", output.return_type);
            } else if let Some(path) = matches.get_one::<String>("output") {
                fs::write(path, &output.code)?;
                println!(
                    "Compiled {} to {} (returns {})",
                    input_file, path, output.return_type
                );
            } else {
                println!("// returns {}", output.return_type);
                println!("{}", output.code);
            }
            Ok(())
        }
        Err(err) => {
            if as_json {
                println!(
                    "{}",
                    serde_json::json!({ "ok": false, "error": err.to_string() })
                );
            }
            Err(err)
        }
    }
}
