//! Command-line driver for stackjs
//!
//! Usage: stackjs [options] <file.js>
//!
//! Options:
//!   --dump             Print the compiled Code as JSON instead of running it
//!   --max-depth <n>    Maximum call stack depth (default: 512)
//!   --strict-globals   Top-level bindings are non-configurable
//!
//! `print(...)` writes through `tracing` at info level; set `RUST_LOG` to
//! change what is shown.

use std::env;
use std::fs;
use std::path::PathBuf;

use stackjs::interpreter::abstract_ops::to_string;
use stackjs::{CompileOptions, CompletionType, Realm, RealmConfig, compile};
use tracing_subscriber::EnvFilter;

/// Stack for the interpreter thread; guest recursion is bounded well below it
const STACK_SIZE: usize = 64 * 1024 * 1024;

fn main() {
    let outcome = std::thread::Builder::new()
        .name("stackjs-main".into())
        .stack_size(STACK_SIZE)
        .spawn(run)
        .map_err(|e| format!("Failed to spawn interpreter thread: {}", e))
        .and_then(|handle| {
            handle
                .join()
                .unwrap_or_else(|_| Err("Interpreter thread panicked".to_string()))
        });
    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// CLI configuration
struct Config {
    entry_path: PathBuf,
    dump: bool,
    max_depth: Option<usize>,
    strict_globals: bool,
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let program_name = args.first().map_or("stackjs", |s| s.as_str());

    let mut dump = false;
    let mut max_depth: Option<usize> = None;
    let mut strict_globals = false;
    let mut entry_arg: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        let Some(arg) = args.get(i) else {
            break;
        };
        match arg.as_str() {
            "--dump" => dump = true,
            "--strict-globals" => strict_globals = true,
            "--max-depth" => {
                i += 1;
                max_depth = Some(
                    args.get(i)
                        .ok_or("--max-depth requires a value")?
                        .parse()
                        .map_err(|_| "Invalid max-depth value")?,
                );
            }
            "-h" | "--help" => {
                return Err(format!(
                    "Usage: {} [--dump] [--max-depth <n>] [--strict-globals] <file.js>",
                    program_name
                ));
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown option: {}", other));
            }
            other => {
                if entry_arg.is_some() {
                    return Err("Only one entry file may be given".to_string());
                }
                entry_arg = Some(other);
            }
        }
        i += 1;
    }

    let entry_arg = entry_arg.ok_or_else(|| {
        format!(
            "Usage: {} [--dump] [--max-depth <n>] [--strict-globals] <file.js>",
            program_name
        )
    })?;

    Ok(Config {
        entry_path: PathBuf::from(entry_arg),
        dump,
        max_depth,
        strict_globals,
    })
}

fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = parse_args()?;
    let source = fs::read_to_string(&config.entry_path)
        .map_err(|e| format!("Failed to read {}: {}", config.entry_path.display(), e))?;

    let options = CompileOptions {
        scoped: config.strict_globals,
        ..CompileOptions::default()
    };
    let code = compile(&source, &options).map_err(|e| e.to_string())?;

    if config.dump {
        let json = serde_json::to_string_pretty(&*code).map_err(|e| e.to_string())?;
        println!("{}", json);
        return Ok(());
    }

    let mut realm_config = RealmConfig {
        max_stack_bytes: STACK_SIZE / 2,
        ..RealmConfig::default()
    };
    if let Some(depth) = config.max_depth {
        realm_config.max_call_depth = depth;
    }
    let realm = Realm::with_config(realm_config);

    let completion = realm.run(&code).map_err(|e| format!("Internal error: {}", e))?;
    match completion.kind {
        CompletionType::Throw => {
            let thrown = completion.value();
            let text = to_string(&realm, &thrown)
                .map(|s| s.to_string())
                .unwrap_or_else(|_| format!("{:?}", thrown));
            Err(format!("Uncaught {}", text))
        }
        _ => Ok(()),
    }
}
