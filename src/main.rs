use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Once;

use clap::{Parser, Subcommand, ValueEnum};

use varexpr::diagnostic::{ansi::AnsiRenderer, json, registry, Diagnostic};
use varexpr::{model, Engine, Snapshot, Value};

#[derive(Parser, Debug)]
#[command(name = "varexpr", version)]
#[command(about = "Evaluate arithmetic expressions over named variables")]
struct Cli {
    /// How errors and warnings are printed
    #[arg(long, value_enum, default_value_t = DiagnosticFormat::Ansi, global = true)]
    diagnostics: DiagnosticFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one expression and print its value
    Eval {
        #[arg(allow_hyphen_values = true)]
        expr: String,
        /// Bind a variable first, as NAME=EXPR (repeatable)
        #[arg(long = "set", value_name = "NAME=EXPR")]
        set: Vec<String>,
        /// Print the compiled program before the result
        #[arg(long)]
        disasm: bool,
        /// Start from a JSON snapshot of variables
        #[arg(long, value_name = "FILE")]
        load: Option<PathBuf>,
    },
    /// Evaluate a model file and print every variable
    Run {
        file: PathBuf,
        /// Print the variables as a JSON snapshot
        #[arg(long)]
        json: bool,
        /// Start from a JSON snapshot of variables
        #[arg(long, value_name = "FILE")]
        load: Option<PathBuf>,
    },
    /// Describe an error code such as VX-S007
    Explain { code: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DiagnosticFormat {
    Ansi,
    Json,
}

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let format = cli.diagnostics;

    let result = match cli.command {
        Command::Eval { expr, set, disasm, load } => eval(&expr, &set, disasm, load.as_deref()),
        Command::Run { file, json, load } => run(&file, json, load.as_deref(), format),
        Command::Explain { code } => explain(&code),
    };

    if let Err(d) = result {
        emit(format, &d);
        process::exit(1);
    }
}

fn emit(format: DiagnosticFormat, d: &Diagnostic) {
    match format {
        DiagnosticFormat::Ansi => {
            let renderer = AnsiRenderer { use_color: std::io::stderr().is_terminal() };
            eprint!("{}", renderer.render(d));
        }
        DiagnosticFormat::Json => eprintln!("{}", json::render(d)),
    }
}

fn engine_from(snapshot: Option<&Path>) -> Result<Engine, Diagnostic> {
    let mut engine = Engine::new();
    if let Some(path) = snapshot {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Diagnostic::error(format!("cannot read {}: {e}", path.display())))?;
        let snapshot = Snapshot::from_json(&text)
            .map_err(|e| Diagnostic::error(format!("{} is not a variable snapshot: {e}", path.display())))?;
        engine.restore(&snapshot);
        tracing::debug!(variables = snapshot.variables.len(), "restored snapshot");
    }
    Ok(engine)
}

fn eval(expr: &str, bindings: &[String], disasm: bool, snapshot: Option<&Path>) -> Result<(), Diagnostic> {
    let mut engine = engine_from(snapshot)?;

    for binding in bindings {
        let Some((name, value)) = binding.split_once('=') else {
            return Err(Diagnostic::error(format!("--set expects NAME=EXPR, got `{binding}`")).with_code("VX-M001"));
        };
        engine
            .define_and_evaluate(name.trim(), value)
            .map_err(|e| Diagnostic::from(&e).with_note(format!("in --set {binding}")))?;
    }

    let program = engine.parse(expr).map_err(|e| Diagnostic::from(&e))?;
    if disasm {
        print!("{program}");
    }
    let value: Value = engine.evaluate().map_err(|e| Diagnostic::from(&e))?;
    println!("{value}");
    Ok(())
}

fn run(file: &Path, as_json: bool, snapshot: Option<&Path>, format: DiagnosticFormat) -> Result<(), Diagnostic> {
    let mut engine = engine_from(snapshot)?;
    let loaded = model::load_file(&mut engine, file)?;
    for warning in &loaded.warnings {
        emit(format, warning);
    }

    if as_json {
        let json = engine
            .snapshot()
            .to_json()
            .map_err(|e| Diagnostic::error(format!("cannot serialise variables: {e}")))?;
        println!("{json}");
    } else {
        for (name, value) in engine.env().iter() {
            match value {
                Value::Text(text) => println!("{name} = \"{text}\""),
                other => println!("{name} = {other}"),
            }
        }
    }
    Ok(())
}

fn explain(code: &str) -> Result<(), Diagnostic> {
    match registry::lookup(code) {
        Some(entry) => {
            println!("{}: {}\n", entry.code, entry.short);
            print!("{}", entry.long);
            Ok(())
        }
        None => Err(Diagnostic::error(format!("unknown error code `{code}`"))),
    }
}
