use std::io::Write;

use clap::{Args, Parser, Subcommand};
use lumen::{
    parser::SyntaxError,
    tokenizer::TokenizeError,
    tree_walk_interpreter::{ExecutionError, Interpreter, Value},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Run and inspect lumen scripts")]
struct Cli {
    /// Log filter, e.g. `debug` or `lumen=trace`. Falls back to RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a script.
    Run(FileArgs),
    /// Interactive prompt (default).
    Repl,
    /// Print the parsed program back as source.
    Parse(FileArgs),
    /// Dump the token stream.
    Tokens(FileArgs),
}

#[derive(Debug, Args)]
struct FileArgs {
    file: String,
}

#[derive(Debug, thiserror::Error)]
enum LumenError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

fn main() {
    let args = Cli::parse();
    init_logging(args.log_level.as_deref());

    let result = match args.command() {
        Command::Repl => {
            repl_command();
            Ok(())
        }
        Command::Run(args) => run_command(args),
        Command::Parse(args) => parse_command(args),
        Command::Tokens(args) => tokens_command(args),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_source(path: &str) -> Result<String, LumenError> {
    std::fs::read_to_string(path).map_err(|source| LumenError::Read {
        path: path.to_string(),
        source,
    })
}

fn repl_command() {
    println!("Welcome to the lumen REPL!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    let mut interpreter = Interpreter::default();
    loop {
        let mut input = String::new();

        print!("> ");
        std::io::stdout()
            .flush()
            .expect("should be able to flush stdout");

        let read = std::io::stdin()
            .read_line(&mut input)
            .expect("should be able to read line from stdin");

        if read == 0 {
            break;
        }

        match interpret(&mut interpreter, input.trim()) {
            Ok(Value::Nil) => {}
            Ok(value) => println!("{value}"),
            Err(e) => println!("Error: {e}"),
        }
    }
}

fn run_command(args: &FileArgs) -> Result<(), LumenError> {
    let source = read_source(&args.file)?;
    interpret(&mut Interpreter::default(), &source)?;
    Ok(())
}

fn parse_command(args: &FileArgs) -> Result<(), LumenError> {
    let source = read_source(&args.file)?;
    let tokens = lumen::tokenizer::tokens(&source)?;
    let program = lumen::parser::program(&tokens)?;
    print!("{program}");
    Ok(())
}

fn tokens_command(args: &FileArgs) -> Result<(), LumenError> {
    let source = read_source(&args.file)?;
    let mut line = 0;
    for token in lumen::tokenizer::tokens(&source)? {
        if token.line != line {
            print!("{:4} ", token.line);
            line = token.line;
        } else {
            print!("   | ");
        }

        println!("{:<12} {}", token.kind.to_string(), token);
    }
    Ok(())
}

fn interpret(interpreter: &mut Interpreter, source: &str) -> Result<Value, LumenError> {
    let tokens = lumen::tokenizer::tokens(source)?;
    let program = lumen::parser::program(&tokens)?;
    Ok(interpreter.interpret(&program)?)
}
