use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use log::info;

use monkey::bytecode::compile::Compiler;
use monkey::bytecode::disasm::print_bc;
use monkey::bytecode::verify::verify;
use monkey::bytecode::Bytecode;
use monkey::frontend::{repl, tree::load_program};
use monkey::runtime::Vm;

#[derive(Parser)]
#[command(name = "monkey", version, about = "Monkey bytecode compiler and VM")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a JSON syntax tree and run it
    Run {
        file: PathBuf,

        /// Print the disassembly before running
        #[arg(long)]
        bc: bool,
    },

    /// Compile a JSON syntax tree into a bytecode file
    Compile {
        file: PathBuf,

        /// Output path (defaults to the input with a .mkb extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify and run a bytecode file
    Exec { file: PathBuf },

    /// Print the disassembly of a syntax tree or bytecode file
    Disasm { file: PathBuf },

    /// Start the interactive REPL (default)
    Repl,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command.unwrap_or(Command::Repl) {
        Command::Run { file, bc } => run_file(&file, bc),
        Command::Compile { file, output } => {
            let output = output.unwrap_or_else(|| file.with_extension("mkb"));
            compile_file(&file, &output)
        }
        Command::Exec { file } => exec_file(&file),
        Command::Disasm { file } => disasm_file(&file),
        Command::Repl => {
            println!("Monkey REPL, one JSON syntax tree per line");
            repl::start(io::stdin().lock(), io::stdout()).map_err(|e| e.to_string())
        }
    };

    if let Err(message) = result {
        eprintln!("Error: {}", message);
        process::exit(1);
    }
}

fn compile_tree(file: &Path) -> Result<Bytecode, String> {
    let program = load_program(file).map_err(|e| e.to_string())?;
    let mut compiler = Compiler::new();
    compiler.compile(&program).map_err(|e| match e.hint() {
        Some(hint) => format!("compile error: {}\n  hint: {}", e, hint),
        None => format!("compile error: {}", e),
    })?;
    Ok(compiler.bytecode())
}

fn execute(bytecode: Bytecode) -> Result<(), String> {
    let mut vm = Vm::new(bytecode);
    vm.run().map_err(|e| format!("runtime error: {}", e))?;
    if let Some(value) = vm.last_popped() {
        println!("{}", value);
    }
    Ok(())
}

fn run_file(file: &Path, show_bc: bool) -> Result<(), String> {
    let bytecode = compile_tree(file)?;
    if show_bc {
        print_bc(&bytecode);
    }
    execute(bytecode)
}

fn compile_file(file: &Path, output: &Path) -> Result<(), String> {
    let bytecode = compile_tree(file)?;
    bytecode.write_to(output).map_err(|e| e.to_string())?;
    info!(
        "wrote {} ({} bytes of code, {} constants)",
        output.display(),
        bytecode.instructions.len(),
        bytecode.constants.len()
    );
    Ok(())
}

fn load_artifact(file: &Path) -> Result<Bytecode, String> {
    let bytecode = Bytecode::read_from(file).map_err(|e| e.to_string())?;
    verify(&bytecode).map_err(|e| format!("invalid bytecode: {}", e))?;
    Ok(bytecode)
}

fn exec_file(file: &Path) -> Result<(), String> {
    execute(load_artifact(file)?)
}

fn disasm_file(file: &Path) -> Result<(), String> {
    let bytecode = if file.extension().and_then(|e| e.to_str()) == Some("mkb") {
        Bytecode::read_from(file).map_err(|e| e.to_string())?
    } else {
        compile_tree(file)?
    };
    print_bc(&bytecode);
    Ok(())
}
