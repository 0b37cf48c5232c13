use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use synacor_vm::boundary::StdoutTerminal;
use synacor_vm::codec::Word;
use synacor_vm::controller::{Command, CommandResult, Controller};
use synacor_vm::state::{MachineState, Mode};

/// Runs a Synacor Challenge program image under an interactive debugger.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the raw 16-bit little-endian program image.
    #[arg(long)]
    program: PathBuf,

    /// Path to a saved machine state to resume from instead of `program`.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Breakpoint addresses to install before running, e.g. `--break 12 --break 900`.
    #[arg(long = "break")]
    breakpoints: Vec<Word>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let image = match std::fs::read(&args.program) {
        Ok(bytes) => bytes_to_words(&bytes),
        Err(e) => {
            eprintln!("failed to read {}: {e}", args.program.display());
            std::process::exit(1);
        }
    };

    let state = MachineState::from_image(&image, Mode::Run);
    let mut controller = Controller::new(state, Box::new(StdoutTerminal));

    if let Some(path) = &args.load {
        if let CommandResult::Err(e) = controller.dispatch(Command::Load(path.clone())) {
            eprintln!("failed to load {}: {e}", path.display());
            std::process::exit(1);
        }
    }

    for addr in &args.breakpoints {
        controller.dispatch(Command::AddBreak(*addr));
    }

    repl(&mut controller);
}

/// A minimal line-oriented front end: one debugger command per line, or
/// a bare line of text to feed as `in` input. This is the ambient
/// "runnable binary" convenience around [`Controller`], not a full
/// terminal front end.
fn repl(controller: &mut Controller) {
    controller.dispatch(Command::Continue);

    let stdin = std::io::stdin();
    print!("> ");
    let _ = std::io::stdout().flush();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if controller.has_shutdown() {
            break;
        }

        let cmd = match parse_command(&line) {
            Some(cmd) => cmd,
            None => {
                eprintln!("unrecognized command: {line}");
                print!("> ");
                let _ = std::io::stdout().flush();
                continue;
            }
        };

        match controller.dispatch(cmd) {
            CommandResult::Err(e) => eprintln!("error: {e}"),
            CommandResult::Peeked { value, annotation } => match annotation {
                Some(a) => println!("{value}\t# {a}"),
                None => println!("{value}"),
            },
            CommandResult::Register(value) => println!("{value}"),
            CommandResult::State(state) => println!("pc={} halt={}", state.pc, state.halt),
            CommandResult::Ok => {}
        }

        if controller.has_shutdown() || controller.state().halt {
            break;
        }
        print!("> ");
        let _ = std::io::stdout().flush();
    }
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.trim().split_whitespace();
    match parts.next()? {
        "step" => Some(Command::Step),
        "next" => Some(Command::Next),
        "up" => Some(Command::Up),
        "continue" | "cont" => Some(Command::Continue),
        "ret" => Some(Command::Ret),
        "break" => Some(Command::Break),
        "quit" | "shutdown" => Some(Command::Shutdown),
        "addbreak" => parts.next()?.parse().ok().map(Command::AddBreak),
        "clearbreak" => Some(Command::ClearBreak),
        "peek" => parts.next()?.parse().ok().map(Command::Peek),
        "poke" => {
            let addr = parts.next()?.parse().ok()?;
            let value = parts.next()?.parse().ok()?;
            Some(Command::Poke(addr, value))
        }
        "save" => Some(Command::Save(PathBuf::from(parts.next()?))),
        "load" => Some(Command::Load(PathBuf::from(parts.next()?))),
        "input" => {
            let rest: String = parts.collect::<Vec<_>>().join(" ") + "\n";
            Some(Command::Input(rest.into_bytes()))
        }
        _ => None,
    }
}

/// Unpacks a raw byte stream into little-endian 16-bit words, as the
/// Synacor binary format requires.
fn bytes_to_words(bytes: &[u8]) -> Vec<Word> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
