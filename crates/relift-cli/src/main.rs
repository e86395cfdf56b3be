//! The relift command line.
//!
//! Exposes the programmatic verbs as subcommands: `load` sniffs a binary
//! and creates a program for it, `decode` additionally asks the loader
//! registry for a front end, `load-xml` reloads a persisted program,
//! `decompile` runs the SSA pipeline over a persisted program and writes
//! the result back out, and `save` re-shards a persisted program into a
//! new directory.
//!
//! Exit codes: 0 success, 1 load/decode failure, 2 XML parse failure,
//! 3 I/O failure.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use relift_core::{ProcId, Program};
use relift_dataflow::{place_phi, propagate_statements, remove_unused_statements, rename_variables};
use relift_loader::{detect_format, instantiate_loader, load_binary};
use relift_persist::PersistError;

/// Machine-code decompiler core driver.
#[derive(Parser)]
#[command(name = "relift", about = "Machine-code decompiler core driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify a binary and create a program for it.
    Load {
        /// Path to the binary.
        binary: PathBuf,
    },

    /// Identify a binary and instantiate its loader front end.
    Decode {
        /// Path to the binary.
        binary: PathBuf,
    },

    /// Reload a persisted program and validate it.
    LoadXml {
        /// Root cluster file, e.g. `out/hello.xml`.
        root: PathBuf,
    },

    /// Run the SSA pipeline over a persisted program and write it back.
    Decompile {
        /// Root cluster file of the persisted program.
        root: PathBuf,

        /// Output directory (default: alongside the input).
        #[arg(short, long, default_value = "./decompiled")]
        out: PathBuf,
    },

    /// Re-shard a persisted program into a new directory.
    Save {
        /// Root cluster file of the persisted program.
        root: PathBuf,

        /// Output directory.
        out: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Load { binary } => run_load(&binary),
        Commands::Decode { binary } => run_decode(&binary),
        Commands::LoadXml { root } => run_load_xml(&root),
        Commands::Decompile { root, out } => run_decompile(&root, &out),
        Commands::Save { root, out } => run_save(&root, &out),
    };
    process::exit(code);
}

/// Machine-readable summary of a loaded program.
#[derive(Serialize)]
struct ProgramSummary {
    name: String,
    path: String,
    front_end: Option<String>,
    procs: usize,
    globals: usize,
    clusters: usize,
}

impl ProgramSummary {
    fn of(prog: &Program) -> ProgramSummary {
        ProgramSummary {
            name: prog.name.clone(),
            path: prog.path.clone(),
            front_end: prog.front_end().map(|f| f.name().to_string()),
            procs: prog.num_procs(),
            globals: prog.globals().len(),
            clusters: prog.num_clusters(),
        }
    }

    fn print(&self) {
        let json = serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize summary: {}\"}}", e));
        println!("{}", json);
    }
}

fn run_load(binary: &PathBuf) -> i32 {
    match load_binary(binary) {
        Ok(prog) => {
            ProgramSummary::of(&prog).print();
            0
        }
        Err(e) => {
            eprintln!("Error: {}: {}", binary.display(), e);
            1
        }
    }
}

fn run_decode(binary: &PathBuf) -> i32 {
    let head = match std::fs::read(binary) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: {}: {}", binary.display(), e);
            return 3;
        }
    };
    let format = match detect_format(&head) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}: {}", binary.display(), e);
            return 1;
        }
    };
    match instantiate_loader(format) {
        Ok(_loader) => {
            // A linked loader would drive entry-point discovery here.
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Accepts the root file with or without its `.xml` extension.
fn normalize_root(root: &PathBuf) -> PathBuf {
    let s = root.display().to_string();
    if relift_core::util::has_ext(&s, "xml") {
        root.clone()
    } else {
        PathBuf::from(relift_core::util::change_ext(&s, ".xml"))
    }
}

fn run_load_xml(root: &PathBuf) -> i32 {
    let root = normalize_root(root);
    match relift_persist::load(&root) {
        Ok(prog) => {
            ProgramSummary::of(&prog).print();
            0
        }
        Err(e) => report_persist_error(&root, e),
    }
}

fn run_decompile(root: &PathBuf, out: &PathBuf) -> i32 {
    let root = normalize_root(root);
    let root = &root;
    let mut prog = match relift_persist::load(root) {
        Ok(p) => p,
        Err(e) => return report_persist_error(root, e),
    };

    let pids: Vec<ProcId> = prog.procs().map(|(pid, _)| pid).collect();
    for pid in pids {
        if prog.proc(pid).and_then(|p| p.as_user()).is_none() {
            continue;
        }
        if let Err(e) = prog.init_statements(pid) {
            eprintln!("Error: {}", e);
            return 1;
        }
        if let Err(e) = place_phi(&mut prog, pid) {
            eprintln!("Error: {}", e);
            return 1;
        }
        if let Err(e) = rename_variables(&mut prog, pid) {
            eprintln!("Error: {}", e);
            return 1;
        }
        let user = prog
            .proc_mut(pid)
            .and_then(|p| p.as_user_mut())
            .expect("checked above");
        let propagated = propagate_statements(user);
        let removed = remove_unused_statements(user);
        tracing::debug!(
            proc = pid.0,
            propagated,
            removed,
            "decompiled procedure"
        );
    }

    if let Err(e) = relift_persist::save(&prog, out) {
        return report_persist_error(root, e);
    }
    ProgramSummary::of(&prog).print();
    0
}

fn run_save(root: &PathBuf, out: &PathBuf) -> i32 {
    let root = normalize_root(root);
    let root = &root;
    let prog = match relift_persist::load(root) {
        Ok(p) => p,
        Err(e) => return report_persist_error(root, e),
    };
    match relift_persist::save(&prog, out) {
        Ok(()) => 0,
        Err(e) => report_persist_error(root, e),
    }
}

fn report_persist_error(root: &PathBuf, e: PersistError) -> i32 {
    eprintln!("Error: {}: {}", root.display(), e);
    match e {
        PersistError::Io(_) => 3,
        _ => 2,
    }
}
