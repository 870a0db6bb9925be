//! `xbridge` entry point.

mod cli;

use bridge_ir::IrContext;
use bridge_ir::printer::print_module;
use bridge_passes::PassManager;
use clap::Parser;
use cli::{Cli, Command};
use executor_bridge::demo::sample_module;
use executor_bridge::pipeline::add_graph_export_lowering_passes;
use executor_bridge::{BridgeConfig, DebugDataDumper, FixedVerbosity, MlirCommonFlags, export_tf_dialect_to_executor};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Pipeline {
            enable_control_to_data,
        } => {
            init_tracing(0);
            let flags = MlirCommonFlags {
                enable_convert_control_to_data_outputs_pass: enable_control_to_data,
            };
            let mut pm = PassManager::new();
            add_graph_export_lowering_passes(&mut pm, &flags);
            for (index, (argument, scope)) in pm.pass_names().into_iter().enumerate() {
                println!("{:>2}. {argument} [{scope}]", index + 1);
            }
            println!("\n{}", pm.pipeline_description());
        }
        Command::Demo {
            replicas,
            verbose,
            dump_dir,
        } => {
            init_tracing(verbose);
            run_demo(replicas, verbose, dump_dir);
        }
    }
}

fn run_demo(replicas: u64, verbose: u8, dump_dir: Option<std::path::PathBuf>) {
    let mut config = BridgeConfig::from_env().with_verbosity(FixedVerbosity(i32::from(verbose)));
    if let Some(dir) = dump_dir {
        config = config.with_dump_registry(DebugDataDumper::new(Some(dir), Some("*".to_owned()), None));
    }

    let mut ctx = IrContext::new();
    let module = sample_module(&mut ctx, "demo", replicas);
    println!("=== Input ===\n{}", print_module(&ctx, module.op()));

    if let Err(e) = export_tf_dialect_to_executor(&mut ctx, module, "demo", &config) {
        eprintln!("{e}");
        std::process::exit(1);
    }
    println!("=== Executor dialect ===\n{}", print_module(&ctx, module.op()));
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string()))
        .with_writer(std::io::stderr)
        .init();
}
