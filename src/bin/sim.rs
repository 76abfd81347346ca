use rv32i_sim::cli::SimArgs;
use rv32i_sim::{loader, Engine, EngineConfig, EngineResult, FlatMemory};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> EngineResult<()> {
    let args = SimArgs::from_env_or_exit();

    let mut mem = FlatMemory::default();
    let mem_len = mem.len();
    let program = loader::load_program_file(&mut mem, mem_len, &args.program)?;

    let mut engine = Engine::new(EngineConfig { verbose: args.verbose });
    engine.reset();
    engine.set_pc(program.entry);

    let ticks = args.ticks.unwrap_or(program.word_count as u64 + 4);
    for _ in 0..ticks {
        engine.clock(&mut mem);
    }

    if args.dump_regs {
        println!("{}", engine);
    }

    eprintln!(
        "cycles={} retired={}",
        engine.cycle_count(),
        engine.retired_count()
    );

    Ok(())
}
