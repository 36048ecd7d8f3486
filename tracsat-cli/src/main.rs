use std::env;
use std::fs;
use std::io::{self, Read, Write};

use anyhow::{anyhow, Context as _, Error};
use clap::{App, AppSettings, Arg};
use env_logger::{fmt, Builder, Target};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{error, info, Level, LevelFilter, Record};

use tracsat::{Solver, SolverResult};

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, if verbose { LevelFilter::Info } else { LevelFilter::Warn });

    if let Ok(ref env_var) = env::var("TRACSAT_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn has_suffix(name: &str, suffix: &str) -> bool {
    name.ends_with(suffix)
}

fn open_input(path: Option<&str>) -> Result<Box<dyn Read>, Error> {
    match path {
        None => Ok(Box::new(io::stdin())),
        Some(path) => {
            let file = fs::File::open(path)
                .with_context(|| format!("can not read input file '{}'", path))?;
            if has_suffix(path, ".gz") {
                Ok(Box::new(GzDecoder::new(file)))
            } else {
                Ok(Box::new(file))
            }
        }
    }
}

fn create_output(path: &str) -> Result<Box<dyn Write>, Error> {
    let file = fs::File::create(path)
        .with_context(|| format!("can not write to '{}'", path))?;
    if has_suffix(path, ".gz") {
        Ok(Box::new(GzEncoder::new(file, Compression::default())))
    } else {
        Ok(Box::new(file))
    }
}

/// Print the satisfying assignment as `v` lines wrapped to roughly 80 columns.
fn print_assignment(target: &mut dyn Write, solver: &Solver) -> Result<(), Error> {
    let mut line = String::from("v");

    let entries = (1..=solver.num_variables() as i32)
        .map(|var| (if solver.value(var) > 0 { var } else { -var }).to_string())
        .chain(Some("0".to_string()));

    for entry in entries {
        if line.len() + entry.len() + 1 > 80 {
            writeln!(target, "{}", line)?;
            line.clear();
            line.push('v');
        }
        line.push(' ');
        line.push_str(&entry);
    }

    writeln!(target, "{}", line)?;
    Ok(())
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("tracsat")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("[INPUT] 'The input file to use (stdin if omitted)'")
        .arg_from_usage("--config 'Print the build configuration and exit'")
        .arg_from_usage("-v 'Enable verbose output'")
        .arg_from_usage("-f 'Ignore an invalid DIMACS header'")
        .arg_from_usage("-n 'Do not print the satisfying assignment'")
        .arg(
            Arg::from_usage("-a [lit]... 'Start with an assumption'")
                .number_of_values(1)
                .allow_hyphen_values(true),
        )
        .arg_from_usage("-l [limit] 'Set a decision limit'")
        .arg_from_usage("-s [seed] 'Set the random number generator seed'")
        .arg_from_usage("-o [output] 'Set the output file'")
        .arg_from_usage("-t [trace] 'Generate a proof trace file'")
        .arg_from_usage("-c [core] 'Generate a core clauses file'")
        .get_matches();

    if matches.is_present("config") {
        println!("tracsat {}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    let start_time = Solver::time_stamp();

    init_logging(matches.is_present("v"));

    let mut solver = Solver::new();

    let trace_path = matches.value_of("t");
    let core_path = matches.value_of("c");
    if trace_path.is_some() || core_path.is_some() {
        solver.enable_trace_generation();
    }

    if let Some(seed) = matches.value_of("s") {
        let seed: u32 = seed.parse().map_err(|_| anyhow!("invalid seed '{}'", seed))?;
        info!("random number generator seed {}", seed);
        solver.set_seed(seed);
    }

    let decision_limit: i64 = match matches.value_of("l") {
        Some(limit) => limit
            .parse()
            .map_err(|_| anyhow!("invalid decision limit '{}'", limit))?,
        None => -1,
    };

    let input_name = matches.value_of("INPUT").unwrap_or("<stdin>");
    info!("parsing {}", input_name);

    let input = open_input(matches.value_of("INPUT"))?;
    if matches.is_present("f") {
        // Force mode: parse chunk by chunk without checking the header.
        let mut parser = tracsat_dimacs::DimacsParser::new();
        let mut buffer = io::BufReader::new(input);
        use io::BufRead;
        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);
            solver.add_formula(&parser.take_formula());
        }
        parser.eof()?;
        solver.add_formula(&parser.take_formula());
    } else {
        solver.add_dimacs_cnf(input)?;
    }

    info!(
        "initialized {} variables, found {} non trivial clauses",
        solver.num_variables(),
        solver.added_original_clauses()
    );

    if let Some(assumptions) = matches.values_of("a") {
        for assumption in assumptions {
            let lit: i32 = assumption
                .parse()
                .map_err(|_| anyhow!("invalid assumption '{}'", assumption))?;
            if lit == 0 {
                return Err(anyhow!("argument to '-a' zero"));
            }
            info!("assumption {}", lit);
            solver.assume(lit);
        }
    }

    let result = solver.solve_limited(decision_limit);

    let stdout = io::stdout();
    let mut owned_output;
    let mut locked_stdout;
    let output: &mut dyn Write = match matches.value_of("o") {
        Some(path) => {
            owned_output = create_output(path)?;
            &mut owned_output
        }
        None => {
            locked_stdout = stdout.lock();
            &mut locked_stdout
        }
    };

    match result {
        SolverResult::Sat => {
            writeln!(output, "s SATISFIABLE")?;
            if !matches.is_present("n") {
                print_assignment(&mut *output, &solver)?;
            }
        }
        SolverResult::Unsat => {
            writeln!(output, "s UNSATISFIABLE")?;

            if let Some(path) = trace_path {
                info!("writing trace to '{}'", path);
                let mut target = create_output(path)?;
                solver.write_trace(&mut target)?;
            }
            if let Some(path) = core_path {
                info!("writing core to '{}'", path);
                let mut target = create_output(path)?;
                solver.write_core(&mut target)?;
            }
        }
        SolverResult::Unknown => {
            writeln!(output, "s UNKNOWN")?;
        }
    }
    output.flush()?;

    if matches.is_present("v") {
        let stats = solver.stats();
        info!(
            "{} iterations, {} restarts, {} reductions ({} forced)",
            stats.iterations, stats.restarts, stats.reductions, stats.forced_reductions
        );
        info!(
            "{} conflicts, {} decisions ({} random), {} assumptions",
            stats.conflicts, stats.decisions, stats.random_decisions, stats.assumed
        );
        info!("{} propagations", stats.propagations);
        info!(
            "{:.2} seconds total, {:.2} seconds in solver, {:.1} MB maximally allocated",
            Solver::time_stamp() - start_time,
            solver.seconds(),
            solver.max_bytes_allocated() as f64 / (1 << 20) as f64
        );
    }

    Ok(result.exit_code())
}
