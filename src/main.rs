//! `dvm` - run a DEX or APK program.
//!
//! Usage resembles the platform launcher: a runtime container and either a
//! DEX file or an APK, an optional main class (APKs default to the manifest's
//! main activity), a log level, and positional arguments forwarded to the
//! program's `main`.

use std::env;
use std::process::exit;

use log::LevelFilter;
use simplelog::{ColorChoice, Config, SimpleLogger, TermLogger, TerminalMode};

use dvm::jvm::Vm;

#[derive(Debug, Default)]
struct Options {
    dex: Option<String>,
    apk: Option<String>,
    main_class: Option<String>,
    runtime: Option<String>,
    classpath: Vec<String>,
    log_level: Option<String>,
    program_args: Vec<String>,
}

fn usage() -> ! {
    eprintln!("usage: dvm [--runtime <dex>] (--dex <file> | --apk <file>) [--main <class>]");
    eprintln!("           [--classpath <dir>]... [--log <NONE|ERROR|WARN|INFO|DEBUG|TRACE>] [args...]");
    exit(1)
}

fn value_of<I: Iterator<Item = String>>(args: &mut I, name: &str) -> String {
    match args.next() {
        Some(value) => value,
        None => {
            eprintln!("{} expects a value", name);
            usage()
        }
    }
}

fn parse_options() -> Options {
    let mut options = Options::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dex" => options.dex = Some(value_of(&mut args, "--dex")),
            "--apk" => options.apk = Some(value_of(&mut args, "--apk")),
            "--main" => options.main_class = Some(value_of(&mut args, "--main")),
            "--runtime" => options.runtime = Some(value_of(&mut args, "--runtime")),
            "--classpath" => options.classpath.push(value_of(&mut args, "--classpath")),
            "--log" => options.log_level = Some(value_of(&mut args, "--log")),
            "-h" | "--help" => usage(),
            _ => {
                options.program_args.push(arg);
                options.program_args.extend(&mut args);
            }
        }
    }
    options
}

fn init_logging(level: Option<&str>) {
    let filter = match level.unwrap_or("WARN") {
        "NONE" => LevelFilter::Off,
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "INFO" => LevelFilter::Info,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        other => {
            eprintln!("invalid log level: {}", other);
            usage()
        }
    };

    if TermLogger::init(
        filter,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .is_err()
    {
        let _ = SimpleLogger::init(filter, Config::default());
    }
}

fn main() {
    let options = parse_options();
    init_logging(options.log_level.as_deref());

    if options.dex.is_none() && options.apk.is_none() {
        eprintln!("either --dex or --apk must be specified");
        usage();
    }

    let vm = Vm::new();

    if let Some(runtime) = &options.runtime {
        if let Err(err) = vm.load_dex(runtime) {
            eprintln!("failed to load runtime container {}: {}", runtime, err);
            exit(1);
        }
    }

    for dir in &options.classpath {
        vm.registry.add_classpath(dir.as_str());
    }

    let mut main_class = options.main_class.clone();
    if let Some(dex) = &options.dex {
        if let Err(err) = vm.load_dex(dex) {
            eprintln!("failed to load {}: {}", dex, err);
            exit(1);
        }
    } else if let Some(apk) = &options.apk {
        match vm.load_apk(apk) {
            Ok((_, activity)) => {
                if main_class.is_none() {
                    main_class = activity;
                }
            }
            Err(err) => {
                eprintln!("failed to load {}: {}", apk, err);
                exit(1);
            }
        }
    }

    let main_class = match main_class {
        Some(class) => class.replace('/', "."),
        None => {
            eprintln!("no main class: pass --main or an apk with a main activity");
            exit(1)
        }
    };

    let status = match vm.run_main(&main_class, &options.program_args) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", err);
            1
        }
    };

    vm.shutdown();
    exit(status);
}
