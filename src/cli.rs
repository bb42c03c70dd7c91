use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use quill_lang::{
    config::{Config, ElifPolicy, ErrorMode},
    error::{LangError, LangResult},
    lexer::tokenize,
    parser::Parser as QuillParser,
};

/// Quill language tool.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about, long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Report runtime errors and continue with null instead of aborting.
    #[arg(long, global = true)]
    legacy_errors: bool,

    /// Keep only the last `elif` arm of an if statement.
    #[arg(long, global = true)]
    last_elif_wins: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a Quill program.
    Run {
        file: PathBuf,
        /// Print the value of the last statement.
        #[arg(long)]
        print_result: bool,
    },
    /// Print the token stream of a source file.
    Tokens { file: PathBuf },
    /// Lex and parse a file, or every .ql file under a directory.
    Check { path: PathBuf },
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::default();
        if self.legacy_errors {
            config = config.with_error_mode(ErrorMode::Legacy);
        }
        if self.last_elif_wins {
            config = config.with_elif_policy(ElifPolicy::LastWins);
        }
        config
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config();
    debug!("using {:?}", config);

    let result = match &cli.command {
        Command::Run { file, print_result } => run_command(file, config, *print_result),
        Command::Tokens { file } => tokens_command(file),
        Command::Check { path } => check_command(path, config),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run_command(file: &Path, config: Config, print_result: bool) -> LangResult<bool> {
    let source = fs::read_to_string(file)?;
    let value = quill_lang::run(&source, config)?;
    if print_result {
        println!("{}", value);
    }
    Ok(true)
}

fn tokens_command(file: &Path) -> LangResult<bool> {
    let source = fs::read_to_string(file)?;
    for token in tokenize(&source)? {
        println!(
            "{:<20} {:<16} {}",
            token.kind.to_string(),
            format!("{:?}", token.value),
            token.line
        );
    }
    Ok(true)
}

fn check_command(path: &Path, config: Config) -> LangResult<bool> {
    if path.is_file() {
        return Ok(check_file(path, config));
    }

    let mut all_ok = true;
    let mut files_checked = 0;

    for entry in walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("ql") {
            files_checked += 1;
            all_ok &= check_file(path, config);
        }
    }

    if files_checked == 0 {
        eprintln!("No .ql files found in {}", path.display());
        return Ok(false);
    }

    Ok(all_ok)
}

fn check_file(path: &Path, config: Config) -> bool {
    let result = fs::read_to_string(path)
        .map_err(LangError::from)
        .and_then(|source| parse_source(&source, config));
    print_file_status(path, result.as_ref().err());
    result.is_ok()
}

fn parse_source(source: &str, config: Config) -> LangResult<()> {
    let mut parser = QuillParser::new(tokenize(source)?).with_elif_policy(config.elif_policy);
    parser.parse_program()?;
    Ok(())
}

fn print_file_status(path: &Path, error: Option<&LangError>) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    match error {
        None => {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
            let _ = write!(stdout, "ok ");
            let _ = stdout.reset();
            let _ = writeln!(stdout, "{}", path.display());
        }
        Some(err) => {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
            let _ = write!(stdout, "! ");
            let _ = stdout.reset();
            let _ = writeln!(stdout, "{}", path.display());
            let _ = writeln!(stdout, "  {}", err);
        }
    }

    let _ = stdout.reset();
}
