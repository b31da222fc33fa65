//! `drivelog` - CLI for the driving-session log
//!
//! This binary runs the HTTP server and offers command-line access to session
//! intake, driver management, summaries and token inspection.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, IsTerminal};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use drivelog::cli::{
    Cli, Command, ConfigCommand, DriverCommand, ServeCommand, SessionCommand, TokenCommand,
};
use drivelog::drivers::{self, CREATED_MESSAGE, DELETED_MESSAGE};
use drivelog::server::{self, AppState};
use drivelog::session::{DATE_FORMAT, TIME_FORMAT};
use drivelog::{init_logging, intake, Config, Flash, FormOptions, Storage, Summary, TokenCodec};

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(cmd) => handle_serve(&config, &cmd),
        Command::Options(cmd) => handle_options(&config, cmd.json),
        Command::Session(cmd) => handle_session(&config, cmd),
        Command::Driver(cmd) => handle_driver(&config, cmd),
        Command::Summary(cmd) => handle_summary(&config, cmd.json),
        Command::Token(cmd) => handle_token(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

fn codec(config: &Config, storage: &Storage) -> anyhow::Result<TokenCodec> {
    TokenCodec::resolve(config.token.secret.as_deref(), storage)
        .context("failed to load token secret")
}

/// Read a password without echo from a terminal, or a line from piped stdin.
fn read_password(prompt: &str) -> io::Result<String> {
    if io::stdin().is_terminal() {
        rpassword::prompt_password(prompt)
    } else {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Print a flash message and map it to the exit status.
fn report(flash: &Flash) -> ExitCode {
    if flash.is_success() {
        println!("{}", flash.message);
        ExitCode::SUCCESS
    } else {
        eprintln!("{}", flash.message);
        ExitCode::FAILURE
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_serve(config: &Config, cmd: &ServeCommand) -> anyhow::Result<ExitCode> {
    let addr = match cmd.bind {
        Some(addr) => addr,
        None => config.bind_addr()?,
    };
    let state = AppState::from_config(config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(server::serve(state, addr))?;
    Ok(ExitCode::SUCCESS)
}

fn handle_options(config: &Config, json: bool) -> anyhow::Result<ExitCode> {
    let storage = open_storage(config)?;
    let options = FormOptions::load(&storage, &codec(config, &storage)?)?;

    if json {
        print_json(&options)?;
        return Ok(ExitCode::SUCCESS);
    }

    for category in drivelog::Category::ALL {
        println!("[{}]", category.label());
        for entry in options.entries(category) {
            println!("  {:<24} {}", entry.description, entry.token);
        }
        println!();
    }
    println!("Total distance: {:.1}", options.total_distance);
    Ok(ExitCode::SUCCESS)
}

fn handle_session(config: &Config, cmd: SessionCommand) -> anyhow::Result<ExitCode> {
    let mut storage = open_storage(config)?;

    match cmd {
        SessionCommand::Add(args) => {
            let codec = codec(config, &storage)?;
            let result = intake::submit(&mut storage, &codec, &args.into());
            Ok(report(&Flash::from(&result)))
        }
        SessionCommand::List(list) => {
            let sessions = storage.sessions()?;
            if list.json {
                print_json(&sessions)?;
                return Ok(ExitCode::SUCCESS);
            }
            if sessions.is_empty() {
                println!("No sessions recorded.");
            }
            for s in &sessions {
                println!(
                    "{:>5}  {} {}-{} {:>4}m  {:>7.1}  {:<16} {} / {} / {} / {} / {}",
                    s.id,
                    s.date.format(DATE_FORMAT),
                    s.start_time.format(TIME_FORMAT),
                    s.end_time.format(TIME_FORMAT),
                    s.duration().num_minutes(),
                    s.mileage,
                    s.driver,
                    s.weather,
                    s.traffic,
                    s.road_type,
                    s.visibility,
                    s.maneuver
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn handle_driver(config: &Config, cmd: DriverCommand) -> anyhow::Result<ExitCode> {
    let mut storage = open_storage(config)?;
    let codec = codec(config, &storage)?;

    let flash = match cmd {
        DriverCommand::Add(args) => {
            let form = args
                .into_form(read_password)
                .context("failed to read password")?;
            match drivers::create_driver(&storage, &config.drivers, &form) {
                Ok(_) => Flash::success(CREATED_MESSAGE),
                Err(e) => Flash::error(e.to_string()),
            }
        }
        DriverCommand::Delete { token } => {
            match drivers::delete_driver(&mut storage, &codec, &token) {
                Ok(_) => Flash::success(DELETED_MESSAGE),
                Err(e) => Flash::error(e.to_string()),
            }
        }
        DriverCommand::List(list) => {
            let entries = drivers::list_drivers(&storage, &codec)?;
            if list.json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                println!("No drivers.");
            } else {
                for entry in &entries {
                    println!("{:<24} {}  {}", entry.name, entry.birthday, entry.token);
                }
            }
            return Ok(ExitCode::SUCCESS);
        }
    };
    Ok(report(&flash))
}

fn handle_summary(config: &Config, json: bool) -> anyhow::Result<ExitCode> {
    let storage = open_storage(config)?;
    let summary = Summary::load(&storage)?;

    if json {
        print_json(&summary)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("drivelog summary");
    println!("----------------");
    println!("Sessions:        {}", summary.session_count());
    println!("Total distance:  {:.1}", summary.total_distance);

    for (title, counts) in [
        ("Weather", &summary.weather),
        ("Traffic", &summary.traffic),
        ("Road type", &summary.road_type),
        ("Visibility", &summary.visibility),
    ] {
        println!();
        println!("[{title}]");
        for (description, count) in counts {
            println!("  {description:<16} {count}");
        }
    }

    println!();
    println!("[Drivers]");
    for driver in &summary.drivers {
        println!(
            "  {:<16} {:>3} sessions  {:>8.1} total  {:>7.1} avg  last {}",
            driver.name,
            driver.sessions,
            driver.distance,
            driver.avg_distance,
            driver.last_session.as_deref().unwrap_or("-")
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_token(config: &Config, cmd: &TokenCommand) -> anyhow::Result<ExitCode> {
    let storage = open_storage(config)?;
    let codec = codec(config, &storage)?;
    let code = match cmd {
        TokenCommand::Encode { category, id } => {
            println!("{}", codec.encode(*id, *category));
            ExitCode::SUCCESS
        }
        TokenCommand::Decode { category, token } => match codec.decode(token, *category) {
            Ok(id) => {
                println!("{id}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
    };
    Ok(code)
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                print_json(config)?;
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:       {}", config.database_path().display());
                println!();
                println!("[Token]");
                println!(
                    "  Secret:              {}",
                    if config.token.secret.is_some() {
                        "configured"
                    } else {
                        "stored in database"
                    }
                );
                println!();
                println!("[Server]");
                println!("  Bind:                {}", config.server.bind);
                println!();
                println!("[Drivers]");
                println!(
                    "  Min password length: {}",
                    config.drivers.min_password_length
                );
                println!("  bcrypt cost:         {}", config.drivers.bcrypt_cost);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    eprintln!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
