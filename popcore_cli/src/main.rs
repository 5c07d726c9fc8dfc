use clap::{App, Arg, SubCommand};
use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use tracing::Level;

mod command_keygen;
mod command_replay;
mod command_sign;
mod command_verify;

use command_keygen::*;
use command_replay::*;
use command_sign::*;
use command_verify::*;

#[derive(PartialEq, Copy, Clone)]
enum Verbosity {
    Warn,
    Info,
    Debug,
}

impl Verbosity {
    fn level(self) -> Level {
        match self {
            Verbosity::Warn => Level::WARN,
            Verbosity::Info => Level::INFO,
            Verbosity::Debug => Level::DEBUG,
        }
    }
}

fn main() {
    let matches = App::new("popcore")
        .version("0.1")
        .about("Signs, verifies and replays LAO protocol messages")
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::with_name("secret-key")
                .long("secret-key")
                .takes_value(true)
                .global(true)
                .help("Hex encoded ed25519 secret key - can also be set with POPCORE_SECRET_KEY"),
        )
        .subcommand(SubCommand::with_name("keygen").about("Generate a new key pair"))
        .subcommand(
            SubCommand::with_name("sign")
                .about("Wrap message data into a signed envelope")
                .arg(
                    Arg::with_name("INPUT")
                        .index(1)
                        .required(true)
                        .help("Message data file in JSON format"),
                ),
        )
        .subcommand(
            SubCommand::with_name("verify")
                .about("Verify an envelope and print its data")
                .arg(
                    Arg::with_name("INPUT")
                        .index(1)
                        .required(true)
                        .help("Message file in JSON format"),
                ),
        )
        .subcommand(
            SubCommand::with_name("replay")
                .about("Process a log of broadcasts and print the resulting state")
                .arg(
                    Arg::with_name("INPUT")
                        .index(1)
                        .required(true)
                        .help("JSON lines file of {\"channel\", \"message\"} records"),
                ),
        )
        .get_matches();

    let verbosity = match matches.occurrences_of("v") {
        0 => Verbosity::Warn,
        1 => Verbosity::Info,
        _ => Verbosity::Debug,
    };
    tracing_subscriber::fmt()
        .with_max_level(verbosity.level())
        .with_writer(std::io::stderr)
        .init();

    let env_var = std::env::var("POPCORE_SECRET_KEY").ok();
    let secret_key = matches
        .value_of("secret-key")
        .map(|s| s.to_owned())
        .or(env_var)
        .map(|s| parse_keypair(&s));

    // Subcommands
    if let Some(_matches) = matches.subcommand_matches("keygen") {
        command_keygen();
        std::process::exit(0);
    }
    if let Some(matches) = matches.subcommand_matches("sign") {
        command_sign(matches, secret_key.as_ref());
        std::process::exit(0);
    }
    if let Some(matches) = matches.subcommand_matches("verify") {
        command_verify(matches);
        std::process::exit(0);
    }
    if let Some(matches) = matches.subcommand_matches("replay") {
        command_replay(matches, secret_key);
        std::process::exit(0);
    }

    eprintln!("popcore: no subcommand given, see --help");
    std::process::exit(1);
}

fn parse_keypair(secret_key: &str) -> Keypair {
    let bytes = hex::decode(secret_key.trim()).unwrap_or_else(|e| {
        eprintln!("popcore: secret key is not valid hex: {}", e);
        std::process::exit(1);
    });
    let secret = SecretKey::from_bytes(&bytes).unwrap_or_else(|e| {
        eprintln!("popcore: invalid secret key: {}", e);
        std::process::exit(1);
    });
    let public: PublicKey = (&secret).into();
    Keypair { secret, public }
}

/// Expand `~` and environment variables in a path argument
pub fn expand(input: &str) -> String {
    shellexpand::full(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|e| {
            eprintln!("popcore: unable to expand {}: {}", input, e);
            std::process::exit(1);
        })
}

/// Read a UTF-8 input file named by the INPUT argument
pub fn read_input(command: &str, matches: &clap::ArgMatches) -> (String, String) {
    use content_inspector::ContentType;

    let filename = expand(matches.value_of("INPUT").unwrap_or_default());

    let file_bytes = match std::fs::read(&filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("popcore {}: unable to read {}: {}", command, &filename, e);
            std::process::exit(1);
        }
    };

    match content_inspector::inspect(&file_bytes) {
        ContentType::UTF_8 | ContentType::UTF_8_BOM => {}
        _ => {
            eprintln!("popcore {}: {} must be in JSON format", command, &filename);
            std::process::exit(1);
        }
    }

    let contents = String::from_utf8(file_bytes).unwrap_or_else(|_| {
        eprintln!("popcore {}: {} is not valid UTF-8", command, &filename);
        std::process::exit(1);
    });
    (filename, contents)
}
