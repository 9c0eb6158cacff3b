//! A simple CLI tool for encrypting a yes/no ballot client-side.
//! This uses the server's own Paillier implementation, and is by definition
//! compatible with the key descriptions and ballot bodies of our API.

use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use num_bigint::BigUint;
use rocket::serde::json::serde_json;

use tally_backend::model::{
    api::{ballot::BallotSubmission, key::KeyDescription},
    crypto::{decimal, PublicKey},
};

const PROGRAM_NAME: &str = "ballot-cli";

const ABOUT_TEXT: &str = "Encrypt a yes/no ballot under an election's public key.

The ballot is printed as JSON, ready to POST to `/elections/<election_id>/ballots`.

EXIT CODES:
     0: Ballot encrypted.
     1: Error.";

const ENCRYPT: &str = "encrypt";
const KEY_PATH: &str = "key";
const MODULUS: &str = "n";
const GENERATOR: &str = "g";
const CHOICE: &str = "choice";
const FINGERPRINT: &str = "fingerprint";

const KEY_PATH_HELP: &str = "The path to a JSON key description,\n\
as returned by `GET /elections/<election_id>/public_key`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .subcommand(
            Command::new(ENCRYPT)
                .about("Encrypt a single choice")
                .arg(
                    Arg::new(KEY_PATH)
                        .long(KEY_PATH)
                        .help(KEY_PATH_HELP)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new(MODULUS)
                        .long(MODULUS)
                        .help("The key's modulus, in decimal")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new(GENERATOR)
                        .long(GENERATOR)
                        .help("The key's generator, in decimal [default: n + 1]")
                        .requires(MODULUS)
                        .action(ArgAction::Set),
                )
                .group(
                    ArgGroup::new("public_key")
                        .args([KEY_PATH, MODULUS])
                        .required(true),
                )
                .arg(
                    Arg::new(CHOICE)
                        .long(CHOICE)
                        .help("The vote to cast")
                        .value_parser(["yes", "no"])
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new(FINGERPRINT)
                        .long(FINGERPRINT)
                        .help("Refuse to encrypt unless the key has this fingerprint")
                        .action(ArgAction::Set),
                ),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the key.
    Format(String),
    /// The key did not have the expected fingerprint.
    Fingerprint { expected: String, actual: String },
}

/// Work out the public key from either a key file or the raw parameters.
fn load_key(args: &ArgMatches) -> Result<PublicKey, Error> {
    if let Some(path) = args.get_one::<String>(KEY_PATH) {
        let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
        let key: KeyDescription =
            serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;
        return Ok(key.into());
    }

    // The argument group guarantees one of the two is present.
    let n = args
        .get_one::<String>(MODULUS)
        .ok_or_else(|| Error::Format("no public key given".to_string()))?;
    let n = parse_param(MODULUS, n)?;
    match args.get_one::<String>(GENERATOR) {
        Some(g) => Ok(PublicKey::from_parts(n, parse_param(GENERATOR, g)?)),
        None => Ok(PublicKey::new(n)),
    }
}

fn parse_param(name: &str, value: &str) -> Result<BigUint, Error> {
    decimal::parse(value.trim()).map_err(|e| Error::Format(format!("`{name}`: {e}")))
}

/// Encrypt the requested choice into a ballot body.
fn encrypt(args: &ArgMatches) -> Result<BallotSubmission, Error> {
    let public = load_key(args)?;
    let actual = public.fingerprint();
    if let Some(expected) = args.get_one::<String>(FINGERPRINT) {
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err(Error::Fingerprint {
                expected: expected.clone(),
                actual,
            });
        }
    }

    let choice = args.get_one::<String>(CHOICE).map(String::as_str) == Some("yes");
    let plaintext = BigUint::from(u8::from(choice));
    let ciphertext = public.encrypt(&plaintext, &mut rand::thread_rng());
    Ok(BallotSubmission {
        ciphertext: ciphertext.to_string(),
        pk_fingerprint: Some(actual),
    })
}

/// Encrypt, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let result = match args.subcommand() {
        Some((ENCRYPT, sub_args)) => encrypt(sub_args),
        _ => unreachable!("clap requires a known subcommand"),
    };
    match result {
        Ok(ballot) => match serde_json::to_string_pretty(&ballot) {
            Ok(json) => {
                println!("{json}");
                0
            }
            Err(e) => {
                println!("Failed to serialise ballot: {e}");
                1
            }
        },
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid key: {msg}");
            1
        }
        Err(Error::Fingerprint { expected, actual }) => {
            println!("Key fingerprint is {actual}, expected {expected}");
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
