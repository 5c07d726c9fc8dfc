use ed25519_dalek::Keypair;
use popcore::{Message, MessageHeader};
use serde_json::Value;

pub fn command_sign(matches: &clap::ArgMatches, keypair: Option<&Keypair>) {
    let keypair = match keypair {
        Some(keypair) => keypair,
        None => {
            eprintln!("popcore sign: --secret-key or POPCORE_SECRET_KEY required");
            std::process::exit(1);
        }
    };

    let (filename, contents) = crate::read_input("sign", matches);
    let data: Value = serde_json::from_str(contents.trim()).unwrap_or_else(|e| {
        eprintln!("popcore sign: unable to read {}: {}", &filename, e);
        std::process::exit(1);
    });

    // Refuse payloads no node would dispatch
    let header = MessageHeader::from_value(&data).and_then(|header| header.key());
    if let Err(e) = header {
        eprintln!("popcore sign: {}: {}", &filename, e);
        std::process::exit(1);
    }

    let message = Message::from_payload(&data, keypair).unwrap_or_else(|e| {
        eprintln!("popcore sign: {}", e);
        std::process::exit(1);
    });

    match serde_json::to_string_pretty(&message) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("popcore sign: {}", e);
            std::process::exit(1);
        }
    }
}
