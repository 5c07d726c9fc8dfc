use popcore::{public_key_to_b64, Config, Message};

pub fn command_verify(matches: &clap::ArgMatches) {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("popcore verify: {}", e);
        std::process::exit(1);
    });

    let (filename, contents) = crate::read_input("verify", matches);
    let message: Message = serde_json::from_str(contents.trim()).unwrap_or_else(|e| {
        eprintln!("popcore verify: unable to read {}: {}", &filename, e);
        std::process::exit(1);
    });

    if let Err(e) = message.verify(&config) {
        eprintln!("popcore verify: {} failed verification: {}", &filename, e);
        std::process::exit(1);
    }

    let data = message.decode_data().unwrap_or_else(|e| {
        eprintln!("popcore verify: {}", e);
        std::process::exit(1);
    });

    println!("> Message {} verified OK", message.message_id);
    println!("  sender: {}", public_key_to_b64(&message.sender));
    println!("  witness signatures: {}", message.witness_signatures.len());
    match serde_json::to_string_pretty(&data) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("popcore verify: {}", e);
            std::process::exit(1);
        }
    }
}
