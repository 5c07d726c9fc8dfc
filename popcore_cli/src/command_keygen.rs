use popcore::public_key_to_b64;

pub fn command_keygen() {
    let keypair = popcore::generate_keypair();

    println!("secret-key: {}", hex::encode(keypair.secret.to_bytes()));
    println!("public-key: {}", public_key_to_b64(&keypair.public));
}
