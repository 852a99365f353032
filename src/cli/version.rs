/// Display version information
pub fn execute() {
    println!("wabridge {}", env!("CARGO_PKG_VERSION"));
    println!("Messaging bridge: pairing, inbound logging and outbound sends");
}
