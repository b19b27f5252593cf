//! A transfer between two simulated nodes.
//!
//! Runs a client and a server stack back to back, streams a payload from one to the other and
//! reports how the connection coped with the configured link. Set `RUST_LOG=trace` to follow
//! every segment. Call example:
//!
//! * `emtcp-sim -n 100000 --loss 0.05 --seed 7 --server-medium spi`
use emtcp_sim::{config::Config, run};

fn main() {
    env_logger::init();
    let config = Config::from_args();

    println!(
        "[+] Sending {} bytes, client buffers in {}, server buffers in {}",
        config.bytes,
        config.client_medium,
        config.server_medium,
    );

    match run(&config) {
        Ok(score) => {
            println!("[+] Done\n");
            println!("{}", score);
        },
        Err(err) => {
            eprintln!("[-] {}", err);
            std::process::exit(1);
        },
    }
}
