use std::env;
use std::net::SocketAddr;
use std::process;

use log::error;

use coredis::server::DEFAULT_ADDR;
use coredis::Server;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Only --bind is recognized; anything else is ignored.
    let args: Vec<String> = env::args().skip(1).collect();
    let mut bind_addr = String::from(DEFAULT_ADDR);
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--bind" && i + 1 < args.len() {
            bind_addr = args[i + 1].clone();
            i += 1;
        }
        i += 1;
    }

    let addr: SocketAddr = match bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid bind address '{}': {}", bind_addr, e);
            process::exit(1);
        }
    };

    let mut server = match Server::bind(addr) {
        Ok(server) => server,
        Err(e) => {
            error!("failed to bind {}: {}", addr, e);
            process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        error!("server error: {}", e);
        process::exit(1);
    }
}
