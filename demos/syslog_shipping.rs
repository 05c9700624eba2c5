//! Ship JSON records to a syslog collector over TCP.
//!
//! An in-process listener stands in for the collector so the demo runs
//! anywhere; point `raddr` at a real endpoint instead.

use shiplog::prelude::field;
use shiplog::writers::syslog::SyslogOptions;
use shiplog::{new_tcp_syslog2, production_config, WriteSyncer};
use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;

fn main() -> shiplog::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let raddr = listener.local_addr()?.to_string();
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            std::thread::spawn(move || {
                let mut stream = stream;
                let mut buf = [0u8; 4096];
                while let Ok(n) = stream.read(&mut buf) {
                    if n == 0 {
                        break;
                    }
                    print!("collector <- {}", String::from_utf8_lossy(&buf[..n]));
                }
            });
        }
    });

    let cache = std::env::temp_dir().join("shiplog-syslog-demo");
    let writer = new_tcp_syslog2(&raddr, SyslogOptions::new().cache_dir(&cache))?;

    let mut cfg = production_config(vec![Arc::new(writer.clone()) as Arc<dyn WriteSyncer>]);
    cfg.name = "payments".to_string();
    let logger = cfg.build([])?;

    for seq in 0..20 {
        logger.info("payment settled", &[field::int("seq", seq)]);
    }

    logger.sync()?;
    writer.sync()?;
    std::thread::sleep(std::time::Duration::from_millis(200));
    writer.close()
}
