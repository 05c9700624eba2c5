//! Spool JSON records into a flume shard tree for downstream pickup.

use shiplog::prelude::field;
use shiplog::writers::flume::{FlumeWriter, Selector, SendMode};
use shiplog::{production_config, WriteSyncer};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

fn main() -> shiplog::Result<()> {
    // The picker normally owns this tree; lay out two shards for the demo.
    let base = std::env::temp_dir().join("shiplog-flume-demo");
    let root = base.join("flume");
    for shard in ["1", "2"] {
        fs::create_dir_all(root.join(shard).join("multiplexing"))?;
    }
    fs::create_dir_all(root.join("temp").join("multiplexing"))?;

    let writer = FlumeWriter::builder(&root, root.join("temp"), "orders")
        .send_mode(SendMode::Multiplexing)
        .selector(Selector::Es)
        .write_file_interval(Duration::from_secs(2))
        .max_log_count(100)
        .move_temp_file()
        .build()?;

    let mut cfg = production_config(vec![Arc::new(writer.clone()) as Arc<dyn WriteSyncer>]);
    cfg.name = "orders".to_string();
    let logger = cfg.build([])?;

    for seq in 0..250 {
        logger.info(
            "order accepted",
            &[field::int("seq", seq), field::string("sku", "A-1042")],
        );
    }

    logger.sync()?;
    writer.close()?;

    for shard in ["1", "2"] {
        let dir = root.join(shard).join("multiplexing");
        for entry in fs::read_dir(&dir)?.flatten() {
            println!("{} -> {}", shard, entry.file_name().to_string_lossy());
        }
    }
    Ok(())
}
