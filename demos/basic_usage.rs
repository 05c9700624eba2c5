//! Basic usage: presets, typed fields, the sugared adapter.

use shiplog::prelude::field;
use shiplog::{development_config, infof, kv, AtomicLevel, Level};

fn main() -> shiplog::Result<()> {
    let mut cfg = development_config(vec![shiplog::writers::stdout()]);
    cfg.name = "demo".to_string();
    let level = AtomicLevel::new(Level::Debug);
    cfg.level = level.clone();
    let logger = cfg.build([])?;

    logger.fixed("service starting", &[field::string("listen", ":8080")]);
    logger.info(
        "request finished",
        &[
            field::string("method", "GET"),
            field::int("status", 200),
            field::duration("elapsed", std::time::Duration::from_millis(12)),
        ],
    );

    let scoped = logger.with(&[field::int("worker", 3)]);
    scoped.debug("picked up job", &[field::string("job", "reindex")]);

    // Run-time level change propagates to every derived logger.
    level.set_level(Level::Warn);
    scoped.debug("now invisible", &[]);
    scoped.warn("queue is deep", &[field::int("depth", 512)]);

    // The sugared adapter trades a little speed for terser call sites.
    let sugar = logger.sugar();
    infof!(sugar, "cache hit ratio {:.2}", 0.93);
    sugar.info("job done", kv!["job", "reindex", "docs", 15_000i64]);

    logger.sync()
}
