//! The encoder + syncer + gate triple

use super::entry::{CheckedEntry, Entry};
use super::error::Result;
use super::field::Field;
use super::level::{Level, LevelFilter};
use crate::encoders::Encoder;
use crate::writers::WriteSyncer;
use std::sync::Arc;

/// Where gate, encoder and sink meet.
///
/// `with` returns a core that prepends the given fields to every future
/// record; `write` encodes and pushes one record. Level inspection happens
/// through [`check`](CoreExt::check) on `Arc<dyn Core>`.
pub trait Core: Send + Sync {
    fn enabled(&self, level: Level) -> bool;
    fn with(&self, fields: &[Field]) -> Arc<dyn Core>;
    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<()>;
    fn sync(&self) -> Result<()>;
}

/// Gate check for shared cores.
pub trait CoreExt {
    /// If the gate admits the entry, append this core to the checked entry
    /// (creating it when needed) and return it; otherwise hand back
    /// whatever was passed in.
    fn check(&self, entry: &Entry, ce: Option<CheckedEntry>) -> Option<CheckedEntry>;
}

impl CoreExt for Arc<dyn Core> {
    fn check(&self, entry: &Entry, ce: Option<CheckedEntry>) -> Option<CheckedEntry> {
        if self.enabled(entry.level) {
            let mut ce = ce.unwrap_or_else(|| CheckedEntry::new(entry.clone()));
            ce.add_core(Arc::clone(self));
            return Some(ce);
        }
        ce
    }
}

/// Standard core: one encoder, one syncer, one level filter.
pub struct EncoderCore {
    encoder: Box<dyn Encoder>,
    out: Arc<dyn WriteSyncer>,
    filter: Arc<dyn LevelFilter>,
}

impl EncoderCore {
    pub fn new(
        encoder: Box<dyn Encoder>,
        out: Arc<dyn WriteSyncer>,
        filter: Arc<dyn LevelFilter>,
    ) -> Arc<dyn Core> {
        Arc::new(EncoderCore {
            encoder,
            out,
            filter,
        })
    }
}

impl Core for EncoderCore {
    fn enabled(&self, level: Level) -> bool {
        self.filter.enabled(level)
    }

    fn with(&self, fields: &[Field]) -> Arc<dyn Core> {
        let mut encoder = self.encoder.clone_encoder();
        encoder.add_fields(fields);
        Arc::new(EncoderCore {
            encoder,
            out: Arc::clone(&self.out),
            filter: Arc::clone(&self.filter),
        })
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<()> {
        let buf = self.encoder.encode_entry(entry, fields)?;
        self.out.write(&buf)?;
        if entry.level > Level::Error {
            // Records above Error flush eagerly; the process may be about
            // to terminate.
            self.out.sync()?;
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.out.sync()
    }
}

struct NopCore;

impl Core for NopCore {
    fn enabled(&self, _level: Level) -> bool {
        false
    }

    fn with(&self, _fields: &[Field]) -> Arc<dyn Core> {
        Arc::new(NopCore)
    }

    fn write(&self, _entry: &Entry, _fields: &[Field]) -> Result<()> {
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// A core that never writes and never errs.
pub fn nop_core() -> Arc<dyn Core> {
    Arc::new(NopCore)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::TimeZone;
    use crate::core::field;
    use crate::core::level::AtomicLevel;
    use crate::encoders::{EncoderConfig, JsonEncoder};
    use parking_lot::Mutex;

    struct VecSyncer(Mutex<Vec<u8>>);

    impl WriteSyncer for VecSyncer {
        fn write(&self, buf: &[u8]) -> Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn sync(&self) -> Result<()> {
            Ok(())
        }
    }

    fn json_core(level: AtomicLevel) -> (Arc<dyn Core>, Arc<VecSyncer>) {
        let cfg = EncoderConfig {
            level_key: "level".to_string(),
            message_key: "msg".to_string(),
            ..EncoderConfig::default()
        };
        let out = Arc::new(VecSyncer(Mutex::new(Vec::new())));
        let core = EncoderCore::new(
            Box::new(JsonEncoder::new(cfg)),
            out.clone(),
            Arc::new(level),
        );
        (core, out)
    }

    #[test]
    fn test_check_respects_gate() {
        let (core, _) = json_core(AtomicLevel::new(Level::Warn));
        let debug = Entry::new(Level::Debug, "no", TimeZone::Utc);
        let warn = Entry::new(Level::Warn, "yes", TimeZone::Utc);

        assert!(core.check(&debug, None).is_none());
        let ce = core.check(&warn, None).expect("admitted");
        assert!(ce.will_write());
    }

    #[test]
    fn test_atomic_level_flip_propagates() {
        let level = AtomicLevel::new(Level::Warn);
        let (core, _) = json_core(level.clone());
        let entry = Entry::new(Level::Debug, "m", TimeZone::Utc);

        assert!(core.check(&entry, None).is_none());
        level.set_level(Level::Debug);
        assert!(core.check(&entry, None).is_some());
    }

    #[test]
    fn test_with_prepends_context() {
        let (core, out) = json_core(AtomicLevel::new(Level::Debug));
        let derived = core.with(&[field::int("req", 7)]);

        let entry = Entry::new(Level::Info, "m", TimeZone::Utc);
        derived
            .write(&entry, &[field::string("why", "x")])
            .expect("write");

        let line = String::from_utf8(out.0.lock().clone()).unwrap();
        assert!(line.contains("\"req\":7"));
        assert!(line.contains("\"why\":\"x\""));

        // The parent core saw nothing of the derived context.
        core.write(&entry, &[]).expect("write");
        let all = String::from_utf8(out.0.lock().clone()).unwrap();
        let second_line = all.lines().nth(1).unwrap();
        assert!(!second_line.contains("req"));
    }

    #[test]
    fn test_nop_core() {
        let core = nop_core();
        assert!(!core.enabled(Level::Fixed));
        let entry = Entry::new(Level::Fixed, "m", TimeZone::Utc);
        assert!(core.check(&entry, None).is_none());
        assert!(core.sync().is_ok());
    }
}
