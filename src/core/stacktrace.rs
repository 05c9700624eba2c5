//! Stack capture with self-frame and duplicate-frame elision

use backtrace::Backtrace;
use std::sync::atomic::{AtomicBool, Ordering};

/// When set, the top run of frames belonging to this crate (and the
/// capture machinery) is elided. Tests flip this off to see the full
/// stack.
static SKIP_OWN_FRAMES: AtomicBool = AtomicBool::new(true);

pub fn set_skip_own_frames(enabled: bool) {
    SKIP_OWN_FRAMES.store(enabled, Ordering::Relaxed);
}

fn is_own_frame(function: &str) -> bool {
    function.starts_with(concat!(env!("CARGO_PKG_NAME"), "::"))
        || function.starts_with("shiplog::")
        || function.starts_with("backtrace::")
        || function.starts_with("std::backtrace")
}

/// Strip the symbol down to its final segments.
///
/// `shiplog::writers::flume::handle::flush::h1f2e...` becomes
/// `handle::flush`.
pub fn short_function_name(name: &str) -> String {
    let mut n = name;
    // Drop the trailing ::h<hex> disambiguator if present.
    if let Some(idx) = n.rfind("::h") {
        if n[idx + 3..].chars().all(|c| c.is_ascii_hexdigit()) && n.len() - idx - 3 >= 8 {
            n = &n[..idx];
        }
    }
    let segments: Vec<&str> = n.rsplitn(3, "::").collect();
    match segments.len() {
        0 | 1 => n.to_string(),
        _ => {
            let mut keep: Vec<&str> = segments.iter().take(2).copied().collect();
            keep.reverse();
            keep.join("::")
        }
    }
}

pub fn take_stacktrace() -> String {
    take_stacktrace_skip(0, 0)
}

/// Render the current stack.
///
/// `skip_caller` skips frames above the capture point after the top run of
/// crate-internal frames has been elided. `duplicate_frame_skip = N` keeps
/// a ring of the last N frames and drops any frame whose `(file, line)`
/// equals the frame N positions earlier, which suppresses recursion spam.
///
/// Frame format: `<short-function-name>\n\t<file>:<line>`.
pub fn take_stacktrace_skip(skip_caller: usize, duplicate_frame_skip: usize) -> String {
    let bt = Backtrace::new();

    let mut out = String::new();
    let mut eliding = SKIP_OWN_FRAMES.load(Ordering::Relaxed);
    let mut skipped = 0usize;
    let mut written = 0usize;
    let mut ring: Vec<(String, u32)> = vec![(String::new(), 0); duplicate_frame_skip];

    for frame in bt.frames() {
        for symbol in frame.symbols() {
            let name = symbol
                .name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());

            // Prefix elision applies only to the top contiguous run.
            if eliding {
                if is_own_frame(&name) {
                    continue;
                }
                eliding = false;
            }

            if skipped < skip_caller {
                skipped += 1;
                continue;
            }

            let file = symbol
                .filename()
                .and_then(|p| p.to_str())
                .unwrap_or("<unknown>")
                .to_string();
            let line = symbol.lineno().unwrap_or(0);

            if duplicate_frame_skip > 0 {
                if written >= duplicate_frame_skip {
                    let pre = (written - duplicate_frame_skip) % duplicate_frame_skip;
                    if ring[pre].0 == file && ring[pre].1 == line {
                        continue;
                    }
                }
                ring[written % duplicate_frame_skip] = (file.clone(), line);
            }

            if written != 0 {
                out.push('\n');
            }
            written += 1;

            out.push_str(&short_function_name(&name));
            out.push('\n');
            out.push('\t');
            out.push_str(&file);
            out.push(':');
            out.push_str(&line.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_function_name() {
        assert_eq!(
            short_function_name("shiplog::core::field::stack_skip::h0123456789abcdef"),
            "field::stack_skip"
        );
        assert_eq!(short_function_name("main"), "main");
        assert_eq!(short_function_name("app::main"), "app::main");
    }

    #[test]
    fn test_frame_format() {
        let trace = take_stacktrace();
        if trace.is_empty() {
            // Symbols may be unavailable in fully stripped builds.
            return;
        }
        let first = trace.lines().next().unwrap();
        let second = trace.lines().nth(1).unwrap_or("\t:0");
        assert!(!first.starts_with('\t'));
        assert!(second.starts_with('\t'));
        assert!(second.contains(':'));
    }

    fn recursive_capture(depth: usize, collected: &mut Vec<String>) {
        if depth == 0 {
            collected.push(take_stacktrace_skip(0, 1));
            return;
        }
        recursive_capture(depth - 1, collected);
    }

    #[test]
    fn test_duplicate_frame_elision() {
        // Inside this crate every recursion frame carries the crate
        // prefix, so prefix elision would swallow the whole chain.
        set_skip_own_frames(false);
        let mut collected = Vec::new();
        recursive_capture(8, &mut collected);
        set_skip_own_frames(true);

        let trace = &collected[0];
        if trace.is_empty() {
            return;
        }

        // With a ring of one, consecutive identical (file, line) pairs
        // collapse: each location may appear at most once in a row.
        let locations: Vec<&str> = trace
            .lines()
            .filter(|l| l.starts_with('\t'))
            .collect();
        for pair in locations.windows(2) {
            assert_ne!(pair[0], pair[1], "consecutive duplicate frame survived");
        }
    }
}
