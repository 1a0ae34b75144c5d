/// Routing worker loop
///
/// Reads one JSON event per line and writes one JSON `{endpoint, event}`
/// line per routed copy. Bad input is logged and skipped so a single
/// garbled event never stops the router.
use crate::config::types::Result;
use crate::routing::event::MidiEvent;
use crate::routing::table::RoutingTable;
use serde::Serialize;
use std::io::{BufRead, Write};

/// Counters for one worker run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub received: u64,
    pub routed: u64,
    pub dropped: u64,
    pub malformed: u64,
}

/// Route every event from `input` until end of stream
pub fn run_worker<R: BufRead, W: Write>(
    table: &RoutingTable,
    mut input: R,
    mut output: W,
) -> Result<WorkerStats> {
    let mut stats = WorkerStats::default();
    let mut buf = Vec::new();
    let mut line_no = 0u64;

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        // Raw bytes: one non-UTF-8 line must not end the stream
        let text = match std::str::from_utf8(&buf) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Skipping non-UTF-8 input on line {}: {}", line_no, e);
                stats.malformed += 1;
                continue;
            }
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: MidiEvent = match serde_json::from_str(trimmed) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Skipping malformed event on line {}: {}", line_no, e);
                stats.malformed += 1;
                continue;
            }
        };
        if let Err(reason) = event.validate() {
            log::warn!("Skipping out-of-range event on line {}: {}", line_no, reason);
            stats.malformed += 1;
            continue;
        }
        stats.received += 1;

        let routed = table.route(&event);
        if routed.is_empty() {
            log::trace!("No route for {:?}", event);
            stats.dropped += 1;
            continue;
        }

        for copy in &routed {
            let encoded = serde_json::to_string(copy).map_err(std::io::Error::from)?;
            writeln!(output, "{}", encoded)?;
        }
        stats.routed += routed.len() as u64;
        output.flush()?;
    }

    log::info!(
        "Router input closed: {} events in, {} copies out, {} dropped, {} malformed",
        stats.received,
        stats.routed,
        stats.dropped,
        stats.malformed
    );
    Ok(stats)
}
