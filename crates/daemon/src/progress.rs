//! Encoder progress parsing and bounded percentage tracking

use regex_lite::Regex;
use std::sync::OnceLock;

/// Receives bounded progress percentages for one conversion attempt
pub trait ProgressSink: Send {
    fn publish(&mut self, percent: f64);
    fn finished(&mut self);
}

fn out_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"out_time_ms=(\d+)").expect("valid regex literal"))
}

/// Extract the encoded position in seconds from one progress line
///
/// ffmpeg's `-progress pipe:1` emits key=value lines; `out_time_ms` carries
/// the cumulative encoded time in microseconds despite its name. Lines with
/// any other key yield None.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let caps = out_time_regex().captures(line)?;
    let micros: u64 = caps.get(1)?.as_str().parse().ok()?;
    Some(micros as f64 / 1_000_000.0)
}

/// Bounded completion percentage; None when the total is unknown
pub fn progress_percent(current_secs: f64, total_secs: f64) -> Option<f64> {
    if total_secs <= 0.0 {
        return None;
    }
    Some((current_secs / total_secs * 100.0).clamp(0.0, 100.0))
}

/// Maps encoded-time updates onto a progress sink
///
/// Holds the attempt's total duration and suppresses all reporting when the
/// duration is zero or unknown.
pub struct ProgressTracker {
    total_secs: f64,
    sink: Option<Box<dyn ProgressSink>>,
}

impl ProgressTracker {
    pub fn new(total_secs: f64, sink: Box<dyn ProgressSink>) -> Self {
        // An unknown total makes percentages meaningless; drop the sink
        let sink = (total_secs > 0.0).then_some(sink);
        Self { total_secs, sink }
    }

    /// A tracker that never reports
    pub fn disabled() -> Self {
        Self {
            total_secs: 0.0,
            sink: None,
        }
    }

    pub fn update(&mut self, current_secs: f64) {
        if let Some(sink) = self.sink.as_mut() {
            if let Some(percent) = progress_percent(current_secs, self.total_secs) {
                sink.publish(percent);
            }
        }
    }

    /// Finalize the sink; safe to call more than once
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.finished();
        }
    }
}
