//! Phase mark sheet for one request.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::types::PhaseTimings;

/// Phase boundary observed by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    DnsStart,
    DnsEnd,
    ConnectStart,
    ConnectEnd,
    TlsStart,
    TlsEnd,
    End,
}

#[derive(Debug, Default, Clone, Copy)]
struct Marks {
    dns_start: Option<Instant>,
    dns_end: Option<Instant>,
    connect_start: Option<Instant>,
    connect_end: Option<Instant>,
    tls_start: Option<Instant>,
    tls_end: Option<Instant>,
    last_write: Option<Instant>,
    upload_end: Option<Instant>,
    first_byte: Option<Instant>,
    end: Option<Instant>,
    remote: Option<SocketAddr>,
}

/// Shared, cloneable recorder of phase timestamps.
///
/// The transport writes marks as it goes; the caller keeps its own clone so
/// the marks survive the transport future being dropped on timeout or
/// cancellation. Every mark is set once; the first observation wins.
#[derive(Debug, Clone)]
pub struct PhaseRecorder {
    started: Instant,
    marks: Arc<Mutex<Marks>>,
}

impl Default for PhaseRecorder {
    fn default() -> Self {
        Self::start()
    }
}

impl PhaseRecorder {
    /// Start the clock
    pub fn start() -> Self {
        Self { started: Instant::now(), marks: Arc::new(Mutex::new(Marks::default())) }
    }

    fn lock(&self) -> MutexGuard<'_, Marks> {
        self.marks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a phase boundary at the current instant
    pub fn mark(&self, mark: Mark) {
        let now = Instant::now();
        let mut marks = self.lock();
        let slot = match mark {
            Mark::DnsStart => &mut marks.dns_start,
            Mark::DnsEnd => &mut marks.dns_end,
            Mark::ConnectStart => &mut marks.connect_start,
            Mark::ConnectEnd => &mut marks.connect_end,
            Mark::TlsStart => &mut marks.tls_start,
            Mark::TlsEnd => &mut marks.tls_end,
            Mark::End => &mut marks.end,
        };
        slot.get_or_insert(now);
    }

    pub fn set_remote(&self, addr: SocketAddr) {
        self.lock().remote = Some(addr);
    }

    /// Address of the peer the request was sent to, once connected
    pub fn remote(&self) -> Option<SocketAddr> {
        self.lock().remote
    }

    /// Bytes of the request went out
    pub(crate) fn record_write(&self) {
        let now = Instant::now();
        let mut marks = self.lock();
        if marks.first_byte.is_none() {
            marks.last_write = Some(now);
        }
    }

    /// Bytes of the response came in
    pub(crate) fn record_read(&self) {
        let now = Instant::now();
        let mut marks = self.lock();
        if marks.first_byte.is_none() {
            marks.first_byte = Some(now);
            marks.upload_end = marks.last_write;
        }
    }

    /// Time since the recorder was started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Close the request lifecycle and compute the phase durations
    pub fn finish(&self) -> PhaseTimings {
        self.mark(Mark::End);
        self.timings()
    }

    /// Phase durations observed so far; an open request is measured up to now
    pub fn timings(&self) -> PhaseTimings {
        let marks = *self.lock();
        let end = marks.end.unwrap_or_else(Instant::now);

        let span = |from: Option<Instant>, to: Option<Instant>| match (from, to) {
            (Some(from), Some(to)) => millis(to.saturating_duration_since(from)),
            _ => 0.0,
        };

        // A phase that started but never finished failed or ran out of time
        let open = |from: Option<Instant>, to: Option<Instant>| span(from, to.or(Some(end)));

        let sent_from = marks.tls_end.or(marks.connect_end);

        PhaseTimings {
            wait: span(Some(self.started), marks.dns_start),
            dns: open(marks.dns_start, marks.dns_end),
            tcp: open(marks.connect_start, marks.connect_end),
            tls: open(marks.tls_start, marks.tls_end),
            upload: span(sent_from, marks.upload_end),
            ttfb: span(marks.upload_end, marks.first_byte),
            download: span(marks.first_byte, Some(end)),
            total: span(Some(self.started), Some(end)),
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmeasured_phases_are_zero() {
        let recorder = PhaseRecorder::start();
        recorder.mark(Mark::DnsStart);
        recorder.mark(Mark::DnsEnd);
        let timings = recorder.finish();

        assert_eq!(timings.tcp, 0.0);
        assert_eq!(timings.tls, 0.0);
        assert_eq!(timings.ttfb, 0.0);
        assert_eq!(timings.download, 0.0);
        assert!(timings.total >= 0.0);
    }

    #[test]
    fn test_full_lifecycle_sums_within_total() {
        let recorder = PhaseRecorder::start();
        let pause = || std::thread::sleep(Duration::from_millis(2));

        recorder.mark(Mark::DnsStart);
        pause();
        recorder.mark(Mark::DnsEnd);
        recorder.mark(Mark::ConnectStart);
        pause();
        recorder.mark(Mark::ConnectEnd);
        recorder.mark(Mark::TlsStart);
        pause();
        recorder.mark(Mark::TlsEnd);
        recorder.record_write();
        pause();
        recorder.record_read();
        pause();
        let timings = recorder.finish();

        assert!(timings.dns >= 2.0);
        assert!(timings.tcp >= 2.0);
        assert!(timings.tls >= 2.0);
        assert!(timings.ttfb >= 2.0);
        assert!(timings.download >= 2.0);
        assert!(timings.phase_sum() <= timings.total + 1e-6);
    }

    #[test]
    fn test_unfinished_phase_runs_to_end() {
        let recorder = PhaseRecorder::start();
        recorder.mark(Mark::DnsStart);
        recorder.mark(Mark::DnsEnd);
        recorder.mark(Mark::ConnectStart);
        recorder.mark(Mark::ConnectEnd);
        recorder.mark(Mark::TlsStart);
        std::thread::sleep(Duration::from_millis(3));
        let timings = recorder.finish();

        assert!(timings.tls >= 3.0, "tls was {}", timings.tls);
        assert_eq!(timings.upload, 0.0);
        assert_eq!(timings.download, 0.0);
        assert!(timings.phase_sum() <= timings.total + 1e-6);
    }

    #[test]
    fn test_first_mark_wins() {
        let recorder = PhaseRecorder::start();
        recorder.mark(Mark::End);
        let first = recorder.timings().total;
        std::thread::sleep(Duration::from_millis(2));
        recorder.mark(Mark::End);
        assert_eq!(recorder.timings().total, first);
    }

    #[test]
    fn test_writes_after_first_byte_do_not_move_upload() {
        let recorder = PhaseRecorder::start();
        recorder.mark(Mark::ConnectStart);
        recorder.mark(Mark::ConnectEnd);
        recorder.record_write();
        recorder.record_read();
        let before = recorder.timings().upload;
        std::thread::sleep(Duration::from_millis(2));
        recorder.record_write();
        assert_eq!(recorder.finish().upload, before);
    }
}
