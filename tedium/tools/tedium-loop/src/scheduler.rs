use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use audio_thread_priority::{demote_current_thread_from_real_time, promote_current_thread_to_real_time};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, warn};

use crate::chunk::{ChunkPlane, CHUNK_SIZE};
use crate::clock::TickClock;
use crate::config::DebugFlags;
use crate::error::{LoopError, Result};
use crate::host::Host;
use crate::span::SpanBank;
use crate::BusEvent;

const SAMPLE_RATE_HZ: u32 = 8000;

/// Heartbeat interval when tick debugging is on (five seconds at 1 kHz).
const HEARTBEAT_TICKS: u64 = 5000;

/// One tick's worth of work: the host, the chunk plane, and the spans.
pub struct Ticker<H: Host> {
    bank: Arc<SpanBank>,
    chunks: ChunkPlane,
    host: H,
    debug: DebugFlags,
    ticks: u64,
}

impl<H: Host> Ticker<H> {
    pub fn new(bank: Arc<SpanBank>, host: H, debug: DebugFlags) -> Self {
        let chunks = ChunkPlane::new(bank.len());

        Self {
            bank,
            chunks,
            host,
            debug,
            ticks: 0,
        }
    }

    /// Transmit every span, then receive every span, in ascending order.
    ///
    /// A hook failure skips that span for that pass only. Returns the number
    /// of hooks that failed.
    pub fn tick(&mut self) -> usize {
        let mut failures = 0;

        for span in self.bank.spans() {
            if let Err(e) = self.host.transmit(span, self.chunks.tx(span)) {
                warn!(span = span.index() + 1, error = %e, "transmit failed");
                failures += 1;
            }
        }

        for span in self.bank.spans() {
            if let Err(e) = self.host.receive(span, self.chunks.rx(span)) {
                warn!(span = span.index() + 1, error = %e, "receive failed");
                failures += 1;
            }
        }

        if self.debug.ticks() && heartbeat_due(self.ticks) {
            debug!("{HEARTBEAT_TICKS} ticks from timer");
        }
        self.ticks += 1;

        failures
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }
}

impl<H: Host> fmt::Debug for Ticker<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticker")
            .field("spans", &self.bank.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}

/// On the first tick, then every `HEARTBEAT_TICKS`.
fn heartbeat_due(ticks: u64) -> bool {
    ticks % HEARTBEAT_TICKS == 0
}

///////////////////////////////////////////////////////////////////////

/// Runs a `Ticker` on its own thread, once per period, until cancelled.
pub struct TickScheduler<H: Host> {
    cancel: Sender<()>,
    thread: JoinHandle<Option<Ticker<H>>>,
}

impl<H: Host + 'static> TickScheduler<H> {
    /// Start ticking. On failure the ticker, and the host with it, is handed
    /// back unchanged.
    pub fn start(
        ticker: Ticker<H>,
        period: Duration,
        realtime: bool,
        events: Option<Sender<BusEvent>>,
    ) -> std::result::Result<Self, (Ticker<H>, LoopError)> {
        if period.is_zero() {
            return Err((ticker, LoopError::ZeroPeriod));
        }

        let (cancel, cancelled) = bounded(1);

        // The ticker goes over a channel so a failed spawn can't take it down
        // with the closure.
        let (handoff, handed) = bounded(1);
        if let Err(e) = handoff.send(ticker) {
            return Err((e.into_inner(), LoopError::TimerStart("handoff closed".to_string())));
        }

        let thread = match thread::Builder::new()
            .name("loop_tick".to_string())
            .spawn({
                let handed = handed.clone();
                move || {
                    let ticker = handed.recv().ok()?;
                    Some(run(ticker, period, realtime, cancelled, events))
                }
            }) {
            Ok(thread) => thread,
            Err(e) => {
                return match handed.try_recv() {
                    Ok(ticker) => Err((ticker, LoopError::TimerStart(e.to_string()))),
                    Err(_) => unreachable!("tick handoff emptied without a thread"),
                };
            },
        };

        debug!(?period, "tick started");

        Ok(Self {
            cancel,
            thread,
        })
    }

    /// Stop the tick and wait for the thread to finish. No tick runs after
    /// this returns.
    pub fn cancel(self) -> Result<Ticker<H>> {
        let _ = self.cancel.send(());
        let ticker = self.thread.join().ok().flatten().ok_or(LoopError::TimerPanicked)?;
        debug!(ticks = ticker.ticks(), "tick stopped");
        Ok(ticker)
    }
}

fn run<H: Host>(
    mut ticker: Ticker<H>,
    period: Duration,
    realtime: bool,
    cancelled: Receiver<()>,
    events: Option<Sender<BusEvent>>,
) -> Ticker<H> {
    let priority = if realtime {
        match promote_current_thread_to_real_time(CHUNK_SIZE as u32, SAMPLE_RATE_HZ) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("unable to promote tick thread to real time: {e:?}");
                None
            },
        }
    } else {
        None
    };

    let mut clock = TickClock::start(Instant::now(), period);

    loop {
        match cancelled.recv_deadline(clock.expiry()) {
            Err(RecvTimeoutError::Timeout) => {},
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        if panic::catch_unwind(AssertUnwindSafe(|| ticker.tick())).is_err() {
            error!(ticks = ticker.ticks(), "tick panicked, stopping timer");
            break;
        }

        let overrun = clock.forward(Instant::now());
        if overrun > 1 {
            let skipped = overrun - 1;
            warn!("timer missed {skipped} ticks");
            if let Some(events) = &events {
                let _ = events.send(BusEvent::TickOverrun { skipped });
            }
        }
    }

    if let Some(handle) = priority {
        if let Err(e) = demote_current_thread_from_real_time(handle) {
            warn!("unable to demote tick thread: {e:?}");
        }
    }

    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{RxChunks, TxChunks};
    use crate::error::HostError;
    use crate::span::Span;
    use crate::topology::layout;

    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    enum Call {
        Transmit(usize),
        Receive(usize),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        fail_transmit: Option<usize>,
        stall_first_tick: Option<Duration>,
        panic_on_tick: Option<usize>,
    }

    impl Host for Recorder {
        fn register_span(&mut self, _: &Span) -> std::result::Result<(), HostError> {
            Ok(())
        }

        fn unregister_span(&mut self, _: &Span) {}

        fn transmit(&mut self, span: &Span, _: TxChunks<'_>) -> std::result::Result<(), HostError> {
            if self.calls.is_empty() {
                if let Some(stall) = self.stall_first_tick {
                    thread::sleep(stall);
                }
            }
            if span.index() == 0 && self.panic_on_tick == Some(self.calls.len() / 8) {
                panic!("host fell over");
            }
            self.calls.push(Call::Transmit(span.index()));
            if self.fail_transmit == Some(span.index()) {
                return Err(HostError::Hook { hook: "transmit", span: span.index(), reason: "test".into() });
            }
            Ok(())
        }

        fn receive(&mut self, span: &Span, _: RxChunks<'_>) -> std::result::Result<(), HostError> {
            self.calls.push(Call::Receive(span.index()));
            Ok(())
        }
    }

    fn ticker(host: Recorder) -> Ticker<Recorder> {
        Ticker::new(Arc::new(layout(1, 1).unwrap()), host, DebugFlags::default())
    }

    #[test]
    fn all_transmits_before_any_receive() {
        let mut t = ticker(Recorder::default());
        t.tick();
        t.tick();

        use Call::*;
        let one_tick = [
            Transmit(0), Transmit(1), Transmit(2), Transmit(3),
            Receive(0), Receive(1), Receive(2), Receive(3),
        ];
        let expected: Vec<Call> = one_tick.iter().chain(one_tick.iter()).copied().collect();
        assert_eq!(t.host().calls, expected);
        assert_eq!(t.ticks(), 2);
    }

    #[test]
    fn failing_hook_does_not_stop_the_tick() {
        let mut t = ticker(Recorder { fail_transmit: Some(1), ..Default::default() });
        assert_eq!(t.tick(), 1);

        let calls = &t.host().calls;
        assert_eq!(calls.len(), 8);
        assert_eq!(calls[2], Call::Transmit(2));
        assert_eq!(calls[7], Call::Receive(3));
    }

    #[test]
    fn zero_period_is_rejected() {
        let result = TickScheduler::start(ticker(Recorder { calls: vec![Call::Receive(9)], ..Default::default() }), Duration::ZERO, false, None);
        match result {
            Err((t, LoopError::ZeroPeriod)) => assert_eq!(t.host().calls, vec![Call::Receive(9)]),
            _ => panic!("expected ZeroPeriod with the ticker handed back"),
        }
    }

    #[test]
    fn heartbeat_on_first_tick_then_every_5000() {
        assert!(heartbeat_due(0));
        assert!(!heartbeat_due(1));
        assert!(!heartbeat_due(4999));
        assert!(heartbeat_due(5000));
        assert!(heartbeat_due(10000));
    }

    #[test]
    fn late_tick_reports_overrun() {
        let period = Duration::from_millis(2);
        let host = Recorder { stall_first_tick: Some(period * 6), ..Default::default() };
        let (sender, receiver) = crossbeam::channel::unbounded();

        let scheduler = TickScheduler::start(ticker(host), period, false, Some(sender)).unwrap();
        let event = receiver.recv_timeout(Duration::from_secs(5));
        scheduler.cancel().unwrap();

        match event {
            Ok(BusEvent::TickOverrun { skipped }) => assert!(skipped >= 3, "skipped {skipped}"),
            other => panic!("expected an overrun, got {other:?}"),
        }
    }

    #[test]
    fn panicking_host_is_handed_back() {
        let host = Recorder { panic_on_tick: Some(2), ..Default::default() };
        let scheduler = TickScheduler::start(ticker(host), Duration::from_millis(1), false, None).unwrap();
        thread::sleep(Duration::from_millis(50));

        let t = scheduler.cancel().unwrap();
        assert_eq!(t.ticks(), 2);
        assert_eq!(t.host().calls.len(), 16);
    }

    #[test]
    fn runs_until_cancelled() {
        let scheduler = TickScheduler::start(ticker(Recorder::default()), Duration::from_millis(1), false, None).unwrap();
        thread::sleep(Duration::from_millis(50));
        let t = scheduler.cancel().unwrap();

        let ticks = t.ticks();
        assert!(ticks > 0);

        // Whole ticks only: every transmit pass has its receive pass.
        assert_eq!(t.host().calls.len() as u64, ticks * 8);

        // Nothing runs once cancel has returned.
        let host = t.into_host();
        assert_eq!(host.calls.len() as u64, ticks * 8);
    }
}
