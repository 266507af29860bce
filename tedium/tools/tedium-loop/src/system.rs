use std::sync::Arc;

use crossbeam::channel::Sender;
use tracing::{error, info, warn};

use crate::config::LoopConfig;
use crate::error::{LoopError, Result};
use crate::host::Host;
use crate::scheduler::{TickScheduler, Ticker};
use crate::signaling::Router;
use crate::span::SpanBank;
use crate::topology;
use crate::BusEvent;

enum Clock<H: Host> {
    Stopped(Ticker<H>),
    Running(TickScheduler<H>),
}

/// A built span bank together with its host and tick.
///
/// Tear down with `teardown`, which stops the tick before any span is handed
/// back to the host.
pub struct System<H: Host + 'static> {
    config: LoopConfig,
    bank: Arc<SpanBank>,
    clock: Option<Clock<H>>,
    events: Option<Sender<BusEvent>>,
}

impl<H: Host + 'static> System<H> {
    /// Build and register every span. Nothing is left registered on error.
    pub fn build(config: LoopConfig, mut host: H) -> Result<Self> {
        let bank = Arc::new(topology::build(&config, &mut host)?);
        info!(loop_pairs = config.loop_pairs, taps = config.taps, spans = bank.len(), "span bank built");

        let ticker = Ticker::new(bank.clone(), host, config.debug);

        Ok(Self {
            config,
            bank,
            clock: Some(Clock::Stopped(ticker)),
            events: None,
        })
    }

    /// Where signaling deliveries and tick overruns are reported.
    pub fn with_events(mut self, events: Sender<BusEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn bank(&self) -> &Arc<SpanBank> {
        &self.bank
    }

    /// Entry point for signaling changes. Usable from any thread.
    pub fn router(&self) -> Router {
        Router::new(self.bank.clone(), self.events.clone())
    }

    pub fn is_running(&self) -> bool {
        matches!(self.clock, Some(Clock::Running(_)))
    }

    /// The tick, while it is not running on its own thread.
    pub fn ticker_mut(&mut self) -> Option<&mut Ticker<H>> {
        match &mut self.clock {
            Some(Clock::Stopped(ticker)) => Some(ticker),
            _ => None,
        }
    }

    /// Start ticking every `config.period`. If the tick can't be started the
    /// system stays stopped and can still be torn down.
    pub fn start(&mut self) -> Result<()> {
        let ticker = match self.clock.take() {
            Some(Clock::Stopped(ticker)) => ticker,
            running => {
                self.clock = running;
                return Err(LoopError::AlreadyStarted);
            },
        };

        match TickScheduler::start(ticker, self.config.period, self.config.realtime, self.events.clone()) {
            Ok(scheduler) => {
                self.clock = Some(Clock::Running(scheduler));
                info!("timer started, good to go");
                Ok(())
            },
            Err((ticker, e)) => {
                self.clock = Some(Clock::Stopped(ticker));
                warn!(error = %e, "unable to start timer");
                Err(e)
            },
        }
    }

    /// Stop the tick, then unregister every span. Returns the host.
    ///
    /// If the tick thread was lost the host went with it; the spans are still
    /// marked unregistered before the error is returned.
    pub fn teardown(self) -> Result<H> {
        let ticker = match self.clock {
            Some(Clock::Stopped(ticker)) => Ok(ticker),
            Some(Clock::Running(scheduler)) => scheduler.cancel(),
            None => Err(LoopError::TimerPanicked),
        };

        match ticker {
            Ok(mut ticker) => {
                topology::unregister_all(self.bank.spans(), ticker.host_mut());
                info!("cleanup finished");
                Ok(ticker.into_host())
            },
            Err(e) => {
                error!(error = %e, "tick lost, spans released without the host");
                for span in self.bank.spans().iter().rev() {
                    span.mark_unregistered();
                }
                Err(e)
            },
        }
    }
}
