use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, Args};
use crossbeam::channel::{after, bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tedium_loop::config::DebugFlags;
use tedium_loop::dump::{print_channels, print_topology};
use tedium_loop::line::Abcd;
use tedium_loop::sim::HostMessage;
use tedium_loop::span::ChannelAddress;
use tedium_loop::{BusEvent, LoopConfig, Router, SimHost, System};

#[derive(Parser)]
#[clap(author, version, about, long_about=None)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub(crate) struct SpanArgs {
    /// Pairs of looped spans.
    #[clap(long, default_value_t=1)]
    loops: usize,

    /// Pairs of tap spans.
    #[clap(long, default_value_t=1)]
    taps: usize,
}

#[derive(Args)]
pub(crate) struct RunArgs {
    #[clap(flatten)]
    spans: SpanArgs,

    /// Debug bits: 1 = general, 2 = tick heartbeat.
    #[clap(long, default_value_t=0)]
    debug: u32,

    /// Stop after this many seconds.
    #[clap(long, default_value_t=10)]
    seconds: u64,

    #[clap(long)]
    realtime: bool,
}

#[derive(Args)]
pub(crate) struct TopologyArgs {
    #[clap(flatten)]
    spans: SpanArgs,

    /// Also list every channel.
    #[clap(long)]
    channels: bool,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    #[clap(name="run")]
    Run(RunArgs),

    #[clap(name="topology")]
    Topology(TopologyArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    let debug = match &args.command {
        Commands::Run(a) => DebugFlags(a.debug),
        Commands::Topology(_) => DebugFlags::default(),
    };
    init_logging(debug);

    match args.command {
        Commands::Run(a) => {
            let config = LoopConfig {
                debug,
                realtime: a.realtime,
                ..LoopConfig::new(a.spans.loops, a.spans.taps)
            };
            run(config, Duration::from_secs(a.seconds))?;
        },
        Commands::Topology(a) => {
            let system = System::build(LoopConfig::new(a.spans.loops, a.spans.taps), SimHost::new())?;
            print_topology(system.bank());
            if a.channels {
                for span in system.bank().spans() {
                    print_channels(span);
                }
            }
            system.teardown()?;
        },
    }

    Ok(())
}

fn init_logging(debug: DebugFlags) {
    let default = if debug.general() || debug.ticks() { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

///////////////////////////////////////////////////////////////////////

fn run(config: LoopConfig, duration: Duration) -> Result<(), Box<dyn Error>> {
    let (command_sender, command_receiver) = unbounded();
    let (event_sender, event_receiver) = unbounded();

    let host = SimHost::new()
        .with_commands(command_receiver)
        .with_events(event_sender.clone());

    let mut system = System::build(config, host)?.with_events(event_sender);
    for span in system.bank().spans() {
        span.startup()?;
    }
    if let Err(e) = system.start() {
        system.teardown()?;
        return Err(e.into());
    }

    let (stop_sender, stop_receiver) = bounded(1);
    let driver = thread::Builder::new()
        .name("repatch".into())
        .spawn({
            let router = system.router();
            move || drive(router, command_sender, stop_receiver)
        })?;

    monitor(event_receiver, duration);

    let _ = stop_sender.send(());
    if driver.join().is_err() {
        error!("demo driver panicked");
    }

    for span in system.bank().spans() {
        span.shutdown();
    }
    let host = system.teardown()?;
    info!("{} span(s) still registered", host.registered().len());

    Ok(())
}

/// Quick demo: once a second, send a pattern on span 1 channel 1 and flip
/// its A/B bits.
fn drive(router: Router, commands: Sender<HostMessage>, stop: Receiver<()>) {
    let address = ChannelAddress::new(0, 1);
    let mut off_hook = false;
    let mut sample = 0u8;

    loop {
        let pattern = [sample; 8];
        if commands.send(HostMessage::Write(address, pattern)).is_err() {
            break;
        }

        let bits = Abcd::new().with_a(off_hook).with_b(off_hook);
        if let Err(e) = router.on_signaling_update(address, u8::from(bits)) {
            error!("signaling update on {address} failed: {e}");
        }

        off_hook = !off_hook;
        sample = sample.wrapping_add(0x11);

        match stop.recv_timeout(Duration::from_millis(1000)) {
            Err(RecvTimeoutError::Timeout) => {},
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn monitor(receiver: Receiver<BusEvent>, duration: Duration) {
    let deadline = after(duration);
    let started = Instant::now();

    loop {
        select! {
            recv(receiver) -> m => match m {
                Ok(BusEvent::RobbedBitState(address, bits)) => {
                    eprintln!("{:>8.3} {address} ABCD={:?}", started.elapsed().as_secs_f32(), Abcd::from(bits));
                },
                Ok(BusEvent::Received(address, chunk)) => {
                    eprintln!("{:>8.3} {address} {chunk:02x?}", started.elapsed().as_secs_f32());
                },
                Ok(BusEvent::TickOverrun { skipped }) => {
                    eprintln!("{:>8.3} tick overrun, {skipped} skipped", started.elapsed().as_secs_f32());
                },
                Err(_) => break,
            },
            recv(deadline) -> _ => break,
        }
    }
}
