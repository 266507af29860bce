use console::{style, Color};

use crate::lifecycle::SpanState;
use crate::line::LineConfig;
use crate::span::{Role, Span, SpanBank, DEVICE_TYPE, LOCATION, MANUFACTURER};

pub fn print_topology(bank: &SpanBank) {
    println!("{MANUFACTURER} {DEVICE_TYPE} ({LOCATION}): {} loop pair(s), {} tap(s), {} span(s)",
        bank.loop_pairs(), bank.taps(), bank.len());

    for span in bank.spans() {
        print_span(span);
    }
}

pub fn print_span(span: &Span) {
    let link = match span.role() {
        Role::Loop { partner } => format!("<-> {}", partner + 1),
        Role::Tap { observed: Some(observed) } => format!(" -> {}", observed + 1),
        Role::Tap { observed: None } => " -> -".to_string(),
    };

    let role_color = if span.is_tap() { Color::Cyan } else { Color::Blue };

    let signaling = if span.rbs() { "RBS" } else { "CCS" };

    println!("{:>2} {:<14} {} {} [{}] {:?}/{} {}",
        span.index() + 1,
        style(span.name()).fg(role_color),
        link,
        style_state(span.state()),
        lineconfig_flags(span.lineconfig(), span.linecompat()),
        span.deflaw(),
        signaling,
        span.description(),
    );
}

/// Per-channel view: name, aliased source, and robbed bits in each direction.
pub fn print_channels(span: &Span) {
    for channel in span.channels() {
        let source = channel.source()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "idle".to_string());
        let color = if channel.is_registered() { Color::Green } else { Color::Red };

        let sigcap = channel.sigcap();
        let caps = match (sigcap.cas(), sigcap.clear()) {
            (true, true)   => "CAS|CLEAR",
            (true, false)  => "CAS",
            (false, true)  => "CLEAR",
            (false, false) => "-",
        };

        println!("\t{:<18} <- {:<6} {caps} sig={:#x} tx={:04b} rx={:04b} ({} updates)",
            style(channel.name()).fg(color),
            source,
            channel.sigtype(),
            channel.tx_bits(),
            channel.rx_bits(),
            channel.rx_updates(),
        );
    }
}

fn style_state(state: SpanState) -> console::StyledObject<&'static str> {
    match state {
        SpanState::Unregistered => style("UNREG").fg(Color::Red),
        SpanState::Registered   => style("REG  ").fg(Color::Yellow),
        SpanState::Running      => style("RUN  ").fg(Color::Green),
        SpanState::ShutDown     => style("SHUT ").fg(Color::Yellow),
    }
}

/// Compatible line options, highlighted where currently configured.
fn lineconfig_flags(config: LineConfig, compat: LineConfig) -> String {
    let flags = [
        ("D4",   compat.d4(),   config.d4()),
        ("ESF",  compat.esf(),  config.esf()),
        ("AMI",  compat.ami(),  config.ami()),
        ("B8ZS", compat.b8zs(), config.b8zs()),
        ("HDB3", compat.hdb3(), config.hdb3()),
        ("CCS",  compat.ccs(),  config.ccs()),
        ("CRC4", compat.crc4(), config.crc4()),
    ];

    flags.iter()
        .filter(|(_, supported, _)| *supported)
        .map(|(name, _, set)| {
            let color = if *set { Color::Green } else { Color::White };
            style(*name).fg(color).to_string()
        })
        .collect::<Vec<_>>()
        .join("][")
}
