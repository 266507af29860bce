use crossbeam::channel::unbounded;

use tedium_loop::chunk::IDLE_CHUNK;
use tedium_loop::lifecycle::SpanState;
use tedium_loop::sim::HostMessage;
use tedium_loop::span::{ChannelAddress, MAX_SPANS};
use tedium_loop::{BusEvent, Delivery, LoopConfig, LoopError, Role, SimHost, System};

fn system(loop_pairs: usize, taps: usize) -> System<SimHost> {
    System::build(LoopConfig::new(loop_pairs, taps), SimHost::new()).unwrap()
}

#[test]
fn one_loop_pair_with_taps() {
    let mut system = system(1, 1);

    let roles: Vec<Role> = system.bank().spans().iter().map(|s| s.role()).collect();
    assert_eq!(roles, vec![
        Role::Loop { partner: 1 },
        Role::Loop { partner: 0 },
        Role::Tap { observed: Some(0) },
        Role::Tap { observed: Some(1) },
    ]);

    let ticker = system.ticker_mut().unwrap();
    ticker.host_mut().write(ChannelAddress::new(0, 5), [0xaa; 8]);
    ticker.tick();

    let host = ticker.host();
    assert_eq!(host.received(ChannelAddress::new(1, 5)), Some(&[0xaa; 8]));
    assert_eq!(host.received(ChannelAddress::new(2, 5)), Some(&[0xaa; 8]));
    assert_eq!(host.received(ChannelAddress::new(3, 5)), Some(&IDLE_CHUNK));
    assert_eq!(host.received(ChannelAddress::new(0, 5)), Some(&IDLE_CHUNK));
    assert_eq!(host.received(ChannelAddress::new(1, 4)), Some(&IDLE_CHUNK));

    system.teardown().unwrap();
}

#[test]
fn loopback_is_symmetric() {
    let mut system = system(2, 0);
    let ticker = system.ticker_mut().unwrap();

    for s in 0..4 {
        ticker.host_mut().write(ChannelAddress::new(s, 31), [s as u8; 8]);
    }
    ticker.tick();

    for s in 0..4usize {
        let received = ticker.host().received(ChannelAddress::new(s ^ 1, 31));
        assert_eq!(received, Some(&[s as u8; 8]));
    }
}

#[test]
fn tap_writes_never_reach_a_loop_span() {
    let mut system = system(1, 1);
    let ticker = system.ticker_mut().unwrap();

    for position in 1..=31 {
        ticker.host_mut().write(ChannelAddress::new(2, position), [0x11; 8]);
        ticker.host_mut().write(ChannelAddress::new(3, position), [0x22; 8]);
    }
    ticker.tick();

    for s in 0..2 {
        for position in 1..=31 {
            assert_eq!(ticker.host().received(ChannelAddress::new(s, position)), Some(&IDLE_CHUNK));
        }
    }
}

#[test]
fn surplus_tap_reads_idle() {
    let mut system = system(1, 2);
    assert_eq!(system.bank().len(), 6);
    assert_eq!(system.bank().span(5).unwrap().role(), Role::Tap { observed: None });

    let ticker = system.ticker_mut().unwrap();
    for s in 0..2 {
        ticker.host_mut().write(ChannelAddress::new(s, 1), [0x33; 8]);
    }
    ticker.tick();

    assert_eq!(ticker.host().received(ChannelAddress::new(4, 1)), Some(&IDLE_CHUNK));
    assert_eq!(ticker.host().received(ChannelAddress::new(5, 1)), Some(&IDLE_CHUNK));
}

#[test]
fn capacity_limits() {
    for loop_pairs in 0..=MAX_SPANS {
        for taps in 0..=MAX_SPANS {
            let requested = 2 * (loop_pairs + taps);
            let result = System::build(LoopConfig::new(loop_pairs, taps), SimHost::new());

            if requested > MAX_SPANS {
                assert!(matches!(result, Err(LoopError::CapacityExceeded { .. })), "{loop_pairs}/{taps}");
            } else {
                let system = result.unwrap();
                assert_eq!(system.bank().len(), requested);
                assert_eq!(system.teardown().unwrap().registered().len(), 0);
            }
        }
    }
}

#[test]
fn signaling_is_delivered_once_to_the_partner() {
    let (event_sender, event_receiver) = unbounded();
    let system = system(1, 1).with_events(event_sender);
    let router = system.router();

    let a = ChannelAddress::new(1, 12);
    let delivery = router.on_signaling_update(a, 0b1010).unwrap();
    assert_eq!(delivery, Delivery::Routed {
        partner: Some(ChannelAddress::new(0, 12)),
        tap: Some(ChannelAddress::new(3, 12)),
    });

    let partner = system.bank().channel(ChannelAddress::new(0, 12)).unwrap();
    assert_eq!(partner.rx_bits(), 0b1010);
    assert_eq!(partner.rx_updates(), 1);

    // The partner didn't transmit anything back.
    assert_eq!(partner.tx_bits(), 0);
    assert_eq!(system.bank().channel(a).unwrap().rx_updates(), 0);

    let events: Vec<BusEvent> = event_receiver.try_iter().collect();
    assert_eq!(events, vec![
        BusEvent::RobbedBitState(ChannelAddress::new(0, 12), 0b1010),
        BusEvent::RobbedBitState(ChannelAddress::new(3, 12), 0b1010),
    ]);

    // Signaling from a tap goes nowhere.
    let delivery = router.on_signaling_update(ChannelAddress::new(2, 12), 0xf).unwrap();
    assert_eq!(delivery, Delivery::FromTap);
    assert!(event_receiver.try_iter().next().is_none());
}

#[test]
fn signaling_before_channels_are_accepted_is_discarded() {
    let system = System::build(LoopConfig::new(1, 0), SimHost::new().deferring_channels()).unwrap();
    let router = system.router();
    let a = ChannelAddress::new(0, 1);

    assert_eq!(router.on_signaling_update(a, 0x5).unwrap(), Delivery::Discarded);

    system.bank().span(0).unwrap().accept_channels();
    assert_eq!(router.on_signaling_update(a, 0x5).unwrap(), Delivery::Routed { partner: None, tap: None });

    system.bank().span(1).unwrap().accept_channels();
    assert_eq!(router.on_signaling_update(a, 0x5).unwrap(), Delivery::Routed {
        partner: Some(ChannelAddress::new(1, 1)),
        tap: None,
    });
}

#[test]
fn lifecycle_through_a_running_system() {
    let (command_sender, command_receiver) = unbounded();
    let host = SimHost::new().with_commands(command_receiver);
    let mut system = System::build(LoopConfig::new(1, 0), host).unwrap();

    let bank = system.bank().clone();
    bank.startup(0).unwrap();
    bank.startup(1).unwrap();
    assert!(bank.spans().iter().all(|s| s.state() == SpanState::Running));

    system.start().unwrap();
    let a = ChannelAddress::new(0, 7);
    command_sender.send(HostMessage::Write(a, [0x42; 8])).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(50));

    bank.shutdown(0).unwrap();
    bank.shutdown(1).unwrap();
    assert_eq!(bank.span(0).unwrap().state(), SpanState::ShutDown);

    let host = system.teardown().unwrap();
    assert!(host.registered().is_empty());
    assert!(bank.spans().iter().all(|s| s.state() == SpanState::Unregistered));
    assert_eq!(bank.startup(0), Err(LoopError::NotRegistered(0)));
}
