//! Full-stack tests: orchestrator, session and codec against the simulated pedal

#![cfg(feature = "mock")]

use pada_io::core::clock::{Clock, ManualClock};
use pada_io::devices::{PedalBehaviour, SimulatedPedal};
use pada_io::transport::PreparedLink;
use pada_io::{
    Capability, Config, ControlSlot, Error, MessageType, SlotField, SyncOrchestrator, TriggerMode,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn setup(slots_per_layer: usize) -> (SyncOrchestrator, SimulatedPedal, ManualClock) {
    let clock = ManualClock::new();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let pedal = SimulatedPedal::new(Arc::clone(&shared), slots_per_layer);
    let mut orchestrator = SyncOrchestrator::with_clock(&Config::default(), shared);
    orchestrator
        .open(&mut PreparedLink::named(Box::new(pedal.clone()), "sim"))
        .unwrap();
    (orchestrator, pedal, clock)
}

#[test]
fn test_discover_then_load_wider_pedal() {
    let (mut orchestrator, pedal, _clock) = setup(7);
    pedal.set_kind(6, Capability::Potentiometer);
    let mut custom = ControlSlot::with_defaults(20);
    custom.message_type = MessageType::ControlChange;
    custom.message_value = 11;
    pedal.preload(custom);

    orchestrator.discover_layout().unwrap();
    assert_eq!(orchestrator.slots_per_layer(), 7);

    orchestrator.load_configuration().unwrap();
    let slots = orchestrator.slots();
    assert_eq!(slots.len(), 21);
    assert_eq!(slots[20].message_type, MessageType::ControlChange);
    assert_eq!(slots[20].message_value, 11);
    assert_eq!(slots[20].capability, Capability::Potentiometer);
    assert_eq!(slots[13].capability, Capability::Potentiometer);
    assert!(!orchestrator.capabilities_stale());
}

#[test]
fn test_load_without_info_infers_width() {
    let (mut orchestrator, _pedal, _clock) = setup(2);
    orchestrator.load_configuration().unwrap();
    assert_eq!(orchestrator.slots_per_layer(), 2);
    assert_eq!(orchestrator.slots().len(), 6);
}

#[test]
fn test_edit_save_and_reload() {
    let (mut orchestrator, pedal, _clock) = setup(5);
    orchestrator.discover_layout().unwrap();
    orchestrator.load_configuration().unwrap();

    orchestrator.update_slot(3, SlotField::Value(74)).unwrap();
    orchestrator
        .update_slot(3, SlotField::TriggerMode(TriggerMode::Toggle))
        .unwrap();
    orchestrator.update_slot(12, SlotField::OnValue(90)).unwrap();
    orchestrator.save_current().unwrap();
    assert_eq!(orchestrator.last_status_message(), "Saved to EEPROM!");

    let commands = pedal.received_commands();
    let sets = commands.iter().filter(|c| c.starts_with("SET ")).count();
    assert_eq!(sets, 15);
    assert_eq!(commands.last().map(String::as_str), Some("SAVE"));

    // Survives a reboot because SAVE reached EEPROM
    pedal.power_cycle();
    orchestrator.update_slot(3, SlotField::Value(1)).unwrap();
    orchestrator.load_configuration().unwrap();
    let slot = orchestrator.slots()[3];
    assert_eq!(slot.message_value, 74);
    assert_eq!(slot.trigger_mode, TriggerMode::Toggle);
    assert_eq!(orchestrator.slots()[12].on_value, 90);
}

#[test]
fn test_missing_completion_applies_partial_dump() {
    let (mut orchestrator, pedal, clock) = setup(1);
    pedal.set_behaviour(PedalBehaviour {
        drop_completion: true,
        short_button_lines: true,
        ..PedalBehaviour::default()
    });

    let err = orchestrator.load_configuration().unwrap_err();
    assert!(matches!(err, Error::LoadIncomplete { records: 3 }));
    assert_eq!(orchestrator.slots_per_layer(), 1);
    assert_eq!(orchestrator.slots()[2].on_value, 127);
    assert!(clock.elapsed() >= Duration::from_millis(2000));
}

#[test]
fn test_silent_device() {
    let (mut orchestrator, pedal, _clock) = setup(5);
    pedal.set_behaviour(PedalBehaviour {
        silent: true,
        ..PedalBehaviour::default()
    });

    let outcome = orchestrator.discover_layout().unwrap();
    assert_eq!(outcome.reported, None);
    assert!(matches!(
        orchestrator.load_configuration(),
        Err(Error::LoadIncomplete { records: 0 })
    ));
    assert_eq!(orchestrator.slots_per_layer(), 5);
    assert!(orchestrator.is_open());
}

#[test]
fn test_save_to_read_only_device() {
    let (mut orchestrator, pedal, _clock) = setup(1);
    pedal.set_behaviour(PedalBehaviour {
        writable: false,
        ..PedalBehaviour::default()
    });

    let err = orchestrator.save_current().unwrap_err();
    assert!(matches!(
        err,
        Error::PartialWriteFailure {
            last_succeeded: None,
            ..
        }
    ));
    assert!(pedal.received_commands().is_empty());
}

#[test]
fn test_save_paced_on_virtual_clock() {
    let (mut orchestrator, _pedal, clock) = setup(5);
    orchestrator.save_current().unwrap();
    // 15 SET lines, each followed by a 30 ms gap
    assert_eq!(clock.elapsed(), Duration::from_millis(15 * 30));
}

#[test]
fn test_close_from_another_thread() {
    let (mut orchestrator, pedal, _clock) = setup(5);
    pedal.set_behaviour(PedalBehaviour {
        silent: true,
        ..PedalBehaviour::default()
    });
    let handle = orchestrator.close_handle();

    let closer = thread::spawn(move || handle.close());
    closer.join().unwrap();

    assert!(matches!(
        orchestrator.load_configuration(),
        Err(Error::NotConnected)
    ));
    assert!(!orchestrator.is_open());
}
