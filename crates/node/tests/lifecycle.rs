//! End-to-end node lifecycle scenarios driven directly against `NodeCore`,
//! without a transport layer — mirroring the gateway crate's
//! `tests/scenarios.rs`.

use mash_node::config::NodeConfig;
use mash_node::sensor_source::SensorReading;
use mash_node::state_machine::{NodeCore, NodeLifecycle};
use mash_types::{SensorId, SlotIndex, SuperframeEpoch};
use mash_wire::{BeaconFrame, RegisterAckFrame};

fn config() -> NodeConfig {
    NodeConfig {
        sensor_ids: vec![10, 11],
        superframe_us: 20_000,
        slot_count: 16,
        sample_period_us: 5_000,
        contention_window_slots: 4,
        max_missed_beacons: 3,
        outbound_queue_capacity: 64,
    }
}

fn beacon(epoch: u32, ts: u64) -> BeaconFrame {
    BeaconFrame {
        epoch: SuperframeEpoch(epoch),
        gateway_timestamp_us: ts,
    }
}

fn reading(sensor: u16, ts: u64) -> SensorReading {
    SensorReading {
        sensor_id: SensorId(sensor),
        local_timestamp_us: ts,
        quaternion: Default::default(),
        accel: Default::default(),
        gyro: Default::default(),
    }
}

#[test]
fn full_admission_to_streaming_lifecycle() {
    let mut core = NodeCore::new(config(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(core.lifecycle(), NodeLifecycle::Unsynced);

    let req = core.on_beacon(beacon(1, 0), 0).expect("unregistered node requests a slot");
    assert_eq!(core.lifecycle(), NodeLifecycle::Listening);
    assert_eq!(req.sensor_ids, vec![SensorId(10), SensorId(11)]);

    let node_id = core.node_id();
    core.on_register_ack(RegisterAckFrame::Assigned {
        node_id,
        slot_index: SlotIndex::new(4).unwrap(),
    });
    assert_eq!(core.lifecycle(), NodeLifecycle::Registered);
    assert_eq!(core.slot_index(), Some(SlotIndex::new(4).unwrap()));

    // Beacon at the start of the next superframe establishes this
    // superframe's slot deadline.
    core.on_beacon(beacon(2, 100_000), 100_000);
    core.accumulate(vec![reading(10, 100_200), reading(11, 100_200)]);

    // slot_us = 20_000 / 16 = 1250; deadline = 100_000 + 4*1250 = 105_000
    assert!(core.maybe_emit_data(104_000).is_none());
    let frame = core.maybe_emit_data(105_100).expect("past slot deadline with samples queued");
    assert_eq!(frame.node_id, node_id);
    assert_eq!(frame.records.len(), 2);
}

#[test]
fn repeated_beacons_while_pending_keep_resending_register_req() {
    let mut core = NodeCore::new(config(), &[1, 1, 1, 1]);
    let first = core.on_beacon(beacon(1, 0), 0).unwrap();
    let second = core.on_beacon(beacon(2, 20_000), 20_000).unwrap();
    assert_eq!(first.sensor_ids, second.sensor_ids);
    assert_eq!(core.lifecycle(), NodeLifecycle::Listening);
}

#[test]
fn rejected_registration_stays_listening_and_retries() {
    let mut core = NodeCore::new(config(), &[2, 2, 2, 2]);
    core.on_beacon(beacon(1, 0), 0);
    let node_id = core.node_id();
    core.on_register_ack(RegisterAckFrame::Rejected {
        node_id,
        reason: mash_wire::RejectReason::NoFreeSlots,
    });
    assert_eq!(core.lifecycle(), NodeLifecycle::Listening);
    assert!(core.slot_index().is_none());

    let retry = core.on_beacon(beacon(2, 20_000), 20_000);
    assert!(retry.is_some());
}

#[test]
fn node_falls_back_to_unsynced_after_sustained_beacon_loss() {
    let mut core = NodeCore::new(config(), &[3, 3, 3, 3]);
    core.on_beacon(beacon(1, 0), 0);
    let node_id = core.node_id();
    core.on_register_ack(RegisterAckFrame::Assigned {
        node_id,
        slot_index: SlotIndex::new(1).unwrap(),
    });
    core.accumulate(vec![reading(10, 500)]);
    assert_eq!(core.lifecycle(), NodeLifecycle::Registered);

    // Three full superframe windows elapse with no beacon received: the
    // node is considered lost, but still holds its slot in case a beacon
    // arrives on the very next check.
    core.check_missed_beacons(20_000);
    core.check_missed_beacons(40_000);
    core.check_missed_beacons(60_000);
    assert_eq!(core.lifecycle(), NodeLifecycle::Lost);
    assert_eq!(core.slot_index(), Some(SlotIndex::new(1).unwrap()));

    // A fourth superframe with still no beacon and it falls all the way back.
    core.check_missed_beacons(80_000);
    assert_eq!(core.lifecycle(), NodeLifecycle::Unsynced);
    assert_eq!(core.slot_index(), None);
    // The queued sample was cleared along with the rest of the slot state.
    assert!(core.maybe_emit_data(100_000).is_none());
}
