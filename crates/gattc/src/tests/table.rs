use bsm::{EventId, Lookup};

use crate::sm::{GattcAction, GattcEvt, GattcState, GATTC_SM};

const REQUESTS: [GattcEvt; 6] = [
    GattcEvt::ApiRead,
    GattcEvt::ApiWrite,
    GattcEvt::ApiExec,
    GattcEvt::ApiCfgMtu,
    GattcEvt::ApiSearch,
    GattcEvt::ApiReadMulti,
];

fn cell(state: GattcState, event: GattcEvt) -> (&'static [GattcAction], GattcState) {
    let transition = GATTC_SM.table().lookup(0, state, event).unwrap();
    (transition.actions(), transition.next())
}

#[test]
fn table_is_well_formed() {
    assert_eq!(GATTC_SM.validate(), Ok(()));
    for &state in GattcState::ALL {
        for &event in GattcEvt::ALL {
            assert!(GATTC_SM.table().lookup(0, state, event).is_some());
            assert!(cell(state, event).0.len() <= 1, "{:?} {:?}", state, event);
        }
    }
}

#[test]
fn requests_without_a_connection_fail() {
    for state in [GattcState::Idle, GattcState::WaitConn] {
        for event in REQUESTS {
            assert_eq!(cell(state, event), (&[GattcAction::Fail][..], state));
        }
    }
}

#[test]
fn requests_are_held_during_discovery() {
    for event in REQUESTS {
        assert_eq!(
            cell(GattcState::Discover, event),
            (&[GattcAction::QCmd][..], GattcState::Discover)
        );
    }
}

#[test]
fn link_loss_always_ends_in_idle() {
    for state in [GattcState::WaitConn, GattcState::Conn, GattcState::Discover] {
        let (actions, next) = cell(state, GattcEvt::IntDisconn);
        assert!(!actions.is_empty());
        assert_eq!(next, GattcState::Idle);
    }
    assert!(cell(GattcState::Idle, GattcEvt::IntDisconn).0.is_empty());
}

#[test]
fn event_codes_carry_the_profile() {
    let raw = GattcEvt::OpCmpl.to_raw(btc::ProfileId::GATTC.0);
    assert_eq!(raw >> 8, u16::from(btc::ProfileId::GATTC.0));
    assert_eq!(GattcEvt::from_raw(raw), Some(GattcEvt::OpCmpl));
}
