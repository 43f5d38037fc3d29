use crate::api::{SecLevel, SmpEvent};
use crate::config::SmpConfig;
use crate::le::LeState;
use crate::model::{passkey_tk, Entry, Model};
use crate::msg::{Body, LocalKey, Role};
use crate::pdu::{AuthReq, DistKey, IoCap, KeyMask, PairParams, Pdu, Reason};

use super::{completions, just_works, mitm, secure_connections, LinkCall, Pair, Side, MASTER, SLAVE};

fn complete(remote: btc::BdAddr, sec_level: SecLevel, sc: bool, keys: KeyMask) -> SmpEvent {
    SmpEvent::Complete {
        remote,
        reason: Reason::Success,
        sec_level,
        secure_connections: sc,
        keys,
    }
}

fn failed(remote: btc::BdAddr, reason: Reason) -> SmpEvent {
    SmpEvent::Complete {
        remote,
        reason,
        sec_level: SecLevel::None,
        secure_connections: false,
        keys: KeyMask::NONE,
    }
}

/// Master starts, slave grants; returns with the slave waiting for the
/// master's confirm value.
fn start_legacy(pair: &mut Pair) {
    pair.master.deliver(SLAVE, Body::L2capConn { role: Role::Master });
    pair.to_slave();
    assert_eq!(pair.slave.events(), vec![SmpEvent::SecRequest { remote: MASTER }]);
    pair.slave.deliver(MASTER, Body::SecGrant(true));
}

#[test]
fn legacy_just_works_bonds_both_ways() {
    let mut pair = Pair::with(just_works());
    start_legacy(&mut pair);
    pair.run();

    let keys = KeyMask::ENC | KeyMask::ID;
    for (side, remote) in [(&mut pair.master, SLAVE), (&mut pair.slave, MASTER)] {
        let events = side.events();
        assert_eq!(
            completions(&events),
            vec![&complete(remote, SecLevel::Unauthenticated, false, keys)]
        );
        let received: Vec<KeyMask> = events
            .iter()
            .filter_map(|event| match event {
                SmpEvent::Key { key, .. } => Some(key.mask()),
                _ => None,
            })
            .collect();
        assert_eq!(received, vec![KeyMask::ENC, KeyMask::ID]);
        assert_eq!(side.smp().session_count(), 0);
    }
}

#[test]
fn identity_key_carries_the_local_address() {
    let mut pair = Pair::with(SmpConfig::builder().irk([0x5a; 16]).build());
    start_legacy(&mut pair);
    pair.run();

    let identity = pair.master.events().into_iter().find_map(|event| match event {
        SmpEvent::Key {
            key: DistKey::Id { irk, addr },
            ..
        } => Some((irk, addr)),
        _ => None,
    });
    assert_eq!(identity, Some(([0x5a; 16], SLAVE)));
}

#[test]
fn slave_requests_security_first() {
    let mut pair = Pair::with(just_works());

    pair.slave.deliver(MASTER, Body::L2capConn { role: Role::Slave });
    assert_eq!(pair.slave.le_state(MASTER), Some(LeState::SecReqPending));

    pair.to_master();
    assert_eq!(pair.master.events(), vec![SmpEvent::SecRequest { remote: SLAVE }]);
    assert_eq!(pair.master.le_state(SLAVE), Some(LeState::WaitAppRsp));

    pair.master.deliver(SLAVE, Body::SecGrant(true));
    pair.run();

    assert_eq!(completions(&pair.master.events()).len(), 1);
    let slave = pair.slave.events();
    assert!(!slave.contains(&SmpEvent::SecRequest { remote: MASTER }));
    assert_eq!(
        completions(&slave),
        vec![&complete(
            MASTER,
            SecLevel::Unauthenticated,
            false,
            KeyMask::ENC | KeyMask::ID
        )]
    );
}

#[test]
fn passkey_entry_authenticates() {
    let mut pair = Pair::new(mitm(IoCap::KeyboardOnly), mitm(IoCap::DisplayOnly));
    start_legacy(&mut pair);
    pair.run();

    let passkey = pair
        .slave
        .events()
        .into_iter()
        .find_map(|event| match event {
            SmpEvent::PasskeyNotify { remote, passkey } if remote == MASTER => Some(passkey),
            _ => None,
        })
        .unwrap();
    assert!(passkey < 1_000_000);
    assert_eq!(pair.master.events(), vec![SmpEvent::PasskeyReq { remote: SLAVE }]);
    assert_eq!(pair.master.le_state(SLAVE), Some(LeState::WaitAppRsp));
    assert_eq!(
        pair.master.smp().le_session(SLAVE).unwrap().model(),
        Some(Model::Passkey(Entry::Input))
    );

    pair.master
        .deliver(SLAVE, Body::KeyReady(LocalKey::Tk(passkey_tk(passkey))));
    pair.run();

    let keys = KeyMask::ENC | KeyMask::ID;
    assert_eq!(
        completions(&pair.master.events()),
        vec![&complete(SLAVE, SecLevel::Authenticated, false, keys)]
    );
    assert_eq!(
        completions(&pair.slave.events()),
        vec![&complete(MASTER, SecLevel::Authenticated, false, keys)]
    );
}

#[test]
fn wrong_passkey_fails_the_confirm_check() {
    let mut pair = Pair::new(mitm(IoCap::KeyboardOnly), mitm(IoCap::DisplayOnly));
    start_legacy(&mut pair);
    pair.run();

    let passkey = pair
        .slave
        .events()
        .into_iter()
        .find_map(|event| match event {
            SmpEvent::PasskeyNotify { passkey, .. } => Some(passkey),
            _ => None,
        })
        .unwrap();
    pair.master.events();

    let wrong = (passkey + 1) % 1_000_000;
    pair.master
        .deliver(SLAVE, Body::KeyReady(LocalKey::Tk(passkey_tk(wrong))));
    pair.run();

    assert_eq!(
        completions(&pair.slave.events()),
        vec![&failed(MASTER, Reason::ConfirmValueFailed)]
    );
    assert_eq!(
        completions(&pair.master.events()),
        vec![&failed(SLAVE, Reason::ConfirmValueFailed)]
    );
    assert_eq!(pair.master.smp().session_count(), 0);
    assert_eq!(pair.slave.smp().session_count(), 0);
}

#[test]
fn cancelled_passkey_entry_fails_both_sides() {
    let mut pair = Pair::new(mitm(IoCap::KeyboardOnly), mitm(IoCap::DisplayOnly));
    start_legacy(&mut pair);
    pair.run();
    pair.master.events();
    pair.slave.events();

    pair.master
        .deliver(SLAVE, Body::AuthCmpl(Reason::PasskeyEntryFailed));
    pair.run();

    assert_eq!(
        completions(&pair.master.events()),
        vec![&failed(SLAVE, Reason::PasskeyEntryFailed)]
    );
    assert_eq!(
        completions(&pair.slave.events()),
        vec![&failed(MASTER, Reason::PasskeyEntryFailed)]
    );
}

#[test]
fn secure_connections_derive_the_ltk() {
    let mut pair = Pair::with(secure_connections());
    start_legacy(&mut pair);
    pair.run();

    // The LTK comes from the DHKey, so only identity keys travel.
    assert_eq!(
        completions(&pair.master.events()),
        vec![&complete(SLAVE, SecLevel::Unauthenticated, true, KeyMask::ID)]
    );
    assert_eq!(
        completions(&pair.slave.events()),
        vec![&complete(MASTER, SecLevel::Unauthenticated, true, KeyMask::ID)]
    );
}

#[test]
fn secure_connections_run_through_the_key_exchange_states() {
    let mut pair = Pair::with(secure_connections());
    start_legacy(&mut pair);
    assert_eq!(pair.slave.le_state(MASTER), Some(LeState::PublicKeyExch));

    pair.to_master();
    assert_eq!(pair.master.le_state(SLAVE), Some(LeState::PublicKeyExch));
    pair.to_slave();
    assert_eq!(pair.slave.le_state(MASTER), Some(LeState::WaitNonce));
    pair.to_master();
    assert_eq!(pair.master.le_state(SLAVE), Some(LeState::WaitNonce));
    pair.to_slave();
    assert_eq!(pair.slave.le_state(MASTER), Some(LeState::WaitDhkCheck));
    pair.to_master();
    assert_eq!(pair.master.le_state(SLAVE), Some(LeState::WaitDhkCheck));
    pair.to_slave();
    assert_eq!(pair.slave.le_state(MASTER), Some(LeState::EncPending));

    pair.to_master();
    assert_eq!(pair.master.le_state(SLAVE), Some(LeState::EncPending));
    let ltk = pair.slave.smp().session_key(MASTER).unwrap();
    assert_eq!(pair.master.link.calls(), vec![LinkCall::Encrypt(SLAVE, ltk)]);
}

#[test]
fn invalid_public_key_fails_pairing() {
    // Seed 0 yields a public key the mock rejects.
    let mut pair = Pair {
        master: Side::new(MASTER, 0x11, secure_connections()),
        slave: Side::new(SLAVE, 0x00, secure_connections()),
    };
    start_legacy(&mut pair);
    pair.run();

    assert_eq!(
        completions(&pair.master.events()),
        vec![&failed(SLAVE, Reason::InvalidParameters)]
    );
    assert_eq!(
        completions(&pair.slave.events()),
        vec![&failed(MASTER, Reason::InvalidParameters)]
    );
}

#[test]
fn pairing_failed_in_wait_confirm_returns_to_idle() {
    let mut pair = Pair::with(just_works());
    start_legacy(&mut pair);
    assert_eq!(pair.slave.le_state(MASTER), Some(LeState::WaitConfirm));
    pair.slave.link.calls();

    pair.slave
        .deliver(MASTER, Body::Pdu(Pdu::PairingFailed(Reason::Unspecified)));

    assert_eq!(pair.slave.le_state(MASTER), None);
    assert_eq!(
        completions(&pair.slave.events()),
        vec![&failed(MASTER, Reason::Unspecified)]
    );
    assert!(pair.slave.link.calls().is_empty());
}

#[test]
fn pairing_failed_in_confirm_returns_to_idle() {
    let mut pair = Pair::with(just_works());
    start_legacy(&mut pair);
    pair.to_master();
    assert_eq!(pair.master.le_state(SLAVE), Some(LeState::Confirm));

    pair.master
        .deliver(SLAVE, Body::Pdu(Pdu::PairingFailed(Reason::Unspecified)));

    assert_eq!(pair.master.le_state(SLAVE), None);
    assert_eq!(
        completions(&pair.master.events()),
        vec![&failed(SLAVE, Reason::Unspecified)]
    );
}

#[test]
fn pairing_failed_in_rand_returns_to_idle() {
    let mut pair = Pair::with(just_works());
    start_legacy(&mut pair);
    pair.to_master();
    pair.to_slave();
    assert_eq!(pair.slave.le_state(MASTER), Some(LeState::Rand));
    pair.to_master();
    assert_eq!(pair.master.le_state(SLAVE), Some(LeState::Rand));

    for (side, remote) in [(&mut pair.master, SLAVE), (&mut pair.slave, MASTER)] {
        side.deliver(remote, Body::Pdu(Pdu::PairingFailed(Reason::Unspecified)));
        assert_eq!(side.le_state(remote), None);
        assert_eq!(
            completions(&side.events()),
            vec![&failed(remote, Reason::Unspecified)]
        );
    }
}

#[test]
fn link_loss_ends_the_session_quietly() {
    let mut pair = Pair::with(just_works());
    start_legacy(&mut pair);
    pair.slave.link.calls();

    pair.slave.deliver(MASTER, Body::L2capDisconn);

    assert_eq!(
        completions(&pair.slave.events()),
        vec![&failed(MASTER, Reason::ConnTimeout)]
    );
    assert!(pair.slave.link.calls().is_empty());
    assert_eq!(pair.slave.smp().session_count(), 0);
}

#[test]
fn unanswered_command_times_out() {
    let config = SmpConfig::builder().rsp_timeout_ticks(5).build();
    let mut master = Side::new(MASTER, 0x11, config);

    master.deliver(SLAVE, Body::L2capConn { role: Role::Master });
    assert!(master.smp().le_session(SLAVE).unwrap().rsp_timer_armed());
    master.link.calls();

    master.tick(4);
    assert_eq!(master.le_state(SLAVE), Some(LeState::PairReqRsp));

    master.tick(1);
    assert_eq!(master.le_state(SLAVE), None);
    assert_eq!(
        completions(&master.events()),
        vec![&failed(SLAVE, Reason::RspTimeout)]
    );
    // A timeout is local; nothing goes to the peer.
    assert!(master.link.calls().is_empty());
}

#[test]
fn finished_session_leaves_no_timer_behind() {
    let config = SmpConfig::builder().rsp_timeout_ticks(2).build();
    let mut master = Side::new(MASTER, 0x11, config);

    master.deliver(SLAVE, Body::L2capConn { role: Role::Master });
    master.deliver(SLAVE, Body::Pdu(Pdu::PairingFailed(Reason::PairingNotSupported)));
    assert_eq!(completions(&master.events()).len(), 1);

    master.tick(10);
    assert!(master.events().is_empty());
    assert!(master.wheel.is_empty());
}

#[test]
fn queued_timeout_of_a_finished_session_spares_the_next_one() {
    let config = SmpConfig::builder().rsp_timeout_ticks(2).build();
    let mut master = Side::new(MASTER, 0x11, config);

    master.deliver(SLAVE, Body::L2capConn { role: Role::Master });
    // The expiry is posted but still waits in the queue.
    master.wheel.tick().unwrap();
    master.wheel.tick().unwrap();
    master.deliver(SLAVE, Body::Pdu(Pdu::PairingFailed(Reason::PairingNotSupported)));
    assert_eq!(
        completions(&master.events()),
        vec![&failed(SLAVE, Reason::PairingNotSupported)]
    );

    master.deliver(SLAVE, Body::L2capConn { role: Role::Master });
    master.pump.run_until_idle();
    assert_eq!(master.le_state(SLAVE), Some(LeState::PairReqRsp));
    assert!(completions(&master.events()).is_empty());

    // The new session's own timer still runs.
    master.tick(2);
    assert_eq!(master.le_state(SLAVE), None);
    assert_eq!(
        completions(&master.events()),
        vec![&failed(SLAVE, Reason::RspTimeout)]
    );
}

#[test]
fn late_timeout_without_a_session_is_dropped() {
    let mut master = Side::new(MASTER, 0x11, just_works());

    master.deliver(SLAVE, Body::RspTimeout { session: 1 });

    assert!(master.events().is_empty());
    assert!(master.link.calls().is_empty());
    assert_eq!(master.smp().session_count(), 0);
}

#[test]
fn commands_without_a_session_are_dropped() {
    let mut slave = Side::new(SLAVE, 0x22, just_works());

    slave.deliver(MASTER, Body::Pdu(Pdu::Confirm([1; 16])));
    slave.deliver(MASTER, Body::Encrypted(true));

    assert!(slave.events().is_empty());
    assert_eq!(slave.smp().session_count(), 0);
}

#[test]
fn refused_send_fails_the_pairing() {
    let mut master = Side::new(MASTER, 0x11, just_works());
    master.link.refuse_send();

    master.deliver(SLAVE, Body::L2capConn { role: Role::Master });

    assert_eq!(
        completions(&master.events()),
        vec![&failed(SLAVE, Reason::Unspecified)]
    );
    assert_eq!(master.smp().session_count(), 0);
}

#[test]
fn refused_encryption_fails_the_pairing() {
    let mut pair = Pair::with(just_works());
    pair.master.link.refuse_encrypt();
    start_legacy(&mut pair);
    pair.run();

    assert_eq!(
        completions(&pair.master.events()),
        vec![&failed(SLAVE, Reason::EncFailed)]
    );
    assert_eq!(pair.master.smp().session_count(), 0);
}

#[test]
fn short_key_size_is_rejected_before_asking_the_user() {
    let mut slave = Side::new(SLAVE, 0x22, just_works());
    let preq = PairParams {
        max_key_size: 6,
        ..SmpConfig::default().pair_params()
    };

    slave.deliver(MASTER, Body::Pdu(Pdu::PairingReq(preq)));

    // The failure stops the cell: no security request reaches the user.
    assert_eq!(slave.events(), vec![failed(MASTER, Reason::EncKeySize)]);
    assert_eq!(slave.link.sent(), vec![Pdu::PairingFailed(Reason::EncKeySize)]);
}

#[test]
fn denied_request_reports_pairing_not_supported() {
    let mut pair = Pair::with(just_works());
    pair.master.deliver(SLAVE, Body::L2capConn { role: Role::Master });
    pair.to_slave();
    pair.slave.events();

    pair.slave.deliver(MASTER, Body::SecGrant(false));
    pair.run();

    assert_eq!(
        completions(&pair.master.events()),
        vec![&failed(SLAVE, Reason::PairingNotSupported)]
    );
    assert_eq!(
        completions(&pair.slave.events()),
        vec![&failed(MASTER, Reason::PairingNotSupported)]
    );
}

#[test]
fn without_bonding_no_keys_are_distributed() {
    let mut pair = Pair::with(SmpConfig::builder().auth_req(AuthReq(0)).build());
    start_legacy(&mut pair);
    pair.run();

    for (side, remote) in [(&mut pair.master, SLAVE), (&mut pair.slave, MASTER)] {
        let events = side.events();
        assert!(!events.iter().any(|event| matches!(event, SmpEvent::Key { .. })));
        assert_eq!(
            completions(&events),
            vec![&complete(remote, SecLevel::Unauthenticated, false, KeyMask::NONE)]
        );
    }
}

#[test]
fn session_limit_turns_away_new_peers() {
    let other = btc::BdAddr::new([0x00, 0x1b, 0xdc, 0x07, 0x31, 0x03]);
    let mut slave = Side::new(SLAVE, 0x22, SmpConfig::builder().max_sessions(1).build());
    let preq = SmpConfig::default().pair_params();

    slave.deliver(MASTER, Body::Pdu(Pdu::PairingReq(preq)));
    slave.deliver(other, Body::Pdu(Pdu::PairingReq(preq)));

    assert_eq!(slave.smp().session_count(), 1);
    assert!(slave.smp().le_session(MASTER).is_some());
    assert_eq!(
        slave.link.calls(),
        vec![LinkCall::Send(
            other,
            crate::msg::Transport::Le,
            Pdu::PairingFailed(Reason::Unspecified)
        )]
    );
    assert_eq!(slave.events(), vec![SmpEvent::SecRequest { remote: MASTER }]);
}
