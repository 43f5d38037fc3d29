use bsm::Status;

use super::{Harness, LinkCall, CONN};
use crate::api::GattcEvent;
use crate::config::GattcConfig;
use crate::msg::{GattcMsg, Op, WriteKind};

#[test]
fn requests_run_one_at_a_time() {
    let mut h = Harness::without_discovery();
    h.connect();
    h.link.calls();
    h.events();

    h.gattc.hdl_event(GattcMsg::ApiWrite {
        conn_id: CONN,
        handle: 0x0010,
        kind: WriteKind::Prepare,
        value: vec![1, 2, 3],
    });
    h.gattc.hdl_event(GattcMsg::ApiExec {
        conn_id: CONN,
        execute: true,
    });
    h.gattc.hdl_event(GattcMsg::ApiReadMulti {
        conn_id: CONN,
        handles: vec![0x0003, 0x0005],
    });
    assert_eq!(h.link.calls(), vec![LinkCall::Write(CONN, 0x0010, vec![1, 2, 3])]);

    for (op, next) in [
        (Op::Write, Some(LinkCall::Exec(CONN, true))),
        (Op::ExecWrite, Some(LinkCall::ReadMulti(CONN, vec![0x0003, 0x0005]))),
        (Op::ReadMulti, None),
    ] {
        h.gattc.hdl_event(GattcMsg::OpCmpl {
            conn_id: CONN,
            op,
            status: Status::Success,
            value: Vec::new(),
        });
        assert_eq!(h.link.calls(), next.into_iter().collect::<Vec<_>>());
    }

    let ops: Vec<Op> = h
        .events()
        .into_iter()
        .filter_map(|event| match event {
            GattcEvent::OpCmpl { op, .. } => Some(op),
            _ => None,
        })
        .collect();
    assert_eq!(ops, vec![Op::Write, Op::ExecWrite, Op::ReadMulti]);
    assert!(h.gattc.clcb(CONN).unwrap().in_flight().is_none());
}

#[test]
fn held_search_does_not_stall_later_requests() {
    let mut h = Harness::new(GattcConfig::default());
    h.connect();
    h.link.calls();
    h.events();

    h.gattc.hdl_event(GattcMsg::ApiSearch {
        conn_id: CONN,
        uuid: None,
    });
    h.read(3);
    h.gattc.hdl_event(GattcMsg::DiscoverCmpl {
        conn_id: CONN,
        status: Status::Success,
    });

    assert_eq!(h.link.calls(), vec![LinkCall::Read(CONN, 3)]);
    assert_eq!(
        h.events(),
        vec![
            GattcEvent::DiscoverCmpl {
                status: Status::Success,
                conn_id: CONN
            },
            GattcEvent::SearchCmpl {
                status: Status::Success,
                conn_id: CONN
            },
        ]
    );
}

#[test]
fn confirmation_is_not_queued() {
    let mut h = Harness::new(GattcConfig::default());
    h.connect();
    h.read(3);
    h.link.calls();

    h.gattc.hdl_event(GattcMsg::ApiConfirm {
        conn_id: CONN,
        handle: 0x002a,
    });
    assert_eq!(h.link.calls(), vec![LinkCall::Confirm(CONN, 0x002a)]);
    assert_eq!(h.gattc.clcb(CONN).unwrap().pending_len(), 0);
}

#[test]
fn failed_discovery_start_resumes_held_requests() {
    let mut h = Harness::new(GattcConfig::default());
    h.link.refuse("discover");
    h.connect();

    let events = h.events();
    assert_eq!(
        events.last(),
        Some(&GattcEvent::DiscoverCmpl {
            status: Status::Fail,
            conn_id: CONN
        })
    );
    assert!(!h.gattc.is_cached(super::PEER));

    h.read(1);
    assert_eq!(
        h.link.calls(),
        vec![
            LinkCall::Connect(super::PEER),
            LinkCall::Discover(CONN),
            LinkCall::Read(CONN, 1)
        ]
    );
}
