//! Guest faults: abort and assertion failures are terminal and surface the
//! exact diagnostic text through the sink and the typed error.

mod common;

use common::*;
use pigwasm_bridge::{BridgeError, SessionStatus};
use pigwasm_hostapi::FaultRecord;

#[test]
fn test_abort_faults_the_session() {
    let (sink, mut session) = start(GUEST);

    let err = session.invoke::<(), ()>("doAbort", ()).unwrap_err();
    let BridgeError::GuestFault(fault) = err else {
        panic!("expected GuestFault, got {:?}", err);
    };
    assert_eq!(
        fault,
        FaultRecord::Abort { message: "fatal: null pointer".into(), exit_code: 2 }
    );

    assert_eq!(session.status(), SessionStatus::Faulted);
    assert_eq!(session.fault(), Some(fault.clone()));
    assert_eq!(sink.fatal(), Some(fault));
}

#[test]
fn test_abort_diagnostic_contains_exact_message() {
    let (_sink, mut session) = start(GUEST);
    let err = session.invoke::<(), ()>("doAbort", ()).unwrap_err();
    assert!(format!("{}", err).contains("fatal: null pointer"));
}

#[test]
fn test_faulted_session_rejects_further_calls() {
    let (_sink, mut session) = start(GUEST);
    session.invoke::<(), ()>("doAbort", ()).unwrap_err();

    // The session never returns to Ready; the original fault is re-surfaced.
    let err = session.invoke::<(), u32>("initPages", ()).unwrap_err();
    assert!(matches!(err, BridgeError::GuestFault(_)));
    assert_eq!(session.status(), SessionStatus::Faulted);
}

#[test]
fn test_assert_failure_composes_full_record() {
    let (sink, mut session) = start(GUEST);

    let err = session.invoke::<(), ()>("doAssert", ()).unwrap_err();
    let BridgeError::GuestFault(fault) = err else {
        panic!("expected GuestFault, got {:?}", err);
    };
    assert_eq!(
        fault,
        FaultRecord::AssertFailure {
            file: "app/main.c".into(),
            line: 42,
            function: "UpdateApp".into(),
            condition: "ptr != nullptr".into(),
            message: Some("bad handle".into()),
        }
    );
    assert_eq!(
        format!("{}", fault),
        "Assertion failed, bad handle (ptr != nullptr) is not true! \
         In app/main.c:42 UpdateApp(...)"
    );
    assert_eq!(session.status(), SessionStatus::Faulted);
    assert!(sink.fatal().is_some());
}

#[test]
fn test_assert_failure_with_nul_message_pointer() {
    let (_sink, mut session) = start(GUEST);

    let err = session.invoke::<(), ()>("doAssertNoMsg", ()).unwrap_err();
    let BridgeError::GuestFault(fault) = err else {
        panic!("expected GuestFault, got {:?}", err);
    };
    assert_eq!(fault.message(), None);
    assert_eq!(
        format!("{}", fault),
        "Assertion failed! (ptr != nullptr) is not true! In app/main.c:7 UpdateApp(...)"
    );
}
