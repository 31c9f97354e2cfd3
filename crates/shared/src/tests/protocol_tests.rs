use super::*;
use crate::error::ErrorCode;

#[test]
fn decodes_each_known_operation() {
    assert_eq!(
        Operation::decode(b"initMarble,alice_marble,blue,12,alice").expect("init"),
        Operation::Init(Marble::new("alice_marble", "blue", 12, "alice"))
    );
    assert_eq!(
        Operation::decode(b"deleteMarble,alice_marble").expect("delete"),
        Operation::Delete {
            name: "alice_marble".into()
        }
    );
    assert_eq!(
        Operation::decode(b"transferMarble,alice_marble,bob").expect("transfer"),
        Operation::Transfer {
            name: "alice_marble".into(),
            new_owner: "bob".into()
        }
    );
}

#[test]
fn encode_produces_the_comma_joined_wire_form() {
    let payload = Operation::Init(Marble::new("m1", "red", 7, "carol"))
        .encode()
        .expect("encode");
    assert_eq!(payload, b"initMarble,m1,red,7,carol".to_vec());

    let payload = Operation::Transfer {
        name: "m1".into(),
        new_owner: "dave".into(),
    }
    .encode()
    .expect("encode");
    assert_eq!(payload, b"transferMarble,m1,dave".to_vec());
}

#[test]
fn unknown_tag_is_reported_with_its_name() {
    assert_eq!(
        Operation::decode(b"deposit,alice,10"),
        Err(PayloadError::UnknownOperation("deposit".into()))
    );
}

#[test]
fn arity_is_checked_per_operation() {
    assert_eq!(
        Operation::decode(b"initMarble,m1,red,7"),
        Err(PayloadError::WrongArity {
            operation: INIT_MARBLE,
            expected: 4,
            actual: 3
        })
    );
    assert_eq!(
        Operation::decode(b"deleteMarble"),
        Err(PayloadError::WrongArity {
            operation: DELETE_MARBLE,
            expected: 1,
            actual: 0
        })
    );
    assert_eq!(
        Operation::decode(b"transferMarble,m1,bob,extra"),
        Err(PayloadError::WrongArity {
            operation: TRANSFER_MARBLE,
            expected: 2,
            actual: 3
        })
    );
}

#[test]
fn size_must_be_an_integer() {
    assert_eq!(
        Operation::decode(b"initMarble,m1,red,large,carol"),
        Err(PayloadError::InvalidSize("large".into()))
    );
}

#[test]
fn empty_and_binary_payloads_are_rejected() {
    assert_eq!(Operation::decode(b""), Err(PayloadError::Empty));
    assert_eq!(Operation::decode(&[0xc3, 0x28]), Err(PayloadError::NotUtf8));
    assert_eq!(
        Operation::decode(b"deleteMarble,"),
        Err(PayloadError::EmptyName)
    );
}

#[test]
fn encode_refuses_arguments_that_would_split() {
    let err = Operation::Transfer {
        name: "m1".into(),
        new_owner: "bob,eve".into(),
    }
    .encode()
    .expect_err("delimiter");
    assert_eq!(err, PayloadError::DelimiterInArgument("bob,eve".into()));
}

#[test]
fn ledger_events_use_tagged_json() {
    let event = LedgerEvent::StateChanged {
        transaction_id: TransactionId::new(),
        changes: vec![StateChange {
            address: "b98f57".into(),
            data_b64: None,
        }],
    };
    let json = serde_json::to_value(&event).expect("json");
    assert_eq!(json["type"], "state_changed");
    assert!(json["payload"]["changes"][0].get("data_b64").is_none());
}

#[test]
fn rejection_events_carry_the_error_code() {
    let event = LedgerEvent::TransactionRejected {
        transaction_id: TransactionId::new(),
        error: ApiError::new(ErrorCode::DuplicateEntity, "m1 exists"),
    };
    let json = serde_json::to_value(&event).expect("json");
    assert_eq!(json["type"], "transaction_rejected");
    assert_eq!(json["payload"]["error"]["code"], "duplicate_entity");

    let back: LedgerEvent = serde_json::from_value(json).expect("decode");
    assert!(matches!(
        back,
        LedgerEvent::TransactionRejected { error, .. } if error.code == ErrorCode::DuplicateEntity
    ));
}
