use std::path::PathBuf;

use todo::error::{exit_codes, BulkFailure, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);
    assert_eq!(Error::NotFound("1".into()).exit_code(), exit_codes::USER_ERROR);
    assert_eq!(Error::Format(vec![]).exit_code(), exit_codes::USER_ERROR);

    let malformed = Error::Malformed(PathBuf::from("1.todo"));
    assert_eq!(malformed.exit_code(), exit_codes::OPERATION_FAILED);

    let io = Error::from(std::io::Error::other("disk"));
    assert_eq!(io.exit_code(), exit_codes::OPERATION_FAILED);
    assert_eq!(io.kind(), "operation_failed");
    assert_eq!(user.kind(), "user_error");
}

#[test]
fn format_error_lists_every_line() {
    let err = Error::Format(vec![
        "unknown summary line: a".to_string(),
        "unknown summary line: b".to_string(),
    ]);
    assert_eq!(
        err.to_string(),
        "unknown summary line: a\nunknown summary line: b"
    );
}

#[test]
fn json_error_carries_bulk_details() {
    let err = Error::PartialBulkFailure {
        attempted: vec!["1".into(), "2".into()],
        succeeded: vec!["1".into()],
        failures: vec![BulkFailure {
            id: "2".into(),
            reason: "IO error: gone".into(),
        }],
    };
    assert_eq!(err.to_string(), "updated 1 of 2 tasks; failed: 2");

    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::PARTIAL_FAILURE);
    assert_eq!(json.kind, "partial_failure");
    let details = json.details.expect("details");
    assert_eq!(details["failures"][0]["id"], "2");
    assert_eq!(details["succeeded"][0], "1");
}
