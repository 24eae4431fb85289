mod support;

use std::fs;

use chrono::Local;
use support::{ids, TestRoot};
use todo::bulk::{self, BulkEdit, BulkOutcome};
use todo::error::{exit_codes, Error};
use todo::task::Status;

fn three_low() -> TestRoot {
    let root = TestRoot::new();
    for title in ["alpha", "beta", "gamma"] {
        root.create(title, &[("prio", "low"), ("area", title)]);
    }
    root
}

#[test]
fn one_missing_file_fails_only_that_task() {
    let root = three_low();
    let list = root.list();
    let tasks = list.all().unwrap();
    let edit = BulkEdit::start(&tasks);
    assert_eq!(edit.baseline().headers().len(), 1);

    fs::remove_file(root.path().join("2.todo")).unwrap();
    let updated = edit.document().replacen("prio: low", "prio: high", 1);

    let err = edit.apply(&list, &updated).unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::PARTIAL_FAILURE);
    match err {
        Error::PartialBulkFailure {
            attempted,
            succeeded,
            failures,
        } => {
            assert_eq!(attempted, vec!["1", "2", "3"]);
            assert_eq!(succeeded, vec!["1", "3"]);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].id, "2");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let fresh = root.fresh_list();
    for id in ["1", "3"] {
        assert_eq!(fresh.read(id).unwrap().header("prio"), Some("high"));
    }
    assert!(matches!(fresh.read("2"), Err(Error::NotFound(_))));
}

#[test]
fn reapplying_a_document_writes_nothing_new() {
    let root = three_low();
    let list = root.list();
    let edit = BulkEdit::start(&list.all().unwrap());
    let updated = edit.document().replacen("prio: low", "prio: high", 1);

    let outcome = edit.apply(&list, &updated).unwrap();
    assert_eq!(outcome, BulkOutcome::Applied(vec!["1".into(), "2".into(), "3".into()]));
    let before = root.read_file("1.todo");

    let again = bulk::apply(&list, &updated, Local::now()).unwrap();
    assert_eq!(again, vec!["1", "2", "3"]);
    assert_eq!(root.read_file("1.todo"), before);
}

#[test]
fn status_line_in_bulk_document_closes_every_task() {
    let root = three_low();
    let list = root.list();
    let edit = BulkEdit::start(&list.all().unwrap());
    let document = format!("todo: done\n{}", edit.document());

    bulk::apply(&list, &document, Local::now()).unwrap();
    assert!(list.all().unwrap().is_empty());
    assert_eq!(ids(&list.done().unwrap()), vec!["1", "2", "3"]);
    for id in ["1", "2", "3"] {
        assert_eq!(list.read(id).unwrap().status(), Status::Done);
        assert!(root.path().join(format!("{id}.done")).exists());
    }
}

#[test]
fn removing_a_shared_key_deletes_it_everywhere() {
    let root = three_low();
    let list = root.list();
    let edit = BulkEdit::start(&list.all().unwrap());
    let updated = edit.document().replacen("prio: low\n", "prio:\n", 1);

    edit.apply(&list, &updated).unwrap();
    for task in root.fresh_list().all().unwrap() {
        assert_eq!(task.header("prio"), None);
        assert!(task.header("area").is_some());
    }
}

#[test]
fn manifest_with_unknown_ids_is_rejected() {
    let root = three_low();
    let list = root.list();
    let document = "prio: high\n\n\n— Bulk editing these tasks:\n\n42\tnope\n";
    let err = bulk::apply(&list, document, Local::now()).unwrap_err();
    assert!(matches!(err, Error::Format(_)));
    assert_eq!(root.read_file("1.todo").matches("prio: high").count(), 0);
}
