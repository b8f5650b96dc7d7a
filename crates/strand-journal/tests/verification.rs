use strand_canonical::{Canonicalizer, Digest, DigestAlg, PrincipalId};
use strand_core::{Notification, U256};
use strand_journal::{
    verify_journal, verify_record, JournalRecord, JournalWriter, WriteOptions,
};
use tempfile::TempDir;

fn make_canonicalizer() -> Canonicalizer {
    Canonicalizer::default()
}

fn make_notification() -> Notification {
    Notification::CounterChanged {
        counter: "intent.volume".to_string(),
        direction: strand_core::CounterDirection::Increment,
        delta: U256::from(5u64),
        value: U256::from(12u64),
    }
}

fn make_record(seq: u64) -> JournalRecord {
    JournalRecord::new(seq, make_notification(), &make_canonicalizer()).unwrap()
}

#[test]
fn test_verify_record_valid() {
    assert!(verify_record(&make_record(0), &make_canonicalizer()).unwrap());
}

#[test]
fn test_record_id_commits_to_sequence() {
    let mut moved = make_record(3);
    moved.seq = 4;
    assert!(!verify_record(&moved, &make_canonicalizer()).unwrap());
    assert_ne!(make_record(3).record_id, make_record(4).record_id);
}

#[test]
fn test_verify_record_detects_tampered_notification() {
    let mut record = make_record(0);
    record.notification = Notification::CounterReset {
        counter: "intent.volume".to_string(),
        previous: U256::from(12u64),
    };
    assert!(!verify_record(&record, &make_canonicalizer()).unwrap());
}

#[test]
fn test_verify_record_detects_forged_id() {
    let mut record = make_record(0);
    record.record_id = Digest::sha256_with_domain(b"forged", b"x");
    assert_eq!(record.record_id.alg, DigestAlg::Sha256);
    assert!(!verify_record(&record, &make_canonicalizer()).unwrap());
}

#[test]
fn test_verify_journal_reports_bad_records() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.stj");

    let mut forged = make_record(1);
    forged.notification = Notification::AuthorizationChanged {
        principal: PrincipalId::parse("acct:mallory").unwrap(),
        allowed: true,
    };
    let mut writer = JournalWriter::open(&path, WriteOptions::default()).unwrap();
    writer.append_record(&make_record(0)).unwrap();
    writer.append_record(&forged).unwrap();
    writer.append_record(&make_record(3)).unwrap();
    writer.finish().unwrap();

    let report = verify_journal(&path, &make_canonicalizer()).unwrap();
    assert_eq!(report.records, 3);
    assert_eq!(report.bad_ids, vec![1]);
    assert_eq!(report.out_of_order, vec![3]);
    assert!(!report.is_valid());
}

#[test]
fn test_verify_clean_journal() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.stj");
    let mut writer = JournalWriter::open(&path, WriteOptions::default()).unwrap();
    for seq in 0..4 {
        writer.append_record(&make_record(seq)).unwrap();
    }
    writer.finish().unwrap();

    let report = verify_journal(&path, &make_canonicalizer()).unwrap();
    assert_eq!(report.records, 4);
    assert!(report.is_valid());
}
