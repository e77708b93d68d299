use ascript_core::ascription::parse_timestamp;
use ascript_core::{AscriptionConfig, Collection, Record, UserData};
use chrono::{DateTime, FixedOffset};

/// Configuration with users alice and bob and the `typo` review tag
#[allow(dead_code)]
pub fn test_config() -> AscriptionConfig {
    let mut config = AscriptionConfig::new("po", "po-ascript").unwrap();
    config.add_user("alice", UserData::named("Alice Liddell")).unwrap();
    config.add_user("bob", UserData::named("Bob Cratchit")).unwrap();
    config.add_review_tag("typo");
    config
}

/// Parse a timestamp that is known to be valid
#[allow(dead_code)]
pub fn ts(text: &str) -> DateTime<FixedOffset> {
    parse_timestamp(text).expect("valid test timestamp")
}

#[allow(dead_code)]
pub fn translated(id: &str, translation: &str) -> Record {
    Record::new(id).with_translations([translation])
}

/// Fuzzy record carrying a previous id
#[allow(dead_code)]
pub fn fuzzy(id: &str, previous_id: &str, translation: &str) -> Record {
    let mut record = translated(id, translation);
    record.set_fuzzy(true);
    record.previous_id = Some(previous_id.to_string());
    record
}

#[allow(dead_code)]
pub fn collection(records: Vec<Record>) -> Collection {
    Collection::from_records("ui", records)
}
