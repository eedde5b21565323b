//! Record validator
//!
//! Keeps rows whose `FirstName`, `Phone` and `Notes` are all present and not
//! blank. Failing rows are dropped silently. Kept values are copied verbatim.

use taskdesk_common::db::TaskRecord;

use super::parser::RawRecord;

pub const FIELD_FIRST_NAME: &str = "FirstName";
pub const FIELD_PHONE: &str = "Phone";
pub const FIELD_NOTES: &str = "Notes";

fn required(record: &RawRecord, field: &str) -> Option<String> {
    record
        .get(field)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// Convert one row, or `None` when any required field is missing or blank
pub fn to_task_record(record: &RawRecord) -> Option<TaskRecord> {
    Some(TaskRecord {
        first_name: required(record, FIELD_FIRST_NAME)?,
        phone: required(record, FIELD_PHONE)?,
        notes: required(record, FIELD_NOTES)?,
    })
}

/// Order-preserving filter from raw rows to task records
pub fn validate_records(records: Vec<RawRecord>) -> Vec<TaskRecord> {
    records.iter().filter_map(to_task_record).collect()
}
