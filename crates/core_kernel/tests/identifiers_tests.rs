//! Unit tests for the Identifiers module
//!
//! Tests cover creation, parsing, conversion, and display formatting
//! of the billing identifiers.

use core_kernel::{SchoolId, UserId, StudentId, ClassId, InvoiceId, LineItemId, PaymentId};
use std::collections::HashSet;
use uuid::Uuid;

mod invoice_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = InvoiceId::new();
        let id2 = InvoiceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = InvoiceId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = InvoiceId::new_v7();
        assert!(id1 < id2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = InvoiceId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_display_and_parse() {
        let id = InvoiceId::new();
        let display = id.to_string();
        assert!(display.starts_with("CHL-"));

        let parsed: InvoiceId = display.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: InvoiceId = uuid.to_string().parse().unwrap();
        assert_eq!(*parsed.as_uuid(), uuid);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("CHL-not-a-uuid".parse::<InvoiceId>().is_err());
    }
}

#[test]
fn test_prefixes() {
    assert_eq!(SchoolId::prefix(), "SCH");
    assert_eq!(UserId::prefix(), "USR");
    assert_eq!(StudentId::prefix(), "STU");
    assert_eq!(ClassId::prefix(), "CLS");
    assert_eq!(InvoiceId::prefix(), "CHL");
    assert_eq!(LineItemId::prefix(), "LIN");
    assert_eq!(PaymentId::prefix(), "PAY");
}

#[test]
fn test_ids_are_hashable() {
    let mut set = HashSet::new();
    let student = StudentId::new();
    set.insert(student);
    set.insert(student);
    assert_eq!(set.len(), 1);
}

#[test]
fn test_serde_is_transparent() {
    let uuid = Uuid::new_v4();
    let id = PaymentId::from(uuid);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", uuid));

    let back: PaymentId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
