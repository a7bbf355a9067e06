//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::money::MoneyError;

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid fiscal year start month");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid fiscal year start month"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_not_found() {
    let error = CoreError::not_found("Student not found");

    match error {
        CoreError::NotFound(msg) => assert_eq!(msg, "Student not found"),
        _ => panic!("Expected NotFound error"),
    }
}

#[test]
fn test_core_error_from_money_error() {
    let money_error = MoneyError::CurrencyMismatch("PKR".to_string(), "USD".to_string());
    let core_error: CoreError = money_error.into();

    assert!(matches!(core_error, CoreError::Money(_)));
}

#[test]
fn test_core_error_display() {
    let error = CoreError::validation("Test error");
    let display = format!("{}", error);

    assert!(display.contains("Validation error"));
}

#[test]
fn test_core_error_configuration() {
    let error = CoreError::configuration("generation_chunk_size must be positive");

    match error {
        CoreError::Configuration(msg) => assert!(msg.contains("chunk")),
        _ => panic!("Expected Configuration error"),
    }
}
