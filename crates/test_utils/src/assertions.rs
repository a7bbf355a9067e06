//! Custom Test Assertions
//!
//! Assertion helpers for the billing ledger invariants, with messages that
//! name the challan that broke them.

use rust_decimal::Decimal;
use std::collections::HashSet;

use core_kernel::Money;
use domain_billing::{Invoice, InvoiceStatus, InvoiceView};

/// Asserts a Money value has the expected amount
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Expected {} {}, got {}",
        actual.currency().symbol(),
        expected,
        actual
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts the balance conservation invariants of one challan
///
/// - total equals the sum of its line items
/// - balance equals total minus the sum of its payments
/// - payments never exceed the total
pub fn assert_ledger_conserved(view: &InvoiceView) {
    let invoice = &view.invoice;
    let items = invoice
        .line_items_total()
        .expect("line items share the invoice currency");
    assert_eq!(
        items, invoice.total_amount,
        "Invoice {}: line items sum to {}, total is {}",
        invoice.invoice_number, items, invoice.total_amount
    );

    let paid = Money::sum(invoice.currency(), view.payments.iter().map(|p| &p.amount))
        .expect("payments share the invoice currency");
    assert_eq!(paid, view.paid, "Invoice {}: paid drifted from payments", invoice.invoice_number);
    assert_eq!(
        view.balance.amount(),
        invoice.total_amount.amount() - paid.amount(),
        "Invoice {}: balance is not total minus payments",
        invoice.invoice_number
    );
    assert!(
        paid.amount() <= invoice.total_amount.amount(),
        "Invoice {}: overpaid, {} paid against {}",
        invoice.invoice_number,
        paid,
        invoice.total_amount
    );
}

/// Asserts the derived status of a challan
pub fn assert_status(view: &InvoiceView, expected: InvoiceStatus) {
    assert_eq!(
        view.status, expected,
        "Invoice {} has status {}, expected {}",
        view.invoice.invoice_number, view.status, expected
    );
}

/// Asserts no two open challans share a (student, period) slot and no two
/// challans share a number
pub fn assert_unique_billing(invoices: &[Invoice]) {
    let mut slots = HashSet::new();
    let mut numbers = HashSet::new();
    for invoice in invoices {
        assert!(
            numbers.insert(invoice.invoice_number.clone()),
            "Duplicate invoice number {}",
            invoice.invoice_number
        );
        if !invoice.is_cancelled() {
            assert!(
                slots.insert((invoice.student_id, invoice.period_label.clone())),
                "Student {} billed twice for {}",
                invoice.student_id,
                invoice.period_label
            );
        }
    }
}
