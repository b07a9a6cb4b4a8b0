mod common;

use chrono::NaiveDate;
use common::{date, major, Harness};
use hostel_ledger::{
    core::services::{
        DiscountRequest, DiscountService, InvoiceRunRequest, InvoiceService, LedgerService,
        PaymentRequest, PaymentService,
    },
    errors::LedgerError,
    ledger::{BillingMonth, DiscountValue, EntryKind, InvoiceStatus, PaymentMethod},
};
use uuid::Uuid;

fn discount(student_id: Uuid, value: DiscountValue, from: NaiveDate, to: NaiveDate) -> DiscountRequest {
    DiscountRequest {
        student_id,
        value,
        reason: "Scholarship".into(),
        valid_from: from,
        valid_to: to,
        applied_by: "warden".into(),
    }
}

#[test]
fn payments_settle_oldest_invoices_first() {
    let harness = Harness::new(date(2024, 1, 1));
    let student = harness.standard_student("Asha", date(2024, 1, 1));
    for month in 1..=3 {
        harness.clock.set_date(date(2024, month, 1));
        InvoiceService::generate_monthly(
            &harness.ctx,
            &InvoiceRunRequest::for_month(BillingMonth::new(2024, month).unwrap()),
        )
        .unwrap();
    }

    let receipt = PaymentService::record(
        &harness.ctx,
        PaymentRequest::new(student.id, major(8000), PaymentMethod::BankTransfer).with_note("ref 991"),
    )
    .unwrap();
    assert_eq!(receipt.allocations.len(), 2);
    assert_eq!(receipt.allocations[0].amount, major(6000));
    assert_eq!(receipt.allocations[1].amount, major(2000));
    assert_eq!(receipt.unallocated(), major(0));
    assert_eq!(receipt.balance(), major(10000));
    assert_eq!(receipt.entry.kind, EntryKind::Credit);
    assert!(receipt.entry.description.contains("ref 991"));

    let mut invoices = harness.ctx.store.invoices_for(student.id).unwrap();
    invoices.sort_by_key(|invoice| invoice.month);
    let statuses: Vec<InvoiceStatus> = invoices.iter().map(|invoice| invoice.status).collect();
    assert_eq!(
        statuses,
        vec![
            InvoiceStatus::Paid,
            InvoiceStatus::PartiallyPaid,
            InvoiceStatus::Unpaid
        ]
    );
}

#[test]
fn overpayment_leaves_credit_on_the_ledger() {
    let harness = Harness::new(date(2024, 1, 5));
    let student = harness.standard_student("Bikash", date(2024, 1, 1));
    InvoiceService::generate_monthly(
        &harness.ctx,
        &InvoiceRunRequest::for_month(BillingMonth::new(2024, 1).unwrap()),
    )
    .unwrap();

    let receipt = PaymentService::record(
        &harness.ctx,
        PaymentRequest::new(student.id, major(7500), PaymentMethod::Cash),
    )
    .unwrap();
    assert_eq!(receipt.unallocated(), major(1500));
    assert_eq!(receipt.balance(), major(-1500));
}

#[test]
fn non_positive_payments_are_rejected() {
    let harness = Harness::new(date(2024, 1, 5));
    let student = harness.standard_student("Chandra", date(2024, 1, 1));
    for amount in [0, -100] {
        let err = PaymentService::record(
            &harness.ctx,
            PaymentRequest::new(student.id, major(amount), PaymentMethod::Cash),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }
    assert!(LedgerService::entries(&harness.ctx, student.id).unwrap().is_empty());
}

#[test]
fn backdated_payment_posts_after_the_latest_entry() {
    let harness = Harness::new(date(2024, 2, 1));
    let student = harness.standard_student("Deepa", date(2024, 1, 1));
    InvoiceService::generate_monthly(
        &harness.ctx,
        &InvoiceRunRequest::for_month(BillingMonth::new(2024, 2).unwrap()),
    )
    .unwrap();

    let receipt = PaymentService::record(
        &harness.ctx,
        PaymentRequest::new(student.id, major(100), PaymentMethod::Cash).on(date(2024, 1, 20)),
    )
    .unwrap();
    assert_eq!(receipt.entry.date, date(2024, 2, 1));
    assert_eq!(receipt.entry.seq, 2);
}

#[test]
fn expired_discount_is_rejected_and_posts_nothing() {
    let harness = Harness::new(date(2024, 1, 1));
    let student = harness.standard_student("Eshan", date(2024, 1, 1));
    let created = DiscountService::create(
        &harness.ctx,
        discount(
            student.id,
            DiscountValue::fixed(major(500)),
            date(2024, 1, 1),
            date(2024, 1, 31),
        ),
    )
    .unwrap();

    harness.clock.set_date(date(2024, 2, 1));
    let err = DiscountService::apply(&harness.ctx, created.id).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ExpiredDiscount { valid_to, .. } if valid_to == date(2024, 1, 31)
    ));
    assert!(LedgerService::entries(&harness.ctx, student.id).unwrap().is_empty());
    let stored = harness.ctx.store.discount(created.id).unwrap().unwrap();
    assert!(!stored.is_applied());
}

#[test]
fn discount_applies_once_and_reduces_the_open_invoice() {
    let harness = Harness::new(date(2024, 1, 2));
    let student = harness.standard_student("Farah", date(2024, 1, 1));
    InvoiceService::generate_monthly(
        &harness.ctx,
        &InvoiceRunRequest::for_month(BillingMonth::new(2024, 1).unwrap()),
    )
    .unwrap();

    let applied = DiscountService::grant(
        &harness.ctx,
        discount(
            student.id,
            DiscountValue::percent(10),
            date(2024, 1, 1),
            date(2024, 1, 31),
        ),
    )
    .unwrap();
    assert_eq!(applied.credited(), major(600));
    assert_eq!(applied.entry.balance_after, major(5400));
    assert_eq!(applied.allocations.len(), 1);
    assert_eq!(applied.discount.applied_entry, Some(applied.entry.id));

    let again = DiscountService::apply(&harness.ctx, applied.discount.id).unwrap_err();
    assert!(matches!(again, LedgerError::InvalidDiscount(_)));
    assert_eq!(
        LedgerService::current_balance(&harness.ctx, student.id).unwrap(),
        major(5400)
    );
}

#[test]
fn percentage_discount_respects_cap_and_base() {
    let harness = Harness::new(date(2024, 1, 2));
    let student = harness.standard_student("Gopal", date(2024, 1, 1));
    let capped = DiscountService::grant(
        &harness.ctx,
        discount(
            student.id,
            DiscountValue::Percentage {
                basis_points: 5_000,
                max_amount: Some(major(1000)),
                base_amount: None,
            },
            date(2024, 1, 1),
            date(2024, 1, 31),
        ),
    )
    .unwrap();
    assert_eq!(capped.credited(), major(1000));

    let based = DiscountService::grant(
        &harness.ctx,
        discount(
            student.id,
            DiscountValue::Percentage {
                basis_points: 2_500,
                max_amount: None,
                base_amount: Some(major(2000)),
            },
            date(2024, 1, 1),
            date(2024, 1, 31),
        ),
    )
    .unwrap();
    assert_eq!(based.credited(), major(500));
    assert_eq!(based.entry.balance_after, major(-1500));
}

#[test]
fn invalid_discounts_never_reach_the_ledger() {
    let harness = Harness::new(date(2024, 1, 2));
    let student = harness.standard_student("Hema", date(2024, 1, 1));

    let over = DiscountService::create(
        &harness.ctx,
        discount(student.id, DiscountValue::percent(120), date(2024, 1, 1), date(2024, 1, 31)),
    )
    .unwrap_err();
    assert!(matches!(over, LedgerError::InvalidDiscount(_)));

    let inverted = DiscountService::create(
        &harness.ctx,
        discount(student.id, DiscountValue::fixed(major(10)), date(2024, 2, 1), date(2024, 1, 1)),
    )
    .unwrap_err();
    assert!(matches!(inverted, LedgerError::InvalidDiscount(_)));

    let early = DiscountService::grant(
        &harness.ctx,
        discount(student.id, DiscountValue::fixed(major(10)), date(2024, 3, 1), date(2024, 3, 31)),
    )
    .unwrap_err();
    assert!(matches!(early, LedgerError::InvalidDiscount(_)));
    assert!(LedgerService::entries(&harness.ctx, student.id).unwrap().is_empty());
}
