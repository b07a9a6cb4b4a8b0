mod common;

use common::{date, major, Harness};
use hostel_ledger::{
    core::services::{
        Adjustment, CheckoutRequest, CheckoutService, EnrollRequest, InvoiceRunRequest,
        InvoiceService, LedgerService, PaymentRequest, PaymentService, RosterService,
        SummaryService,
    },
    errors::LedgerError,
    ledger::{
        BillingMonth, ChangeSet, EntryKind, EntrySource, FeeSchedule, HostelBook, InvoiceStatus,
        PaymentMethod, Student, StudentStatus,
    },
};

fn bill_january(harness: &Harness) {
    InvoiceService::generate_monthly(
        &harness.ctx,
        &InvoiceRunRequest::for_month(BillingMonth::new(2024, 1).unwrap()),
    )
    .unwrap();
}

#[test]
fn clearing_settles_a_debit_balance_to_zero() {
    let harness = Harness::new(date(2024, 1, 20));
    let room = RosterService::add_room(&harness.ctx, "101", 2).unwrap();
    let student = RosterService::enroll(
        &harness.ctx,
        EnrollRequest::new("Asha", FeeSchedule::new(major(5000), major(300), major(700)))
            .checked_in(date(2024, 1, 1))
            .in_room(room.id),
    )
    .unwrap();
    bill_january(&harness);

    let summary = CheckoutService::checkout(
        &harness.ctx,
        CheckoutRequest::new(student.id)
            .adjust(Adjustment::deduction(major(800), "Broken window"))
            .adjust(Adjustment::refund(major(300), "Unused food"))
            .clearing(),
    )
    .unwrap();
    assert_eq!(summary.opening_balance, major(6000));
    assert_eq!(summary.final_balance, major(0));
    assert_eq!(summary.entries.len(), 3);
    let settlement = summary.entries.last().unwrap();
    assert_eq!(settlement.kind, EntryKind::Credit);
    assert_eq!(settlement.amount, major(6500));
    assert_eq!(settlement.source, EntrySource::Settlement);
    assert_eq!(summary.released_room, Some(room.id));

    let stored = harness.ctx.store.student(student.id).unwrap().unwrap();
    assert_eq!(stored.status, StudentStatus::CheckedOut);
    assert_eq!(stored.checkout_date, Some(date(2024, 1, 20)));
    assert_eq!(stored.room_id, None);
    assert!(harness.ctx.store.room(room.id).unwrap().unwrap().is_vacant());
}

#[test]
fn clearing_settles_a_credit_balance_to_zero() {
    let harness = Harness::new(date(2024, 1, 20));
    let student = harness.standard_student("Bikash", date(2024, 1, 1));
    bill_january(&harness);
    PaymentService::record(
        &harness.ctx,
        PaymentRequest::new(student.id, major(7000), PaymentMethod::Cash),
    )
    .unwrap();

    let summary =
        CheckoutService::checkout(&harness.ctx, CheckoutRequest::new(student.id).clearing()).unwrap();
    assert_eq!(summary.opening_balance, major(-1000));
    assert_eq!(summary.final_balance, major(0));
    assert_eq!(summary.entries[0].kind, EntryKind::Debit);
    assert_eq!(
        LedgerService::balance(&harness.ctx, student.id).unwrap().current,
        major(0)
    );
}

#[test]
fn checkout_without_clearing_keeps_the_balance() {
    let harness = Harness::new(date(2024, 1, 25));
    let student = harness.standard_student("Chandra", date(2024, 1, 1));
    bill_january(&harness);

    let summary = CheckoutService::checkout(
        &harness.ctx,
        CheckoutRequest::new(student.id).adjust(Adjustment::refund(major(1000), "Deposit")),
    )
    .unwrap();
    assert_eq!(summary.final_balance, major(5000));

    // Dues can still be collected after the student has left.
    let receipt = PaymentService::record(
        &harness.ctx,
        PaymentRequest::new(student.id, major(5000), PaymentMethod::Online),
    )
    .unwrap();
    assert_eq!(receipt.balance(), major(0));
}

#[test]
fn second_checkout_is_rejected() {
    let harness = Harness::new(date(2024, 1, 25));
    let student = harness.standard_student("Deepa", date(2024, 1, 1));
    CheckoutService::checkout(&harness.ctx, CheckoutRequest::new(student.id)).unwrap();
    let err = CheckoutService::checkout(&harness.ctx, CheckoutRequest::new(student.id)).unwrap_err();
    assert!(matches!(err, LedgerError::StudentNotActive(id) if id == student.id));
}

#[test]
fn failed_settlement_restores_the_student() {
    let today = date(2024, 1, 25);
    let student = Student::new("Eshan", FeeSchedule::default(), date(2024, 1, 1))
        .with_room(uuid::Uuid::new_v4());
    let student_id = student.id;
    let mut book = HostelBook::new("Dangling room");
    book.apply(ChangeSet::new().student(student)).unwrap();
    let harness = Harness::with_book(book, today);

    let err = CheckoutService::checkout(
        &harness.ctx,
        CheckoutRequest::new(student_id).adjust(Adjustment::deduction(major(50), "Key")),
    )
    .unwrap_err();
    match err {
        LedgerError::SettlementFailed { student_id: failed, reason } => {
            assert_eq!(failed, student_id);
            assert!(reason.contains("Room not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let stored = harness.ctx.store.student(student_id).unwrap().unwrap();
    assert_eq!(stored.status, StudentStatus::Active);
    assert!(LedgerService::entries(&harness.ctx, student_id).unwrap().is_empty());
}

#[test]
fn non_positive_adjustments_are_rejected_up_front() {
    let harness = Harness::new(date(2024, 1, 25));
    let student = harness.standard_student("Farah", date(2024, 1, 1));
    let err = CheckoutService::checkout(
        &harness.ctx,
        CheckoutRequest::new(student.id).adjust(Adjustment::refund(major(0), "Nothing")),
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
    assert_eq!(
        harness.ctx.store.student(student.id).unwrap().unwrap().status,
        StudentStatus::Active
    );
}

#[test]
fn clearing_checkout_leaves_no_open_invoices() {
    let harness = Harness::new(date(2024, 2, 5));
    let student = harness.standard_student("Lhamo", date(2024, 1, 1));
    bill_january(&harness);
    InvoiceService::generate_monthly(
        &harness.ctx,
        &InvoiceRunRequest::for_month(BillingMonth::new(2024, 2).unwrap()),
    )
    .unwrap();
    PaymentService::record(
        &harness.ctx,
        PaymentRequest::new(student.id, major(2000), PaymentMethod::Cash),
    )
    .unwrap();

    let summary =
        CheckoutService::checkout(&harness.ctx, CheckoutRequest::new(student.id).clearing()).unwrap();
    assert_eq!(summary.final_balance, major(0));
    assert_eq!(summary.allocations.len(), 2);

    let invoices = harness.ctx.store.invoices_for(student.id).unwrap();
    assert_eq!(invoices.len(), 2);
    assert!(invoices
        .iter()
        .all(|invoice| invoice.status == InvoiceStatus::Paid));
    let row = SummaryService::outstanding(&harness.ctx)
        .unwrap()
        .into_iter()
        .find(|row| row.student_id == student.id)
        .unwrap();
    assert_eq!(row.balance, major(0));
    assert_eq!(row.open_invoices, 0);
}
