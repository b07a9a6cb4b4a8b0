use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use hostel_ledger::{
    config::BillingSettings,
    core::{
        services::{InvoiceRunRequest, InvoiceService},
        BalanceCalculator, FixedClock, JournalCursor, LedgerContext,
    },
    currency::Money,
    ledger::{
        AdjustmentKind, BillingMonth, ChangeSet, EntrySource, FeeSchedule, HostelBook,
        PendingEntry, Student,
    },
    storage::json_backend::{load_book_from_path, save_book_to_path},
    storage::MemoryStore,
};
use tempfile::tempdir;

fn build_sample_book(students: usize, entries_per_student: usize) -> HostelBook {
    let mut book = HostelBook::new("Benchmark");
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let fees = FeeSchedule::new(
        Money::from_major(5000),
        Money::from_major(300),
        Money::from_major(700),
    );

    for idx in 0..students {
        let student = Student::new(format!("Resident {idx}"), fees, start);
        let student_id = student.id;
        let mut changes = ChangeSet::new().student(student);
        let (mut cursor, _) = JournalCursor::open(student_id, &[], Money::ZERO).unwrap();
        for n in 0..entries_per_student {
            let amount = Money::from_minor(10_000 + (n % 97) as i64 * 100);
            let kind = if n % 2 == 0 {
                AdjustmentKind::Deduction
            } else {
                AdjustmentKind::Refund
            };
            let pending = match kind {
                AdjustmentKind::Deduction => {
                    PendingEntry::debit(amount, "charge", EntrySource::Adjustment { kind })
                }
                AdjustmentKind::Refund => {
                    PendingEntry::credit(amount, "refund", EntrySource::Adjustment { kind })
                }
            };
            let date = start + Duration::days((n % 365) as i64);
            changes = changes.entry(cursor.stage(pending, date, Utc::now()).unwrap());
        }
        book.apply(changes).expect("seed book");
    }
    book
}

fn bench_balance_replay(c: &mut Criterion) {
    let book = build_sample_book(1, 10_000);
    let student_id = book.students[0].id;
    let entries = book.entries_for(student_id);

    c.bench_function("verify_10k_entries", |b| {
        b.iter(|| {
            let report = BalanceCalculator::verify(student_id, black_box(&entries), Money::ZERO)
                .expect("consistent");
            black_box(report);
        })
    });
}

fn bench_book_io(c: &mut Criterion) {
    let book = build_sample_book(200, 50);
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("book.json");

    c.bench_function("book_save_10k", |b| {
        b.iter(|| save_book_to_path(&book, &path).expect("save book"))
    });

    save_book_to_path(&book, &path).expect("seed");

    c.bench_function("book_load_10k", |b| {
        b.iter(|| black_box(load_book_from_path(&path).expect("load book")))
    });
}

fn bench_invoice_run(c: &mut Criterion) {
    let book = build_sample_book(200, 5);
    let month = BillingMonth::new(2024, 2).unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

    c.bench_function("invoice_run_200_students", |b| {
        b.iter_batched(
            || {
                LedgerContext::with_clock(
                    Arc::new(MemoryStore::from_book(book.clone())),
                    BillingSettings::default(),
                    Arc::new(FixedClock::on(today)),
                )
            },
            |ctx| {
                let batch = InvoiceService::generate_monthly(&ctx, &InvoiceRunRequest::for_month(month))
                    .expect("invoice run");
                black_box(batch);
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_balance_replay, bench_book_io, bench_invoice_run);
criterion_main!(benches);
