//! Approves discounts and posts them as credits.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    core::{context::LedgerContext, journal::JournalCursor},
    currency::Money,
    errors::LedgerError,
    ledger::{
        ChangeSet, Discount, DiscountValue, EntrySource, LedgerEntry, PendingEntry, StudentStatus,
    },
};

use super::{allocate_credit, require_student, InvoiceAllocation, ServiceResult};

#[derive(Debug, Clone)]
pub struct DiscountRequest {
    pub student_id: Uuid,
    pub value: DiscountValue,
    pub reason: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub applied_by: String,
}

#[derive(Debug, Clone)]
pub struct DiscountApplication {
    pub discount: Discount,
    pub entry: LedgerEntry,
    pub allocations: Vec<InvoiceAllocation>,
}

impl DiscountApplication {
    pub fn credited(&self) -> Money {
        self.entry.amount
    }
}

pub struct DiscountService;

impl DiscountService {
    /// Validates and stores a discount without posting it.
    pub fn create(ctx: &LedgerContext, request: DiscountRequest) -> ServiceResult<Discount> {
        request.value.validate()?;
        if request.valid_from > request.valid_to {
            return Err(LedgerError::InvalidDiscount(format!(
                "validity window {} to {} is empty",
                request.valid_from, request.valid_to
            )));
        }
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::InvalidDiscount("a reason is required".into()));
        }
        require_student(ctx, request.student_id)?;

        let discount = Discount {
            id: Uuid::new_v4(),
            student_id: request.student_id,
            value: request.value,
            reason: reason.to_string(),
            valid_from: request.valid_from,
            valid_to: request.valid_to,
            applied_by: request.applied_by,
            applied_entry: None,
        };
        ctx.store.apply(ChangeSet::new().discount(discount.clone()))?;
        tracing::info!(
            student = %discount.student_id,
            discount = %discount.id,
            valid_to = %discount.valid_to,
            "discount approved"
        );
        Ok(discount)
    }

    /// Posts the discount's credit. A discount is applied at most once, and only
    /// inside its validity window.
    pub fn apply(ctx: &LedgerContext, discount_id: Uuid) -> ServiceResult<DiscountApplication> {
        let student_id = ctx
            .store
            .discount(discount_id)?
            .ok_or(LedgerError::DiscountNotFound(discount_id))?
            .student_id;
        let _lease = ctx.locks.acquire(student_id)?;
        let mut discount = ctx
            .store
            .discount(discount_id)?
            .ok_or(LedgerError::DiscountNotFound(discount_id))?;

        if let Some(entry_id) = discount.applied_entry {
            return Err(LedgerError::InvalidDiscount(format!(
                "discount {discount_id} was already applied as entry {entry_id}"
            )));
        }
        let today = ctx.clock.today();
        if discount.is_expired_on(today) {
            tracing::warn!(discount = %discount_id, valid_to = %discount.valid_to, "expired discount rejected");
            return Err(LedgerError::ExpiredDiscount {
                discount_id,
                valid_to: discount.valid_to,
            });
        }
        if discount.is_pending_on(today) {
            return Err(LedgerError::InvalidDiscount(format!(
                "discount {discount_id} is not valid until {}",
                discount.valid_from
            )));
        }
        discount.value.validate()?;

        let student = require_student(ctx, student_id)?;
        if student.status == StudentStatus::Settling {
            return Err(LedgerError::StudentNotActive(student_id));
        }
        let amount = discount.value.credit_amount(student.fees.total());
        if !amount.is_positive() {
            return Err(LedgerError::InvalidDiscount(format!(
                "discount {discount_id} computes to {amount}"
            )));
        }

        let entries = ctx.store.entries_for(student_id)?;
        let (mut cursor, _) =
            JournalCursor::open(student_id, &entries, ctx.settings.balance_tolerance())?;
        let entry = cursor.stage(
            PendingEntry::credit(
                amount,
                format!("Discount: {}", discount.reason),
                EntrySource::Discount { discount_id },
            ),
            today,
            ctx.clock.now(),
        )?;
        discount.applied_entry = Some(entry.id);

        let (invoices, allocations) = allocate_credit(ctx.store.invoices_for(student_id)?, amount);
        let mut changes = ChangeSet::new().entry(entry.clone()).discount(discount.clone());
        for invoice in invoices {
            changes = changes.invoice(invoice);
        }
        ctx.store.apply(changes)?;

        tracing::info!(
            student = %student_id,
            discount = %discount_id,
            amount = %amount,
            balance = %entry.balance_after,
            "discount applied"
        );
        Ok(DiscountApplication {
            discount,
            entry,
            allocations,
        })
    }

    /// Creates and immediately applies a discount.
    pub fn grant(ctx: &LedgerContext, request: DiscountRequest) -> ServiceResult<DiscountApplication> {
        let discount = Self::create(ctx, request)?;
        Self::apply(ctx, discount.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BillingSettings,
        core::clock::FixedClock,
        ledger::{FeeSchedule, HostelBook, Student},
        storage::MemoryStore,
    };
    use std::sync::Arc;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn context() -> (LedgerContext, Arc<FixedClock>, Uuid) {
        let student = Student::new(
            "Ram",
            FeeSchedule::new(
                Money::from_major(5000),
                Money::from_major(300),
                Money::from_major(700),
            ),
            date(1, 1),
        );
        let id = student.id;
        let mut book = HostelBook::new("Discounts");
        book.apply(ChangeSet::new().student(student)).unwrap();
        let clock = Arc::new(FixedClock::on(date(1, 10)));
        let ctx = LedgerContext::with_clock(
            Arc::new(MemoryStore::from_book(book)),
            BillingSettings::default(),
            clock.clone(),
        );
        (ctx, clock, id)
    }

    fn request(student_id: Uuid, value: DiscountValue) -> DiscountRequest {
        DiscountRequest {
            student_id,
            value,
            reason: "Sibling discount".into(),
            valid_from: date(1, 1),
            valid_to: date(1, 31),
            applied_by: "warden".into(),
        }
    }

    #[test]
    fn percentage_defaults_to_monthly_fee_total() {
        let (ctx, _, id) = context();
        let applied = DiscountService::grant(&ctx, request(id, DiscountValue::percent(10))).unwrap();
        assert_eq!(applied.credited(), Money::from_major(600));
        assert!(applied.discount.is_applied());
    }

    #[test]
    fn discount_applies_only_once() {
        let (ctx, _, id) = context();
        let applied = DiscountService::grant(
            &ctx,
            request(id, DiscountValue::fixed(Money::from_major(250))),
        )
        .unwrap();
        let err = DiscountService::apply(&ctx, applied.discount.id).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidDiscount(_)));
        assert_eq!(ctx.store.entries_for(id).unwrap().len(), 1);
    }

    #[test]
    fn discount_before_window_is_rejected() {
        let (ctx, clock, id) = context();
        clock.set_date(date(1, 1));
        let mut req = request(id, DiscountValue::fixed(Money::from_major(100)));
        req.valid_from = date(2, 1);
        req.valid_to = date(2, 28);
        let discount = DiscountService::create(&ctx, req).unwrap();
        assert!(matches!(
            DiscountService::apply(&ctx, discount.id),
            Err(LedgerError::InvalidDiscount(_))
        ));
    }

    #[test]
    fn invalid_values_never_reach_the_store() {
        let (ctx, _, id) = context();
        let err = DiscountService::create(&ctx, request(id, DiscountValue::percent(150))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidDiscount(_)));
        let mut inverted = request(id, DiscountValue::fixed(Money::from_major(10)));
        inverted.valid_to = date(1, 1);
        inverted.valid_from = date(1, 2);
        assert!(DiscountService::create(&ctx, inverted).is_err());
        assert!(ctx.store.snapshot().unwrap().discounts.is_empty());
    }
}
