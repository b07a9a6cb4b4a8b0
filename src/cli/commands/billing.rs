use crate::cli::commands::CommandDefinition;
use crate::cli::context::{
    parse_date, parse_money, parse_month, parse_optional_date, CommandError, CommandResult,
    ParsedArgs, ShellContext,
};
use crate::cli::output;
use crate::core::services::{
    Adjustment, CheckoutRequest, CheckoutService, DiscountRequest, DiscountService,
    InvoiceOutcome, InvoiceRunRequest, InvoiceService, PaymentRequest, PaymentService,
};
use crate::ledger::{BillingMonth, DiscountValue, PaymentMethod};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "invoice",
            "Generate monthly invoices",
            "invoice run <YYYY-MM> [student...]",
            cmd_invoice,
        ),
        CommandDefinition::new(
            "pay",
            "Record a payment",
            "pay <student> <amount> [cash|bank|card|online|cheque] [--date YYYY-MM-DD] [--note <text>]",
            cmd_pay,
        ),
        CommandDefinition::new(
            "discount",
            "Grant and apply a discount",
            "discount <student> <amount|percent%> <reason> [--from YYYY-MM-DD] [--to YYYY-MM-DD] [--max <amount>] [--base <amount>] [--by <name>]",
            cmd_discount,
        ),
        CommandDefinition::new(
            "checkout",
            "Settle and check out a student",
            "checkout <student> [--refund <amount>[:reason]] [--deduct <amount>[:reason]] [--clear] [--date YYYY-MM-DD]",
            cmd_checkout,
        ),
    ]
}

fn cmd_invoice(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    match args.first() {
        Some(sub) if sub.eq_ignore_ascii_case("run") => {}
        _ => {
            return Err(CommandError::InvalidArguments(
                "usage: invoice run <YYYY-MM> [student...]".into(),
            ))
        }
    }
    let parsed = ParsedArgs::parse(&args[1..], &[])?;
    let month = match parsed.optional(0) {
        Some(raw) => parse_month(raw)?,
        None => BillingMonth::containing(context.today()),
    };
    let mut request = InvoiceRunRequest::for_month(month);
    let names = parsed.rest(1);
    if !names.is_empty() {
        let ids = names
            .iter()
            .map(|name| context.student(name).map(|student| student.id))
            .collect::<Result<Vec<_>, _>>()?;
        request = request.only(ids);
    }

    let batch = InvoiceService::generate_monthly(&context.ledger, &request)?;
    for result in &batch.results {
        let name = context
            .ledger
            .store
            .student(result.student_id)?
            .map(|student| student.name)
            .unwrap_or_else(|| result.student_id.to_string());
        match &result.outcome {
            InvoiceOutcome::Created(invoice) => output::success(format!(
                "{} {} {} due {}",
                invoice.reference,
                name,
                context.money(invoice.total),
                invoice.due_date
            )),
            InvoiceOutcome::Skipped(reason) => output::info(format!("Skipped {name}: {reason}")),
            InvoiceOutcome::Failed(err) => output::error(format!("{name}: {err}")),
        }
    }
    output::info(format!(
        "Invoices for {}: {} created, {} skipped, {} failed ({} billed).",
        batch.month,
        batch.created(),
        batch.skipped(),
        batch.failed(),
        context.money(batch.total_billed())
    ));
    Ok(())
}

fn cmd_pay(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &[])?;
    let student = context.student(parsed.positional(0, "student")?)?;
    let amount = parse_money(parsed.positional(1, "amount")?)?;
    let method = match parsed.optional(2) {
        Some(raw) => raw.parse::<PaymentMethod>()?,
        None => PaymentMethod::Cash,
    };
    let mut request = PaymentRequest::new(student.id, amount, method);
    if let Some(date) = parse_optional_date(parsed.option("date"))? {
        request = request.on(date);
    }
    if let Some(note) = parsed.option("note") {
        request = request.with_note(note);
    }

    let receipt = PaymentService::record(&context.ledger, request)?;
    output::success(format!(
        "Recorded {} {} payment from {}. Balance {}.",
        context.money(receipt.payment.amount),
        receipt.payment.method,
        student.name,
        context.money(receipt.balance())
    ));
    for allocation in &receipt.allocations {
        output::info(format!(
            "  {} <- {}",
            allocation.reference,
            context.money(allocation.amount)
        ));
    }
    Ok(())
}

fn parse_discount_value(raw: &str) -> Result<DiscountValue, CommandError> {
    match raw.strip_suffix('%') {
        Some(percent) => {
            let rate = parse_money(percent)?;
            Ok(DiscountValue::Percentage {
                // `Money` parsing keeps two decimals, which is exactly basis points.
                basis_points: rate.minor(),
                max_amount: None,
                base_amount: None,
            })
        }
        None => Ok(DiscountValue::fixed(parse_money(raw)?)),
    }
}

fn cmd_discount(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &[])?;
    let student = context.student(parsed.positional(0, "student")?)?;
    let mut value = parse_discount_value(parsed.positional(1, "amount")?)?;
    let reason = parsed.positional(2, "reason")?;
    if let DiscountValue::Percentage {
        max_amount,
        base_amount,
        ..
    } = &mut value
    {
        *max_amount = parsed.option("max").map(parse_money).transpose()?;
        *base_amount = parsed.option("base").map(parse_money).transpose()?;
    }
    let today = context.today();
    let valid_from = match parsed.option("from") {
        Some(raw) => parse_date(raw)?,
        None => today,
    };
    let valid_to = match parsed.option("to") {
        Some(raw) => parse_date(raw)?,
        None => BillingMonth::containing(valid_from).last_day(),
    };

    let applied = DiscountService::grant(
        &context.ledger,
        DiscountRequest {
            student_id: student.id,
            value,
            reason: reason.to_string(),
            valid_from,
            valid_to,
            applied_by: parsed.option("by").unwrap_or("cli").to_string(),
        },
    )?;
    output::success(format!(
        "Discount of {} applied to {}. Balance {}.",
        context.money(applied.credited()),
        student.name,
        context.money(applied.entry.balance_after)
    ));
    Ok(())
}

fn parse_adjustment(raw: &str, refund: bool) -> Result<Adjustment, CommandError> {
    let (amount, reason) = match raw.split_once(':') {
        Some((amount, reason)) => (amount, reason.trim()),
        None => (raw, ""),
    };
    let amount = parse_money(amount)?;
    Ok(if refund {
        Adjustment::refund(amount, if reason.is_empty() { "refund" } else { reason })
    } else {
        Adjustment::deduction(amount, if reason.is_empty() { "deduction" } else { reason })
    })
}

fn cmd_checkout(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &["clear"])?;
    let student = context.student(parsed.positional(0, "student")?)?;
    let mut request = CheckoutRequest::new(student.id);
    for raw in parsed.options("refund") {
        request = request.adjust(parse_adjustment(raw, true)?);
    }
    for raw in parsed.options("deduct") {
        request = request.adjust(parse_adjustment(raw, false)?);
    }
    if parsed.has("clear") {
        request = request.clearing();
    }
    request.date = parse_optional_date(parsed.option("date"))?;

    let summary = CheckoutService::checkout(&context.ledger, request)?;
    for entry in &summary.entries {
        output::info(format!(
            "  {} {} {}",
            entry.kind.label(),
            context.money(entry.amount),
            entry.description
        ));
    }
    output::success(format!(
        "{} checked out on {}. Balance {} -> {}.",
        student.name,
        summary.checkout_date,
        context.money(summary.opening_balance),
        context.money(summary.final_balance)
    ));
    if summary.final_balance.is_positive() {
        output::warning(format!(
            "{} still owes {}.",
            student.name,
            context.money(summary.final_balance)
        ));
    }
    Ok(())
}
