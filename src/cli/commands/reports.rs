use crate::cli::commands::CommandDefinition;
use crate::cli::context::{parse_optional_date, CommandResult, ParsedArgs, ShellContext};
use crate::cli::output;
use crate::core::services::{LedgerService, StatementWindow, SummaryService};
use crate::currency::Money;

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "balance",
            "Show a student's audited balance",
            "balance <student>",
            cmd_balance,
        ),
        CommandDefinition::new(
            "statement",
            "Print a student's statement",
            "statement <student> [--from YYYY-MM-DD] [--to YYYY-MM-DD]",
            cmd_statement,
        ),
        CommandDefinition::new(
            "audit",
            "Verify every student's running balances",
            "audit",
            cmd_audit,
        ),
        CommandDefinition::new(
            "outstanding",
            "List balances, largest dues first",
            "outstanding",
            cmd_outstanding,
        ),
        CommandDefinition::new(
            "backup",
            "Back up the book, or list backups",
            "backup [note] | backup list",
            cmd_backup,
        ),
    ]
}

fn cmd_balance(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &[])?;
    let student = context.student(parsed.positional(0, "student")?)?;
    let report = LedgerService::balance(&context.ledger, student.id)?;
    let state = if report.owes() {
        "owes"
    } else if report.current.is_negative() {
        "in credit"
    } else {
        "settled"
    };
    output::info(format!(
        "{}: {} ({}, {} entries)",
        student.name,
        context.money(report.current),
        state,
        report.entry_count()
    ));
    Ok(())
}

fn cmd_statement(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &[])?;
    let student = context.student(parsed.positional(0, "student")?)?;
    let window = StatementWindow::new(
        parse_optional_date(parsed.option("from"))?,
        parse_optional_date(parsed.option("to"))?,
    )?;
    let statement = SummaryService::statement(&context.ledger, student.id, window)?;

    output::section(format!(
        "{} - statement for {}",
        context.config.hostel.name, statement.student.name
    ));
    output::info(format!("Opening balance: {}", context.money(statement.opening_balance)));
    let amount_or_blank = |amount: Money, show: bool| {
        if show {
            context.money(amount)
        } else {
            String::new()
        }
    };
    let rows: Vec<Vec<String>> = statement
        .entries
        .iter()
        .map(|entry| {
            vec![
                entry.date.to_string(),
                entry.seq.to_string(),
                entry.description.clone(),
                amount_or_blank(entry.amount, entry.is_debit()),
                amount_or_blank(entry.amount, entry.is_credit()),
                context.money(entry.balance_after),
            ]
        })
        .collect();
    if rows.is_empty() {
        output::info("No entries in this period.");
    } else {
        output::table(
            &["Date", "#", "Description", "Debit", "Credit", "Balance"],
            &rows,
            &[1, 3, 4, 5],
        );
    }
    output::info(format!(
        "Debits {} | Credits {} | Closing balance {}",
        context.money(statement.total_debits),
        context.money(statement.total_credits),
        context.money(statement.closing_balance)
    ));
    Ok(())
}

fn cmd_audit(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let report = SummaryService::audit_all(&context.ledger)?;
    if report.is_clean() {
        output::success(format!(
            "Audit clean: {} students, {} entries.",
            report.checked, report.entries
        ));
        return Ok(());
    }
    for issue in &report.issues {
        output::error(format!("{}: {}", issue.name, issue.message));
    }
    output::warning(format!(
        "{} of {} ledgers are inconsistent.",
        report.issues.len(),
        report.checked
    ));
    Ok(())
}

fn cmd_outstanding(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let balances = SummaryService::outstanding(&context.ledger)?;
    if balances.is_empty() {
        output::info("No students enrolled.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = balances
        .iter()
        .map(|row| {
            vec![
                row.name.clone(),
                row.room.clone().unwrap_or_else(|| "-".into()),
                format!("{:?}", row.status),
                row.open_invoices.to_string(),
                context.money(row.balance),
            ]
        })
        .collect();
    output::table(&["Student", "Room", "Status", "Open", "Balance"], &rows, &[3, 4]);
    let owed: Money = balances
        .iter()
        .map(|row| row.balance)
        .filter(|balance| balance.is_positive())
        .sum();
    output::info(format!("Total outstanding: {}", context.money(owed)));
    Ok(())
}

fn cmd_backup(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.first().is_some_and(|arg| arg.eq_ignore_ascii_case("list")) {
        let backups = context.store.list_backups()?;
        if backups.is_empty() {
            output::info("No backups yet.");
        }
        for backup in backups {
            output::info(format!("  {}", backup.name));
        }
        return Ok(());
    }
    let note = (!args.is_empty()).then(|| args.join(" "));
    let info = context.store.backup(note.as_deref())?;
    output::success(format!("Backup written: {}", info.name));
    Ok(())
}
