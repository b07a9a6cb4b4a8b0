use crate::cli::commands::CommandDefinition;
use crate::cli::context::{
    parse_money, parse_optional_date, short_id, CommandError, CommandResult, ParsedArgs,
    ShellContext,
};
use crate::cli::output;
use crate::core::services::{EnrollRequest, RosterService};
use crate::currency::Money;
use crate::ledger::FeeSchedule;

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "room",
            "Register a room",
            "room add <number> <capacity>",
            cmd_room,
        ),
        CommandDefinition::new("rooms", "List rooms and occupancy", "rooms", cmd_rooms),
        CommandDefinition::new(
            "student",
            "Enroll a student",
            "student add <name> <monthly-fee> [--laundry <amount>] [--food <amount>] [--room <number>] [--check-in YYYY-MM-DD]",
            cmd_student,
        ),
        CommandDefinition::new("students", "List students", "students", cmd_students),
        CommandDefinition::new(
            "assign",
            "Move a student into a room",
            "assign <student> <room>",
            cmd_assign,
        ),
    ]
}

fn expect_subcommand(args: &[&str], expected: &str, usage: &str) -> Result<(), CommandError> {
    match args.first() {
        Some(sub) if sub.eq_ignore_ascii_case(expected) => Ok(()),
        _ => Err(CommandError::InvalidArguments(format!("usage: {usage}"))),
    }
}

fn cmd_room(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_subcommand(args, "add", "room add <number> <capacity>")?;
    let parsed = ParsedArgs::parse(&args[1..], &[])?;
    let number = parsed.positional(0, "number")?;
    let capacity = parsed.positional(1, "capacity")?;
    let capacity: u32 = capacity.parse().map_err(|_| {
        CommandError::InvalidArguments(format!("invalid capacity `{capacity}`"))
    })?;
    let room = RosterService::add_room(&context.ledger, number, capacity)?;
    output::success(format!("Room {} added (capacity {}).", room.number, room.capacity));
    Ok(())
}

fn cmd_rooms(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let mut rooms = context.ledger.store.rooms()?;
    if rooms.is_empty() {
        output::info("No rooms registered. Use `room add <number> <capacity>`.");
        return Ok(());
    }
    rooms.sort_by(|a, b| a.number.cmp(&b.number));
    let rows: Vec<Vec<String>> = rooms
        .iter()
        .map(|room| {
            let state = if room.is_vacant() {
                "vacant"
            } else if room.has_space() {
                "available"
            } else {
                "full"
            };
            vec![
                room.number.clone(),
                room.capacity.to_string(),
                room.occupants.len().to_string(),
                state.to_string(),
            ]
        })
        .collect();
    output::table(&["Room", "Capacity", "Occupants", "State"], &rows, &[1, 2]);
    Ok(())
}

fn cmd_student(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let usage = "student add <name> <monthly-fee> [--laundry <amount>] [--food <amount>] [--room <number>] [--check-in YYYY-MM-DD]";
    expect_subcommand(args, "add", usage)?;
    let parsed = ParsedArgs::parse(&args[1..], &[])?;
    let name = parsed.positional(0, "name")?;
    let base = parse_money(parsed.positional(1, "monthly-fee")?)?;
    let laundry = parsed.option("laundry").map(parse_money).transpose()?;
    let food = parsed.option("food").map(parse_money).transpose()?;
    let fees = FeeSchedule::new(
        base,
        laundry.unwrap_or(Money::ZERO),
        food.unwrap_or(Money::ZERO),
    );

    let mut request = EnrollRequest::new(name, fees);
    if let Some(date) = parse_optional_date(parsed.option("check-in"))? {
        request = request.checked_in(date);
    }
    if let Some(number) = parsed.option("room") {
        request = request.in_room(context.room(number)?.id);
    }
    let student = RosterService::enroll(&context.ledger, request)?;
    output::success(format!(
        "Enrolled {} [{}] from {}, monthly fees {}.",
        student.name,
        short_id(student.id),
        student.check_in_date,
        context.money(student.fees.total())
    ));
    Ok(())
}

fn cmd_students(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let mut students = context.ledger.store.students()?;
    if students.is_empty() {
        output::info("No students enrolled. Use `student add`.");
        return Ok(());
    }
    students.sort_by(|a, b| a.name.cmp(&b.name));
    let rows: Vec<Vec<String>> = students
        .iter()
        .map(|student| {
            vec![
                short_id(student.id),
                student.name.clone(),
                context.room_number(student.room_id),
                format!("{:?}", student.status),
                context.money(student.fees.total()),
                student.check_in_date.to_string(),
            ]
        })
        .collect();
    output::table(
        &["Id", "Name", "Room", "Status", "Monthly", "Checked in"],
        &rows,
        &[4],
    );
    Ok(())
}

fn cmd_assign(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &[])?;
    let student = context.student(parsed.positional(0, "student")?)?;
    let room = context.room(parsed.positional(1, "room")?)?;
    let updated = RosterService::assign_room(&context.ledger, student.id, room.id)?;
    output::success(format!("{} now lives in room {}.", updated.name, room.number));
    Ok(())
}
