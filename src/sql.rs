use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::{ClockTime, TimeSlot};

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoomType {
        id: Ulid,
        name: String,
        description: String,
        price: f64,
        image: String,
    },
    UpdateRoomType {
        id: Ulid,
        name: String,
        description: String,
        price: f64,
        image: String,
    },
    DeleteRoomType {
        id: Ulid,
    },
    SelectRoomTypes {
        id: Option<Ulid>,
    },
    InsertBooking {
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
        slot: TimeSlot,
        name: String,
        contact_number: String,
    },
    DeleteBooking {
        id: Ulid,
    },
    InsertEvent {
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
        slot: TimeSlot,
        title: String,
        description: String,
    },
    UpdateEvent {
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
        slot: TimeSlot,
        title: String,
        description: String,
    },
    DeleteEvent {
        id: Ulid,
    },
    SelectCalendar {
        date_from: NaiveDate,
        date_to: NaiveDate,
        search: Option<String>,
    },
    SelectEntries {
        room_type_id: Ulid,
        date: NaiveDate,
    },
    SelectFreeSlots {
        room_type_id: Ulid,
        date: NaiveDate,
        min_minutes: Option<u16>,
    },
    Listen {
        channel: String,
    },
    Unlisten {
        channel: String,
    },
    UnlistenAll,
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    let upper = trimmed.to_uppercase();
    if upper.starts_with("LISTEN ") {
        let channel = trimmed[7..].trim().trim_matches(';').to_string();
        return Ok(Command::Listen { channel });
    }
    if upper.starts_with("UNLISTEN") {
        let channel = trimmed[8..].trim().trim_matches(';').to_string();
        return if channel.is_empty() || channel == "*" {
            Ok(Command::UnlistenAll)
        } else {
            Ok(Command::Unlisten { channel })
        };
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update { table, assignments, selection, .. } => {
            parse_update(table, assignments, selection)
        }
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "room_types" => {
            if values.len() < 5 {
                return Err(SqlError::WrongArity("room_types", 5, values.len()));
            }
            Ok(Command::InsertRoomType {
                id: parse_ulid(&values[0])?,
                name: parse_string(&values[1])?,
                description: parse_string(&values[2])?,
                price: parse_f64(&values[3])?,
                image: parse_string(&values[4])?,
            })
        }
        "bookings" => {
            if values.len() < 7 {
                return Err(SqlError::WrongArity("bookings", 7, values.len()));
            }
            Ok(Command::InsertBooking {
                id: parse_ulid(&values[0])?,
                room_type_id: parse_ulid(&values[1])?,
                date: parse_date(&values[2])?,
                slot: parse_slot(&values[3], &values[4])?,
                name: parse_string(&values[5])?,
                contact_number: parse_string(&values[6])?,
            })
        }
        "events" => {
            if values.len() < 6 {
                return Err(SqlError::WrongArity("events", 6, values.len()));
            }
            // trailing description is optional, defaulting to empty
            let description = if values.len() >= 7 {
                parse_string_or_null(&values[6])?
            } else {
                String::new()
            };
            Ok(Command::InsertEvent {
                id: parse_ulid(&values[0])?,
                room_type_id: parse_ulid(&values[1])?,
                date: parse_date(&values[2])?,
                slot: parse_slot(&values[3], &values[4])?,
                title: parse_string(&values[5])?,
                description,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let id = extract_where_id(selection)?;

    match table.as_str() {
        "room_types" => Ok(Command::UpdateRoomType {
            id,
            name: parse_string(find_assignment(assignments, "name")?)?,
            description: parse_string(find_assignment(assignments, "description")?)?,
            price: parse_f64(find_assignment(assignments, "price")?)?,
            image: parse_string(find_assignment(assignments, "image")?)?,
        }),
        "events" => {
            let description = match find_assignment(assignments, "description") {
                Ok(expr) => parse_string_or_null(expr)?,
                Err(_) => String::new(),
            };
            Ok(Command::UpdateEvent {
                id,
                room_type_id: parse_ulid(find_assignment(assignments, "room_type_id")?)?,
                date: parse_date(find_assignment(assignments, "date")?)?,
                slot: parse_slot(
                    find_assignment(assignments, "start_time")?,
                    find_assignment(assignments, "end_time")?,
                )?,
                title: parse_string(find_assignment(assignments, "title")?)?,
                description,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn find_assignment<'a>(
    assignments: &'a [ast::Assignment],
    col: &'static str,
) -> Result<&'a Expr, SqlError> {
    assignments
        .iter()
        .find(|a| assignment_column(a).as_deref() == Some(col))
        .map(|a| &a.value)
        .ok_or(SqlError::MissingAssignment(col))
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "room_types" => Ok(Command::DeleteRoomType { id }),
        "bookings" => Ok(Command::DeleteBooking { id }),
        "events" => Ok(Command::DeleteEvent { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    match table.as_str() {
        "room_types" => {
            let mut filters = Filters::default();
            if let Some(selection) = &select.selection {
                collect_filters(selection, &mut filters)?;
            }
            Ok(Command::SelectRoomTypes { id: filters.id })
        }
        "calendar" => {
            let mut filters = Filters::default();
            if let Some(selection) = &select.selection {
                collect_filters(selection, &mut filters)?;
            }
            Ok(Command::SelectCalendar {
                date_from: filters.date_from.ok_or(SqlError::MissingFilter("date >="))?,
                date_to: filters.date_to.ok_or(SqlError::MissingFilter("date <="))?,
                search: filters.search,
            })
        }
        "entries" => {
            let mut filters = Filters::default();
            if let Some(selection) = &select.selection {
                collect_filters(selection, &mut filters)?;
            }
            Ok(Command::SelectEntries {
                room_type_id: filters
                    .room_type_id
                    .ok_or(SqlError::MissingFilter("room_type_id"))?,
                date: filters.date_eq.ok_or(SqlError::MissingFilter("date"))?,
            })
        }
        "free_slots" => {
            let mut filters = Filters::default();
            if let Some(selection) = &select.selection {
                collect_filters(selection, &mut filters)?;
            }
            Ok(Command::SelectFreeSlots {
                room_type_id: filters
                    .room_type_id
                    .ok_or(SqlError::MissingFilter("room_type_id"))?,
                date: filters.date_eq.ok_or(SqlError::MissingFilter("date"))?,
                min_minutes: filters.min_minutes,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// WHERE-clause filters recognized across the SELECT surfaces. Conjunctions
/// only — anything else is ignored rather than rejected, matching how thin
/// the query language is meant to be.
#[derive(Default)]
struct Filters {
    id: Option<Ulid>,
    room_type_id: Option<Ulid>,
    date_eq: Option<NaiveDate>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    search: Option<String>,
    min_minutes: Option<u16>,
}

fn collect_filters(expr: &Expr, filters: &mut Filters) -> Result<(), SqlError> {
    if let Expr::Nested(inner) = expr {
        return collect_filters(inner, filters);
    }
    let Expr::BinaryOp { left, op, right } = expr else {
        return Ok(());
    };
    match op {
        ast::BinaryOperator::And => {
            collect_filters(left, filters)?;
            collect_filters(right, filters)?;
        }
        ast::BinaryOperator::Eq => match expr_column_name(left).as_deref() {
            Some("id") => filters.id = Some(parse_ulid(right)?),
            Some("room_type_id") => filters.room_type_id = Some(parse_ulid(right)?),
            Some("date") => filters.date_eq = Some(parse_date(right)?),
            Some("search") => filters.search = Some(parse_string(right)?),
            Some("min_minutes") => filters.min_minutes = Some(parse_u16(right)?),
            _ => {}
        },
        ast::BinaryOperator::GtEq => {
            if expr_column_name(left).as_deref() == Some("date") {
                filters.date_from = Some(parse_date(right)?);
            }
        }
        ast::BinaryOperator::LtEq => {
            if expr_column_name(left).as_deref() == Some("date") {
                filters.date_to = Some(parse_date(right)?);
            }
        }
        _ => {}
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            if values.rows.len() > 1 {
                return Err(SqlError::Unsupported("multi-row INSERT".into()));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn assignment_column(assignment: &ast::Assignment) -> Option<String> {
    match &assignment.target {
        ast::AssignmentTarget::ColumnName(name) => object_name_last(name),
        _ => None,
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s) | Value::Number(s, _)) => {
            Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
        }
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(String::new()),
        _ => parse_string(expr),
    }
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    match extract_value(expr) {
        Some(Value::Number(s, _)) | Some(Value::SingleQuotedString(s)) => s
            .parse()
            .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
        Some(value) => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_u16(expr: &Expr) -> Result<u16, SqlError> {
    match extract_value(expr) {
        Some(Value::Number(s, _)) | Some(Value::SingleQuotedString(s)) => s
            .parse()
            .map_err(|e| SqlError::Parse(format!("bad u16: {e}"))),
        Some(value) => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

fn parse_time(expr: &Expr) -> Result<ClockTime, SqlError> {
    let s = parse_string(expr)?;
    s.parse().map_err(|e| SqlError::Parse(format!("{e}")))
}

/// Parse a (start, end) pair. Inverted or empty ranges are left for the
/// engine to reject with a typed error — the parser only checks shape.
fn parse_slot(start: &Expr, end: &Expr) -> Result<TimeSlot, SqlError> {
    Ok(TimeSlot {
        start: parse_time(start)?,
        end: parse_time(end)?,
    })
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    MissingAssignment(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::MissingAssignment(col) => write!(f, "missing SET column: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
