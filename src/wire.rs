use std::fmt::Debug;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::auth::RoomCalAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::{EntryKind, ScheduleEntry};
use crate::observability;
use crate::sql::{self, Command};

pub struct RoomCalHandler {
    engine: Arc<Engine>,
    query_parser: Arc<RoomCalQueryParser>,
}

impl RoomCalHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(RoomCalQueryParser),
        }
    }

    async fn execute_recorded(&self, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = std::time::Instant::now();
        let result = self.execute_command(cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Vec<Response>> {
        let engine = &self.engine;
        match cmd {
            Command::InsertRoomType { id, name, description, price, image } => {
                engine
                    .create_room_type(id, name, description, price, image)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateRoomType { id, name, description, price, image } => {
                engine
                    .update_room_type(id, name, description, price, image)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteRoomType { id } => {
                engine.delete_room_type(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectRoomTypes { id } => {
                let room_types = match id {
                    Some(id) => vec![engine.get_room_type(id).map_err(engine_err)?],
                    None => engine.list_room_types(),
                };
                let schema = Arc::new(room_types_schema());
                let rows: Vec<PgWireResult<_>> = room_types
                    .into_iter()
                    .map(|rt| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&rt.id.to_string())?;
                        encoder.encode_field(&rt.name)?;
                        encoder.encode_field(&rt.description)?;
                        encoder.encode_field(&rt.price)?;
                        encoder.encode_field(&rt.image)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::InsertBooking { id, room_type_id, date, slot, name, contact_number } => {
                engine
                    .place_booking(id, room_type_id, date, slot, name, contact_number)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteBooking { id } => {
                engine
                    .remove_entry(crate::model::Kind::Booking, id)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertEvent { id, room_type_id, date, slot, title, description } => {
                engine
                    .schedule_event(id, room_type_id, date, slot, title, description)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateEvent { id, room_type_id, date, slot, title, description } => {
                engine
                    .update_event(id, room_type_id, date, slot, title, description)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteEvent { id } => {
                engine
                    .remove_entry(crate::model::Kind::Event, id)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectCalendar { date_from, date_to, search } => {
                let days = engine
                    .calendar(date_from, date_to, search.as_deref())
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(calendar_schema());
                let rows: Vec<PgWireResult<_>> = days
                    .iter()
                    .flat_map(|day| day.items.iter())
                    .map(|item| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&item.id)?;
                        encoder.encode_field(&item.title)?;
                        encoder.encode_field(&item.date)?;
                        encoder.encode_field(&item.start_time)?;
                        encoder.encode_field(&item.end_time)?;
                        encoder.encode_field(&item.kind)?;
                        encoder.encode_field(&item.room_type_name)?;
                        encoder.encode_field(&item.contact)?;
                        encoder.encode_field(&item.description)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectEntries { room_type_id, date } => {
                let entries = engine
                    .entries_for_day(room_type_id, date)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(entries_schema());
                let rows: Vec<PgWireResult<_>> = entries
                    .iter()
                    .map(|entry| encode_entry(&schema, entry))
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectFreeSlots { room_type_id, date, min_minutes } => {
                let slots = engine
                    .free_slots(room_type_id, date, min_minutes)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(free_slots_schema());
                let rid_str = room_type_id.to_string();
                let date_str = date.format("%Y-%m-%d").to_string();
                let rows: Vec<PgWireResult<_>> = slots
                    .into_iter()
                    .map(|slot| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&rid_str)?;
                        encoder.encode_field(&date_str)?;
                        encoder.encode_field(&slot.start.to_string())?;
                        encoder.encode_field(&slot.end.to_string())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::Listen { channel } => {
                parse_room_channel(&channel)?;
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
            Command::Unlisten { channel } => {
                parse_room_channel(&channel)?;
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
            Command::UnlistenAll => Ok(vec![Response::Execution(Tag::new("UNLISTEN"))]),
        }
    }
}

fn parse_room_channel(channel: &str) -> PgWireResult<Ulid> {
    let id_str = channel.strip_prefix("room_").ok_or_else(|| {
        PgWireError::UserError(Box::new(ErrorInfo::new(
            "ERROR".into(),
            "42000".into(),
            format!("invalid channel: {channel} (expected room_{{id}})"),
        )))
    })?;
    Ulid::from_string(id_str).map_err(|e| {
        PgWireError::UserError(Box::new(ErrorInfo::new(
            "ERROR".into(),
            "42000".into(),
            format!("bad ULID in channel: {e}"),
        )))
    })
}

fn encode_entry(
    schema: &Arc<Vec<FieldInfo>>,
    entry: &ScheduleEntry,
) -> PgWireResult<pgwire::messages::data::DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&entry.id.to_string())?;
    encoder.encode_field(&entry.kind.kind().as_str())?;
    encoder.encode_field(&entry.slot.start.to_string())?;
    encoder.encode_field(&entry.slot.end.to_string())?;
    match &entry.kind {
        EntryKind::Booking { name, contact_number } => {
            encoder.encode_field(&None::<&str>)?; // title
            encoder.encode_field(&None::<&str>)?; // description
            encoder.encode_field(&Some(name.as_str()))?;
            encoder.encode_field(&Some(contact_number.as_str()))?;
        }
        EntryKind::Event { title, description } => {
            encoder.encode_field(&Some(title.as_str()))?;
            encoder.encode_field(&Some(description.as_str()))?;
            encoder.encode_field(&None::<&str>)?; // name
            encoder.encode_field(&None::<&str>)?; // contact_number
        }
    }
    Ok(encoder.take_row())
}

// ── Result schemas ───────────────────────────────────────────────

fn varchar(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn room_types_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("name"),
        varchar("description"),
        FieldInfo::new("price".into(), None, None, Type::FLOAT8, FieldFormat::Text),
        varchar("image"),
    ]
}

fn calendar_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("title"),
        varchar("date"),
        varchar("start_time"),
        varchar("end_time"),
        varchar("kind"),
        varchar("room_type_name"),
        varchar("contact"),
        varchar("description"),
    ]
}

fn entries_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("kind"),
        varchar("start_time"),
        varchar("end_time"),
        varchar("title"),
        varchar("description"),
        varchar("name"),
        varchar("contact_number"),
    ]
}

fn free_slots_schema() -> Vec<FieldInfo> {
    vec![
        varchar("room_type_id"),
        varchar("date"),
        varchar("start_time"),
        varchar("end_time"),
    ]
}

fn schema_for_statement(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if !upper.contains("SELECT") {
        return vec![];
    }
    if upper.contains("ROOM_TYPES") {
        room_types_schema()
    } else if upper.contains("CALENDAR") {
        calendar_schema()
    } else if upper.contains("FREE_SLOTS") {
        free_slots_schema()
    } else if upper.contains("ENTRIES") {
        entries_schema()
    } else {
        vec![]
    }
}

// ── Simple Query Protocol ────────────────────────────────────────

#[async_trait]
impl SimpleQueryHandler for RoomCalHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_recorded(cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RoomCalQueryParser;

#[async_trait]
impl QueryParser for RoomCalQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for_statement(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for RoomCalHandler {
    type Statement = String;
    type QueryParser = RoomCalQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute_recorded(cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for_statement(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for_statement(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct RoomCalFactory {
    handler: Arc<RoomCalHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<RoomCalAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl RoomCalFactory {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        let auth_source = RoomCalAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(RoomCalHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RoomCalFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection over the Postgres wire protocol.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = RoomCalFactory::new(engine, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Error mapping ────────────────────────────────────────────────

fn engine_err(e: EngineError) -> PgWireError {
    let code = match &e {
        EngineError::SlotTaken(_) => {
            metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
            "23P01" // exclusion_violation: overlapping reservation
        }
        EngineError::AlreadyExists(_) | EngineError::DuplicateName(_) => "23505",
        EngineError::NotFound(_) => "P0002",
        EngineError::InvalidRange(_) => "22007",
        _ => "P0001",
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}

fn sql_err(e: sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
