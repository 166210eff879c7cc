// crates/honeygrid-store-sqlite/src/store.rs
// ============================================================================
// Module: Honeygrid SQLite Store
// Description: SQLite-backed PoolStore with WAL and atomic batches.
// Purpose: Keep control-plane state durable across process restarts.
// Dependencies: honeygrid_core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! One SQLite file holds the four control-plane tables (containers,
//! sessions, routing entries, decision log) plus a `store_meta` version row
//! that gates schema compatibility on open. Every mutation batch from the
//! engine runs inside a single transaction, so a crash can only ever roll
//! the file back to a batch boundary. Connection access is serialized
//! through a mutex; WAL journaling and a busy timeout keep concurrent
//! readers from failing spuriously.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use honeygrid_core::Container;
use honeygrid_core::ContainerId;
use honeygrid_core::ContainerState;
use honeygrid_core::DecisionLogEntry;
use honeygrid_core::DecisionLogRecord;
use honeygrid_core::DecisionRef;
use honeygrid_core::PoolStore;
use honeygrid_core::RoutingEntry;
use honeygrid_core::RoutingKey;
use honeygrid_core::RuleId;
use honeygrid_core::Session;
use honeygrid_core::SessionFilter;
use honeygrid_core::SessionId;
use honeygrid_core::SessionState;
use honeygrid_core::SkillScore;
use honeygrid_core::StateMutation;
use honeygrid_core::StoreError;
use honeygrid_core::Tier;
use honeygrid_core::TierCounts;
use honeygrid_core::Timestamp;
use honeygrid_core::UpstreamAddr;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current schema version recorded in `store_meta`.
const SCHEMA_VERSION: u32 = 1;

/// Default busy timeout applied to every connection.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// `SQLite` journal mode selection.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead logging; the default for durable deployments.
    #[default]
    Wal,
    /// Rollback journal; only for read-mostly test scenarios.
    Delete,
}

impl JournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// `SQLite` synchronous mode selection.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Fsync at critical moments; pairs with WAL.
    #[default]
    Normal,
    /// Fsync on every write.
    Full,
}

impl SyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

/// `SQLite` pool store configuration.
///
/// # Invariants
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlitePoolStoreConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Journal mode pragma.
    #[serde(default)]
    pub journal_mode: JournalMode,
    /// Synchronous mode pragma.
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl SqlitePoolStoreConfig {
    /// Creates a configuration with default pragmas for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            journal_mode: JournalMode::default(),
            sync_mode: SyncMode::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` pool store errors.
///
/// # Invariants
/// - Error messages avoid embedding record payloads.
#[derive(Debug, Error, Clone)]
pub enum SqlitePoolStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Persisted row failed to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Schema version on disk does not match this build.
    #[error("sqlite store version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        /// Version found on disk.
        found: u32,
        /// Version this build requires.
        expected: u32,
    },
    /// Invalid configuration or input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqlitePoolStoreError> for StoreError {
    fn from(error: SqlitePoolStoreError) -> Self {
        match error {
            SqlitePoolStoreError::Io(message) => Self::Io(message),
            SqlitePoolStoreError::Db(message) => Self::Db(message),
            SqlitePoolStoreError::Corrupt(message) => Self::Corrupt(message),
            SqlitePoolStoreError::VersionMismatch { found, expected } => {
                Self::VersionMismatch { found, expected }
            }
            SqlitePoolStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Shorthand for mapping a rusqlite error into the store taxonomy.
fn db_err(err: &rusqlite::Error) -> SqlitePoolStoreError {
    SqlitePoolStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed [`PoolStore`].
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - [`PoolStore::apply`] batches commit in one transaction.
#[derive(Debug)]
pub struct SqlitePoolStore {
    /// Shared connection guarded by a mutex.
    connection: Mutex<Connection>,
}

impl SqlitePoolStore {
    /// Opens (and initializes or migrates) the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqlitePoolStoreError`] when the path is invalid, the file
    /// cannot be opened, or the on-disk schema version does not match.
    pub fn open(config: &SqlitePoolStoreConfig) -> Result<Self, SqlitePoolStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Acquires the connection lock, recovering from poisoning.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Path and Schema Setup
// ============================================================================

/// Rejects unusable store paths before opening.
fn validate_store_path(path: &Path) -> Result<(), SqlitePoolStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqlitePoolStoreError::Invalid("store path is empty".to_string()));
    }
    if path.exists() && path.is_dir() {
        return Err(SqlitePoolStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Creates the parent directory of the store file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqlitePoolStoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|err| SqlitePoolStoreError::Io(err.to_string()))?;
        }
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqlitePoolStoreConfig) -> Result<Connection, SqlitePoolStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_err(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies the pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqlitePoolStoreConfig,
) -> Result<(), SqlitePoolStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!(
            "PRAGMA journal_mode = {};",
            config.journal_mode.pragma_value()
        ))
        .map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_err(&err))?;
    Ok(())
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqlitePoolStoreError> {
    let tx = connection.transaction().map_err(|err| db_err(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_err(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_err(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_err(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS containers (
                    id TEXT PRIMARY KEY,
                    tier INTEGER NOT NULL,
                    host TEXT NOT NULL,
                    port INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    assigned_session TEXT,
                    healthy INTEGER NOT NULL,
                    last_health_check INTEGER,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_containers_tier
                    ON containers (tier, state, healthy);
                CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    current_tier INTEGER NOT NULL,
                    container_id TEXT,
                    state TEXT NOT NULL,
                    skill_score INTEGER NOT NULL,
                    escalation_count INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    expires_at INTEGER,
                    last_decision_ref TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_sessions_expiry
                    ON sessions (state, expires_at);
                CREATE TABLE IF NOT EXISTS routing_entries (
                    session_id TEXT PRIMARY KEY,
                    routing_key TEXT NOT NULL UNIQUE,
                    host TEXT NOT NULL,
                    port INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS decision_log (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    action TEXT NOT NULL,
                    rule_id TEXT NOT NULL,
                    skill_score_before INTEGER,
                    skill_score_after INTEGER NOT NULL,
                    from_container TEXT,
                    to_container TEXT,
                    explanation TEXT NOT NULL,
                    logged_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_decision_log_session
                    ON decision_log (session_id, seq);",
            )
            .map_err(|err| db_err(&err))?;
        }
        Some(value) if value == i64::from(SCHEMA_VERSION) => {}
        Some(value) => {
            return Err(SqlitePoolStoreError::VersionMismatch {
                found: u32::try_from(value).unwrap_or(0),
                expected: SCHEMA_VERSION,
            });
        }
    }
    tx.commit().map_err(|err| db_err(&err))?;
    Ok(())
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Raw container row before domain decoding.
struct ContainerRow {
    /// Container id.
    id: String,
    /// Numeric tier level.
    tier: i64,
    /// Upstream host.
    host: String,
    /// Upstream port.
    port: i64,
    /// State label.
    state: String,
    /// Holding session id, when assigned.
    assigned_session: Option<String>,
    /// Health flag (0/1).
    healthy: i64,
    /// Last health check millis.
    last_health_check: Option<i64>,
    /// Creation millis.
    created_at: i64,
    /// Last mutation millis.
    updated_at: i64,
}

impl ContainerRow {
    /// Reads a container row from a result row.
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tier: row.get(1)?,
            host: row.get(2)?,
            port: row.get(3)?,
            state: row.get(4)?,
            assigned_session: row.get(5)?,
            healthy: row.get(6)?,
            last_health_check: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    /// Decodes the raw row into a domain container.
    fn decode(self) -> Result<Container, SqlitePoolStoreError> {
        Ok(Container {
            id: ContainerId::new(self.id),
            tier: decode_tier(self.tier)?,
            upstream: UpstreamAddr::new(self.host, decode_port(self.port)?),
            state: ContainerState::from_label(&self.state).ok_or_else(|| {
                SqlitePoolStoreError::Corrupt(format!("unknown container state: {}", self.state))
            })?,
            assigned_session: self.assigned_session.map(SessionId::new),
            healthy: self.healthy != 0,
            last_health_check: self.last_health_check.map(Timestamp::from_unix_millis),
            created_at: Timestamp::from_unix_millis(self.created_at),
            updated_at: Timestamp::from_unix_millis(self.updated_at),
        })
    }
}

/// Raw session row before domain decoding.
struct SessionRow {
    /// Session id.
    id: String,
    /// Numeric tier level.
    current_tier: i64,
    /// Held container id, when any.
    container_id: Option<String>,
    /// State label.
    state: String,
    /// Skill score (0..=10).
    skill_score: i64,
    /// Successful allocation count.
    escalation_count: i64,
    /// Creation millis.
    created_at: i64,
    /// Last mutation millis.
    updated_at: i64,
    /// Expiry deadline millis, when any.
    expires_at: Option<i64>,
    /// Last decision reference, when any.
    last_decision_ref: Option<String>,
}

impl SessionRow {
    /// Reads a session row from a result row.
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            current_tier: row.get(1)?,
            container_id: row.get(2)?,
            state: row.get(3)?,
            skill_score: row.get(4)?,
            escalation_count: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            expires_at: row.get(8)?,
            last_decision_ref: row.get(9)?,
        })
    }

    /// Decodes the raw row into a domain session.
    fn decode(self) -> Result<Session, SqlitePoolStoreError> {
        let score = u8::try_from(self.skill_score)
            .ok()
            .and_then(|value| SkillScore::new(value).ok())
            .ok_or_else(|| {
                SqlitePoolStoreError::Corrupt(format!(
                    "skill score out of range: {}",
                    self.skill_score
                ))
            })?;
        Ok(Session {
            id: SessionId::new(self.id),
            current_tier: decode_tier(self.current_tier)?,
            container_id: self.container_id.map(ContainerId::new),
            state: SessionState::from_label(&self.state).ok_or_else(|| {
                SqlitePoolStoreError::Corrupt(format!("unknown session state: {}", self.state))
            })?,
            skill_score: score,
            escalation_count: u32::try_from(self.escalation_count).map_err(|_| {
                SqlitePoolStoreError::Corrupt(format!(
                    "escalation count out of range: {}",
                    self.escalation_count
                ))
            })?,
            created_at: Timestamp::from_unix_millis(self.created_at),
            updated_at: Timestamp::from_unix_millis(self.updated_at),
            expires_at: self.expires_at.map(Timestamp::from_unix_millis),
            last_decision_ref: self.last_decision_ref.map(DecisionRef::new),
        })
    }
}

/// Raw routing entry row before domain decoding.
struct RoutingRow {
    /// Session id.
    session_id: String,
    /// Routing key wire form.
    routing_key: String,
    /// Upstream host.
    host: String,
    /// Upstream port.
    port: i64,
    /// Creation millis.
    created_at: i64,
    /// Last mutation millis.
    updated_at: i64,
}

impl RoutingRow {
    /// Reads a routing row from a result row.
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            routing_key: row.get(1)?,
            host: row.get(2)?,
            port: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    /// Decodes the raw row into a domain routing entry.
    fn decode(self) -> Result<RoutingEntry, SqlitePoolStoreError> {
        Ok(RoutingEntry {
            routing_key: RoutingKey::parse(self.routing_key)
                .map_err(|err| SqlitePoolStoreError::Corrupt(err.to_string()))?,
            session_id: SessionId::new(self.session_id),
            upstream: UpstreamAddr::new(self.host, decode_port(self.port)?),
            created_at: Timestamp::from_unix_millis(self.created_at),
            updated_at: Timestamp::from_unix_millis(self.updated_at),
        })
    }
}

/// Raw decision log row before domain decoding.
struct DecisionRow {
    /// Store-assigned sequence number.
    seq: i64,
    /// Session id.
    session_id: String,
    /// Action label.
    action: String,
    /// Rule id.
    rule_id: String,
    /// Score before the decision.
    skill_score_before: Option<i64>,
    /// Score after the decision.
    skill_score_after: i64,
    /// Previous container id.
    from_container: Option<String>,
    /// New container id.
    to_container: Option<String>,
    /// Explanation text.
    explanation: String,
    /// Execution millis.
    logged_at: i64,
}

impl DecisionRow {
    /// Reads a decision row from a result row.
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            session_id: row.get(1)?,
            action: row.get(2)?,
            rule_id: row.get(3)?,
            skill_score_before: row.get(4)?,
            skill_score_after: row.get(5)?,
            from_container: row.get(6)?,
            to_container: row.get(7)?,
            explanation: row.get(8)?,
            logged_at: row.get(9)?,
        })
    }

    /// Decodes the raw row into a domain record.
    fn decode(self) -> Result<DecisionLogRecord, SqlitePoolStoreError> {
        let decode_score = |value: i64| {
            u8::try_from(value)
                .ok()
                .and_then(|raw| SkillScore::new(raw).ok())
                .ok_or_else(|| {
                    SqlitePoolStoreError::Corrupt(format!("skill score out of range: {value}"))
                })
        };
        Ok(DecisionLogRecord {
            seq: u64::try_from(self.seq).map_err(|_| {
                SqlitePoolStoreError::Corrupt(format!("sequence out of range: {}", self.seq))
            })?,
            entry: DecisionLogEntry {
                session_id: SessionId::new(self.session_id),
                action: self.action,
                rule_id: RuleId::new(self.rule_id),
                skill_score_before: self.skill_score_before.map(decode_score).transpose()?,
                skill_score_after: decode_score(self.skill_score_after)?,
                from_container: self.from_container.map(ContainerId::new),
                to_container: self.to_container.map(ContainerId::new),
                explanation: self.explanation,
                timestamp: Timestamp::from_unix_millis(self.logged_at),
            },
        })
    }
}

/// Decodes a numeric tier level.
fn decode_tier(value: i64) -> Result<Tier, SqlitePoolStoreError> {
    u8::try_from(value)
        .ok()
        .and_then(Tier::from_level)
        .ok_or_else(|| SqlitePoolStoreError::Corrupt(format!("tier level out of range: {value}")))
}

/// Decodes a stored port number.
fn decode_port(value: i64) -> Result<u16, SqlitePoolStoreError> {
    u16::try_from(value)
        .map_err(|_| SqlitePoolStoreError::Corrupt(format!("port out of range: {value}")))
}

// ============================================================================
// SECTION: Mutation Execution
// ============================================================================

/// Executes one mutation inside the batch transaction.
fn execute_mutation(
    tx: &Transaction<'_>,
    mutation: &StateMutation,
) -> Result<(), SqlitePoolStoreError> {
    match mutation {
        StateMutation::PutContainer(container) => {
            tx.execute(
                "INSERT OR REPLACE INTO containers
                    (id, tier, host, port, state, assigned_session, healthy,
                     last_health_check, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    container.id.as_str(),
                    container.tier.level(),
                    container.upstream.host,
                    container.upstream.port,
                    container.state.as_str(),
                    container.assigned_session.as_ref().map(SessionId::as_str),
                    i64::from(container.healthy),
                    container.last_health_check.map(Timestamp::as_unix_millis),
                    container.created_at.as_unix_millis(),
                    container.updated_at.as_unix_millis(),
                ],
            )
            .map_err(|err| db_err(&err))?;
        }
        StateMutation::PutSession(session) => {
            tx.execute(
                "INSERT OR REPLACE INTO sessions
                    (id, current_tier, container_id, state, skill_score,
                     escalation_count, created_at, updated_at, expires_at,
                     last_decision_ref)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    session.id.as_str(),
                    session.current_tier.level(),
                    session.container_id.as_ref().map(ContainerId::as_str),
                    session.state.as_str(),
                    session.skill_score.get(),
                    session.escalation_count,
                    session.created_at.as_unix_millis(),
                    session.updated_at.as_unix_millis(),
                    session.expires_at.map(Timestamp::as_unix_millis),
                    session.last_decision_ref.as_ref().map(DecisionRef::as_str),
                ],
            )
            .map_err(|err| db_err(&err))?;
        }
        StateMutation::UpsertRouting(entry) => {
            tx.execute(
                "INSERT OR REPLACE INTO routing_entries
                    (session_id, routing_key, host, port, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.session_id.as_str(),
                    entry.routing_key.as_str(),
                    entry.upstream.host,
                    entry.upstream.port,
                    entry.created_at.as_unix_millis(),
                    entry.updated_at.as_unix_millis(),
                ],
            )
            .map_err(|err| db_err(&err))?;
        }
        StateMutation::RemoveRouting(session_id) => {
            tx.execute(
                "DELETE FROM routing_entries WHERE session_id = ?1",
                params![session_id.as_str()],
            )
            .map_err(|err| db_err(&err))?;
        }
        StateMutation::AppendDecision(entry) => {
            tx.execute(
                "INSERT INTO decision_log
                    (session_id, action, rule_id, skill_score_before,
                     skill_score_after, from_container, to_container,
                     explanation, logged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.session_id.as_str(),
                    entry.action,
                    entry.rule_id.as_str(),
                    entry.skill_score_before.map(SkillScore::get),
                    entry.skill_score_after.get(),
                    entry.from_container.as_ref().map(ContainerId::as_str),
                    entry.to_container.as_ref().map(ContainerId::as_str),
                    entry.explanation,
                    entry.timestamp.as_unix_millis(),
                ],
            )
            .map_err(|err| db_err(&err))?;
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: PoolStore Implementation
// ============================================================================

/// Column list shared by every container query.
const CONTAINER_COLUMNS: &str = "id, tier, host, port, state, assigned_session, healthy, \
                                 last_health_check, created_at, updated_at";

/// Column list shared by every session query.
const SESSION_COLUMNS: &str = "id, current_tier, container_id, state, skill_score, \
                               escalation_count, created_at, updated_at, expires_at, \
                               last_decision_ref";

impl SqlitePoolStore {
    /// Runs a container query and decodes every row.
    fn query_containers(
        &self,
        sql: &str,
        bind: impl rusqlite::Params,
    ) -> Result<Vec<Container>, SqlitePoolStoreError> {
        let guard = self.conn();
        let mut statement = guard.prepare_cached(sql).map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(bind, ContainerRow::read)
            .map_err(|err| db_err(&err))?;
        let mut containers = Vec::new();
        for row in rows {
            containers.push(row.map_err(|err| db_err(&err))?.decode()?);
        }
        Ok(containers)
    }

    /// Runs a session query and decodes every row.
    fn query_sessions(
        &self,
        sql: &str,
        bind: impl rusqlite::Params,
    ) -> Result<Vec<Session>, SqlitePoolStoreError> {
        let guard = self.conn();
        let mut statement = guard.prepare_cached(sql).map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(bind, SessionRow::read)
            .map_err(|err| db_err(&err))?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row.map_err(|err| db_err(&err))?.decode()?);
        }
        Ok(sessions)
    }
}

impl PoolStore for SqlitePoolStore {
    fn container(&self, id: &ContainerId) -> Result<Option<Container>, StoreError> {
        let sql = format!("SELECT {CONTAINER_COLUMNS} FROM containers WHERE id = ?1");
        let mut containers = self.query_containers(&sql, params![id.as_str()])?;
        Ok(containers.pop())
    }

    fn containers(&self) -> Result<Vec<Container>, StoreError> {
        let sql = format!("SELECT {CONTAINER_COLUMNS} FROM containers ORDER BY id");
        Ok(self.query_containers(&sql, params![])?)
    }

    fn idle_containers(&self, tier: Tier) -> Result<Vec<Container>, StoreError> {
        let sql = format!(
            "SELECT {CONTAINER_COLUMNS} FROM containers
             WHERE tier = ?1 AND state = 'idle' AND healthy = 1
             ORDER BY id"
        );
        Ok(self.query_containers(&sql, params![tier.level()])?)
    }

    fn session(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let mut sessions = self.query_sessions(&sql, params![id.as_str()])?;
        Ok(sessions.pop())
    }

    fn sessions(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
        let clause = match filter {
            SessionFilter::All => "",
            SessionFilter::Active => "WHERE state = 'active'",
            SessionFilter::Terminal => "WHERE state IN ('released', 'expired')",
        };
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions {clause} ORDER BY id");
        Ok(self.query_sessions(&sql, params![])?)
    }

    fn expired_sessions(&self, now: Timestamp) -> Result<Vec<Session>, StoreError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE state = 'active' AND expires_at IS NOT NULL AND expires_at < ?1
             ORDER BY id"
        );
        Ok(self.query_sessions(&sql, params![now.as_unix_millis()])?)
    }

    fn routing_entry(&self, session_id: &SessionId) -> Result<Option<RoutingEntry>, StoreError> {
        let guard = self.conn();
        let mut statement = guard
            .prepare_cached(
                "SELECT session_id, routing_key, host, port, created_at, updated_at
                 FROM routing_entries WHERE session_id = ?1",
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let row = statement
            .query_row(params![session_id.as_str()], RoutingRow::read)
            .optional()
            .map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(row.map(RoutingRow::decode).transpose()?)
    }

    fn routing_entries(&self) -> Result<Vec<RoutingEntry>, StoreError> {
        let guard = self.conn();
        let mut statement = guard
            .prepare_cached(
                "SELECT session_id, routing_key, host, port, created_at, updated_at
                 FROM routing_entries ORDER BY session_id",
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let rows = statement
            .query_map(params![], RoutingRow::read)
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|err| StoreError::from(db_err(&err)))?.decode()?);
        }
        Ok(entries)
    }

    fn decision_log(&self, session_id: &SessionId) -> Result<Vec<DecisionLogRecord>, StoreError> {
        let guard = self.conn();
        let mut statement = guard
            .prepare_cached(
                "SELECT seq, session_id, action, rule_id, skill_score_before,
                        skill_score_after, from_container, to_container,
                        explanation, logged_at
                 FROM decision_log WHERE session_id = ?1 ORDER BY seq",
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let rows = statement
            .query_map(params![session_id.as_str()], DecisionRow::read)
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|err| StoreError::from(db_err(&err)))?.decode()?);
        }
        Ok(records)
    }

    fn tier_counts(&self, tier: Tier) -> Result<TierCounts, StoreError> {
        let guard = self.conn();
        let counts = guard
            .query_row(
                "SELECT COUNT(1),
                        COALESCE(SUM(CASE WHEN state = 'idle' AND healthy = 1 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN assigned_session IS NOT NULL THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN healthy = 0 THEN 1 ELSE 0 END), 0)
                 FROM containers WHERE tier = ?1",
                params![tier.level()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .map_err(|err| StoreError::from(db_err(&err)))?;
        let to_count = |value: i64| {
            usize::try_from(value).map_err(|_| {
                StoreError::from(SqlitePoolStoreError::Corrupt(format!(
                    "count out of range: {value}"
                )))
            })
        };
        Ok(TierCounts {
            total: to_count(counts.0)?,
            idle: to_count(counts.1)?,
            assigned: to_count(counts.2)?,
            unhealthy: to_count(counts.3)?,
        })
    }

    fn apply(&self, mutations: &[StateMutation]) -> Result<(), StoreError> {
        let mut guard = self.conn();
        let tx = guard.transaction().map_err(|err| StoreError::from(db_err(&err)))?;
        for mutation in mutations {
            execute_mutation(&tx, mutation)?;
        }
        tx.commit().map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(())
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.conn();
        guard
            .query_row("SELECT 1", params![], |row| row.get::<_, i64>(0))
            .map_err(|err| StoreError::from(db_err(&err)))?;
        Ok(())
    }
}
