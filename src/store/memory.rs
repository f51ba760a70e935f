use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::engine::errors::StoreError;
use crate::engine::plan::{KeyBound, KeyRange};
use crate::engine::types::{Value, compare_key_prefix};
use crate::shared::config::options::DEFAULT_DATABASE;
use crate::store::{
    AlterOperation, ColumnDescription, EntryKind, INDEX_IMPL_TABLE, ReadStream, ReadTableRequest,
    ResultBlock, SchemeEntry, Session, Status, StatusCode, StoreClient, TableDescription,
};

const LOG_TARGET: &str = "kvscan::store::memory";
const DEFAULT_BLOCK_SIZE: usize = 1000;
const DEFAULT_OWNER: &str = "root@builtin";
const GATE_POLL: Duration = Duration::from_millis(20);
const PATH_EXISTS_ISSUE: &str = "Check failed: path exist, request accepts it";

/// Faults injected into sessions and streams opened after they are set.
#[derive(Debug, Clone, Default)]
pub struct MemoryFaults {
    /// Session creation fails with this status.
    pub fail_session: Option<Status>,
    /// Opening a range read fails with this status.
    pub fail_read: Option<Status>,
    /// The stream completes with this status instead of delivering block N.
    pub fail_after_blocks: Option<(usize, Status)>,
    /// Odd-numbered blocks carry their columns in reverse order.
    pub reverse_odd_blocks: bool,
    /// Blocks from N onwards lose their last column.
    pub drop_column_after_blocks: Option<usize>,
    /// Blocks from N onwards report their first column under another name.
    pub rename_column_after_blocks: Option<usize>,
    /// The stream waits for a token on the receiver before block N (or the
    /// fault scheduled at N) and keeps observing cancellation meanwhile.
    pub gate_before_block: Option<(usize, Receiver<()>)>,
    pub block_delay: Option<Duration>,
}

/// An in-process ordered store: directories, tables with sorted rows split
/// into shards, secondary indexes, sessions with TTL and streaming reads.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    database: String,
    owner: String,
    state: Mutex<MemoryState>,
    faults: Mutex<MemoryFaults>,
    block_size: AtomicUsize,
    next_session: AtomicU64,
    session_epoch: AtomicU64,
    open_sessions: AtomicUsize,
    active_streams: AtomicUsize,
    cancelled_streams: AtomicUsize,
    requests: Mutex<Vec<(String, ReadTableRequest)>>,
}

#[derive(Default)]
struct MemoryState {
    directories: BTreeSet<String>,
    tables: BTreeMap<String, MemoryTable>,
}

struct MemoryTable {
    description: TableDescription,
    rows: Vec<Vec<Value>>,
    split_points: Vec<Vec<Value>>,
}

impl MemoryTable {
    fn key_positions(&self) -> Vec<usize> {
        key_positions(&self.description.columns, &self.description.primary_key)
    }

    fn partitions(&self) -> Vec<KeyRange> {
        let mut partitions = Vec::with_capacity(self.split_points.len() + 1);
        let mut from = KeyBound::unrestricted();
        for point in &self.split_points {
            partitions.push(KeyRange::new(from, KeyBound::exclusive(point.clone())));
            from = KeyBound::inclusive(point.clone());
        }
        partitions.push(KeyRange::new(from, KeyBound::unrestricted()));
        partitions
    }
}

fn key_positions(columns: &[ColumnDescription], key: &[String]) -> Vec<usize> {
    key.iter()
        .filter_map(|k| columns.iter().position(|c| &c.name == k))
        .collect()
}

fn row_key(row: &[Value], positions: &[usize]) -> Vec<Value> {
    positions.iter().map(|&p| row[p].clone()).collect()
}

fn scheme_error(context: &str, path: &str) -> StoreError {
    StoreError::new(
        context,
        Status::new(StatusCode::SchemeError, format!("Path not found: {path}")),
    )
}

fn parent_path(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_database(DEFAULT_DATABASE)
    }

    pub fn with_database(database: &str) -> Self {
        let database = database.trim_end_matches('/').to_string();
        let mut state = MemoryState::default();
        state.directories.insert(database.clone());
        Self {
            inner: Arc::new(MemoryInner {
                database,
                owner: DEFAULT_OWNER.to_string(),
                state: Mutex::new(state),
                faults: Mutex::new(MemoryFaults::default()),
                block_size: AtomicUsize::new(DEFAULT_BLOCK_SIZE),
                next_session: AtomicU64::new(1),
                session_epoch: AtomicU64::new(0),
                open_sessions: AtomicUsize::new(0),
                active_streams: AtomicUsize::new(0),
                cancelled_streams: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn database(&self) -> &str {
        &self.inner.database
    }

    /// Rows per result block for streams opened from now on.
    pub fn set_block_size(&self, rows: usize) {
        self.inner.block_size.store(rows.max(1), Ordering::SeqCst);
    }

    pub fn set_faults(&self, faults: MemoryFaults) {
        *self.inner.faults.lock() = faults;
    }

    pub fn clear_faults(&self) {
        self.set_faults(MemoryFaults::default());
    }

    /// Upserts rows given in table column order, keeping rows sorted by key.
    pub fn insert_rows(&self, path: &str, rows: Vec<Vec<Value>>) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock();
        let table = state
            .tables
            .get_mut(path)
            .ok_or_else(|| scheme_error("insert rows", path))?;
        let width = table.description.columns.len();
        let positions = table.key_positions();
        for row in rows {
            if row.len() != width {
                return Err(StoreError::new(
                    "insert rows",
                    Status::new(
                        StatusCode::BadRequest,
                        format!("Expected {width} values, got {}", row.len()),
                    ),
                ));
            }
            let key = row_key(&row, &positions);
            let found = table
                .rows
                .binary_search_by(|probe| compare_key_prefix(&row_key(probe, &positions), &key));
            match found {
                Ok(idx) => table.rows[idx] = row,
                Err(idx) => table.rows.insert(idx, row),
            }
        }
        Ok(())
    }

    /// Splits the table into shards at the given keys; each point starts a shard.
    pub fn set_split_points(&self, path: &str, mut points: Vec<Vec<Value>>) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock();
        let table = state
            .tables
            .get_mut(path)
            .ok_or_else(|| scheme_error("split table", path))?;
        points.sort_by(|a, b| compare_key_prefix(a, b).then(a.len().cmp(&b.len())));
        points.dedup();
        table.split_points = points;
        Ok(())
    }

    pub fn row_count(&self, path: &str) -> Option<usize> {
        self.inner.state.lock().tables.get(path).map(|t| t.rows.len())
    }

    /// Expires every session created so far.
    pub fn expire_sessions(&self) {
        self.inner.session_epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    /// Streams currently between start and completion.
    pub fn active_streams(&self) -> usize {
        self.inner.active_streams.load(Ordering::SeqCst)
    }

    pub fn cancelled_streams(&self) -> usize {
        self.inner.cancelled_streams.load(Ordering::SeqCst)
    }

    /// Every range read opened so far, with its table path.
    pub fn read_requests(&self) -> Vec<(String, ReadTableRequest)> {
        self.inner.requests.lock().clone()
    }

    fn entry(&self, name: &str, kind: EntryKind) -> SchemeEntry {
        SchemeEntry {
            name: name.to_string(),
            kind,
            owner: self.inner.owner.clone(),
        }
    }

    /// Columns, key and rows of a table or of an index pseudo-table.
    fn snapshot(&self, path: &str) -> Option<(TableDescription, Vec<Vec<Value>>)> {
        let state = self.inner.state.lock();
        if let Some(table) = state.tables.get(path) {
            let mut description = table.description.clone();
            description.partitions = table.partitions();
            return Some((description, table.rows.clone()));
        }
        if base_name(path) != INDEX_IMPL_TABLE {
            return None;
        }
        let index_dir = parent_path(path);
        let index_name = base_name(index_dir);
        let table = state.tables.get(parent_path(index_dir))?;
        let index = table.description.index(index_name)?;

        let mut key: Vec<String> = index.columns.clone();
        for pk in &table.description.primary_key {
            if !key.contains(pk) {
                key.push(pk.clone());
            }
        }
        let columns: Vec<ColumnDescription> = key
            .iter()
            .filter_map(|k| table.description.column(k).cloned())
            .collect();
        let positions = key_positions(&table.description.columns, &key);
        let mut rows: Vec<Vec<Value>> = table.rows.iter().map(|r| row_key(r, &positions)).collect();
        rows.sort_by(|a, b| compare_key_prefix(a, b));

        let description = TableDescription {
            columns,
            primary_key: key,
            partitions: vec![KeyRange::unrestricted()],
            indexes: Vec::new(),
            properties: BTreeMap::new(),
        };
        Some((description, rows))
    }
}

impl StoreClient for MemoryStore {
    fn create_session(&self, ttl: Duration) -> Result<Arc<dyn Session>, StoreError> {
        if let Some(status) = self.inner.faults.lock().fail_session.clone() {
            return Err(StoreError::new("create session", status));
        }
        let expires_at = Instant::now().checked_add(ttl).ok_or_else(|| {
            StoreError::new(
                "create session",
                Status::new(
                    StatusCode::BadRequest,
                    format!("Session TTL out of range: {}s", ttl.as_secs()),
                ),
            )
        })?;
        let id = self.inner.next_session.fetch_add(1, Ordering::SeqCst);
        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        debug!(target: LOG_TARGET, session = id, ttl_secs = ttl.as_secs(), "Session created");
        Ok(Arc::new(MemorySession {
            id,
            store: self.clone(),
            lease: Arc::new(SessionLease {
                expires_at,
                epoch: self.inner.session_epoch.load(Ordering::SeqCst),
                closed: AtomicBool::new(false),
            }),
        }))
    }

    fn describe_table(&self, path: &str) -> Result<TableDescription, StoreError> {
        self.snapshot(path)
            .map(|(description, _)| description)
            .ok_or_else(|| scheme_error("describe table", path))
    }

    fn list_directory(&self, path: &str) -> Result<Vec<SchemeEntry>, StoreError> {
        let path = path.trim_end_matches('/');
        let state = self.inner.state.lock();
        if !state.directories.contains(path) {
            return Err(scheme_error("list directory", path));
        }
        let mut entries: Vec<SchemeEntry> = state
            .directories
            .iter()
            .filter(|d| d.as_str() != path && parent_path(d) == path)
            .map(|d| self.entry(base_name(d), EntryKind::Directory))
            .collect();
        entries.extend(
            state
                .tables
                .keys()
                .filter(|t| parent_path(t) == path)
                .map(|t| self.entry(base_name(t), EntryKind::Table)),
        );
        Ok(entries)
    }

    fn describe_path(&self, path: &str) -> Result<SchemeEntry, StoreError> {
        let path = path.trim_end_matches('/');
        let state = self.inner.state.lock();
        if path == self.inner.database {
            return Ok(self.entry(base_name(path), EntryKind::Database));
        }
        if state.directories.contains(path) {
            return Ok(self.entry(base_name(path), EntryKind::Directory));
        }
        if state.tables.contains_key(path) {
            return Ok(self.entry(base_name(path), EntryKind::Table));
        }
        Err(scheme_error("describe path", path))
    }

    fn make_directory(&self, path: &str) -> Result<Status, StoreError> {
        let path = path.trim_end_matches('/');
        let mut state = self.inner.state.lock();
        if state.tables.contains_key(path) {
            return Err(StoreError::new(
                "make directory",
                Status::new(StatusCode::SchemeError, format!("Path is a table: {path}")),
            ));
        }
        if state.directories.contains(path) {
            return Ok(Status::with_issues(
                StatusCode::Success,
                vec![PATH_EXISTS_ISSUE.to_string()],
            ));
        }
        let mut current = path;
        while current.len() > 1 && current.starts_with(&self.inner.database) {
            state.directories.insert(current.to_string());
            current = parent_path(current);
        }
        info!(target: LOG_TARGET, path, "Directory created");
        Ok(Status::success())
    }

    fn remove_directory(&self, path: &str) -> Result<(), StoreError> {
        let path = path.trim_end_matches('/');
        let mut state = self.inner.state.lock();
        if !state.directories.contains(path) || path == self.inner.database {
            return Err(scheme_error("remove directory", path));
        }
        let has_children = state.directories.iter().any(|d| parent_path(d) == path && d != path)
            || state.tables.keys().any(|t| parent_path(t) == path);
        if has_children {
            return Err(StoreError::new(
                "remove directory",
                Status::new(
                    StatusCode::PreconditionFailed,
                    format!("Directory is not empty: {path}"),
                ),
            ));
        }
        state.directories.remove(path);
        Ok(())
    }

    fn create_table(&self, path: &str, description: &TableDescription) -> Result<(), StoreError> {
        let bad_request = |msg: String| {
            StoreError::new("create table", Status::new(StatusCode::BadRequest, msg))
        };
        if description.primary_key.is_empty() {
            return Err(bad_request(format!("No primary key for table {path}")));
        }
        for key in &description.primary_key {
            if description.column(key).is_none() {
                return Err(bad_request(format!("Unknown key column {key}")));
            }
        }
        for index in &description.indexes {
            if let Some(missing) = index.columns.iter().find(|c| description.column(c).is_none()) {
                return Err(bad_request(format!("Unknown index column {missing}")));
            }
        }
        self.make_directory(parent_path(path))?;

        let mut state = self.inner.state.lock();
        if state.tables.contains_key(path) || state.directories.contains(path) {
            return Err(StoreError::new(
                "create table",
                Status::new(StatusCode::AlreadyExists, format!("Path exists: {path}")),
            ));
        }
        let mut stored = description.clone();
        stored.partitions.clear();
        state.tables.insert(
            path.to_string(),
            MemoryTable {
                description: stored,
                rows: Vec::new(),
                split_points: Vec::new(),
            },
        );
        info!(target: LOG_TARGET, path, "Table created");
        Ok(())
    }

    fn alter_table(&self, path: &str, operations: &[AlterOperation]) -> Result<(), StoreError> {
        let bad_request = |msg: String| {
            StoreError::new("alter table", Status::new(StatusCode::BadRequest, msg))
        };
        let mut state = self.inner.state.lock();
        let table = state
            .tables
            .get_mut(path)
            .ok_or_else(|| scheme_error("alter table", path))?;

        for operation in operations {
            match operation {
                AlterOperation::AddColumn(column) => {
                    if table.description.column(&column.name).is_some() {
                        return Err(bad_request(format!("Column exists: {}", column.name)));
                    }
                    table.description.columns.push(column.clone());
                    for row in &mut table.rows {
                        row.push(Value::null());
                    }
                }
                AlterOperation::DropColumn(name) => {
                    if table.description.primary_key.contains(name) {
                        return Err(bad_request(format!("Cannot drop key column {name}")));
                    }
                    let idx = table
                        .description
                        .columns
                        .iter()
                        .position(|c| &c.name == name)
                        .ok_or_else(|| bad_request(format!("Unknown column {name}")))?;
                    table.description.columns.remove(idx);
                    for row in &mut table.rows {
                        row.remove(idx);
                    }
                }
                AlterOperation::SetProperty { key, value } => {
                    table.description.properties.insert(key.clone(), value.clone());
                }
                AlterOperation::RemoveProperty(key) => {
                    table.description.properties.remove(key);
                }
            }
        }
        Ok(())
    }

    fn drop_table(&self, path: &str) -> Result<(), StoreError> {
        let removed = self.inner.state.lock().tables.remove(path);
        match removed {
            Some(_) => {
                info!(target: LOG_TARGET, path, "Table dropped");
                Ok(())
            }
            None => Err(scheme_error("drop table", path)),
        }
    }

    fn rename_table(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock();
        if state.tables.contains_key(to) || state.directories.contains(to) {
            return Err(StoreError::new(
                "rename table",
                Status::new(StatusCode::AlreadyExists, format!("Path exists: {to}")),
            ));
        }
        let table = state
            .tables
            .remove(from)
            .ok_or_else(|| scheme_error("rename table", from))?;
        state.tables.insert(to.to_string(), table);
        Ok(())
    }
}

struct SessionLease {
    expires_at: Instant,
    epoch: u64,
    closed: AtomicBool,
}

impl SessionLease {
    fn check(&self, store: &MemoryInner) -> Result<(), Status> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Status::new(StatusCode::BadRequest, "Session is closed"));
        }
        if Instant::now() >= self.expires_at
            || store.session_epoch.load(Ordering::SeqCst) > self.epoch
        {
            return Err(Status::new(StatusCode::SessionExpired, "Session expired"));
        }
        Ok(())
    }
}

struct MemorySession {
    id: u64,
    store: MemoryStore,
    lease: Arc<SessionLease>,
}

impl Session for MemorySession {
    fn id(&self) -> u64 {
        self.id
    }

    fn read_table(
        &self,
        path: &str,
        request: ReadTableRequest,
    ) -> Result<Arc<dyn ReadStream>, StoreError> {
        let inner = &self.store.inner;
        inner.requests.lock().push((path.to_string(), request.clone()));
        self.lease
            .check(inner)
            .map_err(|status| StoreError::new("read table", status))?;
        let faults = inner.faults.lock().clone();
        if let Some(status) = faults.fail_read.clone() {
            return Err(StoreError::new("read table", status));
        }

        let (description, rows) = self
            .store
            .snapshot(path)
            .ok_or_else(|| scheme_error("read table", path))?;
        if request.columns.is_empty() {
            return Err(StoreError::new(
                "read table",
                Status::new(StatusCode::BadRequest, "No columns requested"),
            ));
        }
        let mut projection = Vec::with_capacity(request.columns.len());
        for name in &request.columns {
            let idx = description
                .columns
                .iter()
                .position(|c| &c.name == name)
                .ok_or_else(|| {
                    StoreError::new(
                        "read table",
                        Status::new(StatusCode::SchemeError, format!("Unknown column {name}")),
                    )
                })?;
            projection.push(idx);
        }

        let range = KeyRange::new(
            request
                .from_key
                .as_ref()
                .map(|b| KeyBound::new(b.key.clone(), b.inclusive))
                .unwrap_or_else(KeyBound::unrestricted),
            request
                .to_key
                .as_ref()
                .map(|b| KeyBound::new(b.key.clone(), b.inclusive))
                .unwrap_or_else(KeyBound::unrestricted),
        );
        let positions = key_positions(&description.columns, &description.primary_key);
        let limit = request.row_limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let selected: Vec<Vec<Value>> = rows
            .iter()
            .filter(|row| range.contains(&row_key(row, &positions)))
            .take(limit)
            .map(|row| projection.iter().map(|&i| row[i].clone()).collect())
            .collect();

        let block_size = inner.block_size.load(Ordering::SeqCst);
        let blocks: Vec<Vec<Vec<Value>>> = selected.chunks(block_size).map(|c| c.to_vec()).collect();
        debug!(
            target: LOG_TARGET,
            session = self.id,
            path,
            range = %range,
            rows = selected.len(),
            blocks = blocks.len(),
            "Range read opened"
        );

        Ok(Arc::new(MemoryReadStream {
            store: self.store.clone(),
            lease: Arc::clone(&self.lease),
            columns: request.columns,
            blocks: Mutex::new(Some(blocks)),
            faults,
            cancelled: AtomicBool::new(false),
        }))
    }

    fn close(&self) {
        if !self.lease.closed.swap(true, Ordering::SeqCst) {
            self.store.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
            debug!(target: LOG_TARGET, session = self.id, "Session closed");
        }
    }
}

struct MemoryReadStream {
    store: MemoryStore,
    lease: Arc<SessionLease>,
    columns: Vec<String>,
    blocks: Mutex<Option<Vec<Vec<Vec<Value>>>>>,
    faults: MemoryFaults,
    cancelled: AtomicBool,
}

struct ActiveStream<'a>(&'a AtomicUsize);

impl<'a> ActiveStream<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveStream<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryReadStream {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Blocks until the gate releases block `n`. Returns false when the
    /// stream was cancelled while waiting.
    fn pass_gate(&self, n: usize) -> bool {
        let Some((at, gate)) = &self.faults.gate_before_block else {
            return true;
        };
        if *at != n {
            return true;
        }
        loop {
            if self.is_cancelled() {
                return false;
            }
            match gate.recv_timeout(GATE_POLL) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => continue,
            }
        }
    }

    fn scheduled_failure(&self, n: usize) -> Option<Status> {
        match &self.faults.fail_after_blocks {
            Some((at, status)) if *at == n => Some(status.clone()),
            _ => None,
        }
    }

    fn shape_block(&self, n: usize, mut rows: Vec<Vec<Value>>) -> ResultBlock {
        let mut columns = self.columns.clone();
        if self.faults.reverse_odd_blocks && n % 2 == 1 {
            columns.reverse();
            for row in &mut rows {
                row.reverse();
            }
        }
        if self.faults.drop_column_after_blocks.is_some_and(|at| n >= at) {
            columns.pop();
            for row in &mut rows {
                row.pop();
            }
        }
        if self.faults.rename_column_after_blocks.is_some_and(|at| n >= at) {
            if let Some(first) = columns.first_mut() {
                first.push_str("_renamed");
            }
        }
        ResultBlock::new(columns, rows)
    }
}

impl ReadStream for MemoryReadStream {
    fn start(&self, sink: &mut dyn FnMut(ResultBlock) -> ControlFlow<()>) -> Status {
        let Some(blocks) = self.blocks.lock().take() else {
            return Status::new(StatusCode::BadRequest, "Stream already started");
        };
        let _active = ActiveStream::enter(&self.store.inner.active_streams);
        let total = blocks.len();

        for (n, rows) in blocks.into_iter().enumerate() {
            if !self.pass_gate(n) || self.is_cancelled() {
                return Status::cancelled();
            }
            if let Err(status) = self.lease.check(&self.store.inner) {
                return status;
            }
            if let Some(status) = self.scheduled_failure(n) {
                return status;
            }
            if let Some(delay) = self.faults.block_delay {
                std::thread::sleep(delay);
            }
            if sink(self.shape_block(n, rows)).is_break() {
                return Status::cancelled();
            }
        }

        if !self.pass_gate(total) || self.is_cancelled() {
            return Status::cancelled();
        }
        self.scheduled_failure(total).unwrap_or_else(Status::success)
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.store
                .inner
                .cancelled_streams
                .fetch_add(1, Ordering::SeqCst);
        }
    }
}
