use std::sync::Arc;
use std::time::Duration;

use arrow_schema::{Field, Schema};

use super::table_factory::TableFactory;
use crate::driver::Connector;
use crate::engine::expr::Expr;
use crate::engine::plan::{ScanBuilder, ScanOptions, ScanTarget, ShardPartition};
use crate::engine::scan::{ReaderSettings, StreamingShardReader};
use crate::shared::config::ConnectorOptions;
use crate::store::{MemoryStore, StoreClient};

/// Short waits so that tests never sit on the configured poll interval.
pub fn fast_reader_settings() -> ReaderSettings {
    ReaderSettings {
        poll_interval: Duration::from_millis(5),
        drain_pause: Duration::from_millis(2),
        request_timeout: Duration::from_secs(60),
    }
}

/// Builds shard readers over a table inside a [`MemoryStore`]. Defaults to
/// 30 sequential `orders` rows delivered in blocks of 10.
pub struct ReaderFactory {
    store: MemoryStore,
    table: TableFactory,
    block_size: usize,
    options: ConnectorOptions,
    projection: Option<Vec<String>>,
    predicates: Vec<Expr>,
    row_limit: u64,
}

impl ReaderFactory {
    pub fn new(store: &MemoryStore) -> Self {
        Self {
            store: store.clone(),
            table: TableFactory::new().with_sequential_rows(30),
            block_size: 10,
            options: ConnectorOptions::new(),
            projection: None,
            predicates: Vec::new(),
            row_limit: 0,
        }
    }

    pub fn with_table(mut self, table: TableFactory) -> Self {
        self.table = table;
        self
    }

    pub fn with_block_size(mut self, rows: usize) -> Self {
        self.block_size = rows;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.options.set("scan.queue.depth", depth.to_string());
        self
    }

    pub fn with_projection(mut self, columns: &[&str]) -> Self {
        self.projection = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_predicates(mut self, predicates: Vec<Expr>) -> Self {
        self.predicates = predicates;
        self
    }

    pub fn with_row_limit(mut self, limit: u64) -> Self {
        self.row_limit = limit;
        self
    }

    pub fn options(self) -> Arc<ScanOptions> {
        let path = self.table.path(&self.store);
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        self.table.create(&self.store);
        self.store.set_block_size(self.block_size);

        let description = self.store.describe_table(&path).expect("describe table");
        let target = ScanTarget::from_description(name, path, &description);
        let mut builder = ScanBuilder::new(target.clone(), self.options);
        builder.setup_predicates(self.predicates);
        if let Some(columns) = self.projection {
            let fields: Vec<Field> = columns
                .iter()
                .map(|c| {
                    target
                        .schema
                        .field_with_name(c)
                        .expect("projected column exists")
                        .clone()
                })
                .collect();
            builder.prune_columns(Schema::new(fields));
        }
        builder.set_row_limit(self.row_limit);
        Arc::new(builder.build())
    }

    pub fn partitions(self) -> Vec<ShardPartition> {
        self.options().plan_partitions()
    }

    pub fn connector(store: &MemoryStore, options: &ScanOptions) -> Arc<Connector> {
        Arc::new(Connector::new(
            options.connection().clone(),
            Arc::new(store.clone()),
        ))
    }

    pub fn reader_for(store: &MemoryStore, partition: ShardPartition) -> StreamingShardReader {
        let connector = Self::connector(store, partition.options());
        StreamingShardReader::new(partition, connector).with_settings(fast_reader_settings())
    }

    /// A reader over the first partition.
    pub fn create(self) -> StreamingShardReader {
        let store = self.store.clone();
        let partition = self
            .partitions()
            .into_iter()
            .next()
            .expect("at least one partition");
        Self::reader_for(&store, partition)
    }
}
