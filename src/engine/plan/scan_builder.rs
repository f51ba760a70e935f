use arrow_schema::{Field, Schema};
use tracing::{debug, info};

use crate::engine::expr::Expr;
use crate::engine::plan::{KeyRange, RangePlanner, ScanOptions};
use crate::engine::types::StoreType;
use crate::shared::config::ConnectorOptions;
use crate::store::TableDescription;

const LOG_TARGET: &str = "kvscan::plan::builder";

/// What a scan reads: one table (or index pseudo-table) as described at
/// planning time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanTarget {
    pub name: String,
    pub path: String,
    pub schema: Schema,
    pub key_columns: Vec<String>,
    pub key_types: Vec<StoreType>,
    pub partitions: Vec<KeyRange>,
}

impl ScanTarget {
    /// A target for a table or index pseudo-table as the store describes it.
    pub fn from_description(
        name: impl Into<String>,
        path: impl Into<String>,
        description: &TableDescription,
    ) -> Self {
        let fields: Vec<Field> = description
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.store_type.to_arrow(), c.store_type.is_optional()))
            .collect();
        let key_types = description
            .primary_key
            .iter()
            .filter_map(|k| description.column(k).map(|c| c.store_type.clone()))
            .collect();
        Self {
            name: name.into(),
            path: path.into(),
            schema: Schema::new(fields),
            key_columns: description.primary_key.clone(),
            key_types,
            partitions: description.partitions.clone(),
        }
    }
}

/// Collects what the engine pushes down into a scan, then freezes it into
/// [`ScanOptions`].
pub struct ScanBuilder {
    target: ScanTarget,
    options: ConnectorOptions,
    predicates: Vec<Expr>,
    out_schema: Option<Schema>,
    row_limit: Option<u64>,
}

impl ScanBuilder {
    pub fn new(target: ScanTarget, options: ConnectorOptions) -> Self {
        Self {
            target,
            options,
            predicates: Vec::new(),
            out_schema: None,
            row_limit: None,
        }
    }

    /// Accepts pushed-down predicates and returns the ones the engine must
    /// still evaluate. The key range is an over-approximation, so that is
    /// all of them.
    pub fn setup_predicates(&mut self, predicates: Vec<Expr>) -> Vec<Expr> {
        debug!(
            target: LOG_TARGET,
            table = %self.target.name,
            count = predicates.len(),
            "Predicates pushed down"
        );
        self.predicates = predicates;
        self.predicates.clone()
    }

    pub fn pushed_predicates(&self) -> &[Expr] {
        &self.predicates
    }

    pub fn prune_columns(&mut self, out_schema: Schema) {
        self.out_schema = Some(out_schema);
    }

    /// Zero clears the limit.
    pub fn set_row_limit(&mut self, limit: u64) -> bool {
        self.row_limit = (limit > 0).then_some(limit);
        true
    }

    pub fn build(self) -> ScanOptions {
        let planned = RangePlanner::new(&self.target.key_columns).plan(&self.predicates);
        let out_schema = self
            .out_schema
            .unwrap_or_else(|| self.target.schema.clone());
        let options = ScanOptions {
            connection: self.options.connection_snapshot(),
            table_name: self.target.name,
            table_path: self.target.path,
            actual_schema: self.target.schema,
            out_schema,
            key_columns: self.target.key_columns,
            key_types: self.target.key_types,
            planned,
            partitions: self.target.partitions,
            queue_depth: self.options.queue_depth(),
            session_seconds: self.options.session_seconds(),
            row_limit: self.row_limit,
        };
        info!(
            target: LOG_TARGET,
            table = %options.table_name,
            partitions = options.partitions.len(),
            columns = ?options.out_columns(),
            range = %options.planned_range(),
            row_limit = ?options.row_limit,
            "Scan planned"
        );
        options
    }
}
