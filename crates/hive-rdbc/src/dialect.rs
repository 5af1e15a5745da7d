//! ARP dialect descriptors
//!
//! A dialect is described by a packaged YAML definition (metadata, syntax
//! rules, type mappings, pushdown capabilities). Definitions are bundled into
//! the binary and resolved by logical path.
//!
//! - DialectDescriptor: immutable, parsed definition
//! - DialectCell: load-once, cache-forever holder shared by all sources
//! - SqlDialect: the few SQL rendering rules callers need from a descriptor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Logical path of the bundled Hive dialect definition
pub const HIVE_ARP_FILENAME: &str = "arp/implementation/hivejdbc-arp.yaml";

/// Definitions packaged with this crate, keyed by logical path
const BUNDLED_RESOURCES: &[(&str, &str)] = &[(
    HIVE_ARP_FILENAME,
    include_str!("../resources/arp/implementation/hivejdbc-arp.yaml"),
)];

/// Look up a packaged definition by logical path
pub fn bundled_resource(path: &str) -> Option<&'static str> {
    BUNDLED_RESOURCES
        .iter()
        .find(|(name, _)| *name == path)
        .map(|(_, content)| *content)
}

/// SQL rendering rules exposed by a dialect
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &str;

    /// Quote an identifier (table, column name)
    fn quote_identifier(&self, name: &str) -> String;

    /// Render LIMIT/OFFSET; `None` when the combination cannot be pushed down
    fn limit_offset_sql(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String>;

    /// Get the boolean literal
    fn boolean_literal(&self, value: bool) -> &'static str;

    /// Whether three-part names (catalog.schema.table) are supported
    fn supports_catalogs(&self) -> bool;

    /// Whether schema-qualified names are supported
    fn supports_schemas(&self) -> bool;
}

/// Parsed dialect definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialectDescriptor {
    /// Identity of the dialect
    pub metadata: DialectMetadata,
    /// Identifier and literal rules
    #[serde(default)]
    pub syntax: SyntaxRules,
    /// Source type → engine type mappings
    #[serde(default)]
    pub data_types: DataTypes,
    /// Relational operator pushdown capabilities
    #[serde(default)]
    pub relational_algebra: RelationalAlgebra,
    /// Expression / function pushdown capabilities
    #[serde(default)]
    pub expressions: Expressions,
}

/// Dialect identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialectMetadata {
    /// Display / source type name
    pub name: String,
    /// API name
    pub apiname: String,
    /// Definition format version
    pub spec_version: String,
}

/// Identifier and literal rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct SyntaxRules {
    pub identifier_quote: String,
    pub identifier_length_limit: usize,
    pub allows_boolean_literal: bool,
    pub map_boolean_literal_to_bit: bool,
    pub supports_catalogs: bool,
    pub supports_schemas: bool,
}

impl Default for SyntaxRules {
    fn default() -> Self {
        Self {
            identifier_quote: "\"".to_string(),
            identifier_length_limit: 128,
            allows_boolean_literal: true,
            map_boolean_literal_to_bit: false,
            supports_catalogs: true,
            supports_schemas: true,
        }
    }
}

/// Type mapping table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTypes {
    /// Individual mappings
    #[serde(default)]
    pub mappings: Vec<TypeMapping>,
}

/// One source type mapped to one engine type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMapping {
    /// Type as the source database names it
    pub source: SourceType,
    /// Type as the query engine names it
    #[serde(rename = "dremio")]
    pub engine: EngineType,
}

/// Source-side type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SourceType {
    pub name: String,
    #[serde(default)]
    pub max_precision: Option<u32>,
    #[serde(default)]
    pub max_scale: Option<u32>,
}

/// Engine-side type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct EngineType {
    pub name: String,
}

/// Simple on/off capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggle {
    /// Whether the capability is enabled
    #[serde(default)]
    pub enable: bool,
}

/// Join capability with optional inequality conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct JoinKind {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub inequality: bool,
}

/// Relational operator pushdown capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct RelationalAlgebra {
    pub aggregation: Aggregation,
    pub except: Toggle,
    pub project: Toggle,
    pub join: Join,
    pub sort: Sort,
    pub union: Toggle,
    pub union_all: Toggle,
    pub values: Values,
}

/// Aggregation capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Aggregation {
    pub enable: bool,
    pub group_by_ordinal: bool,
    pub distinct: bool,
    pub count_functions: BTreeMap<String, Toggle>,
    pub functions: Vec<FunctionSpec>,
}

/// Join capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Join {
    pub enable: bool,
    pub cross: Toggle,
    pub inner: JoinKind,
    pub left: JoinKind,
    pub right: JoinKind,
    pub full: JoinKind,
}

/// Sort capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Sort {
    pub enable: bool,
    pub order_by: OrderBy,
    pub fetch_offset: FetchOffset,
}

/// ORDER BY capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct OrderBy {
    pub enable: bool,
    pub default_nulls_ordering: Option<String>,
}

/// LIMIT/OFFSET rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct FetchOffset {
    pub offset_fetch: FormatToggle,
    pub offset_only: FormatToggle,
    pub fetch_only: FormatToggle,
}

/// Capability rendered through a `{0}`/`{1}` format string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct FormatToggle {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub format: Option<String>,
}

/// VALUES capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Values {
    pub enable: bool,
    pub method: Option<String>,
}

/// Expression pushdown capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Expressions {
    pub subqueries: Subqueries,
    pub supports_case: bool,
    pub supports_over: bool,
    pub operators: Vec<FunctionSpec>,
}

/// Subquery capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Subqueries {
    pub correlated: bool,
    pub scalar: bool,
    pub in_clause: bool,
}

/// Function or operator names sharing a set of signatures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Names (case-insensitive)
    pub names: Vec<String>,
    /// Supported signatures
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

/// Argument types → return type, with an optional rewrite template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Engine argument type names
    #[serde(default)]
    pub args: Vec<String>,
    /// Engine return type name
    #[serde(rename = "return")]
    pub return_type: String,
    /// SQL template using `{n}` argument placeholders
    #[serde(default)]
    pub rewrite: Option<String>,
}

impl DialectDescriptor {
    /// Parse and validate a definition
    pub fn from_yaml(path: &str, content: &str) -> Result<Self> {
        let descriptor: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::dialect(path, format!("malformed definition: {e}")))?;
        descriptor.validate(path)?;
        Ok(descriptor)
    }

    fn validate(&self, path: &str) -> Result<()> {
        if self.metadata.name.trim().is_empty() {
            return Err(Error::dialect(path, "metadata.name must not be empty"));
        }
        if self.syntax.identifier_quote.chars().count() != 1 {
            return Err(Error::dialect(
                path,
                format!(
                    "syntax.identifier_quote must be a single character, got '{}'",
                    self.syntax.identifier_quote
                ),
            ));
        }
        if let Some(mapping) = self
            .data_types
            .mappings
            .iter()
            .find(|m| m.source.name.is_empty() || m.engine.name.is_empty())
        {
            return Err(Error::dialect(
                path,
                format!("incomplete type mapping: {:?}", mapping),
            ));
        }
        Ok(())
    }

    /// Engine type for a source type name (case-insensitive)
    pub fn map_source_type(&self, source_type: &str) -> Option<&str> {
        self.data_types
            .mappings
            .iter()
            .find(|m| m.source.name.eq_ignore_ascii_case(source_type))
            .map(|m| m.engine.name.as_str())
    }

    /// Whether an operator or scalar function can be pushed down for these argument types
    pub fn supports_operator(&self, name: &str, args: &[&str]) -> bool {
        Self::find_signature(&self.expressions.operators, name, args).is_some()
    }

    /// Whether an aggregate function can be pushed down for these argument types
    pub fn supports_aggregate(&self, name: &str, args: &[&str]) -> bool {
        self.relational_algebra.aggregation.enable
            && Self::find_signature(&self.relational_algebra.aggregation.functions, name, args)
                .is_some()
    }

    /// Rewrite template for an operator signature, if the definition declares one
    pub fn operator_rewrite(&self, name: &str, args: &[&str]) -> Option<&str> {
        Self::find_signature(&self.expressions.operators, name, args)
            .and_then(|s| s.rewrite.as_deref())
    }

    fn find_signature<'a>(
        specs: &'a [FunctionSpec],
        name: &str,
        args: &[&str],
    ) -> Option<&'a Signature> {
        specs
            .iter()
            .filter(|spec| spec.names.iter().any(|n| n.eq_ignore_ascii_case(name)))
            .flat_map(|spec| spec.signatures.iter())
            .find(|sig| {
                sig.args.len() == args.len()
                    && sig
                        .args
                        .iter()
                        .zip(args)
                        .all(|(a, b)| a.eq_ignore_ascii_case(b))
            })
    }
}

impl SqlDialect for DialectDescriptor {
    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn quote_identifier(&self, name: &str) -> String {
        let q = &self.syntax.identifier_quote;
        format!("{q}{}{q}", name.replace(q.as_str(), &format!("{q}{q}")))
    }

    fn limit_offset_sql(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        let fetch_offset = &self.relational_algebra.sort.fetch_offset;
        let (rule, zero, one) = match (limit, offset) {
            (None, None) => return Some(String::new()),
            (Some(l), None) => (&fetch_offset.fetch_only, l, None),
            (None, Some(o)) => (&fetch_offset.offset_only, o, None),
            (Some(l), Some(o)) => (&fetch_offset.offset_fetch, o, Some(l)),
        };
        if !rule.enable {
            return None;
        }
        let format = rule.format.as_deref()?;
        let mut sql = format.replace("{0}", &zero.to_string());
        if let Some(one) = one {
            sql = sql.replace("{1}", &one.to_string());
        }
        Some(sql)
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        match (self.syntax.map_boolean_literal_to_bit, value) {
            (true, true) => "1",
            (true, false) => "0",
            (false, true) => "TRUE",
            (false, false) => "FALSE",
        }
    }

    fn supports_catalogs(&self) -> bool {
        self.syntax.supports_catalogs
    }

    fn supports_schemas(&self) -> bool {
        self.syntax.supports_schemas
    }
}

/// Load a packaged dialect definition by logical path.
///
/// Parses on every call; use a [`DialectCell`] to load once.
pub fn load_dialect(resource_path: &str) -> Result<DialectDescriptor> {
    let content = bundled_resource(resource_path)
        .ok_or_else(|| Error::dialect(resource_path, "resource not found"))?;
    DialectDescriptor::from_yaml(resource_path, content)
}

/// Load-once, cache-forever holder for a dialect descriptor.
///
/// Concurrent first callers block on a single load; every caller then
/// receives the same `Arc`. A failed load is cached as well, so every later
/// activation fails with the same error.
///
/// ```
/// use hive_rdbc::dialect::{DialectCell, HIVE_ARP_FILENAME};
/// use std::sync::Arc;
///
/// static CELL: DialectCell = DialectCell::new(HIVE_ARP_FILENAME);
///
/// let a = CELL.get().unwrap();
/// let b = CELL.get().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub struct DialectCell {
    path: &'static str,
    cell: OnceLock<std::result::Result<Arc<DialectDescriptor>, String>>,
    load_attempts: AtomicUsize,
}

impl DialectCell {
    /// Create an empty cell for a logical resource path
    pub const fn new(path: &'static str) -> Self {
        Self {
            path,
            cell: OnceLock::new(),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Logical resource path
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Get the descriptor, loading the bundled resource on first access
    pub fn get(&self) -> Result<Arc<DialectDescriptor>> {
        self.get_with(load_dialect)
    }

    /// Get the descriptor, using `loader` if this is the first access
    pub fn get_with<F>(&self, loader: F) -> Result<Arc<DialectDescriptor>>
    where
        F: FnOnce(&str) -> Result<DialectDescriptor>,
    {
        let loaded = self.cell.get_or_init(|| {
            self.load_attempts.fetch_add(1, Ordering::Relaxed);
            match loader(self.path) {
                Ok(descriptor) => {
                    info!(
                        path = self.path,
                        dialect = %descriptor.metadata.name,
                        type_mappings = descriptor.data_types.mappings.len(),
                        "loaded dialect definition"
                    );
                    Ok(Arc::new(descriptor))
                }
                Err(e) => {
                    error!(path = self.path, error = %e, "failed to load dialect definition");
                    Err(e.to_string())
                }
            }
        });

        match loaded {
            Ok(descriptor) => Ok(Arc::clone(descriptor)),
            Err(message) => {
                debug!(path = self.path, "returning cached dialect load failure");
                Err(Error::dialect(self.path, message.clone()))
            }
        }
    }

    /// Whether a load (successful or not) has happened
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Number of times the loader ran (0 or 1)
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for DialectCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialectCell")
            .field("path", &self.path)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hive() -> DialectDescriptor {
        load_dialect(HIVE_ARP_FILENAME).unwrap()
    }

    #[test]
    fn test_bundled_hive_definition_parses() {
        let d = hive();
        assert_eq!(d.name(), "HIVEJDBC");
        assert_eq!(d.metadata.apiname, "hivejdbc");
        assert_eq!(d.syntax.identifier_quote, "`");
        assert!(!d.supports_catalogs());
        assert!(d.supports_schemas());
    }

    #[test]
    fn test_quote_identifier_escapes_quote() {
        let d = hive();
        assert_eq!(d.quote_identifier("users"), "`users`");
        assert_eq!(d.quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_limit_offset() {
        let d = hive();
        assert_eq!(d.limit_offset_sql(None, None), Some(String::new()));
        assert_eq!(d.limit_offset_sql(Some(10), None), Some("LIMIT 10".into()));
        assert_eq!(d.limit_offset_sql(None, Some(5)), None);
        assert_eq!(d.limit_offset_sql(Some(10), Some(5)), None);
    }

    #[test]
    fn test_type_mapping_case_insensitive() {
        let d = hive();
        assert_eq!(d.map_source_type("string"), Some("varchar"));
        assert_eq!(d.map_source_type("BIGINT"), Some("bigint"));
        assert_eq!(d.map_source_type("GEOMETRY"), None);
    }

    #[test]
    fn test_missing_resource() {
        let err = load_dialect("arp/implementation/missing.yaml").unwrap_err();
        assert!(matches!(err, Error::Dialect { .. }));
        assert!(err.to_string().contains("resource not found"));
    }

    #[test]
    fn test_identifier_quote_must_be_single_char() {
        let yaml = r#"
metadata:
  name: X
  apiname: x
  spec_version: '1'
syntax:
  identifier_quote: '""'
"#;
        let err = DialectDescriptor::from_yaml("x.yaml", yaml).unwrap_err();
        assert!(err.to_string().contains("identifier_quote"));
    }
}
