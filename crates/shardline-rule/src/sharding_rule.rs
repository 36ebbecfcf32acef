//! The aggregate, query-facing sharding rule.
//!
//! A [`ShardingRule`] is built once per configuration version and never
//! mutated afterwards. Algorithms are instantiated first, because auto tables
//! need their table amount, then explicit tables, auto tables, broadcast
//! tables and finally binding groups.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use shardline_algorithm::{AlgorithmRegistry, GeneratedKey, KeyGenerateAlgorithm, ShardingAlgorithm};
use shardline_placement::{PlacementError, split_and_evaluate};
use shardline_types::{DataNode, ShardingRuleConfig, ShardingStrategyConfig};
use tracing::info;

use crate::{BindingTableRule, RuleError, TableRule};

type Result<T> = std::result::Result<T, RuleError>;

static NO_SHARDING: ShardingStrategyConfig = ShardingStrategyConfig::None;

/// All table rules, binding groups, broadcast tables and algorithms of one
/// configuration version.
#[derive(Debug)]
pub struct ShardingRule {
    data_source_names: Vec<String>,
    table_rules: Vec<Arc<TableRule>>,
    /// Lower-cased logical name to position in `table_rules`.
    table_rule_index: HashMap<String, usize>,
    binding_table_rules: Vec<BindingTableRule>,
    broadcast_tables: Vec<String>,
    /// Lower-cased broadcast name to its synthesized rule.
    broadcast_rules: HashMap<String, Arc<TableRule>>,
    default_database_strategy: Option<ShardingStrategyConfig>,
    default_table_strategy: Option<ShardingStrategyConfig>,
    default_generate_key_column: Option<String>,
    sharding_algorithms: HashMap<String, Arc<dyn ShardingAlgorithm>>,
    key_generators: HashMap<String, Arc<dyn KeyGenerateAlgorithm>>,
    default_key_generator: Arc<dyn KeyGenerateAlgorithm>,
}

impl ShardingRule {
    /// Build with the built-in algorithms.
    pub fn new(config: &ShardingRuleConfig, data_source_names: &[String]) -> Result<Self> {
        Self::with_registry(config, data_source_names, &AlgorithmRegistry::default())
    }

    /// Build, resolving algorithm types through `registry`.
    pub fn with_registry(
        config: &ShardingRuleConfig,
        data_source_names: &[String],
        registry: &AlgorithmRegistry,
    ) -> Result<Self> {
        if data_source_names.is_empty() {
            return Err(RuleError::MissingDataSources);
        }
        let data_source_names = effective_data_source_names(config, data_source_names)?;

        let mut sharding_algorithms = HashMap::with_capacity(config.sharding_algorithms.len());
        for (name, each) in &config.sharding_algorithms {
            sharding_algorithms.insert(name.clone(), registry.create_sharding(each)?);
        }
        let mut key_generators = HashMap::with_capacity(config.key_generators.len());
        for (name, each) in &config.key_generators {
            key_generators.insert(name.clone(), registry.create_key_generator(each)?);
        }

        let default_key_strategy = config.default_key_generate_strategy.as_ref();
        let default_key_generator = match default_key_strategy
            .and_then(|each| each.key_generator_name.as_deref())
        {
            Some(name) => lookup_key_generator(&key_generators, name)?,
            None => registry.default_key_generator()?,
        };
        let default_generate_key_column = default_key_strategy
            .map(|each| each.column.trim())
            .filter(|column| !column.is_empty())
            .map(str::to_string);

        for strategy in [
            config.default_database_strategy.as_ref(),
            config.default_table_strategy.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            lookup_strategy_algorithm(&sharding_algorithms, strategy)?;
        }

        let mut table_rules = Vec::new();
        for each in &config.tables {
            for strategy in [each.database_strategy.as_ref(), each.table_strategy.as_ref()]
                .into_iter()
                .flatten()
            {
                lookup_strategy_algorithm(&sharding_algorithms, strategy)?;
            }
            table_rules.push(TableRule::from_config(
                each,
                &data_source_names,
                default_generate_key_column.as_deref(),
            )?);
        }
        for each in &config.auto_tables {
            let logic_table = each.logic_table.to_lowercase();
            let algorithm = match each.sharding_strategy.as_ref() {
                Some(strategy) => lookup_strategy_algorithm(&sharding_algorithms, strategy)?,
                None => None,
            };
            let Some(algorithm) = algorithm else {
                return Err(RuleError::NotAutoTableAlgorithm {
                    logic_table,
                    algorithm: "none".to_string(),
                });
            };
            let auto = algorithm
                .as_auto_table()
                .ok_or_else(|| RuleError::NotAutoTableAlgorithm {
                    logic_table,
                    algorithm: algorithm.type_name().to_string(),
                })?;
            table_rules.push(TableRule::from_auto_config(
                each,
                &data_source_names,
                Some(auto),
                default_generate_key_column.as_deref(),
            )?);
        }

        let mut table_rule_index = HashMap::with_capacity(table_rules.len());
        for (position, rule) in table_rules.iter().enumerate() {
            if let Some(name) = rule.key_generator_name() {
                lookup_key_generator(&key_generators, name)?;
            }
            if table_rule_index
                .insert(rule.logic_table().to_string(), position)
                .is_some()
            {
                return Err(RuleError::DuplicateLogicTable(rule.logic_table().to_string()));
            }
        }
        let table_rules: Vec<Arc<TableRule>> = table_rules.into_iter().map(Arc::new).collect();

        let broadcast_tables: Vec<String> = config
            .broadcast_tables
            .iter()
            .map(|each| each.trim().to_string())
            .filter(|each| !each.is_empty())
            .collect();
        let broadcast_rules = broadcast_tables
            .iter()
            .map(|each| {
                let rule = TableRule::broadcast(each, &data_source_names);
                (rule.logic_table().to_string(), Arc::new(rule))
            })
            .collect::<HashMap<_, _>>();

        let mut binding_table_rules = Vec::with_capacity(config.binding_table_groups.len());
        for group in &config.binding_table_groups {
            let mut members = Vec::new();
            for table in group.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                let key = table.to_lowercase();
                let member = match table_rule_index.get(&key) {
                    Some(&position) => (Arc::clone(&table_rules[position]), true),
                    None => match broadcast_rules.get(&key) {
                        Some(rule) => (Arc::clone(rule), false),
                        None => {
                            return Err(RuleError::UnknownBindingTable {
                                group: group.clone(),
                                table: table.to_string(),
                            });
                        }
                    },
                };
                members.push(member);
            }
            if !members.is_empty() {
                binding_table_rules.push(BindingTableRule::new(group, members)?);
            }
        }

        info!(
            tables = table_rules.len(),
            binding_groups = binding_table_rules.len(),
            broadcast_tables = broadcast_tables.len(),
            data_sources = data_source_names.len(),
            "built sharding rule"
        );

        Ok(Self {
            data_source_names,
            table_rules,
            table_rule_index,
            binding_table_rules,
            broadcast_tables,
            broadcast_rules,
            default_database_strategy: config.default_database_strategy.clone(),
            default_table_strategy: config.default_table_strategy.clone(),
            default_generate_key_column,
            sharding_algorithms,
            key_generators,
            default_key_generator,
        })
    }

    // -----------------------------------------------------------------------
    // Table rule lookup
    // -----------------------------------------------------------------------

    /// Data sources the rule shards over.
    pub fn data_source_names(&self) -> &[String] {
        &self.data_source_names
    }

    /// Table rules in construction order.
    pub fn table_rules(&self) -> &[Arc<TableRule>] {
        &self.table_rules
    }

    /// Logical names of all table rules in construction order.
    pub fn get_tables(&self) -> Vec<&str> {
        self.table_rules
            .iter()
            .map(|each| each.logic_table())
            .collect()
    }

    /// The configured rule for `logic_table`; broadcast tables are not
    /// included.
    pub fn find_table_rule(&self, logic_table: &str) -> Option<&TableRule> {
        self.table_rule_index
            .get(&logic_table.to_lowercase())
            .map(|&position| self.table_rules[position].as_ref())
    }

    /// The rule owning `actual_table`, ignoring case.
    pub fn find_table_rule_by_actual_table(&self, actual_table: &str) -> Option<&TableRule> {
        self.table_rules
            .iter()
            .find(|each| each.is_existed(actual_table))
            .map(Arc::as_ref)
    }

    /// The logical table owning `actual_table`.
    pub fn find_logic_table_by_actual_table(&self, actual_table: &str) -> Option<&str> {
        self.find_table_rule_by_actual_table(actual_table)
            .map(TableRule::logic_table)
    }

    /// The configured rule, or a broadcast rule if `logic_table` is a
    /// broadcast table.
    pub fn get_table_rule(&self, logic_table: &str) -> Result<&TableRule> {
        if let Some(rule) = self.find_table_rule(logic_table) {
            return Ok(rule);
        }
        self.broadcast_rules
            .get(&logic_table.to_lowercase())
            .map(Arc::as_ref)
            .ok_or_else(|| RuleError::NoTableRule(logic_table.to_string()))
    }

    /// Whether any of `logic_tables` has a table rule or is broadcast.
    pub fn table_rule_exists(&self, logic_tables: &[&str]) -> bool {
        logic_tables
            .iter()
            .any(|each| self.find_table_rule(each).is_some() || self.is_broadcast_table(each))
    }

    /// The subset of `logic_tables` that have table rules, in input order.
    pub fn get_sharding_logic_table_names<'a>(&self, logic_tables: &[&'a str]) -> Vec<&'a str> {
        logic_tables
            .iter()
            .copied()
            .filter(|each| self.find_table_rule(each).is_some())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Strategies and columns
    // -----------------------------------------------------------------------

    /// The table's database strategy, else the default, else no sharding.
    pub fn database_sharding_strategy<'a>(
        &'a self,
        table_rule: &'a TableRule,
    ) -> &'a ShardingStrategyConfig {
        table_rule
            .database_strategy()
            .or(self.default_database_strategy.as_ref())
            .unwrap_or(&NO_SHARDING)
    }

    /// The table's table strategy, else the default, else no sharding.
    pub fn table_sharding_strategy<'a>(
        &'a self,
        table_rule: &'a TableRule,
    ) -> &'a ShardingStrategyConfig {
        table_rule
            .table_strategy()
            .or(self.default_table_strategy.as_ref())
            .unwrap_or(&NO_SHARDING)
    }

    /// Whether `column` drives either resolved strategy of `logic_table`.
    pub fn is_sharding_column(&self, column: &str, logic_table: &str) -> bool {
        self.find_table_rule(logic_table).is_some_and(|rule| {
            self.database_sharding_strategy(rule)
                .is_sharding_column(column)
                || self.table_sharding_strategy(rule).is_sharding_column(column)
        })
    }

    /// Whether `column` is the generated key column of `logic_table`.
    pub fn is_generate_key_column(&self, column: &str, logic_table: &str) -> bool {
        self.find_generate_key_column_name(logic_table)
            .is_some_and(|each| each.eq_ignore_ascii_case(column))
    }

    /// Generated key column of `logic_table`, if it has one.
    pub fn find_generate_key_column_name(&self, logic_table: &str) -> Option<&str> {
        self.find_table_rule(logic_table)
            .and_then(TableRule::generate_key_column)
    }

    /// Generate the next key for `logic_table`.
    pub fn generate_key(&self, logic_table: &str) -> Result<GeneratedKey> {
        let rule = self
            .find_table_rule(logic_table)
            .ok_or_else(|| RuleError::NoTableRule(logic_table.to_string()))?;
        let generator = match rule.key_generator_name() {
            Some(name) => lookup_key_generator(&self.key_generators, name)?,
            None => Arc::clone(&self.default_key_generator),
        };
        Ok(generator.generate_key()?)
    }

    /// Configured sharding algorithm by name.
    pub fn sharding_algorithm(&self, name: &str) -> Option<&Arc<dyn ShardingAlgorithm>> {
        self.sharding_algorithms.get(name)
    }

    /// Configured key generator by name.
    pub fn key_generator(&self, name: &str) -> Option<&Arc<dyn KeyGenerateAlgorithm>> {
        self.key_generators.get(name)
    }

    /// Generator used by tables that name none.
    pub fn default_key_generator(&self) -> &Arc<dyn KeyGenerateAlgorithm> {
        &self.default_key_generator
    }

    /// Default key column applied to tables that configure none.
    pub fn default_generate_key_column(&self) -> Option<&str> {
        self.default_generate_key_column.as_deref()
    }

    // -----------------------------------------------------------------------
    // Data nodes
    // -----------------------------------------------------------------------

    /// First node of `logic_table`.
    pub fn get_data_node(&self, logic_table: &str) -> Result<&DataNode> {
        self.get_table_rule(logic_table)?.first_data_node()
    }

    /// Node of `logic_table` on `data_source`.
    pub fn get_data_node_in(&self, data_source: &str, logic_table: &str) -> Result<&DataNode> {
        let rule = self.get_table_rule(logic_table)?;
        rule.actual_data_nodes()
            .iter()
            .find(|node| {
                node.data_source_name() == data_source
                    && self.data_source_names.iter().any(|ds| ds == data_source)
            })
            .ok_or_else(|| RuleError::NoDataNode {
                data_source: data_source.to_string(),
                logic_table: logic_table.to_string(),
            })
    }

    /// Every logical table with its nodes, in construction order.
    pub fn get_all_data_nodes(&self) -> Vec<(&str, &[DataNode])> {
        self.table_rules
            .iter()
            .map(|each| (each.logic_table(), each.actual_data_nodes()))
            .collect()
    }

    /// Every actual table name across all table rules.
    pub fn get_all_actual_tables(&self) -> BTreeSet<&str> {
        self.table_rules
            .iter()
            .flat_map(|each| each.actual_data_nodes())
            .map(DataNode::table_name)
            .collect()
    }

    /// Actual table of the first node of `logic_table`.
    pub fn find_first_actual_table(&self, logic_table: &str) -> Option<&str> {
        self.find_table_rule(logic_table)
            .and_then(|rule| rule.actual_data_nodes().first())
            .map(DataNode::table_name)
    }

    // -----------------------------------------------------------------------
    // Broadcast and binding tables
    // -----------------------------------------------------------------------

    /// Broadcast table names as configured.
    pub fn broadcast_tables(&self) -> &[String] {
        &self.broadcast_tables
    }

    /// Whether `logic_table` is a broadcast table, ignoring case.
    pub fn is_broadcast_table(&self, logic_table: &str) -> bool {
        self.broadcast_rules
            .contains_key(&logic_table.to_lowercase())
    }

    /// Whether every table is broadcast; false for no tables.
    pub fn is_all_broadcast_tables(&self, logic_tables: &[&str]) -> bool {
        !logic_tables.is_empty() && logic_tables.iter().all(|each| self.is_broadcast_table(each))
    }

    /// Whether results for these tables have to be merged across shards.
    pub fn is_need_accumulate(&self, logic_tables: &[&str]) -> bool {
        !self.is_all_broadcast_tables(logic_tables)
    }

    pub fn binding_table_rules(&self) -> &[BindingTableRule] {
        &self.binding_table_rules
    }

    /// The binding group containing `logic_table`.
    pub fn find_binding_table_rule(&self, logic_table: &str) -> Option<&BindingTableRule> {
        self.binding_table_rules
            .iter()
            .find(|each| each.has_logic_table(logic_table))
    }

    /// Whether all of `logic_tables` belong to the binding group of the first
    /// one found in a group; false for no tables.
    pub fn is_all_binding_tables(&self, logic_tables: &[&str]) -> bool {
        if logic_tables.is_empty() {
            return false;
        }
        let Some(group) = logic_tables
            .iter()
            .find_map(|each| self.find_binding_table_rule(each))
        else {
            return false;
        };
        let members: HashSet<String> = group
            .all_logic_tables()
            .into_iter()
            .map(str::to_lowercase)
            .collect();
        logic_tables
            .iter()
            .all(|each| members.contains(&each.to_lowercase()))
    }

    /// Actual tables co-located with `data_source.actual_table` for every
    /// candidate in the binding group of `logic_table`.
    ///
    /// Empty when `logic_table` is in no binding group.
    pub fn get_logic_and_actual_tables_from_binding_table(
        &self,
        data_source: &str,
        logic_table: &str,
        actual_table: &str,
        candidates: &[&str],
    ) -> Result<Vec<(String, String)>> {
        match self.find_binding_table_rule(logic_table) {
            Some(group) => {
                group.logic_and_actual_tables(data_source, logic_table, actual_table, candidates)
            }
            None => Ok(Vec::new()),
        }
    }
}

/// All known data sources unless every explicit table declares nodes; then
/// only those named in the declarations, first-seen order.
fn effective_data_source_names(
    config: &ShardingRuleConfig,
    data_source_names: &[String],
) -> Result<Vec<String>> {
    let declared_everywhere = !config.tables.is_empty()
        && config.tables.iter().all(|each| {
            each.actual_data_nodes
                .as_deref()
                .is_some_and(|expression| !expression.trim().is_empty())
        });
    if !declared_everywhere {
        return Ok(data_source_names.to_vec());
    }

    let mut result: Vec<String> = Vec::new();
    for each in &config.tables {
        let expression = each.actual_data_nodes.as_deref().unwrap_or_default();
        for literal in split_and_evaluate(expression)? {
            let node = DataNode::parse(&literal)?;
            if !data_source_names
                .iter()
                .any(|ds| ds == node.data_source_name())
            {
                return Err(PlacementError::UnknownDataSource { data_node: literal }.into());
            }
            if !result.iter().any(|ds| ds == node.data_source_name()) {
                result.push(node.data_source_name().to_string());
            }
        }
    }
    Ok(result)
}

fn lookup_strategy_algorithm(
    algorithms: &HashMap<String, Arc<dyn ShardingAlgorithm>>,
    strategy: &ShardingStrategyConfig,
) -> Result<Option<Arc<dyn ShardingAlgorithm>>> {
    let Some(name) = strategy.sharding_algorithm_name() else {
        return Ok(None);
    };
    algorithms
        .get(name)
        .cloned()
        .map(Some)
        .ok_or_else(|| RuleError::UnknownShardingAlgorithm {
            name: name.to_string(),
        })
}

fn lookup_key_generator(
    generators: &HashMap<String, Arc<dyn KeyGenerateAlgorithm>>,
    name: &str,
) -> Result<Arc<dyn KeyGenerateAlgorithm>> {
    generators
        .get(name)
        .cloned()
        .ok_or_else(|| RuleError::UnknownKeyGenerator {
            name: name.to_string(),
        })
}
