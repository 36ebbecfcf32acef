//! Built-in sharding algorithms.
//!
//! `MOD`, `HASH_MOD` and `VOLUME_RANGE` are auto-table capable: they know the
//! number of tables they shard over. `INLINE` computes the target name from
//! an expression and cannot lay out tables on its own.

use shardline_types::Props;

use crate::{AlgorithmError, AutoTableAlgorithm, ShardingAlgorithm, ShardingValue};

type Result<T> = std::result::Result<T, AlgorithmError>;

// ---------------------------------------------------------------------------
// Property helpers
// ---------------------------------------------------------------------------

pub(crate) fn required_i64(
    props: &Props,
    type_name: &'static str,
    property: &'static str,
) -> Result<i64> {
    optional_i64(props, type_name, property)?.ok_or(AlgorithmError::MissingProperty {
        type_name,
        property,
    })
}

pub(crate) fn optional_i64(
    props: &Props,
    type_name: &'static str,
    property: &'static str,
) -> Result<Option<i64>> {
    match props.get_i64(property) {
        None => Ok(None),
        Some(Ok(v)) => Ok(Some(v)),
        Some(Err(raw)) => Err(AlgorithmError::InvalidProperty {
            type_name,
            property,
            value: raw,
            reason: "not an integer".into(),
        }),
    }
}

fn positive_count(props: &Props, type_name: &'static str, property: &'static str) -> Result<u64> {
    let value = required_i64(props, type_name, property)?;
    if value <= 0 {
        return Err(AlgorithmError::InvalidProperty {
            type_name,
            property,
            value: value.to_string(),
            reason: "must be positive".into(),
        });
    }
    Ok(value as u64)
}

/// Find the target whose trailing number equals `index`.
///
/// `t_order_1`, `ds_1` and `ds1` all carry index 1; `t_order_11` does not.
fn target_by_suffix<'a>(targets: &'a [String], index: u64) -> Option<&'a String> {
    targets.iter().find(|each| {
        let digits = each.len() - each.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        digits > 0
            && each[each.len() - digits..]
                .parse::<u64>()
                .is_ok_and(|n| n == index)
    })
}

fn select(
    type_name: &'static str,
    targets: &[String],
    index: u64,
    value: &ShardingValue,
) -> Result<String> {
    target_by_suffix(targets, index)
        .cloned()
        .ok_or_else(|| AlgorithmError::NoTarget {
            type_name,
            target: format!("*{index}"),
            value: value.to_string(),
        })
}

fn integer_value(type_name: &'static str, value: &ShardingValue) -> Result<i64> {
    value.as_i64().ok_or_else(|| AlgorithmError::UnsupportedValue {
        type_name,
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// MOD
// ---------------------------------------------------------------------------

/// `value mod sharding-count`, for integer values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModAlgorithm {
    sharding_count: u64,
}

impl ModAlgorithm {
    pub const TYPE: &'static str = "MOD";

    /// Build from properties; requires `sharding-count`.
    pub fn from_props(props: &Props) -> Result<Self> {
        Ok(Self {
            sharding_count: positive_count(props, Self::TYPE, "sharding-count")?,
        })
    }
}

impl ShardingAlgorithm for ModAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_sharding(&self, available_targets: &[String], value: &ShardingValue) -> Result<String> {
        let v = integer_value(Self::TYPE, value)?;
        let index = v.rem_euclid(self.sharding_count as i64) as u64;
        select(Self::TYPE, available_targets, index, value)
    }

    fn as_auto_table(&self) -> Option<&dyn AutoTableAlgorithm> {
        Some(self)
    }
}

impl AutoTableAlgorithm for ModAlgorithm {
    fn auto_tables_amount(&self) -> usize {
        self.sharding_count as usize
    }
}

// ---------------------------------------------------------------------------
// HASH_MOD
// ---------------------------------------------------------------------------

/// Hash of the rendered value, then `mod sharding-count`. Accepts any value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashModAlgorithm {
    sharding_count: u64,
}

impl HashModAlgorithm {
    pub const TYPE: &'static str = "HASH_MOD";

    /// Build from properties; requires `sharding-count`.
    pub fn from_props(props: &Props) -> Result<Self> {
        Ok(Self {
            sharding_count: positive_count(props, Self::TYPE, "sharding-count")?,
        })
    }

    fn hash(value: &ShardingValue) -> u64 {
        let digest = blake3::hash(value.to_string().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(prefix)
    }
}

impl ShardingAlgorithm for HashModAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_sharding(&self, available_targets: &[String], value: &ShardingValue) -> Result<String> {
        let index = Self::hash(value) % self.sharding_count;
        select(Self::TYPE, available_targets, index, value)
    }

    fn as_auto_table(&self) -> Option<&dyn AutoTableAlgorithm> {
        Some(self)
    }
}

impl AutoTableAlgorithm for HashModAlgorithm {
    fn auto_tables_amount(&self) -> usize {
        self.sharding_count as usize
    }
}

// ---------------------------------------------------------------------------
// VOLUME_RANGE
// ---------------------------------------------------------------------------

/// Fixed-width ranges between `range-lower` and `range-upper`.
///
/// Partition 0 takes everything below the lower bound, the last partition
/// everything at or above the upper bound, and each partition in between
/// covers `sharding-volume` consecutive values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRangeAlgorithm {
    lower: i64,
    upper: i64,
    volume: i64,
}

impl VolumeRangeAlgorithm {
    pub const TYPE: &'static str = "VOLUME_RANGE";

    /// Build from properties; requires `range-lower`, `range-upper` and
    /// `sharding-volume`, with the span a multiple of the volume.
    pub fn from_props(props: &Props) -> Result<Self> {
        let lower = required_i64(props, Self::TYPE, "range-lower")?;
        let upper = required_i64(props, Self::TYPE, "range-upper")?;
        let volume = positive_count(props, Self::TYPE, "sharding-volume")? as i64;
        if upper <= lower {
            return Err(AlgorithmError::InvalidProperty {
                type_name: Self::TYPE,
                property: "range-upper",
                value: upper.to_string(),
                reason: format!("must be greater than range-lower {lower}"),
            });
        }
        let span = upper
            .checked_sub(lower)
            .ok_or_else(|| AlgorithmError::InvalidProperty {
                type_name: Self::TYPE,
                property: "range-upper",
                value: upper.to_string(),
                reason: format!("range span from {lower} overflows a 64-bit integer"),
            })?;
        if span % volume != 0 {
            return Err(AlgorithmError::InvalidProperty {
                type_name: Self::TYPE,
                property: "sharding-volume",
                value: volume.to_string(),
                reason: format!("must divide the range span {span}"),
            });
        }
        Ok(Self {
            lower,
            upper,
            volume,
        })
    }

    fn partition(&self, v: i64) -> u64 {
        if v < self.lower {
            0
        } else if v >= self.upper {
            self.auto_tables_amount() as u64 - 1
        } else {
            // lower <= v < upper, and upper - lower fits in i64.
            ((v - self.lower) / self.volume) as u64 + 1
        }
    }
}

impl ShardingAlgorithm for VolumeRangeAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_sharding(&self, available_targets: &[String], value: &ShardingValue) -> Result<String> {
        let v = integer_value(Self::TYPE, value)?;
        select(Self::TYPE, available_targets, self.partition(v), value)
    }

    fn as_auto_table(&self) -> Option<&dyn AutoTableAlgorithm> {
        Some(self)
    }
}

impl AutoTableAlgorithm for VolumeRangeAlgorithm {
    fn auto_tables_amount(&self) -> usize {
        ((self.upper - self.lower) / self.volume) as usize + 2
    }
}

// ---------------------------------------------------------------------------
// INLINE
// ---------------------------------------------------------------------------

/// Target name computed from `algorithm-expression`, e.g.
/// `t_order_${order_id % 2}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAlgorithm {
    prefix: String,
    column: String,
    modulus: i64,
    suffix: String,
}

impl InlineAlgorithm {
    pub const TYPE: &'static str = "INLINE";

    /// Build from properties; requires `algorithm-expression`.
    pub fn from_props(props: &Props) -> Result<Self> {
        let expression =
            props
                .get_str("algorithm-expression")
                .ok_or(AlgorithmError::MissingProperty {
                    type_name: Self::TYPE,
                    property: "algorithm-expression",
                })?;
        Self::parse(&expression)
    }

    fn parse(expression: &str) -> Result<Self> {
        let invalid = |reason: &str| AlgorithmError::InvalidProperty {
            type_name: Self::TYPE,
            property: "algorithm-expression",
            value: expression.to_string(),
            reason: reason.to_string(),
        };

        let (start, open_len) = match (expression.find("$->{"), expression.find("${")) {
            (Some(arrow), _) => (arrow, 4),
            (None, Some(plain)) => (plain, 2),
            (None, None) => return Err(invalid("expected a '${...}' placeholder")),
        };
        let body_start = start + open_len;
        let close = expression[body_start..]
            .find('}')
            .map(|offset| body_start + offset)
            .ok_or_else(|| invalid("unterminated placeholder"))?;
        let body = &expression[body_start..close];

        let (column, modulus) = body
            .split_once('%')
            .ok_or_else(|| invalid("expected '<column> % <count>'"))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(invalid("empty column name"));
        }
        let modulus: i64 = modulus
            .trim()
            .parse()
            .map_err(|_| invalid("modulus is not an integer"))?;
        if modulus <= 0 {
            return Err(invalid("modulus must be positive"));
        }

        Ok(Self {
            prefix: expression[..start].to_string(),
            column: column.to_string(),
            modulus,
            suffix: expression[close + 1..].to_string(),
        })
    }

    /// Column referenced by the expression.
    pub fn column(&self) -> &str {
        &self.column
    }
}

impl ShardingAlgorithm for InlineAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_sharding(&self, available_targets: &[String], value: &ShardingValue) -> Result<String> {
        let v = integer_value(Self::TYPE, value)?;
        let target = format!("{}{}{}", self.prefix, v.rem_euclid(self.modulus), self.suffix);
        if available_targets.iter().any(|each| *each == target) {
            Ok(target)
        } else {
            Err(AlgorithmError::NoTarget {
                type_name: Self::TYPE,
                target,
                value: value.to_string(),
            })
        }
    }
}
