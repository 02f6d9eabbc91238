//! 规则 JSON 格式
//!
//! 支持两种等价的规则格式：
//! - 简化格式：`{"and": [...]}` 或 `{"or": [...]}`
//! - 结构化格式：`{"relation": "and", "conditions": [...]}`
//!
//! 子节点按键名分类：含 `and`/`or`/`relation`/`conditions` 的对象是规则，
//! 其余对象是条件。形状有歧义时直接报错，不做静默归类。

use crate::error::{Result, RuleError};
use crate::operators::{Relation, ValueType};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

const AND: &str = "and";
const OR: &str = "or";
const RELATION: &str = "relation";
const CONDITIONS: &str = "conditions";

/// 规则 JSON 的输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonFormat {
    #[default]
    Simplified,
    Structured,
}

impl fmt::Display for JsonFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simplified => write!(f, "simplified"),
            Self::Structured => write!(f, "structured"),
        }
    }
}

impl FromStr for JsonFormat {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simplified" => Ok(Self::Simplified),
            "structured" => Ok(Self::Structured),
            other => Err(RuleError::ParseError(format!(
                "未知的规则格式 '{}'，可选 simplified / structured",
                other
            ))),
        }
    }
}

/// 条件配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default)]
    pub fact: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConditionConfig {
    pub fn new(
        fact: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            fact: fact.into(),
            operator: operator.into(),
            value: value.into(),
            value_type: None,
            message: None,
        }
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// 规则配置
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleJson {
    /// 序列化时使用的格式，解析时记录输入所用的格式
    pub format: JsonFormat,
    pub relation: Relation,
    pub items: Vec<NodeJson>,
}

impl RuleJson {
    pub fn new(relation: Relation, items: Vec<NodeJson>) -> Self {
        Self {
            format: JsonFormat::default(),
            relation,
            items,
        }
    }

    pub fn with_format(mut self, format: JsonFormat) -> Self {
        self.format = format;
        self
    }
}

/// 规则节点配置（规则或条件）
#[derive(Debug, Clone, PartialEq)]
pub enum NodeJson {
    Rule(RuleJson),
    Condition(ConditionConfig),
}

impl From<RuleJson> for NodeJson {
    fn from(rule: RuleJson) -> Self {
        Self::Rule(rule)
    }
}

impl From<ConditionConfig> for NodeJson {
    fn from(condition: ConditionConfig) -> Self {
        Self::Condition(condition)
    }
}

impl TryFrom<Value> for RuleJson {
    type Error = RuleError;

    /// 解析顶层规则
    ///
    /// 空对象视为不含子节点的 AND 规则；不含任何规则属性的非空对象不是规则。
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) if map.is_empty() => Ok(Self::default()),
            Value::Object(map) if is_rule_shaped(&map) => parse_rule(map, "root"),
            Value::Object(_) => Err(RuleError::ParseError(
                "root 不是规则: 缺少 and / or / relation 属性".to_string(),
            )),
            other => Err(RuleError::ParseError(format!(
                "root 必须是对象，实际为 {}",
                type_name(&other)
            ))),
        }
    }
}

impl TryFrom<Value> for NodeJson {
    type Error = RuleError;

    fn try_from(value: Value) -> Result<Self> {
        parse_node(value, "root")
    }
}

fn is_rule_shaped(map: &Map<String, Value>) -> bool {
    [AND, OR, RELATION, CONDITIONS]
        .iter()
        .any(|key| map.contains_key(*key))
}

fn parse_node(value: Value, path: &str) -> Result<NodeJson> {
    match value {
        Value::Object(map) if is_rule_shaped(&map) => parse_rule(map, path).map(NodeJson::Rule),
        Value::Object(map) => serde_json::from_value(Value::Object(map))
            .map(NodeJson::Condition)
            .map_err(|e| RuleError::ParseError(format!("条件 '{}' 格式错误: {}", path, e))),
        other => Err(RuleError::ParseError(format!(
            "节点 '{}' 必须是对象，实际为 {}",
            path,
            type_name(&other)
        ))),
    }
}

fn parse_rule(mut map: Map<String, Value>, path: &str) -> Result<RuleJson> {
    let simplified = map.contains_key(AND) || map.contains_key(OR);
    let structured = map.contains_key(RELATION) || map.contains_key(CONDITIONS);

    if simplified && structured {
        return Err(RuleError::ParseError(format!(
            "规则 '{}' 同时包含简化格式与结构化格式的属性",
            path
        )));
    }

    if simplified {
        if map.contains_key(AND) && map.contains_key(OR) {
            return Err(RuleError::ConflictingRelation);
        }

        let (relation, key) = if map.contains_key(OR) {
            (Relation::Or, OR)
        } else {
            (Relation::And, AND)
        };
        let items = map.remove(key).unwrap_or_default();

        return Ok(RuleJson {
            format: JsonFormat::Simplified,
            relation,
            items: parse_items(items, &format!("{}.{}", path, key))?,
        });
    }

    let relation = match map.remove(RELATION) {
        Some(relation) => serde_json::from_value(relation).map_err(|e| {
            RuleError::ParseError(format!("规则 '{}' 的 relation 无效: {}", path, e))
        })?,
        None => {
            return Err(RuleError::ParseError(format!(
                "规则 '{}' 缺少 relation 属性",
                path
            )));
        }
    };

    let items = match map.remove(CONDITIONS) {
        Some(items) => parse_items(items, &format!("{}.{}", path, CONDITIONS))?,
        None => Vec::new(),
    };

    Ok(RuleJson {
        format: JsonFormat::Structured,
        relation,
        items,
    })
}

fn parse_items(value: Value, path: &str) -> Result<Vec<NodeJson>> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(RuleError::ParseError(format!(
                "'{}' 必须是数组，实际为 {}",
                path,
                type_name(&other)
            )));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| parse_node(item, &format!("{}[{}]", path, i)))
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Serialize for RuleJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.format {
            JsonFormat::Simplified => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(self.relation.as_str(), &self.items)?;
                map.end()
            }
            JsonFormat::Structured => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(RELATION, &self.relation)?;
                map.serialize_entry(CONDITIONS, &self.items)?;
                map.end()
            }
        }
    }
}

impl Serialize for NodeJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Rule(rule) => rule.serialize(serializer),
            Self::Condition(condition) => condition.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RuleJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for NodeJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}
