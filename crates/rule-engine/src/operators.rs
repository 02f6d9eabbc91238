//! 规则操作符定义

use crate::error::{Result, RuleError};
use crate::evaluator::ConditionEvaluator;
use crate::path::Fact;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 内置条件操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuiltinOperator {
    // 通用比较
    Equals,
    NotEquals,

    // 包含检查
    In,
    NotIn,
    Contains,
    NotContains,

    // 数值比较
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    Between,

    // 布尔检查
    IsTrue,
    IsFalse,

    // 正则匹配
    /// 使用 `regex` crate 的语法：不支持环视和反向引用，这类模式会返回
    /// [`RuleError::InvalidRegex`]。标志支持 `i`/`m`/`s`，`g`/`y`/`u`/`d` 被忽略，
    /// 重复或未知的标志视为无效。
    MatchRegExp,
    NotMatchRegExp,
}

impl BuiltinOperator {
    pub const ALL: [Self; 15] = [
        Self::Equals,
        Self::NotEquals,
        Self::In,
        Self::NotIn,
        Self::Contains,
        Self::NotContains,
        Self::LessThan,
        Self::LessThanOrEquals,
        Self::GreaterThan,
        Self::GreaterThanOrEquals,
        Self::Between,
        Self::IsTrue,
        Self::IsFalse,
        Self::MatchRegExp,
        Self::NotMatchRegExp,
    ];

    /// 注册表中使用的名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::LessThan => "lessThan",
            Self::LessThanOrEquals => "lessThanOrEquals",
            Self::GreaterThan => "greaterThan",
            Self::GreaterThanOrEquals => "greaterThanOrEquals",
            Self::Between => "between",
            Self::IsTrue => "isTrue",
            Self::IsFalse => "isFalse",
            Self::MatchRegExp => "matchRegExp",
            Self::NotMatchRegExp => "notMatchRegExp",
        }
    }
}

impl fmt::Display for BuiltinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BuiltinOperator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| RuleError::OperatorNotFound(s.to_string()))
    }
}

/// 逻辑关系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    #[default]
    And,
    Or,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 条件的类型提示，比较前按此类型转换操作数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
}

/// 操作符函数：`(事实值, 比较值, 类型提示) -> 是否匹配`
pub type OperatorFn = Arc<dyn Fn(&Fact, &Value, Option<ValueType>) -> Result<bool> + Send + Sync>;

/// 具名操作符
#[derive(Clone)]
pub struct Operator {
    name: String,
    func: OperatorFn,
}

impl Operator {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Fact, &Value, Option<ValueType>) -> Result<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 执行比较，错误原样返回
    pub fn evaluate(
        &self,
        fact: &Fact,
        value: &Value,
        value_type: Option<ValueType>,
    ) -> Result<bool> {
        (self.func)(fact, value, value_type)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator").field("name", &self.name).finish_non_exhaustive()
    }
}

impl From<BuiltinOperator> for Operator {
    fn from(op: BuiltinOperator) -> Self {
        Self::new(op.name(), move |fact, value, value_type| {
            ConditionEvaluator::evaluate(op, fact, value, value_type)
        })
    }
}

/// 新建一份内置操作符列表，每个引擎各持一份
pub fn builtin_operators() -> Vec<Operator> {
    BuiltinOperator::ALL.into_iter().map(Operator::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_names_roundtrip() {
        for op in BuiltinOperator::ALL {
            assert_eq!(op.name().parse::<BuiltinOperator>().unwrap(), op);
            assert_eq!(serde_json::to_value(op).unwrap(), json!(op.name()));
        }
        assert!("regex".parse::<BuiltinOperator>().is_err());
    }

    #[test]
    fn test_relation_serde() {
        assert_eq!(serde_json::to_value(Relation::Or).unwrap(), json!("or"));
        assert_eq!(
            serde_json::from_value::<Relation>(json!("and")).unwrap(),
            Relation::And
        );
        assert!(serde_json::from_value::<Relation>(json!("xor")).is_err());
        assert_eq!(Relation::default(), Relation::And);
    }

    #[test]
    fn test_custom_operator() {
        let op = Operator::new("noop", |_, _, _| Ok(true));
        assert_eq!(op.name(), "noop");
        assert!(op.evaluate(&Fact::Undefined, &json!(null), None).unwrap());
    }

    #[test]
    fn test_builtin_operator_wrapper() {
        let equals = Operator::from(BuiltinOperator::Equals);
        assert_eq!(equals.name(), "equals");
        assert!(equals.evaluate(&Fact::from(json!(1)), &json!(1), None).unwrap());
        assert_eq!(builtin_operators().len(), BuiltinOperator::ALL.len());
    }
}
