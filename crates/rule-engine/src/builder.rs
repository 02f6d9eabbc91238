//! 规则构建器
//!
//! 以链式调用在代码中组装规则树，构造错误延迟到 [`RuleBuilder::build`] 统一返回。
//!
//! ```
//! use rule_engine::{Engine, Rule};
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! let rule = Rule::builder(&engine)
//!     .equals("name", "Luke Skywalker")
//!     .or(|b| b.less_than("height", 200).greater_than("height", 300))
//!     .build()
//!     .unwrap();
//!
//! assert!(rule.evaluate(&json!({"name": "Luke Skywalker", "height": 172})).unwrap().result);
//! ```

use crate::engine::Engine;
use crate::error::{Result, RuleError};
use crate::models::{Condition, Rule, RuleNode};
use crate::operators::{BuiltinOperator, Relation, ValueType};
use crate::parser::ConditionConfig;
use serde_json::Value;

#[derive(Debug)]
pub struct RuleBuilder {
    rule: Rule,
    error: Option<RuleError>,
}

impl RuleBuilder {
    pub fn new(engine: &Engine) -> Self {
        Self::with_relation(Relation::And, engine)
    }

    pub fn with_relation(relation: Relation, engine: &Engine) -> Self {
        Self {
            rule: Rule::with_relation(relation, engine),
            error: None,
        }
    }

    /// 追加条件，`operator` 可以是任意已注册或稍后注册的操作符名称
    pub fn add(
        self,
        fact: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.add_config(ConditionConfig::new(fact, operator, value))
    }

    /// 追加带类型提示的条件
    pub fn add_typed(
        self,
        fact: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
        value_type: ValueType,
    ) -> Self {
        self.add_config(ConditionConfig::new(fact, operator, value).with_type(value_type))
    }

    pub fn add_config(mut self, config: ConditionConfig) -> Self {
        if self.error.is_some() {
            return self;
        }

        match Condition::new(config, self.rule.engine()) {
            Ok(condition) => {
                self.rule.add(condition);
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// 追加已构建的子规则或条件
    pub fn add_rule(mut self, node: impl Into<RuleNode>) -> Self {
        self.rule.add(node);
        self
    }

    fn builtin(self, fact: impl Into<String>, op: BuiltinOperator, value: impl Into<Value>) -> Self {
        self.add(fact, op.name(), value)
    }

    pub fn equals(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::Equals, value)
    }

    pub fn not_equals(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::NotEquals, value)
    }

    pub fn is_in(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::In, value)
    }

    pub fn not_in(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::NotIn, value)
    }

    pub fn contains(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::Contains, value)
    }

    pub fn not_contains(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::NotContains, value)
    }

    pub fn less_than(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::LessThan, value)
    }

    pub fn less_than_or_equals(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::LessThanOrEquals, value)
    }

    pub fn greater_than(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::GreaterThan, value)
    }

    pub fn greater_than_or_equals(self, fact: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::GreaterThanOrEquals, value)
    }

    /// 闭区间 `[min, max]`
    pub fn between(
        self,
        fact: impl Into<String>,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Self {
        self.builtin(
            fact,
            BuiltinOperator::Between,
            Value::Array(vec![min.into(), max.into()]),
        )
    }

    pub fn match_regexp(self, fact: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::MatchRegExp, pattern)
    }

    pub fn not_match_regexp(self, fact: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.builtin(fact, BuiltinOperator::NotMatchRegExp, pattern)
    }

    pub fn is_true(self, fact: impl Into<String>) -> Self {
        self.builtin(fact, BuiltinOperator::IsTrue, Value::Null)
    }

    pub fn is_false(self, fact: impl Into<String>) -> Self {
        self.builtin(fact, BuiltinOperator::IsFalse, Value::Null)
    }

    /// 追加 AND 子规则
    pub fn and(self, f: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        self.nested(Relation::And, f)
    }

    /// 追加 OR 子规则
    pub fn or(self, f: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        self.nested(Relation::Or, f)
    }

    fn nested(mut self, relation: Relation, f: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        if self.error.is_some() {
            return self;
        }

        let child = f(RuleBuilder::with_relation(relation, self.rule.engine()));
        match child.build() {
            Ok(rule) => {
                self.rule.add(rule);
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// 返回第一个构造错误，或构建好的规则
    pub fn build(self) -> Result<Rule> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.rule),
        }
    }
}

impl Rule {
    /// 创建 AND 规则构建器
    pub fn builder(engine: &Engine) -> RuleBuilder {
        RuleBuilder::new(engine)
    }
}
