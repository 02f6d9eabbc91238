//! 规则引擎领域模型
//!
//! 规则树由 [`Rule`]（AND/OR 逻辑节点）和 [`Condition`]（叶子断言）组成。
//! 每个节点持有构造时传入的 [`Engine`] 句柄，评估时从中查找操作符和解析器。

use crate::engine::Engine;
use crate::error::{Result, RuleError};
use crate::operators::{Relation, ValueType};
use crate::parser::{ConditionConfig, JsonFormat, NodeJson, RuleJson};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::trace;

/// 评估结果
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Evaluation {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Evaluation {
    pub fn passed() -> Self {
        Self {
            result: true,
            message: None,
        }
    }

    pub fn failed(message: Option<String>) -> Self {
        Self {
            result: false,
            message,
        }
    }
}

/// 条件节点
#[derive(Debug, Clone)]
pub struct Condition {
    fact: String,
    operator: String,
    value: Value,
    value_type: Option<ValueType>,
    message: Option<String>,
    engine: Engine,
}

impl Condition {
    /// 创建条件，`fact` 和 `operator` 为必填项
    ///
    /// 操作符是否存在不在此处校验，评估时才查找。
    pub fn new(config: ConditionConfig, engine: &Engine) -> Result<Self> {
        if config.fact.is_empty() {
            return Err(RuleError::MissingProperty("fact"));
        }

        if config.operator.is_empty() {
            return Err(RuleError::MissingProperty("operator"));
        }

        Ok(Self {
            fact: config.fact,
            operator: config.operator,
            value: config.value,
            value_type: config.value_type,
            message: config.message,
            engine: engine.clone(),
        })
    }

    pub fn fact(&self) -> &str {
        &self.fact
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// 评估条件
    ///
    /// 解析器或操作符返回的错误原样向上传递。
    pub fn evaluate(&self, data: &Value) -> Result<Evaluation> {
        let resolver = self.engine.get_resolver(&self.fact);
        let fact_value = resolver(data, &self.fact)?;
        let operator = self.engine.get_operator(&self.operator)?;

        let matched = operator.evaluate(&fact_value, &self.value, self.value_type)?;

        trace!(
            fact = %self.fact,
            operator = %self.operator,
            matched,
            "条件评估完成"
        );

        if matched {
            Ok(Evaluation::passed())
        } else {
            Ok(Evaluation::failed(self.message.clone()))
        }
    }

    pub fn to_json(&self) -> ConditionConfig {
        ConditionConfig {
            fact: self.fact.clone(),
            operator: self.operator.clone(),
            value: self.value.clone(),
            value_type: self.value_type,
            message: self.message.clone(),
        }
    }
}

/// 规则节点（规则或条件）
#[derive(Debug, Clone)]
pub enum RuleNode {
    Rule(Rule),
    Condition(Condition),
}

impl RuleNode {
    pub fn evaluate(&self, data: &Value) -> Result<Evaluation> {
        match self {
            Self::Rule(rule) => rule.evaluate(data),
            Self::Condition(condition) => condition.evaluate(data),
        }
    }

    pub fn to_json(&self, format: JsonFormat) -> NodeJson {
        match self {
            Self::Rule(rule) => NodeJson::Rule(rule.to_json(format)),
            Self::Condition(condition) => NodeJson::Condition(condition.to_json()),
        }
    }

    /// 按配置构建节点
    pub fn from_json(json: NodeJson, engine: &Engine) -> Result<Self> {
        match json {
            NodeJson::Rule(rule) => Rule::from_json(rule, engine).map(Self::Rule),
            NodeJson::Condition(condition) => {
                Condition::new(condition, engine).map(Self::Condition)
            }
        }
    }
}

impl From<Rule> for RuleNode {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

impl From<Condition> for RuleNode {
    fn from(condition: Condition) -> Self {
        Self::Condition(condition)
    }
}

/// 逻辑规则节点
#[derive(Debug, Clone)]
pub struct Rule {
    relation: Relation,
    items: Vec<RuleNode>,
    engine: Engine,
}

impl Rule {
    /// 创建不含子节点的 AND 规则
    pub fn new(engine: &Engine) -> Self {
        Self::with_relation(Relation::And, engine)
    }

    pub fn with_relation(relation: Relation, engine: &Engine) -> Self {
        Self {
            relation,
            items: Vec::new(),
            engine: engine.clone(),
        }
    }

    /// 从规则配置构建规则树
    pub fn from_json(json: RuleJson, engine: &Engine) -> Result<Self> {
        let items = json
            .items
            .into_iter()
            .map(|item| RuleNode::from_json(item, engine))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            relation: json.relation,
            items,
            engine: engine.clone(),
        })
    }

    /// 从 JSON 值构建规则树
    pub fn from_value(value: Value, engine: &Engine) -> Result<Self> {
        Self::from_json(RuleJson::try_from(value)?, engine)
    }

    /// 从 JSON 字符串构建规则树
    pub fn parse(json: &str, engine: &Engine) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value, engine)
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn set_relation(&mut self, relation: Relation) -> &mut Self {
        self.relation = relation;
        self
    }

    pub fn items(&self) -> &[RuleNode] {
        &self.items
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// 追加子节点
    pub fn add(&mut self, node: impl Into<RuleNode>) -> &mut Self {
        self.items.push(node.into());
        self
    }

    /// 评估规则（短路求值）
    ///
    /// AND 遇到第一个不匹配的子节点立即返回，OR 遇到第一个匹配的子节点立即返回。
    /// 失败时返回按顺序遇到的第一条失败消息；OR 成功时丢弃消息。
    pub fn evaluate(&self, data: &Value) -> Result<Evaluation> {
        let mut first_message: Option<String> = None;

        for (i, item) in self.items.iter().enumerate() {
            let Evaluation { result, message } = item.evaluate(data)?;

            if first_message.is_none() {
                first_message = message.filter(|m| !m.is_empty());
            }

            match self.relation {
                Relation::And if !result => {
                    trace!(index = i, "AND 短路 - 子节点不匹配");
                    return Ok(Evaluation::failed(first_message));
                }
                Relation::Or if result => {
                    trace!(index = i, "OR 短路 - 子节点匹配");
                    return Ok(Evaluation::passed());
                }
                _ => {}
            }
        }

        match self.relation {
            Relation::And => Ok(Evaluation::passed()),
            Relation::Or => Ok(Evaluation::failed(first_message)),
        }
    }

    /// 导出为指定格式的规则配置，嵌套规则使用同一格式
    pub fn to_json(&self, format: JsonFormat) -> RuleJson {
        RuleJson {
            format,
            relation: self.relation,
            items: self.items.iter().map(|item| item.to_json(format)).collect(),
        }
    }
}

impl Serialize for Rule {
    /// 默认按简化格式序列化
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json(JsonFormat::Simplified).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Operator;
    use crate::path::Fact;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn person() -> Value {
        json!({
            "name": "Luke Skywalker",
            "height": 172,
            "eyeColor": "blue",
            "homeWorld": {"name": "Tatooine"},
            "vehicles": ["Snowspeeder", "Imperial Speeder Bike"]
        })
    }

    #[test]
    fn test_condition_requires_fact_and_operator() {
        let engine = Engine::new();

        let err = Condition::new(ConditionConfig::new("", "equals", 1), &engine).unwrap_err();
        assert!(matches!(err, RuleError::MissingProperty("fact")));

        let err = Condition::new(ConditionConfig::new("a", "", 1), &engine).unwrap_err();
        assert!(matches!(err, RuleError::MissingProperty("operator")));
    }

    #[test]
    fn test_condition_between() {
        let engine = Engine::new();
        let condition =
            Condition::new(ConditionConfig::new("height", "between", json!([170, 180])), &engine)
                .unwrap();

        assert_eq!(
            condition.evaluate(&json!({"height": 172})).unwrap(),
            Evaluation::passed()
        );
    }

    #[test]
    fn test_condition_message_only_on_failure() {
        let engine = Engine::new();
        let config = ConditionConfig::new("name", "equals", "Luke Skywalker").with_message("unknown");
        let condition = Condition::new(config, &engine).unwrap();

        assert_eq!(condition.evaluate(&person()).unwrap(), Evaluation::passed());
        assert_eq!(
            condition.evaluate(&json!({"name": "R2"})).unwrap(),
            Evaluation::failed(Some("unknown".to_string()))
        );

        let silent = Condition::new(ConditionConfig::new("name", "equals", "Han"), &engine).unwrap();
        assert_eq!(silent.evaluate(&person()).unwrap().message, None);
    }

    #[test]
    fn test_unknown_operator_fails_at_evaluation() {
        let engine = Engine::new();
        let condition =
            Condition::new(ConditionConfig::new("name", "sounds_like", "Luke"), &engine).unwrap();

        let err = condition.evaluate(&person()).unwrap_err();
        assert!(matches!(err, RuleError::OperatorNotFound(ref name) if name == "sounds_like"));
    }

    #[test]
    fn test_removed_operator_surfaces_lazily() {
        let engine = Engine::new();
        let condition =
            Condition::new(ConditionConfig::new("name", "equals", "Luke Skywalker"), &engine)
                .unwrap();
        assert!(condition.evaluate(&person()).unwrap().result);

        engine.remove_operator("equals");
        assert!(matches!(
            condition.evaluate(&person()),
            Err(RuleError::OperatorNotFound(_))
        ));
    }

    #[test]
    fn test_empty_rules() {
        let engine = Engine::new();
        let data = person();

        assert!(Rule::new(&engine).evaluate(&data).unwrap().result);
        assert!(!Rule::with_relation(Relation::Or, &engine).evaluate(&data).unwrap().result);
        assert_eq!(
            Rule::with_relation(Relation::Or, &engine).evaluate(&data).unwrap(),
            Evaluation::failed(None)
        );
    }

    #[test]
    fn test_nested_rule() {
        let engine = Engine::new();
        let rule = Rule::from_value(
            json!({
                "and": [
                    {"fact": "name", "operator": "equals", "value": "Luke Skywalker"},
                    {
                        "or": [
                            {"fact": "height", "operator": "lessThan", "value": 200},
                            {"fact": "height", "operator": "greaterThan", "value": 100}
                        ]
                    }
                ]
            }),
            &engine,
        )
        .unwrap();

        assert_eq!(rule.relation(), Relation::And);
        assert_eq!(rule.items().len(), 2);
        assert!(matches!(rule.items()[0], RuleNode::Condition(_)));
        assert!(matches!(&rule.items()[1], RuleNode::Rule(r) if r.relation() == Relation::Or));
        assert_eq!(
            rule.evaluate(&json!({"name": "Luke Skywalker", "height": 172})).unwrap(),
            Evaluation::passed()
        );
    }

    #[test]
    fn test_and_short_circuits() {
        let engine = Engine::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        engine
            .add_operator(Operator::new("counted", move |_, expected, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(expected.as_bool().unwrap_or(false))
            }))
            .unwrap();

        let rule = Rule::from_value(
            json!({
                "and": [
                    {"fact": "a", "operator": "counted", "value": true},
                    {"fact": "b", "operator": "counted", "value": false, "message": "b failed"},
                    {"fact": "c", "operator": "counted", "value": true, "message": "never"}
                ]
            }),
            &engine,
        )
        .unwrap();

        assert_eq!(
            rule.evaluate(&json!({})).unwrap(),
            Evaluation::failed(Some("b failed".to_string()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_or_short_circuits_and_drops_message() {
        let engine = Engine::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        engine.add_resolver("tracked", move |data, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Fact::from(data["name"].clone()))
        });

        let rule = Rule::from_value(
            json!({
                "or": [
                    {"fact": "tracked", "operator": "equals", "value": "Han", "message": "not han"},
                    {"fact": "tracked", "operator": "equals", "value": "Luke Skywalker"},
                    {"fact": "tracked", "operator": "equals", "value": "Leia"}
                ]
            }),
            &engine,
        )
        .unwrap();

        assert_eq!(rule.evaluate(&person()).unwrap(), Evaluation::passed());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_or_returns_first_message() {
        let engine = Engine::new();
        let rule = Rule::from_value(
            json!({
                "or": [
                    {"fact": "name", "operator": "equals", "value": "Han"},
                    {"fact": "name", "operator": "equals", "value": "Leia", "message": "first"},
                    {"fact": "name", "operator": "equals", "value": "Chewie", "message": "second"}
                ]
            }),
            &engine,
        )
        .unwrap();

        assert_eq!(
            rule.evaluate(&person()).unwrap(),
            Evaluation::failed(Some("first".to_string()))
        );
    }

    #[test]
    fn test_nested_failure_message_bubbles_up() {
        let engine = Engine::new();
        let rule = Rule::from_value(
            json!({
                "and": [
                    {"fact": "name", "operator": "equals", "value": "Luke Skywalker"},
                    {
                        "or": [
                            {"fact": "height", "operator": "greaterThan", "value": 200, "message": "too short"},
                            {"fact": "eyeColor", "operator": "equals", "value": "green"}
                        ]
                    }
                ]
            }),
            &engine,
        )
        .unwrap();

        assert_eq!(
            rule.evaluate(&person()).unwrap(),
            Evaluation::failed(Some("too short".to_string()))
        );
    }

    #[test]
    fn test_operator_error_propagates() {
        let engine = Engine::new();
        engine
            .add_operator(Operator::new("boom", |_, _, _| {
                Err(RuleError::Operator("boom".to_string()))
            }))
            .unwrap();

        let rule = Rule::from_value(
            json!({"or": [{"fact": "name", "operator": "boom", "value": null}]}),
            &engine,
        )
        .unwrap();

        assert!(matches!(rule.evaluate(&person()), Err(RuleError::Operator(msg)) if msg == "boom"));
    }

    #[test]
    fn test_to_json_roundtrip() {
        let engine = Engine::new();
        let rule = Rule::from_value(
            json!({
                "or": [
                    {"fact": "name", "operator": "equals", "value": "Han", "message": "who?"},
                    {"and": [{"fact": "height", "operator": "between", "value": [170, 180], "type": "number"}]}
                ]
            }),
            &engine,
        )
        .unwrap();

        for format in [JsonFormat::Simplified, JsonFormat::Structured] {
            let json = serde_json::to_value(rule.to_json(format)).unwrap();
            let restored = Rule::from_value(json, &engine).unwrap();

            for data in [person(), json!({"name": "Han"}), json!({"height": 190})] {
                assert_eq!(
                    restored.evaluate(&data).unwrap(),
                    rule.evaluate(&data).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_serialize_defaults_to_simplified() {
        let engine = Engine::new();
        let mut rule = Rule::new(&engine);
        rule.add(
            Condition::new(ConditionConfig::new("name", "equals", "Luke Skywalker"), &engine)
                .unwrap(),
        );

        assert_eq!(
            serde_json::to_string(&rule).unwrap(),
            r#"{"and":[{"fact":"name","operator":"equals","value":"Luke Skywalker"}]}"#
        );
    }

    #[test]
    fn test_add_and_set_relation() {
        let engine = Engine::new();
        let mut rule = Rule::new(&engine);
        rule.set_relation(Relation::Or)
            .add(Condition::new(ConditionConfig::new("name", "equals", "Han"), &engine).unwrap())
            .add(Rule::new(&engine));

        assert_eq!(rule.relation(), Relation::Or);
        assert_eq!(rule.items().len(), 2);
        // 空 AND 子规则为真
        assert!(rule.evaluate(&person()).unwrap().result);
    }

    #[test]
    fn test_parse_from_str() {
        let engine = Engine::new();
        let rule = Rule::parse(
            r#"{"relation": "and", "conditions": [{"fact": "name", "operator": "equals", "value": "Luke Skywalker", "message": "unknown"}]}"#,
            &engine,
        )
        .unwrap();

        assert_eq!(
            rule.evaluate(&json!({"name": "R2"})).unwrap(),
            Evaluation::failed(Some("unknown".to_string()))
        );
        assert!(matches!(
            Rule::parse("{not json", &engine),
            Err(RuleError::JsonError(_))
        ));
    }

    #[test]
    fn test_nested_condition_missing_fact() {
        let engine = Engine::new();
        let err = Rule::from_value(json!({"and": [{}]}), &engine).unwrap_err();
        assert!(matches!(err, RuleError::MissingProperty("fact")));
    }
}
