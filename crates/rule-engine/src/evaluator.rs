//! 内置操作符评估器
//!
//! 实现内置操作符的比较逻辑。比较语义贴近 JavaScript：数值按大小比较，
//! 字符串按字典序比较，混合类型先尝试数值转换，无法转换时不匹配。

use crate::error::{Result, RuleError};
use crate::operators::{BuiltinOperator, ValueType};
use crate::path::Fact;
use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::LazyLock;

const REGEX_CACHE_MAX: usize = 256;

/// 已编译正则缓存，键为 (pattern, flags)
static REGEX_CACHE: LazyLock<DashMap<(String, String), Regex>> = LazyLock::new(DashMap::new);

/// 按类型提示转换后的操作数
///
/// 数值提示下的标量保留为 `f64`，`Infinity` 不会退化成 JSON 的 `null`。
enum Operand<'a> {
    Json(Cow<'a, Value>),
    Number(f64),
}

impl Operand<'_> {
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Json(value) => ConditionEvaluator::to_number(value),
            Self::Number(n) => Some(*n),
        }
    }
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估内置操作符
    ///
    /// # Arguments
    /// * `operator` - 内置操作符
    /// * `fact` - 解析得到的事实值
    /// * `expected` - 条件中配置的比较值
    /// * `value_type` - 可选的类型提示
    pub fn evaluate(
        operator: BuiltinOperator,
        fact: &Fact,
        expected: &Value,
        value_type: Option<ValueType>,
    ) -> Result<bool> {
        match operator {
            BuiltinOperator::Equals => Ok(Self::equals(fact, expected, value_type)),
            BuiltinOperator::NotEquals => Ok(!Self::equals(fact, expected, value_type)),
            BuiltinOperator::In => Self::in_list(fact, expected),
            BuiltinOperator::NotIn => Self::in_list(fact, expected).map(|r| !r),
            BuiltinOperator::Contains => Self::contains(fact, expected),
            BuiltinOperator::NotContains => Self::contains(fact, expected).map(|r| !r),
            BuiltinOperator::LessThan => Ok(Self::compare(fact, expected, value_type, |o| {
                o == Ordering::Less
            })),
            BuiltinOperator::LessThanOrEquals => {
                Ok(Self::compare(fact, expected, value_type, |o| {
                    o != Ordering::Greater
                }))
            }
            BuiltinOperator::GreaterThan => Ok(Self::compare(fact, expected, value_type, |o| {
                o == Ordering::Greater
            })),
            BuiltinOperator::GreaterThanOrEquals => {
                Ok(Self::compare(fact, expected, value_type, |o| {
                    o != Ordering::Less
                }))
            }
            BuiltinOperator::Between => Self::between(fact, expected, value_type),
            BuiltinOperator::IsTrue => Ok(Self::is_bool(fact, value_type, true)),
            BuiltinOperator::IsFalse => Ok(Self::is_bool(fact, value_type, false)),
            BuiltinOperator::MatchRegExp => Self::regex_match(fact, expected),
            BuiltinOperator::NotMatchRegExp => Self::regex_match(fact, expected).map(|r| !r),
        }
    }

    /// 严格相等（`a === b`），未定义的事实不等于任何值
    fn equals(fact: &Fact, expected: &Value, value_type: Option<ValueType>) -> bool {
        match (
            Self::operand(fact, value_type),
            Self::coerce(Cow::Borrowed(expected), value_type),
        ) {
            (Some(Operand::Json(a)), Some(Operand::Json(b))) => Self::strict_eq(&a, &b),
            (Some(Operand::Number(a)), Some(Operand::Number(b))) => a == b,
            _ => false,
        }
    }

    /// 列表/字符串包含检查（`b.indexOf(a) > -1`）
    fn in_list(fact: &Fact, expected: &Value) -> Result<bool> {
        match expected {
            Value::Array(items) => Ok(fact
                .to_value()
                .is_some_and(|a| items.iter().any(|item| Self::strict_eq(&a, item)))),
            Value::String(s) => Ok(fact
                .to_value()
                .and_then(|a| Self::js_string(&a))
                .is_some_and(|needle| s.contains(needle.as_str()))),
            other => Err(RuleError::TypeMismatch {
                expected: "array or string".to_string(),
                actual: Self::type_name(other).to_string(),
            }),
        }
    }

    /// 事实包含比较值（`a.indexOf(b) > -1`）
    fn contains(fact: &Fact, expected: &Value) -> Result<bool> {
        match fact {
            Fact::Undefined | Fact::Value(Value::Null) => Ok(false),
            Fact::Spread(items) => Ok(items
                .iter()
                .flatten()
                .any(|item| Self::strict_eq(item, expected))),
            Fact::Value(Value::Array(items)) => {
                Ok(items.iter().any(|item| Self::strict_eq(item, expected)))
            }
            Fact::Value(Value::String(s)) => Ok(Self::js_string(expected)
                .is_some_and(|needle| s.contains(needle.as_str()))),
            Fact::Value(other) => Err(RuleError::TypeMismatch {
                expected: "string or array".to_string(),
                actual: Self::type_name(other).to_string(),
            }),
        }
    }

    /// 大小比较，无法比较时（含未定义、NaN）返回 false
    fn compare<F>(fact: &Fact, expected: &Value, value_type: Option<ValueType>, cmp: F) -> bool
    where
        F: Fn(Ordering) -> bool,
    {
        let Some(a) = Self::operand(fact, value_type) else {
            return false;
        };
        let Some(b) = Self::coerce(Cow::Borrowed(expected), value_type) else {
            return false;
        };

        Self::order(&a, &b).is_some_and(cmp)
    }

    /// 范围比较 (between)
    /// expected 应为 [min, max] 数组
    fn between(fact: &Fact, expected: &Value, value_type: Option<ValueType>) -> Result<bool> {
        let range = match expected.as_array() {
            Some(arr) if arr.len() == 2 => arr,
            _ => {
                return Err(RuleError::TypeMismatch {
                    expected: "array [min, max]".to_string(),
                    actual: Self::type_name(expected).to_string(),
                });
            }
        };

        Ok(
            Self::compare(fact, &range[0], value_type, |o| o != Ordering::Less)
                && Self::compare(fact, &range[1], value_type, |o| o != Ordering::Greater),
        )
    }

    fn is_bool(fact: &Fact, value_type: Option<ValueType>, expected: bool) -> bool {
        match Self::operand(fact, value_type) {
            Some(Operand::Json(value)) => value.as_bool() == Some(expected),
            _ => false,
        }
    }

    /// 正则表达式匹配
    ///
    /// expected 为 pattern 字符串或 `[pattern, flags]` 数组。
    fn regex_match(fact: &Fact, expected: &Value) -> Result<bool> {
        let (pattern, flags) = Self::regex_source(expected)?;
        let regex = Self::cached_regex(pattern, flags)?;

        let subject = match fact.to_value().as_deref() {
            Some(Value::String(s)) => s.clone(),
            Some(value @ (Value::Number(_) | Value::Bool(_))) => match Self::js_string(value) {
                Some(s) => s,
                None => return Ok(false),
            },
            _ => return Ok(false),
        };

        Ok(regex.is_match(&subject))
    }

    fn regex_source(expected: &Value) -> Result<(&str, &str)> {
        match expected {
            Value::String(pattern) => Ok((pattern.as_str(), "")),
            Value::Array(parts) => match parts.as_slice() {
                [Value::String(pattern)] => Ok((pattern.as_str(), "")),
                [Value::String(pattern), Value::String(flags)] => {
                    Ok((pattern.as_str(), flags.as_str()))
                }
                _ => Err(RuleError::TypeMismatch {
                    expected: "[pattern, flags]".to_string(),
                    actual: "array".to_string(),
                }),
            },
            other => Err(RuleError::TypeMismatch {
                expected: "string (regex pattern) or [pattern, flags]".to_string(),
                actual: Self::type_name(other).to_string(),
            }),
        }
    }

    fn cached_regex(pattern: &str, flags: &str) -> Result<Regex> {
        let key = (pattern.to_string(), flags.to_string());
        if let Some(regex) = REGEX_CACHE.get(&key) {
            return Ok(regex.clone());
        }

        let regex = Self::build_regex(pattern, flags)?;

        if REGEX_CACHE.len() >= REGEX_CACHE_MAX {
            REGEX_CACHE.clear();
        }
        REGEX_CACHE.insert(key, regex.clone());

        Ok(regex)
    }

    fn build_regex(pattern: &str, flags: &str) -> Result<Regex> {
        let mut builder = RegexBuilder::new(pattern);

        let mut seen = String::with_capacity(flags.len());
        for flag in flags.chars() {
            if seen.contains(flag) {
                return Err(RuleError::InvalidRegex {
                    pattern: pattern.to_string(),
                    reason: format!("重复的标志 '{}'", flag),
                });
            }
            seen.push(flag);

            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                // 全局/粘滞/下标标志对单次匹配无意义，unicode 默认开启
                'g' | 'y' | 'u' | 'd' => {}
                other => {
                    return Err(RuleError::InvalidRegex {
                        pattern: pattern.to_string(),
                        reason: format!("不支持的标志 '{}'", other),
                    });
                }
            }
        }

        builder.build().map_err(|e| RuleError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
    }

    /// 取出事实值并按类型提示转换
    fn operand(fact: &Fact, value_type: Option<ValueType>) -> Option<Operand<'_>> {
        Self::coerce(fact.to_value()?, value_type)
    }

    /// 按类型提示转换标量，数值转换失败（NaN）时返回 None
    fn coerce(value: Cow<'_, Value>, value_type: Option<ValueType>) -> Option<Operand<'_>> {
        let Some(value_type) = value_type else {
            return Some(Operand::Json(value));
        };
        if matches!(value.as_ref(), Value::Array(_) | Value::Object(_)) {
            return Some(Operand::Json(value));
        }

        match value_type {
            ValueType::String => Self::js_string(&value)
                .map(|s| Operand::Json(Cow::Owned(Value::String(s)))),
            ValueType::Number => Self::to_number(&value).map(Operand::Number),
            ValueType::Boolean => Some(Operand::Json(Cow::Owned(Value::Bool(Self::truthy(
                &value,
            ))))),
        }
    }

    /// 严格相等：数值按大小比较（100 == 100.0），容器按结构比较
    fn strict_eq(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => x == y,
            },
            (Value::Array(x), Value::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(x, y)| Self::strict_eq(x, y))
            }
            (Value::Object(x), Value::Object(y)) => {
                x.len() == y.len()
                    && x
                        .iter()
                        .all(|(k, v)| y.get(k).is_some_and(|other| Self::strict_eq(v, other)))
            }
            _ => a == b,
        }
    }

    fn order(a: &Operand<'_>, b: &Operand<'_>) -> Option<Ordering> {
        if let (Operand::Json(x), Operand::Json(y)) = (a, b) {
            if let (Value::String(x), Value::String(y)) = (x.as_ref(), y.as_ref()) {
                return Some(x.cmp(y));
            }
        }

        a.as_number()?.partial_cmp(&b.as_number()?)
    }

    /// 数值转换：null 为 0，布尔为 0/1，字符串按数字字面量解析（空串为 0）
    fn to_number(value: &Value) -> Option<f64> {
        match value {
            Value::Null => Some(0.0),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64(),
            Value::String(s) => Self::parse_number(s.trim()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// 解析数字字符串，语法与 JavaScript `Number()` 一致
    ///
    /// 接受十进制（含小数与指数）、`Infinity`、`0x`/`0o`/`0b` 前缀；
    /// `inf`、`nan` 等其他写法视为无法转换。
    fn parse_number(s: &str) -> Option<f64> {
        match s {
            "" => return Some(0.0),
            "Infinity" | "+Infinity" => return Some(f64::INFINITY),
            "-Infinity" => return Some(f64::NEG_INFINITY),
            _ => {}
        }

        let radix = match s.get(..2) {
            Some("0x" | "0X") => Some(16),
            Some("0o" | "0O") => Some(8),
            Some("0b" | "0B") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            let digits = &s[2..];
            if digits.is_empty() {
                return None;
            }
            return digits.chars().try_fold(0.0_f64, |acc, c| {
                c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
            });
        }

        if !s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        {
            return None;
        }
        s.parse::<f64>().ok()
    }

    /// 标量的字符串形式，整数不带小数点
    fn js_string(value: &Value) -> Option<String> {
        match value {
            Value::Null => Some("null".to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => Some(i.to_string()),
                (_, Some(u), _) => Some(u.to_string()),
                (_, _, Some(f)) => Some(f.to_string()),
                _ => Some(n.to_string()),
            },
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn truthy(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// 获取值的类型名称
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
}
