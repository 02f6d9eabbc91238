//! 事实路径解析
//!
//! 将点号/方括号路径（如 `state.name`、`fruit[0].type`、`fruit[*].color`）
//! 解析为数据中的值。`[*]` 通配符会把后续的单个属性映射到数组的每个元素上，
//! 缺失的元素保留为未定义槽位，而不是被过滤掉。

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;

/// 路径分隔符：`.`、`[数字]`、`[*]`
static PATH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.|\[(\d+|\*)\]").expect("路径分隔符正则无效"));

/// 禁止访问的键，出现在任意位置都直接返回默认值
const DISALLOWED_KEYS: [&str; 3] = ["__proto__", "prototype", "constructor"];

const WILDCARD: &str = "*";
const LENGTH: &str = "length";

/// 解析得到的事实值
///
/// JSON 本身没有 `undefined`，这里用 [`Fact::Undefined`] 表示"路径不存在"，
/// 与显式的 `null` 区分开。通配展开的结果为 [`Fact::Spread`]，其中 `None`
/// 表示该元素上不存在对应属性。
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Fact {
    #[default]
    Undefined,
    Value(Value),
    Spread(Vec<Option<Value>>),
}

impl Fact {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// 转换为 JSON 值；展开结果转为数组，未定义槽位转为 `null`
    pub fn to_value(&self) -> Option<Cow<'_, Value>> {
        match self {
            Self::Undefined => None,
            Self::Value(value) => Some(Cow::Borrowed(value)),
            Self::Spread(items) => Some(Cow::Owned(Value::Array(
                items
                    .iter()
                    .map(|item| item.clone().unwrap_or(Value::Null))
                    .collect(),
            ))),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Undefined => None,
            Self::Value(value) => Some(value),
            Self::Spread(items) => Some(Value::Array(
                items
                    .into_iter()
                    .map(|item| item.unwrap_or(Value::Null))
                    .collect(),
            )),
        }
    }
}

impl From<Value> for Fact {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Option<Value>> for Fact {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Undefined, Self::Value)
    }
}

impl Serialize for Fact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined => serializer.serialize_none(),
            Self::Value(value) => value.serialize(serializer),
            Self::Spread(items) => items.serialize(serializer),
        }
    }
}

/// 解析路径，不存在时返回 [`Fact::Undefined`]
pub fn resolve(root: &Value, path: &str) -> Fact {
    resolve_or(root, path, Fact::Undefined)
}

/// 解析路径，不存在时返回 `fallback`
///
/// 注意只有"不存在"才会回退，路径上遇到的 `null` 会原样返回。
pub fn resolve_or(root: &Value, path: &str, fallback: Fact) -> Fact {
    if !is_container(root) {
        return fallback;
    }

    let Some(tokens) = tokenize(path) else {
        return fallback;
    };

    let mut current = Cursor::Value(Cow::Borrowed(root));
    let mut wildcard = false;

    for token in tokens {
        if token == WILDCARD {
            wildcard = true;
            continue;
        }

        let expand = wildcard && !is_index(token);
        wildcard = false;

        current = match current {
            Cursor::Spread(items) if expand => Cursor::Spread(map_items(items, token)),
            Cursor::Spread(items) => spread_property(items, token),
            Cursor::Value(value) if expand => match into_items(value) {
                Ok(items) => Cursor::Spread(map_items(items, token)),
                Err(value) => Cursor::from(step(value, token)),
            },
            Cursor::Value(value) => Cursor::from(step(value, token)),
            Cursor::Undefined => Cursor::Undefined,
        };

        if current.is_nullish() {
            break;
        }
    }

    match current {
        Cursor::Undefined => fallback,
        Cursor::Value(value) => Fact::Value(value.into_owned()),
        Cursor::Spread(items) => {
            Fact::Spread(items.into_iter().map(|item| item.map(Cow::into_owned)).collect())
        }
    }
}

/// 拆分路径
///
/// - `obj.value` => `["obj", "value"]`
/// - `obj.ary[0].value` => `["obj", "ary", "0", "value"]`
/// - `obj.ary[*].value` => `["obj", "ary", "*", "value"]`
///
/// 路径为空或包含禁止访问的键时返回 `None`。
fn tokenize(path: &str) -> Option<Vec<&str>> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in PATH_SEPARATOR.captures_iter(path) {
        let Some(separator) = caps.get(0) else {
            continue;
        };
        tokens.push(&path[last..separator.start()]);
        if let Some(index) = caps.get(1) {
            tokens.push(index.as_str());
        }
        last = separator.end();
    }
    tokens.push(&path[last..]);
    tokens.retain(|token| !token.is_empty());

    if tokens.is_empty() || tokens.iter().any(|token| DISALLOWED_KEYS.contains(token)) {
        return None;
    }

    Some(tokens)
}

/// 遍历过程中的当前位置
enum Cursor<'a> {
    Undefined,
    Value(Cow<'a, Value>),
    Spread(Vec<Option<Cow<'a, Value>>>),
}

impl Cursor<'_> {
    fn is_nullish(&self) -> bool {
        match self {
            Self::Undefined => true,
            Self::Value(value) => value.is_null(),
            Self::Spread(_) => false,
        }
    }
}

impl<'a> From<Option<Cow<'a, Value>>> for Cursor<'a> {
    fn from(value: Option<Cow<'a, Value>>) -> Self {
        value.map_or(Self::Undefined, Self::Value)
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// 是否为纯数字的下标记号，通配符后遇到它时不展开
fn is_index(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// 解析规范的数组下标（`0`、`12`，不含前导零）
fn parse_index(token: &str) -> Option<usize> {
    let index: usize = token.parse().ok()?;
    (index.to_string() == token).then_some(index)
}

/// 普通属性访问
fn step<'a>(value: Cow<'a, Value>, key: &str) -> Option<Cow<'a, Value>> {
    match value {
        Cow::Borrowed(value) => lookup(value, key),
        Cow::Owned(value) => lookup(&value, key).map(|found| Cow::Owned(found.into_owned())),
    }
}

fn lookup<'a>(value: &'a Value, key: &str) -> Option<Cow<'a, Value>> {
    match value {
        Value::Object(map) => map.get(key).map(Cow::Borrowed),
        Value::Array(items) => {
            if key == LENGTH {
                return Some(Cow::Owned(Value::from(items.len())));
            }
            items.get(parse_index(key)?).map(Cow::Borrowed)
        }
        Value::String(s) => {
            if key == LENGTH {
                return Some(Cow::Owned(Value::from(s.encode_utf16().count())));
            }
            // 与 length 一致按 UTF-16 码元取下标，落在代理对中间时得到替换字符
            let unit = s.encode_utf16().nth(parse_index(key)?)?;
            Some(Cow::Owned(Value::String(String::from_utf16_lossy(&[unit]))))
        }
        _ => None,
    }
}

fn into_items(value: Cow<'_, Value>) -> Result<Vec<Option<Cow<'_, Value>>>, Cow<'_, Value>> {
    match value {
        Cow::Borrowed(Value::Array(items)) => {
            Ok(items.iter().map(|item| Some(Cow::Borrowed(item))).collect())
        }
        Cow::Owned(Value::Array(items)) => {
            Ok(items.into_iter().map(|item| Some(Cow::Owned(item))).collect())
        }
        other => Err(other),
    }
}

/// 通配展开：对每个元素取同一个属性，非对象元素（含 `null`）得到未定义槽位
fn map_items<'a>(items: Vec<Option<Cow<'a, Value>>>, key: &str) -> Vec<Option<Cow<'a, Value>>> {
    items
        .into_iter()
        .map(|item| {
            item.filter(|value| is_container(value))
                .and_then(|value| step(value, key))
        })
        .collect()
}

/// 在展开结果上做普通访问，行为与数组一致
fn spread_property<'a>(items: Vec<Option<Cow<'a, Value>>>, key: &str) -> Cursor<'a> {
    if key == LENGTH {
        return Cursor::Value(Cow::Owned(Value::from(items.len())));
    }

    match parse_index(key) {
        Some(index) => Cursor::from(items.into_iter().nth(index).flatten()),
        None => Cursor::Undefined,
    }
}
