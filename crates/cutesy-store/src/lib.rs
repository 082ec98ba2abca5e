//! State container contract and an in-memory JSON implementation.
//!
//! Values are addressed with JSON pointers. Both `""` and `"/"` address the whole state.

use cutesy_core::EditorError;
use cutesy_core::EditorResult;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::trace;

/// Callback invoked with the new value at the subscribed path.
pub type Subscriber = Box<dyn FnMut(&Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Key-pathed store consumed by the editor.
pub trait StateContainer {
    /// Snapshot of the value at `path`, or `None` when nothing lives there.
    fn retrieve(&self, path: &str) -> Option<Value>;

    /// Replaces the value at `path` and notifies affected subscribers.
    fn commit(&mut self, path: &str, value: Value) -> EditorResult<()>;

    fn subscribe(&mut self, path: &str, subscriber: Subscriber) -> EditorResult<SubscriptionId>;

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Create missing intermediate objects on commit.
    pub create_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_missing: true,
        }
    }
}

impl StoreConfig {
    pub fn with_create_missing(mut self, create_missing: bool) -> Self {
        self.create_missing = create_missing;
        self
    }
}

struct Subscription {
    id: SubscriptionId,
    segments: Vec<String>,
    pointer: String,
    callback: Subscriber,
}

pub struct MemoryStore {
    config: StoreConfig,
    state: Value,
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_state(config, Value::Object(Map::new()))
    }

    pub fn with_state(config: StoreConfig, state: Value) -> Self {
        Self {
            config,
            state,
            subscriptions: Vec::new(),
            next_id: 0,
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// Whole state, borrowed.
    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn write(&mut self, segments: &[String], value: Value) -> EditorResult<()> {
        let Some((last, parents)) = segments.split_last() else {
            self.state = value;
            return Ok(());
        };

        let create_missing = self.config.create_missing;
        let mut cursor = &mut self.state;
        for segment in parents {
            if cursor.is_null() && create_missing {
                *cursor = Value::Object(Map::new());
            }
            cursor = match cursor {
                Value::Object(map) => {
                    if !map.contains_key(segment) {
                        if !create_missing {
                            return Err(unresolvable(segments));
                        }
                        map.insert(segment.clone(), Value::Object(Map::new()));
                    }
                    map.get_mut(segment)
                        .ok_or_else(|| unresolvable(segments))?
                }
                Value::Array(items) => {
                    let index = parse_index(segment).ok_or_else(|| unresolvable(segments))?;
                    let len = items.len();
                    items
                        .get_mut(index)
                        .ok_or_else(|| out_of_range(segments, index, len))?
                }
                _ => return Err(unresolvable(segments)),
            };
        }

        if cursor.is_null() && create_missing {
            *cursor = Value::Object(Map::new());
        }
        match cursor {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            Value::Array(items) => {
                let len = items.len();
                let index = if last == "-" {
                    len
                } else {
                    parse_index(last).ok_or_else(|| unresolvable(segments))?
                };
                if index < len {
                    items[index] = value;
                    Ok(())
                } else if index == len {
                    items.push(value);
                    Ok(())
                } else {
                    Err(out_of_range(segments, index, len))
                }
            }
            _ => Err(unresolvable(segments)),
        }
    }
}

impl StateContainer for MemoryStore {
    fn retrieve(&self, path: &str) -> Option<Value> {
        let segments = parse_pointer(path).ok()?;
        lookup(&self.state, &segments).cloned()
    }

    fn commit(&mut self, path: &str, value: Value) -> EditorResult<()> {
        let segments = parse_pointer(path)?;

        let before: Vec<Option<Value>> = self
            .subscriptions
            .iter()
            .map(|sub| {
                if related(&sub.segments, &segments) {
                    Some(lookup(&self.state, &sub.segments).cloned().unwrap_or(Value::Null))
                } else {
                    None
                }
            })
            .collect();

        self.write(&segments, value)?;
        debug!(path, "committed value");

        let state = &self.state;
        for (sub, previous) in self.subscriptions.iter_mut().zip(before) {
            let Some(previous) = previous else {
                continue;
            };
            let current = lookup(state, &sub.segments).cloned().unwrap_or(Value::Null);
            if current == previous {
                trace!(subscriber = %sub.pointer, "value unchanged, skipping notification");
                continue;
            }
            trace!(subscriber = %sub.pointer, "notifying subscriber");
            (sub.callback)(&current);
        }
        Ok(())
    }

    fn subscribe(&mut self, path: &str, subscriber: Subscriber) -> EditorResult<SubscriptionId> {
        let segments = parse_pointer(path)?;
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.subscriptions.push(Subscription {
            id,
            segments,
            pointer: path.to_owned(),
            callback: subscriber,
        });
        Ok(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        self.subscriptions.len() != before
    }
}

/// Splits a JSON pointer into unescaped reference tokens.
pub fn parse_pointer(path: &str) -> EditorResult<Vec<String>> {
    if path.is_empty() || path == "/" {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(EditorError::new(
            "store.path_invalid",
            format!("pointer `{path}` must start with `/`"),
        ));
    };
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn lookup<'a>(value: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(value, |cursor, segment| match cursor {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(parse_index(segment)?),
        _ => None,
    })
}

fn related(left: &[String], right: &[String]) -> bool {
    left.starts_with(right) || right.starts_with(left)
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    segment.parse().ok()
}

fn unresolvable(segments: &[String]) -> EditorError {
    EditorError::new(
        "store.path_unresolvable",
        format!("pointer `/{}` does not resolve", segments.join("/")),
    )
}

fn out_of_range(segments: &[String], index: usize, len: usize) -> EditorError {
    EditorError::new(
        "store.index_out_of_range",
        format!(
            "index {index} in `/{}` is beyond array length {len}",
            segments.join("/")
        ),
    )
}
