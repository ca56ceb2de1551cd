/*!
# Subscriptions

The node pushes notices as `{"method": "notice", "params": [callback_id, payload]}`.
Every notice is offered to every registered `SubscriptionManager`; each one
tries to read the payload as its own shape and quietly ignores anything
else.

- accounts: statistics objects (`2.6.*`) naming an `owner` account
- contracts: maps of contract id to a list of logs
- blocks: ids of newly applied blocks
*/
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{event, Level};

use crate::types::{ObjectId, ACCOUNT_STATISTICS_TYPE, CONTRACT_TYPE, IMPLEMENTATION_SPACE, PROTOCOL_SPACE};

/// Registry key for streams that are not tied to one object.
pub const GLOBAL_KEY: &str = "global";

pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Returned by `subscribe`, needed to unsubscribe that one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Listeners grouped by the key they subscribed to.
pub struct ListenerRegistry<T> {
    listeners: DashMap<String, Vec<(ListenerHandle, Listener<T>)>>,
    next_handle: AtomicU64,
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        ListenerRegistry {
            listeners: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }
}

impl<T> ListenerRegistry<T> {
    pub fn subscribe(&self, key: &str, listener: Listener<T>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .entry(String::from(key))
            .or_default()
            .push((handle, listener));
        handle
    }

    pub fn unsubscribe(&self, key: &str, handle: ListenerHandle) {
        let now_empty = match self.listeners.get_mut(key) {
            Some(mut listeners) => {
                listeners.retain(|(existing, _)| *existing != handle);
                listeners.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.listeners.remove_if(key, |_, listeners| listeners.is_empty());
        }
    }

    pub fn unsubscribe_key(&self, key: &str) {
        self.listeners.remove(key);
    }

    pub fn unsubscribe_all(&self) {
        self.listeners.clear();
    }

    pub fn is_subscribed(&self, key: &str) -> bool {
        self.listeners.contains_key(key)
    }

    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners.get(key).map_or(0, |listeners| listeners.len())
    }

    /// Call every listener of `key`. The map is not locked while they run.
    pub fn notify(&self, key: &str, value: &T) {
        let listeners: Vec<Listener<T>> = match self.listeners.get(key) {
            Some(listeners) => listeners.iter().map(|(_, listener)| listener.clone()).collect(),
            None => return,
        };
        for listener in listeners {
            listener(value);
        }
    }
}

/// Reacts to notices pushed by the node.
pub trait SubscriptionManager: Send + Sync {
    fn process_event(&self, payload: &Value);
    fn unsubscribe_all(&self);
}

// `[callback_id, payload]` when the notice targets `callback_id`
fn notice_payload(payload: &Value, callback_id: u64) -> Option<&Value> {
    let params = payload.get("params")?.as_array()?;
    if params.first()?.as_u64()? != callback_id {
        return None;
    }
    params.get(1)
}

// notices nest their objects in arrays of arrays
fn flatten_objects<'a>(value: &'a Value, objects: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten_objects(item, objects)),
        Value::Object(_) => objects.push(value),
        _ => {}
    }
}

/// Account changes, keyed by account id.
pub struct AccountSubscriptionManager {
    callback_id: u64,
    registry: ListenerRegistry<Value>,
}

impl AccountSubscriptionManager {
    pub fn new(callback_id: u64) -> Self {
        AccountSubscriptionManager {
            callback_id,
            registry: ListenerRegistry::default(),
        }
    }

    pub fn subscribe(&self, account: ObjectId, listener: Listener<Value>) -> ListenerHandle {
        self.registry.subscribe(&account.to_string(), listener)
    }

    pub fn unsubscribe(&self, account: ObjectId, handle: ListenerHandle) {
        self.registry.unsubscribe(&account.to_string(), handle)
    }

    pub fn get_registry(&self) -> &ListenerRegistry<Value> {
        &self.registry
    }

    /// The statistics objects of the notice, paired with their owner.
    pub fn try_parse(&self, payload: &Value) -> Option<Vec<(ObjectId, Value)>> {
        let mut objects = vec![];
        flatten_objects(notice_payload(payload, self.callback_id)?, &mut objects);
        let changes: Vec<(ObjectId, Value)> = objects
            .into_iter()
            .filter_map(|object| {
                let id: ObjectId = object.get("id")?.as_str()?.parse().ok()?;
                if !id.is_type(IMPLEMENTATION_SPACE, ACCOUNT_STATISTICS_TYPE) {
                    return None;
                }
                let owner: ObjectId = object.get("owner")?.as_str()?.parse().ok()?;
                Some((owner, object.clone()))
            })
            .collect();
        if changes.is_empty() {
            None
        } else {
            Some(changes)
        }
    }
}

impl SubscriptionManager for AccountSubscriptionManager {
    fn process_event(&self, payload: &Value) {
        if let Some(changes) = self.try_parse(payload) {
            for (owner, statistics) in changes {
                event!(Level::TRACE, "account {} changed", owner);
                self.registry.notify(&owner.to_string(), &statistics);
            }
        }
    }

    fn unsubscribe_all(&self) {
        self.registry.unsubscribe_all();
    }
}

/// Contract logs, keyed by contract id.
pub struct ContractSubscriptionManager {
    callback_id: u64,
    registry: ListenerRegistry<Vec<Value>>,
}

impl ContractSubscriptionManager {
    pub fn new(callback_id: u64) -> Self {
        ContractSubscriptionManager {
            callback_id,
            registry: ListenerRegistry::default(),
        }
    }

    pub fn subscribe(&self, contract: ObjectId, listener: Listener<Vec<Value>>) -> ListenerHandle {
        self.registry.subscribe(&contract.to_string(), listener)
    }

    pub fn unsubscribe(&self, contract: ObjectId, handle: ListenerHandle) {
        self.registry.unsubscribe(&contract.to_string(), handle)
    }

    pub fn get_registry(&self) -> &ListenerRegistry<Vec<Value>> {
        &self.registry
    }

    pub fn try_parse(&self, payload: &Value) -> Option<Vec<(ObjectId, Vec<Value>)>> {
        let mut objects = vec![];
        flatten_objects(notice_payload(payload, self.callback_id)?, &mut objects);
        let mut logs = vec![];
        for object in objects {
            for (key, entries) in object.as_object()? {
                let contract = match key.parse::<ObjectId>() {
                    Ok(id) if id.is_type(PROTOCOL_SPACE, CONTRACT_TYPE) => id,
                    _ => continue,
                };
                if let Some(entries) = entries.as_array() {
                    logs.push((contract, entries.clone()));
                }
            }
        }
        if logs.is_empty() {
            None
        } else {
            Some(logs)
        }
    }
}

impl SubscriptionManager for ContractSubscriptionManager {
    fn process_event(&self, payload: &Value) {
        if let Some(logs) = self.try_parse(payload) {
            for (contract, entries) in logs {
                event!(Level::TRACE, "{} logs from {}", entries.len(), contract);
                self.registry.notify(&contract.to_string(), &entries);
            }
        }
    }

    fn unsubscribe_all(&self) {
        self.registry.unsubscribe_all();
    }
}

/// Ids of applied blocks, for every listener.
pub struct BlockSubscriptionManager {
    callback_id: u64,
    registry: ListenerRegistry<String>,
}

impl BlockSubscriptionManager {
    pub fn new(callback_id: u64) -> Self {
        BlockSubscriptionManager {
            callback_id,
            registry: ListenerRegistry::default(),
        }
    }

    pub fn subscribe(&self, listener: Listener<String>) -> ListenerHandle {
        self.registry.subscribe(GLOBAL_KEY, listener)
    }

    pub fn unsubscribe(&self, handle: ListenerHandle) {
        self.registry.unsubscribe(GLOBAL_KEY, handle)
    }

    pub fn get_registry(&self) -> &ListenerRegistry<String> {
        &self.registry
    }

    pub fn try_parse(&self, payload: &Value) -> Option<Vec<String>> {
        let block_ids: Vec<String> = notice_payload(payload, self.callback_id)?
            .as_array()?
            .iter()
            .filter_map(|block_id| block_id.as_str().map(String::from))
            .collect();
        if block_ids.is_empty() {
            None
        } else {
            Some(block_ids)
        }
    }
}

impl SubscriptionManager for BlockSubscriptionManager {
    fn process_event(&self, payload: &Value) {
        if let Some(block_ids) = self.try_parse(payload) {
            for block_id in block_ids {
                self.registry.notify(GLOBAL_KEY, &block_id);
            }
        }
    }

    fn unsubscribe_all(&self) {
        self.registry.unsubscribe_all();
    }
}
