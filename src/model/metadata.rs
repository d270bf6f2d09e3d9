//! The metadata store attached to products, orders and other entities.
//!
//! Each entity has a public and a private store in a `jsonb` column. Both are
//! nested objects: `namespace -> client name -> key -> value`. Values are
//! always strings.

use serde_json::{Map, Value};


/// Sets `namespace/client/key` to `value`, creating intermediate objects as
/// needed. Non-object intermediates (which can only exist if someone wrote
/// to the DB directly) are replaced.
pub(crate) fn set(store: &mut Value, namespace: &str, client: &str, key: &str, value: &str) {
    let clients = child_object(store, namespace);
    let items = child_object(clients, client);
    if let Value::Object(items) = items {
        items.insert(key.to_owned(), Value::String(value.to_owned()));
    }
}

/// Removes `namespace/client/key`. Clients and namespaces that become empty
/// are removed as well. Returns whether anything was removed.
pub(crate) fn clear(store: &mut Value, namespace: &str, client: &str, key: &str) -> bool {
    let Some(clients) = store.get_mut(namespace).and_then(Value::as_object_mut) else {
        return false;
    };
    let Some(items) = clients.get_mut(client).and_then(Value::as_object_mut) else {
        return false;
    };

    let removed = items.remove(key).is_some();
    if items.is_empty() {
        clients.remove(client);
    }
    if clients.is_empty() {
        if let Some(root) = store.as_object_mut() {
            root.remove(namespace);
        }
    }

    removed
}

/// One client's items in a namespace.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ClientStore {
    pub(crate) name: String,
    pub(crate) items: Vec<(String, String)>,
}

/// Flattens a store into `(namespace, clients)` pairs, everything sorted by
/// name. Entries that are not shaped as expected are skipped.
pub(crate) fn list(store: &Value) -> Vec<(String, Vec<ClientStore>)> {
    let Some(namespaces) = store.as_object() else {
        return vec![];
    };

    let mut out = namespaces.iter()
        .filter_map(|(ns, clients)| {
            let mut clients = clients.as_object()?
                .iter()
                .filter_map(|(name, items)| {
                    let mut items = items.as_object()?
                        .iter()
                        .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_owned())))
                        .collect::<Vec<_>>();
                    items.sort();
                    Some(ClientStore { name: name.clone(), items })
                })
                .collect::<Vec<_>>();
            clients.sort_by(|a, b| a.name.cmp(&b.name));
            Some((ns.clone(), clients))
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn child_object<'a>(parent: &'a mut Value, key: &str) -> &'a mut Value {
    if !parent.is_object() {
        *parent = Value::Object(Map::new());
    }

    let Value::Object(map) = parent else { unreachable!() };
    let child = map.entry(key.to_owned()).or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    child
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::{set, clear, list, ClientStore};

    #[test]
    fn set_creates_path() {
        let mut store = json!({});
        set(&mut store, "payments", "stripe", "customer", "cus_1");
        set(&mut store, "payments", "stripe", "mandate", "m_2");
        set(&mut store, "erp", "sap", "id", "42");
        assert_eq!(store, json!({
            "payments": { "stripe": { "customer": "cus_1", "mandate": "m_2" } },
            "erp": { "sap": { "id": "42" } },
        }));

        set(&mut store, "erp", "sap", "id", "43");
        assert_eq!(store["erp"]["sap"]["id"], "43");
    }

    #[test]
    fn set_repairs_broken_store() {
        let mut store = json!({ "erp": 3 });
        set(&mut store, "erp", "sap", "id", "1");
        assert_eq!(store, json!({ "erp": { "sap": { "id": "1" } } }));

        let mut store = json!(null);
        set(&mut store, "a", "b", "c", "d");
        assert_eq!(store, json!({ "a": { "b": { "c": "d" } } }));
    }

    #[test]
    fn clear_prunes_empty_levels() {
        let mut store = json!({
            "payments": { "stripe": { "customer": "cus_1", "mandate": "m_2" } },
            "erp": { "sap": { "id": "42" } },
        });

        assert!(clear(&mut store, "payments", "stripe", "customer"));
        assert_eq!(store["payments"], json!({ "stripe": { "mandate": "m_2" } }));

        assert!(clear(&mut store, "erp", "sap", "id"));
        assert_eq!(store, json!({ "payments": { "stripe": { "mandate": "m_2" } } }));

        assert!(!clear(&mut store, "erp", "sap", "id"));
        assert!(!clear(&mut store, "payments", "paypal", "mandate"));
    }

    #[test]
    fn list_is_sorted() {
        let store = json!({
            "z": { "c2": { "b": "2", "a": "1" }, "c1": {} },
            "a": { "c": { "k": "v", "broken": 5 } },
        });
        let listed = list(&store);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0, "a");
        assert_eq!(listed[0].1, vec![ClientStore {
            name: "c".into(),
            items: vec![("k".into(), "v".into())],
        }]);
        assert_eq!(listed[1].1[0].name, "c1");
        assert_eq!(listed[1].1[1].items, vec![("a".into(), "1".into()), ("b".into(), "2".into())]);
    }
}
