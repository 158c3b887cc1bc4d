use serde_json::Value;

/// Which envelope a researchmap response arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"@graph": [{"items": [...]}, ...]}`, items taken from the first node.
    Graph,
    /// `{"items": [...]}`
    Items,
    /// A bare JSON array.
    Bare,
    /// An object with neither `@graph` nor an `items` array. Holds its keys.
    UnknownObject(Vec<String>),
    /// A string, number, bool or null.
    Scalar,
}

/// Items pulled out of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub items: Vec<Value>,
    pub shape: ResponseShape,
}

/// Pulls the item list out of a parsed response body.
///
/// `@graph` is checked before a top-level `items` key. Shapes that match neither
/// produce an empty list; this never fails.
pub fn extract_items(data: &Value) -> Extracted {
    match data {
        Value::Object(map) if map.contains_key("@graph") => {
            let items = match map.get("@graph") {
                Some(Value::Array(graph)) => graph
                    .first()
                    .and_then(|node| node.get("items"))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            Extracted {
                items,
                shape: ResponseShape::Graph,
            }
        }
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(items)) => Extracted {
                items: items.clone(),
                shape: ResponseShape::Items,
            },
            _ => Extracted {
                items: Vec::new(),
                shape: ResponseShape::UnknownObject(map.keys().cloned().collect()),
            },
        },
        Value::Array(items) => Extracted {
            items: items.clone(),
            shape: ResponseShape::Bare,
        },
        _ => Extracted {
            items: Vec::new(),
            shape: ResponseShape::Scalar,
        },
    }
}
