//! Animatable channels shared by materials and modifiers.

use serde_json::Value;

use super::raw::{RawChannel, RawChannelEntry};

#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub value: Option<Value>,
    pub visible: bool,
    pub image: Option<String>,
    pub image_file: Option<String>,
    pub group: String,

    current_value: Option<Value>,
}

impl Channel {
    pub fn from_raw(raw: RawChannel, group: Option<String>) -> Self {
        Self {
            id: raw.id,
            kind: raw.kind.unwrap_or_default(),
            label: raw.label.unwrap_or_default(),
            value: raw.value,
            visible: raw.visible.unwrap_or(true),
            image: raw.image,
            image_file: raw.image_file,
            group: group.unwrap_or_default(),
            current_value: raw.current_value,
        }
    }

    pub fn from_entry(entry: RawChannelEntry) -> Self {
        Self::from_raw(entry.channel, entry.group)
    }

    /// The current value if one was set, otherwise the authored value.
    pub fn current_value(&self) -> Option<&Value> {
        self.current_value.as_ref().or(self.value.as_ref())
    }

    pub fn current_f64(&self) -> Option<f64> {
        self.current_value().and_then(Value::as_f64)
    }

    /// Booleans are also accepted as `0`/`1`.
    pub fn current_bool(&self) -> Option<bool> {
        match self.current_value()? {
            Value::Bool(b) => Some(*b),
            v => v.as_f64().map(|f| f != 0.0),
        }
    }

    /// Overlay the non-empty parts of `other`.
    pub fn merge(&mut self, other: &Channel) {
        if other.value.is_some() {
            self.value = other.value.clone();
        }
        if other.current_value.is_some() {
            self.current_value = other.current_value.clone();
        }
        if other.image_file.is_some() {
            self.image_file = other.image_file.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(json: &str) -> Channel {
        Channel::from_entry(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_current_value_falls_back() {
        let c = channel(r#"{ "channel": { "id": "a", "type": "float", "value": 0.5 } }"#);
        assert_eq!(c.current_f64(), Some(0.5));
        assert!(c.visible);

        let c = channel(r#"{ "channel": { "id": "a", "value": 0.5, "current_value": 0.75 }, "group": "/Base" }"#);
        assert_eq!(c.current_f64(), Some(0.75));
        assert_eq!(c.group, "/Base");
    }

    #[test]
    fn test_merge_skips_null() {
        let mut base = channel(r#"{ "channel": { "id": "a", "value": 1, "image_file": "/a.jpg" } }"#);
        base.merge(&channel(r#"{ "channel": { "id": "a", "value": null, "current_value": 2 } }"#));
        assert_eq!(base.value, Some(Value::from(1)));
        assert_eq!(base.current_f64(), Some(2.0));
        assert_eq!(base.image_file.as_deref(), Some("/a.jpg"));
    }

    #[test]
    fn test_bool_from_number() {
        let c = channel(r#"{ "channel": { "id": "Smooth On", "type": "bool", "value": 1 } }"#);
        assert_eq!(c.current_bool(), Some(true));
    }
}
