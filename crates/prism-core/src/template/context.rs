use crate::styling::StylingGuides;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const ITEM_FIELDS: [&str; 4] = [
    "item_title",
    "short_description",
    "long_description",
    "item_product_type",
];

/// One product listing as seen by prompt templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default)]
    pub item_title: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub item_product_type: String,
    /// Extra attributes (brand, color, ...) exposed to templates
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl ItemContext {
    /// Build from a free-form metadata object.
    ///
    /// Known item fields are lifted out when they hold strings; everything
    /// stays available under `metadata`.
    pub fn from_metadata(metadata: BTreeMap<String, Value>) -> Self {
        let field = |key: &str| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let item_id = metadata.get("item_id").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Self {
            item_id,
            item_title: field("item_title"),
            short_description: field("short_description"),
            long_description: field("long_description"),
            item_product_type: field("item_product_type"),
            metadata,
        }
    }

    /// Stable identifier used to key results: the id, else the title.
    pub fn item_key(&self) -> String {
        match &self.item_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ if !self.item_title.trim().is_empty() => self.item_title.trim().to_string(),
            _ => "item".to_string(),
        }
    }

    fn item_fields(&self) -> [(&'static str, &str); 4] {
        [
            (ITEM_FIELDS[0], &self.item_title),
            (ITEM_FIELDS[1], &self.short_description),
            (ITEM_FIELDS[2], &self.long_description),
            (ITEM_FIELDS[3], &self.item_product_type),
        ]
    }

    /// Template context: metadata keys flattened at top level, the four
    /// item fields (which win on conflict), `metadata` itself, and the
    /// styling guide for the product type.
    pub fn to_context(&self, guides: &StylingGuides) -> Value {
        let mut context = Map::new();
        for (key, value) in &self.metadata {
            context.insert(key.clone(), value.clone());
        }
        for (key, value) in self.item_fields() {
            context.insert(key.to_string(), Value::String(value.to_string()));
        }
        context.insert(
            "metadata".to_string(),
            Value::Object(self.metadata.clone().into_iter().collect()),
        );
        context.insert(
            "styling_guide".to_string(),
            Value::String(guides.guide_for(&self.item_product_type).to_string()),
        );
        Value::Object(context)
    }
}
