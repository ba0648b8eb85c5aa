use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::core::schema::{Property, PropertyType, Schema};
use crate::utils::validation::{
    normalize_country, normalize_date, MAX_PROPERTY_VALUES, MAX_VALUE_LENGTH,
};

/// Name-part properties. They are combined into full names rather than
/// compared on their own.
const NAME_PARTS: &[&str] = &["firstName", "middleName", "lastName", "fatherName"];

/// Reasons an example entity cannot be used for matching
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidExample {
    #[error("Malformed example: {0}")]
    Malformed(String),

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("Schema '{0}' cannot be used as a matching example")]
    NotMatchable(String),

    #[error("Property '{property}' is not defined on schema '{schema}'")]
    UnknownProperty { schema: String, property: String },

    #[error("Invalid value for property '{property}': {reason}")]
    InvalidValue { property: String, reason: String },
}

impl InvalidExample {
    fn value(property: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            property: property.to_string(),
            reason: reason.into(),
        }
    }
}

/// An example entity as submitted by a caller, before validation.
///
/// Property values are kept as raw JSON so that a malformed entry in a batch
/// can be rejected on its own instead of failing the whole request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityExample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub schema: String,

    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl EntityExample {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            id: None,
            schema: schema.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Read one batch entry from raw JSON
    ///
    /// # Errors
    ///
    /// Returns `InvalidExample::Malformed` if the value is not an object with
    /// a string `schema` and an object of `properties`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, InvalidExample> {
        serde_json::from_value(value).map_err(|e| InvalidExample::Malformed(e.to_string()))
    }

    /// Builder helper used by the CLI and tests
    #[must_use]
    pub fn with(mut self, property: &str, values: &[&str]) -> Self {
        self.properties
            .insert(property.to_string(), serde_json::json!(values));
        self
    }
}

/// Read access to multi-valued entity properties
pub trait PropertyAccess {
    /// The entity's schema, if it is known to the taxonomy
    fn schema_def(&self) -> Option<&'static Schema>;

    fn properties(&self) -> &BTreeMap<String, Vec<String>>;

    /// Values of one property, empty if unset
    fn get(&self, property: &str) -> &[String] {
        self.properties()
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All values of properties with the given type
    fn type_values(&self, ptype: PropertyType) -> Vec<&str> {
        let Some(schema) = self.schema_def() else {
            return Vec::new();
        };
        self.properties()
            .iter()
            .filter(|(name, _)| schema.property(name).is_some_and(|p| p.ptype == ptype))
            .flat_map(|(_, values)| values.iter().map(String::as_str))
            .collect()
    }

    /// Full names of the entity: name-typed values, plus first/last name
    /// combinations when the entity only carries name parts.
    fn names(&self) -> Vec<String> {
        let Some(schema) = self.schema_def() else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .properties()
            .iter()
            .filter(|(name, _)| !NAME_PARTS.contains(&name.as_str()))
            .filter(|(name, _)| {
                schema
                    .property(name)
                    .is_some_and(|p| p.ptype == PropertyType::Name)
            })
            .flat_map(|(_, values)| values.iter().cloned())
            .collect();

        for first in self.get("firstName") {
            for last in self.get("lastName") {
                let mut parts = vec![first.as_str()];
                parts.extend(self.get("middleName").iter().map(String::as_str));
                parts.push(last);
                let full = parts.join(" ");
                if !names.contains(&full) {
                    names.push(full);
                }
            }
        }
        names
    }

    /// Entity-reference values with the property that holds them
    fn entity_refs(&self) -> Vec<(&'static Property, &str)> {
        let Some(schema) = self.schema_def() else {
            return Vec::new();
        };
        self.properties()
            .iter()
            .filter_map(|(name, values)| {
                schema
                    .property(name)
                    .filter(|p| p.ptype == PropertyType::Entity)
                    .map(|p| (p, values))
            })
            .flat_map(|(p, values)| values.iter().map(move |v| (p, v.as_str())))
            .collect()
    }
}

fn serialize_schema<S: Serializer>(schema: &&'static Schema, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(schema.name)
}

/// A validated example entity.
///
/// Every property is defined on the schema, values are trimmed,
/// de-duplicated and normalized by type (dates, country codes).
#[derive(Debug, Clone, Serialize)]
pub struct ExampleEntity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(serialize_with = "serialize_schema")]
    pub schema: &'static Schema,

    pub properties: BTreeMap<String, Vec<String>>,
}

impl ExampleEntity {
    /// Validate a raw example
    ///
    /// # Errors
    ///
    /// Returns `InvalidExample` if the schema is unknown, a property is not
    /// defined on the schema, or a value is structurally malformed.
    pub fn from_example(example: &EntityExample) -> Result<Self, InvalidExample> {
        let schema = Schema::get(example.schema.trim())
            .ok_or_else(|| InvalidExample::UnknownSchema(example.schema.clone()))?;

        let mut properties = BTreeMap::new();
        for (name, raw) in &example.properties {
            let property = schema
                .property(name)
                .ok_or_else(|| InvalidExample::UnknownProperty {
                    schema: schema.name.to_string(),
                    property: name.clone(),
                })?;

            let values = clean_values(property, raw)?;
            if !values.is_empty() {
                properties.insert(name.clone(), values);
            }
        }

        Ok(Self {
            id: example.id.clone(),
            schema,
            properties,
        })
    }

    /// Short label for logs
    #[must_use]
    pub fn caption(&self) -> String {
        self.names()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.schema.label.to_string())
    }
}

impl PartialEq for ExampleEntity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.schema.name == other.schema.name
            && self.properties == other.properties
    }
}

impl PropertyAccess for ExampleEntity {
    fn schema_def(&self) -> Option<&'static Schema> {
        Some(self.schema)
    }

    fn properties(&self) -> &BTreeMap<String, Vec<String>> {
        &self.properties
    }
}

/// Flatten a raw JSON property value into cleaned strings
fn clean_values(
    property: &Property,
    raw: &serde_json::Value,
) -> Result<Vec<String>, InvalidExample> {
    use serde_json::Value;

    let mut strings: Vec<String> = Vec::new();
    let mut push_scalar = |value: &Value| -> Result<(), InvalidExample> {
        match value {
            Value::Null => Ok(()),
            Value::String(s) => {
                strings.push(s.clone());
                Ok(())
            }
            Value::Number(n) => {
                strings.push(n.to_string());
                Ok(())
            }
            Value::Bool(b) => {
                strings.push(b.to_string());
                Ok(())
            }
            Value::Array(_) | Value::Object(_) => Err(InvalidExample::value(
                property.name,
                "values must be strings or lists of strings",
            )),
        }
    };

    match raw {
        Value::Array(items) => {
            if items.len() > MAX_PROPERTY_VALUES {
                return Err(InvalidExample::value(
                    property.name,
                    format!("too many values (maximum {MAX_PROPERTY_VALUES})"),
                ));
            }
            for item in items {
                push_scalar(item)?;
            }
        }
        other => push_scalar(other)?,
    }

    let mut cleaned: Vec<String> = Vec::with_capacity(strings.len());
    for value in strings {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if value.len() > MAX_VALUE_LENGTH {
            return Err(InvalidExample::value(
                property.name,
                format!("value exceeds {MAX_VALUE_LENGTH} characters"),
            ));
        }
        let value = match property.ptype {
            PropertyType::Date => normalize_date(value).ok_or_else(|| {
                InvalidExample::value(property.name, format!("'{value}' is not a valid date"))
            })?,
            PropertyType::Country => normalize_country(value).ok_or_else(|| {
                InvalidExample::value(
                    property.name,
                    format!("'{value}' is not a valid country code"),
                )
            })?,
            _ => value.to_string(),
        };
        if !cleaned.contains(&value) {
            cleaned.push(value);
        }
    }
    Ok(cleaned)
}

/// An entity record as stored in the index and returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,

    #[serde(default)]
    pub caption: String,

    pub schema: String,

    #[serde(default)]
    pub properties: BTreeMap<String, Vec<String>>,

    /// Datasets this record was published in
    #[serde(default)]
    pub datasets: Vec<String>,

    /// Ids that were merged into this record
    #[serde(default)]
    pub referents: Vec<String>,

    /// Whether the entity is itself a target (sanctioned, wanted, ...)
    #[serde(default)]
    pub target: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            caption: String::new(),
            schema: schema.into(),
            properties: BTreeMap::new(),
            datasets: Vec::new(),
            referents: Vec::new(),
            target: false,
            first_seen: None,
            last_seen: None,
        }
    }

    #[must_use]
    pub fn with_property(mut self, property: &str, values: &[&str]) -> Self {
        let entry = self.properties.entry(property.to_string()).or_default();
        entry.extend(values.iter().map(|v| (*v).to_string()));
        if self.caption.is_empty() && property == "name" {
            if let Some(first) = values.first() {
                self.caption = (*first).to_string();
            }
        }
        self
    }

    #[must_use]
    pub fn with_datasets(mut self, datasets: &[&str]) -> Self {
        self.datasets = datasets.iter().map(|d| (*d).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_referents(mut self, referents: &[&str]) -> Self {
        self.referents = referents.iter().map(|r| (*r).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: bool) -> Self {
        self.target = target;
        self
    }

    /// Caption, falling back to the first name or the id
    #[must_use]
    pub fn display_caption(&self) -> String {
        if !self.caption.is_empty() {
            return self.caption.clone();
        }
        self.names()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.id.clone())
    }
}

impl PropertyAccess for EntityRecord {
    fn schema_def(&self) -> Option<&'static Schema> {
        Schema::get(&self.schema)
    }

    fn properties(&self) -> &BTreeMap<String, Vec<String>> {
        &self.properties
    }
}
