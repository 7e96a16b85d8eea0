//! Configured service plugins.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A plugin identifier plus its construction options.
///
/// Written either as `"name"` or as `["name", { ...options }]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEntry {
	pub id: String,
	pub options: Value,
}

impl ServiceEntry {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			options: Value::Object(Default::default()),
		}
	}

	pub fn with_options(id: impl Into<String>, options: Value) -> Self {
		Self {
			id: id.into(),
			options,
		}
	}
}

impl Serialize for ServiceEntry {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut tuple = serializer.serialize_tuple(2)?;
		tuple.serialize_element(&self.id)?;
		tuple.serialize_element(&self.options)?;
		tuple.end()
	}
}

impl<'de> Deserialize<'de> for ServiceEntry {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Name(String),
			Pair(String, Value),
			Single((String,)),
		}

		match Raw::deserialize(deserializer)? {
			Raw::Name(id) | Raw::Single((id,)) => Ok(ServiceEntry::new(id)),
			Raw::Pair(id, options) if options.is_object() || options.is_null() => Ok(ServiceEntry {
				id,
				options: if options.is_null() {
					Value::Object(Default::default())
				} else {
					options
				},
			}),
			Raw::Pair(id, _) => Err(de::Error::custom(format!("options for service '{id}' must be an object"))),
		}
	}
}
