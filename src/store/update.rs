//! The field delta applied by `update` calls.

use super::task::FieldMap;
use serde::{Deserialize, Serialize};

/// A partial update of a task's mutable fields.
///
/// Every member is optional; unset members leave the task untouched. A
/// `description` of `None` means "no change"; an update can never clear a
/// description. An absolute `completed` overrides any `advance` in the same
/// delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
	/// Relative increment: `completed += advance`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub advance: Option<f64>,
	/// Absolute counter value; overrides `advance`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub completed: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// `Some(Some(x))` sets the total, `Some(None)` switches the task back to
	/// indeterminate, `None` leaves it unchanged.
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		with = "total_setting"
	)]
	pub total: Option<Option<f64>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub visible: Option<bool>,
	#[serde(default, skip_serializing_if = "FieldMap::is_empty")]
	pub fields: FieldMap,
}

impl TaskUpdate {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn advance(mut self, n: f64) -> Self {
		self.advance = Some(n);
		self
	}

	pub fn completed(mut self, value: f64) -> Self {
		self.completed = Some(value);
		self
	}

	pub fn description(mut self, description: &str) -> Self {
		self.description = Some(description.to_string());
		self
	}

	pub fn total(mut self, total: Option<f64>) -> Self {
		self.total = Some(total);
		self
	}

	pub fn visible(mut self, visible: bool) -> Self {
		self.visible = Some(visible);
		self
	}

	pub fn field(mut self, key: &str, value: serde_json::Value) -> Self {
		self.fields.insert(key.to_string(), value);
		self
	}

	pub fn is_empty(&self) -> bool {
		self.advance.is_none()
			&& self.completed.is_none()
			&& self.description.is_none()
			&& self.total.is_none()
			&& self.visible.is_none()
			&& self.fields.is_empty()
	}
}

/// Serde helper: a present-but-null `total` means "set to indeterminate",
/// which plain `Option<Option<f64>>` cannot distinguish from "absent".
mod total_setting {
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S: Serializer>(value: &Option<Option<f64>>, serializer: S) -> Result<S::Ok, S::Error> {
		value.as_ref().unwrap_or(&None).serialize(serializer)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Option<f64>>, D::Error> {
		Option::<f64>::deserialize(deserializer).map(Some)
	}
}
