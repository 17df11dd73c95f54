//! Property and attribute values.

/// A property or attribute value as carried by a [`Declaration`](`crate::Declaration`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// Absent. Removes attributes and assigns `undefined` to properties.
	Undefined,
	/// Toggles attribute presence, or assigns a native boolean property.
	Bool(bool),
	Number(f64),
	Str(String),
	/// Structured data. Stringified as JSON when assigned as an attribute.
	Json(serde_json::Value),
}

impl Value {
	/// Synthesizes the value a property is reset to once it disappears from a declaration.
	///
	/// Well-known property names decide first, then the type of the previous value.
	#[must_use]
	pub fn reset_for(name: &str, previous: &Value) -> Value {
		match name {
			"checked" | "disabled" | "selected" | "hidden" | "readOnly" | "required" | "multiple" | "autofocus" | "open" | "indeterminate" => Value::Bool(false),
			"value" | "className" | "id" | "title" | "textContent" | "innerText" | "innerHTML" | "placeholder" | "src" | "href" | "name" | "type" => Value::Str(String::new()),
			"tabIndex" | "selectedIndex" | "scrollTop" | "scrollLeft" | "valueAsNumber" => Value::Number(0.0),
			_ => match previous {
				Value::Str(_) => Value::Str(String::new()),
				Value::Bool(_) => Value::Bool(false),
				Value::Number(_) => Value::Number(0.0),
				Value::Undefined | Value::Json(_) => Value::Undefined,
			},
		}
	}

	/// The attribute text for this value, or [`None`] if the attribute should be absent instead.
	///
	/// # Errors
	///
	/// Iff [`Value::Json`] can't be serialized.
	pub fn to_attribute(&self) -> Result<Option<String>, serde_json::Error> {
		Ok(match self {
			Value::Undefined | Value::Bool(false) => None,
			Value::Bool(true) => Some(String::new()),
			Value::Number(number) => Some(number_to_string(*number)),
			Value::Str(string) => Some(string.clone()),
			Value::Json(json) => Some(serde_json::to_string(json)?),
		})
	}
}

/// Formats a number the way JavaScript's `String(number)` does, switching to exponent notation below `1e-6` and from `1e21` on.
#[must_use]
pub fn number_to_string(number: f64) -> String {
	if number.is_nan() {
		"NaN".to_owned()
	} else if number.is_infinite() {
		let infinity = if number.is_sign_positive() { "Infinity" } else { "-Infinity" };
		infinity.to_owned()
	} else if number == 0.0 {
		// Also catches `-0`.
		"0".to_owned()
	} else if (1e-6..1e21).contains(&number.abs()) {
		number.to_string()
	} else {
		// Both use the shortest round-tripping digits, but JavaScript signs positive exponents.
		let exponential = format!("{:e}", number);
		match exponential.split_once('e') {
			Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{}e+{}", mantissa, exponent),
			_ => exponential,
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Str(value.to_owned())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Str(value)
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Number(value.into())
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Number(value.into())
	}
}

impl From<serde_json::Value> for Value {
	fn from(value: serde_json::Value) -> Self {
		Value::Json(value)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Undefined, Into::into)
	}
}
