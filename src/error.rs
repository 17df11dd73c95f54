use thiserror::Error;

/// Everything that can abort an [`update`](`crate::update`) or [`build`](`crate::build`).
///
/// Mutations that were applied before the failure stay in place; there is no rollback.
#[derive(Debug, Error)]
pub enum Error {
	/// An input shape that can't be rendered, like `true`, an empty tag name,
	/// duplicate sibling keys or a fragment where a single element was required.
	#[error("invalid declaration: {0}")]
	InvalidDeclaration(String),

	/// Recursion went deeper than [`Options::depth_limit`](`crate::Options::depth_limit`).
	#[error("maximum reconciliation depth of {limit} exceeded")]
	DepthExceeded { limit: usize },

	/// A node was expected to be a child of the parent being reconciled, but isn't.
	#[error("node is not a child of the expected parent")]
	ParentMismatch,

	/// The platform rejected a DOM operation.
	#[error("platform operation `{operation}` failed: {message}")]
	Platform { operation: &'static str, message: String },

	#[error("could not serialize value: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	pub(crate) fn platform(operation: &'static str, message: impl Into<String>) -> Self {
		Self::Platform {
			operation,
			message: message.into(),
		}
	}
}
