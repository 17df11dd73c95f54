/// Configuration passed through [`update`](`crate::update`) and [`build`](`crate::build`) unchanged.
///
/// The document context is the [`Dom`](`crate::Dom`) itself, and logging goes through
/// whatever [`tracing`] subscriber is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
	/// Whether keyed elements carry a [`KEY_ATTRIBUTE`](`crate::dom::KEY_ATTRIBUTE`).
	pub key_markers: bool,
	/// How many new children are appended at once before waiting for the next frame.
	pub append_chunk_size: usize,
	/// How deep declarations may nest before [`Error::DepthExceeded`](`crate::Error::DepthExceeded`).
	pub depth_limit: usize,
}

impl Options {
	pub const DEFAULT_APPEND_CHUNK_SIZE: usize = 20_000;
	pub const DEFAULT_DEPTH_LIMIT: usize = 512;

	#[must_use]
	pub fn new() -> Self {
		Self {
			key_markers: true,
			append_chunk_size: Self::DEFAULT_APPEND_CHUNK_SIZE,
			depth_limit: Self::DEFAULT_DEPTH_LIMIT,
		}
	}

	#[must_use]
	pub fn without_key_markers(self) -> Self {
		Self { key_markers: false, ..self }
	}

	/// Zero is treated like one.
	#[must_use]
	pub fn append_chunk_size(self, append_chunk_size: usize) -> Self {
		Self { append_chunk_size, ..self }
	}

	#[must_use]
	pub fn depth_limit(self, depth_limit: usize) -> Self {
		Self { depth_limit, ..self }
	}
}

impl Default for Options {
	fn default() -> Self {
		Self::new()
	}
}
