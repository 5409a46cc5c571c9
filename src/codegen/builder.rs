//! An append-only string buffer, mirroring the four/five growing buffers
//! the emitter fills independently before concatenating them at finalize
//! time (see §9 Design Notes: "Builder string accumulation").

#[derive(Debug, Default, Clone)]
pub struct Builder(String);

impl Builder {
	pub fn new() -> Self {
		Builder(String::new())
	}

	pub fn write(&mut self, text: impl AsRef<str>) {
		self.0.push_str(text.as_ref());
	}

	pub fn writeln(&mut self, text: impl AsRef<str>) {
		self.0.push_str(text.as_ref());
		self.0.push('\n');
	}

	pub fn newline(&mut self) {
		self.0.push('\n');
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl std::fmt::Display for Builder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}
