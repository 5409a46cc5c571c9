//! The `_R<len><ident>…<role>` name mangling scheme. Every user-facing
//! symbol the emitter writes is run through here first; no unmangled user
//! identifier ever reaches the generated C.

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
	Fn,
	Method,
	Generated,
}

impl Role {
	fn suffix(self) -> &'static str {
		match self {
			Role::Fn => "F",
			Role::Method => "M",
			Role::Generated => "Z",
		}
	}
}

/// Mangles a dotted path (e.g. `core.string`) into `_R<len><ident>…`, with
/// no trailing role suffix. Used for type names, which carry no role.
pub fn mangle_path(path: &[&str]) -> String {
	let mut out = String::from("_R");
	for segment in path {
		out.push_str(&segment.len().to_string());
		out.push_str(segment);
	}
	out
}

/// Mangles a dotted path plus a final named symbol with a role suffix.
/// Used for functions, methods, and compiler-generated symbols.
pub fn mangle_symbol(path: &[&str], name: &str, role: Role) -> String {
	let mut out = mangle_path(path);
	out.push_str(&name.len().to_string());
	out.push_str(name);
	out.push_str(role.suffix());
	out
}
