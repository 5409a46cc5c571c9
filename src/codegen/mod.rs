//! The back-end: lowers a [`crate::ir::IrModule`] into a single C99
//! translation unit. See [`Gen`] for the orchestrator and the module's
//! children for each concern (`header`, `mangle`, `types`, `decls`, `instr`).

mod builder;
pub mod header;
pub mod mangle;

mod decls;
mod instr;
mod types;

use fxhash::FxHashSet;

pub use builder::Builder;

use crate::context::CompilerPrefs;
use crate::error::EmitError;
use crate::ir::{FnType, IrModule};

/// Owns the five append-only buffers the emitter fills while walking an
/// [`IrModule`], and the small amount of ambient state (current
/// return-type-position flag, which `_Ret` wrappers have been emitted)
/// threaded through a single pass. One `Gen` lowers one `IrModule`.
#[derive(Debug)]
pub struct Gen {
	prefs: CompilerPrefs,
	/// Set while lowering a function's return type, so array types there
	/// pick up the `_Ret` wrapper rule (§4.2).
	inside_func_ret_typ: bool,
	ret_wrappers_emitted: FxHashSet<String>,
	typedefs: Builder,
	types: Builder,
	protos: Builder,
	statics: Builder,
	out: Builder,
}

impl Gen {
	pub fn new(prefs: CompilerPrefs) -> Self {
		Gen {
			prefs,
			inside_func_ret_typ: false,
			ret_wrappers_emitted: FxHashSet::default(),
			typedefs: Builder::new(),
			types: Builder::new(),
			protos: Builder::new(),
			statics: Builder::new(),
			out: Builder::new(),
		}
	}

	/// Lowers an entire module: types, externs, statics, then top-level
	/// declarations (vtables and functions), in source order.
	pub fn gen_module(&mut self, module: &IrModule) -> Result<(), EmitError> {
		self.gen_types(&module.types)?;
		self.gen_externs(&module.externs);
		self.gen_statics(&module.statics);
		for decl in &module.decls {
			self.gen_decl(decl)?;
		}
		Ok(())
	}

	fn write(&mut self, text: impl AsRef<str>) {
		self.out.write(text);
	}

	fn writeln(&mut self, text: impl AsRef<str>) {
		self.out.writeln(text);
	}

	/// Concatenates the five buffers plus the fixed header and runtime
	/// shim, in the section order fixed by §4.2: HEADER → typedefs →
	/// types → protos → statics → shim → bodies → main.
	pub fn get_output(&self) -> String {
		let mut res = Builder::new();
		res.writeln(header::HEADER);
		res.writeln(self.typedefs.to_string());
		res.write(self.types.to_string());
		res.newline();
		res.writeln(self.protos.to_string());
		res.writeln(self.statics.to_string());
		res.writeln(RUNTIME_SHIM);
		res.write(self.out.to_string());
		res.writeln("int main(i32 __argc, char** __argv) {");
		let pkg_main = mangle::mangle_symbol(&[&self.prefs.pkg_name], "main", mangle::Role::Fn);
		res.writeln(format!("  _R4core10rivet_mainF(__argc, (u8**)__argv, {pkg_main});"));
		res.writeln("  return 0;");
		res.writeln("}");
		res.to_string()
	}

	/// Serializes [`Self::get_output`] to `path`, truncating/creating it.
	/// No partial files are left on a write failure: the error is
	/// propagated to the caller rather than swallowed (§4.2 finalization).
	pub fn write_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), EmitError> {
		std::fs::write(path, self.get_output())?;
		Ok(())
	}

	pub(crate) fn wrap_fn_ptr_str(&mut self, fn_typ: &FnType, name: &str) -> String {
		let mut res = Builder::new();
		let was_inside = self.inside_func_ret_typ;
		self.inside_func_ret_typ = false;
		res.write(self.gen_type_str(&fn_typ.ret));
		self.inside_func_ret_typ = was_inside;
		res.write(format!(" (*{name})("));
		if fn_typ.is_method {
			res.write("void* self");
			if !fn_typ.args.is_empty() {
				res.write(", ");
			}
		}
		if fn_typ.args.is_empty() {
			if !fn_typ.is_method {
				res.write("void");
			}
		} else {
			for (i, arg) in fn_typ.args.iter().enumerate() {
				let arg_str = self.gen_type_str(arg);
				res.write(arg_str);
				if i < fn_typ.args.len() - 1 {
					res.write(", ");
				}
			}
		}
		res.write(")");
		res.to_string()
	}
}

const RUNTIME_SHIM: &str = r#"void _R9init_argsZ(i32 __argc, u8** __argv) {
  _R4core4ARGS = (_R4core6_slice){
	.ptr=malloc(sizeof(_R4core4_str) * __argc),
	.elem_size=sizeof(_R4core4_str), .len=__argc
  };
  for (int i = 0; i < __argc; i++) {
	u8* arg = __argv[i];
	_R4core4_str tmp = _R4core4_str9from_cstrF(arg);
	_R4core6_slice3setM(&_R4core4ARGS, i, &tmp);
  }
}

void _R9drop_argsZ(void) {
	free(_R4core4ARGS.ptr);
}"#;
