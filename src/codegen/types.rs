//! Lowering of [`crate::ir::IrType`] to C type strings, including the
//! `_Ret` wrapper rule for array types in function-return position.

use crate::ir::{IntWidth, IrType};

impl super::Gen {
	pub(super) fn gen_type_str(&mut self, typ: &IrType) -> String {
		match typ {
			IrType::Void | IrType::NoReturn => "void".to_string(),
			IrType::Bool => "bool".to_string(),
			IrType::Rune => "rune".to_string(),
			IrType::Int(w) => int_width_str(*w).to_string(),
			IrType::Float(crate::ir::FloatWidth::F32) => "f32".to_string(),
			IrType::Float(crate::ir::FloatWidth::F64) => "f64".to_string(),
			IrType::Ptr(inner) | IrType::Ref(inner) => format!("{}*", self.gen_type_str(inner)),
			IrType::Slice => "_R4core6_slice".to_string(),
			IrType::Fn(fn_typ) => self.wrap_fn_ptr_str(fn_typ, ""),
			IrType::Enum { underlying, .. } => self.gen_type_str(underlying),
			IrType::Array { elem, mangled_name, .. } => {
				if self.inside_func_ret_typ {
					self.materialize_ret_wrapper(mangled_name, elem);
					format!("{mangled_name}_Ret")
				} else {
					mangled_name.clone()
				}
			}
			IrType::Named { name, .. } => name.clone(),
		}
	}

	/// Emits the `<name>_Ret { <elem>* arr; }` wrapper the first time an
	/// array type appears in return position; subsequent calls for the
	/// same name are no-ops, matching the `has_wrapper` monotonicity
	/// invariant (§8.8).
	fn materialize_ret_wrapper(&mut self, mangled_name: &str, elem: &IrType) {
		if !self.ret_wrappers_emitted.insert(mangled_name.to_string()) {
			return;
		}
		let name = format!("{mangled_name}_Ret");
		self.typedefs.writeln(format!("typedef struct {name} {name};"));
		let was_inside = self.inside_func_ret_typ;
		self.inside_func_ret_typ = false;
		let elem_str = self.gen_type_str(elem);
		self.inside_func_ret_typ = was_inside;
		self.types.writeln(format!("struct {name} {{ {elem_str}* arr; }};"));
	}
}

fn int_width_str(w: IntWidth) -> &'static str {
	match w {
		IntWidth::I8 => "i8",
		IntWidth::I16 => "i16",
		IntWidth::I32 => "i32",
		IntWidth::I64 => "i64",
		IntWidth::U8 => "u8",
		IntWidth::U16 => "u16",
		IntWidth::U32 => "u32",
		IntWidth::U64 => "u64",
		IntWidth::Isize => "isize",
		IntWidth::Usize => "usize",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::codegen::Gen;
	use crate::context::{CompilerContext, CompilerPrefs};
	use crate::ir::FnType;

	fn gen() -> Gen {
		Gen::new(CompilerContext::new(CompilerPrefs::default()).prefs)
	}

	#[test]
	fn pointer_to_int_lowers_with_trailing_star() {
		let mut g = gen();
		let typ = IrType::Ptr(Box::new(IrType::Int(IntWidth::I32)));
		assert_eq!(g.gen_type_str(&typ), "i32*");
	}

	#[test]
	fn array_outside_return_position_uses_bare_mangled_name() {
		let mut g = gen();
		let typ = IrType::Array {
			elem: Box::new(IrType::Int(IntWidth::I32)),
			size: 3,
			mangled_name: "_R4Arr3i32".to_string(),
		};
		assert_eq!(g.gen_type_str(&typ), "_R4Arr3i32");
		assert!(g.typedefs.is_empty());
	}

	#[test]
	fn array_in_return_position_materializes_ret_wrapper_once() {
		let mut g = gen();
		g.inside_func_ret_typ = true;
		let typ = IrType::Array {
			elem: Box::new(IrType::Int(IntWidth::I32)),
			size: 3,
			mangled_name: "_R4Arr3i32".to_string(),
		};
		assert_eq!(g.gen_type_str(&typ), "_R4Arr3i32_Ret");
		assert_eq!(g.gen_type_str(&typ), "_R4Arr3i32_Ret");
		let typedefs = g.typedefs.to_string();
		assert_eq!(typedefs.matches("_R4Arr3i32_Ret").count(), 1);
	}

	#[test]
	fn fn_type_lowers_to_a_function_pointer() {
		let mut g = gen();
		let typ = IrType::Fn(Box::new(FnType {
			args: vec![IrType::Int(IntWidth::I32)],
			ret: IrType::Void,
			is_method: false,
		}));
		assert_eq!(g.gen_type_str(&typ), "void (*)(i32)");
	}
}
