//! Emission of [`crate::ir::TypeDecl`]s, externs, statics, vtables and
//! function prototypes/definitions: everything in an [`crate::ir::IrModule`]
//! besides instruction lowering proper (see [`super::instr`]).

use crate::error::EmitError;
use crate::ir::{AliasRecord, ExternFn, IrField, IrType, StaticVar, StructRecord, TopDecl, TypeDecl, UnionRecord, VTable};
use crate::sym::TypeKind;

use super::header::c_escape;
use super::Gen;

impl Gen {
	pub(super) fn gen_types(&mut self, types: &[TypeDecl]) -> Result<(), EmitError> {
		let last = types.len().saturating_sub(1);
		for (i, t) in types.iter().enumerate() {
			match t {
				TypeDecl::Alias(a) => self.gen_alias(a),
				TypeDecl::Union(u) => self.gen_union(u),
				TypeDecl::Struct(s) => self.gen_struct(s),
			}
			if i < last {
				self.types.newline();
			}
		}
		self.typedefs.newline();
		Ok(())
	}

	fn gen_alias(&mut self, a: &AliasRecord) {
		let keyword = match &a.elem {
			IrType::Named { kind: TypeKind::Struct | TypeKind::Tuple, .. } => "struct ",
			_ => "",
		};
		let elem_str = self.gen_type_str(&a.elem);
		self.types.writeln(format!("typedef {keyword}{elem_str} {}[{}];\n", a.name, a.size));
	}

	fn gen_union(&mut self, u: &UnionRecord) {
		self.typedefs.writeln(format!("typedef struct {0} {0};", u.name));
		self.types.writeln(format!("struct {} {{", u.name));
		self.types.writeln("  union {");
		for v in &u.variants {
			let member = mangled_member_name(v);
			let typ_str = self.gen_type_str(v);
			self.types.writeln(format!("    {typ_str} {member};"));
		}
		self.types.writeln("  };");
		self.types.writeln("  i64 idx;");
		self.types.writeln("};");
	}

	fn gen_struct(&mut self, s: &StructRecord) {
		let keyword = if s.is_union { "union" } else { "struct" };
		self.typedefs.writeln(format!("typedef {keyword} {0} {0};", s.name));
		if s.is_opaque {
			self.types.writeln(format!("{keyword} {};", s.name));
			return;
		}
		self.types.writeln(format!("{keyword} {} {{", s.name));
		for f in &s.fields {
			self.gen_field(f);
		}
		self.types.writeln("};");
	}

	fn gen_field(&mut self, f: &IrField) {
		let fname = c_escape(&f.name);
		if let IrType::Fn(fn_typ) = &f.typ {
			let decl = self.wrap_fn_ptr_str(fn_typ, &fname);
			self.types.writeln(format!("  {decl};"));
		} else {
			let typ_str = self.gen_type_str(&f.typ);
			self.types.writeln(format!("  {typ_str} {fname};"));
		}
	}

	pub(super) fn gen_externs(&mut self, externs: &[ExternFn]) {
		for e in externs {
			self.protos.write("extern ");
			if e.is_noreturn {
				self.protos.write("RIVET_NORETURN ");
			}
			self.inside_func_ret_typ = true;
			let ret_str = self.gen_type_str(&e.ret);
			self.inside_func_ret_typ = false;
			self.protos.write(ret_str);
			self.protos.write(format!(" {}(", e.name));
			if e.args.is_empty() {
				self.protos.write("void");
			} else {
				let last = e.args.len() - 1;
				for (i, arg) in e.args.iter().enumerate() {
					if let IrType::Fn(fn_typ) = &arg.typ {
						let decl = self.wrap_fn_ptr_str(fn_typ, &arg.name);
						self.protos.write(decl);
					} else {
						let typ_str = self.gen_type_str(&arg.typ);
						self.protos.write(typ_str);
						self.protos.write(" ");
						self.protos.write(&arg.name);
					}
					if i < last {
						self.protos.write(", ");
					}
				}
				if e.is_variadic {
					self.protos.write(", ...");
				}
			}
			self.protos.writeln(");");
		}
		self.protos.newline();
	}

	pub(super) fn gen_statics(&mut self, statics: &[StaticVar]) {
		for s in statics {
			if s.is_extern {
				self.statics.write("extern ");
			} else if !s.is_pub {
				self.statics.write("RIVET_LOCAL_SYMBOL ");
			}
			let typ_str = self.gen_type_str(&s.typ);
			self.statics.write(typ_str);
			self.statics.writeln(format!(" {};", s.name));
		}
	}

	pub(super) fn gen_decl(&mut self, decl: &TopDecl) -> Result<(), EmitError> {
		match decl {
			TopDecl::VTable(v) => {
				self.gen_vtable(v);
				Ok(())
			}
			TopDecl::Fn(f) => self.gen_fn(f),
		}
	}

	fn gen_vtable(&mut self, v: &VTable) {
		self.statics.writeln(format!("static {} {}[{}] = {{", v.struct_name, v.name, v.rows.len()));
		let last_row = v.rows.len().saturating_sub(1);
		for (i, row) in v.rows.iter().enumerate() {
			self.statics.writeln("  {");
			for (slot, impl_name) in row {
				self.statics.writeln(format!("    .{slot} = (void*){impl_name}"));
			}
			self.statics.write("  }");
			if i < last_row {
				self.statics.writeln(",");
			} else {
				self.statics.newline();
			}
		}
		self.statics.writeln("};");
	}

	/// Emits both the prototype (into `protos`) and the definition (into
	/// `out`) for a non-extern function, with matching signatures up to
	/// the terminating `;` vs ` {` (§8.7).
	fn gen_fn(&mut self, f: &crate::ir::FnDecl) -> Result<(), EmitError> {
		if f.is_noreturn {
			self.write("RIVET_NORETURN ");
			self.protos.write("RIVET_NORETURN ");
		}
		if f.vis.is_pub() {
			self.write("RIVET_EXPORTED_SYMBOL ");
		} else {
			self.write("RIVET_LOCAL_SYMBOL ");
		}

		self.inside_func_ret_typ = matches!(f.ret, IrType::Array { .. });
		let ret_str = self.gen_type_str(&f.ret);
		self.inside_func_ret_typ = false;
		self.protos.write(ret_str.clone());
		self.write(ret_str);

		self.protos.write(format!(" {}(", f.name));
		self.write(format!(" {}(", f.name));
		if f.args.is_empty() {
			self.write("void");
			self.protos.write("void");
		} else {
			let last = f.args.len() - 1;
			for (i, a) in f.args.iter().enumerate() {
				let arg_name = c_escape(&a.name);
				if let IrType::Fn(fn_typ) = &a.typ {
					let decl = self.wrap_fn_ptr_str(fn_typ, &arg_name);
					self.write(decl.clone());
					self.protos.write(decl);
				} else {
					let typ_str = self.gen_type_str(&a.typ);
					self.write(typ_str.clone());
					self.write(" ");
					self.write(&arg_name);
					self.protos.write(format!("{typ_str} {arg_name}"));
				}
				if i < last {
					self.write(", ");
					self.protos.write(", ");
				}
			}
		}
		self.protos.writeln(");");
		self.writeln(") {");
		self.gen_blocks(&f.blocks)?;
		self.writeln("}\n");
		Ok(())
	}
}

fn mangled_member_name(typ: &IrType) -> String {
	match typ {
		IrType::Named { name, .. } => name.clone(),
		IrType::Array { mangled_name, .. } => mangled_name.clone(),
		IrType::Enum { mangled_name, .. } => mangled_name.clone(),
		_ => "member".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::{CompilerContext, CompilerPrefs};
	use crate::ir::IntWidth;

	fn gen() -> Gen {
		Gen::new(CompilerContext::new(CompilerPrefs::default()).prefs)
	}

	#[test]
	fn opaque_struct_emits_only_forward_declaration() {
		let mut g = gen();
		let s = StructRecord { name: "Opaque".to_string(), is_union: false, is_opaque: true, fields: vec![] };
		g.gen_struct(&s);
		assert!(g.types.to_string().contains("struct Opaque;"));
		assert!(!g.types.to_string().contains("{"));
	}

	#[test]
	fn reserved_field_name_is_escaped() {
		let mut g = gen();
		let s = StructRecord {
			name: "S".to_string(),
			is_union: false,
			is_opaque: false,
			fields: vec![IrField { name: "new".to_string(), typ: IrType::Int(IntWidth::I32) }],
		};
		g.gen_struct(&s);
		assert!(g.types.to_string().contains("i32 _ri_new;"));
	}

	#[test]
	fn vtable_casts_every_implementation_to_void_star() {
		let mut g = gen();
		let v = VTable {
			name: "T_vt".to_string(),
			struct_name: "T_vt_t".to_string(),
			rows: vec![
				vec![("m0".to_string(), "A_m0".to_string()), ("m1".to_string(), "A_m1".to_string())],
				vec![("m0".to_string(), "B_m0".to_string()), ("m1".to_string(), "B_m1".to_string())],
			],
		};
		g.gen_vtable(&v);
		let out = g.statics.to_string();
		assert!(out.contains("static T_vt_t T_vt[2] = {"));
		assert!(out.contains(".m0 = (void*)A_m0"));
		assert!(out.contains(".m1 = (void*)B_m1"));
	}

	#[test]
	fn extern_fn_with_no_args_emits_void_param_list() {
		let mut g = gen();
		let e = ExternFn { name: "abort".to_string(), args: vec![], ret: IrType::Void, is_variadic: false, is_noreturn: true };
		g.gen_externs(&[e]);
		assert!(g.protos.to_string().contains("extern RIVET_NORETURN void abort(void);"));
	}

	#[test]
	fn public_static_has_no_local_symbol_marker() {
		let mut g = gen();
		let s = StaticVar { name: "counter".to_string(), typ: IrType::Int(IntWidth::I32), is_extern: false, is_pub: true };
		g.gen_statics(&[s]);
		assert_eq!(g.statics.to_string().trim(), "i32 counter;");
	}

	#[test]
	fn private_static_gets_local_symbol_marker() {
		let mut g = gen();
		let s = StaticVar { name: "hidden".to_string(), typ: IrType::Int(IntWidth::I32), is_extern: false, is_pub: false };
		g.gen_statics(&[s]);
		assert!(g.statics.to_string().starts_with("RIVET_LOCAL_SYMBOL i32 hidden;"));
	}

	#[test]
	fn alias_of_struct_element_gets_struct_keyword() {
		let mut g = gen();
		let a = AliasRecord {
			name: "Arr4S".to_string(),
			elem: IrType::Named { name: "S".to_string(), kind: crate::sym::TypeKind::Struct },
			size: 4,
		};
		g.gen_alias(&a);
		assert!(g.types.to_string().contains("typedef struct S Arr4S[4];"));
	}

	#[test]
	fn alias_of_non_struct_element_omits_struct_keyword() {
		let mut g = gen();
		let a = AliasRecord {
			name: "Arr4Opt".to_string(),
			elem: IrType::Named { name: "Opt".to_string(), kind: crate::sym::TypeKind::Alias },
			size: 4,
		};
		g.gen_alias(&a);
		assert!(g.types.to_string().contains("typedef Opt Arr4Opt[4];"));
		assert!(!g.types.to_string().contains("struct Opt"));
	}
}
