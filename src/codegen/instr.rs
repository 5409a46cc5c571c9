//! Lowering of basic blocks, instructions and expressions to C statements,
//! per the table in §4.2. Two-space indentation for instructions, labels
//! reset to column zero.

use crate::error::EmitError;
use crate::ir::{BasicBlock, Expr, Instr, InstrKind, IrType};

use super::header::c_escape;
use super::Gen;

const MIN_I64_LIT: &str = "(-9223372036854775807 - 1)";

impl Gen {
	pub(super) fn gen_blocks(&mut self, blocks: &[BasicBlock]) -> Result<(), EmitError> {
		for block in blocks {
			if let Some(label) = &block.label {
				self.out.newline();
				self.writeln(format!("{label}: {{}}"));
			}
			for instr in &block.instrs {
				self.gen_top_instr(instr)?;
			}
		}
		Ok(())
	}

	fn gen_top_instr(&mut self, instr: &Instr) -> Result<(), EmitError> {
		match instr.kind {
			InstrKind::Label => {
				// Standalone labels inside a block (not the block's own
				// leading label) follow the same reset-to-column-zero rule.
				let name = instr.name.as_deref().unwrap_or("");
				self.out.newline();
				self.writeln(format!("{name}: {{}}"));
				Ok(())
			}
			InstrKind::Comment => {
				let text = instr.text.as_deref().unwrap_or("");
				self.write("  ");
				self.writeln(format!("/* {text} */"));
				Ok(())
			}
			InstrKind::Alloca => {
				self.write("  ");
				self.gen_alloca(instr)?;
				self.writeln(";");
				Ok(())
			}
			InstrKind::DbgStmtLine => {
				self.write("  ");
				self.gen_instr_expr(instr)?;
				self.out.newline();
				Ok(())
			}
			_ => {
				self.write("  ");
				self.gen_instr_expr(instr)?;
				self.writeln(";");
				Ok(())
			}
		}
	}

	fn gen_alloca(&mut self, instr: &Instr) -> Result<(), EmitError> {
		let typ = instr
			.typ
			.as_ref()
			.ok_or(EmitError::MalformedType("Alloca missing a type".to_string()))?;
		let name = instr
			.name
			.as_deref()
			.ok_or_else(|| EmitError::MalformedType("Alloca missing a name".to_string()))?;
		let init = instr.args.first().ok_or(EmitError::UnknownInstruction("Alloca"))?;

		let mut typ_str = self.gen_type_str(typ);
		if let Expr::Instr(inner) = init {
			if matches!(inner.kind, InstrKind::Call) {
				if let Some(Expr::Ident { typ: IrType::Array { .. }, .. }) = inner.args.first() {
					typ_str.push_str("_Ret");
				}
			}
		}
		self.write(format!("{typ_str} {name} = "));
		self.gen_expr(init)
	}

	/// Lowers an instruction used as an expression operand; the
	/// register-based IR allows instructions to nest this way.
	fn gen_instr_expr(&mut self, instr: &Instr) -> Result<(), EmitError> {
		match &instr.kind {
			InstrKind::Nop => {
				self.write("/* NOP */");
				Ok(())
			}
			InstrKind::Alloca => {
				let arg0 = instr.args.first().ok_or(EmitError::UnknownInstruction("Alloca"))?;
				if let Some(IrType::Fn(fn_typ)) = arg0.typ() {
					let name = ident_name(arg0).unwrap_or_default();
					let decl = self.wrap_fn_ptr_str(&fn_typ.clone(), &name);
					self.write(decl);
				} else if let Some(typ) = arg0.typ() {
					let typ_str = self.gen_type_str(&typ.clone());
					self.write(format!("{typ_str} "));
					self.gen_expr(arg0)?;
				}
				Ok(())
			}
			InstrKind::Store | InstrKind::StorePtr => self.gen_store(instr),
			InstrKind::LoadPtr => {
				self.write("(*(");
				self.gen_expr(arg(instr, 0)?)?;
				self.write("))");
				Ok(())
			}
			InstrKind::GetElementPtr => {
				self.write("(");
				self.gen_expr(arg(instr, 0)?)?;
				self.write(" + ");
				self.gen_expr(arg(instr, 1)?)?;
				self.write(")");
				Ok(())
			}
			InstrKind::GetRef => self.gen_get_ref(arg(instr, 0)?),
			InstrKind::Cast => {
				self.write("((");
				self.gen_expr(arg(instr, 1)?)?;
				self.write(")(");
				self.gen_expr(arg(instr, 0)?)?;
				self.write("))");
				Ok(())
			}
			InstrKind::Cmp(op) => {
				self.gen_expr(arg(instr, 0)?)?;
				self.write(format!(" {} ", op.as_c_str()));
				self.gen_expr(arg(instr, 1)?)?;
				Ok(())
			}
			InstrKind::Select => {
				self.write("(");
				self.gen_expr(arg(instr, 0)?)?;
				self.write(") ? (");
				self.gen_expr(arg(instr, 1)?)?;
				self.write(") : (");
				self.gen_expr(arg(instr, 2)?)?;
				self.write(")");
				Ok(())
			}
			InstrKind::DbgStmtLine => {
				let file = instr.text.as_deref().unwrap_or("");
				let line = ident_name(arg(instr, 0)?).unwrap_or_default();
				self.write(format!("#line {line} \"{file}\""));
				Ok(())
			}
			InstrKind::Unreachable => {
				self.write("RIVET_UNREACHABLE()");
				Ok(())
			}
			InstrKind::Breakpoint => {
				self.write("RIVET_BREAKPOINT()");
				Ok(())
			}
			InstrKind::Bin(op) => {
				self.gen_expr(arg(instr, 0)?)?;
				self.write(format!(" {} ", op.as_c_str()));
				self.gen_expr(arg(instr, 1)?)?;
				Ok(())
			}
			InstrKind::Inc => {
				self.gen_expr(arg(instr, 0)?)?;
				self.write("++");
				Ok(())
			}
			InstrKind::Dec => {
				self.gen_expr(arg(instr, 0)?)?;
				self.write("--");
				Ok(())
			}
			InstrKind::BitNot => {
				self.write("~");
				self.gen_expr(arg(instr, 0)?)
			}
			InstrKind::BooleanNot => {
				self.write("!(");
				self.gen_expr(arg(instr, 0)?)?;
				self.write(")");
				Ok(())
			}
			InstrKind::Neg => {
				self.write("-");
				self.gen_expr(arg(instr, 0)?)
			}
			InstrKind::Br => self.gen_br(instr),
			InstrKind::Call => self.gen_call(instr),
			InstrKind::Ret => self.gen_ret(instr),
			InstrKind::Label | InstrKind::Comment => {
				Err(EmitError::UnknownInstruction(instr.kind_name()))
			}
		}
	}

	fn gen_store(&mut self, instr: &Instr) -> Result<(), EmitError> {
		let dst = arg(instr, 0)?;
		let src = arg(instr, 1)?;
		let dst_is_lvalue = matches!(dst, Expr::Ident { .. } | Expr::Selector { .. });
		let dst_is_array = matches!(dst.typ(), Some(IrType::Array { .. }));
		if dst_is_lvalue && dst_is_array {
			self.write("memcpy(");
			if !matches!(instr.kind, InstrKind::StorePtr) {
				self.write("&");
			}
			self.gen_expr(dst)?;
			self.write(", ");
			let src_uses_arr_field = matches!(src, Expr::Ident { use_arr_field: true, .. });
			if !src_uses_arr_field {
				self.write("&");
			}
			self.gen_expr(src)?;
			self.write(", sizeof(");
			let typ_str = dst.typ().map(|t| self.gen_type_str(&t.clone())).unwrap_or_default();
			self.write(typ_str);
			self.write("))");
			Ok(())
		} else {
			if matches!(instr.kind, InstrKind::StorePtr) {
				self.write("(*");
			}
			self.gen_expr(dst)?;
			if matches!(instr.kind, InstrKind::StorePtr) {
				self.write(")");
			}
			self.write(" = ");
			self.gen_expr(src)
		}
	}

	fn gen_get_ref(&mut self, operand: &Expr) -> Result<(), EmitError> {
		if operand.is_addressable() {
			self.write("(&");
			self.gen_expr(operand)?;
			if matches!(operand, Expr::Array { .. }) {
				self.write("[0]");
			}
			self.write(")");
			Ok(())
		} else {
			let typ = operand
				.typ()
				.ok_or_else(|| EmitError::MalformedType("GetRef operand has no type".to_string()))?
				.clone();
			let typ_str = self.gen_type_str(&typ);
			self.write(format!("(&(({typ_str}[]){{ "));
			self.gen_expr(operand)?;
			self.write(" }[0]))");
			Ok(())
		}
	}

	fn gen_br(&mut self, instr: &Instr) -> Result<(), EmitError> {
		if instr.args.len() == 1 {
			let label = ident_name(arg(instr, 0)?).unwrap_or_default();
			self.write(format!("goto {label}"));
			Ok(())
		} else {
			self.write("if (");
			self.gen_expr(arg(instr, 0)?)?;
			let then_label = ident_name(arg(instr, 1)?).unwrap_or_default();
			let else_label = ident_name(arg(instr, 2)?).unwrap_or_default();
			self.write(format!(") goto {then_label}; else goto {else_label}"));
			Ok(())
		}
	}

	fn gen_call(&mut self, instr: &Instr) -> Result<(), EmitError> {
		let callee = arg(instr, 0)?;
		if let Expr::Ident { name, .. } = callee {
			self.write(c_escape(name));
		} else {
			self.gen_expr(callee)?;
		}
		self.write("(");
		let call_args = &instr.args[1..];
		let last = call_args.len().saturating_sub(1);
		for (i, a) in call_args.iter().enumerate() {
			self.gen_expr(a)?;
			if i < last {
				self.write(", ");
			}
		}
		self.write(")");
		Ok(())
	}

	fn gen_ret(&mut self, instr: &Instr) -> Result<(), EmitError> {
		self.write("return");
		if let Some(arg0) = instr.args.first() {
			self.write(" ");
			if let Expr::Array { typ, .. } = arg0 {
				let mangled = match typ {
					IrType::Array { mangled_name, .. } => mangled_name.clone(),
					other => self.gen_type_str(other),
				};
				self.write(format!("({mangled}_Ret){{.arr="));
				self.gen_expr(arg0)?;
				self.write("}");
			} else {
				self.gen_expr(arg0)?;
			}
		}
		Ok(())
	}

	fn gen_expr(&mut self, expr: &Expr) -> Result<(), EmitError> {
		match expr {
			Expr::Instr(i) => self.gen_instr_expr(i),
			Expr::None => {
				self.write("NULL");
				Ok(())
			}
			Expr::Int { lit, typ } => self.gen_int_literal(lit, typ),
			Expr::Float { lit, typ } => {
				self.write(lit);
				if matches!(typ, IrType::Float(crate::ir::FloatWidth::F32)) {
					self.write("f");
				}
				Ok(())
			}
			Expr::Rune(lit) => {
				self.write(lit);
				Ok(())
			}
			Expr::Str { text, len, typ } => {
				if matches!(typ, IrType::Ptr(_)) {
					self.write(format!("(u8*)\"{text}\""));
				} else {
					self.write(format!("(_R4core4_str){{.ptr=((u8*)\"{text}\"), .len={len}U}}"));
				}
				Ok(())
			}
			Expr::Array { typ, elems, is_variadic_init } => {
				self.write("(");
				let typ_str = self.gen_type_str(&typ.clone());
				self.write(typ_str);
				if *is_variadic_init {
					self.write("[]");
				}
				self.write("){ ");
				let last = elems.len().saturating_sub(1);
				for (i, e) in elems.iter().enumerate() {
					self.gen_expr(e)?;
					if i < last {
						self.write(", ");
					}
				}
				self.write(" }");
				Ok(())
			}
			Expr::Ident { name, use_arr_field, .. } => {
				if *use_arr_field {
					self.write(name);
					self.write(".arr");
				} else {
					self.write(c_escape(name));
				}
				Ok(())
			}
			Expr::Selector { base, field } => {
				self.gen_expr(base)?;
				self.write(".");
				self.write(c_escape(field));
				Ok(())
			}
		}
	}

	fn gen_int_literal(&mut self, lit: &str, typ: &IrType) -> Result<(), EmitError> {
		if lit == "-9223372036854775808" {
			self.write(MIN_I64_LIT);
		} else {
			self.write(lit);
		}
		if let IrType::Int(w) = typ {
			if w.is_unsigned() {
				self.write("U");
			}
			if w.bits() == 64 {
				self.write("L");
			}
		}
		Ok(())
	}
}

fn arg(instr: &Instr, idx: usize) -> Result<&Expr, EmitError> {
	instr.args.get(idx).ok_or(EmitError::UnknownInstruction(instr.kind_name()))
}

fn ident_name(expr: &Expr) -> Option<&str> {
	match expr {
		Expr::Ident { name, .. } => Some(name),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::codegen::Gen;
	use crate::context::{CompilerContext, CompilerPrefs};
	use crate::ir::{CmpOp, IntWidth};

	fn gen() -> Gen {
		Gen::new(CompilerContext::new(CompilerPrefs::default()).prefs)
	}

	fn ident(name: &str) -> Expr {
		Expr::Ident { name: name.to_string(), typ: IrType::Int(IntWidth::I32), use_arr_field: false }
	}

	#[test]
	fn conditional_branch_lowers_to_if_goto_else_goto() {
		let mut g = gen();
		let instr = Instr {
			kind: InstrKind::Br,
			name: None,
			typ: None,
			args: vec![ident("cond"), ident("L1"), ident("L2")],
			text: None,
		};
		g.gen_instr_expr(&instr).unwrap();
		assert_eq!(g.out.to_string(), "if (cond) goto L1; else goto L2");
	}

	#[test]
	fn unconditional_branch_lowers_to_goto() {
		let mut g = gen();
		let instr = Instr { kind: InstrKind::Br, name: None, typ: None, args: vec![ident("L1")], text: None };
		g.gen_instr_expr(&instr).unwrap();
		assert_eq!(g.out.to_string(), "goto L1");
	}

	#[test]
	fn min_i64_literal_avoids_unary_minus_overflow() {
		let mut g = gen();
		g.gen_int_literal("-9223372036854775808", &IrType::Int(IntWidth::I64)).unwrap();
		assert_eq!(g.out.to_string(), "(-9223372036854775807 - 1)L");
	}

	#[test]
	fn unsigned_literal_gets_u_suffix() {
		let mut g = gen();
		g.gen_int_literal("42", &IrType::Int(IntWidth::U32)).unwrap();
		assert_eq!(g.out.to_string(), "42U");
	}

	#[test]
	fn store_to_array_lvalue_emits_memcpy() {
		let mut g = gen();
		let array_typ = IrType::Array {
			elem: Box::new(IrType::Int(IntWidth::I32)),
			size: 3,
			mangled_name: "_R4Arr3i32".to_string(),
		};
		let dst = Expr::Ident { name: "dst".to_string(), typ: array_typ.clone(), use_arr_field: false };
		let src = Expr::Ident { name: "src".to_string(), typ: array_typ, use_arr_field: false };
		let instr = Instr { kind: InstrKind::Store, name: None, typ: None, args: vec![dst, src], text: None };
		g.gen_instr_expr(&instr).unwrap();
		assert!(g.out.to_string().starts_with("memcpy(&dst, &src, sizeof(_R4Arr3i32))"));
	}

	#[test]
	fn cmp_renders_infix_operator() {
		let mut g = gen();
		let instr = Instr {
			kind: InstrKind::Cmp(CmpOp::Lt),
			name: None,
			typ: None,
			args: vec![ident("a"), ident("b")],
			text: None,
		};
		g.gen_instr_expr(&instr).unwrap();
		assert_eq!(g.out.to_string(), "a < b");
	}

	#[test]
	fn get_ref_on_rvalue_uses_compound_literal_trick() {
		let mut g = gen();
		let rvalue = Expr::Int { lit: "1".to_string(), typ: IrType::Int(IntWidth::I32) };
		g.gen_get_ref(&rvalue).unwrap();
		assert_eq!(g.out.to_string(), "(&((i32[]){ 1 }[0]))");
	}
}
