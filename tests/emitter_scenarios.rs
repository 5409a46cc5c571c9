//! End-to-end emission scenarios (C–F) exercised through the public
//! `codegen::Gen` API over hand-built `IrModule`s.

use rivetc_core::codegen::{header, Gen};
use rivetc_core::context::CompilerPrefs;
use rivetc_core::ir::*;
use rivetc_core::sym::Vis;

fn gen() -> Gen {
	Gen::new(CompilerPrefs::default())
}

fn i32_typ() -> IrType {
	IrType::Int(IntWidth::I32)
}

fn ident(name: &str, typ: IrType) -> Expr {
	Expr::Ident { name: name.to_string(), typ, use_arr_field: false }
}

/// Scenario C: a function returning a fixed-size array gets a `_Ret`
/// wrapper typedef, and its prototype/return site use it.
#[test]
fn array_return_type_gets_ret_wrapper() {
	let arr_typ = IrType::Array { elem: Box::new(i32_typ()), size: 3, mangled_name: "Arr3i32".to_string() };
	let ret_instr = Instr {
		kind: InstrKind::Ret,
		name: None,
		typ: None,
		args: vec![Expr::Array {
			typ: arr_typ.clone(),
			elems: vec![
				Expr::Int { lit: "1".to_string(), typ: i32_typ() },
				Expr::Int { lit: "2".to_string(), typ: i32_typ() },
				Expr::Int { lit: "3".to_string(), typ: i32_typ() },
			],
			is_variadic_init: false,
		}],
		text: None,
	};
	let module = IrModule {
		types: vec![],
		externs: vec![],
		statics: vec![],
		decls: vec![TopDecl::Fn(FnDecl {
			name: "f".to_string(),
			vis: Vis::Public,
			abi: rivetc_core::sym::Abi::Rivet,
			args: vec![],
			ret: arr_typ,
			is_noreturn: false,
			blocks: vec![BasicBlock { label: None, instrs: vec![ret_instr] }],
		})],
	};

	let mut g = gen();
	g.gen_module(&module).unwrap();
	let out = g.get_output();

	assert!(out.contains("typedef struct Arr3i32_Ret Arr3i32_Ret;"));
	assert!(out.contains("struct Arr3i32_Ret { i32* arr; };"));
	assert!(out.contains("Arr3i32_Ret f(void) {"));
	assert!(out.contains("return (Arr3i32_Ret){.arr=(Arr3i32){ 1, 2, 3 }};"));
}

/// Scenario D: a struct field named `new` (a reserved word) is escaped.
#[test]
fn reserved_word_field_is_escaped() {
	let module = IrModule {
		types: vec![TypeDecl::Struct(StructRecord {
			name: "S".to_string(),
			is_union: false,
			is_opaque: false,
			fields: vec![IrField { name: "new".to_string(), typ: i32_typ() }],
		})],
		externs: vec![],
		statics: vec![],
		decls: vec![],
	};

	let mut g = gen();
	g.gen_module(&module).unwrap();
	let out = g.get_output();
	assert!(out.contains("struct S {"));
	assert!(out.contains("i32 _ri_new;"));
}

/// Scenario E: a two-implementer vtable casts every method pointer to
/// `void*` unconditionally.
#[test]
fn trait_vtable_emission() {
	let module = IrModule {
		types: vec![],
		externs: vec![],
		statics: vec![],
		decls: vec![TopDecl::VTable(VTable {
			name: "T_vt".to_string(),
			struct_name: "T_vt_t".to_string(),
			rows: vec![
				vec![("m0".to_string(), "A_m0".to_string()), ("m1".to_string(), "A_m1".to_string())],
				vec![("m0".to_string(), "B_m0".to_string()), ("m1".to_string(), "B_m1".to_string())],
			],
		})],
	};

	let mut g = gen();
	g.gen_module(&module).unwrap();
	let out = g.get_output();
	assert!(out.contains("static T_vt_t T_vt[2] = {"));
	assert!(out.contains(".m0 = (void*)A_m0"));
	assert!(!out.contains(".m1 = (void*)B_m0"));
	assert!(out.contains(".m1 = (void*)B_m1"));
}

/// Scenario F: a conditional branch followed by its two targets' labels.
#[test]
fn conditional_branch_then_labels() {
	let br = Instr {
		kind: InstrKind::Br,
		name: None,
		typ: None,
		args: vec![ident("cond", IrType::Bool), ident("L1", IrType::Void), ident("L2", IrType::Void)],
		text: None,
	};
	let module = IrModule {
		types: vec![],
		externs: vec![],
		statics: vec![],
		decls: vec![TopDecl::Fn(FnDecl {
			name: "f".to_string(),
			vis: Vis::Public,
			abi: rivetc_core::sym::Abi::Rivet,
			args: vec![],
			ret: IrType::Void,
			is_noreturn: false,
			blocks: vec![
				BasicBlock { label: None, instrs: vec![br] },
				BasicBlock { label: Some("L1".to_string()), instrs: vec![] },
				BasicBlock { label: Some("L2".to_string()), instrs: vec![] },
			],
		})],
	};

	let mut g = gen();
	g.gen_module(&module).unwrap();
	let out = g.get_output();
	assert!(out.contains("if (cond) goto L1; else goto L2;"));
	assert!(out.contains("L1: {}"));
	assert!(out.contains("L2: {}"));
}

/// Invariant 6: output always begins with the fixed header, byte-for-byte.
#[test]
fn output_begins_with_fixed_header() {
	let g = gen();
	assert!(g.get_output().starts_with(header::HEADER));
}

/// Invariant 9: reserved words in arg/local names are also escaped.
#[test]
fn reserved_word_arg_name_is_escaped() {
	let module = IrModule {
		types: vec![],
		externs: vec![],
		statics: vec![],
		decls: vec![TopDecl::Fn(FnDecl {
			name: "f".to_string(),
			vis: Vis::Private,
			abi: rivetc_core::sym::Abi::Rivet,
			args: vec![IrArg { name: "new".to_string(), typ: i32_typ() }],
			ret: IrType::Void,
			is_noreturn: false,
			blocks: vec![],
		})],
	};
	let mut g = gen();
	g.gen_module(&module).unwrap();
	let out = g.get_output();
	assert!(out.contains("i32 _ri_new) {"));
}

/// Invariant 7: every FnDecl produces one prototype and one matching
/// definition, identical up to `;` vs ` {`.
#[test]
fn prototype_and_definition_signatures_match() {
	let module = IrModule {
		types: vec![],
		externs: vec![],
		statics: vec![],
		decls: vec![TopDecl::Fn(FnDecl {
			name: "f".to_string(),
			vis: Vis::Public,
			abi: rivetc_core::sym::Abi::Rivet,
			args: vec![IrArg { name: "x".to_string(), typ: i32_typ() }],
			ret: i32_typ(),
			is_noreturn: false,
			blocks: vec![BasicBlock {
				label: None,
				instrs: vec![Instr {
					kind: InstrKind::Ret,
					name: None,
					typ: None,
					args: vec![ident("x", i32_typ())],
					text: None,
				}],
			}],
		})],
	};
	let mut g = gen();
	g.gen_module(&module).unwrap();
	let out = g.get_output();
	assert!(out.contains("i32 f(i32 x);"));
	assert!(out.contains("i32 f(i32 x) {"));
}
