//! The typed, register-based IR the emitter lowers to C. Produced by a type
//! checker and IR builder outside this crate; this module only specifies
//! the shape [`crate::codegen`] consumes.

use crate::sym::{Abi, TypeKind, Vis};

/// A resolved IR type. Unlike [`crate::ast::TypeExpr`], every named
/// reference here already carries the mangled name the emitter writes
/// verbatim, since by this stage the checker has fully resolved it.
#[derive(Debug, Clone)]
pub enum IrType {
	Void,
	NoReturn,
	Bool,
	Rune,
	Int(IntWidth),
	Float(FloatWidth),
	Ptr(Box<IrType>),
	Ref(Box<IrType>),
	Slice,
	/// A fixed-size array, named by its mangled type name. Whether the
	/// `_Ret` return-position wrapper has already been materialized is
	/// tracked by the emitter itself (see [`crate::codegen::types`]), not
	/// here, since the wrapper is a property of one `Gen` run, not the type.
	Array { elem: Box<IrType>, size: u64, mangled_name: String },
	Fn(Box<FnType>),
	/// An enum's underlying primitive, carried alongside its mangled name so
	/// `gen_type_str` can unwrap straight to the primitive per §4.2.
	Enum { underlying: Box<IrType>, mangled_name: String },
	/// Any other named type (struct/union/alias/optional/result wrapper):
	/// the mangled name is what the emitter writes. `kind` records the
	/// symbol's `TypeKind` so emission sites that care about struct/tuple
	/// vs. everything else (e.g. the alias keyword in §4.2) don't have to
	/// guess from the name alone.
	Named { name: String, kind: TypeKind },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IntWidth {
	I8,
	I16,
	I32,
	I64,
	U8,
	U16,
	U32,
	U64,
	Isize,
	Usize,
}

impl IntWidth {
	pub fn is_unsigned(self) -> bool {
		matches!(self, IntWidth::U8 | IntWidth::U16 | IntWidth::U32 | IntWidth::U64 | IntWidth::Usize)
	}

	pub fn bits(self) -> u32 {
		match self {
			IntWidth::I8 | IntWidth::U8 => 8,
			IntWidth::I16 | IntWidth::U16 => 16,
			IntWidth::I32 | IntWidth::U32 => 32,
			IntWidth::I64 | IntWidth::U64 => 64,
			IntWidth::Isize | IntWidth::Usize => usize::BITS,
		}
	}
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FloatWidth {
	F32,
	F64,
}

#[derive(Debug, Clone)]
pub struct FnType {
	pub args: Vec<IrType>,
	pub ret: IrType,
	pub is_method: bool,
}

#[derive(Debug, Clone)]
pub struct IrField {
	pub name: String,
	pub typ: IrType,
}

/// `typedef [struct] <elem> <name>[<N>];`
#[derive(Debug, Clone)]
pub struct AliasRecord {
	pub name: String,
	pub elem: IrType,
	pub size: u64,
}

/// A tagged union: struct containing an anonymous `union` of `variants`
/// plus an `i64 idx` discriminant.
#[derive(Debug, Clone)]
pub struct UnionRecord {
	pub name: String,
	pub variants: Vec<IrType>,
}

#[derive(Debug, Clone)]
pub struct StructRecord {
	pub name: String,
	pub is_union: bool,
	pub is_opaque: bool,
	pub fields: Vec<IrField>,
}

#[derive(Debug, Clone)]
pub enum TypeDecl {
	Alias(AliasRecord),
	Union(UnionRecord),
	Struct(StructRecord),
}

#[derive(Debug, Clone)]
pub struct ExternFn {
	pub name: String,
	pub args: Vec<IrField>,
	pub ret: IrType,
	pub is_variadic: bool,
	pub is_noreturn: bool,
}

#[derive(Debug, Clone)]
pub struct StaticVar {
	pub name: String,
	pub typ: IrType,
	pub is_extern: bool,
	pub is_pub: bool,
}

/// `method slot name` → mangled implementation symbol, one row per
/// implementer, in implementer order.
#[derive(Debug, Clone)]
pub struct VTable {
	pub name: String,
	pub struct_name: String,
	pub rows: Vec<Vec<(String, String)>>,
}

#[derive(Debug, Clone)]
pub struct IrArg {
	pub name: String,
	pub typ: IrType,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
	pub label: Option<String>,
	pub instrs: Vec<Instr>,
}

#[derive(Debug, Clone)]
pub struct FnDecl {
	pub name: String,
	pub vis: Vis,
	pub abi: Abi,
	pub args: Vec<IrArg>,
	pub ret: IrType,
	pub is_noreturn: bool,
	pub blocks: Vec<BasicBlock>,
}

#[derive(Debug, Clone)]
pub enum TopDecl {
	VTable(VTable),
	Fn(FnDecl),
}

/// One translation unit's worth of IR, as handed to [`crate::codegen::Gen`].
#[derive(Debug, Clone, Default)]
pub struct IrModule {
	pub types: Vec<TypeDecl>,
	pub externs: Vec<ExternFn>,
	pub statics: Vec<StaticVar>,
	pub decls: Vec<TopDecl>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CmpOp {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
}

impl CmpOp {
	pub fn as_c_str(self) -> &'static str {
		match self {
			CmpOp::Eq => "==",
			CmpOp::Ne => "!=",
			CmpOp::Lt => "<",
			CmpOp::Le => "<=",
			CmpOp::Gt => ">",
			CmpOp::Ge => ">=",
		}
	}
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BinOp {
	Add,
	Sub,
	Mult,
	Div,
	Mod,
	BitAnd,
	BitOr,
	BitXor,
	Lshift,
	Rshift,
}

impl BinOp {
	pub fn as_c_str(self) -> &'static str {
		match self {
			BinOp::Add => "+",
			BinOp::Sub => "-",
			BinOp::Mult => "*",
			BinOp::Div => "/",
			BinOp::Mod => "%",
			BinOp::BitAnd => "&",
			BinOp::BitOr => "|",
			BinOp::BitXor => "^",
			BinOp::Lshift => "<<",
			BinOp::Rshift => ">>",
		}
	}
}

/// An operand: either a literal, an identifier/selector naming a value
/// already in scope, or another instruction used as an expression (the
/// register-based IR allows instructions to nest as operands).
#[derive(Debug, Clone)]
pub enum Expr {
	None,
	Int { lit: String, typ: IrType },
	Float { lit: String, typ: IrType },
	Rune(String),
	/// `len` is the original source length, kept separately from the
	/// escaped text because escape sequences make `text.len() != len`.
	Str { text: String, len: u64, typ: IrType },
	Array { typ: IrType, elems: Vec<Expr>, is_variadic_init: bool },
	/// A bare name. `use_arr_field` selects the `.arr` sub-field of a
	/// `_Ret`-wrapped value (see §4.2's `Store` rule).
	Ident { name: String, typ: IrType, use_arr_field: bool },
	Selector { base: Box<Expr>, field: String },
	Instr(Box<Instr>),
}

impl Expr {
	pub fn typ(&self) -> Option<&IrType> {
		match self {
			Expr::Int { typ, .. } | Expr::Float { typ, .. } | Expr::Str { typ, .. } => Some(typ),
			Expr::Array { typ, .. } => Some(typ),
			Expr::Ident { typ, .. } => Some(typ),
			_ => None,
		}
	}

	/// Whether this operand is a C l-value the emitter may take the address
	/// of directly, per the `GetRef` rule in §4.2.
	pub fn is_addressable(&self) -> bool {
		matches!(self, Expr::Ident { .. } | Expr::Selector { .. } | Expr::Array { .. })
			|| matches!(self, Expr::Instr(i) if matches!(i.kind, InstrKind::LoadPtr))
	}
}

#[derive(Debug, Clone)]
pub enum InstrKind {
	Nop,
	Alloca,
	Store,
	StorePtr,
	LoadPtr,
	GetElementPtr,
	GetRef,
	Cast,
	Cmp(CmpOp),
	Select,
	DbgStmtLine,
	Unreachable,
	Breakpoint,
	Bin(BinOp),
	Inc,
	Dec,
	BitNot,
	BooleanNot,
	Neg,
	Br,
	Call,
	Ret,
	Label,
	Comment,
}

#[derive(Debug, Clone)]
pub struct Instr {
	pub kind: InstrKind,
	pub name: Option<String>,
	pub typ: Option<IrType>,
	pub args: Vec<Expr>,
	pub text: Option<String>,
}

impl Instr {
	pub fn kind_name(&self) -> &'static str {
		match self.kind {
			InstrKind::Nop => "Nop",
			InstrKind::Alloca => "Alloca",
			InstrKind::Store => "Store",
			InstrKind::StorePtr => "StorePtr",
			InstrKind::LoadPtr => "LoadPtr",
			InstrKind::GetElementPtr => "GetElementPtr",
			InstrKind::GetRef => "GetRef",
			InstrKind::Cast => "Cast",
			InstrKind::Cmp(_) => "Cmp",
			InstrKind::Select => "Select",
			InstrKind::DbgStmtLine => "DbgStmtLine",
			InstrKind::Unreachable => "Unreachable",
			InstrKind::Breakpoint => "Breakpoint",
			InstrKind::Bin(_) => "BinOp",
			InstrKind::Inc => "Inc",
			InstrKind::Dec => "Dec",
			InstrKind::BitNot => "BitNot",
			InstrKind::BooleanNot => "BooleanNot",
			InstrKind::Neg => "Neg",
			InstrKind::Br => "Br",
			InstrKind::Call => "Call",
			InstrKind::Ret => "Ret",
			InstrKind::Label => "Label",
			InstrKind::Comment => "Comment",
		}
	}
}
