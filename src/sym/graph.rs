use derivative::Derivative;
use fxhash::FxHashMap;

use crate::ast::{Expr, TypeExpr};
use crate::sym::{Abi, Pos, Vis};

macro_rules! define_handle {
	($name: ident) => {
		#[derive(Copy, Clone, Eq, PartialEq, Hash)]
		pub struct $name(u32);

		impl $name {
			#[inline]
			fn from_index(idx: usize) -> Self {
				Self(idx as u32)
			}

			#[inline]
			pub fn index(self) -> usize {
				self.0 as usize
			}
		}

		impl std::fmt::Debug for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(f, "{}({})", stringify!($name), self.0)
			}
		}
	};
}

define_handle!(ScopeId);
define_handle!(SymbolId);

/// A named container holding an ordered sequence of child symbols, with
/// O(1) lookup by short name.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Scope {
	/// This scope's own contribution to a fully-qualified path (a module or
	/// type name); empty for the compilation-unit root.
	pub name: String,
	pub parent: Option<ScopeId>,
	pub children: Vec<SymbolId>,
	#[derivative(Debug = "ignore")]
	by_name: FxHashMap<String, SymbolId>,
}

impl Scope {
	fn new(name: String, parent: Option<ScopeId>) -> Self {
		Scope { name, parent, children: Vec::new(), by_name: Default::default() }
	}
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TypeKind {
	Placeholder,
	Alias,
	Trait,
	Class,
	Struct,
	Enum,
	Tuple,
	Array,
	Slice,
}

#[derive(Debug)]
pub struct AliasInfo {
	pub parent: TypeExpr,
}

#[derive(Debug, Default)]
pub struct TraitInfo {
	pub implementers: Vec<SymbolId>,
}

#[derive(Debug, Default)]
pub struct ClassInfo {
	pub base: Option<SymbolId>,
}

#[derive(Debug)]
pub struct StructInfo {
	pub is_opaque: bool,
}

#[derive(Debug)]
pub struct EnumInfo {
	pub underlying: TypeExpr,
	variant_order: Vec<String>,
	variants: FxHashMap<String, i64>,
}

impl EnumInfo {
	pub fn new(underlying: TypeExpr) -> Self {
		EnumInfo { underlying, variant_order: Vec::new(), variants: Default::default() }
	}

	pub fn has_value(&self, name: &str) -> bool {
		self.variants.contains_key(name)
	}

	pub fn add_value(&mut self, name: impl Into<String>, value: i64) {
		let name = name.into();
		self.variant_order.push(name.clone());
		self.variants.insert(name, value);
	}

	pub fn value_of(&self, name: &str) -> Option<i64> {
		self.variants.get(name).copied()
	}

	pub fn variants(&self) -> impl Iterator<Item = (&str, i64)> {
		self.variant_order.iter().map(move |n| (n.as_str(), self.variants[n]))
	}
}

#[derive(Debug)]
pub struct ArrayInfo {
	pub elem: TypeExpr,
	pub size: u64,
	pub has_wrapper: bool,
}

#[derive(Debug)]
pub enum TypeInfo {
	None,
	Alias(AliasInfo),
	Trait(TraitInfo),
	Class(ClassInfo),
	Struct(StructInfo),
	Enum(EnumInfo),
	Array(ArrayInfo),
}

#[derive(Debug)]
pub struct Field {
	pub name: String,
	pub is_mut: bool,
	pub vis: Vis,
	pub typ: TypeExpr,
	pub def_expr: Option<Expr>,
}

#[derive(Debug)]
pub struct ModuleSym {
	pub scope: ScopeId,
	pub is_runtime: bool,
}

#[derive(Debug)]
pub struct TypeSym {
	pub kind: TypeKind,
	pub info: TypeInfo,
	pub scope: ScopeId,
	pub fields: Vec<Field>,
}

#[derive(Debug)]
pub struct Arg {
	pub name: String,
	pub is_mut: bool,
	pub typ: TypeExpr,
	pub def_expr: Option<Expr>,
	pub pos: Pos,
}

#[derive(Debug)]
pub struct FnSym {
	pub abi: Abi,
	pub is_extern: bool,
	pub is_unsafe: bool,
	pub is_method: bool,
	pub is_variadic: bool,
	pub args: Vec<Arg>,
	pub ret: TypeExpr,
	pub has_body: bool,
	pub has_named_args: bool,
	pub self_is_mut: bool,
	pub self_is_ref: bool,
	pub name_pos: Pos,
}

#[derive(Debug)]
pub struct ConstSym {
	pub typ: TypeExpr,
	pub expr: Expr,
}

#[derive(Debug)]
pub struct VarSym {
	pub is_mut: bool,
	pub is_extern: bool,
	pub abi: Abi,
	pub typ: TypeExpr,
}

#[derive(Debug)]
pub enum SymbolKind {
	Module(ModuleSym),
	Type(TypeSym),
	Fn(FnSym),
	Const(ConstSym),
	Var(VarSym),
}

#[derive(Debug)]
pub struct Symbol {
	pub name: String,
	pub vis: Vis,
	pub parent_scope: ScopeId,
	pub pos: Pos,
	pub kind: SymbolKind,
}

impl Symbol {
	pub fn as_type(&self) -> Option<&TypeSym> {
		match &self.kind {
			SymbolKind::Type(t) => Some(t),
			_ => None,
		}
	}

	pub fn as_type_mut(&mut self) -> Option<&mut TypeSym> {
		match &mut self.kind {
			SymbolKind::Type(t) => Some(t),
			_ => None,
		}
	}

	pub fn typeof_str(&self) -> &'static str {
		match &self.kind {
			SymbolKind::Module(_) => "module",
			SymbolKind::Type(t) => match t.kind {
				TypeKind::Placeholder => "placeholder",
				TypeKind::Alias => "type alias",
				TypeKind::Trait => "trait",
				TypeKind::Class => "class",
				TypeKind::Struct => "struct",
				TypeKind::Enum => "enum",
				TypeKind::Tuple => "tuple",
				TypeKind::Array => "array",
				TypeKind::Slice => "slice",
			},
			SymbolKind::Fn(_) => "function",
			SymbolKind::Const(_) => "constant",
			SymbolKind::Var(_) => "variable",
		}
	}
}

#[derive(Debug)]
pub enum RegisterError {
	DuplicateSymbol { scope_path: String, name: String },
	DuplicateField { type_name: String, name: String },
	DuplicateEnumValue { enum_name: String, name: String },
	InvalidExtendTarget,
}

impl std::fmt::Display for RegisterError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RegisterError::DuplicateSymbol { scope_path, name } => {
				write!(f, "`{name}` is already declared in `{scope_path}`")
			}
			RegisterError::DuplicateField { type_name, name } => {
				write!(f, "`{type_name}` has duplicate field `{name}`")
			}
			RegisterError::DuplicateEnumValue { enum_name, name } => {
				write!(f, "enum `{enum_name}` has duplicate value `{name}`")
			}
			RegisterError::InvalidExtendTarget => write!(f, "invalid type to extend"),
		}
	}
}

impl std::error::Error for RegisterError {}

/// Owns every scope and symbol created during registration, addressed by
/// stable handles. See the module-level documentation for why handles
/// replace borrows here.
#[derive(Debug)]
pub struct SymbolGraph {
	scopes: Vec<Scope>,
	symbols: Vec<Symbol>,
	pub runtime_module: Option<ScopeId>,
	pub string_sym: Option<SymbolId>,
	pub error_sym: Option<SymbolId>,
	pub vec_sym: Option<SymbolId>,
}

impl SymbolGraph {
	pub fn new() -> Self {
		let mut graph = SymbolGraph {
			scopes: Vec::new(),
			symbols: Vec::new(),
			runtime_module: None,
			string_sym: None,
			error_sym: None,
			vec_sym: None,
		};
		graph.scopes.push(Scope::new(String::new(), None));
		graph
	}

	pub fn root_scope(&self) -> ScopeId {
		ScopeId::from_index(0)
	}

	pub fn new_scope(&mut self, name: impl Into<String>, parent: ScopeId) -> ScopeId {
		let id = ScopeId::from_index(self.scopes.len());
		self.scopes.push(Scope::new(name.into(), Some(parent)));
		id
	}

	pub fn scope(&self, id: ScopeId) -> &Scope {
		&self.scopes[id.index()]
	}

	pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
		&mut self.scopes[id.index()]
	}

	pub fn symbol(&self, id: SymbolId) -> &Symbol {
		&self.symbols[id.index()]
	}

	pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
		&mut self.symbols[id.index()]
	}

	/// Looks up `name` directly in `scope`, without chasing aliases, imports
	/// or nested paths.
	pub fn find(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
		self.scope(scope).by_name.get(name).copied()
	}

	/// Inserts `symbol` into `scope`, failing if the short name is already
	/// taken. The first insertion under a name is left untouched on failure.
	pub fn add(&mut self, scope: ScopeId, symbol: Symbol) -> Result<SymbolId, RegisterError> {
		if self.scope(scope).by_name.contains_key(&symbol.name) {
			return Err(RegisterError::DuplicateSymbol {
				scope_path: self.path_of_scope(scope),
				name: symbol.name,
			});
		}
		let id = SymbolId::from_index(self.symbols.len());
		let name = symbol.name.clone();
		self.symbols.push(symbol);
		let scope = self.scope_mut(scope);
		scope.children.push(id);
		scope.by_name.insert(name, id);
		Ok(id)
	}

	pub fn path_of_scope(&self, mut scope: ScopeId) -> String {
		let mut segments = Vec::new();
		loop {
			let s = self.scope(scope);
			if !s.name.is_empty() {
				segments.push(s.name.as_str());
			}
			match s.parent {
				Some(parent) => scope = parent,
				None => break,
			}
		}
		segments.reverse();
		segments.join(".")
	}

	pub fn path_of(&self, id: SymbolId) -> String {
		let symbol = self.symbol(id);
		let parent_path = self.path_of_scope(symbol.parent_scope);
		if parent_path.is_empty() {
			symbol.name.clone()
		} else {
			format!("{parent_path}.{}", symbol.name)
		}
	}
}

impl Default for SymbolGraph {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dummy_fn(name: &str, scope: ScopeId, pos: Pos) -> Symbol {
		Symbol {
			name: name.to_string(),
			vis: Vis::Public,
			parent_scope: scope,
			pos,
			kind: SymbolKind::Fn(FnSym {
				abi: Abi::Rivet,
				is_extern: false,
				is_unsafe: false,
				is_method: false,
				is_variadic: false,
				args: Vec::new(),
				ret: TypeExpr::Unit,
				has_body: true,
				has_named_args: false,
				self_is_mut: false,
				self_is_ref: false,
				name_pos: pos,
			}),
		}
	}

	#[test]
	fn distinct_names_get_distinct_handles() {
		let mut graph = SymbolGraph::new();
		let root = graph.root_scope();
		let a = graph.add(root, dummy_fn("a", root, Pos::default())).unwrap();
		let b = graph.add(root, dummy_fn("b", root, Pos::default())).unwrap();
		assert_ne!(a, b);
		assert_eq!(graph.find(root, "a"), Some(a));
		assert_eq!(graph.find(root, "b"), Some(b));
	}

	#[test]
	fn duplicate_name_is_rejected_and_first_survives() {
		let mut graph = SymbolGraph::new();
		let root = graph.root_scope();
		let first = graph.add(root, dummy_fn("a", root, Pos::default())).unwrap();
		let err = graph.add(root, dummy_fn("a", root, Pos::default())).unwrap_err();
		assert!(matches!(err, RegisterError::DuplicateSymbol { .. }));
		assert_eq!(graph.find(root, "a"), Some(first));
	}

	#[test]
	fn path_of_walks_nested_scopes() {
		let mut graph = SymbolGraph::new();
		let root = graph.root_scope();
		let mod_scope = graph.new_scope("pkg", root);
		let type_scope = graph.new_scope("Foo", mod_scope);
		let f = graph
			.add(type_scope, dummy_fn("bar", type_scope, Pos::default()))
			.unwrap();
		assert_eq!(graph.path_of(f), "pkg.Foo.bar");
	}
}
