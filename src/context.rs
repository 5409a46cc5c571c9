//! The small slice of "compiler prefs / target descriptor" this crate
//! needs: a package name (used to mangle the generated `main`) and the
//! symbol graph, pre-seeded with the three runtime-adopted types.

use crate::sym::{
	Pos, ScopeId, StructInfo, Symbol, SymbolGraph, SymbolId, SymbolKind, TypeInfo, TypeKind,
	TypeSym, Vis,
};

/// Placeholder for "which predefined C toolchain quirks to assume".
/// Reserved for future use: today every supported toolchain (GCC, Clang,
/// MSVC, TinyCC) is handled uniformly by the fixed header in
/// [`crate::codegen::header`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Target {
	#[default]
	Native,
}

#[derive(Debug, Clone, Default)]
pub struct CompilerPrefs {
	pub pkg_name: String,
	pub target: Target,
}

/// Owns the symbol graph and the handful of compiler-wide settings both
/// passes need. A real driver constructs this once per compilation and
/// threads it through the registrar, the checker and the emitter.
#[derive(Debug)]
pub struct CompilerContext {
	pub graph: SymbolGraph,
	pub prefs: CompilerPrefs,
}

impl CompilerContext {
	pub fn new(prefs: CompilerPrefs) -> Self {
		let mut graph = SymbolGraph::new();
		let root = graph.root_scope();
		let core = graph.new_scope("core", root);

		let string_sym = bootstrap_opaque_struct(&mut graph, core, "string");
		let error_sym = bootstrap_opaque_struct(&mut graph, core, "Error");
		let vec_sym = bootstrap_opaque_struct(&mut graph, core, "Vec");

		graph.string_sym = Some(string_sym);
		graph.error_sym = Some(error_sym);
		graph.vec_sym = Some(vec_sym);

		CompilerContext { graph, prefs }
	}

	pub fn is_runtime_type(&self, scope: ScopeId, name: &str) -> bool {
		self.graph.runtime_module == Some(scope)
			&& matches!(name, "string" | "Error" | "Vec")
	}
}

fn bootstrap_opaque_struct(graph: &mut SymbolGraph, parent: ScopeId, name: &str) -> SymbolId {
	let own_scope = graph.new_scope(name, parent);
	graph
		.add(
			parent,
			Symbol {
				name: name.to_string(),
				vis: Vis::Public,
				parent_scope: parent,
				pos: Pos::default(),
				kind: SymbolKind::Type(TypeSym {
					kind: TypeKind::Struct,
					info: TypeInfo::Struct(StructInfo { is_opaque: true }),
					scope: own_scope,
					fields: Vec::new(),
				}),
			},
		)
		.expect("bootstrap symbol names never collide")
}
