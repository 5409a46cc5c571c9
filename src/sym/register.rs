//! The first semantic pass: a depth-first walk over parsed declarations
//! that populates the symbol graph, detects duplicates, and tracks the
//! ambient ABI inherited from `extern` blocks.

use fxhash::FxHashMap;

use crate::ast::{Decl, ResolvedType, SourceFile, TypeExpr};
use crate::context::CompilerContext;
use crate::error::Reporter;
use crate::sym::{
	Abi, AliasInfo, Arg, ClassInfo, ConstSym, EnumInfo, Field, FnSym, ModuleSym, Pos, ScopeId,
	StructInfo, Symbol, SymbolKind, TypeInfo, TypeKind, TypeSym, VarSym, Vis,
};

pub struct Register<'r> {
	ctx: &'r mut CompilerContext,
	reporter: &'r mut dyn Reporter,
	/// One module scope per distinct module name, so that several source
	/// files contributing to the same module share a single scope.
	modules: FxHashMap<String, ScopeId>,
	abi: Abi,
	scope: ScopeId,
	is_runtime_mod: bool,
}

impl<'r> Register<'r> {
	pub fn new(ctx: &'r mut CompilerContext, reporter: &'r mut dyn Reporter) -> Self {
		let root = ctx.graph.root_scope();
		Register {
			ctx,
			reporter,
			modules: FxHashMap::default(),
			abi: Abi::Rivet,
			scope: root,
			is_runtime_mod: false,
		}
	}

	pub fn walk_files(&mut self, files: &mut [SourceFile]) {
		for sf in files.iter_mut() {
			let module_scope = self.module_scope(sf);
			if self.ctx.graph.runtime_module.is_none() && sf.is_runtime_mod {
				self.ctx.graph.runtime_module = Some(module_scope);
			}
			self.scope = module_scope;
			self.abi = Abi::Rivet;
			self.is_runtime_mod = sf.is_runtime_mod;
			self.walk_decls(&mut sf.decls);
		}
	}

	fn module_scope(&mut self, sf: &SourceFile) -> ScopeId {
		if let Some(id) = self.modules.get(&sf.mod_name) {
			return *id;
		}
		let root = self.ctx.graph.root_scope();
		let own_scope = self.ctx.graph.new_scope(sf.mod_name.clone(), root);
		let sym = Symbol {
			name: sf.mod_name.clone(),
			vis: Vis::Public,
			parent_scope: root,
			pos: Pos::default(),
			kind: SymbolKind::Module(ModuleSym { scope: own_scope, is_runtime: sf.is_runtime_mod }),
		};
		let _ = self.ctx.graph.add(root, sym);
		self.modules.insert(sf.mod_name.clone(), own_scope);
		own_scope
	}

	fn walk_decls(&mut self, decls: &mut [Decl]) {
		for decl in decls.iter_mut() {
			let old_abi = self.abi;
			let old_scope = self.scope;

			#[cfg(feature = "tracing")]
			tracing::trace!(scope = %self.ctx.graph.path_of_scope(self.scope), "registering declaration");

			match decl {
				Decl::Extern(d) => {
					self.abi = d.abi;
					self.walk_decls(&mut d.decls);
				}
				Decl::Const(d) => {
					let sym = Symbol {
						name: d.name.clone(),
						vis: d.vis,
						parent_scope: self.scope,
						pos: d.pos,
						kind: SymbolKind::Const(ConstSym { typ: d.typ.clone(), expr: d.expr.clone() }),
					};
					self.add_sym(sym, d.pos);
				}
				Decl::Let(d) => {
					for v in d.lefts.iter() {
						let sym = Symbol {
							name: v.name.clone(),
							vis: d.vis,
							parent_scope: self.scope,
							pos: v.pos,
							kind: SymbolKind::Var(VarSym {
								is_mut: v.is_mut,
								is_extern: d.is_extern,
								abi: self.abi,
								typ: d.typ.clone(),
							}),
						};
						match self.ctx.graph.add(self.scope, sym) {
							Ok(id) => v.sym.set(Some(id)),
							Err(e) => self.reporter.report(e, v.pos),
						}
					}
				}
				Decl::TypeAlias(d) => {
					let sym = Symbol {
						name: d.name.clone(),
						vis: d.vis,
						parent_scope: self.scope,
						pos: d.pos,
						kind: SymbolKind::Type(TypeSym {
							kind: TypeKind::Alias,
							info: TypeInfo::Alias(AliasInfo { parent: d.parent.clone() }),
							scope: self.scope,
							fields: Vec::new(),
						}),
					};
					self.add_sym(sym, d.pos);
				}
				Decl::Trait(d) => {
					let own_scope = self.ctx.graph.new_scope(d.name.clone(), self.scope);
					let sym = Symbol {
						name: d.name.clone(),
						vis: d.vis,
						parent_scope: self.scope,
						pos: d.pos,
						kind: SymbolKind::Type(TypeSym {
							kind: TypeKind::Trait,
							info: TypeInfo::Trait(Default::default()),
							scope: own_scope,
							fields: Vec::new(),
						}),
					};
					match self.ctx.graph.add(self.scope, sym) {
						Ok(id) => {
							d.sym.set(Some(id));
							self.scope = own_scope;
							self.walk_decls(&mut d.decls);
						}
						Err(e) => self.reporter.report(e, d.pos),
					}
				}
				Decl::Class(d) => {
					if self.is_runtime_mod && d.name == "string" {
						d.sym.set(self.ctx.graph.string_sym);
						self.scope = self.type_scope(self.ctx.graph.string_sym);
						self.walk_decls(&mut d.decls);
					} else if self.is_runtime_mod && d.name == "Error" {
						d.sym.set(self.ctx.graph.error_sym);
						self.scope = self.type_scope(self.ctx.graph.error_sym);
						self.walk_decls(&mut d.decls);
					} else {
						let own_scope = self.ctx.graph.new_scope(d.name.clone(), self.scope);
						let sym = Symbol {
							name: d.name.clone(),
							vis: d.vis,
							parent_scope: self.scope,
							pos: d.pos,
							kind: SymbolKind::Type(TypeSym {
								kind: TypeKind::Class,
								info: TypeInfo::Class(ClassInfo::default()),
								scope: own_scope,
								fields: Vec::new(),
							}),
						};
						match self.ctx.graph.add(self.scope, sym) {
							Ok(id) => {
								d.sym.set(Some(id));
								if self.is_runtime_mod && d.name == "Vec" {
									self.ctx.graph.vec_sym = Some(id);
								}
								self.scope = own_scope;
								self.walk_decls(&mut d.decls);
							}
							Err(e) => self.reporter.report(e, d.pos),
						}
					}
				}
				Decl::Struct(d) => {
					let own_scope = self.ctx.graph.new_scope(d.name.clone(), self.scope);
					let sym = Symbol {
						name: d.name.clone(),
						vis: d.vis,
						parent_scope: self.scope,
						pos: d.pos,
						kind: SymbolKind::Type(TypeSym {
							kind: TypeKind::Struct,
							info: TypeInfo::Struct(StructInfo { is_opaque: d.is_opaque }),
							scope: own_scope,
							fields: Vec::new(),
						}),
					};
					match self.ctx.graph.add(self.scope, sym) {
						Ok(id) => {
							d.sym.set(Some(id));
							self.scope = own_scope;
							self.walk_decls(&mut d.decls);
						}
						Err(e) => self.reporter.report(e, d.pos),
					}
				}
				Decl::Enum(d) => {
					let mut info = EnumInfo::new(d.underlying_typ.clone());
					for (i, v) in d.values.iter().enumerate() {
						if info.has_value(v) {
							self.reporter.report(
								crate::sym::RegisterError::DuplicateEnumValue {
									enum_name: d.name.clone(),
									name: v.clone(),
								},
								d.pos,
							);
							continue;
						}
						info.add_value(v.clone(), i as i64);
					}
					let own_scope = self.ctx.graph.new_scope(d.name.clone(), self.scope);
					let sym = Symbol {
						name: d.name.clone(),
						vis: d.vis,
						parent_scope: self.scope,
						pos: d.pos,
						kind: SymbolKind::Type(TypeSym {
							kind: TypeKind::Enum,
							info: TypeInfo::Enum(info),
							scope: own_scope,
							fields: Vec::new(),
						}),
					};
					match self.ctx.graph.add(self.scope, sym) {
						Ok(id) => {
							d.sym.set(Some(id));
							self.scope = own_scope;
							self.walk_decls(&mut d.decls);
						}
						Err(e) => self.reporter.report(e, d.pos),
					}
				}
				Decl::Field(d) => {
					// The current scope belongs to the enclosing type; find it
					// by walking back from the scope to the symbol that owns it.
					if let Some(type_id) = self.owning_type_of(self.scope) {
						let type_name = self.ctx.graph.symbol(type_id).name.clone();
						let has_field = self
							.ctx
							.graph
							.symbol(type_id)
							.as_type()
							.map(|t| t.fields.iter().any(|f| f.name == d.name))
							.unwrap_or(false);
						if has_field {
							self.reporter.report(
								crate::sym::RegisterError::DuplicateField {
									type_name,
									name: d.name.clone(),
								},
								d.pos,
							);
						} else if let Some(t) = self.ctx.graph.symbol_mut(type_id).as_type_mut() {
							t.fields.push(Field {
								name: d.name.clone(),
								is_mut: d.is_mut,
								vis: d.vis,
								typ: d.typ.clone(),
								def_expr: d.def_expr.clone(),
							});
						}
					}
				}
				Decl::Extend(d) => {
					if let Some(target) = self.resolve_extend_target(&d.typ) {
						self.scope = target;
						self.walk_decls(&mut d.decls);
					} else {
						self
							.reporter
							.report(crate::sym::RegisterError::InvalidExtendTarget, d.pos);
					}
				}
				Decl::Fn(d) => {
					let args = d
						.args
						.iter()
						.map(|a| Arg {
							name: a.name.clone(),
							is_mut: a.is_mut,
							typ: a.typ.clone(),
							def_expr: a.def_expr.clone(),
							pos: a.pos,
						})
						.collect();
					let sym = Symbol {
						name: d.name.clone(),
						vis: d.vis,
						parent_scope: self.scope,
						pos: d.name_pos,
						kind: SymbolKind::Fn(FnSym {
							abi: self.abi,
							is_extern: d.is_extern,
							is_unsafe: d.is_unsafe,
							is_method: d.is_method,
							is_variadic: d.is_variadic,
							args,
							ret: d.ret_typ.clone(),
							has_body: d.has_body,
							has_named_args: d.has_named_args,
							self_is_mut: d.self_is_mut,
							self_is_ref: d.self_is_ref,
							name_pos: d.name_pos,
						}),
					};
					match self.ctx.graph.add(self.scope, sym) {
						Ok(id) => d.sym.set(Some(id)),
						Err(e) => self.reporter.report(e, d.name_pos),
					}
				}
				Decl::Destructor(d) => {
					let self_typ = TypeExpr::Named(self.ctx.graph.scope(self.scope).name.clone());
					let sym = Symbol {
						name: "_dtor".to_string(),
						vis: Vis::Private,
						parent_scope: self.scope,
						pos: d.pos,
						kind: SymbolKind::Fn(FnSym {
							abi: self.abi,
							is_extern: false,
							is_unsafe: true,
							is_method: true,
							is_variadic: false,
							args: vec![Arg {
								name: "self".to_string(),
								is_mut: d.self_is_mut,
								typ: self_typ,
								def_expr: None,
								pos: d.pos,
							}],
							ret: TypeExpr::Unit,
							has_body: true,
							has_named_args: false,
							self_is_mut: d.self_is_mut,
							self_is_ref: false,
							name_pos: d.pos,
						}),
					};
					self.add_sym(sym, d.pos);
				}
			}

			self.abi = old_abi;
			self.scope = old_scope;
		}
	}

	fn add_sym(&mut self, sym: Symbol, pos: Pos) {
		if let Err(e) = self.ctx.graph.add(self.scope, sym) {
			self.reporter.report(e, pos);
		}
	}

	fn type_scope(&self, sym: Option<crate::sym::SymbolId>) -> ScopeId {
		sym
			.and_then(|id| self.ctx.graph.symbol(id).as_type())
			.map(|t| t.scope)
			.unwrap_or(self.scope)
	}

	/// Finds the Type symbol whose own scope is `scope`, i.e. the type a
	/// nested `Field`/`Fn` declaration is being registered against.
	fn owning_type_of(&self, scope: ScopeId) -> Option<crate::sym::SymbolId> {
		let parent = self.ctx.graph.scope(scope).parent?;
		self
			.ctx
			.graph
			.scope(parent)
			.children
			.iter()
			.copied()
			.find(|&id| self.ctx.graph.symbol(id).as_type().map(|t| t.scope) == Some(scope))
	}

	/// Resolves an `extend` target to the scope new declarations should be
	/// registered into: the target's own scope if already resolved, else a
	/// same-scope lookup, else a freshly created `Placeholder` type.
	fn resolve_extend_target(&mut self, typ: &ResolvedType) -> Option<ScopeId> {
		if let Some(sym_id) = typ.sym {
			return self.ctx.graph.symbol(sym_id).as_type().map(|t| t.scope);
		}
		let TypeExpr::Named(name) = &typ.expr else {
			return None;
		};
		if let Some(existing) = self.ctx.graph.find(self.scope, name) {
			return self.ctx.graph.symbol(existing).as_type().map(|t| t.scope);
		}
		let own_scope = self.ctx.graph.new_scope(name.clone(), self.scope);
		let sym = Symbol {
			name: name.clone(),
			vis: Vis::Private,
			parent_scope: self.scope,
			pos: Pos::default(),
			kind: SymbolKind::Type(TypeSym {
				kind: TypeKind::Placeholder,
				info: TypeInfo::None,
				scope: own_scope,
				fields: Vec::new(),
			}),
		};
		self.ctx.graph.add(self.scope, sym).ok()?;
		Some(own_scope)
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use super::*;
	use crate::ast::*;
	use crate::context::CompilerPrefs;
	use crate::error::CollectingReporter;
	use crate::sym::RegisterError;

	fn pos(line: u32) -> Pos {
		Pos { line, col: 0, file_id: 0 }
	}

	fn file(decls: Vec<Decl>) -> SourceFile {
		SourceFile { is_runtime_mod: false, mod_name: "pkg".to_string(), decls }
	}

	/// Looks up the scope backing the module named `name`, registered as a
	/// `Module` symbol directly under the graph's root scope.
	fn mod_scope(ctx: &CompilerContext, name: &str) -> ScopeId {
		let root = ctx.graph.root_scope();
		let id = ctx.graph.find(root, name).expect("module registered");
		let SymbolKind::Module(m) = &ctx.graph.symbol(id).kind else { unreachable!() };
		m.scope
	}

	#[test]
	fn duplicate_field_keeps_first_and_reports_once() {
		let mut ctx = CompilerContext::new(CompilerPrefs::default());
		let mut reporter = CollectingReporter::default();
		let mut files = vec![file(vec![Decl::Struct(StructDecl {
			sym: Cell::new(None),
			vis: Vis::Public,
			name: "S".to_string(),
			is_opaque: false,
			pos: pos(1),
			decls: vec![
				Decl::Field(FieldDecl {
					vis: Vis::Public,
					name: "x".to_string(),
					is_mut: false,
					typ: TypeExpr::Named("i32".to_string()),
					def_expr: None,
					pos: pos(1),
				}),
				Decl::Field(FieldDecl {
					vis: Vis::Public,
					name: "x".to_string(),
					is_mut: false,
					typ: TypeExpr::Named("i32".to_string()),
					def_expr: None,
					pos: pos(2),
				}),
			],
		})]);

		Register::new(&mut ctx, &mut reporter).walk_files(&mut files);

		assert_eq!(reporter.diagnostics.len(), 1);
		assert!(matches!(reporter.diagnostics[0].0, RegisterError::DuplicateField { .. }));

		let pkg = mod_scope(&ctx, "pkg");
		let s = ctx.graph.find(pkg, "S").expect("struct registered");
		let fields = &ctx.graph.symbol(s).as_type().unwrap().fields;
		assert_eq!(fields.len(), 1);
	}

	#[test]
	fn enum_variants_get_ordinal_values_and_duplicates_are_reported() {
		let mut ctx = CompilerContext::new(CompilerPrefs::default());
		let mut reporter = CollectingReporter::default();
		let mut files = vec![file(vec![Decl::Enum(EnumDecl {
			sym: Cell::new(None),
			vis: Vis::Public,
			name: "E".to_string(),
			underlying_typ: TypeExpr::Named("i32".to_string()),
			values: vec!["A".to_string(), "B".to_string(), "A".to_string()],
			decls: vec![],
			pos: pos(1),
		})]);

		Register::new(&mut ctx, &mut reporter).walk_files(&mut files);

		assert_eq!(reporter.diagnostics.len(), 1);
		assert!(matches!(reporter.diagnostics[0].0, RegisterError::DuplicateEnumValue { .. }));

		let pkg = mod_scope(&ctx, "pkg");
		let e = ctx.graph.find(pkg, "E").expect("enum registered");
		let TypeInfo::Enum(info) = &ctx.graph.symbol(e).as_type().unwrap().info else {
			unreachable!()
		};
		assert_eq!(info.value_of("A"), Some(0));
		assert_eq!(info.value_of("B"), Some(1));
	}

	#[test]
	fn extend_unknown_type_creates_one_private_placeholder() {
		let mut ctx = CompilerContext::new(CompilerPrefs::default());
		let mut reporter = CollectingReporter::default();
		let mut files = vec![file(vec![
			Decl::Extend(ExtendDecl {
				typ: ResolvedType { sym: None, expr: TypeExpr::Named("Foo".to_string()) },
				decls: vec![],
				pos: pos(1),
			}),
			Decl::Extend(ExtendDecl {
				typ: ResolvedType { sym: None, expr: TypeExpr::Named("Foo".to_string()) },
				decls: vec![],
				pos: pos(2),
			}),
		])];

		Register::new(&mut ctx, &mut reporter).walk_files(&mut files);
		assert!(reporter.diagnostics.is_empty());

		let pkg = mod_scope(&ctx, "pkg");
		let foo = ctx.graph.find(pkg, "Foo").expect("placeholder created");
		let sym = ctx.graph.symbol(foo);
		assert_eq!(sym.vis, Vis::Private);
		assert_eq!(sym.as_type().unwrap().kind, TypeKind::Placeholder);
	}

	#[test]
	fn runtime_module_adopts_string_error_vec_without_new_symbols() {
		let mut ctx = CompilerContext::new(CompilerPrefs::default());
		let string_before = ctx.graph.string_sym;
		let mut reporter = CollectingReporter::default();
		let mut files = vec![SourceFile {
			is_runtime_mod: true,
			mod_name: "core".to_string(),
			decls: vec![Decl::Class(ClassDecl {
				sym: Cell::new(None),
				vis: Vis::Public,
				name: "string".to_string(),
				decls: vec![],
				pos: pos(1),
			})],
		}];

		Register::new(&mut ctx, &mut reporter).walk_files(&mut files);

		assert_eq!(ctx.graph.string_sym, string_before);
		let Decl::Class(c) = &files[0].decls[0] else { unreachable!() };
		assert_eq!(c.sym.get(), string_before);
	}

	#[test]
	fn extern_block_abi_is_restored_after_processing() {
		let mut ctx = CompilerContext::new(CompilerPrefs::default());
		let mut reporter = CollectingReporter::default();
		let mut files = vec![file(vec![
			Decl::Extern(ExternDecl {
				abi: Abi::C,
				decls: vec![Decl::Fn(FnDecl {
					sym: Cell::new(None),
					vis: Vis::Public,
					name: "c_fn".to_string(),
					is_extern: true,
					is_unsafe: false,
					is_method: false,
					is_variadic: false,
					args: vec![],
					ret_typ: TypeExpr::Unit,
					has_named_args: false,
					has_body: false,
					name_pos: pos(1),
					self_is_mut: false,
					self_is_ref: false,
					pos: pos(1),
				})],
			}),
			Decl::Fn(FnDecl {
				sym: Cell::new(None),
				vis: Vis::Public,
				name: "rivet_fn".to_string(),
				is_extern: false,
				is_unsafe: false,
				is_method: false,
				is_variadic: false,
				args: vec![],
				ret_typ: TypeExpr::Unit,
				has_named_args: false,
				has_body: true,
				name_pos: pos(2),
				self_is_mut: false,
				self_is_ref: false,
				pos: pos(2),
			}),
		])];

		Register::new(&mut ctx, &mut reporter).walk_files(&mut files);

		let pkg = mod_scope(&ctx, "pkg");
		let c_fn = ctx.graph.find(pkg, "c_fn").unwrap();
		let rivet_fn = ctx.graph.find(pkg, "rivet_fn").unwrap();
		let SymbolKind::Fn(c_fn) = &ctx.graph.symbol(c_fn).kind else { unreachable!() };
		let SymbolKind::Fn(rivet_fn) = &ctx.graph.symbol(rivet_fn).kind else { unreachable!() };
		assert_eq!(c_fn.abi, Abi::C);
		assert_eq!(rivet_fn.abi, Abi::Rivet);
	}
}
