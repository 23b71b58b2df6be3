//! Module registry: owns parsed and compiled modules, the interner, the
//! compiled-node pool, and the feature environment.
//!
//! A context is exclusively owned for the duration of a compilation. There
//! is no global state: diagnostics travel in returned errors and logging
//! goes through `tracing`.

use std::cell::Cell;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::base::{Interner, Name};
use crate::error::{Error, Result};
use crate::parser::statement::{ExtArgSyntax, Keyword, Statement};
use crate::parser::yin::YinNamespace;
use crate::parser::{build, yang, yin};
use crate::printer;
use crate::schema::compile::compile_module;
use crate::schema::compiled::{IdentityId, ModuleId, NodeId, SchemaModule, SchemaPool};
use crate::schema::parsed::ParsedModule;

/// Schema input/output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yang,
    Yin,
}

/// Supplies module source text for imports and includes that are not yet
/// loaded, keyed by module name and optional revision.
pub trait ModuleResolver {
    fn resolve(&self, name: &str, revision: Option<&str>) -> Option<(String, Format)>;
}

/// One loaded module: its statement tree (the printable form), its parsed
/// tree, and its compiled half once compilation succeeded.
pub struct Module {
    pub(crate) name: Name,
    pub(crate) parsed: Rc<ParsedModule>,
    pub(crate) stmt: Statement,
    pub(crate) format: Format,
    pub(crate) yin_namespaces: Vec<YinNamespace>,
    pub(crate) compiled: Option<SchemaModule>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.parsed.namespace.as_deref()
    }

    pub fn revision(&self) -> Option<&str> {
        self.parsed.revision().map(|r| r.as_str())
    }

    pub fn source_format(&self) -> Format {
        self.format
    }

    pub fn parsed(&self) -> &ParsedModule {
        &self.parsed
    }

    pub fn compiled(&self) -> Option<&SchemaModule> {
        self.compiled.as_ref()
    }

    /// Print the module from its retained statement tree. Printing the
    /// source format reproduces the input (byte-exact for YIN).
    pub fn print(&self, format: Format) -> String {
        match format {
            Format::Yang => printer::yang::print(&self.stmt),
            Format::Yin => printer::yin::print(&self.stmt, &self.yin_namespaces),
        }
    }

    pub(crate) fn name_str(&self) -> &str {
        &self.name
    }

    pub(crate) fn prefix_str(&self) -> &str {
        self.parsed.prefix.as_deref().unwrap_or(&self.name)
    }
}

/// Cancels an in-progress compilation from outside the call stack. The
/// running pass notices the flag at the next top-level statement boundary
/// and unwinds with [`Error::Cancelled`].
#[derive(Clone, Default)]
pub struct CancelHandle(Rc<Cell<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// The schema context.
#[derive(Default)]
pub struct Context {
    pub(crate) interner: Interner,
    pub(crate) modules: Vec<Module>,
    /// Registry index by module name, in load order.
    pub(crate) by_name: IndexMap<SmolStr, usize>,
    pub(crate) pool: SchemaPool,
    pub(crate) identity_lookup: FxHashMap<(u32, SmolStr), IdentityId>,
    pub(crate) enabled: FxHashMap<SmolStr, Vec<SmolStr>>,
    pub(crate) cancelled: CancelHandle,
    resolver: Option<Box<dyn ModuleResolver>>,
    /// Modules being loaded, for import cycle detection.
    loading: Vec<SmolStr>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resolver(&mut self, resolver: Box<dyn ModuleResolver>) {
        self.resolver = Some(resolver);
    }

    /// Enable a feature before the defining module is compiled. Features
    /// default to disabled.
    pub fn enable_feature(&mut self, module: &str, feature: &str) {
        self.enabled
            .entry(SmolStr::new(module))
            .or_default()
            .push(SmolStr::new(feature));
    }

    /// Handle for cancelling a compilation in progress.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancelled.clone()
    }

    /// Parse, register and compile a module (loading its imports and
    /// includes through the resolver). On error the context keeps its
    /// previously compiled modules and stays usable.
    pub fn parse_module(&mut self, text: &str, format: Format) -> Result<ModuleId> {
        self.cancelled.0.set(false);
        let result = self.load_module(text, format);
        self.loading.clear();
        result
    }

    fn load_module(&mut self, text: &str, format: Format) -> Result<ModuleId> {
        let (stmt, yin_namespaces) = match format {
            Format::Yang => (yang::parse(text)?, Vec::new()),
            Format::Yin => yin::parse(text)?,
        };
        let mut parsed = build::build_module(&stmt, yin_namespaces, &mut self.interner)?;
        let name = SmolStr::new(&*parsed.name);
        if self.by_name.contains_key(&name) {
            return Err(Error::validation(
                "module-exists",
                format!("module '{name}' is already loaded"),
            ));
        }
        if self.loading.contains(&name) {
            return Err(Error::cycle("import", name.to_string()));
        }
        self.loading.push(name.clone());
        debug!(module = name.as_str(), "loading module");

        let result = (|| -> Result<ModuleId> {
            self.merge_includes(&mut parsed)?;

            // Imports compile before the importer.
            for import in parsed.imports.clone() {
                if self.by_name.contains_key(&SmolStr::new(&*import.module)) {
                    continue;
                }
                let (dep_text, dep_format) = self
                    .resolve_source(&import.module, import.revision.as_deref())
                    .ok_or_else(|| Error::not_found("module", import.module.to_string()))?;
                self.load_module(&dep_text, dep_format)?;
            }

            let index = self.modules.len();
            let yin_namespaces = if parsed.yin_namespaces.is_empty() {
                self.compute_yin_namespaces(&parsed)
            } else {
                parsed.yin_namespaces.clone()
            };
            let module = Module {
                name: Rc::clone(&parsed.name),
                parsed: Rc::new(parsed),
                stmt,
                format,
                yin_namespaces,
                compiled: None,
            };
            self.modules.push(module);
            self.by_name.insert(name.clone(), index);

            match compile_module(self, index) {
                Ok(()) => {}
                Err(e) => {
                    // The failed module stays out of the registry; the
                    // context remains usable.
                    self.modules.pop();
                    self.by_name.shift_remove(&name);
                    return Err(e);
                }
            }
            self.link_ext_args(index);
            Ok(ModuleId(index as u32))
        })();
        self.loading.pop();
        result
    }

    fn resolve_source(&self, name: &str, revision: Option<&str>) -> Option<(String, Format)> {
        self.resolver.as_ref()?.resolve(name, revision)
    }

    /// Load the submodules of `parsed` and splice their contents into it.
    /// Submodule definitions behave as if written in the parent module.
    fn merge_includes(&mut self, parsed: &mut ParsedModule) -> Result<()> {
        for include in parsed.includes.clone() {
            let (text, format) = self
                .resolve_source(&include.module, include.revision.as_deref())
                .ok_or_else(|| Error::not_found("submodule", include.module.to_string()))?;
            let (stmt, yin_namespaces) = match format {
                Format::Yang => (yang::parse(&text)?, Vec::new()),
                Format::Yin => yin::parse(&text)?,
            };
            let sub = build::build_module(&stmt, yin_namespaces, &mut self.interner)?;
            if !sub.is_submodule {
                return Err(Error::validation(
                    "invalid-include",
                    format!("'{}' is not a submodule", include.module),
                ));
            }
            if sub.belongs_to.as_deref() != Some(&*parsed.name) {
                return Err(Error::validation(
                    "invalid-include",
                    format!(
                        "submodule '{}' belongs to '{}', not '{}'",
                        include.module,
                        sub.belongs_to.as_deref().unwrap_or("<none>"),
                        parsed.name
                    ),
                ));
            }
            for import in sub.imports {
                if parsed.import_by_prefix(&import.prefix).is_none() {
                    parsed.imports.push(import);
                }
            }
            parsed.features.extend(sub.features);
            parsed.identities.extend(sub.identities);
            parsed.typedefs.extend(sub.typedefs);
            parsed.groupings.extend(sub.groupings);
            parsed.extensions.extend(sub.extensions);
            parsed.augments.extend(sub.augments);
            parsed.data.extend(sub.data);
        }
        Ok(())
    }

    /// Back-fill the YIN argument syntax of extension instances in the
    /// statement tree from their definitions, so a module parsed from YANG
    /// can print as YIN. Best-effort: unknown definitions are left alone.
    fn link_ext_args(&mut self, index: usize) {
        let parsed = Rc::clone(&self.modules[index].parsed);
        let defs: FxHashMap<(SmolStr, SmolStr), (SmolStr, bool)> = {
            let mut map = FxHashMap::default();
            let mut add_module = |prefix: &str, module: &ParsedModule| {
                for def in &module.extensions {
                    if let Some((arg, yin_element)) = &def.argument {
                        map.insert(
                            (SmolStr::new(prefix), SmolStr::new(&*def.name)),
                            (arg.clone(), *yin_element),
                        );
                    }
                }
            };
            if let Some(prefix) = parsed.prefix.as_deref() {
                add_module(prefix, &parsed);
            }
            for import in &parsed.imports {
                if let Some(dep) = self.by_name.get(&SmolStr::new(&*import.module)) {
                    let dep = Rc::clone(&self.modules[*dep].parsed);
                    add_module(&import.prefix, &dep);
                }
            }
            map
        };

        fn walk(stmt: &mut Statement, defs: &FxHashMap<(SmolStr, SmolStr), (SmolStr, bool)>) {
            if let Keyword::Extension { prefix, name } = &stmt.keyword {
                if stmt.ext_arg.is_none() && stmt.arg.is_some() {
                    if let Some((arg_name, yin_element)) =
                        defs.get(&(prefix.clone(), name.clone()))
                    {
                        stmt.ext_arg = Some(ExtArgSyntax {
                            name: arg_name.clone(),
                            yin_element: *yin_element,
                        });
                    }
                }
            }
            for sub in &mut stmt.substmts {
                walk(sub, defs);
            }
        }
        walk(&mut self.modules[index].stmt, &defs);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn module_by_name(&self, name: &str) -> Option<&Module> {
        self.by_name.get(name).map(|i| &self.modules[*i])
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn pool(&self) -> &SchemaPool {
        &self.pool
    }

    pub(crate) fn module_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Find a compiled node by schema path, e.g. `/ext:c/a`. Qualifiers may
    /// be module names or prefixes; unqualified segments search all modules
    /// at the top level and stay within the found subtree below it.
    pub fn find_node(&self, path: &str) -> Option<NodeId> {
        let mut current: Option<NodeId> = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let (qualifier, name) = match segment.split_once(':') {
                Some((q, n)) => (Some(q), n),
                None => (None, segment),
            };
            match current {
                None => {
                    current = self.find_top_level(qualifier, name);
                }
                Some(parent) => {
                    current = self.pool.nodes[parent.index()]
                        .children
                        .iter()
                        .copied()
                        .find(|c| &*self.pool.node(*c).qname.name == name);
                }
            }
            current?;
        }
        current
    }

    fn find_top_level(&self, qualifier: Option<&str>, name: &str) -> Option<NodeId> {
        let matches_module = |i: usize| -> bool {
            match qualifier {
                None => true,
                Some(q) => {
                    self.modules[i].name_str() == q || self.modules[i].prefix_str() == q
                }
            }
        };
        for (i, module) in self.modules.iter().enumerate() {
            if !matches_module(i) {
                continue;
            }
            let Some(compiled) = &module.compiled else {
                continue;
            };
            let found = compiled
                .data
                .iter()
                .chain(&compiled.rpcs)
                .chain(&compiled.notifications)
                .copied()
                .find(|id| &*self.pool.node(*id).qname.name == name);
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Compiled identity by defining module name and identity name.
    pub fn identity(&self, module: &str, name: &str) -> Option<IdentityId> {
        let index = self.module_index(module)? as u32;
        self.identity_lookup.get(&(index, SmolStr::new(name))).copied()
    }
}

impl Context {
    /// Namespace declarations for YIN output of a module that was not
    /// parsed from YIN: the YIN namespace, the module's own prefix, then
    /// one declaration per import.
    fn compute_yin_namespaces(&self, parsed: &ParsedModule) -> Vec<YinNamespace> {
        let mut out = vec![YinNamespace {
            prefix: None,
            uri: SmolStr::new("urn:ietf:params:xml:ns:yang:yin:1"),
        }];
        if let (Some(prefix), Some(namespace)) = (&parsed.prefix, &parsed.namespace) {
            out.push(YinNamespace {
                prefix: Some(SmolStr::new(&**prefix)),
                uri: namespace.clone(),
            });
        }
        for import in &parsed.imports {
            let Some(dep) = self.module_by_name(&import.module) else {
                continue;
            };
            if let Some(ns) = dep.namespace() {
                out.push(YinNamespace {
                    prefix: Some(SmolStr::new(&*import.prefix)),
                    uri: SmolStr::new(ns),
                });
            }
        }
        out
    }
}
