//! Declaration index, callee-to-caller graph and the emission order
//! derived from it: every function comes after the functions it uses.

use crate::{
    analysis::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity},
    language::{
        ast::{Decl, Expr, File, GenKind, NodeId, Spec},
        typecheck::{ObjKind, ScopeLevel, SelectionKind, TypeInfo},
        types::Type,
        visit::{walk_files, Node, Visitor},
    },
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace};

#[derive(Clone, Debug)]
pub struct FuncRef {
    /// Index of the file in the unit.
    pub file: usize,
    /// Index of the declaration in the file.
    pub decl: usize,
    pub id: NodeId,
    pub name: String,
    pub recv: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TypeRef {
    pub file: usize,
    pub decl: usize,
    pub spec: usize,
    pub id: NodeId,
}

/// Type and function declarations of the unit by qualified name.
#[derive(Clone, Debug, Default)]
pub struct DeclIndex {
    pub types: BTreeMap<String, TypeRef>,
    pub funcs: BTreeMap<String, FuncRef>,
    /// Discovery order until [`DeclIndex::reorder`] installs the emission
    /// order.
    pub order: Vec<String>,
    /// `init` functions in source order.
    pub inits: Vec<String>,
    by_id: HashMap<NodeId, String>,
}

impl DeclIndex {
    pub fn discover(files: &[File], diagnostics: &mut Diagnostics) -> Self {
        let mut index = Self::default();
        for (file_idx, file) in files.iter().enumerate() {
            for (decl_idx, decl) in file.decls.iter().enumerate() {
                match decl {
                    Decl::Gen(gen) if gen.kind == GenKind::Type => {
                        for (spec_idx, spec) in gen.specs.iter().enumerate() {
                            let Spec::Type(spec) = spec else {
                                continue;
                            };
                            if index.types.contains_key(&spec.name.name) {
                                diagnostics.push(
                                    Diagnostic::new(
                                        Severity::Warning,
                                        DiagnosticKind::DuplicateDeclaration,
                                        format!("type {} declared twice", spec.name.name),
                                    )
                                    .at(file.path.clone(), spec.span),
                                );
                                continue;
                            }
                            index.types.insert(
                                spec.name.name.clone(),
                                TypeRef {
                                    file: file_idx,
                                    decl: decl_idx,
                                    spec: spec_idx,
                                    id: spec.id,
                                },
                            );
                        }
                    }
                    Decl::Gen(_) => {}
                    Decl::Func(func) => {
                        let is_init = func.recv.is_none() && func.name.name == "init";
                        let name = if is_init && !index.inits.is_empty() {
                            format!("init_{}", index.inits.len())
                        } else {
                            func.qualified_name()
                        };
                        if index.funcs.contains_key(&name) {
                            diagnostics.push(
                                Diagnostic::new(
                                    Severity::Warning,
                                    DiagnosticKind::DuplicateDeclaration,
                                    format!("function {name} declared twice; keeping the first"),
                                )
                                .at(file.path.clone(), func.span),
                            );
                            continue;
                        }
                        if is_init {
                            index.inits.push(name.clone());
                        }
                        index.by_id.insert(func.id, name.clone());
                        index.order.push(name.clone());
                        index.funcs.insert(
                            name.clone(),
                            FuncRef {
                                file: file_idx,
                                decl: decl_idx,
                                id: func.id,
                                name: func.name.name.clone(),
                                recv: func.receiver_type_name().map(str::to_string),
                            },
                        );
                    }
                }
            }
        }
        debug!(
            types = index.types.len(),
            funcs = index.funcs.len(),
            inits = index.inits.len(),
            "declarations discovered"
        );
        index
    }

    /// Qualified name of the function declaration `id`.
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Methods declared with receiver `T` or `*T`, in discovery order.
    pub fn methods_of<'s>(&'s self, type_name: &'s str) -> impl Iterator<Item = &'s str> + 's {
        self.order.iter().map(String::as_str).filter(move |name| {
            self.funcs
                .get(*name)
                .is_some_and(|func| func.recv.as_deref() == Some(type_name))
        })
    }

    pub fn reorder(&mut self, order: Vec<String>) {
        self.order = order;
    }
}

/// Callee-to-caller edges over qualified names. Nodes are created on
/// first reference.
#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    /// callee -> callers
    callers: Vec<Vec<usize>>,
    /// caller -> callees
    deps: Vec<Vec<usize>>,
}

impl CallGraph {
    pub fn build(files: &[File], info: &TypeInfo, decls: &DeclIndex) -> Self {
        let mut builder = EdgeBuilder {
            info,
            decls,
            graph: CallGraph::default(),
            current: Vec::new(),
        };
        walk_files(&mut builder, files);
        let graph = builder.graph;
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edge_count(),
            "call graph built"
        );
        graph
    }

    fn node(&mut self, name: &str) -> usize {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.callers.push(Vec::new());
        self.deps.push(Vec::new());
        idx
    }

    /// Records that `caller` uses `callee`. Self and repeated edges are
    /// ignored.
    pub fn add_edge(&mut self, callee: &str, caller: &str) {
        if callee == caller {
            return;
        }
        let callee = self.node(callee);
        let caller = self.node(caller);
        if self.callers[callee].contains(&caller) {
            return;
        }
        self.callers[callee].push(caller);
        self.deps[caller].push(callee);
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn edge_count(&self) -> usize {
        self.callers.iter().map(Vec::len).sum()
    }

    /// `(callee, caller)` pairs in insertion order per callee.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.callers.iter().enumerate().flat_map(move |(callee, callers)| {
            callers
                .iter()
                .map(move |caller| (self.nodes[callee].as_str(), self.nodes[*caller].as_str()))
        })
    }

    pub fn callees_of(&self, name: &str) -> Vec<&str> {
        self.index
            .get(name)
            .map(|idx| self.deps[*idx].iter().map(|dep| self.nodes[*dep].as_str()).collect())
            .unwrap_or_default()
    }

    pub fn callers_of(&self, name: &str) -> Vec<&str> {
        self.index
            .get(name)
            .map(|idx| self.callers[*idx].iter().map(|c| self.nodes[*c].as_str()).collect())
            .unwrap_or_default()
    }

    /// Callees before callers. Back edges of cycles are reported and not
    /// enforced; the result holds every declared function exactly once.
    pub fn emission_order(&self, decls: &DeclIndex, diagnostics: &mut Diagnostics) -> Vec<String> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum State {
            New,
            OnStack,
            Done,
        }

        let mut state = vec![State::New; self.nodes.len()];
        let mut postorder = Vec::with_capacity(self.nodes.len());
        let mut reported = HashSet::new();

        for root in 0..self.nodes.len() {
            if state[root] != State::New {
                continue;
            }
            state[root] = State::OnStack;
            let mut stack = vec![(root, 0usize)];
            while let Some((node, next)) = stack.last().copied() {
                let Some(dep) = self.deps[node].get(next).copied() else {
                    stack.pop();
                    state[node] = State::Done;
                    postorder.push(node);
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match state[dep] {
                    State::New => {
                        state[dep] = State::OnStack;
                        stack.push((dep, 0));
                    }
                    State::OnStack => {
                        if reported.insert((node, dep)) {
                            diagnostics.report(
                                Severity::Info,
                                DiagnosticKind::CallCycle,
                                format!(
                                    "call cycle: {} -> {} is not ordered",
                                    self.nodes[node], self.nodes[dep]
                                ),
                            );
                        }
                    }
                    State::Done => {}
                }
            }
        }

        let mut seen = HashSet::new();
        let mut order: Vec<String> = postorder
            .into_iter()
            .map(|idx| self.nodes[idx].clone())
            .filter(|name| decls.funcs.contains_key(name))
            .filter(|name| seen.insert(name.clone()))
            .collect();
        for name in &decls.order {
            if seen.insert(name.clone()) {
                trace!(name = %name, "appending function outside the graph");
                order.push(name.clone());
            }
        }
        order
    }
}

struct EdgeBuilder<'i> {
    info: &'i TypeInfo,
    decls: &'i DeclIndex,
    graph: CallGraph,
    current: Vec<String>,
}

impl EdgeBuilder<'_> {
    fn edge(&mut self, callee: &str, what: &str) {
        match self.current.last() {
            Some(caller) => {
                let caller = caller.clone();
                self.graph.add_edge(callee, &caller);
            }
            None => debug!(callee, what, "reference outside any function skipped"),
        }
    }

    fn ident_func(&self, id: NodeId) -> Option<String> {
        let obj = self.info.object(*self.info.uses.get(&id)?);
        (obj.kind == ObjKind::Func && obj.level == ScopeLevel::Package).then(|| obj.name.clone())
    }

    /// Interface methods have no declaration to order.
    fn is_interface(&self, type_name: &str) -> bool {
        self.info
            .named
            .get(type_name)
            .is_some_and(|named| matches!(named.underlying, Type::Interface(_)))
    }
}

impl<'a> Visitor<'a> for EdgeBuilder<'_> {
    fn enter(&mut self, node: Node<'a>) -> bool {
        match node {
            Node::Decl(Decl::Func(func)) => {
                let name = self
                    .decls
                    .name_of(func.id)
                    .map(str::to_string)
                    .unwrap_or_else(|| func.qualified_name());
                self.graph.node(&name);
                self.current.push(name);
            }
            Node::Expr(Expr::Ident(ident)) => {
                if let Some(name) = self.ident_func(ident.id) {
                    self.edge(&name, "function reference");
                }
            }
            Node::Expr(Expr::Call { func, .. }) => {
                if let Expr::Ident(ident) = func.unparen() {
                    if !self.info.uses.contains_key(&ident.id) && !ident.is_blank() {
                        self.edge(&ident.name, "unresolved call");
                    }
                }
            }
            Node::Expr(Expr::Selector { id, sel, .. }) => {
                let Some(selection) = self.info.selections.get(id) else {
                    return true;
                };
                if !matches!(selection.kind, SelectionKind::Method | SelectionKind::MethodExpr) {
                    return true;
                }
                if let Some(declaring) = &selection.declaring {
                    if self.decls.types.contains_key(declaring) && !self.is_interface(declaring) {
                        let name = format!("{declaring}_{}", sel.name);
                        self.edge(&name, "method");
                    }
                }
            }
            Node::Expr(Expr::CompositeLit { id, ty, .. }) => {
                let recorded = self
                    .info
                    .type_of(*id)
                    .and_then(|ty| ty.named_base())
                    .filter(|(pkg, _)| pkg.is_empty())
                    .map(|(_, name)| name.to_string());
                let type_name =
                    recorded.or_else(|| ty.as_ref().and_then(|ty| ty.base_name()).map(str::to_string));
                if let Some(type_name) = type_name {
                    let methods: Vec<String> =
                        self.decls.methods_of(&type_name).map(str::to_string).collect();
                    for method in methods {
                        self.edge(&method, "composite literal");
                    }
                }
            }
            _ => {}
        }
        true
    }

    fn leave(&mut self, node: Node<'a>) {
        if let Node::Decl(Decl::Func(_)) = node {
            self.current.pop();
        }
    }
}
