//! Passes that turn Go constructs without a direct C counterpart into
//! worklists for the renderer. Hoisting and result naming rewrite the
//! tree; the others only collect.

pub mod chanops;
pub mod closures;
pub mod defers;
pub mod globals;
pub mod goroutines;
pub mod kvpairs;
pub mod multiret;
pub mod temps;

pub use chanops::{harvest_chan_ops, ChanOp, ChanOpKind};
pub use closures::{captures_of, harvest_closures, Capture, Closure};
pub use defers::{harvest_defers, DeferHost, Deferred};
pub use globals::{classify_globals, Global, GlobalKind};
pub use goroutines::{harvest_goroutines, ArgStruct, GoTarget, Goroutine};
pub use kvpairs::{index_assignments, KvPairs};
pub use multiret::name_results;
pub use temps::{hoist_temps, TempVar};

use crate::language::ast::NodeId;
use std::collections::{BTreeMap, HashMap};

/// Output of the desugaring passes. Filled once, read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct Worklists {
    /// Hoisted temporaries by the statement they precede.
    pub temps: BTreeMap<NodeId, Vec<TempVar>>,
    /// Function declarations with two or more results.
    pub multi_returns: Vec<NodeId>,
    pub kv_pairs: KvPairs,
    pub goroutines: Vec<Goroutine>,
    /// Argument structures by `go` statement.
    pub closure_args: BTreeMap<NodeId, ArgStruct>,
    pub chan_ops: Vec<ChanOp>,
    pub closures: Vec<Closure>,
    pub defers: Vec<Deferred>,
    pub defer_hosts: BTreeMap<NodeId, DeferHost>,
    pub globals: Vec<Global>,
}

impl Worklists {
    /// Definitions of hoisted temporaries, mapped to their statement.
    pub fn hoisted_defs(&self) -> HashMap<NodeId, NodeId> {
        self.temps
            .iter()
            .flat_map(|(stmt, temps)| temps.iter().map(move |temp| (temp.ident.id, *stmt)))
            .collect()
    }

    pub fn temp_count(&self) -> usize {
        self.temps.values().map(Vec::len).sum()
    }
}
