use crate::language::{
    ast::{Expr, File, NodeId, Stmt, UnaryOp},
    typecheck::TypeInfo,
    types::Type,
    visit::{walk_files, Node, Visitor},
};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanOpKind {
    Send,
    Recv,
}

#[derive(Clone, Debug)]
pub struct ChanOp {
    /// Send statement or receive expression.
    pub node: NodeId,
    pub chan: NodeId,
    pub kind: ChanOpKind,
    /// Element type, when the channel operand is typed.
    pub elem: Option<Type>,
}

pub fn harvest_chan_ops(files: &[File], info: &TypeInfo) -> Vec<ChanOp> {
    let mut harvester = Harvester {
        info,
        ops: Vec::new(),
    };
    walk_files(&mut harvester, files);
    debug!(chan_ops = harvester.ops.len(), "channel operations harvested");
    harvester.ops
}

struct Harvester<'i> {
    info: &'i TypeInfo,
    ops: Vec<ChanOp>,
}

impl Harvester<'_> {
    fn push(&mut self, node: NodeId, chan: &Expr, kind: ChanOpKind) {
        let elem = match self.info.type_of(chan.id()) {
            Some(Type::Chan(_, elem)) => Some(elem.as_ref().clone()),
            _ => None,
        };
        self.ops.push(ChanOp {
            node,
            chan: chan.id(),
            kind,
            elem,
        });
    }
}

impl<'a> Visitor<'a> for Harvester<'_> {
    fn enter(&mut self, node: Node<'a>) -> bool {
        match node {
            Node::Stmt(Stmt::Send(send)) => self.push(send.id, &send.chan, ChanOpKind::Send),
            Node::Expr(Expr::Unary {
                id,
                op: UnaryOp::Recv,
                expr,
                ..
            }) => self.push(*id, expr, ChanOpKind::Recv),
            _ => {}
        }
        true
    }
}
