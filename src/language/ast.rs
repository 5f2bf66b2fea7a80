use crate::language::{lexer::Comment, span::Span};
use std::path::PathBuf;

/// Identity of a tree node, unique within one package unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Allocator shared by every file of a unit and by later rewrites.
#[derive(Clone, Debug, Default)]
pub struct NodeIds {
    next: u32,
}

impl NodeIds {
    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    pub fn ident(&mut self, name: impl Into<String>, span: Span) -> Ident {
        Ident {
            id: self.fresh(),
            name: name.into(),
            span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct File {
    pub id: NodeId,
    pub path: PathBuf,
    pub source: String,
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub comments: Vec<Comment>,
}

impl File {
    pub fn imports_c(&self) -> bool {
        self.imports.iter().any(|import| import.path == "C")
    }
}

#[derive(Clone, Debug)]
pub struct ImportSpec {
    pub id: NodeId,
    pub name: Option<Ident>,
    pub path: String,
    /// Comment group directly above the import, used for the cgo preamble.
    pub doc: Option<String>,
    pub span: Span,
}

impl ImportSpec {
    /// Name the import binds in the file scope.
    pub fn local_name(&self) -> String {
        match &self.name {
            Some(name) => name.name.clone(),
            None => self
                .path
                .rsplit('/')
                .next()
                .unwrap_or(self.path.as_str())
                .to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

#[derive(Clone, Debug)]
pub enum Decl {
    Gen(GenDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn id(&self) -> NodeId {
        match self {
            Decl::Gen(decl) => decl.id,
            Decl::Func(decl) => decl.id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenKind {
    Const,
    Var,
    Type,
}

#[derive(Clone, Debug)]
pub struct GenDecl {
    pub id: NodeId,
    pub kind: GenKind,
    pub specs: Vec<Spec>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Spec {
    Value(ValueSpec),
    Type(TypeSpec),
}

impl Spec {
    pub fn id(&self) -> NodeId {
        match self {
            Spec::Value(spec) => spec.id,
            Spec::Type(spec) => spec.id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ValueSpec {
    pub id: NodeId,
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct TypeSpec {
    pub id: NodeId,
    pub name: Ident,
    pub alias: bool,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub id: NodeId,
    pub recv: Option<Field>,
    pub name: Ident,
    pub ty: FuncType,
    pub body: Option<Block>,
    pub span: Span,
}

impl FuncDecl {
    /// Receiver base type name with pointer indirection trimmed.
    pub fn receiver_type_name(&self) -> Option<&str> {
        let recv = self.recv.as_ref()?;
        recv.ty.base_name()
    }

    pub fn has_pointer_receiver(&self) -> bool {
        matches!(
            self.recv.as_ref().map(|recv| &recv.ty),
            Some(TypeExpr::Pointer { .. })
        )
    }

    /// `<Receiver>_<Method>` for methods, the bare name otherwise.
    pub fn qualified_name(&self) -> String {
        match self.receiver_type_name() {
            Some(recv) => format!("{}_{}", recv, self.name.name),
            None => self.name.name.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FuncType {
    pub id: NodeId,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub span: Span,
}

impl FuncType {
    pub fn param_count(&self) -> usize {
        count_fields(&self.params)
    }

    pub fn result_count(&self) -> usize {
        count_fields(&self.results)
    }

    pub fn is_variadic(&self) -> bool {
        matches!(
            self.params.last().map(|field| &field.ty),
            Some(TypeExpr::Ellipsis { .. })
        )
    }
}

fn count_fields(fields: &[Field]) -> usize {
    fields.iter().map(|field| field.names.len().max(1)).sum()
}

/// Parameter, result, struct field or interface method.
#[derive(Clone, Debug)]
pub struct Field {
    pub id: NodeId,
    /// Empty for unnamed parameters and embedded fields.
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    pub tag: Option<String>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Decl(GenDecl),
    Empty(EmptyStmt),
    Labeled(LabeledStmt),
    Expr(ExprStmt),
    Send(SendStmt),
    IncDec(IncDecStmt),
    Assign(AssignStmt),
    Go(GoStmt),
    Defer(DeferStmt),
    Return(ReturnStmt),
    Branch(BranchStmt),
    Block(Block),
    If(IfStmt),
    Switch(SwitchStmt),
    TypeSwitch(TypeSwitchStmt),
    Select(SelectStmt),
    For(ForStmt),
    Range(RangeStmt),
}

#[derive(Clone, Debug)]
pub struct EmptyStmt {
    pub id: NodeId,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct LabeledStmt {
    pub id: NodeId,
    pub label: Ident,
    pub stmt: Box<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ExprStmt {
    pub id: NodeId,
    pub expr: Expr,
}

#[derive(Clone, Debug)]
pub struct SendStmt {
    pub id: NodeId,
    pub chan: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IncDecStmt {
    pub id: NodeId,
    pub expr: Expr,
    pub inc: bool,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Define,
    Op(BinaryOp),
}

#[derive(Clone, Debug)]
pub struct AssignStmt {
    pub id: NodeId,
    pub lhs: Vec<Expr>,
    pub op: AssignOp,
    pub rhs: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct GoStmt {
    pub id: NodeId,
    pub call: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct DeferStmt {
    pub id: NodeId,
    pub call: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub id: NodeId,
    pub results: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

#[derive(Clone, Debug)]
pub struct BranchStmt {
    pub id: NodeId,
    pub kind: BranchKind,
    pub label: Option<Ident>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IfStmt {
    pub id: NodeId,
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub then: Block,
    /// Either another `if` or a block.
    pub els: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct CaseClause {
    pub id: NodeId,
    /// Empty for `default`.
    pub list: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct SwitchStmt {
    pub id: NodeId,
    pub init: Option<Box<Stmt>>,
    pub tag: Option<Expr>,
    pub clauses: Vec<CaseClause>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct TypeSwitchStmt {
    pub id: NodeId,
    pub init: Option<Box<Stmt>>,
    pub binding: Option<Ident>,
    /// `x` in `x.(type)`.
    pub subject: Expr,
    pub clauses: Vec<CaseClause>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct CommClause {
    pub id: NodeId,
    /// Send or receive statement; `None` for `default`.
    pub comm: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct SelectStmt {
    pub id: NodeId,
    pub clauses: Vec<CommClause>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ForStmt {
    pub id: NodeId,
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct RangeStmt {
    pub id: NodeId,
    pub key: Option<Expr>,
    pub value: Option<Expr>,
    pub define: bool,
    pub expr: Expr,
    pub body: Block,
    pub span: Span,
}

impl Stmt {
    pub fn id(&self) -> NodeId {
        match self {
            Stmt::Decl(decl) => decl.id,
            Stmt::Empty(stmt) => stmt.id,
            Stmt::Labeled(stmt) => stmt.id,
            Stmt::Expr(stmt) => stmt.id,
            Stmt::Send(stmt) => stmt.id,
            Stmt::IncDec(stmt) => stmt.id,
            Stmt::Assign(stmt) => stmt.id,
            Stmt::Go(stmt) => stmt.id,
            Stmt::Defer(stmt) => stmt.id,
            Stmt::Return(stmt) => stmt.id,
            Stmt::Branch(stmt) => stmt.id,
            Stmt::Block(block) => block.id,
            Stmt::If(stmt) => stmt.id,
            Stmt::Switch(stmt) => stmt.id,
            Stmt::TypeSwitch(stmt) => stmt.id,
            Stmt::Select(stmt) => stmt.id,
            Stmt::For(stmt) => stmt.id,
            Stmt::Range(stmt) => stmt.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Stmt::Decl(decl) => decl.span,
            Stmt::Empty(stmt) => stmt.span,
            Stmt::Labeled(stmt) => stmt.span,
            Stmt::Expr(stmt) => stmt.expr.span(),
            Stmt::Send(stmt) => stmt.span,
            Stmt::IncDec(stmt) => stmt.span,
            Stmt::Assign(stmt) => stmt.span,
            Stmt::Go(stmt) => stmt.span,
            Stmt::Defer(stmt) => stmt.span,
            Stmt::Return(stmt) => stmt.span,
            Stmt::Branch(stmt) => stmt.span,
            Stmt::Block(block) => block.span,
            Stmt::If(stmt) => stmt.span,
            Stmt::Switch(stmt) => stmt.span,
            Stmt::TypeSwitch(stmt) => stmt.span,
            Stmt::Select(stmt) => stmt.span,
            Stmt::For(stmt) => stmt.span,
            Stmt::Range(stmt) => stmt.span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Ident(Ident),
    BasicLit {
        id: NodeId,
        kind: LitKind,
        /// Source text for numbers, decoded value for strings and runes.
        value: String,
        span: Span,
    },
    CompositeLit {
        id: NodeId,
        ty: Option<TypeExpr>,
        elts: Vec<Expr>,
        span: Span,
    },
    FuncLit {
        id: NodeId,
        ty: FuncType,
        body: Block,
        span: Span,
    },
    Paren {
        id: NodeId,
        expr: Box<Expr>,
        span: Span,
    },
    Selector {
        id: NodeId,
        base: Box<Expr>,
        sel: Ident,
        span: Span,
    },
    Index {
        id: NodeId,
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Slice {
        id: NodeId,
        base: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
        span: Span,
    },
    TypeAssert {
        id: NodeId,
        base: Box<Expr>,
        /// `None` for `x.(type)` in a type switch.
        ty: Option<TypeExpr>,
        span: Span,
    },
    Call {
        id: NodeId,
        func: Box<Expr>,
        args: Vec<Expr>,
        ellipsis: bool,
        span: Span,
    },
    /// Dereference, or a pointer type when the operand denotes a type.
    Star {
        id: NodeId,
        expr: Box<Expr>,
        span: Span,
    },
    Unary {
        id: NodeId,
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        id: NodeId,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    KeyValue {
        id: NodeId,
        key: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    /// Type syntax in expression position, e.g. `make([]int, n)`.
    Type(TypeExpr),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
    BitNot,
    Addr,
    Recv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    AndNot,
    LogAnd,
    LogOr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::LogOr => 1,
            BinaryOp::LogAnd => 2,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => 3,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::BitOr | BinaryOp::BitXor => 4,
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::BitAnd
            | BinaryOp::AndNot => 5,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 3
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Ident(ident) => ident.id,
            Expr::BasicLit { id, .. }
            | Expr::CompositeLit { id, .. }
            | Expr::FuncLit { id, .. }
            | Expr::Paren { id, .. }
            | Expr::Selector { id, .. }
            | Expr::Index { id, .. }
            | Expr::Slice { id, .. }
            | Expr::TypeAssert { id, .. }
            | Expr::Call { id, .. }
            | Expr::Star { id, .. }
            | Expr::Unary { id, .. }
            | Expr::Binary { id, .. }
            | Expr::KeyValue { id, .. } => *id,
            Expr::Type(ty) => ty.id(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(ident) => ident.span,
            Expr::BasicLit { span, .. }
            | Expr::CompositeLit { span, .. }
            | Expr::FuncLit { span, .. }
            | Expr::Paren { span, .. }
            | Expr::Selector { span, .. }
            | Expr::Index { span, .. }
            | Expr::Slice { span, .. }
            | Expr::TypeAssert { span, .. }
            | Expr::Call { span, .. }
            | Expr::Star { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::KeyValue { span, .. } => *span,
            Expr::Type(ty) => ty.span(),
        }
    }

    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren { expr, .. } => expr.unparen(),
            other => other,
        }
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match self.unparen() {
            Expr::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    /// Reinterprets expression syntax as a type, for composite literal heads
    /// and conversions.
    pub fn into_type(self) -> Option<TypeExpr> {
        match self {
            Expr::Ident(name) => Some(TypeExpr::Name { name }),
            Expr::Selector { id, base, sel, span } => match *base {
                Expr::Ident(pkg) => Some(TypeExpr::Qualified {
                    id,
                    pkg,
                    name: sel,
                    span,
                }),
                _ => None,
            },
            Expr::Star { id, expr, span } => Some(TypeExpr::Pointer {
                id,
                elem: Box::new(expr.into_type()?),
                span,
            }),
            Expr::Paren { expr, .. } => expr.into_type(),
            Expr::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

impl ChanDir {
    pub fn can_send(self) -> bool {
        self != ChanDir::Recv
    }

    pub fn can_recv(self) -> bool {
        self != ChanDir::Send
    }
}

#[derive(Clone, Debug)]
pub enum TypeExpr {
    Name {
        name: Ident,
    },
    Qualified {
        id: NodeId,
        pkg: Ident,
        name: Ident,
        span: Span,
    },
    Pointer {
        id: NodeId,
        elem: Box<TypeExpr>,
        span: Span,
    },
    Array {
        id: NodeId,
        /// `None` for `[...]T`.
        len: Option<Box<Expr>>,
        elem: Box<TypeExpr>,
        span: Span,
    },
    Slice {
        id: NodeId,
        elem: Box<TypeExpr>,
        span: Span,
    },
    Map {
        id: NodeId,
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
        span: Span,
    },
    Chan {
        id: NodeId,
        dir: ChanDir,
        elem: Box<TypeExpr>,
        span: Span,
    },
    Func(FuncType),
    Struct {
        id: NodeId,
        fields: Vec<Field>,
        span: Span,
    },
    /// Methods are fields with one name and a `Func` type; embedded
    /// interfaces have no names.
    Interface {
        id: NodeId,
        methods: Vec<Field>,
        span: Span,
    },
    /// Variadic parameter `...T`.
    Ellipsis {
        id: NodeId,
        elem: Box<TypeExpr>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn id(&self) -> NodeId {
        match self {
            TypeExpr::Name { name } => name.id,
            TypeExpr::Func(func) => func.id,
            TypeExpr::Qualified { id, .. }
            | TypeExpr::Pointer { id, .. }
            | TypeExpr::Array { id, .. }
            | TypeExpr::Slice { id, .. }
            | TypeExpr::Map { id, .. }
            | TypeExpr::Chan { id, .. }
            | TypeExpr::Struct { id, .. }
            | TypeExpr::Interface { id, .. }
            | TypeExpr::Ellipsis { id, .. } => *id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Name { name } => name.span,
            TypeExpr::Func(func) => func.span,
            TypeExpr::Qualified { span, .. }
            | TypeExpr::Pointer { span, .. }
            | TypeExpr::Array { span, .. }
            | TypeExpr::Slice { span, .. }
            | TypeExpr::Map { span, .. }
            | TypeExpr::Chan { span, .. }
            | TypeExpr::Struct { span, .. }
            | TypeExpr::Interface { span, .. }
            | TypeExpr::Ellipsis { span, .. } => *span,
        }
    }

    /// Name of a (possibly pointer-to) named type.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Name { name } => Some(&name.name),
            TypeExpr::Pointer { elem, .. } => elem.base_name(),
            _ => None,
        }
    }

    /// Go spelling, used for diagnostics and configuration matching.
    pub fn spelling(&self) -> String {
        match self {
            TypeExpr::Name { name } => name.name.clone(),
            TypeExpr::Qualified { pkg, name, .. } => format!("{}.{}", pkg.name, name.name),
            TypeExpr::Pointer { elem, .. } => format!("*{}", elem.spelling()),
            TypeExpr::Array { len: None, elem, .. } => format!("[...]{}", elem.spelling()),
            TypeExpr::Array { elem, .. } => format!("[N]{}", elem.spelling()),
            TypeExpr::Slice { elem, .. } => format!("[]{}", elem.spelling()),
            TypeExpr::Map { key, value, .. } => {
                format!("map[{}]{}", key.spelling(), value.spelling())
            }
            TypeExpr::Chan { dir, elem, .. } => match dir {
                ChanDir::Both => format!("chan {}", elem.spelling()),
                ChanDir::Send => format!("chan<- {}", elem.spelling()),
                ChanDir::Recv => format!("<-chan {}", elem.spelling()),
            },
            TypeExpr::Func(_) => "func(...)".into(),
            TypeExpr::Struct { .. } => "struct{...}".into(),
            TypeExpr::Interface { .. } => "interface{...}".into(),
            TypeExpr::Ellipsis { elem, .. } => format!("...{}", elem.spelling()),
        }
    }
}
