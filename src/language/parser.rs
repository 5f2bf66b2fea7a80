use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::{lex, Comment, LexError},
    span::Span,
    token::{Token, TokenKind},
};
use std::path::PathBuf;

pub fn parse_file(path: PathBuf, source: &str, ids: &mut NodeIds) -> Result<File, SyntaxErrors> {
    let lexed = lex(source).map_err(lex_errors)?;
    let mut parser = Parser::new(source, lexed.tokens, lexed.comments, ids);
    let file = parser.parse_file(path);
    if parser.errors.is_empty() {
        Ok(file)
    } else {
        Err(SyntaxErrors::new(parser.errors))
    }
}

/// Parses a standalone type, e.g. a signature from an import manifest.
pub fn parse_type_source(source: &str, ids: &mut NodeIds) -> Result<TypeExpr, SyntaxErrors> {
    let lexed = lex(source).map_err(lex_errors)?;
    let mut parser = Parser::new(source, lexed.tokens, Vec::new(), ids);
    let result = parser.parse_type().and_then(|ty| {
        parser.matches(&TokenKind::Semi);
        if parser.check(&TokenKind::Eof) {
            Ok(ty)
        } else {
            Err(parser.error_here("Unexpected tokens after type"))
        }
    });
    match result {
        Ok(ty) if parser.errors.is_empty() => Ok(ty),
        Ok(_) => Err(SyntaxErrors::new(parser.errors)),
        Err(err) => {
            parser.errors.push(err);
            Err(SyntaxErrors::new(parser.errors))
        }
    }
}

fn lex_errors(errors: Vec<LexError>) -> SyntaxErrors {
    SyntaxErrors::new(
        errors
            .into_iter()
            .map(|err| SyntaxError::new(err.message, err.span))
            .collect(),
    )
}

type PResult<T> = Result<T, SyntaxError>;

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    pos: usize,
    ids: &'a mut NodeIds,
    errors: Vec<SyntaxError>,
    /// Negative inside `if`/`for`/`switch` headers, where `T {` opens a block.
    expr_lev: i32,
}

enum Simple {
    Stmt(Stmt),
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
    },
}

impl<'a> Parser<'a> {
    fn new(
        source: &'a str,
        tokens: Vec<Token>,
        comments: Vec<Comment>,
        ids: &'a mut NodeIds,
    ) -> Self {
        Self {
            source,
            tokens,
            comments,
            pos: 0,
            ids,
            errors: Vec::new(),
            expr_lev: 0,
        }
    }

    // ---- token helpers -------------------------------------------------

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn start(&self) -> usize {
        self.current_span().start
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end().max(start))
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "Expected {}, found {}",
                kind.describe(),
                self.peek().describe()
            )))
        }
    }

    fn expect_ident(&mut self, what: &str) -> PResult<Ident> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Ok(Ident {
                    id: self.ids.fresh(),
                    name,
                    span,
                })
            }
            other => Err(self.error_here(format!("Expected {what}, found {}", other.describe()))),
        }
    }

    /// Statement terminator; optional before a closing `)` or `}`.
    fn expect_semi(&mut self) -> PResult<()> {
        if self.matches(&TokenKind::Semi) {
            return Ok(());
        }
        if matches!(self.peek(), TokenKind::RParen | TokenKind::RBrace | TokenKind::Eof) {
            return Ok(());
        }
        Err(self.error_here(format!(
            "Expected `;` or newline, found {}",
            self.peek().describe()
        )))
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current_span())
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    fn fresh(&mut self) -> NodeId {
        self.ids.fresh()
    }

    fn synchronize_decl(&mut self) {
        let mut depth = 0i32;
        loop {
            match self.peek() {
                TokenKind::Eof => return,
                TokenKind::LBrace | TokenKind::LParen => depth += 1,
                TokenKind::RBrace | TokenKind::RParen => depth -= 1,
                TokenKind::Func | TokenKind::Var | TokenKind::Const | TokenKind::Type
                    if depth <= 0 && self.at_line_start() =>
                {
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || matches!(self.tokens[self.pos - 1].kind, TokenKind::Semi)
    }

    /// Comment group that ends right before `offset` with at most one line
    /// break in between.
    fn doc_before(&self, offset: usize) -> Option<String> {
        let mut lines = Vec::new();
        let mut limit = offset;
        for comment in self.comments.iter().rev() {
            if comment.span.end > limit {
                continue;
            }
            let gap = &self.source[comment.span.end..limit];
            if !gap.trim().is_empty() || gap.matches('\n').count() > 1 {
                break;
            }
            lines.push(comment.text.clone());
            limit = comment.span.start;
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }

    // ---- file level ----------------------------------------------------

    fn parse_file(&mut self, path: PathBuf) -> File {
        let id = self.fresh();
        while self.matches(&TokenKind::Semi) {}
        let package = match self.parse_package_clause() {
            Ok(ident) => ident,
            Err(err) => {
                self.report(err);
                Ident {
                    id: self.fresh(),
                    name: String::new(),
                    span: Span::default(),
                }
            }
        };

        let mut imports = Vec::new();
        while self.check(&TokenKind::Import) {
            match self.parse_import_decl() {
                Ok(mut specs) => imports.append(&mut specs),
                Err(err) => {
                    self.report(err);
                    self.synchronize_decl();
                }
            }
        }

        let mut decls = Vec::new();
        while !self.check(&TokenKind::Eof) {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            match self.parse_top_decl() {
                Ok(decl) => {
                    decls.push(decl);
                    if let Err(err) = self.expect_semi() {
                        self.report(err);
                        self.synchronize_decl();
                    }
                }
                Err(err) => {
                    self.report(err);
                    self.advance();
                    self.synchronize_decl();
                }
            }
        }

        File {
            id,
            path,
            source: self.source.to_string(),
            package,
            imports,
            decls,
            comments: std::mem::take(&mut self.comments),
        }
    }

    fn parse_package_clause(&mut self) -> PResult<Ident> {
        self.expect(TokenKind::Package)?;
        let name = self.expect_ident("package name")?;
        self.expect_semi()?;
        Ok(name)
    }

    fn parse_import_decl(&mut self) -> PResult<Vec<ImportSpec>> {
        let keyword = self.expect(TokenKind::Import)?;
        let mut specs = Vec::new();
        if self.matches(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) && !self.check(&TokenKind::Eof) {
                let doc = self.doc_before(self.start());
                specs.push(self.parse_import_spec(doc)?);
                self.expect_semi()?;
            }
            self.expect(TokenKind::RParen)?;
        } else {
            let doc = self.doc_before(keyword.span.start);
            specs.push(self.parse_import_spec(doc)?);
        }
        self.expect_semi()?;
        Ok(specs)
    }

    fn parse_import_spec(&mut self, doc: Option<String>) -> PResult<ImportSpec> {
        let start = self.start();
        let name = match self.peek().clone() {
            TokenKind::Identifier(_) => Some(self.expect_ident("import name")?),
            TokenKind::Dot => {
                let span = self.advance().span;
                Some(Ident {
                    id: self.fresh(),
                    name: ".".into(),
                    span,
                })
            }
            _ => None,
        };
        let path = match self.peek().clone() {
            TokenKind::String(path) => {
                self.advance();
                path
            }
            other => {
                return Err(self.error_here(format!(
                    "Expected import path, found {}",
                    other.describe()
                )))
            }
        };
        Ok(ImportSpec {
            id: self.fresh(),
            name,
            path,
            doc,
            span: self.span_from(start),
        })
    }

    fn parse_top_decl(&mut self) -> PResult<Decl> {
        match self.peek() {
            TokenKind::Func => self.parse_func_decl().map(Decl::Func),
            TokenKind::Var => self.parse_gen_decl(GenKind::Var).map(Decl::Gen),
            TokenKind::Const => self.parse_gen_decl(GenKind::Const).map(Decl::Gen),
            TokenKind::Type => self.parse_gen_decl(GenKind::Type).map(Decl::Gen),
            TokenKind::Import => Err(self
                .error_here("Imports must appear before other declarations")
                .with_label("misplaced import")),
            other => Err(self.error_here(format!(
                "Expected declaration, found {}",
                other.describe()
            ))),
        }
    }

    fn parse_gen_decl(&mut self, kind: GenKind) -> PResult<GenDecl> {
        let start = self.start();
        self.advance();
        let id = self.fresh();
        let mut specs = Vec::new();
        if self.matches(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) && !self.check(&TokenKind::Eof) {
                specs.push(self.parse_spec(kind)?);
                self.expect_semi()?;
            }
            self.expect(TokenKind::RParen)?;
        } else {
            specs.push(self.parse_spec(kind)?);
        }
        Ok(GenDecl {
            id,
            kind,
            specs,
            span: self.span_from(start),
        })
    }

    fn parse_spec(&mut self, kind: GenKind) -> PResult<Spec> {
        let start = self.start();
        if kind == GenKind::Type {
            let name = self.expect_ident("type name")?;
            let alias = self.matches(&TokenKind::Eq);
            let ty = self.parse_type()?;
            return Ok(Spec::Type(TypeSpec {
                id: self.fresh(),
                name,
                alias,
                ty,
                span: self.span_from(start),
            }));
        }

        let mut names = vec![self.expect_ident("name")?];
        while self.matches(&TokenKind::Comma) {
            names.push(self.expect_ident("name")?);
        }
        let ty = if matches!(
            self.peek(),
            TokenKind::Eq | TokenKind::Semi | TokenKind::RParen
        ) {
            None
        } else {
            Some(self.parse_type()?)
        };
        let values = if self.matches(&TokenKind::Eq) {
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        if kind == GenKind::Var && ty.is_none() && values.is_empty() {
            return Err(SyntaxError::new(
                "Variable declaration needs a type or an initializer",
                self.span_from(start),
            ));
        }
        Ok(Spec::Value(ValueSpec {
            id: self.fresh(),
            names,
            ty,
            values,
            span: self.span_from(start),
        }))
    }

    fn parse_func_decl(&mut self) -> PResult<FuncDecl> {
        let start = self.start();
        self.expect(TokenKind::Func)?;
        let id = self.fresh();
        let recv = if self.check(&TokenKind::LParen) {
            let recv_start = self.start();
            let mut fields = self.parse_parameters()?;
            if fields.len() != 1 {
                return Err(SyntaxError::new(
                    "Method must have exactly one receiver",
                    self.span_from(recv_start),
                ));
            }
            fields.pop()
        } else {
            None
        };
        let name = self.expect_ident("function name")?;
        let ty = self.parse_signature(start)?;
        let body = if self.check(&TokenKind::LBrace) {
            Some(self.parse_body()?)
        } else {
            None
        };
        Ok(FuncDecl {
            id,
            recv,
            name,
            ty,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_signature(&mut self, start: usize) -> PResult<FuncType> {
        let id = self.fresh();
        let params = self.parse_parameters()?;
        let results = if self.check(&TokenKind::LParen) {
            self.parse_parameters()?
        } else if self.starts_type() {
            let ty = self.parse_type()?;
            vec![Field {
                id: self.fresh(),
                names: Vec::new(),
                span: ty.span(),
                ty,
                tag: None,
            }]
        } else {
            Vec::new()
        };
        Ok(FuncType {
            id,
            params,
            results,
            span: self.span_from(start),
        })
    }

    fn parse_parameters(&mut self) -> PResult<Vec<Field>> {
        self.expect(TokenKind::LParen)?;
        let mut entries: Vec<(Option<Ident>, TypeExpr, Span)> = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.check(&TokenKind::Eof) {
            let start = self.start();
            let first = self.parse_param_type()?;
            if matches!(self.peek(), TokenKind::Comma | TokenKind::RParen) {
                entries.push((None, first, self.span_from(start)));
            } else {
                let TypeExpr::Name { name } = first else {
                    return Err(self.error_here("Expected `,` or `)` in parameter list"));
                };
                let ty = self.parse_param_type()?;
                entries.push((Some(name), ty, self.span_from(start)));
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let named = entries.iter().any(|(name, _, _)| name.is_some());
        let mut fields = Vec::new();
        if !named {
            for (_, ty, span) in entries {
                fields.push(Field {
                    id: self.fresh(),
                    names: Vec::new(),
                    ty,
                    tag: None,
                    span,
                });
            }
            return Ok(fields);
        }

        let mut pending: Vec<Ident> = Vec::new();
        let mut pending_start: Option<usize> = None;
        for (name, ty, span) in entries {
            match name {
                None => {
                    let TypeExpr::Name { name } = ty else {
                        return Err(SyntaxError::new(
                            "Mixed named and unnamed parameters",
                            span,
                        ));
                    };
                    pending_start.get_or_insert(span.start);
                    pending.push(name);
                }
                Some(name) => {
                    let start = pending_start.take().unwrap_or(span.start);
                    let mut names = std::mem::take(&mut pending);
                    names.push(name);
                    fields.push(Field {
                        id: self.fresh(),
                        names,
                        ty,
                        tag: None,
                        span: Span::new(start, span.end),
                    });
                }
            }
        }
        if let Some(last) = pending.last() {
            return Err(SyntaxError::new(
                "Mixed named and unnamed parameters",
                last.span,
            ));
        }
        Ok(fields)
    }

    fn parse_param_type(&mut self) -> PResult<TypeExpr> {
        let start = self.start();
        if self.matches(&TokenKind::Ellipsis) {
            let elem = self.parse_type()?;
            return Ok(TypeExpr::Ellipsis {
                id: self.fresh(),
                elem: Box::new(elem),
                span: self.span_from(start),
            });
        }
        self.parse_type()
    }

    // ---- types ---------------------------------------------------------

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Identifier(_)
                | TokenKind::Star
                | TokenKind::LBracket
                | TokenKind::Map
                | TokenKind::Chan
                | TokenKind::Func
                | TokenKind::Struct
                | TokenKind::Interface
                | TokenKind::LParen
                | TokenKind::Arrow
        )
    }

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        let start = self.start();
        match self.peek().clone() {
            TokenKind::Identifier(_) => self.parse_type_name(),
            TokenKind::Star => {
                self.advance();
                let elem = self.parse_type()?;
                Ok(TypeExpr::Pointer {
                    id: self.fresh(),
                    elem: Box::new(elem),
                    span: self.span_from(start),
                })
            }
            TokenKind::LBracket => {
                self.advance();
                if self.matches(&TokenKind::RBracket) {
                    let elem = self.parse_type()?;
                    return Ok(TypeExpr::Slice {
                        id: self.fresh(),
                        elem: Box::new(elem),
                        span: self.span_from(start),
                    });
                }
                let len = if self.matches(&TokenKind::Ellipsis) {
                    None
                } else {
                    self.expr_lev += 1;
                    let len = self.parse_expr();
                    self.expr_lev -= 1;
                    Some(Box::new(len?))
                };
                self.expect(TokenKind::RBracket)?;
                let elem = self.parse_type()?;
                Ok(TypeExpr::Array {
                    id: self.fresh(),
                    len,
                    elem: Box::new(elem),
                    span: self.span_from(start),
                })
            }
            TokenKind::Map => {
                self.advance();
                self.expect(TokenKind::LBracket)?;
                let key = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                let value = self.parse_type()?;
                Ok(TypeExpr::Map {
                    id: self.fresh(),
                    key: Box::new(key),
                    value: Box::new(value),
                    span: self.span_from(start),
                })
            }
            TokenKind::Chan => {
                self.advance();
                let dir = if self.matches(&TokenKind::Arrow) {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = self.parse_type()?;
                Ok(TypeExpr::Chan {
                    id: self.fresh(),
                    dir,
                    elem: Box::new(elem),
                    span: self.span_from(start),
                })
            }
            TokenKind::Arrow => {
                self.advance();
                self.expect(TokenKind::Chan)?;
                let elem = self.parse_type()?;
                Ok(TypeExpr::Chan {
                    id: self.fresh(),
                    dir: ChanDir::Recv,
                    elem: Box::new(elem),
                    span: self.span_from(start),
                })
            }
            TokenKind::Func => {
                self.advance();
                Ok(TypeExpr::Func(self.parse_signature(start)?))
            }
            TokenKind::Struct => self.parse_struct_type(),
            TokenKind::Interface => self.parse_interface_type(),
            TokenKind::LParen => {
                self.advance();
                let ty = self.parse_type()?;
                self.expect(TokenKind::RParen)?;
                Ok(ty)
            }
            other => Err(self.error_here(format!("Expected type, found {}", other.describe()))),
        }
    }

    fn parse_type_name(&mut self) -> PResult<TypeExpr> {
        let start = self.start();
        let name = self.expect_ident("type name")?;
        if self.check(&TokenKind::Dot) && matches!(self.peek_at(1), TokenKind::Identifier(_)) {
            self.advance();
            let sel = self.expect_ident("type name")?;
            return Ok(TypeExpr::Qualified {
                id: self.fresh(),
                pkg: name,
                name: sel,
                span: self.span_from(start),
            });
        }
        Ok(TypeExpr::Name { name })
    }

    fn parse_struct_type(&mut self) -> PResult<TypeExpr> {
        let start = self.start();
        self.expect(TokenKind::Struct)?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            let field_start = self.start();
            let embedded = match (self.peek(), self.peek_at(1)) {
                (TokenKind::Star, _) => true,
                (TokenKind::Identifier(_), next) => matches!(
                    next,
                    TokenKind::Semi | TokenKind::RBrace | TokenKind::String(_) | TokenKind::Dot
                ),
                _ => false,
            };
            let (names, ty) = if embedded {
                (Vec::new(), self.parse_type()?)
            } else {
                let mut names = vec![self.expect_ident("field name")?];
                while self.matches(&TokenKind::Comma) {
                    names.push(self.expect_ident("field name")?);
                }
                (names, self.parse_type()?)
            };
            let tag = match self.peek().clone() {
                TokenKind::String(tag) => {
                    self.advance();
                    Some(tag)
                }
                _ => None,
            };
            fields.push(Field {
                id: self.fresh(),
                names,
                ty,
                tag,
                span: self.span_from(field_start),
            });
            self.expect_semi()?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(TypeExpr::Struct {
            id: self.fresh(),
            fields,
            span: self.span_from(start),
        })
    }

    fn parse_interface_type(&mut self) -> PResult<TypeExpr> {
        let start = self.start();
        self.expect(TokenKind::Interface)?;
        self.expect(TokenKind::LBrace)?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            let elem_start = self.start();
            if matches!(self.peek(), TokenKind::Identifier(_))
                && matches!(self.peek_at(1), TokenKind::LParen)
            {
                let name = self.expect_ident("method name")?;
                let sig = self.parse_signature(elem_start)?;
                methods.push(Field {
                    id: self.fresh(),
                    names: vec![name],
                    ty: TypeExpr::Func(sig),
                    tag: None,
                    span: self.span_from(elem_start),
                });
            } else {
                let ty = self.parse_type_name()?;
                methods.push(Field {
                    id: self.fresh(),
                    names: Vec::new(),
                    ty,
                    tag: None,
                    span: self.span_from(elem_start),
                });
            }
            self.expect_semi()?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(TypeExpr::Interface {
            id: self.fresh(),
            methods,
            span: self.span_from(start),
        })
    }

    // ---- statements ----------------------------------------------------

    fn parse_body(&mut self) -> PResult<Block> {
        let saved = self.expr_lev;
        self.expr_lev = 0;
        let block = self.parse_block();
        self.expr_lev = saved;
        block
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.start();
        self.expect(TokenKind::LBrace)?;
        let id = self.fresh();
        let stmts = self.parse_stmt_list()?;
        self.expect(TokenKind::RBrace)?;
        Ok(Block {
            id,
            stmts,
            span: self.span_from(start),
        })
    }

    fn parse_stmt_list(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                TokenKind::RBrace | TokenKind::Case | TokenKind::Default | TokenKind::Eof => break,
                TokenKind::Semi => {
                    self.advance();
                }
                _ => {
                    stmts.push(self.parse_stmt()?);
                    if !matches!(
                        self.peek(),
                        TokenKind::RBrace | TokenKind::Case | TokenKind::Default
                    ) {
                        self.expect_semi()?;
                    }
                }
            }
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        match self.peek().clone() {
            TokenKind::Var => self.parse_gen_decl(GenKind::Var).map(Stmt::Decl),
            TokenKind::Const => self.parse_gen_decl(GenKind::Const).map(Stmt::Decl),
            TokenKind::Type => self.parse_gen_decl(GenKind::Type).map(Stmt::Decl),
            TokenKind::Identifier(_) if matches!(self.peek_at(1), TokenKind::Colon) => {
                let label = self.expect_ident("label")?;
                self.advance();
                let stmt = if matches!(self.peek(), TokenKind::RBrace | TokenKind::Semi) {
                    Stmt::Empty(EmptyStmt {
                        id: self.fresh(),
                        span: self.span_from(start),
                    })
                } else {
                    self.parse_stmt()?
                };
                Ok(Stmt::Labeled(LabeledStmt {
                    id: self.fresh(),
                    label,
                    stmt: Box::new(stmt),
                    span: self.span_from(start),
                }))
            }
            TokenKind::Go => {
                self.advance();
                let call = self.parse_expr()?;
                self.require_call(&call, "go")?;
                Ok(Stmt::Go(GoStmt {
                    id: self.fresh(),
                    call,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Defer => {
                self.advance();
                let call = self.parse_expr()?;
                self.require_call(&call, "defer")?;
                Ok(Stmt::Defer(DeferStmt {
                    id: self.fresh(),
                    call,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Return => {
                self.advance();
                let results = if matches!(self.peek(), TokenKind::Semi | TokenKind::RBrace) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                Ok(Stmt::Return(ReturnStmt {
                    id: self.fresh(),
                    results,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Break | TokenKind::Continue | TokenKind::Goto | TokenKind::Fallthrough => {
                let kind = match self.advance().kind {
                    TokenKind::Break => BranchKind::Break,
                    TokenKind::Continue => BranchKind::Continue,
                    TokenKind::Goto => BranchKind::Goto,
                    _ => BranchKind::Fallthrough,
                };
                let label = if kind != BranchKind::Fallthrough
                    && matches!(self.peek(), TokenKind::Identifier(_))
                {
                    Some(self.expect_ident("label")?)
                } else {
                    None
                };
                Ok(Stmt::Branch(BranchStmt {
                    id: self.fresh(),
                    kind,
                    label,
                    span: self.span_from(start),
                }))
            }
            TokenKind::LBrace => self.parse_block().map(Stmt::Block),
            TokenKind::If => self.parse_if().map(Stmt::If),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Select => self.parse_select().map(Stmt::Select),
            TokenKind::For => self.parse_for(),
            TokenKind::Semi => Ok(Stmt::Empty(EmptyStmt {
                id: self.fresh(),
                span: self.current_span(),
            })),
            _ => match self.parse_simple_stmt(false)? {
                Simple::Stmt(stmt) => Ok(stmt),
                Simple::Range { .. } => Err(SyntaxError::new(
                    "`range` is only allowed in a for clause",
                    self.span_from(start),
                )),
            },
        }
    }

    fn require_call(&self, expr: &Expr, keyword: &str) -> PResult<()> {
        if matches!(expr.unparen(), Expr::Call { .. }) {
            Ok(())
        } else {
            Err(SyntaxError::new(
                format!("Expression in {keyword} must be a function call"),
                expr.span(),
            ))
        }
    }

    fn parse_simple_stmt(&mut self, range_ok: bool) -> PResult<Simple> {
        let start = self.start();
        if range_ok && self.check(&TokenKind::Range) {
            self.advance();
            let expr = self.parse_expr()?;
            return Ok(Simple::Range {
                key: None,
                value: None,
                define: false,
                expr,
            });
        }

        let mut lhs = self.parse_expr_list()?;
        let op = match self.peek() {
            TokenKind::Define => Some(AssignOp::Define),
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::Op(BinaryOp::Add)),
            TokenKind::MinusEq => Some(AssignOp::Op(BinaryOp::Sub)),
            TokenKind::StarEq => Some(AssignOp::Op(BinaryOp::Mul)),
            TokenKind::SlashEq => Some(AssignOp::Op(BinaryOp::Div)),
            TokenKind::PercentEq => Some(AssignOp::Op(BinaryOp::Rem)),
            TokenKind::AmpersandEq => Some(AssignOp::Op(BinaryOp::BitAnd)),
            TokenKind::PipeEq => Some(AssignOp::Op(BinaryOp::BitOr)),
            TokenKind::CaretEq => Some(AssignOp::Op(BinaryOp::BitXor)),
            TokenKind::ShlEq => Some(AssignOp::Op(BinaryOp::Shl)),
            TokenKind::ShrEq => Some(AssignOp::Op(BinaryOp::Shr)),
            TokenKind::AndNotEq => Some(AssignOp::Op(BinaryOp::AndNot)),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let plain = matches!(op, AssignOp::Assign | AssignOp::Define);
            if range_ok && plain && self.check(&TokenKind::Range) {
                self.advance();
                let expr = self.parse_expr()?;
                if lhs.len() > 2 {
                    return Err(SyntaxError::new(
                        "Range clause permits at most two iteration variables",
                        self.span_from(start),
                    ));
                }
                let mut vars = lhs.into_iter();
                return Ok(Simple::Range {
                    key: vars.next(),
                    value: vars.next(),
                    define: op == AssignOp::Define,
                    expr,
                });
            }
            let rhs = self.parse_expr_list()?;
            return Ok(Simple::Stmt(Stmt::Assign(AssignStmt {
                id: self.fresh(),
                lhs,
                op,
                rhs,
                span: self.span_from(start),
            })));
        }

        if lhs.len() > 1 {
            return Err(self.error_here("Expected `=` or `:=` after expression list"));
        }
        let Some(expr) = lhs.pop() else {
            return Err(self.error_here("Expected expression"));
        };
        match self.peek() {
            TokenKind::Arrow => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(Simple::Stmt(Stmt::Send(SendStmt {
                    id: self.fresh(),
                    chan: expr,
                    value,
                    span: self.span_from(start),
                })))
            }
            TokenKind::Inc | TokenKind::Dec => {
                let inc = self.advance().kind == TokenKind::Inc;
                Ok(Simple::Stmt(Stmt::IncDec(IncDecStmt {
                    id: self.fresh(),
                    expr,
                    inc,
                    span: self.span_from(start),
                })))
            }
            _ => Ok(Simple::Stmt(Stmt::Expr(ExprStmt {
                id: self.fresh(),
                expr,
            }))),
        }
    }

    fn parse_if(&mut self) -> PResult<IfStmt> {
        let start = self.start();
        self.expect(TokenKind::If)?;
        let saved = self.expr_lev;
        self.expr_lev = -1;
        let header = self.parse_if_header();
        self.expr_lev = saved;
        let (init, cond) = header?;
        let then = self.parse_block()?;
        let els = if self.matches(&TokenKind::Else) {
            match self.peek() {
                TokenKind::If => Some(Box::new(Stmt::If(self.parse_if()?))),
                TokenKind::LBrace => Some(Box::new(Stmt::Block(self.parse_block()?))),
                _ => return Err(self.error_here("Expected `if` or block after `else`")),
            }
        } else {
            None
        };
        Ok(IfStmt {
            id: self.fresh(),
            init,
            cond,
            then,
            els,
            span: self.span_from(start),
        })
    }

    fn parse_if_header(&mut self) -> PResult<(Option<Box<Stmt>>, Expr)> {
        if self.check(&TokenKind::LBrace) {
            return Err(self.error_here("Missing condition in if statement"));
        }
        let first = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.simple_stmt_only()?)
        };
        if self.matches(&TokenKind::Semi) {
            let cond = self.parse_expr()?;
            return Ok((first.map(Box::new), cond));
        }
        match first {
            Some(Stmt::Expr(stmt)) => Ok((None, stmt.expr)),
            _ => Err(self.error_here("Expected condition in if statement")),
        }
    }

    fn simple_stmt_only(&mut self) -> PResult<Stmt> {
        let start = self.start();
        match self.parse_simple_stmt(false)? {
            Simple::Stmt(stmt) => Ok(stmt),
            Simple::Range { .. } => Err(SyntaxError::new(
                "Unexpected range clause",
                self.span_from(start),
            )),
        }
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(TokenKind::Switch)?;
        let saved = self.expr_lev;
        self.expr_lev = -1;
        let header = self.parse_switch_header();
        self.expr_lev = saved;
        let (init, tag) = header?;

        let type_guard = match &tag {
            Some(Stmt::Expr(stmt)) => is_type_switch_guard(&stmt.expr),
            Some(Stmt::Assign(stmt)) => {
                stmt.op == AssignOp::Define
                    && stmt.lhs.len() == 1
                    && stmt.rhs.len() == 1
                    && is_type_switch_guard(&stmt.rhs[0])
            }
            _ => false,
        };

        self.expect(TokenKind::LBrace)?;
        let mut clauses = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            clauses.push(self.parse_case_clause()?);
        }
        self.expect(TokenKind::RBrace)?;
        let span = self.span_from(start);

        if type_guard {
            let (binding, subject) = match tag {
                Some(Stmt::Assign(mut stmt)) => {
                    let binding = stmt.lhs.pop().and_then(|lhs| match lhs {
                        Expr::Ident(ident) => Some(ident),
                        _ => None,
                    });
                    (binding, stmt.rhs.pop())
                }
                Some(Stmt::Expr(stmt)) => (None, Some(stmt.expr)),
                _ => (None, None),
            };
            let Some(Expr::TypeAssert { base, .. }) = subject else {
                return Err(SyntaxError::new("Malformed type switch guard", span));
            };
            return Ok(Stmt::TypeSwitch(TypeSwitchStmt {
                id: self.fresh(),
                init,
                binding,
                subject: *base,
                clauses,
                span,
            }));
        }

        let tag = match tag {
            None => None,
            Some(Stmt::Expr(stmt)) => Some(stmt.expr),
            Some(other) => {
                return Err(SyntaxError::new(
                    "Switch tag must be an expression",
                    other.span(),
                ))
            }
        };
        Ok(Stmt::Switch(SwitchStmt {
            id: self.fresh(),
            init,
            tag,
            clauses,
            span,
        }))
    }

    fn parse_switch_header(&mut self) -> PResult<(Option<Box<Stmt>>, Option<Stmt>)> {
        if self.check(&TokenKind::LBrace) {
            return Ok((None, None));
        }
        let first = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.simple_stmt_only()?)
        };
        if self.matches(&TokenKind::Semi) {
            let tag = if self.check(&TokenKind::LBrace) {
                None
            } else {
                Some(self.simple_stmt_only()?)
            };
            return Ok((first.map(Box::new), tag));
        }
        Ok((None, first))
    }

    fn parse_case_clause(&mut self) -> PResult<CaseClause> {
        let start = self.start();
        let list = if self.matches(&TokenKind::Default) {
            Vec::new()
        } else {
            self.expect(TokenKind::Case)?;
            self.parse_expr_list()?
        };
        self.expect(TokenKind::Colon)?;
        let body = self.parse_stmt_list()?;
        Ok(CaseClause {
            id: self.fresh(),
            list,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_select(&mut self) -> PResult<SelectStmt> {
        let start = self.start();
        self.expect(TokenKind::Select)?;
        self.expect(TokenKind::LBrace)?;
        let mut clauses = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            let clause_start = self.start();
            let comm = if self.matches(&TokenKind::Default) {
                None
            } else {
                self.expect(TokenKind::Case)?;
                Some(Box::new(self.simple_stmt_only()?))
            };
            self.expect(TokenKind::Colon)?;
            let body = self.parse_stmt_list()?;
            clauses.push(CommClause {
                id: self.fresh(),
                comm,
                body,
                span: self.span_from(clause_start),
            });
        }
        self.expect(TokenKind::RBrace)?;
        Ok(SelectStmt {
            id: self.fresh(),
            clauses,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(TokenKind::For)?;
        let saved = self.expr_lev;
        self.expr_lev = -1;
        let header = self.parse_for_header();
        self.expr_lev = saved;
        let header = header?;
        let body = self.parse_block()?;
        let span = self.span_from(start);
        match header {
            ForHeader::Range {
                key,
                value,
                define,
                expr,
            } => Ok(Stmt::Range(RangeStmt {
                id: self.fresh(),
                key,
                value,
                define,
                expr,
                body,
                span,
            })),
            ForHeader::Loop { init, cond, post } => Ok(Stmt::For(ForStmt {
                id: self.fresh(),
                init,
                cond,
                post,
                body,
                span,
            })),
        }
    }

    fn parse_for_header(&mut self) -> PResult<ForHeader> {
        if self.check(&TokenKind::LBrace) {
            return Ok(ForHeader::Loop {
                init: None,
                cond: None,
                post: None,
            });
        }
        let first = if self.check(&TokenKind::Semi) {
            None
        } else {
            match self.parse_simple_stmt(true)? {
                Simple::Range {
                    key,
                    value,
                    define,
                    expr,
                } => {
                    return Ok(ForHeader::Range {
                        key,
                        value,
                        define,
                        expr,
                    })
                }
                Simple::Stmt(stmt) => Some(stmt),
            }
        };

        if self.matches(&TokenKind::Semi) {
            let cond = if self.check(&TokenKind::Semi) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(TokenKind::Semi)?;
            let post = if self.check(&TokenKind::LBrace) {
                None
            } else {
                Some(Box::new(self.simple_stmt_only()?))
            };
            return Ok(ForHeader::Loop {
                init: first.map(Box::new),
                cond,
                post,
            });
        }

        match first {
            Some(Stmt::Expr(stmt)) => Ok(ForHeader::Loop {
                init: None,
                cond: Some(stmt.expr),
                post: None,
            }),
            _ => Err(self.error_here("Expected for loop condition")),
        }
    }

    // ---- expressions ---------------------------------------------------

    fn parse_expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.matches(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary(1)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek() {
            TokenKind::OrOr => BinaryOp::LogOr,
            TokenKind::AndAnd => BinaryOp::LogAnd,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::BangEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Pipe => BinaryOp::BitOr,
            TokenKind::Caret => BinaryOp::BitXor,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            TokenKind::Ampersand => BinaryOp::BitAnd,
            TokenKind::AndNot => BinaryOp::AndNot,
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            let span = left.span().to(right.span());
            left = Expr::Binary {
                id: self.fresh(),
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.start();
        let op = match self.peek() {
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Caret => Some(UnaryOp::BitNot),
            TokenKind::Ampersand => Some(UnaryOp::Addr),
            TokenKind::Arrow => {
                if matches!(self.peek_at(1), TokenKind::Chan) {
                    let ty = self.parse_type()?;
                    return self.parse_primary_suffixes(Expr::Type(ty));
                }
                Some(UnaryOp::Recv)
            }
            TokenKind::Star => {
                self.advance();
                let expr = self.parse_unary()?;
                return Ok(Expr::Star {
                    id: self.fresh(),
                    expr: Box::new(expr),
                    span: self.span_from(start),
                });
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                id: self.fresh(),
                op,
                expr: Box::new(expr),
                span: self.span_from(start),
            });
        }
        let operand = self.parse_operand()?;
        self.parse_primary_suffixes(operand)
    }

    fn parse_operand(&mut self) -> PResult<Expr> {
        let start = self.start();
        match self.peek().clone() {
            TokenKind::Identifier(_) => Ok(Expr::Ident(self.expect_ident("identifier")?)),
            TokenKind::Int(value) => self.literal(LitKind::Int, value),
            TokenKind::Float(value) => self.literal(LitKind::Float, value),
            TokenKind::Imag(value) => self.literal(LitKind::Imag, value),
            TokenKind::Char(ch) => self.literal(LitKind::Char, ch.to_string()),
            TokenKind::String(value) => self.literal(LitKind::String, value),
            TokenKind::LParen => {
                self.advance();
                self.expr_lev += 1;
                let inner = self.parse_expr();
                self.expr_lev -= 1;
                let inner = inner?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Paren {
                    id: self.fresh(),
                    expr: Box::new(inner),
                    span: self.span_from(start),
                })
            }
            TokenKind::Func => {
                self.advance();
                let ty = self.parse_signature(start)?;
                if self.check(&TokenKind::LBrace) {
                    let body = self.parse_body()?;
                    Ok(Expr::FuncLit {
                        id: self.fresh(),
                        ty,
                        body,
                        span: self.span_from(start),
                    })
                } else {
                    Ok(Expr::Type(TypeExpr::Func(ty)))
                }
            }
            TokenKind::LBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Struct
            | TokenKind::Interface => Ok(Expr::Type(self.parse_type()?)),
            other => Err(self.error_here(format!(
                "Expected expression, found {}",
                other.describe()
            ))),
        }
    }

    fn literal(&mut self, kind: LitKind, value: String) -> PResult<Expr> {
        let span = self.advance().span;
        Ok(Expr::BasicLit {
            id: self.fresh(),
            kind,
            value,
            span,
        })
    }

    fn parse_primary_suffixes(&mut self, mut expr: Expr) -> PResult<Expr> {
        loop {
            let start = expr.span().start;
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    if self.matches(&TokenKind::LParen) {
                        let ty = if self.matches(&TokenKind::Type) {
                            None
                        } else {
                            Some(self.parse_type()?)
                        };
                        self.expect(TokenKind::RParen)?;
                        expr = Expr::TypeAssert {
                            id: self.fresh(),
                            base: Box::new(expr),
                            ty,
                            span: self.span_from(start),
                        };
                    } else {
                        let sel = self.expect_ident("selector")?;
                        expr = Expr::Selector {
                            id: self.fresh(),
                            base: Box::new(expr),
                            sel,
                            span: self.span_from(start),
                        };
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.expr_lev += 1;
                    let result = self.parse_index_or_slice(expr, start);
                    self.expr_lev -= 1;
                    expr = result?;
                }
                TokenKind::LParen => {
                    self.advance();
                    self.expr_lev += 1;
                    let args = self.parse_call_args();
                    self.expr_lev -= 1;
                    let (args, ellipsis) = args?;
                    self.expect(TokenKind::RParen)?;
                    expr = Expr::Call {
                        id: self.fresh(),
                        func: Box::new(expr),
                        args,
                        ellipsis,
                        span: self.span_from(start),
                    };
                }
                TokenKind::LBrace if self.is_literal_type(&expr) => {
                    let Some(ty) = expr.into_type() else {
                        return Err(self.error_here("Invalid composite literal type"));
                    };
                    expr = self.parse_composite_body(Some(ty), start)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn is_literal_type(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Ident(_) => self.expr_lev >= 0,
            Expr::Selector { base, .. } => {
                self.expr_lev >= 0 && matches!(base.as_ref(), Expr::Ident(_))
            }
            Expr::Type(ty) => matches!(
                ty,
                TypeExpr::Array { .. }
                    | TypeExpr::Slice { .. }
                    | TypeExpr::Map { .. }
                    | TypeExpr::Struct { .. }
            ),
            _ => false,
        }
    }

    fn parse_index_or_slice(&mut self, base: Expr, start: usize) -> PResult<Expr> {
        let low = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        if self.matches(&TokenKind::RBracket) {
            let Some(index) = low else {
                return Err(self.error_here("Expected index expression"));
            };
            return Ok(Expr::Index {
                id: self.fresh(),
                base: Box::new(base),
                index,
                span: self.span_from(start),
            });
        }
        self.expect(TokenKind::Colon)?;
        let high = if matches!(self.peek(), TokenKind::Colon | TokenKind::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let max = if self.matches(&TokenKind::Colon) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::Slice {
            id: self.fresh(),
            base: Box::new(base),
            low,
            high,
            max,
            span: self.span_from(start),
        })
    }

    fn parse_call_args(&mut self) -> PResult<(Vec<Expr>, bool)> {
        let mut args = Vec::new();
        let mut ellipsis = false;
        while !self.check(&TokenKind::RParen) && !self.check(&TokenKind::Eof) {
            let arg = self.parse_expr()?;
            args.push(arg);
            if self.matches(&TokenKind::Ellipsis) {
                ellipsis = true;
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        Ok((args, ellipsis))
    }

    fn parse_composite_body(&mut self, ty: Option<TypeExpr>, start: usize) -> PResult<Expr> {
        self.expect(TokenKind::LBrace)?;
        let saved = self.expr_lev;
        self.expr_lev = 1;
        let elts = self.parse_elements();
        self.expr_lev = saved;
        let elts = elts?;
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::CompositeLit {
            id: self.fresh(),
            ty,
            elts,
            span: self.span_from(start),
        })
    }

    fn parse_elements(&mut self) -> PResult<Vec<Expr>> {
        let mut elts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            let start = self.start();
            let first = self.parse_element()?;
            let elt = if self.matches(&TokenKind::Colon) {
                let value = self.parse_element()?;
                Expr::KeyValue {
                    id: self.fresh(),
                    key: Box::new(first),
                    value: Box::new(value),
                    span: self.span_from(start),
                }
            } else {
                first
            };
            elts.push(elt);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        // Trailing newline before the closing brace.
        self.matches(&TokenKind::Semi);
        Ok(elts)
    }

    fn parse_element(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::LBrace) {
            let start = self.start();
            return self.parse_composite_body(None, start);
        }
        self.parse_expr()
    }
}

enum ForHeader {
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
    },
    Loop {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
    },
}

fn is_type_switch_guard(expr: &Expr) -> bool {
    matches!(expr, Expr::TypeAssert { ty: None, .. })
}

#[cfg(test)]
mod tests;
