//! Syntax model consumed by the parser driver.
//!
//! Only the shapes AMD handling cares about are distinguished; everything
//! else is [`Expr::Other`].

/// Byte range in the module source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Identity of a call expression within one parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// An expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Str { span: Span, value: String },
    Array { span: Span, elements: Vec<Expr> },
    Function {
        span: Span,
        params: Vec<String>,
        body: Vec<Node>,
    },
    Object { span: Span },
    Ident { span: Span, name: String },
    Call(CallExpr),
    Other { span: Span },
}

/// A call expression such as `define([...], function () {})`.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub id: ExprId,
    pub span: Span,
    pub callee: String,
    pub args: Vec<Expr>,
}

/// A statement.
#[derive(Debug, Clone)]
pub enum Node {
    Expr(Expr),
    Try { block: Vec<Node>, handler: Vec<Node> },
}

/// Result of compile-time evaluation of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluated {
    String(String),
    /// Array literal whose elements are all string literals.
    ConstArray(Vec<String>),
    Dynamic,
}

impl Expr {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Str { span, .. }
            | Self::Array { span, .. }
            | Self::Function { span, .. }
            | Self::Object { span }
            | Self::Ident { span, .. }
            | Self::Other { span } => *span,
            Self::Call(call) => call.span,
        }
    }

    /// Classify the expression as a constant string, a constant string array,
    /// or something only known at runtime.
    #[must_use]
    pub fn evaluate(&self) -> Evaluated {
        match self {
            Self::Str { value, .. } => Evaluated::String(value.clone()),
            Self::Array { elements, .. } => elements
                .iter()
                .map(|e| match e {
                    Self::Str { value, .. } => Some(value.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map_or(Evaluated::Dynamic, Evaluated::ConstArray),
            _ => Evaluated::Dynamic,
        }
    }
}

impl Evaluated {
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    #[must_use]
    pub fn is_const_array(&self) -> bool {
        matches!(self, Self::ConstArray(_))
    }
}

/// Builds syntax trees with sequential spans and unique call ids.
///
/// Stands in for the host parser in tests and fixtures.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
    offset: u32,
}

impl AstBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn span(&mut self, len: usize) -> Span {
        let start = self.offset;
        let len = u32::try_from(len).unwrap_or(u32::MAX - start);
        self.offset = start.saturating_add(len).saturating_add(1);
        Span::new(start, start.saturating_add(len))
    }

    pub fn str(&mut self, value: &str) -> Expr {
        Expr::Str {
            span: self.span(value.len() + 2),
            value: value.to_string(),
        }
    }

    pub fn strings(&mut self, values: &[&str]) -> Expr {
        let elements = values.iter().map(|v| self.str(v)).collect();
        self.array(elements)
    }

    pub fn array(&mut self, elements: Vec<Expr>) -> Expr {
        let start = elements.first().map_or(self.offset, |e| e.span().start);
        let end = elements.last().map_or(self.offset, |e| e.span().end);
        self.offset = end + 1;
        Expr::Array {
            span: Span::new(start, end),
            elements,
        }
    }

    pub fn ident(&mut self, name: &str) -> Expr {
        Expr::Ident {
            span: self.span(name.len()),
            name: name.to_string(),
        }
    }

    pub fn object(&mut self) -> Expr {
        Expr::Object { span: self.span(2) }
    }

    pub fn function(&mut self, params: &[&str], body: Vec<Node>) -> Expr {
        Expr::Function {
            span: self.span(8),
            params: params.iter().map(ToString::to_string).collect(),
            body,
        }
    }

    pub fn call(&mut self, callee: &str, args: Vec<Expr>) -> CallExpr {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        let start = args.first().map_or(self.offset, |e| e.span().start);
        let end = args.last().map_or(self.offset, |e| e.span().end);
        self.offset = self.offset.max(end + 1);
        CallExpr {
            id,
            span: Span::new(start.saturating_sub(1), end + 1),
            callee: callee.to_string(),
            args,
        }
    }

    /// A call expression statement.
    pub fn stmt(&mut self, callee: &str, args: Vec<Expr>) -> Node {
        Node::Expr(Expr::Call(self.call(callee, args)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate() {
        let mut b = AstBuilder::new();
        assert_eq!(b.str("a").evaluate(), Evaluated::String("a".into()));
        assert_eq!(
            b.strings(&["a", "b"]).evaluate(),
            Evaluated::ConstArray(vec!["a".into(), "b".into()])
        );
        let s = b.str("a");
        let i = b.ident("deps");
        assert_eq!(b.array(vec![s, i]).evaluate(), Evaluated::Dynamic);
        assert_eq!(b.ident("deps").evaluate(), Evaluated::Dynamic);
        assert!(b.array(Vec::new()).evaluate().is_const_array());
    }

    #[test]
    fn test_builder_ids_and_spans_are_distinct() {
        let mut b = AstBuilder::new();
        let a = b.str("x");
        let c = b.str("y");
        assert!(a.span().end < c.span().start);

        let first = b.call("define", Vec::new());
        let second = b.call("define", Vec::new());
        assert_ne!(first.id, second.id);
    }
}
