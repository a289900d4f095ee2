//! `dojo/has` loader plugin conditionals.
//!
//! A resource of the form `feature?a:b` selects `a` when the feature is
//! truthy and `b` otherwise; branches may nest (`f1?a:f2?b:c`). Features
//! without a build-time value keep their conditional so the runtime can
//! decide.

use serde_json::Value;

/// Module id of the `has` loader plugin.
pub const HAS_PLUGIN: &str = "dojo/has";

/// Parsed conditional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HasExpr {
    Mid(String),
    Cond {
        feature: String,
        then: Box<HasExpr>,
        otherwise: Box<HasExpr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Term(&'a str),
    Question,
    Colon,
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if c == '?' || c == ':' {
            if start < i {
                tokens.push(Token::Term(&input[start..i]));
            }
            tokens.push(if c == '?' { Token::Question } else { Token::Colon });
            start = i + 1;
        }
    }
    if start < input.len() {
        tokens.push(Token::Term(&input[start..]));
    }
    tokens
}

impl HasExpr {
    /// Parse a conditional resource.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let tokens = tokenize(input);
        let mut pos = 0;
        parse_expr(&tokens, &mut pos)
    }

    /// Fold away conditionals whose feature is known and map every remaining
    /// module id through `normalize`.
    pub fn resolve(
        self,
        feature: &impl Fn(&str) -> Option<bool>,
        normalize: &impl Fn(&str) -> String,
    ) -> Self {
        match self {
            Self::Mid(mid) if mid.is_empty() => Self::Mid(mid),
            Self::Mid(mid) => Self::Mid(normalize(&mid)),
            Self::Cond {
                feature: name,
                then,
                otherwise,
            } => match feature(&name) {
                Some(true) => then.resolve(feature, normalize),
                Some(false) => otherwise.resolve(feature, normalize),
                None => Self::Cond {
                    feature: name,
                    then: Box::new(then.resolve(feature, normalize)),
                    otherwise: Box::new(otherwise.resolve(feature, normalize)),
                },
            },
        }
    }
}

fn parse_expr(tokens: &[Token<'_>], pos: &mut usize) -> HasExpr {
    let term = match tokens.get(*pos) {
        Some(Token::Term(term)) => {
            *pos += 1;
            *term
        }
        _ => "",
    };
    if tokens.get(*pos) != Some(&Token::Question) {
        return HasExpr::Mid(term.to_string());
    }
    *pos += 1;
    let then = parse_expr(tokens, pos);
    let otherwise = if tokens.get(*pos) == Some(&Token::Colon) {
        *pos += 1;
        parse_expr(tokens, pos)
    } else {
        HasExpr::Mid(String::new())
    };
    HasExpr::Cond {
        feature: term.to_string(),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    }
}

impl std::fmt::Display for HasExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mid(mid) => f.write_str(mid),
            Self::Cond {
                feature,
                then,
                otherwise,
            } => write!(f, "{feature}?{then}:{otherwise}"),
        }
    }
}

/// JavaScript truthiness of a feature value.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn features(name: &str) -> Option<bool> {
        match name {
            "on" => Some(true),
            "off" => Some(false),
            _ => None,
        }
    }

    fn prefix(mid: &str) -> String {
        format!("pkg/{mid}")
    }

    #[test]
    fn test_parse_nested() {
        let expr = HasExpr::parse("a?x:b?y:z");
        assert_eq!(expr.to_string(), "a?x:b?y:z");
        assert!(matches!(expr, HasExpr::Cond { ref feature, .. } if feature == "a"));
    }

    #[test]
    fn test_known_features_fold() {
        assert_eq!(
            HasExpr::parse("on?a:b").resolve(&features, &prefix),
            HasExpr::Mid("pkg/a".into())
        );
        assert_eq!(
            HasExpr::parse("off?a:on?b:c").resolve(&features, &prefix),
            HasExpr::Mid("pkg/b".into())
        );
        assert_eq!(
            HasExpr::parse("off?a").resolve(&features, &prefix),
            HasExpr::Mid(String::new())
        );
    }

    #[test]
    fn test_unknown_feature_kept() {
        let resolved = HasExpr::parse("later?a:b").resolve(&features, &prefix);
        assert_eq!(resolved.to_string(), "later?pkg/a:pkg/b");
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
    }
}
