//! Context expressions.
//!
//! `${{ Root.path.to.value }}` spans are replaced by the value the path names.
//! Inside a span every dotted token is substituted in turn, leftmost first, and
//! the result is scanned again; the same goes for spans in the outer text. A
//! substituted value that reintroduces span or token syntax is scanned again as
//! well, so every substitution is counted against `MAX_SUBSTITUTIONS`.

use std::sync::LazyLock;

use regex::Regex;

use super::store::{Namespace, VariableStore};
use crate::hooks::HookRegistry;
use crate::{Error, Result};

pub const MAX_SUBSTITUTIONS: usize = 1024;

static EXPRESSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{\{(.*?)\}\}").unwrap());
static CONTEXT_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)+").unwrap()
});

pub struct ExpressionResolver<'a> {
    store: &'a VariableStore,
    hooks: &'a HookRegistry,
    limit: usize,
}

impl<'a> ExpressionResolver<'a> {
    pub fn new(store: &'a VariableStore, hooks: &'a HookRegistry) -> Self {
        Self {
            store,
            hooks,
            limit: MAX_SUBSTITUTIONS,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn resolve(&self, text: &str) -> Result<String> {
        if !text.contains("${{") {
            return Ok(text.to_string());
        }
        trace!("resolving expressions in {text}");
        let mut budget = Budget {
            remaining: self.limit,
            limit: self.limit,
            text,
        };
        let mut resolved = text.to_string();
        while let Some(captures) = EXPRESSION_RE.captures(&resolved) {
            budget.spend()?;
            let span = captures.get(0).map(|m| m.range()).unwrap_or_default();
            let expression = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let value = self.resolve_expression(expression.trim(), &mut budget)?;
            trace!("{expression} => {value}");
            resolved.replace_range(span, &value);
        }
        Ok(resolved)
    }

    fn resolve_expression(&self, expression: &str, budget: &mut Budget) -> Result<String> {
        let mut expression = expression.to_string();
        while let Some(m) = CONTEXT_OBJECT_RE.find(&expression) {
            budget.spend()?;
            let token = m.as_str().to_string();
            let value = self.resolve_object(&token)?;
            if value.is_empty() {
                info!("context expression \"{token}\" does not resolve to any value");
            }
            expression.replace_range(m.range(), &value);
        }
        Ok(expression)
    }

    fn resolve_object(&self, token: &str) -> Result<String> {
        let mut segments = token.split('.');
        let root = segments.next().unwrap_or_default();
        let path = segments.collect::<Vec<_>>();
        match root {
            "Environment" => Ok(std::env::var(path.join("."))
                .unwrap_or_default()
                .replace('\'', "\\'")),
            "Validation" | "Definitions" => {
                let ns = match root {
                    "Validation" => Namespace::Validation,
                    _ => Namespace::Definitions,
                };
                self.store
                    .lookup(ns, &path)
                    .ok_or_else(|| Error::InvalidContextExpression(token.to_string()).into())
            }
            _ => {
                debug!("context object \"{root}\" is not built in, forwarding to plugins");
                Ok(self
                    .hooks
                    .resolve_context_object(root, &path)
                    .unwrap_or_default())
            }
        }
    }
}

struct Budget<'t> {
    remaining: usize,
    limit: usize,
    text: &'t str,
}

impl Budget<'_> {
    fn spend(&mut self) -> Result<()> {
        if self.remaining == 0 {
            return Err(Error::ResolutionDidNotTerminate {
                text: self.text.to_string(),
                limit: self.limit,
            }
            .into());
        }
        self.remaining -= 1;
        Ok(())
    }
}
