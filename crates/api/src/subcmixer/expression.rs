//! Category constraint expressions.
//!
//! An atomic expression compares one structural attribute with a
//! value; atoms compose into AND/OR joins. Negating a join flips its
//! operator, negating an atom flips the comparison.

use corvus_core::attrkey::import_key;
use corvus_core::CoreError;
use serde::{Deserialize, Serialize};

/// Join operator of a composed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinOp {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl JoinOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinOp::And => "AND",
            JoinOp::Or => "OR",
        }
    }

    pub fn negate(&self) -> Self {
        match self {
            JoinOp::And => JoinOp::Or,
            JoinOp::Or => JoinOp::And,
        }
    }
}

/// `attr == value` / `attr != value` over a structural attribute in
/// dot notation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryExpression {
    pub attr: String,
    pub op: String,
    pub value: String,
}

impl CategoryExpression {
    pub fn new(attr: &str, op: &str, value: &str) -> Result<Self, CoreError> {
        if op != "==" && op != "!=" {
            return Err(CoreError::Validation(format!(
                "invalid operator \"{op}\" (expected == or !=)"
            )));
        }
        Ok(Self {
            attr: attr.to_string(),
            op: op.to_string(),
            value: value.to_string(),
        })
    }

    pub fn negate(&self) -> Self {
        Self {
            attr: self.attr.clone(),
            op: if self.op == "==" { "!=" } else { "==" }.to_string(),
            value: self.value.clone(),
        }
    }

    fn op_sql(&self) -> &'static str {
        if self.op == "==" {
            "="
        } else {
            "<>"
        }
    }
}

/// An expression node: an atom or a join of sub-expressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expression {
    Atom(CategoryExpression),
    Join(ExpressionJoin),
}

/// AND/OR composition of expressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionJoin {
    pub op: JoinOp,
    pub items: Vec<Expression>,
}

impl ExpressionJoin {
    pub fn new(op: JoinOp) -> Self {
        Self {
            op,
            items: Vec::new(),
        }
    }

    pub fn add(&mut self, item: Expression) {
        self.items.push(item);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A copy with the join operator flipped.
    pub fn negate(&self) -> Self {
        Self {
            op: self.op.negate(),
            items: self.items.clone(),
        }
    }

    /// All atomic expressions in the subtree.
    pub fn atoms(&self) -> Vec<&CategoryExpression> {
        let mut collected = Vec::new();
        collect_atoms(&self.items, &mut collected);
        collected
    }

    /// Render to a SQL predicate over alias `t1`. Placeholders start at
    /// `$first_placeholder`; returns the predicate and its bind values.
    pub fn as_sql(&self, first_placeholder: usize) -> (String, Vec<String>) {
        let mut values = Vec::new();
        let sql = self.render(first_placeholder, &mut values);
        (sql, values)
    }

    fn render(&self, first_placeholder: usize, values: &mut Vec<String>) -> String {
        let mut parts = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match item {
                Expression::Atom(atom) => {
                    values.push(atom.value.clone());
                    parts.push(format!(
                        "t1.\"{}\" {} ${}",
                        import_key(&atom.attr),
                        atom.op_sql(),
                        first_placeholder + values.len() - 1,
                    ));
                }
                Expression::Join(join) => {
                    parts.push(join.render(first_placeholder, values));
                }
            }
        }
        format!("({})", parts.join(&format!(" {} ", self.op.as_sql())))
    }
}

fn collect_atoms<'a>(items: &'a [Expression], out: &mut Vec<&'a CategoryExpression>) {
    for item in items {
        match item {
            Expression::Atom(atom) => out.push(atom),
            Expression::Join(join) => collect_atoms(&join.items, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(attr: &str, value: &str) -> Expression {
        Expression::Atom(CategoryExpression::new(attr, "==", value).unwrap())
    }

    #[test]
    fn invalid_operator_is_rejected() {
        assert!(CategoryExpression::new("doc.genre", ">=", "x").is_err());
    }

    #[test]
    fn negating_an_atom_flips_comparison() {
        let expr = CategoryExpression::new("doc.genre", "==", "fiction").unwrap();
        assert_eq!(expr.negate().op, "!=");
        assert_eq!(expr.negate().negate().op, "==");
    }

    #[test]
    fn negating_a_join_flips_operator_only() {
        let mut join = ExpressionJoin::new(JoinOp::Or);
        join.add(atom("doc.genre", "fiction"));
        join.add(atom("doc.period", "1990"));
        let negated = join.negate();
        assert_eq!(negated.op, JoinOp::And);
        assert_eq!(negated.items.len(), 2);
    }

    #[test]
    fn atoms_are_collected_recursively() {
        let mut inner = ExpressionJoin::new(JoinOp::Or);
        inner.add(atom("doc.genre", "fiction"));
        inner.add(atom("doc.genre", "poetry"));
        let mut outer = ExpressionJoin::new(JoinOp::And);
        outer.add(Expression::Join(inner));
        outer.add(atom("doc.period", "1990"));
        assert_eq!(outer.atoms().len(), 3);
    }

    #[test]
    fn sql_rendering_numbers_placeholders() {
        let mut join = ExpressionJoin::new(JoinOp::And);
        join.add(atom("doc.genre", "fiction"));
        join.add(atom("doc.period", "1990"));
        let (sql, values) = join.as_sql(2);
        assert_eq!(sql, "(t1.\"doc_genre\" = $2 AND t1.\"doc_period\" = $3)");
        assert_eq!(values, vec!["fiction".to_string(), "1990".to_string()]);
    }

    #[test]
    fn nested_join_renders_parenthesized() {
        let mut inner = ExpressionJoin::new(JoinOp::Or);
        inner.add(atom("doc.genre", "fiction"));
        inner.add(atom("doc.genre", "poetry"));
        let mut outer = ExpressionJoin::new(JoinOp::And);
        outer.add(atom("doc.period", "1990"));
        outer.add(Expression::Join(inner));
        let (sql, _) = outer.as_sql(2);
        assert_eq!(
            sql,
            "(t1.\"doc_period\" = $2 AND (t1.\"doc_genre\" = $3 OR t1.\"doc_genre\" = $4))"
        );
    }
}
