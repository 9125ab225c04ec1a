//! Parser for the textual constraint syntax.
//!
//! ```text
//! expr    := or ( "=>" expr )?            right-associative
//! or      := and ( "|" and )*
//! and     := unary ( "&" unary )*
//! unary   := "!" unary | atom
//! atom    := "(" expr ")" | "true" | "false"
//!          | "group" NAME "[" INT ".." INT "]" "(" NAME ( "," NAME )* ")"
//!          | NAME ( OP INT )?
//! OP      := "=" | "!=" | "<" | ">" | "<=" | ">="
//! ```
//!
//! [`Condition`]'s `Display` emits this syntax, so rendered conditions parse
//! back to the same value.

use regionmerge_oracle::{CmpOp, Condition, FeatureName};

use crate::error::ModelError;

/// Deepest nesting of `(`, `!` and `=>` accepted in one expression.
pub const MAX_DEPTH: usize = 128;

/// Parse a single condition.
///
/// # Errors
/// Returns [`ModelError::Parse`] with the line and column of the first
/// unexpected character, or [`ModelError::InvalidFeatureName`] for a
/// malformed name.
pub fn parse_condition(input: &str) -> Result<Condition, ModelError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
    };
    let condition = parser.parse_expr()?;
    parser.skip_whitespace();
    if parser.pos < input.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(condition)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    /// Consume `token` (after whitespace) if it comes next.
    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), ModelError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{token}`")))
        }
    }

    fn error(&self, message: &str) -> ModelError {
        let before = &self.input[..self.pos];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map_or(0, |l| l.chars().count())
            + 1;
        let found = self
            .peek_char()
            .map_or_else(|| "end of input".to_owned(), |c| format!("`{c}`"));
        ModelError::Parse {
            line,
            column,
            message: format!("{message}, found {found}"),
        }
    }

    /// Run `f` one nesting level deeper, failing past [`MAX_DEPTH`].
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ModelError>,
    ) -> Result<T, ModelError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(&format!("expression nested deeper than {MAX_DEPTH} levels")));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse_expr(&mut self) -> Result<Condition, ModelError> {
        self.nested(Self::parse_implication)
    }

    fn parse_implication(&mut self) -> Result<Condition, ModelError> {
        let lhs = self.parse_or()?;
        if self.eat("=>") {
            let rhs = self.parse_expr()?;
            return Ok(Condition::implies(lhs, rhs));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Condition, ModelError> {
        let mut items = vec![self.parse_and()?];
        while self.eat("|") {
            items.push(self.parse_and()?);
        }
        Ok(collapse(items, Condition::Or))
    }

    fn parse_and(&mut self) -> Result<Condition, ModelError> {
        let mut items = vec![self.parse_unary()?];
        while self.eat("&") {
            items.push(self.parse_unary()?);
        }
        Ok(collapse(items, Condition::And))
    }

    fn parse_unary(&mut self) -> Result<Condition, ModelError> {
        self.skip_whitespace();
        if self.rest().starts_with('!') && !self.rest().starts_with("!=") {
            self.pos += 1;
            return Ok(Condition::not(self.nested(Self::parse_unary)?));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Condition, ModelError> {
        if self.eat("(") {
            let inner = self.parse_expr()?;
            self.expect(")")?;
            return Ok(inner);
        }
        let word = self.parse_word()?;
        match word {
            "true" => Ok(Condition::And(Vec::new())),
            "false" => Ok(Condition::Or(Vec::new())),
            "group" => self.parse_group(),
            _ => {
                let feature = FeatureName::new(word)?;
                match self.parse_op() {
                    Some(op) => {
                        let value = self.parse_int()?;
                        Ok(Condition::compare(feature, op, value))
                    }
                    None => Ok(Condition::Selected(feature)),
                }
            }
        }
    }

    fn parse_group(&mut self) -> Result<Condition, ModelError> {
        let parent = self.parse_name()?;
        self.expect("[")?;
        let min = self.parse_bound()?;
        self.expect("..")?;
        let max = self.parse_bound()?;
        self.expect("]")?;
        self.expect("(")?;
        let mut children = vec![self.parse_name()?];
        while self.eat(",") {
            children.push(self.parse_name()?);
        }
        self.expect(")")?;
        if min > max {
            return Err(self.error("group lower bound exceeds upper bound"));
        }
        Ok(Condition::group(parent, children, min, max))
    }

    fn parse_word(&mut self) -> Result<&str, ModelError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek_char() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return Err(self.error("expected a feature name")),
        }
        while let Some(c) = self.peek_char() {
            if !FeatureName::is_name_char(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        Ok(&self.input[start..self.pos])
    }

    fn parse_name(&mut self) -> Result<FeatureName, ModelError> {
        let word = self.parse_word()?;
        Ok(FeatureName::new(word)?)
    }

    fn parse_op(&mut self) -> Option<CmpOp> {
        self.skip_whitespace();
        if self.rest().starts_with("=>") {
            return None;
        }
        let op = CmpOp::ALL
            .into_iter()
            .find(|op| self.rest().starts_with(op.symbol()))?;
        self.pos += op.symbol().len();
        Some(op)
    }

    fn parse_int(&mut self) -> Result<i64, ModelError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.rest().starts_with('-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            self.pos = start;
            return Err(self.error("expected an integer"));
        }
        self.input[start..self.pos].parse().map_err(|_| {
            self.pos = start;
            self.error("integer out of range")
        })
    }

    fn parse_bound(&mut self) -> Result<u32, ModelError> {
        let start = self.pos;
        let value = self.parse_int()?;
        u32::try_from(value).map_err(|_| {
            self.pos = start;
            self.error("group bounds must be non-negative")
        })
    }
}

fn collapse(mut items: Vec<Condition>, join: fn(Vec<Condition>) -> Condition) -> Condition {
    if items.len() == 1 {
        items.remove(0)
    } else {
        join(items)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> FeatureName {
        FeatureName::new(s).unwrap()
    }

    #[test]
    fn parses_comparisons() {
        assert_eq!(
            parse_condition("x != 3").unwrap(),
            Condition::compare(name("x"), CmpOp::Ne, 3)
        );
        assert_eq!(
            parse_condition("speed>=-2").unwrap(),
            Condition::compare(name("speed"), CmpOp::Ge, -2)
        );
        assert_eq!(
            parse_condition("x <= 1").unwrap(),
            Condition::compare(name("x"), CmpOp::Le, 1)
        );
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let parens = format!("{}x{}", "(".repeat(200_000), ")".repeat(200_000));
        match parse_condition(&parens) {
            Err(ModelError::Parse { line, column, message }) => {
                assert_eq!((line, column), (1, MAX_DEPTH + 1));
                assert!(message.contains("nested"), "{message}");
            }
            other => panic!("expected a parse error, got {other:?}"),
        }

        let bangs = format!("{}x", "!".repeat(200_000));
        assert!(matches!(parse_condition(&bangs), Err(ModelError::Parse { .. })));

        let chain = vec!["a"; 200_000].join(" => ");
        assert!(matches!(parse_condition(&chain), Err(ModelError::Parse { .. })));
    }

    #[test]
    fn moderate_nesting_parses() {
        let depth = MAX_DEPTH / 2;
        let text = format!("{}x = 1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(
            parse_condition(&text).unwrap(),
            Condition::compare(name("x"), CmpOp::Eq, 1)
        );
        let bangs = format!("{}a", "!".repeat(depth));
        assert!(parse_condition(&bangs).is_ok());
    }

    #[test]
    fn implication_binds_loosest_and_is_right_associative() {
        let parsed = parse_condition("a => b => c").unwrap();
        let expected = Condition::implies(
            Condition::Selected(name("a")),
            Condition::implies(Condition::Selected(name("b")), Condition::Selected(name("c"))),
        );
        assert_eq!(parsed, expected);

        let parsed = parse_condition("x = 0 => y = 1").unwrap();
        assert_eq!(
            parsed,
            Condition::implies(
                Condition::compare(name("x"), CmpOp::Eq, 0),
                Condition::compare(name("y"), CmpOp::Eq, 1),
            )
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let parsed = parse_condition("a & b | !c").unwrap();
        let expected = Condition::Or(vec![
            Condition::And(vec![
                Condition::Selected(name("a")),
                Condition::Selected(name("b")),
            ]),
            Condition::not(Condition::Selected(name("c"))),
        ]);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn parses_groups() {
        let parsed = parse_condition("group Car [1..2] (Diesel, Petrol, Electric)").unwrap();
        assert_eq!(
            parsed,
            Condition::group(
                name("Car"),
                vec![name("Diesel"), name("Petrol"), name("Electric")],
                1,
                2
            )
        );
    }

    #[test]
    fn keywords() {
        assert_eq!(parse_condition("true").unwrap(), Condition::And(vec![]));
        assert_eq!(parse_condition("false").unwrap(), Condition::Or(vec![]));
    }

    #[test]
    fn display_parses_back() {
        for text in [
            "x = 0 => y >= 1 | !z",
            "(a => b) => c",
            "!(x < 2) & (a | b)",
            "group Car [1..1] (Eu, Us)",
            "a => (b => c) & d",
        ] {
            let parsed = parse_condition(text).unwrap();
            assert_eq!(parsed.to_string(), text, "rendering of {text}");
            assert_eq!(parse_condition(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn errors_carry_position() {
        let err = parse_condition("x = ").unwrap_err();
        match err {
            ModelError::Parse { line, column, message } => {
                assert_eq!(line, 1);
                assert_eq!(column, 5);
                assert!(message.contains("integer"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_condition("a &\n  (b |").unwrap_err();
        assert!(matches!(err, ModelError::Parse { line: 2, .. }), "{err}");
    }

    #[test]
    fn rejects_trailing_input_and_bad_groups() {
        assert!(parse_condition("a b").is_err());
        assert!(parse_condition("group P [2..1] (a, b)").is_err());
        assert!(parse_condition("group P [-1..1] (a)").is_err());
        assert!(parse_condition("(a").is_err());
    }
}
