use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::super::domain::Metric;
use super::super::metrics::MetricSnapshot;

/// Comparison applied between a metric value and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparison {
    AtLeast,
    GreaterThan,
    AtMost,
    LessThan,
    Equal,
}

impl Comparison {
    pub const fn symbol(self) -> &'static str {
        match self {
            Comparison::AtLeast => ">=",
            Comparison::GreaterThan => ">",
            Comparison::AtMost => "<=",
            Comparison::LessThan => "<",
            Comparison::Equal => "==",
        }
    }

    fn holds(self, actual: u64, threshold: u64) -> bool {
        match self {
            Comparison::AtLeast => actual >= threshold,
            Comparison::GreaterThan => actual > threshold,
            Comparison::AtMost => actual <= threshold,
            Comparison::LessThan => actual < threshold,
            Comparison::Equal => actual == threshold,
        }
    }
}

/// Qualification predicate: numeric thresholds combined with AND/OR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Rule {
    Threshold {
        metric: Metric,
        comparison: Comparison,
        value: u64,
    },
    All(Vec<Rule>),
    Any(Vec<Rule>),
}

impl Rule {
    pub fn parse(source: &str) -> Result<Self, RuleParseError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(RuleParseError::Empty);
        }
        let mut parser = Parser {
            tokens,
            position: 0,
            depth: 0,
        };
        let rule = parser.parse_or()?;
        match parser.peek() {
            None => Ok(rule),
            Some(token) => Err(RuleParseError::UnexpectedToken(token.describe())),
        }
    }

    /// Metrics referenced anywhere in the rule.
    pub fn metrics(&self) -> BTreeSet<Metric> {
        let mut metrics = BTreeSet::new();
        self.collect_metrics(&mut metrics);
        metrics
    }

    fn collect_metrics(&self, into: &mut BTreeSet<Metric>) {
        match self {
            Rule::Threshold { metric, .. } => {
                into.insert(*metric);
            }
            Rule::All(rules) | Rule::Any(rules) => {
                for rule in rules {
                    rule.collect_metrics(into);
                }
            }
        }
    }

    pub fn is_satisfied_by(&self, snapshot: &MetricSnapshot) -> bool {
        match self {
            Rule::Threshold {
                metric,
                comparison,
                value,
            } => comparison.holds(snapshot.get(*metric), *value),
            Rule::All(rules) => rules.iter().all(|rule| rule.is_satisfied_by(snapshot)),
            Rule::Any(rules) => rules.iter().any(|rule| rule.is_satisfied_by(snapshot)),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Threshold {
                metric,
                comparison,
                value,
            } => write!(f, "{} {} {}", metric, comparison.symbol(), value),
            Rule::All(rules) => write_group(f, rules, " && "),
            Rule::Any(rules) => write_group(f, rules, " || "),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, rules: &[Rule], joiner: &str) -> fmt::Result {
    f.write_str("(")?;
    for (index, rule) in rules.iter().enumerate() {
        if index > 0 {
            f.write_str(joiner)?;
        }
        write!(f, "{rule}")?;
    }
    f.write_str(")")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleParseError {
    #[error("rule is empty")]
    Empty,
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of rule")]
    UnexpectedEnd,
    #[error("threshold '{0}' is not a non-negative integer")]
    InvalidThreshold(String),
    #[error("rule nests deeper than {} groups", MAX_NESTING)]
    TooDeep,
}

/// Maximum parenthesis nesting accepted in a rule.
const MAX_NESTING: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(String),
    Op(Comparison),
    And,
    Or,
    Open,
    Close,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Number(raw) => format!("number '{raw}'"),
            Token::Op(comparison) => format!("operator '{}'", comparison.symbol()),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::Open => "'('".to_string(),
            Token::Close => "')'".to_string(),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, RuleParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '&' | '|' => {
                chars.next();
                if chars.next_if_eq(&ch).is_none() {
                    return Err(RuleParseError::UnexpectedCharacter(ch));
                }
                tokens.push(if ch == '&' { Token::And } else { Token::Or });
            }
            '>' | '<' => {
                chars.next();
                let inclusive = chars.next_if_eq(&'=').is_some();
                let comparison = match (ch, inclusive) {
                    ('>', true) => Comparison::AtLeast,
                    ('>', false) => Comparison::GreaterThan,
                    ('<', true) => Comparison::AtMost,
                    _ => Comparison::LessThan,
                };
                tokens.push(Token::Op(comparison));
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(RuleParseError::UnexpectedCharacter('='));
                }
                tokens.push(Token::Op(Comparison::Equal));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut raw = String::new();
                while let Some(digit) = chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.') {
                    raw.push(digit);
                }
                tokens.push(Token::Number(raw));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut raw = String::new();
                while let Some(letter) = chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_') {
                    raw.push(letter);
                }
                let token = match raw.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Ident(raw),
                };
                tokens.push(token);
            }
            other => return Err(RuleParseError::UnexpectedCharacter(other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Rule, RuleParseError> {
        let mut branches = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.next();
            branches.push(self.parse_and()?);
        }
        Ok(collapse(branches, Rule::Any))
    }

    fn parse_and(&mut self) -> Result<Rule, RuleParseError> {
        let mut terms = vec![self.parse_atom()?];
        while self.peek() == Some(&Token::And) {
            self.next();
            terms.push(self.parse_atom()?);
        }
        Ok(collapse(terms, Rule::All))
    }

    fn parse_atom(&mut self) -> Result<Rule, RuleParseError> {
        match self.next() {
            Some(Token::Open) => {
                if self.depth == MAX_NESTING {
                    return Err(RuleParseError::TooDeep);
                }
                self.depth += 1;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    Some(other) => Err(RuleParseError::UnexpectedToken(other.describe())),
                    None => Err(RuleParseError::UnexpectedEnd),
                }
            }
            Some(Token::Ident(name)) => {
                let metric =
                    Metric::from_name(&name).ok_or(RuleParseError::UnknownMetric(name))?;
                let comparison = match self.next() {
                    Some(Token::Op(comparison)) => comparison,
                    Some(other) => return Err(RuleParseError::UnexpectedToken(other.describe())),
                    None => return Err(RuleParseError::UnexpectedEnd),
                };
                let value = match self.next() {
                    Some(Token::Number(raw)) => raw
                        .parse::<u64>()
                        .map_err(|_| RuleParseError::InvalidThreshold(raw))?,
                    Some(other) => return Err(RuleParseError::UnexpectedToken(other.describe())),
                    None => return Err(RuleParseError::UnexpectedEnd),
                };
                Ok(Rule::Threshold {
                    metric,
                    comparison,
                    value,
                })
            }
            Some(other) => Err(RuleParseError::UnexpectedToken(other.describe())),
            None => Err(RuleParseError::UnexpectedEnd),
        }
    }
}

fn collapse(mut rules: Vec<Rule>, group: fn(Vec<Rule>) -> Rule) -> Rule {
    if rules.len() == 1 {
        rules.remove(0)
    } else {
        group(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_threshold() {
        let rule = Rule::parse("linkCount >= 1").expect("rule parses");
        assert_eq!(
            rule,
            Rule::Threshold {
                metric: Metric::LinkCount,
                comparison: Comparison::AtLeast,
                value: 1,
            }
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let rule = Rule::parse("linkCount >= 5 && profileViews > 10 || followers == 3")
            .expect("rule parses");
        match rule {
            Rule::Any(branches) => {
                assert_eq!(branches.len(), 2);
                assert!(matches!(&branches[0], Rule::All(terms) if terms.len() == 2));
            }
            other => panic!("expected disjunction, got {other:?}"),
        }
    }

    #[test]
    fn keywords_and_parentheses_are_accepted() {
        let rule = Rule::parse("accountAgeDays >= 30 and (followers >= 10 or profileViews >= 500)")
            .expect("rule parses");
        assert_eq!(
            rule.metrics().into_iter().collect::<Vec<_>>(),
            vec![Metric::ProfileViews, Metric::AccountAgeDays, Metric::Followers]
        );
    }

    #[test]
    fn display_output_parses_back() {
        let rule = Rule::parse("(linkCount>=1||followers<2)&&backgroundUploads==0")
            .expect("rule parses");
        let rendered = rule.to_string();
        assert_eq!(Rule::parse(&rendered).expect("rendered rule parses"), rule);
    }

    #[test]
    fn reports_malformed_rules() {
        assert_eq!(Rule::parse("   "), Err(RuleParseError::Empty));
        assert_eq!(
            Rule::parse("karma >= 3"),
            Err(RuleParseError::UnknownMetric("karma".to_string()))
        );
        assert_eq!(Rule::parse("linkCount >="), Err(RuleParseError::UnexpectedEnd));
        assert_eq!(
            Rule::parse("linkCount >= -1"),
            Err(RuleParseError::InvalidThreshold("-1".to_string()))
        );
        assert_eq!(
            Rule::parse("linkCount = 1"),
            Err(RuleParseError::UnexpectedCharacter('='))
        );
        assert!(matches!(
            Rule::parse("(linkCount >= 1"),
            Err(RuleParseError::UnexpectedEnd)
        ));
        assert!(matches!(
            Rule::parse("linkCount >= 1 followers >= 2"),
            Err(RuleParseError::UnexpectedToken(_))
        ));
    }
}
