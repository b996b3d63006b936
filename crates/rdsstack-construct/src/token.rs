//! Deferred values.
//!
//! A [`Value`] is either a literal or a reference to an attribute of a
//! resource that only exists once deployed. References can travel through
//! plain strings: [`Value::to_token_string`] encodes them as
//! `${Token[<node>.<attribute>]}` and [`Value::parse`] turns such a string
//! back into a value, so string manipulation on endpoints keeps working.

use crate::tree::NodeId;

const TOKEN_PREFIX: &str = "${Token[";
const TOKEN_SUFFIX: &str = "]}";
const REF_ATTRIBUTE: &str = "Ref";

/// A literal or a reference resolved at deploy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A plain string.
    Literal(String),
    /// `Ref` of a resource.
    Ref(NodeId),
    /// `Fn::GetAtt` of a resource attribute.
    GetAtt {
        /// Resource holding the attribute.
        target: NodeId,
        /// Attribute name, e.g. `Endpoint.Port`.
        attribute: String,
    },
    /// Concatenation of values.
    Join(Vec<Value>),
}

impl Value {
    /// A literal value.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// A `Fn::GetAtt` reference.
    #[must_use]
    pub fn get_att(target: NodeId, attribute: impl Into<String>) -> Self {
        Self::GetAtt {
            target,
            attribute: attribute.into(),
        }
    }

    /// Returns `true` unless the value is a plain literal.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        match self {
            Self::Literal(_) => false,
            Self::Ref(_) | Self::GetAtt { .. } => true,
            Self::Join(parts) => parts.iter().any(Self::is_unresolved),
        }
    }

    /// Encodes the value as a string with embedded tokens.
    #[must_use]
    pub fn to_token_string(&self) -> String {
        match self {
            Self::Literal(s) => s.clone(),
            Self::Ref(target) => format!("{TOKEN_PREFIX}{target}.{REF_ATTRIBUTE}{TOKEN_SUFFIX}"),
            Self::GetAtt { target, attribute } => {
                format!("{TOKEN_PREFIX}{target}.{attribute}{TOKEN_SUFFIX}")
            }
            Self::Join(parts) => parts.iter().map(Self::to_token_string).collect(),
        }
    }

    /// Decodes a string that may contain tokens.
    ///
    /// Text that looks like a token but does not decode stays literal.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let mut parts: Vec<Self> = Vec::new();
        let mut literal = String::new();
        let mut rest = s;

        while let Some(start) = rest.find(TOKEN_PREFIX) {
            let body = &rest[start + TOKEN_PREFIX.len()..];
            let decoded = body
                .find(TOKEN_SUFFIX)
                .and_then(|end| decode_token(&body[..end]).map(|v| (v, end)));

            match decoded {
                Some((value, end)) => {
                    literal.push_str(&rest[..start]);
                    if !literal.is_empty() {
                        parts.push(Self::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(value);
                    rest = &body[end + TOKEN_SUFFIX.len()..];
                }
                None => {
                    literal.push_str(&rest[..start + TOKEN_PREFIX.len()]);
                    rest = body;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(Self::Literal(literal));
        }

        match parts.len() {
            0 => Self::Literal(String::new()),
            1 => parts.remove(0),
            _ => Self::Join(parts),
        }
    }

    /// Collects every resource this value refers to.
    pub fn collect_references(&self, out: &mut Vec<NodeId>) {
        match self {
            Self::Literal(_) => {}
            Self::Ref(target) | Self::GetAtt { target, .. } => out.push(*target),
            Self::Join(parts) => {
                for part in parts {
                    part.collect_references(out);
                }
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Literal(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

fn decode_token(body: &str) -> Option<Value> {
    let (index, attribute) = body.split_once('.')?;
    let target = NodeId::from_index(index.parse().ok()?);
    if attribute.is_empty() {
        return None;
    }
    if attribute == REF_ATTRIBUTE {
        Some(Value::Ref(target))
    } else {
        Some(Value::get_att(target, attribute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(i: usize) -> NodeId {
        NodeId::from_index(i)
    }

    #[test]
    fn literal_parses_to_itself() {
        assert_eq!(Value::parse("db.example.com"), Value::literal("db.example.com"));
        assert_eq!(Value::parse(""), Value::literal(""));
    }

    #[test]
    fn single_token_decodes() {
        let v = Value::get_att(node(7), "Endpoint.Port");
        assert_eq!(v.to_token_string(), "${Token[7.Endpoint.Port]}");
        assert_eq!(Value::parse(&v.to_token_string()), v);
    }

    #[test]
    fn ref_token_decodes() {
        let v = Value::Ref(node(3));
        assert_eq!(Value::parse(&v.to_token_string()), v);
    }

    #[test]
    fn mixed_string_becomes_join() {
        let host = Value::get_att(node(4), "Endpoint.Address");
        let port = Value::get_att(node(4), "Endpoint.Port");
        let s = format!("{}:{}", host.to_token_string(), port.to_token_string());

        assert_eq!(
            Value::parse(&s),
            Value::Join(vec![host, Value::literal(":"), port])
        );
    }

    #[test]
    fn token_strings_contain_no_colon() {
        let v = Value::get_att(node(12), "Endpoint.Address");
        assert!(!v.to_token_string().contains(':'));
    }

    #[test]
    fn malformed_token_stays_literal() {
        let s = "${Token[abc.Ref]} and ${Token[1.";
        assert_eq!(Value::parse(s), Value::literal(s));
    }

    #[test]
    fn references_are_collected_through_joins() {
        let v = Value::Join(vec![
            Value::literal("{{resolve:secretsmanager:"),
            Value::Ref(node(2)),
            Value::literal(":SecretString:username::}}"),
        ]);
        let mut refs = Vec::new();
        v.collect_references(&mut refs);
        assert_eq!(refs, vec![node(2)]);
        assert!(v.is_unresolved());
        assert!(!Value::literal("x").is_unresolved());
    }
}
