//! Element type resolution.
//!
//! A container instantiation name such as `std::map<std::string, double>`
//! splits into a template prefix and its template arguments. The element
//! types come from an explicit hint when one is given, otherwise from the
//! arguments in the name. Trailing defaulted arguments (allocators,
//! comparators, hashers) are ignored.

use stlcouple_core::{ConfigurationError, ContainerKind, ElementType, HostType};

/// A parsed template instantiation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateName<'a> {
    /// Text before the first `<`, trimmed.
    pub prefix: &'a str,
    /// Top-level template arguments, trimmed. Empty when the name has no `<`.
    pub args: Vec<&'a str>,
}

impl<'a> TemplateName<'a> {
    /// Split `name` at its first `<` and its last `>`.
    pub fn parse(name: &'a str) -> TemplateName<'a> {
        let Some(open) = name.find('<') else {
            return TemplateName {
                prefix: name.trim(),
                args: Vec::new(),
            };
        };
        let prefix = name[..open].trim();
        let inner = match name.rfind('>') {
            Some(close) if close > open => &name[open + 1..close],
            _ => &name[open + 1..],
        };
        TemplateName {
            prefix,
            args: split_top_level(inner),
        }
    }
}

/// Split on commas that are not nested inside `<>` or `()`.
pub fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = args[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

/// An explicit element type supplied at coupling time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementHint {
    /// A host scalar kind, mapped through the canonicalization table.
    Host(HostType),
    /// A foreign type name, mapped through the alias table.
    Foreign(String),
    /// Key and value types of a map, or the member types of a pair.
    Pair(Box<ElementHint>, Box<ElementHint>),
}

impl ElementHint {
    pub fn foreign(name: impl Into<String>) -> Self {
        ElementHint::Foreign(name.into())
    }

    pub fn pair(first: ElementHint, second: ElementHint) -> Self {
        ElementHint::Pair(Box::new(first), Box::new(second))
    }

    fn arity(&self) -> usize {
        match self {
            ElementHint::Pair(..) => 2,
            _ => 1,
        }
    }

    /// Canonical element type of a single hint. A pair hint has no single type.
    pub fn canonicalize(&self) -> ElementType {
        match self {
            ElementHint::Host(host) => ElementType::from_host(*host),
            ElementHint::Foreign(name) => ElementType::canonicalize(name),
            ElementHint::Pair(..) => ElementType::Unknown,
        }
    }
}

impl From<HostType> for ElementHint {
    fn from(host: HostType) -> Self {
        ElementHint::Host(host)
    }
}

impl From<&str> for ElementHint {
    fn from(name: &str) -> Self {
        ElementHint::Foreign(name.to_string())
    }
}

/// Resolve the single element type of a container.
///
/// Never fails: anything that cannot be determined is [`ElementType::Unknown`].
pub fn resolve(hint: Option<&ElementHint>, descriptor_name: &str) -> ElementType {
    match hint {
        Some(hint) => hint.canonicalize(),
        None => TemplateName::parse(descriptor_name)
            .args
            .first()
            .map_or(ElementType::Unknown, |arg| ElementType::canonicalize(arg)),
    }
}

/// Resolve every element type a container kind takes.
///
/// An explicit hint of the wrong arity, or a name with too few template
/// arguments, is an [`ConfigurationError::ElementArity`] error. A name with
/// no template arguments at all resolves to unknown elements.
pub fn resolve_elements(
    kind: ContainerKind,
    hint: Option<&ElementHint>,
    descriptor_name: &str,
) -> Result<Vec<ElementType>, ConfigurationError> {
    let expected = kind.arity();
    let arity_error = |found| ConfigurationError::ElementArity {
        name: descriptor_name.to_string(),
        expected,
        found,
    };

    if let Some(hint) = hint {
        if hint.arity() != expected {
            return Err(arity_error(hint.arity()));
        }
        return Ok(match hint {
            ElementHint::Pair(first, second) => vec![first.canonicalize(), second.canonicalize()],
            single => vec![single.canonicalize()],
        });
    }

    let parsed = TemplateName::parse(descriptor_name);
    if parsed.args.is_empty() {
        return Ok(vec![ElementType::Unknown; expected]);
    }
    if parsed.args.len() < expected {
        return Err(arity_error(parsed.args.len()));
    }
    Ok(parsed.args[..expected]
        .iter()
        .map(|arg| ElementType::canonicalize(arg))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stlcouple_core::ScalarType;

    #[test]
    fn parses_spaced_names() {
        let parsed = TemplateName::parse("std::vector< int >");
        assert_eq!(parsed.prefix, "std::vector");
        assert_eq!(parsed.args, vec!["int"]);
    }

    #[test]
    fn nested_commas_stay_together() {
        let parsed = TemplateName::parse("std::map<std::pair<int, int>, std::vector<double> >");
        assert_eq!(parsed.prefix, "std::map");
        assert_eq!(parsed.args, vec!["std::pair<int, int>", "std::vector<double>"]);
    }

    #[test]
    fn name_without_arguments() {
        let parsed = TemplateName::parse("std::vector");
        assert_eq!(parsed.prefix, "std::vector");
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn resolve_from_name() {
        assert_eq!(
            resolve(None, "std::vector<unsigned int>"),
            ElementType::Scalar(ScalarType::UInt)
        );
        assert_eq!(resolve(None, "std::vector"), ElementType::Unknown);
        assert_eq!(
            resolve(None, "std::list<MyClass>"),
            ElementType::canonicalize("MyClass")
        );
    }

    #[test]
    fn explicit_hint_wins() {
        let hint = ElementHint::Host(HostType::Float);
        assert_eq!(
            resolve(Some(&hint), "std::vector<int>"),
            ElementType::Scalar(ScalarType::Double)
        );
    }

    #[test]
    fn allocator_arguments_are_ignored() {
        let elements = resolve_elements(
            ContainerKind::Vector,
            None,
            "std::vector<int, std::allocator<int> >",
        )
        .unwrap();
        assert_eq!(elements, vec![ElementType::Scalar(ScalarType::Int)]);

        let elements = resolve_elements(
            ContainerKind::Map,
            None,
            "std::map<std::string, double, std::less<std::string> >",
        )
        .unwrap();
        assert_eq!(
            elements,
            vec![ScalarType::String.into(), ScalarType::Double.into()]
        );
    }

    #[test]
    fn maps_need_two_arguments() {
        let err = resolve_elements(ContainerKind::Map, None, "std::map<int>").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::ElementArity {
                name: "std::map<int>".into(),
                expected: 2,
                found: 1,
            }
        );

        let hint = ElementHint::from("int");
        assert!(resolve_elements(ContainerKind::Pair, Some(&hint), "std::pair").is_err());
    }

    #[test]
    fn pair_hint_for_map() {
        let hint = ElementHint::pair(HostType::Str.into(), HostType::Int.into());
        let elements = resolve_elements(ContainerKind::Map, Some(&hint), "std::map").unwrap();
        assert_eq!(elements, vec![ScalarType::String.into(), ScalarType::Long.into()]);
    }

    #[test]
    fn unparseable_name_is_unknown() {
        let elements = resolve_elements(ContainerKind::Map, None, "std::map").unwrap();
        assert_eq!(elements, vec![ElementType::Unknown, ElementType::Unknown]);
    }
}
